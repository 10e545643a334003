//! Base-layer REST client
//!
//! Thin typed wrapper over the core node API: peers, blocks, per-block
//! transactions and webhook management. Pagination and peer rotation stay
//! with the callers; this layer only shapes requests and responses.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::ChainError;

/// Port advertised by peers that expose the public REST API.
const CORE_API_PORT: &str = "@arkecosystem/core-api";

/// Client timeout while back-filling; webhook-driven requests reuse it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Meta {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BlockTime {
    #[serde(default)]
    pub epoch: u64,
    #[serde(default)]
    pub unix: f64,
}

/// One base-layer block, as the API and the webhook deliver it.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub id: String,
    pub height: u64,
    #[serde(alias = "numberOfTransactions")]
    pub transactions: u64,
    #[serde(default)]
    pub timestamp: BlockTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u32,
    pub sender: String,
    pub recipient: String,
    #[serde(deserialize_with = "amount")]
    pub amount: u64,
    #[serde(rename = "vendorField", default)]
    pub vendor_field: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PeerInfo {
    ip: String,
    #[serde(default)]
    ports: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDescriptor {
    pub id: String,
    pub event: String,
    pub target: String,
    #[serde(default)]
    pub conditions: Value,
    #[serde(default)]
    pub token: Option<String>,
}

/// Core node amounts arrive as strings or numbers depending on the API
/// revision.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("amount out of range")),
        Value::String(s) => s
            .parse()
            .map_err(|_| serde::de::Error::custom("amount is not an integer")),
        _ => Err(serde::de::Error::custom("unexpected amount shape")),
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new() -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, ChainError> {
        let response = self.http.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(ChainError::BadStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Candidate API peers ordered by height, capped at the 20 best. Falls
    /// back to the configured peer when the lookup fails.
    pub async fn select_peers(&self, api_peer: &str) -> Vec<String> {
        let url = format!("{api_peer}/api/peers");
        let candidates: Envelope<Vec<PeerInfo>> = match self
            .get(&url, &[("orderBy", "height:desc".to_string())])
            .await
        {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(peer = api_peer, reason = %e, "can not fetch peers");
                return vec![api_peer.to_string()];
            }
        };
        let peers: Vec<String> = candidates
            .data
            .iter()
            .take(20)
            .filter_map(|peer| {
                let port = peer.ports.get(CORE_API_PORT)?.as_i64()?;
                (port > 0).then(|| format!("http://{}:{}", peer.ip, port))
            })
            .collect();
        if peers.is_empty() {
            vec![api_peer.to_string()]
        } else {
            peers
        }
    }

    /// One ascending page of blocks.
    pub async fn blocks_page(
        &self,
        peer: &str,
        page: u64,
        limit: u64,
    ) -> Result<Envelope<Vec<Block>>, ChainError> {
        let url = format!("{peer}/api/blocks");
        self.get(
            &url,
            &[
                ("page", page.to_string()),
                ("limit", limit.to_string()),
                ("orderBy", "height:asc".to_string()),
            ],
        )
        .await
    }

    /// All transactions of a block, draining the API pagination.
    pub async fn block_transactions(
        &self,
        peer: &str,
        block_id: &str,
    ) -> Result<Vec<Transaction>, ChainError> {
        let url = format!("{peer}/api/blocks/{block_id}/transactions");
        let mut result = Vec::new();
        let mut page = 1u64;
        loop {
            let envelope: Envelope<Vec<Transaction>> =
                self.get(&url, &[("page", page.to_string())]).await?;
            if envelope.data.is_empty() {
                break;
            }
            result.extend(envelope.data);
            page += 1;
        }
        debug!(block = block_id, count = result.len(), "transactions fetched");
        Ok(result)
    }

    /// Subscribes to `block.applied` for non-empty blocks.
    pub async fn create_webhook(
        &self,
        webhook_peer: &str,
        target: &str,
    ) -> Result<WebhookDescriptor, ChainError> {
        let url = format!("{webhook_peer}/api/webhooks");
        let body = json!({
            "event": "block.applied",
            "target": target,
            "conditions": [
                {"key": "numberOfTransactions", "condition": "gte", "value": "1"}
            ],
        });
        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ChainError::BadStatus(response.status().as_u16()));
        }
        let envelope: Envelope<WebhookDescriptor> = response.json().await?;
        Ok(envelope.data)
    }

    pub async fn delete_webhook(&self, webhook_peer: &str, id: &str) -> Result<(), ChainError> {
        let url = format!("{webhook_peer}/api/webhooks/{id}");
        let response = self.http.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(ChainError::BadStatus(response.status().as_u16()));
        }
        Ok(())
    }
}
