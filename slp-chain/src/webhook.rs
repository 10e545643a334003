//! Webhook subscription lifecycle and token verification
//!
//! The base layer hands out one secret token per webhook. The first 32
//! characters travel back in the `Authorization` header of every delivery;
//! the remainder never leaves this node. We keep `{"verification", "hash"}`
//! in a key file named after the MD5 of the authorization half, so a
//! delivery can be checked without storing the full token.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use slp_configs::NetworkConfig;
use slp_crypto::{md5_hex, sha256_hex};

use crate::client::ApiClient;
use crate::ChainError;

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    verification: String,
    hash: String,
}

/// On-disk record of an active subscription (`{database name}.wbh`).
#[derive(Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub event: String,
    pub target: String,
    #[serde(default)]
    pub conditions: Value,
    /// Path of the token key file.
    pub key: PathBuf,
}

fn subscription_path(folder: &Path, database_name: &str) -> PathBuf {
    folder.join(format!("{database_name}.wbh"))
}

pub fn subscribed(folder: &Path, database_name: &str) -> bool {
    subscription_path(folder, database_name).exists()
}

/// Splits a fresh token and persists its verification half.
pub fn dump_webhook_token(folder: &Path, token: &str) -> Result<PathBuf, ChainError> {
    if token.len() <= 32 {
        return Err(ChainError::WebhookToken);
    }
    let (authorization, verification) = token.split_at(32);
    let path = folder.join(format!("{}.key", md5_hex(authorization.as_bytes())));
    let file = TokenFile {
        verification: verification.to_string(),
        hash: sha256_hex(token.as_bytes()),
    };
    fs::create_dir_all(folder)?;
    fs::write(&path, serde_json::to_string(&file)?)?;
    Ok(path)
}

/// Recomputes the token hash from an inbound `Authorization` header.
pub fn check_webhook_token(folder: &Path, authorization: &str) -> bool {
    let path = folder.join(format!("{}.key", md5_hex(authorization.as_bytes())));
    let Ok(raw) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(file) = serde_json::from_str::<TokenFile>(&raw) else {
        return false;
    };
    let token = format!("{authorization}{}", file.verification);
    sha256_hex(token.as_bytes()) == file.hash
}

/// Registers the webhook unless a subscription file already exists.
pub async fn subscribe(
    client: &ApiClient,
    config: &NetworkConfig,
    folder: &Path,
    public_url: &str,
) -> Result<bool, ChainError> {
    let database_name = config.database_name()?;
    if subscribed(folder, &database_name) {
        info!(peer = %config.webhook_peer()?, "already subscribed");
        return Ok(false);
    }

    let target = format!("{public_url}/blocks");
    let peer = config.webhook_peer()?;
    let mut descriptor = client.create_webhook(&peer, &target).await?;

    let token = descriptor.token.take().ok_or(ChainError::WebhookToken)?;
    let key = dump_webhook_token(folder, &token)?;

    let subscription = Subscription {
        id: descriptor.id,
        event: descriptor.event,
        target: descriptor.target,
        conditions: descriptor.conditions,
        key,
    };
    fs::write(
        subscription_path(folder, &database_name),
        serde_json::to_string_pretty(&subscription)?,
    )?;
    info!(%peer, "subscribed");
    Ok(true)
}

/// Deletes the webhook and both local files.
pub async fn unsubscribe(
    client: &ApiClient,
    config: &NetworkConfig,
    folder: &Path,
) -> Result<bool, ChainError> {
    let database_name = config.database_name()?;
    let path = subscription_path(folder, &database_name);
    let Ok(raw) = fs::read_to_string(&path) else {
        return Ok(false);
    };
    let subscription: Subscription = serde_json::from_str(&raw)?;

    let peer = config.webhook_peer()?;
    match client.delete_webhook(&peer, &subscription.id).await {
        Ok(()) => {
            let _ = fs::remove_file(&subscription.key);
            let _ = fs::remove_file(&path);
            info!(%peer, "unsubscribed");
            Ok(true)
        }
        Err(e) => {
            error!(%peer, reason = %e, "unsubscription failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_check_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let token = format!("{}{}", "a".repeat(32), "the-verification-half");

        dump_webhook_token(dir.path(), &token).unwrap();

        assert!(check_webhook_token(dir.path(), &"a".repeat(32)));
        assert!(!check_webhook_token(dir.path(), &"b".repeat(32)));
    }

    #[test]
    fn short_tokens_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            dump_webhook_token(dir.path(), "short"),
            Err(ChainError::WebhookToken)
        ));
    }
}
