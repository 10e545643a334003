//! Inbound HTTP surface
//!
//! Handlers do one thing: enqueue on the messenger (or answer a trivial
//! read) and return immediately. All real work happens in the workers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::messenger::{Inbound, MessengerHandle};
use crate::node::Node;

#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Node>,
    pub messenger: MessengerHandle,
}

pub fn router(node: Arc<Node>, messenger: MessengerHandle) -> Router {
    let state = AppState { node, messenger };
    Router::new()
        .route("/blocks", post(receive_block))
        .route("/message", post(receive_message).head(liveness))
        .route("/peers", get(list_peers))
        .with_state(state)
}

/// Webhook landing: authentication happens in the messenger, the endpoint
/// only unloads itself as fast as possible.
async fn receive_block(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("?")
        .to_string();
    let queued = state.messenger.put(Inbound::Block {
        authorization,
        body,
    });
    Json(json!({"queued": queued}))
}

async fn receive_message(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let queued = state.messenger.put(Inbound::Gossip(body));
    Json(json!({"queued": queued}))
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn list_peers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.node.peers.snapshot())
}
