//! Daemon wiring
//!
//! [`run`] assembles one SLP node: config, store, logging, the intake
//! workers (back-fill processor and block parser), the gossip workers
//! (messenger and broadcaster), a ratifier that asks peers to confirm
//! every freshly applied record, and the inbound HTTP surface. Shutdown is
//! signal-driven: the HTTP server stops first, the workers are stopped and
//! detached after it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use slp_chain::client::ApiClient;
use slp_chain::parser::BlockParser;
use slp_chain::sync::Processor;
use slp_chain::webhook;
use slp_configs::NetworkConfig;
use slp_db::{BlockStamp, Store};
use slp_network::consensus::ConsensusBook;
use slp_network::messenger::MessengerHandle;
use slp_network::node::PeerBook;
use slp_network::{broadcast, consensus, http, messenger, GossipClient, Node};

mod logging;

pub use logging::init_tracing;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("configuration failure")]
    Config(#[from] slp_configs::ConfigError),

    #[error("storage failure")]
    Store(#[from] slp_db::kvtable::Error),

    #[error("chain intake failure")]
    Chain(#[from] slp_chain::ChainError),

    #[error("network failure")]
    Network(#[from] slp_network::NetworkError),

    #[error("IO failure")]
    Io(#[from] std::io::Error),

    #[error("logging setup failure")]
    Logging(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Network name, matching `{name}.json` in the data folder.
    pub network: String,
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn public_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

pub async fn run(settings: Settings) -> Result<(), NodeError> {
    let config = NetworkConfig::load(&settings.data_dir, &settings.network)?;
    let database_name = config.database_name()?;

    let _log_guard = init_tracing(&settings.data_dir, &database_name, &config.log_level())?;
    info!(network = config.name(), %database_name, "node starting");

    let store = Store::open(
        settings.data_dir.join(&database_name),
        config.poh_digest()?,
    )?;
    let client = ApiClient::new()?;
    let public_url = settings.public_url();

    if let Err(e) = webhook::subscribe(&client, &config, &settings.data_dir, &public_url).await {
        error!(reason = %e, "webhook subscription failed, relying on back-fill only");
    }

    let synced = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));
    let parse_lock = Arc::new(tokio::sync::Mutex::new(()));
    let (applied_tx, applied_rx) = mpsc::channel::<BlockStamp>(256);

    let (block_tx, parser) = BlockParser::new(
        store.clone(),
        config.clone(),
        client.clone(),
        settings.data_dir.clone(),
        parse_lock,
        Some(applied_tx),
    )?;

    let processor = Processor::new(
        store.clone(),
        config.clone(),
        client.clone(),
        settings.data_dir.clone(),
        block_tx.clone(),
        Arc::clone(&synced),
        Arc::clone(&stop),
    );

    let (broadcast_tx, broadcast_rx) = mpsc::channel(256);
    let (messenger_handle, messenger_rx) = MessengerHandle::new(config.message_memory_size());

    let node = Arc::new(Node {
        store,
        config: config.clone(),
        public_url: public_url.clone(),
        data_dir: settings.data_dir.clone(),
        peers: PeerBook::new(config.peer_limit()),
        consensus: ConsensusBook::new(),
        gossip: GossipClient::new()?,
        broadcast_tx,
        block_tx,
        synced,
    });

    let workers = [
        tokio::spawn(parser.run()),
        tokio::spawn(processor.run()),
        tokio::spawn(broadcast::run(Arc::clone(&node), broadcast_rx)),
        tokio::spawn(messenger::run(Arc::clone(&node), messenger_rx)),
        tokio::spawn(ratifier(Arc::clone(&node), applied_rx)),
    ];

    let app = http::router(Arc::clone(&node), messenger_handle);
    let listener =
        tokio::net::TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    info!(%public_url, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    stop.store(true, Ordering::Relaxed);
    for worker in workers {
        worker.abort();
    }
    Ok(())
}

/// Opens a consensus round for every applied record; quorum reach is only
/// logged here, side effects stay with callers that bind their own
/// callbacks.
async fn ratifier(node: Arc<Node>, mut applied_rx: mpsc::Receiver<BlockStamp>) {
    while let Some(stamp) = applied_rx.recv().await {
        if node.peers.is_empty() {
            continue;
        }
        let outcome = consensus::ratify(
            &node,
            stamp,
            Box::new(move || info!(%stamp, "record ratified by peer quorum")),
        )
        .await;
        if let Err(e) = outcome {
            error!(%stamp, reason = %e, "could not open consensus round");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
