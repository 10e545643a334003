//! Historical back-fill processor
//!
//! Pages the base layer in ascending height from the last processing mark
//! (or the first milestone) and feeds non-empty blocks to the parser queue.
//! The mark file is rewritten after every enqueued block so a restart
//! resumes where the previous run stopped. Once the final page is reached
//! the processor flags the node as synced and exits; from then on the
//! webhook path owns block delivery.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tracing::{error, info};

use slp_configs::NetworkConfig;
use slp_db::Store;

use crate::client::{ApiClient, Block};
use crate::mark::ProcessingMark;
use crate::ChainError;

const BLOCKS_PER_PAGE: u64 = 100;

pub struct Processor {
    store: Store,
    config: NetworkConfig,
    client: ApiClient,
    data_dir: PathBuf,
    block_tx: mpsc::Sender<Block>,
    synced: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Processor {
    pub fn new(
        store: Store,
        config: NetworkConfig,
        client: ApiClient,
        data_dir: PathBuf,
        block_tx: mpsc::Sender<Block>,
        synced: Arc<AtomicBool>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            config,
            client,
            data_dir,
            block_tx,
            synced,
            stop,
        }
    }

    pub async fn run(self) {
        if let Err(e) = self.backfill().await {
            error!(reason = %e, "back-fill processor aborted");
        }
        info!("processor task exited");
    }

    async fn backfill(&self) -> Result<(), ChainError> {
        let database_name = self.config.database_name()?;
        let api_peer = self.config.api_peer()?;

        let mut mark = ProcessingMark::load(&self.data_dir, &database_name);
        let mut peers = self.client.select_peers(&api_peer).await;
        let mut peer = mark
            .peer
            .clone()
            .unwrap_or_else(|| pick(&peers, &api_peer));

        let mut last_parsed = self
            .config
            .first_milestone_height()
            .max(mark.last_parsed_block);
        if let Some(tip) = self.store.tip()? {
            last_parsed = last_parsed.max(tip.height);
        }
        if mark.rebuild {
            info!("rebuild asked, restarting from the first milestone");
            last_parsed = self.config.first_milestone_height();
            mark.rebuild = false;
            mark.last_parsed_block = last_parsed;
            mark.save(&self.data_dir, &database_name)?;
        }

        let mut page = (last_parsed / BLOCKS_PER_PAGE).max(2) - 1;
        info!(height = last_parsed, "start downloading blocks");

        while !self.stop.load(Ordering::Relaxed) {
            match self.client.blocks_page(&peer, page, BLOCKS_PER_PAGE).await {
                Ok(envelope) => {
                    let next = envelope.meta.next.clone();
                    let blocks: Vec<Block> = envelope
                        .data
                        .into_iter()
                        .filter(|b| b.transactions > 0 && b.height > last_parsed)
                        .collect();
                    info!(count = blocks.len(), page, "fetching blocks");

                    for block in blocks {
                        let height = block.height;
                        if self.block_tx.send(block).await.is_err() {
                            // parser gone, nothing left to feed
                            return Ok(());
                        }
                        last_parsed = height;
                        mark.last_parsed_block = height;
                        mark.peer = Some(peer.clone());
                        mark.save(&self.data_dir, &database_name)?;
                    }

                    match next {
                        None => {
                            info!("end of block pages reached");
                            self.synced.store(true, Ordering::Relaxed);
                            break;
                        }
                        Some(_) => page += 1,
                    }
                }
                Err(e) => {
                    info!(%peer, reason = %e, "no block from peer");
                    peers.retain(|p| p != &peer);
                    if peers.len() <= 1 {
                        peers = self.client.select_peers(&api_peer).await;
                    }
                    peer = pick(&peers, &api_peer);
                }
            }
        }
        Ok(())
    }
}

fn pick(peers: &[String], fallback: &str) -> String {
    peers
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_derived_from_the_resume_height() {
        // mirrors the paging arithmetic in backfill()
        let page = |height: u64| (height / BLOCKS_PER_PAGE).max(2) - 1;
        assert_eq!(page(0), 1);
        assert_eq!(page(150), 1);
        assert_eq!(page(450), 3);
    }
}
