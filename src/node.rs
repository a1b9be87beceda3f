//! Single-writer ledger node
//!
//! The [`ChainManager`] is owned by one worker task. Everything else talks to
//! it through a cloneable [`LedgerHandle`], so admission, ownership checks
//! and pruning never interleave.

use crate::blockchain::{BlockStatus, ChainManager, PruneReport, SummaryBlock};
use crate::crypto::Identity;
use crate::error::ChainError;
use crate::persistence::Persistence;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

enum LedgerCommand {
    SubmitBlock {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<BlockStatus, ChainError>>,
    },
    Bedrock {
        reply: oneshot::Sender<SummaryBlock>,
    },
    OwnerOf {
        token: String,
        reply: oneshot::Sender<Option<Identity>>,
    },
    Prune {
        reply: oneshot::Sender<PruneReport>,
    },
    Shutdown,
}

/// Cloneable front end to a running [`LedgerNode`].
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerCommand,
    ) -> Result<T, ChainError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ChainError::NetworkError("ledger node has stopped".to_string()))?;
        rx.await
            .map_err(|_| ChainError::NetworkError("ledger node dropped the request".to_string()))
    }

    /// Offers an encoded block to the ledger.
    pub async fn submit_block(&self, bytes: Vec<u8>) -> Result<BlockStatus, ChainError> {
        self.request(|reply| LedgerCommand::SubmitBlock { bytes, reply }).await?
    }

    pub async fn bedrock(&self) -> Result<SummaryBlock, ChainError> {
        self.request(|reply| LedgerCommand::Bedrock { reply }).await
    }

    /// Trusted owner of `token` as of bedrock.
    pub async fn owner_of(&self, token: &str) -> Result<Option<Identity>, ChainError> {
        let token = token.to_string();
        self.request(|reply| LedgerCommand::OwnerOf { token, reply }).await
    }

    pub async fn prune(&self) -> Result<PruneReport, ChainError> {
        self.request(|reply| LedgerCommand::Prune { reply }).await
    }

    /// Asks the worker to stop after the commands already queued.
    pub async fn shutdown(&self) -> Result<(), ChainError> {
        self.tx
            .send(LedgerCommand::Shutdown)
            .await
            .map_err(|_| ChainError::NetworkError("ledger node has stopped".to_string()))
    }
}

pub struct LedgerNode {
    manager: ChainManager,
    persistence: Option<Arc<dyn Persistence>>,
    rx: mpsc::Receiver<LedgerCommand>,
}

impl LedgerNode {
    /// Moves `manager` onto a worker task. The task ends on shutdown or once
    /// every handle is dropped, returning the manager.
    pub fn spawn(
        manager: ChainManager,
        buffer: usize,
        persistence: Option<Arc<dyn Persistence>>,
    ) -> (LedgerHandle, JoinHandle<ChainManager>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let node = LedgerNode {
            manager,
            persistence,
            rx,
        };
        let task = tokio::spawn(node.run());
        (LedgerHandle { tx }, task)
    }

    async fn run(mut self) -> ChainManager {
        info!(
            "Ledger node started at bedrock {}",
            self.manager.bedrock().block_number
        );

        while let Some(command) = self.rx.recv().await {
            match command {
                LedgerCommand::SubmitBlock { bytes, reply } => {
                    let before = self.manager.bedrock().block_number;
                    let result = self.manager.receive_block(&bytes);
                    match &result {
                        Ok(status) => debug!("Block submission: {}", status),
                        Err(e) => error!("Block submission failed: {}", e),
                    }
                    if self.manager.bedrock().block_number != before {
                        self.persist();
                    }
                    let _ = reply.send(result);
                }
                LedgerCommand::Bedrock { reply } => {
                    let _ = reply.send(self.manager.bedrock().clone());
                }
                LedgerCommand::OwnerOf { token, reply } => {
                    let token = self.manager.token(&token);
                    let _ = reply.send(self.manager.owner_of(&token).cloned());
                }
                LedgerCommand::Prune { reply } => {
                    let report = self.manager.prune_data();
                    if report.advanced() {
                        self.persist();
                    }
                    let _ = reply.send(report);
                }
                LedgerCommand::Shutdown => {
                    info!("Ledger node shutting down");
                    break;
                }
            }
        }

        self.persist();
        self.manager
    }

    fn persist(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match self.manager.snapshot() {
            Ok(snapshot) => {
                if let Err(e) = persistence.save_snapshot(&snapshot) {
                    warn!("Failed to persist ledger snapshot: {}", e);
                } else {
                    debug!(
                        "Persisted bedrock {} with {} retained blocks",
                        snapshot.bedrock.block_number,
                        snapshot.blocks.len()
                    );
                }
            }
            Err(e) => warn!("Failed to build ledger snapshot: {}", e),
        }
    }
}
