//! Missing-block requests for TokenChain
//!
//! The ledger never waits on the network. When a block arrives whose parent
//! is unknown, the manager hands the parent hash to a [`BlockFetcher`] and
//! moves on; whatever transport sits behind the fetcher later feeds the
//! answer back through the normal admission path.

use crate::blockchain::BlockHash;
use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub trait BlockFetcher: Send + Sync {
    /// Fire-and-forget request for the block with `hash`.
    fn request_block(&self, hash: &[u8]);

    /// Called for every block admitted to the index.
    fn block_arrived(&self, _hash: &[u8]) {}
}

/// Drops every request. Useful when running without a network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFetcher;

impl BlockFetcher for NullFetcher {
    fn request_block(&self, hash: &[u8]) {
        debug!("No network attached; dropping request for {}", hex::encode(hash));
    }
}

/// Publishes requested hashes on an unbounded channel for a network task to serve.
///
/// A hash is published once until the block arrives, so several orphans
/// waiting on the same parent cause a single request.
pub struct ChannelFetcher {
    tx: mpsc::UnboundedSender<BlockHash>,
    outstanding: Mutex<HashSet<BlockHash>>,
}

impl ChannelFetcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BlockHash>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = ChannelFetcher {
            tx,
            outstanding: Mutex::new(HashSet::new()),
        };
        (fetcher, rx)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().len()
    }

    pub fn is_outstanding(&self, hash: &[u8]) -> bool {
        self.outstanding.lock().contains(hash)
    }
}

impl BlockFetcher for ChannelFetcher {
    fn request_block(&self, hash: &[u8]) {
        if !self.outstanding.lock().insert(hash.to_vec()) {
            debug!("Request for {} already outstanding", hex::encode(hash));
            return;
        }
        if self.tx.send(hash.to_vec()).is_err() {
            warn!("Block request channel closed; dropping request for {}", hex::encode(hash));
            self.outstanding.lock().remove(hash);
        }
    }

    fn block_arrived(&self, hash: &[u8]) {
        self.outstanding.lock().remove(hash);
    }
}

/// Keeps every request in order; intended for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    requests: Mutex<Vec<BlockHash>>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<BlockHash> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, hash: &[u8]) -> usize {
        self.requests.lock().iter().filter(|h| h.as_slice() == hash).count()
    }
}

impl BlockFetcher for RecordingFetcher {
    fn request_block(&self, hash: &[u8]) {
        self.requests.lock().push(hash.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_fetcher_publishes_request() {
        let (fetcher, mut rx) = ChannelFetcher::new();
        fetcher.request_block(&[1, 2, 3]);

        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3]);
        assert!(fetcher.is_outstanding(&[1, 2, 3]));
    }

    #[test]
    fn test_channel_fetcher_deduplicates_until_arrival() {
        let (fetcher, mut rx) = ChannelFetcher::new();
        fetcher.request_block(&[7]);
        fetcher.request_block(&[7]);
        assert_eq!(rx.try_recv().unwrap(), vec![7]);
        assert!(rx.try_recv().is_err());

        fetcher.block_arrived(&[7]);
        assert_eq!(fetcher.outstanding(), 0);
        fetcher.request_block(&[7]);
        assert_eq!(rx.try_recv().unwrap(), vec![7]);
    }

    #[test]
    fn test_closed_channel_does_not_keep_request() {
        let (fetcher, rx) = ChannelFetcher::new();
        drop(rx);
        fetcher.request_block(&[9]);
        assert_eq!(fetcher.outstanding(), 0);
    }

    #[test]
    fn test_recording_fetcher_counts_requests() {
        let fetcher = RecordingFetcher::new();
        fetcher.request_block(&[1]);
        fetcher.request_block(&[2]);
        fetcher.request_block(&[1]);

        assert_eq!(fetcher.request_count(&[1]), 2);
        assert_eq!(fetcher.requests().len(), 3);
    }
}
