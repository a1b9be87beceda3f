//! Integration tests for the ledger worker and snapshot persistence

mod common;

use common::{block, manager, transfer, GENESIS_HASH};
use std::sync::Arc;
use tempfile::TempDir;
use tokenchain::blockchain::{BlockHash, BlockStatus, PruneHalt, TRUST};
use tokenchain::crypto::KeyPair;
use tokenchain::node::{LedgerHandle, LedgerNode};
use tokenchain::persistence::{Database, InMemoryPersistence, Persistence};

/// Submits a mint of `sword` to `owner` at height 1, then empty blocks up to `tip`.
async fn submit_chain(handle: &LedgerHandle, issuer: &KeyPair, owner: &KeyPair, tip: u64) -> Vec<BlockHash> {
    let (bytes, mut parent) = block(
        1,
        &GENESIS_HASH,
        vec![transfer(issuer, &owner.identity(), "sword", 1)],
        0,
    );
    assert_eq!(handle.submit_block(bytes).await.unwrap(), BlockStatus::Received);
    let mut hashes = vec![parent.clone()];

    for number in 2..=tip {
        let (bytes, hash) = block(number, &parent, vec![], 0);
        assert_eq!(handle.submit_block(bytes).await.unwrap(), BlockStatus::Received);
        hashes.push(hash.clone());
        parent = hash;
    }
    hashes
}

#[tokio::test]
async fn test_node_admits_blocks_and_reports_bedrock() {
    let issuer = KeyPair::generate();
    let alice = KeyPair::generate();
    let (handle, worker) = LedgerNode::spawn(manager(&issuer), 16, None);

    let hashes = submit_chain(&handle, &issuer, &alice, TRUST).await;
    assert_eq!(handle.bedrock().await.unwrap().block_number, 0);
    assert_eq!(handle.owner_of("sword").await.unwrap(), None);

    let (bytes, _) = block(TRUST + 1, hashes.last().unwrap(), vec![], 0);
    assert_eq!(handle.submit_block(bytes).await.unwrap(), BlockStatus::Received);

    let bedrock = handle.bedrock().await.unwrap();
    assert_eq!(bedrock.block_number, 1);
    assert_eq!(bedrock.hash, hashes[0]);
    assert_eq!(handle.owner_of("sword").await.unwrap(), Some(alice.identity()));

    handle.shutdown().await.unwrap();
    let manager = worker.await.unwrap();
    assert_eq!(manager.index().len() as u64, TRUST);
}

#[tokio::test]
async fn test_node_prune_command() {
    let issuer = KeyPair::generate();
    let alice = KeyPair::generate();
    let (handle, worker) = LedgerNode::spawn(manager(&issuer), 4, None);

    submit_chain(&handle, &issuer, &alice, 3).await;
    let report = handle.prune().await.unwrap();
    assert!(!report.advanced());
    assert_eq!(report.halt, PruneHalt::BelowThreshold);

    handle.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_handle_fails_after_shutdown() {
    let issuer = KeyPair::generate();
    let (handle, worker) = LedgerNode::spawn(manager(&issuer), 4, None);

    handle.shutdown().await.unwrap();
    worker.await.unwrap();
    assert!(handle.bedrock().await.is_err());
}

#[tokio::test]
async fn test_bedrock_advance_is_persisted() {
    let issuer = KeyPair::generate();
    let alice = KeyPair::generate();
    let store = Arc::new(InMemoryPersistence::new());
    let persistence: Arc<dyn Persistence> = store.clone();
    let (handle, worker) = LedgerNode::spawn(manager(&issuer), 16, Some(persistence));

    let hashes = submit_chain(&handle, &issuer, &alice, TRUST).await;
    assert!(store.load_snapshot().unwrap().is_none());

    let (bytes, _) = block(TRUST + 1, hashes.last().unwrap(), vec![], 0);
    assert_eq!(handle.submit_block(bytes).await.unwrap(), BlockStatus::Received);
    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.bedrock.block_number, 1);
    assert_eq!(snapshot.blocks.len() as u64, TRUST);

    handle.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_database_snapshot_survives_restart() {
    let issuer = KeyPair::generate();
    let alice = KeyPair::generate();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap();

    let database: Arc<dyn Persistence> = Arc::new(Database::open(path).unwrap());
    let (handle, worker) = LedgerNode::spawn(manager(&issuer), 16, Some(database));
    submit_chain(&handle, &issuer, &alice, TRUST + 1).await;
    handle.shutdown().await.unwrap();
    worker.await.unwrap();

    let reopened = Database::open(path).unwrap();
    let snapshot = reopened.load_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.bedrock.block_number, 1);

    let mut restored = manager(&issuer);
    let statuses = restored.restore(snapshot).unwrap();
    assert_eq!(statuses.len() as u64, TRUST);
    assert!(statuses.iter().all(|s| *s == BlockStatus::Received));
    assert_eq!(restored.bedrock().block_number, 1);
    assert_eq!(
        restored.owner_of(&tokenchain::token::Token::new("sword")),
        Some(&alice.identity())
    );
}
