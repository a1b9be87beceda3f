//! Shared helpers for building and submitting blocks in integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tokenchain::blockchain::{Block, BlockHash, BlockStatus, ChainManager, ChainParams, SummaryBlock};
use tokenchain::crypto::{Identity, KeyPair, Secp256k1Provider};
use tokenchain::entry::Entry;
use tokenchain::sync::{BlockFetcher, NullFetcher};
use tokenchain::token::Token;

pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Ledger with no proof-of-work requirement and the default trust depths.
pub fn manager(issuer: &KeyPair) -> ChainManager {
    manager_with(ChainParams::new(issuer.identity(), 0), Arc::new(NullFetcher))
}

pub fn manager_with(params: ChainParams, fetcher: Arc<dyn BlockFetcher>) -> ChainManager {
    ChainManager::new(
        params,
        SummaryBlock::genesis(GENESIS_HASH.to_vec()),
        Arc::new(Secp256k1Provider),
        fetcher,
    )
}

/// An entry signed by `from`.
pub fn transfer(from: &KeyPair, to: &Identity, token: &str, block_number: u64) -> Entry {
    let mut entry = Entry::new(from.identity(), to.clone(), Token::new(token), block_number);
    entry
        .sign(&Secp256k1Provider, &from.secret_bytes())
        .expect("signing with the source key");
    entry
}

/// Encoded block and its hash. `tag` goes into the suffix to tell sibling branches apart.
pub fn block(number: u64, parent: &[u8], entries: Vec<Entry>, tag: u8) -> (Vec<u8>, BlockHash) {
    let block = Block::new(number, parent.to_vec(), entries, vec![tag]);
    let hash = block.compute_hash(&Secp256k1Provider).unwrap().to_vec();
    (block.to_bytes().unwrap(), hash)
}

pub fn submit(manager: &mut ChainManager, number: u64, parent: &[u8], entries: Vec<Entry>, tag: u8) -> (BlockStatus, BlockHash) {
    let (bytes, hash) = block(number, parent, entries, tag);
    (manager.receive_block(&bytes).unwrap(), hash)
}

/// Submits empty blocks `from..=to` on top of `parent`. Returns the hashes in order.
pub fn grow(manager: &mut ChainManager, parent: &[u8], from: u64, to: u64, tag: u8) -> Vec<BlockHash> {
    let mut hashes = Vec::new();
    let mut parent = parent.to_vec();
    for number in from..=to {
        let (status, hash) = submit(manager, number, &parent, vec![], tag);
        assert_eq!(status, BlockStatus::Received, "block {} on branch {}", number, tag);
        parent = hash.clone();
        hashes.push(hash);
    }
    hashes
}
