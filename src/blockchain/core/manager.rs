use crate::blockchain::core::chain::Block;
use crate::blockchain::core::index::{BlockId, ChainIndex};
use crate::blockchain::core::state::SummaryBlock;
use crate::crypto::{CryptoProvider, Identity};
use crate::error::ChainError;
use crate::persistence::LedgerSnapshot;
use crate::sync::BlockFetcher;
use crate::token::{Token, TokenRegistry};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Blocks of unforked history required before a single branch is trusted.
pub const TRUST: u64 = 10;
/// Branch length after which the longest fork wins regardless of competitors.
pub const FORK_CUT: u64 = 30;

/// Outcome of offering a block to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockStatus {
    Received,
    Invalid,
    AlreadyKnown,
    Unverifiable,
    Valid,
    TooOld,
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BlockStatus::Received => "received",
            BlockStatus::Invalid => "invalid",
            BlockStatus::AlreadyKnown => "already known",
            BlockStatus::Unverifiable => "unverifiable",
            BlockStatus::Valid => "valid",
            BlockStatus::TooOld => "too old",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// Leading zero bits a block hash must carry.
    pub zero_criteria: u8,
    pub trust: u64,
    pub fork_cut: u64,
    /// The only identity allowed to move tokens nobody owns yet.
    pub trusted_issuer: Identity,
}

impl ChainParams {
    pub fn new(trusted_issuer: Identity, zero_criteria: u8) -> Self {
        ChainParams {
            zero_criteria,
            trust: TRUST,
            fork_cut: FORK_CUT,
            trusted_issuer,
        }
    }
}

/// Owns the candidate forest and the bedrock summary.
///
/// Every method takes `&mut self` or `&self`; callers that share a manager
/// across tasks go through [`crate::node::LedgerNode`], which serializes
/// access on a single worker.
pub struct ChainManager {
    pub(crate) index: ChainIndex,
    pub(crate) bedrock: SummaryBlock,
    tokens: TokenRegistry,
    pub(crate) params: ChainParams,
    crypto: Arc<dyn CryptoProvider>,
    fetcher: Arc<dyn BlockFetcher>,
}

impl ChainManager {
    pub fn new(
        params: ChainParams,
        bedrock: SummaryBlock,
        crypto: Arc<dyn CryptoProvider>,
        fetcher: Arc<dyn BlockFetcher>,
    ) -> Self {
        ChainManager {
            index: ChainIndex::new(),
            bedrock,
            tokens: TokenRegistry::new(),
            params,
            crypto,
            fetcher,
        }
    }

    pub fn bedrock(&self) -> &SummaryBlock {
        &self.bedrock
    }

    pub fn index(&self) -> &ChainIndex {
        &self.index
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn crypto(&self) -> &dyn CryptoProvider {
        self.crypto.as_ref()
    }

    /// Interned instance of `canonical` from this ledger's registry.
    pub fn token(&mut self, canonical: &str) -> Token {
        self.tokens.intern(canonical)
    }

    /// Trusted owner of `token` as of bedrock.
    pub fn owner_of(&self, token: &Token) -> Option<&Identity> {
        self.bedrock.owner_of(token)
    }

    /// Decodes and admits a block received from the network.
    ///
    /// `Err` only signals a configuration problem (difficulty larger than the
    /// digest) or an internal encoding failure; every rejection of the block
    /// itself is reported through [`BlockStatus`].
    pub fn receive_block(&mut self, bytes: &[u8]) -> Result<BlockStatus, ChainError> {
        let block = match Block::from_bytes(bytes) {
            Ok(block) => block,
            Err(e) => {
                warn!("Discarding malformed block ({} bytes): {}", bytes.len(), e);
                return Ok(BlockStatus::Invalid);
            }
        };
        self.admit_block(block)
    }

    /// Admission pipeline for an already decoded block.
    pub fn admit_block(&mut self, mut block: Block) -> Result<BlockStatus, ChainError> {
        let hash = block.compute_hash(self.crypto.as_ref())?.to_vec();
        // Any answer settles an outstanding request, whatever its status.
        self.fetcher.block_arrived(&hash);

        if block.block_number <= self.bedrock.block_number {
            debug!(
                "Block {} is at or below bedrock {}",
                block.block_number, self.bedrock.block_number
            );
            return Ok(BlockStatus::TooOld);
        }

        if self.index.find_duplicate(&block, &hash).is_some() {
            return Ok(BlockStatus::AlreadyKnown);
        }

        if !block.check_valid(self.crypto.as_ref(), self.params.zero_criteria)? {
            debug!("Rejecting invalid block {} ({})", block.block_number, hex::encode(&hash));
            return Ok(BlockStatus::Invalid);
        }

        block.intern_tokens(&mut self.tokens);
        let block_number = block.block_number;
        let previous_hash = block.previous_hash.clone().unwrap_or_default();
        let id = self.index.insert(block, hash.clone());

        if !self.has_parent(id)? {
            debug!(
                "Block {} ({}) has unknown parent {}, requesting it",
                block_number,
                hex::encode(&hash),
                hex::encode(&previous_hash)
            );
            self.fetcher.request_block(&previous_hash);
            return Ok(BlockStatus::Unverifiable);
        }

        let ownership = self.check_valid_ownership(id, |index, invalid| {
            index.delete_chain(invalid);
        })?;
        let rejected = ownership == BlockStatus::Invalid && !self.index.contains(id);

        if block_number.saturating_sub(self.bedrock.block_number) > self.params.trust {
            let report = self.prune_data();
            debug!("Pruning after block {}: {:?}", block_number, report);
        }

        if rejected {
            Ok(BlockStatus::Invalid)
        } else {
            Ok(BlockStatus::Received)
        }
    }

    /// The parent is either bedrock itself or a retained block one height down.
    fn has_parent(&self, id: BlockId) -> Result<bool, ChainError> {
        let stored = self.index.get(id).ok_or(ChainError::UnknownBlock(id.raw()))?;
        if stored.block_number() == self.bedrock.block_number + 1 {
            return Ok(self.bedrock.is_continued_by(&stored.block));
        }
        Ok(self.index.prev_of(id)?.is_some())
    }

    /// Replays ownership from bedrock through `id` and then over every retained descendant.
    ///
    /// Returns `Unverifiable` when the retained ancestry of `id` does not
    /// reach bedrock. Each block that fails to apply, ancestor or
    /// descendant, is handed to `on_invalid` and its own descendants are not
    /// visited; the result is then `Invalid`. Otherwise `Valid`.
    pub fn check_valid_ownership<F>(&mut self, id: BlockId, mut on_invalid: F) -> Result<BlockStatus, ChainError>
    where
        F: FnMut(&mut ChainIndex, BlockId),
    {
        let Some(ancestors) = self.ancestry(id)? else {
            return Ok(BlockStatus::Unverifiable);
        };

        let mut summary = self.bedrock.clone();
        for ancestor in ancestors {
            let stored = self.index.get(ancestor).ok_or(ChainError::UnknownBlock(ancestor.raw()))?;
            summary = match summary.apply_block(&stored.block, &stored.hash, &self.params.trusted_issuer) {
                Ok(next) => next,
                Err(e) => {
                    warn!(
                        "Ancestor {} ({}) violates ownership: {}",
                        stored.block_number(),
                        hex::encode(&stored.hash),
                        e
                    );
                    on_invalid(&mut self.index, ancestor);
                    return Ok(BlockStatus::Invalid);
                }
            };
        }

        let mut status = BlockStatus::Valid;
        let mut work = vec![(id, summary)];
        while let Some((cursor, summary)) = work.pop() {
            let Some(stored) = self.index.get(cursor) else {
                continue;
            };
            match summary.apply_block(&stored.block, &stored.hash, &self.params.trusted_issuer) {
                Ok(next) => {
                    for child in self.index.children_of(cursor)? {
                        work.push((child, next.clone()));
                    }
                }
                Err(e) => {
                    warn!(
                        "Ownership check failed at block {} ({}): {}",
                        stored.block_number(),
                        hex::encode(&stored.hash),
                        e
                    );
                    on_invalid(&mut self.index, cursor);
                    status = BlockStatus::Invalid;
                }
            }
        }
        Ok(status)
    }

    /// Retained ancestors of `id`, oldest first, starting at bedrock + 1 and excluding `id`.
    ///
    /// `None` when the line is broken or does not attach to bedrock.
    fn ancestry(&self, id: BlockId) -> Result<Option<Vec<BlockId>>, ChainError> {
        let mut ancestors = Vec::new();
        let mut cursor = id;
        loop {
            let stored = self.index.get(cursor).ok_or(ChainError::UnknownBlock(cursor.raw()))?;
            if stored.block_number() <= self.bedrock.block_number + 1 {
                if !self.bedrock.is_continued_by(&stored.block) {
                    warn!(
                        "Chain through block {} does not connect to bedrock {}",
                        stored.block_number(),
                        self.bedrock.block_number
                    );
                    return Ok(None);
                }
                break;
            }
            match self.index.prev_of(cursor)? {
                Some(parent) => {
                    ancestors.push(parent);
                    cursor = parent;
                }
                None => {
                    warn!("Broken chain below block {}", stored.block_number());
                    return Ok(None);
                }
            }
        }
        ancestors.reverse();
        Ok(Some(ancestors))
    }

    /// Ledger state as of `id`'s parent, replayed from bedrock.
    ///
    /// `None` when the ancestry is broken, does not attach to bedrock, or
    /// contains an ownership violation.
    fn summary_before(&self, id: BlockId) -> Result<Option<SummaryBlock>, ChainError> {
        let Some(ancestors) = self.ancestry(id)? else {
            return Ok(None);
        };

        let mut summary = self.bedrock.clone();
        for ancestor in ancestors {
            let stored = self.index.get(ancestor).ok_or(ChainError::UnknownBlock(ancestor.raw()))?;
            summary = match summary.apply_block(&stored.block, &stored.hash, &self.params.trusted_issuer) {
                Ok(next) => next,
                Err(e) => {
                    warn!("Ancestor {} is not a valid continuation: {}", stored.block_number(), e);
                    return Ok(None);
                }
            };
        }
        Ok(Some(summary))
    }

    /// Ledger state including the retained block with `hash`.
    pub fn summary_through(&self, hash: &[u8]) -> Result<Option<SummaryBlock>, ChainError> {
        let Some(id) = self.index.find_by_hash(hash) else {
            return Ok(None);
        };
        let Some(summary) = self.summary_before(id)? else {
            return Ok(None);
        };
        let stored = self.index.get(id).ok_or(ChainError::UnknownBlock(id.raw()))?;
        Ok(summary
            .apply_block(&stored.block, &stored.hash, &self.params.trusted_issuer)
            .ok())
    }

    pub fn get_block(&self, hash: &[u8]) -> Option<&Block> {
        self.index
            .find_by_hash(hash)
            .and_then(|id| self.index.get(id))
            .map(|stored| &stored.block)
    }

    /// Drops a single retained block. Returns whether it was present.
    pub fn remove_block(&mut self, hash: &[u8]) -> bool {
        match self.index.find_by_hash(hash) {
            Some(id) => self.index.remove(id).is_some(),
            None => false,
        }
    }

    /// Bedrock plus every retained block in height order.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, ChainError> {
        let blocks = self
            .index
            .iter()
            .map(|(_, stored)| stored.block.to_bytes())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LedgerSnapshot {
            bedrock: self.bedrock.clone(),
            blocks,
        })
    }

    /// Replaces all state with `snapshot`, re-admitting its blocks in order.
    ///
    /// The new state is built on the side; on `Err` this manager is unchanged.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) -> Result<Vec<BlockStatus>, ChainError> {
        let mut restored = ChainManager::new(
            self.params.clone(),
            snapshot.bedrock,
            Arc::clone(&self.crypto),
            Arc::clone(&self.fetcher),
        );
        let statuses = snapshot
            .blocks
            .iter()
            .map(|bytes| restored.receive_block(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        *self = restored;
        info!(
            "Restored bedrock {} with {} retained blocks",
            self.bedrock.block_number,
            self.index.len()
        );
        Ok(statuses)
    }
}
