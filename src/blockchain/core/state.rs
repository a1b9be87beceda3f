use crate::blockchain::core::chain::{Block, BlockHash};
use crate::crypto::Identity;
use crate::error::ChainError;
use crate::token::Token;
use std::collections::BTreeMap;

/// Token ownership as of the block identified by `(block_number, hash)`.
///
/// `Clone` yields an independent ownership map, so speculative replays on a
/// clone never leak into the original.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SummaryBlock {
    pub block_number: u64,
    #[serde(with = "serde_bytes")]
    pub hash: BlockHash,
    pub ownership: BTreeMap<Token, Identity>,
}

impl SummaryBlock {
    /// Empty ledger anchored at height 0.
    pub fn genesis(hash: BlockHash) -> Self {
        SummaryBlock {
            block_number: 0,
            hash,
            ownership: BTreeMap::new(),
        }
    }

    pub fn owner_of(&self, token: &Token) -> Option<&Identity> {
        self.ownership.get(token)
    }

    /// True when `block` sits directly on top of this summary.
    pub fn is_continued_by(&self, block: &Block) -> bool {
        block.block_number == self.block_number + 1 && block.extends(&self.hash)
    }

    /// Replays `block`'s entries on top of this summary.
    ///
    /// All-or-nothing: the first illegal transfer aborts and `self` is
    /// consumed without producing a successor state. A transfer is legal when
    /// the source owns the token, or the token is unassigned and the source
    /// is `trusted_issuer`.
    pub fn apply_block(
        mut self,
        block: &Block,
        block_hash: &[u8],
        trusted_issuer: &Identity,
    ) -> Result<SummaryBlock, ChainError> {
        if !self.is_continued_by(block) {
            return Err(ChainError::NotAContinuation {
                number: block.block_number,
                summary_number: self.block_number,
            });
        }

        for entry in block.entries() {
            let authorized = match self.ownership.get(&entry.token) {
                Some(owner) => *owner == entry.source,
                None => entry.source == *trusted_issuer,
            };
            if !authorized {
                return Err(ChainError::UnauthorizedTransfer {
                    token: entry.token.to_string(),
                    source_identity: entry.source.to_string(),
                });
            }
            self.ownership.insert(entry.token.clone(), entry.destination.clone());
        }

        self.block_number += 1;
        self.hash = block_hash.to_vec();
        Ok(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
