//! Fork resolution and history pruning
//!
//! Pruning first trims heights that fell below bedrock, then repeatedly tries
//! to promote the block directly above bedrock. A lone branch is trusted once
//! it is longer than `trust`; competing branches are settled once the longest
//! exceeds `fork_cut`. A branch is as long as the longest run of
//! descendants under it, whichever siblings arrived first. The survivor
//! count at bedrock + 1 decides which threshold applies, regardless of any
//! branching further up.

use crate::blockchain::core::index::BlockId;
use crate::blockchain::core::manager::ChainManager;
use tracing::{debug, error, info, warn};

/// Why a pruning round stopped advancing bedrock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneHalt {
    /// The best branch is not long enough yet.
    BelowThreshold,
    /// Nothing above bedrock links to it.
    Stuck,
    /// A pre-validated winner failed to apply to bedrock.
    Inconsistent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub trimmed_heights: usize,
    pub promoted: u64,
    pub deleted_blocks: usize,
    pub halt: PruneHalt,
}

impl PruneReport {
    pub fn advanced(&self) -> bool {
        self.promoted > 0
    }
}

impl ChainManager {
    pub fn prune_data(&mut self) -> PruneReport {
        let mut report = PruneReport {
            trimmed_heights: self.index.remove_below(self.bedrock.block_number),
            promoted: 0,
            deleted_blocks: 0,
            halt: PruneHalt::BelowThreshold,
        };

        loop {
            if let Some(halt) = self.advance_bedrock(&mut report) {
                report.halt = halt;
                break;
            }
        }

        if report.advanced() {
            info!(
                "Bedrock advanced by {} to height {} ({} blocks pruned)",
                report.promoted, self.bedrock.block_number, report.deleted_blocks
            );
        }
        report
    }

    /// One promotion step. `None` means bedrock moved up and the caller should try again.
    fn advance_bedrock(&mut self, report: &mut PruneReport) -> Option<PruneHalt> {
        let height = self.bedrock.block_number + 1;
        let candidates = self.index.candidates(height).to_vec();

        let mut survivors = Vec::with_capacity(candidates.len());
        let mut discarded = 0;
        for id in candidates {
            let linked = self
                .index
                .get(id)
                .is_some_and(|stored| stored.block.extends(&self.bedrock.hash));
            if linked {
                survivors.push(id);
            } else {
                discarded += self.index.delete_chain(id);
            }
        }
        report.deleted_blocks += discarded;

        if survivors.is_empty() {
            if discarded > 0 {
                warn!("No block at height {} links to bedrock", height);
            } else {
                debug!("No candidates above bedrock {}", self.bedrock.block_number);
            }
            return Some(PruneHalt::Stuck);
        }

        let (winner, length) = self.longest_branch(&survivors);
        let threshold = if survivors.len() > 1 {
            self.params.fork_cut
        } else {
            self.params.trust
        };
        if length <= threshold {
            return Some(PruneHalt::BelowThreshold);
        }

        let promoted = match self.index.get(winner) {
            Some(stored) => self
                .bedrock
                .clone()
                .apply_block(&stored.block, &stored.hash, &self.params.trusted_issuer),
            None => {
                error!("Winning block at height {} vanished from the index", height);
                return Some(PruneHalt::Inconsistent);
            }
        };
        let next_bedrock = match promoted {
            Ok(summary) => summary,
            Err(e) => {
                error!(
                    "Invalid data detected while promoting height {} to bedrock: {}",
                    height, e
                );
                return Some(PruneHalt::Inconsistent);
            }
        };

        for &loser in survivors.iter().filter(|&&id| id != winner) {
            report.deleted_blocks += self.index.delete_chain(loser);
        }
        self.index.remove(winner);
        self.index.remove_height(height);
        self.bedrock = next_bedrock;
        report.promoted += 1;
        None
    }

    /// The survivor with the longest descending run; ties go to the earliest arrival.
    fn longest_branch(&self, survivors: &[BlockId]) -> (BlockId, u64) {
        let mut best = (survivors[0], 0u64);
        for &id in survivors {
            let length = self.index.longest_run(id).unwrap_or(0);
            if length > best.1 {
                best = (id, length);
            }
        }
        best
    }
}
