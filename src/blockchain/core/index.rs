//! Forest of candidate blocks keyed by height
//!
//! Blocks live in an arena addressed by [`BlockId`]; each height keeps its
//! candidates in arrival order, which makes every "first match" lookup and
//! fork tie-break deterministic. Handles are never reused, so a stale
//! [`BlockId`] is reported as [`ChainError::UnknownBlock`] rather than
//! silently aliasing another block.

use crate::blockchain::core::chain::{Block, BlockHash};
use crate::error::ChainError;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A retained block with its hash computed at admission.
#[derive(Debug, Clone)]
pub struct StoredBlock {
    pub block: Block,
    pub hash: BlockHash,
}

impl StoredBlock {
    pub fn block_number(&self) -> u64 {
        self.block.block_number
    }
}

#[derive(Debug, Default)]
pub struct ChainIndex {
    slots: HashMap<BlockId, StoredBlock>,
    heights: BTreeMap<u64, Vec<BlockId>>,
    next_id: u64,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: Block, hash: BlockHash) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.heights.entry(block.block_number).or_default().push(id);
        self.slots.insert(id, StoredBlock { block, hash });
        id
    }

    pub fn get(&self, id: BlockId) -> Option<&StoredBlock> {
        self.slots.get(&id)
    }

    fn stored(&self, id: BlockId) -> Result<&StoredBlock, ChainError> {
        self.slots.get(&id).ok_or(ChainError::UnknownBlock(id.0))
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Candidates at `height` in arrival order.
    pub fn candidates(&self, height: u64) -> &[BlockId] {
        self.heights.get(&height).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_by_hash(&self, hash: &[u8]) -> Option<BlockId> {
        self.heights
            .values()
            .flatten()
            .copied()
            .find(|id| self.slots.get(id).is_some_and(|s| s.hash == hash))
    }

    /// An already-retained block with the same hash and the same content.
    pub fn find_duplicate(&self, block: &Block, hash: &[u8]) -> Option<BlockId> {
        self.candidates(block.block_number).iter().copied().find(|id| {
            self.slots
                .get(id)
                .is_some_and(|s| s.hash == hash && s.block.same_content(block))
        })
    }

    /// The block at the previous height whose hash is `id`'s `previous_hash`.
    pub fn prev_of(&self, id: BlockId) -> Result<Option<BlockId>, ChainError> {
        let stored = self.stored(id)?;
        let Some(row) = stored.block_number().checked_sub(1) else {
            return Ok(None);
        };
        Ok(self
            .candidates(row)
            .iter()
            .copied()
            .find(|candidate| self.slots.get(candidate).is_some_and(|s| stored.block.extends(&s.hash))))
    }

    /// The first block at the next height that extends `id`.
    pub fn next_of(&self, id: BlockId) -> Result<Option<BlockId>, ChainError> {
        Ok(self.children_of(id)?.into_iter().next())
    }

    /// Every block at the next height that extends `id`, in arrival order.
    pub fn children_of(&self, id: BlockId) -> Result<Vec<BlockId>, ChainError> {
        let stored = self.stored(id)?;
        Ok(self
            .candidates(stored.block_number() + 1)
            .iter()
            .copied()
            .filter(|candidate| self.slots.get(candidate).is_some_and(|s| s.block.extends(&stored.hash)))
            .collect())
    }

    /// The linear chain starting at `start`, following first-child links.
    pub fn chain_from(&self, start: BlockId) -> Result<Vec<BlockId>, ChainError> {
        self.stored(start)?;
        let mut chain = vec![start];
        let mut cursor = start;
        while let Some(next) = self.next_of(cursor)? {
            chain.push(next);
            cursor = next;
        }
        Ok(chain)
    }

    /// Number of blocks on the longest descending run from `start`, `start` included.
    pub fn longest_run(&self, start: BlockId) -> Result<u64, ChainError> {
        self.stored(start)?;
        let mut work = vec![(start, 1u64)];
        let mut longest = 0;
        while let Some((id, depth)) = work.pop() {
            longest = longest.max(depth);
            for child in self.children_of(id)? {
                work.push((child, depth + 1));
            }
        }
        Ok(longest)
    }

    /// The retained ancestry ending at `end`, oldest first.
    pub fn chain_to(&self, end: BlockId) -> Result<Vec<BlockId>, ChainError> {
        self.stored(end)?;
        let mut chain = vec![end];
        let mut cursor = end;
        while let Some(prev) = self.prev_of(cursor)? {
            chain.push(prev);
            cursor = prev;
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn remove(&mut self, id: BlockId) -> Option<StoredBlock> {
        let stored = self.slots.remove(&id)?;
        let height = stored.block_number();
        if let Some(row) = self.heights.get_mut(&height) {
            row.retain(|candidate| *candidate != id);
            if row.is_empty() {
                self.heights.remove(&height);
            }
        }
        Some(stored)
    }

    /// Removes `start` and its whole descendant subtree. Returns the number of blocks removed.
    pub fn delete_chain(&mut self, start: BlockId) -> usize {
        let mut work = vec![start];
        let mut removed = 0;
        while let Some(id) = work.pop() {
            if let Ok(children) = self.children_of(id) {
                work.extend(children);
            }
            if self.remove(id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Drops every candidate at `height`. Returns the number of blocks removed.
    pub fn remove_height(&mut self, height: u64) -> usize {
        let ids = self.heights.remove(&height).unwrap_or_default();
        for id in &ids {
            self.slots.remove(id);
        }
        ids.len()
    }

    /// Drops every height strictly below `height`. Returns the number of heights removed.
    pub fn remove_below(&mut self, height: u64) -> usize {
        let stale: Vec<u64> = self.heights.range(..height).map(|(h, _)| *h).collect();
        for h in &stale {
            self.remove_height(*h);
        }
        stale.len()
    }

    pub fn heights(&self) -> impl Iterator<Item = u64> + '_ {
        self.heights.keys().copied()
    }

    pub fn highest(&self) -> Option<u64> {
        self.heights.keys().next_back().copied()
    }

    /// All retained blocks ordered by height, then arrival.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &StoredBlock)> + '_ {
        self.heights
            .values()
            .flatten()
            .filter_map(|id| self.slots.get(id).map(|s| (*id, s)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64, parent: &[u8], tag: u8) -> (Block, BlockHash) {
        let block = Block::new(number, parent.to_vec(), vec![], vec![tag]);
        let hash = vec![number as u8, tag];
        (block, hash)
    }

    fn push(index: &mut ChainIndex, number: u64, parent: &[u8], tag: u8) -> (BlockId, BlockHash) {
        let (block, hash) = block(number, parent, tag);
        let id = index.insert(block, hash.clone());
        (id, hash)
    }

    #[test]
    fn test_prev_and_next_links() {
        let mut index = ChainIndex::new();
        let (a, ha) = push(&mut index, 1, &[0], 0);
        let (b, _) = push(&mut index, 2, &ha, 0);

        assert_eq!(index.prev_of(b).unwrap(), Some(a));
        assert_eq!(index.next_of(a).unwrap(), Some(b));
        assert_eq!(index.prev_of(a).unwrap(), None);
        assert_eq!(index.next_of(b).unwrap(), None);
    }

    #[test]
    fn test_stale_handle_is_an_error() {
        let mut index = ChainIndex::new();
        let (a, _) = push(&mut index, 1, &[0], 0);
        index.remove(a);

        assert!(matches!(index.prev_of(a), Err(ChainError::UnknownBlock(_))));
        assert!(matches!(index.next_of(a), Err(ChainError::UnknownBlock(_))));
    }

    #[test]
    fn test_chain_from_and_to() {
        let mut index = ChainIndex::new();
        let (a, ha) = push(&mut index, 1, &[0], 0);
        let (b, hb) = push(&mut index, 2, &ha, 0);
        let (c, _) = push(&mut index, 3, &hb, 0);

        assert_eq!(index.chain_from(a).unwrap(), vec![a, b, c]);
        assert_eq!(index.chain_to(c).unwrap(), vec![a, b, c]);
        assert_eq!(index.chain_from(b).unwrap(), vec![b, c]);
    }

    #[test]
    fn test_delete_chain_removes_whole_subtree() {
        let mut index = ChainIndex::new();
        let (a, ha) = push(&mut index, 1, &[0], 0);
        let (_b1, hb1) = push(&mut index, 2, &ha, 1);
        let (_b2, _) = push(&mut index, 2, &ha, 2);
        let (_c, _) = push(&mut index, 3, &hb1, 0);
        let (other, _) = push(&mut index, 1, &[0], 9);

        assert_eq!(index.delete_chain(a), 4);
        assert_eq!(index.len(), 1);
        assert!(index.contains(other));
        assert!(index.candidates(2).is_empty());
    }

    #[test]
    fn test_longest_run_looks_past_first_child() {
        let mut index = ChainIndex::new();
        let (a, ha) = push(&mut index, 1, &[0], 0);
        let (_dead_end, _) = push(&mut index, 2, &ha, 1);
        let (_, hb) = push(&mut index, 2, &ha, 2);
        let (_, hc) = push(&mut index, 3, &hb, 2);
        push(&mut index, 4, &hc, 2);

        assert_eq!(index.chain_from(a).unwrap().len(), 2);
        assert_eq!(index.longest_run(a).unwrap(), 4);
    }

    #[test]
    fn test_remove_below_trims_tail() {
        let mut index = ChainIndex::new();
        let (_, h1) = push(&mut index, 1, &[0], 0);
        let (_, h2) = push(&mut index, 2, &h1, 0);
        let (c, _) = push(&mut index, 3, &h2, 0);

        assert_eq!(index.remove_below(3), 2);
        assert_eq!(index.heights().collect::<Vec<_>>(), vec![3]);
        assert!(index.contains(c));
    }

    #[test]
    fn test_duplicate_requires_matching_content() {
        let mut index = ChainIndex::new();
        let (original, hash) = block(1, &[0], 0);
        let id = index.insert(original.clone(), hash.clone());

        assert_eq!(index.find_duplicate(&original, &hash), Some(id));
        let (different, _) = block(1, &[0], 1);
        assert_eq!(index.find_duplicate(&different, &hash), None);
        assert_eq!(index.find_by_hash(&hash), Some(id));
    }

    #[test]
    fn test_candidates_keep_arrival_order() {
        let mut index = ChainIndex::new();
        let (first, _) = push(&mut index, 1, &[0], 5);
        let (second, _) = push(&mut index, 1, &[0], 3);
        assert_eq!(index.candidates(1), &[first, second]);
        assert_eq!(index.highest(), Some(1));
    }
}
