//! Ordered block collection for the open document.
//!
//! Three mutation sources feed one reconciliation policy:
//! - local edits (optimistic, in place)
//! - remote creations (inserted after the focused block, else appended)
//! - remote edits (full substitution; unknown ids are upserted like creations)
//!
//! The collection is keyed by block id, so at most one block per id exists.
//! Iteration order is document order and only changes through explicit
//! insertion or removal. None of these operations can fail: unknown ids and
//! duplicate deliveries are no-ops.

use indexmap::IndexMap;
use quill_core::{Block, BlockId};

/// Effect of one store operation, for the UI to reflect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// The whole collection was replaced
    Loaded { count: usize },
    /// A new block now sits at `index`
    Inserted { id: BlockId, index: usize },
    /// A remote edit substituted the block at `index`
    Replaced { id: BlockId, index: usize },
    /// A local edit changed the text of the block at `index`
    Updated { id: BlockId, index: usize },
    /// The block formerly at `index` is gone
    Removed { id: BlockId, index: usize },
    Unchanged,
}

impl StoreChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: IndexMap<BlockId, Block>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection, keeping the given order.
    ///
    /// If the input repeats an id, the first occurrence wins.
    pub fn load_initial(&mut self, blocks: impl IntoIterator<Item = Block>) -> StoreChange {
        self.blocks.clear();
        for block in blocks {
            self.blocks.entry(block.id).or_insert(block);
        }
        StoreChange::Loaded {
            count: self.blocks.len(),
        }
    }

    /// Optimistically set the text of a known block.
    pub fn apply_local_edit(&mut self, id: BlockId, text: impl Into<String>) -> StoreChange {
        match self.blocks.get_full_mut(&id) {
            Some((index, _, block)) => {
                block.text = text.into();
                StoreChange::Updated { id, index }
            }
            None => StoreChange::Unchanged,
        }
    }

    /// Insert a block created by any participant.
    ///
    /// Placed right after `focus` when that block is present, otherwise
    /// appended. A second delivery of the same id is ignored.
    pub fn apply_remote_create(&mut self, block: Block, focus: Option<BlockId>) -> StoreChange {
        let id = block.id;
        if self.blocks.contains_key(&id) {
            log::debug!("Ignoring duplicate block {id}");
            return StoreChange::Unchanged;
        }

        let index = focus
            .and_then(|focus_id| self.blocks.get_index_of(&focus_id))
            .map_or(self.blocks.len(), |focus_index| focus_index + 1);
        self.blocks.shift_insert(index, id, block);
        StoreChange::Inserted { id, index }
    }

    /// Substitute a block edited by any participant.
    ///
    /// An edit for an unknown id is treated as its creation, since delivery
    /// may reorder the two.
    pub fn apply_remote_edit(&mut self, block: Block, focus: Option<BlockId>) -> StoreChange {
        match self.blocks.get_full_mut(&block.id) {
            Some((index, _, existing)) => {
                let id = block.id;
                *existing = block;
                StoreChange::Replaced { id, index }
            }
            None => self.apply_remote_create(block, focus),
        }
    }

    pub fn apply_remote_delete(&mut self, id: BlockId) -> StoreChange {
        match self.blocks.shift_remove_full(&id) {
            Some((index, _, _)) => StoreChange::Removed { id, index },
            None => StoreChange::Unchanged,
        }
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.get_index_of(&id)
    }

    /// Blocks in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Block> {
        self.blocks.values().cloned().collect()
    }
}
