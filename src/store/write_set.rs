//! Staged block writes
//!
//! [`WriteSet`] is the batch handed to `BlockStore::apply`; [`Transaction`]
//! builds one as a copy-on-write overlay over the committed blocks.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::layout::Volume;

use super::BlockStore;

/// Block writes staged by one logical operation, keyed by absolute block index
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSet {
    blocks: BTreeMap<usize, Vec<u8>>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a full block, replacing any earlier staged contents
    pub fn stage(&mut self, index: usize, block: Vec<u8>) {
        self.blocks.insert(index, block);
    }

    /// Staged contents of a block, if any
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.blocks.get(&index).map(|b| b.as_slice())
    }

    /// Number of staged blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Staged block indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.keys().copied()
    }

    pub(super) fn into_blocks(self) -> BTreeMap<usize, Vec<u8>> {
        self.blocks
    }
}

/// Read-your-writes view of a store while an operation is being staged.
///
/// Nothing here touches the store; dropping a transaction discards it.
pub struct Transaction<'a> {
    store: &'a BlockStore,
    writes: WriteSet,
}

impl<'a> Transaction<'a> {
    pub fn new(store: &'a BlockStore) -> Self {
        Self {
            store,
            writes: WriteSet::new(),
        }
    }

    pub fn volume(&self) -> &Volume {
        self.store.volume()
    }

    /// Read a block: staged contents if present, else committed
    pub fn read(&self, index: usize) -> Result<&[u8]> {
        match self.writes.blocks.get(&index) {
            Some(block) => Ok(block),
            None => self.store.read(index),
        }
    }

    /// Mutable view of a block, copying the committed contents on first touch
    pub fn block_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        let block = match self.writes.blocks.entry(index) {
            Entry::Occupied(staged) => staged.into_mut(),
            Entry::Vacant(slot) => slot.insert(self.store.read(index)?.to_vec()),
        };
        Ok(block.as_mut_slice())
    }

    /// Stage a whole block
    pub fn stage(&mut self, index: usize, block: Vec<u8>) {
        self.writes.stage(index, block);
    }

    pub fn writes(&self) -> &WriteSet {
        &self.writes
    }

    /// Finish staging; the result goes to `BlockStore::apply`
    pub fn into_writes(self) -> WriteSet {
        self.writes
    }
}
