//! Allocation Table Manager
//!
//! First-fit allocation and chain-walking deallocation over the table
//! region, staged through a `Transaction`.

use crate::error::{Result, VolumeError};
use crate::layout::{Volume, TABLE_ENTRY_WIDTH};
use crate::store::Transaction;

use super::{TableEntry, FREE};

/// Manages the allocation table of one volume
#[derive(Debug, Clone, Copy)]
pub struct AllocationTable {
    volume: Volume,
}

impl AllocationTable {
    pub fn new(volume: Volume) -> Self {
        Self { volume }
    }

    /// Number of data blocks (= valid entries)
    pub fn len(&self) -> usize {
        self.volume.data_blocks()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stage every table block as all-FREE
    pub fn format(&self, txn: &mut Transaction<'_>) {
        let free_block: Vec<u8> = FREE
            .to_le_bytes()
            .iter()
            .copied()
            .cycle()
            .take(self.volume.table_capacity() * TABLE_ENTRY_WIDTH)
            .chain(std::iter::repeat(0))
            .take(self.volume.block_size())
            .collect();

        let start = self.volume.address_fat as usize;
        for block in start..start + self.volume.fat_blocks() {
            txn.stage(block, free_block.clone());
        }
    }

    /// Read the entry for data block `index`
    pub fn entry(&self, txn: &Transaction<'_>, index: u32) -> Result<TableEntry> {
        self.check_index(index)?;
        let (block, slot) = self.volume.table_position(index);
        let raw = read_slot(txn.read(block)?, slot);
        TableEntry::from_raw(raw).ok_or_else(|| {
            VolumeError::CorruptImage(format!("invalid table entry {} for block {}", raw, index))
        })
    }

    /// Stage a new value for the entry of data block `index`
    pub fn set_entry(
        &self,
        txn: &mut Transaction<'_>,
        index: u32,
        entry: TableEntry,
    ) -> Result<()> {
        self.check_index(index)?;
        let (block, slot) = self.volume.table_position(index);
        let offset = slot * TABLE_ENTRY_WIDTH;
        txn.block_mut(block)?[offset..offset + TABLE_ENTRY_WIDTH]
            .copy_from_slice(&entry.to_raw().to_le_bytes());
        Ok(())
    }

    /// Allocate `count` blocks, first-fit in ascending index order, and link
    /// them into a chain.
    ///
    /// The scan is read-only; if fewer than `count` free entries exist the
    /// transaction is left untouched and `InsufficientSpace` is returned.
    pub fn allocate(&self, txn: &mut Transaction<'_>, count: usize) -> Result<Vec<u32>> {
        let chain = self.find_free(txn, count)?;
        if chain.len() < count {
            let available = self.count_free(txn)?;
            return Err(VolumeError::InsufficientSpace {
                needed: count,
                available,
            });
        }

        for (i, &index) in chain.iter().enumerate() {
            let entry = match chain.get(i + 1) {
                Some(&next) => TableEntry::Next(next),
                None => TableEntry::EndOfChain,
            };
            self.set_entry(txn, index, entry)?;
        }

        tracing::debug!(count, first = chain.first().copied(), "allocated chain");
        Ok(chain)
    }

    /// Free the chain starting at `first`, returning how many blocks it held.
    ///
    /// A chain that runs into a free entry, points outside the data region,
    /// or is longer than the data region is reported as `CorruptImage`.
    pub fn free(&self, txn: &mut Transaction<'_>, first: u32) -> Result<usize> {
        let mut current = first;
        let mut freed = 0;

        loop {
            if freed >= self.len() {
                return Err(VolumeError::CorruptImage(format!(
                    "chain from block {} does not terminate",
                    first
                )));
            }

            let next = match self.entry(txn, current)? {
                TableEntry::EndOfChain => None,
                TableEntry::Next(next) => Some(next),
                TableEntry::Free => {
                    return Err(VolumeError::CorruptImage(format!(
                        "chain from block {} reaches free block {}",
                        first, current
                    )))
                }
            };

            self.set_entry(txn, current, TableEntry::Free)?;
            freed += 1;

            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        tracing::debug!(first, freed, "freed chain");
        Ok(freed)
    }

    /// Every data block of the chain starting at `first`, in order
    pub fn chain(&self, txn: &Transaction<'_>, first: u32) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let mut current = first;

        loop {
            if chain.len() >= self.len() {
                return Err(VolumeError::CorruptImage(format!(
                    "chain from block {} does not terminate",
                    first
                )));
            }

            chain.push(current);
            match self.entry(txn, current)? {
                TableEntry::EndOfChain => return Ok(chain),
                TableEntry::Next(next) => current = next,
                TableEntry::Free => {
                    return Err(VolumeError::CorruptImage(format!(
                        "chain from block {} reaches free block {}",
                        first, current
                    )))
                }
            }
        }
    }

    /// Entries whose value is not FREE
    pub fn count_used(&self, txn: &Transaction<'_>) -> Result<usize> {
        Ok(self.len() - self.count_free(txn)?)
    }

    /// Entries whose value is FREE
    pub fn count_free(&self, txn: &Transaction<'_>) -> Result<usize> {
        let mut free = 0;
        self.scan(txn, |_, raw| {
            if raw == FREE {
                free += 1;
            }
            true
        })?;
        Ok(free)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Up to `count` free indices in ascending order
    fn find_free(&self, txn: &Transaction<'_>, count: usize) -> Result<Vec<u32>> {
        let mut found = Vec::with_capacity(count.min(self.len()));
        if count == 0 {
            return Ok(found);
        }
        self.scan(txn, |index, raw| {
            if raw == FREE {
                found.push(index);
            }
            found.len() < count
        })?;
        Ok(found)
    }

    /// Visit valid entries in ascending order until `visit` returns false
    fn scan<F>(&self, txn: &Transaction<'_>, mut visit: F) -> Result<()>
    where
        F: FnMut(u32, i32) -> bool,
    {
        let capacity = self.volume.table_capacity();
        let data_blocks = self.len();
        let start = self.volume.address_fat as usize;

        for (i, block) in (start..start + self.volume.fat_blocks()).enumerate() {
            let base = i * capacity;
            if base >= data_blocks {
                break;
            }
            let bytes = txn.read(block)?;
            let slots = capacity.min(data_blocks - base);
            for slot in 0..slots {
                if !visit((base + slot) as u32, read_slot(bytes, slot)) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index as usize >= self.len() {
            return Err(VolumeError::CorruptImage(format!(
                "block pointer {} outside data region of {} blocks",
                index,
                self.len()
            )));
        }
        Ok(())
    }
}

fn read_slot(block: &[u8], slot: usize) -> i32 {
    let offset = slot * TABLE_ENTRY_WIDTH;
    let mut raw = [0u8; TABLE_ENTRY_WIDTH];
    raw.copy_from_slice(&block[offset..offset + TABLE_ENTRY_WIDTH]);
    i32::from_le_bytes(raw)
}
