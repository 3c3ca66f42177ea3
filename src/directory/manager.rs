//! Directory Manager
//!
//! Linear scans over the directory region; no index is kept.

use crate::error::{Result, VolumeError};
use crate::layout::{Volume, DIRECTORY_ENTRY_WIDTH, NAME_FIELD_WIDTH, POINTER_WIDTH};
use crate::store::Transaction;

use super::{validate_name, DirEntry, MAX_NAME_LEN};

/// Location of an occupied slot
struct SlotRef {
    block: usize,
    slot: usize,
    first_block: u32,
}

/// Manages the directory region of one volume
#[derive(Debug, Clone, Copy)]
pub struct Directory {
    volume: Volume,
}

impl Directory {
    pub fn new(volume: Volume) -> Self {
        Self { volume }
    }

    /// Entries across all directory blocks
    pub fn capacity(&self) -> usize {
        self.volume.directory_limit()
    }

    /// Stage every directory block as empty
    pub fn format(&self, txn: &mut Transaction<'_>) {
        for block in self.blocks() {
            txn.stage(block, vec![0u8; self.volume.block_size()]);
        }
    }

    /// Whether `name` is present in any directory block
    pub fn exists(&self, txn: &Transaction<'_>, name: &str) -> Result<bool> {
        Ok(self.find(txn, name)?.is_some())
    }

    /// First block of `name`'s chain
    pub fn lookup(&self, txn: &Transaction<'_>, name: &str) -> Result<u32> {
        self.find(txn, name)?
            .map(|found| found.first_block)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    /// Add `name -> first_block`.
    ///
    /// Uniqueness is checked against the whole directory before the first
    /// block with a free slot is chosen.
    pub fn insert(&self, txn: &mut Transaction<'_>, name: &str, first_block: u32) -> Result<()> {
        validate_name(name)?;
        if self.exists(txn, name)? {
            return Err(VolumeError::AlreadyExists(name.to_string()));
        }

        // The first empty slot in scan order lies in the first block with room.
        let (block, slot) = self
            .first_empty_slot(txn)?
            .ok_or_else(|| VolumeError::DirectoryFull {
                capacity: self.capacity(),
            })?;

        write_slot(txn.block_mut(block)?, slot, name, first_block);
        tracing::debug!(name, first_block, block, slot, "directory insert");
        Ok(())
    }

    /// Delete `name`, returning the chain head it pointed to
    pub fn remove(&self, txn: &mut Transaction<'_>, name: &str) -> Result<u32> {
        let found = self
            .find(txn, name)?
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;

        let offset = found.slot * DIRECTORY_ENTRY_WIDTH;
        txn.block_mut(found.block)?[offset..offset + DIRECTORY_ENTRY_WIDTH].fill(0);
        tracing::debug!(name, first_block = found.first_block, "directory remove");
        Ok(found.first_block)
    }

    /// Rename `old` to `new` in place. An existing `new` is never overwritten.
    pub fn rename(&self, txn: &mut Transaction<'_>, old: &str, new: &str) -> Result<()> {
        let found = self
            .find(txn, old)?
            .ok_or_else(|| VolumeError::NotFound(old.to_string()))?;

        validate_name(new)?;
        if self.exists(txn, new)? {
            return Err(VolumeError::AlreadyExists(new.to_string()));
        }

        write_slot(txn.block_mut(found.block)?, found.slot, new, found.first_block);
        tracing::debug!(old, new, "directory rename");
        Ok(())
    }

    /// All entries in block scan order
    pub fn entries(&self, txn: &Transaction<'_>) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for block in self.blocks() {
            let bytes = txn.read(block)?;
            for slot in 0..self.volume.directory_capacity() {
                if let Some(entry) = decode_slot(bytes, slot)? {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    /// All names in block scan order
    pub fn list(&self, txn: &Transaction<'_>) -> Result<Vec<String>> {
        Ok(self.entries(txn)?.into_iter().map(|e| e.name).collect())
    }

    /// Number of occupied slots
    pub fn len(&self, txn: &Transaction<'_>) -> Result<usize> {
        let mut count = 0;
        for block in self.blocks() {
            let bytes = txn.read(block)?;
            count += (0..self.volume.directory_capacity())
                .filter(|&slot| !slot_is_empty(bytes, slot))
                .count();
        }
        Ok(count)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn blocks(&self) -> std::ops::Range<usize> {
        self.volume.address_root as usize..self.volume.address_data as usize
    }

    fn find(&self, txn: &Transaction<'_>, name: &str) -> Result<Option<SlotRef>> {
        // Names that cannot be stored cannot be present either.
        let field = match name_field(name) {
            Some(field) => field,
            None => return Ok(None),
        };

        for block in self.blocks() {
            let bytes = txn.read(block)?;
            for slot in 0..self.volume.directory_capacity() {
                let offset = slot * DIRECTORY_ENTRY_WIDTH;
                if bytes[offset..offset + NAME_FIELD_WIDTH] == field {
                    return Ok(Some(SlotRef {
                        block,
                        slot,
                        first_block: read_pointer(bytes, slot),
                    }));
                }
            }
        }
        Ok(None)
    }

    fn first_empty_slot(&self, txn: &Transaction<'_>) -> Result<Option<(usize, usize)>> {
        for block in self.blocks() {
            let bytes = txn.read(block)?;
            if let Some(slot) =
                (0..self.volume.directory_capacity()).find(|&slot| slot_is_empty(bytes, slot))
            {
                return Ok(Some((block, slot)));
            }
        }
        Ok(None)
    }
}

/// Zero-padded name field, or `None` if the name cannot be stored
fn name_field(name: &str) -> Option<[u8; NAME_FIELD_WIDTH]> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.bytes().any(|b| b == 0) {
        return None;
    }
    let mut field = [0u8; NAME_FIELD_WIDTH];
    field[..name.len()].copy_from_slice(name.as_bytes());
    Some(field)
}

fn slot_is_empty(block: &[u8], slot: usize) -> bool {
    block[slot * DIRECTORY_ENTRY_WIDTH] == 0
}

fn read_pointer(block: &[u8], slot: usize) -> u32 {
    let offset = slot * DIRECTORY_ENTRY_WIDTH + NAME_FIELD_WIDTH;
    let mut raw = [0u8; POINTER_WIDTH];
    raw.copy_from_slice(&block[offset..offset + POINTER_WIDTH]);
    u32::from_le_bytes(raw)
}

fn write_slot(block: &mut [u8], slot: usize, name: &str, first_block: u32) {
    let offset = slot * DIRECTORY_ENTRY_WIDTH;
    let entry = &mut block[offset..offset + DIRECTORY_ENTRY_WIDTH];
    entry.fill(0);
    entry[..name.len()].copy_from_slice(name.as_bytes());
    entry[NAME_FIELD_WIDTH..].copy_from_slice(&first_block.to_le_bytes());
}

fn decode_slot(block: &[u8], slot: usize) -> Result<Option<DirEntry>> {
    if slot_is_empty(block, slot) {
        return Ok(None);
    }
    let offset = slot * DIRECTORY_ENTRY_WIDTH;
    let field = &block[offset..offset + NAME_FIELD_WIDTH];
    let len = field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_WIDTH);
    let name = String::from_utf8(field[..len].to_vec()).map_err(|_| {
        VolumeError::CorruptImage(format!("directory slot {} holds a non UTF-8 name", slot))
    })?;
    Ok(Some(DirEntry {
        name,
        first_block: read_pointer(block, slot),
    }))
}
