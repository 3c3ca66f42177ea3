//! Layout Module
//!
//! Volume geometry: how an N-block image is partitioned into regions.
//!
//! ## Image Layout
//! ```text
//! ┌──────────┬───────────────────┬───────────────────┬──────────────────────┐
//! │ Header   │ Allocation Table  │ Directory         │ Data                 │
//! │ block 0  │ [fat, root)       │ [root, data)      │ [data, total_blocks) │
//! └──────────┴───────────────────┴───────────────────┴──────────────────────┘
//! ```
//!
//! Every region is a whole number of blocks. Per-block capacities of the
//! table and the directory are computed from fixed entry widths, so the
//! same `(total_space, block_size)` always yields the same layout.

mod header;
mod planner;

pub use header::{decode_header, encode_header, HEADER_RECORD_LEN, MAGIC, VERSION};
pub use planner::{plan, plan_with_sizing};

use crate::config::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::error::{Result, VolumeError};

// =============================================================================
// Shared Constants
// =============================================================================

/// Blocks reserved for the header record
pub const HEADER_BLOCKS: u32 = 1;

/// Width of one allocation table entry (i32, little endian)
pub const TABLE_ENTRY_WIDTH: usize = 4;

/// Width of the zero-padded name field of a directory entry
pub const NAME_FIELD_WIDTH: usize = 64;

/// Width of the first-block pointer of a directory entry
pub const POINTER_WIDTH: usize = 4;

/// Width of one directory entry: name field + pointer
pub const DIRECTORY_ENTRY_WIDTH: usize = NAME_FIELD_WIDTH + POINTER_WIDTH;

/// Header + one table block + one directory block + one data block
pub const MIN_TOTAL_BLOCKS: u64 = 4;

// =============================================================================
// Volume Geometry
// =============================================================================

/// Immutable geometry of a volume, recorded in the header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    /// Bytes per block
    pub block_size: u32,
    /// Requested volume size in bytes
    pub total_space: u64,
    /// Number of blocks in the image
    pub total_blocks: u32,
    /// First allocation table block
    pub address_fat: u32,
    /// First directory block
    pub address_root: u32,
    /// First data block
    pub address_data: u32,
}

impl Volume {
    /// The header always lives in block 0
    pub const ADDRESS_HEADER: u32 = 0;

    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks as usize
    }

    pub fn header_blocks(&self) -> usize {
        self.address_fat as usize
    }

    pub fn fat_blocks(&self) -> usize {
        (self.address_root - self.address_fat) as usize
    }

    pub fn root_blocks(&self) -> usize {
        (self.address_data - self.address_root) as usize
    }

    pub fn data_blocks(&self) -> usize {
        (self.total_blocks - self.address_data) as usize
    }

    /// Header, table and directory blocks together
    pub fn system_blocks(&self) -> usize {
        self.address_data as usize
    }

    /// Table entries per table block
    pub fn table_capacity(&self) -> usize {
        table_capacity(self.block_size)
    }

    /// Directory entries per directory block
    pub fn directory_capacity(&self) -> usize {
        directory_capacity(self.block_size)
    }

    /// Directory entries across the whole directory region
    pub fn directory_limit(&self) -> usize {
        self.root_blocks() * self.directory_capacity()
    }

    /// Image size in bytes
    pub fn image_len(&self) -> u64 {
        self.total_blocks as u64 * self.block_size as u64
    }

    /// Absolute block index of a data-region logical index
    pub fn data_block_address(&self, index: u32) -> usize {
        self.address_data as usize + index as usize
    }

    /// Table block holding the entry for `index`, and the slot inside it
    pub fn table_position(&self, index: u32) -> (usize, usize) {
        let capacity = self.table_capacity();
        let index = index as usize;
        (self.address_fat as usize + index / capacity, index % capacity)
    }

    /// Check the partition invariant and that every region can address
    /// what it must. Used before trusting any structure in a loaded image.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(VolumeError::CorruptImage(msg));

        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return corrupt(format!("block size {} out of range", self.block_size));
        }
        if self.total_blocks > i32::MAX as u32 {
            return corrupt(format!("{} blocks exceed table range", self.total_blocks));
        }
        if self.total_space / self.block_size as u64 != self.total_blocks as u64 {
            return corrupt(format!(
                "total space {} does not match {} blocks of {} bytes",
                self.total_space, self.total_blocks, self.block_size
            ));
        }
        if self.address_fat != HEADER_BLOCKS
            || self.address_fat >= self.address_root
            || self.address_root >= self.address_data
            || self.address_data >= self.total_blocks
        {
            return corrupt(format!(
                "bad region boundaries: fat={} root={} data={} total={}",
                self.address_fat, self.address_root, self.address_data, self.total_blocks
            ));
        }
        if self.fat_blocks() * self.table_capacity() < self.data_blocks() {
            return corrupt(format!(
                "{} table blocks cannot address {} data blocks",
                self.fat_blocks(),
                self.data_blocks()
            ));
        }
        Ok(())
    }
}

/// Table entries per block for a block size
pub fn table_capacity(block_size: u32) -> usize {
    block_size as usize / TABLE_ENTRY_WIDTH
}

/// Directory entries per block for a block size
pub fn directory_capacity(block_size: u32) -> usize {
    block_size as usize / DIRECTORY_ENTRY_WIDTH
}
