//! Layout Planner
//!
//! Computes the region partition of a new volume.

use crate::config::{DirectorySizing, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::error::{Result, VolumeError};

use super::{directory_capacity, table_capacity, Volume, HEADER_BLOCKS, MIN_TOTAL_BLOCKS};

/// Plan a volume with the default directory sizing
pub fn plan(total_space: u64, block_size: u32) -> Result<Volume> {
    plan_with_sizing(total_space, block_size, DirectorySizing::PerRemainingBlock)
}

/// Plan a volume of `total_space / block_size` blocks.
///
/// Region order is fixed: header, table, directory, data. The table gets
/// one entry per block after the header; the directory is sized by
/// `sizing`. Fails with `Configuration` if fewer than one data block
/// would remain.
pub fn plan_with_sizing(
    total_space: u64,
    block_size: u32,
    sizing: DirectorySizing,
) -> Result<Volume> {
    if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(VolumeError::Configuration(format!(
            "block size {} outside [{}, {}]",
            block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
        )));
    }

    let total_blocks = total_space / block_size as u64;
    if total_blocks < MIN_TOTAL_BLOCKS {
        return Err(VolumeError::Configuration(format!(
            "{} bytes give {} blocks of {} bytes, need at least {}",
            total_space, total_blocks, block_size, MIN_TOTAL_BLOCKS
        )));
    }
    if total_blocks > i32::MAX as u64 {
        return Err(VolumeError::Configuration(format!(
            "{} blocks exceed the allocation table range",
            total_blocks
        )));
    }
    let total_blocks = total_blocks as u32;

    let after_header = total_blocks - HEADER_BLOCKS;
    let fat_blocks = after_header.div_ceil(table_capacity(block_size) as u32);

    let remaining = after_header - fat_blocks;
    let dir_capacity = directory_capacity(block_size) as u32;
    let root_blocks = match sizing {
        DirectorySizing::PerRemainingBlock => remaining.div_ceil(dir_capacity),
        DirectorySizing::Entries(0) => {
            return Err(VolumeError::Configuration(
                "directory must hold at least one entry".to_string(),
            ))
        }
        DirectorySizing::Entries(count) => count.div_ceil(dir_capacity),
    };

    if root_blocks >= remaining {
        return Err(VolumeError::Configuration(format!(
            "{} directory blocks leave no data blocks in a {}-block volume",
            root_blocks, total_blocks
        )));
    }

    let address_fat = HEADER_BLOCKS;
    let address_root = address_fat + fat_blocks;
    let address_data = address_root + root_blocks;

    let volume = Volume {
        block_size,
        total_space,
        total_blocks,
        address_fat,
        address_root,
        address_data,
    };

    tracing::debug!(
        total_blocks,
        fat_blocks,
        root_blocks,
        data_blocks = volume.data_blocks(),
        "planned volume layout"
    );

    Ok(volume)
}
