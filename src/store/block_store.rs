//! Block Store
//!
//! Whole-image load/save plus batched block writes.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{Result, VolumeError};
use crate::layout::{decode_header, Volume};

use super::{Transaction, WriteSet};

/// Every block of one volume, held in memory and mirrored to one host file
pub struct BlockStore {
    /// Host file backing the image
    path: PathBuf,
    /// Geometry read from (or written to) the header
    volume: Volume,
    /// `total_blocks` buffers of exactly `block_size` bytes
    blocks: Vec<Vec<u8>>,
    /// fsync policy for `save`
    sync_strategy: SyncStrategy,
}

impl BlockStore {
    /// Create a zero-filled in-memory image. Nothing is written until `apply`
    /// or `save`.
    pub fn new(path: &Path, volume: Volume, sync_strategy: SyncStrategy) -> Self {
        let blocks = vec![vec![0u8; volume.block_size()]; volume.total_blocks()];
        Self {
            path: path.to_path_buf(),
            volume,
            blocks,
            sync_strategy,
        }
    }

    /// Load an image from disk.
    ///
    /// The header is validated against the file's real length before any
    /// other block is trusted.
    pub fn load(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let image = fs::read(path)?;
        let volume = decode_header(&image)?;

        if image.len() as u64 != volume.image_len() {
            return Err(VolumeError::CorruptImage(format!(
                "image is {} bytes, header describes {} blocks of {} bytes",
                image.len(),
                volume.total_blocks,
                volume.block_size
            )));
        }

        let blocks = image
            .chunks_exact(volume.block_size())
            .map(|chunk| chunk.to_vec())
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            volume,
            blocks,
            sync_strategy,
        })
    }

    /// Write the full image to the host file
    pub fn save(&self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        for block in &self.blocks {
            writer.write_all(block)?;
        }
        writer.flush()?;

        if self.sync_strategy == SyncStrategy::Fsync {
            let file: File = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        Ok(())
    }

    /// Start staging an operation against the committed blocks
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Read a committed block
    pub fn read(&self, index: usize) -> Result<&[u8]> {
        self.blocks.get(index).map(|b| b.as_slice()).ok_or_else(|| {
            VolumeError::CorruptImage(format!(
                "block {} outside volume of {} blocks",
                index,
                self.blocks.len()
            ))
        })
    }

    /// Apply a batch of block writes, then persist the full image.
    ///
    /// The batch is checked up front, so either every block is replaced or
    /// none is. If persisting fails the in-memory blocks are rolled back.
    pub fn apply(&mut self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        for index in writes.indices() {
            let len = writes.get(index).map(<[u8]>::len).unwrap_or_default();
            if index >= self.blocks.len() || len != self.volume.block_size() {
                return Err(VolumeError::CorruptImage(format!(
                    "staged write of {} bytes to block {} does not fit the volume",
                    len, index
                )));
            }
        }

        let staged = writes.into_blocks();
        let mut previous = Vec::with_capacity(staged.len());
        for (index, block) in staged {
            let old = std::mem::replace(&mut self.blocks[index], block);
            previous.push((index, old));
        }

        tracing::trace!(blocks = previous.len(), "applying staged writes");

        if let Err(e) = self.save() {
            tracing::warn!("persist failed, rolling back {} blocks: {}", previous.len(), e);
            for (index, old) in previous {
                self.blocks[index] = old;
            }
            return Err(e);
        }

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn sync_strategy(&self) -> SyncStrategy {
        self.sync_strategy
    }
}
