//! Engine Module
//!
//! The public face of a volume, composing layout, store, table, directory
//! and codec.
//!
//! ## Responsibilities
//! - Create and open volume images
//! - Run every public operation as one stage-then-commit step
//! - Keep one exclusive owner of the in-memory image

use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use crate::codec;
use crate::config::Config;
use crate::directory::{validate_name, DirEntry, Directory};
use crate::error::{Result, VolumeError};
use crate::fat::AllocationTable;
use crate::layout::{encode_header, plan_with_sizing, Volume};
use crate::report::{CheckReport, Usage, VolumeInfo};
use crate::store::BlockStore;

/// A mounted volume
///
/// ## Concurrency Model: one coarse exclusive lock
///
/// A single `put` or `remove` touches table, directory and data blocks
/// scattered across the image, and none of them is consistent on its own.
/// Every public operation therefore holds `store` for its whole duration:
/// - Reads (get/list/usage) stage nothing and release the lock unchanged
/// - Writes stage all block changes in a transaction, then `apply` once
///
/// A failed precondition drops the transaction; nothing reaches memory or
/// disk.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// The whole image, exclusively owned
    store: Mutex<BlockStore>,

    /// Geometry, copied out of the header
    volume: Volume,

    /// Allocation table manager
    table: AllocationTable,

    /// Directory manager
    directory: Directory,
}

impl Engine {
    /// Create a new volume at `config.image_path`, replacing any file there.
    ///
    /// Steps:
    /// 1. Plan the layout from `total_space` and `block_size`
    /// 2. Stage header, an all-free table and an empty directory
    /// 3. Persist the image
    pub fn create(config: Config) -> Result<Self> {
        config.validate()?;

        let volume = plan_with_sizing(
            config.total_space,
            config.block_size,
            config.directory_sizing,
        )?;
        let mut store = BlockStore::new(&config.image_path, volume, config.sync_strategy);
        let table = AllocationTable::new(volume);
        let directory = Directory::new(volume);

        let writes = {
            let mut txn = store.begin();
            txn.stage(Volume::ADDRESS_HEADER as usize, encode_header(&volume)?);
            table.format(&mut txn);
            directory.format(&mut txn);
            txn.into_writes()
        };
        store.apply(writes)?;

        tracing::info!(
            path = %config.image_path.display(),
            total_blocks = volume.total_blocks,
            data_blocks = volume.data_blocks(),
            "created volume"
        );

        Ok(Self::from_store(config, store))
    }

    /// Create with a path and size (convenience method)
    ///
    /// Uses default config otherwise
    pub fn create_path(path: &Path, total_space: u64) -> Result<Self> {
        let config = Config::builder()
            .image_path(path)
            .total_space(total_space)
            .build();
        Self::create(config)
    }

    /// Open an existing image at `config.image_path`.
    ///
    /// Geometry comes from the image header; the geometry fields of
    /// `config` are ignored.
    pub fn open(config: Config) -> Result<Self> {
        let store = BlockStore::load(&config.image_path, config.sync_strategy).map_err(|e| {
            tracing::warn!(path = %config.image_path.display(), "cannot open volume: {}", e);
            e
        })?;

        tracing::info!(
            path = %config.image_path.display(),
            total_blocks = store.volume().total_blocks,
            "opened volume"
        );

        Ok(Self::from_store(config, store))
    }

    /// Open with a path (convenience method)
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().image_path(path).build();
        Self::open(config)
    }

    fn from_store(mut config: Config, store: BlockStore) -> Self {
        let volume = *store.volume();
        config.total_space = volume.total_space;
        config.block_size = volume.block_size;

        Self {
            config,
            store: Mutex::new(store),
            volume,
            table: AllocationTable::new(volume),
            directory: Directory::new(volume),
        }
    }

    // =========================================================================
    // File Operations
    // =========================================================================

    /// Store `payload` under `name`.
    ///
    /// Steps:
    /// 1. Reject a duplicate name before anything is allocated
    /// 2. Encode the payload into chunks
    /// 3. Allocate and link one block per chunk
    /// 4. Insert the directory entry
    /// 5. Apply all staged blocks at once
    pub fn put(&self, name: &str, payload: &[u8]) -> Result<()> {
        validate_name(name)?;
        let mut store = self.store.lock();

        let writes = {
            let mut txn = store.begin();

            if self.directory.exists(&txn, name)? {
                return Err(VolumeError::AlreadyExists(name.to_string()));
            }

            let chunks = codec::encode(payload, self.volume.block_size());
            let chain = self.table.allocate(&mut txn, chunks.len())?;

            for (&index, chunk) in chain.iter().zip(chunks) {
                txn.stage(self.volume.data_block_address(index), chunk.to_vec());
            }

            let head = chain.first().copied().ok_or_else(|| {
                VolumeError::CorruptImage("allocation returned an empty chain".to_string())
            })?;
            self.directory.insert(&mut txn, name, head)?;

            txn.into_writes()
        };

        store.apply(writes)?;
        tracing::debug!(name, bytes = payload.len(), "put");
        Ok(())
    }

    /// Read the payload stored under `name`
    pub fn get(&self, name: &str) -> Result<Vec<u8>> {
        let store = self.store.lock();
        let txn = store.begin();

        let head = self.directory.lookup(&txn, name)?;
        let chain = self.table.chain(&txn, head)?;
        let blocks = chain
            .iter()
            .map(|&index| txn.read(self.volume.data_block_address(index)))
            .collect::<Result<Vec<_>>>()?;

        codec::decode(blocks, self.volume.block_size())
    }

    /// Rename a file. Only the directory changes.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let mut store = self.store.lock();

        let writes = {
            let mut txn = store.begin();
            self.directory.rename(&mut txn, old, new)?;
            txn.into_writes()
        };

        store.apply(writes)?;
        tracing::debug!(old, new, "rename");
        Ok(())
    }

    /// Delete a file and release its chain
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut store = self.store.lock();

        let writes = {
            let mut txn = store.begin();
            let head = self.directory.remove(&mut txn, name)?;
            let freed = self.table.free(&mut txn, head)?;
            tracing::debug!(name, freed, "remove");
            txn.into_writes()
        };

        store.apply(writes)
    }

    /// Whether `name` exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let store = self.store.lock();
        let txn = store.begin();
        self.directory.exists(&txn, name)
    }

    /// File names in directory scan order
    pub fn list(&self) -> Result<Vec<String>> {
        let store = self.store.lock();
        let txn = store.begin();
        self.directory.list(&txn)
    }

    /// Directory entries in scan order
    pub fn entries(&self) -> Result<Vec<DirEntry>> {
        let store = self.store.lock();
        let txn = store.begin();
        self.directory.entries(&txn)
    }

    // =========================================================================
    // Host File Transfer
    // =========================================================================

    /// Copy a host file into the volume under `name`. Returns bytes copied.
    pub fn import_file(&self, host_path: &Path, name: &str) -> Result<usize> {
        let payload = fs::read(host_path)?;
        self.put(name, &payload)?;
        Ok(payload.len())
    }

    /// Copy `name` out of the volume into a host file. Returns bytes copied.
    pub fn export_file(&self, name: &str, host_path: &Path) -> Result<usize> {
        let payload = self.get(name)?;
        fs::write(host_path, &payload)?;
        Ok(payload.len())
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Used / free / total space
    pub fn usage(&self) -> Result<Usage> {
        let store = self.store.lock();
        let txn = store.begin();

        let free_blocks = self.table.count_free(&txn)?;
        let used_blocks = self.table.len() - free_blocks;
        let used_bytes = used_blocks as u64 * self.volume.block_size as u64;
        let total_bytes = self.volume.total_space;

        Ok(Usage {
            used_bytes,
            free_bytes: total_bytes.saturating_sub(used_bytes),
            total_bytes,
            used_blocks,
            free_blocks,
            data_blocks: self.table.len(),
        })
    }

    /// Geometry summary
    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            path: self.config.image_path.clone(),
            total_space: self.volume.total_space,
            block_size: self.volume.block_size,
            total_blocks: self.volume.total_blocks,
            system_blocks: self.volume.system_blocks(),
            data_blocks: self.volume.data_blocks(),
            address_fat: self.volume.address_fat,
            address_root: self.volume.address_root,
            address_data: self.volume.address_data,
            directory_capacity: self.volume.directory_limit(),
        }
    }

    /// Walk every file's chain and cross-check it against the table.
    ///
    /// Fails with `CorruptImage` on broken or cross-linked chains and on
    /// length prefixes that disagree with their chain. Blocks marked used
    /// but unreachable are reported as leaked.
    pub fn check(&self) -> Result<CheckReport> {
        let store = self.store.lock();
        let txn = store.begin();

        let entries = self.directory.entries(&txn)?;
        let mut owners: Vec<Option<usize>> = vec![None; self.table.len()];
        let mut reachable = 0;

        for (file, entry) in entries.iter().enumerate() {
            let chain = self.table.chain(&txn, entry.first_block)?;
            for &index in &chain {
                let owner = &mut owners[index as usize];
                if let Some(other) = *owner {
                    return Err(VolumeError::CorruptImage(format!(
                        "block {} belongs to both '{}' and '{}'",
                        index, entries[other].name, entry.name
                    )));
                }
                *owner = Some(file);
            }

            let blocks = chain
                .iter()
                .map(|&index| txn.read(self.volume.data_block_address(index)))
                .collect::<Result<Vec<_>>>()?;
            codec::decode(blocks, self.volume.block_size())?;

            reachable += chain.len();
        }

        let used_blocks = self.table.count_used(&txn)?;
        let report = CheckReport {
            files: entries.len(),
            used_blocks,
            reachable_blocks: reachable,
            leaked_blocks: used_blocks.saturating_sub(reachable),
        };

        if !report.is_clean() {
            tracing::warn!("{} blocks are used but unreachable", report.leaked_blocks);
        }
        Ok(report)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Volume geometry
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Image file path
    pub fn path(&self) -> &Path {
        &self.config.image_path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
