//! Tests for the engine facade
//!
//! These tests verify:
//! - Create / open round trips through the image file
//! - put / get / rename / remove / list / usage semantics
//! - Failed operations leave the image byte-for-byte unchanged
//! - Consistency checking finds leaks and cross-links
//! - Concurrent callers are serialized

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use fatvol::codec::chunk_count;
use fatvol::{Config, Engine, SyncStrategy, VolumeError};
use tempfile::TempDir;

const MIB: u64 = 1024 * 1024;
const BS: usize = 4096;

// =============================================================================
// Helper Functions
// =============================================================================

fn image_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("volume.img")
}

fn setup_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .image_path(image_path(&temp_dir))
        .sync_strategy(SyncStrategy::Buffered)
        .total_space(MIB)
        .build();
    let engine = Engine::create(config).unwrap();
    (temp_dir, engine)
}

fn setup_engine_with_files(max_files: u32) -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .image_path(image_path(&temp_dir))
        .sync_strategy(SyncStrategy::Buffered)
        .total_space(MIB)
        .max_files(max_files)
        .build();
    let engine = Engine::create(config).unwrap();
    (temp_dir, engine)
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

/// Overwrite `bytes` at `offset` in a closed image file
fn poke(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Create / Open Tests
// =============================================================================

#[test]
fn test_create_default_geometry() {
    let (temp_dir, engine) = setup_engine();
    let info = engine.info();

    assert_eq!(info.path, image_path(&temp_dir));
    assert_eq!(info.total_space, MIB);
    assert_eq!(info.block_size, 4096);
    assert_eq!(info.total_blocks, 256);
    assert_eq!(info.address_fat, 1);
    assert_eq!(info.address_root, 2);
    assert_eq!(info.address_data, 7);
    assert_eq!(info.system_blocks, 7);
    assert_eq!(info.data_blocks, 249);
    assert_eq!(info.directory_capacity, 300);

    assert_eq!(fs::metadata(image_path(&temp_dir)).unwrap().len(), MIB);
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn test_create_with_small_directory() {
    let (_temp, engine) = setup_engine_with_files(60);
    let info = engine.info();

    assert_eq!(info.total_blocks, 256);
    assert_eq!(info.address_fat, 1);
    assert_eq!(info.address_root, 2);
    assert_eq!(info.address_data, 3);
    assert_eq!(info.system_blocks, 3);
    assert_eq!(info.data_blocks, 253);
    assert_eq!(info.directory_capacity, 60);
}

#[test]
fn test_create_replaces_existing_image() {
    let (temp_dir, engine) = setup_engine();
    engine.put("old", b"data").unwrap();
    drop(engine);

    let engine = Engine::create_path(&image_path(&temp_dir), MIB).unwrap();
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn test_create_too_small() {
    let temp_dir = TempDir::new().unwrap();

    let result = Engine::create_path(&image_path(&temp_dir), 3 * BS as u64);
    assert!(matches!(result, Err(VolumeError::Configuration(_))));
    assert!(!image_path(&temp_dir).exists());
}

#[test]
fn test_create_bad_block_size() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .image_path(image_path(&temp_dir))
        .total_space(MIB)
        .block_size(100)
        .build();

    assert!(matches!(
        Engine::create(config),
        Err(VolumeError::Configuration(_))
    ));
}

#[test]
fn test_reopen_keeps_geometry_and_files() {
    let (temp_dir, engine) = setup_engine();
    let big = pattern(10_000, 7);
    engine.put("a.txt", b"hello").unwrap();
    engine.put("big.bin", &big).unwrap();
    let volume = *engine.volume();
    drop(engine);

    let engine = Engine::open_path(&image_path(&temp_dir)).unwrap();
    assert_eq!(*engine.volume(), volume);
    assert_eq!(engine.config().total_space, MIB);
    assert_eq!(engine.config().block_size, 4096);
    assert_eq!(engine.list().unwrap(), vec!["a.txt", "big.bin"]);
    assert_eq!(engine.get("a.txt").unwrap(), b"hello");
    assert_eq!(engine.get("big.bin").unwrap(), big);
    assert!(engine.check().unwrap().is_clean());
}

#[test]
fn test_open_missing_image() {
    let temp_dir = TempDir::new().unwrap();

    assert!(matches!(
        Engine::open_path(&image_path(&temp_dir)),
        Err(VolumeError::Io(_))
    ));
}

#[test]
fn test_open_foreign_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(image_path(&temp_dir), pattern(64 * 1024, 3)).unwrap();

    assert!(matches!(
        Engine::open_path(&image_path(&temp_dir)),
        Err(VolumeError::CorruptImage(_))
    ));
}

#[test]
fn test_open_truncated_image() {
    let (temp_dir, engine) = setup_engine();
    drop(engine);

    let file = OpenOptions::new()
        .write(true)
        .open(image_path(&temp_dir))
        .unwrap();
    file.set_len(MIB / 2).unwrap();
    drop(file);

    assert!(matches!(
        Engine::open_path(&image_path(&temp_dir)),
        Err(VolumeError::CorruptImage(_))
    ));
}

#[test]
fn test_open_damaged_header() {
    let (temp_dir, engine) = setup_engine();
    drop(engine);

    // Inside the header record, past the magic
    poke(&image_path(&temp_dir), 12, &[0xFF]);

    assert!(matches!(
        Engine::open_path(&image_path(&temp_dir)),
        Err(VolumeError::CorruptImage(_))
    ));
}

// =============================================================================
// Put / Get Tests
// =============================================================================

#[test]
fn test_put_get_boundary_sizes() {
    let (_temp, engine) = setup_engine();

    for (i, len) in [0, 1, BS - 8, BS - 7, BS, 2 * BS - 8, 2 * BS - 7, 50_000]
        .into_iter()
        .enumerate()
    {
        let name = format!("f{}", i);
        let payload = pattern(len, i as u8);
        engine.put(&name, &payload).unwrap();
        assert_eq!(engine.get(&name).unwrap(), payload, "len {}", len);
    }

    assert!(engine.check().unwrap().is_clean());
}

#[test]
fn test_empty_payload_takes_one_block() {
    let (_temp, engine) = setup_engine();
    engine.put("empty", b"").unwrap();

    assert_eq!(engine.get("empty").unwrap(), b"");
    assert_eq!(engine.usage().unwrap().used_blocks, 1);
}

#[test]
fn test_get_missing() {
    let (_temp, engine) = setup_engine();

    assert!(matches!(
        engine.get("ghost"),
        Err(VolumeError::NotFound(ref name)) if name == "ghost"
    ));
}

#[test]
fn test_put_invalid_name() {
    let (_temp, engine) = setup_engine();

    assert!(matches!(
        engine.put("", b"x"),
        Err(VolumeError::InvalidName(_))
    ));
    assert!(matches!(
        engine.put(&"n".repeat(65), b"x"),
        Err(VolumeError::InvalidName(_))
    ));
    assert_eq!(engine.usage().unwrap().used_blocks, 0);
}

#[test]
fn test_duplicate_put_changes_nothing() {
    let (temp_dir, engine) = setup_engine();
    engine.put("a", b"first").unwrap();
    let before = fs::read(image_path(&temp_dir)).unwrap();

    assert!(matches!(
        engine.put("a", b"second"),
        Err(VolumeError::AlreadyExists(_))
    ));

    assert_eq!(fs::read(image_path(&temp_dir)).unwrap(), before);
    assert_eq!(engine.get("a").unwrap(), b"first");
    assert_eq!(engine.usage().unwrap().used_blocks, 1);
}

#[test]
fn test_insufficient_space_changes_nothing() {
    let (temp_dir, engine) = setup_engine();
    engine.put("small", b"abc").unwrap();
    let before = fs::read(image_path(&temp_dir)).unwrap();
    let usage_before = engine.usage().unwrap();

    // 248 free blocks; this needs 249
    let payload = vec![1u8; 248 * BS];
    assert_eq!(chunk_count(payload.len(), BS), 249);

    assert!(matches!(
        engine.put("big", &payload),
        Err(VolumeError::InsufficientSpace {
            needed: 249,
            available: 248
        })
    ));

    assert_eq!(fs::read(image_path(&temp_dir)).unwrap(), before);
    assert_eq!(engine.usage().unwrap(), usage_before);
    assert_eq!(engine.list().unwrap(), vec!["small"]);
}

#[test]
fn test_fill_every_data_block() {
    let (_temp, engine) = setup_engine();

    // Exactly 249 blocks
    let payload = pattern(249 * BS - 8, 9);
    engine.put("all", &payload).unwrap();

    let usage = engine.usage().unwrap();
    assert_eq!(usage.used_blocks, 249);
    assert_eq!(usage.free_blocks, 0);
    assert!(matches!(
        engine.put("more", b""),
        Err(VolumeError::InsufficientSpace {
            needed: 1,
            available: 0
        })
    ));
    assert_eq!(engine.get("all").unwrap(), payload);
}

#[test]
fn test_directory_full_leaks_nothing() {
    let (_temp, engine) = setup_engine_with_files(60);
    for i in 0..60 {
        engine.put(&format!("file{}", i), b"x").unwrap();
    }
    let used_before = engine.usage().unwrap().used_blocks;

    assert!(matches!(
        engine.put("file60", b"x"),
        Err(VolumeError::DirectoryFull { capacity: 60 })
    ));

    assert_eq!(engine.usage().unwrap().used_blocks, used_before);
    assert!(engine.check().unwrap().is_clean());
}

// =============================================================================
// Remove Tests
// =============================================================================

#[test]
fn test_remove_frees_whole_chain() {
    let (_temp, engine) = setup_engine();
    engine.put("keep", b"k").unwrap();
    let payload = pattern(10_000, 1);
    engine.put("big", &payload).unwrap();

    let used = engine.usage().unwrap().used_blocks;
    assert_eq!(used, 1 + chunk_count(payload.len(), BS));

    engine.remove("big").unwrap();

    assert_eq!(engine.usage().unwrap().used_blocks, 1);
    assert!(!engine.exists("big").unwrap());
    assert!(matches!(engine.get("big"), Err(VolumeError::NotFound(_))));
    assert_eq!(engine.get("keep").unwrap(), b"k");
}

#[test]
fn test_freed_blocks_are_reused_first_fit() {
    let (_temp, engine) = setup_engine();
    engine.put("a", b"a").unwrap();
    engine.put("b", b"b").unwrap();
    engine.remove("a").unwrap();

    engine.put("c", b"c").unwrap();

    let entries = engine.entries().unwrap();
    let c = entries.iter().find(|e| e.name == "c").unwrap();
    assert_eq!(c.first_block, 0);
}

#[test]
fn test_remove_missing() {
    let (temp_dir, engine) = setup_engine();
    engine.put("a", b"a").unwrap();
    let before = fs::read(image_path(&temp_dir)).unwrap();

    assert!(matches!(
        engine.remove("ghost"),
        Err(VolumeError::NotFound(_))
    ));
    assert_eq!(fs::read(image_path(&temp_dir)).unwrap(), before);
}

// =============================================================================
// Rename Tests
// =============================================================================

#[test]
fn test_rename_touches_only_directory() {
    let (temp_dir, engine) = setup_engine();
    let payload = pattern(9000, 4);
    engine.put("old", &payload).unwrap();
    let volume = *engine.volume();
    let before = fs::read(image_path(&temp_dir)).unwrap();

    engine.rename("old", "new").unwrap();

    let after = fs::read(image_path(&temp_dir)).unwrap();
    let root = volume.address_root as usize * BS;
    let data = volume.address_data as usize * BS;
    assert_eq!(before[..root], after[..root]);
    assert_eq!(before[data..], after[data..]);
    assert_ne!(before[root..data], after[root..data]);

    assert_eq!(engine.get("new").unwrap(), payload);
    assert!(matches!(engine.get("old"), Err(VolumeError::NotFound(_))));
}

#[test]
fn test_rename_onto_existing() {
    let (_temp, engine) = setup_engine();
    engine.put("a", b"A").unwrap();
    engine.put("b", b"B").unwrap();

    assert!(matches!(
        engine.rename("a", "b"),
        Err(VolumeError::AlreadyExists(_))
    ));
    assert_eq!(engine.get("a").unwrap(), b"A");
    assert_eq!(engine.get("b").unwrap(), b"B");
}

#[test]
fn test_rename_missing() {
    let (_temp, engine) = setup_engine();

    assert!(matches!(
        engine.rename("ghost", "b"),
        Err(VolumeError::NotFound(_))
    ));
}

// =============================================================================
// Usage Tests
// =============================================================================

#[test]
fn test_usage_accounting() {
    let (_temp, engine) = setup_engine();

    let usage = engine.usage().unwrap();
    assert_eq!(usage.used_bytes, 0);
    assert_eq!(usage.free_bytes, MIB);
    assert_eq!(usage.total_bytes, MIB);
    assert_eq!(usage.free_blocks, 249);
    assert_eq!(usage.data_blocks, 249);

    engine.put("f", &pattern(10_000, 0)).unwrap();

    let usage = engine.usage().unwrap();
    assert_eq!(usage.used_blocks, 3);
    assert_eq!(usage.free_blocks, 246);
    assert_eq!(usage.used_bytes, 3 * BS as u64);
    assert_eq!(usage.free_bytes, MIB - 3 * BS as u64);
    assert!(usage.percent_used() > 1.0 && usage.percent_used() < 1.2);
}

// =============================================================================
// Consistency Check Tests
// =============================================================================

#[test]
fn test_check_clean_volume() {
    let (_temp, engine) = setup_engine();
    engine.put("a", &pattern(5000, 1)).unwrap();
    engine.put("b", b"b").unwrap();

    let report = engine.check().unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.used_blocks, 3);
    assert_eq!(report.reachable_blocks, 3);
    assert_eq!(report.leaked_blocks, 0);
    assert!(report.is_clean());
}

#[test]
fn test_check_reports_leaked_block() {
    let (temp_dir, engine) = setup_engine();
    engine.put("a", b"a").unwrap();
    let volume = *engine.volume();
    drop(engine);

    // Mark data block 5 as a one-block chain no entry points to
    let offset = volume.address_fat as u64 * BS as u64 + 5 * 4;
    poke(&image_path(&temp_dir), offset, &(-1i32).to_le_bytes());

    let engine = Engine::open_path(&image_path(&temp_dir)).unwrap();
    let report = engine.check().unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.used_blocks, 2);
    assert_eq!(report.reachable_blocks, 1);
    assert_eq!(report.leaked_blocks, 1);
    assert!(!report.is_clean());
}

#[test]
fn test_check_rejects_cross_linked_chains() {
    let (temp_dir, engine) = setup_engine();
    engine.put("a", b"a").unwrap();
    engine.put("b", b"b").unwrap();
    let volume = *engine.volume();
    drop(engine);

    // Point b's entry (slot 1) at a's first block
    let offset = volume.address_root as u64 * BS as u64 + 68 + 64;
    poke(&image_path(&temp_dir), offset, &0u32.to_le_bytes());

    let engine = Engine::open_path(&image_path(&temp_dir)).unwrap();
    assert!(matches!(
        engine.check(),
        Err(VolumeError::CorruptImage(_))
    ));
}

#[test]
fn test_get_broken_chain() {
    let (temp_dir, engine) = setup_engine();
    engine.put("a", &pattern(6000, 2)).unwrap();
    let volume = *engine.volume();
    drop(engine);

    // Cut the two-block chain after its first block
    let offset = volume.address_fat as u64 * BS as u64;
    poke(&image_path(&temp_dir), offset, &(-1i32).to_le_bytes());

    let engine = Engine::open_path(&image_path(&temp_dir)).unwrap();
    assert!(matches!(engine.get("a"), Err(VolumeError::CorruptImage(_))));
}

// =============================================================================
// Host File Transfer Tests
// =============================================================================

#[test]
fn test_import_export() {
    let (temp_dir, engine) = setup_engine();
    let source = temp_dir.path().join("source.bin");
    let dest = temp_dir.path().join("dest.bin");
    let payload = pattern(12_345, 5);
    fs::write(&source, &payload).unwrap();

    assert_eq!(engine.import_file(&source, "copy.bin").unwrap(), payload.len());
    assert_eq!(engine.export_file("copy.bin", &dest).unwrap(), payload.len());

    assert_eq!(fs::read(&dest).unwrap(), payload);
}

#[test]
fn test_import_missing_host_file() {
    let (temp_dir, engine) = setup_engine();

    assert!(matches!(
        engine.import_file(&temp_dir.path().join("nope"), "x"),
        Err(VolumeError::Io(_))
    ));
    assert!(!engine.exists("x").unwrap());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_puts() {
    let (_temp, engine) = setup_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..5 {
                    let name = format!("t{}-{}", t, i);
                    engine.put(&name, &pattern(3000 + i * 1000, t as u8)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.list().unwrap().len(), 40);
    for t in 0..8 {
        for i in 0..5 {
            let name = format!("t{}-{}", t, i);
            assert_eq!(engine.get(&name).unwrap(), pattern(3000 + i * 1000, t as u8));
        }
    }
    assert!(engine.check().unwrap().is_clean());
}

#[test]
fn test_fsync_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .image_path(image_path(&temp_dir))
        .sync_strategy(SyncStrategy::Fsync)
        .total_space(MIB)
        .build();
    let engine = Engine::create(config).unwrap();

    engine.put("a", b"durable").unwrap();
    drop(engine);

    let engine = Engine::open_path(&image_path(&temp_dir)).unwrap();
    assert_eq!(engine.get("a").unwrap(), b"durable");
}
