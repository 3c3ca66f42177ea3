//! Header Record
//!
//! Block 0 of every image.
//!
//! ## Format
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Record (38 bytes, bincode fixed-width little endian)          │
//! │   Magic "FGFS" (4) | Version u16 (2) | BlockSize u32 (4)      │
//! │   TotalSpace u64 (8) | TotalBlocks u32 (4) | HeaderBlocks (4) │
//! │   AddrFat u32 (4) | AddrRoot u32 (4) | AddrData u32 (4)       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ CRC32 of the record (4)                                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Zero padding up to block_size                                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

use super::{Volume, HEADER_BLOCKS};

/// Magic bytes identifying a fatvol image
pub const MAGIC: &[u8; 4] = b"FGFS";

/// Current image format version
pub const VERSION: u16 = 1;

/// Encoded size of the header record, without the trailing CRC
pub const HEADER_RECORD_LEN: usize = 38;

const CRC_LEN: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
struct HeaderRecord {
    magic: [u8; 4],
    version: u16,
    block_size: u32,
    total_space: u64,
    total_blocks: u32,
    header_blocks: u32,
    address_fat: u32,
    address_root: u32,
    address_data: u32,
}

/// Encode the header block for `volume`, padded to a full block
pub fn encode_header(volume: &Volume) -> Result<Vec<u8>> {
    let record = HeaderRecord {
        magic: *MAGIC,
        version: VERSION,
        block_size: volume.block_size,
        total_space: volume.total_space,
        total_blocks: volume.total_blocks,
        header_blocks: HEADER_BLOCKS,
        address_fat: volume.address_fat,
        address_root: volume.address_root,
        address_data: volume.address_data,
    };

    let encoded =
        bincode::serialize(&record).map_err(|e| VolumeError::Serialization(e.to_string()))?;
    debug_assert_eq!(encoded.len(), HEADER_RECORD_LEN);

    let crc = crc32fast::hash(&encoded);

    let mut block = vec![0u8; volume.block_size()];
    block[..HEADER_RECORD_LEN].copy_from_slice(&encoded);
    block[HEADER_RECORD_LEN..HEADER_RECORD_LEN + CRC_LEN].copy_from_slice(&crc.to_le_bytes());
    Ok(block)
}

/// Decode and validate the header at the start of an image.
///
/// Only the first `HEADER_RECORD_LEN + 4` bytes are read; the caller still
/// has to compare `Volume::image_len` with the actual image length.
pub fn decode_header(bytes: &[u8]) -> Result<Volume> {
    if bytes.len() < HEADER_RECORD_LEN + CRC_LEN {
        return Err(VolumeError::CorruptImage(format!(
            "image too short for a header: {} bytes",
            bytes.len()
        )));
    }

    let record_bytes = &bytes[..HEADER_RECORD_LEN];
    if &record_bytes[0..4] != MAGIC {
        return Err(VolumeError::CorruptImage(format!(
            "invalid magic: expected FGFS, got {:?}",
            &record_bytes[0..4]
        )));
    }

    let mut crc_bytes = [0u8; CRC_LEN];
    crc_bytes.copy_from_slice(&bytes[HEADER_RECORD_LEN..HEADER_RECORD_LEN + CRC_LEN]);
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let actual_crc = crc32fast::hash(record_bytes);
    if stored_crc != actual_crc {
        return Err(VolumeError::CorruptImage(format!(
            "header checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored_crc, actual_crc
        )));
    }

    let record: HeaderRecord = bincode::deserialize(record_bytes)
        .map_err(|e| VolumeError::CorruptImage(format!("unreadable header: {}", e)))?;

    if record.version != VERSION {
        return Err(VolumeError::CorruptImage(format!(
            "unsupported image version: {}",
            record.version
        )));
    }
    if record.header_blocks != HEADER_BLOCKS {
        return Err(VolumeError::CorruptImage(format!(
            "unexpected header size: {} blocks",
            record.header_blocks
        )));
    }

    let volume = Volume {
        block_size: record.block_size,
        total_space: record.total_space,
        total_blocks: record.total_blocks,
        address_fat: record.address_fat,
        address_root: record.address_root,
        address_data: record.address_data,
    };
    volume.validate()?;
    Ok(volume)
}
