//! Directory Module
//!
//! Flat namespace mapping file names to the first data block of their chain.
//!
//! ## Entry Format
//! ```text
//! ┌────────────────────────────────────┬──────────────────────┐
//! │ Name (64, UTF-8, zero padded)      │ First block u32 (4)  │
//! └────────────────────────────────────┴──────────────────────┘
//! ```
//!
//! A directory block holds `block_size / 68` entry slots; a slot whose
//! first name byte is zero is empty. Names are unique across all
//! directory blocks together.

mod manager;

pub use manager::Directory;

use crate::error::{Result, VolumeError};
use crate::layout::NAME_FIELD_WIDTH;

/// Longest file name, in bytes
pub const MAX_NAME_LEN: usize = NAME_FIELD_WIDTH;

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name
    pub name: String,

    /// Head of the file's chain, relative to the data region
    pub first_block: u32,
}

/// Reject names the fixed-width name field cannot hold
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VolumeError::InvalidName("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VolumeError::InvalidName(format!(
            "'{}' is {} bytes, limit is {}",
            name,
            name.len(),
            MAX_NAME_LEN
        )));
    }
    if name.bytes().any(|b| b == 0) {
        return Err(VolumeError::InvalidName(format!(
            "{:?} contains a NUL byte",
            name
        )));
    }
    Ok(())
}
