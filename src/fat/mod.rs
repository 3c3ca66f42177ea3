//! Allocation Table Module
//!
//! Free / used / next-pointer state for every data block.
//!
//! ## Table Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Table block (block_size / 4 entries)                     │
//! │ ┌──────────┬──────────┬──────────┬─────┬───────────────┐ │
//! │ │ i32 (4)  │ i32 (4)  │ i32 (4)  │ ... │ i32 (4)       │ │
//! │ └──────────┴──────────┴──────────┴─────┴───────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//!   -2      free
//!   -1      end of chain
//!   n >= 0  next data block of the same file
//! ```
//!
//! Entry `i` belongs to data block `i` (relative to the data region).
//! Slots past the last data block in the final table block stay free and
//! are never allocated or counted.

mod table;

pub use table::AllocationTable;

/// Raw value of a free entry
pub const FREE: i32 = -2;

/// Raw value of the last entry of a chain
pub const END_OF_CHAIN: i32 = -1;

/// Decoded allocation table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry {
    /// Block is not part of any file
    Free,

    /// Last block of a chain
    EndOfChain,

    /// Block is followed by this data block
    Next(u32),
}

impl TableEntry {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            FREE => Some(TableEntry::Free),
            END_OF_CHAIN => Some(TableEntry::EndOfChain),
            n if n >= 0 => Some(TableEntry::Next(n as u32)),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            TableEntry::Free => FREE,
            TableEntry::EndOfChain => END_OF_CHAIN,
            TableEntry::Next(n) => n as i32,
        }
    }

    pub fn is_free(self) -> bool {
        self == TableEntry::Free
    }
}
