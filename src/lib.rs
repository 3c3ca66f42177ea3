//! # fatvol
//!
//! A single-file, block-addressed storage volume with:
//! - A fixed header / allocation table / directory / data partition
//! - First-fit block allocation with FAT-style chains
//! - A flat, name-unique directory
//! - Length-prefixed chunking of file payloads
//! - All-or-nothing operations (stage, then commit once)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Engine                                │
//! │      create / open / put / get / rename / remove / list      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Transaction (staged writes)
//!          ┌────────────┼─────────────┬──────────────┐
//!          │            │             │              │
//!          ▼            ▼             ▼              ▼
//!   ┌────────────┐ ┌──────────┐ ┌───────────┐ ┌────────────┐
//!   │ Directory  │ │   FAT    │ │   Codec   │ │   Layout   │
//!   │ name→head  │ │  chains  │ │  chunks   │ │  planner   │
//!   └─────┬──────┘ └────┬─────┘ └───────────┘ └────────────┘
//!         │             │
//!         ▼             ▼
//!   ┌─────────────────────────┐
//!   │       BlockStore        │
//!   │ (whole image, one file) │
//!   └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod layout;
pub mod store;
pub mod fat;
pub mod directory;
pub mod codec;
pub mod report;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, VolumeError};
pub use config::{Config, DirectorySizing, SyncStrategy};
pub use engine::Engine;
pub use layout::Volume;
pub use report::{CheckReport, Usage, VolumeInfo};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of fatvol
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
