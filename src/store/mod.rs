//! Store Module
//!
//! The in-memory block array and its single host file.
//!
//! ## Responsibilities
//! - Load a whole image, validating the header before anything else
//! - Hold every block in memory, each exactly `block_size` bytes
//! - Apply a staged batch of block writes, then persist the full image
//!
//! ## Stage-then-commit
//! Operations never write blocks directly. They stage through a
//! [`Transaction`] (staged blocks shadow committed ones) and hand the
//! resulting [`WriteSet`] to [`BlockStore::apply`] once every precondition
//! has passed. A failed operation therefore leaves memory and disk
//! untouched.
//!
//! Persisting rewrites the whole file in place; a crash in the middle of
//! that rewrite can leave a torn image.

mod block_store;
mod write_set;

pub use block_store::BlockStore;
pub use write_set::{Transaction, WriteSet};
