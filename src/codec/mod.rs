//! File Content Codec
//!
//! Splits a payload into block-sized chunks and reassembles it.
//!
//! ## Chunk Stream
//! ```text
//! ┌────────────────┬────────────────────────────────────┬──────────┐
//! │ Length u64 (8) │ Payload bytes                      │ Padding  │
//! └────────────────┴────────────────────────────────────┴──────────┘
//!  └───────── cut into block_size chunks, one per data block ─────┘
//! ```
//!
//! The length prefix lives at the start of the first chunk, so the first
//! block carries `block_size - 8` payload bytes and every later block
//! carries `block_size`. The padding of the final chunk is dropped on
//! decode using the stored length. An empty payload still takes one
//! block.

mod chunk;

pub use chunk::{chunk_count, decode, encode, first_chunk_capacity, LENGTH_PREFIX};
