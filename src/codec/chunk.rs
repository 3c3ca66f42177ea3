//! Chunk encoding and decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, VolumeError};

/// Size of the payload length stored at the start of the first chunk
pub const LENGTH_PREFIX: usize = 8;

/// Payload bytes that fit in the first chunk
pub fn first_chunk_capacity(block_size: usize) -> usize {
    block_size - LENGTH_PREFIX
}

/// Number of blocks a payload of `len` bytes occupies
pub fn chunk_count(len: usize, block_size: usize) -> usize {
    (LENGTH_PREFIX + len).div_ceil(block_size)
}

/// Encode a payload into `chunk_count(payload.len())` chunks of exactly
/// `block_size` bytes each.
pub fn encode(payload: &[u8], block_size: usize) -> Vec<Bytes> {
    let count = chunk_count(payload.len(), block_size);

    let mut stream = BytesMut::with_capacity(count * block_size);
    stream.put_u64_le(payload.len() as u64);
    stream.extend_from_slice(payload);
    stream.resize(count * block_size, 0);

    let mut stream = stream.freeze();
    (0..count).map(|_| stream.split_to(block_size)).collect()
}

/// Reassemble a payload from its chunks, in chain order.
///
/// The chunk count must match the stored length exactly; anything else
/// means the chain and the length prefix disagree.
pub fn decode<I, B>(chunks: I, block_size: usize) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut chunks = chunks.into_iter();

    let first = chunks
        .next()
        .ok_or_else(|| VolumeError::CorruptImage("file has no blocks".to_string()))?;
    let first = first.as_ref();
    check_chunk(first, block_size)?;

    let mut header = &first[..LENGTH_PREFIX];
    let len = header.get_u64_le();
    let len = usize::try_from(len).map_err(|_| {
        VolumeError::CorruptImage(format!("stored length {} does not fit in memory", len))
    })?;

    let expected = len
        .checked_add(LENGTH_PREFIX)
        .map(|total| total.div_ceil(block_size))
        .ok_or_else(|| VolumeError::CorruptImage(format!("stored length {} overflows", len)))?;

    // The prefix is untrusted until the chain length agrees with it.
    let take = len.min(first_chunk_capacity(block_size));
    let mut payload = Vec::with_capacity(take);
    payload.extend_from_slice(&first[LENGTH_PREFIX..LENGTH_PREFIX + take]);
    let mut seen = 1;

    for chunk in chunks {
        let chunk = chunk.as_ref();
        check_chunk(chunk, block_size)?;
        seen += 1;
        if seen > expected {
            break;
        }
        let take = (len - payload.len()).min(block_size);
        payload.extend_from_slice(&chunk[..take]);
    }

    if seen != expected {
        return Err(VolumeError::CorruptImage(format!(
            "stored length {} needs {} blocks, chain has {}",
            len, expected, seen
        )));
    }

    Ok(payload)
}

fn check_chunk(chunk: &[u8], block_size: usize) -> Result<()> {
    if chunk.len() != block_size {
        return Err(VolumeError::CorruptImage(format!(
            "chunk of {} bytes in a volume with {}-byte blocks",
            chunk.len(),
            block_size
        )));
    }
    Ok(())
}
