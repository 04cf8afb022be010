//! C1 — frame buffer model: a multi-chunk byte buffer with scatter read and
//! gather append, used for everything that moves a frame between the stack
//! and a driver (spec §4.1).

use crate::error::{NicError, NicResult};

/// Maximum number of chunks a single `Buffer` can be built from. Frames this
/// core handles are Ethernet-sized; a handful of chunks is always enough to
/// describe a header-plus-payload split without forcing a copy.
pub const MAX_CHUNKS: usize = 8;

/// A single memory chunk: a borrow of caller-owned storage plus its filled
/// length. `Buffer` never allocates the payload bytes itself (spec §4.1) —
/// chunks are always views onto slices the caller supplied.
pub struct Chunk<'a> {
    data: &'a mut [u8],
    len: usize,
}

impl<'a> Chunk<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Chunk { data, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// An ordered sequence of chunks forming one logical frame. Operations are
/// O(chunks), never O(bytes) beyond what's read or written.
pub struct Buffer<'a> {
    chunks: heapless::Vec<Chunk<'a>, MAX_CHUNKS>,
}

impl<'a> Buffer<'a> {
    pub fn new() -> Self {
        Buffer { chunks: heapless::Vec::new() }
    }

    /// Wrap a single pre-filled chunk (the common case: one contiguous
    /// driver-owned DMA buffer).
    pub fn single(data: &'a mut [u8], len: usize) -> Self {
        let mut b = Buffer::new();
        let mut c = Chunk::new(data);
        c.len = len.min(c.capacity());
        // MAX_CHUNKS >= 1, so this never fails.
        let _ = b.chunks.push(c);
        b
    }

    /// Total logical length across all chunks.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linearize `length` bytes starting at `offset` into `out`. Returns the
    /// number of bytes copied, which is `< length` only if the buffer itself
    /// is shorter than `offset + length`.
    pub fn read(&self, mut offset: usize, out: &mut [u8]) -> usize {
        let mut written = 0;
        for chunk in self.chunks.iter() {
            if written >= out.len() {
                break;
            }
            let filled = chunk.filled();
            if offset >= filled.len() {
                offset -= filled.len();
                continue;
            }
            let avail = &filled[offset..];
            let n = avail.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&avail[..n]);
            written += n;
            offset = 0;
        }
        written
    }

    /// Append bytes to the logical end of the buffer, filling remaining
    /// capacity in the last chunk first, then a new tail chunk if one is
    /// available. Fails with `length_invalid` if `bytes` doesn't fit in any
    /// remaining chunk capacity.
    pub fn append(&mut self, bytes: &[u8]) -> NicResult<()> {
        let mut remaining = bytes;
        if let Some(last) = self.chunks.last_mut() {
            let room = last.capacity() - last.len;
            let n = room.min(remaining.len());
            last.data[last.len..last.len + n].copy_from_slice(&remaining[..n]);
            last.len += n;
            remaining = &remaining[n..];
        }
        if remaining.is_empty() {
            return Ok(());
        }
        Err(NicError::LengthInvalid)
    }

    /// Grow a fresh chunk onto the buffer (used by callers that hand over
    /// additional backing storage, e.g. a header chunk plus a payload
    /// chunk already allocated by the stack).
    pub fn push_chunk(&mut self, data: &'a mut [u8], len: usize) -> NicResult<()> {
        let mut c = Chunk::new(data);
        c.len = len.min(c.capacity());
        self.chunks.push(c).map_err(|_| NicError::OutOfResources)
    }

    /// Pad with zero bytes until the total length is at least `n` (used to
    /// reach the minimum Ethernet frame length before a tail tag or CRC is
    /// appended — spec §4.4, §6 `padFrame`).
    pub fn pad_to(&mut self, n: usize) -> NicResult<()> {
        while self.len() < n {
            self.append(&[0u8])?;
        }
        Ok(())
    }
}

impl Default for Buffer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum Ethernet frame length (header + payload, excluding the 4-byte
/// CRC the MAC appends on the wire).
pub const MIN_ETHERNET_FRAME_LEN: usize = 60;

/// Pad an outbound buffer to the minimum Ethernet length (spec §6
/// `padFrame(buffer, &length)`).
pub fn pad_frame(buffer: &mut Buffer<'_>) -> NicResult<usize> {
    buffer.pad_to(MIN_ETHERNET_FRAME_LEN)?;
    Ok(buffer.len())
}
