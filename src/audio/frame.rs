//! Fixed-capacity PCM frame accumulator
//!
//! The capture channel delivers arbitrarily sized byte chunks; the codec
//! needs exactly one frame per encode call. `FrameBuffer` sits between
//! the two and reassembles frames.

/// Byte accumulator holding at most one codec frame
pub struct FrameBuffer {
    buf: Vec<u8>,
    filled: usize,
}

impl FrameBuffer {
    /// Create a buffer for frames of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity],
            filled: 0,
        }
    }

    /// Append bytes from `src`, consuming at most the remaining space.
    /// Returns the number of bytes consumed.
    pub fn push(&mut self, src: &[u8]) -> usize {
        let take = src.len().min(self.capacity() - self.filled);
        self.buf[self.filled..self.filled + take].copy_from_slice(&src[..take]);
        self.filled += take;
        take
    }

    /// True once a complete frame has accumulated
    pub fn is_full(&self) -> bool {
        self.filled == self.buf.len()
    }

    /// Take the completed frame, resetting the buffer.
    ///
    /// Panics if the buffer is not full; callers gate on [`is_full`].
    ///
    /// [`is_full`]: FrameBuffer::is_full
    pub fn drain(&mut self) -> &[u8] {
        assert!(self.is_full(), "drain called on a partial frame");
        self.filled = 0;
        &self.buf
    }

    /// Frame size in bytes
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently held
    pub fn filled(&self) -> usize {
        self.filled
    }
}
