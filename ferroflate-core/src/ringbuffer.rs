//! Sliding-window history buffer for LZ77 decompression.
//!
//! DEFLATE back-references reach at most 32768 bytes into previously
//! produced output. [`RingBuffer`] keeps exactly that history in a
//! power-of-two circular buffer; [`OutputRingBuffer`] pairs the history
//! with a growable output vector so decoders can emit and remember bytes
//! in one step.

use crate::error::{FlateError, Result};

/// DEFLATE window size (RFC 1951): 32 KiB.
pub const DEFLATE_WINDOW: usize = 32768;

/// A circular history buffer for back-reference copies.
///
/// Capacity must be a power of two so wrapping is a mask instead of a
/// modulo.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Vec<u8>,
    /// Next write index.
    position: usize,
    /// Bytes of valid history, saturating at capacity.
    size: usize,
    mask: usize,
}

impl RingBuffer {
    /// Create a buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of 2.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(
            capacity.is_power_of_two(),
            "capacity must be a power of 2, got {capacity}"
        );

        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Create a buffer sized for DEFLATE (32 KiB).
    pub fn deflate() -> Self {
        Self::new(DEFLATE_WINDOW)
    }

    /// The buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of history currently available.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no history has been written yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.size = 0;
        self.buffer.fill(0);
    }

    /// Append one byte of history.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size < self.buffer.len() {
            self.size += 1;
        }
    }

    /// Append a slice of history.
    pub fn push_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// The byte `distance` positions back. Distance 1 is the most recent
    /// byte.
    pub fn byte_at_distance(&self, distance: usize) -> Result<u8> {
        if distance == 0 || distance > self.size {
            return Err(FlateError::invalid_distance(distance, self.size));
        }
        let index = self.position.wrapping_sub(distance) & self.mask;
        Ok(self.buffer[index])
    }

    /// Load dictionary bytes as history.
    ///
    /// Only the last `capacity` bytes of an oversized dictionary are kept,
    /// matching zlib's `deflateSetDictionary` behavior.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) {
        let tail = if dictionary.len() > self.buffer.len() {
            &dictionary[dictionary.len() - self.buffer.len()..]
        } else {
            dictionary
        };
        for &byte in tail {
            self.buffer[self.position] = byte;
            self.position = (self.position + 1) & self.mask;
        }
        self.size = self.size.saturating_add(tail.len()).min(self.buffer.len());
    }
}

/// History buffer paired with a growable output accumulator.
///
/// Every byte emitted goes to both the window (so later back-references
/// can find it) and the output vector (so the caller gets it back).
#[derive(Debug, Clone)]
pub struct OutputRingBuffer {
    ring: RingBuffer,
    output: Vec<u8>,
}

/// Rollback state captured by [`OutputRingBuffer::checkpoint`].
///
/// Holds the window and the output length only, so taking one costs one
/// window copy no matter how much undrained output has piled up.
#[derive(Debug)]
pub struct OutputCheckpoint {
    ring: RingBuffer,
    output_len: usize,
}

impl OutputRingBuffer {
    /// Create with the given window size.
    pub fn new(window_size: usize) -> Self {
        Self {
            ring: RingBuffer::new(window_size),
            output: Vec::new(),
        }
    }

    /// Emit a literal byte.
    #[inline]
    pub fn write_literal(&mut self, byte: u8) {
        self.ring.push(byte);
        self.output.push(byte);
    }

    /// Emit a run of literal bytes.
    pub fn write_literals(&mut self, bytes: &[u8]) {
        self.ring.push_slice(bytes);
        self.output.extend_from_slice(bytes);
    }

    /// Emit a back-reference copy of `length` bytes from `distance` back.
    ///
    /// `length > distance` is the valid overlapping case and produces a
    /// repeating pattern, one source byte at a time.
    pub fn copy_match(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > self.ring.len() {
            return Err(FlateError::invalid_distance(distance, self.ring.len()));
        }

        self.output.reserve(length);

        let mask = self.ring.mask;
        let mut src = self.ring.position.wrapping_sub(distance) & mask;
        for _ in 0..length {
            let byte = self.ring.buffer[src];
            self.ring.push(byte);
            self.output.push(byte);
            src = (src + 1) & mask;
        }

        Ok(())
    }

    /// Total bytes emitted so far.
    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// The accumulated output.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Remove and return up to `max` bytes from the front of the output.
    ///
    /// The window keeps its history, so draining output never invalidates
    /// later back-references.
    pub fn drain_output(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.output.len());
        self.output.drain(..n).collect()
    }

    /// Consume and return the accumulated output.
    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    /// The history window.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Capture the state needed to undo writes made after this point.
    pub fn checkpoint(&self) -> OutputCheckpoint {
        OutputCheckpoint {
            ring: self.ring.clone(),
            output_len: self.output.len(),
        }
    }

    /// Undo every write made since `checkpoint` was taken.
    ///
    /// The output must not have been drained in between.
    pub fn restore(&mut self, checkpoint: OutputCheckpoint) {
        debug_assert!(checkpoint.output_len <= self.output.len());
        self.ring = checkpoint.ring;
        self.output.truncate(checkpoint.output_len);
    }

    /// Load dictionary bytes into the history only; the output is not
    /// affected.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) {
        self.ring.preload_dictionary(dictionary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read_back() {
        let mut ring = RingBuffer::new(8);
        ring.push_slice(b"Hello");

        assert_eq!(ring.len(), 5);
        assert_eq!(ring.byte_at_distance(1).unwrap(), b'o');
        assert_eq!(ring.byte_at_distance(2).unwrap(), b'l');
        assert_eq!(ring.byte_at_distance(5).unwrap(), b'H');
    }

    #[test]
    fn test_wraparound_keeps_newest() {
        let mut ring = RingBuffer::new(4);
        ring.push_slice(b"ABCDEF");

        assert_eq!(ring.len(), 4);
        assert_eq!(ring.byte_at_distance(1).unwrap(), b'F');
        assert_eq!(ring.byte_at_distance(4).unwrap(), b'C');
    }

    #[test]
    fn test_invalid_distances() {
        let ring = RingBuffer::new(32);
        assert!(ring.byte_at_distance(0).is_err());
        assert!(ring.byte_at_distance(1).is_err());
    }

    #[test]
    fn test_copy_match_simple() {
        let mut orb = OutputRingBuffer::new(32);
        orb.write_literals(b"Hello");
        orb.copy_match(5, 5).unwrap();
        assert_eq!(orb.output(), b"HelloHello");
    }

    #[test]
    fn test_copy_match_overlapping() {
        let mut orb = OutputRingBuffer::new(32);
        orb.write_literals(b"AB");
        orb.copy_match(2, 6).unwrap();
        assert_eq!(orb.output(), b"ABABABAB");
    }

    #[test]
    fn test_copy_match_distance_one_run() {
        let mut orb = OutputRingBuffer::new(32);
        orb.write_literal(b'X');
        orb.copy_match(1, 5).unwrap();
        assert_eq!(orb.output(), b"XXXXXX");
    }

    #[test]
    fn test_copy_match_rejects_beyond_history() {
        let mut orb = OutputRingBuffer::new(32);
        orb.write_literals(b"abc");
        let err = orb.copy_match(4, 1).unwrap_err();
        assert!(matches!(err, FlateError::InvalidDistance { .. }));
    }

    #[test]
    fn test_drain_output_preserves_history() {
        let mut orb = OutputRingBuffer::new(32);
        orb.write_literals(b"abcdef");

        let front = orb.drain_output(4);
        assert_eq!(front, b"abcd");
        assert_eq!(orb.output(), b"ef");

        // Back-reference across the drained region still works.
        orb.copy_match(6, 3).unwrap();
        assert_eq!(orb.output(), b"efabc");
    }

    #[test]
    fn test_checkpoint_restore_undoes_writes() {
        let mut orb = OutputRingBuffer::new(32);
        orb.write_literals(b"abc");

        let checkpoint = orb.checkpoint();
        orb.write_literals(b"defgh");
        orb.copy_match(3, 2).unwrap();
        orb.restore(checkpoint);

        assert_eq!(orb.output(), b"abc");
        // The window rolled back too: only "abc" is reachable history.
        orb.copy_match(3, 3).unwrap();
        assert_eq!(orb.output(), b"abcabc");
    }

    #[test]
    fn test_dictionary_preload_enables_backrefs() {
        let mut orb = OutputRingBuffer::new(32);
        orb.preload_dictionary(b"dictionary");
        assert_eq!(orb.output_len(), 0);

        orb.copy_match(4, 4).unwrap();
        assert_eq!(orb.output(), b"nary");
    }

    #[test]
    fn test_oversized_dictionary_keeps_tail() {
        let mut ring = RingBuffer::new(8);
        ring.preload_dictionary(b"0123456789ABCDEF");
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.byte_at_distance(1).unwrap(), b'F');
        assert_eq!(ring.byte_at_distance(8).unwrap(), b'8');
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_non_power_of_two_panics() {
        let _ = RingBuffer::new(100);
    }
}
