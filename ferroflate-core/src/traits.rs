//! Streaming codec traits.
//!
//! Compression and decompression both follow a push model: the caller
//! hands in an input slice and an output buffer, the codec reports how
//! much of each it used and a status telling the caller what to do next.
//! No call blocks waiting for data; "not enough input" and "output full"
//! are ordinary statuses, not errors.

use crate::error::{FlateError, Result};

/// Status of a streaming decompression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressStatus {
    /// The input was exhausted before the stream ended; feed more bytes.
    NeedsInput,
    /// The output buffer filled up; drain it and call again.
    NeedsOutput,
    /// The stream ended and all checks passed.
    Done,
}

/// Status of a streaming compression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressStatus {
    /// The codec can accept more input.
    NeedsInput,
    /// The output buffer filled up; drain it and call again.
    NeedsOutput,
    /// The stream was finalized.
    Done,
}

/// Flush behavior for a compression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Buffer freely for the best compression.
    #[default]
    None,
    /// No more input will arrive; emit everything and terminate the
    /// stream.
    Finish,
}

/// A streaming decompressor.
///
/// Calls are incremental: state carries over between them, so input may
/// be split at arbitrary byte boundaries. Once a call returns a fatal
/// error the stream is dead and every later call fails.
pub trait Decompressor {
    /// Decompress bytes from `input` into `output`.
    ///
    /// Returns `(consumed, produced, status)`: how many input bytes were
    /// accepted, how many output bytes were written, and what the caller
    /// should do next.
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)>;

    /// Reset to the initial state, ready for a new stream.
    fn reset(&mut self);

    /// Whether the end of the stream was reached.
    fn is_finished(&self) -> bool;

    /// Decompress a complete stream held in memory.
    ///
    /// Input that runs dry before the stream terminator is truncation and
    /// fails with [`FlateError::UnexpectedEof`].
    fn decompress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) = self.decompress(&input[pos..], &mut buffer)?;
            pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            match status {
                DecompressStatus::Done => break,
                DecompressStatus::NeedsInput if pos >= input.len() => {
                    return Err(FlateError::unexpected_eof(1));
                }
                DecompressStatus::NeedsInput | DecompressStatus::NeedsOutput => continue,
            }
        }

        Ok(output)
    }
}

/// A streaming compressor.
pub trait Compressor {
    /// Compress bytes from `input` into `output`.
    ///
    /// Returns `(consumed, produced, status)`. With
    /// [`FlushMode::Finish`] the codec flushes all buffered data and
    /// terminates the stream; keep calling until `Done`.
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)>;

    /// Reset to the initial state, ready for a new stream.
    fn reset(&mut self);

    /// Whether the stream was finalized.
    fn is_finished(&self) -> bool;

    /// Compress a complete buffer in one call.
    fn compress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let flush = if pos >= input.len() {
                FlushMode::Finish
            } else {
                FlushMode::None
            };

            let (consumed, produced, status) =
                self.compress(&input[pos..], &mut buffer, flush)?;
            pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            if status == CompressStatus::Done {
                break;
            }
        }

        Ok(output)
    }
}

/// Compression effort level, 0 (store) through 9 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// No compression: stored blocks only.
    pub const NONE: Self = Self(0);
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Balanced default.
    pub const DEFAULT: Self = Self(6);
    /// Best compression, slowest.
    pub const BEST: Self = Self(9);

    /// Create a level, rejecting values above 9.
    pub fn new(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(FlateError::invalid_parameter(format!(
                "compression level {level} out of range (0-9)"
            )));
        }
        Ok(Self(level))
    }

    /// The numeric level.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level_constants() {
        assert_eq!(CompressionLevel::NONE.level(), 0);
        assert_eq!(CompressionLevel::FAST.level(), 1);
        assert_eq!(CompressionLevel::DEFAULT.level(), 6);
        assert_eq!(CompressionLevel::BEST.level(), 9);
    }

    #[test]
    fn test_compression_level_range() {
        assert_eq!(CompressionLevel::new(3).unwrap().level(), 3);
        assert!(matches!(
            CompressionLevel::new(10),
            Err(FlateError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_flush_mode_default() {
        assert_eq!(FlushMode::default(), FlushMode::None);
    }
}
