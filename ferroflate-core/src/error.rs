//! Error types for ferroflate operations.
//!
//! Fatal conditions (corrupt streams, checksum mismatches, bad parameters)
//! surface through [`FlateError`]. Flow-control conditions such as "needs
//! more input" or "needs more output space" are *not* errors; they are
//! reported through the status enums in [`crate::traits`]. The one
//! exception is [`FlateError::UnexpectedEof`], which the bit reader uses to
//! signal input underrun so the streaming layer can translate it into a
//! `NeedsInput` status.

use std::io;
use thiserror::Error;

/// The main error type for ferroflate operations.
#[derive(Debug, Error)]
pub enum FlateError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic number in a stream header.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// Unsupported compression method in a stream header.
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The compression method identifier.
        method: String,
    },

    /// Trailer checksum (Adler-32, CRC-32) or length field mismatch.
    #[error("Checksum mismatch: expected {expected:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        /// Expected value from the stream.
        expected: u32,
        /// Value computed from the data.
        computed: u32,
    },

    /// Invalid Huffman code encountered during decompression.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Corrupted data in the compressed stream.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Invalid header format.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Unexpected end of input.
    ///
    /// Streaming callers treat this as "feed more bytes"; one-shot callers
    /// treat it as truncation.
    #[error("Unexpected end of input: expected {expected} more bytes")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },

    /// Invalid distance in an LZ77 back-reference.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Current history buffer size.
        history_size: usize,
    },

    /// Caller supplied an invalid parameter (compression level, dictionary).
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the parameter error.
        message: String,
    },
}

/// Result type alias for ferroflate operations.
pub type Result<T> = std::result::Result<T, FlateError>;

impl FlateError {
    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Whether this error means "the input ran out", as opposed to a
    /// structural problem with the stream.
    pub fn is_underrun(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlateError::invalid_magic(vec![0x1F, 0x8B], vec![0x50, 0x4B]);
        assert!(err.to_string().contains("Invalid magic"));

        let err = FlateError::checksum_mismatch(0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("Checksum mismatch"));

        let err = FlateError::invalid_parameter("compression level 12 out of range");
        assert!(err.to_string().contains("level 12"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: FlateError = io_err.into();
        assert!(matches!(err, FlateError::Io(_)));
    }

    #[test]
    fn test_underrun_classification() {
        assert!(FlateError::unexpected_eof(4).is_underrun());
        assert!(!FlateError::invalid_header("bad").is_underrun());
    }
}
