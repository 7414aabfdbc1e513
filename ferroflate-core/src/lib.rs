//! # ferroflate-core
//!
//! Core components for the ferroflate DEFLATE codec:
//!
//! - [`bitstream`]: LSB-first bit-level I/O for variable-length codes
//! - [`checksum`]: Adler-32 and CRC-32 rolling checksums
//! - [`ringbuffer`]: 32 KiB sliding-window history for back-references
//! - [`traits`]: push-model `Compressor`/`Decompressor` interfaces
//! - [`error`]: the error taxonomy shared by every layer
//!
//! The codec itself (Huffman coding, LZ77 matching, block framing) lives
//! in the `ferroflate` crate; this crate holds the primitives it is built
//! from.
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_core::bitstream::BitReader;
//! use ferroflate_core::checksum::Crc32;
//! use std::io::Cursor;
//!
//! let mut reader = BitReader::new(Cursor::new(vec![0xAB, 0xCD]));
//! let bits = reader.read_bits(12).unwrap();
//! assert_eq!(bits, 0xDAB);
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod ringbuffer;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use checksum::{Adler32, Crc32};
pub use error::{FlateError, Result};
pub use ringbuffer::{OutputRingBuffer, RingBuffer, DEFLATE_WINDOW};
pub use traits::{
    CompressStatus, CompressionLevel, Compressor, DecompressStatus, Decompressor, FlushMode,
};
