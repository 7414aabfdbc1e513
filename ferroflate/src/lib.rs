//! # ferroflate
//!
//! Pure Rust DEFLATE (RFC 1951) compression and decompression, with zlib
//! (RFC 1950) and gzip (RFC 1952) stream framing.
//!
//! The simplest entry points are the one-shot [`compress`] and
//! [`decompress`] functions. Streaming callers use the per-format codec
//! objects ([`Deflater`]/[`Inflater`], [`ZlibEncoder`]/[`ZlibDecoder`],
//! [`GzipEncoder`]/[`GzipDecoder`]) behind the `Compressor` and
//! `Decompressor` traits from `ferroflate-core`.
//!
//! ## Example
//!
//! ```rust
//! use ferroflate::{compress, decompress, Format, Options};
//!
//! let data = b"Hello, World! Hello, World!";
//! let compressed = compress(data, &Options::default()).unwrap();
//! let restored = decompress(&compressed, Format::Zlib).unwrap();
//! assert_eq!(&restored, data);
//! ```
//!
//! ## Compression levels
//!
//! - Level 0: no compression (stored blocks)
//! - Levels 1-3: fast, shallow match search
//! - Levels 4-6: balanced (default is 6)
//! - Levels 7-9: best compression, deepest search

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod deflate;
pub mod gzip;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;
pub mod zlib;

pub use deflate::{deflate, Deflater};
pub use gzip::{
    gzip_compress, gzip_compress_with_filename, gzip_compress_with_header, gzip_decompress,
    gzip_header, GzipDecoder, GzipEncoder, GzipHeader,
};
pub use huffman::{CanonicalCode, HuffmanTree};
pub use inflate::{inflate, Inflater};
pub use lz77::{Lz77Encoder, Token};
pub use zlib::{
    zlib_compress, zlib_compress_with_dict, zlib_decompress, zlib_decompress_with_dict,
    zlib_requires_dictionary, ZlibDecoder, ZlibEncoder,
};

pub use ferroflate_core::error::{FlateError, Result};
pub use ferroflate_core::traits::{
    CompressStatus, CompressionLevel, Compressor, DecompressStatus, Decompressor, FlushMode,
};

/// Stream framing around the DEFLATE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Bare DEFLATE bit stream, no header or checksum.
    Raw,
    /// zlib framing: 2-byte header plus Adler-32 trailer (RFC 1950).
    #[default]
    Zlib,
    /// gzip framing: 10+ byte header plus CRC-32/ISIZE trailer (RFC 1952).
    Gzip,
}

/// One-shot compression options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Compression level, 0 (store) through 9 (best).
    pub level: u8,
    /// Stream framing.
    pub format: Format,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            level: 6,
            format: Format::Zlib,
        }
    }
}

/// Compress a buffer with the given options.
pub fn compress(data: &[u8], options: &Options) -> Result<Vec<u8>> {
    if options.level > 9 {
        return Err(FlateError::invalid_parameter(format!(
            "compression level {} out of range (0-9)",
            options.level
        )));
    }

    match options.format {
        Format::Raw => deflate::deflate(data, options.level),
        Format::Zlib => zlib::zlib_compress(data, options.level),
        Format::Gzip => gzip::gzip_compress(data, options.level),
    }
}

/// Decompress a complete stream in the given format.
pub fn decompress(data: &[u8], format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Raw => inflate::inflate(data),
        Format::Zlib => zlib::zlib_decompress(data),
        Format::Gzip => gzip::gzip_decompress(data),
    }
}
