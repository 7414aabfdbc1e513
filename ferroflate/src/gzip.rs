//! Gzip framing (RFC 1952).
//!
//! A gzip member wraps a raw DEFLATE stream with a header carrying the
//! magic bytes `1F 8B`, optional metadata fields (extra data, original
//! filename, comment, header CRC), and an eight-byte trailer: the CRC-32
//! of the uncompressed data followed by its length modulo 2^32, both
//! little-endian.

use crate::deflate::Deflater;
use crate::inflate::Inflater;
use ferroflate_core::checksum::Crc32;
use ferroflate_core::error::{FlateError, Result};
use ferroflate_core::traits::{
    CompressStatus, Compressor, DecompressStatus, Decompressor, FlushMode,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Gzip compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// Header flag bits.
pub mod flags {
    /// Content is probably text.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC-16 present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits 5-7 must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// Gzip member header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// Content is flagged as text (FTEXT).
    pub is_text: bool,
    /// Modification time as a Unix timestamp, 0 for "not available".
    pub mtime: u32,
    /// Extra flags: 2 for maximum compression, 4 for fastest.
    pub xfl: u8,
    /// Originating operating system, 255 for "unknown".
    pub os: u8,
    /// Extra field payload (FEXTRA), excluding the XLEN prefix.
    pub extra: Option<Vec<u8>>,
    /// Original filename (FNAME).
    pub filename: Option<String>,
    /// Comment (FCOMMENT).
    pub comment: Option<String>,
    /// Emit and verify the header CRC-16 (FHCRC).
    pub header_crc: bool,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            is_text: false,
            mtime: 0,
            xfl: 0,
            os: 255,
            extra: None,
            filename: None,
            comment: None,
            header_crc: false,
        }
    }
}

impl GzipHeader {
    /// Create a header with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a header carrying the original filename.
    pub fn with_filename(filename: &str) -> Self {
        Self {
            filename: Some(filename.to_string()),
            ..Self::default()
        }
    }

    /// Set the modification time to now.
    pub fn with_mtime_now(mut self) -> Self {
        self.mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        self
    }

    fn flags(&self) -> u8 {
        let mut f = 0;
        if self.is_text {
            f |= flags::FTEXT;
        }
        if self.header_crc {
            f |= flags::FHCRC;
        }
        if self.extra.is_some() {
            f |= flags::FEXTRA;
        }
        if self.filename.is_some() {
            f |= flags::FNAME;
        }
        if self.comment.is_some() {
            f |= flags::FCOMMENT;
        }
        f
    }

    /// Serialize the header, including the CRC-16 when enabled.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(10);
        bytes.extend_from_slice(&GZIP_MAGIC);
        bytes.push(CM_DEFLATE);
        bytes.push(self.flags());
        bytes.extend_from_slice(&self.mtime.to_le_bytes());
        bytes.push(self.xfl);
        bytes.push(self.os);

        if let Some(ref extra) = self.extra {
            bytes.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            bytes.extend_from_slice(extra);
        }
        if let Some(ref filename) = self.filename {
            bytes.extend_from_slice(filename.as_bytes());
            bytes.push(0);
        }
        if let Some(ref comment) = self.comment {
            bytes.extend_from_slice(comment.as_bytes());
            bytes.push(0);
        }
        if self.header_crc {
            let crc16 = (Crc32::compute(&bytes) & 0xFFFF) as u16;
            bytes.extend_from_slice(&crc16.to_le_bytes());
        }

        bytes
    }

    /// Parse a header from the start of `buf`.
    ///
    /// Returns `None` when the buffer ends before the header does, so
    /// streaming callers can wait for more bytes.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        if buf.len() < 10 {
            return Ok(None);
        }

        if buf[0..2] != GZIP_MAGIC {
            return Err(FlateError::invalid_magic(
                GZIP_MAGIC.to_vec(),
                buf[0..2].to_vec(),
            ));
        }
        if buf[2] != CM_DEFLATE {
            return Err(FlateError::unsupported_method(format!(
                "gzip compression method {}",
                buf[2]
            )));
        }

        let flg = buf[3];
        if flg & flags::RESERVED != 0 {
            return Err(FlateError::invalid_header(format!(
                "reserved gzip flag bits set: {flg:#04x}"
            )));
        }

        let mtime = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let xfl = buf[8];
        let os = buf[9];
        let mut pos = 10;

        let extra = if flg & flags::FEXTRA != 0 {
            if buf.len() < pos + 2 {
                return Ok(None);
            }
            let xlen = u16::from_le_bytes([buf[pos], buf[pos + 1]]) as usize;
            pos += 2;
            if buf.len() < pos + xlen {
                return Ok(None);
            }
            let extra = buf[pos..pos + xlen].to_vec();
            pos += xlen;
            Some(extra)
        } else {
            None
        };

        let filename = if flg & flags::FNAME != 0 {
            match read_null_terminated(buf, &mut pos) {
                Some(s) => Some(s),
                None => return Ok(None),
            }
        } else {
            None
        };

        let comment = if flg & flags::FCOMMENT != 0 {
            match read_null_terminated(buf, &mut pos) {
                Some(s) => Some(s),
                None => return Ok(None),
            }
        } else {
            None
        };

        if flg & flags::FHCRC != 0 {
            if buf.len() < pos + 2 {
                return Ok(None);
            }
            let stored = u16::from_le_bytes([buf[pos], buf[pos + 1]]);
            let computed = (Crc32::compute(&buf[..pos]) & 0xFFFF) as u16;
            if stored != computed {
                return Err(FlateError::checksum_mismatch(
                    u32::from(stored),
                    u32::from(computed),
                ));
            }
            pos += 2;
        }

        let header = Self {
            is_text: flg & flags::FTEXT != 0,
            mtime,
            xfl,
            os,
            extra,
            filename,
            comment,
            header_crc: flg & flags::FHCRC != 0,
        };
        Ok(Some((header, pos)))
    }
}

fn read_null_terminated(buf: &[u8], pos: &mut usize) -> Option<String> {
    let terminator = buf[*pos..].iter().position(|&b| b == 0)?;
    let s = String::from_utf8_lossy(&buf[*pos..*pos + terminator]).into_owned();
    *pos += terminator + 1;
    Some(s)
}

/// XFL hint for a compression level.
fn xfl_for_level(level: u8) -> u8 {
    match level {
        0..=1 => 4,
        9 => 2,
        _ => 0,
    }
}

/// Streaming gzip compressor.
#[derive(Debug)]
pub struct GzipEncoder {
    deflater: Deflater,
    crc: Crc32,
    /// Uncompressed length modulo 2^32 for the ISIZE field.
    isize: u32,
    header: GzipHeader,
    staged: Vec<u8>,
    header_written: bool,
    trailer_written: bool,
}

impl GzipEncoder {
    /// Create an encoder for the given compression level (0-9).
    pub fn new(level: u8) -> Result<Self> {
        let mut header = GzipHeader::new();
        header.xfl = xfl_for_level(level);
        Self::with_header(header, level)
    }

    /// Create an encoder writing a caller-supplied header.
    pub fn with_header(header: GzipHeader, level: u8) -> Result<Self> {
        Ok(Self {
            deflater: Deflater::new(level)?,
            crc: Crc32::new(),
            isize: 0,
            header,
            staged: Vec::new(),
            header_written: false,
            trailer_written: false,
        })
    }
}

impl Compressor for GzipEncoder {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        if !self.header_written {
            self.staged.extend_from_slice(&self.header.to_bytes());
            self.header_written = true;
        }

        let mut consumed = 0;
        if !self.trailer_written {
            let mut scratch = vec![0u8; 32768];
            let mut remaining = input;
            loop {
                let (used, produced, status) =
                    self.deflater.compress(remaining, &mut scratch, flush)?;
                self.crc.update(&remaining[..used]);
                self.isize = self.isize.wrapping_add(used as u32);
                consumed += used;
                remaining = &remaining[used..];
                self.staged.extend_from_slice(&scratch[..produced]);

                match status {
                    CompressStatus::NeedsOutput => continue,
                    CompressStatus::Done => {
                        self.staged.extend_from_slice(&self.crc.value().to_le_bytes());
                        self.staged.extend_from_slice(&self.isize.to_le_bytes());
                        self.trailer_written = true;
                        break;
                    }
                    CompressStatus::NeedsInput => break,
                }
            }
        }

        let take = self.staged.len().min(output.len());
        output[..take].copy_from_slice(&self.staged[..take]);
        self.staged.drain(..take);

        let status = if !self.staged.is_empty() {
            CompressStatus::NeedsOutput
        } else if self.trailer_written {
            CompressStatus::Done
        } else {
            CompressStatus::NeedsInput
        };

        Ok((consumed, take, status))
    }

    fn reset(&mut self) {
        self.deflater.reset();
        self.crc.reset();
        self.isize = 0;
        self.staged.clear();
        self.header_written = false;
        self.trailer_written = false;
    }

    fn is_finished(&self) -> bool {
        self.trailer_written && self.staged.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Header,
    Body,
    Trailer,
    Done,
}

/// Streaming gzip decompressor.
///
/// The parsed header becomes available through [`GzipDecoder::header`]
/// once enough input has arrived.
#[derive(Debug)]
pub struct GzipDecoder {
    inflater: Inflater,
    crc: Crc32,
    isize: u32,
    state: DecodeState,
    frame_buf: Vec<u8>,
    header: Option<GzipHeader>,
}

impl GzipDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            inflater: Inflater::new(),
            crc: Crc32::new(),
            isize: 0,
            state: DecodeState::Header,
            frame_buf: Vec::new(),
            header: None,
        }
    }

    /// The member header, once it has been parsed.
    pub fn header(&self) -> Option<&GzipHeader> {
        self.header.as_ref()
    }

    fn parse_trailer(&mut self) -> Result<()> {
        let stored_crc = u32::from_le_bytes([
            self.frame_buf[0],
            self.frame_buf[1],
            self.frame_buf[2],
            self.frame_buf[3],
        ]);
        let stored_isize = u32::from_le_bytes([
            self.frame_buf[4],
            self.frame_buf[5],
            self.frame_buf[6],
            self.frame_buf[7],
        ]);
        self.frame_buf.clear();

        let computed = self.crc.value();
        if stored_crc != computed {
            return Err(FlateError::checksum_mismatch(stored_crc, computed));
        }
        if stored_isize != self.isize {
            return Err(FlateError::corrupted(
                0,
                format!(
                    "ISIZE mismatch: header says {stored_isize}, produced {} bytes",
                    self.isize
                ),
            ));
        }
        self.state = DecodeState::Done;
        Ok(())
    }
}

impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for GzipDecoder {
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)> {
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            match self.state {
                DecodeState::Header => {
                    // Header length is unknown up front, so buffer
                    // everything and re-parse as bytes arrive.
                    self.frame_buf.extend_from_slice(&input[consumed..]);
                    consumed = input.len();

                    match GzipHeader::parse(&self.frame_buf)? {
                        Some((header, header_len)) => {
                            self.header = Some(header);
                            // Bytes past the header were already counted
                            // as consumed; they stay stashed and feed the
                            // inflater from the Body state.
                            self.frame_buf.drain(..header_len);
                            self.state = DecodeState::Body;
                        }
                        None => break,
                    }
                }
                DecodeState::Body if !self.frame_buf.is_empty() => {
                    // Stashed bytes go first. Whatever the inflater hands
                    // back stays stashed; once the stream ends, the
                    // leftover is the start of the trailer.
                    let stash = std::mem::take(&mut self.frame_buf);
                    let (used, written, status) =
                        self.inflater.decompress(&stash, &mut output[produced..])?;
                    self.crc.update(&output[produced..produced + written]);
                    self.isize = self.isize.wrapping_add(written as u32);
                    produced += written;
                    self.frame_buf.extend_from_slice(&stash[used..]);

                    match status {
                        DecompressStatus::Done => self.state = DecodeState::Trailer,
                        DecompressStatus::NeedsOutput => {
                            return Ok((consumed, produced, DecompressStatus::NeedsOutput));
                        }
                        DecompressStatus::NeedsInput => {}
                    }
                }
                DecodeState::Body => {
                    let (used, written, status) = self
                        .inflater
                        .decompress(&input[consumed..], &mut output[produced..])?;
                    self.crc.update(&output[produced..produced + written]);
                    self.isize = self.isize.wrapping_add(written as u32);
                    consumed += used;
                    produced += written;

                    match status {
                        DecompressStatus::Done => self.state = DecodeState::Trailer,
                        DecompressStatus::NeedsOutput => {
                            return Ok((consumed, produced, DecompressStatus::NeedsOutput));
                        }
                        DecompressStatus::NeedsInput => break,
                    }
                }
                DecodeState::Trailer => {
                    let take = 8usize
                        .saturating_sub(self.frame_buf.len())
                        .min(input.len() - consumed);
                    self.frame_buf
                        .extend_from_slice(&input[consumed..consumed + take]);
                    consumed += take;
                    if self.frame_buf.len() < 8 {
                        break;
                    }
                    self.parse_trailer()?;
                }
                DecodeState::Done => break,
            }
        }

        let status = if self.state == DecodeState::Done {
            DecompressStatus::Done
        } else {
            DecompressStatus::NeedsInput
        };
        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        self.inflater.reset();
        self.crc.reset();
        self.isize = 0;
        self.state = DecodeState::Header;
        self.frame_buf.clear();
        self.header = None;
    }

    fn is_finished(&self) -> bool {
        self.state == DecodeState::Done
    }
}

/// Compress a buffer into a gzip member in one call.
pub fn gzip_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    GzipEncoder::new(level)?.compress_all(input)
}

/// Compress a buffer into a gzip member carrying the original filename
/// and the current time.
pub fn gzip_compress_with_filename(input: &[u8], filename: &str, level: u8) -> Result<Vec<u8>> {
    let mut header = GzipHeader::with_filename(filename).with_mtime_now();
    header.xfl = xfl_for_level(level);
    GzipEncoder::with_header(header, level)?.compress_all(input)
}

/// Compress a buffer into a gzip member with a caller-supplied header.
pub fn gzip_compress_with_header(input: &[u8], header: GzipHeader, level: u8) -> Result<Vec<u8>> {
    GzipEncoder::with_header(header, level)?.compress_all(input)
}

/// Decompress a complete gzip member in one call.
pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>> {
    GzipDecoder::new().decompress_all(input)
}

/// Parse just the member header from the start of a gzip stream.
///
/// Returns `None` if `input` ends before the header does.
pub fn gzip_header(input: &[u8]) -> Result<Option<GzipHeader>> {
    Ok(GzipHeader::parse(input)?.map(|(header, _)| header))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_defaults() {
        let header = GzipHeader::new();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..2], &GZIP_MAGIC);
        assert_eq!(bytes[2], CM_DEFLATE);
        assert_eq!(bytes[3], 0);
        assert_eq!(bytes[9], 255);
    }

    #[test]
    fn test_header_roundtrip_all_fields() {
        let header = GzipHeader {
            is_text: true,
            mtime: 1_700_000_000,
            xfl: 2,
            os: 3,
            extra: Some(vec![1, 2, 3, 4]),
            filename: Some("archive.tar".to_string()),
            comment: Some("nightly backup".to_string()),
            header_crc: true,
        };

        let bytes = header.to_bytes();
        let (parsed, len) = GzipHeader::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, header);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn test_header_partial_returns_none() {
        let header = GzipHeader::with_filename("a-rather-long-filename.bin");
        let bytes = header.to_bytes();

        for cut in 0..bytes.len() {
            assert!(
                GzipHeader::parse(&bytes[..cut]).unwrap().is_none(),
                "cut at {cut} should ask for more bytes"
            );
        }
    }

    #[test]
    fn test_bad_magic() {
        let err = GzipHeader::parse(&[0x50, 0x4B, 8, 0, 0, 0, 0, 0, 0, 255]).unwrap_err();
        assert!(matches!(err, FlateError::InvalidMagic { .. }));
    }

    #[test]
    fn test_bad_method() {
        let err = GzipHeader::parse(&[0x1F, 0x8B, 7, 0, 0, 0, 0, 0, 0, 255]).unwrap_err();
        assert!(matches!(err, FlateError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_reserved_flags_rejected() {
        let err = GzipHeader::parse(&[0x1F, 0x8B, 8, 0x20, 0, 0, 0, 0, 0, 255]).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_header_crc_detects_corruption() {
        let header = GzipHeader {
            filename: Some("x".to_string()),
            header_crc: true,
            ..GzipHeader::default()
        };
        let mut bytes = header.to_bytes();
        bytes[10] ^= 0xFF; // flip a filename byte after the CRC was taken

        let err = GzipHeader::parse(&bytes).unwrap_err();
        assert!(matches!(err, FlateError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_roundtrip() {
        let data = b"Hello, gzip! Hello, gzip! Hello, gzip!";
        let compressed = gzip_compress(data, 6).unwrap();
        assert_eq!(gzip_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let compressed = gzip_compress(b"", 6).unwrap();
        assert!(gzip_decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip_with_filename() {
        let data = b"named payload";
        let compressed = gzip_compress_with_filename(data, "data.txt", 6).unwrap();

        let mut decoder = GzipDecoder::new();
        let result = decoder.decompress_all(&compressed).unwrap();
        assert_eq!(result, data);
        assert_eq!(
            decoder.header().and_then(|h| h.filename.as_deref()),
            Some("data.txt")
        );
    }

    #[test]
    fn test_xfl_tracks_level() {
        assert_eq!(gzip_compress(b"x", 1).unwrap()[8], 4);
        assert_eq!(gzip_compress(b"x", 9).unwrap()[8], 2);
        assert_eq!(gzip_compress(b"x", 6).unwrap()[8], 0);
    }

    #[test]
    fn test_corrupt_crc_detected() {
        let mut compressed = gzip_compress(b"check this payload", 6).unwrap();
        let crc_at = compressed.len() - 8;
        compressed[crc_at] ^= 0xFF;

        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(matches!(err, FlateError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_corrupt_isize_detected() {
        let mut compressed = gzip_compress(b"check this payload", 6).unwrap();
        let isize_at = compressed.len() - 1;
        compressed[isize_at] ^= 0xFF;

        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(matches!(err, FlateError::CorruptedData { .. }));
    }

    #[test]
    fn test_truncated_member() {
        let compressed = gzip_compress(b"truncate me", 6).unwrap();
        let err = gzip_decompress(&compressed[..compressed.len() - 3]).unwrap_err();
        assert!(err.is_underrun());
    }

    #[test]
    fn test_streaming_chunked_input() {
        let mut data = Vec::new();
        while data.len() < 50_000 {
            data.extend_from_slice(b"gzip streaming payload chunk ");
        }
        let compressed = gzip_compress(&data, 6).unwrap();

        let mut decoder = GzipDecoder::new();
        let mut result = Vec::new();
        let mut out = [0u8; 4096];

        for chunk in compressed.chunks(113) {
            let mut pos = 0;
            loop {
                let (used, written, status) = decoder.decompress(&chunk[pos..], &mut out).unwrap();
                pos += used;
                result.extend_from_slice(&out[..written]);
                if status != DecompressStatus::NeedsOutput && pos >= chunk.len() {
                    break;
                }
            }
        }

        assert_eq!(result, data);
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_whole_member_with_small_output_buffers() {
        // The entire member arrives in one call while the caller drains
        // through a small buffer; undecoded bytes wait in the stash.
        let mut data = Vec::new();
        while data.len() < 300_000 {
            data.extend_from_slice(b"gzip member with buffered reads ");
        }
        let compressed = gzip_compress(&data, 6).unwrap();

        let mut decoder = GzipDecoder::new();
        let mut result = Vec::new();
        let mut out = [0u8; 512];
        let mut pos = 0;
        loop {
            let (used, written, status) = decoder.decompress(&compressed[pos..], &mut out).unwrap();
            pos += used;
            result.extend_from_slice(&out[..written]);
            if status == DecompressStatus::Done {
                break;
            }
        }

        assert_eq!(result, data);
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_large_repetitive_data_compresses() {
        let data = vec![b'A'; 10000];
        let compressed = gzip_compress(&data, 9).unwrap();
        assert!(compressed.len() < data.len() / 10);
        assert_eq!(gzip_decompress(&compressed).unwrap(), data);
    }
}
