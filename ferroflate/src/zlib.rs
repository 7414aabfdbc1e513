//! Zlib framing (RFC 1950).
//!
//! The zlib format wraps a raw DEFLATE stream with a two-byte header and
//! a big-endian Adler-32 trailer:
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: CM (bits 0-3, must be 8 for DEFLATE) and CINFO (bits 4-7,
//!   log2(window) - 8)
//! - FLG: FCHECK (bits 0-4, makes CMF*256+FLG divisible by 31), FDICT
//!   (bit 5), FLEVEL (bits 6-7, advisory)
//!
//! With FDICT set, the Adler-32 of the preset dictionary follows the
//! header so the decompressor can verify it has the right one.

use crate::deflate::Deflater;
use crate::inflate::Inflater;
use ferroflate_core::checksum::Adler32;
use ferroflate_core::error::{FlateError, Result};
use ferroflate_core::traits::{
    CompressStatus, Compressor, DecompressStatus, Decompressor, FlushMode,
};

/// Largest preset dictionary zlib can use (one window).
pub const MAX_DICTIONARY_SIZE: usize = 32768;

/// CM=8 (DEFLATE), CINFO=7 (32 KiB window).
const CMF: u8 = 0x78;

/// Advisory FLEVEL field for a compression level.
fn flevel(level: u8) -> u8 {
    match level {
        0..=1 => 0,
        2..=5 => 1,
        6 => 2,
        _ => 3,
    }
}

/// Build the CMF/FLG header pair.
fn header(level: u8, fdict: bool) -> [u8; 2] {
    let flg_high = (flevel(level) << 6) | (u8::from(fdict) << 5);
    let base = u16::from(CMF) * 256 + u16::from(flg_high);
    let fcheck = ((31 - base % 31) % 31) as u8;
    [CMF, flg_high | fcheck]
}

/// Streaming zlib compressor.
///
/// Wraps [`Deflater`] and adds the header, the running Adler-32 of the
/// uncompressed data, and the trailer when the stream finishes.
#[derive(Debug)]
pub struct ZlibEncoder {
    deflater: Deflater,
    adler: Adler32,
    /// Encoded bytes awaiting pickup by the caller.
    staged: Vec<u8>,
    header_written: bool,
    trailer_written: bool,
    /// Dictionary checksum for the header when FDICT is set.
    dictionary_checksum: Option<u32>,
}

impl ZlibEncoder {
    /// Create an encoder for the given compression level (0-9).
    pub fn new(level: u8) -> Result<Self> {
        Ok(Self {
            deflater: Deflater::new(level)?,
            adler: Adler32::new(),
            staged: Vec::new(),
            header_written: false,
            trailer_written: false,
            dictionary_checksum: None,
        })
    }

    /// Create an encoder with a preset dictionary.
    ///
    /// The header carries FDICT plus the dictionary's Adler-32 so the
    /// decompressor can check it was given the same bytes.
    pub fn with_dictionary(level: u8, dictionary: &[u8]) -> Result<Self> {
        let mut encoder = Self::new(level)?;
        encoder.deflater.preload_dictionary(dictionary)?;
        encoder.dictionary_checksum = encoder.deflater.dictionary_checksum();
        Ok(encoder)
    }

    fn write_header(&mut self) {
        let fdict = self.dictionary_checksum.is_some();
        self.staged
            .extend_from_slice(&header(self.deflater.level(), fdict));
        if let Some(checksum) = self.dictionary_checksum {
            self.staged.extend_from_slice(&checksum.to_be_bytes());
        }
        self.header_written = true;
    }
}

impl Compressor for ZlibEncoder {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        if !self.header_written {
            self.write_header();
        }

        let mut consumed = 0;
        if !self.trailer_written {
            let mut scratch = vec![0u8; 32768];
            let mut remaining = input;
            loop {
                let (used, produced, status) =
                    self.deflater.compress(remaining, &mut scratch, flush)?;
                self.adler.update(&remaining[..used]);
                consumed += used;
                remaining = &remaining[used..];
                self.staged.extend_from_slice(&scratch[..produced]);

                match status {
                    CompressStatus::NeedsOutput => continue,
                    CompressStatus::Done => {
                        self.staged.extend_from_slice(&self.adler.value().to_be_bytes());
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
        self.adler.reset();
        self.staged.clear();
        self.header_written = false;
        self.trailer_written = false;
        // The dictionary does not survive a reset; the window is gone.
        self.dictionary_checksum = None;
    }

    fn is_finished(&self) -> bool {
        self.trailer_written && self.staged.is_empty()
    }
}

/// Decoder position within the zlib frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Header,
    DictId,
    Body,
    Trailer,
    Done,
}

/// Streaming zlib decompressor.
///
/// Validates the header, inflates the body while keeping a running
/// Adler-32 of the produced bytes, and checks the trailer.
#[derive(Debug)]
pub struct ZlibDecoder {
    inflater: Inflater,
    adler: Adler32,
    state: DecodeState,
    /// Partial header or trailer bytes across call boundaries.
    frame_buf: Vec<u8>,
    dictionary: Option<Vec<u8>>,
}

impl ZlibDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            inflater: Inflater::new(),
            adler: Adler32::new(),
            state: DecodeState::Header,
            frame_buf: Vec::new(),
            dictionary: None,
        }
    }

    /// Create a decoder holding a preset dictionary.
    ///
    /// The dictionary is used only if the stream header sets FDICT, and
    /// its Adler-32 must match the identifier in the header.
    pub fn with_dictionary(dictionary: &[u8]) -> Self {
        let mut decoder = Self::new();
        decoder.dictionary = Some(dictionary.to_vec());
        decoder
    }

    /// Accumulate up to `need` frame bytes, returning how many were taken
    /// from `input` and whether the buffer is now complete.
    fn fill_frame_buf(&mut self, input: &[u8], need: usize) -> (usize, bool) {
        let take = (need - self.frame_buf.len()).min(input.len());
        self.frame_buf.extend_from_slice(&input[..take]);
        (take, self.frame_buf.len() == need)
    }

    fn parse_header(&mut self) -> Result<()> {
        let cmf = self.frame_buf[0];
        let flg = self.frame_buf[1];
        self.frame_buf.clear();

        if cmf & 0x0F != 8 {
            return Err(FlateError::unsupported_method(format!(
                "zlib compression method {}",
                cmf & 0x0F
            )));
        }
        if cmf >> 4 > 7 {
            return Err(FlateError::invalid_header(format!(
                "zlib window size CINFO={} exceeds 7",
                cmf >> 4
            )));
        }
        if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
            return Err(FlateError::invalid_header("zlib header check failed"));
        }

        if (flg >> 5) & 1 == 1 {
            if self.dictionary.is_none() {
                return Err(FlateError::invalid_header(
                    "stream requires a preset dictionary",
                ));
            }
            self.state = DecodeState::DictId;
        } else {
            self.state = DecodeState::Body;
        }
        Ok(())
    }

    fn parse_dict_id(&mut self) -> Result<()> {
        let stored = u32::from_be_bytes([
            self.frame_buf[0],
            self.frame_buf[1],
            self.frame_buf[2],
            self.frame_buf[3],
        ]);
        self.frame_buf.clear();

        let dictionary = self.dictionary.as_deref().unwrap_or(&[]);
        let computed = Adler32::compute(dictionary);
        if stored != computed {
            return Err(FlateError::checksum_mismatch(stored, computed));
        }

        self.inflater = Inflater::with_dictionary(dictionary);
        self.state = DecodeState::Body;
        Ok(())
    }

    fn parse_trailer(&mut self) -> Result<()> {
        let stored = u32::from_be_bytes([
            self.frame_buf[0],
            self.frame_buf[1],
            self.frame_buf[2],
            self.frame_buf[3],
        ]);
        self.frame_buf.clear();

        let computed = self.adler.value();
        if stored != computed {
            return Err(FlateError::checksum_mismatch(stored, computed));
        }
        self.state = DecodeState::Done;
        Ok(())
    }
}

impl Default for ZlibDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for ZlibDecoder {
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
                    let (take, complete) = self.fill_frame_buf(&input[consumed..], 2);
                    consumed += take;
                    if !complete {
                        break;
                    }
                    self.parse_header()?;
                }
                DecodeState::DictId => {
                    let (take, complete) = self.fill_frame_buf(&input[consumed..], 4);
                    consumed += take;
                    if !complete {
                        break;
                    }
                    self.parse_dict_id()?;
                }
                DecodeState::Body => {
                    let (used, written, status) = self
                        .inflater
                        .decompress(&input[consumed..], &mut output[produced..])?;
                    self.adler.update(&output[produced..produced + written]);
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
                    let (take, complete) = self.fill_frame_buf(&input[consumed..], 4);
                    consumed += take;
                    if !complete {
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
        self.adler.reset();
        self.state = DecodeState::Header;
        self.frame_buf.clear();
    }

    fn is_finished(&self) -> bool {
        self.state == DecodeState::Done
    }
}

/// Compress a buffer into a zlib stream in one call.
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    ZlibEncoder::new(level)?.compress_all(input)
}

/// Compress a buffer into a zlib stream with a preset dictionary.
pub fn zlib_compress_with_dict(input: &[u8], level: u8, dictionary: &[u8]) -> Result<Vec<u8>> {
    ZlibEncoder::with_dictionary(level, dictionary)?.compress_all(input)
}

/// Decompress a complete zlib stream in one call.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    ZlibDecoder::new().decompress_all(input)
}

/// Decompress a complete zlib stream using a preset dictionary.
pub fn zlib_decompress_with_dict(input: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    ZlibDecoder::with_dictionary(dictionary).decompress_all(input)
}

/// Whether a zlib stream declares a preset dictionary, and if so the
/// Adler-32 of the dictionary it expects.
pub fn zlib_requires_dictionary(input: &[u8]) -> Option<u32> {
    if input.len() < 6 {
        return None;
    }
    if (input[1] >> 5) & 1 == 1 {
        Some(u32::from_be_bytes([input[2], input[3], input[4], input[5]]))
    } else {
        None
    }
}
