//! DEFLATE decompression (RFC 1951).
//!
//! [`Inflater`] decodes all three block types: stored, fixed Huffman, and
//! dynamic Huffman. The push-model [`Decompressor`] impl buffers raw
//! input and decodes one whole block at a time: if the buffered bytes run
//! out mid-block the attempt is rolled back and the caller gets
//! `NeedsInput`, so input may be split at any byte boundary. Decoding
//! pauses once pending output reaches a cap, handing unread input back to
//! the caller instead of growing without bound. A structural error
//! poisons the stream permanently.

use crate::huffman::HuffmanTree;
use crate::tables::{
    decode_distance, decode_length, fixed_distance_tree, fixed_litlen_tree, CODE_LENGTH_ORDER,
    DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS,
};
use ferroflate_core::bitstream::BitReader;
use ferroflate_core::checksum::Adler32;
use ferroflate_core::error::{FlateError, Result};
use ferroflate_core::ringbuffer::{OutputRingBuffer, DEFLATE_WINDOW};
use ferroflate_core::traits::{DecompressStatus, Decompressor};
use std::io::Cursor;

/// Decoded-but-undrained output cap. Decoding pauses past this point so a
/// slowly-drained stream never pulls its whole decoded form into memory.
/// A single oversized block can still overshoot, since blocks decode
/// atomically.
const PENDING_OUTPUT_LIMIT: usize = 2 * DEFLATE_WINDOW;

/// Why block decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeStop {
    /// Mid-block underrun; more input is required.
    NeedsInput,
    /// Pending output reached the cap; drain before decoding more.
    OutputFull,
    /// The final block has been decoded.
    Finished,
}

/// DEFLATE decompressor.
#[derive(Debug)]
pub struct Inflater {
    /// Window plus pending decoded output.
    output: OutputRingBuffer,
    /// Raw input bytes not yet decoded into complete blocks.
    buffered: Vec<u8>,
    /// Bit offset into `buffered` where the next block starts.
    resume_bit: u64,
    /// The final block was decoded; no more blocks follow.
    final_block: bool,
    /// A structural error occurred; the stream cannot continue.
    poisoned: bool,
    /// Adler-32 of the preset dictionary, if one was loaded.
    dictionary_checksum: Option<u32>,
}

impl Inflater {
    /// Create a decompressor.
    pub fn new() -> Self {
        Self {
            output: OutputRingBuffer::new(DEFLATE_WINDOW),
            buffered: Vec::new(),
            resume_bit: 0,
            final_block: false,
            poisoned: false,
            dictionary_checksum: None,
        }
    }

    /// Create a decompressor with a preset dictionary loaded as history.
    pub fn with_dictionary(dictionary: &[u8]) -> Self {
        let mut inflater = Self::new();
        inflater.output.preload_dictionary(dictionary);
        inflater.dictionary_checksum = Some(Adler32::compute(dictionary));
        inflater
    }

    /// Adler-32 of the preset dictionary, for FDICT validation.
    pub fn dictionary_checksum(&self) -> Option<u32> {
        self.dictionary_checksum
    }

    /// Restore the initial state for a new stream (drops any dictionary).
    pub fn reset(&mut self) {
        self.output = OutputRingBuffer::new(DEFLATE_WINDOW);
        self.buffered.clear();
        self.resume_bit = 0;
        self.final_block = false;
        self.poisoned = false;
        self.dictionary_checksum = None;
    }

    /// Decode complete blocks until the stream ends, the buffered input
    /// runs out mid-block, or pending output reaches the cap.
    fn decode_available(&mut self) -> Result<DecodeStop> {
        // Drop input the decoder is fully past.
        let done_bytes = (self.resume_bit / 8) as usize;
        if done_bytes > 0 {
            self.buffered.drain(..done_bytes);
            self.resume_bit %= 8;
        }

        while !self.final_block {
            if self.output.output_len() >= PENDING_OUTPUT_LIMIT {
                return Ok(DecodeStop::OutputFull);
            }

            let mut reader = BitReader::new(Cursor::new(self.buffered.as_slice()));
            if self.resume_bit > 0 {
                match reader.read_bits(self.resume_bit as u8) {
                    Ok(_) => {}
                    Err(e) if e.is_underrun() => return Ok(DecodeStop::NeedsInput),
                    Err(e) => return Err(e),
                }
            }

            // Decode in place; a mid-block underrun rolls back to the
            // checkpoint so the committed state stays untouched.
            let checkpoint = self.output.checkpoint();
            match decode_block(&mut reader, &mut self.output) {
                Ok(bfinal) => {
                    self.final_block = bfinal;
                    self.resume_bit = reader.bit_position();
                    let done_bytes = (self.resume_bit / 8) as usize;
                    self.buffered.drain(..done_bytes);
                    self.resume_bit %= 8;
                }
                Err(e) if e.is_underrun() => {
                    self.output.restore(checkpoint);
                    return Ok(DecodeStop::NeedsInput);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(DecodeStop::Finished)
    }

    /// Bytes of buffered input that belong to whatever follows the
    /// stream, valid once the final block has been decoded.
    fn trailing_bytes(&self) -> usize {
        debug_assert!(self.final_block);
        self.buffered.len() - self.resume_bit.div_ceil(8) as usize
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Inflater {
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)> {
        if self.poisoned {
            return Err(FlateError::corrupted(
                self.resume_bit / 8,
                "stream previously failed",
            ));
        }

        let mut consumed = 0;
        if !self.final_block && self.output.output_len() < PENDING_OUTPUT_LIMIT {
            self.buffered.extend_from_slice(input);
            consumed = input.len();

            let stop = match self.decode_available() {
                Ok(stop) => stop,
                Err(e) => {
                    self.poisoned = true;
                    return Err(e);
                }
            };

            match stop {
                // Hand back any bytes past the end of the stream; they
                // came from this call's input since the end was just
                // found.
                DecodeStop::Finished => {
                    let trailing = self.trailing_bytes();
                    consumed -= trailing;
                    let keep = self.buffered.len() - trailing;
                    self.buffered.truncate(keep);
                }
                // Bytes past the pause point also go back to the caller,
                // so the buffer holds at most a partial block. A commit
                // happened this call, which puts them all in this call's
                // input.
                DecodeStop::OutputFull => {
                    let tail = self.buffered.len() - self.resume_bit.div_ceil(8) as usize;
                    consumed -= tail;
                    let keep = self.buffered.len() - tail;
                    self.buffered.truncate(keep);
                }
                DecodeStop::NeedsInput => {}
            }
        }

        let chunk = self.output.drain_output(output.len());
        output[..chunk.len()].copy_from_slice(&chunk);

        let status = if self.output.output_len() > 0 {
            DecompressStatus::NeedsOutput
        } else if self.final_block {
            DecompressStatus::Done
        } else {
            DecompressStatus::NeedsInput
        };

        Ok((consumed, chunk.len(), status))
    }

    fn reset(&mut self) {
        Inflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        self.final_block && self.output.output_len() == 0
    }
}

/// Decode one block into `out`. Returns the BFINAL flag.
fn decode_block(reader: &mut BitReader<Cursor<&[u8]>>, out: &mut OutputRingBuffer) -> Result<bool> {
    let bfinal = reader.read_bit()?;
    let btype = reader.read_bits(2)?;

    match btype {
        0 => decode_stored(reader, out)?,
        1 => decode_huffman(reader, out, fixed_litlen_tree(), fixed_distance_tree())?,
        2 => {
            let (litlen_tree, dist_tree) = decode_dynamic_header(reader)?;
            decode_huffman(reader, out, &litlen_tree, &dist_tree)?;
        }
        _ => {
            return Err(FlateError::invalid_header("reserved block type 3"));
        }
    }

    Ok(bfinal)
}

/// Decode a stored block: aligned LEN/NLEN header plus raw bytes.
fn decode_stored(reader: &mut BitReader<Cursor<&[u8]>>, out: &mut OutputRingBuffer) -> Result<()> {
    reader.align_to_byte();

    let len = reader.read_bits(16)? as u16;
    let nlen = reader.read_bits(16)? as u16;
    if len != !nlen {
        return Err(FlateError::corrupted(
            reader.bit_position() / 8,
            format!("LEN/NLEN mismatch: {len:#06x} vs {:#06x}", !nlen),
        ));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_bytes(&mut buf)?;
    out.write_literals(&buf);

    Ok(())
}

/// Parse a dynamic block header into its two decoding tables.
fn decode_dynamic_header(
    reader: &mut BitReader<Cursor<&[u8]>>,
) -> Result<(HuffmanTree, HuffmanTree)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;

    if hlit > 286 {
        return Err(FlateError::invalid_header(format!(
            "HLIT {hlit} exceeds 286 literal/length codes"
        )));
    }
    if hdist > 30 {
        return Err(FlateError::invalid_header(format!(
            "HDIST {hdist} exceeds 30 distance codes"
        )));
    }

    let mut codelen_lengths = [0u8; 19];
    for &slot in CODE_LENGTH_ORDER.iter().take(hclen) {
        codelen_lengths[slot] = reader.read_bits(3)? as u8;
    }
    let codelen_tree = HuffmanTree::from_code_lengths(&codelen_lengths)?;

    // The literal/length and distance length sequences share one RLE
    // stream; runs may cross the boundary between them.
    let mut lengths = vec![0u8; hlit + hdist];
    let mut i = 0;
    while i < lengths.len() {
        let code = codelen_tree.decode(reader)?;
        match code {
            0..=15 => {
                lengths[i] = code as u8;
                i += 1;
            }
            16 => {
                if i == 0 {
                    return Err(FlateError::corrupted(
                        reader.bit_position() / 8,
                        "length repeat with no previous length",
                    ));
                }
                let repeat = reader.read_bits(2)? as usize + 3;
                let prev = lengths[i - 1];
                fill_run(&mut lengths, &mut i, prev, repeat, reader.bit_position())?;
            }
            17 => {
                let repeat = reader.read_bits(3)? as usize + 3;
                fill_run(&mut lengths, &mut i, 0, repeat, reader.bit_position())?;
            }
            18 => {
                let repeat = reader.read_bits(7)? as usize + 11;
                fill_run(&mut lengths, &mut i, 0, repeat, reader.bit_position())?;
            }
            _ => return Err(FlateError::invalid_huffman(reader.bit_position())),
        }
    }

    let litlen_tree = HuffmanTree::from_code_lengths(&lengths[..hlit])?;
    let dist_tree = HuffmanTree::from_code_lengths(&lengths[hlit..])?;
    Ok((litlen_tree, dist_tree))
}

/// Write `repeat` copies of `value`, failing if the run overflows the
/// declared length count.
fn fill_run(
    lengths: &mut [u8],
    i: &mut usize,
    value: u8,
    repeat: usize,
    bit_position: u64,
) -> Result<()> {
    if *i + repeat > lengths.len() {
        return Err(FlateError::corrupted(
            bit_position / 8,
            "code length run overflows declared counts",
        ));
    }
    lengths[*i..*i + repeat].fill(value);
    *i += repeat;
    Ok(())
}

/// Decode litlen/distance symbol pairs until the end-of-block symbol.
fn decode_huffman(
    reader: &mut BitReader<Cursor<&[u8]>>,
    out: &mut OutputRingBuffer,
    litlen_tree: &HuffmanTree,
    dist_tree: &HuffmanTree,
) -> Result<()> {
    loop {
        let code = litlen_tree.decode(reader)?;

        match code {
            0..=255 => out.write_literal(code as u8),
            256 => break,
            257..=285 => {
                let extra_bits = LENGTH_EXTRA_BITS[(code - 257) as usize];
                let extra = reader.read_bits(extra_bits)? as u16;
                let length = decode_length(code, extra);

                let dist_code = dist_tree.decode(reader)?;
                if dist_code >= 30 {
                    // Reserved symbols 30/31 exist in the fixed table but
                    // never in a valid stream.
                    return Err(FlateError::corrupted(
                        reader.bit_position() / 8,
                        format!("reserved distance code {dist_code}"),
                    ));
                }
                let dist_extra_bits = DISTANCE_EXTRA_BITS[dist_code as usize];
                let dist_extra = reader.read_bits(dist_extra_bits)? as u16;
                let distance = decode_distance(dist_code, dist_extra);

                out.copy_match(distance as usize, length as usize)?;
            }
            _ => {
                // 286/287 are padding in the fixed literal/length code.
                return Err(FlateError::corrupted(
                    reader.bit_position() / 8,
                    format!("reserved literal/length code {code}"),
                ));
            }
        }
    }

    Ok(())
}

/// Decompress a complete raw DEFLATE stream in one call.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    Inflater::new().decompress_all(data)
}
