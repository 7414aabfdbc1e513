//! DEFLATE compression (RFC 1951).
//!
//! [`Deflater`] turns input bytes into a sequence of DEFLATE blocks. For
//! every block it computes the exact bit cost of all three encodings —
//! stored, fixed Huffman, dynamic Huffman — and emits the cheapest, so a
//! block of incompressible data falls back to stored rather than growing.
//!
//! The push-model [`Compressor`] impl buffers input until a full block's
//! worth arrives (or the stream is finished) and hands encoded bytes out
//! under output backpressure.

use crate::huffman::{build_code_lengths, CanonicalCode, MAX_CODE_LENGTH};
use crate::lz77::{Lz77Encoder, Token};
use crate::tables::{
    distance_to_code, fixed_distance_code, fixed_distance_lengths, fixed_litlen_code,
    fixed_litlen_lengths, length_to_code, CODELEN_ALPHABET_SIZE, CODE_LENGTH_ORDER,
    DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, LITLEN_ALPHABET_SIZE,
};
use ferroflate_core::bitstream::BitWriter;
use ferroflate_core::checksum::Adler32;
use ferroflate_core::error::{FlateError, Result};
use ferroflate_core::traits::{CompressStatus, Compressor, FlushMode};

/// Largest stored-block payload (16-bit LEN field).
const MAX_STORED_BLOCK: usize = 65535;

/// How much input to gather before emitting a non-final block.
const BLOCK_CHUNK: usize = 1 << 16;

/// Encoded-but-undrained byte cap. Encoding and input intake pause past
/// this point until the caller drains, so a slow reader never pulls the
/// whole stream into memory. One block may still overshoot, since blocks
/// encode atomically.
const OUTPUT_BACKLOG_LIMIT: usize = 1 << 16;

/// One RLE symbol of the code length alphabet:
/// (symbol, extra value, extra bit count).
type CodeLenSymbol = (u8, u8, u8);

/// DEFLATE compressor.
#[derive(Debug)]
pub struct Deflater {
    lz77: Lz77Encoder,
    level: u8,
    /// Bit stream under construction; blocks from successive calls share
    /// it so no padding leaks between them.
    writer: BitWriter<Vec<u8>>,
    /// Raw input awaiting encoding.
    pending: Vec<u8>,
    finished: bool,
    /// Adler-32 of the preset dictionary, for the zlib FDICT header.
    dictionary_checksum: Option<u32>,
}

impl Deflater {
    /// Create a compressor for the given level (0-9).
    pub fn new(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(FlateError::invalid_parameter(format!(
                "compression level {level} out of range (0-9)"
            )));
        }
        Ok(Self {
            lz77: Lz77Encoder::with_level(level),
            level,
            writer: BitWriter::new(Vec::new()),
            pending: Vec::new(),
            finished: false,
            dictionary_checksum: None,
        })
    }

    /// Create a compressor with a preset dictionary already loaded.
    pub fn with_dictionary(level: u8, dictionary: &[u8]) -> Result<Self> {
        let mut deflater = Self::new(level)?;
        deflater.preload_dictionary(dictionary)?;
        Ok(deflater)
    }

    /// The configured compression level.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Restore the initial state for a new stream.
    pub fn reset(&mut self) {
        self.lz77.reset();
        self.writer = BitWriter::new(Vec::new());
        self.pending.clear();
        self.finished = false;
        self.dictionary_checksum = None;
    }

    /// Adler-32 of the preset dictionary, if one was loaded.
    pub fn dictionary_checksum(&self) -> Option<u32> {
        self.dictionary_checksum
    }

    /// Preload a dictionary so early matches can reference it.
    ///
    /// Must be called before any data is compressed.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        if self.writer.bits_written() > 0 || !self.pending.is_empty() {
            return Err(FlateError::invalid_parameter(
                "dictionary must be set before compressing data",
            ));
        }
        self.lz77.preload_dictionary(dictionary);
        self.dictionary_checksum = Some(Adler32::compute(dictionary));
        Ok(())
    }

    /// Compress a whole buffer into a finished DEFLATE stream.
    pub fn compress_to_vec(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.write_block(data, true)?;
        self.writer.flush()?;
        self.finished = true;
        Ok(std::mem::take(self.writer.get_mut()))
    }

    /// Encode one block covering `data`, choosing the cheapest encoding.
    fn write_block(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        if data.is_empty() && !is_final {
            return Ok(());
        }

        if self.level == 0 {
            return self.write_stored(data, is_final);
        }

        let tokens = self.lz77.tokenize(data);
        let (litlen_freq, dist_freq) = count_frequencies(&tokens);

        let litlen_lengths = build_code_lengths(&litlen_freq, MAX_CODE_LENGTH as u8);
        let dist_lengths = build_code_lengths(&dist_freq, MAX_CODE_LENGTH as u8);
        let plan = DynamicPlan::build(&litlen_lengths, &dist_lengths);

        let fixed_cost =
            3 + token_cost(&tokens, &fixed_litlen_lengths(), &fixed_distance_lengths());
        let dynamic_cost = 3 + plan.header_bits() + token_cost(&tokens, &litlen_lengths, &dist_lengths);
        let stored_cost = self.stored_cost(data.len());

        if stored_cost < fixed_cost && stored_cost < dynamic_cost {
            self.write_stored(data, is_final)
        } else if fixed_cost <= dynamic_cost {
            self.write_fixed(&tokens, is_final)
        } else {
            self.write_dynamic(&tokens, &plan, &litlen_lengths, &dist_lengths, is_final)
        }
    }

    /// Exact bit cost of emitting `len` bytes as stored blocks from the
    /// current bit position.
    fn stored_cost(&self, len: usize) -> usize {
        let start = self.writer.bits_written() as usize;
        let mut bits = start;
        let mut remaining = len;

        loop {
            bits += 3;
            bits += (8 - bits % 8) % 8;
            bits += 32;
            let chunk = remaining.min(MAX_STORED_BLOCK);
            bits += chunk * 8;
            remaining -= chunk;
            if remaining == 0 {
                break;
            }
        }

        bits - start
    }

    /// Emit `data` as stored blocks (split at the 65535-byte LEN limit).
    fn write_stored(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let mut chunks = data.chunks(MAX_STORED_BLOCK).peekable();

        // An empty final block still terminates the stream.
        if data.is_empty() {
            if is_final {
                self.write_stored_chunk(&[], true)?;
            }
            return Ok(());
        }

        while let Some(chunk) = chunks.next() {
            let last = chunks.peek().is_none();
            self.write_stored_chunk(chunk, is_final && last)?;
        }
        Ok(())
    }

    fn write_stored_chunk(&mut self, chunk: &[u8], bfinal: bool) -> Result<()> {
        self.writer.write_bit(bfinal)?;
        self.writer.write_bits(0b00, 2)?;
        self.writer.align_to_byte()?;

        let len = chunk.len() as u16;
        self.writer.write_bits(u32::from(len), 16)?;
        self.writer.write_bits(u32::from(!len), 16)?;
        self.writer.write_bytes(chunk)
    }

    /// Emit a block with the fixed code tables (BTYPE=01).
    fn write_fixed(&mut self, tokens: &[Token], is_final: bool) -> Result<()> {
        self.writer.write_bit(is_final)?;
        self.writer.write_bits(0b01, 2)?;
        write_tokens(
            &mut self.writer,
            tokens,
            fixed_litlen_code(),
            fixed_distance_code(),
        )
    }

    /// Emit a block with transmitted code tables (BTYPE=10).
    fn write_dynamic(
        &mut self,
        tokens: &[Token],
        plan: &DynamicPlan,
        litlen_lengths: &[u8],
        dist_lengths: &[u8],
        is_final: bool,
    ) -> Result<()> {
        self.writer.write_bit(is_final)?;
        self.writer.write_bits(0b10, 2)?;

        self.writer.write_bits((plan.hlit - 257) as u32, 5)?;
        self.writer.write_bits((plan.hdist - 1) as u32, 5)?;
        self.writer.write_bits((plan.hclen - 4) as u32, 4)?;

        for i in 0..plan.hclen {
            let len = plan.codelen_lengths[CODE_LENGTH_ORDER[i]];
            self.writer.write_bits(u32::from(len), 3)?;
        }

        let codelen_code = CanonicalCode::from_lengths(&plan.codelen_lengths)?;
        for &(symbol, extra, extra_bits) in &plan.symbols {
            codelen_code.write_symbol(&mut self.writer, u16::from(symbol))?;
            if extra_bits > 0 {
                self.writer.write_bits(u32::from(extra), extra_bits)?;
            }
        }

        let litlen_code = CanonicalCode::from_lengths(litlen_lengths)?;
        let dist_code = CanonicalCode::from_lengths(dist_lengths)?;
        write_tokens(&mut self.writer, tokens, &litlen_code, &dist_code)
    }
}

impl Compressor for Deflater {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        let mut consumed = 0;
        if !self.finished && self.writer.get_ref().len() < OUTPUT_BACKLOG_LIMIT {
            self.pending.extend_from_slice(input);
            consumed = input.len();

            while self.pending.len() >= BLOCK_CHUNK
                && self.writer.get_ref().len() < OUTPUT_BACKLOG_LIMIT
            {
                let chunk: Vec<u8> = self.pending.drain(..BLOCK_CHUNK).collect();
                self.write_block(&chunk, false)?;
            }

            // Finishing also waits for the backlog to clear; callers keep
            // calling with Finish until Done.
            if flush == FlushMode::Finish
                && self.pending.len() < BLOCK_CHUNK
                && self.writer.get_ref().len() < OUTPUT_BACKLOG_LIMIT
            {
                let rest = std::mem::take(&mut self.pending);
                self.write_block(&rest, true)?;
                self.writer.flush()?;
                self.finished = true;
            }
        }

        let buffered = self.writer.get_mut();
        let produced = buffered.len().min(output.len());
        output[..produced].copy_from_slice(&buffered[..produced]);
        buffered.drain(..produced);

        let status = if !buffered.is_empty() {
            CompressStatus::NeedsOutput
        } else if self.finished {
            CompressStatus::Done
        } else {
            CompressStatus::NeedsInput
        };

        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        Deflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// The dynamic block header, precomputed so its cost is exact before any
/// bit is committed.
#[derive(Debug)]
struct DynamicPlan {
    /// Transmitted literal/length code count (257-286).
    hlit: usize,
    /// Transmitted distance code count (1-30).
    hdist: usize,
    /// Transmitted code length code count (4-19).
    hclen: usize,
    symbols: Vec<CodeLenSymbol>,
    codelen_lengths: Vec<u8>,
}

impl DynamicPlan {
    fn build(litlen_lengths: &[u8], dist_lengths: &[u8]) -> Self {
        let hlit = last_used(litlen_lengths, 257);
        let hdist = last_used(dist_lengths, 1);

        let mut combined = Vec::with_capacity(hlit + hdist);
        combined.extend_from_slice(&litlen_lengths[..hlit]);
        combined.extend_from_slice(&dist_lengths[..hdist]);

        let (symbols, codelen_freqs) = rle_encode_lengths(&combined);
        let codelen_lengths = build_code_lengths(&codelen_freqs, 7);

        let mut hclen = CODELEN_ALPHABET_SIZE;
        while hclen > 4 && codelen_lengths[CODE_LENGTH_ORDER[hclen - 1]] == 0 {
            hclen -= 1;
        }

        Self {
            hlit,
            hdist,
            hclen,
            symbols,
            codelen_lengths,
        }
    }

    /// Exact bit cost of the header: counts, code length code lengths,
    /// and the RLE-encoded length sequence.
    fn header_bits(&self) -> usize {
        let mut bits = 5 + 5 + 4 + 3 * self.hclen;
        for &(symbol, _, extra_bits) in &self.symbols {
            bits += self.codelen_lengths[symbol as usize] as usize + extra_bits as usize;
        }
        bits
    }
}

/// Index one past the last used symbol, at least `min`.
fn last_used(lengths: &[u8], min: usize) -> usize {
    lengths
        .iter()
        .rposition(|&len| len > 0)
        .map_or(min, |i| (i + 1).max(min))
}

/// Tally literal/length and distance symbol frequencies, including the
/// mandatory end-of-block symbol.
fn count_frequencies(tokens: &[Token]) -> (Vec<u32>, Vec<u32>) {
    let mut litlen_freq = vec![0u32; LITLEN_ALPHABET_SIZE];
    let mut dist_freq = vec![0u32; DISTANCE_ALPHABET_SIZE];

    for token in tokens {
        match token {
            Token::Literal(byte) => litlen_freq[*byte as usize] += 1,
            Token::Match { length, distance } => {
                let (len_code, _, _) = length_to_code(*length);
                litlen_freq[len_code as usize] += 1;
                let (dist_code, _, _) = distance_to_code(*distance);
                dist_freq[dist_code as usize] += 1;
            }
        }
    }
    litlen_freq[END_OF_BLOCK as usize] += 1;

    (litlen_freq, dist_freq)
}

/// Exact payload bit cost of `tokens` under the given length sets,
/// including the end-of-block symbol.
fn token_cost(tokens: &[Token], litlen_lengths: &[u8], dist_lengths: &[u8]) -> usize {
    let mut bits = 0usize;

    for token in tokens {
        match token {
            Token::Literal(byte) => bits += litlen_lengths[*byte as usize] as usize,
            Token::Match { length, distance } => {
                let (len_code, len_extra, _) = length_to_code(*length);
                bits += litlen_lengths[len_code as usize] as usize + len_extra as usize;
                let (dist_code, dist_extra, _) = distance_to_code(*distance);
                bits += dist_lengths[dist_code as usize] as usize + dist_extra as usize;
            }
        }
    }
    bits += litlen_lengths[END_OF_BLOCK as usize] as usize;

    bits
}

/// Emit a token sequence plus the end-of-block symbol.
fn write_tokens(
    writer: &mut BitWriter<Vec<u8>>,
    tokens: &[Token],
    litlen: &CanonicalCode,
    dist: &CanonicalCode,
) -> Result<()> {
    for token in tokens {
        match token {
            Token::Literal(byte) => litlen.write_symbol(writer, u16::from(*byte))?,
            Token::Match { length, distance } => {
                let (len_code, len_extra_bits, len_extra) = length_to_code(*length);
                litlen.write_symbol(writer, len_code)?;
                if len_extra_bits > 0 {
                    writer.write_bits(u32::from(len_extra), len_extra_bits)?;
                }

                let (dist_code, dist_extra_bits, dist_extra) = distance_to_code(*distance);
                dist.write_symbol(writer, dist_code)?;
                if dist_extra_bits > 0 {
                    writer.write_bits(u32::from(dist_extra), dist_extra_bits)?;
                }
            }
        }
    }
    litlen.write_symbol(writer, END_OF_BLOCK)
}

/// Run-length encode a code length sequence into the 19-symbol code
/// length alphabet (RFC 1951 Section 3.2.7).
fn rle_encode_lengths(lengths: &[u8]) -> (Vec<CodeLenSymbol>, Vec<u32>) {
    let mut symbols = Vec::new();
    let mut freqs = vec![0u32; CODELEN_ALPHABET_SIZE];
    let mut i = 0;

    while i < lengths.len() {
        let len = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == len {
            run += 1;
        }

        if len == 0 {
            let mut remaining = run;
            while remaining >= 11 {
                let n = remaining.min(138);
                symbols.push((18, (n - 11) as u8, 7));
                freqs[18] += 1;
                remaining -= n;
            }
            if remaining >= 3 {
                symbols.push((17, (remaining - 3) as u8, 3));
                freqs[17] += 1;
                remaining = 0;
            }
            for _ in 0..remaining {
                symbols.push((0, 0, 0));
                freqs[0] += 1;
            }
        } else {
            symbols.push((len, 0, 0));
            freqs[len as usize] += 1;

            let mut remaining = run - 1;
            while remaining >= 3 {
                let n = remaining.min(6);
                symbols.push((16, (n - 3) as u8, 2));
                freqs[16] += 1;
                remaining -= n;
            }
            for _ in 0..remaining {
                symbols.push((len, 0, 0));
                freqs[len as usize] += 1;
            }
        }

        i += run;
    }

    (symbols, freqs)
}

/// Compress a buffer into a raw DEFLATE stream in one call.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    Deflater::new(level)?.compress_to_vec(data)
}
