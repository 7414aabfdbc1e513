//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE transmits only code *lengths*; both sides reconstruct the same
//! canonical code assignment from them (RFC 1951 Section 3.2.2). This
//! module has both halves:
//!
//! - [`HuffmanTree`] turns a length set into a decoding table (a direct
//!   lookup table for short codes plus a per-length fallback for long
//!   ones) and validates the set on the way in.
//! - [`build_code_lengths`] turns symbol frequencies into an optimal
//!   length-limited length set, and [`CanonicalCode`] turns lengths into
//!   the bit patterns the encoder emits.
//!
//! Codes are compared MSB-first but transmitted LSB-first, so every stored
//! encode-side code is pre-reversed for [`BitWriter::write_bits`].

use ferroflate_core::bitstream::{BitReader, BitWriter};
use ferroflate_core::error::{FlateError, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{Read, Write};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Reverse the low `length` bits of `code`.
fn reverse_bits(mut code: u16, length: u8) -> u16 {
    let mut reversed = 0u16;
    for _ in 0..length {
        reversed = (reversed << 1) | (code & 1);
        code >>= 1;
    }
    reversed
}

/// Count codes per length and compute the canonical first code of each
/// length, validating the set.
///
/// Over-subscribed sets (more codes than the length space holds) are
/// always rejected. Incomplete sets are rejected too, except the
/// degenerate case of at most one coded symbol, which RFC 1951 permits
/// for distance codes.
fn canonical_first_codes(code_lengths: &[u8]) -> Result<([u16; MAX_CODE_LENGTH + 1], [u32; MAX_CODE_LENGTH + 1])> {
    let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
    let mut coded = 0usize;

    for &len in code_lengths {
        if len as usize > MAX_CODE_LENGTH {
            return Err(FlateError::invalid_header(format!(
                "code length {len} exceeds maximum {MAX_CODE_LENGTH}"
            )));
        }
        if len > 0 {
            bl_count[len as usize] += 1;
            coded += 1;
        }
    }

    // Kraft accounting: `left` is how much code space remains at each
    // length. Going negative means over-subscription.
    let mut left: i32 = 1;
    for bits in 1..=MAX_CODE_LENGTH {
        left <<= 1;
        left -= i32::from(bl_count[bits]);
        if left < 0 {
            return Err(FlateError::invalid_header(
                "over-subscribed Huffman code lengths",
            ));
        }
    }
    if left > 0 && coded > 1 {
        return Err(FlateError::invalid_header(
            "incomplete Huffman code lengths",
        ));
    }

    let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + u32::from(bl_count[bits - 1])) << 1;
        next_code[bits] = code;
    }

    Ok((bl_count, next_code))
}

/// A Huffman decoding table.
///
/// Codes no longer than [`Self::FAST_BITS`] resolve with one table lookup;
/// longer codes fall back to a bit-by-bit walk over per-length code
/// ranges.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    /// Indexed by the next `fast_bits` bits of input (LSB-first). Entry is
    /// `(symbol, code length)`; length 0 means no short code matches.
    fast_table: Vec<(u16, u8)>,
    fast_bits: u8,
    max_length: u8,
    /// Symbols ordered by (length, canonical code).
    symbols: Vec<u16>,
    /// First canonical code of each length.
    first_code: [u32; MAX_CODE_LENGTH + 1],
    /// Index into `symbols` of the first symbol of each length.
    first_index: [u16; MAX_CODE_LENGTH + 1],
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH + 1],
}

impl HuffmanTree {
    /// Width of the direct lookup table.
    const FAST_BITS: u8 = 9;

    /// Build a decoding table from per-symbol code lengths.
    ///
    /// An all-zero length set produces an empty table whose `decode`
    /// always fails; dynamic headers may legitimately declare a distance
    /// alphabet with no codes at all.
    pub fn from_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        if code_lengths.is_empty() {
            return Err(FlateError::invalid_header("empty code length set"));
        }

        let (bl_count, next_code) = canonical_first_codes(code_lengths)?;
        let max_length = (1..=MAX_CODE_LENGTH)
            .rev()
            .find(|&bits| bl_count[bits] > 0)
            .unwrap_or(0) as u8;

        if max_length == 0 {
            return Ok(Self {
                fast_table: Vec::new(),
                fast_bits: 0,
                max_length: 0,
                symbols: Vec::new(),
                first_code: [0; MAX_CODE_LENGTH + 1],
                first_index: [0; MAX_CODE_LENGTH + 1],
                counts: [0; MAX_CODE_LENGTH + 1],
            });
        }

        let mut first_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut first_index = [0u16; MAX_CODE_LENGTH + 1];
        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        let mut index = 0u16;
        for bits in 1..=MAX_CODE_LENGTH {
            first_code[bits] = next_code[bits];
            first_index[bits] = index;
            counts[bits] = bl_count[bits];
            index += bl_count[bits];
        }

        // Assign symbols to their canonical slots.
        let mut symbols = vec![0u16; index as usize];
        let mut assign = next_code;
        let fast_bits = Self::FAST_BITS.min(max_length);
        let mut fast_table = vec![(0u16, 0u8); 1 << fast_bits];

        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let len_idx = len as usize;
            let code = assign[len_idx];
            assign[len_idx] += 1;

            let slot = first_index[len_idx] as usize + (code - first_code[len_idx]) as usize;
            symbols[slot] = symbol as u16;

            if len <= fast_bits {
                // Replicate over every possible suffix of the peeked bits.
                let rev = reverse_bits(code as u16, len) as usize;
                for high in 0..(1usize << (fast_bits - len)) {
                    fast_table[rev | (high << len)] = (symbol as u16, len);
                }
            }
        }

        Ok(Self {
            fast_table,
            fast_bits,
            max_length,
            symbols,
            first_code,
            first_index,
            counts,
        })
    }

    /// Decode one symbol from the bit stream.
    #[inline]
    pub fn decode<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        if self.max_length == 0 {
            return Err(FlateError::invalid_huffman(reader.bit_position()));
        }

        // The fast path needs a full peek; near the end of input fall back
        // to the bit-by-bit walk, which reads only as much as the code is
        // long.
        if let Ok(bits) = reader.peek_bits(self.fast_bits) {
            let (symbol, len) = self.fast_table[bits as usize];
            if len > 0 {
                reader.skip_bits(len)?;
                return Ok(symbol);
            }
        }

        self.decode_slow(reader)
    }

    /// Walk the canonical code ranges one bit at a time.
    fn decode_slow<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        let mut code = 0u32;

        for len in 1..=self.max_length as usize {
            code = (code << 1) | reader.read_bits(1)?;

            let count = u32::from(self.counts[len]);
            if count > 0 && code >= self.first_code[len] {
                let offset = code - self.first_code[len];
                if offset < count {
                    let slot = self.first_index[len] as usize + offset as usize;
                    return Ok(self.symbols[slot]);
                }
            }
        }

        Err(FlateError::invalid_huffman(reader.bit_position()))
    }
}

/// Build optimal length-limited code lengths from symbol frequencies.
///
/// Runs a standard two-smallest-first Huffman merge, then rebalances any
/// lengths beyond `max_length` the way zlib's `gen_bitlen` does: demote a
/// shorter code by one bit to free space at the bottom, repeat until
/// everything fits. Ties break on symbol index so the output is
/// deterministic.
///
/// Symbols with frequency 0 get length 0 (no code). A single used symbol
/// gets length 1.
pub fn build_code_lengths(frequencies: &[u32], max_length: u8) -> Vec<u8> {
    debug_assert!(max_length as usize <= MAX_CODE_LENGTH);

    let mut lengths = vec![0u8; frequencies.len()];
    let active: Vec<usize> = (0..frequencies.len())
        .filter(|&i| frequencies[i] > 0)
        .collect();

    match active.len() {
        0 => return lengths,
        1 => {
            lengths[active[0]] = 1;
            return lengths;
        }
        _ => {}
    }

    // Two-smallest-first merge over an index arena. New nodes always get
    // a larger index than their children.
    let mut weight: Vec<u64> = active.iter().map(|&i| u64::from(frequencies[i])).collect();
    let mut parent: Vec<usize> = vec![usize::MAX; weight.len()];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = weight
        .iter()
        .enumerate()
        .map(|(i, &w)| Reverse((w, i)))
        .collect();

    while heap.len() > 1 {
        let Reverse((wa, a)) = heap.pop().expect("heap has two entries");
        let Reverse((wb, b)) = heap.pop().expect("heap has two entries");
        let node = weight.len();
        weight.push(wa + wb);
        parent.push(usize::MAX);
        parent[a] = node;
        parent[b] = node;
        heap.push(Reverse((wa + wb, node)));
    }

    // Depths: the root (last node) is 0, every other node is one below
    // its parent, and parents are processed first.
    let mut depth = vec![0u16; weight.len()];
    for i in (0..weight.len() - 1).rev() {
        depth[i] = depth[parent[i]] + 1;
    }

    let limited = limit_lengths(&depth[..active.len()], max_length);
    for (slot, &symbol) in active.iter().enumerate() {
        lengths[symbol] = limited[slot];
    }
    lengths
}

/// Cap leaf depths at `max_length`, restoring Kraft equality.
fn limit_lengths(depths: &[u16], max_length: u8) -> Vec<u8> {
    let max = max_length as usize;
    let mut bl_count = vec![0i32; max + 1];
    let mut overflow: i32 = 0;

    for &d in depths {
        if d as usize > max {
            overflow += 1;
            bl_count[max] += 1;
        } else {
            bl_count[d as usize] += 1;
        }
    }

    // Each pass moves one code down a level and drops one max-length
    // code, paying back the space the capped codes stole.
    while overflow > 0 {
        let mut bits = max - 1;
        while bl_count[bits] == 0 {
            bits -= 1;
        }
        bl_count[bits] -= 1;
        bl_count[bits + 1] += 2;
        bl_count[max] -= 1;
        overflow -= 2;
    }

    // Hand the longest new lengths to the originally deepest leaves.
    let mut order: Vec<usize> = (0..depths.len()).collect();
    order.sort_by_key(|&i| (Reverse(depths[i]), i));

    let mut result = vec![0u8; depths.len()];
    let mut next = 0usize;
    for bits in (1..=max).rev() {
        for _ in 0..bl_count[bits] {
            result[order[next]] = bits as u8;
            next += 1;
        }
    }
    result
}

/// The encode-side canonical code table: one pre-reversed code per symbol.
#[derive(Debug, Clone)]
pub struct CanonicalCode {
    /// Bit-reversed codes, ready for LSB-first emission.
    codes: Vec<u16>,
    lengths: Vec<u8>,
}

impl CanonicalCode {
    /// Assign canonical codes to a validated length set.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let (_, next_code) = canonical_first_codes(lengths)?;

        let mut assign = next_code;
        let mut codes = vec![0u16; lengths.len()];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                codes[symbol] = reverse_bits(assign[len as usize] as u16, len);
                assign[len as usize] += 1;
            }
        }

        Ok(Self {
            codes,
            lengths: lengths.to_vec(),
        })
    }

    /// The code length of a symbol (0 if unused).
    pub fn length(&self, symbol: u16) -> u8 {
        self.lengths[symbol as usize]
    }

    /// The per-symbol length set this code was built from.
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Emit one symbol's code.
    #[inline]
    pub fn write_symbol<W: Write>(&self, writer: &mut BitWriter<W>, symbol: u16) -> Result<()> {
        let len = self.lengths[symbol as usize];
        debug_assert!(len > 0, "no code assigned to symbol {symbol}");
        writer.write_bits(u32::from(self.codes[symbol as usize]), len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_simple_tree() {
        // A=1 bit, B=2 bits, C=2 bits. Canonical: A=0, B=10, C=11.
        let tree = HuffmanTree::from_code_lengths(&[1, 2, 2]).unwrap();

        // A B C A packed LSB-first: 0, 01, 11, 0 -> 0b00011010
        let mut reader = BitReader::new(Cursor::new(vec![0b00011010u8]));
        assert_eq!(tree.decode(&mut reader).unwrap(), 0);
        assert_eq!(tree.decode(&mut reader).unwrap(), 1);
        assert_eq!(tree.decode(&mut reader).unwrap(), 2);
        assert_eq!(tree.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_oversubscribed_rejected() {
        // Three codes of length 1 cannot exist.
        let err = HuffmanTree::from_code_lengths(&[1, 1, 1]).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_incomplete_rejected() {
        // Two 3-bit codes leave most of the space unused.
        let err = HuffmanTree::from_code_lengths(&[3, 3, 0, 0]).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_single_symbol_allowed() {
        let tree = HuffmanTree::from_code_lengths(&[0, 1, 0, 0]).unwrap();

        let mut reader = BitReader::new(Cursor::new(vec![0b00000000u8]));
        assert_eq!(tree.decode(&mut reader).unwrap(), 1);
    }

    #[test]
    fn test_empty_tree_never_decodes() {
        let tree = HuffmanTree::from_code_lengths(&[0, 0, 0, 0]).unwrap();
        let mut reader = BitReader::new(Cursor::new(vec![0xFFu8]));
        assert!(tree.decode(&mut reader).is_err());
    }

    #[test]
    fn test_long_codes_use_slow_path() {
        // A complete code whose deepest codes are well past the 9-bit
        // fast table.
        let lengths = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 12];
        let tree = HuffmanTree::from_code_lengths(&lengths).unwrap();

        let code = CanonicalCode::from_lengths(&lengths).unwrap();
        let message = [12u16, 0, 10, 5, 11, 12, 1];
        let mut encoded = Vec::new();
        {
            let mut writer = BitWriter::new(&mut encoded);
            for &sym in &message {
                code.write_symbol(&mut writer, sym).unwrap();
            }
            writer.flush().unwrap();
        }

        let mut reader = BitReader::new(Cursor::new(&encoded));
        for &expected in &message {
            assert_eq!(tree.decode(&mut reader).unwrap(), expected);
        }
    }

    #[test]
    fn test_build_lengths_orders_by_frequency() {
        let lengths = build_code_lengths(&[100, 50, 25, 25], 15);

        assert!(lengths.iter().all(|&l| l > 0));
        assert!(lengths[0] <= lengths[1]);
        assert!(lengths[1] <= lengths[2]);
    }

    #[test]
    fn test_build_lengths_kraft_equality() {
        let freqs = [5u32, 9, 12, 13, 16, 45, 0, 3];
        let lengths = build_code_lengths(&freqs, 15);

        let kraft: u32 = lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u32 << (15 - l))
            .sum();
        assert_eq!(kraft, 1 << 15, "lengths must fill the code space exactly");
    }

    #[test]
    fn test_build_lengths_respects_limit() {
        // Fibonacci frequencies force a deep unconstrained tree.
        let freqs = [1u32, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377];
        let lengths = build_code_lengths(&freqs, 7);

        assert!(lengths.iter().all(|&l| l > 0 && l <= 7));
        let kraft: u32 = lengths.iter().map(|&l| 1u32 << (7 - l)).sum();
        assert_eq!(kraft, 1 << 7);
    }

    #[test]
    fn test_build_lengths_is_deterministic() {
        let freqs = [3u32, 3, 3, 3, 1, 1, 7];
        assert_eq!(build_code_lengths(&freqs, 15), build_code_lengths(&freqs, 15));
    }

    #[test]
    fn test_build_lengths_degenerate_cases() {
        assert_eq!(build_code_lengths(&[0, 0, 0], 15), vec![0, 0, 0]);
        assert_eq!(build_code_lengths(&[0, 7, 0], 15), vec![0, 1, 0]);
    }

    #[test]
    fn test_encode_decode_roundtrip_with_built_lengths() {
        let freqs = [40u32, 30, 20, 10, 5, 5, 2, 1];
        let lengths = build_code_lengths(&freqs, 15);
        let code = CanonicalCode::from_lengths(&lengths).unwrap();
        let tree = HuffmanTree::from_code_lengths(&lengths).unwrap();

        let message: Vec<u16> = (0..8u16).cycle().take(100).collect();
        let mut encoded = Vec::new();
        {
            let mut writer = BitWriter::new(&mut encoded);
            for &sym in &message {
                code.write_symbol(&mut writer, sym).unwrap();
            }
            writer.flush().unwrap();
        }

        let mut reader = BitReader::new(Cursor::new(&encoded));
        for &expected in &message {
            assert_eq!(tree.decode(&mut reader).unwrap(), expected);
        }
    }

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b101, 3), 0b101);
        assert_eq!(reverse_bits(0b1100, 4), 0b0011);
        assert_eq!(reverse_bits(0b10101010, 8), 0b01010101);
    }
}
