//! Constant tables for DEFLATE (RFC 1951).
//!
//! This module is the single home of the format's fixed numbers: the fixed
//! Huffman code lengths, the length/distance base-and-extra-bit tables, and
//! the code length transmission order. Both the encoder and the decoder
//! read from here so the two sides can never drift apart.

use crate::huffman::{CanonicalCode, HuffmanTree};
use std::sync::OnceLock;

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Minimum back-reference length.
pub const MIN_MATCH: usize = 3;

/// Maximum back-reference length.
pub const MAX_MATCH: usize = 258;

/// Maximum back-reference distance (the window size).
pub const MAX_DISTANCE: usize = 32768;

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
///
/// Symbols 286 and 287 never occur in a valid stream but take part in the
/// code construction.
pub fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [8u8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Fixed distance code lengths: 5 bits for all 32 symbols.
///
/// RFC 1951 assigns 5-bit codes to all 32 distance symbols even though
/// only 0-29 are meaningful, which makes the fixed distance code complete.
/// Symbols 30 and 31 are rejected if they appear in a stream.
pub fn fixed_distance_lengths() -> [u8; 32] {
    [5u8; 32]
}

/// The fixed literal/length decoding table, built once and cached.
pub fn fixed_litlen_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();
    TREE.get_or_init(|| {
        HuffmanTree::from_code_lengths(&fixed_litlen_lengths())
            .expect("fixed literal/length code is complete")
    })
}

/// The fixed distance decoding table, built once and cached.
pub fn fixed_distance_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();
    TREE.get_or_init(|| {
        HuffmanTree::from_code_lengths(&fixed_distance_lengths())
            .expect("fixed distance code is complete")
    })
}

/// The fixed literal/length encoding table, built once and cached.
pub fn fixed_litlen_code() -> &'static CanonicalCode {
    static CODE: OnceLock<CanonicalCode> = OnceLock::new();
    CODE.get_or_init(|| {
        CanonicalCode::from_lengths(&fixed_litlen_lengths())
            .expect("fixed literal/length code is complete")
    })
}

/// The fixed distance encoding table, built once and cached.
pub fn fixed_distance_code() -> &'static CanonicalCode {
    static CODE: OnceLock<CanonicalCode> = OnceLock::new();
    CODE.get_or_init(|| {
        CanonicalCode::from_lengths(&fixed_distance_lengths())
            .expect("fixed distance code is complete")
    })
}

/// Base length values for length codes 257-285 (RFC 1951 Section 3.2.5).
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits
];

/// Extra bit counts for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, // 257-264
    1, 1, 1, 1, // 265-268
    2, 2, 2, 2, // 269-272
    3, 3, 3, 3, // 273-276
    4, 4, 4, 4, // 277-280
    5, 5, 5, 5, // 281-284
    0, // 285
];

/// Base distance values for distance codes 0-29 (RFC 1951 Section 3.2.5).
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, // 0-3: 0 extra bits
    5, 7, // 4-5: 1 extra bit
    9, 13, // 6-7: 2 extra bits
    17, 25, // 8-9: 3 extra bits
    33, 49, // 10-11: 4 extra bits
    65, 97, // 12-13: 5 extra bits
    129, 193, // 14-15: 6 extra bits
    257, 385, // 16-17: 7 extra bits
    513, 769, // 18-19: 8 extra bits
    1025, 1537, // 20-21: 9 extra bits
    2049, 3073, // 22-23: 10 extra bits
    4097, 6145, // 24-25: 11 extra bits
    8193, 12289, // 26-27: 12 extra bits
    16385, 24577, // 28-29: 13 extra bits
];

/// Extra bit counts for distance codes 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, // 0-3
    1, 1, // 4-5
    2, 2, // 6-7
    3, 3, // 8-9
    4, 4, // 10-11
    5, 5, // 12-13
    6, 6, // 14-15
    7, 7, // 16-17
    8, 8, // 18-19
    9, 9, // 20-21
    10, 10, // 22-23
    11, 11, // 24-25
    12, 12, // 26-27
    13, 13, // 28-29
];

/// Transmission order of code length code lengths in a dynamic block
/// header (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Map a match length (3-258) to `(length code, extra bit count, extra
/// bit value)`.
pub fn length_to_code(length: u16) -> (u16, u8, u16) {
    debug_assert!((3..=258).contains(&length), "length out of range: {length}");

    let length = length as usize;
    let code = match length {
        3..=10 => length - 3 + 257,
        11..=18 => (length - 11) / 2 + 265,
        19..=34 => (length - 19) / 4 + 269,
        35..=66 => (length - 35) / 8 + 273,
        67..=130 => (length - 67) / 16 + 277,
        131..=257 => (length - 131) / 32 + 281,
        _ => 285,
    };

    let base = LENGTH_BASE[code - 257] as usize;
    let extra_bits = LENGTH_EXTRA_BITS[code - 257];
    (code as u16, extra_bits, (length - base) as u16)
}

/// Map a match distance (1-32768) to `(distance code, extra bit count,
/// extra bit value)`.
pub fn distance_to_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(distance >= 1, "distance out of range: {distance}");

    let code = match distance {
        1..=4 => (distance - 1) as usize,
        5..=6 => 4,
        7..=8 => 5,
        9..=12 => 6,
        13..=16 => 7,
        17..=24 => 8,
        25..=32 => 9,
        33..=48 => 10,
        49..=64 => 11,
        65..=96 => 12,
        97..=128 => 13,
        129..=192 => 14,
        193..=256 => 15,
        257..=384 => 16,
        385..=512 => 17,
        513..=768 => 18,
        769..=1024 => 19,
        1025..=1536 => 20,
        1537..=2048 => 21,
        2049..=3072 => 22,
        3073..=4096 => 23,
        4097..=6144 => 24,
        6145..=8192 => 25,
        8193..=12288 => 26,
        12289..=16384 => 27,
        16385..=24576 => 28,
        _ => 29, // 24577..=32768
    };

    let base = DISTANCE_BASE[code];
    let extra_bits = DISTANCE_EXTRA_BITS[code];
    (code as u16, extra_bits, distance - base)
}

/// Reconstruct a length from a length code and its extra bits.
pub fn decode_length(code: u16, extra: u16) -> u16 {
    debug_assert!((257..=285).contains(&code), "invalid length code: {code}");
    LENGTH_BASE[(code - 257) as usize] + extra
}

/// Reconstruct a distance from a distance code and its extra bits.
pub fn decode_distance(code: u16, extra: u16) -> u16 {
    debug_assert!(code < 30, "invalid distance code: {code}");
    DISTANCE_BASE[code as usize] + extra
}
