//! LZ77 match finding for DEFLATE.
//!
//! The matcher keeps a 64 KiB working buffer (two windows worth), a hash
//! table mapping 3-byte prefixes to their most recent position, and a
//! chain array linking every position to the previous one with the same
//! hash. Searching walks the chain newest-first, bounded by the level's
//! chain depth.
//!
//! Levels 4 and up use lazy matching: before committing to a match the
//! encoder peeks at the next position, and if a strictly longer match
//! starts there it emits a single literal instead and takes the longer
//! match on the next iteration.

use crate::tables::{MAX_DISTANCE, MAX_MATCH, MIN_MATCH};

/// Window size: how far back a match may reach.
const WINDOW_SIZE: usize = MAX_DISTANCE;

/// Hash table size (power of 2).
const HASH_SIZE: usize = 32768;

const HASH_MASK: usize = HASH_SIZE - 1;

/// A token produced by match finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference into the window.
    Match {
        /// Bytes to copy (3-258).
        length: u16,
        /// Distance back (1-32768).
        distance: u16,
    },
}

/// Per-level search parameters: (max chain depth, minimum accepted match
/// length, lazy matching).
///
/// Level 0 sets the minimum above [`MAX_MATCH`] so nothing ever matches
/// and the stream degenerates to literals.
fn level_parameters(level: u8) -> (usize, usize, bool) {
    match level {
        0 => (0, MAX_MATCH + 1, false),
        1 => (4, 4, false),
        2 => (8, 4, false),
        3 => (16, 4, false),
        4 => (32, 3, true),
        5 => (64, 3, true),
        6 => (128, 3, true),
        7 => (256, 3, true),
        8 => (1024, 3, true),
        _ => (4096, 3, true),
    }
}

/// Hash-chain LZ77 encoder.
#[derive(Debug)]
pub struct Lz77Encoder {
    /// Working buffer: two windows, slid by one window when full.
    window: Vec<u8>,
    /// Next free position in the window.
    window_pos: usize,
    /// Most recent position for each 3-byte hash.
    head: Vec<u16>,
    /// Previous position with the same hash, indexed by `pos & (WINDOW_SIZE - 1)`.
    chain: Vec<u16>,
    max_chain: usize,
    min_match: usize,
    lazy: bool,
}

impl Lz77Encoder {
    /// Create an encoder tuned for the given compression level (0-9).
    pub fn with_level(level: u8) -> Self {
        let (max_chain, min_match, lazy) = level_parameters(level);
        Self {
            window: vec![0; WINDOW_SIZE * 2],
            window_pos: 0,
            head: vec![0; HASH_SIZE],
            chain: vec![0; WINDOW_SIZE],
            max_chain,
            min_match,
            lazy,
        }
    }

    /// Discard all history.
    pub fn reset(&mut self) {
        self.window_pos = 0;
        self.head.fill(0);
        self.chain.fill(0);
    }

    /// Preload the window with a dictionary so early matches can reach
    /// into it. Only the last 32 KiB of an oversized dictionary is used.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) {
        self.reset();

        let tail = if dictionary.len() > WINDOW_SIZE {
            &dictionary[dictionary.len() - WINDOW_SIZE..]
        } else {
            dictionary
        };

        self.window[..tail.len()].copy_from_slice(tail);
        self.window_pos = tail.len();

        for pos in 0..tail.len().saturating_sub(MIN_MATCH - 1) {
            self.insert(pos);
        }
    }

    /// Mix three bytes into a table index.
    #[inline(always)]
    fn hash(b0: u8, b1: u8, b2: u8) -> usize {
        let h = (b0 as usize).wrapping_mul(506832829)
            ^ ((b1 as usize).wrapping_mul(2654435761) << 8)
            ^ ((b2 as usize).wrapping_mul(374761393) << 16);
        (h ^ (h >> 15)) & HASH_MASK
    }

    /// Record `pos` as the newest occurrence of its 3-byte prefix.
    ///
    /// The caller guarantees three bytes of data exist at `pos`.
    #[inline]
    fn insert(&mut self, pos: usize) {
        let h = Self::hash(self.window[pos], self.window[pos + 1], self.window[pos + 2]);
        self.chain[pos & (WINDOW_SIZE - 1)] = self.head[h];
        self.head[h] = pos as u16;
    }

    /// Find the longest match for `pos`, with valid data up to `end`.
    fn find_match(&self, pos: usize, end: usize) -> Option<(u16, u16)> {
        let lookahead = end - pos;
        if lookahead < MIN_MATCH {
            return None;
        }
        let max_len = lookahead.min(MAX_MATCH);

        let h = Self::hash(self.window[pos], self.window[pos + 1], self.window[pos + 2]);
        let min_pos = pos.saturating_sub(WINDOW_SIZE);

        let mut candidate = self.head[h] as usize;
        let mut best_len = self.min_match - 1;
        let mut best_dist = 0usize;

        for _ in 0..self.max_chain {
            if candidate < min_pos || candidate >= pos {
                break;
            }

            // A candidate that cannot beat the current best fails here on
            // a single byte comparison.
            if best_len < max_len
                && self.window[candidate + best_len] == self.window[pos + best_len]
                && self.window[candidate] == self.window[pos]
            {
                let mut len = 1;
                while len < max_len && self.window[candidate + len] == self.window[pos + len] {
                    len += 1;
                }

                if len > best_len {
                    best_len = len;
                    best_dist = pos - candidate;
                    if len >= max_len {
                        break;
                    }
                }
            }

            let next = self.chain[candidate & (WINDOW_SIZE - 1)] as usize;
            if next >= candidate {
                break;
            }
            candidate = next;
        }

        if best_len >= self.min_match {
            Some((best_len as u16, best_dist as u16))
        } else {
            None
        }
    }

    /// Turn input bytes into a token stream, carrying window history over
    /// from previous calls.
    pub fn tokenize(&mut self, input: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut input_pos = 0;

        while input_pos < input.len() {
            let space = self.window.len() - self.window_pos;
            let chunk = space.min(input.len() - input_pos);

            let start = self.window_pos;
            let end = start + chunk;
            self.window[start..end].copy_from_slice(&input[input_pos..input_pos + chunk]);

            self.process_range(start, end, &mut tokens);

            self.window_pos = end;
            input_pos += chunk;

            if self.window_pos >= WINDOW_SIZE + WINDOW_SIZE / 2 {
                self.slide_window();
            }
        }

        tokens
    }

    fn process_range(&mut self, start: usize, end: usize, tokens: &mut Vec<Token>) {
        let mut pos = start;

        while pos < end {
            let found = self.find_match(pos, end);

            let Some((length, distance)) = found else {
                tokens.push(Token::Literal(self.window[pos]));
                if pos + MIN_MATCH <= end {
                    self.insert(pos);
                }
                pos += 1;
                continue;
            };

            let mut take = true;
            let mut current_inserted = false;

            if self.lazy && (length as usize) < MAX_MATCH && pos + 1 < end {
                if pos + MIN_MATCH <= end {
                    self.insert(pos);
                    current_inserted = true;
                }
                if let Some((next_length, _)) = self.find_match(pos + 1, end) {
                    if next_length > length {
                        take = false;
                    }
                }
            }

            if take {
                tokens.push(Token::Match { length, distance });
                let first = if current_inserted { 1 } else { 0 };
                for i in first..length as usize {
                    if pos + i + MIN_MATCH <= end {
                        self.insert(pos + i);
                    }
                }
                pos += length as usize;
            } else {
                tokens.push(Token::Literal(self.window[pos]));
                pos += 1;
            }
        }
    }

    /// Drop the oldest window and shift positions down so indices stay in
    /// u16 range.
    fn slide_window(&mut self) {
        self.window.copy_within(WINDOW_SIZE..self.window_pos, 0);
        self.window_pos -= WINDOW_SIZE;

        for entry in self.head.iter_mut().chain(self.chain.iter_mut()) {
            *entry = entry.saturating_sub(WINDOW_SIZE as u16);
        }
    }
}
