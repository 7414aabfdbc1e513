//! Bit-level I/O for variable-length codes.
//!
//! DEFLATE packs its Huffman codes and header fields LSB-first: the first
//! bit of the stream is the least significant bit of the first byte.
//! [`BitReader`] and [`BitWriter`] hide that packing behind `read_bits` /
//! `write_bits` calls of up to 32 bits, refilling or draining a 64-bit
//! accumulator across byte boundaries as needed.
//!
//! # Example
//!
//! ```
//! use ferroflate_core::bitstream::{BitReader, BitWriter};
//! use std::io::Cursor;
//!
//! let mut encoded = Vec::new();
//! {
//!     let mut writer = BitWriter::new(&mut encoded);
//!     writer.write_bits(0b101, 3).unwrap();
//!     writer.write_bits(0b1100, 4).unwrap();
//!     writer.flush().unwrap();
//! }
//!
//! let mut reader = BitReader::new(Cursor::new(&encoded));
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{FlateError, Result};
use std::io::{Read, Write};

/// A bit-level reader over any `Read` implementation.
///
/// Running out of input surfaces as [`FlateError::UnexpectedEof`], which is
/// distinct from every structural error so streaming callers can request
/// more bytes and retry.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    reader: R,
    /// Pending bits, LSB-first. The next bit to hand out is bit 0.
    bit_buf: u64,
    /// Number of valid bits in `bit_buf`.
    bit_count: u8,
    /// Total bits consumed, for error positions.
    consumed: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new `BitReader` wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bit_buf: 0,
            bit_count: 0,
            consumed: 0,
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Get a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume this `BitReader` and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// The current bit position in the stream, for error reporting.
    pub fn bit_position(&self) -> u64 {
        self.consumed
    }

    /// Top up the accumulator until it holds at least `count` bits.
    #[inline]
    fn refill(&mut self, count: u8) -> Result<()> {
        debug_assert!(count <= 57, "cannot refill more than 57 bits at once");

        while self.bit_count < count {
            let missing = count - self.bit_count;
            let want = (missing as usize).div_ceil(8).min(7);

            let mut chunk = [0u8; 8];
            let got = self.reader.read(&mut chunk[..want])?;
            if got == 0 {
                return Err(FlateError::unexpected_eof(want));
            }
            for &byte in &chunk[..got] {
                self.bit_buf |= u64::from(byte) << self.bit_count;
                self.bit_count += 8;
            }
        }

        Ok(())
    }

    /// Read up to 32 bits, first-read bit in the LSB position.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }
        self.refill(count)?;

        let mask = (1u64 << count).wrapping_sub(1);
        let value = (self.bit_buf & mask) as u32;
        self.bit_buf >>= count;
        self.bit_count -= count;
        self.consumed += u64::from(count);

        Ok(value)
    }

    /// Peek at up to 32 bits without consuming them.
    #[inline]
    pub fn peek_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "cannot peek more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }
        self.refill(count)?;

        let mask = (1u64 << count).wrapping_sub(1);
        Ok((self.bit_buf & mask) as u32)
    }

    /// Discard `count` previously peeked bits.
    pub fn skip_bits(&mut self, count: u8) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.refill(count)?;

        self.bit_buf >>= count;
        self.bit_count -= count;
        self.consumed += u64::from(count);

        Ok(())
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Discard the remaining bits of the current byte.
    ///
    /// Required before stored-block headers and byte-oriented trailer
    /// fields.
    pub fn align_to_byte(&mut self) {
        let partial = self.bit_count % 8;
        if partial > 0 {
            self.bit_buf >>= partial;
            self.bit_count -= partial;
            self.consumed += u64::from(partial);
        }
    }

    /// Read whole bytes, draining any buffered complete bytes first.
    ///
    /// The reader must be byte-aligned (call [`Self::align_to_byte`]).
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(self.bit_count % 8, 0, "read_bytes requires byte alignment");

        let mut filled = 0;
        while self.bit_count >= 8 && filled < buf.len() {
            buf[filled] = (self.bit_buf & 0xFF) as u8;
            self.bit_buf >>= 8;
            self.bit_count -= 8;
            self.consumed += 8;
            filled += 1;
        }

        if filled < buf.len() {
            let rest = &mut buf[filled..];
            self.reader.read_exact(rest).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    FlateError::unexpected_eof(rest.len())
                } else {
                    e.into()
                }
            })?;
            self.consumed += rest.len() as u64 * 8;
        }

        Ok(())
    }
}

/// A bit-level writer over any `Write` implementation.
///
/// Bits accumulate LSB-first and complete bytes are flushed to the
/// underlying writer as they form. Call [`BitWriter::flush`] (or drop the
/// writer) to pad and emit the final partial byte.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    writer: W,
    /// Pending bits, LSB-first.
    bit_buf: u64,
    /// Number of valid bits in `bit_buf`.
    bit_count: u8,
    /// Total bits written, including padding.
    written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a new `BitWriter` wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bit_buf: 0,
            bit_count: 0,
            written: 0,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Get a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.written
    }

    /// Emit every complete byte currently in the accumulator.
    #[inline]
    fn drain_bytes(&mut self) -> Result<()> {
        while self.bit_count >= 8 {
            let n = (self.bit_count / 8) as usize;
            let bytes = self.bit_buf.to_le_bytes();
            self.writer.write_all(&bytes[..n])?;
            self.bit_buf >>= n * 8;
            self.bit_count -= (n * 8) as u8;
        }
        Ok(())
    }

    /// Append the low `count` bits of `value`, LSB-first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "cannot write more than 32 bits at once");

        if count == 0 {
            return Ok(());
        }

        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count).wrapping_sub(1)
        };

        self.bit_buf |= u64::from(value & mask) << self.bit_count;
        self.bit_count += count;
        self.written += u64::from(count);

        self.drain_bytes()
    }

    /// Append a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.bit_buf |= u64::from(bit) << self.bit_count;
        self.bit_count += 1;
        self.written += 1;

        if self.bit_count >= 8 {
            self.drain_bytes()?;
        }
        Ok(())
    }

    /// Zero-pad to the next byte boundary.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let partial = self.bit_count % 8;
        if partial > 0 {
            self.write_bits(0, 8 - partial)?;
        }
        Ok(())
    }

    /// Write whole bytes.
    ///
    /// If the accumulator holds a partial byte the bytes are merged in
    /// bit-by-bit; otherwise they go straight to the underlying writer.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.drain_bytes()?;

        if self.bit_count > 0 {
            for &byte in buf {
                self.write_bits(u32::from(byte), 8)?;
            }
        } else {
            self.writer.write_all(buf)?;
            self.written += buf.len() as u64 * 8;
        }

        Ok(())
    }

    /// Pad the final byte with zeros and flush everything downstream.
    pub fn flush(&mut self) -> Result<()> {
        self.align_to_byte()?;
        self.drain_bytes()?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for BitWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_single_bits_lsb_first() {
        // 0xB5 = 0b10110101, LSB-first: 1,0,1,0,1,1,0,1
        let mut reader = BitReader::new(Cursor::new(vec![0xB5]));
        let bits: Vec<u32> = (0..8).map(|_| reader.read_bits(1).unwrap()).collect();
        assert_eq!(bits, [1, 0, 1, 0, 1, 1, 0, 1]);
    }

    #[test]
    fn test_read_across_byte_boundary() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFF, 0x00]));
        assert_eq!(reader.read_bits(4).unwrap(), 0xF);
        assert_eq!(reader.read_bits(8).unwrap(), 0x0F);
        assert_eq!(reader.read_bits(4).unwrap(), 0x0);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut reader = BitReader::new(Cursor::new(vec![0xAB]));
        assert_eq!(reader.peek_bits(4).unwrap(), 0xB);
        assert_eq!(reader.peek_bits(4).unwrap(), 0xB);
        assert_eq!(reader.read_bits(4).unwrap(), 0xB);
        assert_eq!(reader.peek_bits(4).unwrap(), 0xA);
    }

    #[test]
    fn test_eof_is_distinct() {
        let mut reader = BitReader::new(Cursor::new(vec![0x01]));
        reader.read_bits(8).unwrap();
        let err = reader.read_bits(1).unwrap_err();
        assert!(err.is_underrun());
    }

    #[test]
    fn test_writer_bit_by_bit() {
        let mut output = Vec::new();
        {
            let mut writer = BitWriter::new(&mut output);
            for bit in [true, false, true, false, true, true, false, true] {
                writer.write_bit(bit).unwrap();
            }
            writer.flush().unwrap();
        }
        assert_eq!(output, vec![0xB5]);
    }

    #[test]
    fn test_writer_groups() {
        let mut output = Vec::new();
        {
            let mut writer = BitWriter::new(&mut output);
            writer.write_bits(0b101, 3).unwrap();
            writer.write_bits(0b11001, 5).unwrap();
            writer.flush().unwrap();
        }
        // 11001_101 = 0xCD
        assert_eq!(output, vec![0xCD]);
    }

    #[test]
    fn test_roundtrip_mixed_widths() {
        let mut output = Vec::new();
        {
            let mut writer = BitWriter::new(&mut output);
            writer.write_bits(0b101, 3).unwrap();
            writer.write_bits(0b1111, 4).unwrap();
            writer.write_bits(0b10, 2).unwrap();
            writer.write_bits(0b110011, 6).unwrap();
            writer.flush().unwrap();
        }

        let mut reader = BitReader::new(Cursor::new(&output));
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1111);
        assert_eq!(reader.read_bits(2).unwrap(), 0b10);
        assert_eq!(reader.read_bits(6).unwrap(), 0b110011);
    }

    #[test]
    fn test_align_discards_partial_byte() {
        let mut reader = BitReader::new(Cursor::new(vec![0xFF, 0xAA]));
        reader.read_bits(3).unwrap();
        reader.align_to_byte();
        assert_eq!(reader.read_bits(8).unwrap(), 0xAA);
    }

    #[test]
    fn test_align_is_idempotent_on_boundary() {
        let mut reader = BitReader::new(Cursor::new(vec![0x12, 0x34]));
        reader.read_bits(8).unwrap();
        let pos = reader.bit_position();
        reader.align_to_byte();
        assert_eq!(reader.bit_position(), pos);
        assert_eq!(reader.read_bits(8).unwrap(), 0x34);
    }

    #[test]
    fn test_read_bytes_drains_buffer_first() {
        let mut reader = BitReader::new(Cursor::new(vec![0x12, 0x34, 0x56, 0x78]));
        // Pull a bit buffer in, then re-align.
        assert_eq!(reader.read_bits(8).unwrap(), 0x12);

        let mut buf = [0u8; 3];
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_writer_bytes_unaligned_merge() {
        let mut output = Vec::new();
        {
            let mut writer = BitWriter::new(&mut output);
            writer.write_bits(0b1, 1).unwrap();
            writer.write_bytes(&[0xFF]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(output, vec![0xFF, 0x01]);
    }
}
