//! Rolling checksums for stream integrity.
//!
//! Two checksums cover the formats ferroflate frames:
//!
//! - **Adler-32** (RFC 1950): zlib trailer. Faster than CRC-32, weaker
//!   against random corruption.
//! - **CRC-32** (ISO 3309, polynomial 0xEDB88320): gzip trailer and header
//!   CRC. Uses slicing-by-8 for inputs of 16 bytes or more.
//!
//! Both are incremental: feed data through `update` in any chunking and the
//! final value is identical to a one-shot computation.

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Max bytes the Adler sums can absorb before a modulo is required to keep
/// `b` from overflowing u32.
const ADLER_NMAX: usize = 5552;

/// Adler-32 checksum calculator (RFC 1950).
///
/// # Example
///
/// ```
/// use ferroflate_core::checksum::Adler32;
///
/// let mut adler = Adler32::new();
/// adler.update(b"Hello");
/// assert_eq!(adler.value(), 0x058C01F5);
/// ```
#[derive(Debug, Clone)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new calculator with the initial value 1.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Reset to the initial state.
    pub fn reset(&mut self) {
        self.a = 1;
        self.b = 0;
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        // Defer the modulo: both sums fit in u32 for up to NMAX bytes.
        for chunk in data.chunks(ADLER_NMAX) {
            for &byte in chunk {
                a += u32::from(byte);
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        self.a = a;
        self.b = b;
    }

    /// The current checksum value.
    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Compute the checksum of a slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.value()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected).
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32 slicing-by-8 tables; table 0 is the standard table.
const CRC32_TABLE_SLICE: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];
    tables[0] = CRC32_TABLE;

    let mut t = 1;
    while t < 8 {
        let mut i = 0usize;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = tables[0][(prev & 0xFF) as usize] ^ (prev >> 8);
            i += 1;
        }
        t += 1;
    }

    tables
};

/// CRC-32 calculator (ISO 3309, as used by gzip, ZIP, and PNG).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value: 0xFFFFFFFF, final XOR: 0xFFFFFFFF
/// - Reflected input and output
///
/// # Example
///
/// ```
/// use ferroflate_core::checksum::Crc32;
///
/// assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { crc: 0xFFFFFFFF }
    }

    /// Reset to the initial state.
    pub fn reset(&mut self) {
        self.crc = 0xFFFFFFFF;
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        // Slicing-by-8 only pays off once there is at least one full block.
        if data.len() >= 16 {
            self.crc = crc32_slice8(self.crc, data);
        } else {
            self.crc = crc32_bytewise(self.crc, data);
        }
    }

    /// The current CRC value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.crc ^ 0xFFFFFFFF
    }

    /// Compute the CRC of a slice in one call.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.value()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte-at-a-time CRC-32, best for short inputs.
#[inline]
fn crc32_bytewise(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

/// Slicing-by-8 CRC-32: eight table lookups per 8-byte block.
#[inline]
fn crc32_slice8(mut crc: u32, data: &[u8]) -> u32 {
    let mut blocks = data.chunks_exact(8);

    for block in blocks.by_ref() {
        let lo = crc ^ u32::from_le_bytes([block[0], block[1], block[2], block[3]]);

        crc = CRC32_TABLE_SLICE[7][(lo & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[6][((lo >> 8) & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[5][((lo >> 16) & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[4][((lo >> 24) & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[3][block[4] as usize]
            ^ CRC32_TABLE_SLICE[2][block[5] as usize]
            ^ CRC32_TABLE_SLICE[1][block[6] as usize]
            ^ CRC32_TABLE_SLICE[0][block[7] as usize];
    }

    crc32_bytewise(crc, blocks.remainder())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_empty() {
        assert_eq!(Adler32::compute(b""), 1);
    }

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(Adler32::compute(b"Hello"), 0x058C01F5);
        // RFC 1950 example input "Wikipedia".
        assert_eq!(Adler32::compute(b"Wikipedia"), 0x11E60398);
    }

    #[test]
    fn test_adler32_incremental_matches_one_shot() {
        let data = b"Hello, World!";
        let one_shot = Adler32::compute(data);

        let mut adler = Adler32::new();
        adler.update(&data[..6]);
        adler.update(&data[6..]);
        assert_eq!(adler.value(), one_shot);
    }

    #[test]
    fn test_adler32_beyond_deferred_modulo_window() {
        // 0xFF maximizes sum growth; length exceeds NMAX.
        let data = vec![0xFFu8; 100_000];
        let one_shot = Adler32::compute(&data);

        let mut adler = Adler32::new();
        for chunk in data.chunks(977) {
            adler.update(chunk);
        }
        assert_eq!(adler.value(), one_shot);
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(Crc32::compute(b""), 0x00000000);
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_crc32_incremental() {
        let mut crc = Crc32::new();
        crc.update(b"Hello");
        crc.update(b", ");
        crc.update(b"World!");
        assert_eq!(crc.value(), 0xEC4AC3D0);
    }

    #[test]
    fn test_crc32_slice_tables() {
        assert_eq!(CRC32_TABLE[0], 0x00000000);
        assert_eq!(CRC32_TABLE[1], 0x77073096);
        assert_eq!(CRC32_TABLE[255], 0x2D02EF8D);

        for t in 1..8 {
            for i in 0..256 {
                let prev = CRC32_TABLE_SLICE[t - 1][i];
                let expected = CRC32_TABLE[(prev & 0xFF) as usize] ^ (prev >> 8);
                assert_eq!(CRC32_TABLE_SLICE[t][i], expected);
            }
        }
    }

    #[test]
    fn test_crc32_chunking_invariance() {
        // Boundary sizes around the slicing threshold.
        for size in [1, 7, 8, 15, 16, 17, 31, 32, 63, 64, 255, 256] {
            let data: Vec<u8> = (0..size).map(|i| (i * 31 + 7) as u8).collect();
            let one_shot = Crc32::compute(&data);

            let mut crc = Crc32::new();
            for chunk in data.chunks(5) {
                crc.update(chunk);
            }
            assert_eq!(crc.value(), one_shot, "size {size}");
        }
    }
}
