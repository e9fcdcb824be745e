//! CRC-32 checksum used by the ZIP `crc-32` fields.
//!
//! This is the CRC-32/ISO-HDLC variant: reflected polynomial `0xEDB88320`
//! (the bit-reversed form of `0x04C11DB7`), initial value all-ones and a
//! final complement. Because the table is built from the reflected
//! polynomial, results come out in the bit order ZIP expects.

/// Reflected CRC-32 polynomial.
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Lookup table, computed once at compile time and shared by every caller.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Incremental CRC-32 hasher.
///
/// Feeding data in several chunks gives the same result as feeding the
/// concatenation in one call.
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create a hasher in its initial (all-ones) state.
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    /// Feed more bytes into the checksum.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.state ^ u32::from(byte)) & 0xFF) as usize;
            self.state = (self.state >> 8) ^ CRC32_TABLE[index];
        }
    }

    /// Return the checksum of everything fed so far.
    #[inline]
    pub fn finalize(&self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the CRC-32 of a byte slice in one shot.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(&[]), 0x0000_0000);
    }

    #[test]
    fn test_crc32_abcde() {
        assert_eq!(crc32(b"abcde"), 0x8587_D865);
    }

    #[test]
    fn test_crc32_hello() {
        assert_eq!(crc32(b"hello"), 0x3610_A686);
    }

    #[test]
    fn test_crc32_check_value() {
        // Standard check value for CRC-32/ISO-HDLC
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(CRC32_TABLE[0], 0);
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[128], POLYNOMIAL);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut hasher = Crc32::new();
        hasher.update(b"hel");
        hasher.update(b"");
        hasher.update(b"lo");
        assert_eq!(hasher.finalize(), crc32(b"hello"));
    }

    #[test]
    fn test_default_is_fresh() {
        let mut hasher = Crc32::default();
        hasher.update(b"abcde");
        assert_eq!(hasher.finalize(), 0x8587_D865);
    }

    proptest! {
        #[test]
        fn agrees_with_crc32fast(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(crc32(&data), crc32fast::hash(&data));
        }

        #[test]
        fn split_point_does_not_matter(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            split in 0usize..512,
        ) {
            let split = split.min(data.len());
            let mut hasher = Crc32::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            prop_assert_eq!(hasher.finalize(), crc32(&data));
        }
    }
}
