//! Samples and the per-sample bit-density statistic.

/// One fixed-size read from the TRNG together with its popcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    bytes: Vec<u8>,
    ones: u32,
}

impl Sample {
    pub fn new(bytes: Vec<u8>) -> Self {
        let ones = popcount(&bytes);
        Self { bytes, ones }
    }

    /// Raw bytes in the order the device produced them.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bits set to 1 across the whole sample.
    #[inline]
    pub fn ones(&self) -> u32 {
        self.ones
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Count of 1 bits over every byte, 8 bits per byte.
///
/// Pure bit density: no sign or byte-order interpretation.
pub fn popcount(bytes: &[u8]) -> u32 {
    bytes.iter().map(|b| b.count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popcount_of_zero_bytes_is_zero() {
        assert_eq!(popcount(&[]), 0);
        assert_eq!(popcount(&[0x00; 32]), 0);
    }

    #[test]
    fn popcount_of_ff_bytes_is_eight_per_byte() {
        for n in [1usize, 2, 7, 256] {
            assert_eq!(popcount(&vec![0xFF; n]), 8 * n as u32);
        }
    }

    #[test]
    fn popcount_matches_per_byte_sum() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let expected: u32 = bytes
            .iter()
            .map(|&b| (0..8).filter(|bit| b & (1 << bit) != 0).count() as u32)
            .sum();
        assert_eq!(popcount(&bytes), expected);
        // Every bit position is set in exactly half of 0..=255
        assert_eq!(expected, 8 * 128);
    }

    #[test]
    fn popcount_ignores_byte_order() {
        assert_eq!(popcount(&[0xF0, 0x0F]), 8);
        assert_eq!(popcount(&[0x0F, 0xF0]), 8);
        assert_eq!(popcount(&[0x80, 0x01, 0x00]), 2);
    }

    #[test]
    fn sample_carries_its_statistic() {
        let sample = Sample::new(vec![0xF0, 0x0F]);
        assert_eq!(sample.ones(), 8);
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.bytes(), &[0xF0, 0x0F]);
        assert!(!sample.is_empty());
    }
}
