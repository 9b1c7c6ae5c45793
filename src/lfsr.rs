//! A deterministic source of public parameter bits.
//!
//! This is the Grain LFSR used as a self-shrinking generator, started from the
//! all ones state. Nothing about it is secret: anyone can regenerate the exact
//! same stream, which is the point. It must never be used where real
//! randomness is required; see [`crate::rng`] for that.
use crate::bits::{Bit, BitVector};
use crate::matrix::Matrix;

const STATE_BITS: u32 = 80;
const STATE_MASK: u128 = (1 << STATE_BITS) - 1;
/// Positions of the state xored together to produce the feedback bit.
const TAPS: [u32; 6] = [0, 13, 23, 38, 51, 62];
/// Raw outputs thrown away before anything is handed out.
const WARMUP_CLOCKS: usize = 160;

/// An 80 bit Grain-style LFSR with self-shrinking output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    state: u128,
}

impl Generator {
    /// Create a generator in its initial state.
    ///
    /// Two generators created this way yield identical streams.
    pub fn new() -> Self {
        let mut out = Self { state: STATE_MASK };
        for _ in 0..WARMUP_CLOCKS {
            out.clock();
        }
        out
    }

    /// Advance the register by one step, returning the feedback bit.
    ///
    /// The register shifts towards position 0, dropping that bit, and the
    /// feedback enters at position 79.
    fn clock(&mut self) -> Bit {
        let feedback = TAPS
            .iter()
            .fold(0, |acc, tap| acc ^ ((self.state >> tap) & 1));
        self.state = (self.state >> 1) | (feedback << (STATE_BITS - 1));
        Bit::from(feedback == 1)
    }

    /// The next bit of the raw LFSR stream, without shrinking.
    pub fn next_raw_bit(&mut self) -> Bit {
        self.clock()
    }

    /// The next bit of the self-shrinking stream.
    ///
    /// Raw bits are drawn in pairs; the second is emitted only when the first
    /// is set.
    pub fn next_bit(&mut self) -> Bit {
        loop {
            let choice = self.clock();
            let value = self.clock();
            if choice.is_set() {
                return value;
            }
        }
    }

    /// Draw `len` bits into a vector, filling bit 0 first.
    pub fn vector(&mut self, len: usize) -> BitVector {
        BitVector::from_bits((0..len).map(|_| self.next_bit()))
    }

    /// Draw a `rows x cols` matrix, one row at a time.
    pub fn matrix(&mut self, rows: usize, cols: usize) -> Matrix {
        Matrix::from_generated_rows((0..rows).map(|_| self.vector(cols)).collect(), cols)
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn to_u64(bits: impl Iterator<Item = Bit>) -> u64 {
        bits.take(64)
            .enumerate()
            .fold(0, |acc, (i, b)| acc | (u64::from(b) << i))
    }

    #[test]
    fn test_raw_stream_after_warmup() {
        let mut gen = Generator::new();
        let raw = to_u64(std::iter::repeat_with(|| gen.next_raw_bit()));
        assert_eq!(raw, 0x8a5838f0958c8b14);
    }

    #[test]
    fn test_self_shrinking_stream() {
        let mut gen = Generator::new();
        let bits = to_u64(std::iter::repeat_with(|| gen.next_bit()));
        assert_eq!(bits, 0x1b75cb8d6c48838c);
    }

    #[test]
    fn test_fresh_generators_agree() {
        let mut a = Generator::new();
        let mut b = Generator::default();
        assert_eq!(a.vector(1000), b.vector(1000));
        assert_eq!(a, b);
    }

    #[test]
    fn test_vector_fills_low_bits_first() {
        let mut a = Generator::new();
        let mut b = Generator::new();
        let v = a.vector(10);
        for i in 0..10 {
            assert_eq!(v.get(i), b.next_bit());
        }
    }

    #[test]
    fn test_state_stays_within_80_bits() {
        let mut gen = Generator::new();
        for _ in 0..500 {
            gen.next_bit();
            assert_eq!(gen.state & !STATE_MASK, 0);
            assert_ne!(gen.state, 0);
        }
    }
}
