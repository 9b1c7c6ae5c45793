use bincode::{Decode, Encode};
use rand_core::{impls, CryptoRng, RngCore};

use crate::bits::Bit;
use crate::constants::PRNG_CONTEXT;

/// The number of bytes in an RNG seed
const SEED_LEN: usize = blake3::KEY_LEN;

/// The seed a simulated party derives its triple shares from.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Generate a random Seed.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; SEED_LEN];
        rng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }
}

/// A deterministic RNG, expanding a seed with the BLAKE3 XOF.
///
/// Anyone holding the seed can replay the exact same stream.
#[derive(Clone)]
pub struct SeededRng {
    reader: blake3::OutputReader,
}

impl SeededRng {
    pub fn new(seed: &Seed) -> Self {
        let reader = blake3::Hasher::new_keyed(&seed.0)
            .update(PRNG_CONTEXT)
            .finalize_xof();
        Self { reader }
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.reader.fill(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for SeededRng {}

/// The number of bytes we buffer from the underlying RNG.
///
/// Using 64 is a good match with the XOF output from BLAKE3.
const BUF_LEN: usize = 64;

/// A source of secret random bits.
///
/// This wraps a cryptographically secure RNG, handing out its output one bit
/// at a time. Every bit is used once and then discarded. Secret shares and
/// multiplication triples draw from this, never from the public parameter
/// [`Generator`](crate::lfsr::Generator).
pub struct BitRng<R> {
    rng: R,
    /// The buffer holding the next bits of output from the RNG.
    buf: [u8; BUF_LEN],
    /// The next bit index within that buffer to read from.
    bit_index: usize,
}

impl<R: RngCore + CryptoRng> BitRng<R> {
    pub fn new(rng: R) -> Self {
        // Start past the end, so the first read fills the buffer.
        Self {
            rng,
            buf: [0; BUF_LEN],
            bit_index: 8 * BUF_LEN,
        }
    }

    /// Read the next bit from the output stream of this RNG.
    pub fn next_bit(&mut self) -> Bit {
        if self.bit_index >= 8 * BUF_LEN {
            self.rng.fill_bytes(&mut self.buf);
            self.bit_index = 0;
        }
        let index = self.bit_index;
        self.bit_index += 1;
        Bit::select_u8(self.buf[index / 8], index % 8)
    }

    /// Access the underlying RNG, for drawing byte-sized randomness.
    pub fn inner(&mut self) -> &mut R {
        &mut self.rng
    }
}

/// A pseudo-random generator of bits, fully determined by its seed.
pub type BitPRNG = BitRng<SeededRng>;

impl BitPRNG {
    pub fn seeded(seed: &Seed) -> Self {
        Self::new(SeededRng::new(seed))
    }
}


#[cfg(test)]
mod test {
    use super::testing::ScriptedRng;
    use super::*;

    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_bits_come_out_lsb_first() {
        let mut rng = BitRng::new(ScriptedRng::new([0b1101]));
        let bits: Vec<bool> = (0..5).map(|_| rng.next_bit().into()).collect();
        assert_eq!(bits, [true, false, true, true, false]);
    }

    #[test]
    fn test_refills_after_buffer_is_used() {
        let mut words = vec![0u64; BUF_LEN / 8];
        words.push(1);
        let mut rng = BitRng::new(ScriptedRng::new(words));
        for _ in 0..8 * BUF_LEN {
            assert_eq!(rng.next_bit(), Bit::zero());
        }
        assert_eq!(rng.next_bit(), Bit::one());
    }

    #[test]
    fn test_seeded_streams_replay() {
        let seed = Seed::random(&mut ChaCha20Rng::seed_from_u64(11));
        let mut first = BitPRNG::seeded(&seed);
        let mut second = BitPRNG::seeded(&seed);
        for _ in 0..3 * 8 * BUF_LEN {
            assert_eq!(first.next_bit(), second.next_bit());
        }
    }

    #[test]
    fn test_seeded_streams_move_forward() {
        // Every draw must advance, or all of a party's triple shares would repeat.
        let mut rng = BitPRNG::seeded(&Seed::from_bytes([7; SEED_LEN]));
        let bits: Vec<Bit> = (0..256).map(|_| rng.next_bit()).collect();
        assert!(bits.iter().any(|b| b.is_set()));
        assert!(bits.iter().any(|b| !b.is_set()));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = BitPRNG::seeded(&Seed::from_bytes([1; SEED_LEN]));
        let mut b = BitPRNG::seeded(&Seed::from_bytes([2; SEED_LEN]));
        let same = (0..256).filter(|_| a.next_bit() == b.next_bit()).count();
        assert!(same < 256);
    }

    #[test]
    fn test_bits_are_not_constant() {
        let mut rng = BitRng::new(ChaCha20Rng::seed_from_u64(7));
        let ones = (0..4096).filter(|_| rng.next_bit().is_set()).count();
        assert!((1500..2600).contains(&ones));
    }
}
