//! The LowMC family of block ciphers.
//!
//! All public data (linear layers, round constants, key matrices) comes from
//! the [`Generator`], so every instance with the same parameters is identical.
use bincode::{Decode, Encode};
use tracing::{debug, trace};

use crate::bits::{Bit, BitVector};
use crate::error::Error;
use crate::lfsr::Generator;
use crate::matrix::Matrix;

/// The 3 bit S-box.
const SBOX: [u8; 8] = [0x00, 0x01, 0x03, 0x06, 0x07, 0x04, 0x05, 0x02];
const INV_SBOX: [u8; 8] = [0x00, 0x01, 0x07, 0x02, 0x05, 0x06, 0x03, 0x04];

/// The dimensions of a LowMC instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub struct CipherParameters {
    pub block_size: usize,
    pub key_size: usize,
    /// The number of 3 bit S-boxes in each substitution layer.
    pub num_sboxes: usize,
    pub rounds: usize,
}

impl CipherParameters {
    /// A 256 bit block, 80 bit key instance, for use as a keyed cipher.
    pub const LOWMC_256_80: Self = Self {
        block_size: 256,
        key_size: 80,
        num_sboxes: 49,
        rounds: 8,
    };

    /// A small single round instance for compressing transcripts.
    pub const COMPRESSION_64: Self = Self {
        block_size: 64,
        key_size: 40,
        num_sboxes: 1,
        rounds: 1,
    };

    /// A wider single round instance for compressing transcripts.
    pub const COMPRESSION_128: Self = Self {
        block_size: 128,
        key_size: 80,
        num_sboxes: 10,
        rounds: 1,
    };

    /// The number of bits the substitution layer leaves untouched.
    ///
    /// Only meaningful for validated parameters.
    pub fn identity_size(&self) -> usize {
        self.block_size - 3 * self.num_sboxes
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.block_size == 0 {
            return Err(Error::InvalidParameters {
                reason: "block size must be positive",
            });
        }
        if self.key_size == 0 {
            return Err(Error::InvalidParameters {
                reason: "key size must be positive",
            });
        }
        if self.num_sboxes.checked_mul(3).map_or(true, |bits| bits > self.block_size) {
            return Err(Error::InvalidParameters {
                reason: "S-boxes don't fit in the block",
            });
        }
        Ok(())
    }
}

/// Whether an instance keeps the inverse linear layers needed to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    EncryptDecrypt,
    EncryptOnly,
}

/// An instantiated LowMC cipher, holding its public data and current round keys.
#[derive(Debug, Clone)]
pub struct LowMc {
    params: CipherParameters,
    lin_matrices: Vec<Matrix>,
    inv_lin_matrices: Option<Vec<Matrix>>,
    round_constants: Vec<BitVector>,
    /// `rounds + 1` matrices of `block_size x key_size` bits.
    key_matrices: Vec<Matrix>,
    round_keys: Vec<BitVector>,
}

impl LowMc {
    /// Instantiate a cipher that can both encrypt and decrypt.
    ///
    /// The key starts out as all zeros until [`LowMc::set_key`] is called.
    pub fn new(params: CipherParameters) -> Result<Self, Error> {
        Self::instantiate(params, Mode::EncryptDecrypt, &mut Generator::new())
    }

    /// Instantiate a cipher without the inverse linear layers.
    pub fn encrypt_only(params: CipherParameters) -> Result<Self, Error> {
        Self::instantiate(params, Mode::EncryptOnly, &mut Generator::new())
    }

    /// Instantiate a cipher, drawing its public data from `generator`.
    ///
    /// Linear layers are drawn until one is invertible, and key matrices until
    /// one has maximal rank. The expected number of retries is small, but
    /// there is no cap: a degenerate generator would stall here.
    pub fn instantiate(
        params: CipherParameters,
        mode: Mode,
        generator: &mut Generator,
    ) -> Result<Self, Error> {
        params.validate()?;
        let CipherParameters {
            block_size,
            key_size,
            rounds,
            ..
        } = params;

        let mut retries = 0;
        let mut lin_matrices = Vec::with_capacity(rounds);
        for r in 0..rounds {
            let mat = loop {
                let candidate = generator.matrix(block_size, block_size);
                if candidate.rank() == block_size {
                    break candidate;
                }
                trace!(round = r, "rejected singular linear layer");
                retries += 1;
            };
            lin_matrices.push(mat);
        }
        let inv_lin_matrices = match mode {
            Mode::EncryptDecrypt => Some(
                lin_matrices
                    .iter()
                    .map(Matrix::invert)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Mode::EncryptOnly => None,
        };

        let round_constants = (0..rounds).map(|_| generator.vector(block_size)).collect();

        let min_rank = block_size.min(key_size);
        let mut key_matrices = Vec::with_capacity(rounds + 1);
        for r in 0..=rounds {
            let mat = loop {
                let candidate = generator.matrix(block_size, key_size);
                if candidate.rank() >= min_rank {
                    break candidate;
                }
                trace!(round = r, "rejected rank deficient key matrix");
                retries += 1;
            };
            key_matrices.push(mat);
        }
        debug!(?params, retries, "instantiated LowMC");

        let mut out = Self {
            params,
            lin_matrices,
            inv_lin_matrices,
            round_constants,
            key_matrices,
            round_keys: Vec::new(),
        };
        out.set_key(&BitVector::zeros(key_size))?;
        Ok(out)
    }

    pub fn params(&self) -> &CipherParameters {
        &self.params
    }

    /// Set the master key, regenerating every round key from it.
    pub fn set_key(&mut self, key: &BitVector) -> Result<(), Error> {
        if key.len() != self.params.key_size {
            return Err(Error::DimensionMismatch {
                expected: self.params.key_size,
                actual: key.len(),
            });
        }
        self.round_keys = self
            .key_matrices
            .iter()
            .map(|m| m.mul_vec(key))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    pub fn encrypt(&self, message: &BitVector) -> Result<BitVector, Error> {
        self.check_block(message)?;
        let mut c = message ^ &self.round_keys[0];
        for r in 0..self.params.rounds {
            self.substitute(&mut c, &SBOX);
            c = self.lin_matrices[r].mul_vec(&c)?;
            c ^= &self.round_constants[r];
            c ^= &self.round_keys[r + 1];
        }
        Ok(c)
    }

    pub fn decrypt(&self, ciphertext: &BitVector) -> Result<BitVector, Error> {
        self.check_block(ciphertext)?;
        let inv_lin_matrices = self
            .inv_lin_matrices
            .as_ref()
            .ok_or(Error::DecryptionUnavailable)?;
        let mut c = ciphertext.clone();
        for r in (0..self.params.rounds).rev() {
            c ^= &self.round_keys[r + 1];
            c ^= &self.round_constants[r];
            c = inv_lin_matrices[r].mul_vec(&c)?;
            self.substitute(&mut c, &INV_SBOX);
        }
        c ^= &self.round_keys[0];
        Ok(c)
    }

    fn check_block(&self, block: &BitVector) -> Result<(), Error> {
        if block.len() != self.params.block_size {
            return Err(Error::DimensionMismatch {
                expected: self.params.block_size,
                actual: block.len(),
            });
        }
        Ok(())
    }

    /// Apply `sbox` to each 3 bit group in the low part of the block.
    ///
    /// Group `i` covers bits `3i..3i+3`, read with bit `3i` as the least
    /// significant. The top `identity_size` bits pass through.
    fn substitute(&self, block: &mut BitVector, sbox: &[u8; 8]) {
        for group in (0..self.params.num_sboxes).rev() {
            let base = 3 * group;
            let index = (0..3).fold(0usize, |acc, i| {
                acc | ((u64::from(block.get(base + i)) as usize) << i)
            });
            let out = sbox[index];
            for i in 0..3 {
                block.set(base + i, Bit::select_u8(out, i));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::default_key;

    use proptest::prelude::*;
    use std::sync::OnceLock;

    const SMALL: CipherParameters = CipherParameters {
        block_size: 32,
        key_size: 16,
        num_sboxes: 5,
        rounds: 4,
    };

    fn small_cipher() -> &'static LowMc {
        static CIPHER: OnceLock<LowMc> = OnceLock::new();
        CIPHER.get_or_init(|| {
            let mut cipher = LowMc::new(SMALL).unwrap();
            cipher.set_key(&BitVector::from_u64(0xBEEF, 16)).unwrap();
            cipher
        })
    }

    #[test]
    fn test_sboxes_are_inverse() {
        for x in 0..8 {
            assert_eq!(INV_SBOX[SBOX[x] as usize] as usize, x);
        }
    }

    #[test]
    fn test_substitution_leaves_identity_part() {
        let cipher = LowMc::encrypt_only(CipherParameters {
            block_size: 8,
            key_size: 8,
            num_sboxes: 2,
            rounds: 1,
        })
        .unwrap();
        // groups (low first): 0b011 -> SBOX[3] = 0b110, 0b100 -> SBOX[4] = 0b111
        let mut block = BitVector::from_u64(0b10_100_011, 8);
        cipher.substitute(&mut block, &SBOX);
        assert_eq!(block, BitVector::from_u64(0b10_111_110, 8));
        cipher.substitute(&mut block, &INV_SBOX);
        assert_eq!(block, BitVector::from_u64(0b10_100_011, 8));
    }

    #[test]
    fn test_compression_known_answer() {
        let mut cipher = LowMc::encrypt_only(CipherParameters::COMPRESSION_64).unwrap();
        cipher.set_key(&default_key(40)).unwrap();
        let c = cipher.encrypt(&BitVector::from_u64(0xFFD5, 64)).unwrap();
        assert_eq!(c, BitVector::from_u64(0x5480c47e06cad6e7, 64));
    }

    #[test]
    fn test_small_known_answer() {
        let c = small_cipher()
            .encrypt(&BitVector::from_u64(0x12345678, 32))
            .unwrap();
        assert_eq!(c, BitVector::from_u64(0xf325fd20, 32));
    }

    #[test]
    fn test_key_wider_than_block_known_answer() {
        let params = CipherParameters {
            block_size: 16,
            key_size: 24,
            num_sboxes: 2,
            rounds: 2,
        };
        let mut cipher = LowMc::new(params).unwrap();
        cipher.set_key(&BitVector::from_u64(0xABCDEF, 24)).unwrap();
        let m = BitVector::from_u64(0x0F0F, 16);
        let c = cipher.encrypt(&m).unwrap();
        assert_eq!(c, BitVector::from_u64(0x2655, 16));
        assert_eq!(cipher.decrypt(&c).unwrap(), m);
    }

    #[test]
    fn test_instantiation_is_deterministic() {
        let a = LowMc::new(SMALL).unwrap();
        let b = LowMc::new(SMALL).unwrap();
        assert_eq!(a.lin_matrices, b.lin_matrices);
        assert_eq!(a.round_constants, b.round_constants);
        assert_eq!(a.key_matrices, b.key_matrices);
    }

    #[test]
    fn test_generated_data_meets_rank_bounds() {
        let cipher = small_cipher();
        for m in &cipher.lin_matrices {
            assert_eq!(m.rank(), 32);
        }
        assert_eq!(cipher.key_matrices.len(), SMALL.rounds + 1);
        for m in &cipher.key_matrices {
            assert_eq!((m.rows(), m.cols()), (32, 16));
            assert!(m.rank() >= 16);
        }
    }

    #[test]
    fn test_full_size_round_trip() {
        let mut cipher = LowMc::new(CipherParameters::LOWMC_256_80).unwrap();
        assert_eq!(cipher.params().identity_size(), 256 - 147);
        let mut key = BitVector::zeros(80);
        key.set(0, Bit::one());
        cipher.set_key(&key).unwrap();
        let m = BitVector::from_u64(0xFFD5, 256);
        let c = cipher.encrypt(&m).unwrap();
        assert_ne!(c, m);
        assert_eq!(cipher.decrypt(&c).unwrap(), m);
    }

    #[test]
    fn test_encrypt_only_cannot_decrypt() {
        let cipher = LowMc::encrypt_only(SMALL).unwrap();
        assert_eq!(
            cipher.decrypt(&BitVector::zeros(32)).unwrap_err(),
            Error::DecryptionUnavailable
        );
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let too_many_sboxes = CipherParameters {
            num_sboxes: 11,
            ..SMALL
        };
        assert!(matches!(
            LowMc::new(too_many_sboxes),
            Err(Error::InvalidParameters { .. })
        ));
        let no_key = CipherParameters {
            key_size: 0,
            ..SMALL
        };
        assert!(matches!(
            LowMc::new(no_key),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_lengths() {
        let mut cipher = LowMc::new(SMALL).unwrap();
        assert_eq!(
            cipher.set_key(&BitVector::zeros(15)),
            Err(Error::DimensionMismatch {
                expected: 16,
                actual: 15
            })
        );
        assert!(cipher.encrypt(&BitVector::zeros(31)).is_err());
    }

    proptest! {
        #[test]
        fn test_decrypt_inverts_encrypt(m in any::<u32>()) {
            let cipher = small_cipher();
            let m = BitVector::from_u64(m as u64, 32);
            let c = cipher.encrypt(&m).unwrap();
            assert_eq!(cipher.decrypt(&c).unwrap(), m);
        }
    }

    proptest! {
        #[test]
        fn test_encrypt_inverts_decrypt(c in any::<u32>()) {
            let cipher = small_cipher();
            let c = BitVector::from_u64(c as u64, 32);
            let m = cipher.decrypt(&c).unwrap();
            assert_eq!(cipher.encrypt(&m).unwrap(), c);
        }
    }
}
