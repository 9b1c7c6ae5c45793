use bincode::{config, encode_into_std_write, Decode, Encode};
use blake3::KEY_LEN;
use rand_core::{CryptoRng, RngCore};

use crate::bits::BitBuf;
use crate::constants::{COMMITMENT_CONTEXT, HASH_SIZE_BYTES};
use crate::error::Error;

/// The key a commitment was made under.
///
/// Revealing it alongside a value lets anyone check that value against its commitment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Decommitment([u8; KEY_LEN]);

impl Decommitment {
    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut out = [0u8; KEY_LEN];
        rng.fill_bytes(&mut out);
        Self(out)
    }
}

/// A commitment to some value.
///
/// Commitments to every party's view and starting state are published, and
/// absorbed into the transcript, before the challenge exists. Whatever the
/// challenge leaves closed then stays bound without being revealed.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Commitment([u8; HASH_SIZE_BYTES]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        &self.0
    }

    /// The commitment as bits, for absorbing into a transcript.
    pub fn to_bits(&self) -> BitBuf {
        BitBuf::from_bytes(&self.0)
    }
}

fn make_commitment<T: Encode>(decommitment: &Decommitment, value: &T) -> Result<Commitment, Error> {
    let mut hasher = blake3::Hasher::new_keyed(&decommitment.0);
    hasher.update(COMMITMENT_CONTEXT);
    encode_into_std_write(value, &mut hasher, config::standard())?;
    let mut out = [0u8; HASH_SIZE_BYTES];
    hasher.finalize_xof().fill(&mut out);
    Ok(Commitment(out))
}

/// Commit to the bincode encoding of `value` under a fresh random key.
///
/// The commitment can be published right away; the decommitment opens it later.
pub fn commit<T: Encode, R: RngCore + CryptoRng>(
    rng: &mut R,
    value: &T,
) -> Result<(Commitment, Decommitment), Error> {
    let decommitment = Decommitment::random(rng);
    let commitment = make_commitment(&decommitment, value)?;
    Ok((commitment, decommitment))
}

/// Check whether `commitment` opens to `value` under `decommitment`.
pub fn decommit<T: Encode>(
    value: &T,
    commitment: &Commitment,
    decommitment: &Decommitment,
) -> Result<bool, Error> {
    let recommitment = make_commitment(decommitment, value)?;
    Ok(recommitment == *commitment)
}

#[cfg(test)]
mod test {
    use super::*;

    use proptest::prelude::*;
    use rand_core::OsRng;

    proptest! {
        #[test]
        fn test_commit_then_decommit(x in any::<u64>()) {
            let (com, decom) = commit(&mut OsRng, &x).unwrap();
            assert!(decommit(&x, &com, &decom).unwrap());
        }
    }

    proptest! {
        #[test]
        fn test_commit_to_different_values(x in any::<u64>(), y in any::<u64>()) {
            let (com, decom) = commit(&mut OsRng, &x).unwrap();
            assert!(x == y || !decommit(&y, &com, &decom).unwrap());
        }
    }

    #[test]
    fn test_wrong_decommitment_fails() {
        let (com, _) = commit(&mut OsRng, &7u64).unwrap();
        assert!(!decommit(&7u64, &com, &Decommitment::default()).unwrap());
    }

    #[test]
    fn test_bits_cover_the_hash() {
        let (com, _) = commit(&mut OsRng, &1u8).unwrap();
        let bits = com.to_bits();
        assert_eq!(bits.len(), 8 * HASH_SIZE_BYTES);
        assert_eq!(bits.get(0).map(bool::from), Some(com.as_bytes()[0] & 1 == 1));
    }
}
