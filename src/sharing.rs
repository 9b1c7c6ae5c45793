//! Xor secret sharing between `n` parties, and Boolean multiplication triples.
//!
//! Parties are numbered `0..n`. Party 0 is the distinguished party: its share
//! absorbs the secret, and it alone applies public corrections during gate
//! emulation.
use rand_core::{CryptoRng, RngCore};

use crate::bits::Bit;
use crate::error::Error;
use crate::rng::BitRng;

/// One bit, split into a share for each party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shares(Vec<Bit>);

impl Shares {
    pub fn from_bits(bits: impl Into<Vec<Bit>>) -> Self {
        Self(bits.into())
    }

    /// The number of parties holding a share.
    pub fn parties(&self) -> usize {
        self.0.len()
    }

    /// The share held by `party`.
    pub fn get(&self, party: usize) -> Bit {
        self.0[party]
    }

    pub fn iter(&self) -> impl Iterator<Item = Bit> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Bit] {
        &self.0
    }

    /// Xor every share together, recovering the secret.
    pub fn reconstruct(&self) -> Bit {
        self.iter().fold(Bit::zero(), |acc, b| acc ^ b)
    }

    pub(crate) fn check_parties(&self, n: usize) -> Result<(), Error> {
        if self.0.len() != n {
            return Err(Error::ShareCountMismatch {
                expected: n,
                actual: self.0.len(),
            });
        }
        Ok(())
    }
}

impl FromIterator<Bit> for Shares {
    fn from_iter<T: IntoIterator<Item = Bit>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn check_party_count(n: usize) -> Result<(), Error> {
    if n < 2 {
        return Err(Error::InvalidParameters {
            reason: "at least 2 parties are needed",
        });
    }
    Ok(())
}

/// Split a secret bit into `n` shares.
///
/// Parties `1..n` get fresh random bits, and party 0 gets the secret xored
/// with all of them.
pub fn share<R: RngCore + CryptoRng>(
    rng: &mut BitRng<R>,
    secret: Bit,
    n: usize,
) -> Result<Shares, Error> {
    check_party_count(n)?;
    let mut shares = vec![secret; n];
    for i in 1..n {
        let bit = rng.next_bit();
        shares[i] = bit;
        shares[0] ^= bit;
    }
    Ok(Shares(shares))
}

/// Recover the secret from exactly `n` shares.
pub fn reconstruct(shares: &Shares, n: usize) -> Result<Bit, Error> {
    shares.check_parties(n)?;
    Ok(shares.reconstruct())
}

/// A Beaver triple `(a, b, c = a & b)`, with each value shared between the parties.
///
/// A triple must be consumed by exactly one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub a: Shares,
    pub b: Shares,
    pub c: Shares,
}

impl Triple {
    /// Generate a fresh triple from random `a` and `b`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut BitRng<R>, n: usize) -> Result<Self, Error> {
        let a = rng.next_bit();
        let b = rng.next_bit();
        Self::with_values(rng, a, b, n)
    }

    /// Share a triple built from chosen `a` and `b`.
    pub fn with_values<R: RngCore + CryptoRng>(
        rng: &mut BitRng<R>,
        a: Bit,
        b: Bit,
        n: usize,
    ) -> Result<Self, Error> {
        Ok(Self {
            a: share(rng, a, n)?,
            b: share(rng, b, n)?,
            c: share(rng, a & b, n)?,
        })
    }

    /// Deal a triple out of each party's own stream of bits, one stream per party.
    ///
    /// Every party draws its shares of `a` and `b`, and parties `1..n` draw
    /// their share of `c`. Party 0's share of `c` is then fixed so that
    /// `c = a & b`. That share is all the dealer needs to hand out.
    pub fn deal<R: RngCore + CryptoRng>(rngs: &mut [BitRng<R>]) -> Result<Self, Error> {
        check_party_count(rngs.len())?;
        let mut draws: Vec<TripleShare> = rngs
            .iter_mut()
            .enumerate()
            .map(|(party, rng)| TripleShare::draw(rng, party, Bit::zero()))
            .collect();
        let a = draws.iter().fold(Bit::zero(), |acc, s| acc ^ s.a);
        let b = draws.iter().fold(Bit::zero(), |acc, s| acc ^ s.b);
        let rest = draws[1..].iter().fold(Bit::zero(), |acc, s| acc ^ s.c);
        draws[0].c = (a & b) ^ rest;
        Ok(Self {
            a: draws.iter().map(|s| s.a).collect(),
            b: draws.iter().map(|s| s.b).collect(),
            c: draws.iter().map(|s| s.c).collect(),
        })
    }

    /// Check that the shares really multiply.
    pub fn is_correct(&self) -> bool {
        self.c.reconstruct() == self.a.reconstruct() & self.b.reconstruct()
    }

    pub fn parties(&self) -> usize {
        self.a.parties()
    }

    pub(crate) fn check_parties(&self, n: usize) -> Result<(), Error> {
        self.a.check_parties(n)?;
        self.b.check_parties(n)?;
        self.c.check_parties(n)
    }
}

/// One party's shares of a single triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripleShare {
    pub a: Bit,
    pub b: Bit,
    pub c: Bit,
}

impl TripleShare {
    /// Draw the shares `party` holds of its next triple.
    ///
    /// Party 0 draws no share of `c`, taking `correction` from the dealer instead.
    /// Replaying the same stream and corrections gives back the same shares.
    pub fn draw<R: RngCore + CryptoRng>(
        rng: &mut BitRng<R>,
        party: usize,
        correction: Bit,
    ) -> Self {
        let a = rng.next_bit();
        let b = rng.next_bit();
        let c = if party == 0 { correction } else { rng.next_bit() };
        Self { a, b, c }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rng::testing::ScriptedRng;
    use crate::rng::{BitPRNG, Seed};

    use proptest::prelude::*;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_share_with_known_bits() {
        // The drawn bits are b2 = 0, then b3 = 1.
        let mut rng = BitRng::new(ScriptedRng::new([0b10]));
        let shares = share(&mut rng, Bit::one(), 3).unwrap();
        assert_eq!(shares.as_slice(), [Bit::zero(), Bit::zero(), Bit::one()]);
        assert_eq!(reconstruct(&shares, 3), Ok(Bit::one()));
    }

    #[test]
    fn test_share_needs_two_parties() {
        let mut rng = BitRng::new(ChaCha20Rng::seed_from_u64(0));
        assert!(matches!(
            share(&mut rng, Bit::one(), 1),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_reconstruct_checks_share_count() {
        let shares = Shares::from_bits([Bit::one(), Bit::zero()]);
        assert_eq!(
            reconstruct(&shares, 3),
            Err(Error::ShareCountMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    proptest! {
        #[test]
        fn test_share_then_reconstruct(seed in any::<u64>(), secret in any::<bool>(), n in 2..16usize) {
            let mut rng = BitRng::new(ChaCha20Rng::seed_from_u64(seed));
            let secret = Bit::from(secret);
            let shares = share(&mut rng, secret, n).unwrap();
            assert_eq!(shares.parties(), n);
            assert_eq!(reconstruct(&shares, n), Ok(secret));
        }
    }

    proptest! {
        #[test]
        fn test_triples_multiply(seed in any::<u64>(), n in 2..16usize) {
            let mut rng = BitRng::new(ChaCha20Rng::seed_from_u64(seed));
            let triple = Triple::generate(&mut rng, n).unwrap();
            assert_eq!(triple.parties(), n);
            let a = triple.a.reconstruct();
            let b = triple.b.reconstruct();
            assert_eq!(triple.c.reconstruct(), a & b);
        }
    }

    proptest! {
        #[test]
        fn test_dealt_triples_multiply(seed in any::<u64>(), n in 2..12usize) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut rngs: Vec<BitPRNG> = (0..n)
                .map(|_| BitPRNG::seeded(&Seed::random(&mut rng)))
                .collect();
            for _ in 0..16 {
                let triple = Triple::deal(&mut rngs).unwrap();
                assert_eq!(triple.parties(), n);
                assert!(triple.is_correct());
            }
        }
    }

    #[test]
    fn test_dealt_triples_replay_from_seeds() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let seeds: Vec<Seed> = (0..4).map(|_| Seed::random(&mut rng)).collect();
        let mut rngs: Vec<BitPRNG> = seeds.iter().map(BitPRNG::seeded).collect();
        let triples: Vec<Triple> = (0..8).map(|_| Triple::deal(&mut rngs).unwrap()).collect();

        for (party, seed) in seeds.iter().enumerate() {
            let mut replay = BitPRNG::seeded(seed);
            for triple in &triples {
                let share = TripleShare::draw(&mut replay, party, triple.c.get(0));
                assert_eq!(share.a, triple.a.get(party));
                assert_eq!(share.b, triple.b.get(party));
                assert_eq!(share.c, triple.c.get(party));
            }
        }
    }

    #[test]
    fn test_flipped_correction_breaks_the_triple() {
        let mut rngs: Vec<BitPRNG> = (0..3u8)
            .map(|i| BitPRNG::seeded(&Seed::from_bytes([i; 32])))
            .collect();
        let mut triple = Triple::deal(&mut rngs).unwrap();
        let mut c: Vec<Bit> = triple.c.iter().collect();
        c[0] = !c[0];
        triple.c = Shares::from_bits(c);
        assert!(!triple.is_correct());
    }

    #[test]
    fn test_deal_needs_two_parties() {
        let mut rngs = vec![BitPRNG::seeded(&Seed::from_bytes([0; 32]))];
        assert!(matches!(
            Triple::deal(&mut rngs),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_triples_are_fresh() {
        let mut rng = BitRng::new(ChaCha20Rng::seed_from_u64(3));
        let triples: Vec<Triple> = (0..8).map(|_| Triple::generate(&mut rng, 4).unwrap()).collect();
        let distinct = triples
            .iter()
            .enumerate()
            .filter(|(i, t)| triples[..*i].iter().all(|other| other != *t))
            .count();
        assert!(distinct > 1);
    }
}
