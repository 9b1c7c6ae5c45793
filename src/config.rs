use crate::bits::BitVector;
use crate::constants::{default_key, DEFAULT_PARTIES};
use crate::error::Error;
use crate::lowmc::CipherParameters;

/// Settings shared by the prover and the verifier.
///
/// Both sides must use the same configuration: it is bound into the
/// transcript, so a mismatch makes verification fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProverConfig {
    /// The number of simulated parties, at least 2.
    pub parties: usize,
    /// The number of simulations whose views are opened.
    pub repetitions: usize,
    /// The number of extra simulations whose triples are checked instead.
    ///
    /// Which simulations get audited is only known once the challenge is.
    pub audits: usize,
    /// The cipher used to compress the transcript.
    pub compression: CipherParameters,
    /// The compression key, or `None` for [`default_key`].
    pub compression_key: Option<BitVector>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            parties: DEFAULT_PARTIES,
            repetitions: 1,
            audits: 1,
            compression: CipherParameters::COMPRESSION_64,
            compression_key: None,
        }
    }
}

impl ProverConfig {
    /// A configuration reaching `bits` of soundness, with as few simulations as possible.
    ///
    /// A cheating prover can corrupt the triples of `k` simulations, hoping
    /// that none of them get audited, and cheat during the other
    /// `repetitions - k` opened ones, hoping each time that the party it
    /// cheated with stays hidden. Writing `r` for `repetitions` and `M` for
    /// `r + audits`, this works with probability
    /// `C(M - k, r - k) / C(M, r) * n^-(r - k)`, which must be at most
    /// `2^-bits` for every `k`.
    pub fn for_security(parties: usize, bits: usize) -> Result<Self, Error> {
        if parties < 2 {
            return Err(Error::InvalidParameters {
                reason: "at least 2 parties are needed",
            });
        }
        let target = -(bits as f64);
        let max_audits = 16 * bits.max(1);
        let mut best: Option<(usize, usize)> = None;
        for repetitions in 1..=bits.max(1) {
            if let Some((r, a)) = best {
                if repetitions >= r + a {
                    break;
                }
            }
            if cheating_bound(parties, repetitions, max_audits) > target {
                continue;
            }
            // The bound only shrinks as audits are added.
            let (mut lo, mut hi) = (1, max_audits);
            while lo < hi {
                let mid = (lo + hi) / 2;
                if cheating_bound(parties, repetitions, mid) <= target {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            if best.map_or(true, |(r, a)| repetitions + lo < r + a) {
                best = Some((repetitions, lo));
            }
        }
        let (repetitions, audits) = best.ok_or(Error::InvalidParameters {
            reason: "no configuration reaches this many bits of security",
        })?;
        Ok(Self {
            parties,
            repetitions,
            audits,
            ..Self::default()
        })
    }

    /// The log2 of the best chance a cheating prover has, following [`Self::for_security`].
    pub fn soundness_bits(&self) -> f64 {
        -cheating_bound(self.parties, self.repetitions, self.audits)
    }

    pub fn with_parties(mut self, parties: usize) -> Self {
        self.parties = parties;
        self
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn with_audits(mut self, audits: usize) -> Self {
        self.audits = audits;
        self
    }

    pub fn with_compression(mut self, compression: CipherParameters) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_compression_key(mut self, key: BitVector) -> Self {
        self.compression_key = Some(key);
        self
    }

    /// The key the compression cipher is keyed with.
    pub fn compression_key(&self) -> BitVector {
        self.compression_key
            .clone()
            .unwrap_or_else(|| default_key(self.compression.key_size))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.parties < 2 {
            return Err(Error::InvalidParameters {
                reason: "at least 2 parties are needed",
            });
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidParameters {
                reason: "at least 1 repetition is needed",
            });
        }
        if self.audits == 0 {
            return Err(Error::InvalidParameters {
                reason: "at least 1 audit is needed",
            });
        }
        self.compression.validate()?;
        if let Some(key) = &self.compression_key {
            if key.len() != self.compression.key_size {
                return Err(Error::DimensionMismatch {
                    expected: self.compression.key_size,
                    actual: key.len(),
                });
            }
        }
        Ok(())
    }
}

/// The log2 of the best chance of cheating, with `repetitions` opened and
/// `audits` audited simulations.
fn cheating_bound(parties: usize, repetitions: usize, audits: usize) -> f64 {
    let per_party = (parties as f64).log2();
    let instances = repetitions + audits;
    let mut best = -(repetitions as f64) * per_party;
    // log2 of C(M - k, r - k) / C(M, r), built up one k at a time.
    let mut avoided = 0.0;
    for k in 1..=repetitions {
        avoided += ((repetitions - k + 1) as f64 / (instances - k + 1) as f64).log2();
        best = best.max(avoided - (repetitions - k) as f64 * per_party);
    }
    best
}
