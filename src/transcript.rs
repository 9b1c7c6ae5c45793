//! Fiat-Shamir over a LowMC compression function.
//!
//! Bits are queued as they are absorbed. Each time a full cipher block is
//! available it is folded into the accumulator as
//! `acc = acc ^ E_k(block ^ acc)`, so the result depends on the order of
//! every block, not only on which blocks were seen.
use tracing::trace;

use crate::bits::{BitBuf, BitVector};
use crate::config::ProverConfig;
use crate::constants::CHALLENGE_CONTEXT;
use crate::error::Error;
use crate::lowmc::LowMc;

/// A running compression of everything the prover has committed to.
#[derive(Debug, Clone)]
pub struct Transcript {
    cipher: LowMc,
    pending: BitBuf,
    accumulator: BitVector,
    /// The number of bits absorbed so far, excluding padding.
    absorbed: u64,
}

impl Transcript {
    /// Start a transcript compressing with `cipher` under `key`.
    pub fn new(mut cipher: LowMc, key: &BitVector) -> Result<Self, Error> {
        cipher.set_key(key)?;
        let accumulator = BitVector::zeros(cipher.params().block_size);
        Ok(Self {
            cipher,
            pending: BitBuf::new(),
            accumulator,
            absorbed: 0,
        })
    }

    /// Start a transcript with the compression settings of `config`.
    pub fn for_config(config: &ProverConfig) -> Result<Self, Error> {
        config.validate()?;
        Self::new(
            LowMc::encrypt_only(config.compression)?,
            &config.compression_key(),
        )
    }

    pub fn block_size(&self) -> usize {
        self.cipher.params().block_size
    }

    pub fn absorb(&mut self, bits: &BitBuf) -> Result<(), Error> {
        self.pending.extend(bits.iter());
        self.absorbed += bits.len() as u64;
        self.drain()
    }

    pub fn absorb_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.absorb(&BitBuf::from_bytes(bytes))
    }

    pub fn absorb_u64(&mut self, value: u64) -> Result<(), Error> {
        let mut bits = BitBuf::new();
        bits.push_u64(value, 64);
        self.absorb(&bits)
    }

    /// Compress every full block waiting in the queue.
    fn drain(&mut self) -> Result<(), Error> {
        let block_size = self.block_size();
        while let Some(block) = self.pending.take_front(block_size) {
            let input = &block ^ &self.accumulator;
            let output = self.cipher.encrypt(&input)?;
            self.accumulator ^= &output;
        }
        Ok(())
    }

    fn pad_to_block(&mut self) {
        let block_size = self.block_size();
        while self.pending.len() % block_size != 0 {
            self.pending.push_u64(0, 1);
        }
    }

    /// Bind the length of the transcript and produce the challenge.
    ///
    /// The queue is padded with a one bit and then zeros up to a block
    /// boundary, followed by the absorbed bit count in its own padded block.
    pub fn finalize(mut self) -> Result<Challenge, Error> {
        let absorbed = self.absorbed;
        self.pending.push_u64(1, 1);
        self.pad_to_block();
        self.pending.push_u64(absorbed, 64);
        self.pad_to_block();
        self.drain()?;
        trace!(absorbed, "finalized transcript");
        Ok(Challenge {
            material: self.accumulator,
        })
    }
}

/// What the challenge asks of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Open the starting state of every party, so the triples can be checked.
    Audit,
    /// Open every view except the one of this party.
    Hide(usize),
}

/// Uniform integers read from a BLAKE3 stream.
struct Selector {
    reader: blake3::OutputReader,
}

impl Selector {
    /// A value in `0..n`.
    ///
    /// Values are read as little endian u64s, and those in the final partial
    /// range are rejected so that every result is equally likely.
    fn below(&mut self, n: usize) -> usize {
        let n = n as u64;
        let limit = (u64::MAX / n) * n;
        loop {
            let mut bytes = [0u8; 8];
            self.reader.fill(&mut bytes);
            let v = u64::from_le_bytes(bytes);
            if v < limit {
                return (v % n) as usize;
            }
        }
    }
}

/// The output of a finalized transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    material: BitVector,
}

impl Challenge {
    pub fn from_material(material: BitVector) -> Self {
        Self { material }
    }

    pub fn material(&self) -> &BitVector {
        &self.material
    }

    fn selector(&self) -> Selector {
        let reader = blake3::Hasher::new_derive_key(CHALLENGE_CONTEXT)
            .update(&self.material.to_bytes())
            .finalize_xof();
        Selector { reader }
    }

    /// Decide what happens to each of `repetitions + audits` simulations.
    ///
    /// First a uniformly random set of `audits` simulations is picked.
    /// Then every other simulation, in order, gets a uniformly random hidden party.
    pub fn outcomes(
        &self,
        parties: usize,
        repetitions: usize,
        audits: usize,
    ) -> Result<Vec<Outcome>, Error> {
        if parties < 2 {
            return Err(Error::InvalidParameters {
                reason: "at least 2 parties are needed",
            });
        }
        let instances = repetitions + audits;
        let mut selector = self.selector();
        let mut outcomes = vec![None; instances];
        let mut picked = 0;
        while picked < audits {
            let i = selector.below(instances);
            if outcomes[i].is_none() {
                outcomes[i] = Some(Outcome::Audit);
                picked += 1;
            }
        }
        Ok(outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| Outcome::Hide(selector.below(parties))))
            .collect())
    }
}
