//! Emulation of each gate of a circuit over xor-shared wires.
//!
//! Linear gates are computed locally by every party. AND gates consume a
//! Beaver triple and one round of broadcast, which is where the parties'
//! views grow. OR gates are built from an AND and two xors.
use crate::bits::{Bit, BitBuf};
use crate::circuit::Operation;
use crate::error::{CircuitError, Error};
use crate::sharing::{Shares, Triple};

/// The values every party broadcasts while emulating an AND gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    /// `d_i = x_i ^ a_i`
    pub d: Shares,
    /// `e_i = y_i ^ b_i`
    pub e: Shares,
}

impl Opening {
    /// All of the broadcast bits, `d` first and then `e`.
    pub fn bits(&self) -> BitBuf {
        self.d.iter().chain(self.e.iter()).collect()
    }
}

/// What one non-linear gate adds to the parties' views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewGrowth {
    pub x: Shares,
    pub y: Shares,
    pub triple: Triple,
    pub opening: Opening,
}

impl ViewGrowth {
    /// The number of bits each party records per non-linear gate.
    pub fn record_len(parties: usize) -> usize {
        5 + 2 * parties
    }

    /// What `party` observes: `a_i, b_i, c_i, x_i, y_i`, then every `d_j`, then every `e_j`.
    pub fn party_record(&self, party: usize) -> BitBuf {
        let mut out: BitBuf = [
            self.triple.a.get(party),
            self.triple.b.get(party),
            self.triple.c.get(party),
            self.x.get(party),
            self.y.get(party),
        ]
        .into_iter()
        .collect();
        out.extend(self.opening.d.iter());
        out.extend(self.opening.e.iter());
        out
    }
}

/// The result of emulating one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub output: Shares,
    /// Present only for gates that involve communication.
    pub growth: Option<ViewGrowth>,
}

/// Compute one party's share of `x & y`, once `d` and `e` are public.
///
/// The `d & e` term must be added exactly once across all parties, so only
/// party 0 adds it.
pub(crate) fn and_share(party: usize, x: Bit, y: Bit, c: Bit, d: Bit, e: Bit) -> Bit {
    let mut z = c ^ (x & e) ^ (y & d);
    if party == 0 {
        z ^= d & e;
    }
    z
}

/// Compute one party's share of `!x`. Only party 0 flips its share.
pub(crate) fn not_share(party: usize, x: Bit) -> Bit {
    if party == 0 {
        !x
    } else {
        x
    }
}

/// Emulates gates for a fixed number of parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateEmulator {
    parties: usize,
}

impl GateEmulator {
    pub fn new(parties: usize) -> Result<Self, Error> {
        if parties < 2 {
            return Err(Error::InvalidParameters {
                reason: "at least 2 parties are needed",
            });
        }
        Ok(Self { parties })
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    pub fn xor(&self, xs: &Shares, ys: &Shares) -> Result<Shares, Error> {
        xs.check_parties(self.parties)?;
        ys.check_parties(self.parties)?;
        Ok(xs.iter().zip(ys.iter()).map(|(x, y)| x ^ y).collect())
    }

    pub fn not(&self, xs: &Shares) -> Result<Shares, Error> {
        xs.check_parties(self.parties)?;
        Ok(xs
            .iter()
            .enumerate()
            .map(|(i, x)| not_share(i, x))
            .collect())
    }

    pub fn identity(&self, xs: &Shares) -> Result<Shares, Error> {
        xs.check_parties(self.parties)?;
        Ok(xs.clone())
    }

    /// Emulate an AND gate, consuming `triple`.
    pub fn and(&self, xs: &Shares, ys: &Shares, triple: Triple) -> Result<Step, Error> {
        xs.check_parties(self.parties)?;
        ys.check_parties(self.parties)?;
        triple.check_parties(self.parties)?;

        let d: Shares = xs.iter().zip(triple.a.iter()).map(|(x, a)| x ^ a).collect();
        let e: Shares = ys.iter().zip(triple.b.iter()).map(|(y, b)| y ^ b).collect();
        // Every party sees every broadcast, so each can open d and e itself.
        let (d_open, e_open) = (d.reconstruct(), e.reconstruct());

        let output = (0..self.parties)
            .map(|i| and_share(i, xs.get(i), ys.get(i), triple.c.get(i), d_open, e_open))
            .collect();
        Ok(Step {
            output,
            growth: Some(ViewGrowth {
                x: xs.clone(),
                y: ys.clone(),
                triple,
                opening: Opening { d, e },
            }),
        })
    }

    /// Emulate an OR gate as `x ^ y ^ (x & y)`, consuming `triple`.
    pub fn or(&self, xs: &Shares, ys: &Shares, triple: Triple) -> Result<Step, Error> {
        let step = self.and(xs, ys, triple)?;
        let output = self.xor(xs, &self.xor(ys, &step.output)?)?;
        Ok(Step { output, ..step })
    }

    /// Emulate any operation.
    ///
    /// `inputs` must match the operation's arity, and non-linear operations
    /// need a fresh triple.
    pub fn emulate(
        &self,
        operation: Operation,
        inputs: &[&Shares],
        triple: Option<Triple>,
    ) -> Result<Step, Error> {
        if inputs.len() != operation.arity() {
            return Err(CircuitError::Arity {
                operation,
                expected: operation.arity(),
                actual: inputs.len(),
            }
            .into());
        }
        let linear = |output| Step {
            output,
            growth: None,
        };
        match operation {
            Operation::And => self.and(inputs[0], inputs[1], triple.ok_or(Error::MissingTriple)?),
            Operation::Or => self.or(inputs[0], inputs[1], triple.ok_or(Error::MissingTriple)?),
            Operation::Xor => self.xor(inputs[0], inputs[1]).map(linear),
            Operation::Not => self.not(inputs[0]).map(linear),
            Operation::Identity => self.identity(inputs[0]).map(linear),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rng::BitRng;
    use crate::sharing::share;

    use proptest::prelude::*;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn bits(bits: &[u8]) -> Shares {
        bits.iter().map(|b| Bit::from(*b == 1)).collect()
    }

    #[test]
    fn test_and_trace_for_two_parties() {
        let emulator = GateEmulator::new(2).unwrap();
        let triple = Triple {
            a: bits(&[0, 0]),
            b: bits(&[0, 0]),
            c: bits(&[0, 0]),
        };
        let step = emulator.and(&bits(&[1, 0]), &bits(&[1, 0]), triple).unwrap();
        let growth = step.growth.unwrap();
        assert_eq!(growth.opening.d, bits(&[1, 0]));
        assert_eq!(growth.opening.e, bits(&[1, 0]));
        assert_eq!(step.output, bits(&[1, 0]));
        assert_eq!(step.output.reconstruct(), Bit::one());
    }

    #[test]
    fn test_party_record_layout() {
        let emulator = GateEmulator::new(3).unwrap();
        let triple = Triple {
            a: bits(&[1, 0, 0]),
            b: bits(&[0, 1, 0]),
            c: bits(&[0, 0, 0]),
        };
        let growth = emulator
            .and(&bits(&[0, 0, 1]), &bits(&[1, 1, 1]), triple)
            .unwrap()
            .growth
            .unwrap();
        let record = growth.party_record(1);
        assert_eq!(record.len(), ViewGrowth::record_len(3));
        let expected: Vec<u8> = vec![0, 1, 0, 0, 1, /* d */ 1, 0, 1, /* e */ 1, 0, 1];
        let actual: Vec<u8> = record.iter().map(|b| u64::from(b) as u8).collect();
        assert_eq!(actual, expected);
        assert_eq!(growth.opening.bits().len(), 6);
    }

    #[test]
    fn test_not_with_even_parties() {
        let emulator = GateEmulator::new(4).unwrap();
        let out = emulator.not(&bits(&[1, 0, 1, 1])).unwrap();
        assert_eq!(out, bits(&[0, 0, 1, 1]));
        assert_eq!(out.reconstruct(), Bit::zero());
    }

    #[test]
    fn test_emulate_checks_inputs() {
        let emulator = GateEmulator::new(2).unwrap();
        let x = bits(&[1, 0]);
        assert_eq!(
            emulator.emulate(Operation::And, &[&x, &x], None),
            Err(Error::MissingTriple)
        );
        assert!(matches!(
            emulator.emulate(Operation::Xor, &[&x], None),
            Err(Error::Circuit(CircuitError::Arity { .. }))
        ));
        assert_eq!(
            emulator.xor(&x, &bits(&[1, 0, 0])),
            Err(Error::ShareCountMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    proptest! {
        #[test]
        fn test_emulation_matches_gate(
            seed in any::<u64>(),
            n in 2..9usize,
            x in any::<bool>(),
            y in any::<bool>(),
            op in prop_oneof![
                Just(Operation::And),
                Just(Operation::Or),
                Just(Operation::Xor),
                Just(Operation::Not),
                Just(Operation::Identity),
            ],
        ) {
            let mut rng = BitRng::new(ChaCha20Rng::seed_from_u64(seed));
            let emulator = GateEmulator::new(n).unwrap();
            let (x, y) = (Bit::from(x), Bit::from(y));
            let xs = share(&mut rng, x, n).unwrap();
            let ys = share(&mut rng, y, n).unwrap();
            let inputs = [&xs, &ys];
            let triple = if op.is_nonlinear() {
                Some(Triple::generate(&mut rng, n).unwrap())
            } else {
                None
            };
            let step = emulator.emulate(op, &inputs[..op.arity()], triple).unwrap();
            assert_eq!(step.output.reconstruct(), op.apply(x, y));
            assert_eq!(step.growth.is_some(), op.is_nonlinear());
            if let Some(growth) = step.growth {
                for i in 0..n {
                    assert_eq!(growth.party_record(i).len(), ViewGrowth::record_len(n));
                }
            }
        }
    }
}
