//! Non-Interactive Zero-Knowledge Proofs of Knowledge (NIZKPoKs) for boolean
//! circuits, in the MPC-in-the-head style, with LowMC as the transcript
//! compression function.
//!
//! **This library is experimental Cryptographic Software: use at your own peril.**
//!
//! Given a circuit `C` and some secret input `I`, you can prove that you know
//! an `I` such that `C(I)` is some output `O`. Anyone knowing `C` and `O` can
//! check the proof, without learning anything else about `I`.
//!
//! The prover splits its input between `n` simulated parties with xor secret
//! sharing, then runs the circuit among them: linear gates are local, and AND
//! or OR gates use Beaver triples and a round of broadcast. Each party draws
//! its triple shares from its own seed, except that party 0 is handed its
//! share of `c`. Everything each party sees goes into its view. Seeds and
//! views are committed to, the transcript is compressed with LowMC into a
//! challenge, and the challenge decides what happens to each simulation.
//! Some are audited: every seed is revealed, and the verifier checks that
//! the triples multiply. In the others, one party's view stays hidden and
//! the other views are revealed.
//!
//! # Example
//!
//! Let's prove that we know two bits `x0` and `x1` with `x0 & x1 == 1`.
//! Circuits are an ordered list of gates over a table of wires. The inputs
//! are the first wires, and the outputs the last ones:
//!
//! ```rust
//! use boo_lowmc::{prove, verify, BitVector, Circuit, Gate, ProverConfig};
//! use rand_core::OsRng;
//!
//! // 2 inputs, 1 output, 3 wires in total.
//! let circuit = Circuit::new(2, 1, 3, [Gate::and(0, 1, 2)]).validate()?;
//!
//! let ctx = b"example context";
//! let config = ProverConfig::default().with_repetitions(8);
//! let input = BitVector::from_u64(0b11, 2);
//! let proof = prove(&mut OsRng, ctx, &config, &circuit, &input)?;
//! assert_eq!(proof.output, BitVector::from_u64(1, 1));
//!
//! let output = BitVector::from_u64(1, 1);
//! assert_eq!(verify(ctx, &config, &circuit, &output, &proof), Ok(true));
//! # Ok::<(), boo_lowmc::Error>(())
//! ```
//!
//! The context binds the proof to an application, or to an arbitrary
//! message: the proof fails to verify under any other context. The
//! configuration must match on both sides too.
//!
//! Bits are numbered from the least significant end: bit `i` of
//! `BitVector::from_u64(x, len)` is bit `i` of `x`, and bytes are read from
//! the least significant bit of the first byte onwards.
//!
//! # Details
//!
//! A cheating prover has to corrupt the triples of every simulation it
//! cheats in without getting audited, and then hope that the party it cheated
//! with stays hidden. Real use needs many simulations, and
//! [`ProverConfig::for_security`] computes how many of each kind.
//!
//! The [`lowmc`] module can also be used on its own, as a plain block cipher.
//! Its public parameters come from a fixed LFSR, so every instance with the
//! same dimensions is identical.
pub mod bits;
pub mod circuit;
pub mod commitment;
pub mod config;
pub mod constants;
pub mod error;
pub mod gates;
pub mod lfsr;
pub mod lowmc;
pub mod matrix;
pub mod proof;
pub mod rng;
pub mod sharing;
pub mod transcript;
pub mod verifier;

pub use bits::{Bit, BitBuf, BitVector};
pub use circuit::{Circuit, Gate, Operation, ValidatedCircuit};
pub use config::ProverConfig;
pub use error::{CircuitError, Error};
pub use lowmc::{CipherParameters, LowMc};
pub use proof::{prove, Proof};
pub use verifier::verify;
