use bincode::{Decode, Encode};
use std::str::FromStr;

use crate::bits::{Bit, BitVector};
use crate::constants::HASH_SIZE_BYTES;
use crate::error::{CircuitError, Error};

/// Represents the operation performed by a single gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Operation {
    And,
    Or,
    Xor,
    Not,
    /// Copy the input wire to the output wire.
    Identity,
}

impl Operation {
    /// The number of input wires this operation reads.
    pub fn arity(self) -> usize {
        match self {
            Operation::And | Operation::Or | Operation::Xor => 2,
            Operation::Not | Operation::Identity => 1,
        }
    }

    /// Whether emulating this operation needs a multiplication triple.
    pub fn is_nonlinear(self) -> bool {
        matches!(self, Operation::And | Operation::Or)
    }

    /// Compute the operation in the clear. Unary operations ignore `y`.
    pub fn apply(self, x: Bit, y: Bit) -> Bit {
        match self {
            Operation::And => x & y,
            Operation::Or => x ^ y ^ (x & y),
            Operation::Xor => x ^ y,
            Operation::Not => !x,
            Operation::Identity => x,
        }
    }
}

/// Parses the gate mnemonics used by Bristol style circuit files.
impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Operation::And),
            "OR" => Ok(Operation::Or),
            "XOR" => Ok(Operation::Xor),
            "INV" | "NOT" => Ok(Operation::Not),
            "EQW" | "ID" => Ok(Operation::Identity),
            other => Err(Error::UnsupportedGateOperation(other.to_owned())),
        }
    }
}

/// A single gate, reading one or two wires and writing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Gate {
    operation: Operation,
    /// Only the first `operation.arity()` entries are meaningful.
    inputs: [usize; 2],
    output: usize,
}

impl Gate {
    /// Create a gate, checking that it has as many inputs as its operation needs.
    pub fn new(operation: Operation, inputs: &[usize], output: usize) -> Result<Self, CircuitError> {
        if inputs.len() != operation.arity() {
            return Err(CircuitError::Arity {
                operation,
                expected: operation.arity(),
                actual: inputs.len(),
            });
        }
        let mut padded = [0; 2];
        padded[..inputs.len()].copy_from_slice(inputs);
        Ok(Self {
            operation,
            inputs: padded,
            output,
        })
    }

    pub fn and(x: usize, y: usize, output: usize) -> Self {
        Self::binary(Operation::And, x, y, output)
    }

    pub fn or(x: usize, y: usize, output: usize) -> Self {
        Self::binary(Operation::Or, x, y, output)
    }

    pub fn xor(x: usize, y: usize, output: usize) -> Self {
        Self::binary(Operation::Xor, x, y, output)
    }

    pub fn not(x: usize, output: usize) -> Self {
        Self::unary(Operation::Not, x, output)
    }

    pub fn identity(x: usize, output: usize) -> Self {
        Self::unary(Operation::Identity, x, output)
    }

    fn binary(operation: Operation, x: usize, y: usize, output: usize) -> Self {
        Self {
            operation,
            inputs: [x, y],
            output,
        }
    }

    fn unary(operation: Operation, x: usize, output: usize) -> Self {
        Self {
            operation,
            inputs: [x, 0],
            output,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn inputs(&self) -> &[usize] {
        &self.inputs[..self.operation.arity()]
    }

    pub fn output(&self) -> usize {
        self.output
    }
}

/// Represents a boolean circuit, as an ordered list of gates over a table of wires.
///
/// Wires `0..wire_in_count` hold the input, and the last `wire_out_count`
/// wires hold the output. Gates run in order, and may only read wires that
/// an input or an earlier gate has written.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Circuit {
    gates: Vec<Gate>,
    wire_in_count: usize,
    wire_out_count: usize,
    wire_count: usize,
}

impl Circuit {
    pub fn new(
        wire_in_count: usize,
        wire_out_count: usize,
        wire_count: usize,
        gates: impl Into<Vec<Gate>>,
    ) -> Self {
        Self {
            gates: gates.into(),
            wire_in_count,
            wire_out_count,
            wire_count,
        }
    }

    /// Check that the circuit is well formed.
    ///
    /// This checks wire counts and that every wire index is in bounds. The
    /// order of gates is trusted; reading a wire before it has been written
    /// is caught when the circuit runs.
    pub fn validate(self) -> Result<ValidatedCircuit, CircuitError> {
        if self
            .wire_in_count
            .checked_add(self.wire_out_count)
            .map_or(true, |used| used > self.wire_count)
        {
            return Err(CircuitError::WireCounts {
                wire_in_count: self.wire_in_count,
                wire_out_count: self.wire_out_count,
                wire_count: self.wire_count,
            });
        }
        for (i, gate) in self.gates.iter().enumerate() {
            let mut wires = gate.inputs().iter().chain(std::iter::once(&gate.output));
            if let Some(&wire) = wires.find(|&&w| w >= self.wire_count) {
                return Err(CircuitError::WireOutOfBounds {
                    gate: i,
                    wire,
                    wire_count: self.wire_count,
                });
            }
        }
        let nonlinear_gates = self
            .gates
            .iter()
            .filter(|g| g.operation.is_nonlinear())
            .count();
        Ok(ValidatedCircuit {
            circuit: self,
            nonlinear_gates,
        })
    }
}

/// A circuit which has passed [`Circuit::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedCircuit {
    circuit: Circuit,
    nonlinear_gates: usize,
}

impl ValidatedCircuit {
    pub fn gates(&self) -> &[Gate] {
        &self.circuit.gates
    }

    pub fn wire_in_count(&self) -> usize {
        self.circuit.wire_in_count
    }

    pub fn wire_out_count(&self) -> usize {
        self.circuit.wire_out_count
    }

    pub fn wire_count(&self) -> usize {
        self.circuit.wire_count
    }

    /// The indices of the output wires, in output order.
    pub fn output_wires(&self) -> std::ops::Range<usize> {
        self.wire_count() - self.wire_out_count()..self.wire_count()
    }

    /// The number of AND and OR gates, each of which consumes a triple.
    pub fn nonlinear_gate_count(&self) -> usize {
        self.nonlinear_gates
    }

    /// A BLAKE3 digest of the circuit's encoding.
    pub fn digest(&self) -> Result<[u8; HASH_SIZE_BYTES], Error> {
        let encoded = bincode::encode_to_vec(&self.circuit, bincode::config::standard())?;
        let mut out = [0u8; HASH_SIZE_BYTES];
        blake3::Hasher::new()
            .update(&encoded)
            .finalize_xof()
            .fill(&mut out);
        Ok(out)
    }

    /// Run the circuit in the clear.
    pub fn evaluate(&self, input: &BitVector) -> Result<BitVector, Error> {
        if input.len() != self.wire_in_count() {
            return Err(Error::InputLength {
                expected: self.wire_in_count(),
                actual: input.len(),
            });
        }
        let mut wires: Vec<Option<Bit>> = vec![None; self.wire_count()];
        for (slot, bit) in wires.iter_mut().zip(input.iter()) {
            *slot = Some(bit);
        }
        let read = |wires: &[Option<Bit>], wire: usize| {
            wires[wire].ok_or(CircuitError::UnassignedWire { wire })
        };
        for gate in self.gates() {
            let x = read(&wires, gate.inputs()[0])?;
            let y = match gate.inputs().get(1) {
                Some(&w) => read(&wires, w)?,
                None => Bit::zero(),
            };
            wires[gate.output()] = Some(gate.operation().apply(x, y));
        }
        let output = self
            .output_wires()
            .map(|w| read(&wires, w))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BitVector::from_bits(output))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use proptest::prelude::*;

    /// out = (x0 & x1) | !x2, spread across every operation.
    fn mixed_circuit() -> ValidatedCircuit {
        Circuit::new(
            3,
            1,
            8,
            [
                Gate::and(0, 1, 3),
                Gate::not(2, 4),
                Gate::identity(4, 5),
                Gate::or(3, 5, 6),
                Gate::xor(6, 6, 7),
                Gate::xor(7, 6, 7),
            ],
        )
        .validate()
        .unwrap()
    }

    #[test]
    fn test_parse_operations() {
        assert_eq!("AND".parse::<Operation>(), Ok(Operation::And));
        assert_eq!("INV".parse::<Operation>(), Ok(Operation::Not));
        assert_eq!("EQW".parse::<Operation>(), Ok(Operation::Identity));
        assert_eq!(
            "NAND".parse::<Operation>(),
            Err(Error::UnsupportedGateOperation("NAND".into()))
        );
    }

    #[test]
    fn test_gate_arity_is_checked() {
        assert!(Gate::new(Operation::Not, &[1], 2).is_ok());
        assert_eq!(
            Gate::new(Operation::And, &[1], 2),
            Err(CircuitError::Arity {
                operation: Operation::And,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_validate_checks_bounds() {
        let err = Circuit::new(2, 1, 3, [Gate::and(0, 3, 2)]).validate();
        assert_eq!(
            err,
            Err(CircuitError::WireOutOfBounds {
                gate: 0,
                wire: 3,
                wire_count: 3
            })
        );
        let err = Circuit::new(2, 2, 3, [Gate::and(0, 1, 2)]).validate();
        assert!(matches!(err, Err(CircuitError::WireCounts { .. })));
    }

    #[test]
    fn test_counts_nonlinear_gates() {
        assert_eq!(mixed_circuit().nonlinear_gate_count(), 2);
    }

    #[test]
    fn test_unassigned_wire_is_an_error() {
        let circuit = Circuit::new(1, 1, 3, [Gate::not(1, 2)]).validate().unwrap();
        assert_eq!(
            circuit.evaluate(&BitVector::zeros(1)),
            Err(Error::Circuit(CircuitError::UnassignedWire { wire: 1 }))
        );
    }

    #[test]
    fn test_digest_depends_on_gates() {
        let a = Circuit::new(2, 1, 3, [Gate::and(0, 1, 2)]).validate().unwrap();
        let b = Circuit::new(2, 1, 3, [Gate::or(0, 1, 2)]).validate().unwrap();
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap(), a.clone().digest().unwrap());
    }

    proptest! {
        #[test]
        fn test_evaluate_mixed_circuit(x in 0..8u64) {
            let out = mixed_circuit().evaluate(&BitVector::from_u64(x, 3)).unwrap();
            let expected = (x & 1 == 1 && x & 2 == 2) || x & 4 == 0;
            assert_eq!(out, BitVector::from_bits([Bit::from(expected)]));
        }
    }
}
