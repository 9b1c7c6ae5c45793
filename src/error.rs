use thiserror::Error;

use crate::circuit::Operation;

/// Structural problems with a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitError {
    /// A gate names a wire at or past the end of the wire table.
    #[error("gate {gate} uses wire {wire}, but the circuit only has {wire_count} wires")]
    WireOutOfBounds {
        gate: usize,
        wire: usize,
        wire_count: usize,
    },
    /// There aren't enough wires to hold all of the inputs and outputs.
    #[error("{wire_in_count} inputs and {wire_out_count} outputs don't fit in {wire_count} wires")]
    WireCounts {
        wire_in_count: usize,
        wire_out_count: usize,
        wire_count: usize,
    },
    /// A gate was given the wrong number of input wires for its operation.
    #[error("{operation:?} gates expect {expected} inputs, got {actual}")]
    Arity {
        operation: Operation,
        expected: usize,
        actual: usize,
    },
    /// A wire was read before any gate or input assigned it.
    #[error("wire {wire} is read before it is assigned")]
    UnassignedWire { wire: usize },
}

/// Represents an error that can occur while building parameters or proofs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: &'static str },
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Inversion of a matrix that is not square or not full rank.
    #[error("matrix is singular")]
    SingularMatrix,
    #[error("unsupported gate operation {0:?}")]
    UnsupportedGateOperation(String),
    /// A sharing operation got a different number of shares than there are parties.
    #[error("expected {expected} shares, got {actual}")]
    ShareCountMismatch { expected: usize, actual: usize },
    /// A non-linear gate was emulated without a multiplication triple.
    #[error("non-linear gate emulated without a triple")]
    MissingTriple,
    #[error("cipher instance has no inverse matrices")]
    DecryptionUnavailable,
    /// The secret input doesn't match the input wires of the circuit.
    #[error("expected {expected} input bits, got {actual}")]
    InputLength { expected: usize, actual: usize },
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        Error::Encoding(format!("{e:?}"))
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(e: bincode::error::DecodeError) -> Self {
        Error::Encoding(format!("{e:?}"))
    }
}
