use crate::bits::{Bit, BitVector};

/// The bits of security this crate attempts to guarantee.
pub const SECURITY_PARAMETER: usize = 128;
/// Because of the birthday bound, our hashes need twice that number of bits.
pub const HASH_SIZE: usize = 2 * SECURITY_PARAMETER;
/// The number of bytes making up our hash size.
pub const HASH_SIZE_BYTES: usize = (HASH_SIZE + 7) / 8;

/// The number of simulated parties when nothing else is configured.
pub const DEFAULT_PARTIES: usize = 3;

/// The most bytes a proof may take up, encoded or decoded.
pub const MAX_PROOF_BYTES: usize = 1 << 26;

/// Domain separation for view commitments.
pub const COMMITMENT_CONTEXT: &[u8] = b"boo-lowmc v0.1.0 view commitment";
/// Domain separation for expanding a party's seed into random bits.
pub const PRNG_CONTEXT: &[u8] = b"boo-lowmc v0.1.0 PRNG context";
/// Domain separation for turning challenge material into party indices.
pub const CHALLENGE_CONTEXT: &str = "boo-lowmc v0.1.0 challenge selection";

/// The reference 40 bit compression key, bit 0 first.
const DEFAULT_KEY_PATTERN: [u8; 40] = [
    1, 0, 0, 1, 0, 0, 1, 0, 0, 1, //
    0, 1, 1, 0, 1, 1, 0, 1, 1, 0, //
    0, 1, 1, 0, 1, 1, 0, 1, 1, 0, //
    1, 0, 0, 1, 0, 0, 1, 0, 0, 1, //
];

/// The default compression key, with the reference pattern repeated to fill `len` bits.
pub fn default_key(len: usize) -> BitVector {
    BitVector::from_bits(
        DEFAULT_KEY_PATTERN
            .iter()
            .cycle()
            .take(len)
            .map(|b| Bit::from(*b == 1)),
    )
}
