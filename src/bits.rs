use bincode::{Decode, Encode};
use std::{fmt, ops};

const WORD_BITS: usize = 64;

fn word_count(bit_len: usize) -> usize {
    (bit_len + WORD_BITS - 1) / WORD_BITS
}

/// Represents a single bit, an element of GF(2).
///
/// This is a convenience wrapper over a u64, but satisfying the invariant that
/// only the LSB can be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bit(u64);

impl Bit {
    /// Return the zero bit.
    pub fn zero() -> Self {
        Bit(0)
    }

    /// Return the one bit.
    pub fn one() -> Self {
        Bit(1)
    }

    /// Select a given bit from some u64.
    pub fn select(x: u64, bit: usize) -> Self {
        debug_assert!(bit < 64);
        Self((x >> bit) & 1)
    }

    /// Select a given bit from some u8
    pub fn select_u8(x: u8, bit: usize) -> Self {
        debug_assert!(bit < 8);
        Self::select(x as u64, bit)
    }

    pub fn is_set(self) -> bool {
        self.0 == 1
    }
}

impl From<bool> for Bit {
    fn from(b: bool) -> Self {
        Bit(b as u64)
    }
}

impl From<Bit> for bool {
    fn from(b: Bit) -> Self {
        b.is_set()
    }
}

impl From<Bit> for u64 {
    fn from(b: Bit) -> Self {
        b.0
    }
}

impl ops::BitXor for Bit {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        let mut out = self;
        out ^= rhs;
        out
    }
}

impl ops::BitXorAssign for Bit {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl ops::BitAnd for Bit {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        let mut out = self;
        out &= rhs;
        out
    }
}

impl ops::BitAndAssign for Bit {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl ops::Not for Bit {
    type Output = Self;

    fn not(self) -> Self::Output {
        // We don't want to negate anything but the first bit
        Self(1 ^ self.0)
    }
}

/// A vector of bits with a length fixed at construction.
///
/// Bit `0` is the least significant bit. This convention is shared by every
/// encoding in the crate: cipher blocks, keys, circuit inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Encode, Decode)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    /// The vector of `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            words: vec![0; word_count(len)],
            len,
        }
    }

    /// The vector of `len` one bits.
    pub fn ones(len: usize) -> Self {
        let mut out = Self {
            words: vec![u64::MAX; word_count(len)],
            len,
        };
        out.clear_tail();
        out
    }

    pub fn from_bits(bits: impl IntoIterator<Item = Bit>) -> Self {
        bits.into_iter().collect::<BitBuf>().into()
    }

    /// Create a vector of `len` bits holding the low bits of `value`.
    ///
    /// Bits past the 64th are zero.
    pub fn from_u64(value: u64, len: usize) -> Self {
        let mut out = Self::zeros(len);
        if let Some(first) = out.words.first_mut() {
            *first = value;
        }
        out.clear_tail();
        out
    }

    /// Create a vector of `len` bits from bytes.
    ///
    /// The bits start at the lsb of bytes[0]. Missing bytes read as zero.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Self {
        let mut out = Self::zeros(len);
        for (i, chunk) in bytes.chunks(8).enumerate().take(out.words.len()) {
            let mut le_bytes = [0u8; 8];
            le_bytes[..chunk.len()].copy_from_slice(chunk);
            out.words[i] = u64::from_le_bytes(le_bytes);
        }
        out.clear_tail();
        out
    }

    /// The bits of this vector packed into bytes, lsb of bytes[0] first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        out.truncate((self.len + 7) / 8);
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the bit at `index`.
    ///
    /// Panics if the index is out of bounds.
    pub fn get(&self, index: usize) -> Bit {
        assert!(index < self.len, "bit {index} out of bounds for length {}", self.len);
        Bit::select(self.words[index / WORD_BITS], index % WORD_BITS)
    }

    /// Overwrite the bit at `index`.
    ///
    /// Panics if the index is out of bounds.
    pub fn set(&mut self, index: usize, bit: Bit) {
        assert!(index < self.len, "bit {index} out of bounds for length {}", self.len);
        let word = &mut self.words[index / WORD_BITS];
        let mask = 1u64 << (index % WORD_BITS);
        *word = (*word & !mask) | (bit.0 << (index % WORD_BITS));
    }

    pub fn iter(&self) -> impl Iterator<Item = Bit> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The xor of every bit in the vector.
    pub fn parity(&self) -> Bit {
        Bit((self.count_ones() & 1) as u64)
    }

    /// The inner product over GF(2): the parity of `self & other`.
    pub fn dot(&self, other: &BitVector) -> Bit {
        assert_eq!(self.len, other.len, "inner product of vectors of different lengths");
        let ones: u32 = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum();
        Bit((ones & 1) as u64)
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Check the internal invariants, for values that came from a decoder.
    pub(crate) fn is_well_formed(&self) -> bool {
        let tail = self.len % WORD_BITS;
        self.words.len() == word_count(self.len)
            && (tail == 0 || self.words.last().map_or(true, |w| w >> tail == 0))
    }

    fn clear_tail(&mut self) {
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1 << tail) - 1;
            }
        }
    }
}

impl ops::BitXorAssign<&BitVector> for BitVector {
    fn bitxor_assign(&mut self, rhs: &BitVector) {
        assert_eq!(self.len, rhs.len, "xor of vectors of different lengths");
        for (a, b) in self.words.iter_mut().zip(rhs.words.iter()) {
            *a ^= b;
        }
    }
}

impl ops::BitXor<&BitVector> for &BitVector {
    type Output = BitVector;

    fn bitxor(self, rhs: &BitVector) -> Self::Output {
        let mut out = self.clone();
        out ^= rhs;
        out
    }
}

impl ops::BitAndAssign<&BitVector> for BitVector {
    fn bitand_assign(&mut self, rhs: &BitVector) {
        assert_eq!(self.len, rhs.len, "and of vectors of different lengths");
        for (a, b) in self.words.iter_mut().zip(rhs.words.iter()) {
            *a &= b;
        }
    }
}

impl ops::BitAnd<&BitVector> for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: &BitVector) -> Self::Output {
        let mut out = self.clone();
        out &= rhs;
        out
    }
}

/// Prints the most significant bit first, like a binary literal.
impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.len).rev() {
            f.write_str(if self.get(i).is_set() { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl From<BitBuf> for BitVector {
    fn from(buf: BitBuf) -> Self {
        Self {
            words: buf.words,
            len: buf.len,
        }
    }
}

/// Represents a growable buffer containing bits.
///
/// This is used to hold views, output shares, and the pending transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct BitBuf {
    /// Always exactly `word_count(len)` words, with the unused high bits clear.
    words: Vec<u64>,
    len: usize,
}

impl BitBuf {
    /// Create a new, empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bit buffer from bytes.
    ///
    /// The bits are considered to start at the lsb of bytes[0], and end at
    /// the msb of bytes[-1].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        BitVector::from_bytes(bytes, 8 * bytes.len()).into()
    }

    pub fn push(&mut self, bit: Bit) {
        if self.len % WORD_BITS == 0 {
            self.words.push(0);
        }
        self.words[self.len / WORD_BITS] |= bit.0 << (self.len % WORD_BITS);
        self.len += 1;
    }

    /// Push the `count` low bits of `value`, least significant first.
    pub fn push_u64(&mut self, value: u64, count: usize) {
        debug_assert!(count <= 64);
        for i in 0..count {
            self.push(Bit::select(value, i));
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.push_u64(*byte as u64, 8);
        }
    }

    /// Remove and return the last bit of the buffer.
    pub fn pop(&mut self) -> Option<Bit> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let word = self.len / WORD_BITS;
        let shift = self.len % WORD_BITS;
        let out = Bit::select(self.words[word], shift);
        self.words[word] &= !(1 << shift);
        if shift == 0 {
            self.words.pop();
        }
        Some(out)
    }

    /// Get a bit in the buffer by index.
    pub fn get(&self, index: usize) -> Option<Bit> {
        if index >= self.len {
            return None;
        }
        Some(Bit::select(self.words[index / WORD_BITS], index % WORD_BITS))
    }

    /// Return the number of bits held in this buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Bit> + '_ {
        (0..self.len).map(move |i| Bit::select(self.words[i / WORD_BITS], i % WORD_BITS))
    }

    /// Copy out `len` bits starting at `start`, or `None` if that runs past the end.
    pub fn slice(&self, start: usize, len: usize) -> Option<BitBuf> {
        if start.checked_add(len)? > self.len {
            return None;
        }
        Some(self.iter().skip(start).take(len).collect())
    }

    /// Remove the first `count` bits of the buffer, if there are that many.
    pub fn take_front(&mut self, count: usize) -> Option<BitVector> {
        if count > self.len {
            return None;
        }
        let front = BitVector::from_bits(self.iter().take(count));
        let rest: BitBuf = self.iter().skip(count).collect();
        *self = rest;
        Some(front)
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        BitVector {
            words: self.words.clone(),
            len: self.len,
        }
        .is_well_formed()
    }
}

impl Extend<Bit> for BitBuf {
    fn extend<T: IntoIterator<Item = Bit>>(&mut self, iter: T) {
        for bit in iter {
            self.push(bit);
        }
    }
}

impl FromIterator<Bit> for BitBuf {
    fn from_iter<T: IntoIterator<Item = Bit>>(iter: T) -> Self {
        let mut out = BitBuf::new();
        out.extend(iter);
        out
    }
}

impl From<BitVector> for BitBuf {
    fn from(v: BitVector) -> Self {
        Self {
            words: v.words,
            len: v.len,
        }
    }
}

impl From<&BitVector> for BitBuf {
    fn from(v: &BitVector) -> Self {
        Self {
            words: v.words.clone(),
            len: v.len,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use proptest::collection::*;
    use proptest::prelude::*;

    prop_compose! {
        fn arb_bit_buf()(bits in vec(any::<bool>(), 0..300usize)) -> BitBuf {
            bits.into_iter().map(Bit::from).collect()
        }
    }

    proptest! {
        #[test]
        fn test_push_then_pop_is_identity(buf in arb_bit_buf(), x in any::<u64>(), index in 0..64usize) {
            let bit = Bit::select(x, index);
            let mut buf2 = buf.clone();
            buf2.push(bit);
            let bit2 = buf2.pop();
            assert_eq!(buf2, buf);
            assert_eq!(bit2, Some(bit));
        }
    }

    proptest! {
        #[test]
        fn test_push_increases_len_by_one(mut buf in arb_bit_buf()) {
            let start_len = buf.len();
            buf.push(Bit::zero());
            assert_eq!(buf.len(), start_len + 1);
            assert!(buf.is_well_formed());
        }
    }

    proptest! {
        #[test]
        fn test_take_front_splits_in_order(buf in arb_bit_buf(), count in 0..300usize) {
            let mut rest = buf.clone();
            match rest.take_front(count) {
                None => assert!(count > buf.len()),
                Some(front) => {
                    assert_eq!(front.len(), count);
                    let joined: Vec<Bit> = front.iter().chain(rest.iter()).collect();
                    let original: Vec<Bit> = buf.iter().collect();
                    assert_eq!(joined, original);
                    assert!(rest.is_well_formed());
                }
            }
        }
    }

    proptest! {
        #[test]
        fn test_xor_twice_is_identity(x in any::<u64>(), y in any::<u64>(), len in 0..=64usize) {
            let a = BitVector::from_u64(x, len);
            let b = BitVector::from_u64(y, len);
            let mut c = &a ^ &b;
            c ^= &b;
            assert_eq!(c, a);
        }
    }

    proptest! {
        #[test]
        fn test_dot_matches_and_parity(x in any::<u64>(), y in any::<u64>()) {
            let a = BitVector::from_u64(x, 64);
            let b = BitVector::from_u64(y, 64);
            assert_eq!(a.dot(&b), (&a & &b).parity());
            assert_eq!(a.dot(&b).is_set(), (x & y).count_ones() % 2 == 1);
        }
    }

    #[test]
    fn test_bitbuf_get() {
        let mut buf = BitBuf::new();
        buf.push_u64(0, 64);
        buf.push_u64(0b10, 2);
        assert_eq!(buf.get(65), Some(Bit(1)));
        assert_eq!(buf.get(64), Some(Bit(0)));
        assert_eq!(buf.get(67), None);
    }

    #[test]
    fn test_bitbuf_from_bytes() {
        let buf = BitBuf::from_bytes(&[0xAB, 0xCD]);
        assert_eq!(buf.len(), 16);
        assert_eq!(BitVector::from(buf), BitVector::from_u64(0xCDAB, 16));
    }

    #[test]
    fn test_ones_clears_the_tail() {
        let v = BitVector::ones(70);
        assert_eq!(v.count_ones(), 70);
        assert!(v.is_well_formed());
        assert_eq!(v.to_bytes().len(), 9);
    }

    #[test]
    fn test_set_then_get() {
        let mut v = BitVector::zeros(130);
        v.set(129, Bit::one());
        v.set(3, Bit::one());
        v.set(3, Bit::zero());
        assert_eq!(v.get(129), Bit::one());
        assert_eq!(v.get(3), Bit::zero());
        assert_eq!(v.count_ones(), 1);
    }

    #[test]
    fn test_display_is_msb_first() {
        let v = BitVector::from_u64(0b0110, 5);
        assert_eq!(v.to_string(), "00110");
    }

    #[test]
    fn test_bytes_round_trip() {
        let v = BitVector::from_bytes(&[0x12, 0x34, 0x56], 20);
        assert_eq!(v, BitVector::from_u64(0x63412, 20));
        assert_eq!(BitVector::from_bytes(&v.to_bytes(), 20), v);
    }
}
