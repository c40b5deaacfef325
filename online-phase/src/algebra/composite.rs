//! Defines a fixed-width unsigned integer built from 64-bit limbs
//!
//! All arithmetic wraps modulo `2^(64 * LIMBS)`, reduction modulo a field
//! prime is the responsibility of the [`Modulus`](super::Modulus)

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    ops::{Add, Mul, Neg, Sub},
};

use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::{algebra::macros::impl_borrow_variants, error::EncodingError};

/// The number of bits in a limb
const LIMB_BITS: usize = 64;
/// The number of bytes in a limb
const LIMB_BYTES: usize = 8;

/// A 128-bit composite integer
pub type CompositeUint128 = CompositeUint<2>;
/// A 256-bit composite integer
pub type CompositeUint256 = CompositeUint<4>;

/// An unsigned integer of `64 * LIMBS` bits
///
/// Limbs are stored least significant first; `LIMBS` must be at least one
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeUint<const LIMBS: usize> {
    /// The limbs of the integer, least significant first
    limbs: [u64; LIMBS],
}

impl<const LIMBS: usize> Default for CompositeUint<LIMBS> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const LIMBS: usize> CompositeUint<LIMBS> {
    /// The width of the integer in bits
    pub const BITS: usize = LIMB_BITS * LIMBS;
    /// The length of the canonical byte encoding
    pub const BYTES: usize = LIMB_BYTES * LIMBS;
    /// The additive identity
    pub const ZERO: Self = Self { limbs: [0; LIMBS] };
    /// The largest representable value, `2^W - 1`
    pub const MAX: Self = Self { limbs: [u64::MAX; LIMBS] };

    /// Construct from limbs given least significant first
    pub const fn from_limbs(limbs: [u64; LIMBS]) -> Self {
        Self { limbs }
    }

    /// The multiplicative identity
    pub fn one() -> Self {
        Self::from(1u64)
    }

    /// Get the limbs, least significant first
    pub fn limbs(&self) -> [u64; LIMBS] {
        self.limbs
    }

    /// Whether the value is zero
    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|limb| *limb == 0)
    }

    /// The number of significant bits in the value
    pub fn bit_length(&self) -> usize {
        for (i, limb) in self.limbs.iter().enumerate().rev() {
            if *limb != 0 {
                return i * LIMB_BITS + (LIMB_BITS - limb.leading_zeros() as usize);
            }
        }

        0
    }

    // -----------------
    // | Serialization |
    // -----------------

    /// Convert from an arbitrary precision integer, reducing modulo `2^W`
    pub fn from_biguint(value: &BigUint) -> Self {
        let mut limbs = [0u64; LIMBS];
        for (limb, digit) in limbs.iter_mut().zip(value.iter_u64_digits()) {
            *limb = digit;
        }

        Self { limbs }
    }

    /// Convert to an arbitrary precision integer in `[0, 2^W)`
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.to_bytes_be())
    }

    /// Decode a big-endian byte string of at most `W / 8` bytes
    ///
    /// Shorter inputs are treated as if zero-padded on the left
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() > Self::BYTES {
            return Err(EncodingError::InvalidLength { expected: Self::BYTES, actual: bytes.len() });
        }

        let mut padded = vec![0u8; Self::BYTES];
        padded[Self::BYTES - bytes.len()..].copy_from_slice(bytes);

        let mut limbs = [0u64; LIMBS];
        for (limb, chunk) in limbs.iter_mut().zip(padded.chunks_exact(LIMB_BYTES).rev()) {
            *limb = chunk.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        }

        Ok(Self { limbs })
    }

    /// Decode a big-endian byte string of exactly `W / 8` bytes
    pub fn from_be_bytes_exact(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() != Self::BYTES {
            return Err(EncodingError::InvalidLength { expected: Self::BYTES, actual: bytes.len() });
        }

        Self::from_be_bytes(bytes)
    }

    /// Encode as exactly `W / 8` big-endian bytes
    pub fn to_bytes_be(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::BYTES);
        for limb in self.limbs.iter().rev() {
            bytes.extend_from_slice(&limb.to_be_bytes());
        }

        bytes
    }

    // --------------
    // | Arithmetic |
    // --------------

    /// Add two values, returning the wrapped sum and whether a carry was
    /// dropped out of the top limb
    pub fn overflowing_add(&self, rhs: &Self) -> (Self, bool) {
        let mut limbs = [0u64; LIMBS];
        let mut carry = false;
        for (out, (a, b)) in limbs.iter_mut().zip(self.limbs.iter().zip(rhs.limbs.iter())) {
            let (sum, c1) = a.overflowing_add(*b);
            let (sum, c2) = sum.overflowing_add(u64::from(carry));
            *out = sum;
            carry = c1 || c2;
        }

        (Self { limbs }, carry)
    }

    /// Subtract `rhs`, returning the wrapped difference and whether a borrow
    /// was taken out of the top limb
    pub fn overflowing_sub(&self, rhs: &Self) -> (Self, bool) {
        let mut limbs = [0u64; LIMBS];
        let mut borrow = false;
        for (out, (a, b)) in limbs.iter_mut().zip(self.limbs.iter().zip(rhs.limbs.iter())) {
            let (diff, b1) = a.overflowing_sub(*b);
            let (diff, b2) = diff.overflowing_sub(u64::from(borrow));
            *out = diff;
            borrow = b1 || b2;
        }

        (Self { limbs }, borrow)
    }

    /// Schoolbook multiplication truncated to `W` bits
    ///
    /// Partial products landing at or above limb index `LIMBS` are never
    /// computed, carries out of the top limb are dropped
    pub fn wrapping_mul(&self, rhs: &Self) -> Self {
        let mut limbs = [0u64; LIMBS];
        for i in 0..LIMBS {
            let mut carry = 0u64;
            for j in 0..LIMBS - i {
                // (2^64 - 1)^2 + 2 * (2^64 - 1) = 2^128 - 1, so this cannot overflow
                let acc = u128::from(self.limbs[i]) * u128::from(rhs.limbs[j])
                    + u128::from(limbs[i + j])
                    + u128::from(carry);
                limbs[i + j] = acc as u64;
                carry = (acc >> LIMB_BITS) as u64;
            }
        }

        Self { limbs }
    }

    /// Schoolbook multiplication keeping the full `2W`-bit product
    ///
    /// Returns the low and high halves of the product
    pub fn widening_mul(&self, rhs: &Self) -> (Self, Self) {
        let mut lo = [0u64; LIMBS];
        let mut hi = [0u64; LIMBS];
        for i in 0..LIMBS {
            let mut carry = 0u64;
            for j in 0..LIMBS {
                let k = i + j;
                let slot = if k < LIMBS { &mut lo[k] } else { &mut hi[k - LIMBS] };
                let acc = u128::from(self.limbs[i]) * u128::from(rhs.limbs[j])
                    + u128::from(*slot)
                    + u128::from(carry);
                *slot = acc as u64;
                carry = (acc >> LIMB_BITS) as u64;
            }

            // Row `i` ends at limb `i + LIMBS`, which no earlier row reached
            hi[i] = carry;
        }

        (Self { limbs: lo }, Self { limbs: hi })
    }

    /// Whether bit `i` is set, counting from the least significant bit
    pub fn bit(&self, i: usize) -> bool {
        i < Self::BITS && (self.limbs[i / LIMB_BITS] >> (i % LIMB_BITS)) & 1 == 1
    }

    /// The additive inverse modulo `2^W`
    pub fn wrapping_neg(&self) -> Self {
        Self::ZERO.overflowing_sub(self).0
    }
}

// ---------------
// | Conversions |
// ---------------

impl<const LIMBS: usize> From<u64> for CompositeUint<LIMBS> {
    fn from(value: u64) -> Self {
        let mut limbs = [0u64; LIMBS];
        limbs[0] = value;
        Self { limbs }
    }
}

impl<const LIMBS: usize> From<u128> for CompositeUint<LIMBS> {
    fn from(value: u128) -> Self {
        let mut limbs = [0u64; LIMBS];
        limbs[0] = value as u64;
        if LIMBS > 1 {
            limbs[1] = (value >> LIMB_BITS) as u64;
        }

        Self { limbs }
    }
}

impl<const LIMBS: usize> From<&BigUint> for CompositeUint<LIMBS> {
    fn from(value: &BigUint) -> Self {
        Self::from_biguint(value)
    }
}

impl<const LIMBS: usize> From<CompositeUint<LIMBS>> for BigUint {
    fn from(value: CompositeUint<LIMBS>) -> Self {
        value.to_biguint()
    }
}

impl<const LIMBS: usize> Display for CompositeUint<LIMBS> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_biguint())
    }
}

impl<const LIMBS: usize> Zeroize for CompositeUint<LIMBS> {
    fn zeroize(&mut self) {
        self.limbs.zeroize();
    }
}

impl<const LIMBS: usize> PartialOrd for CompositeUint<LIMBS> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const LIMBS: usize> Ord for CompositeUint<LIMBS> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.limbs.iter().rev().cmp(other.limbs.iter().rev())
    }
}

// --------------
// | Arithmetic |
// --------------

// === Addition === //

impl<const LIMBS: usize> Add<&CompositeUint<LIMBS>> for &CompositeUint<LIMBS> {
    type Output = CompositeUint<LIMBS>;

    fn add(self, rhs: &CompositeUint<LIMBS>) -> Self::Output {
        self.overflowing_add(rhs).0
    }
}
impl_borrow_variants!(CompositeUint<LIMBS>, Add, add, +, CompositeUint<LIMBS>, const LIMBS: usize);

// === Subtraction === //

impl<const LIMBS: usize> Sub<&CompositeUint<LIMBS>> for &CompositeUint<LIMBS> {
    type Output = CompositeUint<LIMBS>;

    fn sub(self, rhs: &CompositeUint<LIMBS>) -> Self::Output {
        self.overflowing_sub(rhs).0
    }
}
impl_borrow_variants!(CompositeUint<LIMBS>, Sub, sub, -, CompositeUint<LIMBS>, const LIMBS: usize);

// === Multiplication === //

impl<const LIMBS: usize> Mul<&CompositeUint<LIMBS>> for &CompositeUint<LIMBS> {
    type Output = CompositeUint<LIMBS>;

    fn mul(self, rhs: &CompositeUint<LIMBS>) -> Self::Output {
        self.wrapping_mul(rhs)
    }
}
impl_borrow_variants!(CompositeUint<LIMBS>, Mul, mul, *, CompositeUint<LIMBS>, const LIMBS: usize);

// === Negation === //

impl<const LIMBS: usize> Neg for &CompositeUint<LIMBS> {
    type Output = CompositeUint<LIMBS>;

    fn neg(self) -> Self::Output {
        self.wrapping_neg()
    }
}
impl_borrow_variants!(CompositeUint<LIMBS>, Neg, neg, -, const LIMBS: usize);
