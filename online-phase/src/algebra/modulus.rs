//! Arithmetic in the prime field defined by the computation's public modulus

use std::fmt::{Display, Formatter, Result as FmtResult};

use num_bigint::BigUint;
use num_traits::Num;
use rand::{CryptoRng, RngCore};

use crate::error::{EncodingError, SpdzError};

use super::CompositeUint128;

/// A field element, always kept reduced below the modulus
pub type FieldElement = CompositeUint128;

/// The Mersenne prime `2^127 - 1`
const MERSENNE_127_U128: u128 = u128::MAX >> 1;
/// The Mersenne prime `2^127 - 1` as a composite integer
const MERSENNE_127: CompositeUint128 = CompositeUint128::from_limbs([u64::MAX, u64::MAX >> 1]);

/// Interpret a 128-bit composite integer as a native integer
fn to_u128(value: &CompositeUint128) -> u128 {
    let [lo, hi] = value.limbs();
    u128::from(lo) | (u128::from(hi) << 64)
}

/// The public prime modulus of a computation
///
/// All field arithmetic is routed through the modulus, which is fixed for the
/// lifetime of a computation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Modulus {
    /// The prime
    value: CompositeUint128,
}

impl Default for Modulus {
    fn default() -> Self {
        Self::mersenne_127()
    }
}

impl Modulus {
    /// Construct a modulus, the value must be at least two
    ///
    /// Primality is not checked; it is a public parameter agreed upon out of
    /// band
    pub fn new(value: CompositeUint128) -> Result<Self, SpdzError> {
        if value < CompositeUint128::from(2u64) {
            return Err(SpdzError::Setup(format!("modulus must be at least 2, got {value}")));
        }

        Ok(Self { value })
    }

    /// Parse a modulus from a decimal string
    pub fn from_decimal_string(s: &str) -> Result<Self, SpdzError> {
        let value = BigUint::from_str_radix(s, 10).map_err(|e| SpdzError::Setup(e.to_string()))?;
        if value.bits() > CompositeUint128::BITS as u64 {
            return Err(SpdzError::Setup(format!("modulus {value} exceeds 128 bits")));
        }

        Self::new(CompositeUint128::from_biguint(&value))
    }

    /// The Mersenne prime `2^127 - 1`
    pub const fn mersenne_127() -> Self {
        Self { value: MERSENNE_127 }
    }

    /// The value of the modulus
    pub fn value(&self) -> CompositeUint128 {
        self.value
    }

    /// The number of bits in the modulus
    pub fn bit_length(&self) -> usize {
        self.value.bit_length()
    }

    // --------------
    // | Arithmetic |
    // --------------

    /// Reduce an arbitrary 128-bit value into the field
    pub fn reduce(&self, value: &CompositeUint128) -> FieldElement {
        if *value < self.value {
            return *value;
        }

        self.reduce_wide(&FieldElement::ZERO, value)
    }

    /// Reduce an arbitrary precision integer into the field
    pub fn reduce_biguint(&self, value: &BigUint) -> FieldElement {
        FieldElement::from_biguint(&(value % self.value.to_biguint()))
    }

    /// Add two field elements
    pub fn add(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let (sum, carry) = a.overflowing_add(b);
        if carry || sum >= self.value {
            sum - self.value
        } else {
            sum
        }
    }

    /// Subtract `b` from `a`
    pub fn sub(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let (diff, borrow) = a.overflowing_sub(b);
        if borrow {
            diff + self.value
        } else {
            diff
        }
    }

    /// The additive inverse of `a`
    pub fn neg(&self, a: &FieldElement) -> FieldElement {
        if a.is_zero() {
            return FieldElement::ZERO;
        }

        self.value - a
    }

    /// Multiply two field elements
    ///
    /// The full 256-bit product is formed limb by limb before reduction
    pub fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let (lo, hi) = a.widening_mul(b);
        if self.value == MERSENNE_127 {
            return Self::fold_mersenne_127(&lo, &hi);
        }

        self.reduce_wide(&hi, &lo)
    }

    /// Reduce `hi * 2^128 + lo` where `hi` is already reduced
    ///
    /// Shifts the bits of `lo` in one at a time, doubling the accumulator
    fn reduce_wide(&self, hi: &FieldElement, lo: &CompositeUint128) -> FieldElement {
        let one = FieldElement::one();
        let mut acc = *hi;
        for i in (0..CompositeUint128::BITS).rev() {
            acc = self.add(&acc, &acc);
            if lo.bit(i) {
                acc = self.add(&acc, &one);
            }
        }

        acc
    }

    /// Reduce a product of two elements of the field modulo `2^127 - 1`
    ///
    /// Splitting the product as `x_lo + x_hi * 2^127` gives
    /// `x = x_lo + x_hi (mod p)`, a sum below `2p`
    fn fold_mersenne_127(lo: &CompositeUint128, hi: &CompositeUint128) -> FieldElement {
        let lo = to_u128(lo);
        let hi = to_u128(hi);
        let x_lo = lo & MERSENNE_127_U128;
        let x_hi = (hi << 1) | (lo >> 127);

        // `x_lo <= p` and `x_hi <= p - 1` for a product of reduced values
        let sum = x_lo + x_hi;
        let reduced = if sum >= MERSENNE_127_U128 { sum - MERSENNE_127_U128 } else { sum };
        FieldElement::from(reduced)
    }

    /// Sum an iterator of field elements
    pub fn sum<'a, I: IntoIterator<Item = &'a FieldElement>>(&self, values: I) -> FieldElement {
        values.into_iter().fold(FieldElement::ZERO, |acc, x| self.add(&acc, x))
    }

    /// Sample a uniformly random field element
    pub fn random<R: RngCore + CryptoRng>(&self, rng: &mut R) -> FieldElement {
        // Mask samples down to the bit length of the modulus
        let n_bits = self.bit_length();
        let mut mask = [0u64; 2];
        for (i, limb) in mask.iter_mut().enumerate() {
            let bits = n_bits.saturating_sub(i * 64).min(64);
            *limb = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        }

        // At most half of the masked samples are rejected
        loop {
            let candidate =
                FieldElement::from_limbs([rng.next_u64() & mask[0], rng.next_u64() & mask[1]]);
            if candidate < self.value {
                return candidate;
            }
        }
    }

    // -----------------
    // | Serialization |
    // -----------------

    /// Encode a field element as fixed-length big-endian bytes
    pub fn encode(&self, value: &FieldElement) -> Vec<u8> {
        value.to_bytes_be()
    }

    /// Decode a field element, rejecting buffers of the wrong length and
    /// values that are not reduced
    pub fn decode(&self, bytes: &[u8]) -> Result<FieldElement, EncodingError> {
        let value = FieldElement::from_be_bytes_exact(bytes)?;
        if value >= self.value {
            return Err(EncodingError::OutOfRange);
        }

        Ok(value)
    }
}

impl Display for Modulus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod test {
    use num_bigint::BigUint;
    use num_traits::One;
    use rand::thread_rng;

    use super::*;

    /// A small prime used to exercise wraparound
    const SMALL_PRIME: u64 = 65_521;

    /// Tests field arithmetic against an arbitrary precision reference
    #[test]
    fn test_field_arithmetic() {
        let mut rng = thread_rng();
        let modulus = Modulus::default();
        let p = modulus.value().to_biguint();

        for _ in 0..100 {
            let a = modulus.random(&mut rng);
            let b = modulus.random(&mut rng);
            let (x, y) = (a.to_biguint(), b.to_biguint());

            assert_eq!(modulus.add(&a, &b).to_biguint(), (&x + &y) % &p);
            assert_eq!(modulus.sub(&a, &b).to_biguint(), (&x + &p - &y) % &p);
            assert_eq!(modulus.mul(&a, &b).to_biguint(), (&x * &y) % &p);
            assert_eq!(modulus.add(&a, &modulus.neg(&a)), FieldElement::ZERO);
        }
    }

    /// Tests multiplication for moduli off the Mersenne fast path, including
    /// one where doubling carries out of 128 bits
    #[test]
    fn test_mul_generic_modulus() {
        let mut rng = thread_rng();
        let largest = (BigUint::one() << 128u32) - BigUint::from(159u8);
        let moduli = [
            Modulus::new(FieldElement::from_biguint(&largest)).unwrap(),
            Modulus::new(FieldElement::from(SMALL_PRIME)).unwrap(),
            Modulus::new(FieldElement::from(u64::MAX - 58)).unwrap(),
        ];

        for modulus in moduli.iter() {
            let p = modulus.value().to_biguint();
            let max = FieldElement::from_biguint(&(&p - BigUint::one()));
            assert_eq!(modulus.mul(&max, &max), FieldElement::one());

            for _ in 0..50 {
                let a = modulus.random(&mut rng);
                let b = modulus.random(&mut rng);
                let expected = (a.to_biguint() * b.to_biguint()) % &p;
                assert_eq!(modulus.mul(&a, &b).to_biguint(), expected);
            }

            let wide = FieldElement::MAX;
            assert_eq!(modulus.reduce(&wide).to_biguint(), wide.to_biguint() % &p);
        }
    }

    /// Tests the Mersenne fast path at the edges of the field
    #[test]
    fn test_mul_mersenne_edges() {
        let modulus = Modulus::mersenne_127();
        let p = modulus.value().to_biguint();
        let max = FieldElement::from_biguint(&(&p - BigUint::one()));
        let half = FieldElement::from_biguint(&(BigUint::one() << 126u32));

        assert_eq!(modulus.mul(&max, &max), FieldElement::one());
        assert_eq!(modulus.mul(&max, &FieldElement::ZERO), FieldElement::ZERO);
        assert_eq!(modulus.mul(&half, &FieldElement::from(2u64)), FieldElement::one());
        assert_eq!(
            modulus.mul(&half, &half).to_biguint(),
            (half.to_biguint() * half.to_biguint()) % &p
        );
        assert_eq!(modulus.reduce(&FieldElement::MAX), FieldElement::one());
    }

    /// Tests addition where the raw sum carries out of 128 bits
    #[test]
    fn test_add_with_carry() {
        // The largest 128-bit prime, 2^128 - 159
        let p = (BigUint::one() << 128u32) - BigUint::from(159u8);
        let modulus = Modulus::new(FieldElement::from_biguint(&p)).unwrap();
        let a = FieldElement::from_biguint(&(&p - BigUint::one()));

        let sum = modulus.add(&a, &a);
        assert_eq!(sum.to_biguint(), (&p - BigUint::from(2u8)));
        assert_eq!(modulus.neg(&FieldElement::ZERO), FieldElement::ZERO);
    }

    /// Tests that random sampling stays in range for a small modulus
    #[test]
    fn test_random_in_range() {
        let mut rng = thread_rng();
        let modulus = Modulus::new(FieldElement::from(SMALL_PRIME)).unwrap();
        for _ in 0..1_000 {
            assert!(modulus.random(&mut rng) < modulus.value());
        }
    }

    /// Tests decoding of malformed field elements
    #[test]
    fn test_decode() {
        let modulus = Modulus::new(FieldElement::from(SMALL_PRIME)).unwrap();
        let x = FieldElement::from(12_345u64);
        assert_eq!(modulus.decode(&modulus.encode(&x)).unwrap(), x);

        let too_big = FieldElement::from(SMALL_PRIME);
        assert_eq!(modulus.decode(&too_big.to_bytes_be()), Err(EncodingError::OutOfRange));
        assert_eq!(
            modulus.decode(&[0u8; 8]),
            Err(EncodingError::InvalidLength { expected: 16, actual: 8 })
        );
    }

    /// Tests modulus construction
    #[test]
    fn test_construction() {
        assert!(Modulus::new(FieldElement::one()).is_err());
        assert!(Modulus::from_decimal_string("not a number").is_err());

        let modulus =
            Modulus::from_decimal_string("170141183460469231731687303715884105727").unwrap();
        assert_eq!(modulus, Modulus::mersenne_127());
        assert_eq!(modulus.bit_length(), 127);

        let too_wide = ((BigUint::one() << 130u32) + BigUint::one()).to_string();
        assert!(Modulus::from_decimal_string(&too_wide).is_err());
    }
}
