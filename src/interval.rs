//! Exact rational interval algebra (spec §4.1).
//!
//! Every interval held by the coder is a half-open subinterval `[b, b+l)` of
//! the reals, represented with arbitrary-precision rationals so that no
//! rounding ever happens on the hot path between tokens and bits. Rationals
//! are reduced to lowest terms by [`num_rational::BigRational`] as they go;
//! we never hand-roll gcd reduction on top of it.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use rand::RngCore;

/// An arbitrary-precision rational, exact and never rounded.
pub type Rational = BigRational;

/// A half-open interval `[b, b+l)` with `l > 0`.
///
/// "Sub-unit" intervals additionally satisfy `0 <= b` and `b + l <= 1`; the
/// arithmetic coder's primary state is always sub-unit (invariant I3), but
/// [`scale`] can legitimately produce non-sub-unit intervals when probing a
/// candidate token that turns out not to contain the search interval, so the
/// invariant is enforced only where the spec requires it, not on every
/// intermediate value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    pub b: Rational,
    pub l: Rational,
}

impl Interval {
    /// Construct an interval, requiring `l > 0` and, if `sub_unit` is set,
    /// that it be a subinterval of `[0, 1)`.
    pub fn make(b: Rational, l: Rational, sub_unit: bool) -> Option<Self> {
        if l <= Rational::zero() {
            return None;
        }
        if sub_unit && (b < Rational::zero() || &b + &l > Rational::one()) {
            return None;
        }
        Some(Interval { b, l })
    }

    /// The interval `[0, 1)`.
    pub fn unit() -> Self {
        Interval {
            b: Rational::zero(),
            l: Rational::one(),
        }
    }

    /// Construct from plain integers `base/divisor`, `length/divisor`.
    pub fn from_parts(base: i64, length: i64, divisor: i64, sub_unit: bool) -> Option<Self> {
        let b = Rational::new(BigInt::from(base), BigInt::from(divisor));
        let l = Rational::new(BigInt::from(length), BigInt::from(divisor));
        Interval::make(b, l, sub_unit)
    }

    pub fn end(&self) -> Rational {
        &self.b + &self.l
    }
}

/// The affine map sending `[0,1)` onto `outer`, applied to `inner`.
///
/// `select_subinterval(outer, inner) = (outer.b + inner.b*outer.l, outer.l*inner.l)`.
pub fn select_subinterval(outer: &Interval, inner: &Interval) -> Interval {
    let b = &outer.b + &inner.b * &outer.l;
    let l = &outer.l * &inner.l;
    // The result is only guaranteed sub-unit if both inputs are, which is
    // the case on every call site in this crate.
    Interval { b, l }
}

/// The inverse of [`select_subinterval`]: express `inner` as a ratio of `outer`.
pub fn scale(outer: &Interval, inner: &Interval) -> Interval {
    let b = (&inner.b - &outer.b) / &outer.l;
    let l = &inner.l / &outer.l;
    Interval { b, l }
}

/// Containment check, optionally requiring strict (proper) containment.
pub fn is_subinterval(outer: &Interval, inner: &Interval, proper: bool) -> bool {
    if proper {
        inner.b > outer.b && inner.end() < outer.end()
    } else {
        inner.b >= outer.b && inner.end() <= outer.end()
    }
}

/// The interval named by `n` bits drawn from `rng` (spec §4.2, §4.9).
pub fn random_interval<R: RngCore>(n: usize, rng: &mut R) -> Interval {
    crate::bitcodec::bits2interval(&random_bit_vec(n, rng))
}

/// Draw `n` random bits from `rng`, MSB-first within each 32-bit word.
pub fn random_bit_vec<R: RngCore>(n: usize, rng: &mut R) -> Vec<u8> {
    let mut bits = Vec::with_capacity(n);
    let mut word = 0u32;
    let mut remaining = 0u32;
    for _ in 0..n {
        if remaining == 0 {
            word = rng.next_u32();
            remaining = 32;
        }
        remaining -= 1;
        bits.push(((word >> remaining) & 1) as u8);
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn make_rejects_nonpositive_length() {
        assert!(Interval::make(r(0, 1), r(0, 1), false).is_none());
        assert!(Interval::make(r(0, 1), r(-1, 2), false).is_none());
    }

    #[test]
    fn make_enforces_sub_unit() {
        assert!(Interval::make(r(-1, 2), r(1, 2), true).is_none());
        assert!(Interval::make(r(1, 2), r(1, 1), true).is_none());
        assert!(Interval::make(r(1, 2), r(1, 2), true).is_some());
    }

    #[test]
    fn select_then_scale_is_identity() {
        // P1: scale(outer, select_subinterval(outer, inner)) == inner
        let outer = Interval::from_parts(1, 1, 4, true).unwrap();
        let inner = Interval::from_parts(1, 1, 3, true).unwrap();
        let selected = select_subinterval(&outer, &inner);
        let scaled = scale(&outer, &selected);
        assert_eq!(scaled.b, inner.b);
        assert_eq!(scaled.l, inner.l);
    }

    #[test]
    fn random_interval_is_deterministic_given_seed() {
        let mut rng1 = ChaCha20Rng::seed_from_u64(42);
        let mut rng2 = ChaCha20Rng::seed_from_u64(42);
        let a = random_interval(16, &mut rng1);
        let b = random_interval(16, &mut rng2);
        assert_eq!(a, b);
    }
}
