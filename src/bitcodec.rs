//! Bit ↔ interval codec (spec §4.2).
//!
//! `bits2interval` folds a finite bit string into the dyadic interval it
//! names. `interval2bit`/`interval2bits` go the other way, under one of two
//! projections: `Super` names the smallest dyadic interval that *contains*
//! the input, `Sub` names the largest dyadic interval *contained in* it.

use crate::interval::{scale, select_subinterval, Interval, Rational};
use num_traits::{One, Zero};

/// Which dyadic prefix an interval is mapped to bits by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Smallest dyadic superinterval.
    Super,
    /// Largest dyadic subinterval.
    Sub,
}

fn half() -> Rational {
    Rational::new(1.into(), 2.into())
}

fn first_half() -> Interval {
    Interval {
        b: Rational::zero(),
        l: half(),
    }
}

fn second_half() -> Interval {
    Interval {
        b: half(),
        l: half(),
    }
}

/// [0, 1/2) for bit 0, [1/2, 1) for bit 1.
fn bit2interval(bit: u8) -> Interval {
    if bit == 0 {
        first_half()
    } else {
        second_half()
    }
}

/// Fold a bit string into the interval it names. The empty bit string names
/// `[0, 1)`.
pub fn bits2interval(bits: &[u8]) -> Interval {
    bits.iter().fold(Interval::unit(), |acc, &bit| {
        select_subinterval(&acc, &bit2interval(bit))
    })
}

/// One step of `interval2bits`: returns the next bit and the interval
/// rescaled inside the half it came from, or `None` once the projection is
/// exhausted.
pub fn interval2bit(interval: &Interval, mode: Projection) -> Option<(u8, Interval)> {
    match mode {
        Projection::Super => {
            // Order matters: the interval is closed at the start and open at
            // the end, so a zero-length interval sitting exactly at 1/2 must
            // be classified as bit 1 by the `b >= 1/2` branch before the
            // `b + l <= 1/2` branch gets a chance to claim it as bit 0.
            if interval.b >= half() {
                Some((1, scale(&second_half(), interval)))
            } else if interval.end() <= half() {
                Some((0, scale(&first_half(), interval)))
            } else {
                None
            }
        }
        Projection::Sub => {
            let bottom_distance = interval.b.clone();
            let top_distance = Rational::one() - interval.end();

            if bottom_distance <= Rational::zero() && top_distance <= Rational::zero() {
                // The interval contains all of [0, 1); no dyadic subinterval
                // is smaller than it.
                None
            } else if top_distance < bottom_distance {
                Some((
                    1,
                    unchecked_scale(&second_half(), interval),
                ))
            } else {
                Some((0, unchecked_scale(&first_half(), interval)))
            }
        }
    }
}

/// `scale` without the sub-unit invariant: in `Sub` mode the chosen half may
/// not fully contain `interval`, so the scaled result can legitimately have
/// `b < 0` or `b + l > 1`.
fn unchecked_scale(outer: &Interval, inner: &Interval) -> Interval {
    scale(outer, inner)
}

/// Repeatedly apply [`interval2bit`], collecting bits until it returns `None`.
///
/// Both projections terminate in finitely many steps for any rational `I`
/// with a finite denominator: each step strictly halves the denominator of
/// the scaled remainder once reduced to lowest terms.
pub fn interval2bits(interval: &Interval, mode: Projection) -> Vec<u8> {
    let mut bits = Vec::new();
    let mut current = interval.clone();
    while let Some((bit, rest)) = interval2bit(&current, mode) {
        bits.push(bit);
        current = rest;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn s1_interval_fold() {
        // bits2interval([1,0,1]) = (5/8, 1/8)
        let i = bits2interval(&[1, 0, 1]);
        assert_eq!(i.b, r(5, 8));
        assert_eq!(i.l, r(1, 8));
    }

    #[test]
    fn p2_denominator_is_power_of_two() {
        let i = bits2interval(&[1, 1, 0, 1, 0, 1, 1]);
        assert_eq!(i.b.denom(), &BigInt::from(1i64 << 7));
    }

    #[test]
    fn p3_super_roundtrip() {
        for bits in [vec![], vec![0], vec![1], vec![1, 0, 1], vec![0, 0, 1, 1, 0]] {
            let interval = bits2interval(&bits);
            let roundtripped = interval2bits(&interval, Projection::Super);
            assert_eq!(roundtripped, bits);
        }
    }

    #[test]
    fn p4_sub_and_super_bracket_the_interval() {
        let interval = Interval::from_parts(1, 1, 6, true).unwrap();
        let sub = bits2interval(&interval2bits(&interval, Projection::Sub));
        let sup = bits2interval(&interval2bits(&interval, Projection::Super));
        assert!(is_subinterval_incl(&interval, &sub));
        assert!(is_subinterval_incl(&sup, &interval));
    }

    fn is_subinterval_incl(outer: &Interval, inner: &Interval) -> bool {
        inner.b >= outer.b && inner.end() <= outer.end()
    }
}
