//! Precision constants for geometric comparisons.
//!
//! Values follow the conventions of classical B-Rep kernels: a real-space
//! confusion distance, a parametric confusion, and an angular tolerance.

/// Two points closer than this are coincident.
pub const CONFUSION: f64 = 1.0e-7;

/// Square of [`CONFUSION`].
pub const SQUARE_CONFUSION: f64 = CONFUSION * CONFUSION;

/// Parametric confusion: `CONFUSION / 100`.
pub const PCONFUSION: f64 = CONFUSION * 0.01;

/// Angular tolerance (radians) for parallelism checks.
pub const ANGULAR: f64 = 1.0e-12;

/// Magnitude treated as infinite by parameter-range checks.
pub const INFINITE: f64 = 2.0e100;

/// Returns `true` if `value` should be treated as an infinite bound.
#[inline]
#[must_use]
pub fn is_infinite(value: f64) -> bool {
    value.abs() >= INFINITE * 0.5
}

/// Returns `true` if `value` should be treated as `+inf`.
#[inline]
#[must_use]
pub fn is_positive_infinite(value: f64) -> bool {
    value >= INFINITE * 0.5
}

/// Folds `u` into the periodic range `[u_first, u_last)`.
///
/// Values already inside the range (within one ulp of the period) are
/// returned unchanged, so `u_last` itself is not wrapped to `u_first`.
#[must_use]
pub fn in_period(u: f64, u_first: f64, u_last: f64) -> f64 {
    let period = u_last - u_first;
    if period <= 0.0 || !u.is_finite() {
        return u;
    }
    let eps = period * f64::EPSILON;
    let mut folded = u;
    if folded < u_first - eps || folded > u_last + eps {
        folded -= ((folded - u_first) / period).floor() * period;
        if u_last - folded < eps {
            folded = u_first;
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::f64::consts::{PI, TAU};

    #[test]
    fn precision_values() {
        assert_abs_diff_eq!(CONFUSION, 1.0e-7);
        assert_abs_diff_eq!(PCONFUSION, 1.0e-9);
        assert_abs_diff_eq!(SQUARE_CONFUSION, 1.0e-14);
    }

    #[test]
    fn infinite_bounds() {
        assert!(is_infinite(f64::INFINITY));
        assert!(is_infinite(f64::NEG_INFINITY));
        assert!(is_infinite(INFINITE));
        assert!(!is_infinite(1.0e99));
        assert!(is_positive_infinite(f64::INFINITY));
        assert!(!is_positive_infinite(f64::NEG_INFINITY));
    }

    #[test]
    fn in_period_keeps_inside_values() {
        assert_abs_diff_eq!(in_period(1.0, 0.0, TAU), 1.0);
        assert_abs_diff_eq!(in_period(TAU, 0.0, TAU), TAU);
    }

    #[test]
    fn in_period_wraps_negative() {
        assert_abs_diff_eq!(in_period(-PI / 2.0, 0.0, TAU), 1.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn in_period_wraps_several_periods() {
        assert_abs_diff_eq!(in_period(5.0 * TAU + 0.5, 0.0, TAU), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn in_period_shifted_range() {
        let u = in_period(0.1, 3.0, 3.0 + TAU);
        assert_abs_diff_eq!(u, 0.1 + TAU, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn folded_value_lies_in_range(u in -1.0e3..1.0e3f64, first in -10.0..10.0f64) {
            let folded = in_period(u, first, first + TAU);
            prop_assert!(folded >= first - 1e-9);
            prop_assert!(folded <= first + TAU + 1e-9);
            let turns = (folded - u) / TAU;
            prop_assert!((turns - turns.round()).abs() < 1e-6);
        }
    }
}
