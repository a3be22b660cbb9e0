use crate::error::{GeometryError, Result};
use crate::math::precision::in_period;
use crate::math::{Point, Vector};

use super::basis::{flatten_knots, SplineEvaluator};
use super::{Continuity, Curve, CurveKind};

/// A B-spline curve, rational or not, optionally periodic.
///
/// Knots are given as strictly increasing distinct values with
/// multiplicities. A non-periodic curve with `n` poles and degree `p`
/// needs `sum(mults) == n + p + 1`. A periodic curve needs equal end
/// multiplicities and `sum(mults) - mults[last] == n`; its poles wrap around.
#[derive(Debug, Clone)]
pub struct BSplineCurve<const D: usize> {
    poles: Vec<Point<D>>,
    weights: Option<Vec<f64>>,
    knots: Vec<f64>,
    mults: Vec<usize>,
    degree: usize,
    periodic: bool,
    first_knot_index: usize,
    last_knot_index: usize,
    eval: SplineEvaluator<D>,
}

impl<const D: usize> BSplineCurve<D> {
    /// Creates a non-periodic polynomial B-spline.
    ///
    /// # Errors
    ///
    /// Returns an error if the degree is zero, the knots are not strictly
    /// increasing, or the knot and pole counts are inconsistent.
    pub fn new(
        poles: Vec<Point<D>>,
        knots: Vec<f64>,
        mults: Vec<usize>,
        degree: usize,
    ) -> Result<Self> {
        Self::build(poles, knots, mults, degree, false)
    }

    /// Creates a periodic polynomial B-spline.
    ///
    /// # Errors
    ///
    /// Same conditions as [`BSplineCurve::new`], with the periodic counting
    /// rule, plus unequal end multiplicities.
    pub fn periodic(
        poles: Vec<Point<D>>,
        knots: Vec<f64>,
        mults: Vec<usize>,
        degree: usize,
    ) -> Result<Self> {
        Self::build(poles, knots, mults, degree, true)
    }

    /// Makes the curve rational with the given pole weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the weight count differs from the pole count or
    /// a weight is not positive.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.poles.len() {
            return Err(GeometryError::InvalidPoles(format!(
                "{} weights for {} poles",
                weights.len(),
                self.poles.len()
            ))
            .into());
        }
        if weights.iter().any(|&w| w <= 0.0) {
            return Err(GeometryError::InvalidPoles("weights must be positive".into()).into());
        }
        self.eval.weights = Some(if self.periodic {
            wrap(&weights, self.degree)
        } else {
            weights.clone()
        });
        self.weights = Some(weights);
        Ok(self)
    }

    fn build(
        poles: Vec<Point<D>>,
        knots: Vec<f64>,
        mults: Vec<usize>,
        degree: usize,
        periodic: bool,
    ) -> Result<Self> {
        if degree == 0 {
            return Err(GeometryError::Degenerate(
                "B-spline degree must be at least 1".into(),
            )
            .into());
        }
        if knots.len() < 2 || knots.len() != mults.len() {
            return Err(GeometryError::InvalidKnots(format!(
                "{} knots with {} multiplicities",
                knots.len(),
                mults.len()
            ))
            .into());
        }
        if knots.windows(2).any(|w| w[1] <= w[0]) {
            return Err(GeometryError::InvalidKnots(
                "knots must be strictly increasing".into(),
            )
            .into());
        }
        let last = mults.len() - 1;
        if mults.iter().any(|&m| m == 0) || mults[1..last].iter().any(|&m| m > degree) {
            return Err(GeometryError::InvalidKnots(
                "interior multiplicity exceeds degree".into(),
            )
            .into());
        }
        if mults[0] > degree + 1 || mults[last] > degree + 1 {
            return Err(GeometryError::InvalidKnots(
                "end multiplicity exceeds degree + 1".into(),
            )
            .into());
        }

        let nb_poles = poles.len();
        let total: usize = mults.iter().sum();
        let (first_knot_index, last_knot_index, eval) = if periodic {
            if mults[0] != mults[last] {
                return Err(GeometryError::InvalidKnots(
                    "periodic end multiplicities differ".into(),
                )
                .into());
            }
            if total - mults[last] != nb_poles || nb_poles < 2 {
                return Err(GeometryError::InvalidPoles(format!(
                    "{nb_poles} poles do not match a periodic knot sum of {}",
                    total - mults[last]
                ))
                .into());
            }
            (0, last, periodic_evaluator(&poles, &knots, &mults, degree))
        } else {
            if total != nb_poles + degree + 1 {
                return Err(GeometryError::InvalidPoles(format!(
                    "{nb_poles} poles with degree {degree} need {} flat knots, got {total}",
                    nb_poles + degree + 1
                ))
                .into());
            }
            let flat_knots = flatten_knots(&knots, &mults);
            let (span_lo, span_hi) = non_empty_spans(&flat_knots, degree, nb_poles - 1);
            let eval = SplineEvaluator {
                flat_knots,
                poles: poles.clone(),
                weights: None,
                degree,
                span_lo,
                span_hi,
            };
            (
                knot_index_of_flat(&mults, degree),
                knot_index_of_flat(&mults, nb_poles),
                eval,
            )
        };

        Ok(Self {
            poles,
            weights: None,
            knots,
            mults,
            degree,
            periodic,
            first_knot_index,
            last_knot_index,
            eval,
        })
    }

    /// Polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of poles.
    #[must_use]
    pub fn nb_poles(&self) -> usize {
        self.poles.len()
    }

    /// Returns the poles.
    #[must_use]
    pub fn poles(&self) -> &[Point<D>] {
        &self.poles
    }

    /// Returns the weights of a rational curve.
    #[must_use]
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Returns `true` if the curve carries weights.
    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    /// Distinct knot values.
    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Knot multiplicities.
    #[must_use]
    pub fn multiplicities(&self) -> &[usize] {
        &self.mults
    }

    /// Index into [`BSplineCurve::knots`] of the knot at the domain start.
    #[must_use]
    pub fn first_knot_index(&self) -> usize {
        self.first_knot_index
    }

    /// Index into [`BSplineCurve::knots`] of the knot at the domain end.
    #[must_use]
    pub fn last_knot_index(&self) -> usize {
        self.last_knot_index
    }

    /// Knots bounding the polynomial pieces of the natural domain.
    #[must_use]
    pub fn domain_knots(&self) -> &[f64] {
        &self.knots[self.first_knot_index..=self.last_knot_index]
    }

    fn fold(&self, u: f64) -> f64 {
        if self.periodic {
            in_period(u, self.first_parameter(), self.last_parameter())
        } else {
            u
        }
    }

    /// Continuity order at distinct knot `i`.
    fn knot_continuity(&self, i: usize) -> usize {
        self.degree.saturating_sub(self.mults[i])
    }

    fn interior_knot_range(&self) -> std::ops::Range<usize> {
        self.first_knot_index + 1..self.last_knot_index
    }
}

impl<const D: usize> Curve<D> for BSplineCurve<D> {
    fn first_parameter(&self) -> f64 {
        self.knots[self.first_knot_index]
    }

    fn last_parameter(&self) -> f64 {
        self.knots[self.last_knot_index]
    }

    fn is_periodic(&self) -> bool {
        self.periodic
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::BSpline(self)
    }

    fn value(&self, u: f64) -> Point<D> {
        self.eval.derivatives(self.fold(u)).0
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        let (p, d) = self.eval.derivatives(self.fold(u));
        (p, d[0])
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        let (p, d) = self.eval.derivatives(self.fold(u));
        (p, d[0], d[1])
    }

    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        let (p, d) = self.eval.derivatives(self.fold(u));
        (p, d[0], d[1], d[2])
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        let speed = self.eval.max_speed();
        if speed > 0.0 { tol3d / speed } else { tol3d }
    }

    fn continuity(&self) -> Continuity {
        let mut order = self.interior_knot_range().map(|i| self.knot_continuity(i)).min();
        if self.periodic {
            let closing = self.knot_continuity(0);
            order = Some(order.map_or(closing, |o| o.min(closing)));
        }
        match order {
            None => Continuity::CN,
            Some(0) => Continuity::C0,
            Some(1) => Continuity::C1,
            Some(2) => Continuity::C2,
            Some(_) => Continuity::C3,
        }
    }

    fn intervals(&self, s: Continuity) -> Vec<f64> {
        let mut breaks = vec![self.first_parameter()];
        breaks.extend(
            self.interior_knot_range()
                .filter(|&i| self.knot_continuity(i) < s.order())
                .map(|i| self.knots[i]),
        );
        breaks.push(self.last_parameter());
        breaks
    }
}

/// Index of the distinct knot holding flat knot number `flat_index`.
fn knot_index_of_flat(mults: &[usize], flat_index: usize) -> usize {
    let mut cumulated = 0;
    for (i, &m) in mults.iter().enumerate() {
        cumulated += m;
        if cumulated > flat_index {
            return i;
        }
    }
    mults.len() - 1
}

/// First and last non-empty spans between flat indices `lo` and `hi`.
fn non_empty_spans(flat_knots: &[f64], lo: usize, hi: usize) -> (usize, usize) {
    let mut span_lo = lo;
    while span_lo < hi && flat_knots[span_lo + 1] <= flat_knots[span_lo] {
        span_lo += 1;
    }
    let mut span_hi = hi;
    while span_hi > span_lo && flat_knots[span_hi + 1] <= flat_knots[span_hi] {
        span_hi -= 1;
    }
    (span_lo, span_hi)
}

/// Cyclic extension of `values`: entry `k` is `values[(k - degree) mod n]`
/// for `k` in `0..n + degree`.
fn wrap<T: Copy>(values: &[T], degree: usize) -> Vec<T> {
    let n = values.len();
    (0..n + degree).map(|k| values[(k + n * degree - degree) % n]).collect()
}

/// Evaluator over the unrolled periodic knot sequence
/// `t_i = b[i mod m] + T * (i div m)` for `i` in `-p..=m + p`.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn periodic_evaluator<const D: usize>(
    poles: &[Point<D>],
    knots: &[f64],
    mults: &[usize],
    degree: usize,
) -> SplineEvaluator<D> {
    let last = knots.len() - 1;
    let base = flatten_knots(&knots[..last], &mults[..last]);
    let m = base.len() as isize;
    let period = knots[last] - knots[0];
    let p = degree as isize;
    let flat_knots = (-p..=m + p)
        .map(|i| base[i.rem_euclid(m) as usize] + period * i.div_euclid(m) as f64)
        .collect::<Vec<_>>();
    let (span_lo, span_hi) = non_empty_spans(&flat_knots, degree, base.len() - 1 + degree);
    SplineEvaluator {
        flat_knots,
        poles: wrap(poles, degree),
        weights: None,
        degree,
        span_lo,
        span_hi,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use approx::assert_abs_diff_eq;

    fn polyline() -> BSplineCurve<2> {
        BSplineCurve::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, 1.0),
            ],
            vec![0.0, 1.0, 2.0, 3.0],
            vec![2, 1, 1, 2],
            1,
        )
        .unwrap()
    }

    fn closed_quadratic() -> BSplineCurve<2> {
        BSplineCurve::periodic(
            vec![
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
                Point2::new(-1.0, 0.0),
                Point2::new(0.0, -1.0),
            ],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![1, 1, 1, 1, 1],
            2,
        )
        .unwrap()
    }

    #[test]
    fn degree_one_interpolates_poles() {
        let c = polyline();
        for (i, pole) in c.poles().iter().enumerate() {
            assert!((c.value(i as f64) - pole).norm() < 1e-12);
        }
        let mid = c.value(1.5);
        assert_abs_diff_eq!(mid.x, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.y, 0.5, epsilon = 1e-12);
        assert_eq!(c.continuity(), Continuity::C0);
        assert_eq!(c.intervals(Continuity::C1), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(c.nb_intervals(Continuity::C0), 1);
    }

    #[test]
    fn clamped_cubic_matches_bezier() {
        let poles = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 1.0),
            Point2::new(3.0, 0.0),
        ];
        let c = BSplineCurve::new(poles, vec![0.0, 1.0], vec![4, 4], 3).unwrap();
        let m = c.value(0.5);
        assert_abs_diff_eq!(m.x, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.y, 0.75, epsilon = 1e-12);
        assert_eq!(c.domain_knots(), &[0.0, 1.0]);
        assert_eq!(c.continuity(), Continuity::CN);
    }

    #[test]
    fn periodic_curve_closes_smoothly() {
        let c = closed_quadratic();
        assert!(c.is_periodic());
        assert_abs_diff_eq!(c.period(), 4.0);
        let (p0, d0) = c.d1(0.0);
        let (p1, d1) = c.d1(4.0);
        assert!((p0 - p1).norm() < 1e-12);
        assert!((d0 - d1).norm() < 1e-12);
        // uniform quadratic: C(0) is the midpoint of the last two poles
        assert_abs_diff_eq!(p0.x, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p0.y, -0.5, epsilon = 1e-12);
        assert_eq!(c.continuity(), Continuity::C1);
    }

    #[test]
    fn periodic_evaluation_wraps_parameter() {
        let c = closed_quadratic();
        let a = c.value(1.3);
        let b = c.value(1.3 + 8.0);
        let d = c.value(1.3 - 4.0);
        assert!((a - b).norm() < 1e-9);
        assert!((a - d).norm() < 1e-9);
    }

    #[test]
    fn rational_weights() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let c = BSplineCurve::new(
            vec![Point2::new(1.0, 0.0), Point2::new(1.0, 1.0), Point2::new(0.0, 1.0)],
            vec![0.0, 1.0],
            vec![3, 3],
            2,
        )
        .unwrap()
        .with_weights(vec![1.0, w, 1.0])
        .unwrap();
        assert!(c.is_rational());
        assert_abs_diff_eq!(c.value(0.3).coords.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn unclamped_domain_starts_at_degree_knot() {
        let c = BSplineCurve::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 2.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, 2.0),
            ],
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![1, 1, 1, 1, 1, 1, 1],
            2,
        )
        .unwrap();
        assert_abs_diff_eq!(c.first_parameter(), 2.0);
        assert_abs_diff_eq!(c.last_parameter(), 4.0);
        assert_eq!(c.domain_knots(), &[2.0, 3.0, 4.0]);
        // midpoint of the first two poles
        let p = c.value(2.0);
        assert_abs_diff_eq!(p.x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn invalid_definitions() {
        let poles = vec![Point2::origin(), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)];
        assert!(BSplineCurve::new(poles.clone(), vec![0.0, 1.0], vec![2, 2], 1).is_err());
        assert!(BSplineCurve::new(poles.clone(), vec![1.0, 0.0], vec![3, 3], 2).is_err());
        assert!(BSplineCurve::new(poles.clone(), vec![0.0, 1.0], vec![3, 3], 0).is_err());
        let knots = vec![0.0, 1.0, 2.0];
        assert!(BSplineCurve::periodic(poles.clone(), knots, vec![1, 1, 2], 1).is_err());
        let c = BSplineCurve::new(poles, vec![0.0, 1.0], vec![3, 3], 2).unwrap();
        assert!(c.with_weights(vec![1.0, -1.0, 1.0]).is_err());
    }
}
