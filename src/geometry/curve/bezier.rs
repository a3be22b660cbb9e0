use crate::error::{GeometryError, Result};
use crate::math::{Point, Vector};

use super::basis::SplineEvaluator;
use super::{Curve, CurveKind};

/// A Bézier curve, rational or not, on the parameter range `[0, 1]`.
#[derive(Debug, Clone)]
pub struct BezierCurve<const D: usize> {
    eval: SplineEvaluator<D>,
}

impl<const D: usize> BezierCurve<D> {
    /// Creates a polynomial Bézier curve from its poles.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two poles are given.
    pub fn new(poles: Vec<Point<D>>) -> Result<Self> {
        Self::build(poles, None)
    }

    /// Creates a rational Bézier curve.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two poles are given, or the weights
    /// do not match the poles or are not all positive.
    pub fn rational(poles: Vec<Point<D>>, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != poles.len() {
            return Err(GeometryError::InvalidPoles(format!(
                "{} weights for {} poles",
                weights.len(),
                poles.len()
            ))
            .into());
        }
        if weights.iter().any(|&w| w <= 0.0) {
            return Err(GeometryError::InvalidPoles("weights must be positive".into()).into());
        }
        Self::build(poles, Some(weights))
    }

    fn build(poles: Vec<Point<D>>, weights: Option<Vec<f64>>) -> Result<Self> {
        if poles.len() < 2 {
            return Err(GeometryError::InvalidPoles(
                "a Bézier curve needs at least two poles".into(),
            )
            .into());
        }
        let degree = poles.len() - 1;
        let mut flat_knots = vec![0.0; degree + 1];
        flat_knots.extend(std::iter::repeat(1.0).take(degree + 1));
        Ok(Self {
            eval: SplineEvaluator {
                flat_knots,
                poles,
                weights,
                degree,
                span_lo: degree,
                span_hi: degree,
            },
        })
    }

    /// Polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.eval.degree
    }

    /// Number of poles, `degree + 1`.
    #[must_use]
    pub fn nb_poles(&self) -> usize {
        self.eval.poles.len()
    }

    /// Returns the poles.
    #[must_use]
    pub fn poles(&self) -> &[Point<D>] {
        &self.eval.poles
    }

    /// Returns the weights of a rational curve.
    #[must_use]
    pub fn weights(&self) -> Option<&[f64]> {
        self.eval.weights.as_deref()
    }

    /// Returns `true` if the curve carries weights.
    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.eval.weights.is_some()
    }
}

impl<const D: usize> Curve<D> for BezierCurve<D> {
    fn first_parameter(&self) -> f64 {
        0.0
    }

    fn last_parameter(&self) -> f64 {
        1.0
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Bezier(self)
    }

    fn value(&self, u: f64) -> Point<D> {
        self.eval.derivatives(u).0
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        let (p, d) = self.eval.derivatives(u);
        (p, d[0])
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        let (p, d) = self.eval.derivatives(u);
        (p, d[0], d[1])
    }

    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        let (p, d) = self.eval.derivatives(u);
        (p, d[0], d[1], d[2])
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        let speed = self.eval.max_speed();
        if speed > 0.0 { tol3d / speed } else { tol3d }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::CurveType;
    use crate::math::{Point2, Point3};
    use approx::assert_abs_diff_eq;

    #[test]
    fn cubic_endpoints_and_midpoint() {
        let c = BezierCurve::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(c.degree(), 3);
        assert!((c.value(0.0) - Point3::origin()).norm() < 1e-12);
        assert!((c.value(1.0) - Point3::new(3.0, 0.0, 0.0)).norm() < 1e-12);
        let m = c.value(0.5);
        assert_abs_diff_eq!(m.x, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.y, 0.75, epsilon = 1e-12);
        assert_eq!(c.curve_type(), CurveType::BezierCurve);
    }

    #[test]
    fn end_tangents_follow_control_polygon() {
        let c = BezierCurve::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 2.0),
            Point2::new(3.0, 2.0),
        ])
        .unwrap();
        let (_, d0) = c.d1(0.0);
        let (_, d1) = c.d1(1.0);
        assert_abs_diff_eq!(d0.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d0.y, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d1.x, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d1.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rational_quarter_circle() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let c = BezierCurve::rational(
            vec![Point2::new(1.0, 0.0), Point2::new(1.0, 1.0), Point2::new(0.0, 1.0)],
            vec![1.0, w, 1.0],
        )
        .unwrap();
        assert!(c.is_rational());
        for i in 0..=8 {
            assert_abs_diff_eq!(c.value(f64::from(i) / 8.0).coords.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn invalid_input() {
        assert!(BezierCurve::new(vec![Point2::origin()]).is_err());
        let segment = vec![Point2::origin(), Point2::new(1.0, 0.0)];
        assert!(BezierCurve::rational(segment.clone(), vec![1.0]).is_err());
        assert!(BezierCurve::rational(segment, vec![1.0, 0.0]).is_err());
    }
}
