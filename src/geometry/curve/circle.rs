use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::geometry::Placement;
use crate::math::{Point, Vector, TOLERANCE};

use super::{Curve, CurveKind};

/// A full circle in `D`-dimensional space.
///
/// Defined by a placement frame and a radius. The parametric domain is
/// `[0, 2*pi)` and the curve is periodic.
///
/// `P(t) = origin + radius * cos(t) * x_dir + radius * sin(t) * y_dir`
#[derive(Debug, Clone)]
pub struct Circle<const D: usize> {
    position: Placement<D>,
    radius: f64,
}

impl<const D: usize> Circle<D> {
    /// Creates a new circle.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive.
    pub fn new(position: Placement<D>, radius: f64) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(GeometryError::Degenerate("circle radius must be positive".into()).into());
        }
        Ok(Self { position, radius })
    }

    /// Returns the placement frame.
    #[must_use]
    pub fn position(&self) -> &Placement<D> {
        &self.position
    }

    /// Returns the center of the circle.
    #[must_use]
    pub fn center(&self) -> &Point<D> {
        self.position.origin()
    }

    /// Returns the radius of the circle.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl<const D: usize> Curve<D> for Circle<D> {
    fn first_parameter(&self) -> f64 {
        0.0
    }

    fn last_parameter(&self) -> f64 {
        TAU
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn period(&self) -> f64 {
        TAU
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Circle(self)
    }

    fn value(&self, t: f64) -> Point<D> {
        let (s, c) = t.sin_cos();
        self.position.point_at(self.radius * c, self.radius * s)
    }

    fn d1(&self, t: f64) -> (Point<D>, Vector<D>) {
        let (s, c) = t.sin_cos();
        let r = self.radius;
        (
            self.position.point_at(r * c, r * s),
            self.position.vector_at(-r * s, r * c),
        )
    }

    fn d2(&self, t: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        let (p, d1) = self.d1(t);
        (p, d1, self.center() - p)
    }

    fn d3(&self, t: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        let (p, d1, d2) = self.d2(t);
        (p, d1, d2, -d1)
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        if tol3d < 2.0 * self.radius {
            2.0 * (tol3d / (2.0 * self.radius)).asin()
        } else {
            TAU
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Point2, Point3, Vector2, Vector3};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn xy_circle(radius: f64) -> Circle<3> {
        let frame = Placement::from_normal(Point3::origin(), Vector3::z(), Vector3::x()).unwrap();
        Circle::new(frame, radius).unwrap()
    }

    #[test]
    fn evaluate_at_zero() {
        let c = xy_circle(2.0);
        let p = c.value(0.0);
        assert!((p - Point3::new(2.0, 0.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn evaluate_at_pi_over_2() {
        let c = xy_circle(3.0);
        let p = c.value(FRAC_PI_2);
        assert!((p - Point3::new(0.0, 3.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn derivatives_at_zero() {
        let c = xy_circle(1.0);
        let (_, d1, d2, d3) = c.d3(0.0);
        assert!((d1 - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((d2 - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((d3 - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn indirect_frame_reverses_sense() {
        let frame = Placement::new(Point2::origin(), Vector2::x(), -Vector2::y()).unwrap();
        let c = Circle::new(frame, 1.0).unwrap();
        assert_abs_diff_eq!(c.value(FRAC_PI_2).y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn periodic_domain() {
        let c = xy_circle(1.0);
        assert!(c.is_periodic());
        assert_abs_diff_eq!(c.period(), TAU);
        assert_abs_diff_eq!(c.last_parameter(), TAU);
    }

    #[test]
    fn resolution_scales_with_radius() {
        let c = xy_circle(10.0);
        assert_abs_diff_eq!(c.resolution(1e-7), 1e-8, epsilon = 1e-15);
        assert_abs_diff_eq!(c.resolution(100.0), TAU);
    }

    #[test]
    fn invalid_radius() {
        let frame = Placement::at(Point2::origin());
        assert!(Circle::new(frame, 0.0).is_err());
        assert!(Circle::new(frame, -1.0).is_err());
    }
}
