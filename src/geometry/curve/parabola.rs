use crate::error::{GeometryError, Result};
use crate::geometry::Placement;
use crate::math::{Point, Vector, TOLERANCE};

use super::{Curve, CurveKind, UNBOUNDED};

/// A parabola with apex at the frame origin, opening along X.
///
/// `P(u) = origin + u^2 / (4 f) * x_dir + u * y_dir`, `f` being the focal
/// length.
#[derive(Debug, Clone)]
pub struct Parabola<const D: usize> {
    position: Placement<D>,
    focal: f64,
}

impl<const D: usize> Parabola<D> {
    /// Creates a new parabola.
    ///
    /// # Errors
    ///
    /// Returns an error if the focal length is non-positive.
    pub fn new(position: Placement<D>, focal: f64) -> Result<Self> {
        if focal < TOLERANCE {
            return Err(GeometryError::Degenerate("focal length must be positive".into()).into());
        }
        Ok(Self { position, focal })
    }

    /// Returns the placement frame.
    #[must_use]
    pub fn position(&self) -> &Placement<D> {
        &self.position
    }

    /// Returns the focal length.
    #[must_use]
    pub fn focal(&self) -> f64 {
        self.focal
    }
}

impl<const D: usize> Curve<D> for Parabola<D> {
    fn first_parameter(&self) -> f64 {
        UNBOUNDED.0
    }

    fn last_parameter(&self) -> f64 {
        UNBOUNDED.1
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Parabola(self)
    }

    fn value(&self, u: f64) -> Point<D> {
        self.position.point_at(u * u / (4.0 * self.focal), u)
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        let f = self.focal;
        (self.value(u), self.position.vector_at(u / (2.0 * f), 1.0))
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        let (p, d1) = self.d1(u);
        (p, d1, self.position.vector_at(1.0 / (2.0 * self.focal), 0.0))
    }

    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        let (p, d1, d2) = self.d2(u);
        (p, d1, d2, Vector::zeros())
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        tol3d
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use approx::assert_abs_diff_eq;

    #[test]
    fn apex_and_focus_relation() {
        let p = Parabola::new(Placement::at(Point2::origin()), 0.5).unwrap();
        assert_abs_diff_eq!(p.value(0.0).x, 0.0);
        // y^2 = 4 f x
        let q = p.value(3.0);
        assert_abs_diff_eq!(q.y * q.y, 4.0 * 0.5 * q.x, epsilon = 1e-12);
    }

    #[test]
    fn derivatives() {
        let p = Parabola::new(Placement::at(Point2::origin()), 1.0).unwrap();
        let (_, d1, d2, d3) = p.d3(2.0);
        assert_abs_diff_eq!(d1.x, 1.0);
        assert_abs_diff_eq!(d1.y, 1.0);
        assert_abs_diff_eq!(d2.x, 0.5);
        assert_abs_diff_eq!(d3.norm(), 0.0);
    }

    #[test]
    fn invalid_focal() {
        assert!(Parabola::new(Placement::at(Point2::origin()), 0.0).is_err());
    }
}
