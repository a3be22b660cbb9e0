use crate::error::{GeometryError, Result};
use crate::geometry::Placement;
use crate::math::{Point, Vector, TOLERANCE};

use super::{Curve, CurveKind, UNBOUNDED};

/// The main branch of a hyperbola.
///
/// `P(u) = origin + a * cosh(u) * x_dir + b * sinh(u) * y_dir`
#[derive(Debug, Clone)]
pub struct Hyperbola<const D: usize> {
    position: Placement<D>,
    major_radius: f64,
    minor_radius: f64,
}

impl<const D: usize> Hyperbola<D> {
    /// Creates a new hyperbola branch.
    ///
    /// # Errors
    ///
    /// Returns an error if a radius is non-positive.
    pub fn new(position: Placement<D>, major_radius: f64, minor_radius: f64) -> Result<Self> {
        if major_radius < TOLERANCE || minor_radius < TOLERANCE {
            return Err(GeometryError::Degenerate("hyperbola radii must be positive".into()).into());
        }
        Ok(Self {
            position,
            major_radius,
            minor_radius,
        })
    }

    /// Returns the placement frame.
    #[must_use]
    pub fn position(&self) -> &Placement<D> {
        &self.position
    }

    /// Returns the major radius `a`.
    #[must_use]
    pub fn major_radius(&self) -> f64 {
        self.major_radius
    }

    /// Returns the minor radius `b`.
    #[must_use]
    pub fn minor_radius(&self) -> f64 {
        self.minor_radius
    }
}

impl<const D: usize> Curve<D> for Hyperbola<D> {
    fn first_parameter(&self) -> f64 {
        UNBOUNDED.0
    }

    fn last_parameter(&self) -> f64 {
        UNBOUNDED.1
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Hyperbola(self)
    }

    fn value(&self, u: f64) -> Point<D> {
        self.position
            .point_at(self.major_radius * u.cosh(), self.minor_radius * u.sinh())
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        let (a, b) = (self.major_radius, self.minor_radius);
        (
            self.value(u),
            self.position.vector_at(a * u.sinh(), b * u.cosh()),
        )
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        let (p, d1) = self.d1(u);
        (p, d1, p - self.position.origin())
    }

    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        let (p, d1, d2) = self.d2(u);
        (p, d1, d2, d1)
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        tol3d
    }
}
