use crate::error::{GeometryError, Result};
use crate::math::{Point, Vector, TOLERANCE};

use super::{Curve, CurveKind, UNBOUNDED};

/// An infinite line defined by an origin point and a direction vector.
///
/// The parametric form is: `P(t) = origin + t * direction`, with a unit
/// direction so the parameter is the arc length.
#[derive(Debug, Clone)]
pub struct Line<const D: usize> {
    origin: Point<D>,
    direction: Vector<D>,
}

impl<const D: usize> Line<D> {
    /// Creates a new line from an origin and direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the direction vector is zero-length.
    pub fn new(origin: Point<D>, direction: Vector<D>) -> Result<Self> {
        let len = direction.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            origin,
            direction: direction / len,
        })
    }

    /// Line through two distinct points, parametrized from `a`.
    ///
    /// # Errors
    ///
    /// Returns an error if the points coincide.
    pub fn through(a: Point<D>, b: Point<D>) -> Result<Self> {
        Self::new(a, b - a)
    }

    /// Returns the origin point of the line.
    #[must_use]
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Returns the unit direction vector of the line.
    #[must_use]
    pub fn direction(&self) -> &Vector<D> {
        &self.direction
    }

    /// Parameter of the orthogonal projection of `p`.
    #[must_use]
    pub fn parameter_of(&self, p: &Point<D>) -> f64 {
        (p - self.origin).dot(&self.direction)
    }
}

impl<const D: usize> Curve<D> for Line<D> {
    fn first_parameter(&self) -> f64 {
        UNBOUNDED.0
    }

    fn last_parameter(&self) -> f64 {
        UNBOUNDED.1
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Line(self)
    }

    fn value(&self, u: f64) -> Point<D> {
        self.origin + self.direction * u
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        (self.value(u), self.direction)
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        (self.value(u), self.direction, Vector::zeros())
    }

    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        (self.value(u), self.direction, Vector::zeros(), Vector::zeros())
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        tol3d
    }
}
