use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::geometry::Placement;
use crate::math::{Point, Vector, TOLERANCE};

use super::{Curve, CurveKind};

/// A full ellipse in `D`-dimensional space.
///
/// `P(t) = origin + a * cos(t) * x_dir + b * sin(t) * y_dir`
/// where `a >= b > 0` are the major and minor radii.
#[derive(Debug, Clone)]
pub struct Ellipse<const D: usize> {
    position: Placement<D>,
    major_radius: f64,
    minor_radius: f64,
}

impl<const D: usize> Ellipse<D> {
    /// Creates a new ellipse with its major axis along the frame X direction.
    ///
    /// # Errors
    ///
    /// Returns an error if a radius is non-positive or the minor radius
    /// exceeds the major one.
    pub fn new(position: Placement<D>, major_radius: f64, minor_radius: f64) -> Result<Self> {
        if major_radius < TOLERANCE {
            return Err(GeometryError::Degenerate("major radius must be positive".into()).into());
        }
        if minor_radius < TOLERANCE {
            return Err(GeometryError::Degenerate("minor radius must be positive".into()).into());
        }
        if minor_radius > major_radius {
            return Err(GeometryError::Degenerate(
                "minor radius must not exceed major radius".into(),
            )
            .into());
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

    /// Returns the center of the ellipse.
    #[must_use]
    pub fn center(&self) -> &Point<D> {
        self.position.origin()
    }

    /// Returns the semi-major axis length.
    #[must_use]
    pub fn major_radius(&self) -> f64 {
        self.major_radius
    }

    /// Returns the semi-minor axis length.
    #[must_use]
    pub fn minor_radius(&self) -> f64 {
        self.minor_radius
    }
}

impl<const D: usize> Curve<D> for Ellipse<D> {
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
        CurveKind::Ellipse(self)
    }

    fn value(&self, t: f64) -> Point<D> {
        let (s, c) = t.sin_cos();
        self.position.point_at(self.major_radius * c, self.minor_radius * s)
    }

    fn d1(&self, t: f64) -> (Point<D>, Vector<D>) {
        let (s, c) = t.sin_cos();
        let (a, b) = (self.major_radius, self.minor_radius);
        (self.position.point_at(a * c, b * s), self.position.vector_at(-a * s, b * c))
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
        tol3d / self.major_radius
    }
}
