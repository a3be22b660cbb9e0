use crate::error::{GeometryError, Result};
use crate::math::{Point, Point2, Point3, Vector, Vector2, Vector3, TOLERANCE};

/// An orthonormal plane frame in `D`-dimensional space.
///
/// Conics are parametrized in this frame: `origin + x * x_dir + y * y_dir`.
/// In 2D the frame may be direct or indirect, which flips the sense of
/// rotation of every conic built on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement<const D: usize> {
    origin: Point<D>,
    x_dir: Vector<D>,
    y_dir: Vector<D>,
}

impl<const D: usize> Placement<D> {
    /// Creates a frame from an origin and two directions.
    ///
    /// Both directions are normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if a direction is zero-length or the two directions
    /// are not perpendicular.
    pub fn new(origin: Point<D>, x_dir: Vector<D>, y_dir: Vector<D>) -> Result<Self> {
        let x_len = x_dir.norm();
        let y_len = y_dir.norm();
        if x_len < TOLERANCE || y_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let x_dir = x_dir / x_len;
        let y_dir = y_dir / y_len;
        if x_dir.dot(&y_dir).abs() > TOLERANCE {
            return Err(GeometryError::Degenerate(
                "frame directions must be perpendicular".into(),
            )
            .into());
        }
        Ok(Self { origin, x_dir, y_dir })
    }

    /// Returns the frame origin.
    #[must_use]
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Returns the unit X direction.
    #[must_use]
    pub fn x_dir(&self) -> &Vector<D> {
        &self.x_dir
    }

    /// Returns the unit Y direction.
    #[must_use]
    pub fn y_dir(&self) -> &Vector<D> {
        &self.y_dir
    }

    /// Point with local coordinates `(x, y)`.
    #[inline]
    #[must_use]
    pub fn point_at(&self, x: f64, y: f64) -> Point<D> {
        self.origin + self.x_dir * x + self.y_dir * y
    }

    /// Vector with local components `(x, y)`.
    #[inline]
    #[must_use]
    pub fn vector_at(&self, x: f64, y: f64) -> Vector<D> {
        self.x_dir * x + self.y_dir * y
    }

    /// Local coordinates of the projection of `p` onto the frame plane.
    #[inline]
    #[must_use]
    pub fn local_coords(&self, p: &Point<D>) -> (f64, f64) {
        let v = p - self.origin;
        (v.dot(&self.x_dir), v.dot(&self.y_dir))
    }
}

impl Placement<2> {
    /// Direct 2D frame at `origin` with X axis along `x_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `x_dir` is zero-length.
    pub fn from_x_dir(origin: Point2, x_dir: Vector2) -> Result<Self> {
        Self::new(origin, x_dir, Vector2::new(-x_dir.y, x_dir.x))
    }

    /// The direct frame at `origin` aligned with the global axes.
    #[must_use]
    pub fn at(origin: Point2) -> Self {
        Self {
            origin,
            x_dir: Vector2::x(),
            y_dir: Vector2::y(),
        }
    }

    /// Returns `true` if the frame is direct (counter-clockwise).
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.x_dir.perp(&self.y_dir) > 0.0
    }
}

impl Placement<3> {
    /// Frame in the plane with the given `normal`, X axis along `x_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a vector is zero-length or `x_dir` is not
    /// perpendicular to `normal`.
    pub fn from_normal(origin: Point3, normal: Vector3, x_dir: Vector3) -> Result<Self> {
        let n_len = normal.norm();
        if n_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / n_len;
        if normal.dot(&x_dir).abs() > TOLERANCE * x_dir.norm().max(1.0) {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to normal".into(),
            )
            .into());
        }
        Self::new(origin, x_dir, normal.cross(&x_dir))
    }

    /// Unit normal of the frame plane.
    #[must_use]
    pub fn normal(&self) -> Vector3 {
        self.x_dir.cross(&self.y_dir)
    }
}
