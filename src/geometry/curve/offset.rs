use crate::error::{GeometryError, Result};
use crate::math::{Point, Vector, Vector3, TOLERANCE};

use super::{AnyCurve, Continuity, Curve, CurveKind};

/// A curve displaced by a constant distance along its normal.
///
/// In 2D the normal is the tangent turned clockwise, `(t.y, -t.x)`. In 3D it
/// is `t x direction` for a fixed reference direction. Both are linear in the
/// tangent, which keeps the derivatives closed-form.
#[derive(Debug)]
pub struct OffsetCurve<const D: usize> {
    basis: Box<AnyCurve<D>>,
    offset: f64,
    direction: Option<Vector3>,
}

impl OffsetCurve<2> {
    /// Offsets a planar curve by `offset` (positive to the right of travel).
    #[must_use]
    pub fn new(basis: AnyCurve<2>, offset: f64) -> Self {
        Self {
            basis: Box::new(basis),
            offset,
            direction: None,
        }
    }
}

impl OffsetCurve<3> {
    /// Offsets a space curve by `offset` along `tangent x direction`.
    ///
    /// # Errors
    ///
    /// Returns an error if `direction` is zero-length.
    pub fn new(basis: AnyCurve<3>, offset: f64, direction: Vector3) -> Result<Self> {
        let len = direction.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            basis: Box::new(basis),
            offset,
            direction: Some(direction / len),
        })
    }
}

impl<const D: usize> OffsetCurve<D> {
    /// Returns the curve being offset.
    #[must_use]
    pub fn basis(&self) -> &AnyCurve<D> {
        &self.basis
    }

    /// Returns the signed offset distance.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Un-normalized normal built from a tangent-like vector.
    fn normal_of(&self, t: &Vector<D>) -> Vector<D> {
        let mut w = Vector::<D>::zeros();
        match &self.direction {
            None => {
                w[0] = t[1];
                w[1] = -t[0];
            }
            Some(v) => {
                w[0] = t[1] * v.z - t[2] * v.y;
                w[1] = t[2] * v.x - t[0] * v.z;
                w[2] = t[0] * v.y - t[1] * v.x;
            }
        }
        w
    }

    /// Unit normal and its first two derivatives.
    fn unit_normal(&self, d1: &Vector<D>, d2: &Vector<D>, d3: &Vector<D>) -> [Vector<D>; 3] {
        let w = self.normal_of(d1);
        let r = w.norm();
        if r < TOLERANCE {
            return [Vector::zeros(); 3];
        }
        let w1 = self.normal_of(d2);
        let w2 = self.normal_of(d3);
        let n = w / r;
        let r1 = w.dot(&w1) / r;
        let n1 = (w1 - n * r1) / r;
        let r2 = (w1.norm_squared() + w.dot(&w2) - r1 * r1) / r;
        let n2 = (w2 - n * r2 - n1 * (2.0 * r1)) / r;
        [n, n1, n2]
    }
}

impl<const D: usize> Curve<D> for OffsetCurve<D> {
    fn first_parameter(&self) -> f64 {
        self.basis.first_parameter()
    }

    fn last_parameter(&self) -> f64 {
        self.basis.last_parameter()
    }

    fn is_periodic(&self) -> bool {
        self.basis.is_periodic()
    }

    fn period(&self) -> f64 {
        self.basis.period()
    }

    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Offset(self)
    }

    fn value(&self, u: f64) -> Point<D> {
        let (p, d1) = self.basis.d1(u);
        let w = self.normal_of(&d1);
        let r = w.norm();
        if r < TOLERANCE {
            p
        } else {
            p + w * (self.offset / r)
        }
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        let (p, d1, _) = self.d2(u);
        (p, d1)
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        let (p, c1, c2, c3) = self.basis.d3(u);
        let [n, n1, n2] = self.unit_normal(&c1, &c2, &c3);
        let d = self.offset;
        (p + n * d, c1 + n1 * d, c2 + n2 * d)
    }

    /// The third derivative is approximated by central differences of the
    /// second.
    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        let (p, d1, d2) = self.d2(u);
        let h = 1.0e-5 * (1.0 + u.abs());
        let (_, _, before) = self.d2(u - h);
        let (_, _, after) = self.d2(u + h);
        (p, d1, d2, (after - before) / (2.0 * h))
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        self.basis.resolution(tol3d)
    }

    fn continuity(&self) -> Continuity {
        match self.basis.continuity() {
            Continuity::C0 | Continuity::C1 => Continuity::C0,
            Continuity::C2 => Continuity::C1,
            Continuity::C3 => Continuity::C2,
            Continuity::CN => Continuity::CN,
        }
    }

    fn intervals(&self, s: Continuity) -> Vec<f64> {
        self.basis.intervals(s.raised())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::Placement;
    use crate::geometry::curve::{BSplineCurve, Circle, CurveType, Line};
    use crate::math::{Point2, Point3};
    use approx::assert_abs_diff_eq;

    #[test]
    fn offset_of_circle_is_concentric_circle() {
        let circle = Circle::new(Placement::at(Point2::origin()), 2.0).unwrap();
        // ccw circle: the right-hand normal points outward
        let c = OffsetCurve::<2>::new(circle.into(), 0.5);
        assert_eq!(c.curve_type(), CurveType::OffsetCurve);
        for i in 0..8 {
            let u = f64::from(i) * 0.7;
            let (p, d1, d2) = c.d2(u);
            assert_abs_diff_eq!(p.coords.norm(), 2.5, epsilon = 1e-12);
            assert_abs_diff_eq!(d1.norm(), 2.5, epsilon = 1e-12);
            assert_abs_diff_eq!(d2.norm(), 2.5, epsilon = 1e-12);
            assert_abs_diff_eq!(p.coords.dot(&d1), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn offset_of_line_in_3d() {
        let line = Line::new(Point3::origin(), Vector3::x()).unwrap();
        let c = OffsetCurve::<3>::new(line.into(), 2.0, Vector3::z()).unwrap();
        // x cross z = -y
        let p = c.value(1.0);
        assert_abs_diff_eq!(p.x, 1.0);
        assert_abs_diff_eq!(p.y, -2.0);
        let axis = Line::new(Point3::origin(), Vector3::x()).unwrap();
        assert!(OffsetCurve::<3>::new(axis.into(), 1.0, Vector3::zeros()).is_err());
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let basis = BSplineCurve::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 2.0),
                Point2::new(3.0, 2.0),
                Point2::new(4.0, 0.0),
            ],
            vec![0.0, 1.0],
            vec![4, 4],
            3,
        )
        .unwrap();
        let c = OffsetCurve::<2>::new(basis.into(), -0.3);
        let h = 1e-6;
        let u = 0.4;
        let (_, d1, d2) = c.d2(u);
        let fd1 = (c.value(u + h) - c.value(u - h)) / (2.0 * h);
        let fd2 = (c.d1(u + h).1 - c.d1(u - h).1) / (2.0 * h);
        assert!((d1 - fd1).norm() < 1e-6);
        assert!((d2 - fd2).norm() < 1e-4);
    }

    #[test]
    fn continuity_drops_one_order() {
        let basis = BSplineCurve::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, 1.0),
            ],
            vec![0.0, 1.0, 2.0],
            vec![3, 1, 3],
            2,
        )
        .unwrap();
        let c = OffsetCurve::<2>::new(basis.into(), 0.1);
        assert_eq!(c.continuity(), Continuity::C0);
        assert_eq!(c.intervals(Continuity::C1), vec![0.0, 1.0, 2.0]);
        assert_eq!(c.nb_intervals(Continuity::C0), 1);
    }
}
