use std::f64::consts::TAU;

use tracing::{debug, instrument};

use crate::geometry::{Circle, ElementaryCurve, Ellipse, Hyperbola, Line, Parabola};
use crate::math::precision::{in_period, is_infinite, CONFUSION};
use crate::math::roots::{polynomial_roots, Roots, TrigEquation};
use crate::math::Point;

use super::{is_point_min, PointCurveExtrema, PointExtremum, PointOnCurve};

/// Closed-form extrema of the distance from a point to a line or conic.
///
/// Candidates outside `[uinf - tol, usup + tol]` are dropped; on the circle
/// and ellipse parameters are first folded into `[uinf, uinf + 2π)`. The
/// computation fails only when every curve point is an extremum (point on
/// the axis of a circle).
#[derive(Debug, Clone, Copy)]
pub struct ExtremaPointElementary<'a, const D: usize> {
    curve: ElementaryCurve<'a, D>,
    uinf: f64,
    usup: f64,
    tol: f64,
}

impl<'a, const D: usize> ExtremaPointElementary<'a, D> {
    /// Creates a solver over the parameter range `[uinf, usup]` with
    /// parametric tolerance `tol`.
    #[must_use]
    pub fn new(curve: ElementaryCurve<'a, D>, uinf: f64, usup: f64, tol: f64) -> Self {
        Self { curve, uinf, usup, tol }
    }

    /// Computes the extrema for `point`.
    #[instrument(skip_all, fields(curve = ?self.curve.curve_type()))]
    pub fn perform(&self, point: &Point<D>) -> PointCurveExtrema<D> {
        let candidates = match self.curve {
            ElementaryCurve::Line(line) => Some(vec![line_parameter(line, point)]),
            ElementaryCurve::Circle(circle) => circle_parameters(circle, point),
            ElementaryCurve::Ellipse(ellipse) => ellipse_parameters(ellipse, point),
            ElementaryCurve::Parabola(parabola) => Some(parabola_parameters(parabola, point)),
            ElementaryCurve::Hyperbola(hyperbola) => Some(hyperbola_parameters(hyperbola, point)),
        };
        let Some(candidates) = candidates else {
            debug!("every curve point is an extremum");
            return PointCurveExtrema::not_done();
        };

        let periodic = matches!(
            self.curve,
            ElementaryCurve::Circle(_) | ElementaryCurve::Ellipse(_)
        );
        let mut params: Vec<f64> = Vec::with_capacity(candidates.len());
        for u in candidates {
            let u = if periodic { self.fold(u) } else { u };
            if u < self.uinf - self.tol || u > self.usup + self.tol {
                debug!(u, "candidate outside the parameter range");
                continue;
            }
            if params.iter().all(|&other| (other - u).abs() > self.tol) {
                params.push(u);
            }
        }

        let step = self.tol.max(1.0e-6);
        let extrema = params
            .into_iter()
            .map(|u| {
                let value = self.curve.value(u);
                PointExtremum {
                    point: PointOnCurve::new(u, value),
                    square_distance: (value - point).norm_squared(),
                    is_min: self.classify(point, u, step),
                }
            })
            .collect();
        PointCurveExtrema::done(extrema)
    }

    /// Folds a periodic parameter next to the trim range.
    fn fold(&self, u: f64) -> f64 {
        let start = if is_infinite(self.uinf) { 0.0 } else { self.uinf };
        let mut folded = in_period(u, start, start + TAU);
        if folded > self.usup + self.tol && folded - TAU >= self.uinf - self.tol {
            folded -= TAU;
        }
        folded
    }

    fn classify(&self, point: &Point<D>, u: f64, step: f64) -> bool {
        is_point_min(self.curve.as_curve(), point, u, step)
    }
}

fn line_parameter<const D: usize>(line: &Line<D>, point: &Point<D>) -> f64 {
    line.parameter_of(point)
}

/// In-plane direction of the point and its antipode; `None` on the axis.
fn circle_parameters<const D: usize>(circle: &Circle<D>, point: &Point<D>) -> Option<Vec<f64>> {
    let (x, y) = circle.position().local_coords(point);
    if x.hypot(y) < CONFUSION {
        return None;
    }
    let u = y.atan2(x);
    Some(vec![u, u + std::f64::consts::PI])
}

/// Roots of `(b² - a²) sin u cos u + a x sin u - b y cos u = 0`.
fn ellipse_parameters<const D: usize>(ellipse: &Ellipse<D>, point: &Point<D>) -> Option<Vec<f64>> {
    let (x, y) = ellipse.position().local_coords(point);
    let (a, b) = (ellipse.major_radius(), ellipse.minor_radius());
    let equation = TrigEquation {
        a: 0.0,
        b: 0.5 * (b * b - a * a),
        c: -b * y,
        d: a * x,
        e: 0.0,
    };
    match equation.roots(0.0, TAU) {
        Roots::Infinite => None,
        Roots::Finite(roots) => Some(roots),
    }
}

/// Roots of `u³ / (8f²) + u (1 - x / (2f)) - y = 0`.
fn parabola_parameters<const D: usize>(parabola: &Parabola<D>, point: &Point<D>) -> Vec<f64> {
    let (x, y) = parabola.position().local_coords(point);
    let f = parabola.focal();
    let cubic = [-y, 1.0 - x / (2.0 * f), 0.0, 1.0 / (8.0 * f * f)];
    polynomial_roots(&cubic).values().to_vec()
}

/// Roots in `w = e^u > 0` of
/// `(a² + b²) w⁴ - 2 (a x + b y) w³ + 2 (a x - b y) w - (a² + b²) = 0`.
fn hyperbola_parameters<const D: usize>(hyperbola: &Hyperbola<D>, point: &Point<D>) -> Vec<f64> {
    let (x, y) = hyperbola.position().local_coords(point);
    let (a, b) = (hyperbola.major_radius(), hyperbola.minor_radius());
    let r2 = a * a + b * b;
    let quartic = [-r2, 2.0 * (a * x - b * y), 0.0, -2.0 * (a * x + b * y), r2];
    polynomial_roots(&quartic)
        .values()
        .iter()
        .filter(|&&w| w > 0.0)
        .map(|w| w.ln())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{Curve, Placement};
    use crate::math::precision::INFINITE;
    use crate::math::{Point2, Point3, Vector2, Vector3};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn full<'a, const D: usize>(curve: ElementaryCurve<'a, D>) -> ExtremaPointElementary<'a, D> {
        ExtremaPointElementary::new(curve, 0.0, TAU, 1.0e-9)
    }

    fn unbounded<'a, const D: usize>(
        curve: ElementaryCurve<'a, D>,
    ) -> ExtremaPointElementary<'a, D> {
        ExtremaPointElementary::new(curve, -INFINITE, INFINITE, 1.0e-9)
    }

    #[test]
    fn line_projection() {
        let line = Line::new(Point3::new(0.0, 0.0, 1.0), Vector3::x()).unwrap();
        let r = unbounded(ElementaryCurve::Line(&line)).perform(&Point3::new(3.0, 4.0, 1.0));
        assert_eq!(r.nb_ext().unwrap(), 1);
        assert!(r.is_min(0).unwrap());
        assert_abs_diff_eq!(r.point(0).unwrap().parameter(), 3.0);
        assert_abs_diff_eq!(r.square_distance(0).unwrap(), 16.0);
    }

    #[test]
    fn line_projection_outside_range() {
        let line = Line::new(Point2::origin(), Vector2::x()).unwrap();
        let r = ExtremaPointElementary::new(ElementaryCurve::Line(&line), 0.0, 1.0, 1e-9)
            .perform(&Point2::new(5.0, 1.0));
        assert!(r.is_done());
        assert_eq!(r.nb_ext().unwrap(), 0);
    }

    #[test]
    fn circle_min_and_max() {
        let center = Point3::new(10.0, 0.0, 0.0);
        let frame = Placement::from_normal(center, Vector3::z(), Vector3::x()).unwrap();
        let circle = Circle::new(frame, 5.0).unwrap();
        let r = full(ElementaryCurve::Circle(&circle)).perform(&Point3::origin());
        assert_eq!(r.nb_ext().unwrap(), 2);
        let (min, max) = if r.is_min(0).unwrap() { (0, 1) } else { (1, 0) };
        assert_abs_diff_eq!(r.square_distance(min).unwrap(), 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.square_distance(max).unwrap(), 225.0, epsilon = 1e-9);
        assert!(!r.is_min(max).unwrap());
        assert_abs_diff_eq!(r.point(min).unwrap().parameter(), PI, epsilon = 1e-12);
        let far = r.point(max).unwrap();
        assert_abs_diff_eq!(far.value().x, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(far.value().y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn circle_point_on_axis_is_not_done() {
        let frame = Placement::from_normal(Point3::origin(), Vector3::z(), Vector3::x()).unwrap();
        let circle = Circle::new(frame, 1.0).unwrap();
        let r = full(ElementaryCurve::Circle(&circle)).perform(&Point3::new(0.0, 0.0, 4.0));
        assert!(!r.is_done());
        assert!(r.nb_ext().is_err());
    }

    #[test]
    fn circle_trimmed_range_keeps_one() {
        let circle = Circle::new(Placement::at(Point2::origin()), 1.0).unwrap();
        let r = ExtremaPointElementary::new(ElementaryCurve::Circle(&circle), -1.0, 1.0, 1e-9)
            .perform(&Point2::new(3.0, 0.0));
        assert_eq!(r.nb_ext().unwrap(), 1);
        assert_abs_diff_eq!(r.point(0).unwrap().parameter(), 0.0, epsilon = 1e-12);
        assert!(r.is_min(0).unwrap());
    }

    #[test]
    fn circle_parameters_fold_into_shifted_period() {
        let circle = Circle::new(Placement::at(Point2::origin()), 1.0).unwrap();
        let solver =
            ExtremaPointElementary::new(ElementaryCurve::Circle(&circle), 4.0 * PI, 6.0 * PI, 1e-9);
        let r = solver.perform(&Point2::new(0.0, 2.0));
        assert_eq!(r.nb_ext().unwrap(), 2);
        for e in r.extrema() {
            let u = e.point.parameter();
            assert!((4.0 * PI..6.0 * PI).contains(&u));
        }
    }

    #[test]
    fn ellipse_four_extrema_from_center_region() {
        let ellipse = Ellipse::new(Placement::at(Point2::origin()), 3.0, 2.0).unwrap();
        let r = full(ElementaryCurve::Ellipse(&ellipse)).perform(&Point2::new(0.1, 0.0));
        assert_eq!(r.nb_ext().unwrap(), 4);
        let nb_min = r.extrema().iter().filter(|e| e.is_min).count();
        assert_eq!(nb_min, 2);
        for e in r.extrema() {
            let (_, d1) = ellipse.d1(e.point.parameter());
            let diff = e.point.value() - Point2::new(0.1, 0.0);
            assert_abs_diff_eq!(diff.dot(&d1), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn ellipse_far_point_two_extrema() {
        let ellipse = Ellipse::new(Placement::at(Point2::origin()), 3.0, 2.0).unwrap();
        let r = full(ElementaryCurve::Ellipse(&ellipse)).perform(&Point2::new(10.0, 1.0));
        assert_eq!(r.nb_ext().unwrap(), 2);
        let min = r.extrema().iter().find(|e| e.is_min).unwrap();
        let max = r.extrema().iter().find(|e| !e.is_min).unwrap();
        assert!(min.square_distance < max.square_distance);
    }

    #[test]
    fn parabola_apex_and_symmetric_feet() {
        let parabola = Parabola::new(Placement::at(Point2::origin()), 1.0).unwrap();
        // x = u²/4; point on the axis beyond 2f gives three extrema
        let p = Point2::new(5.0, 0.0);
        let r = unbounded(ElementaryCurve::Parabola(&parabola)).perform(&p);
        assert_eq!(r.nb_ext().unwrap(), 3);
        let apex = r.extrema().iter().find(|e| e.point.parameter().abs() < 1e-9).unwrap();
        assert!(!apex.is_min);
        // u³/8 + u(1 - 5/2) = 0 => u² = 12
        for e in r.extrema().iter().filter(|e| e.is_min) {
            assert_abs_diff_eq!(e.point.parameter().abs(), 12.0_f64.sqrt(), epsilon = 1e-9);
        }
    }

    #[test]
    fn hyperbola_vertex() {
        let hyperbola = Hyperbola::new(Placement::at(Point2::origin()), 2.0, 1.0).unwrap();
        let r = unbounded(ElementaryCurve::Hyperbola(&hyperbola)).perform(&Point2::origin());
        assert_eq!(r.nb_ext().unwrap(), 1);
        assert_abs_diff_eq!(r.point(0).unwrap().parameter(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.square_distance(0).unwrap(), 4.0, epsilon = 1e-9);
        assert!(r.is_min(0).unwrap());
    }

    #[test]
    fn hyperbola_off_axis_point() {
        let hyperbola = Hyperbola::new(Placement::at(Point2::origin()), 1.0, 1.0).unwrap();
        let p = Point2::new(3.0, 2.0);
        let r = unbounded(ElementaryCurve::Hyperbola(&hyperbola)).perform(&p);
        assert!(r.nb_ext().unwrap() >= 1);
        for e in r.extrema() {
            let (_, d1) = hyperbola.d1(e.point.parameter());
            assert_abs_diff_eq!((e.point.value() - p).dot(&d1), 0.0, epsilon = 1e-8);
        }
    }

    proptest! {
        #[test]
        fn circle_distances_match_radius(
            cx in -20.0..20.0f64,
            cy in -20.0..20.0f64,
            radius in 0.5..10.0f64,
            angle in 0.0..TAU,
            dist in 0.1..30.0f64,
        ) {
            prop_assume!((dist - radius).abs() > 1e-3);
            let circle = Circle::new(Placement::at(Point2::new(cx, cy)), radius).unwrap();
            let p = Point2::new(cx + dist * angle.cos(), cy + dist * angle.sin());
            let r = full(ElementaryCurve::Circle(&circle)).perform(&p);
            prop_assert_eq!(r.nb_ext().unwrap(), 2);
            for e in r.extrema() {
                let expected = if e.is_min {
                    (dist - radius).powi(2)
                } else {
                    (dist + radius).powi(2)
                };
                prop_assert!((e.square_distance - expected).abs() < 1e-8 * (1.0 + expected));
                let d = (e.point.value() - p).norm_squared();
                prop_assert!((d - e.square_distance).abs() < 1e-9);
            }
            let u0 = r.extrema()[0].point.parameter();
            let u1 = r.extrema()[1].point.parameter();
            prop_assert!(((u0 - u1).abs() - PI).abs() < 1e-9);
        }
    }
}
