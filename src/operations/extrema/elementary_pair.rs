use std::f64::consts::TAU;

use tracing::{debug, instrument, trace};

use crate::geometry::curve::UNBOUNDED;
use crate::geometry::{Circle, Curve, ElementaryCurve, Hyperbola, Line, Parabola};
use crate::math::precision::{ANGULAR, CONFUSION, PCONFUSION};
use crate::math::roots::{polynomial_roots, Roots, TrigEquation};
use crate::math::{Point2, Vector2};

use super::point_elementary::ExtremaPointElementary;
use super::{is_pair_min, CurveCurveExtrema, CurveCurveExtremum, PointOnCurve};

/// Closed-form extrema of the distance between two planar lines or conics.
///
/// Pairs are accepted with the first curve of lower rank in the order line,
/// circle, then the other conics: line/any, circle/circle and
/// circle/ellipse, parabola or hyperbola. Any other order, or two non-circle
/// conics, is not done. Parameters are left in the natural domains: circle
/// and ellipse angles in `[0, 2π)`.
#[derive(Debug, Clone, Copy)]
pub struct ExtremaElementaryPair2d<'a> {
    c1: ElementaryCurve<'a, 2>,
    c2: ElementaryCurve<'a, 2>,
}

impl<'a> ExtremaElementaryPair2d<'a> {
    /// Creates a solver for the pair `(c1, c2)`.
    #[must_use]
    pub fn new(c1: ElementaryCurve<'a, 2>, c2: ElementaryCurve<'a, 2>) -> Self {
        Self { c1, c2 }
    }

    /// Returns `true` if the pair is in an order this solver accepts.
    #[must_use]
    pub fn supports(c1: &ElementaryCurve<'_, 2>, c2: &ElementaryCurve<'_, 2>) -> bool {
        match (c1, c2) {
            (ElementaryCurve::Line(_), _) => true,
            (ElementaryCurve::Circle(_), other) => !matches!(other, ElementaryCurve::Line(_)),
            _ => false,
        }
    }

    /// Computes the extrema, or reports parallel curves.
    #[instrument(skip_all, fields(c1 = ?self.c1.curve_type(), c2 = ?self.c2.curve_type()))]
    pub fn perform(&self) -> CurveCurveExtrema {
        let pairs = match (self.c1, self.c2) {
            (ElementaryCurve::Line(l1), ElementaryCurve::Line(l2)) => return line_line(l1, l2),
            (ElementaryCurve::Line(line), conic) => line_conic(line, conic),
            (ElementaryCurve::Circle(c1), ElementaryCurve::Circle(c2)) => {
                return circle_circle(c1, c2);
            }
            (
                ElementaryCurve::Circle(circle),
                conic @ (ElementaryCurve::Ellipse(_)
                | ElementaryCurve::Parabola(_)
                | ElementaryCurve::Hyperbola(_)),
            ) => match circle_conic(circle, conic) {
                CircleConic::Pairs(pairs) => pairs,
                CircleConic::Parallel(sqd) => return CurveCurveExtrema::parallel(sqd),
                CircleConic::Failed => return CurveCurveExtrema::not_done(),
            },
            _ => {
                debug!("unsupported pair order");
                return CurveCurveExtrema::not_done();
            }
        };
        self.collect(pairs)
    }

    fn collect(&self, pairs: Vec<(f64, f64)>) -> CurveCurveExtrema {
        let (curve1, curve2) = (self.c1.as_curve(), self.c2.as_curve());
        let mut extrema: Vec<CurveCurveExtremum> = Vec::with_capacity(pairs.len());
        for (u, v) in pairs {
            let duplicate = extrema.iter().any(|e| {
                (e.point1.parameter() - u).abs() <= PCONFUSION
                    && (e.point2.parameter() - v).abs() <= PCONFUSION
            });
            if duplicate {
                trace!(u, v, "duplicate pair");
                continue;
            }
            let (p1, p2) = (curve1.value(u), curve2.value(v));
            extrema.push(CurveCurveExtremum {
                point1: PointOnCurve::new(u, p1),
                point2: PointOnCurve::new(v, p2),
                square_distance: (p1 - p2).norm_squared(),
                is_min: is_pair_min(curve1, curve2, u, v),
            });
        }
        debug!(nb_ext = extrema.len(), "elementary pair extrema");
        CurveCurveExtrema::done(extrema)
    }
}

/// Angle in `[0, 2π)`, with values a hair below `2π` snapped to `0`.
fn normalize_angle(v: f64) -> f64 {
    let v = v.rem_euclid(TAU);
    if TAU - v <= PCONFUSION { 0.0 } else { v }
}

/// Angle of direction `dir` in the frame of a circle.
fn circle_angle(circle: &Circle<2>, dir: &Vector2) -> f64 {
    let position = circle.position();
    normalize_angle(dir.dot(position.y_dir()).atan2(dir.dot(position.x_dir())))
}

fn line_line(l1: &Line<2>, l2: &Line<2>) -> CurveCurveExtrema {
    let (d1, d2) = (l1.direction(), l2.direction());
    let w = l2.origin() - l1.origin();
    let cross = d1.perp(d2);
    if cross.abs() <= ANGULAR {
        let gap = w.perp(d1);
        trace!(gap, "parallel lines");
        return CurveCurveExtrema::parallel(gap * gap);
    }
    let u = w.perp(d2) / cross;
    let v = w.perp(d1) / cross;
    let (p1, p2) = (l1.value(u), l2.value(v));
    CurveCurveExtrema::done(vec![CurveCurveExtremum {
        point1: PointOnCurve::new(u, p1),
        point2: PointOnCurve::new(v, p2),
        square_distance: (p1 - p2).norm_squared(),
        is_min: true,
    }])
}

/// Conic parameters where the tangent is parallel to the line, then those
/// where the conic crosses it, each paired with its foot on the line.
fn line_conic(line: &Line<2>, conic: ElementaryCurve<'_, 2>) -> Vec<(f64, f64)> {
    let d = *line.direction();
    let n = Vector2::new(-d.y, d.x);
    let origin = *line.origin();

    let params: Vec<f64> = match conic {
        ElementaryCurve::Line(_) => Vec::new(),
        ElementaryCurve::Circle(circle) => {
            let p = circle.position();
            trig_line_conic(
                circle.radius(),
                circle.radius(),
                n.dot(p.x_dir()),
                n.dot(p.y_dir()),
                n.dot(&(p.origin() - origin)),
            )
        }
        ElementaryCurve::Ellipse(ellipse) => {
            let p = ellipse.position();
            trig_line_conic(
                ellipse.major_radius(),
                ellipse.minor_radius(),
                n.dot(p.x_dir()),
                n.dot(p.y_dir()),
                n.dot(&(p.origin() - origin)),
            )
        }
        ElementaryCurve::Parabola(parabola) => parabola_line(parabola, &n, &origin),
        ElementaryCurve::Hyperbola(hyperbola) => hyperbola_line(hyperbola, &n, &origin),
    };

    params
        .into_iter()
        .map(|v| {
            let u = (conic.value(v) - origin).dot(&d);
            (u, v)
        })
        .collect()
}

/// Closed-conic case, `C(v) = O + a cos v X + b sin v Y`, with `nx = n·X`,
/// `ny = n·Y` and `e = n·(O - line origin)`.
fn trig_line_conic(a: f64, b: f64, nx: f64, ny: f64, e: f64) -> Vec<f64> {
    let tangent = TrigEquation {
        a: 0.0,
        b: 0.0,
        c: b * ny,
        d: -a * nx,
        e: 0.0,
    };
    let crossing = TrigEquation {
        a: 0.0,
        b: 0.0,
        c: a * nx,
        d: b * ny,
        e,
    };
    let mut params = Vec::new();
    for equation in [tangent, crossing] {
        if let Roots::Finite(roots) = equation.roots(0.0, TAU) {
            params.extend(roots.into_iter().map(normalize_angle));
        }
    }
    params
}

/// `C(v) = O + v²/(4f) X + v Y`.
fn parabola_line(parabola: &Parabola<2>, n: &Vector2, origin: &Point2) -> Vec<f64> {
    let p = parabola.position();
    let f = parabola.focal();
    let (nx, ny) = (n.dot(p.x_dir()), n.dot(p.y_dir()));
    let e = n.dot(&(p.origin() - origin));
    let mut params = polynomial_roots(&[ny, nx / (2.0 * f)]).values().to_vec();
    params.extend_from_slice(polynomial_roots(&[e, ny, nx / (4.0 * f)]).values());
    params
}

/// `C(v) = O + a cosh v X + b sinh v Y`, solved in `w = e^v > 0`.
fn hyperbola_line(hyperbola: &Hyperbola<2>, n: &Vector2, origin: &Point2) -> Vec<f64> {
    let p = hyperbola.position();
    let (a, b) = (hyperbola.major_radius(), hyperbola.minor_radius());
    let (nx, ny) = (n.dot(p.x_dir()), n.dot(p.y_dir()));
    let e = n.dot(&(p.origin() - origin));
    let sum = a * nx + b * ny;
    let diff = a * nx - b * ny;
    let tangent = polynomial_roots(&[-diff, 0.0, sum]);
    let crossing = polynomial_roots(&[diff, 2.0 * e, sum]);
    tangent
        .values()
        .iter()
        .chain(crossing.values())
        .filter(|&&w| w > 0.0)
        .map(|w| w.ln())
        .collect()
}

/// The four pairs of points on the line of centers.
fn circle_circle(c1: &Circle<2>, c2: &Circle<2>) -> CurveCurveExtrema {
    let axis = c2.center() - c1.center();
    let dist = axis.norm();
    if dist < CONFUSION {
        let gap = c1.radius() - c2.radius();
        trace!(gap, "concentric circles");
        return CurveCurveExtrema::parallel(gap * gap);
    }
    let e = axis / dist;
    let mut extrema = Vec::with_capacity(4);
    for s1 in [1.0, -1.0] {
        for s2 in [-1.0, 1.0] {
            let (dir1, dir2) = (e * s1, e * s2);
            let (u, v) = (circle_angle(c1, &dir1), circle_angle(c2, &dir2));
            let (p1, p2) = (c1.value(u), c2.value(v));
            extrema.push(CurveCurveExtremum {
                point1: PointOnCurve::new(u, p1),
                point2: PointOnCurve::new(v, p2),
                square_distance: (p1 - p2).norm_squared(),
                is_min: is_pair_min(c1, c2, u, v),
            });
        }
    }
    CurveCurveExtrema::done(extrema)
}

enum CircleConic {
    Pairs(Vec<(f64, f64)>),
    Parallel(f64),
    Failed,
}

/// Feet of the circle center on the conic, each seen from both circle
/// points on the normal through it.
fn circle_conic(circle: &Circle<2>, conic: ElementaryCurve<'_, 2>) -> CircleConic {
    let center = *circle.center();
    let (lo, hi) = match conic {
        ElementaryCurve::Circle(_) | ElementaryCurve::Ellipse(_) => (0.0, TAU),
        _ => UNBOUNDED,
    };
    let feet = ExtremaPointElementary::new(conic, lo, hi, PCONFUSION).perform(&center);
    if !feet.is_done() {
        if let ElementaryCurve::Ellipse(ellipse) = conic {
            // round ellipse around the circle center
            let gap = circle.radius() - ellipse.major_radius();
            return CircleConic::Parallel(gap * gap);
        }
        return CircleConic::Failed;
    }

    let mut pairs = Vec::with_capacity(2 * feet.extrema().len());
    for foot in feet.extrema() {
        let dir = foot.point.value() - center;
        let len = dir.norm();
        if len < CONFUSION {
            trace!(v = foot.point.parameter(), "circle center on the conic");
            continue;
        }
        let dir = dir / len;
        let v = match conic {
            ElementaryCurve::Ellipse(_) => normalize_angle(foot.point.parameter()),
            _ => foot.point.parameter(),
        };
        pairs.push((circle_angle(circle, &dir), v));
        pairs.push((circle_angle(circle, &-dir), v));
    }
    CircleConic::Pairs(pairs)
}
