use std::f64::consts::TAU;

use tracing::{debug, instrument, trace};

use crate::geometry::{Curve, CurveType, ElementaryCurve};
use crate::math::precision::{in_period, is_infinite, CONFUSION, PCONFUSION};

use super::elementary_pair::ExtremaElementaryPair2d;
use super::sampled_pair::SampledCurveCurve;
use super::{CurveCurveExtrema, CurveCurveExtremum, PointOnCurve, TrimmedCorners};

/// How a pair of elementary curves is solved in closed form.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClosedForm {
    /// Solve with the curves exchanged, then exchange the results back.
    inverse: bool,
    /// Period of each parameter, `0` when not periodic.
    period1: f64,
    period2: f64,
}

/// Picks the closed-form solver for a pair of curve types, if there is one.
///
/// Curves are ranked line, circle, then the other conics; the solver wants
/// the lower rank first. Two conics of the last rank have no closed form.
fn closed_form(t1: CurveType, t2: CurveType) -> Option<ClosedForm> {
    fn rank(t: CurveType) -> Option<u8> {
        match t {
            CurveType::Line => Some(0),
            CurveType::Circle => Some(1),
            CurveType::Ellipse | CurveType::Parabola | CurveType::Hyperbola => Some(2),
            _ => None,
        }
    }
    fn period(t: CurveType) -> f64 {
        if matches!(t, CurveType::Circle | CurveType::Ellipse) { TAU } else { 0.0 }
    }

    let (r1, r2) = (rank(t1)?, rank(t2)?);
    if r1 == 2 && r2 == 2 {
        return None;
    }
    Some(ClosedForm {
        inverse: r1 > r2,
        period1: period(t1),
        period2: period(t2),
    })
}

/// Extrema of the distance between two planar curves on parameter ranges.
///
/// Lines and conics go to the closed-form solver when the pair has one;
/// every other pair is sampled and refined numerically. Closed-form
/// parameters of periodic curves are folded into the requested ranges
/// before filtering.
///
/// # Examples
///
/// ```
/// use geolis_extrema::geometry::{Circle, Line, Placement};
/// use geolis_extrema::math::{Point2, Vector2};
/// use geolis_extrema::operations::extrema::ExtremaCurveCurve2d;
///
/// let line = Line::new(Point2::origin(), Vector2::x()).unwrap();
/// let circle = Circle::new(Placement::at(Point2::new(0.0, 5.0)), 2.0).unwrap();
/// let r = ExtremaCurveCurve2d::new(&line, &circle).perform();
/// let nearest = (0..r.nb_ext().unwrap())
///     .map(|n| r.square_distance(n).unwrap())
///     .fold(f64::INFINITY, f64::min);
/// assert!((nearest - 9.0).abs() < 1e-12);
/// ```
pub struct ExtremaCurveCurve2d<'a, C1: Curve<2> + ?Sized, C2: Curve<2> + ?Sized> {
    c1: &'a C1,
    c2: &'a C2,
    range1: (f64, f64),
    range2: (f64, f64),
    tol1: f64,
    tol2: f64,
}

impl<'a, C1, C2> ExtremaCurveCurve2d<'a, C1, C2>
where
    C1: Curve<2> + ?Sized,
    C2: Curve<2> + ?Sized,
{
    /// Creates a solver over the natural domains of both curves.
    #[must_use]
    pub fn new(c1: &'a C1, c2: &'a C2) -> Self {
        Self {
            c1,
            c2,
            range1: (c1.first_parameter(), c1.last_parameter()),
            range2: (c2.first_parameter(), c2.last_parameter()),
            tol1: c1.resolution(CONFUSION),
            tol2: c2.resolution(CONFUSION),
        }
    }

    /// Restricts the search to `[u11, u12] x [u21, u22]`.
    #[must_use]
    pub fn with_ranges(mut self, u11: f64, u12: f64, u21: f64, u22: f64) -> Self {
        self.range1 = (u11.min(u12), u11.max(u12));
        self.range2 = (u21.min(u22), u21.max(u22));
        self
    }

    /// Sets the parametric tolerances of the numeric solver.
    #[must_use]
    pub fn with_tolerances(mut self, tol1: f64, tol2: f64) -> Self {
        self.tol1 = tol1;
        self.tol2 = tol2;
        self
    }

    /// Computes the extrema within the ranges, with the trimmed corner
    /// distances attached.
    #[instrument(skip_all, fields(c1 = ?self.c1.curve_type(), c2 = ?self.c2.curve_type()))]
    pub fn perform(&self) -> CurveCurveExtrema {
        let trimmed = self.trimmed_corners();
        let elementary = self.c1.kind().as_elementary().zip(self.c2.kind().as_elementary());
        let result = match elementary {
            Some((e1, e2)) => match closed_form(e1.curve_type(), e2.curve_type()) {
                Some(form) => self.perform_closed_form(e1, e2, form),
                None => self.perform_sampled(),
            },
            None => self.perform_sampled(),
        };
        result.with_trimmed(trimmed)
    }

    fn perform_closed_form(
        &self,
        e1: ElementaryCurve<'_, 2>,
        e2: ElementaryCurve<'_, 2>,
        form: ClosedForm,
    ) -> CurveCurveExtrema {
        let result = if form.inverse {
            ExtremaElementaryPair2d::new(e2, e1).perform().swapped()
        } else {
            ExtremaElementaryPair2d::new(e1, e2).perform()
        };
        if !result.is_done() || result.parallel_square_distance().is_some() {
            return result;
        }
        let extrema: Vec<CurveCurveExtremum> = result
            .into_extrema()
            .into_iter()
            .filter_map(|e| self.fold_into_ranges(e, form))
            .collect();
        debug!(nb_ext = extrema.len(), inverse = form.inverse, "closed-form extrema");
        CurveCurveExtrema::done(extrema)
    }

    fn perform_sampled(&self) -> CurveCurveExtrema {
        trace!("no closed form, sampling");
        SampledCurveCurve::new(self.c1, self.c2)
            .with_ranges(self.range1.0, self.range1.1, self.range2.0, self.range2.1)
            .with_tolerances(self.tol1, self.tol2)
            .perform()
    }

    /// Folds periodic parameters to start at the range lower bounds and
    /// drops extrema outside the ranges.
    fn fold_into_ranges(
        &self,
        e: CurveCurveExtremum,
        form: ClosedForm,
    ) -> Option<CurveCurveExtremum> {
        let u = fold(e.point1.parameter(), form.period1, self.range1.0);
        let v = fold(e.point2.parameter(), form.period2, self.range2.0);
        if !within(u, self.range1) || !within(v, self.range2) {
            trace!(u, v, "extremum outside the ranges");
            return None;
        }
        Some(CurveCurveExtremum {
            point1: PointOnCurve::new(u, *e.point1.value()),
            point2: PointOnCurve::new(v, *e.point2.value()),
            ..e
        })
    }

    fn trimmed_corners(&self) -> Option<TrimmedCorners> {
        let (u1, u2) = self.range1;
        let (v1, v2) = self.range2;
        if [u1, u2, v1, v2].into_iter().any(is_infinite) {
            return None;
        }
        let (p11, p12) = (self.c1.value(u1), self.c1.value(u2));
        let (p21, p22) = (self.c2.value(v1), self.c2.value(v2));
        Some(TrimmedCorners {
            d11: (p11 - p21).norm_squared(),
            d12: (p11 - p22).norm_squared(),
            d21: (p12 - p21).norm_squared(),
            d22: (p12 - p22).norm_squared(),
            p11,
            p12,
            p21,
            p22,
        })
    }
}

fn fold(u: f64, period: f64, first: f64) -> f64 {
    if period > 0.0 && !is_infinite(first) {
        in_period(u, first, first + period)
    } else {
        u
    }
}

fn within(u: f64, (lo, hi): (f64, f64)) -> bool {
    u >= lo - PCONFUSION && u <= hi + PCONFUSION
}
