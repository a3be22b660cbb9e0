use std::f64::consts::FRAC_PI_2;

use tracing::{debug, instrument, trace};

use crate::geometry::curve::finite_window;
use crate::geometry::{BSplineCurve, BezierCurve, Continuity, Curve, CurveKind};
use crate::math::precision::{in_period, is_infinite, CONFUSION, PCONFUSION, SQUARE_CONFUSION};
use crate::math::Point;

use super::point_elementary::ExtremaPointElementary;
use super::sampled::SampledPointCurve;
use super::{PointCurveExtrema, PointExtremum, PointOnCurve, SearchMode, TrimmedSquareDistances};

/// Samples per interval for offset and user curves.
const NB_SAMPLES_PER_INTERVAL: usize = 17;

/// Cumulative tangent turning that closes a deflection interval.
const MAX_TURNING: f64 = FRAC_PI_2;

/// Tangent probes used to split a smooth curve by deflection.
const NB_TURNING_PROBES: usize = 64;

/// Extrema of the distance from a point to a trimmed curve.
///
/// Lines and conics are solved in closed form. Other curves are cut into
/// intervals (spline spans, continuity breakpoints, deflection pieces) and
/// each interval is searched numerically; solutions closer than `tol_u` in
/// parameter are merged. Trim ends lying on the point are reported as
/// minima. The [`SearchMode`] selects minima, maxima or both.
pub struct ExtremaPointCurve<'a, const D: usize, C: Curve<D> + ?Sized> {
    curve: &'a C,
    uinf: f64,
    usup: f64,
    tol_u: f64,
    tol_f: f64,
    mode: SearchMode,
}

/// Accumulated result of the interval searches.
#[derive(Debug)]
struct Search<const D: usize> {
    extrema: Vec<PointExtremum<D>>,
    done: bool,
}

impl<const D: usize> Search<D> {
    fn new() -> Self {
        Self {
            extrema: Vec::new(),
            done: false,
        }
    }

    /// Appends `candidate` unless a solution within `tol_u` is known.
    fn add_sol(&mut self, candidate: PointExtremum<D>, tol_u: f64) {
        let t = candidate.point.parameter();
        if self.contains(t, tol_u) {
            trace!(t, "duplicate solution");
            return;
        }
        self.extrema.push(candidate);
    }

    fn contains(&self, t: f64, tol_u: f64) -> bool {
        self.extrema.iter().any(|e| (e.point.parameter() - t).abs() <= tol_u)
    }
}

impl<'a, const D: usize, C: Curve<D> + ?Sized> ExtremaPointCurve<'a, D, C> {
    /// Creates a solver for `curve` trimmed to `[uinf, usup]`.
    #[must_use]
    pub fn new(curve: &'a C, uinf: f64, usup: f64) -> Self {
        Self {
            curve,
            uinf: uinf.min(usup),
            usup: uinf.max(usup),
            tol_u: curve.resolution(CONFUSION),
            tol_f: CONFUSION,
            mode: SearchMode::default(),
        }
    }

    /// Creates a solver over the natural domain of `curve`.
    #[must_use]
    pub fn over_domain(curve: &'a C) -> Self {
        Self::new(curve, curve.first_parameter(), curve.last_parameter())
    }

    /// Sets the parametric tolerance `tol_u` and the residual tolerance
    /// `tol_f`.
    #[must_use]
    pub fn with_tolerances(mut self, tol_u: f64, tol_f: f64) -> Self {
        self.tol_u = tol_u;
        self.tol_f = tol_f;
        self
    }

    /// Selects which extrema are reported.
    #[must_use]
    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Computes the extrema for `point`.
    #[instrument(
        skip_all,
        fields(curve = ?self.curve.curve_type(), uinf = self.uinf, usup = self.usup)
    )]
    pub fn perform(&self, point: &Point<D>) -> PointCurveExtrema<D> {
        self.search(point).filtered(self.mode)
    }

    /// Computes the extrema for `point`, counting the finite trim ends as
    /// extrema too.
    ///
    /// An end is a minimum when the distance grows into the range and a
    /// maximum when it shrinks. An end already found is not repeated, and a
    /// range spanning a whole period of a periodic curve has no ends.
    #[instrument(
        skip_all,
        fields(curve = ?self.curve.curve_type(), uinf = self.uinf, usup = self.usup)
    )]
    pub fn perform_with_endpoints(&self, point: &Point<D>) -> PointCurveExtrema<D> {
        let mut result = self.search(point);
        if !result.is_done() || self.spans_period() {
            return result.filtered(self.mode);
        }
        let (first, last) = self.domain_ends();
        for (u, inward) in [(first, 1.0), (last, -1.0)] {
            let known = result
                .extrema
                .iter()
                .any(|e| (e.point.parameter() - u).abs() <= self.tol_u);
            if is_infinite(u) || known {
                continue;
            }
            let (p, d1) = self.curve.d1(u);
            let end = PointExtremum {
                point: PointOnCurve::new(u, p),
                square_distance: (p - point).norm_squared(),
                is_min: inward * (p - point).dot(&d1) >= 0.0,
            };
            trace!(u, is_min = end.is_min, "trim end");
            if inward > 0.0 {
                result.extrema.insert(0, end);
            } else {
                result.extrema.push(end);
            }
        }
        result.filtered(self.mode)
    }

    /// Every extremum, whatever the search mode.
    fn search(&self, point: &Point<D>) -> PointCurveExtrema<D> {
        let kind = self.curve.kind();
        if let Some(elementary) = kind.as_elementary() {
            return ExtremaPointElementary::new(elementary, self.uinf, self.usup, self.tol_u)
                .perform(point)
                .with_trimmed(self.trimmed(point));
        }

        let (lo, hi) = self.clipped_range();
        if hi <= lo {
            debug!(lo, hi, "trim range misses the curve domain");
            return PointCurveExtrema::not_done();
        }

        let trimmed = self.trimmed(point);
        let mut search = Search::new();
        match kind {
            CurveKind::Bezier(bezier) => self.perform_bezier(bezier, point, &mut search),
            CurveKind::BSpline(bspline) => self.perform_bspline(bspline, point, &mut search),
            CurveKind::Offset(offset) => self.perform_by_intervals(offset, point, &mut search),
            _ => self.perform_by_intervals(self.curve, point, &mut search),
        }

        if !search.done {
            debug!("no interval search succeeded");
            return PointCurveExtrema::not_done().with_trimmed(trimmed);
        }
        if !matches!(kind, CurveKind::Bezier(_)) {
            self.add_trimmed_ends(&trimmed, &mut search);
        }
        debug!(nb_ext = search.extrema.len(), "point/curve extrema");
        PointCurveExtrema::done(search.extrema).with_trimmed(trimmed)
    }

    fn trimmed(&self, point: &Point<D>) -> TrimmedSquareDistances<D> {
        let mut trimmed = TrimmedSquareDistances::unbounded();
        if !is_infinite(self.uinf) {
            let p = self.curve.value(self.uinf);
            trimmed.first = (p - point).norm_squared();
            trimmed.first_point = Some(p);
        }
        if !is_infinite(self.usup) {
            let p = self.curve.value(self.usup);
            trimmed.last = (p - point).norm_squared();
            trimmed.last_point = Some(p);
        }
        trimmed
    }

    /// Inserts trim ends lying on the point: first end in front, last end
    /// at the back.
    fn add_trimmed_ends(&self, trimmed: &TrimmedSquareDistances<D>, search: &mut Search<D>) {
        if let Some(p) = trimmed.first_point {
            if trimmed.first < SQUARE_CONFUSION && !search.contains(self.uinf, self.tol_u) {
                trace!("first trim end lies on the point");
                search.extrema.insert(
                    0,
                    PointExtremum {
                        point: PointOnCurve::new(self.uinf, p),
                        square_distance: trimmed.first,
                        is_min: true,
                    },
                );
            }
        }
        if let Some(p) = trimmed.last_point {
            if trimmed.last < SQUARE_CONFUSION && !search.contains(self.usup, self.tol_u) {
                trace!("last trim end lies on the point");
                search.extrema.push(PointExtremum {
                    point: PointOnCurve::new(self.usup, p),
                    square_distance: trimmed.last,
                    is_min: true,
                });
            }
        }
    }

    fn period(&self) -> Option<f64> {
        self.curve.is_periodic().then(|| self.curve.period())
    }

    fn spans_period(&self) -> bool {
        self.period()
            .is_some_and(|period| self.usup - self.uinf >= period - PCONFUSION)
    }

    /// Trim range ends, clipped to the domain of a non-periodic curve.
    fn domain_ends(&self) -> (f64, f64) {
        if self.curve.is_periodic() {
            (self.uinf, self.usup)
        } else {
            (
                self.uinf.max(self.curve.first_parameter()),
                self.usup.min(self.curve.last_parameter()),
            )
        }
    }

    /// Folds a periodic parameter into `[uinf, uinf + T)`.
    fn fold(&self, u: f64) -> f64 {
        match self.period() {
            Some(period) => {
                let start = if is_infinite(self.uinf) {
                    self.curve.first_parameter()
                } else {
                    self.uinf
                };
                in_period(u, start, start + period)
            }
            None => u,
        }
    }

    /// Runs the sampled solver on `[lo, hi]` and merges what falls inside
    /// the trim range.
    fn interval_perform<K>(
        &self,
        curve: &K,
        point: &Point<D>,
        lo: f64,
        hi: f64,
        nb_sample: usize,
        search: &mut Search<D>,
    ) where
        K: Curve<D> + ?Sized,
    {
        let mut sampled = SampledPointCurve::new(curve);
        sampled.initialize(nb_sample, lo, hi, self.tol_u, self.tol_f);
        let result = sampled.perform(point);
        if !result.is_done() {
            trace!(lo, hi, "interval search failed");
            return;
        }
        search.done = true;
        for extremum in result.extrema() {
            let t = self.fold(extremum.point.parameter());
            if t < self.uinf - self.tol_u || t > self.usup + self.tol_u {
                trace!(t, "solution outside the trim range");
                continue;
            }
            search.add_sol(
                PointExtremum {
                    point: PointOnCurve::new(t, *extremum.point.value()),
                    ..*extremum
                },
                self.tol_u,
            );
        }
    }

    /// Trim range clipped to the domain of a non-periodic curve.
    fn clipped_range(&self) -> (f64, f64) {
        let (first, last) = (self.curve.first_parameter(), self.curve.last_parameter());
        if self.curve.is_periodic() {
            finite_window(self.uinf, self.usup)
        } else {
            finite_window(self.uinf.max(first), self.usup.min(last))
        }
    }

    fn perform_bezier(&self, bezier: &BezierCurve<D>, point: &Point<D>, search: &mut Search<D>) {
        let (lo, hi) = self.clipped_range();
        let nb_sample = 2 * bezier.nb_poles();
        trace!(nb_sample, "bezier");
        self.interval_perform(bezier, point, lo, hi, nb_sample, search);
    }

    fn perform_bspline(&self, bspline: &BSplineCurve<D>, point: &Point<D>, search: &mut Search<D>) {
        let (lo, hi) = self.clipped_range();
        let knot_tol = (hi - lo) * f64::EPSILON;
        let breaks = breakpoints(bspline.domain_knots(), self.period(), lo, hi, knot_tol);
        let sample = bspline.degree() + 1;
        trace!(nb_spans = breaks.len().saturating_sub(1), sample, "bspline");

        if sample == 2 {
            self.perform_polyline(bspline, point, &breaks, search);
            return;
        }

        // dense grid, sample points per span, shared span ends counted once
        let mut grid = vec![breaks[0]];
        for span in breaks.windows(2) {
            #[allow(clippy::cast_precision_loss)]
            let step = (span[1] - span[0]) / (sample - 1) as f64;
            #[allow(clippy::cast_precision_loss)]
            grid.extend((1..sample).map(|i| {
                if i + 1 == sample {
                    span[1]
                } else {
                    span[0] + step * i as f64
                }
            }));
        }
        let distances: Vec<f64> = grid
            .iter()
            .map(|&u| (bspline.value(u) - point).norm_squared())
            .collect();
        let last = grid.len() - 1;
        search.done = true;

        for (k, &u) in grid.iter().enumerate() {
            if distances[k] <= SQUARE_CONFUSION {
                search.add_sol(
                    PointExtremum {
                        point: PointOnCurve::new(self.fold(u), bspline.value(u)),
                        square_distance: distances[k],
                        is_min: true,
                    },
                    self.tol_u,
                );
            }
            if k == 0 || k == last {
                continue;
            }
            let (before, here, after) = (distances[k - 1], distances[k], distances[k + 1]);
            let local_min = here <= before && here <= after;
            let local_max = here >= before && here >= after;
            if local_min || local_max {
                self.interval_perform(bspline, point, grid[k - 1], grid[k + 1], 3, search);
            }
        }

        if last >= 1 {
            if self.end_interval_needs_refining(bspline, point, grid[0], grid[1]) {
                self.interval_perform(bspline, point, grid[0], grid[1], 3, search);
            }
            if self.end_interval_needs_refining(bspline, point, grid[last - 1], grid[last]) {
                self.interval_perform(bspline, point, grid[last - 1], grid[last], 3, search);
            }
        }
    }

    /// An end grid interval can hide an extremum that no discrete extremum
    /// reveals.
    fn end_interval_needs_refining(
        &self,
        bspline: &BSplineCurve<D>,
        point: &Point<D>,
        a: f64,
        b: f64,
    ) -> bool {
        let (pa, da) = bspline.d1(a);
        let (pb, db) = bspline.d1(b);
        let (va, vb) = (pa - point, pb - point);
        let (fa, fb) = (va.dot(&da), vb.dot(&db));
        fa * fb < 0.0
            || va.dot(&vb) < 0.0
            || 2.0 * fa.abs() < CONFUSION
            || 2.0 * fb.abs() < CONFUSION
    }

    /// Degree-1 splines: a span holds an extremum only where the
    /// projection of the point crosses its chord.
    fn perform_polyline(
        &self,
        bspline: &BSplineCurve<D>,
        point: &Point<D>,
        breaks: &[f64],
        search: &mut Search<D>,
    ) {
        search.done = true;
        for span in breaks.windows(2) {
            let (a, b) = (span[0], span[1]);
            let (pa, pb) = (bspline.value(a), bspline.value(b));
            let chord = pb - pa;
            let sa = (point - pa).dot(&chord);
            let sb = (point - pb).dot(&chord);
            let touches = (pa - point).norm_squared() < SQUARE_CONFUSION
                || (pb - point).norm_squared() < SQUARE_CONFUSION;
            if sa * sb < 0.0 || touches {
                trace!(a, b, "chord straddles the projection");
                // an interior knot evaluates on the next span
                let b = if b < breaks[breaks.len() - 1] { b - (b - a) * PCONFUSION } else { b };
                self.interval_perform(bspline, point, a, b, 2, search);
            }
        }
    }

    fn perform_by_intervals<K>(&self, curve: &K, point: &Point<D>, search: &mut Search<D>)
    where
        K: Curve<D> + ?Sized,
    {
        let (lo, hi) = self.clipped_range();
        let knot_tol = (hi - lo) * f64::EPSILON;
        let natural = curve.intervals(Continuity::C2);
        let mut breaks = breakpoints(&natural, self.period(), lo, hi, knot_tol);
        if breaks.len() == 2 {
            breaks = deflection_breakpoints(curve, lo, hi);
        }
        let nb_intervals = breaks.len() - 1;
        let nb_sample = (NB_SAMPLES_PER_INTERVAL / nb_intervals).max(NB_SAMPLES_PER_INTERVAL);
        trace!(nb_intervals, nb_sample, "interval split");

        for &t in &breaks[1..nb_intervals] {
            self.add_breakpoint_extremum(curve, point, t, search);
        }
        for span in breaks.windows(2) {
            self.interval_perform(curve, point, span[0], span[1], nb_sample, search);
        }
    }

    /// A sign change of the distance derivative across a breakpoint makes
    /// the breakpoint itself an extremum.
    fn add_breakpoint_extremum<K>(
        &self,
        curve: &K,
        point: &Point<D>,
        t: f64,
        search: &mut Search<D>,
    ) where
        K: Curve<D> + ?Sized,
    {
        let h = self.tol_u.max(1.0e-9 * (1.0 + t.abs()));
        let derivative = |u: f64| {
            let (p, d1) = curve.d1(u);
            (p - point).dot(&d1)
        };
        let (left, right) = (derivative(t - h), derivative(t + h));
        if left * right < 0.0 {
            let value = curve.value(t);
            trace!(t, "extremum at a breakpoint");
            search.add_sol(
                PointExtremum {
                    point: PointOnCurve::new(self.fold(t), value),
                    square_distance: (value - point).norm_squared(),
                    is_min: left < 0.0,
                },
                self.tol_u,
            );
        }
    }
}

/// Span ends covering `[lo, hi]`: `natural` breakpoints of one period
/// (repeated every period for periodic curves) strictly inside the range,
/// plus both range ends.
fn breakpoints(natural: &[f64], period: Option<f64>, lo: f64, hi: f64, tol: f64) -> Vec<f64> {
    let mut breaks = vec![lo];
    let inside = |t: f64| t > lo + tol && t < hi - tol;
    match (period, natural.first()) {
        (Some(period), Some(&first)) if period > 0.0 => {
            let period_jump = ((lo - first) / period).floor() * period;
            let one_period = &natural[..natural.len() - 1];
            let mut shift = period_jump;
            while first + shift < hi {
                breaks.extend(one_period.iter().map(|k| k + shift).filter(|&t| inside(t)));
                shift += period;
            }
        }
        _ => breaks.extend(natural.iter().copied().filter(|&t| inside(t))),
    }
    breaks.push(hi);
    breaks
}

/// Splits `[lo, hi]` where the tangent has turned by [`MAX_TURNING`].
fn deflection_breakpoints<const D: usize, K>(curve: &K, lo: f64, hi: f64) -> Vec<f64>
where
    K: Curve<D> + ?Sized,
{
    #[allow(clippy::cast_precision_loss)]
    let step = (hi - lo) / NB_TURNING_PROBES as f64;
    let mut breaks = vec![lo];
    let mut turning = 0.0;
    let mut previous = curve.d1(lo).1;
    for i in 1..NB_TURNING_PROBES {
        #[allow(clippy::cast_precision_loss)]
        let u = lo + step * i as f64;
        let tangent = curve.d1(u).1;
        let (n0, n1) = (previous.norm(), tangent.norm());
        if n0 > 0.0 && n1 > 0.0 {
            turning += (previous.dot(&tangent) / (n0 * n1)).clamp(-1.0, 1.0).acos();
        }
        if turning >= MAX_TURNING {
            breaks.push(u);
            turning = 0.0;
        }
        previous = tangent;
    }
    breaks.push(hi);
    breaks
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{AnyCurve, Circle, Line, OffsetCurve, Parabola, Placement};
    use crate::math::precision::INFINITE;
    use crate::math::{Point2, Point3, Vector2, Vector3};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::f64::consts::{PI, TAU};

    fn polyline() -> BSplineCurve<2> {
        BSplineCurve::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 2.0),
                Point2::new(4.0, 2.0),
            ],
            vec![0.0, 1.0, 2.0, 3.0],
            vec![2, 1, 1, 2],
            1,
        )
        .unwrap()
    }

    fn closed_quadratic() -> BSplineCurve<2> {
        BSplineCurve::periodic(
            vec![
                Point2::new(-1.0, -1.0),
                Point2::new(1.0, -1.0),
                Point2::new(1.0, 1.0),
                Point2::new(-1.0, 1.0),
            ],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![1, 1, 1, 1, 1],
            2,
        )
        .unwrap()
    }

    #[test]
    fn point_against_circle_in_space() {
        let center = Point3::new(10.0, 0.0, 0.0);
        let frame = Placement::from_normal(center, Vector3::z(), Vector3::x()).unwrap();
        let circle = Circle::new(frame, 5.0).unwrap();
        let r = ExtremaPointCurve::new(&circle, 0.0, TAU).perform(&Point3::origin());
        assert_eq!(r.nb_ext().unwrap(), 2);
        let mut distances: Vec<f64> = r.extrema().iter().map(|e| e.square_distance).collect();
        distances.sort_by(f64::total_cmp);
        assert_abs_diff_eq!(distances[0], 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(distances[1], 225.0, epsilon = 1e-9);
        let trimmed = r.trimmed_square_distances();
        assert_abs_diff_eq!(trimmed.first, 225.0, epsilon = 1e-9);
        assert_abs_diff_eq!(trimmed.last, 225.0, epsilon = 1e-9);
    }

    #[test]
    fn unbounded_line_has_no_trimmed_points() {
        let line = Line::new(Point2::origin(), Vector2::x()).unwrap();
        let r = ExtremaPointCurve::new(&line, -INFINITE, INFINITE).perform(&Point2::new(1.0, 1.0));
        assert_eq!(r.nb_ext().unwrap(), 1);
        assert!(r.trimmed_square_distances().first_point.is_none());
        assert!(r.trimmed_square_distances().last.is_infinite());
    }

    #[test]
    fn polyline_feet_per_span() {
        let curve = polyline();
        // perpendicular feet on the first and third segments, and the corner
        // region of the middle one
        let p = Point2::new(1.0, 1.0);
        let r = ExtremaPointCurve::over_domain(&curve).perform(&p);
        assert!(r.is_done());
        let minima: Vec<f64> = r
            .extrema()
            .iter()
            .filter(|e| e.is_min)
            .map(|e| e.point.parameter())
            .collect();
        assert!(minima.iter().any(|&u| (u - 0.5).abs() < 1e-7));
        assert!(minima.iter().any(|&u| (u - 1.5).abs() < 1e-7));
        for e in r.extrema() {
            let d = (e.point.value() - p).norm_squared();
            assert_abs_diff_eq!(d, e.square_distance, epsilon = 1e-12);
        }
    }

    #[test]
    fn polyline_skips_spans_without_projection() {
        let curve = polyline();
        let r = ExtremaPointCurve::over_domain(&curve).perform(&Point2::new(5.0, 3.0));
        assert_eq!(r.nb_ext().unwrap(), 0);
        // only the last segment sees the projection of this one
        let r = ExtremaPointCurve::over_domain(&curve).perform(&Point2::new(3.0, 3.0));
        assert_eq!(r.nb_ext().unwrap(), 1);
        assert_abs_diff_eq!(r.point(0).unwrap().parameter(), 2.5, epsilon = 1e-7);
    }

    #[test]
    fn trim_end_on_point_is_a_minimum() {
        let curve = polyline();
        let r = ExtremaPointCurve::over_domain(&curve).perform(&Point2::new(0.0, 0.0));
        let first = r.point(0).unwrap();
        assert_abs_diff_eq!(first.parameter(), 0.0, epsilon = 1e-9);
        assert!(r.is_min(0).unwrap());
        assert_abs_diff_eq!(r.square_distance(0).unwrap(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn periodic_spline_shifted_range() {
        let curve = closed_quadratic();
        let p = Point2::new(3.0, 0.0);
        let base = ExtremaPointCurve::new(&curve, 0.0, 4.0).perform(&p);
        let shifted = ExtremaPointCurve::new(&curve, 8.0, 12.0).perform(&p);
        assert_eq!(base.nb_ext().unwrap(), shifted.nb_ext().unwrap());
        for e in shifted.extrema() {
            let u = e.point.parameter();
            assert!((8.0 - 1e-7..=12.0 + 1e-7).contains(&u));
            let twin = base
                .extrema()
                .iter()
                .find(|b| {
                    let t = b.point.parameter();
                    (t + 8.0 - u).abs() < 1e-6 || (t + 12.0 - u).abs() < 1e-6
                });
            assert!(twin.is_some());
        }
        let nearest = shifted
            .extrema()
            .iter()
            .filter(|e| e.is_min)
            .map(|e| e.square_distance)
            .fold(f64::INFINITY, f64::min);
        assert!(nearest < 9.0);
    }

    #[test]
    fn offset_of_circle_behaves_like_larger_circle() {
        let circle = Circle::new(Placement::at(Point2::origin()), 1.0).unwrap();
        let offset = OffsetCurve::<2>::new(AnyCurve::from(circle), 1.0);
        let r = ExtremaPointCurve::new(&offset, 0.0, TAU).perform(&Point2::new(5.0, 0.0));
        let min = r.extrema().iter().find(|e| e.is_min).unwrap();
        assert_abs_diff_eq!(min.square_distance, 9.0, epsilon = 1e-8);
        let max = r
            .extrema()
            .iter()
            .find(|e| !e.is_min && (e.point.parameter() - PI).abs() < 1e-6)
            .unwrap();
        assert_abs_diff_eq!(max.square_distance, 49.0, epsilon = 1e-8);
    }

    #[test]
    fn clamped_spline_matches_bezier() {
        let poles = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 2.0),
            Point2::new(3.0, 2.0),
            Point2::new(4.0, 0.0),
        ];
        let bezier = BezierCurve::new(poles.clone()).unwrap();
        let bspline = BSplineCurve::new(poles, vec![0.0, 1.0], vec![4, 4], 3).unwrap();
        for p in [Point2::new(2.0, -2.0), Point2::new(2.0, 0.5), Point2::new(-1.0, 3.0)] {
            let a = ExtremaPointCurve::over_domain(&bezier).perform(&p);
            let b = ExtremaPointCurve::over_domain(&bspline).perform(&p);
            let params = |r: &PointCurveExtrema<2>| {
                let mut v: Vec<f64> = r.extrema().iter().map(|e| e.point.parameter()).collect();
                v.sort_by(f64::total_cmp);
                v
            };
            let (pa, pb) = (params(&a), params(&b));
            assert_eq!(pa.len(), pb.len());
            for (u, v) in pa.iter().zip(&pb) {
                assert_abs_diff_eq!(u, v, epsilon = 1e-7);
            }
        }
        // from below the apex center of curvature the apex is a maximum
        let r = ExtremaPointCurve::over_domain(&bezier).perform(&Point2::new(2.0, -2.0));
        let apex = r.extrema().iter().find(|e| (e.point.parameter() - 0.5).abs() < 1e-7).unwrap();
        assert!(!apex.is_min);
    }

    struct Wave;

    impl Curve<2> for Wave {
        fn first_parameter(&self) -> f64 {
            0.0
        }
        fn last_parameter(&self) -> f64 {
            TAU
        }
        fn value(&self, u: f64) -> Point2 {
            Point2::new(u, u.sin())
        }
        fn d1(&self, u: f64) -> (Point2, Vector2) {
            (self.value(u), Vector2::new(1.0, u.cos()))
        }
        fn d2(&self, u: f64) -> (Point2, Vector2, Vector2) {
            let (p, d1) = self.d1(u);
            (p, d1, Vector2::new(0.0, -u.sin()))
        }
        fn d3(&self, u: f64) -> (Point2, Vector2, Vector2, Vector2) {
            let (p, d1, d2) = self.d2(u);
            (p, d1, d2, Vector2::new(0.0, -u.cos()))
        }
    }

    #[test]
    fn user_curve_split_by_deflection() {
        let breaks = deflection_breakpoints(&Wave, 0.0, TAU);
        assert!(breaks.len() > 2);
        // seen from high above the crest is the nearest point
        let p = Point2::new(PI, 50.0);
        let r = ExtremaPointCurve::over_domain(&Wave).perform(&p);
        assert!(r.is_done());
        for e in r.extrema() {
            let (c, d1) = Wave.d1(e.point.parameter());
            assert_abs_diff_eq!((c - p).dot(&d1) / d1.norm(), 0.0, epsilon = 1e-7);
        }
        let nearest = r
            .extrema()
            .iter()
            .filter(|e| e.is_min)
            .map(|e| e.square_distance)
            .fold(f64::INFINITY, f64::min);
        let brute = (0..=10_000)
            .map(|i| (Wave.value(TAU * f64::from(i) / 10_000.0) - p).norm_squared())
            .fold(f64::INFINITY, f64::min);
        assert!(nearest <= brute + 1e-9);
    }

    #[test]
    fn fresh_instances_agree() {
        let curve = closed_quadratic();
        let p = Point2::new(0.2, -0.1);
        let a = ExtremaPointCurve::new(&curve, 0.0, 4.0).perform(&p);
        let b = ExtremaPointCurve::new(&curve, 0.0, 4.0).perform(&p);
        assert_eq!(a, b);
    }

    #[test]
    fn search_modes_on_a_circle() {
        let circle = Circle::new(Placement::at(Point2::origin()), 10.0).unwrap();
        let single = |p: Point2, mode: SearchMode| {
            let r = ExtremaPointCurve::over_domain(&circle).with_search_mode(mode).perform(&p);
            assert_eq!(r.nb_ext().unwrap(), 1);
            r.square_distance(0).unwrap()
        };
        assert_abs_diff_eq!(single(Point2::new(20.0, 0.0), SearchMode::Min), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(single(Point2::new(20.0, 0.0), SearchMode::Max), 900.0, epsilon = 1e-9);
        assert_abs_diff_eq!(single(Point2::new(3.0, 0.0), SearchMode::Min), 49.0, epsilon = 1e-9);
        assert_abs_diff_eq!(single(Point2::new(3.0, 0.0), SearchMode::Max), 169.0, epsilon = 1e-9);

        // a whole circle has no trim ends
        let p = Point2::new(15.0, 0.0);
        let all = ExtremaPointCurve::over_domain(&circle);
        assert_eq!(all.perform(&p).nb_ext().unwrap(), 2);
        assert_eq!(all.perform_with_endpoints(&p), all.perform(&p));
    }

    #[test]
    fn quarter_arc_maxima_are_its_ends() {
        let circle = Circle::new(Placement::at(Point2::origin()), 10.0).unwrap();
        let p = Point2::new(15.0, 15.0);
        let arc = ExtremaPointCurve::new(&circle, 0.0, FRAC_PI_2).with_search_mode(SearchMode::Max);
        assert_eq!(arc.perform(&p).nb_ext().unwrap(), 0);
        let r = arc.perform_with_endpoints(&p);
        assert_eq!(r.nb_ext().unwrap(), 2);
        assert_abs_diff_eq!(r.point(0).unwrap().parameter(), 0.0);
        assert_abs_diff_eq!(r.point(1).unwrap().parameter(), FRAC_PI_2);
        for e in r.extrema() {
            assert!(!e.is_min);
            assert_abs_diff_eq!(e.square_distance, 250.0, epsilon = 1e-9);
        }
        let nearest = ExtremaPointCurve::new(&circle, 0.0, FRAC_PI_2)
            .with_search_mode(SearchMode::Min)
            .perform_with_endpoints(&p);
        assert_eq!(nearest.nb_ext().unwrap(), 1);
        assert_abs_diff_eq!(nearest.point(0).unwrap().parameter(), PI / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn segment_ends_are_the_farthest_points() {
        let line = Line::new(Point2::origin(), Vector2::x()).unwrap();
        let p = Point2::new(0.0, 10.0);
        let farthest = ExtremaPointCurve::new(&line, -50.0, 50.0).with_search_mode(SearchMode::Max);
        assert_eq!(farthest.perform(&p).nb_ext().unwrap(), 0);
        let r = farthest.perform_with_endpoints(&p);
        assert_eq!(r.nb_ext().unwrap(), 2);
        assert_abs_diff_eq!(r.point(0).unwrap().parameter(), -50.0);
        assert_abs_diff_eq!(r.point(1).unwrap().parameter(), 50.0);
        for e in r.extrema() {
            assert!(!e.is_min);
            assert_abs_diff_eq!(e.square_distance, 2600.0, epsilon = 1e-9);
        }
        let r = ExtremaPointCurve::new(&line, -50.0, 50.0).perform_with_endpoints(&p);
        assert_eq!(r.nb_ext().unwrap(), 3);
        assert!(r.is_min(1).unwrap());
        assert_abs_diff_eq!(r.square_distance(1).unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn parabola_maxima_sit_at_the_trim_ends() {
        let parabola = Parabola::new(Placement::at(Point2::origin()), 5.0).unwrap();
        let p = Point2::new(0.0, 5.0);
        let r = ExtremaPointCurve::new(&parabola, -20.0, 20.0)
            .with_search_mode(SearchMode::Max)
            .perform_with_endpoints(&p);
        assert_eq!(r.nb_ext().unwrap(), 2);
        for e in r.extrema() {
            assert!(!e.is_min);
            assert_abs_diff_eq!(e.point.parameter().abs(), 20.0, epsilon = 1e-12);
            let d = (parabola.value(e.point.parameter()) - p).norm_squared();
            assert_abs_diff_eq!(d, e.square_distance, epsilon = 1e-9);
        }
    }

    #[test]
    fn range_outside_the_domain_is_not_done() {
        let p = Point2::new(1.0, 1.0);
        let r = ExtremaPointCurve::new(&polyline(), 5.0, 8.0).perform(&p);
        assert!(!r.is_done());
        assert!(r.trimmed_square_distances().first_point.is_none());
        let bezier = BezierCurve::new(vec![Point2::origin(), Point2::new(1.0, 1.0)]).unwrap();
        assert!(!ExtremaPointCurve::new(&bezier, 2.0, 3.0).perform(&p).is_done());
        assert!(!ExtremaPointCurve::new(&Wave, 10.0, 20.0).perform(&p).is_done());
        assert!(!ExtremaPointCurve::new(&Wave, 10.0, 20.0).perform_with_endpoints(&p).is_done());
    }

    /// Quadratic spline, C1 at its interior knot `u = 1`, whose top lies at
    /// the knot.
    fn c1_cap() -> BSplineCurve<2> {
        BSplineCurve::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(3.0, 1.0),
                Point2::new(4.0, 0.0),
            ],
            vec![0.0, 1.0, 2.0],
            vec![3, 1, 3],
            2,
        )
        .unwrap()
    }

    #[test]
    fn offset_extremum_at_a_breakpoint() {
        let offset = OffsetCurve::<2>::new(AnyCurve::from(c1_cap()), 0.5);
        let p = Point2::new(2.0, 5.0);
        let top = offset.value(1.0);
        assert_abs_diff_eq!(top.x, 2.0, epsilon = 1e-12);

        let solver = ExtremaPointCurve::over_domain(&offset);
        let mut search = Search::new();
        solver.add_breakpoint_extremum(&offset, &p, 1.0, &mut search);
        assert_eq!(search.extrema.len(), 1);
        assert!(search.extrema[0].is_min);
        assert_abs_diff_eq!(search.extrema[0].point.parameter(), 1.0);

        // no sign change of the distance derivative across the knot
        let mut search = Search::new();
        solver.add_breakpoint_extremum(&offset, &Point2::new(0.0, 5.0), 1.0, &mut search);
        assert!(search.extrema.is_empty());

        let r = solver.perform(&p);
        let at_knot: Vec<&PointExtremum<2>> = r
            .extrema()
            .iter()
            .filter(|e| (e.point.parameter() - 1.0).abs() < 1e-7)
            .collect();
        assert_eq!(at_knot.len(), 1);
        assert!(at_knot[0].is_min);
        assert_abs_diff_eq!(at_knot[0].square_distance, (top - p).norm_squared(), epsilon = 1e-12);
    }

    #[test]
    fn end_interval_with_vanishing_derivative_is_refined() {
        let poles = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 2.0),
            Point2::new(3.0, 2.0),
            Point2::new(4.0, 0.0),
        ];
        let curve = BSplineCurve::new(poles, vec![0.0, 1.0], vec![4, 4], 3).unwrap();
        // on the normal at the first end, which is a minimum
        let p = Point2::new(2.0, -1.0);
        let solver = ExtremaPointCurve::over_domain(&curve);
        assert!(solver.end_interval_needs_refining(&curve, &p, 0.0, 1.0 / 3.0));
        let off_normal = Point2::new(2.0, -2.0);
        assert!(!solver.end_interval_needs_refining(&curve, &off_normal, 0.0, 1.0 / 3.0));

        let r = solver.perform(&p);
        let first = r.extrema().iter().find(|e| e.point.parameter().abs() < 1e-9).unwrap();
        assert!(first.is_min);
        assert_abs_diff_eq!(first.square_distance, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn breakpoints_repeat_over_periods() {
        let breaks = breakpoints(&[0.0, 1.0, 2.0], Some(2.0), 3.5, 6.5, 1e-12);
        assert_eq!(breaks, vec![3.5, 4.0, 5.0, 6.0, 6.5]);
        let breaks = breakpoints(&[0.0, 1.0, 2.0], None, 0.5, 2.0, 1e-12);
        assert_eq!(breaks, vec![0.5, 1.0, 2.0]);
    }

    proptest! {
        #[test]
        fn distances_are_consistent(px in -2.0..6.0f64, py in -2.0..4.0f64) {
            let curve = polyline();
            let p = Point2::new(px, py);
            let r = ExtremaPointCurve::over_domain(&curve).perform(&p);
            prop_assert!(r.is_done());
            let params: Vec<f64> = r.extrema().iter().map(|e| e.point.parameter()).collect();
            for (i, a) in params.iter().enumerate() {
                for b in &params[i + 1..] {
                    prop_assert!((a - b).abs() > curve.resolution(CONFUSION));
                }
            }
            for e in r.extrema() {
                let d = (curve.value(e.point.parameter()) - p).norm_squared();
                prop_assert!((d - e.square_distance).abs() < SQUARE_CONFUSION.max(1e-12 * d));
            }
        }
    }
}
