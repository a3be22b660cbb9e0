use nalgebra::{Matrix2, Vector2};
use tracing::{debug, instrument, trace};

use crate::geometry::curve::finite_window;
use crate::geometry::{Curve, CurveKind};
use crate::math::line_search::{
    armijo_backtrack, brent_along_coordinate, brent_minimize, ArmijoParams, BrentParams,
    MultiVarFunction, MultiVarFunctionWithGradient,
};
use crate::math::precision::{in_period, is_infinite, CONFUSION, PCONFUSION, SQUARE_CONFUSION};
use crate::math::{DVector, Point2};

use super::{is_pair_min, CurveCurveExtrema, CurveCurveExtremum, PointOnCurve};

/// Grid density and refinement budget of [`SampledCurveCurve`].
#[derive(Debug, Clone, Copy)]
pub struct SampledParams {
    /// Samples on the first curve.
    pub nb_samples1: usize,
    /// Samples on the second curve.
    pub nb_samples2: usize,
    /// Maximum damped-Newton iterations per seed.
    pub max_iter: usize,
    /// Backtracking along each Newton direction.
    pub armijo: ArmijoParams,
    /// Coordinate polish after the descent.
    pub brent: BrentParams,
}

impl Default for SampledParams {
    fn default() -> Self {
        Self {
            nb_samples1: DEFAULT_NB_SAMPLES,
            nb_samples2: DEFAULT_NB_SAMPLES,
            max_iter: 50,
            armijo: ArmijoParams::default(),
            brent: BrentParams::default(),
        }
    }
}

const DEFAULT_NB_SAMPLES: usize = 32;

/// Relative determinant below which a Hessian is singular.
const DEGENERATE_HESSIAN: f64 = 1.0e-8;

/// Fraction of the first window travelled when checking a continuum of
/// minima.
const CONTINUUM_STEP: f64 = 0.05;

/// Relative margin added around the extent of the other curve when an
/// unbounded line is windowed.
const WINDOW_MARGIN: f64 = 0.1;

/// Default sample count: `2 * nb_poles` for splines with many poles.
fn default_nb_samples<C: Curve<2> + ?Sized>(curve: &C) -> usize {
    let nb_poles = match curve.kind() {
        CurveKind::Bezier(c) => c.nb_poles(),
        CurveKind::BSpline(c) => c.nb_poles(),
        _ => 0,
    };
    (2 * nb_poles).max(DEFAULT_NB_SAMPLES)
}

/// Squared distance between two curves as a function of `(u, v)`, defined
/// inside a parameter box only.
struct PairDistance<'a, C1: ?Sized, C2: ?Sized> {
    c1: &'a C1,
    c2: &'a C2,
    lo: [f64; 2],
    hi: [f64; 2],
}

impl<C1, C2> PairDistance<'_, C1, C2>
where
    C1: Curve<2> + ?Sized,
    C2: Curve<2> + ?Sized,
{
    fn contains(&self, x: &DVector) -> bool {
        (0..2).all(|k| x[k] >= self.lo[k] && x[k] <= self.hi[k])
    }

    /// Gradient and Hessian of `|C1(u) - C2(v)|²`.
    fn gradient_and_hessian(&self, u: f64, v: f64) -> (Vector2<f64>, Matrix2<f64>) {
        let (p1, d1, dd1) = self.c1.d2(u);
        let (p2, d2, dd2) = self.c2.d2(v);
        let diff = p1 - p2;
        let gradient = Vector2::new(diff.dot(&d1), -diff.dot(&d2)) * 2.0;
        let cross = -d1.dot(&d2);
        let hessian = Matrix2::new(
            d1.norm_squared() + diff.dot(&dd1),
            cross,
            cross,
            d2.norm_squared() - diff.dot(&dd2),
        ) * 2.0;
        (gradient, hessian)
    }
}

impl<C1, C2> MultiVarFunction for PairDistance<'_, C1, C2>
where
    C1: Curve<2> + ?Sized,
    C2: Curve<2> + ?Sized,
{
    fn nb_variables(&self) -> usize {
        2
    }

    fn value(&self, x: &DVector) -> Option<f64> {
        self.contains(x)
            .then(|| (self.c1.value(x[0]) - self.c2.value(x[1])).norm_squared())
    }
}

impl<C1, C2> MultiVarFunctionWithGradient for PairDistance<'_, C1, C2>
where
    C1: Curve<2> + ?Sized,
    C2: Curve<2> + ?Sized,
{
    fn gradient(&self, x: &DVector) -> Option<DVector> {
        if !self.contains(x) {
            return None;
        }
        let (g, _) = self.gradient_and_hessian(x[0], x[1]);
        Some(DVector::from_column_slice(g.as_slice()))
    }
}

/// Numeric minima of the distance between two planar curves.
///
/// Both ranges are sampled on a grid; every local minimum of the grid seeds
/// a damped Newton descent on the squared distance (Armijo backtracking,
/// steepest descent where the Hessian is not positive definite), followed by
/// a Brent polish along each parameter. Only stationary minima are reported.
/// When every minimum found lies on a continuum of minima at the same
/// distance the curves are reported parallel.
pub struct SampledCurveCurve<'a, C1: Curve<2> + ?Sized, C2: Curve<2> + ?Sized> {
    c1: &'a C1,
    c2: &'a C2,
    range1: (f64, f64),
    range2: (f64, f64),
    tol1: f64,
    tol2: f64,
    params: SampledParams,
}

impl<'a, C1, C2> SampledCurveCurve<'a, C1, C2>
where
    C1: Curve<2> + ?Sized,
    C2: Curve<2> + ?Sized,
{
    /// Creates a solver over the natural domains of both curves, with
    /// sample counts scaled to their poles.
    #[must_use]
    pub fn new(c1: &'a C1, c2: &'a C2) -> Self {
        let params = SampledParams {
            nb_samples1: default_nb_samples(c1),
            nb_samples2: default_nb_samples(c2),
            ..SampledParams::default()
        };
        Self {
            c1,
            c2,
            range1: (c1.first_parameter(), c1.last_parameter()),
            range2: (c2.first_parameter(), c2.last_parameter()),
            tol1: c1.resolution(CONFUSION),
            tol2: c2.resolution(CONFUSION),
            params,
        }
    }

    /// Restricts the search to `[u1, u2] x [v1, v2]`.
    #[must_use]
    pub fn with_ranges(mut self, u1: f64, u2: f64, v1: f64, v2: f64) -> Self {
        self.range1 = (u1.min(u2), u1.max(u2));
        self.range2 = (v1.min(v2), v1.max(v2));
        self
    }

    /// Sets the parametric tolerances used to merge solutions.
    #[must_use]
    pub fn with_tolerances(mut self, tol1: f64, tol2: f64) -> Self {
        self.tol1 = tol1;
        self.tol2 = tol2;
        self
    }

    /// Overrides the grid density and refinement parameters.
    #[must_use]
    pub fn with_params(mut self, params: SampledParams) -> Self {
        self.params = params;
        self
    }

    /// Computes the minima, or reports parallel curves.
    #[instrument(skip_all, fields(nb1 = self.params.nb_samples1, nb2 = self.params.nb_samples2))]
    pub fn perform(&self) -> CurveCurveExtrema {
        let (n1, n2) = (self.params.nb_samples1.max(2), self.params.nb_samples2.max(2));
        let (w1, w2) = self.windows(n1, n2);
        if w1.1 - w1.0 <= 0.0 || w2.1 - w2.0 <= 0.0 {
            debug!("empty search window");
            return CurveCurveExtrema::not_done();
        }

        let us = grid(w1, n1);
        let vs = grid(w2, n2);
        let p1: Vec<Point2> = us.iter().map(|&u| self.c1.value(u)).collect();
        let p2: Vec<Point2> = vs.iter().map(|&v| self.c2.value(v)).collect();
        let distances: Vec<Vec<f64>> = p1
            .iter()
            .map(|a| p2.iter().map(|b| (a - b).norm_squared()).collect())
            .collect();
        let seeds = grid_minima(&distances);
        trace!(nb_seeds = seeds.len(), "grid minima");

        let (box1, box2) = (search_box(self.c1, w1), search_box(self.c2, w2));
        let func = PairDistance {
            c1: self.c1,
            c2: self.c2,
            lo: [box1.0, box2.0],
            hi: [box1.1, box2.1],
        };
        let mut solutions: Vec<(f64, f64)> = Vec::new();
        let mut on_continuum = true;
        for (i, j) in seeds {
            let Some((u, v)) = self.refine(&func, us[i], vs[j], distances[i][j]) else {
                continue;
            };
            let (u, v) = (fold_into(self.c1, w1, u), fold_into(self.c2, w2, v));
            let known = solutions
                .iter()
                .any(|&(a, b)| (a - u).abs() <= self.tol1 && (b - v).abs() <= self.tol2);
            if known {
                continue;
            }
            if !is_pair_min(self.c1, self.c2, u, v) {
                trace!(u, v, "stationary point is not a minimum");
                continue;
            }
            on_continuum = on_continuum && self.on_continuum(&func, w1, u, v);
            solutions.push((u, v));
        }

        let extrema: Vec<CurveCurveExtremum> = solutions
            .iter()
            .map(|&(u, v)| {
                let (a, b) = (self.c1.value(u), self.c2.value(v));
                CurveCurveExtremum {
                    point1: PointOnCurve::new(u, a),
                    point2: PointOnCurve::new(v, b),
                    square_distance: (a - b).norm_squared(),
                    is_min: true,
                }
            })
            .collect();

        if on_continuum && extrema.len() >= 2 {
            let first = extrema[0].square_distance;
            let same = extrema.iter().all(|e| {
                (e.square_distance - first).abs() <= SQUARE_CONFUSION.max(CONFUSION * first)
            });
            if same {
                debug!(square_distance = first, "curves are parallel");
                return CurveCurveExtrema::parallel(first);
            }
        }
        debug!(nb_ext = extrema.len(), "sampled pair extrema");
        CurveCurveExtrema::done(extrema)
    }

    /// Returns `true` if the minimum at `(u, v)` belongs to a continuum of
    /// minima at the same distance.
    ///
    /// The Hessian must be singular. The first parameter is then moved both
    /// ways by a fraction of its window, the second is re-minimized around
    /// its position predicted by the null direction, and the distance must
    /// stay put. Isolated tangential contacts fail the last test.
    fn on_continuum(
        &self,
        func: &PairDistance<'_, C1, C2>,
        w1: (f64, f64),
        u: f64,
        v: f64,
    ) -> bool {
        let (_, hessian) = func.gradient_and_hessian(u, v);
        let scale = hessian.norm().max(f64::MIN_POSITIVE);
        if hessian.determinant().abs() > DEGENERATE_HESSIAN * scale * scale {
            return false;
        }
        let (huu, huv) = (hessian[(0, 0)], hessian[(0, 1)]);
        if huv.abs() <= DEGENERATE_HESSIAN * scale {
            return false;
        }
        // dv/du along the null direction
        let slope = -huu / huv;
        let f0 = (self.c1.value(u) - self.c2.value(v)).norm_squared();
        let tolerance = SQUARE_CONFUSION.max(CONFUSION * f0);
        let step = CONTINUUM_STEP * (w1.1 - w1.0);

        let mut nb_checked = 0;
        for shift in [-step, step] {
            let u1 = u + shift;
            if u1 < func.lo[0] || u1 > func.hi[0] {
                continue;
            }
            let center = v + slope * shift;
            let half = (slope * shift).abs() + step;
            let (lo, hi) = ((center - half).max(func.lo[1]), (center + half).min(func.hi[1]));
            if hi <= lo {
                continue;
            }
            let p1 = self.c1.value(u1);
            let distance = |t: f64| (p1 - self.c2.value(t)).norm_squared();
            let start = center.clamp(lo, hi);
            let best = brent_minimize(
                |t| Some(distance(t)),
                lo,
                hi,
                start,
                distance(start),
                self.params.brent.tol,
                self.params.brent.max_iter,
            );
            trace!(u1, v1 = best.x, f = best.fx, f0, "continuum check");
            if (best.fx - f0).abs() > tolerance {
                return false;
            }
            nb_checked += 1;
        }
        nb_checked > 0
    }

    /// Finite search windows; an unbounded line is windowed over the
    /// projection of the other curve.
    fn windows(&self, n1: usize, n2: usize) -> ((f64, f64), (f64, f64)) {
        let bounded1 = finite_window(self.range1.0, self.range1.1);
        let bounded2 = finite_window(self.range2.0, self.range2.1);
        let w1 = self.window(self.c1, self.range1, || {
            grid(bounded2, n2).into_iter().map(|v| self.c2.value(v)).collect()
        });
        let w2 = self.window(self.c2, self.range2, || {
            grid(bounded1, n1).into_iter().map(|u| self.c1.value(u)).collect()
        });
        (w1, w2)
    }

    fn window<C, F>(&self, curve: &C, range: (f64, f64), other: F) -> (f64, f64)
    where
        C: Curve<2> + ?Sized,
        F: FnOnce() -> Vec<Point2>,
    {
        if !is_infinite(range.0) && !is_infinite(range.1) {
            return range;
        }
        let CurveKind::Line(line) = curve.kind() else {
            return finite_window(range.0, range.1);
        };
        let params: Vec<f64> = other().iter().map(|p| line.parameter_of(p)).collect();
        let lo = params.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = params.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let margin = WINDOW_MARGIN * (hi - lo) + 1.0;
        let lo = if is_infinite(range.0) { lo - margin } else { range.0 };
        let hi = if is_infinite(range.1) { hi + margin } else { range.1 };
        trace!(lo, hi, "line windowed over the other curve");
        (lo, hi)
    }

    /// Damped Newton descent from a grid seed, then a coordinate polish.
    /// Returns the refined pair if it is stationary.
    fn refine(
        &self,
        func: &PairDistance<'_, C1, C2>,
        u0: f64,
        v0: f64,
        f0: f64,
    ) -> Option<(f64, f64)> {
        let mut x = DVector::from_column_slice(&[u0, v0]);
        let mut fx = f0;
        for _ in 0..self.params.max_iter {
            let (gradient, hessian) = func.gradient_and_hessian(x[0], x[1]);
            if gradient.norm() <= f64::EPSILON * (1.0 + fx) {
                break;
            }
            let direction = match hessian.cholesky() {
                Some(chol) => -chol.solve(&gradient),
                None => -gradient,
            };
            let dir = DVector::from_column_slice(direction.as_slice());
            let grad = DVector::from_column_slice(gradient.as_slice());
            let step = armijo_backtrack(func, &x, &dir, &grad, fx, &self.params.armijo);
            if !step.is_valid {
                break;
            }
            x.axpy(step.alpha, &dir, 1.0);
            let moved = step.alpha * dir.norm();
            fx = step.f_new;
            if moved <= f64::EPSILON * (1.0 + x.norm()) {
                break;
            }
        }

        let mut nb_evals = 0;
        for dim in 0..2 {
            let half = if dim == 0 { self.tol1 } else { self.tol2 };
            let (lo, hi) = ((x[dim] - half).max(func.lo[dim]), (x[dim] + half).min(func.hi[dim]));
            brent_along_coordinate(
                func,
                &mut x,
                dim,
                lo,
                hi,
                &mut fx,
                self.params.brent.tol,
                self.params.brent.max_iter,
                &mut nb_evals,
            );
        }
        trace!(u = x[0], v = x[1], f = fx, nb_evals, "refined seed");

        let (u, v) = (x[0], x[1]);
        let (p1, d1) = self.c1.d1(u);
        let (p2, d2) = self.c2.d1(v);
        let diff = p1 - p2;
        let along1 = diff.dot(&d1).abs() / d1.norm().max(f64::MIN_POSITIVE);
        let along2 = diff.dot(&d2).abs() / d2.norm().max(f64::MIN_POSITIVE);
        (along1 <= CONFUSION && along2 <= CONFUSION).then_some((u, v))
    }
}

/// Returns `true` if `window` covers a whole period of `curve`.
fn wraps<C: Curve<2> + ?Sized>(curve: &C, window: (f64, f64)) -> bool {
    curve.is_periodic() && window.1 - window.0 >= curve.period() - PCONFUSION
}

/// Box in which a parameter may move during refinement: a window covering
/// a whole period is open on both sides.
fn search_box<C: Curve<2> + ?Sized>(curve: &C, window: (f64, f64)) -> (f64, f64) {
    if wraps(curve, window) {
        (window.0 - curve.period(), window.1 + curve.period())
    } else {
        window
    }
}

/// Folds a parameter that wrapped around its window into
/// `[window.0, window.0 + T)`.
fn fold_into<C: Curve<2> + ?Sized>(curve: &C, window: (f64, f64), u: f64) -> f64 {
    if !wraps(curve, window) {
        return u;
    }
    let period = curve.period();
    let t = in_period(u, window.0, window.0 + period);
    if t >= window.0 + period - PCONFUSION { t - period } else { t }
}

#[allow(clippy::cast_precision_loss)]
fn grid((lo, hi): (f64, f64), n: usize) -> Vec<f64> {
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| if i + 1 == n { hi } else { lo + step * i as f64 }).collect()
}

/// Grid cells not larger than any of their (up to eight) neighbours.
fn grid_minima(distances: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let n1 = distances.len();
    let n2 = distances.first().map_or(0, Vec::len);
    let mut minima = Vec::new();
    for i in 0..n1 {
        for j in 0..n2 {
            let here = distances[i][j];
            let is_min = (i.saturating_sub(1)..=(i + 1).min(n1 - 1))
                .all(|a| {
                    (j.saturating_sub(1)..=(j + 1).min(n2 - 1)).all(|b| distances[a][b] >= here)
                });
            if is_min {
                minima.push((i, j));
            }
        }
    }
    minima
}
