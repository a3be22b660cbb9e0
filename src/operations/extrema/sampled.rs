use tracing::{debug, instrument, trace};

use crate::geometry::curve::finite_window;
use crate::geometry::Curve;
use crate::math::line_search::{brent_minimize, BrentParams};
use crate::math::precision::CONFUSION;
use crate::math::roots::brent_root;
use crate::math::{Point, TOLERANCE};

use super::{is_point_min, PointCurveExtrema, PointExtremum, PointOnCurve};

/// Default number of samples over the search range.
const DEFAULT_NB_SAMPLES: usize = 32;

/// Numeric extrema of the distance from a point to a curve on one range.
///
/// The range is sampled for `F(u) = (C(u) - P)·C'(u)`, the half derivative
/// of the squared distance. Sign changes of `F` are refined as roots; local
/// minima of `|F|` without a sign change are refined by minimization, which
/// catches tangential contacts. A refined parameter is kept when
/// `|F| / |C'|` is below `tol_f`.
pub struct SampledPointCurve<'a, const D: usize, C: Curve<D> + ?Sized> {
    curve: &'a C,
    nb_samples: usize,
    uinf: f64,
    usup: f64,
    tol_u: f64,
    tol_f: f64,
    brent: BrentParams,
}

impl<'a, const D: usize, C: Curve<D> + ?Sized> SampledPointCurve<'a, D, C> {
    /// Creates a solver over the natural domain of `curve`, with infinite
    /// bounds replaced by a finite window.
    #[must_use]
    pub fn new(curve: &'a C) -> Self {
        let (uinf, usup) = finite_window(curve.first_parameter(), curve.last_parameter());
        Self {
            curve,
            nb_samples: DEFAULT_NB_SAMPLES,
            uinf,
            usup,
            tol_u: curve.resolution(CONFUSION),
            tol_f: CONFUSION,
            brent: BrentParams::default(),
        }
    }

    /// Sets the sampling density, range and tolerances.
    pub fn initialize(&mut self, nb_samples: usize, uinf: f64, usup: f64, tol_u: f64, tol_f: f64) {
        self.nb_samples = nb_samples.max(2);
        self.uinf = uinf;
        self.usup = usup;
        self.tol_u = tol_u;
        self.tol_f = tol_f;
    }

    /// Overrides the Brent refinement parameters.
    #[must_use]
    pub fn with_brent_params(mut self, params: BrentParams) -> Self {
        self.brent = params;
        self
    }

    /// Half derivative of the squared distance at `u`, and the curve speed.
    fn eval(&self, point: &Point<D>, u: f64) -> (f64, f64) {
        let (p, d1) = self.curve.d1(u);
        ((p - point).dot(&d1), d1.norm())
    }

    fn residual(&self, point: &Point<D>, u: f64) -> f64 {
        let (f, speed) = self.eval(point, u);
        if speed > TOLERANCE { f.abs() / speed } else { f.abs() }
    }

    /// Computes the extrema for `point`, sorted by parameter.
    #[instrument(
        skip_all,
        fields(nb_samples = self.nb_samples, uinf = self.uinf, usup = self.usup)
    )]
    pub fn perform(&self, point: &Point<D>) -> PointCurveExtrema<D> {
        let (lo, hi) = (self.uinf, self.usup);
        if !(lo.is_finite() && hi.is_finite()) || hi - lo <= 0.0 {
            debug!("empty or unbounded sampling range");
            return PointCurveExtrema::not_done();
        }

        let n = self.nb_samples.max(2);
        #[allow(clippy::cast_precision_loss)]
        let step = (hi - lo) / (n - 1) as f64;
        #[allow(clippy::cast_precision_loss)]
        let grid: Vec<f64> = (0..n)
            .map(|i| if i + 1 == n { hi } else { lo + step * i as f64 })
            .collect();
        let values: Vec<f64> = grid.iter().map(|&u| self.eval(point, u).0).collect();

        let mut candidates = Vec::new();
        for (i, &u) in grid.iter().enumerate() {
            if self.residual(point, u) < self.tol_f {
                candidates.push(u);
            }
            if i + 1 < n && values[i] * values[i + 1] < 0.0 {
                let root = brent_root(
                    |t| self.eval(point, t).0,
                    u,
                    grid[i + 1],
                    values[i],
                    values[i + 1],
                    self.tol_u.min(self.brent.tol),
                    self.brent.max_iter,
                );
                if let Some(root) = root {
                    candidates.push(root);
                }
            }
        }

        for i in 1..n - 1 {
            let (prev, here, next) = (values[i - 1], values[i], values[i + 1]);
            let tangential = here.abs() < prev.abs()
                && here.abs() < next.abs()
                && prev * here > 0.0
                && here * next > 0.0;
            if !tangential {
                continue;
            }
            let best = brent_minimize(
                |t| Some(self.eval(point, t).0.abs()),
                grid[i - 1],
                grid[i + 1],
                grid[i],
                here.abs(),
                self.brent.tol,
                self.brent.max_iter,
            );
            trace!(u = best.x, f = best.fx, "tangential candidate");
            candidates.push(best.x);
        }

        candidates.sort_by(f64::total_cmp);
        let mut params: Vec<f64> = Vec::with_capacity(candidates.len());
        for u in candidates {
            if self.residual(point, u) >= self.tol_f {
                trace!(u, "rejected: residual above tolerance");
                continue;
            }
            if params.last().is_some_and(|&last| (u - last).abs() <= self.tol_u) {
                continue;
            }
            params.push(u);
        }

        let step = self.tol_u.max(1.0e-6);
        let extrema = params
            .into_iter()
            .map(|u| {
                let value = self.curve.value(u);
                PointExtremum {
                    point: PointOnCurve::new(u, value),
                    square_distance: (value - point).norm_squared(),
                    is_min: is_point_min(self.curve, point, u, step),
                }
            })
            .collect::<Vec<_>>();
        debug!(nb_ext = extrema.len(), "sampled extrema");
        PointCurveExtrema::done(extrema)
    }
}
