//! One-dimensional searches along a direction or a single coordinate.
//!
//! Bracketing searches ([`armijo_backtrack`], [`wolfe_search`]) fail closed:
//! when their acceptance test is never met they report `is_valid = false`.
//! Minimizing searches ([`exact_line_search`], [`brent_along_coordinate`])
//! fail open and always hand back the best point they saw.

use tracing::{debug, trace};

use super::DVector;

/// `2 - golden ratio`, the golden-section step fraction.
pub const GOLDEN_SECTION: f64 = 0.381_966_011_250_105;

/// Absolute floor added to Brent tolerances so a minimum at zero converges.
pub const BRENT_ZEPS: f64 = 1.0e-10;

/// Steps below this are considered a failed backtrack.
pub const MIN_STEP: f64 = 1.0e-12;

/// A scalar function of several variables.
///
/// `value` returns `None` when the function cannot be evaluated at `x`.
pub trait MultiVarFunction {
    /// Number of variables.
    fn nb_variables(&self) -> usize;

    /// Evaluates the function.
    fn value(&self, x: &DVector) -> Option<f64>;
}

/// A [`MultiVarFunction`] that can also provide its gradient.
pub trait MultiVarFunctionWithGradient: MultiVarFunction {
    /// Evaluates the gradient.
    fn gradient(&self, x: &DVector) -> Option<DVector>;
}

/// Adapts a closure into a [`MultiVarFunction`].
pub struct FnFunction<F> {
    nb_variables: usize,
    value: F,
}

impl<F> FnFunction<F>
where
    F: Fn(&DVector) -> Option<f64>,
{
    /// Wraps `value` as a function of `nb_variables` variables.
    #[must_use]
    pub fn new(nb_variables: usize, value: F) -> Self {
        Self {
            nb_variables,
            value,
        }
    }
}

impl<F> MultiVarFunction for FnFunction<F>
where
    F: Fn(&DVector) -> Option<f64>,
{
    fn nb_variables(&self) -> usize {
        self.nb_variables
    }

    fn value(&self, x: &DVector) -> Option<f64> {
        (self.value)(x)
    }
}

/// Adapts a value closure and a gradient closure into a
/// [`MultiVarFunctionWithGradient`].
pub struct FnFunctionWithGradient<F, G> {
    inner: FnFunction<F>,
    gradient: G,
}

impl<F, G> FnFunctionWithGradient<F, G>
where
    F: Fn(&DVector) -> Option<f64>,
    G: Fn(&DVector) -> Option<DVector>,
{
    /// Wraps `value` and `gradient` as a function of `nb_variables` variables.
    #[must_use]
    pub fn new(nb_variables: usize, value: F, gradient: G) -> Self {
        Self {
            inner: FnFunction::new(nb_variables, value),
            gradient,
        }
    }
}

impl<F, G> MultiVarFunction for FnFunctionWithGradient<F, G>
where
    F: Fn(&DVector) -> Option<f64>,
    G: Fn(&DVector) -> Option<DVector>,
{
    fn nb_variables(&self) -> usize {
        self.inner.nb_variables()
    }

    fn value(&self, x: &DVector) -> Option<f64> {
        self.inner.value(x)
    }
}

impl<F, G> MultiVarFunctionWithGradient for FnFunctionWithGradient<F, G>
where
    F: Fn(&DVector) -> Option<f64>,
    G: Fn(&DVector) -> Option<DVector>,
{
    fn gradient(&self, x: &DVector) -> Option<DVector> {
        (self.gradient)(x)
    }
}

/// Outcome of a single line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchResult {
    /// Whether the accepted step satisfies the search's acceptance test.
    pub is_valid: bool,
    /// Accepted step length.
    pub alpha: f64,
    /// Function value at `x + alpha * dir`.
    pub f_new: f64,
    /// Number of function and gradient evaluations spent.
    pub nb_evals: usize,
}

impl LineSearchResult {
    fn invalid(nb_evals: usize) -> Self {
        Self {
            is_valid: false,
            alpha: 0.0,
            f_new: f64::INFINITY,
            nb_evals,
        }
    }

    fn accepted(alpha: f64, f_new: f64, nb_evals: usize) -> Self {
        Self {
            is_valid: true,
            alpha,
            f_new,
            nb_evals,
        }
    }
}

/// Parameters of [`armijo_backtrack`].
#[derive(Debug, Clone, Copy)]
pub struct ArmijoParams {
    /// First trial step.
    pub alpha_init: f64,
    /// Sufficient-decrease constant, in `(0, 1)`.
    pub c1: f64,
    /// Step contraction factor, in `(0, 1)`.
    pub rho: f64,
    /// Maximum number of trial steps.
    pub max_iter: usize,
}

impl Default for ArmijoParams {
    fn default() -> Self {
        Self {
            alpha_init: 1.0,
            c1: 1.0e-4,
            rho: 0.5,
            max_iter: 50,
        }
    }
}

/// Parameters of [`wolfe_search`].
#[derive(Debug, Clone, Copy)]
pub struct WolfeParams {
    /// First trial step.
    pub alpha_init: f64,
    /// Sufficient-decrease constant.
    pub c1: f64,
    /// Curvature constant, `c1 < c2 < 1`.
    pub c2: f64,
    /// Maximum number of trial steps over both phases.
    pub max_iter: usize,
}

impl Default for WolfeParams {
    fn default() -> Self {
        Self {
            alpha_init: 1.0,
            c1: 1.0e-4,
            c2: 0.9,
            max_iter: 50,
        }
    }
}

/// Tolerance and iteration budget of the Brent searches.
#[derive(Debug, Clone, Copy)]
pub struct BrentParams {
    /// Relative tolerance on the abscissa.
    pub tol: f64,
    /// Maximum number of iterations.
    pub max_iter: usize,
}

impl Default for BrentParams {
    fn default() -> Self {
        Self {
            tol: 1.0e-10,
            max_iter: 100,
        }
    }
}

/// Evaluation of `phi(alpha) = f(x + alpha * dir)` with a reused buffer.
struct Ray<'a, F: ?Sized> {
    func: &'a F,
    x: &'a DVector,
    dir: &'a DVector,
    trial: DVector,
    nb_evals: usize,
}

impl<'a, F: MultiVarFunction + ?Sized> Ray<'a, F> {
    fn new(func: &'a F, x: &'a DVector, dir: &'a DVector) -> Self {
        Self {
            func,
            x,
            dir,
            trial: x.clone(),
            nb_evals: 0,
        }
    }

    fn move_to(&mut self, alpha: f64) {
        self.trial.copy_from(self.x);
        self.trial.axpy(alpha, self.dir, 1.0);
    }

    fn value(&mut self, alpha: f64) -> Option<f64> {
        self.move_to(alpha);
        self.nb_evals += 1;
        self.func.value(&self.trial).filter(|v| v.is_finite())
    }
}

impl<F: MultiVarFunctionWithGradient + ?Sized> Ray<'_, F> {
    fn slope(&mut self, alpha: f64) -> Option<f64> {
        self.move_to(alpha);
        self.nb_evals += 1;
        self.func.gradient(&self.trial).map(|g| g.dot(self.dir))
    }
}

/// Backtracking line search with the Armijo sufficient-decrease test.
///
/// `dir` must be a descent direction (`grad · dir < 0`); otherwise the result
/// is invalid and no evaluation is spent. A failed evaluation shrinks the
/// step like a rejected one.
pub fn armijo_backtrack<F>(
    func: &F,
    x: &DVector,
    dir: &DVector,
    grad: &DVector,
    fx: f64,
    params: &ArmijoParams,
) -> LineSearchResult
where
    F: MultiVarFunction + ?Sized,
{
    let slope = grad.dot(dir);
    if slope.is_nan() || slope >= 0.0 {
        debug!(slope, "armijo: not a descent direction");
        return LineSearchResult::invalid(0);
    }

    let mut ray = Ray::new(func, x, dir);
    let mut alpha = params.alpha_init;
    for _ in 0..params.max_iter {
        if alpha < MIN_STEP {
            break;
        }
        if let Some(f_new) = ray.value(alpha) {
            if f_new <= fx + params.c1 * alpha * slope {
                return LineSearchResult::accepted(alpha, f_new, ray.nb_evals);
            }
        }
        alpha *= params.rho;
    }
    trace!(nb_evals = ray.nb_evals, "armijo: no acceptable step");
    LineSearchResult::invalid(ray.nb_evals)
}

/// Line search for a step satisfying the strong Wolfe conditions.
///
/// The bracketing phase doubles the step until the interval
/// `[alpha_prev, alpha]` is known to contain acceptable points, then the
/// zoom phase bisects it. A failed gradient evaluation aborts the search; a
/// failed value evaluation during bracketing halves the step toward the
/// previous one.
pub fn wolfe_search<F>(
    func: &F,
    x: &DVector,
    dir: &DVector,
    grad: &DVector,
    fx: f64,
    params: &WolfeParams,
) -> LineSearchResult
where
    F: MultiVarFunctionWithGradient + ?Sized,
{
    let slope0 = grad.dot(dir);
    if slope0.is_nan() || slope0 >= 0.0 {
        debug!(slope = slope0, "wolfe: not a descent direction");
        return LineSearchResult::invalid(0);
    }

    let mut ray = Ray::new(func, x, dir);
    let armijo = |alpha: f64, phi: f64| phi <= fx + params.c1 * alpha * slope0;
    let curvature = |slope: f64| slope.abs() <= -params.c2 * slope0;

    let mut alpha_prev = 0.0;
    let mut phi_prev = fx;
    let mut alpha = params.alpha_init;
    let mut iter = 0;

    while iter < params.max_iter {
        iter += 1;
        let Some(phi) = ray.value(alpha) else {
            alpha = 0.5 * (alpha_prev + alpha);
            if alpha - alpha_prev < MIN_STEP {
                break;
            }
            continue;
        };

        if !armijo(alpha, phi) || (iter > 1 && phi >= phi_prev) {
            let bracket = Bracket {
                lo: alpha_prev,
                phi_lo: phi_prev,
                hi: alpha,
            };
            return zoom(&mut ray, bracket, params.max_iter - iter, &armijo, &curvature);
        }

        let Some(slope) = ray.slope(alpha) else {
            debug!(alpha, "wolfe: gradient evaluation failed");
            return LineSearchResult::invalid(ray.nb_evals);
        };
        if curvature(slope) {
            return LineSearchResult::accepted(alpha, phi, ray.nb_evals);
        }
        if slope >= 0.0 {
            let bracket = Bracket {
                lo: alpha,
                phi_lo: phi,
                hi: alpha_prev,
            };
            return zoom(&mut ray, bracket, params.max_iter - iter, &armijo, &curvature);
        }

        alpha_prev = alpha;
        phi_prev = phi;
        alpha *= 2.0;
    }
    trace!(nb_evals = ray.nb_evals, "wolfe: bracketing exhausted");
    LineSearchResult::invalid(ray.nb_evals)
}

struct Bracket {
    lo: f64,
    phi_lo: f64,
    hi: f64,
}

fn zoom<F>(
    ray: &mut Ray<'_, F>,
    mut bracket: Bracket,
    budget: usize,
    armijo: &impl Fn(f64, f64) -> bool,
    curvature: &impl Fn(f64) -> bool,
) -> LineSearchResult
where
    F: MultiVarFunctionWithGradient + ?Sized,
{
    for _ in 0..budget {
        if (bracket.hi - bracket.lo).abs() < MIN_STEP {
            break;
        }
        let alpha = 0.5 * (bracket.lo + bracket.hi);
        let Some(phi) = ray.value(alpha) else {
            bracket.hi = alpha;
            continue;
        };
        if !armijo(alpha, phi) || phi >= bracket.phi_lo {
            bracket.hi = alpha;
            continue;
        }
        let Some(slope) = ray.slope(alpha) else {
            debug!(alpha, "wolfe zoom: gradient evaluation failed");
            return LineSearchResult::invalid(ray.nb_evals);
        };
        if curvature(slope) {
            return LineSearchResult::accepted(alpha, phi, ray.nb_evals);
        }
        if slope * (bracket.hi - bracket.lo) >= 0.0 {
            bracket.hi = bracket.lo;
        }
        bracket.lo = alpha;
        bracket.phi_lo = phi;
    }
    LineSearchResult::invalid(ray.nb_evals)
}

/// Best point found by [`brent_minimize`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct BrentMinimum {
    pub x: f64,
    pub fx: f64,
    pub nb_evals: usize,
}

/// Brent minimization of `phi` on `[lo, hi]` starting from `x0` with known
/// value `f0`. Failed evaluations count as `+inf`.
///
/// `tol` is relative to `|x|`, floored by [`BRENT_ZEPS`].
pub(crate) fn brent_minimize<P>(
    mut phi: P,
    lo: f64,
    hi: f64,
    x0: f64,
    f0: f64,
    tol: f64,
    max_iter: usize,
) -> BrentMinimum
where
    P: FnMut(f64) -> Option<f64>,
{
    let mut a = lo.min(hi);
    let mut b = lo.max(hi);
    let (mut x, mut w, mut v) = (x0, x0, x0);
    let (mut fx, mut fw, mut fv) = (f0, f0, f0);
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;
    let mut nb_evals = 0;

    for _ in 0..max_iter {
        let xm = 0.5 * (a + b);
        let tol1 = tol * x.abs() + BRENT_ZEPS;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }

        let mut golden = true;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_prev = e;
            e = d;
            if p.abs() < (0.5 * q * e_prev).abs() && p > q * (a - x) && p < q * (b - x) {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
                golden = false;
            }
        }
        if golden {
            e = if x >= xm { a - x } else { b - x };
            d = GOLDEN_SECTION * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = phi(u).filter(|v| v.is_finite()).unwrap_or(f64::INFINITY);
        nb_evals += 1;

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            #[allow(clippy::float_cmp)]
            let w_is_x = w == x;
            #[allow(clippy::float_cmp)]
            let v_is_stale = v == x || v == w;
            if fu <= fw || w_is_x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v_is_stale {
                v = u;
                fv = fu;
            }
        }
    }

    BrentMinimum { x, fx, nb_evals }
}

/// Minimizes `f(x + alpha * dir)` for `alpha` in `[-alpha_max, alpha_max]`.
///
/// `alpha = 0` is evaluated first and serves as the starting point. The
/// result is the best step found even when `max_iter` runs out; it is
/// invalid only if the baseline itself cannot be evaluated.
pub fn exact_line_search<F>(
    func: &F,
    x: &DVector,
    dir: &DVector,
    alpha_max: f64,
    tol: f64,
    max_iter: usize,
) -> LineSearchResult
where
    F: MultiVarFunction + ?Sized,
{
    let mut ray = Ray::new(func, x, dir);
    let Some(f0) = ray.value(0.0) else {
        debug!("exact line search: baseline evaluation failed");
        return LineSearchResult::invalid(ray.nb_evals);
    };

    let bound = alpha_max.abs();
    let best = brent_minimize(|alpha| ray.value(alpha), -bound, bound, 0.0, f0, tol, max_iter);
    LineSearchResult::accepted(best.x, best.fx, best.nb_evals + 1)
}

/// Restores one coordinate of a point on drop unless committed.
struct CoordinateGuard<'a> {
    point: &'a mut DVector,
    dim: usize,
    original: f64,
    committed: bool,
}

impl Drop for CoordinateGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.point[self.dim] = self.original;
        }
    }
}

/// Brent minimization along coordinate `dim` of `point`, inside `[lo, up]`.
///
/// The coordinate is mutated in place. On success (strict improvement over
/// `fx`) `point` and `fx` hold the new best and `true` is returned; otherwise
/// the coordinate is restored to its exact original value. `eval_count` is
/// incremented by the number of evaluations spent.
#[allow(clippy::too_many_arguments)]
pub fn brent_along_coordinate<F>(
    func: &F,
    point: &mut DVector,
    dim: usize,
    lo: f64,
    up: f64,
    fx: &mut f64,
    tol: f64,
    max_iter: usize,
    eval_count: &mut usize,
) -> bool
where
    F: MultiVarFunction + ?Sized,
{
    if dim >= point.len() {
        return false;
    }
    let original = point[dim];
    let (lo, up) = (lo.min(up), lo.max(up));

    let mut guard = CoordinateGuard {
        point,
        dim,
        original,
        committed: false,
    };

    let (start, f_start) = if (lo..=up).contains(&original) {
        (original, *fx)
    } else {
        let start = original.clamp(lo, up);
        guard.point[dim] = start;
        *eval_count += 1;
        (start, func.value(guard.point).unwrap_or(f64::INFINITY))
    };

    let best = brent_minimize(
        |t| {
            guard.point[dim] = t;
            func.value(guard.point)
        },
        lo,
        up,
        start,
        f_start,
        tol,
        max_iter,
    );
    *eval_count += best.nb_evals;

    if best.fx < *fx {
        guard.point[dim] = best.x;
        guard.committed = true;
        *fx = best.fx;
        true
    } else {
        false
    }
}

/// Minimizer of the quadratic interpolating `phi(0)`, `phi'(0)` and
/// `phi(alpha1)`, safeguarded into `[0.1 * alpha1, 0.9 * alpha1]`.
#[must_use]
pub fn quadratic_interpolation(phi0: f64, dphi0: f64, alpha1: f64, phi1: f64) -> f64 {
    let denom = 2.0 * (phi1 - phi0 - dphi0 * alpha1);
    if denom.abs() <= f64::EPSILON * (phi0.abs() + phi1.abs()).max(1.0) {
        return 0.5 * alpha1;
    }
    let alpha = -dphi0 * alpha1 * alpha1 / denom;
    if !alpha.is_finite() || alpha > alpha1 {
        return 0.5 * alpha1;
    }
    alpha.clamp(0.1 * alpha1, 0.9 * alpha1)
}
