//! Scalar root finding: bracketed Brent roots, low-degree polynomials, and
//! trigonometric equations of the form
//! `a·cos²x + 2b·cos x·sin x + c·cos x + d·sin x + e = 0`.

use std::f64::consts::{PI, TAU};

use nalgebra::{DMatrix, Schur};

use super::precision::in_period;

/// Outcome of a polynomial or trigonometric root search.
#[derive(Debug, Clone, PartialEq)]
pub enum Roots {
    /// Every parameter is a root (all coefficients vanish).
    Infinite,
    /// Finitely many real roots, sorted ascending.
    Finite(Vec<f64>),
}

impl Roots {
    /// Returns the finite roots, or an empty slice for [`Roots::Infinite`].
    #[must_use]
    pub fn values(&self) -> &[f64] {
        match self {
            Roots::Infinite => &[],
            Roots::Finite(values) => values,
        }
    }

    /// Returns `true` if the equation vanishes identically.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Roots::Infinite)
    }
}

/// Coefficients below this fraction of the largest one are treated as zero.
const COEF_ZERO_TOL: f64 = 1.0e-12;

/// Imaginary parts below this (relative) threshold mark an eigenvalue as real.
const IMAG_TOL: f64 = 1.0e-6;

/// Finds a root of `f` in `[a, b]` given `f(a)` and `f(b)` of opposite sign.
///
/// Brent's method: inverse quadratic interpolation and secant steps guarded
/// by bisection. Returns `None` when the bracket is invalid.
pub fn brent_root<F>(
    mut f: F,
    a: f64,
    b: f64,
    fa: f64,
    fb: f64,
    tol: f64,
    max_iter: usize,
) -> Option<f64>
where
    F: FnMut(f64) -> f64,
{
    if fa == 0.0 {
        return Some(a);
    }
    if fb == 0.0 {
        return Some(b);
    }
    if fa * fb > 0.0 {
        return None;
    }

    let (mut a, mut b, mut fa, mut fb) = (a, b, fa, fb);
    let (mut c, mut fc) = (b, fb);
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iter {
        if (fb > 0.0 && fc > 0.0) || (fb < 0.0 && fc < 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }
        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Some(b);
        }
        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q);
            if (a - c).abs() <= 0.0 {
                p = 2.0 * xm * s;
                q = 1.0 - s;
            } else {
                let qa = fa / fc;
                let r = fb / fc;
                p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                q = (qa - 1.0) * (r - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }
        a = b;
        fa = fb;
        b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
        fb = f(b);
    }
    Some(b)
}

/// Real roots of the polynomial `sum(coeffs[i] * x^i)`.
///
/// Leading coefficients that are negligible relative to the largest one are
/// dropped. Degree 1 and 2 use closed forms; higher degrees use the
/// eigenvalues of the companion matrix followed by Newton polishing.
#[must_use]
pub fn polynomial_roots(coeffs: &[f64]) -> Roots {
    let scale = coeffs.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    if scale == 0.0 {
        return Roots::Infinite;
    }
    let threshold = scale * COEF_ZERO_TOL;
    let mut degree = coeffs.len() - 1;
    while degree > 0 && coeffs[degree].abs() <= threshold {
        degree -= 1;
    }
    let poly = &coeffs[..=degree];

    let mut roots = match degree {
        0 => Vec::new(),
        1 => vec![-poly[0] / poly[1]],
        2 => quadratic_roots(poly[2], poly[1], poly[0]),
        _ => companion_roots(poly),
    };

    for root in &mut roots {
        *root = polish_polynomial_root(poly, *root);
    }
    roots.sort_by(f64::total_cmp);
    roots.dedup_by(|a, b| (*a - *b).abs() <= 1.0e-10 * (1.0 + b.abs()));
    Roots::Finite(roots)
}

fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let disc = b * b - 4.0 * a * c;
    let scale = (b * b).max((4.0 * a * c).abs()).max(f64::MIN_POSITIVE);
    if disc < 0.0 {
        if -disc <= scale * 1.0e-12 {
            return vec![-b / (2.0 * a)];
        }
        return Vec::new();
    }
    if disc <= scale * 1.0e-12 {
        return vec![-b / (2.0 * a)];
    }
    let sq = disc.sqrt();
    let q = -0.5 * (b + sq.copysign(b));
    if q == 0.0 {
        return vec![0.0];
    }
    vec![q / a, c / q]
}

fn companion_roots(poly: &[f64]) -> Vec<f64> {
    let degree = poly.len() - 1;
    let lead = poly[degree];
    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }
    for i in 0..degree {
        companion[(i, degree - 1)] = -poly[i] / lead;
    }

    let Some(schur) = Schur::try_new(companion, f64::EPSILON, 500) else {
        tracing::debug!(degree, "companion matrix Schur decomposition did not converge");
        return Vec::new();
    };
    schur
        .complex_eigenvalues()
        .iter()
        .filter(|z| z.im.abs() <= IMAG_TOL * (1.0 + z.re.abs()))
        .map(|z| z.re)
        .collect()
}

fn eval_polynomial(poly: &[f64], x: f64) -> (f64, f64) {
    let mut value = 0.0;
    let mut deriv = 0.0;
    for &c in poly.iter().rev() {
        deriv = deriv * x + value;
        value = value * x + c;
    }
    (value, deriv)
}

fn polish_polynomial_root(poly: &[f64], mut x: f64) -> f64 {
    let (mut fx, _) = eval_polynomial(poly, x);
    for _ in 0..8 {
        let (value, deriv) = eval_polynomial(poly, x);
        if deriv == 0.0 {
            break;
        }
        let next = x - value / deriv;
        let (fnext, _) = eval_polynomial(poly, next);
        if !next.is_finite() || fnext.abs() >= fx.abs() {
            break;
        }
        x = next;
        fx = fnext;
    }
    x
}

/// Coefficients of `a·cos²x + 2b·cos x·sin x + c·cos x + d·sin x + e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrigEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

impl TrigEquation {
    /// Evaluates the equation and its derivative at `x`.
    #[must_use]
    pub fn value_and_derivative(&self, x: f64) -> (f64, f64) {
        let (s, c) = x.sin_cos();
        let value = self.a * c * c + 2.0 * self.b * c * s + self.c * c + self.d * s + self.e;
        let deriv =
            -2.0 * self.a * c * s + 2.0 * self.b * (c * c - s * s) - self.c * s + self.d * c;
        (value, deriv)
    }

    /// Roots in `[inf, sup]`, with `sup - inf <= 2π`.
    ///
    /// Solved through the half-angle substitution `t = tan(x/2)`, which maps
    /// the equation onto a quartic; `x = π` is checked separately since it
    /// corresponds to `t = ∞`.
    #[must_use]
    pub fn roots(&self, inf: f64, sup: f64) -> Roots {
        let Self { a, b, c, d, e } = *self;
        let scale = [a, b, c, d, e].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if scale <= f64::MIN_POSITIVE {
            return Roots::Infinite;
        }
        let zero = |v: f64| if v.abs() <= scale * COEF_ZERO_TOL { 0.0 } else { v };
        let (a, b, c, d, e) = (zero(a), zero(b), zero(c), zero(d), zero(e));
        if a == 0.0 && b == 0.0 && c == 0.0 && d == 0.0 && e == 0.0 {
            return Roots::Infinite;
        }

        let quartic = [
            a + c + e,
            4.0 * b + 2.0 * d,
            2.0 * (e - a),
            2.0 * d - 4.0 * b,
            a - c + e,
        ];
        let mut candidates: Vec<f64> = match polynomial_roots(&quartic) {
            Roots::Infinite => return Roots::Infinite,
            Roots::Finite(ts) => ts.into_iter().map(|t| 2.0 * t.atan()).collect(),
        };
        let (at_pi, _) = self.value_and_derivative(PI);
        if at_pi.abs() <= scale * 1.0e-10 {
            candidates.push(PI);
        }

        let mut roots = Vec::with_capacity(candidates.len());
        for x in candidates {
            let x = self.polish(x);
            let folded = in_period(x, inf, inf + TAU);
            let tol = 1.0e-10 * (1.0 + inf.abs());
            if folded >= inf - tol && folded <= sup + tol {
                roots.push(folded.clamp(inf, sup.max(inf)));
            }
        }
        roots.sort_by(f64::total_cmp);
        roots.dedup_by(|x, y| (*x - *y).abs() <= 1.0e-9);
        Roots::Finite(roots)
    }

    fn polish(&self, mut x: f64) -> f64 {
        let (mut fx, _) = self.value_and_derivative(x);
        for _ in 0..8 {
            let (value, deriv) = self.value_and_derivative(x);
            if deriv.abs() <= f64::MIN_POSITIVE {
                break;
            }
            let next = x - value / deriv;
            let (fnext, _) = self.value_and_derivative(next);
            if fnext.abs() >= fx.abs() || (next - x).abs() > 0.5 {
                break;
            }
            x = next;
            fx = fnext;
        }
        x
    }
}
