//! Shared evaluation of piecewise-polynomial curves in B-spline form.

use crate::math::{Point, Vector};

/// Highest derivative order evaluated.
pub(super) const MAX_DERIVATIVE: usize = 3;

/// Flat knot sequence and (possibly weighted) poles of a spline segment set.
///
/// Valid spans are `span_lo..=span_hi`; parameters outside the span range
/// extrapolate the first or last polynomial piece.
#[derive(Debug, Clone)]
pub(super) struct SplineEvaluator<const D: usize> {
    pub flat_knots: Vec<f64>,
    pub poles: Vec<Point<D>>,
    pub weights: Option<Vec<f64>>,
    pub degree: usize,
    pub span_lo: usize,
    pub span_hi: usize,
}

impl<const D: usize> SplineEvaluator<D> {
    /// Index `s` of the span with `knots[s] <= u < knots[s + 1]`, restricted
    /// to non-empty spans of the valid range.
    pub fn find_span(&self, u: f64) -> usize {
        let knots = &self.flat_knots;
        if u >= knots[self.span_hi] {
            return self.span_hi;
        }
        if u <= knots[self.span_lo] {
            return self.span_lo;
        }
        // Largest s in range with knots[s] <= u.
        let upper = knots[self.span_lo..=self.span_hi].partition_point(|&k| k <= u);
        self.span_lo + upper.saturating_sub(1)
    }

    /// Values and derivatives of the non-zero basis functions at `u`.
    ///
    /// `ders[k][j]` is the `k`-th derivative of `N_{span - degree + j}`.
    #[allow(
        clippy::float_cmp,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn basis_derivatives(&self, span: usize, u: f64) -> [Vec<f64>; MAX_DERIVATIVE + 1] {
        let p = self.degree;
        let knots = &self.flat_knots;
        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        ndu[0][0] = 1.0;
        for j in 1..=p {
            left[j] = u - knots[span + 1 - j];
            right[j] = knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = if ndu[j][r] == 0.0 { 0.0 } else { ndu[r][j - 1] / ndu[j][r] };
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders: [Vec<f64>; MAX_DERIVATIVE + 1] = std::array::from_fn(|_| vec![0.0; p + 1]);
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        let n = MAX_DERIVATIVE.min(p);
        let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a[0].fill(0.0);
            a[0][0] = 1.0;
            for k in 1..=n {
                let mut d = 0.0;
                let rk = r as isize - k as isize;
                let pk = p - k;
                if r >= k {
                    let denom = ndu[pk + 1][r - k];
                    a[s2][0] = if denom == 0.0 { 0.0 } else { a[s1][0] / denom };
                    d = a[s2][0] * ndu[r - k][pk];
                }
                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r + k <= p + 1 { k - 1 } else { p - r };
                for j in j1..=j2 {
                    let idx = (rk + j as isize) as usize;
                    let denom = ndu[pk + 1][idx];
                    a[s2][j] = if denom == 0.0 { 0.0 } else { (a[s1][j] - a[s1][j - 1]) / denom };
                    d += a[s2][j] * ndu[idx][pk];
                }
                if r <= pk {
                    let denom = ndu[pk + 1][r];
                    a[s2][k] = if denom == 0.0 { 0.0 } else { -a[s1][k - 1] / denom };
                    d += a[s2][k] * ndu[r][pk];
                }
                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut factor = p as f64;
        for k in 1..=n {
            for v in &mut ders[k] {
                *v *= factor;
            }
            factor *= (p - k) as f64;
        }
        ders
    }

    /// Point and the first three derivatives at `u`.
    #[allow(clippy::many_single_char_names)]
    pub fn derivatives(&self, u: f64) -> (Point<D>, [Vector<D>; MAX_DERIVATIVE]) {
        let span = self.find_span(u);
        let ders = self.basis_derivatives(span, u);
        let first = span - self.degree;

        // Homogeneous numerator derivatives a[k] and weight derivatives w[k].
        let mut a = [Vector::<D>::zeros(); MAX_DERIVATIVE + 1];
        let mut w = [0.0; MAX_DERIVATIVE + 1];
        for (k, row) in ders.iter().enumerate() {
            for (j, &n) in row.iter().enumerate() {
                let pole = self.poles[first + j].coords;
                let weight = self.weights.as_ref().map_or(1.0, |ws| ws[first + j]);
                a[k] += pole * (n * weight);
                w[k] += n * weight;
            }
        }

        if self.weights.is_none() {
            return (Point::from(a[0]), [a[1], a[2], a[3]]);
        }

        // C(k) = (A(k) - sum_{i=1..k} binom(k, i) w(i) C(k - i)) / w
        const BINOM: [[f64; 4]; 4] = [
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 0.0],
            [1.0, 2.0, 1.0, 0.0],
            [1.0, 3.0, 3.0, 1.0],
        ];
        let mut c = [Vector::<D>::zeros(); MAX_DERIVATIVE + 1];
        for k in 0..=MAX_DERIVATIVE {
            let mut v = a[k];
            for i in 1..=k {
                v -= c[k - i] * (BINOM[k][i] * w[i]);
            }
            c[k] = v / w[0];
        }
        (Point::from(c[0]), [c[1], c[2], c[3]])
    }

    /// Upper bound of the parametric speed `|C'|` over the valid spans.
    pub fn max_speed(&self) -> f64 {
        let p = self.degree;
        if p == 0 {
            return 0.0;
        }
        let (w_min, w_max) = self.weights.as_ref().map_or((1.0, 1.0), |ws| {
            ws.iter().fold((f64::INFINITY, 0.0_f64), |(lo, hi), &w| (lo.min(w), hi.max(w)))
        });
        let first = self.span_lo - p;
        let last = self.span_hi;
        let mut speed: f64 = 0.0;
        for i in first..last {
            let dk = self.flat_knots[i + p + 1] - self.flat_knots[i + 1];
            if dk <= 0.0 {
                continue;
            }
            let chord = (self.poles[i + 1] - self.poles[i]).norm();
            speed = speed.max(p as f64 * chord / dk);
        }
        speed * w_max / w_min
    }
}

/// Expands distinct knots with multiplicities into a flat sequence.
pub(super) fn flatten_knots(knots: &[f64], mults: &[usize]) -> Vec<f64> {
    knots
        .iter()
        .zip(mults)
        .flat_map(|(&k, &m)| std::iter::repeat(k).take(m))
        .collect()
}
