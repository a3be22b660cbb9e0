//! Extrema of the distance between a point and a curve, or between two
//! curves.
//!
//! Every solver follows the same lifecycle: build it with `new`, tune it with
//! `with_*` builders, then call `perform`, which returns an owned result.
//! Result accessors fail with [`ExtremaError`] on misuse (query before
//! success, index out of range); numeric failure only shows as
//! `is_done() == false`.

mod curve_curve;
mod elementary_pair;
mod point_curve;
mod point_elementary;
mod sampled;
mod sampled_pair;

pub use curve_curve::ExtremaCurveCurve2d;
pub use elementary_pair::ExtremaElementaryPair2d;
pub use point_curve::ExtremaPointCurve;
pub use point_elementary::ExtremaPointElementary;
pub use sampled::SampledPointCurve;
pub use sampled_pair::{SampledCurveCurve, SampledParams};

use crate::error::{ExtremaError, Result};
use crate::geometry::Curve;
use crate::math::{Point, Point2};

/// A parameter on a curve together with the point it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointOnCurve<const D: usize> {
    parameter: f64,
    value: Point<D>,
}

impl<const D: usize> PointOnCurve<D> {
    /// Creates a new point on curve.
    #[must_use]
    pub fn new(parameter: f64, value: Point<D>) -> Self {
        Self { parameter, value }
    }

    /// Returns the curve parameter.
    #[must_use]
    pub fn parameter(&self) -> f64 {
        self.parameter
    }

    /// Returns the point.
    #[must_use]
    pub fn value(&self) -> &Point<D> {
        &self.value
    }
}

/// One extremum of the point/curve distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointExtremum<const D: usize> {
    /// Parameter and point on the curve.
    pub point: PointOnCurve<D>,
    /// Squared distance from the query point.
    pub square_distance: f64,
    /// `true` for a local minimum of the distance, `false` for a maximum.
    pub is_min: bool,
}

/// Which extrema a point/curve search reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Local minima only.
    Min,
    /// Local maxima only.
    Max,
    /// Every extremum.
    #[default]
    MinMax,
}

impl SearchMode {
    fn keeps(self, is_min: bool) -> bool {
        match self {
            Self::Min => is_min,
            Self::Max => !is_min,
            Self::MinMax => true,
        }
    }
}

/// Squared distances from the query point to the ends of the trimmed curve.
///
/// An infinite bound has an infinite distance and no point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimmedSquareDistances<const D: usize> {
    /// Squared distance to the first end.
    pub first: f64,
    /// Squared distance to the last end.
    pub last: f64,
    /// First end, when finite.
    pub first_point: Option<Point<D>>,
    /// Last end, when finite.
    pub last_point: Option<Point<D>>,
}

impl<const D: usize> TrimmedSquareDistances<D> {
    pub(crate) fn unbounded() -> Self {
        Self {
            first: f64::INFINITY,
            last: f64::INFINITY,
            first_point: None,
            last_point: None,
        }
    }
}

/// Extrema of the distance from a point to a curve.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCurveExtrema<const D: usize> {
    done: bool,
    extrema: Vec<PointExtremum<D>>,
    trimmed: TrimmedSquareDistances<D>,
}

impl<const D: usize> PointCurveExtrema<D> {
    pub(crate) fn not_done() -> Self {
        Self {
            done: false,
            extrema: Vec::new(),
            trimmed: TrimmedSquareDistances::unbounded(),
        }
    }

    pub(crate) fn done(extrema: Vec<PointExtremum<D>>) -> Self {
        Self {
            done: true,
            extrema,
            trimmed: TrimmedSquareDistances::unbounded(),
        }
    }

    pub(crate) fn with_trimmed(mut self, trimmed: TrimmedSquareDistances<D>) -> Self {
        self.trimmed = trimmed;
        self
    }

    /// Drops the extrema `mode` does not report.
    pub(crate) fn filtered(mut self, mode: SearchMode) -> Self {
        self.extrema.retain(|e| mode.keeps(e.is_min));
        self
    }

    /// Returns `true` if the computation succeeded.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of extrema found.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] if the computation failed.
    pub fn nb_ext(&self) -> Result<usize> {
        self.check_done()?;
        Ok(self.extrema.len())
    }

    /// Squared distance of the `n`-th extremum (0-based).
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] or [`ExtremaError::IndexOutOfRange`].
    pub fn square_distance(&self, n: usize) -> Result<f64> {
        Ok(self.get(n)?.square_distance)
    }

    /// Whether the `n`-th extremum is a minimum.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] or [`ExtremaError::IndexOutOfRange`].
    pub fn is_min(&self, n: usize) -> Result<bool> {
        Ok(self.get(n)?.is_min)
    }

    /// Point on the curve of the `n`-th extremum.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] or [`ExtremaError::IndexOutOfRange`].
    pub fn point(&self, n: usize) -> Result<PointOnCurve<D>> {
        Ok(self.get(n)?.point)
    }

    /// Extrema in the order they were found.
    #[must_use]
    pub fn extrema(&self) -> &[PointExtremum<D>] {
        &self.extrema
    }

    /// Squared distances to the trimmed curve ends.
    #[must_use]
    pub fn trimmed_square_distances(&self) -> &TrimmedSquareDistances<D> {
        &self.trimmed
    }

    fn check_done(&self) -> Result<()> {
        if self.done {
            Ok(())
        } else {
            Err(ExtremaError::NotDone.into())
        }
    }

    fn get(&self, n: usize) -> Result<&PointExtremum<D>> {
        self.check_done()?;
        self.extrema.get(n).ok_or_else(|| {
            ExtremaError::IndexOutOfRange {
                index: n,
                count: self.extrema.len(),
            }
            .into()
        })
    }
}

/// One extremum of the distance between two planar curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveCurveExtremum {
    /// Parameter and point on the first curve.
    pub point1: PointOnCurve<2>,
    /// Parameter and point on the second curve.
    pub point2: PointOnCurve<2>,
    /// Squared distance between the two points.
    pub square_distance: f64,
    /// `true` for a local minimum of the distance.
    pub is_min: bool,
}

impl CurveCurveExtremum {
    fn swapped(self) -> Self {
        Self {
            point1: self.point2,
            point2: self.point1,
            ..self
        }
    }
}

/// Squared distances between the trimmed ends of two curves.
///
/// `d11` pairs the first end of curve 1 with the first end of curve 2,
/// `d12` the first end of curve 1 with the last end of curve 2, and so on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimmedCorners {
    pub d11: f64,
    pub d12: f64,
    pub d21: f64,
    pub d22: f64,
    pub p11: Point2,
    pub p12: Point2,
    pub p21: Point2,
    pub p22: Point2,
}

/// Extrema of the distance between two planar curves.
///
/// When the curves are parallel (every point of one is at the same distance
/// from the other) there are no isolated extrema: [`is_parallel`] is set,
/// [`nb_ext`] reports one pseudo-extremum whose squared distance is the
/// constant gap, and [`points`] refuses to answer.
///
/// [`is_parallel`]: CurveCurveExtrema::is_parallel
/// [`nb_ext`]: CurveCurveExtrema::nb_ext
/// [`points`]: CurveCurveExtrema::points
#[derive(Debug, Clone, PartialEq)]
pub struct CurveCurveExtrema {
    done: bool,
    parallel: Option<f64>,
    extrema: Vec<CurveCurveExtremum>,
    trimmed: Option<TrimmedCorners>,
}

impl CurveCurveExtrema {
    pub(crate) fn not_done() -> Self {
        Self {
            done: false,
            parallel: None,
            extrema: Vec::new(),
            trimmed: None,
        }
    }

    pub(crate) fn done(extrema: Vec<CurveCurveExtremum>) -> Self {
        Self {
            done: true,
            parallel: None,
            extrema,
            trimmed: None,
        }
    }

    pub(crate) fn parallel(square_distance: f64) -> Self {
        Self {
            done: true,
            parallel: Some(square_distance),
            extrema: Vec::new(),
            trimmed: None,
        }
    }

    pub(crate) fn with_trimmed(mut self, trimmed: Option<TrimmedCorners>) -> Self {
        self.trimmed = trimmed;
        self
    }

    /// Exchanges the roles of the two curves.
    pub(crate) fn swapped(mut self) -> Self {
        self.extrema = self.extrema.into_iter().map(CurveCurveExtremum::swapped).collect();
        self.trimmed = self.trimmed.map(|t| TrimmedCorners {
            d12: t.d21,
            d21: t.d12,
            p11: t.p21,
            p12: t.p22,
            p21: t.p11,
            p22: t.p12,
            ..t
        });
        self
    }

    pub(crate) fn into_extrema(self) -> Vec<CurveCurveExtremum> {
        self.extrema
    }

    pub(crate) fn parallel_square_distance(&self) -> Option<f64> {
        self.parallel
    }

    /// Returns `true` if the computation succeeded.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns `true` if the curves are parallel.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] if the computation failed.
    pub fn is_parallel(&self) -> Result<bool> {
        self.check_done()?;
        Ok(self.parallel.is_some())
    }

    /// Number of extrema; `1` for parallel curves.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] if the computation failed.
    pub fn nb_ext(&self) -> Result<usize> {
        self.check_done()?;
        Ok(if self.parallel.is_some() { 1 } else { self.extrema.len() })
    }

    /// Squared distance of the `n`-th extremum (0-based).
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`] or [`ExtremaError::IndexOutOfRange`].
    pub fn square_distance(&self, n: usize) -> Result<f64> {
        self.check_done()?;
        match self.parallel {
            Some(d) if n == 0 => Ok(d),
            Some(_) => Err(ExtremaError::IndexOutOfRange { index: n, count: 1 }.into()),
            None => Ok(self.get(n)?.square_distance),
        }
    }

    /// Whether the `n`-th extremum is a minimum.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`], [`ExtremaError::IndexOutOfRange`]
    /// or, for parallel curves, [`ExtremaError::ParallelNoPoints`].
    pub fn is_min(&self, n: usize) -> Result<bool> {
        Ok(self.get(n)?.is_min)
    }

    /// Points on both curves of the `n`-th extremum.
    ///
    /// # Errors
    ///
    /// Returns [`ExtremaError::NotDone`], [`ExtremaError::IndexOutOfRange`]
    /// or, for parallel curves, [`ExtremaError::ParallelNoPoints`].
    pub fn points(&self, n: usize) -> Result<(PointOnCurve<2>, PointOnCurve<2>)> {
        let e = self.get(n)?;
        Ok((e.point1, e.point2))
    }

    /// Isolated extrema in the order they were found.
    #[must_use]
    pub fn extrema(&self) -> &[CurveCurveExtremum] {
        &self.extrema
    }

    /// Squared distances between the trimmed ends, when all four bounds are
    /// finite.
    #[must_use]
    pub fn trimmed_square_distances(&self) -> Option<&TrimmedCorners> {
        self.trimmed.as_ref()
    }

    fn check_done(&self) -> Result<()> {
        if self.done {
            Ok(())
        } else {
            Err(ExtremaError::NotDone.into())
        }
    }

    fn get(&self, n: usize) -> Result<&CurveCurveExtremum> {
        self.check_done()?;
        if self.parallel.is_some() {
            return Err(ExtremaError::ParallelNoPoints.into());
        }
        self.extrema.get(n).ok_or_else(|| {
            ExtremaError::IndexOutOfRange {
                index: n,
                count: self.extrema.len(),
            }
            .into()
        })
    }
}

/// Classifies a stationary parameter of `|C(u) - P|^2` as a minimum.
///
/// Uses the sign of `|C'|^2 + (C - P)·C''`; a vanishing second derivative
/// falls back to comparing neighbour distances at `±step`.
pub(crate) fn is_point_min<const D: usize, C>(
    curve: &C,
    point: &Point<D>,
    u: f64,
    step: f64,
) -> bool
where
    C: Curve<D> + ?Sized,
{
    let (p, d1, d2) = curve.d2(u);
    let diff = p - point;
    let second = d1.norm_squared() + diff.dot(&d2);
    let scale = d1.norm_squared() + diff.norm() * d2.norm();
    if second.abs() > 1.0e-10 * scale.max(f64::MIN_POSITIVE) {
        return second > 0.0;
    }
    let f = diff.norm_squared();
    let before = (curve.value(u - step) - point).norm_squared();
    let after = (curve.value(u + step) - point).norm_squared();
    before >= f && after >= f
}

/// Classifies a stationary pair of `|C1(u) - C2(v)|^2` as a minimum.
///
/// A positive semi-definite Hessian counts as a minimum.
pub(crate) fn is_pair_min<C1, C2>(c1: &C1, c2: &C2, u: f64, v: f64) -> bool
where
    C1: Curve<2> + ?Sized,
    C2: Curve<2> + ?Sized,
{
    let (p1, d1, dd1) = c1.d2(u);
    let (p2, d2, dd2) = c2.d2(v);
    let diff = p1 - p2;
    let huu = d1.norm_squared() + diff.dot(&dd1);
    let hvv = d2.norm_squared() - diff.dot(&dd2);
    let huv = -d1.dot(&d2);
    let scale = (d1.norm_squared() + d2.norm_squared()).max(f64::MIN_POSITIVE);
    let tol = 1.0e-10 * scale * scale;
    huu >= -1.0e-10 * scale && hvv >= -1.0e-10 * scale && huu * hvv - huv * huv >= -tol
}
