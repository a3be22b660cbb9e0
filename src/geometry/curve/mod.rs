mod basis;
mod bezier;
mod bspline;
mod circle;
mod ellipse;
mod hyperbola;
mod line;
mod offset;
mod parabola;

pub use bezier::BezierCurve;
pub use bspline::BSplineCurve;
pub use circle::Circle;
pub use ellipse::Ellipse;
pub use hyperbola::Hyperbola;
pub use line::Line;
pub use offset::OffsetCurve;
pub use parabola::Parabola;

use crate::math::precision::{is_infinite, INFINITE};
use crate::math::{Point, Vector};

/// Geometric nature of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveType {
    Line,
    Circle,
    Ellipse,
    Hyperbola,
    Parabola,
    BezierCurve,
    BSplineCurve,
    OffsetCurve,
    OtherCurve,
}

impl CurveType {
    /// Returns `true` for line and conic types.
    #[must_use]
    pub fn is_elementary(self) -> bool {
        matches!(
            self,
            Self::Line | Self::Circle | Self::Ellipse | Self::Hyperbola | Self::Parabola
        )
    }
}

/// Order of parametric continuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Continuity {
    C0,
    C1,
    C2,
    C3,
    CN,
}

impl Continuity {
    /// Number of continuous derivatives, `usize::MAX` for [`Continuity::CN`].
    #[must_use]
    pub fn order(self) -> usize {
        match self {
            Self::C0 => 0,
            Self::C1 => 1,
            Self::C2 => 2,
            Self::C3 => 3,
            Self::CN => usize::MAX,
        }
    }

    /// The next stronger continuity.
    #[must_use]
    pub fn raised(self) -> Self {
        match self {
            Self::C0 => Self::C1,
            Self::C1 => Self::C2,
            Self::C2 => Self::C3,
            Self::C3 | Self::CN => Self::CN,
        }
    }
}

/// Borrowed view on the concrete geometry behind a curve.
///
/// Solvers match on this to pick a specialized algorithm.
#[derive(Debug, Clone, Copy)]
pub enum CurveKind<'a, const D: usize> {
    Line(&'a Line<D>),
    Circle(&'a Circle<D>),
    Ellipse(&'a Ellipse<D>),
    Hyperbola(&'a Hyperbola<D>),
    Parabola(&'a Parabola<D>),
    Bezier(&'a BezierCurve<D>),
    BSpline(&'a BSplineCurve<D>),
    Offset(&'a OffsetCurve<D>),
    Other,
}

impl<'a, const D: usize> CurveKind<'a, D> {
    /// Type tag of the viewed curve.
    #[must_use]
    pub fn curve_type(&self) -> CurveType {
        match self {
            Self::Line(_) => CurveType::Line,
            Self::Circle(_) => CurveType::Circle,
            Self::Ellipse(_) => CurveType::Ellipse,
            Self::Hyperbola(_) => CurveType::Hyperbola,
            Self::Parabola(_) => CurveType::Parabola,
            Self::Bezier(_) => CurveType::BezierCurve,
            Self::BSpline(_) => CurveType::BSplineCurve,
            Self::Offset(_) => CurveType::OffsetCurve,
            Self::Other => CurveType::OtherCurve,
        }
    }

    /// The elementary payload, if the curve is a line or a conic.
    #[must_use]
    pub fn as_elementary(&self) -> Option<ElementaryCurve<'a, D>> {
        match *self {
            Self::Line(c) => Some(ElementaryCurve::Line(c)),
            Self::Circle(c) => Some(ElementaryCurve::Circle(c)),
            Self::Ellipse(c) => Some(ElementaryCurve::Ellipse(c)),
            Self::Hyperbola(c) => Some(ElementaryCurve::Hyperbola(c)),
            Self::Parabola(c) => Some(ElementaryCurve::Parabola(c)),
            _ => None,
        }
    }
}

/// A line or conic, the curves with closed-form extremum solvers.
#[derive(Debug, Clone, Copy)]
pub enum ElementaryCurve<'a, const D: usize> {
    Line(&'a Line<D>),
    Circle(&'a Circle<D>),
    Ellipse(&'a Ellipse<D>),
    Hyperbola(&'a Hyperbola<D>),
    Parabola(&'a Parabola<D>),
}

impl<'a, const D: usize> ElementaryCurve<'a, D> {
    /// The viewed curve as a trait object.
    #[must_use]
    pub fn as_curve(&self) -> &'a dyn Curve<D> {
        match *self {
            Self::Line(c) => c,
            Self::Circle(c) => c,
            Self::Ellipse(c) => c,
            Self::Hyperbola(c) => c,
            Self::Parabola(c) => c,
        }
    }

    /// Type tag of the viewed curve.
    #[must_use]
    pub fn curve_type(&self) -> CurveType {
        match self {
            Self::Line(_) => CurveType::Line,
            Self::Circle(_) => CurveType::Circle,
            Self::Ellipse(_) => CurveType::Ellipse,
            Self::Hyperbola(_) => CurveType::Hyperbola,
            Self::Parabola(_) => CurveType::Parabola,
        }
    }

    /// Evaluates the viewed curve.
    #[must_use]
    pub fn value(&self, u: f64) -> Point<D> {
        match self {
            Self::Line(c) => c.value(u),
            Self::Circle(c) => c.value(u),
            Self::Ellipse(c) => c.value(u),
            Self::Hyperbola(c) => c.value(u),
            Self::Parabola(c) => c.value(u),
        }
    }

    /// First and second derivatives of the viewed curve.
    #[must_use]
    pub fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        match self {
            Self::Line(c) => c.d2(u),
            Self::Circle(c) => c.d2(u),
            Self::Ellipse(c) => c.d2(u),
            Self::Hyperbola(c) => c.d2(u),
            Self::Parabola(c) => c.d2(u),
        }
    }
}

/// A parametric curve in `D`-dimensional space.
///
/// This is the capability surface the extremum solvers rely on. Evaluation
/// never fails: implementations clamp or extrapolate outside their natural
/// domain.
pub trait Curve<const D: usize> {
    /// Start of the natural parameter domain.
    fn first_parameter(&self) -> f64;

    /// End of the natural parameter domain.
    fn last_parameter(&self) -> f64;

    /// Returns `true` if `C(u + period) == C(u)` for all `u`.
    fn is_periodic(&self) -> bool {
        false
    }

    /// Period of a periodic curve, `last - first` otherwise.
    fn period(&self) -> f64 {
        self.last_parameter() - self.first_parameter()
    }

    /// Geometric nature tag.
    fn curve_type(&self) -> CurveType {
        self.kind().curve_type()
    }

    /// Borrowed view on the concrete geometry.
    fn kind(&self) -> CurveKind<'_, D> {
        CurveKind::Other
    }

    /// Point at parameter `u`.
    fn value(&self, u: f64) -> Point<D>;

    /// Point and first derivative.
    fn d1(&self, u: f64) -> (Point<D>, Vector<D>);

    /// Point, first and second derivatives.
    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>);

    /// Point, first, second and third derivatives.
    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>);

    /// Parametric resolution: a parameter step whose image is at most
    /// `tol3d` long.
    ///
    /// The default bounds the speed by sampling the first derivative.
    fn resolution(&self, tol3d: f64) -> f64 {
        let (first, last) = finite_window(self.first_parameter(), self.last_parameter());
        let n = 32;
        let step = (last - first) / f64::from(n);
        let max_speed = (0..=n)
            .map(|i| self.d1(first + step * f64::from(i)).1.norm())
            .fold(0.0, f64::max);
        if max_speed > 0.0 { tol3d / max_speed } else { tol3d }
    }

    /// Global continuity of the curve.
    fn continuity(&self) -> Continuity {
        Continuity::CN
    }

    /// Number of intervals of the natural domain on which the curve has at
    /// least continuity `s`.
    fn nb_intervals(&self, s: Continuity) -> usize {
        self.intervals(s).len().saturating_sub(1)
    }

    /// Breakpoints of the intervals counted by [`Curve::nb_intervals`],
    /// including both domain ends.
    fn intervals(&self, _s: Continuity) -> Vec<f64> {
        vec![self.first_parameter(), self.last_parameter()]
    }
}

/// Replaces infinite bounds by a finite window around the finite one.
pub(crate) fn finite_window(first: f64, last: f64) -> (f64, f64) {
    const HALF_WIDTH: f64 = 100.0;
    match (is_infinite(first), is_infinite(last)) {
        (false, false) => (first, last),
        (true, false) => (last - 2.0 * HALF_WIDTH, last),
        (false, true) => (first, first + 2.0 * HALF_WIDTH),
        (true, true) => (-HALF_WIDTH, HALF_WIDTH),
    }
}

/// Owned curve of any supported type.
pub enum AnyCurve<const D: usize> {
    Line(Line<D>),
    Circle(Circle<D>),
    Ellipse(Ellipse<D>),
    Hyperbola(Hyperbola<D>),
    Parabola(Parabola<D>),
    Bezier(BezierCurve<D>),
    BSpline(BSplineCurve<D>),
    Offset(OffsetCurve<D>),
    Other(Box<dyn Curve<D> + Send + Sync>),
}

impl<const D: usize> std::fmt::Debug for AnyCurve<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(c) => c.fmt(f),
            Self::Circle(c) => c.fmt(f),
            Self::Ellipse(c) => c.fmt(f),
            Self::Hyperbola(c) => c.fmt(f),
            Self::Parabola(c) => c.fmt(f),
            Self::Bezier(c) => c.fmt(f),
            Self::BSpline(c) => c.fmt(f),
            Self::Offset(c) => c.fmt(f),
            Self::Other(_) => f.write_str("AnyCurve::Other"),
        }
    }
}

macro_rules! delegate {
    ($self:ident, $c:ident => $body:expr) => {
        match $self {
            AnyCurve::Line($c) => $body,
            AnyCurve::Circle($c) => $body,
            AnyCurve::Ellipse($c) => $body,
            AnyCurve::Hyperbola($c) => $body,
            AnyCurve::Parabola($c) => $body,
            AnyCurve::Bezier($c) => $body,
            AnyCurve::BSpline($c) => $body,
            AnyCurve::Offset($c) => $body,
            AnyCurve::Other($c) => $body,
        }
    };
}

impl<const D: usize> Curve<D> for AnyCurve<D> {
    fn first_parameter(&self) -> f64 {
        delegate!(self, c => c.first_parameter())
    }

    fn last_parameter(&self) -> f64 {
        delegate!(self, c => c.last_parameter())
    }

    fn is_periodic(&self) -> bool {
        delegate!(self, c => c.is_periodic())
    }

    fn period(&self) -> f64 {
        delegate!(self, c => c.period())
    }

    fn kind(&self) -> CurveKind<'_, D> {
        delegate!(self, c => c.kind())
    }

    fn value(&self, u: f64) -> Point<D> {
        delegate!(self, c => c.value(u))
    }

    fn d1(&self, u: f64) -> (Point<D>, Vector<D>) {
        delegate!(self, c => c.d1(u))
    }

    fn d2(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>) {
        delegate!(self, c => c.d2(u))
    }

    fn d3(&self, u: f64) -> (Point<D>, Vector<D>, Vector<D>, Vector<D>) {
        delegate!(self, c => c.d3(u))
    }

    fn resolution(&self, tol3d: f64) -> f64 {
        delegate!(self, c => c.resolution(tol3d))
    }

    fn continuity(&self) -> Continuity {
        delegate!(self, c => c.continuity())
    }

    fn intervals(&self, s: Continuity) -> Vec<f64> {
        delegate!(self, c => c.intervals(s))
    }
}

macro_rules! impl_from {
    ($($variant:ident($ty:ident)),* $(,)?) => {
        $(
            impl<const D: usize> From<$ty<D>> for AnyCurve<D> {
                fn from(c: $ty<D>) -> Self {
                    Self::$variant(c)
                }
            }
        )*
    };
}

impl_from!(
    Line(Line),
    Circle(Circle),
    Ellipse(Ellipse),
    Hyperbola(Hyperbola),
    Parabola(Parabola),
    Bezier(BezierCurve),
    BSpline(BSplineCurve),
    Offset(OffsetCurve),
);

/// Natural domain of the elementary curves that are unbounded.
pub(crate) const UNBOUNDED: (f64, f64) = (-INFINITE, INFINITE);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::Placement;
    use crate::math::{Point2, Vector2};
    use approx::assert_abs_diff_eq;

    struct Sine;

    impl Curve<2> for Sine {
        fn first_parameter(&self) -> f64 {
            0.0
        }
        fn last_parameter(&self) -> f64 {
            std::f64::consts::TAU
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
    fn user_curve_defaults() {
        let c = AnyCurve::Other(Box::new(Sine));
        assert_eq!(c.curve_type(), CurveType::OtherCurve);
        assert!(!c.is_periodic());
        assert_eq!(c.nb_intervals(Continuity::C2), 1);
        // max speed is sqrt(2) at u = 0
        assert_abs_diff_eq!(c.resolution(1.0), 1.0 / 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn kind_reports_elementary_payload() {
        let line: AnyCurve<2> = Line::new(Point2::origin(), Vector2::x()).unwrap().into();
        assert!(line.kind().as_elementary().is_some());
        assert!(line.curve_type().is_elementary());

        let circle: AnyCurve<2> = Circle::new(Placement::at(Point2::origin()), 1.0).unwrap().into();
        assert_eq!(circle.curve_type(), CurveType::Circle);
        assert!(circle.is_periodic());
    }

    #[test]
    fn continuity_ordering() {
        assert!(Continuity::C2 > Continuity::C1);
        assert_eq!(Continuity::C1.raised(), Continuity::C2);
        assert_eq!(Continuity::CN.raised(), Continuity::CN);
        assert_eq!(Continuity::C3.order(), 3);
    }

    #[test]
    fn finite_window_replaces_infinite_bounds() {
        assert_eq!(finite_window(UNBOUNDED.0, UNBOUNDED.1), (-100.0, 100.0));
        assert_eq!(finite_window(1.0, UNBOUNDED.1), (1.0, 201.0));
        assert_eq!(finite_window(1.0, 2.0), (1.0, 2.0));
    }
}
