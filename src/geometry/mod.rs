pub mod curve;
mod placement;

pub use curve::{
    AnyCurve, BSplineCurve, BezierCurve, Circle, Continuity, Curve, CurveKind, CurveType,
    ElementaryCurve, Ellipse, Hyperbola, Line, OffsetCurve, Parabola,
};
pub use placement::Placement;
