pub mod line_search;
pub mod precision;
pub mod roots;

/// Point in `D`-dimensional space.
pub type Point<const D: usize> = nalgebra::Point<f64, D>;

/// Vector in `D`-dimensional space.
pub type Vector<const D: usize> = nalgebra::SVector<f64, D>;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 2D vector type.
pub type Vector2 = nalgebra::Vector2<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Dynamically sized vector used by the line-search kernel.
pub type DVector = nalgebra::DVector<f64>;

/// Global geometric tolerance for construction checks.
pub const TOLERANCE: f64 = 1e-10;
