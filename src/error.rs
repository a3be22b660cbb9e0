use thiserror::Error;

/// Top-level error type for the extremum engine.
#[derive(Debug, Error)]
pub enum GeolisError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Extrema(#[from] ExtremaError),
}

/// Errors related to curve construction and geometric data.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,

    #[error("invalid knot vector: {0}")]
    InvalidKnots(String),

    #[error("invalid poles: {0}")]
    InvalidPoles(String),
}

/// Errors raised when extremum results are queried incorrectly.
///
/// These signal caller misuse, never numeric failure: a solver that does not
/// converge reports it through `is_done()` instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtremaError {
    #[error("extremum computation is not done")]
    NotDone,

    #[error("extremum index {index} is out of range (count = {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("curves are parallel: no isolated extremum points")]
    ParallelNoPoints,
}

/// Convenience type alias for results using [`GeolisError`].
pub type Result<T> = std::result::Result<T, GeolisError>;
