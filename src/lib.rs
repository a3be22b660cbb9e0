//! Extrema of the distance between points and curves.
//!
//! [`math`] holds the numeric kernel (precision constants, root finders and
//! line searches), [`geometry`] the curves, and [`operations::extrema`] the
//! point/curve and curve/curve solvers built on them.

pub mod error;
pub mod geometry;
pub mod math;
pub mod operations;

pub use error::{GeolisError, Result};
