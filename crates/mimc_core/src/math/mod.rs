//! Numerical helpers shared by the estimation engine.
//!
//! - [`regression`]: ordinary least squares used for rate fitting
//! - [`stats`]: streaming mean and variance
//! - [`distributions`]: input distributions and the inverse normal CDF

pub mod distributions;
pub mod regression;
pub mod stats;

pub use distributions::{inverse_normal_cdf, Uncertainty};
pub use regression::{least_squares, linear_regression, RegressionError};
pub use stats::{sample_variance, RunningMoments};
