//! Numeric state estimators used by the generated procedures.

pub mod covariance;
