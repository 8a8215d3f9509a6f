#![allow(non_snake_case)]

//! Bayesian estimation noise models.
//!
//! Linear Noise models are represented as structs.

use nalgebra::{DMatrix, DVector};

use crate::linalg::check_non_negativ;
use crate::linalg::rcond::rcond_eigen;

/// Additive noise.
///
/// Noise represented as a the noise variance vector.
#[derive(Clone, Debug, PartialEq)]
pub struct UncorrelatedNoise {
    /// Noise variance
    pub q: DVector<f64>,
}

/// Additive noise.
///
/// Noise represented as a the noise covariance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelatedNoise {
    /// Noise covariance
    pub Q: DMatrix<f64>,
}

impl UncorrelatedNoise {
    /// Checks the variances are non negative, NaN variances are rejected.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.q.iter().all(|q| *q >= 0.) {
            Ok(())
        } else {
            Err("q not non-negative")
        }
    }
}

impl CorrelatedNoise {
    /// Creates a CorrelatedNoise from an UncorrelatedNoise.
    pub fn from_uncorrelated(uncorrelated: &UncorrelatedNoise) -> Self {
        CorrelatedNoise {
            Q: DMatrix::from_diagonal(&uncorrelated.q),
        }
    }

    /// Creates a CorrelatedNoise by mapping the covariance `Q` through the linear map `G`, `G.Q.G'`.
    pub fn from_mapped(G: &DMatrix<f64>, Q: &DMatrix<f64>) -> Self {
        CorrelatedNoise {
            Q: G * Q * G.transpose(),
        }
    }

    /// Checks the covariance is square, symmetric and PSD, returning its reciprocal condition number.
    pub fn check(&self) -> Result<f64, &'static str> {
        if !self.Q.is_square() {
            return Err("Q not square");
        }
        if self.Q != self.Q.transpose() {
            return Err("Q not symmetric");
        }
        check_non_negativ(rcond_eigen(&self.Q), "Q not PSD")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn uncorrelated_to_correlated() {
        let q = UncorrelatedNoise { q: dvector![1., 2.] };
        q.check().unwrap();
        let Q = CorrelatedNoise::from_uncorrelated(&q);
        assert_eq!(Q.Q, dmatrix![1., 0.; 0., 2.]);
        assert!(Q.check().unwrap() > 0.);

        assert!(UncorrelatedNoise { q: dvector![1., -2.] }.check().is_err());
    }

    #[test]
    fn mapped_noise() {
        let G = dmatrix![1., 1.; 0., 2.];
        let R = dmatrix![1., 0.; 0., 3.];
        let mapped = CorrelatedNoise::from_mapped(&G, &R);
        assert_eq!(mapped.Q, dmatrix![4., 6.; 6., 12.]);
        assert_eq!(CorrelatedNoise { Q: dmatrix![1., 2.; 2., 1.] }.check(), Err("Q not PSD"));
        assert_eq!(CorrelatedNoise { Q: dmatrix![1., 0.5; 0., 1.] }.check(), Err("Q not symmetric"));
        assert_eq!(CorrelatedNoise { Q: dmatrix![1., 0.] }.check(), Err("Q not square"));
    }
}
