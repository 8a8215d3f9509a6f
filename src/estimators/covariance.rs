#![allow(non_snake_case)]

//! Covariance state estimation.
//!
//! A discrete Bayesian estimator that uses a Kalman state representation [`KalmanState`] of the system for estimation.
//! The Kalman state is simply the x,X pair the dimensions of both are the dimensions of the system.
//!
//! The linear Kalman state representation is used for non-linear systems by using linearised forms of the system model.
//! The generated procedures evaluate the non-linear model and its Jacobians and then apply these operations.
//!
//! [`KalmanState`]: ../../models/struct.KalmanState.html

use nalgebra::{DMatrix, DVector};

use crate::linalg::cholesky::UdUfactor_variant1;
use crate::linalg::rcond::rcond_eigen;
use crate::linalg::{check_non_negativ, check_positive};
use crate::models::{ExtendedLinearObserver, ExtendedLinearPredictor, KalmanEstimator, KalmanState};
use crate::noise::CorrelatedNoise;

impl KalmanState {
    pub fn new_zero(d: usize) -> KalmanState {
        KalmanState {
            x: DVector::zeros(d),
            X: DMatrix::zeros(d, d),
        }
    }

    /// A state with a diagonal covariance given by the variances.
    pub fn from_variances(x: DVector<f64>, variances: &DVector<f64>) -> KalmanState {
        KalmanState {
            x,
            X: DMatrix::from_diagonal(variances),
        }
    }

    pub fn dim(&self) -> usize {
        self.x.nrows()
    }

    /// Checks dimensions, symmetry and positive semi-definiteness of the state.
    ///
    /// Rank deficient X are accepted, zero eigenvalues may round slightly negative.
    ///
    /// Return: the reciprocal condition number of X.
    pub fn check(&self) -> Result<f64, &'static str> {
        let n = self.x.nrows();
        if self.X.nrows() != n || self.X.ncols() != n {
            return Err("X dimension does not match x");
        }
        if self.x.iter().any(|x| !x.is_finite()) {
            return Err("x not finite");
        }
        for i in 0..n {
            for j in 0..i {
                if self.X[(i, j)] != self.X[(j, i)] {
                    return Err("X not symmetric");
                }
            }
        }
        check_non_negativ(rcond_eigen(&self.X), "X not PSD")
    }
}

impl KalmanEstimator for KalmanState {
    fn init(&mut self, state: &KalmanState) -> Result<f64, &'static str> {
        let rcond = state.check()?;
        self.x = state.x.clone();
        self.X = state.X.clone();

        Ok(rcond)
    }
}

impl ExtendedLinearPredictor for KalmanState {
    fn predict(
        &mut self,
        x_pred: &DVector<f64>,
        Fx: &DMatrix<f64>,
        noise: &CorrelatedNoise,
    ) -> Result<(), &'static str> {
        let n = self.x.nrows();
        if x_pred.nrows() != n || Fx.shape() != (n, n) || noise.Q.shape() != (n, n) {
            return Err("dimension mismatch in predict");
        }
        self.x.copy_from(x_pred);
        // X = Fx.X.Fx' + Q
        self.X = Fx * &self.X * Fx.transpose() + &noise.Q;

        Ok(())
    }
}

impl ExtendedLinearObserver for KalmanState {
    fn observe_innovation(
        &mut self,
        s: &DVector<f64>,
        Hx: &DMatrix<f64>,
        noise: &CorrelatedNoise,
    ) -> Result<(), &'static str> {
        let n = self.x.nrows();
        let m = s.nrows();
        if Hx.shape() != (m, n) || noise.Q.shape() != (m, m) {
            return Err("dimension mismatch in observe");
        }

        let XHt = &self.X * Hx.transpose();
        // S = Hx.X.Hx' + R
        let S = Hx * &XHt + &noise.Q;

        let mut UD = S.clone();
        check_positive(UdUfactor_variant1(&mut UD, m), "S not PD in observe")?;

        // Kalman gain W = X.Hx'.S^-1, solved as S.W' = (X.Hx')' as S is symmetric
        let SC = S.cholesky().ok_or("S not PD in observe")?;
        let W = SC.solve(&XHt.transpose()).transpose();

        // State update
        self.x += &W * s;
        // X = (I - W.Hx).X
        let I_WH = DMatrix::identity(n, n) - &W * Hx;
        self.X = I_WH * &self.X;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn init_checks_state() {
        let mut state = KalmanState::new_zero(2);
        let good = KalmanState::from_variances(dvector![1., 2.], &dvector![4., 1.]);
        approx::assert_relative_eq!(state.init(&good).unwrap(), 0.25, epsilon = 1e-12);
        assert_eq!(state, good);

        let asymmetric = KalmanState {
            x: dvector![0., 0.],
            X: dmatrix![1., 0.5; 0., 1.],
        };
        assert_eq!(state.init(&asymmetric), Err("X not symmetric"));
        let indefinite = KalmanState {
            x: dvector![0., 0.],
            X: dmatrix![1., 2.; 2., 1.],
        };
        assert_eq!(state.init(&indefinite), Err("X not PSD"));

        let v = dvector![0.1, 0.3, 0.7];
        let rank_one = KalmanState {
            x: dvector![0., 0., 0.],
            X: &v * v.transpose(),
        };
        let mut state = KalmanState::new_zero(3);
        assert!(state.init(&rank_one).unwrap() < 1e-12);
        assert_eq!(state, rank_one);
    }

    #[test]
    fn scalar_predict_observe() {
        let mut state = KalmanState {
            x: dvector![10.],
            X: dmatrix![0.],
        };
        let noise = CorrelatedNoise { Q: dmatrix![1.] };
        state.predict(&dvector![10.], &dmatrix![1.], &noise).unwrap();
        assert_eq!(state.X, dmatrix![1.]);

        state.observe_innovation(&dvector![1.], &dmatrix![1.], &noise).unwrap();
        approx::assert_relative_eq!(state.x[0], 10.5);
        approx::assert_relative_eq!(state.X[(0, 0)], 0.5);
    }

    #[test]
    fn singular_innovation_covariance() {
        let mut state = KalmanState::new_zero(1);
        let zero = CorrelatedNoise { Q: dmatrix![0.] };
        assert_eq!(
            state.observe_innovation(&dvector![1.], &dmatrix![1.], &zero),
            Err("S not PD in observe")
        );
    }
}
