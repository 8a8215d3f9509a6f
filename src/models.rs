#![allow(non_snake_case)]

//! Estimation and generation models.
//!
//! State representations are modeled as structs.
//! The numeric estimation operations the generated procedures rely on are defined as traits.
//! Declarations of measurement models handed to the generator live here as well.

use nalgebra::{DMatrix, DVector};

use crate::expr::ExprId;
use crate::noise::CorrelatedNoise;

/// Kalman State.
///
/// Linear representation as a state vector and the state covariance (symmetric positive semi-definite) matrix.
#[derive(PartialEq, Clone, Debug)]
pub struct KalmanState {
    /// State vector
    pub x: DVector<f64>,
    /// State covariance matrix (symmetric positive semi-definite)
    pub X: DMatrix<f64>,
}

/// A Kalman filter (estimator).
///
/// The linear Kalman state representation x,X is used to represent the system.
pub trait KalmanEstimator {
    /// Initialise the estimator with a KalmanState.
    ///
    /// Return: the reciprocal condition number of the state covariance.
    fn init(&mut self, state: &KalmanState) -> Result<f64, &'static str>;
}

/// A extended linear predictor.
///
/// Uses a non-linear state prediction with linearised prediction model with additive noise.
pub trait ExtendedLinearPredictor {
    /// State prediction with an exactly propagated state, a state Jacobian and additive noise.
    fn predict(
        &mut self,
        x_pred: &DVector<f64>,
        Fx: &DMatrix<f64>,
        noise: &CorrelatedNoise,
    ) -> Result<(), &'static str>;
}

/// A extended linear observer with correlated observation noise.
///
/// Uses a non-linear observation model linearised by its Jacobian, with additive noise.
pub trait ExtendedLinearObserver {
    /// Observation with innovation `s`, observation Jacobian `Hx` and correlated noise.
    fn observe_innovation(
        &mut self,
        s: &DVector<f64>,
        Hx: &DMatrix<f64>,
        noise: &CorrelatedNoise,
    ) -> Result<(), &'static str>;
}

/// Covariance of the measurement noise of a measurement model.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementNoise {
    /// `R` is passed with every update, in the space of the transformed measurement.
    Supplied,
    /// `R` is passed with every update in the raw sensor space and mapped through the transform Jacobian `G R G'`.
    SuppliedRaw,
    /// `R` is an m×m expression matrix over state and raw measurement symbols.
    Modelled(Vec<Vec<ExprId>>),
}

/// A named measurement model.
///
/// The raw reading `z` is transformed into the space of the expected measurement before the innovation is formed:
/// `y = transform(z) - expected(x)`.
#[derive(Clone, Debug)]
pub struct MeasurementModel {
    /// Expected measurement `h(x)` over state symbols.
    pub expected: Vec<ExprId>,
    /// Transform of the raw reading, over the raw measurement symbols.
    pub transform: Vec<ExprId>,
    /// Raw measurement symbols, in the order of the `z` vector passed to the update.
    pub z: Vec<ExprId>,
    /// Measurement noise.
    pub noise: MeasurementNoise,
}

impl MeasurementModel {
    /// A direct measurement, the raw reading is already in the space of `expected`.
    pub fn direct(expected: Vec<ExprId>, z: Vec<ExprId>, noise: MeasurementNoise) -> MeasurementModel {
        MeasurementModel {
            expected,
            transform: z.clone(),
            z,
            noise,
        }
    }
}
