///
/// Bayes+EKFgen the extended Kalman filter generator.
/// Copyright (c) 2020 Michael Stevens
///
/// An Extended Kalman Filter propagates a mean and covariance through a non-linear system model by linearising the model
/// around the current estimate at each step. The linearisation needs the Jacobians of the prediction and observation models.
///
/// Bayes+EKFgen derives these Jacobians analytically from a symbolic description of the system. Models are built as expressions
/// over named state, input and measurement symbols. Non-smooth primitives (absolute value, sign, min, max and the unit step)
/// are differentiated with fixed subgradient conventions so that controllers with saturations and reversals can be modelled.
///
/// A generator session is opened with the state vector and initial state, then a predict step and any number of named
/// measurement models are generated. Closing the session yields an artifact of deterministic `predict` and `update_<name>`
/// procedures. The closed form parts are lowered to straight line tapes, the covariance algebra is applied numerically with the
/// covariance form Kalman filter operations. Every definition error is reported when generating, never by the procedures.
///
/// The procedures can be executed directly or emitted as Rust source.
//
/// # Licensing
///
/// All Bayes++ source code files are copyright with the license conditions as given here. The copyright notice is that of the MIT license.
///  This in no way restricts any commercial use you may wish to make using our source code.
///  As long as you respect the copyright and license conditions, Michael Stevens is happy to for you to use it in any way you wish.
///
/// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction,
/// including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software,
/// and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
///
/// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
///
/// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
/// FITNESS FOR A PARTICULAR PURPOSE AND NON INFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY,
/// WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

pub mod models;
pub mod noise;
pub mod linalg;
pub mod estimators;

pub mod error;
pub mod expr;
pub mod diff;
pub mod builder;
pub mod emit;
pub mod artifact;
pub mod session;

pub use artifact::{Artifact, PredictProcedure, UpdateProcedure};
pub use error::{GenResult, GenerationError};
pub use expr::{ExprId, Graph};
pub use models::{KalmanState, MeasurementModel, MeasurementNoise};
pub use session::{EkfGen, Lifecycle};
