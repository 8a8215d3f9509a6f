#![allow(non_snake_case)]

//! Filter equations.
//!
//! Assembles the symbolic pieces of the two extended Kalman filter steps from a model:
//!
//! Predict, with transition `f(x, u, dt)` and process noise variances `q`:
//! `x' = f(x, u, dt)` exactly, `F = ∂f/∂x` and `X' = F.X.F' + diag(q)`.
//!
//! Update, with expected measurement `h(x)` and transform `t(z)`:
//! `y = t(z) - h(x)`, `H = ∂h/∂x`, `S = H.X.H' + R`, `W = X.H'.S^-1`, `x' = x + W.y` and `X' = (I - W.H).X`.
//!
//! Only the symbolic parts (`x'`, `F`, `q`, `y`, `H` and the noise mapping) are built here, the linear algebra is
//! applied numerically by the generated procedures.

use crate::diff::jacobian;
use crate::error::{GenResult, GenerationError};
use crate::expr::{ExprId, Graph};
use crate::models::{MeasurementModel, MeasurementNoise};

/// Symbolic predict step.
#[derive(Clone, Debug)]
pub struct PredictEquations {
    /// Propagated state `f(x, u, dt)`
    pub x_next: Vec<ExprId>,
    /// State Jacobian `∂f/∂x`
    pub F: Vec<Vec<ExprId>>,
    /// Process noise variances
    pub q: Vec<ExprId>,
}

/// Symbolic measurement noise of an update step.
#[derive(Clone, Debug, PartialEq)]
pub enum NoiseEquations {
    /// `R` supplied in the transformed space.
    Supplied,
    /// `R` supplied in the raw space and mapped by the transform Jacobian `G = ∂t/∂z`.
    Mapped { G: Vec<Vec<ExprId>> },
    /// `R` built from the model.
    Modelled { R: Vec<Vec<ExprId>> },
}

/// Symbolic update step.
#[derive(Clone, Debug)]
pub struct UpdateEquations {
    /// Innovation `t(z) - h(x)`
    pub innovation: Vec<ExprId>,
    /// Observation Jacobian `∂h/∂x`
    pub H: Vec<Vec<ExprId>>,
    pub noise: NoiseEquations,
}

fn flat(rows: &[Vec<ExprId>]) -> Vec<ExprId> {
    rows.iter().flatten().cloned().collect()
}

fn check_len(what: String, expected: usize, found: usize) -> GenResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(GenerationError::Dimension { what, expected, found })
    }
}

/// Builds the predict equations of transition `f` and process noise `q` over `state`.
pub fn predict_equations(graph: &mut Graph, state: &[ExprId], f: &[ExprId], q: &[ExprId]) -> GenResult<PredictEquations> {
    let n = state.len();
    check_len("transition".to_string(), n, f.len())?;
    check_len("process noise".to_string(), n, q.len())?;

    graph.check_defined(f, "transition")?;
    graph.check_defined(q, "process noise")?;
    for (index, qi) in q.iter().enumerate() {
        if let Some(value) = graph.as_const(*qi) {
            if !(value >= 0.) {
                return Err(GenerationError::NegativeProcessNoise { index, value });
            }
        }
    }

    let F = jacobian(graph, f, state)?;
    graph.check_defined(&flat(&F), "state Jacobian")?;

    Ok(PredictEquations {
        x_next: f.to_vec(),
        F,
        q: q.to_vec(),
    })
}

/// Builds the update equations of the measurement model `name` over `state`.
pub fn update_equations(
    graph: &mut Graph,
    name: &str,
    state: &[ExprId],
    model: &MeasurementModel,
) -> GenResult<UpdateEquations> {
    let m = model.expected.len();
    if model.transform.len() != m {
        return Err(GenerationError::DimensionMismatch {
            name: name.to_string(),
            expected: m,
            transform: model.transform.len(),
        });
    }
    if m == 0 {
        return Err(GenerationError::Dimension {
            what: format!("measurement `{}`", name),
            expected: 1,
            found: 0,
        });
    }

    let context = format!("measurement `{}`", name);
    graph.check_defined(&model.expected, &context)?;
    graph.check_defined(&model.transform, &context)?;

    let innovation = model
        .transform
        .iter()
        .zip(model.expected.iter())
        .map(|(t, h)| graph.sub(*t, *h))
        .collect::<Vec<_>>();

    let H = jacobian(graph, &model.expected, state)?;
    graph.check_defined(&flat(&H), &format!("observation Jacobian of `{}`", name))?;

    let noise = match &model.noise {
        MeasurementNoise::Supplied => NoiseEquations::Supplied,
        MeasurementNoise::SuppliedRaw => {
            let G = jacobian(graph, &model.transform, &model.z)?;
            graph.check_defined(&flat(&G), &format!("transform Jacobian of `{}`", name))?;
            NoiseEquations::Mapped { G }
        }
        MeasurementNoise::Modelled(R) => {
            check_len(format!("noise rows of `{}`", name), m, R.len())?;
            for row in R {
                check_len(format!("noise columns of `{}`", name), m, row.len())?;
            }
            graph.check_defined(&flat(R), &format!("noise of `{}`", name))?;
            NoiseEquations::Modelled { R: R.clone() }
        }
    };

    Ok(UpdateEquations { innovation, H, noise })
}
