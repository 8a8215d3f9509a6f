#![allow(non_snake_case)]

//! Generated filter procedures.
//!
//! An [`Artifact`] is the immutable result of a closed generator: a `predict` procedure, one `update_<name>`
//! procedure per measurement model and the initial state.
//!
//! Each procedure reads and overwrites the full state and covariance. The caller runs them sequentially on one
//! state, one update per available reading per cycle. Updates of different measurements do not commute in general,
//! the innovation of an update depends on the state left by the previous one.
//!
//! A procedure may still fail numerically on ill-conditioned data, a singular innovation covariance is reported as
//! `"S not PD in observe"`. Regularising `R` is the caller's responsibility.

use std::fmt::Write;

use nalgebra::{DMatrix, DVector};

use crate::emit::source;
use crate::emit::Tape;
use crate::models::{ExtendedLinearObserver, ExtendedLinearPredictor, KalmanState};
use crate::noise::{CorrelatedNoise, UncorrelatedNoise};

/// The generated predict procedure.
#[derive(Clone, Debug)]
pub struct PredictProcedure {
    n: usize,
    k: usize,
    tape: Tape,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl PredictProcedure {
    pub(crate) fn new(n: usize, k: usize, tape: Tape, input_names: Vec<String>, output_names: Vec<String>) -> Self {
        PredictProcedure {
            n,
            k,
            tape,
            input_names,
            output_names,
        }
    }

    pub fn name(&self) -> &str {
        "predict"
    }

    pub fn state_dim(&self) -> usize {
        self.n
    }

    pub fn input_dim(&self) -> usize {
        self.k
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Evaluates the closed form part at `x`: the propagated state, the state Jacobian and the process noise.
    pub fn linearise(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        dt: f64,
    ) -> Result<(DVector<f64>, DMatrix<f64>, UncorrelatedNoise), &'static str> {
        let n = self.n;
        if x.nrows() != n || u.nrows() != self.k {
            return Err("dimension mismatch in predict");
        }
        let mut input: Vec<f64> = x.iter().chain(u.iter()).cloned().collect();
        input.push(dt);
        let mut out = vec![0.; self.tape.output_len()];
        self.tape.eval(&input, &mut out)?;

        let x_pred = DVector::from_column_slice(&out[..n]);
        let Fx = DMatrix::from_row_slice(n, n, &out[n..n + n * n]);
        let q = DVector::from_column_slice(&out[n + n * n..]);
        Ok((x_pred, Fx, UncorrelatedNoise { q }))
    }

    /// `predict(x, P, u, dt) -> (x', P')`
    pub fn call(
        &self,
        x: &DVector<f64>,
        P: &DMatrix<f64>,
        u: &DVector<f64>,
        dt: f64,
    ) -> Result<(DVector<f64>, DMatrix<f64>), &'static str> {
        let mut state = KalmanState {
            x: x.clone(),
            X: P.clone(),
        };
        self.apply(&mut state, u, dt)?;
        Ok((state.x, state.X))
    }

    /// Predicts `state` in place.
    pub fn apply(&self, state: &mut KalmanState, u: &DVector<f64>, dt: f64) -> Result<(), &'static str> {
        let (x_pred, Fx, q) = self.linearise(&state.x, u, dt)?;
        q.check()?;
        state.predict(&x_pred, &Fx, &CorrelatedNoise::from_uncorrelated(&q))
    }

    /// Rust source of the closed form part.
    pub fn source(&self) -> String {
        source::render("predict_terms", &self.tape, &self.input_names, &self.output_names)
    }
}

/// Where the measurement noise of an update comes from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoiseLayout {
    /// `R` supplied in the transformed space.
    Supplied,
    /// `R` supplied in the raw space, the tape outputs `G`.
    Mapped,
    /// The tape outputs `R`.
    Modelled,
}

/// The generated update procedure of one measurement model.
#[derive(Clone, Debug)]
pub struct UpdateProcedure {
    name: String,
    n: usize,
    m: usize,
    z_dim: usize,
    noise: NoiseLayout,
    tape: Tape,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

/// Closed form part of an update evaluated at a state and reading.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateLinearisation {
    /// Innovation
    pub y: DVector<f64>,
    /// Observation Jacobian
    pub Hx: DMatrix<f64>,
    /// Transform Jacobian, for noise supplied in the raw space
    pub G: Option<DMatrix<f64>>,
    /// Modelled noise covariance
    pub R: Option<DMatrix<f64>>,
}

impl UpdateProcedure {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        n: usize,
        m: usize,
        z_dim: usize,
        noise: NoiseLayout,
        tape: Tape,
        input_names: Vec<String>,
        output_names: Vec<String>,
    ) -> Self {
        UpdateProcedure {
            name,
            n,
            m,
            z_dim,
            noise,
            tape,
            input_names,
            output_names,
        }
    }

    /// The measurement model name.
    pub fn model_name(&self) -> &str {
        &self.name
    }

    /// The procedure name, `update_<name>`.
    pub fn name(&self) -> String {
        format!("update_{}", self.name)
    }

    pub fn state_dim(&self) -> usize {
        self.n
    }

    /// Dimension of the innovation.
    pub fn measurement_dim(&self) -> usize {
        self.m
    }

    /// Dimension of the raw reading `z`.
    pub fn reading_dim(&self) -> usize {
        self.z_dim
    }

    pub fn noise_layout(&self) -> NoiseLayout {
        self.noise
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Evaluates the closed form part at `x` with reading `z`.
    pub fn linearise(&self, x: &DVector<f64>, z: &DVector<f64>) -> Result<UpdateLinearisation, &'static str> {
        let (n, m) = (self.n, self.m);
        if x.nrows() != n || z.nrows() != self.z_dim {
            return Err("dimension mismatch in update");
        }
        let input: Vec<f64> = x.iter().chain(z.iter()).cloned().collect();
        let mut out = vec![0.; self.tape.output_len()];
        self.tape.eval(&input, &mut out)?;

        let y = DVector::from_column_slice(&out[..m]);
        let Hx = DMatrix::from_row_slice(m, n, &out[m..m + m * n]);
        let rest = &out[m + m * n..];
        let (G, R) = match self.noise {
            NoiseLayout::Supplied => (None, None),
            NoiseLayout::Mapped => (Some(DMatrix::from_row_slice(m, self.z_dim, rest)), None),
            NoiseLayout::Modelled => (None, Some(DMatrix::from_row_slice(m, m, rest))),
        };
        Ok(UpdateLinearisation { y, Hx, G, R })
    }

    /// `update_<name>(x, P, z, R) -> (x', P')`
    ///
    /// `R` is in the raw reading space for noise supplied raw, otherwise in the transformed space.
    /// For modelled noise an explicit `R` overrides the model.
    pub fn call(
        &self,
        x: &DVector<f64>,
        P: &DMatrix<f64>,
        z: &DVector<f64>,
        R: &DMatrix<f64>,
    ) -> Result<(DVector<f64>, DMatrix<f64>), &'static str> {
        let mut state = KalmanState {
            x: x.clone(),
            X: P.clone(),
        };
        self.apply(&mut state, z, Some(R))?;
        Ok((state.x, state.X))
    }

    /// Updates `state` in place. `R` may be omitted for modelled noise.
    ///
    /// The supplied or modelled `R` must be symmetric PSD, otherwise the state is left unchanged.
    pub fn apply(&self, state: &mut KalmanState, z: &DVector<f64>, R: Option<&DMatrix<f64>>) -> Result<(), &'static str> {
        let lin = self.linearise(&state.x, z)?;
        let (R, G) = match (self.noise, R, lin.G, lin.R) {
            (NoiseLayout::Mapped, Some(R), Some(G), _) => (CorrelatedNoise { Q: R.clone() }, Some(G)),
            (_, Some(R), _, _) => (CorrelatedNoise { Q: R.clone() }, None),
            (_, None, _, Some(modelled)) => (CorrelatedNoise { Q: modelled }, None),
            _ => return Err("R required in update"),
        };
        let r_dim = if G.is_some() { self.z_dim } else { self.m };
        if R.Q.shape() != (r_dim, r_dim) {
            return Err("R dimension mismatch in update");
        }
        R.check().map_err(|_| "R not PSD in update")?;
        let noise = match G {
            Some(G) => CorrelatedNoise::from_mapped(&G, &R.Q),
            None => R,
        };
        state.observe_innovation(&lin.y, &lin.Hx, &noise)
    }

    /// Rust source of the closed form part.
    pub fn source(&self) -> String {
        source::render(
            &format!("update_{}_terms", self.name),
            &self.tape,
            &self.input_names,
            &self.output_names,
        )
    }
}

/// The generated filter.
#[derive(Clone, Debug)]
pub struct Artifact {
    initial: KalmanState,
    predict: PredictProcedure,
    updates: Vec<UpdateProcedure>,
}

impl Artifact {
    pub(crate) fn new(initial: KalmanState, predict: PredictProcedure, updates: Vec<UpdateProcedure>) -> Self {
        Artifact {
            initial,
            predict,
            updates,
        }
    }

    /// The initial state and covariance, as given when the generator was opened.
    pub fn initial(&self) -> &KalmanState {
        &self.initial
    }

    pub fn predict(&self) -> &PredictProcedure {
        &self.predict
    }

    /// The update procedure of a measurement model, by model name or procedure name.
    ///
    /// A model named `name` is found before a procedure named `name`.
    pub fn update(&self, name: &str) -> Option<&UpdateProcedure> {
        self.updates.iter().find(|u| u.model_name() == name).or_else(|| {
            let model = name.strip_prefix("update_")?;
            self.updates.iter().find(|u| u.model_name() == model)
        })
    }

    pub fn updates(&self) -> &[UpdateProcedure] {
        &self.updates
    }

    /// Procedure names in generation order.
    pub fn procedure_names(&self) -> Vec<String> {
        let mut names = vec![self.predict.name().to_string()];
        names.extend(self.updates.iter().map(|u| u.name()));
        names
    }

    /// Rust source of the initial state and every procedure's closed form part.
    ///
    /// The emitted `*_terms` functions only evaluate `x'`, `F` and `q` of predict, and `y`, `H` and `G` or `R` of each
    /// update. The covariance algebra, `F P F' + Q`, the gain solve and `(I - K H) P`, is not emitted: it is done by
    /// [`PredictProcedure::apply`] and [`UpdateProcedure::apply`], or must be supplied by the code using the terms.
    pub fn to_source(&self) -> String {
        let n = self.initial.x.nrows();
        let mut src = String::new();
        let _ = writeln!(src, "// Generated extended Kalman filter terms: {}", self.procedure_names().join(", "));
        let _ = writeln!(src);
        let x0: Vec<String> = self.initial.x.iter().map(|v| source::literal(*v)).collect();
        let _ = writeln!(src, "pub const X0: [f64; {}] = [{}];", n, x0.join(", "));
        let _ = writeln!(src, "pub const P0: [[f64; {}]; {}] = [", n, n);
        for row in self.initial.X.row_iter() {
            let r: Vec<String> = row.iter().map(|v| source::literal(*v)).collect();
            let _ = writeln!(src, "    [{}],", r.join(", "));
        }
        let _ = writeln!(src, "];");
        let _ = writeln!(src);
        let _ = writeln!(src, "{}", self.predict.source());
        for update in &self.updates {
            let _ = writeln!(src, "{}", update.source());
        }
        src
    }
}
