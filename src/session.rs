//! The generator session.
//!
//! [`EkfGen`] is a state machine `Unopened -> Open -> Closed`.
//! The state vector and the initial state are fixed by `open`. While open the predict procedure is generated once,
//! then any number of uniquely named measurement procedures. `close` finishes the session and returns the
//! [`Artifact`].
//!
//! A failed call leaves the session as it was, a measurement is registered only once its procedure is generated.

use log::{debug, info};

use crate::artifact::{Artifact, PredictProcedure, UpdateProcedure};
use crate::builder::{predict_equations, update_equations};
use crate::diff::non_zeros;
use crate::emit::{emit_predict, emit_update};
use crate::error::{GenResult, GenerationError};
use crate::expr::{ExprId, Graph, Node};
use crate::models::{KalmanEstimator, KalmanState, MeasurementModel, MeasurementNoise};

/// Observable phase of a generator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Unopened,
    Open,
    Closed,
}

struct OpenSession {
    state: Vec<ExprId>,
    initial: KalmanState,
    predict: Option<PredictProcedure>,
    updates: Vec<UpdateProcedure>,
}

enum Phase {
    Unopened,
    Open(Box<OpenSession>),
    Closed,
}

/// Extended Kalman filter generator.
///
/// Expressions of the model are built in the generator's [`Graph`], see [`EkfGen::graph_mut`].
pub struct EkfGen {
    graph: Graph,
    phase: Phase,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Checks `symbols` are distinct symbols, distinct from `taken` as well.
fn declare(graph: &Graph, what: &str, symbols: &[ExprId], taken: &[ExprId]) -> GenResult<()> {
    for (i, s) in symbols.iter().enumerate() {
        if !matches!(graph.node(*s), Node::Symbol(_)) {
            return Err(GenerationError::NotASymbol {
                what: what.to_string(),
                expr: graph.display(*s).to_string(),
            });
        }
        if taken.contains(s) || symbols[..i].contains(s) {
            return Err(GenerationError::DuplicateSymbol(graph.display(*s).to_string()));
        }
    }
    Ok(())
}

impl EkfGen {
    /// A generator over the expressions of `graph`.
    pub fn new(graph: Graph) -> EkfGen {
        EkfGen {
            graph,
            phase: Phase::Unopened,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The expression graph, for building model expressions. Nodes are never removed.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.phase {
            Phase::Unopened => Lifecycle::Unopened,
            Phase::Open(_) => Lifecycle::Open,
            Phase::Closed => Lifecycle::Closed,
        }
    }

    /// The state vector, once opened.
    pub fn state(&self) -> Option<&[ExprId]> {
        match &self.phase {
            Phase::Open(session) => Some(&session.state),
            _ => None,
        }
    }

    fn not_open(&self) -> GenerationError {
        match self.phase {
            Phase::Closed => GenerationError::Closed,
            Phase::Open(_) => GenerationError::AlreadyOpen,
            Phase::Unopened => GenerationError::NotOpen,
        }
    }

    /// Opens the generator with the state vector and the initial state.
    ///
    /// The initial state is passed through to the artifact unchanged.
    pub fn open(&mut self, state: &[ExprId], initial: KalmanState) -> GenResult<()> {
        if !matches!(self.phase, Phase::Unopened) {
            return Err(self.not_open());
        }
        declare(&self.graph, "state", state, &[])?;
        let n = state.len();
        if n == 0 {
            return Err(GenerationError::Dimension {
                what: "state".to_string(),
                expected: 1,
                found: 0,
            });
        }
        if initial.x.nrows() != n {
            return Err(GenerationError::Dimension {
                what: "initial state".to_string(),
                expected: n,
                found: initial.x.nrows(),
            });
        }
        let mut checked = KalmanState::new_zero(n);
        let rcond = checked.init(&initial).map_err(GenerationError::InitialState)?;

        info!("open: {} states, initial covariance rcond {:e}", n, rcond);
        self.phase = Phase::Open(Box::new(OpenSession {
            state: state.to_vec(),
            initial: checked,
            predict: None,
            updates: Vec::new(),
        }));
        Ok(())
    }

    /// Generates the predict procedure of transition `f(x, u, dt)` with process noise variances `q`.
    ///
    /// `u` are the input symbols in the order of the `u` vector passed to predict, `dt` the elapsed time symbol.
    /// The process noise may depend on state, inputs and `dt`.
    pub fn generate_predict(&mut self, f: &[ExprId], u: &[ExprId], q: &[ExprId], dt: ExprId) -> GenResult<()> {
        let graph = &mut self.graph;
        let session = match &mut self.phase {
            Phase::Open(session) => session,
            Phase::Unopened => return Err(GenerationError::NotOpen),
            Phase::Closed => return Err(GenerationError::Closed),
        };
        if session.predict.is_some() {
            return Err(GenerationError::PredictAlreadyGenerated);
        }

        declare(graph, "input", u, &session.state)?;
        declare(graph, "dt", &[dt], &session.state)?;
        if u.contains(&dt) {
            return Err(GenerationError::DuplicateSymbol(graph.display(dt).to_string()));
        }
        let mut declared = session.state.clone();
        declared.extend_from_slice(u);
        declared.push(dt);
        graph.check_declared(f, &declared, "transition")?;
        graph.check_declared(q, &declared, "process noise")?;

        let eq = predict_equations(graph, &session.state, f, q)?;
        let procedure = emit_predict(graph, &session.state, u, dt, &eq)?;

        for (x, fx) in session.state.iter().zip(f.iter()) {
            let increment = graph.sub(*fx, *x);
            debug!("predict: d{} = {}", graph.display(*x), graph.display(increment));
        }
        debug!(
            "predict: {} non-zero Jacobian entries, {} instructions",
            non_zeros(graph, &eq.F),
            procedure.tape().instructions().len()
        );
        session.predict = Some(procedure);
        Ok(())
    }

    /// Generates the update procedure `update_<name>` of a measurement model.
    pub fn generate_measurement(&mut self, name: &str, model: &MeasurementModel) -> GenResult<()> {
        let graph = &mut self.graph;
        let session = match &mut self.phase {
            Phase::Open(session) => session,
            Phase::Unopened => return Err(GenerationError::NotOpen),
            Phase::Closed => return Err(GenerationError::Closed),
        };
        if session.predict.is_none() {
            return Err(GenerationError::PredictNotGenerated);
        }
        if !is_identifier(name) {
            return Err(GenerationError::InvalidName(name.to_string()));
        }
        if session.updates.iter().any(|u| u.model_name() == name) {
            return Err(GenerationError::DuplicateMeasurement(name.to_string()));
        }

        declare(graph, &format!("measurement `{}`", name), &model.z, &session.state)?;
        let context = format!("measurement `{}`", name);
        graph.check_declared(&model.expected, &session.state, &format!("expected {}", context))?;
        graph.check_declared(&model.transform, &model.z, &format!("transform of {}", context))?;
        if let MeasurementNoise::Modelled(noise) = &model.noise {
            let mut declared = session.state.clone();
            declared.extend_from_slice(&model.z);
            let entries: Vec<ExprId> = noise.iter().flatten().cloned().collect();
            graph.check_declared(&entries, &declared, &format!("noise of {}", context))?;
        }

        let eq = update_equations(graph, name, &session.state, model)?;
        let procedure = emit_update(graph, name, &session.state, &model.z, &eq)?;

        debug!(
            "{}: {} non-zero Jacobian entries, {} instructions",
            procedure.name(),
            non_zeros(graph, &eq.H),
            procedure.tape().instructions().len()
        );
        session.updates.push(procedure);
        Ok(())
    }

    /// Closes the generator and returns the generated procedures.
    pub fn close(&mut self) -> GenResult<Artifact> {
        let session = match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Open(session) => session,
            other => {
                self.phase = other;
                return Err(self.not_open());
            }
        };
        let OpenSession {
            state,
            initial,
            predict,
            updates,
        } = *session;
        let predict = match predict {
            Some(predict) => predict,
            None => {
                self.phase = Phase::Open(Box::new(OpenSession {
                    state,
                    initial,
                    predict: None,
                    updates,
                }));
                return Err(GenerationError::PredictNotGenerated);
            }
        };

        let artifact = Artifact::new(initial, predict, updates);
        info!("close: generated {}", artifact.procedure_names().join(", "));
        Ok(artifact)
    }
}
