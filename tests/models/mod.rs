//! Models shared by the generator tests.
//!
//! The lane keeping [`vehicle`] model is shared with the demo. Small models with known closed form filter equations
//! are defined here.

#![allow(dead_code, non_snake_case)]

use std::collections::HashMap;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use bayes_ekfgen::diff::{central_difference, jacobian};
use bayes_ekfgen::{Artifact, EkfGen, ExprId, Graph, KalmanState, MeasurementModel, MeasurementNoise};

#[path = "../../demos/vehicle.rs"]
pub mod vehicle;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn bind(symbols: &[ExprId], values: &[f64]) -> HashMap<ExprId, f64> {
    symbols.iter().cloned().zip(values.iter().cloned()).collect()
}

/// Asserts the symbolic Jacobian of `f` matches its central finite difference at `point`.
pub fn assert_jacobian(graph: &Graph, f: &[ExprId], vars: &[ExprId], point: &HashMap<ExprId, f64>) {
    let mut graph = graph.clone();
    let symbolic = jacobian(&mut graph, f, vars).unwrap();
    let numeric = central_difference(&graph, f, vars, point, 1e-6).unwrap();
    for (i, row) in symbolic.iter().enumerate() {
        for (j, d) in row.iter().enumerate() {
            let value = graph.eval(*d, point).unwrap();
            assert_relative_eq!(value, numeric[(i, j)], epsilon = 1e-6, max_relative = 1e-4);
        }
    }
}

/// The velocity model: `v' = v + dt.(k1 - k2.v)`, `delta' = delta` with unit process noise.
pub struct Velocity {
    pub gen: EkfGen,
    pub state: Vec<ExprId>,
    pub dt: ExprId,
    pub f: Vec<ExprId>,
    pub q: Vec<ExprId>,
}

pub fn velocity(k1: f64, k2: f64) -> Velocity {
    let mut g = Graph::new();
    let state = g.symbols("v delta");
    let (v, delta) = (state[0], state[1]);
    let dt = g.symbol("dt");
    let k1 = g.constant(k1);
    let k2 = g.constant(k2);
    let k2v = g.mul(k2, v);
    let acc = g.sub(k1, k2v);
    let dv = g.mul(dt, acc);
    let f = vec![g.add(v, dv), delta];
    let one = g.one();
    Velocity {
        gen: EkfGen::new(g),
        state,
        dt,
        f,
        q: vec![one, one],
    }
}

/// A linear random walk `f(x) = x`, observed directly `h(x) = x`.
pub fn random_walk(initial: KalmanState, q: &[f64]) -> Artifact {
    let n = initial.x.nrows();
    let mut g = Graph::new();
    let names: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
    let state = g.symbols(&names.join(" "));
    let z_names: Vec<String> = (0..n).map(|i| format!("z{}", i)).collect();
    let z = g.symbols(&z_names.join(" "));
    let dt = g.symbol("dt");
    let q: Vec<ExprId> = q.iter().map(|q| g.constant(*q)).collect();

    let mut gen = EkfGen::new(g);
    gen.open(&state, initial).unwrap();
    gen.generate_predict(&state, &[], &q, dt).unwrap();
    let model = MeasurementModel::direct(state.clone(), z, MeasurementNoise::Supplied);
    gen.generate_measurement("position", &model).unwrap();
    gen.close().unwrap()
}

/// Linear Kalman filter equations computed with an explicit inverse.
pub fn linear_update(
    x: &DVector<f64>,
    P: &DMatrix<f64>,
    H: &DMatrix<f64>,
    z: &DVector<f64>,
    R: &DMatrix<f64>,
) -> (DVector<f64>, DMatrix<f64>) {
    let S = H * P * H.transpose() + R;
    let K = P * H.transpose() * S.try_inverse().unwrap();
    let I = DMatrix::<f64>::identity(x.nrows(), x.nrows());
    (x + &K * (z - H * x), (I - &K * H) * P)
}
