//! Test the symbolic Jacobians of the lane keeping vehicle model against central finite differences.
//!
//! Interior points are drawn from a seeded generator. The throttle reversal `u_M = 0` is tested as the boundary of the
//! Heaviside and absolute value primitives.

#![allow(non_snake_case)]

use std::collections::HashMap;

use approx::assert_relative_eq;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bayes_ekfgen::diff::central_difference;
use bayes_ekfgen::{ExprId, MeasurementNoise};
use models::vehicle::Vehicle;
use models::*;

mod models;

const DT: f64 = 1. / 30.;

fn sample_state(rng: &mut StdRng) -> Vec<f64> {
    vec![
        rng.gen_range(0.5..5.),
        rng.gen_range(-0.5..0.5),
        rng.gen_range(-0.3..0.3),
        rng.gen_range(-0.5..0.5),
        rng.gen_range(-0.5..0.5),
        rng.gen_range(-1.0..2.),
        rng.gen_range(-1.0..2.),
        rng.gen_range(-1.0..1.),
        rng.gen_range(0.5..1.5),
        rng.gen_range(-0.2..0.2),
        rng.gen_range(1.0..4.),
        rng.gen_range(-70.0..-50.),
        rng.gen_range(100.0..130.),
        rng.gen_range(-0.1..0.1),
    ]
}

fn point(model: &Vehicle, x: &[f64], u_m: f64, u_delta: f64) -> HashMap<ExprId, f64> {
    let mut point = bind(&model.state, x);
    point.extend(bind(&model.u, &[u_m, u_delta]));
    point.insert(model.dt, DT);
    point
}

#[test]
fn transition_interior() {
    init_logging();
    let model = Vehicle::new(MeasurementNoise::Supplied);
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..20 {
        let x = sample_state(&mut rng);
        let u_m = rng.gen_range(-1.0..1.);
        let u_delta = rng.gen_range(-1.0..1.);
        assert_jacobian(&model.graph, &model.f, &model.state, &point(&model, &x, u_m, u_delta));
    }
}

#[test]
fn transition_at_throttle_reversal() {
    let model = Vehicle::new(MeasurementNoise::Supplied);
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..5 {
        let x = sample_state(&mut rng);
        let at = point(&model, &x, 0., rng.gen_range(-1.0..1.));
        assert_jacobian(&model.graph, &model.f, &model.state, &at);

        // No drive or braking at zero throttle, only friction
        let v_next = model.graph.eval(model.f[0], &at).unwrap();
        assert_relative_eq!(v_next, x[0] - DT * x[0] * x[7].exp(), max_relative = 1e-12);
    }
}

#[test]
fn generated_predict_matches_finite_difference() {
    let model = Vehicle::new(MeasurementNoise::SuppliedRaw);
    let filter = model.generate().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    for u_m in [0., 0.4, -0.4].iter() {
        let x = sample_state(&mut rng);
        let u_delta = rng.gen_range(-1.0..1.);
        let at = point(&model, &x, *u_m, u_delta);

        let (x_pred, F, q) = filter
            .predict()
            .linearise(&DVector::from_vec(x.clone()), &DVector::from_vec(vec![*u_m, u_delta]), DT)
            .unwrap();
        let numeric = central_difference(&model.graph, &model.f, &model.state, &at, 1e-6).unwrap();
        assert_relative_eq!(F, numeric, epsilon = 1e-6, max_relative = 1e-4);

        let exact = model.graph.eval_many(&model.f, &at).unwrap();
        assert_relative_eq!(x_pred, DVector::from_vec(exact), max_relative = 1e-12);
        assert_relative_eq!(q.q[4], 10.);
    }
}

#[test]
fn measurement_jacobians() {
    let model = Vehicle::new(MeasurementNoise::SuppliedRaw);
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..10 {
        let x = sample_state(&mut rng);
        let z = [rng.gen_range(-0.1..0.1), rng.gen_range(-1.0..1.), rng.gen_range(-0.5..0.5)];
        let mut at = bind(&model.state, &x);
        at.extend(bind(&model.centerline.z, &z));

        assert_jacobian(&model.graph, &model.centerline.expected, &model.state, &at);
        assert_jacobian(&model.graph, &model.centerline.transform, &model.centerline.z, &at);
        assert_jacobian(&model.graph, &model.imu.expected, &model.state, &at);
    }
}

#[test]
fn transition_at_servo_target() {
    let model = Vehicle::new(MeasurementNoise::SuppliedRaw);
    let filter = model.generate().unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let mut x = sample_state(&mut rng);
    // srv_a.u_delta + srv_b - delta = 0
    x[1] = 0.25;
    x[8] = 1.;
    x[9] = 0.;
    x[10] = 3.;
    let at = point(&model, &x, 0.4, 0.25);

    // The servo error subgradients are zero, the steering angle is held
    let (x_pred, F, _) = filter
        .predict()
        .linearise(&DVector::from_vec(x.clone()), &DVector::from_vec(vec![0.4, 0.25]), DT)
        .unwrap();
    assert_eq!(x_pred[1], 0.25);
    for j in 0..x.len() {
        assert_eq!(F[(1, j)], if j == 1 { 1. } else { 0. }, "F[1][{}]", j);
    }

    // A finite difference sees the servo slewing back to its target
    let numeric = central_difference(&model.graph, &model.f, &model.state, &at, 1e-6).unwrap();
    assert!(numeric[(1, 1)].abs() < 1e-6);
}
