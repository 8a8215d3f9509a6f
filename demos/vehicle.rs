//! Lane keeping vehicle model.
//!
//! Velocity, steering and lane position of a small car with a PWM driven brushed DC motor and a slewing steering servo.
//! The lane centerline is observed by a camera as a quadratic fit `a.x^2 + b.x + c`, the yaw rate by a gyroscope.

#![allow(dead_code)]

use bayes_ekfgen::{Artifact, EkfGen, ExprId, GenResult, Graph, KalmanState, MeasurementModel, MeasurementNoise};
use nalgebra::DVector;

pub const STATE_NAMES: &str = "v, delta, y_e, psi_e, kappa, ml_1, ml_2, ml_3, srv_a, srv_b, srv_r, srvfb_a, srvfb_b, o_g";

pub struct Vehicle {
    pub graph: Graph,
    pub state: Vec<ExprId>,
    /// Motor and steering control inputs `[u_M, u_delta]`
    pub u: Vec<ExprId>,
    pub dt: ExprId,
    pub f: Vec<ExprId>,
    pub q: Vec<ExprId>,
    pub centerline: MeasurementModel,
    pub imu: MeasurementModel,
}

impl Vehicle {
    pub fn new(centerline_noise: MeasurementNoise) -> Vehicle {
        let mut g = Graph::new();
        let x = g.symbols(STATE_NAMES);
        let (v, delta, y_e, psi_e, kappa) = (x[0], x[1], x[2], x[3], x[4]);
        let (ml_1, ml_2, ml_3) = (x[5], x[6], x[7]);
        let (srv_a, srv_b, srv_r) = (x[8], x[9], x[10]);
        let o_g = x[13];
        let dt = g.symbol("Delta_t");
        let u_delta = g.symbol("u_delta");
        let u_m = g.symbol("u_M");

        // Motor constants are kept as logarithms so they stay positive
        let k1 = g.exp(ml_1);
        let k2 = g.exp(ml_2);
        let k3 = g.exp(ml_3);

        // The speed controller either drives (u_M > 0) or brakes with duty cycle |u_M|
        let u_dc = g.abs(u_m);
        let u_v = g.heaviside(u_m);
        let drive = g.mul(u_v, u_dc);
        let drive = g.mul(drive, k1);
        let emf = g.mul(u_dc, v);
        let emf = g.mul(emf, k2);
        let friction = g.mul(v, k3);
        let acc = g.sub(drive, emf);
        let acc = g.sub(acc, friction);
        let dv = g.mul(dt, acc);
        let half = g.constant(0.5);
        let half_dv = g.mul(dv, half);
        let av = g.add(v, half_dv);

        // Servo slews linearly towards srv_a.u_delta + srv_b at rate srv_r
        let target = g.mul(srv_a, u_delta);
        let target = g.add(target, srv_b);
        let error = g.sub(target, delta);
        let slew = g.mul(dt, srv_r);
        let distance = g.abs(error);
        let step = g.min(slew, distance);
        let direction = g.sign(error);
        let ddelta = g.mul(step, direction);

        // Curvilinear unicycle kinematics
        let travel = g.mul(dt, av);
        let sin_psi = g.sin(psi_e);
        let lateral = g.mul(travel, sin_psi);
        let cos_psi = g.cos(psi_e);
        let along = g.mul(kappa, cos_psi);
        let one = g.one();
        let k_y = g.mul(kappa, y_e);
        let scale = g.sub(one, k_y);
        let line_rate = g.div(along, scale);
        let yaw_rate = g.add(delta, line_rate);
        let heading = g.mul(travel, yaw_rate);

        let mut f = vec![
            g.add(v, dv),
            g.add(delta, ddelta),
            g.add(y_e, lateral),
            g.add(psi_e, heading),
        ];
        f.extend_from_slice(&x[4..]);

        let q = [4., 2., 1., 1., 10., 1e-1, 1e-2, 1e-2, 1e-2, 1e-2, 1e-2, 1e-3, 1e-5, 1e-3]
            .iter()
            .map(|q| g.constant(*q))
            .collect();

        let z = g.symbols("a b c");
        let (a, b, c) = (z[0], z[1], z[2]);
        let offset = g.neg(c);
        let angle = g.atan(b);
        let b2 = g.powf(b, 2.);
        let b2_1 = g.add(b2, one);
        let norm = g.powf(b2_1, -1.5);
        let two = g.constant(2.);
        let two_a = g.mul(two, a);
        let curvature = g.mul(two_a, norm);
        let centerline = MeasurementModel {
            expected: vec![y_e, psi_e, kappa],
            transform: vec![offset, angle, curvature],
            z: z.clone(),
            noise: centerline_noise,
        };

        // Steering is backwards from yaw rate
        let g_z = g.symbol("g_z");
        let v_delta = g.mul(v, delta);
        let minus_v_delta = g.neg(v_delta);
        let yaw = g.add(minus_v_delta, o_g);
        let gyro_noise = g.constant(1e-2);
        let imu = MeasurementModel::direct(vec![yaw], vec![g_z], MeasurementNoise::Modelled(vec![vec![gyro_noise]]));

        Vehicle {
            graph: g,
            state: x,
            u: vec![u_m, u_delta],
            dt,
            f,
            q,
            centerline,
            imu,
        }
    }

    /// The default initial state, motor constants overestimated for a slow start.
    pub fn initial() -> KalmanState {
        let ml_1 = (5000. * std::f64::consts::PI * 0.101 / 40.).ln();
        let x0 = DVector::from_vec(vec![
            0., 0., 0., 0., 0., ml_1, 4f64.ln(), 1f64.ln(), 1.0, 0., 3.0, -60., 117., 0.,
        ]);
        let sd = DVector::from_vec(vec![
            1., 0.1, 2., 1., 1., 0.25, 0.25, 0.25, 0.1, 0.1, 0.1, 50., 10., 1.,
        ]);
        KalmanState::from_variances(x0, &sd.component_mul(&sd))
    }

    /// Generates the `predict`, `update_centerline` and `update_imu` procedures.
    pub fn generate(&self) -> GenResult<Artifact> {
        let mut gen = EkfGen::new(self.graph.clone());
        gen.open(&self.state, Vehicle::initial())?;
        gen.generate_predict(&self.f, &self.u, &self.q, self.dt)?;
        gen.generate_measurement("centerline", &self.centerline)?;
        gen.generate_measurement("imu", &self.imu)?;
        gen.close()
    }
}
