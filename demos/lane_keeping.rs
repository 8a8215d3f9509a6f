//! Generates the lane keeping filter and runs one predict and update cycle.
//!
//! Run with `RUST_LOG=debug` to see the transition increments and Jacobian statistics.

#![allow(non_snake_case)]

use nalgebra::{dmatrix, dvector};

use bayes_ekfgen::MeasurementNoise;

#[path = "vehicle.rs"]
mod vehicle;

fn main() {
    env_logger::init();

    let model = vehicle::Vehicle::new(MeasurementNoise::SuppliedRaw);
    let filter = match model.generate() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("generation failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("procedures: {}", filter.procedure_names().join(", "));

    let mut estimate = filter.initial().clone();
    println!("Initial x{:.3}", estimate.x.transpose());

    // Half throttle, slight left steering, 30 frames per second
    let u = dvector![0.5, 0.1];
    filter.predict().apply(&mut estimate, &u, 1. / 30.).unwrap();
    println!("Predict x{:.3}", estimate.x.transpose());

    // Centerline fit slightly to the left, with its raw fit covariance
    let z = dvector![0.01, 0.05, -0.2];
    let R = dmatrix![1e-3, 0., 0.; 0., 1e-3, 0.; 0., 0., 1e-2];
    let centerline = filter.update("centerline").unwrap();
    centerline.apply(&mut estimate, &z, Some(&R)).unwrap();
    println!("Centerline x{:.3}", estimate.x.transpose());

    let imu = filter.update("imu").unwrap();
    imu.apply(&mut estimate, &dvector![0.02], None).unwrap();
    println!("IMU x{:.3}", estimate.x.transpose());

    println!();
    print!("{}", filter.to_source());
}
