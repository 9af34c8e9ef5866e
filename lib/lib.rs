//! Provides a pseudo-spectral engine for the time-dependent Schrödinger
//! equation (TDSE) for one or two particles moving in two dimensions under an
//! arbitrary, possibly time-dependent potential.
//!
//! The pieces are:
//! - Lattice storage ([`grid`]) and multi-dimensional FFTs ([`spectral`])
//! - Potential functions and their evaluation over the lattice
//!   ([`potential`]), with a few ready-made barriers
//! - An absorbing boundary layer ([`damping`])
//! - Second-order split-operator stepping ([`propagator`])
//! - Wavefunctions and their observables ([`wavefunction`]), and Gaussian
//!   initial states ([`packet`])
//! - Run parameters ([`config`]) and a run controller delivering periodic
//!   snapshots with pause/resume/cancel support ([`controller`])
//!
//! Work within each step is spread over a rayon thread pool when
//! multithreading is enabled.
//!
//! ```
//! use tdse2d::{
//!     config::SimConfig,
//!     controller::{ Frame, RunController },
//!     potential::Cylinder,
//! };
//!
//! let config = SimConfig {
//!     grid_size: [64, 64],
//!     dt: 0.5,
//!     total_time: 10.0,
//!     frames: 4,
//!     ..SimConfig::default()
//! };
//! let initial = config.initial_wavefunction().unwrap();
//! let controller = RunController::new(config, Cylinder::default());
//! let mut norms: Vec<f64> = Vec::new();
//! controller.run(initial, &mut |frame: Frame| norms.push(frame.wf.norm())).unwrap();
//! assert_eq!(norms.len(), 4);
//! assert!(norms.iter().all(|n| (n - 1.0).abs() < 1e-9));
//! ```
//!
//! See [`docs`] for theoretical background.

pub mod error;
pub mod utils;
pub mod grid;
pub mod spectral;
pub mod potential;
pub mod damping;
pub mod wavefunction;
pub mod packet;
pub mod config;
pub mod propagator;
pub mod controller;

pub mod docs;

pub use crate::{
    config::SimConfig,
    controller::{ Frame, Observer, RunController, RunHandle, RunState, RunSummary },
    error::TError,
    propagator::TResult,
    wavefunction::WaveFunction,
};
