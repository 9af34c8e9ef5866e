//! Gaussian wavepacket initial conditions.
//!
//! A freely evolving 2D Gaussian with initial centre **r**₀, widths σ, and mean
//! momentum **p** has the closed form (with ħ = 1)
//! ```text
//!                 σx σy              ⎛                       (x - x₀ - px t/m)²   (y - y₀ - py t/m)²⎞
//! ψ(x, y, t) = √(-------------) exp ⎜ i p·r - i t p²/2m - ------------------ - ------------------⎟
//!               π σx'² σy'²          ⎝                            2 σx'²               2 σy'²     ⎠
//! ```
//! where σ'² = σ² + i t / m. At t = 0 this is the initial packet; at later
//! times it is the exact free-particle solution, which makes it a useful
//! reference for the propagator.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    config::{ Packet, Particle },
    error::GridError,
    grid::ComplexGrid,
    propagator::TResult,
    wavefunction::WaveFunction,
};

/// Evaluate a freely evolving Gaussian wavepacket at position `(x, y)` and
/// time `t`.
pub fn free_gaussian_value(x: f64, y: f64, t: f64, packet: &Packet, mass: f64)
    -> C64
{
    let i = C64::i();
    let [x0, y0] = packet.center;
    let [sx, sy] = packet.width;
    let [px, py] = packet.momentum;
    let sx_eff2: C64 = sx * sx + i * (t / mass);
    let sy_eff2: C64 = sy * sy + i * (t / mass);
    let x_rel = x - x0 - px * t / mass;
    let y_rel = y - y0 - py * t / mass;
    let p2 = px * px + py * py;
    let arg: C64
        = i * (x * px + y * py)
        - i * (t * p2 / (2.0 * mass))
        - x_rel * x_rel / (2.0 * sx_eff2)
        - y_rel * y_rel / (2.0 * sy_eff2);
    let root_pi = PI.sqrt();
    let norm_x = (sx / (root_pi * sx_eff2)).sqrt();
    let norm_y = (sy / (root_pi * sy_eff2)).sqrt();
    norm_x * norm_y * arg.exp()
}

// sample a single particle's t = 0 packet over an [nx, ny] lattice
fn sample_packet(grid_size: [usize; 2], spacing: f64, particle: &Particle)
    -> nd::Array2<C64>
{
    nd::Array2::from_shape_fn(grid_size, |(i, j)| {
        free_gaussian_value(
            i as f64 * spacing,
            j as f64 * spacing,
            0.0,
            &particle.packet,
            particle.mass,
        )
    })
}

/// Build a normalized Gaussian initial state.
///
/// Two particles are placed in the (unentangled) product state
/// ψ(r1, r2) = ψ₁(r1) ψ₂(r2).
pub fn gaussian(grid_size: [usize; 2], spacing: f64, particles: &[Particle])
    -> TResult<WaveFunction>
{
    let masses: Vec<f64> = particles.iter().map(|p| p.mass).collect();
    let data: nd::ArrayD<C64> = match particles {
        [p] => sample_packet(grid_size, spacing, p).into_dyn(),
        [p1, p2] => {
            let a = sample_packet(grid_size, spacing, p1);
            let b = sample_packet(grid_size, spacing, p2);
            let [nx, ny] = grid_size;
            nd::Array4::from_shape_fn((nx, ny, nx, ny), |(i1, j1, i2, j2)| {
                a[[i1, j1]] * b[[i2, j2]]
            })
            .into_dyn()
        },
        _ => {
            return Err(GridError::BadParticleCount(2 * particles.len()).into());
        },
    };
    let mut wf = WaveFunction::new(ComplexGrid::from_array(data, spacing)?, &masses)?;
    wf.normalize()?;
    Ok(wf)
}
