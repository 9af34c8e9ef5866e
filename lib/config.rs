//! Simulation parameters.
//!
//! [`SimConfig`] is a plain struct with public fields; [`SimConfig::validate`]
//! checks every constraint at once and reports all of the violations, so that
//! a caller filling in a form can surface them together.
//!
//! ```
//! use tdse2d::config::SimConfig;
//!
//! let config = SimConfig { frames: 10, total_time: 5.0, ..SimConfig::default() };
//! config.validate().unwrap();
//! assert_eq!(config.total_steps(), 500);
//! assert_eq!(config.steps_per_frame(), 50);
//! ```

#[cfg(feature = "serde")]
use serde::{ Deserialize, Serialize };
use crate::{
    error::{ ConfigError, ConfigViolation },
    packet,
    propagator::TResult,
    wavefunction::WaveFunction,
};

/// Initial Gaussian wavepacket parameters for one particle.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Packet {
    /// Initial centre `(x₀, y₀)`.
    pub center: [f64; 2],
    /// Initial widths `(σx, σy)`.
    pub width: [f64; 2],
    /// Mean momentum `(px, py)`.
    pub momentum: [f64; 2],
}

impl Default for Packet {
    fn default() -> Self {
        Self { center: [40.0, 40.0], width: [10.0, 10.0], momentum: [0.5, 0.5] }
    }
}

/// A single particle: its mass and initial wavepacket.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    pub mass: f64,
    pub packet: Packet,
}

impl Default for Particle {
    fn default() -> Self { Self { mass: 1.0, packet: Packet::default() } }
}

/// Absorbing boundary parameters; see [`DampingLayer`][crate::damping::DampingLayer].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Damping {
    /// Border width in lattice sites.
    pub width: f64,
    /// Attenuation at the very edge, in `[0, 1]`.
    pub factor: f64,
}

impl Default for Damping {
    fn default() -> Self { Self { width: 0.0, factor: 0.1 } }
}

/// When the potential is sampled within each propagation step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PotentialSampling {
    /// Sample once at `t = 0` and reuse the result for every step.
    Static,
    /// Use `V(t)` for both half steps.
    StepStart,
    /// Use `V(t + dt/2)` for both half steps.
    #[default]
    Midpoint,
    /// Use `V(t)` for the first half step and `V(t + dt)` for the second.
    Endpoints,
}

/// Full set of parameters for a run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimConfig {
    /// Lattice sites `[nx, ny]` per particle.
    pub grid_size: [usize; 2],
    /// Lattice spacing.
    pub spacing: f64,
    /// One or two particles.
    pub particles: Vec<Particle>,
    /// Time step.
    pub dt: f64,
    /// Total simulated time.
    pub total_time: f64,
    /// Number of snapshots delivered over the run.
    pub frames: usize,
    pub damping: Damping,
    /// Distribute each step over a worker pool.
    pub multithread: bool,
    /// Worker pool size; `None` lets rayon decide.
    pub threads: Option<usize>,
    pub sampling: PotentialSampling,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_size: [256, 256],
            spacing: 1.0,
            particles: vec![Particle::default()],
            dt: 0.01,
            total_time: 1000.0,
            frames: 30,
            damping: Damping::default(),
            multithread: true,
            threads: None,
            sampling: PotentialSampling::default(),
        }
    }
}

// ratios within this many ulps of an integer count as that integer, so that
// e.g. 0.3 / 0.1 yields 3 steps rather than 2
const STEP_SNAP_ULPS: f64 = 4.0;

impl SimConfig {
    /// Number of propagation steps, `floor(total_time / dt)`.
    pub fn total_steps(&self) -> usize {
        if !(self.dt > 0.0 && self.total_time.is_finite()) { return 0; }
        let ratio = self.total_time / self.dt;
        if ratio <= 0.0 { return 0; }
        let nearest = ratio.round();
        if (ratio - nearest).abs() <= STEP_SNAP_ULPS * f64::EPSILON * ratio {
            nearest as usize
        } else {
            ratio.floor() as usize
        }
    }

    /// Steps between consecutive frames; the last frame absorbs the remainder.
    pub fn steps_per_frame(&self) -> usize {
        if self.frames == 0 { 0 } else { self.total_steps() / self.frames }
    }

    /// Step numbers (1-based count of completed steps) after which each frame
    /// is emitted.
    pub fn frame_steps(&self) -> Vec<usize> {
        let total = self.total_steps();
        let every = self.steps_per_frame();
        (1..=self.frames)
            .map(|f| if f == self.frames { total } else { f * every })
            .collect()
    }

    /// Spatial extent `[(nx - 1) dx, (ny - 1) dx]` of the domain.
    pub fn domain_extent(&self) -> [f64; 2] {
        [
            self.grid_size[0].saturating_sub(1) as f64 * self.spacing,
            self.grid_size[1].saturating_sub(1) as f64 * self.spacing,
        ]
    }

    /// Shape of the wavefunction lattice: `[nx, ny]` per particle.
    pub fn shape(&self) -> Vec<usize> {
        self.particles.iter()
            .flat_map(|_| self.grid_size)
            .collect()
    }

    pub fn masses(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.mass).collect()
    }

    /// Check every constraint, returning all violations together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check(self.violations())
    }

    fn violations(&self) -> Vec<ConfigViolation> {
        let mut v: Vec<ConfigViolation> = Vec::new();
        self.grid_size.iter().enumerate()
            .filter(|(_, n)| **n < 1)
            .for_each(|(axis, n)| {
                v.push(ConfigViolation::BadGridSize { axis, size: *n });
            });
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            v.push(ConfigViolation::BadSpacing(self.spacing));
        }
        if !(1..=2).contains(&self.particles.len()) {
            v.push(ConfigViolation::BadParticleCount(self.particles.len()));
        }
        for (k, p) in self.particles.iter().enumerate() {
            if !(p.mass.is_finite() && p.mass > 0.0) {
                v.push(ConfigViolation::BadMass { particle: k, mass: p.mass });
            }
            let w = p.packet.width;
            if !w.iter().all(|s| s.is_finite() && *s > 0.0) {
                v.push(ConfigViolation::BadPacketWidth { particle: k, width: w });
            }
            let finite = p.packet.center.iter()
                .chain(p.packet.momentum.iter())
                .all(|c| c.is_finite());
            if !finite {
                v.push(ConfigViolation::NonFinitePacket { particle: k });
            }
        }
        let dt_ok = self.dt.is_finite() && self.dt > 0.0;
        if !dt_ok {
            v.push(ConfigViolation::BadTimeStep(self.dt));
        }
        let total_ok
            = self.total_time.is_finite() && (!dt_ok || self.total_steps() >= 1);
        if !total_ok {
            v.push(ConfigViolation::BadTotalTime {
                total: self.total_time, dt: self.dt });
        }
        if dt_ok && total_ok {
            let steps = self.total_steps();
            if self.frames < 1 || self.frames > steps {
                v.push(ConfigViolation::BadFrameCount {
                    frames: self.frames, steps });
            }
        } else if self.frames < 1 {
            v.push(ConfigViolation::BadFrameCount { frames: 0, steps: 0 });
        }
        let limit = self.grid_size.iter().min().copied().unwrap_or(0) as f64 / 2.0;
        let width = self.damping.width;
        if !(width.is_finite() && width >= 0.0 && (width == 0.0 || width < limit)) {
            v.push(ConfigViolation::BadDampingWidth { width, limit });
        }
        let factor = self.damping.factor;
        if !(0.0..=1.0).contains(&factor) {
            v.push(ConfigViolation::BadDampingFactor(factor));
        }
        if self.threads == Some(0) {
            v.push(ConfigViolation::BadThreadCount);
        }
        v
    }

    /// Check that a wavefunction fits this configuration: its shape,
    /// spacing, and masses must all agree.
    pub fn validate_wavefunction(&self, wf: &WaveFunction) -> Result<(), ConfigError> {
        let mut v: Vec<ConfigViolation> = self.violations();
        let expected = self.shape();
        if wf.shape() != expected.as_slice() {
            v.push(ConfigViolation::WaveFunctionShape {
                expected, got: wf.shape().to_vec() });
        }
        if wf.spacing() != self.spacing {
            v.push(ConfigViolation::WaveFunctionSpacing {
                expected: self.spacing, got: wf.spacing() });
        }
        let masses = self.masses();
        if wf.masses() != masses.as_slice() {
            v.push(ConfigViolation::WaveFunctionMasses {
                expected: masses, got: wf.masses().to_vec() });
        }
        ConfigError::check(v)
    }

    /// Build the normalized Gaussian initial state described by
    /// [`Self::particles`].
    pub fn initial_wavefunction(&self) -> TResult<WaveFunction> {
        self.validate()?;
        packet::gaussian(self.grid_size, self.spacing, &self.particles)
    }
}
