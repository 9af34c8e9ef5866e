//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use std::fmt;
use thiserror::Error;
use crate::controller::RunState;

/// Returned from operations on lattice storage and wavefunctions.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GridError {
    /// Returned when a lattice shape is empty or has a zero-length axis.
    #[error("lattice shapes must be non-empty with non-zero axes; got {0:?}")]
    InvalidShape(Vec<usize>),

    /// Returned when a non-positive or non-finite lattice spacing is
    /// encountered.
    #[error("lattice spacing must be positive and finite; got {0}")]
    BadSpacing(f64),

    /// Returned when a multi-index has the wrong rank or falls outside the
    /// lattice.
    #[error("index {index:?} is out of range for lattice of shape {shape:?}")]
    IndexOutOfRange { index: Vec<usize>, shape: Vec<usize> },

    /// Returned when a pointwise operation encounters lattices of different
    /// shapes.
    #[error("encountered lattices with incompatible shapes; got {0:?} and {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Returned when a lattice rank does not correspond to one or two
    /// particles in two dimensions.
    #[error("wavefunctions must have 2 (one particle) or 4 (two particles) axes; got {0}")]
    BadParticleCount(usize),

    /// Returned when a non-positive or non-finite particle mass is
    /// encountered.
    #[error("particle masses must be positive and finite; got {0}")]
    BadMass(f64),

    /// Returned when a damping layer is given a negative or non-finite width,
    /// or a factor outside `[0, 1]`.
    #[error("damping width must be finite and non-negative and factor must lie in [0, 1]; got width {width}, factor {factor}")]
    BadDamping { width: f64, factor: f64 },

    /// Returned when a wavefunction with zero norm is renormalized.
    #[error("cannot renormalize a wavefunction with zero norm")]
    ZeroNorm,
}

impl GridError {
    pub(crate) fn check_shape(shape: &[usize]) -> Result<(), Self> {
        (!shape.is_empty() && shape.iter().all(|n| *n > 0))
            .then_some(())
            .ok_or_else(|| Self::InvalidShape(shape.to_vec()))
    }

    pub(crate) fn check_spacing(spacing: f64) -> Result<(), Self> {
        (spacing.is_finite() && spacing > 0.0)
            .then_some(())
            .ok_or(Self::BadSpacing(spacing))
    }

    pub(crate) fn check_same_shape(a: &[usize], b: &[usize])
        -> Result<(), Self>
    {
        (a == b).then_some(())
            .ok_or_else(|| Self::ShapeMismatch(a.to_vec(), b.to_vec()))
    }

    pub(crate) fn check_damping(width: f64, factor: f64) -> Result<(), Self> {
        (width.is_finite() && width >= 0.0 && (0.0..=1.0).contains(&factor))
            .then_some(())
            .ok_or(Self::BadDamping { width, factor })
    }

    pub(crate) fn check_mass(mass: f64) -> Result<(), Self> {
        (mass.is_finite() && mass > 0.0)
            .then_some(())
            .ok_or(Self::BadMass(mass))
    }
}

/// A single violated constraint in a [`SimConfig`][crate::config::SimConfig].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigViolation {
    #[error("grid size along axis {axis} must be at least 1; got {size}")]
    BadGridSize { axis: usize, size: usize },

    #[error("lattice spacing must be positive and finite; got {0}")]
    BadSpacing(f64),

    #[error("expected 1 or 2 particles; got {0}")]
    BadParticleCount(usize),

    #[error("mass of particle {particle} must be positive and finite; got {mass}")]
    BadMass { particle: usize, mass: f64 },

    #[error("packet width of particle {particle} must be positive and finite; got {width:?}")]
    BadPacketWidth { particle: usize, width: [f64; 2] },

    #[error("packet parameters of particle {particle} must be finite")]
    NonFinitePacket { particle: usize },

    #[error("time step must be positive and finite; got {0}")]
    BadTimeStep(f64),

    #[error("total time must be finite and no less than the time step ({dt}); got {total}")]
    BadTotalTime { total: f64, dt: f64 },

    #[error("frame count must be between 1 and the total step count ({steps}); got {frames}")]
    BadFrameCount { frames: usize, steps: usize },

    #[error("damping border width must be finite, non-negative, and less than {limit} sites; got {width}")]
    BadDampingWidth { width: f64, limit: f64 },

    #[error("damping factor must lie in [0, 1]; got {0}")]
    BadDampingFactor(f64),

    #[error("worker thread count must be at least 1")]
    BadThreadCount,

    #[error("initial wavefunction has shape {got:?}; configuration requires {expected:?}")]
    WaveFunctionShape { expected: Vec<usize>, got: Vec<usize> },

    #[error("initial wavefunction has lattice spacing {got}; configuration requires {expected}")]
    WaveFunctionSpacing { expected: f64, got: f64 },

    #[error("initial wavefunction has masses {got:?}; configuration requires {expected:?}")]
    WaveFunctionMasses { expected: Vec<f64>, got: Vec<f64> },
}

/// Returned when a [`SimConfig`][crate::config::SimConfig] fails validation.
///
/// Holds every violated constraint, not just the first.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("invalid configuration: {}", list_violations(.0))]
pub struct ConfigError(pub Vec<ConfigViolation>);

fn list_violations(violations: &[ConfigViolation]) -> String {
    violations.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub(crate) fn check(violations: Vec<ConfigViolation>) -> Result<(), Self> {
        violations.is_empty().then_some(()).ok_or(Self(violations))
    }
}

/// Reason a potential-energy function failed at a single lattice site.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PotentialFault {
    /// The function itself reported an error.
    #[error("potential function raised: {0}")]
    Raised(String),

    /// The function returned NaN or ±∞.
    #[error("potential function returned a non-finite value ({0})")]
    NonFinite(f64),
}

/// Returned when the potential could not be sampled over the lattice.
///
/// `coords` holds the spatial coordinates of the offending site: `[x, y]` for
/// one particle or `[x1, y1, x2, y2]` when the two-particle interaction term
/// failed.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("potential evaluation failed at {coords:?}, t = {time}: {fault}")]
pub struct PotentialError {
    pub coords: Vec<f64>,
    pub time: f64,
    pub fault: PotentialFault,
}

/// Returned from time-dependent propagation and run control.
#[derive(Debug, Error)]
pub enum TError {
    /// [`ConfigError`]
    #[error("{0}")]
    InvalidConfig(#[from] ConfigError),

    /// [`PotentialError`]
    #[error("{0}")]
    PotentialEvaluation(#[from] PotentialError),

    /// Returned when NaN or ±∞ appears in the wavefunction after a step,
    /// usually because the time step is too large for the potential or kinetic
    /// energy scale.
    #[error("numeric instability detected after step {step} (t = {time}); try a smaller time step")]
    NumericInstability { step: usize, time: f64 },

    /// Returned when stepping a propagator that has already faulted.
    #[error("propagator has faulted and cannot be stepped further")]
    Faulted,

    /// Returned when a run is started from a state other than
    /// [`RunState::Ready`].
    #[error("run controller must be ready to start; currently {0}")]
    BadState(RunState),

    /// [`GridError`]
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Returned when the worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}
