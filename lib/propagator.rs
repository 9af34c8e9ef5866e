//! Split-operator time stepping for the time-dependent Schrödinger equation.
//!
//! Each call to [`Propagator::step`] advances a wavefunction by one time step
//! Δt with the symmetrized (Strang) splitting
//! ```text
//! ψ(t + Δt) ≈ D exp(-i V' Δt/2) F⁻¹ exp(-i T(k) Δt) F exp(-i V Δt/2) ψ(t)
//! ```
//! where *F* is the spectral transform, *T*(*k*) = Σₚ |**k**ₚ|²/2*m*ₚ is the
//! kinetic energy of every particle in momentum space, and *D* is the
//! (non-unitary) damping layer. The potentials *V* and *V'* used for the two
//! half steps depend on the [`PotentialSampling`] mode. See [`docs`][crate::docs]
//! for background.

use std::sync::Arc;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    config::{ PotentialSampling, SimConfig },
    damping::DampingLayer,
    error::{ ConfigError, ConfigViolation, GridError, TError },
    potential::{ Interaction, Potential, PotentialSampler },
    spectral::SpectralTransform,
    utils::{ wavenumbers, zip_for_each },
    wavefunction::WaveFunction,
};

pub type TResult<T> = Result<T, TError>;

/// Lifecycle of a [`Propagator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropagatorState {
    /// Between steps.
    Idle,
    /// In the middle of a step.
    Stepping,
    /// A step failed; the propagator cannot be used again.
    Faulted,
}

/// Advances a wavefunction in time, one step at a time.
///
/// All precomputation (FFT plans, kinetic phases, damping multipliers) happens
/// in [`Propagator::new`], so that each step only samples the potential and
/// applies the split operator.
#[derive(Clone, Debug)]
pub struct Propagator {
    dt: f64,
    spacing: f64,
    masses: Vec<f64>,
    sampling: PotentialSampling,
    sampler: PotentialSampler,
    fft: SpectralTransform,
    damping: DampingLayer,
    kinetic: Vec<nd::Array1<C64>>,
    static_v: Option<nd::ArrayD<f64>>,
    carried_v: Option<(usize, nd::ArrayD<f64>)>,
    steps: usize,
    norm: f64,
    state: PropagatorState,
    parallel: bool,
}

// per-axis kinetic phase factors exp(-i k² dt / 2m)
fn kinetic_phases(n: usize, dx: f64, mass: f64, dt: f64) -> nd::Array1<C64> {
    wavenumbers(n, dx)
        .mapv(|k| C64::cis(-k.powi(2) / (2.0 * mass) * dt))
}

impl Propagator {
    /// Set up a propagator for the given configuration.
    ///
    /// `interaction` is ignored unless the configuration describes two
    /// particles.
    pub fn new(
        config: &SimConfig,
        potential: Arc<dyn Potential>,
        interaction: Option<Arc<dyn Interaction>>,
    ) -> TResult<Self>
    {
        config.validate()?;
        let masses = config.masses();
        let shape = config.shape();
        let parallel = config.multithread;
        let sampler = PotentialSampler::new(
            config.grid_size,
            config.spacing,
            &masses,
            potential,
            interaction,
            parallel,
        )?;
        let fft = SpectralTransform::new(&shape, parallel)?;
        let damping = DampingLayer::new(
            &shape, config.damping.width, config.damping.factor, parallel)?;
        let kinetic: Vec<nd::Array1<C64>>
            = shape.iter().enumerate()
            .map(|(axis, n)| {
                kinetic_phases(*n, config.spacing, masses[axis / 2], config.dt)
            })
            .collect();
        log::debug!(
            "propagator ready: shape {:?}, dt = {}, sampling {:?}, damping {}",
            shape,
            config.dt,
            config.sampling,
            if damping.is_identity() { "off" } else { "on" },
        );
        Ok(Self {
            dt: config.dt,
            spacing: config.spacing,
            masses,
            sampling: config.sampling,
            sampler,
            fft,
            damping,
            kinetic,
            static_v: None,
            carried_v: None,
            steps: 0,
            norm: f64::NAN,
            state: PropagatorState::Idle,
            parallel,
        })
    }

    pub fn state(&self) -> PropagatorState { self.state }

    pub fn dt(&self) -> f64 { self.dt }

    /// Number of completed steps.
    pub fn steps(&self) -> usize { self.steps }

    /// Current simulation time, `steps × dt`.
    pub fn time(&self) -> f64 { self.steps as f64 * self.dt }

    /// Norm of the wavefunction after the most recent step, or NaN before
    /// the first.
    pub fn norm(&self) -> f64 { self.norm }

    pub fn damping(&self) -> &DampingLayer { &self.damping }

    /// Advance `wf` by one time step in place.
    ///
    /// Any error moves the propagator to [`PropagatorState::Faulted`], after
    /// which every call returns [`TError::Faulted`].
    pub fn step(&mut self, wf: &mut WaveFunction) -> TResult<()> {
        if self.state == PropagatorState::Faulted {
            return Err(TError::Faulted);
        }
        self.state = PropagatorState::Stepping;
        match self.do_step(wf) {
            Ok(()) => {
                self.state = PropagatorState::Idle;
                Ok(())
            },
            Err(err) => {
                self.state = PropagatorState::Faulted;
                Err(err)
            },
        }
    }

    fn check_wavefunction(&self, wf: &WaveFunction) -> TResult<()> {
        GridError::check_same_shape(self.fft.shape(), wf.shape())?;
        let mut v: Vec<ConfigViolation> = Vec::new();
        if wf.spacing() != self.spacing {
            v.push(ConfigViolation::WaveFunctionSpacing {
                expected: self.spacing, got: wf.spacing() });
        }
        if wf.masses() != self.masses.as_slice() {
            v.push(ConfigViolation::WaveFunctionMasses {
                expected: self.masses.clone(), got: wf.masses().to_vec() });
        }
        Ok(ConfigError::check(v)?)
    }

    // V(t) carried over from the previous step if available, else sampled
    fn carried_or_sample(&mut self, t: f64) -> TResult<nd::ArrayD<f64>> {
        match self.carried_v.take() {
            Some((step, v)) if step == self.steps => Ok(v),
            _ => Ok(self.sampler.sample(t)?),
        }
    }

    // potentials for the first and (if different) second half steps
    fn half_step_potentials(&mut self)
        -> TResult<(nd::ArrayD<f64>, Option<nd::ArrayD<f64>>)>
    {
        let t = self.time();
        let dt = self.dt;
        match self.sampling {
            PotentialSampling::Static => {
                let v = match self.static_v.take() {
                    Some(v) => v,
                    None => self.sampler.sample(0.0)?,
                };
                Ok((v, None))
            },
            PotentialSampling::StepStart => Ok((self.sampler.sample(t)?, None)),
            PotentialSampling::Midpoint => {
                Ok((self.sampler.sample(t + dt / 2.0)?, None))
            },
            PotentialSampling::Endpoints => {
                let v0 = self.carried_or_sample(t)?;
                let t1 = (self.steps + 1) as f64 * dt;
                Ok((v0, Some(self.sampler.sample(t1)?)))
            },
        }
    }

    fn apply_potential(&self, psi: &mut nd::ArrayD<C64>, v: &nd::ArrayD<f64>) {
        let half = self.dt / 2.0;
        zip_for_each!(
            self.parallel,
            nd::Zip::from(psi).and(v),
            |z, vk| { *z *= C64::cis(-vk * half); },
        );
    }

    // the kinetic propagator is a product of per-axis phases, applied lane by
    // lane along each axis in turn
    fn apply_kinetic(&self, psi: &mut nd::ArrayD<C64>) {
        for (k, phases) in self.kinetic.iter().enumerate() {
            zip_for_each!(
                self.parallel,
                nd::Zip::from(psi.lanes_mut(nd::Axis(k))),
                |mut lane: nd::ArrayViewMut1<C64>| { lane *= phases; },
            );
        }
    }

    fn do_step(&mut self, wf: &mut WaveFunction) -> TResult<()> {
        self.check_wavefunction(wf)?;
        let (v0, v1) = self.half_step_potentials()?;

        let psi = wf.grid_mut().as_array_mut();
        self.apply_potential(psi, &v0);
        self.fft.forward_inplace(psi)?;
        self.apply_kinetic(psi);
        self.fft.inverse_inplace(psi)?;
        self.apply_potential(psi, v1.as_ref().unwrap_or(&v0));
        self.damping.apply(wf.grid_mut())?;

        self.steps += 1;
        self.norm = wf.grid().norm_with(self.parallel);
        log::trace!("step {}: t = {:.6}, norm = {:.9}", self.steps, self.time(), self.norm);
        if !self.norm.is_finite() {
            return Err(TError::NumericInstability {
                step: self.steps,
                time: self.time(),
            });
        }

        match self.sampling {
            PotentialSampling::Static => { self.static_v = Some(v0); },
            PotentialSampling::Endpoints => {
                self.carried_v = v1.map(|v| (self.steps, v));
            },
            _ => { },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;
    use approx::assert_abs_diff_eq;
    use parking_lot::Mutex;
    use crate::{
        config::{ Damping, Packet, Particle },
        error::{ PotentialFault, PotentialError },
        grid::ComplexGrid,
        potential::{ Fallible, Free },
    };

    fn config(n: usize, sampling: PotentialSampling) -> SimConfig {
        SimConfig {
            grid_size: [n, n],
            spacing: 1.0,
            particles: vec![Particle {
                mass: 1.0,
                packet: Packet {
                    center: [n as f64 / 2.0, n as f64 / 2.0],
                    width: [3.0, 3.0],
                    momentum: [0.3, -0.2],
                },
            }],
            dt: 0.1,
            total_time: 1.0,
            frames: 1,
            damping: Damping { width: 0.0, factor: 0.0 },
            multithread: false,
            threads: None,
            sampling,
        }
    }

    #[test]
    fn plane_wave_picks_up_kinetic_phase() {
        let n = 16;
        let c = config(n, PotentialSampling::Midpoint);
        let k = TAU * 3.0 / n as f64;
        let data: nd::ArrayD<C64>
            = nd::ArrayD::from_shape_fn(nd::IxDyn(&[n, n]), |ix| {
                C64::cis(k * ix[1] as f64)
            });
        let mut wf = WaveFunction::new(
            ComplexGrid::from_array(data.clone(), 1.0).unwrap(), &[1.0]).unwrap();
        let mut prop = Propagator::new(&c, Arc::new(Free), None).unwrap();
        prop.step(&mut wf).unwrap();
        let phase = C64::cis(-k * k / 2.0 * c.dt);
        nd::Zip::from(wf.as_array()).and(&data)
            .for_each(|z, z0| assert!((z - z0 * phase).norm() < 1e-12));
        assert_eq!(prop.steps(), 1);
        assert_abs_diff_eq!(prop.time(), 0.1);
        assert_eq!(prop.state(), PropagatorState::Idle);
    }

    #[test]
    fn unitary_without_damping() {
        let c = SimConfig { multithread: true, ..config(32, PotentialSampling::Midpoint) };
        let harmonic = |x: f64, y: f64, _t: f64, m: f64, e: [f64; 2]| {
            0.5 * m * 0.01 * ((x - e[0] / 2.0).powi(2) + (y - e[1] / 2.0).powi(2))
        };
        let mut wf = c.initial_wavefunction().unwrap();
        let mut prop = Propagator::new(&c, Arc::new(harmonic), None).unwrap();
        for _ in 0..20 { prop.step(&mut wf).unwrap(); }
        assert_abs_diff_eq!(wf.norm(), 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(prop.norm(), wf.norm(), epsilon = 1e-12);
    }

    fn recorded_times(sampling: PotentialSampling, steps: usize) -> Vec<f64> {
        let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let v = move |_x: f64, _y: f64, t: f64, _m: f64, _e: [f64; 2]| {
            let mut log = log.lock();
            if log.last() != Some(&t) { log.push(t); }
            0.0
        };
        let c = config(4, sampling);
        let mut wf = c.initial_wavefunction().unwrap();
        let mut prop = Propagator::new(&c, Arc::new(v), None).unwrap();
        for _ in 0..steps { prop.step(&mut wf).unwrap(); }
        let times = seen.lock().clone();
        times
    }

    #[test]
    fn sampling_modes_choose_evaluation_times() {
        assert_eq!(recorded_times(PotentialSampling::Static, 3), vec![0.0]);
        assert_eq!(
            recorded_times(PotentialSampling::StepStart, 3),
            vec![0.0, 0.1, 0.2],
        );
        let mid = recorded_times(PotentialSampling::Midpoint, 3);
        assert_eq!(mid.len(), 3);
        mid.iter().zip([0.05, 0.15, 0.25])
            .for_each(|(t, e)| assert_abs_diff_eq!(*t, e, epsilon = 1e-12));
        let ends = recorded_times(PotentialSampling::Endpoints, 3);
        assert_eq!(ends.len(), 4);
        ends.iter().zip([0.0, 0.1, 0.2, 0.30000000000000004])
            .for_each(|(t, e)| assert_abs_diff_eq!(*t, e, epsilon = 1e-12));
    }

    #[test]
    fn sampling_modes_agree_for_static_potential() {
        let well = |x: f64, _y: f64, _t: f64, _m: f64, _e: [f64; 2]| 0.01 * x;
        let run = |sampling| {
            let c = config(16, sampling);
            let mut wf = c.initial_wavefunction().unwrap();
            let mut prop = Propagator::new(&c, Arc::new(well), None).unwrap();
            for _ in 0..5 { prop.step(&mut wf).unwrap(); }
            wf
        };
        let reference = run(PotentialSampling::Midpoint);
        for sampling in [
            PotentialSampling::Static,
            PotentialSampling::StepStart,
            PotentialSampling::Endpoints,
        ] {
            let wf = run(sampling);
            nd::Zip::from(wf.as_array()).and(reference.as_array())
                .for_each(|a, b| assert!((a - b).norm() < 1e-12));
        }
    }

    #[test]
    fn potential_fault_is_sticky() {
        let v = Fallible(|_x: f64, _y: f64, t: f64, _m: f64, _e: [f64; 2]| {
            if t > 0.2 { Err("too late") } else { Ok(0.0) }
        });
        let c = config(8, PotentialSampling::StepStart);
        let mut wf = c.initial_wavefunction().unwrap();
        let mut prop = Propagator::new(&c, Arc::new(v), None).unwrap();
        for _ in 0..3 { prop.step(&mut wf).unwrap(); }
        let before = wf.clone();
        match prop.step(&mut wf) {
            Err(TError::PotentialEvaluation(PotentialError { coords, fault, .. })) => {
                assert_eq!(coords, vec![0.0, 0.0]);
                assert_eq!(fault, PotentialFault::Raised("too late".into()));
            },
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(wf, before);
        assert_eq!(prop.state(), PropagatorState::Faulted);
        assert!(matches!(prop.step(&mut wf), Err(TError::Faulted)));
        assert_eq!(prop.steps(), 3);
    }

    #[test]
    fn overflowing_phase_is_an_instability() {
        let c = SimConfig { dt: 4.0, total_time: 8.0, ..config(8, PotentialSampling::Static) };
        let v = |_x: f64, _y: f64, _t: f64, _m: f64, _e: [f64; 2]| f64::MAX;
        let mut wf = c.initial_wavefunction().unwrap();
        let mut prop = Propagator::new(&c, Arc::new(v), None).unwrap();
        assert!(matches!(
            prop.step(&mut wf),
            Err(TError::NumericInstability { step: 1, .. }),
        ));
        assert_eq!(prop.state(), PropagatorState::Faulted);
    }

    #[test]
    fn rejects_foreign_wavefunction() {
        let c = config(8, PotentialSampling::Midpoint);
        let mut prop = Propagator::new(&c, Arc::new(Free), None).unwrap();
        let mut wf = config(10, PotentialSampling::Midpoint)
            .initial_wavefunction().unwrap();
        assert!(matches!(
            prop.step(&mut wf),
            Err(TError::Grid(GridError::ShapeMismatch(..))),
        ));
    }

    #[test]
    fn parallel_and_sequential_steps_agree() {
        let pair = |multithread: bool| SimConfig {
            grid_size: [8, 8],
            particles: vec![
                Particle {
                    mass: 1.0,
                    packet: Packet { center: [3.0, 4.0], width: [1.5, 1.5], momentum: [0.4, 0.0] },
                },
                Particle {
                    mass: 2.0,
                    packet: Packet { center: [5.0, 3.0], width: [1.5, 1.5], momentum: [-0.3, 0.1] },
                },
            ],
            damping: Damping { width: 2.0, factor: 0.3 },
            multithread,
            ..config(8, PotentialSampling::Midpoint)
        };
        let single = |multithread: bool| SimConfig {
            damping: Damping { width: 4.0, factor: 0.3 },
            multithread,
            ..config(16, PotentialSampling::Midpoint)
        };
        let well = |x: f64, y: f64, _t: f64, _m: f64, _e: [f64; 2]| 0.01 * (x + y);
        let u = |r1: [f64; 2], r2: [f64; 2], _t: f64| {
            0.5 / ((r1[0] - r2[0]).hypot(r1[1] - r2[1]) + 1.0)
        };
        for make in [&pair as &dyn Fn(bool) -> SimConfig, &single] {
            let run = |multithread: bool| {
                let c = make(multithread);
                let mut wf = c.initial_wavefunction().unwrap();
                let mut prop
                    = Propagator::new(&c, Arc::new(well), Some(Arc::new(u)))
                    .unwrap();
                for _ in 0..5 { prop.step(&mut wf).unwrap(); }
                wf
            };
            let seq = run(false);
            let par = run(true);
            assert!(seq.norm() < 1.0);
            nd::Zip::from(seq.as_array()).and(par.as_array())
                .for_each(|a, b| assert!((a - b).norm() < 1e-12));
        }
    }
}
