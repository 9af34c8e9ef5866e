//! Driving a full run: many propagation steps per frame, with
//! pause/resume/cancel control from other threads.
//!
//! A [`RunController`] owns the configuration and potential for one run. The
//! run itself happens either on the calling thread ([`RunController::run`]) or
//! on a background thread ([`RunController::spawn`]); in both cases a
//! [`RunHandle`] obtained beforehand can pause, resume, or cancel it. Control
//! requests only take effect between steps, so a step is never interrupted
//! halfway and the wavefunction seen in frames is always consistent.
//!
//! ```
//! use tdse2d::{
//!     config::SimConfig,
//!     controller::{ Frame, RunController, RunStatus },
//!     potential::Free,
//! };
//!
//! let config = SimConfig {
//!     grid_size: [64, 64],
//!     total_time: 1.0,
//!     dt: 0.1,
//!     frames: 2,
//!     ..SimConfig::default()
//! };
//! let initial = config.initial_wavefunction().unwrap();
//! let controller = RunController::new(config, Free);
//! let mut frames: Vec<Frame> = Vec::new();
//! let summary = controller.run(initial, &mut |frame: Frame| frames.push(frame)).unwrap();
//! assert_eq!(summary.status, RunStatus::Completed);
//! assert_eq!(frames.len(), 2);
//! assert_eq!(frames[1].step, 10);
//! ```

use std::{
    sync::Arc,
    thread,
    time::{ Duration, Instant },
};
use parking_lot::{ Condvar, Mutex };
use rayon::{ ThreadPool, ThreadPoolBuilder };
use crate::{
    config::SimConfig,
    error::TError,
    potential::{ Interaction, Potential },
    propagator::{ Propagator, TResult },
    wavefunction::WaveFunction,
};

// norm below which a single warning is logged during a run
const NORM_WARN: f64 = 0.01;

/// Lifecycle of a run.
///
/// `Cancelled`, `Completed`, and `Faulted` are terminal: once reached, the
/// state never changes again.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Running,
    Paused,
    Cancelled,
    Completed,
    Faulted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Faulted)
    }
}

/// How a run that did not fault came to an end.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Final bookkeeping for a run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,
    /// Number of completed steps.
    pub steps: usize,
    /// Simulation time reached.
    pub time: f64,
    /// Number of frames delivered.
    pub frames: usize,
    /// Wavefunction norm after the last completed step.
    pub norm: f64,
}

/// A snapshot of the wavefunction delivered to an [`Observer`].
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// 0-based frame number.
    pub index: usize,
    /// Number of steps completed when the frame was taken.
    pub step: usize,
    /// Simulation time when the frame was taken.
    pub time: f64,
    /// Fraction of the run completed, in `(0, 1]`.
    pub progress: f64,
    /// Owned copy of the wavefunction.
    pub wf: WaveFunction,
}

/// Receives frames (and optionally per-step notifications) from a run.
///
/// Any `FnMut(Frame)` closure is an observer.
pub trait Observer {
    fn on_frame(&mut self, frame: Frame);

    /// Called after every step, after any frame produced by that step.
    fn on_step(&mut self, _step: usize, _time: f64) { }
}

impl<F> Observer for F
where F: FnMut(Frame)
{
    fn on_frame(&mut self, frame: Frame) { self(frame) }
}

#[derive(Debug)]
struct Control {
    state: RunState,
    step: usize,
    total: usize,
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    changed: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            control: Mutex::new(Control {
                state: RunState::Ready,
                step: 0,
                total: 0,
            }),
            changed: Condvar::new(),
        }
    }

    // move from `from` to `to` if currently in `from`; returns whether the
    // transition happened
    fn transition(&self, from: RunState, to: RunState) -> bool {
        let mut control = self.control.lock();
        if control.state != from { return false; }
        control.state = to;
        self.changed.notify_all();
        true
    }

    // move to a terminal state unless already in one
    fn finish(&self, to: RunState) -> RunState {
        let mut control = self.control.lock();
        if !control.state.is_terminal() {
            control.state = to;
            self.changed.notify_all();
        }
        control.state
    }
}

/// Cloneable, thread-safe remote control for a run.
#[derive(Clone, Debug)]
pub struct RunHandle {
    shared: Arc<Shared>,
}

impl RunHandle {
    /// Request that a running simulation pause before its next step.
    ///
    /// Returns `false` if the run was not running.
    pub fn pause(&self) -> bool {
        self.shared.transition(RunState::Running, RunState::Paused)
    }

    /// Resume a paused simulation.
    ///
    /// Returns `false` if the run was not paused.
    pub fn resume(&self) -> bool {
        self.shared.transition(RunState::Paused, RunState::Running)
    }

    /// Stop the run at the next step boundary. Cancelling a run that has not
    /// started prevents it from starting.
    ///
    /// Returns `false` if the run had already reached a terminal state.
    pub fn cancel(&self) -> bool {
        let mut control = self.shared.control.lock();
        if control.state.is_terminal() { return false; }
        control.state = RunState::Cancelled;
        self.shared.changed.notify_all();
        true
    }

    pub fn state(&self) -> RunState { self.shared.control.lock().state }

    /// Fraction of the total step count completed so far.
    pub fn progress(&self) -> f64 {
        let control = self.shared.control.lock();
        if control.total == 0 {
            0.0
        } else {
            control.step as f64 / control.total as f64
        }
    }

    /// Block until the run reaches `state` or `timeout` elapses.
    ///
    /// Returns early with `false` if the run reaches a different terminal
    /// state.
    pub fn wait_for(&self, state: RunState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.shared.control.lock();
        loop {
            if control.state == state { return true; }
            if control.state.is_terminal() { return false; }
            if self.shared.changed.wait_until(&mut control, deadline).timed_out() {
                return control.state == state;
            }
        }
    }
}

/// Runs a simulation described by a [`SimConfig`] and a potential.
///
/// Each controller drives at most one run.
pub struct RunController {
    config: SimConfig,
    potential: Arc<dyn Potential>,
    interaction: Option<Arc<dyn Interaction>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("config", &self.config)
            .field("interaction", &self.interaction.is_some())
            .field("shared", &self.shared)
            .finish()
    }
}

// everything needed to start stepping, built before the run leaves `Ready`
struct Prepared {
    propagator: Propagator,
    pool: Option<ThreadPool>,
}

impl RunController {
    /// Create a new controller. No validation is performed until the run is
    /// started.
    pub fn new<P>(config: SimConfig, potential: P) -> Self
    where P: Potential + 'static
    {
        Self {
            config,
            potential: Arc::new(potential),
            interaction: None,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Add a two-particle interaction term. Ignored for single-particle runs.
    pub fn with_interaction<I>(mut self, interaction: I) -> Self
    where I: Interaction + 'static
    {
        self.interaction = Some(Arc::new(interaction));
        self
    }

    pub fn config(&self) -> &SimConfig { &self.config }

    pub fn handle(&self) -> RunHandle {
        RunHandle { shared: Arc::clone(&self.shared) }
    }

    pub fn state(&self) -> RunState { self.shared.control.lock().state }

    fn prepare(&self, initial: &WaveFunction) -> TResult<Prepared> {
        let state = self.state();
        if state != RunState::Ready { return Err(TError::BadState(state)); }
        self.config.validate_wavefunction(initial)?;
        let pool: Option<ThreadPool>
            = if self.config.multithread {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(self.config.threads.unwrap_or(0))
                    .thread_name(|k| format!("tdse-worker-{}", k))
                    .build()?;
                Some(pool)
            } else {
                None
            };
        // the damping mask is built on the run's own pool
        let build = || {
            Propagator::new(
                &self.config,
                Arc::clone(&self.potential),
                self.interaction.clone(),
            )
        };
        let propagator
            = match pool.as_ref() {
                Some(pool) => pool.install(build)?,
                None => build()?,
            };
        {
            let mut control = self.shared.control.lock();
            if control.state != RunState::Ready {
                return Err(TError::BadState(control.state));
            }
            control.state = RunState::Running;
            control.step = 0;
            control.total = self.config.total_steps();
            self.shared.changed.notify_all();
        }
        log::info!(
            "starting run: {} particle(s) on {}×{} sites, {} steps of dt = {}, {} frames, {}",
            self.config.particles.len(),
            self.config.grid_size[0],
            self.config.grid_size[1],
            self.config.total_steps(),
            self.config.dt,
            self.config.frames,
            match pool.as_ref() {
                Some(p) => format!("{} worker threads", p.current_num_threads()),
                None => "single-threaded".to_string(),
            },
        );
        Ok(Prepared { propagator, pool })
    }

    // block while paused; returns `false` if the run has been cancelled
    fn wait_while_paused(&self) -> bool {
        let mut control = self.shared.control.lock();
        while control.state == RunState::Paused {
            self.shared.changed.wait(&mut control);
        }
        control.state != RunState::Cancelled
    }

    fn drive<O>(
        &self,
        prepared: Prepared,
        mut wf: WaveFunction,
        observer: &mut O,
    ) -> TResult<RunSummary>
    where O: Observer + ?Sized
    {
        let Prepared { mut propagator, pool } = prepared;
        let total = self.config.total_steps();
        let schedule: Vec<usize> = self.config.frame_steps();
        let mut next_frame: usize = 0;
        let mut warned = false;
        let mut norm = wf.norm();

        for _ in 0..total {
            if !self.wait_while_paused() { break; }
            let res
                = match pool.as_ref() {
                    Some(pool) => pool.install(|| propagator.step(&mut wf)),
                    None => propagator.step(&mut wf),
                };
            if let Err(err) = res {
                self.shared.finish(RunState::Faulted);
                log::error!(
                    "run faulted at step {} (t = {}): {}",
                    propagator.steps() + 1,
                    propagator.time(),
                    err,
                );
                return Err(err);
            }
            let step = propagator.steps();
            let time = propagator.time();
            norm = propagator.norm();
            self.shared.control.lock().step = step;

            if schedule.get(next_frame) == Some(&step) {
                let frame = Frame {
                    index: next_frame,
                    step,
                    time,
                    progress: step as f64 / total as f64,
                    wf: wf.clone(),
                };
                log::debug!(
                    "frame {}/{}: step {}, t = {:.6}, norm = {:.9}",
                    next_frame + 1, schedule.len(), step, time, norm,
                );
                observer.on_frame(frame);
                next_frame += 1;
            }
            observer.on_step(step, time);

            if !warned && norm < NORM_WARN {
                log::warn!(
                    "wavefunction norm has decayed to {:.3e} at t = {:.6}; most \
                    of the probability has been absorbed at the boundary",
                    norm, time,
                );
                warned = true;
            }
        }

        let status
            = match self.shared.finish(RunState::Completed) {
                RunState::Cancelled => RunStatus::Cancelled,
                _ => RunStatus::Completed,
            };
        let summary = RunSummary {
            status,
            steps: propagator.steps(),
            time: propagator.time(),
            frames: next_frame,
            norm,
        };
        log::info!(
            "run {}: {} steps, t = {:.6}, {} frames, norm = {:.9}",
            match status {
                RunStatus::Completed => "completed",
                RunStatus::Cancelled => "cancelled",
            },
            summary.steps,
            summary.time,
            summary.frames,
            summary.norm,
        );
        Ok(summary)
    }

    /// Run the simulation to completion (or cancellation) on the current
    /// thread, delivering frames to `observer`.
    ///
    /// The configuration and initial wavefunction are validated before any
    /// step is taken; every violated constraint is reported.
    pub fn run<O>(&self, initial: WaveFunction, observer: &mut O)
        -> TResult<RunSummary>
    where O: Observer + ?Sized
    {
        let prepared = self.prepare(&initial)?;
        self.drive(prepared, initial, observer)
    }

    /// Validate and then run the simulation on a new background thread.
    ///
    /// Validation errors are returned immediately; errors during the run are
    /// returned by [`RunJob::join`].
    pub fn spawn<O>(self, initial: WaveFunction, mut observer: O)
        -> TResult<RunJob<O>>
    where O: Observer + Send + 'static
    {
        let prepared = self.prepare(&initial)?;
        let handle = self.handle();
        let thread = thread::spawn(move || {
            let res = self.drive(prepared, initial, &mut observer);
            (res, observer)
        });
        Ok(RunJob { handle, thread })
    }
}

/// A run in progress on a background thread.
#[derive(Debug)]
pub struct RunJob<O> {
    handle: RunHandle,
    thread: thread::JoinHandle<(TResult<RunSummary>, O)>,
}

impl<O> RunJob<O> {
    pub fn handle(&self) -> &RunHandle { &self.handle }

    pub fn is_finished(&self) -> bool { self.thread.is_finished() }

    /// Wait for the run to end, returning its outcome along with the
    /// observer.
    pub fn join(self) -> (TResult<RunSummary>, O) {
        match self.thread.join() {
            Ok(out) => out,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
