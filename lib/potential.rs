//! Potential-energy functions and their evaluation over the lattice.
//!
//! A [`Potential`] is any pure function of a single particle's position, the
//! elapsed time, the particle's mass, and the extent of the domain. Closures
//! with the signature
//! ```text
//! Fn(x: f64, y: f64, t: f64, mass: f64, extent: [f64; 2]) -> f64
//! ```
//! implement it directly; fallible closures can be wrapped in [`Fallible`].
//! For two particles, an optional [`Interaction`] term depending on both
//! positions is added on top of the two single-particle potentials.
//!
//! Implementations must be safe to call concurrently from many threads; the
//! [`PotentialSampler`] makes no attempt to serialize or retry calls.

use std::{ f64::consts::SQRT_2, fmt, sync::Arc };
use ndarray as nd;
use parking_lot::Mutex;
use crate::{
    error::{ GridError, PotentialError, PotentialFault },
    utils::zip_for_each,
};

/// A pure, thread-safe single-particle potential energy.
pub trait Potential: Send + Sync {
    /// Evaluate the potential at position `(x, y)` and time `t` for a particle
    /// of mass `mass` in a domain spanning `[0, extent[0]] × [0, extent[1]]`.
    fn eval(&self, x: f64, y: f64, t: f64, mass: f64, extent: [f64; 2])
        -> Result<f64, PotentialFault>;
}

impl<F> Potential for F
where F: Fn(f64, f64, f64, f64, [f64; 2]) -> f64 + Send + Sync
{
    fn eval(&self, x: f64, y: f64, t: f64, mass: f64, extent: [f64; 2])
        -> Result<f64, PotentialFault>
    {
        Ok(self(x, y, t, mass, extent))
    }
}

/// Adapts a closure returning `Result<f64, E>` into a [`Potential`].
///
/// Errors are reported as [`PotentialFault::Raised`] using their `Display`
/// representation.
#[derive(Copy, Clone, Debug)]
pub struct Fallible<F>(pub F);

impl<F, E> Potential for Fallible<F>
where
    F: Fn(f64, f64, f64, f64, [f64; 2]) -> Result<f64, E> + Send + Sync,
    E: fmt::Display,
{
    fn eval(&self, x: f64, y: f64, t: f64, mass: f64, extent: [f64; 2])
        -> Result<f64, PotentialFault>
    {
        (self.0)(x, y, t, mass, extent)
            .map_err(|e| PotentialFault::Raised(e.to_string()))
    }
}

/// A pure, thread-safe interaction energy between two particles.
pub trait Interaction: Send + Sync {
    /// Evaluate the interaction between particles at `r1` and `r2` at time
    /// `t`.
    fn eval(&self, r1: [f64; 2], r2: [f64; 2], t: f64)
        -> Result<f64, PotentialFault>;
}

impl<F> Interaction for F
where F: Fn([f64; 2], [f64; 2], f64) -> f64 + Send + Sync
{
    fn eval(&self, r1: [f64; 2], r2: [f64; 2], t: f64)
        -> Result<f64, PotentialFault>
    {
        Ok(self(r1, r2, t))
    }
}

/// Softened Coulomb interaction,
/// ```text
///       strength
/// U = ------------------------
///     √(|r1 - r2|² + softening²)
/// ```
/// Positive `strength` is repulsive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SoftCoulomb {
    pub strength: f64,
    pub softening: f64,
}

impl Interaction for SoftCoulomb {
    fn eval(&self, r1: [f64; 2], r2: [f64; 2], _t: f64)
        -> Result<f64, PotentialFault>
    {
        let d2 = (r1[0] - r2[0]).powi(2) + (r1[1] - r2[1]).powi(2);
        Ok(self.strength / (d2 + self.softening.powi(2)).sqrt())
    }
}

/// Zero potential everywhere.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Free;

impl Potential for Free {
    fn eval(&self, _x: f64, _y: f64, _t: f64, _mass: f64, _extent: [f64; 2])
        -> Result<f64, PotentialFault>
    {
        Ok(0.0)
    }
}

/// A flat-topped disc barrier centred in the domain.
///
/// `radius` is given as a fraction of the domain's x-extent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cylinder {
    pub height: f64,
    pub radius: f64,
}

impl Default for Cylinder {
    fn default() -> Self { Self { height: 1.0, radius: 1.0 / 25.0 } }
}

impl Potential for Cylinder {
    fn eval(&self, x: f64, y: f64, _t: f64, _mass: f64, extent: [f64; 2])
        -> Result<f64, PotentialFault>
    {
        let r = self.radius * extent[0];
        let dx = x - extent[0] / 2.0;
        let dy = y - extent[1] / 2.0;
        Ok(if dx.hypot(dy) > r { 0.0 } else { self.height })
    }
}

/// A diagonal wall across the domain, pierced by two holes.
///
/// The wall is the band `|x + y - offset·Lx| < thickness·Lx / √2`; inside it,
/// the holes are where `|x - y|` lies within `hole_width·Lx / 2` of
/// `hole_separation·Lx`. All lengths are fractions of the domain's x-extent
/// `Lx`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DoubleSlit {
    pub height: f64,
    pub offset: f64,
    pub thickness: f64,
    pub hole_width: f64,
    pub hole_separation: f64,
}

impl Default for DoubleSlit {
    fn default() -> Self {
        Self {
            height: 1.0,
            offset: 1.0,
            thickness: 1.0 / 50.0,
            hole_width: 1.0 / 50.0,
            hole_separation: 1.0 / 10.0,
        }
    }
}

impl Potential for DoubleSlit {
    fn eval(&self, x: f64, y: f64, _t: f64, _mass: f64, extent: [f64; 2])
        -> Result<f64, PotentialFault>
    {
        let lx = extent[0];
        let thickness = self.thickness * lx;
        let half_hole = self.hole_width * lx / 2.0;
        let separation = self.hole_separation * lx;
        if (x + y - self.offset * lx).abs() >= thickness / SQRT_2 {
            return Ok(0.0);
        }
        let d = (x - y).abs();
        let in_hole = d <= separation + half_hole && d >= separation - half_hole;
        Ok(if in_hole { 0.0 } else { self.height })
    }
}

/// Evaluates a potential (plus optional interaction) on every lattice site.
///
/// For one particle the sampled grid has shape `[nx, ny]`; for two particles
/// it has shape `[nx, ny, nx, ny]` and holds
/// `V(r1; m1) + V(r2; m2) + U(r1, r2)`.
#[derive(Clone)]
pub struct PotentialSampler {
    grid_size: [usize; 2],
    spacing: f64,
    masses: Vec<f64>,
    potential: Arc<dyn Potential>,
    interaction: Option<Arc<dyn Interaction>>,
    parallel: bool,
}

impl fmt::Debug for PotentialSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PotentialSampler")
            .field("grid_size", &self.grid_size)
            .field("spacing", &self.spacing)
            .field("masses", &self.masses)
            .field("interaction", &self.interaction.is_some())
            .field("parallel", &self.parallel)
            .finish()
    }
}

// records the failing site with the lowest flat index so that reported errors
// do not depend on thread scheduling
struct FirstFault(Mutex<Option<(usize, PotentialError)>>);

impl FirstFault {
    fn new() -> Self { Self(Mutex::new(None)) }

    fn record(&self, flat: usize, err: PotentialError) {
        let mut slot = self.0.lock();
        let earlier = slot.as_ref().map_or(true, |(k, _)| flat < *k);
        if earlier { *slot = Some((flat, err)); }
    }

    fn into_result(self) -> Result<(), PotentialError> {
        match self.0.into_inner() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

fn check_finite(value: Result<f64, PotentialFault>)
    -> Result<f64, PotentialFault>
{
    match value {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(v) => Err(PotentialFault::NonFinite(v)),
        Err(e) => Err(e),
    }
}

impl PotentialSampler {
    /// Create a new sampler.
    ///
    /// `masses` must hold one entry per particle; the interaction term is
    /// ignored for a single particle.
    pub fn new(
        grid_size: [usize; 2],
        spacing: f64,
        masses: &[f64],
        potential: Arc<dyn Potential>,
        interaction: Option<Arc<dyn Interaction>>,
        parallel: bool,
    ) -> Result<Self, GridError>
    {
        if !(1..=2).contains(&masses.len()) {
            return Err(GridError::BadParticleCount(2 * masses.len()));
        }
        GridError::check_shape(&grid_size)?;
        GridError::check_spacing(spacing)?;
        masses.iter().try_for_each(|m| GridError::check_mass(*m))?;
        Ok(Self {
            grid_size,
            spacing,
            masses: masses.to_vec(),
            potential,
            interaction,
            parallel,
        })
    }

    /// Spatial extent of the domain, `[(nx - 1) dx, (ny - 1) dx]`.
    pub fn extent(&self) -> [f64; 2] {
        [
            (self.grid_size[0].max(1) - 1) as f64 * self.spacing,
            (self.grid_size[1].max(1) - 1) as f64 * self.spacing,
        ]
    }

    /// Shape of the sampled grid.
    pub fn shape(&self) -> Vec<usize> {
        self.masses.iter()
            .flat_map(|_| self.grid_size)
            .collect()
    }

    // sample the single-particle potential for one mass over an [nx, ny] grid
    fn sample_single(&self, t: f64, mass: f64)
        -> Result<nd::Array2<f64>, PotentialError>
    {
        let extent = self.extent();
        let dx = self.spacing;
        let ny = self.grid_size[1];
        let mut v: nd::Array2<f64> = nd::Array2::zeros(self.grid_size);
        let faults = FirstFault::new();
        zip_for_each!(
            self.parallel,
            nd::Zip::indexed(&mut v),
            |(i, j), vij| {
                let (x, y) = (i as f64 * dx, j as f64 * dx);
                match check_finite(self.potential.eval(x, y, t, mass, extent)) {
                    Ok(val) => { *vij = val; },
                    Err(fault) => {
                        let err = PotentialError { coords: vec![x, y], time: t, fault };
                        faults.record(i * ny + j, err);
                    },
                }
            },
        );
        faults.into_result()?;
        Ok(v)
    }

    /// Sample the total potential energy over the lattice at time `t`.
    pub fn sample(&self, t: f64) -> Result<nd::ArrayD<f64>, PotentialError> {
        match self.masses.as_slice() {
            [m] => Ok(self.sample_single(t, *m)?.into_dyn()),
            [m1, m2] => self.sample_pair(t, *m1, *m2),
            _ => unreachable!("sampler is built with one or two masses"),
        }
    }

    fn sample_pair(&self, t: f64, m1: f64, m2: f64)
        -> Result<nd::ArrayD<f64>, PotentialError>
    {
        let v1 = self.sample_single(t, m1)?;
        let v2 = if m1 == m2 { v1.clone() } else { self.sample_single(t, m2)? };
        let [nx, ny] = self.grid_size;
        let dx = self.spacing;
        let mut v: nd::Array4<f64> = nd::Array4::zeros((nx, ny, nx, ny));
        let faults = FirstFault::new();
        let interaction = self.interaction.as_deref();
        zip_for_each!(
            self.parallel,
            nd::Zip::indexed(&mut v),
            |(i1, j1, i2, j2), vk| {
                let mut total = v1[[i1, j1]] + v2[[i2, j2]];
                if let Some(u) = interaction {
                    let r1 = [i1 as f64 * dx, j1 as f64 * dx];
                    let r2 = [i2 as f64 * dx, j2 as f64 * dx];
                    match check_finite(u.eval(r1, r2, t)) {
                        Ok(val) => { total += val; },
                        Err(fault) => {
                            let err = PotentialError {
                                coords: vec![r1[0], r1[1], r2[0], r2[1]],
                                time: t,
                                fault,
                            };
                            let flat = ((i1 * ny + j1) * nx + i2) * ny + j2;
                            faults.record(flat, err);
                        },
                    }
                }
                *vk = total;
            },
        );
        faults.into_result()?;
        Ok(v.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sampler<P>(potential: P, masses: &[f64], parallel: bool)
        -> PotentialSampler
    where P: Potential + 'static
    {
        PotentialSampler::new(
            [6, 5], 0.5, masses, Arc::new(potential), None, parallel)
            .unwrap()
    }

    #[test]
    fn closure_potential_sees_coordinates_and_time() {
        let s = sampler(
            |x: f64, y: f64, t: f64, m: f64, _e: [f64; 2]| x + 10.0 * y + t * m,
            &[2.0],
            false,
        );
        let v = s.sample(1.5).unwrap();
        assert_eq!(v.shape(), &[6, 5]);
        assert_abs_diff_eq!(v[[2, 3]], 1.0 + 15.0 + 3.0, epsilon = 1e-12);
        assert_eq!(s.extent(), [2.5, 2.0]);
    }

    #[test]
    fn pair_potential_adds_interaction() {
        let u = |r1: [f64; 2], r2: [f64; 2], _t: f64| r1[0] * r2[1];
        let s = PotentialSampler::new(
            [3, 3],
            1.0,
            &[1.0, 4.0],
            Arc::new(|x: f64, _y: f64, _t: f64, m: f64, _e: [f64; 2]| x * m),
            Some(Arc::new(u)),
            true,
        ).unwrap();
        let v = s.sample(0.0).unwrap();
        assert_eq!(v.shape(), &[3, 3, 3, 3]);
        // V(r1; 1) + V(r2; 4) + x1 y2
        assert_abs_diff_eq!(v[[2, 0, 1, 2]], 2.0 + 4.0 + 4.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_values_report_first_site() {
        let s = sampler(
            |x: f64, y: f64, _t: f64, _m: f64, _e: [f64; 2]| {
                if x >= 1.0 && y >= 0.5 { f64::NAN } else { 0.0 }
            },
            &[1.0],
            true,
        );
        let err = s.sample(0.25).unwrap_err();
        assert_eq!(err.coords, vec![1.0, 0.5]);
        assert_eq!(err.time, 0.25);
        assert!(matches!(err.fault, PotentialFault::NonFinite(v) if v.is_nan()));
    }

    #[test]
    fn fallible_potential_reports_message() {
        let s = sampler(
            Fallible(|x: f64, _y: f64, _t: f64, _m: f64, _e: [f64; 2]| {
                if x > 2.0 { Err("out of table") } else { Ok(x) }
            }),
            &[1.0],
            false,
        );
        let err = s.sample(0.0).unwrap_err();
        assert_eq!(err.coords, vec![2.5, 0.0]);
        assert_eq!(err.fault, PotentialFault::Raised("out of table".into()));
    }

    #[test]
    fn presets() {
        let extent = [100.0, 100.0];
        assert_eq!(Cylinder::default().eval(50.0, 50.0, 0.0, 1.0, extent), Ok(1.0));
        assert_eq!(Cylinder::default().eval(10.0, 50.0, 0.0, 1.0, extent), Ok(0.0));
        let slit = DoubleSlit::default();
        // on the wall, away from the holes
        assert_eq!(slit.eval(50.0, 50.0, 0.0, 1.0, extent), Ok(1.0));
        // on the wall, inside a hole: |x - y| = 10
        assert_eq!(slit.eval(55.0, 45.0, 0.0, 1.0, extent), Ok(0.0));
        // off the wall
        assert_eq!(slit.eval(20.0, 20.0, 0.0, 1.0, extent), Ok(0.0));
        assert_eq!(Free.eval(3.0, 4.0, 1.0, 1.0, extent), Ok(0.0));
    }

    #[test]
    fn rejects_three_particles() {
        let res = PotentialSampler::new(
            [4, 4], 1.0, &[1.0; 3], Arc::new(Free), None, false);
        assert!(matches!(res, Err(GridError::BadParticleCount(6))));
    }

    #[test]
    fn soft_coulomb() {
        let u = SoftCoulomb { strength: 2.0, softening: 0.0 };
        assert_abs_diff_eq!(
            u.eval([0.0, 0.0], [3.0, 4.0], 0.0).unwrap(), 0.4, epsilon = 1e-12);
    }
}
