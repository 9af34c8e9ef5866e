//! One- and two-particle wavefunctions on a 2D lattice.
//!
//! Each particle contributes two spatial axes, so a single particle lives on
//! an `[nx, ny]` lattice and a pair on `[nx, ny, nx, ny]` (axis order `x1, y1,
//! x2, y2`). Site `i` along any axis sits at coordinate `i * spacing`.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::GridError,
    grid::{ ComplexGrid, GridResult },
    spectral::SpectralTransform,
    utils::wavenumbers,
};

/// A complex wavefunction together with the masses of the particles it
/// describes.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveFunction {
    psi: ComplexGrid,
    masses: Vec<f64>,
}

impl WaveFunction {
    /// Wrap a complex grid.
    ///
    /// The grid must have two axes per particle, with the same `[nx, ny]`
    /// for every particle. No normalization is performed.
    pub fn new(psi: ComplexGrid, masses: &[f64]) -> GridResult<Self> {
        if !(1..=2).contains(&masses.len()) || psi.ndim() != 2 * masses.len() {
            return Err(GridError::BadParticleCount(psi.ndim()));
        }
        masses.iter().try_for_each(|m| GridError::check_mass(*m))?;
        let shape = psi.shape();
        if shape.len() == 4 && shape[..2] != shape[2..] {
            return Err(GridError::ShapeMismatch(
                shape[..2].to_vec(), shape[2..].to_vec()));
        }
        Ok(Self { psi, masses: masses.to_vec() })
    }

    /// Build from two parallel arrays holding the real and imaginary parts,
    /// e.g. when restoring a previously exported frame.
    pub fn from_parts(
        re: &nd::ArrayD<f64>,
        im: &nd::ArrayD<f64>,
        spacing: f64,
        masses: &[f64],
    ) -> GridResult<Self>
    {
        GridError::check_same_shape(re.shape(), im.shape())?;
        let data: nd::ArrayD<C64>
            = nd::Zip::from(re).and(im)
            .map_collect(|r, i| C64::new(*r, *i));
        Self::new(ComplexGrid::from_array(data, spacing)?, masses)
    }

    /// Split into parallel real and imaginary arrays.
    pub fn to_parts(&self) -> (nd::ArrayD<f64>, nd::ArrayD<f64>) {
        let a = self.psi.as_array();
        (a.mapv(|z| z.re), a.mapv(|z| z.im))
    }

    pub fn particles(&self) -> usize { self.masses.len() }

    pub fn masses(&self) -> &[f64] { &self.masses }

    pub fn spacing(&self) -> f64 { self.psi.spacing() }

    /// Per-particle lattice size `[nx, ny]`.
    pub fn grid_size(&self) -> [usize; 2] {
        let shape = self.psi.shape();
        [shape[0], shape[1]]
    }

    pub fn shape(&self) -> &[usize] { self.psi.shape() }

    pub fn grid(&self) -> &ComplexGrid { &self.psi }

    pub fn grid_mut(&mut self) -> &mut ComplexGrid { &mut self.psi }

    pub fn as_array(&self) -> &nd::ArrayD<C64> { self.psi.as_array() }

    /// Total probability, Σ|ψ|² × cell volume.
    pub fn norm(&self) -> f64 { self.psi.norm() }

    /// Rescale in place so that [`Self::norm`] is 1.
    pub fn normalize(&mut self) -> GridResult<()> {
        let norm = self.norm();
        if norm <= 0.0 || !norm.is_finite() { return Err(GridError::ZeroNorm); }
        self.psi.scale(C64::from(norm.sqrt().recip()));
        Ok(())
    }

    /// Probability density |ψ|² at every lattice site.
    pub fn density(&self) -> nd::ArrayD<f64> {
        self.psi.as_array().mapv(|z| z.norm_sqr())
    }

    fn check_particle(&self, particle: usize) -> GridResult<()> {
        (particle < self.particles()).then_some(())
            .ok_or_else(|| GridError::IndexOutOfRange {
                index: vec![particle],
                shape: vec![self.particles()],
            })
    }

    /// Probability density of a single particle, with the other particle (if
    /// any) integrated out.
    pub fn marginal_density(&self, particle: usize)
        -> GridResult<nd::Array2<f64>>
    {
        self.check_particle(particle)?;
        let density = self.density();
        let marginal = match (self.particles(), particle) {
            (1, _) => density,
            (_, 0) => {
                density.sum_axis(nd::Axis(3)).sum_axis(nd::Axis(2))
                    * self.spacing().powi(2)
            },
            _ => {
                density.sum_axis(nd::Axis(0)).sum_axis(nd::Axis(0))
                    * self.spacing().powi(2)
            },
        };
        let shape = marginal.shape().to_vec();
        marginal.into_dimensionality::<nd::Ix2>()
            .map_err(|_| GridError::InvalidShape(shape))
    }

    /// Expectation value of a particle's position, ⟨(x, y)⟩.
    pub fn mean_position(&self, particle: usize) -> GridResult<[f64; 2]> {
        let rho = self.marginal_density(particle)?;
        let dx = self.spacing();
        let total = rho.sum();
        if total <= 0.0 { return Err(GridError::ZeroNorm); }
        let (mut x, mut y) = (0.0, 0.0);
        rho.indexed_iter()
            .for_each(|((i, j), r)| {
                x += i as f64 * dx * r;
                y += j as f64 * dx * r;
            });
        Ok([x / total, y / total])
    }

    /// Standard deviation of a particle's position along each axis.
    pub fn position_spread(&self, particle: usize) -> GridResult<[f64; 2]> {
        let rho = self.marginal_density(particle)?;
        let [mx, my] = self.mean_position(particle)?;
        let dx = self.spacing();
        let total = rho.sum();
        let (mut vx, mut vy) = (0.0, 0.0);
        rho.indexed_iter()
            .for_each(|((i, j), r)| {
                vx += (i as f64 * dx - mx).powi(2) * r;
                vy += (j as f64 * dx - my).powi(2) * r;
            });
        Ok([(vx / total).sqrt(), (vy / total).sqrt()])
    }

    /// Expectation value of a particle's momentum, ⟨(px, py)⟩ (with ħ = 1),
    /// computed from the momentum-space distribution.
    pub fn mean_momentum(&self, particle: usize) -> GridResult<[f64; 2]> {
        self.check_particle(particle)?;
        let fft = SpectralTransform::new(self.shape(), false)?;
        let phi = fft.forward(&self.psi)?;
        let dx = self.spacing();
        let [nx, ny] = self.grid_size();
        let kx = wavenumbers(nx, dx);
        let ky = wavenumbers(ny, dx);
        let (ax, ay) = (2 * particle, 2 * particle + 1);
        let (mut total, mut px, mut py) = (0.0, 0.0, 0.0);
        phi.as_array().indexed_iter()
            .for_each(|(ix, z)| {
                let w = z.norm_sqr();
                total += w;
                px += kx[ix[ax]] * w;
                py += ky[ix[ay]] * w;
            });
        if total <= 0.0 { return Err(GridError::ZeroNorm); }
        Ok([px / total, py / total])
    }
}
