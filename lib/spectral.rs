//! Multi-dimensional discrete Fourier transforms over every axis of a lattice.
//!
//! The kinetic-energy operator is diagonal in momentum space, so each
//! propagation step takes the wavefunction there and back. Transforms are
//! separable: a one-dimensional FFT is applied along every lane of each axis
//! in turn, giving *O*(*n* log *n*) cost per axis.
//!
//! Conventions match numpy: the forward transform is unnormalized and the
//! inverse divides by the total number of lattice sites, so that
//! `inverse(forward(g)) == g` up to rounding. Frequency ordering follows
//! [`fft_freq`][crate::utils::fft_freq].
//!
//! ```
//! use num_complex::Complex64 as C64;
//! use tdse2d::{ grid::ComplexGrid, spectral::SpectralTransform };
//!
//! let mut g = ComplexGrid::allocate(&[8, 8], 1.0).unwrap();
//! g.set(&[1, 2], C64::new(1.0, -0.5)).unwrap();
//! let fft = SpectralTransform::new(g.shape(), false).unwrap();
//! let back = fft.inverse(&fft.forward(&g).unwrap()).unwrap();
//! assert!((back.get(&[1, 2]).unwrap() - C64::new(1.0, -0.5)).norm() < 1e-12);
//! ```

use std::{ fmt, sync::Arc };
use ndarray as nd;
use num_complex::Complex64 as C64;
use rustfft::{ Fft, FftPlanner };
use crate::{
    error::GridError,
    grid::{ ComplexGrid, GridResult },
    utils::zip_for_each,
};

/// Forward and inverse FFT plans for every axis of a fixed lattice shape.
#[derive(Clone)]
pub struct SpectralTransform {
    shape: Vec<usize>,
    forward: Vec<Arc<dyn Fft<f64>>>,
    inverse: Vec<Arc<dyn Fft<f64>>>,
    parallel: bool,
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("shape", &self.shape)
            .field("parallel", &self.parallel)
            .finish()
    }
}

// apply a 1D plan to a single lane, going through a scratch buffer if the lane
// is not contiguous in memory
fn process_lane(plan: &dyn Fft<f64>, mut lane: nd::ArrayViewMut1<C64>) {
    if let Some(slice) = lane.as_slice_mut() {
        plan.process(slice);
        return;
    }
    let mut buf: Vec<C64> = lane.to_vec();
    plan.process(&mut buf);
    lane.iter_mut().zip(buf)
        .for_each(|(lk, bk)| { *lk = bk; });
}

impl SpectralTransform {
    /// Plan transforms for a lattice of the given shape.
    ///
    /// If `parallel` is `true`, lanes along each axis are distributed over the
    /// current rayon pool.
    pub fn new(shape: &[usize], parallel: bool) -> GridResult<Self> {
        GridError::check_shape(shape)?;
        let mut planner = FftPlanner::new();
        let forward: Vec<Arc<dyn Fft<f64>>>
            = shape.iter().map(|n| planner.plan_fft_forward(*n)).collect();
        let inverse: Vec<Arc<dyn Fft<f64>>>
            = shape.iter().map(|n| planner.plan_fft_inverse(*n)).collect();
        Ok(Self { shape: shape.to_vec(), forward, inverse, parallel })
    }

    pub fn shape(&self) -> &[usize] { &self.shape }

    pub fn is_parallel(&self) -> bool { self.parallel }

    fn transform_axes<S, D>(
        &self,
        plans: &[Arc<dyn Fft<f64>>],
        a: &mut nd::ArrayBase<S, D>,
    ) -> GridResult<()>
    where
        S: nd::DataMut<Elem = C64>,
        D: nd::Dimension,
    {
        GridError::check_same_shape(&self.shape, a.shape())?;
        for (k, plan) in plans.iter().enumerate() {
            if self.shape[k] == 1 { continue; }
            let plan: &dyn Fft<f64> = plan.as_ref();
            zip_for_each!(
                self.parallel,
                nd::Zip::from(a.lanes_mut(nd::Axis(k))),
                |lane| process_lane(plan, lane),
            );
        }
        Ok(())
    }

    /// Transform position-space values to frequency space in place.
    pub fn forward_inplace<S, D>(&self, a: &mut nd::ArrayBase<S, D>)
        -> GridResult<()>
    where
        S: nd::DataMut<Elem = C64>,
        D: nd::Dimension,
    {
        self.transform_axes(&self.forward, a)
    }

    /// Transform frequency-space values back to position space in place,
    /// including the 1/N normalization.
    pub fn inverse_inplace<S, D>(&self, a: &mut nd::ArrayBase<S, D>)
        -> GridResult<()>
    where
        S: nd::DataMut<Elem = C64>,
        D: nd::Dimension,
    {
        self.transform_axes(&self.inverse, a)?;
        let n = a.len() as f64;
        zip_for_each!(
            self.parallel,
            nd::Zip::from(a),
            |ak| { *ak /= n; },
        );
        Ok(())
    }

    /// Return the frequency-space representation of a grid.
    pub fn forward(&self, grid: &ComplexGrid) -> GridResult<ComplexGrid> {
        let mut out = grid.clone();
        self.forward_inplace(out.as_array_mut())?;
        Ok(out)
    }

    /// Return the position-space representation of a frequency-space grid.
    pub fn inverse(&self, grid: &ComplexGrid) -> GridResult<ComplexGrid> {
        let mut out = grid.clone();
        self.inverse_inplace(out.as_array_mut())?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;
    use approx::assert_abs_diff_eq;
    use nd::Dimension;

    #[test]
    fn constant_field_has_only_dc() {
        let fft = SpectralTransform::new(&[4, 6], false).unwrap();
        let mut a: nd::Array2<C64> = nd::Array2::from_elem((4, 6), C64::new(3.0, 0.0));
        fft.forward_inplace(&mut a).unwrap();
        assert_abs_diff_eq!(a[[0, 0]].re, 72.0, epsilon = 1e-12);
        a.indexed_iter()
            .filter(|(ij, _)| *ij != (0, 0))
            .for_each(|(_, z)| assert!(z.norm() < 1e-12));
    }

    #[test]
    fn plane_wave_lands_on_its_frequency_index() {
        // exp(i 2π 3 j / 8) along axis 1 of an 8×8 grid
        let n = 8;
        let fft = SpectralTransform::new(&[n, n], false).unwrap();
        let mut a: nd::Array2<C64>
            = nd::Array2::from_shape_fn((n, n), |(_, j)| {
                C64::cis(TAU * 3.0 * j as f64 / n as f64)
            });
        fft.forward_inplace(&mut a).unwrap();
        assert_abs_diff_eq!(a[[0, 3]].re, (n * n) as f64, epsilon = 1e-10);
        assert_abs_diff_eq!(a[[0, 3]].im, 0.0, epsilon = 1e-10);
        assert!(a[[0, 5]].norm() < 1e-10);
    }

    #[test]
    fn rejects_wrong_shape() {
        let fft = SpectralTransform::new(&[4, 4], false).unwrap();
        let mut a: nd::Array2<C64> = nd::Array2::zeros((4, 5));
        assert_eq!(
            fft.forward_inplace(&mut a),
            Err(GridError::ShapeMismatch(vec![4, 4], vec![4, 5])),
        );
    }

    #[test]
    fn parallel_matches_sequential_in_4d() {
        let shape = [3, 4, 5, 2];
        let seq = SpectralTransform::new(&shape, false).unwrap();
        let par = SpectralTransform::new(&shape, true).unwrap();
        let a: nd::ArrayD<C64>
            = nd::ArrayD::from_shape_fn(nd::IxDyn(&shape), |ix| {
                let s: usize = ix.slice().iter().sum();
                C64::new((s as f64).sin(), (s as f64 * 0.3).cos())
            });
        let mut b = a.clone();
        let mut c = a.clone();
        seq.forward_inplace(&mut b).unwrap();
        par.forward_inplace(&mut c).unwrap();
        nd::Zip::from(&b).and(&c)
            .for_each(|bk, ck| assert!((bk - ck).norm() < 1e-12));
        par.inverse_inplace(&mut c).unwrap();
        nd::Zip::from(&a).and(&c)
            .for_each(|ak, ck| assert!((ak - ck).norm() < 1e-12));
    }
}
