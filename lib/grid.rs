//! Dense storage for complex scalar fields over a rectangular lattice.
//!
//! A [`ComplexGrid`] pairs an N-dimensional array of [`C64`] values with the
//! (uniform) lattice spacing, so that quantities like the norm carry the
//! correct cell volume.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::GridError,
    utils::{ sum_norm_sqr, zip_for_each },
};

pub type GridResult<T> = Result<T, GridError>;

/// A complex field sampled on a lattice with uniform spacing.
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexGrid {
    data: nd::ArrayD<C64>,
    spacing: f64,
}

impl ComplexGrid {
    /// Allocate a zero-initialized grid.
    pub fn allocate(shape: &[usize], spacing: f64) -> GridResult<Self> {
        GridError::check_shape(shape)?;
        GridError::check_spacing(spacing)?;
        let data = nd::ArrayD::zeros(nd::IxDyn(shape));
        Ok(Self { data, spacing })
    }

    /// Wrap an existing array.
    pub fn from_array(data: nd::ArrayD<C64>, spacing: f64) -> GridResult<Self> {
        GridError::check_shape(data.shape())?;
        GridError::check_spacing(spacing)?;
        Ok(Self { data, spacing })
    }

    pub fn shape(&self) -> &[usize] { self.data.shape() }

    pub fn ndim(&self) -> usize { self.data.ndim() }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn spacing(&self) -> f64 { self.spacing }

    /// Volume of a single lattice cell, `spacing^ndim`.
    pub fn cell_volume(&self) -> f64 {
        self.spacing.powi(self.ndim() as i32)
    }

    pub fn as_array(&self) -> &nd::ArrayD<C64> { &self.data }

    pub fn as_array_mut(&mut self) -> &mut nd::ArrayD<C64> { &mut self.data }

    pub fn into_array(self) -> nd::ArrayD<C64> { self.data }

    fn check_index(&self, index: &[usize]) -> GridResult<()> {
        let shape = self.shape();
        (index.len() == shape.len()
            && index.iter().zip(shape).all(|(i, n)| i < n))
            .then_some(())
            .ok_or_else(|| GridError::IndexOutOfRange {
                index: index.to_vec(),
                shape: shape.to_vec(),
            })
    }

    /// Get the value at a multi-index.
    pub fn get(&self, index: &[usize]) -> GridResult<C64> {
        self.check_index(index)?;
        Ok(self.data[index])
    }

    /// Set the value at a multi-index.
    pub fn set(&mut self, index: &[usize], value: C64) -> GridResult<()> {
        self.check_index(index)?;
        self.data[index] = value;
        Ok(())
    }

    /// Multiply every value by a constant.
    pub fn scale(&mut self, factor: C64) {
        self.data.map_inplace(|z| { *z *= factor; });
    }

    /// Multiply pointwise by another grid of identical shape.
    pub fn mul_elementwise(&mut self, other: &Self) -> GridResult<()> {
        GridError::check_same_shape(self.shape(), other.shape())?;
        nd::Zip::from(&mut self.data).and(&other.data)
            .for_each(|z, w| { *z *= w; });
        Ok(())
    }

    /// Calculate Σ|ψ|² × cell volume.
    pub fn norm(&self) -> f64 {
        self.norm_with(false)
    }

    pub(crate) fn norm_with(&self, parallel: bool) -> f64 {
        sum_norm_sqr(&self.data, parallel) * self.cell_volume()
    }

    /// Multiply pointwise by a real-valued field, in parallel if requested.
    pub(crate) fn mul_real(
        &mut self,
        factor: &nd::ArrayD<f64>,
        parallel: bool,
    ) -> GridResult<()>
    {
        GridError::check_same_shape(self.shape(), factor.shape())?;
        zip_for_each!(
            parallel,
            nd::Zip::from(&mut self.data).and(factor),
            |z, f| { *z *= *f; },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_traits::Zero;

    #[test]
    fn allocate_rejects_bad_shapes() {
        assert_eq!(
            ComplexGrid::allocate(&[4, 0], 1.0),
            Err(GridError::InvalidShape(vec![4, 0])),
        );
        assert_eq!(
            ComplexGrid::allocate(&[], 1.0),
            Err(GridError::InvalidShape(vec![])),
        );
        assert_eq!(
            ComplexGrid::allocate(&[4, 4], -0.5),
            Err(GridError::BadSpacing(-0.5)),
        );
    }

    #[test]
    fn allocate_is_zeroed() {
        let g = ComplexGrid::allocate(&[3, 5], 0.5).unwrap();
        assert_eq!(g.shape(), &[3, 5]);
        assert!(g.as_array().iter().all(|z| z.is_zero()));
        assert_abs_diff_eq!(g.cell_volume(), 0.25);
    }

    #[test]
    fn get_set_checks_bounds() {
        let mut g = ComplexGrid::allocate(&[2, 3], 1.0).unwrap();
        g.set(&[1, 2], C64::new(1.0, -2.0)).unwrap();
        assert_eq!(g.get(&[1, 2]).unwrap(), C64::new(1.0, -2.0));
        assert!(matches!(
            g.get(&[2, 0]),
            Err(GridError::IndexOutOfRange { .. }),
        ));
        assert!(matches!(
            g.set(&[0, 0, 0], C64::new(1.0, 0.0)),
            Err(GridError::IndexOutOfRange { .. }),
        ));
    }

    #[test]
    fn elementwise_requires_same_shape() {
        let mut a = ComplexGrid::allocate(&[2, 2], 1.0).unwrap();
        let b = ComplexGrid::allocate(&[2, 3], 1.0).unwrap();
        assert_eq!(
            a.mul_elementwise(&b),
            Err(GridError::ShapeMismatch(vec![2, 2], vec![2, 3])),
        );
    }

    #[test]
    fn norm_includes_cell_volume() {
        let mut g = ComplexGrid::allocate(&[2, 2], 0.5).unwrap();
        g.as_array_mut().fill(C64::new(1.0, 1.0));
        // 4 sites × |1 + i|² × 0.5²
        assert_abs_diff_eq!(g.norm(), 2.0, epsilon = 1e-15);
        g.scale(C64::new(0.0, 2.0));
        assert_abs_diff_eq!(g.norm(), 8.0, epsilon = 1e-14);
        assert_abs_diff_eq!(g.norm_with(true), 8.0, epsilon = 1e-14);
    }

    #[test]
    fn mul_elementwise_multiplies() {
        let mut a = ComplexGrid::allocate(&[2], 1.0).unwrap();
        let mut b = ComplexGrid::allocate(&[2], 1.0).unwrap();
        a.set(&[0], C64::new(0.0, 1.0)).unwrap();
        b.set(&[0], C64::new(0.0, 1.0)).unwrap();
        a.mul_elementwise(&b).unwrap();
        assert_eq!(a.get(&[0]).unwrap(), C64::new(-1.0, 0.0));
        assert!(a.get(&[1]).unwrap().is_zero());
    }
}
