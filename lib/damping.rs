//! Absorbing boundary layer.
//!
//! Spectral propagation treats the domain as periodic, so probability reaching
//! one edge would reappear at the opposite one. The damping layer emulates an
//! open boundary by attenuating the wavefunction within `width` lattice sites
//! of any edge, with a cosine taper
//! ```text
//! s(d) = 1 - f (1 + cos(π d / w)) / 2,   d < w
//! s(d) = 1,                              d ≥ w
//! ```
//! where `d` is the distance (in sites) to the nearest edge. The taper equals
//! `1 - f` on the edge itself and joins the untouched interior with zero slope,
//! so no high-frequency content is injected into the next spectral step.

use std::f64::consts::PI;
use ndarray as nd;
use crate::{
    error::GridError,
    grid::{ ComplexGrid, GridResult },
    utils::zip_for_each,
};

/// Precomputed boundary-attenuation multipliers for a fixed lattice shape.
#[derive(Clone, Debug, PartialEq)]
pub struct DampingLayer {
    width: f64,
    factor: f64,
    mask: Option<nd::ArrayD<f64>>,
    parallel: bool,
}

impl DampingLayer {
    /// Build the layer for a lattice of the given shape.
    ///
    /// A zero `width` or `factor` produces the identity layer. Fails with
    /// [`GridError::BadDamping`] for a negative or non-finite width or a factor
    /// outside `[0, 1]`.
    pub fn new(shape: &[usize], width: f64, factor: f64, parallel: bool)
        -> GridResult<Self>
    {
        GridError::check_shape(shape)?;
        GridError::check_damping(width, factor)?;
        let mut layer = Self { width, factor, mask: None, parallel };
        if layer.is_identity() { return Ok(layer); }
        // the taper is non-decreasing in d, so the multiplier for the nearest
        // edge is the minimum over the per-axis multipliers
        let mut mask: nd::ArrayD<f64> = nd::ArrayD::ones(nd::IxDyn(shape));
        for (k, &n) in shape.iter().enumerate() {
            let edge: nd::Array1<f64>
                = (0..n)
                .map(|i| layer.profile(i.min(n - 1 - i) as f64))
                .collect();
            zip_for_each!(
                parallel,
                nd::Zip::from(mask.lanes_mut(nd::Axis(k))),
                |mut lane: nd::ArrayViewMut1<f64>| {
                    lane.zip_mut_with(&edge, |s, e| { *s = s.min(*e); });
                },
            );
        }
        layer.mask = Some(mask);
        Ok(layer)
    }

    pub fn width(&self) -> f64 { self.width }

    pub fn factor(&self) -> f64 { self.factor }

    /// `true` if the layer leaves every site untouched.
    pub fn is_identity(&self) -> bool {
        self.width <= 0.0 || self.factor <= 0.0
    }

    /// Attenuation multiplier at distance `d` (in sites) from the nearest edge.
    pub fn profile(&self, d: f64) -> f64 {
        if self.is_identity() || d >= self.width {
            1.0
        } else {
            1.0 - self.factor * (1.0 + (PI * d / self.width).cos()) / 2.0
        }
    }

    /// The per-site multipliers, or `None` for the identity layer.
    pub fn mask(&self) -> Option<&nd::ArrayD<f64>> { self.mask.as_ref() }

    /// Attenuate a wavefunction in place.
    pub fn apply(&self, psi: &mut ComplexGrid) -> GridResult<()> {
        match self.mask.as_ref() {
            Some(mask) => psi.mul_real(mask, self.parallel),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Dimension;
    use num_complex::Complex64 as C64;

    #[test]
    fn zero_width_or_factor_is_identity() {
        assert!(DampingLayer::new(&[8, 8], 0.0, 0.5, false).unwrap().is_identity());
        assert!(DampingLayer::new(&[8, 8], 3.0, 0.0, false).unwrap().is_identity());
        let layer = DampingLayer::new(&[8, 8], 3.0, 0.0, false).unwrap();
        assert!(layer.mask().is_none());
        let mut g = ComplexGrid::allocate(&[8, 8], 1.0).unwrap();
        g.as_array_mut().fill(C64::new(0.3, -0.4));
        let before = g.clone();
        layer.apply(&mut g).unwrap();
        assert_eq!(g, before);
    }

    #[test]
    fn taper_endpoints_and_monotonicity() {
        let layer = DampingLayer::new(&[16, 16], 4.0, 0.6, false).unwrap();
        assert_abs_diff_eq!(layer.profile(0.0), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.profile(4.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.profile(7.0), 1.0, epsilon = 1e-12);
        let values: Vec<f64> = (0..=8).map(|k| layer.profile(k as f64 * 0.5)).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn mask_uses_nearest_edge() {
        let layer = DampingLayer::new(&[10, 12], 3.0, 1.0, true).unwrap();
        let mask = layer.mask().unwrap();
        // corners and edges fully absorb with f = 1
        assert_abs_diff_eq!(mask[[0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mask[[9, 5]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mask[[4, 11]], 0.0, epsilon = 1e-12);
        // one site in from the top edge, far from the others
        assert_abs_diff_eq!(mask[[1, 6]], layer.profile(1.0), epsilon = 1e-12);
        // interior untouched
        assert_abs_diff_eq!(mask[[4, 5]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mask[[3, 3]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn works_in_four_dimensions() {
        let layer = DampingLayer::new(&[6, 6, 6, 6], 2.0, 0.5, false).unwrap();
        let mask = layer.mask().unwrap();
        assert_abs_diff_eq!(mask[[3, 3, 3, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(mask[[2, 3, 3, 2]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn parallel_mask_matches_sequential() {
        for shape in [vec![9, 14], vec![5, 6, 7, 4]] {
            let a = DampingLayer::new(&shape, 2.5, 0.7, false).unwrap();
            let b = DampingLayer::new(&shape, 2.5, 0.7, true).unwrap();
            assert_eq!(a.mask(), b.mask());
            let mask = a.mask().unwrap();
            for (ix, s) in mask.indexed_iter() {
                let d = ix.slice().iter().zip(&shape)
                    .map(|(&i, &n)| i.min(n - 1 - i))
                    .min()
                    .unwrap();
                assert_abs_diff_eq!(*s, a.profile(d as f64), epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn rejects_bad_width_or_factor() {
        for (width, factor) in [
            (f64::NAN, 0.5),
            (-1.0, 0.5),
            (f64::INFINITY, 0.5),
            (2.0, f64::NAN),
            (2.0, -0.1),
            (2.0, 1.5),
        ] {
            assert!(matches!(
                DampingLayer::new(&[8, 8], width, factor, false),
                Err(GridError::BadDamping { .. }),
            ));
        }
    }
}
