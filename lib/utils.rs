//! Miscellaneous tools.

use std::f64::consts::TAU;
use ndarray::{ self as nd, concatenate };

/// Run an [`ndarray::Zip`] either across the current rayon pool or on the
/// calling thread.
///
/// The zip expression is only evaluated in the branch that is taken.
macro_rules! zip_for_each {
    ($parallel:expr, $zip:expr, $f:expr $(,)?) => {
        if $parallel { $zip.par_for_each($f) } else { $zip.for_each($f) }
    };
}
pub(crate) use zip_for_each;

/// Generate an array of frequency-space coordinates to accompany a FFT of `n`
/// points for sampling interval `d`.
///
/// Index 0 holds the zero frequency; indices past the Nyquist index wrap
/// around to negative frequencies.
pub fn fft_freq(n: usize, d: f64) -> nd::Array1<f64> {
    let m = if n % 2 == 0 { n / 2 } else { (n + 1) / 2 };
    let fp: nd::Array1<f64>
        = (0..m)
        .map(|k| k as f64 / (n as f64 * d))
        .collect();
    let fm: nd::Array1<f64>
        = (1..n - m + 1).rev()
        .map(|k| -(k as f64) / (n as f64 * d))
        .collect();
    concatenate!(nd::Axis(0), fp, fm)
}

/// Generate the angular wavenumbers `k = 2π f` matching [`fft_freq`] for `n`
/// lattice sites with spacing `dx`.
pub fn wavenumbers(n: usize, dx: f64) -> nd::Array1<f64> {
    fft_freq(n, dx).mapv(|f| TAU * f)
}

/// Sum of |z|² over a complex array, in parallel if requested.
pub(crate) fn sum_norm_sqr<S, D>(a: &nd::ArrayBase<S, D>, parallel: bool)
    -> f64
where
    S: nd::Data<Elem = num_complex::Complex64>,
    D: nd::Dimension,
{
    use rayon::prelude::*;
    if parallel {
        a.view().into_par_iter().map(|z| z.norm_sqr()).sum()
    } else {
        a.iter().map(|z| z.norm_sqr()).sum()
    }
}
