//! Point spread functions
//!
//! A [PsfProvider] gives the sub-pixel kernel that is deposited at each trace sample.
//! Closures with the signature `Fn(f64) -> DMatrix<f64>` are providers.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Point spread function interface
pub trait PsfProvider: Send + Sync {
    /// Returns the sub-pixel kernel at the given wavelength
    ///
    /// The kernel is centered on the element at `(rows/2, columns/2)`
    fn kernel(&self, wavelength: f64) -> DMatrix<f64>;
}

impl<F> PsfProvider for F
where
    F: Fn(f64) -> DMatrix<f64> + Send + Sync,
{
    fn kernel(&self, wavelength: f64) -> DMatrix<f64> {
        self(wavelength)
    }
}

/// Single sub-pixel kernel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaPsf;
impl PsfProvider for DeltaPsf {
    fn kernel(&self, _wavelength: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, 1.)
    }
}

/// Gaussian point spread function
///
/// The standard deviation scales linearly with the wavelength:
/// `σ(λ) = sigma λ / reference_wavelength` in sub-pixels.
/// The kernel spans ±3σ and sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianPsf {
    /// Standard deviation at the reference wavelength [sub-px]
    pub sigma: f64,
    pub reference_wavelength: f64,
}
impl GaussianPsf {
    pub fn new(sigma: f64, reference_wavelength: f64) -> Self {
        Self {
            sigma,
            reference_wavelength,
        }
    }
    /// Standard deviation at `wavelength` [sub-px]
    pub fn sigma_at(&self, wavelength: f64) -> f64 {
        self.sigma * wavelength / self.reference_wavelength
    }
}
impl PsfProvider for GaussianPsf {
    fn kernel(&self, wavelength: f64) -> DMatrix<f64> {
        let sigma = self.sigma_at(wavelength);
        if !(sigma.is_finite() && sigma > 0.) {
            return DeltaPsf.kernel(wavelength);
        }
        let half = (3. * sigma).ceil() as usize;
        let n = 2 * half + 1;
        let c = half as f64;
        let mut kernel = DMatrix::<f64>::from_fn(n, n, |i, j| {
            let r2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2);
            (-0.5 * r2 / (sigma * sigma)).exp()
        });
        let sum = kernel.sum();
        kernel /= sum;
        kernel
    }
}
