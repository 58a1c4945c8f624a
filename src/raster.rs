//! Trace rasterization
//!
//! Each trace sample deposits the point spread function kernel, scaled by the sample flux,
//! into the sub-pixel buffer of the lenslet sub-image.
//! The buffer rows follow the detector x axis and the columns the detector y axis.

use nalgebra::DMatrix;

use crate::{PsfProvider, Trace};

/// Rasterizes a trace into a new sub-pixel buffer of the trace sub-image size
///
/// The kernel parts falling outside the buffer are dropped.
pub fn rasterize<P: PsfProvider + ?Sized>(trace: &Trace, psf: &P) -> DMatrix<f64> {
    let [n_rows, n_cols] = trace.size();
    let mut buffer = DMatrix::<f64>::zeros(n_rows, n_cols);
    for sample in trace.samples() {
        let kernel = psf.kernel(sample.wavelength);
        let (k_rows, k_cols) = kernel.shape();
        let i0 = sample.x - (k_rows / 2) as i64;
        let j0 = sample.y - (k_cols / 2) as i64;
        // clipped kernel extent
        let ki = (-i0).max(0) as usize..k_rows.min((n_rows as i64 - i0).max(0) as usize);
        let kj = (-j0).max(0) as usize..k_cols.min((n_cols as i64 - j0).max(0) as usize);
        if ki.is_empty() || kj.is_empty() {
            log::debug!(
                "trace sample at ({},{}) falls outside of the {:?} sub-image",
                sample.x,
                sample.y,
                trace.size()
            );
            continue;
        }
        for b in kj {
            let j = (j0 + b as i64) as usize;
            for a in ki.clone() {
                let i = (i0 + a as i64) as usize;
                buffer[(i, j)] += kernel[(a, b)] * sample.flux;
            }
        }
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{psf::DeltaPsf, GaussianPsf, TraceSample};

    fn sample(x: i64, y: i64, flux: f64) -> TraceSample {
        TraceSample {
            x,
            y,
            wavelength: 500e-9,
            flux,
            resolution: 100.,
            delta_wavelength: 1e-9,
        }
    }

    #[test]
    fn delta() {
        let trace = Trace::new(vec![sample(2, 3, 10.), sample(2, 3, 5.)], [8, 12], [0, 0]);
        let image = rasterize(&trace, &DeltaPsf);
        assert_eq!(image.shape(), (8, 12));
        assert_eq!(image[(2, 3)], 15.);
        assert_eq!(image.sum(), 15.);
    }

    #[test]
    fn flux_conservation() {
        let samples = (0..10).map(|i| sample(10, 5 + i, 1.)).collect();
        let trace = Trace::new(samples, [20, 24], [0, 0]);
        let image = rasterize(&trace, &GaussianPsf::new(1., 500e-9));
        assert!((image.sum() - trace.total_flux()).abs() < 1e-9);
    }

    #[test]
    fn clipping() {
        let psf = |_: f64| DMatrix::<f64>::from_element(3, 3, 1.);
        let trace = Trace::new(vec![sample(0, 0, 1.), sample(40, 40, 1.)], [4, 4], [0, 0]);
        let image = rasterize(&trace, &psf);
        // only the lower right quadrant of the first kernel lands in the buffer
        assert_eq!(image.sum(), 4.);
        assert_eq!(image[(1, 1)], 1.);
        assert_eq!(image[(2, 2)], 0.);
    }
}
