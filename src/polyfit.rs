//! Least squares polynomial fits
//!
//! Maps the lenslet calibration wavelengths to detector pixel coordinates.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("abscissa and ordinate lengths differ: {0} and {1}")]
    Length(usize, usize),
    #[error("{points} points cannot constrain a degree {degree} polynomial")]
    Underdetermined { points: usize, degree: usize },
    #[error("least squares solution failed: {0}")]
    Solve(String),
}

/// Polynomial in the normalized abscissa `t = (x - shift) / scale`
///
/// The normalization keeps the Vandermonde matrix well conditioned for abscissa like
/// wavelengths in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    /// Coefficients in increasing degree order
    coefficients: Vec<f64>,
    shift: f64,
    scale: f64,
}

impl Polynomial {
    /// Least squares fit of a polynomial of the given degree to the points `(x,y)`
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::Length(x.len(), y.len()));
        }
        let n = x.len();
        if n <= degree {
            return Err(FitError::Underdetermined {
                points: n,
                degree,
            });
        }
        let shift = x.iter().sum::<f64>() / n as f64;
        let scale = x
            .iter()
            .map(|x| (x - shift).abs())
            .fold(0f64, |a, b| a.max(b));
        let scale = if scale > 0. { scale } else { 1. };
        let vandermonde = DMatrix::<f64>::from_fn(n, degree + 1, |i, k| {
            ((x[i] - shift) / scale).powi(k as i32)
        });
        let b = DVector::<f64>::from_column_slice(y);
        let coefficients = vandermonde
            .svd(true, true)
            .solve(&b, 1e-12)
            .map_err(|msg| FitError::Solve(msg.to_string()))?;
        Ok(Self {
            coefficients: coefficients.as_slice().to_vec(),
            shift,
            scale,
        })
    }
    /// Evaluates the polynomial at `x`
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.shift) / self.scale;
        self.coefficients
            .iter()
            .rev()
            .fold(0f64, |a, c| a * t + c)
    }
    /// Returns the polynomial degree
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
    /// Returns the coefficients of the polynomial in the raw abscissa `x`, in increasing degree order
    pub fn coefficients(&self) -> Vec<f64> {
        // expands Σ c_k ((x - s)/a)^k with the binomial theorem
        let n = self.coefficients.len();
        let mut raw = vec![0f64; n];
        for (k, c) in self.coefficients.iter().enumerate() {
            let ck = c / self.scale.powi(k as i32);
            let mut binomial = 1f64;
            for j in 0..=k {
                raw[j] += ck * binomial * (-self.shift).powi((k - j) as i32);
                binomial = binomial * (k - j) as f64 / (j + 1) as f64;
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic() {
        let x: Vec<f64> = (0..7).map(|i| 400e-9 + i as f64 * 40e-9).collect();
        let f = |x: f64| 120. + 3e7 * x - 2e13 * x * x;
        let y: Vec<f64> = x.iter().map(|&x| f(x)).collect();
        let p = Polynomial::fit(&x, &y, 2).unwrap();
        assert_eq!(p.degree(), 2);
        for &x in &x {
            assert!((p.eval(x) - f(x)).abs() < 1e-8);
        }
        assert!((p.eval(500e-9) - f(500e-9)).abs() < 1e-8);
    }

    #[test]
    fn raw_coefficients() {
        let x = [1., 2., 3., 4.];
        let y: Vec<f64> = x.iter().map(|x| 1. + 2. * x + 3. * x * x).collect();
        let c = Polynomial::fit(&x, &y, 2).unwrap().coefficients();
        [1., 2., 3.]
            .iter()
            .zip(&c)
            .for_each(|(e, c)| assert!((e - c).abs() < 1e-9, "{c:?}"));
    }

    #[test]
    fn least_squares() {
        let x = [0., 1., 2., 3.];
        let y = [0., 1., 1., 2.];
        let p = Polynomial::fit(&x, &y, 1).unwrap();
        // slope 0.6, intercept 0.1
        assert!((p.eval(0.) - 0.1).abs() < 1e-12);
        assert!((p.eval(1.) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn errors() {
        assert_eq!(
            Polynomial::fit(&[1., 2.], &[1.], 1),
            Err(FitError::Length(2, 1))
        );
        assert_eq!(
            Polynomial::fit(&[1., 2.], &[1., 2.], 2),
            Err(FitError::Underdetermined {
                points: 2,
                degree: 2
            })
        );
    }
}
