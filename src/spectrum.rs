//! Source spectra
//!
//! A [SpectrumEvaluator] returns the source flux at the wavelengths of the trace samples,
//! given the spectral resolution at each sample.
//! Closures with the signature `Fn(&[f64], &[f64]) -> (Vec<f64>, Vec<f64>)` are evaluators.

use serde::{Deserialize, Serialize};

const PLANCK: f64 = 6.62607015e-34;
const LIGHT_SPEED: f64 = 2.99792458e8;
const BOLTZMANN: f64 = 1.380649e-23;

/// Spectrum evaluation interface
pub trait SpectrumEvaluator: Send + Sync {
    /// Returns the wavelengths and the fluxes of the spectrum sampled at `wavelengths`
    /// with the resolution `resolution`
    ///
    /// Both returned vectors have the length of `wavelengths`
    fn evaluate(&self, wavelengths: &[f64], resolution: &[f64]) -> (Vec<f64>, Vec<f64>);
    /// Spectrum name, attached to the sub-images
    fn name(&self) -> String {
        String::from("NO SPEC")
    }
}

impl<F> SpectrumEvaluator for F
where
    F: Fn(&[f64], &[f64]) -> (Vec<f64>, Vec<f64>) + Send + Sync,
{
    fn evaluate(&self, wavelengths: &[f64], resolution: &[f64]) -> (Vec<f64>, Vec<f64>) {
        self(wavelengths, resolution)
    }
}

/// Flat spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatSpectrum {
    pub flux: f64,
}
impl FlatSpectrum {
    pub fn new(flux: f64) -> Self {
        Self { flux }
    }
}
impl SpectrumEvaluator for FlatSpectrum {
    fn evaluate(&self, wavelengths: &[f64], _resolution: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (wavelengths.to_vec(), vec![self.flux; wavelengths.len()])
    }
    fn name(&self) -> String {
        format!("Flat({:e})", self.flux)
    }
}

/// Black body spectrum
///
/// The flux is the Planck photon spectral radiance `2c/λ⁴/(exp(hc/λkT)-1)` times `scale`,
/// with the wavelengths in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlackBodySpectrum {
    /// Temperature [K]
    pub temperature: f64,
    pub scale: f64,
}
impl BlackBodySpectrum {
    pub fn new(temperature: f64, scale: f64) -> Self {
        Self { temperature, scale }
    }
    /// Photon spectral radiance at wavelength `wavelength` [m]
    pub fn photon_radiance(&self, wavelength: f64) -> f64 {
        let x = PLANCK * LIGHT_SPEED / (wavelength * BOLTZMANN * self.temperature);
        self.scale * 2. * LIGHT_SPEED / wavelength.powi(4) / x.exp_m1()
    }
}
impl SpectrumEvaluator for BlackBodySpectrum {
    fn evaluate(&self, wavelengths: &[f64], _resolution: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (
            wavelengths.to_vec(),
            wavelengths
                .iter()
                .map(|&l| self.photon_radiance(l))
                .collect(),
        )
    }
    fn name(&self) -> String {
        format!("BlackBody({}K)", self.temperature)
    }
}

/// Tabulated spectrum
///
/// The table is linearly interpolated and averaged over the resolution element
/// `[λ - λ/2R, λ + λ/2R]` of each sample; it is 0 outside the tabulated range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledSpectrum {
    name: String,
    wavelengths: Vec<f64>,
    flux: Vec<f64>,
}
impl SampledSpectrum {
    /// Creates a tabulated spectrum, the table is sorted by wavelengths
    pub fn new<S: Into<String>>(name: S, wavelengths: Vec<f64>, flux: Vec<f64>) -> Self {
        let mut table: Vec<_> = wavelengths.into_iter().zip(flux).collect();
        table.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (wavelengths, flux) = table.into_iter().unzip();
        Self {
            name: name.into(),
            wavelengths,
            flux,
        }
    }
    /// Linear interpolation of the table at `wavelength`
    pub fn interpolate(&self, wavelength: f64) -> f64 {
        let n = self.wavelengths.len();
        if n == 0 || wavelength < self.wavelengths[0] || wavelength > self.wavelengths[n - 1] {
            return 0.;
        }
        let i = self.wavelengths.partition_point(|&l| l <= wavelength);
        if i == n {
            return self.flux[n - 1];
        }
        let (l0, l1) = (self.wavelengths[i - 1], self.wavelengths[i]);
        let (f0, f1) = (self.flux[i - 1], self.flux[i]);
        f0 + (f1 - f0) * (wavelength - l0) / (l1 - l0)
    }
    fn resolution_element_mean(&self, wavelength: f64, resolution: f64) -> f64 {
        const N: usize = 11;
        if !(resolution.is_finite() && resolution > 0.) {
            return self.interpolate(wavelength);
        }
        let half_width = 0.5 * wavelength / resolution;
        (0..N)
            .map(|k| {
                let t = k as f64 / (N - 1) as f64;
                self.interpolate(wavelength - half_width + 2. * half_width * t)
            })
            .sum::<f64>()
            / N as f64
    }
}
impl SpectrumEvaluator for SampledSpectrum {
    fn evaluate(&self, wavelengths: &[f64], resolution: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let flux = wavelengths
            .iter()
            .zip(resolution)
            .map(|(&l, &r)| self.resolution_element_mean(l, r))
            .collect();
        (wavelengths.to_vec(), flux)
    }
    fn name(&self) -> String {
        self.name.clone()
    }
}
