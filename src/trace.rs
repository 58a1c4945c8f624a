//! Lenslet trace synthesis
//!
//! The trace samples the dispersion curve on the sub-pixel grid of a sub-image that is
//! local to the lenslet, and attaches to each sample its wavelength, its spectral
//! resolution and the source flux in detector counts.

use serde::{Deserialize, Serialize};

use crate::{DispersionCurve, InstrumentConfig, SpectrumEvaluator};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceError {
    #[error("a trace needs at least 2 dispersion samples, found {0}")]
    TooShort(usize),
    #[error("the spectrum returned {found} samples instead of {expected}")]
    SpectrumLength { expected: usize, found: usize },
}

/// A trace sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    /// Sub-image x position [sub-px]
    pub x: i64,
    /// Sub-image y position [sub-px]
    pub y: i64,
    pub wavelength: f64,
    /// Flux [counts]
    pub flux: f64,
    /// Sub-pixels per resolution element
    pub resolution: f64,
    /// Wavelength increment to the next sample
    pub delta_wavelength: f64,
}

/// Placement of a lenslet trace into its sub-image
///
/// The sub-image spans the detector pixels covered by the trace, plus the padding on
/// every side. The sub-pixel position of a sample in the full frame is
/// `corner * density + coordinates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubImageLayout {
    /// Sub-image positions [sub-px]
    pub coordinates: Vec<[i64; 2]>,
    /// Sub-image size [sub-px]
    pub size: [usize; 2],
    /// Full frame position of the sub-image corner [px]
    pub corner: [i64; 2],
    /// Position of the trace start inside its first detector pixel [sub-px]
    pub offset: [i64; 2],
}

impl SubImageLayout {
    /// Computes the layout from the full frame sub-pixel positions `dense` of the samples
    ///
    /// Returns `None` if there are no samples or if `density` is 0
    pub fn new(dense: &[[i64; 2]], density: usize, padding: usize) -> Option<Self> {
        if dense.is_empty() || density == 0 {
            return None;
        }
        let d = density as i64;
        let padding = padding as i64;

        let min = [0, 1].map(|k| dense.iter().map(|p| p[k]).min().unwrap_or_default());
        let max = [0, 1].map(|k| dense.iter().map(|p| p[k]).max().unwrap_or_default());
        // first and last detector pixels covered by the trace
        let first = min.map(|m| m.div_euclid(d));
        let last = max.map(|m| m.div_euclid(d));
        let offset = [min[0] - first[0] * d, min[1] - first[1] * d];
        let corner = first.map(|f| f - padding);

        let coordinates = dense
            .iter()
            .map(|p| [p[0] - corner[0] * d, p[1] - corner[1] * d])
            .collect();
        let size = [0, 1].map(|k| ((last[k] - first[k] + 1 + 2 * padding) * d) as usize);

        Some(Self {
            coordinates,
            size,
            corner,
            offset,
        })
    }
    /// Full frame sub-pixel position of the sub-image position `local`
    pub fn to_full_frame(&self, local: [i64; 2], density: usize) -> [i64; 2] {
        let d = density as i64;
        [self.corner[0] * d + local[0], self.corner[1] * d + local[1]]
    }
}

/// Lenslet trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    samples: Vec<TraceSample>,
    size: [usize; 2],
    corner: [i64; 2],
    offset: [i64; 2],
}

impl Trace {
    /// Creates a trace from its samples, its sub-image size [sub-px] and its corner [px]
    pub fn new(samples: Vec<TraceSample>, size: [usize; 2], corner: [i64; 2]) -> Self {
        Self {
            samples,
            size,
            corner,
            offset: [0; 2],
        }
    }
    pub fn samples(&self) -> &[TraceSample] {
        &self.samples
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    /// Sub-image size [sub-px]
    pub fn size(&self) -> [usize; 2] {
        self.size
    }
    /// Full frame position of the sub-image corner [px]
    pub fn corner(&self) -> [i64; 2] {
        self.corner
    }
    /// Position of the trace start inside its first detector pixel [sub-px]
    pub fn offset(&self) -> [i64; 2] {
        self.offset
    }
    pub fn wavelengths(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.wavelength).collect()
    }
    pub fn fluxes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.flux).collect()
    }
    pub fn resolutions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.resolution).collect()
    }
    pub fn delta_wavelengths(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.delta_wavelength).collect()
    }
    /// Total flux [counts]
    pub fn total_flux(&self) -> f64 {
        self.samples.iter().map(|s| s.flux).sum()
    }
}

/// Synthesizes the trace of a dispersion curve for a given source spectrum
pub fn synthesize<S: SpectrumEvaluator + ?Sized>(
    curve: &DispersionCurve,
    config: &InstrumentConfig,
    spectrum: &S,
) -> Result<Trace, TraceError> {
    let n = curve.len();
    if n < 2 {
        return Err(TraceError::TooShort(n));
    }
    let density = config.density_f64();
    // the last sample is only used for the wavelength increment of the one before
    let points = &curve.points()[..n - 1];
    let dense: Vec<[i64; 2]> = points
        .iter()
        .map(|p| [(p.x * density).round() as i64, (p.y * density).round() as i64])
        .collect();
    let layout =
        SubImageLayout::new(&dense, config.density, config.padding).ok_or(TraceError::TooShort(n))?;
    log::debug!(
        "sub-image {:?}sub-px at corner {:?}px (offset: {:?})",
        layout.size,
        layout.corner,
        layout.offset
    );

    let (wavelengths, delta_wavelengths): (Vec<f64>, Vec<f64>) = curve
        .points()
        .windows(2)
        .map(|p| (p[0].wavelength, p[1].wavelength - p[0].wavelength))
        .unzip();
    let resolution: Vec<f64> = wavelengths
        .iter()
        .zip(&delta_wavelengths)
        .map(|(l, dl)| l / dl / density)
        .collect();

    let (sampled, flux) = spectrum.evaluate(&wavelengths, &resolution);
    for found in [sampled.len(), flux.len()] {
        if found != wavelengths.len() {
            return Err(TraceError::SpectrumLength {
                expected: wavelengths.len(),
                found,
            });
        }
    }
    log::debug!("converting to ADU by {} (e/ADU)", config.e_adu);

    let samples: Vec<TraceSample> = layout
        .coordinates
        .iter()
        .zip(&wavelengths)
        .zip(&delta_wavelengths)
        .zip(&resolution)
        .zip(&flux)
        .map(|((((xy, &wavelength), &delta_wavelength), &resolution), &flux)| TraceSample {
            x: xy[0],
            y: xy[1],
            wavelength,
            flux: flux * config.e_adu,
            resolution,
            delta_wavelength,
        })
        .collect();
    if log::log_enabled!(log::Level::Debug) {
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), s| {
                (a.min(s.flux), b.max(s.flux))
            });
        log::debug!("trace flux range: [{:e},{:e}]", min, max);
    }

    Ok(Trace {
        samples,
        size: layout.size,
        corner: layout.corner,
        offset: layout.offset,
    })
}
