use std::sync::Arc;

use crate::{Builder, InstrumentConfig};

use super::{Calibration, Lenslet};

/// [Lenslet] builder
///
/// Default properties:
///  - index       : 0
///  - calibration : empty
///  - config      : [InstrumentConfig::default]
#[derive(Debug, Clone, Default)]
pub struct LensletBuilder {
    index: usize,
    calibration: Calibration,
    config: Option<Arc<InstrumentConfig>>,
}

impl LensletBuilder {
    /// Set the lenslet index
    pub fn index(self, index: usize) -> Self {
        Self { index, ..self }
    }
    /// Set the sky plane coordinates
    pub fn sky(mut self, xs: Vec<f64>, ys: Vec<f64>) -> Self {
        self.calibration.xs = xs;
        self.calibration.ys = ys;
        self
    }
    /// Set the detector pixel coordinates
    pub fn pixels(mut self, xpix: Vec<f64>, ypix: Vec<f64>) -> Self {
        self.calibration.xpix = xpix;
        self.calibration.ypix = ypix;
        self
    }
    /// Set the instrument plane coordinates
    pub fn instrument(mut self, p1: Vec<f64>, p2: Vec<f64>) -> Self {
        self.calibration.p1 = p1;
        self.calibration.p2 = p2;
        self
    }
    /// Set the calibration wavelengths
    pub fn wavelengths(mut self, wavelengths: Vec<f64>) -> Self {
        self.calibration.wavelengths = wavelengths;
        self
    }
    /// Set all the calibration points at once
    pub fn calibration(self, calibration: Calibration) -> Self {
        Self {
            calibration,
            ..self
        }
    }
    /// Set the shared instrument configuration
    pub fn config(self, config: Arc<InstrumentConfig>) -> Self {
        Self {
            config: Some(config),
            ..self
        }
    }
}

impl Builder for LensletBuilder {
    type Component = Lenslet;

    /// Builds the lenslet record
    ///
    /// The instrument configuration is checked but not the calibration points,
    /// invalid lenslets are reported by [Lenslet::valid]
    fn build(self) -> crate::Result<Self::Component> {
        let config = self.config.unwrap_or_default();
        config.check()?;
        Ok(Lenslet::new(self.index, self.calibration, config))
    }
}
