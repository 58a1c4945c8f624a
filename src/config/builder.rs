use crate::Builder;

use super::InstrumentConfig;

/// [InstrumentConfig] builder
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InstrumentConfigBuilder {
    config: InstrumentConfig,
}

impl From<InstrumentConfig> for InstrumentConfigBuilder {
    fn from(config: InstrumentConfig) -> Self {
        Self { config }
    }
}

impl InstrumentConfigBuilder {
    /// Set the number of sub-samples per detector pixel
    pub fn density(mut self, density: usize) -> Self {
        self.config.density = density;
        self
    }
    /// Set the sub-image padding in detector pixels
    pub fn padding(mut self, padding: usize) -> Self {
        self.config.padding = padding;
        self
    }
    /// Set the detector pixel size in millimeters
    ///
    /// Both conversion factors are derived from the pixel size
    pub fn pixel_size(mut self, pixel_size_mm: f64) -> Self {
        self.config.px_to_mm = pixel_size_mm;
        self.config.mm_to_px = pixel_size_mm.recip();
        self
    }
    /// Set the millimeters and pixels conversion factors
    pub fn conversions(mut self, mm_to_px: f64, px_to_mm: f64) -> Self {
        self.config.mm_to_px = mm_to_px;
        self.config.px_to_mm = px_to_mm;
        self
    }
    /// Set the flux to detector counts gain
    pub fn e_adu(mut self, e_adu: f64) -> Self {
        self.config.e_adu = e_adu;
        self
    }
    /// Set the x pixel step validity threshold
    pub fn max_x_step(mut self, max_x_step: f64) -> Self {
        self.config.max_x_step = max_x_step;
        self
    }
}

impl Builder for InstrumentConfigBuilder {
    type Component = InstrumentConfig;

    fn build(self) -> crate::Result<Self::Component> {
        self.config.check()?;
        Ok(self.config)
    }
}
