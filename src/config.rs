//! Instrument configuration shared by all the lenslets

use std::{
    collections::hash_map::DefaultHasher,
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::FromBuilder;

mod builder;
pub use builder::InstrumentConfigBuilder;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the oversampling density must be at least 1")]
    Density,
    #[error("the {0} conversion factor must be finite and positive, found {1}")]
    Conversion(&'static str, f64),
    #[error("the x step validity threshold must be positive, found {0}")]
    XStep(f64),
    #[error("cannot deserialize `::sedm::InstrumentConfig` from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize `::sedm::InstrumentConfig` into toml")]
    Save(#[from] toml::ser::Error),
}

/// Instrument configuration
///
/// Default properties:
///  * density    : 5 sub-samples per detector pixel
///  * padding    : 5 detector pixels
///  * mm to px   : 1/0.0135 (13.5µm pixels)
///  * px to mm   : 0.0135
///  * e/ADU      : 1
///  * x step max : 30 pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Oversampling factor between the working sub-pixels and the detector pixels
    pub density: usize,
    /// Sub-image padding in detector pixels, on each side
    pub padding: usize,
    /// Focal plane millimeters to detector pixels conversion factor
    pub mm_to_px: f64,
    /// Detector pixels to focal plane millimeters conversion factor
    pub px_to_mm: f64,
    /// Flux to detector counts gain
    pub e_adu: f64,
    /// Largest step in x pixel between 2 consecutive calibration points of a valid lenslet
    pub max_x_step: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            density: 5,
            padding: 5,
            mm_to_px: 0.0135f64.recip(),
            px_to_mm: 0.0135,
            e_adu: 1.,
            max_x_step: 30.,
        }
    }
}

impl FromBuilder for InstrumentConfig {
    type ComponentBuilder = InstrumentConfigBuilder;
}

impl Hash for InstrumentConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.density.hash(state);
        self.padding.hash(state);
        self.mm_to_px.to_bits().hash(state);
        self.px_to_mm.to_bits().hash(state);
        self.e_adu.to_bits().hash(state);
        self.max_x_step.to_bits().hash(state);
    }
}

impl Display for InstrumentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instrument configuration [{}]:", self.fingerprint())?;
        writeln!(f, " * density   : {}", self.density)?;
        writeln!(f, " * padding   : {}px", self.padding)?;
        writeln!(f, " * mm -> px  : {}", self.mm_to_px)?;
        writeln!(f, " * px -> mm  : {}", self.px_to_mm)?;
        writeln!(f, " * e/ADU     : {}", self.e_adu)?;
        write!(f, " * x step    : {}px", self.max_x_step)
    }
}

impl InstrumentConfig {
    /// Deserializes and checks a configuration from a toml string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: InstrumentConfig = toml::from_str(toml)?;
        config.check()?;
        Ok(config)
    }
    /// Serializes the configuration into a toml string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
    /// Checks the consistency of the configuration
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.density == 0 {
            return Err(ConfigError::Density);
        }
        for (name, value) in [("mm to px", self.mm_to_px), ("px to mm", self.px_to_mm)] {
            if !(value.is_finite() && value > 0.) {
                return Err(ConfigError::Conversion(name, value));
            }
        }
        if !(self.max_x_step > 0.) {
            return Err(ConfigError::XStep(self.max_x_step));
        }
        Ok(())
    }
    /// Configuration fingerprint
    ///
    /// Hexadecimal hash of the configuration, attached to the sub-images rendered with it
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
    /// Returns the density as a float
    #[inline]
    pub(crate) fn density_f64(&self) -> f64 {
        self.density as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip() {
        let config = InstrumentConfig {
            density: 3,
            padding: 2,
            ..Default::default()
        };
        let toml = config.to_toml().unwrap();
        println!("{toml}");
        assert_eq!(InstrumentConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn partial_toml() {
        let config = InstrumentConfig::from_toml("density = 4\ne_adu = 0.5").unwrap();
        assert_eq!(config.density, 4);
        assert_eq!(config.e_adu, 0.5);
        assert_eq!(config.padding, InstrumentConfig::default().padding);
    }

    #[test]
    fn zero_density() {
        assert!(matches!(
            InstrumentConfig::from_toml("density = 0"),
            Err(ConfigError::Density)
        ));
    }

    #[test]
    fn fingerprint() {
        let a = InstrumentConfig::default();
        let b = InstrumentConfig {
            padding: 3,
            ..Default::default()
        };
        assert_eq!(a.fingerprint(), InstrumentConfig::default().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }
}
