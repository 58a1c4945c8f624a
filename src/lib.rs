//!
//! # SED Machine lenslet traces
//!
//! Models how the light of each lenslet of a microlens-fed slicer spectrograph is
//! dispersed, resampled and deposited onto the detector.
//!
//! Every lenslet goes through the same chain:
//! [validation](Lenslet::valid) → [dispersion](Lenslet::find_dispersion) →
//! [trace](Lenslet::find_trace) → [raster](Lenslet::place_trace) →
//! [binning](Lenslet::bin_subimage) → handoff to an [ImageStore].
//!
//! Lenslets are created with their builder:
//! ```rust
//! use std::sync::Arc;
//! use sedm::{Builder, FromBuilder, InstrumentConfig, Lenslet};
//!
//! let config = Arc::new(InstrumentConfig::default());
//! let mut lenslet = Lenslet::builder()
//!     .index(7)
//!     .sky(vec![0.1, 0.1, 0.1], vec![0.0, 0.05, 0.1])
//!     .pixels(vec![100.3, 100.3, 100.3], vec![200.1, 203.8, 207.5])
//!     .instrument(vec![1., 1., 1.], vec![2., 2., 2.])
//!     .wavelengths(vec![400e-9, 500e-9, 600e-9])
//!     .config(config)
//!     .build()
//!     .unwrap();
//! assert!(lenslet.valid());
//! let curve = lenslet.find_dispersion().unwrap();
//! println!("{} dispersion samples", curve.len());
//! ```

pub mod binning;
pub mod config;
pub mod dispersion;
pub mod error;
pub mod lenslet;
pub mod polyfit;
pub mod psf;
pub mod raster;
pub mod spectrum;
pub mod store;
pub mod sweep;
pub mod trace;

#[doc(inline)]
pub use self::binning::bin;
#[doc(inline)]
pub use self::config::{ConfigError, InstrumentConfig, InstrumentConfigBuilder};
#[doc(inline)]
pub use self::dispersion::{DispersionCurve, DispersionPoint};
#[doc(inline)]
pub use self::error::SedmError;
#[doc(inline)]
pub use self::lenslet::{Calibration, Lenslet, LensletBuilder, ValidationFailure, Validity};
#[doc(inline)]
pub use self::polyfit::Polynomial;
#[doc(inline)]
pub use self::psf::{DeltaPsf, GaussianPsf, PsfProvider};
#[doc(inline)]
pub use self::raster::rasterize;
#[doc(inline)]
pub use self::spectrum::{BlackBodySpectrum, FlatSpectrum, SampledSpectrum, SpectrumEvaluator};
#[doc(inline)]
pub use self::store::{ImageStore, PickleStore, StoreError, SubImage};
#[doc(inline)]
pub use self::sweep::{Sweep, SweepReport, Telemetry};
#[doc(inline)]
pub use self::trace::{SubImageLayout, Trace, TraceSample};

pub type Result<T> = std::result::Result<T, SedmError>;

/// Builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Gives a component access to its builder
pub trait FromBuilder {
    type ComponentBuilder: Builder;
    fn builder() -> Self::ComponentBuilder {
        Self::ComponentBuilder::new()
    }
}
