use crate::{
    config::ConfigError, lenslet::ValidationFailure, polyfit::FitError, store::StoreError,
    trace::TraceError,
};

#[derive(Debug, thiserror::Error)]
pub enum SedmError {
    #[error("lenslet {lenslet} failed validation: {reason}")]
    Validation {
        lenslet: usize,
        reason: ValidationFailure,
    },
    #[error("lenslet {lenslet} has a degenerate spectrum: {reason}")]
    DegenerateSpectrum { lenslet: usize, reason: String },
    #[error("lenslet {0} is not valid")]
    InvalidLenslet(usize),
    #[error("lenslet {lenslet}: wavelength to pixel fit failed")]
    Fit {
        lenslet: usize,
        #[source]
        source: FitError,
    },
    #[error("lenslet {lenslet}: spectrum evaluation failed")]
    Spectrum {
        lenslet: usize,
        #[source]
        source: TraceError,
    },
    #[error("invalid instrument configuration")]
    Config(#[from] ConfigError),
    #[error("image store failure")]
    Store(#[from] StoreError),
}

impl SedmError {
    /// Returns true if the error only concerns the lenslet it was raised for
    ///
    /// A sweep over all the lenslets skips the lenslets failing with a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SedmError::Validation { .. } | SedmError::DegenerateSpectrum { .. }
        )
    }
    /// Returns the index of the lenslet the error was raised for, if any
    pub fn lenslet(&self) -> Option<usize> {
        match self {
            SedmError::Validation { lenslet, .. }
            | SedmError::DegenerateSpectrum { lenslet, .. }
            | SedmError::Fit { lenslet, .. }
            | SedmError::Spectrum { lenslet, .. } => Some(*lenslet),
            SedmError::InvalidLenslet(lenslet) => Some(*lenslet),
            SedmError::Config(_) | SedmError::Store(_) => None,
        }
    }
}
