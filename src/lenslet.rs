//!
//! # Lenslet record
//!
//! A [Lenslet] owns the calibration points of one microlens channel and the products
//! derived from them: the dispersion curve, the trace and the sub-image rasters.
//!
//! The products are computed in order, each at most once, and are dropped with [Lenslet::reset].
//! The validity of the calibration is determined once, on first request, and is kept
//! across resets.

use std::{
    fmt::{self, Display},
    sync::{Arc, OnceLock},
};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{
    binning, dispersion::DispersionError, raster, trace, trace::TraceError, DispersionCurve,
    FromBuilder, ImageStore, InstrumentConfig, PsfProvider, Result, SedmError, SpectrumEvaluator,
    StoreError, SubImage, Trace,
};

mod builder;
pub use builder::LensletBuilder;

/// Physically plausible wavelength range
const WAVELENGTH_RANGE: (f64, f64) = (1e-12, 1e-3);

/// Lenslet calibration points
///
/// Parallel sequences of sky plane coordinates, detector pixel coordinates,
/// instrument plane coordinates and wavelengths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    xs: Vec<f64>,
    ys: Vec<f64>,
    xpix: Vec<f64>,
    ypix: Vec<f64>,
    p1: Vec<f64>,
    p2: Vec<f64>,
    wavelengths: Vec<f64>,
}

impl Calibration {
    pub fn new(
        xs: Vec<f64>,
        ys: Vec<f64>,
        xpix: Vec<f64>,
        ypix: Vec<f64>,
        p1: Vec<f64>,
        p2: Vec<f64>,
        wavelengths: Vec<f64>,
    ) -> Self {
        Self {
            xs,
            ys,
            xpix,
            ypix,
            p1,
            p2,
            wavelengths,
        }
    }
    /// Sky plane x coordinates [mm]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }
    /// Sky plane y coordinates [mm]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }
    /// Detector x coordinates [px]
    pub fn xpix(&self) -> &[f64] {
        &self.xpix
    }
    /// Detector y coordinates [px]
    pub fn ypix(&self) -> &[f64] {
        &self.ypix
    }
    pub fn p1(&self) -> &[f64] {
        &self.p1
    }
    pub fn p2(&self) -> &[f64] {
        &self.p2
    }
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }
    fn lengths(&self) -> [usize; 7] {
        [
            self.xs.len(),
            self.ys.len(),
            self.xpix.len(),
            self.ypix.len(),
            self.p1.len(),
            self.p2.len(),
            self.wavelengths.len(),
        ]
    }
    /// Number of calibration points
    ///
    /// The length of the shortest sequence
    pub fn len(&self) -> usize {
        self.lengths().into_iter().min().unwrap_or_default()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reasons for a lenslet to be invalid
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("calibration sequences of different lengths: {0:?}")]
    InconsistentLengths([usize; 7]),
    #[error("{0} calibration points, at least 3 are required")]
    TooFewPoints(usize),
    #[error("a detector pixel coordinate is 0")]
    ZeroPixel,
    #[error("x pixel step of {step}px is larger than {limit}px")]
    XStep { step: f64, limit: f64 },
}

/// Lenslet validity
#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    Valid,
    Invalid(ValidationFailure),
}
impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}
impl Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Valid => write!(f, "valid"),
            Validity::Invalid(reason) => write!(f, "invalid ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Raster {
    image: DMatrix<f64>,
    binned: Option<DMatrix<f64>>,
}

/// Products derived from the calibration, in the order they are computed
#[derive(Debug, Clone, Default, PartialEq)]
enum Products {
    #[default]
    Pending,
    Dispersed(DispersionCurve),
    Traced(DispersionCurve, Trace),
    Rasterized(DispersionCurve, Trace, Raster),
    /// Raster read back from an image store
    Loaded { corner: [i64; 2], raster: Raster },
}
impl Products {
    fn curve(&self) -> Option<&DispersionCurve> {
        match self {
            Products::Pending | Products::Loaded { .. } => None,
            Products::Dispersed(curve)
            | Products::Traced(curve, _)
            | Products::Rasterized(curve, ..) => Some(curve),
        }
    }
    fn trace(&self) -> Option<&Trace> {
        match self {
            Products::Traced(_, trace) | Products::Rasterized(_, trace, _) => Some(trace),
            _ => None,
        }
    }
    fn raster(&self) -> Option<&Raster> {
        match self {
            Products::Rasterized(.., raster) | Products::Loaded { raster, .. } => Some(raster),
            _ => None,
        }
    }
    fn corner(&self) -> Option<[i64; 2]> {
        match self {
            Products::Loaded { corner, .. } => Some(*corner),
            products => products.trace().map(Trace::corner),
        }
    }
    fn with_trace(self, trace: Trace) -> Self {
        match self {
            Products::Dispersed(curve) => Products::Traced(curve, trace),
            products => products,
        }
    }
    fn with_image(self, image: DMatrix<f64>) -> Self {
        match self {
            Products::Traced(curve, trace) => {
                Products::Rasterized(curve, trace, Raster { image, binned: None })
            }
            products => products,
        }
    }
}

/// Lenslet record
#[derive(Debug)]
pub struct Lenslet {
    index: usize,
    calibration: Calibration,
    config: Arc<InstrumentConfig>,
    validity: OnceLock<Validity>,
    products: Products,
}

impl FromBuilder for Lenslet {
    type ComponentBuilder = LensletBuilder;
}

impl Lenslet {
    /// Creates a new lenslet record
    pub fn new(index: usize, calibration: Calibration, config: Arc<InstrumentConfig>) -> Self {
        Self {
            index,
            calibration,
            config,
            validity: OnceLock::new(),
            products: Products::Pending,
        }
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }
    /// Returns true if the lenslet calibration is valid
    pub fn valid(&self) -> bool {
        self.validity().is_valid()
    }
    /// Returns the lenslet validity, determining it on the first call
    pub fn validity(&self) -> &Validity {
        self.validity.get_or_init(|| self.validate())
    }
    /// Checks the lenslet validity
    ///
    /// Fails with [SedmError::Validation] if the lenslet is invalid
    pub fn check(&self) -> Result<()> {
        match self.validity() {
            Validity::Valid => Ok(()),
            Validity::Invalid(reason) => Err(SedmError::Validation {
                lenslet: self.index,
                reason: reason.clone(),
            }),
        }
    }
    fn validate(&self) -> Validity {
        let cal = &self.calibration;
        let lengths = cal.lengths();
        if lengths.iter().any(|&n| n != lengths[0]) {
            log::warn!(
                "lenslet {}: calibration sequences of different lengths {:?}",
                self.index,
                lengths
            );
            return Validity::Invalid(ValidationFailure::InconsistentLengths(lengths));
        }
        let n = lengths[0];
        if n < 3 {
            log::debug!("lenslet {}: only {} calibration points", self.index, n);
            return Validity::Invalid(ValidationFailure::TooFewPoints(n));
        }
        if cal.xpix.iter().chain(&cal.ypix).any(|&p| p == 0.) {
            log::debug!("lenslet {}: zero pixel coordinate", self.index);
            return Validity::Invalid(ValidationFailure::ZeroPixel);
        }
        let step = cal
            .xpix
            .windows(2)
            .map(|x| (x[1] - x[0]).abs())
            .fold(0f64, f64::max);
        if step > self.config.max_x_step {
            log::debug!("lenslet {}: x pixel step of {}px", self.index, step);
            return Validity::Invalid(ValidationFailure::XStep {
                step,
                limit: self.config.max_x_step,
            });
        }
        let (lo, hi) = WAVELENGTH_RANGE;
        if cal.wavelengths.iter().any(|&l| !(lo..=hi).contains(&l)) {
            log::warn!(
                "lenslet {}: wavelengths outside of [{:e},{:e}], check the units",
                self.index,
                lo,
                hi
            );
        }
        Validity::Valid
    }
    fn ensure_valid(&self) -> Result<()> {
        if self.valid() {
            Ok(())
        } else {
            Err(SedmError::InvalidLenslet(self.index))
        }
    }
    fn missing(&self, product: &str) -> SedmError {
        SedmError::DegenerateSpectrum {
            lenslet: self.index,
            reason: format!("{product} has not been computed"),
        }
    }
    fn dispersion_error(&self, error: DispersionError) -> SedmError {
        match error {
            DispersionError::Fit(source) => SedmError::Fit {
                lenslet: self.index,
                source,
            },
            error => SedmError::DegenerateSpectrum {
                lenslet: self.index,
                reason: error.to_string(),
            },
        }
    }
    fn trace_error(&self, error: TraceError) -> SedmError {
        match error {
            TraceError::TooShort(_) => SedmError::DegenerateSpectrum {
                lenslet: self.index,
                reason: error.to_string(),
            },
            source => SedmError::Spectrum {
                lenslet: self.index,
                source,
            },
        }
    }
    /// Computes the lenslet dispersion curve
    ///
    /// The curve is computed on the first call and cached until [Lenslet::reset].
    /// Rasters read with [Lenslet::read_subimage] are dropped.
    pub fn find_dispersion(&mut self) -> Result<&DispersionCurve> {
        self.ensure_valid()?;
        if self.products.curve().is_none() {
            let curve = crate::dispersion::solve(&self.calibration, &self.config)
                .map_err(|e| self.dispersion_error(e))?;
            log::debug!(
                "lenslet {}: {} dispersion samples",
                self.index,
                curve.len()
            );
            self.products = Products::Dispersed(curve);
        }
        self.products
            .curve()
            .ok_or_else(|| self.missing("the dispersion"))
    }
    /// Computes the lenslet trace for the given source spectrum
    ///
    /// The dispersion must have been computed first.
    /// The trace is computed on the first call and cached until [Lenslet::reset]
    pub fn find_trace<S: SpectrumEvaluator + ?Sized>(&mut self, spectrum: &S) -> Result<&Trace> {
        self.ensure_valid()?;
        if let Products::Dispersed(curve) = &self.products {
            let trace = trace::synthesize(curve, &self.config, spectrum)
                .map_err(|e| self.trace_error(e))?;
            log::debug!(
                "lenslet {}: {} trace samples, sub-image {:?} at {:?}",
                self.index,
                trace.len(),
                trace.size(),
                trace.corner()
            );
            self.products = std::mem::take(&mut self.products).with_trace(trace);
        }
        self.products
            .trace()
            .ok_or_else(|| self.missing("the dispersion"))
    }
    /// Rasterizes the lenslet trace with the given point spread function
    ///
    /// The trace must have been computed first.
    /// The raster is computed on the first call and cached until [Lenslet::reset]
    pub fn place_trace<P: PsfProvider + ?Sized>(&mut self, psf: &P) -> Result<&DMatrix<f64>> {
        self.ensure_valid()?;
        if let Products::Traced(_, trace) = &self.products {
            let image = raster::rasterize(trace, psf);
            self.products = std::mem::take(&mut self.products).with_image(image);
        }
        self.products
            .raster()
            .map(|raster| &raster.image)
            .ok_or_else(|| self.missing("the trace"))
    }
    /// Bins the lenslet raster from sub-pixels to detector pixels
    ///
    /// The raster must have been computed first
    pub fn bin_subimage(&mut self) -> Result<&DMatrix<f64>> {
        self.ensure_valid()?;
        let density = self.config.density;
        if let Products::Rasterized(.., raster) | Products::Loaded { raster, .. } =
            &mut self.products
        {
            if raster.binned.is_none() {
                raster.binned = Some(binning::bin(&raster.image, density));
            }
        }
        self.products
            .raster()
            .and_then(|raster| raster.binned.as_ref())
            .ok_or_else(|| self.missing("the raster"))
    }
    /// Drops the dispersion curve, the trace and the rasters
    ///
    /// The validity is kept
    pub fn reset(&mut self) {
        self.products = Products::Pending;
    }
    pub fn dispersion(&self) -> Option<&DispersionCurve> {
        self.products.curve()
    }
    pub fn trace(&self) -> Option<&Trace> {
        self.products.trace()
    }
    /// Sub-pixel raster
    pub fn raster(&self) -> Option<&DMatrix<f64>> {
        self.products.raster().map(|raster| &raster.image)
    }
    /// Detector pixel raster
    pub fn binned(&self) -> Option<&DMatrix<f64>> {
        self.products.raster().and_then(|raster| raster.binned.as_ref())
    }
    /// Full frame position of the sub-image corner [px]
    pub fn corner(&self) -> Option<[i64; 2]> {
        self.products.corner()
    }
    fn frame(&self, label: String, spectrum: &str, data: DMatrix<f64>) -> Result<SubImage> {
        let corner = self.corner().ok_or_else(|| self.missing("the trace"))?;
        Ok(SubImage {
            label,
            lenslet: self.index,
            corner,
            config_hash: self.config.fingerprint(),
            spectrum: spectrum.to_string(),
            data,
        })
    }
    /// Returns the sub-pixel raster handoff frame
    pub fn sub_image(&self, spectrum: &str) -> Result<SubImage> {
        let data = self.raster().ok_or_else(|| self.missing("the raster"))?;
        self.frame(SubImage::label_for(self.index), spectrum, data.clone())
    }
    /// Returns the detector pixel raster handoff frame
    pub fn binned_sub_image(&self, spectrum: &str) -> Result<SubImage> {
        let data = self
            .binned()
            .ok_or_else(|| self.missing("the binned raster"))?;
        self.frame(SubImage::binned_label_for(self.index), spectrum, data.clone())
    }
    /// Writes the raster, and the binned raster if any, into `store`
    ///
    /// Returns the number of sub-images written
    pub fn write_subimage<T: ImageStore + ?Sized>(
        &self,
        store: &mut T,
        spectrum: &str,
    ) -> Result<usize> {
        store.write(&self.sub_image(spectrum)?)?;
        if self.binned().is_some() {
            store.write(&self.binned_sub_image(spectrum)?)?;
            Ok(2)
        } else {
            Ok(1)
        }
    }
    /// Reads back the raster of lenslet `index` from `store`
    ///
    /// The lenslet index, the sub-image corner and the rasters are restored from the
    /// stored sub-images; the dispersion and the trace are not.
    pub fn read_subimage<T: ImageStore + ?Sized>(&mut self, store: &T, index: usize) -> Result<()> {
        let frame = store.read(&SubImage::label_for(index))?;
        let binned = match store.read(&SubImage::binned_label_for(index)) {
            Ok(binned) => Some(binned.data),
            Err(StoreError::Missing(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let fingerprint = self.config.fingerprint();
        if frame.config_hash != fingerprint {
            log::warn!(
                "{} was rendered with configuration {}, not {}",
                frame.label,
                frame.config_hash,
                fingerprint
            );
        }
        self.index = frame.lenslet;
        self.products = Products::Loaded {
            corner: frame.corner,
            raster: Raster {
                image: frame.data,
                binned,
            },
        };
        Ok(())
    }
}

impl Display for Lenslet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cal = &self.calibration;
        writeln!(f, "Lenslet #{:04}: {}", self.index, self.validity())?;
        writeln!(
            f,
            "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>12}",
            "x", "y", "xpix", "ypix", "p1", "p2", "λ"
        )?;
        for i in 0..cal.len() {
            writeln!(
                f,
                "{:>10.4} {:>10.4} {:>10.3} {:>10.3} {:>10.4} {:>10.4} {:>12.4e}",
                cal.xs[i],
                cal.ys[i],
                cal.xpix[i],
                cal.ypix[i],
                cal.p1[i],
                cal.p2[i],
                cal.wavelengths[i]
            )?;
        }
        if let Some(curve) = self.dispersion() {
            write!(f, "dispersion: {} samples", curve.len())?;
        } else {
            write!(f, "dispersion: pending")?;
        }
        if let Some(trace) = self.trace() {
            write!(f, ", trace: {:?} at {:?}", trace.size(), trace.corner())?;
        } else if let Some(corner) = self.corner() {
            write!(f, ", sub-image at {corner:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{psf::DeltaPsf, Builder, FlatSpectrum, PickleStore};

    fn config() -> Arc<InstrumentConfig> {
        Arc::new(InstrumentConfig {
            density: 4,
            padding: 2,
            mm_to_px: 74.,
            px_to_mm: 74f64.recip(),
            ..Default::default()
        })
    }

    fn lenslet(n: usize) -> Lenslet {
        let i: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Lenslet::builder()
            .index(12)
            .sky(vec![0.1; n], i.iter().map(|i| 0.05 * i).collect())
            .pixels(vec![100.3; n], i.iter().map(|i| 200.1 + 3.7 * i).collect())
            .instrument(vec![1.; n], vec![2.; n])
            .wavelengths(i.iter().map(|i| 400e-9 + 50e-9 * i).collect())
            .config(config())
            .build()
            .unwrap()
    }

    #[test]
    fn two_points() {
        let lenslet = lenslet(2);
        assert!(!lenslet.valid());
        assert_eq!(
            lenslet.validity(),
            &Validity::Invalid(ValidationFailure::TooFewPoints(2))
        );
        assert!(matches!(
            lenslet.check(),
            Err(SedmError::Validation { lenslet: 12, .. })
        ));
    }

    #[test]
    fn invalid_operations() {
        let mut lenslet = lenslet(2);
        assert!(matches!(
            lenslet.find_dispersion(),
            Err(SedmError::InvalidLenslet(12))
        ));
        assert!(matches!(
            lenslet.place_trace(&DeltaPsf),
            Err(SedmError::InvalidLenslet(12))
        ));
    }

    #[test]
    fn inconsistent_lengths() {
        let lenslet = Lenslet::builder()
            .sky(vec![0.1; 3], vec![0.; 3])
            .pixels(vec![100.; 3], vec![200.; 4])
            .instrument(vec![1.; 3], vec![2.; 3])
            .wavelengths(vec![4e-7, 5e-7, 6e-7])
            .build()
            .unwrap();
        assert!(matches!(
            lenslet.validity(),
            Validity::Invalid(ValidationFailure::InconsistentLengths(_))
        ));
    }

    #[test]
    fn zero_pixel_and_x_step() {
        let base = lenslet(3);
        let cal = base.calibration();
        let zero = Calibration::new(
            cal.xs().to_vec(),
            cal.ys().to_vec(),
            vec![100., 0., 100.],
            cal.ypix().to_vec(),
            cal.p1().to_vec(),
            cal.p2().to_vec(),
            cal.wavelengths().to_vec(),
        );
        let lenslet = Lenslet::new(0, zero, config());
        assert_eq!(
            lenslet.validity(),
            &Validity::Invalid(ValidationFailure::ZeroPixel)
        );
        let jump = Calibration::new(
            cal.xs().to_vec(),
            cal.ys().to_vec(),
            vec![100., 140., 150.],
            cal.ypix().to_vec(),
            cal.p1().to_vec(),
            cal.p2().to_vec(),
            cal.wavelengths().to_vec(),
        );
        let lenslet = Lenslet::new(1, jump, config());
        assert!(matches!(
            lenslet.validity(),
            Validity::Invalid(ValidationFailure::XStep { .. })
        ));
    }

    #[test]
    fn zero_extent() {
        let mut lenslet = Lenslet::builder()
            .index(3)
            .sky(vec![0.1; 3], vec![0.2; 3])
            .pixels(vec![100.3; 3], vec![200., 205., 210.])
            .instrument(vec![1.; 3], vec![2.; 3])
            .wavelengths(vec![400e-9, 500e-9, 600e-9])
            .config(config())
            .build()
            .unwrap();
        assert!(lenslet.valid());
        let err = lenslet.find_dispersion().unwrap_err();
        assert!(matches!(err, SedmError::DegenerateSpectrum { lenslet: 3, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn preconditions() {
        let mut lenslet = lenslet(5);
        let spectrum = FlatSpectrum::new(1.);
        assert!(matches!(
            lenslet.find_trace(&spectrum),
            Err(SedmError::DegenerateSpectrum { .. })
        ));
        assert!(matches!(
            lenslet.place_trace(&DeltaPsf),
            Err(SedmError::DegenerateSpectrum { .. })
        ));
        assert!(matches!(
            lenslet.bin_subimage(),
            Err(SedmError::DegenerateSpectrum { .. })
        ));
        assert!(lenslet.sub_image("NO SPEC").is_err());
    }

    #[test]
    fn pipeline() {
        let mut lenslet = lenslet(5);
        lenslet.find_dispersion().unwrap();
        let total_flux = lenslet.find_trace(&FlatSpectrum::new(10.)).unwrap().total_flux();
        let size = lenslet.trace().unwrap().size();
        let image = lenslet.place_trace(&DeltaPsf).unwrap();
        assert_eq!(image.shape(), (size[0], size[1]));
        assert!((image.sum() - total_flux).abs() < 1e-9);
        let binned = lenslet.bin_subimage().unwrap();
        assert_eq!(binned.shape(), (size[0] / 4, size[1] / 4));
        assert!((binned.sum() - total_flux).abs() < 1e-9);

        let frame = lenslet.binned_sub_image("flat").unwrap();
        assert_eq!(frame.label, "Subimage-0012-binned");
        assert_eq!(frame.lenslet, 12);
        assert_eq!(frame.corner, [98, 198]);
        assert_eq!(frame.config_hash, lenslet.config().fingerprint());
        assert_eq!(lenslet.sub_image("flat").unwrap().label, "Subimage-0012");
    }

    #[test]
    fn idempotence() {
        let mut lenslet = lenslet(5);
        let first = lenslet.find_dispersion().unwrap().clone();
        assert_eq!(lenslet.find_dispersion().unwrap(), &first);
        let trace = lenslet.find_trace(&FlatSpectrum::new(1.)).unwrap().clone();
        // the cached trace is returned whatever the spectrum
        assert_eq!(lenslet.find_trace(&FlatSpectrum::new(2.)).unwrap(), &trace);
        let image = lenslet.place_trace(&DeltaPsf).unwrap().clone();
        assert_eq!(lenslet.place_trace(&DeltaPsf).unwrap(), &image);
    }

    #[test]
    fn reset() {
        let mut lenslet = lenslet(5);
        let first = lenslet.find_dispersion().unwrap().clone();
        lenslet.find_trace(&FlatSpectrum::new(1.)).unwrap();
        lenslet.reset();
        assert!(lenslet.dispersion().is_none());
        assert!(lenslet.trace().is_none());
        assert!(lenslet.valid());
        assert_eq!(lenslet.find_dispersion().unwrap(), &first);
    }

    #[test]
    fn no_padding() {
        let config = Arc::new(InstrumentConfig {
            padding: 0,
            ..config().as_ref().clone()
        });
        let mut lenslet = Lenslet::builder()
            .index(12)
            .sky(vec![0.1; 5], vec![0., 0.05, 0.1, 0.15, 0.2])
            .pixels(vec![100.3; 5], vec![200.1, 203.8, 207.5, 211.2, 214.9])
            .instrument(vec![1.; 5], vec![2.; 5])
            .wavelengths(vec![400e-9, 450e-9, 500e-9, 550e-9, 600e-9])
            .config(config)
            .build()
            .unwrap();
        lenslet.find_dispersion().unwrap();
        let trace = lenslet.find_trace(&FlatSpectrum::new(10.)).unwrap();
        let total_flux = trace.total_flux();
        assert_eq!(trace.corner(), [100, 200]);
        let image = lenslet.place_trace(&DeltaPsf).unwrap();
        assert!((image.sum() - total_flux).abs() < 1e-9);
        let binned = lenslet.bin_subimage().unwrap();
        assert!((binned.sum() - total_flux).abs() < 1e-9);
    }

    #[test]
    fn store_round_trip() {
        let mut lenslet = lenslet(5);
        lenslet.find_dispersion().unwrap();
        lenslet.find_trace(&FlatSpectrum::new(10.)).unwrap();
        lenslet.place_trace(&DeltaPsf).unwrap();
        let mut store = PickleStore::new();
        assert_eq!(lenslet.write_subimage(&mut store, "flat").unwrap(), 1);
        lenslet.bin_subimage().unwrap();
        assert_eq!(lenslet.write_subimage(&mut store, "flat").unwrap(), 2);
        assert_eq!(store.len(), 2);

        let mut reloaded = Lenslet::new(0, lenslet.calibration().clone(), config());
        reloaded.read_subimage(&store, 12).unwrap();
        assert_eq!(reloaded.index(), 12);
        assert_eq!(reloaded.corner(), lenslet.corner());
        assert_eq!(reloaded.raster(), lenslet.raster());
        assert_eq!(reloaded.binned(), lenslet.binned());
        assert!(reloaded.trace().is_none());
        assert_eq!(
            reloaded.sub_image("flat").unwrap(),
            lenslet.sub_image("flat").unwrap()
        );
        println!("{reloaded}");

        // the dispersion is computed again from the calibration
        assert_eq!(reloaded.find_dispersion().unwrap(), lenslet.dispersion().unwrap());
        assert!(reloaded.raster().is_none());

        let mut other = Lenslet::new(0, lenslet.calibration().clone(), config());
        assert!(matches!(
            other.read_subimage(&store, 3),
            Err(SedmError::Store(StoreError::Missing(_)))
        ));
    }

    #[test]
    fn display() {
        let mut lenslet = lenslet(5);
        lenslet.find_dispersion().unwrap();
        let table = lenslet.to_string();
        println!("{table}");
        assert!(table.starts_with("Lenslet #0012: valid"));
        assert_eq!(table.lines().count(), 1 + 1 + 5 + 1);
    }
}
