//! Sweep over the lenslets
//!
//! Renders the sub-images of many lenslets in parallel, one task per lenslet, and hands
//! them off to an [ImageStore].
//! The lenslets are processed in batches; the sub-images of a batch are written in
//! lenslet order before the next batch starts.
//! Lenslets failing with a recoverable error are skipped, any other error aborts the sweep
//! leaving the sub-images of the previous batches in the store.

use std::fmt::{self, Display};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::{
    DispersionCurve, ImageStore, Lenslet, PsfProvider, Result, SedmError, SpectrumEvaluator,
    SubImage, Trace,
};

/// Observer of the lenslet products
///
/// All the methods default to doing nothing
pub trait Telemetry: Sync {
    /// Called with each new dispersion curve
    fn dispersion(&self, _index: usize, _curve: &DispersionCurve) {}
    /// Called with each new trace
    fn trace(&self, _index: usize, _trace: &Trace) {}
    /// Called for each skipped lenslet
    fn skipped(&self, _index: usize, _error: &SedmError) {}
}

/// Sweep outcome
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Indices of the rendered lenslets
    pub rendered: Vec<usize>,
    /// Indices of the skipped lenslets
    pub skipped: Vec<usize>,
    /// Number of sub-images written to the store
    pub frames: usize,
}
impl Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lenslets rendered into {} sub-images, {} skipped",
            self.rendered.len(),
            self.frames,
            self.skipped.len()
        )
    }
}

enum Outcome {
    Rendered(usize, Vec<SubImage>),
    Skipped(usize),
}

/// Lenslet sweep
pub struct Sweep<'a, S: ?Sized, P: ?Sized> {
    spectrum: &'a S,
    psf: &'a P,
    telemetry: Option<&'a dyn Telemetry>,
    progress: bool,
    bin: bool,
    batch: Option<usize>,
}

impl<'a, S, P> Sweep<'a, S, P>
where
    S: SpectrumEvaluator + ?Sized,
    P: PsfProvider + ?Sized,
{
    /// Creates a sweep with the source spectrum and the point spread function
    pub fn new(spectrum: &'a S, psf: &'a P) -> Self {
        Self {
            spectrum,
            psf,
            telemetry: None,
            progress: false,
            bin: false,
            batch: None,
        }
    }
    /// Set the telemetry observer
    pub fn telemetry(self, telemetry: &'a dyn Telemetry) -> Self {
        Self {
            telemetry: Some(telemetry),
            ..self
        }
    }
    /// Shows a progress bar
    pub fn progress(self) -> Self {
        Self {
            progress: true,
            ..self
        }
    }
    /// Also hands off the sub-images binned to detector pixels
    pub fn bin(self) -> Self {
        Self { bin: true, ..self }
    }
    /// Sets the number of lenslets rendered before their sub-images are written
    ///
    /// Default: 4 lenslets per rayon thread
    pub fn batch(self, batch: usize) -> Self {
        Self {
            batch: Some(batch.max(1)),
            ..self
        }
    }
    fn batch_size(&self) -> usize {
        self.batch
            .unwrap_or_else(|| 4 * rayon::current_num_threads())
            .max(1)
    }
    fn render(&self, lenslet: &mut Lenslet) -> Result<Vec<SubImage>> {
        lenslet.check()?;
        let index = lenslet.index();
        let curve = lenslet.find_dispersion()?;
        if let Some(telemetry) = self.telemetry {
            telemetry.dispersion(index, curve);
        }
        let trace = lenslet.find_trace(self.spectrum)?;
        if let Some(telemetry) = self.telemetry {
            telemetry.trace(index, trace);
        }
        lenslet.place_trace(self.psf)?;
        let name = self.spectrum.name();
        let mut frames = vec![lenslet.sub_image(&name)?];
        if self.bin {
            lenslet.bin_subimage()?;
            frames.push(lenslet.binned_sub_image(&name)?);
        }
        Ok(frames)
    }
    /// Renders the lenslets and writes their sub-images into `store`
    ///
    /// The lenslets are reset once their sub-images are extracted
    pub fn run<T: ImageStore + ?Sized>(
        &self,
        lenslets: &mut [Lenslet],
        store: &mut T,
    ) -> Result<SweepReport> {
        let pb = self.progress.then(|| {
            let pb = ProgressBar::new(lenslets.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{msg} [{eta_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7}",
            ) {
                pb.set_style(style);
            }
            pb.set_message("Rendering lenslets");
            pb
        });
        let mut report = SweepReport::default();
        for batch in lenslets.chunks_mut(self.batch_size()) {
            let outcomes = batch
                .par_iter_mut()
                .map(|lenslet| {
                    let index = lenslet.index();
                    let outcome = match self.render(lenslet) {
                        Ok(frames) => Ok(Outcome::Rendered(index, frames)),
                        Err(e) if e.is_recoverable() => {
                            log::info!("skipping lenslet {index}: {e}");
                            if let Some(telemetry) = self.telemetry {
                                telemetry.skipped(index, &e);
                            }
                            Ok(Outcome::Skipped(index))
                        }
                        Err(e) => Err(e),
                    };
                    lenslet.reset();
                    if let Some(pb) = &pb {
                        pb.inc(1);
                    }
                    outcome
                })
                .collect::<Result<Vec<Outcome>>>()?;
            for outcome in outcomes {
                match outcome {
                    Outcome::Rendered(index, frames) => {
                        for frame in &frames {
                            store.write(frame)?;
                        }
                        report.frames += frames.len();
                        report.rendered.push(index);
                    }
                    Outcome::Skipped(index) => report.skipped.push(index),
                }
            }
        }
        if let Some(pb) = pb {
            pb.finish();
        }
        log::info!("{report}");
        Ok(report)
    }
}
