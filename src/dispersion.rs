//! Lenslet dispersion
//!
//! The dispersion maps the wavelength to the detector position and to the arc length
//! along the spectrum of a lenslet.
//! The sparse calibration points are fitted with quadratic polynomials that are evaluated
//! on a super-dense wavelength grid; the super-dense positions are snapped to the
//! sub-pixel grid and only the samples moving into a new sub-pixel are kept.

use serde::{Deserialize, Serialize};

use crate::{lenslet::Calibration, polyfit::FitError, InstrumentConfig, Polynomial};

/// Number of super-dense samples per output sample
pub const SUPER_DENSITY: usize = 100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispersionError {
    #[error("no calibration points")]
    Empty,
    #[error("zero spectral extent")]
    ZeroExtent,
    #[error("spectral extent ({0:.3}px) is shorter than a pixel")]
    SubPixelExtent(f64),
    #[error("wavelength to pixel fit failed")]
    Fit(#[from] FitError),
}

/// A dispersion sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionPoint {
    /// Detector x position snapped to the sub-pixel grid [px]
    pub x: f64,
    /// Detector y position snapped to the sub-pixel grid [px]
    pub y: f64,
    pub wavelength: f64,
    /// Arc length from the blue end of the spectrum [mm]
    pub distance: f64,
}

/// Dense dispersion curve ordered by increasing arc length
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispersionCurve {
    points: Vec<DispersionPoint>,
}

impl DispersionCurve {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn points(&self) -> &[DispersionPoint] {
        &self.points
    }
    pub fn iter(&self) -> impl Iterator<Item = &DispersionPoint> {
        self.points.iter()
    }
    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }
    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
    pub fn wavelengths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.wavelength).collect()
    }
    pub fn distances(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.distance).collect()
    }
    /// Arc length increments between consecutive samples [mm]
    ///
    /// Most increments are close to each other, the smaller ones happen where the
    /// spectrum crosses a sub-pixel corner.
    pub fn distance_steps(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|p| p[1].distance - p[0].distance)
            .collect()
    }
}

impl<'a> IntoIterator for &'a DispersionCurve {
    type Item = &'a DispersionPoint;
    type IntoIter = std::slice::Iter<'a, DispersionPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Returns the indices of the first smallest and of the first largest values
fn arg_min_max(values: &[f64]) -> Option<(usize, usize)> {
    let first = *values.first()?;
    let (i_min, i_max, ..) = values.iter().enumerate().skip(1).fold(
        (0, 0, first, first),
        |(i_min, i_max, min, max), (i, &v)| {
            let (i_min, min) = if v < min { (i, v) } else { (i_min, min) };
            let (i_max, max) = if v > max { (i, v) } else { (i_max, max) };
            (i_min, i_max, min, max)
        },
    );
    Some((i_min, i_max))
}

/// Spectral extent in the sky plane
///
/// Euclidean distance between the sky plane points at the smallest and at the largest wavelengths
pub fn spectral_extent(calibration: &Calibration) -> Option<f64> {
    let (start, end) = arg_min_max(calibration.wavelengths())?;
    let (xs, ys) = (calibration.xs(), calibration.ys());
    Some((xs[end] - xs[start]).hypot(ys[end] - ys[start]))
}

/// Computes the dispersion curve of a lenslet
pub fn solve(
    calibration: &Calibration,
    config: &InstrumentConfig,
) -> Result<DispersionCurve, DispersionError> {
    let wavelengths = calibration.wavelengths();
    let fx = Polynomial::fit(wavelengths, calibration.xpix(), 2)?;
    let fy = Polynomial::fit(wavelengths, calibration.ypix(), 2)?;

    let extent = spectral_extent(calibration).ok_or(DispersionError::Empty)?;
    if extent == 0. {
        return Err(DispersionError::ZeroExtent);
    }
    let n_px = (extent * config.mm_to_px).floor() as usize * config.density;
    if n_px == 0 {
        return Err(DispersionError::SubPixelExtent(extent * config.mm_to_px));
    }

    let (i_min, i_max) = arg_min_max(wavelengths).ok_or(DispersionError::Empty)?;
    let (l_min, l_max) = (wavelengths[i_min], wavelengths[i_max]);
    let n_dense = n_px * SUPER_DENSITY;
    let step = (l_max - l_min) / (n_dense - 1) as f64;
    let density = config.density_f64();

    // the super-dense samples are consumed on the fly, only the kept ones are stored
    let mut points = Vec::with_capacity(n_px * 2);
    let mut previous: Option<([f64; 2], [i64; 2])> = None;
    let mut arc_length = 0f64;
    for i in 0..n_dense {
        let wavelength = if i + 1 == n_dense {
            l_max
        } else {
            l_min + step * i as f64
        };
        let xy = [fx.eval(wavelength), fy.eval(wavelength)];
        let cell = [
            (xy[0] * density).round() as i64,
            (xy[1] * density).round() as i64,
        ];
        if let Some((previous_xy, previous_cell)) = previous {
            arc_length += (xy[0] - previous_xy[0]).hypot(xy[1] - previous_xy[1]);
            if cell != previous_cell {
                points.push(DispersionPoint {
                    x: cell[0] as f64 / density,
                    y: cell[1] as f64 / density,
                    wavelength,
                    distance: arc_length * config.px_to_mm,
                });
            }
        }
        previous = Some((xy, cell));
    }
    points.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    Ok(DispersionCurve { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration(n: usize) -> Calibration {
        let i = (0..n).map(|i| i as f64);
        Calibration::new(
            vec![0.1; n],
            i.clone().map(|i| 0.05 * i).collect(),
            vec![100.3; n],
            i.clone().map(|i| 200.1 + 3.7 * i).collect(),
            vec![1.; n],
            vec![2.; n],
            i.map(|i| 400e-9 + 50e-9 * i).collect(),
        )
    }

    fn config() -> InstrumentConfig {
        InstrumentConfig {
            density: 4,
            padding: 2,
            mm_to_px: 74.,
            px_to_mm: 74f64.recip(),
            ..Default::default()
        }
    }

    #[test]
    fn extent() {
        let extent = spectral_extent(&calibration(5)).unwrap();
        assert!((extent - 0.2).abs() < 1e-12);
        assert!(spectral_extent(&calibration(0)).is_none());
    }

    #[test]
    fn linear_dispersion() {
        let curve = solve(&calibration(5), &config()).unwrap();
        // 14.8px long at 4 sub-samples per pixel
        println!("{} samples", curve.len());
        assert_eq!(curve.len(), 60);
        assert!(curve.iter().all(|p| (p.x - 100.25).abs() < 1e-12));
        let first = curve.points()[0];
        let last = curve.points()[curve.len() - 1];
        assert!((first.y - 200.25).abs() < 1e-12);
        assert!((last.y - 215.).abs() < 1e-12);
        assert!(first.wavelength < last.wavelength);
        assert!((last.distance - 14.8 / 74.).abs() < 1e-3);
    }

    #[test]
    fn strictly_increasing_distance() {
        let curve = solve(&calibration(5), &config()).unwrap();
        assert!(curve.distance_steps().iter().all(|&d| d > 0.));
    }

    #[test]
    fn no_consecutive_duplicates() {
        let mut cal = calibration(5);
        // curved and slanted trace
        cal = Calibration::new(
            cal.xs().to_vec(),
            cal.ys().to_vec(),
            vec![100.3, 101.1, 101.6, 101.8, 101.7],
            cal.ypix().to_vec(),
            cal.p1().to_vec(),
            cal.p2().to_vec(),
            cal.wavelengths().to_vec(),
        );
        let config = config();
        let d = config.density as f64;
        let curve = solve(&cal, &config).unwrap();
        assert!(curve.points().windows(2).all(|p| {
            let a = [(p[0].x * d).round(), (p[0].y * d).round()];
            let b = [(p[1].x * d).round(), (p[1].y * d).round()];
            a != b
        }));
        assert!(curve.distance_steps().iter().all(|&d| d > 0.));
    }

    #[test]
    fn zero_extent() {
        let cal = Calibration::new(
            vec![0.1; 3],
            vec![0.2; 3],
            vec![100.3; 3],
            vec![200., 205., 210.],
            vec![1.; 3],
            vec![2.; 3],
            vec![400e-9, 500e-9, 600e-9],
        );
        assert_eq!(solve(&cal, &config()), Err(DispersionError::ZeroExtent));
    }

    #[test]
    fn deterministic() {
        assert_eq!(
            solve(&calibration(5), &config()),
            solve(&calibration(5), &config())
        );
    }
}
