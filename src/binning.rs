//! Sub-pixel to detector pixel binning

use nalgebra::DMatrix;

/// Bins an image by summing the `factor`x`factor` blocks of pixels
///
/// The trailing rows and columns that do not fill a whole block are dropped.
///
/// # Panics
/// If `factor` is 0
pub fn bin(image: &DMatrix<f64>, factor: usize) -> DMatrix<f64> {
    assert!(factor > 0, "the binning factor must be at least 1");
    let (n_rows, n_cols) = image.shape();
    let (m_rows, m_cols) = (n_rows / factor, n_cols / factor);
    if (m_rows * factor, m_cols * factor) != (n_rows, n_cols) {
        log::debug!(
            "binning {}x{} by {} drops {} rows and {} columns",
            n_rows,
            n_cols,
            factor,
            n_rows - m_rows * factor,
            n_cols - m_cols * factor
        );
    }
    DMatrix::from_fn(m_rows, m_cols, |i, j| {
        image
            .view((i * factor, j * factor), (factor, factor))
            .sum()
    })
}
