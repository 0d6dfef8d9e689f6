//! Bilinear pixel sampling at real-valued coordinates.

use nalgebra::DMatrix;

use quadreg_core::{GrayImage, Real};

use crate::error::{RegError, RegResult};

/// Samples an image at a real-valued position with bilinear interpolation.
///
/// The four integer neighbors (floor(x), floor(x)+1) x (floor(y), floor(y)+1)
/// must all lie inside the image; positions where the +1 neighbor would fall
/// outside are rejected with `OutOfBoundsSample`. Keeping warped quads at
/// least one pixel away from the right and bottom edges is a caller
/// precondition, not something this layer recovers from.
#[inline]
pub fn bilinear_sample<F: Real>(img: &GrayImage<F>, x: F, y: F) -> RegResult<F> {
    let xf = x.floor();
    let yf = y.floor();
    let oob = || RegError::OutOfBoundsSample {
        x: x.to_f64(),
        y: y.to_f64(),
        width: img.width(),
        height: img.height(),
    };
    if xf < F::zero() || yf < F::zero() {
        return Err(oob());
    }
    let x0 = xf.to_f64() as usize;
    let y0 = yf.to_f64() as usize;
    let x1 = x0 + 1;
    let y1 = y0 + 1;
    if x1 >= img.width() || y1 >= img.height() {
        return Err(oob());
    }

    let a = img.pixel(x0, y0);
    let b = img.pixel(x1, y0);
    let c = img.pixel(x0, y1);
    let d = img.pixel(x1, y1);

    let fx = x - xf;
    let fy = y - yf;
    let gx = F::one() - fx;
    let gy = F::one() - fy;

    Ok(a * gx * gy + b * fx * gy + c * gx * fy + d * fx * fy)
}

/// Samples the image at every row of an N x 2 coordinate grid, writing the
/// intensities into `out` (one value per grid row).
pub fn sample_grid_into<F: Real>(
    img: &GrayImage<F>,
    grid: &DMatrix<F>,
    out: &mut [F],
) -> RegResult<()> {
    debug_assert_eq!(grid.nrows(), out.len());
    for (i, value) in out.iter_mut().enumerate() {
        *value = bilinear_sample(img, grid[(i, 0)], grid[(i, 1)])?;
    }
    Ok(())
}
