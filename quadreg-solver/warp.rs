//! Quadrilateral warp coefficients and warped grid coordinates.
//!
//! For a W x H template grid, every pixel gets four fixed weights, one per
//! quadrilateral corner, such that the warped position of the pixel is the
//! weighted sum of the current corner coordinates. The weights depend only
//! on the grid dimensions, so they are generated once per pyramid level and
//! reused for every warp.

use nalgebra::{DMatrix, Matrix4x2};

use quadreg_core::{Quad, Real, MAX_TEMPLATE_DIMENSION};

use crate::error::{RegError, RegResult};

/// Generates the N x 4 bilinear warp-weight matrix for a template grid.
///
/// Pixel (x, y) with normalized offsets sx = x/(W-1), sy = y/(H-1) weights
/// the corners A..D as (1-sy)(1-sx), (1-sy)sx, sy*sx and sy(1-sx). The four
/// weights of every row are non-negative and sum to one, and collapse to a
/// one-hot vector at the four corner pixels.
pub fn quad_warp_weights<F: Real>(width: usize, height: usize) -> RegResult<DMatrix<F>> {
    if width < 2 || width > MAX_TEMPLATE_DIMENSION {
        return Err(RegError::InvalidTemplateDimension { width, height });
    }
    if height < 2 || height > MAX_TEMPLATE_DIMENSION {
        return Err(RegError::InvalidTemplateDimension { width, height });
    }

    let inv_x = F::one() / <F as Real>::from_usize(width - 1);
    let inv_y = F::one() / <F as Real>::from_usize(height - 1);

    let mut weights = DMatrix::zeros(width * height, 4);
    for y in 0..height {
        let sy = <F as Real>::from_usize(y) * inv_y;
        let ty = F::one() - sy;
        for x in 0..width {
            let sx = <F as Real>::from_usize(x) * inv_x;
            let tx = F::one() - sx;
            let i = y * width + x;
            weights[(i, 0)] = ty * tx;
            weights[(i, 1)] = ty * sx;
            weights[(i, 2)] = sy * sx;
            weights[(i, 3)] = sy * tx;
        }
    }
    Ok(weights)
}

/// Computes warped sample coordinates for every template pixel.
///
/// `grid` must be preallocated as N x 2; the multiply runs in place with no
/// allocation. Column 0 holds x coordinates, column 1 holds y coordinates.
/// A corner perturbation propagates linearly to every row through `weights`.
pub fn warp_grid<F: Real>(weights: &DMatrix<F>, quad: &Quad<F>, grid: &mut DMatrix<F>) {
    let p = quad.to_flat();
    let corners = Matrix4x2::new(p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]);
    grid.gemm(F::one(), weights, &corners, F::zero());
}
