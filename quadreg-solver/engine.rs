//! Multi-resolution residual and Jacobian assembly.
//!
//! Every pyramid level owns a block of the aggregate residual vector and
//! Jacobian matrix; the block table is fixed at init time and shared by
//! template capture and every registration iteration.

use nalgebra::{DMatrix, DVector};

use quadreg_core::{ImDim, Quad, Real};

use crate::error::{RegError, RegResult};
use crate::pyramid::ImagePyramid;
use crate::sample::{bilinear_sample, sample_grid_into};
use crate::warp::{quad_warp_weights, warp_grid};

/// Aggregate-buffer slice owned by one pyramid level.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    pub start: usize,
    pub len: usize,
}

/// Fixed per-level registration geometry: template grid dimensions, the
/// absolute resize ratio, the precomputed warp weights, and the warped-grid
/// scratch that is recomputed whenever the corner estimate changes.
#[derive(Debug, Clone)]
pub struct LevelModel<F: Real> {
    pub dim: ImDim,
    pub abs_ratio: F,
    pub weights: DMatrix<F>,
    pub grid: DMatrix<F>,
}

impl<F: Real> LevelModel<F> {
    /// Builds the model for pyramid level `level` of a full-resolution
    /// template grid. Level dimensions are floor(full * ratio^level) and
    /// must remain valid template dimensions.
    pub fn build(full: ImDim, level: usize, level_ratio: F) -> RegResult<Self> {
        let abs_ratio = level_ratio.powi(level as i32);
        let width = ((full.width as f64) * abs_ratio.to_f64()).floor() as usize;
        let height = ((full.height as f64) * abs_ratio.to_f64()).floor() as usize;
        if width < 2 || height < 2 {
            return Err(RegError::InvalidTemplateDimension { width, height });
        }
        let weights = quad_warp_weights(width, height)?;
        let n = width * height;
        Ok(Self {
            dim: ImDim::new(width, height),
            abs_ratio,
            weights,
            grid: DMatrix::zeros(n, 2),
        })
    }

    /// Rewarps the sample grid for a new full-resolution corner estimate.
    pub fn warp(&mut self, quad: &Quad<F>) {
        let level_quad = quad.scaled(self.abs_ratio);
        warp_grid(&self.weights, &level_quad, &mut self.grid);
    }
}

/// Samples every pyramid level at the warped grid into the aggregate
/// template vector. Used once per `set_template`.
pub fn capture_template<F: Real>(
    levels: &mut [LevelModel<F>],
    blocks: &[Block],
    pyramid: &ImagePyramid<F>,
    quad: &Quad<F>,
    template: &mut DVector<F>,
) -> RegResult<()> {
    let data = template.as_mut_slice();
    for (i, (level, block)) in levels.iter_mut().zip(blocks).enumerate() {
        level.warp(quad);
        let out = &mut data[block.start..block.start + block.len];
        sample_grid_into(&pyramid.level(i).image, &level.grid, out)?;
    }
    Ok(())
}

/// Computes the aggregate residual: per level, warp, sample the target
/// level image, subtract the template block. Leaves each level's grid
/// warped for `quad`, which `compute_jacobian` relies on.
pub fn compute_residual<F: Real>(
    levels: &mut [LevelModel<F>],
    blocks: &[Block],
    pyramid: &ImagePyramid<F>,
    quad: &Quad<F>,
    template: &DVector<F>,
    residual: &mut DVector<F>,
) -> RegResult<()> {
    let out = residual.as_mut_slice();
    let reference = template.as_slice();
    for (i, (level, block)) in levels.iter_mut().zip(blocks).enumerate() {
        level.warp(quad);
        let segment = &mut out[block.start..block.start + block.len];
        sample_grid_into(&pyramid.level(i).image, &level.grid, segment)?;
        for (r, t) in segment
            .iter_mut()
            .zip(&reference[block.start..block.start + block.len])
        {
            *r -= *t;
        }
    }
    Ok(())
}

/// Fills the aggregate Jacobian with respect to the 8 corner coordinates,
/// ordered [xA, yA, xB, yB, xC, yC, xD, yD].
///
/// Row i of level l is the target gradient sampled at the warped position,
/// scaled by each corner's warp weight and by the level's absolute ratio
/// (the chain rule through the per-level coordinate scaling). The x gradient
/// couples only to x parameters and the y gradient only to y parameters.
/// Grids must already be warped for the current estimate; call
/// `compute_residual` first.
pub fn compute_jacobian<F: Real>(
    levels: &[LevelModel<F>],
    blocks: &[Block],
    pyramid: &ImagePyramid<F>,
    jacobian: &mut DMatrix<F>,
) -> RegResult<()> {
    for (i, (level, block)) in levels.iter().zip(blocks).enumerate() {
        let images = pyramid.level(i);
        let ratio = level.abs_ratio;
        for r in 0..block.len {
            let x = level.grid[(r, 0)];
            let y = level.grid[(r, 1)];
            let gx = bilinear_sample(&images.grad_x, x, y)? * ratio;
            let gy = bilinear_sample(&images.grad_y, x, y)? * ratio;
            let row = block.start + r;
            for c in 0..4 {
                let w = level.weights[(r, c)];
                jacobian[(row, 2 * c)] = gx * w;
                jacobian[(row, 2 * c + 1)] = gy * w;
            }
        }
    }
    Ok(())
}
