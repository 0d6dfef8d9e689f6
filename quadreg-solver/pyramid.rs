//! Multi-resolution image pyramid with per-level intensity gradients.
//!
//! Each level holds a resized copy of the acquired image plus its x/y
//! gradient images. Level storage is reused across acquisitions: repeated
//! calls with same-sized inputs run without allocating.

use quadreg_core::{GrayImage, Real};

/// One pyramid level: resized intensities and central-difference gradients.
#[derive(Debug, Clone)]
pub struct PyramidImage<F> {
    pub image: GrayImage<F>,
    pub grad_x: GrayImage<F>,
    pub grad_y: GrayImage<F>,
}

/// Resolution pyramid for one source image.
///
/// Level i is the source resized by `abs_ratios[i]` (ratio^i relative to
/// full resolution), so coordinates at level i are full-resolution
/// coordinates multiplied by the level's absolute ratio.
#[derive(Debug, Clone)]
pub struct ImagePyramid<F: Real> {
    abs_ratios: Vec<F>,
    levels: Vec<PyramidImage<F>>,
}

impl<F: Real> ImagePyramid<F> {
    /// Creates an empty pyramid for the given absolute per-level ratios.
    /// Storage is allocated lazily on the first `acquire`.
    pub fn new(abs_ratios: Vec<F>) -> Self {
        let levels = abs_ratios
            .iter()
            .map(|_| PyramidImage {
                image: GrayImage::new(0, 0),
                grad_x: GrayImage::new(0, 0),
                grad_y: GrayImage::new(0, 0),
            })
            .collect();
        Self { abs_ratios, levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, i: usize) -> &PyramidImage<F> {
        &self.levels[i]
    }

    pub fn abs_ratio(&self, i: usize) -> F {
        self.abs_ratios[i]
    }

    /// Fills every level from a full-resolution image, reusing buffers.
    ///
    /// Gradients are rebuilt here and stay fixed until the next acquire;
    /// during registration they are computed once per target image and
    /// shared by all Gauss-Newton iterations.
    pub fn acquire(&mut self, full: &GrayImage<F>) {
        for (ratio, level) in self.abs_ratios.iter().zip(self.levels.iter_mut()) {
            resize_into(full, *ratio, &mut level.image);
            central_gradients(&level.image, &mut level.grad_x, &mut level.grad_y);
        }
    }
}

/// Resizes by pure coordinate scaling: destination pixel (x, y) samples the
/// source at (x / abs_ratio, y / abs_ratio) with border-clamped bilinear
/// interpolation. This keeps level content consistent with sample
/// coordinates that are scaled by the absolute ratio.
pub fn resize_into<F: Real>(src: &GrayImage<F>, abs_ratio: F, dst: &mut GrayImage<F>) {
    let dw = ((src.width() as f64) * abs_ratio.to_f64()).floor().max(1.0) as usize;
    let dh = ((src.height() as f64) * abs_ratio.to_f64()).floor().max(1.0) as usize;
    dst.resize_storage(dw, dh);

    let inv = F::one() / abs_ratio;
    for y in 0..dh {
        let sy = <F as Real>::from_usize(y) * inv;
        for x in 0..dw {
            let sx = <F as Real>::from_usize(x) * inv;
            dst.set_pixel(x, y, sample_clamped(src, sx, sy));
        }
    }
}

/// Bilinear sample with neighbors clamped to the image border. Used only for
/// resampling whole images; the solver's strict sampler lives in `sample`.
fn sample_clamped<F: Real>(img: &GrayImage<F>, x: F, y: F) -> F {
    let w = img.width();
    let h = img.height();
    let xf = x.floor().max(F::zero());
    let yf = y.floor().max(F::zero());
    let x0 = (xf.to_f64() as usize).min(w - 1);
    let y0 = (yf.to_f64() as usize).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let fx = (x - xf).max(F::zero()).min(F::one());
    let fy = (y - yf).max(F::zero()).min(F::one());
    let gx = F::one() - fx;
    let gy = F::one() - fy;

    img.pixel(x0, y0) * gx * gy
        + img.pixel(x1, y0) * fx * gy
        + img.pixel(x0, y1) * gx * fy
        + img.pixel(x1, y1) * fx * fy
}

/// Central-difference gradients, (I(x+1) - I(x-1)) / 2 per axis, with
/// neighbors clamped at the borders. Unit gain in pixel units, which is what
/// the Gauss-Newton Jacobian expects.
pub fn central_gradients<F: Real>(
    img: &GrayImage<F>,
    grad_x: &mut GrayImage<F>,
    grad_y: &mut GrayImage<F>,
) {
    let w = img.width();
    let h = img.height();
    grad_x.resize_storage(w, h);
    grad_y.resize_storage(w, h);
    if w == 0 || h == 0 {
        return;
    }

    let half = <F as Real>::from_f64(0.5);
    for y in 0..h {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(h - 1);
        for x in 0..w {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(w - 1);
            grad_x.set_pixel(x, y, (img.pixel(xp, y) - img.pixel(xm, y)) * half);
            grad_y.set_pixel(x, y, (img.pixel(x, yp) - img.pixel(x, ym)) * half);
        }
    }
}
