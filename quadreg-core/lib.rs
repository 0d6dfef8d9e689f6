use nalgebra::RealField;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest accepted template grid dimension (width or height), in pixels.
pub const MAX_TEMPLATE_DIMENSION: usize = 4000;

/// Floating-point precision used by the registration solver.
///
/// Implemented for `f32` and `f64`; all solver code is generic over this
/// trait instead of being duplicated per type.
///
/// The conversion methods shadow `num_traits::FromPrimitive` (reachable
/// through the `RealField` supertrait chain), so generic callers must invoke
/// them as `<F as Real>::from_f64(..)`.
pub trait Real: RealField + Copy + Default {
    fn from_f64(v: f64) -> Self;
    fn from_usize(v: usize) -> Self;
    fn to_f64(self) -> f64;
}

impl Real for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn from_usize(v: usize) -> Self {
        v as f32
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }
    fn from_usize(v: usize) -> Self {
        v as f64
    }
    fn to_f64(self) -> f64 {
        self
    }
}

/// Image or template grid dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImDim {
    pub width: usize,
    pub height: usize,
}

impl ImDim {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total pixel count of the grid.
    pub fn n_pixels(&self) -> usize {
        self.width * self.height
    }
}

#[derive(Debug, Clone)]
pub struct ImageDataError {
    pub expected_len: usize,
    pub actual_len: usize,
}

impl std::fmt::Display for ImageDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Image data length mismatch: expected {}, got {}",
            self.expected_len, self.actual_len
        )
    }
}

impl std::error::Error for ImageDataError {}

/// Row-major single-channel raster image with owned pixel storage.
#[derive(Debug, Clone, Default)]
pub struct GrayImage<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy> GrayImage<T> {
    /// Wraps an existing row-major pixel buffer, validating its length.
    pub fn from_raw(width: usize, height: usize, data: Vec<T>) -> Result<Self, ImageDataError> {
        let expected_len = width * height;
        if data.len() != expected_len {
            return Err(ImageDataError {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dim(&self) -> ImDim {
        ImDim::new(self.width, self.height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> T {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.width + x] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy + Default> GrayImage<T> {
    /// Creates an image of the given size filled with the default pixel value.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }

    /// Changes the image dimensions in place, reusing the pixel storage.
    ///
    /// Existing pixel contents are not preserved in any meaningful layout;
    /// callers are expected to overwrite the buffer after resizing.
    pub fn resize_storage(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.resize(width * height, T::default());
    }
}

impl GrayImage<u8> {
    /// Converts 8-bit pixels to floating point, scaled by `scale`, writing
    /// into a preallocated destination image.
    pub fn to_float_into<F: Real>(&self, scale: F, out: &mut GrayImage<F>) {
        out.resize_storage(self.width, self.height);
        for (dst, &src) in out.data.iter_mut().zip(self.data.iter()) {
            *dst = <F as Real>::from_usize(src as usize) * scale;
        }
    }

    pub fn to_float<F: Real>(&self, scale: F) -> GrayImage<F> {
        let mut out = GrayImage::new(self.width, self.height);
        self.to_float_into(scale, &mut out);
        out
    }
}

/// Ordered quadrilateral corners A, B, C, D.
///
/// The corners correspond to template grid corners (0,0), (W-1,0),
/// (W-1,H-1) and (0,H-1) respectively. The order is fixed: it defines the
/// meaning of the four warp-weight columns and must be preserved by callers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quad<F> {
    pub pts: [[F; 2]; 4],
}

impl<F: Real> Quad<F> {
    pub fn new(a: [F; 2], b: [F; 2], c: [F; 2], d: [F; 2]) -> Self {
        Self { pts: [a, b, c, d] }
    }

    /// Axis-aligned rectangle with corner A at (x, y) and the given extents.
    ///
    /// B lands at x + width - 1 and D at y + height - 1, matching the
    /// template pixel grid convention where a W-wide grid spans W-1 units.
    pub fn rect(x: F, y: F, width: usize, height: usize) -> Self {
        let w = <F as Real>::from_usize(width - 1);
        let h = <F as Real>::from_usize(height - 1);
        Self::new([x, y], [x + w, y], [x + w, y + h], [x, y + h])
    }

    /// Corner coordinates flattened as [xA, yA, xB, yB, xC, yC, xD, yD].
    pub fn to_flat(&self) -> [F; 8] {
        let p = &self.pts;
        [
            p[0][0], p[0][1], p[1][0], p[1][1], p[2][0], p[2][1], p[3][0], p[3][1],
        ]
    }

    pub fn from_flat(v: &[F; 8]) -> Self {
        Self::new([v[0], v[1]], [v[2], v[3]], [v[4], v[5]], [v[6], v[7]])
    }

    /// All corner coordinates multiplied by `ratio`.
    pub fn scaled(&self, ratio: F) -> Self {
        let mut pts = self.pts;
        for p in &mut pts {
            p[0] *= ratio;
            p[1] *= ratio;
        }
        Self { pts }
    }

    pub fn translated(&self, dx: F, dy: F) -> Self {
        let mut pts = self.pts;
        for p in &mut pts {
            p[0] += dx;
            p[1] += dy;
        }
        Self { pts }
    }

    /// Largest Euclidean distance between matching corners of two quads.
    pub fn max_corner_distance(&self, other: &Self) -> F {
        let mut max = F::zero();
        for (p, q) in self.pts.iter().zip(other.pts.iter()) {
            let dx = p[0] - q[0];
            let dy = p[1] - q[1];
            let d = (dx * dx + dy * dy).sqrt();
            if d > max {
                max = d;
            }
        }
        max
    }

    /// Axis-aligned bounding box as (min_x, min_y, max_x, max_y).
    pub fn bounding_box(&self) -> (F, F, F, F) {
        let mut min_x = self.pts[0][0];
        let mut min_y = self.pts[0][1];
        let mut max_x = min_x;
        let mut max_y = min_y;
        for p in &self.pts[1..] {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
        (min_x, min_y, max_x, max_y)
    }
}

/// Algorithm knobs shared by every solver instance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegConfig {
    /// Number of pyramid levels; level 0 is full resolution.
    pub levels: usize,
    /// Per-level resize ratio in (0, 1); level i is scaled by ratio^i.
    pub level_ratio: f64,
    /// Intensity normalization applied before sampling (default 1/255).
    pub normalization: f64,
}

impl Default for RegConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            level_ratio: 0.5,
            normalization: 1.0 / 255.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_validates_length() {
        let ok = GrayImage::from_raw(4, 3, vec![0u8; 12]);
        assert!(ok.is_ok());
        let err = GrayImage::from_raw(4, 3, vec![0u8; 10]).unwrap_err();
        assert_eq!(err.expected_len, 12);
        assert_eq!(err.actual_len, 10);
    }

    #[test]
    fn pixel_addressing_is_row_major() {
        let data: Vec<u8> = (0..12).collect();
        let img = GrayImage::from_raw(4, 3, data).unwrap();
        assert_eq!(img.pixel(0, 0), 0);
        assert_eq!(img.pixel(3, 0), 3);
        assert_eq!(img.pixel(0, 1), 4);
        assert_eq!(img.pixel(3, 2), 11);
    }

    #[test]
    fn to_float_scales_intensities() {
        let img = GrayImage::from_raw(2, 1, vec![0u8, 255]).unwrap();
        let f: GrayImage<f64> = img.to_float(1.0 / 255.0);
        assert_eq!(f.pixel(0, 0), 0.0);
        assert!((f.pixel(1, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quad_flat_roundtrip() {
        let q = Quad::new([1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]);
        let flat = q.to_flat();
        assert_eq!(Quad::from_flat(&flat), q);
    }

    #[test]
    fn quad_rect_spans_grid_extents() {
        let q = Quad::<f64>::rect(10.0, 20.0, 100, 50);
        assert_eq!(q.pts[0], [10.0, 20.0]);
        assert_eq!(q.pts[1], [109.0, 20.0]);
        assert_eq!(q.pts[2], [109.0, 69.0]);
        assert_eq!(q.pts[3], [10.0, 69.0]);
    }

    #[test]
    fn quad_scaled_and_distance() {
        let q = Quad::<f64>::rect(0.0, 0.0, 11, 11);
        let s = q.scaled(0.5);
        assert_eq!(s.pts[2], [5.0, 5.0]);
        let t = q.translated(3.0, 4.0);
        assert!((q.max_corner_distance(&t) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn default_config() {
        let cfg = RegConfig::default();
        assert_eq!(cfg.levels, 3);
        assert!((cfg.level_ratio - 0.5).abs() < 1e-12);
        assert!((cfg.normalization - 1.0 / 255.0).abs() < 1e-12);
    }
}
