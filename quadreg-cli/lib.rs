use quadreg_annot::AnnotError;
use quadreg_core::{GrayImage, Quad, MAX_TEMPLATE_DIMENSION};
use quadreg_solver::{DenseRegistrationSolver, RegError, SolverConfig};

pub use quadreg_core::{self, GrayImage as TrackerImage, Quad as TrackerQuad};
pub use quadreg_solver::{self, SolverConfig as Config};

#[derive(Debug)]
pub enum TrackError {
    Registration(RegError),
    Annotation(AnnotError),
    Image(image::ImageError),
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackError::Registration(e) => write!(f, "Registration error: {}", e),
            TrackError::Annotation(e) => write!(f, "Annotation error: {}", e),
            TrackError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for TrackError {}

impl From<RegError> for TrackError {
    fn from(err: RegError) -> Self {
        TrackError::Registration(err)
    }
}

impl From<AnnotError> for TrackError {
    fn from(err: AnnotError) -> Self {
        TrackError::Annotation(err)
    }
}

impl From<image::ImageError> for TrackError {
    fn from(err: image::ImageError) -> Self {
        TrackError::Image(err)
    }
}

pub type TrackResult<T> = Result<T, TrackError>;

/// High-level quad tracker that pairs a reference template with
/// Gauss-Newton refinement in target frames.
pub struct QuadTracker {
    solver: DenseRegistrationSolver<f32>,
    iterations: usize,
}

impl QuadTracker {
    pub const DEFAULT_ITERATIONS: usize = 10;

    /// Create a tracker with a template grid sized from the reference quad's
    /// bounding box, clamped to the valid template dimension range.
    pub fn new(reference_quad: &Quad<f32>) -> TrackResult<Self> {
        let (min_x, min_y, max_x, max_y) = reference_quad.bounding_box();
        let width = ((max_x - min_x + 1.0).ceil() as usize).clamp(2, MAX_TEMPLATE_DIMENSION);
        let height = ((max_y - min_y + 1.0).ceil() as usize).clamp(2, MAX_TEMPLATE_DIMENSION);
        Self::with_config(SolverConfig::new(width, height))
    }

    /// Create a tracker with an explicit configuration.
    pub fn with_config(config: SolverConfig) -> TrackResult<Self> {
        let mut solver = DenseRegistrationSolver::new();
        solver.init(config)?;
        Ok(Self {
            solver,
            iterations: Self::DEFAULT_ITERATIONS,
        })
    }

    /// Set the number of Gauss-Newton iterations per `track` call.
    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    /// Capture the reference template under the given quad.
    pub fn set_reference(&mut self, img: &GrayImage<u8>, quad: &Quad<f32>) -> TrackResult<()> {
        Ok(self.solver.set_template(img, quad)?)
    }

    /// Refine an initial quad estimate against a target frame.
    pub fn track(&mut self, img: &GrayImage<u8>, initial: &Quad<f32>) -> TrackResult<Quad<f32>> {
        Ok(self.solver.register_image(img, initial, self.iterations)?)
    }

    pub fn config(&self) -> Option<&SolverConfig> {
        self.solver.config()
    }
}

/// Convert a decoded luma image into the solver's image type.
pub fn from_luma8(img: &image::GrayImage) -> GrayImage<u8> {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w as usize, h as usize);
    out.as_mut_slice().copy_from_slice(img.as_raw());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(x: usize, y: usize) -> u8 {
        let v = 0.5
            + 0.22 * (x as f64 * 0.045).sin()
            + 0.22 * (y as f64 * 0.06).cos()
            + 0.06 * ((x + 2 * y) as f64 * 0.023).sin();
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    }

    fn synth_image(width: usize, height: usize, dx: i64, dy: i64) -> GrayImage<u8> {
        let mut img = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let sx = (x as i64 - dx).max(0) as usize;
                let sy = (y as i64 - dy).max(0) as usize;
                img.set_pixel(x, y, pattern(sx, sy));
            }
        }
        img
    }

    #[test]
    fn tracker_recovers_a_small_shift() {
        let reference = synth_image(160, 120, 0, 0);
        let target = synth_image(160, 120, 3, 2);
        let quad = Quad::rect(30.0f32, 25.0, 64, 48);

        let mut tracker = QuadTracker::new(&quad).unwrap();
        tracker.set_reference(&reference, &quad).unwrap();

        let refined = tracker.track(&target, &quad).unwrap();
        let expected = quad.translated(3.0, 2.0);
        assert!(
            refined.max_corner_distance(&expected) < 0.75,
            "corner error {}",
            refined.max_corner_distance(&expected)
        );
    }

    #[test]
    fn tracker_requires_a_reference_first() {
        let quad = Quad::rect(10.0f32, 10.0, 32, 32);
        let mut tracker = QuadTracker::new(&quad).unwrap();
        let img = synth_image(64, 64, 0, 0);
        assert!(matches!(
            tracker.track(&img, &quad),
            Err(TrackError::Registration(RegError::TemplateNotSet))
        ));
    }
}
