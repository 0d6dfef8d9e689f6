//! Registration orchestrator: owns every buffer and drives the
//! init / set_template / register_image life cycle.

use log::debug;
use nalgebra::{DMatrix, DVector};

use quadreg_core::{GrayImage, ImDim, Quad, Real};

use crate::config::SolverConfig;
use crate::engine::{capture_template, compute_jacobian, compute_residual, Block, LevelModel};
use crate::error::{RegError, RegResult};
use crate::gauss_newton::GaussNewton;
use crate::pyramid::ImagePyramid;

/// Life-cycle state of a [`DenseRegistrationSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    Initialized,
    TemplateReady,
}

/// Dense multi-resolution registration solver.
///
/// All per-level and aggregate buffers are allocated by `init` and reused in
/// place by every later call; the iteration loop itself never allocates.
/// Instances are single-threaded and must not be shared across threads
/// without external synchronization.
pub struct DenseRegistrationSolver<F: Real> {
    state: SolverState,
    config: Option<SolverConfig>,
    normalization: F,
    levels: Vec<LevelModel<F>>,
    blocks: Vec<Block>,
    template: DVector<F>,
    template_scratch: DVector<F>,
    residual: DVector<F>,
    jacobian: DMatrix<F>,
    gauss_newton: GaussNewton<F>,
    float_scratch: GrayImage<F>,
    pyramid: ImagePyramid<F>,
}

impl<F: Real> DenseRegistrationSolver<F> {
    /// Creates an uninitialized solver; call [`init`](Self::init) next.
    pub fn new() -> Self {
        Self {
            state: SolverState::Uninitialized,
            config: None,
            normalization: F::one(),
            levels: Vec::new(),
            blocks: Vec::new(),
            template: DVector::zeros(0),
            template_scratch: DVector::zeros(0),
            residual: DVector::zeros(0),
            jacobian: DMatrix::zeros(0, 8),
            gauss_newton: GaussNewton::new(),
            float_scratch: GrayImage::new(0, 0),
            pyramid: ImagePyramid::new(Vec::new()),
        }
    }

    /// Builds the pyramid geometry, warp weights and aggregate buffers.
    ///
    /// Fails without mutating solver state when the configuration is invalid
    /// or a pyramid level collapses below the minimum template size.
    /// Re-initializing an existing solver discards any captured template.
    pub fn init(&mut self, config: SolverConfig) -> RegResult<()> {
        config.validate()?;
        let full = ImDim::new(config.template_width, config.template_height);
        let ratio = <F as Real>::from_f64(config.core.level_ratio);

        let mut levels = Vec::with_capacity(config.core.levels);
        let mut blocks = Vec::with_capacity(config.core.levels);
        let mut total = 0;
        for i in 0..config.core.levels {
            let level = LevelModel::build(full, i, ratio)?;
            let len = level.dim.n_pixels();
            blocks.push(Block { start: total, len });
            total += len;
            levels.push(level);
        }

        self.pyramid = ImagePyramid::new(levels.iter().map(|l| l.abs_ratio).collect());
        self.levels = levels;
        self.blocks = blocks;
        self.template = DVector::zeros(total);
        self.template_scratch = DVector::zeros(total);
        self.residual = DVector::zeros(total);
        self.jacobian = DMatrix::zeros(total, 8);
        self.normalization = <F as Real>::from_f64(config.core.normalization);
        self.config = Some(config);
        self.state = SolverState::Initialized;
        Ok(())
    }

    /// Captures the multi-resolution reference template.
    ///
    /// The reference image is normalized by the configured intensity factor,
    /// resized into the pyramid, and sampled at `quad` (scaled per level)
    /// into the fixed template vector. The quad must keep the warped grid
    /// inside every level image, with one pixel of bilinear margin at the
    /// right and bottom edges.
    ///
    /// A failed capture leaves any previously stored template intact: the
    /// new template is sampled into a scratch vector and swapped in only
    /// after every level succeeded.
    pub fn set_template(&mut self, image: &GrayImage<u8>, quad: &Quad<F>) -> RegResult<()> {
        if self.state == SolverState::Uninitialized {
            return Err(RegError::SolverNotInitialized);
        }

        image.to_float_into(self.normalization, &mut self.float_scratch);
        self.pyramid.acquire(&self.float_scratch);
        capture_template(
            &mut self.levels,
            &self.blocks,
            &self.pyramid,
            quad,
            &mut self.template_scratch,
        )?;
        std::mem::swap(&mut self.template, &mut self.template_scratch);
        self.state = SolverState::TemplateReady;
        Ok(())
    }

    /// Refines `initial` so the target content it bounds matches the stored
    /// template, running exactly `iterations` Gauss-Newton steps.
    ///
    /// There is no convergence-based early exit; the iteration count is the
    /// only control over how much work is attempted. Any out-of-bounds
    /// sample or degenerate normal-equation system aborts the whole call.
    /// Repeatable with new targets; solver state is left unchanged.
    pub fn register_image(
        &mut self,
        image: &GrayImage<u8>,
        initial: &Quad<F>,
        iterations: usize,
    ) -> RegResult<Quad<F>> {
        match self.state {
            SolverState::Uninitialized => return Err(RegError::SolverNotInitialized),
            SolverState::Initialized => return Err(RegError::TemplateNotSet),
            SolverState::TemplateReady => {}
        }

        image.to_float_into(self.normalization, &mut self.float_scratch);
        self.pyramid.acquire(&self.float_scratch);

        let mut quad = *initial;
        for iteration in 0..iterations {
            compute_residual(
                &mut self.levels,
                &self.blocks,
                &self.pyramid,
                &quad,
                &self.template,
                &mut self.residual,
            )?;
            compute_jacobian(&self.levels, &self.blocks, &self.pyramid, &mut self.jacobian)?;
            let delta = self.gauss_newton.step(&self.jacobian, &self.residual)?;

            let mut flat = quad.to_flat();
            for (p, d) in flat.iter_mut().zip(delta.iter()) {
                *p += *d;
            }
            quad = Quad::from_flat(&flat);

            debug!(
                "iteration {}: residual norm {:.6e}, step norm {:.6e}",
                iteration,
                self.residual.norm().to_f64(),
                delta.norm().to_f64()
            );
        }
        Ok(quad)
    }

    /// Reconstructs one level's stored template block as an image, in
    /// normalized intensities.
    pub fn level_template(&self, level: usize) -> RegResult<GrayImage<F>> {
        match self.state {
            SolverState::Uninitialized => return Err(RegError::SolverNotInitialized),
            SolverState::Initialized => return Err(RegError::TemplateNotSet),
            SolverState::TemplateReady => {}
        }
        let model = self.levels.get(level).ok_or(RegError::LevelOutOfRange {
            level,
            levels: self.levels.len(),
        })?;
        let block = &self.blocks[level];
        let mut image = GrayImage::new(model.dim.width, model.dim.height);
        image
            .as_mut_slice()
            .copy_from_slice(&self.template.as_slice()[block.start..block.start + block.len]);
        Ok(image)
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn config(&self) -> Option<&SolverConfig> {
        self.config.as_ref()
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Template grid dimensions at the given pyramid level.
    pub fn level_dim(&self, level: usize) -> RegResult<ImDim> {
        self.levels
            .get(level)
            .map(|l| l.dim)
            .ok_or(RegError::LevelOutOfRange {
                level,
                levels: self.levels.len(),
            })
    }
}

impl<F: Real> Default for DenseRegistrationSolver<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::bilinear_sample;

    /// Smooth low-frequency test pattern; translation-friendly gradients.
    fn pattern(x: f64, y: f64) -> u8 {
        let v = 0.5 + 0.22 * (x * 0.045).sin() + 0.2 * (y * 0.035).cos()
            + 0.06 * ((x + y) * 0.021).sin();
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    fn synth_image(width: usize, height: usize, dx: f64, dy: f64) -> GrayImage<u8> {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(pattern(x as f64 - dx, y as f64 - dy));
            }
        }
        GrayImage::from_raw(width, height, data).unwrap()
    }

    fn default_solver(width: usize, height: usize) -> DenseRegistrationSolver<f64> {
        let mut solver = DenseRegistrationSolver::new();
        solver.init(SolverConfig::new(width, height)).unwrap();
        solver
    }

    #[test]
    fn state_machine_enforces_call_order() {
        let mut solver = DenseRegistrationSolver::<f32>::new();
        assert_eq!(solver.state(), SolverState::Uninitialized);

        let img = synth_image(64, 64, 0.0, 0.0);
        let quad = Quad::rect(4.0f32, 4.0, 32, 32);
        assert_eq!(
            solver.set_template(&img, &quad),
            Err(RegError::SolverNotInitialized)
        );
        assert_eq!(
            solver.register_image(&img, &quad, 1).unwrap_err(),
            RegError::SolverNotInitialized
        );

        solver.init(SolverConfig::new(32, 32)).unwrap();
        assert_eq!(solver.state(), SolverState::Initialized);
        assert_eq!(
            solver.register_image(&img, &quad, 1).unwrap_err(),
            RegError::TemplateNotSet
        );
        assert_eq!(solver.level_template(0).unwrap_err(), RegError::TemplateNotSet);

        solver.set_template(&img, &quad).unwrap();
        assert_eq!(solver.state(), SolverState::TemplateReady);
        assert!(solver.register_image(&img, &quad, 1).is_ok());
        assert_eq!(solver.state(), SolverState::TemplateReady);
    }

    #[test]
    fn init_rejects_invalid_template_dimensions() {
        let mut solver = DenseRegistrationSolver::<f32>::new();
        let err = solver.init(SolverConfig::new(1, 100)).unwrap_err();
        assert!(matches!(err, RegError::InvalidTemplateDimension { .. }));
        assert_eq!(solver.state(), SolverState::Uninitialized);

        let err = solver.init(SolverConfig::new(4001, 100)).unwrap_err();
        assert!(matches!(err, RegError::InvalidTemplateDimension { .. }));
        assert_eq!(solver.state(), SolverState::Uninitialized);
    }

    #[test]
    fn init_rejects_pyramids_that_collapse_the_grid() {
        let mut solver = DenseRegistrationSolver::<f32>::new();
        let mut cfg = SolverConfig::new(8, 8);
        cfg.core.levels = 4; // 8 * 0.5^3 = 1
        let err = solver.init(cfg).unwrap_err();
        assert!(matches!(err, RegError::InvalidTemplateDimension { .. }));
        assert_eq!(solver.state(), SolverState::Uninitialized);
    }

    #[test]
    fn identical_image_and_quad_is_a_fixed_point() {
        let mut solver = default_solver(64, 48);
        let img = synth_image(160, 120, 0.0, 0.0);
        let quad = Quad::rect(30.0, 25.0, 64, 48);
        solver.set_template(&img, &quad).unwrap();

        let refined = solver.register_image(&img, &quad, 8).unwrap();
        assert!(
            refined.max_corner_distance(&quad) < 1e-9,
            "corners moved by {}",
            refined.max_corner_distance(&quad)
        );
    }

    #[test]
    fn recovers_translation_within_half_a_pixel() {
        let mut solver = default_solver(200, 300);
        let reference = synth_image(300, 400, 0.0, 0.0);
        let quad = Quad::rect(40.0, 40.0, 200, 300);
        solver.set_template(&reference, &quad).unwrap();

        // target content is the reference shifted by (+5, +3)
        let target = synth_image(300, 400, 5.0, 3.0);
        let refined = solver.register_image(&target, &quad, 10).unwrap();

        let expected = quad.translated(5.0, 3.0);
        let err = refined.max_corner_distance(&expected);
        assert!(err < 0.5, "corner error {} px", err);
    }

    #[test]
    fn register_is_repeatable_with_new_targets() {
        let mut solver = default_solver(64, 64);
        let reference = synth_image(160, 160, 0.0, 0.0);
        let quad = Quad::rect(40.0, 40.0, 64, 64);
        solver.set_template(&reference, &quad).unwrap();

        for (dx, dy) in [(2.0, 0.0), (0.0, -2.0), (1.5, 1.5)] {
            let target = synth_image(160, 160, dx, dy);
            let refined = solver.register_image(&target, &quad, 10).unwrap();
            let expected = quad.translated(dx, dy);
            let err = refined.max_corner_distance(&expected);
            assert!(err < 0.5, "({}, {}): corner error {} px", dx, dy, err);
        }
    }

    #[test]
    fn flat_image_yields_degenerate_system() {
        let mut solver = default_solver(32, 32);
        let img = GrayImage::from_raw(96, 96, vec![128u8; 96 * 96]).unwrap();
        let quad = Quad::rect(20.0, 20.0, 32, 32);
        solver.set_template(&img, &quad).unwrap();
        assert_eq!(
            solver.register_image(&img, &quad, 3).unwrap_err(),
            RegError::DegenerateSystem
        );
    }

    #[test]
    fn out_of_bounds_quad_aborts_registration() {
        let mut solver = default_solver(32, 32);
        let img = synth_image(96, 96, 0.0, 0.0);
        let quad = Quad::rect(20.0, 20.0, 32, 32);
        solver.set_template(&img, &quad).unwrap();

        let outside = Quad::rect(80.0, 20.0, 32, 32);
        assert!(matches!(
            solver.register_image(&img, &outside, 1).unwrap_err(),
            RegError::OutOfBoundsSample { .. }
        ));
        // solver remains usable afterwards
        assert!(solver.register_image(&img, &quad, 1).is_ok());
    }

    #[test]
    fn failed_set_template_keeps_previous_template_intact() {
        let mut solver = default_solver(32, 32);
        let img = synth_image(96, 96, 0.0, 0.0);
        let quad = Quad::rect(20.0, 20.0, 32, 32);
        solver.set_template(&img, &quad).unwrap();

        let before: Vec<GrayImage<f64>> = (0..solver.num_levels())
            .map(|l| solver.level_template(l).unwrap())
            .collect();

        // quad reaching past the right edge fails mid-capture
        let outside = Quad::rect(70.0, 20.0, 32, 32);
        assert!(matches!(
            solver.set_template(&img, &outside),
            Err(RegError::OutOfBoundsSample { .. })
        ));
        assert_eq!(solver.state(), SolverState::TemplateReady);

        // every stored level block is bit-identical to the pre-failure capture
        for (l, old) in before.iter().enumerate() {
            let tpl = solver.level_template(l).unwrap();
            assert_eq!(tpl.as_slice(), old.as_slice(), "level {} changed", l);
        }

        // and registration still optimizes against the original template
        let target = synth_image(96, 96, 2.0, 1.0);
        let refined = solver.register_image(&target, &quad, 10).unwrap();
        let expected = quad.translated(2.0, 1.0);
        assert!(refined.max_corner_distance(&expected) < 0.5);
    }

    #[test]
    fn level_template_roundtrips_reference_content() {
        let mut solver = default_solver(48, 40);
        let img = synth_image(128, 128, 0.0, 0.0);
        let quad = Quad::rect(30.0, 30.0, 48, 40);
        solver.set_template(&img, &quad).unwrap();

        // level 0 reproduces the reference pixels under the identity warp
        let tpl = solver.level_template(0).unwrap();
        assert_eq!(tpl.dim(), ImDim::new(48, 40));
        let reference = img.to_float::<f64>(1.0 / 255.0);
        for y in 0..40 {
            for x in 0..48 {
                let expected = reference.pixel(x + 30, y + 30);
                assert!((tpl.pixel(x, y) - expected).abs() < 1e-9);
            }
        }

        // coarser levels keep the per-level grid dimensions
        let tpl1 = solver.level_template(1).unwrap();
        assert_eq!(tpl1.dim(), solver.level_dim(1).unwrap());
        assert!(matches!(
            solver.level_template(9),
            Err(RegError::LevelOutOfRange { level: 9, .. })
        ));
    }

    #[test]
    fn reinit_discards_template() {
        let mut solver = default_solver(32, 32);
        let img = synth_image(96, 96, 0.0, 0.0);
        let quad = Quad::rect(20.0, 20.0, 32, 32);
        solver.set_template(&img, &quad).unwrap();
        assert_eq!(solver.state(), SolverState::TemplateReady);

        solver.init(SolverConfig::new(32, 32)).unwrap();
        assert_eq!(solver.state(), SolverState::Initialized);
        assert_eq!(
            solver.register_image(&img, &quad, 1).unwrap_err(),
            RegError::TemplateNotSet
        );
    }

    #[test]
    fn template_sampling_matches_direct_bilinear() {
        // sub-pixel quad: the captured template equals direct sampling of
        // the normalized level-0 image
        let mut solver = default_solver(16, 16);
        let img = synth_image(64, 64, 0.0, 0.0);
        let quad = Quad::rect(10.25, 12.5, 16, 16);
        solver.set_template(&img, &quad).unwrap();

        let tpl = solver.level_template(0).unwrap();
        let reference = img.to_float::<f64>(1.0 / 255.0);
        for y in 0..16 {
            for x in 0..16 {
                let expected =
                    bilinear_sample(&reference, x as f64 + 10.25, y as f64 + 12.5).unwrap();
                assert!((tpl.pixel(x, y) - expected).abs() < 1e-9);
            }
        }
    }
}
