//! Dense quadrilateral template registration.
//!
//! Aligns a rectangular image template to a target image by refining the 2D
//! positions of four quadrilateral corner points, using pixel intensities
//! only. The optimization is a fixed-iteration Gauss-Newton loop over a
//! multi-resolution residual: every pyramid level contributes a block to one
//! aggregate residual vector and Jacobian, and the normal equations are
//! solved for all 8 corner coordinates at once.
//!
//! Entry point is [`DenseRegistrationSolver`] with its three-phase life
//! cycle: `init` (pyramid geometry and warp weights), `set_template`
//! (reference intensities), `register_image` (iterative refinement).

pub mod config;
pub mod engine;
pub mod error;
pub mod gauss_newton;
pub mod pyramid;
pub mod sample;
pub mod solver;
pub mod warp;

pub use config::SolverConfig;
pub use error::{RegError, RegResult};
pub use solver::{DenseRegistrationSolver, SolverState};
