//! Gauss-Newton normal equations over the 8 corner parameters.

use nalgebra::{Cholesky, DMatrix, DVector, SMatrix, SVector};

use quadreg_core::Real;

use crate::error::{RegError, RegResult};

/// Number of scalar parameters: 4 corners x 2 coordinates.
pub const NUM_PARAMS: usize = 8;

/// Preallocated workspace for one Gauss-Newton step.
///
/// The normal-equation products JtJ and Jtb are fixed 8x8 / 8x1 buffers
/// written in place, so stepping never allocates regardless of the residual
/// length.
#[derive(Debug, Clone)]
pub struct GaussNewton<F: Real> {
    jtj: SMatrix<F, NUM_PARAMS, NUM_PARAMS>,
    jtb: SVector<F, NUM_PARAMS>,
}

impl<F: Real> GaussNewton<F> {
    pub fn new() -> Self {
        Self {
            jtj: SMatrix::zeros(),
            jtb: SVector::zeros(),
        }
    }

    /// Solves (Jt J) delta = -Jt r by Cholesky factorization.
    ///
    /// Fails with `DegenerateSystem` when JtJ is not positive-definite
    /// (collinear corners, zero-variance template). Callers must treat that
    /// as a failure of the whole registration call: later iterations depend
    /// on state only meaningfully updated by a valid solve.
    pub fn step(
        &mut self,
        jacobian: &DMatrix<F>,
        residual: &DVector<F>,
    ) -> RegResult<SVector<F, NUM_PARAMS>> {
        self.jtj.gemm_tr(F::one(), jacobian, jacobian, F::zero());
        self.jtb.gemv_tr(F::one(), jacobian, residual, F::zero());

        let chol = Cholesky::new(self.jtj).ok_or(RegError::DegenerateSystem)?;
        Ok(-chol.solve(&self.jtb))
    }
}

impl<F: Real> Default for GaussNewton<F> {
    fn default() -> Self {
        Self::new()
    }
}
