//! sprs sparse matrices (CSR or CSC storage) acting on nalgebra `DVector<f64>`.
use crate::block::block_error::{Action, BlockResult};
use crate::somelinalg::backend_traits::{
    BackendVector, LinearOperator, check_operand_len, vec_len_for_dim,
};
use crate::somelinalg::explicit_ops::{ExplicitOp, MatrixOp};
use nalgebra::DVector;
use sprs::{CsMat, CsVec};
use std::any::Any;

/// sprs product against the vector viewed as a fully populated `CsVec`
fn csmat_mul_dvector(mat: &CsMat<f64>, x: &DVector<f64>, transposed: bool) -> DVector<f64> {
    let n = x.len();
    let x_sparse = CsVec::new(n, (0..n).collect(), x.as_slice().to_vec());
    let y = if transposed {
        &mat.transpose_view() * &x_sparse
    } else {
        mat * &x_sparse
    };
    DVector::from_vec(y.to_dense().to_vec())
}

impl LinearOperator for CsMat<f64> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }
    fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.cols(), x)?;
        Ok(Action::Applied(Box::new(csmat_mul_dvector(self, d_vec, false))))
    }
    fn transpmult(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.rows(), x)?;
        Ok(Action::Applied(Box::new(csmat_mul_dvector(self, d_vec, true))))
    }
    fn create_vec(&self, dim: usize) -> BlockResult<Box<dyn BackendVector>> {
        let len = vec_len_for_dim((self.rows(), self.cols()), dim)?;
        Ok(Box::new(DVector::<f64>::zeros(len)))
    }
    fn copy(&self) -> Option<Box<dyn LinearOperator>> {
        Some(Box::new(self.clone()))
    }
    fn to_explicit(&self) -> BlockResult<ExplicitOp> {
        let triplets = self.iter().map(|(value, (i, j))| (i, j, *value));
        Ok(ExplicitOp::Matrix(MatrixOp::from_triplets(
            self.rows(),
            self.cols(),
            triplets,
        )))
    }
    fn describe(&self) -> String {
        let storage = if self.is_csr() { "csr" } else { "csc" };
        format!("<CsMat({}) {}x{}>", storage, self.rows(), self.cols())
    }
}
