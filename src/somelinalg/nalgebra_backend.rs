//! nalgebra side of the backend boundary: `DVector<f64>` as the concrete vector,
//! dense `DMatrix<f64>` and `nalgebra_sparse::CsrMatrix<f64>` as concrete operators.
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::somelinalg::backend_traits::{
    BackendVector, LinearOperator, check_operand_len, check_same_len, vec_len_for_dim,
};
use crate::somelinalg::explicit_ops::{ExplicitOp, MatrixOp};
use nalgebra::{DMatrix, DVector, Matrix};
use nalgebra_sparse::CsrMatrix;
use std::any::Any;

fn downcast_dvector<'a>(
    other: &'a dyn BackendVector,
    context: &str,
) -> BlockResult<&'a DVector<f64>> {
    other.as_any().downcast_ref::<DVector<f64>>().ok_or_else(|| {
        BlockError::UnsupportedOperand(format!(
            "{}: expected DVector, got {}",
            context,
            other.vec_type()
        ))
    })
}

////////////////////////////////////////////////////////////////
//           NALGEBRA VECTOR
////////////////////////////////////////////////////////////////
impl BackendVector for DVector<f64> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn BackendVector> {
        Box::new(self.clone())
    }
    fn len(&self) -> usize {
        self.nrows()
    }
    fn get_val(&self, index: usize) -> f64 {
        self[index]
    }
    fn set_val(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
    fn fill(&mut self, value: f64) {
        Matrix::fill(self, value);
    }
    fn scale_mut(&mut self, factor: f64) {
        Matrix::scale_mut(self, factor);
    }
    fn add_scaled(&mut self, alpha: f64, other: &dyn BackendVector) -> BlockResult<()> {
        check_same_len(&*self, other, "vector update")?;
        let d_vec = downcast_dvector(other, "vector update")?;
        self.axpy(alpha, d_vec, 1.0);
        Ok(())
    }
    fn dot(&self, other: &dyn BackendVector) -> BlockResult<f64> {
        check_same_len(self, other, "inner product")?;
        let d_vec = downcast_dvector(other, "inner product")?;
        Ok(Matrix::dot(self, d_vec))
    }
    fn norm(&self) -> f64 {
        Matrix::norm(self)
    }
    fn to_DVector(&self) -> DVector<f64> {
        self.clone()
    }
    fn vec_type(&self) -> String {
        "DVector".to_string()
    }
}

////////////////////////////////////////////////////////////////
//           NALGEBRA DENSE MATRIX
////////////////////////////////////////////////////////////////
impl LinearOperator for DMatrix<f64> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.ncols(), x)?;
        Ok(Action::Applied(Box::new(self * d_vec)))
    }
    fn transpmult(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.nrows(), x)?;
        Ok(Action::Applied(Box::new(self.tr_mul(d_vec))))
    }
    fn create_vec(&self, dim: usize) -> BlockResult<Box<dyn BackendVector>> {
        let len = vec_len_for_dim(LinearOperator::shape(self), dim)?;
        Ok(Box::new(DVector::<f64>::zeros(len)))
    }
    fn copy(&self) -> Option<Box<dyn LinearOperator>> {
        Some(Box::new(self.clone()))
    }
    fn to_explicit(&self) -> BlockResult<ExplicitOp> {
        // explicit zeros are dropped by the conversion
        Ok(ExplicitOp::Matrix(MatrixOp::new(CsrMatrix::from(self))))
    }
    fn describe(&self) -> String {
        format!("<DMatrix {}x{}>", self.nrows(), self.ncols())
    }
}

////////////////////////////////////////////////////////////////
//           NALGEBRA SPARSE (CSR)
////////////////////////////////////////////////////////////////
/// y = A x for a CSR matrix, `transposed` gives y = A^T x
pub fn csr_mul_dvector(mat: &CsrMatrix<f64>, x: &DVector<f64>, transposed: bool) -> DVector<f64> {
    if transposed {
        &mat.transpose() * x
    } else {
        mat * x
    }
}

impl LinearOperator for CsrMatrix<f64> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.ncols(), x)?;
        Ok(Action::Applied(Box::new(csr_mul_dvector(self, d_vec, false))))
    }
    fn transpmult(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.nrows(), x)?;
        Ok(Action::Applied(Box::new(csr_mul_dvector(self, d_vec, true))))
    }
    fn create_vec(&self, dim: usize) -> BlockResult<Box<dyn BackendVector>> {
        let len = vec_len_for_dim(LinearOperator::shape(self), dim)?;
        Ok(Box::new(DVector::<f64>::zeros(len)))
    }
    fn copy(&self) -> Option<Box<dyn LinearOperator>> {
        Some(Box::new(self.clone()))
    }
    fn to_explicit(&self) -> BlockResult<ExplicitOp> {
        Ok(ExplicitOp::Matrix(MatrixOp::new(self.clone())))
    }
    fn describe(&self) -> String {
        format!("<CsrMatrix {}x{}>", self.nrows(), self.ncols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra_sparse::CooMatrix;

    fn applied(action: Action<Box<dyn BackendVector>>) -> DVector<f64> {
        match action {
            Action::Applied(v) => v.to_DVector(),
            Action::NotApplicable => panic!("expected an applied result"),
        }
    }

    #[test]
    fn dense_matvec_and_transpmult() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let x = DVector::from_vec(vec![1.0, 0.0, -1.0]);
        let y = applied(a.matvec(&x).unwrap());
        assert_relative_eq!(y, DVector::from_vec(vec![-2.0, -2.0]));
        let z = DVector::from_vec(vec![1.0, 1.0]);
        let w = applied(a.transpmult(&z).unwrap());
        assert_relative_eq!(w, DVector::from_vec(vec![5.0, 7.0, 9.0]));
    }

    #[test]
    fn dense_matvec_rejects_wrong_length() {
        let a = DMatrix::<f64>::identity(3, 3);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(
            a.matvec(&x),
            Err(BlockError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn dense_matvec_on_foreign_vector_is_not_applicable() {
        let a = DMatrix::<f64>::identity(2, 2);
        let x = faer::Col::<f64>::zeros(2);
        assert!(matches!(a.matvec(&x), Ok(Action::NotApplicable)));
    }

    #[test]
    fn csr_matches_dense() {
        let mut coo = CooMatrix::new(2, 3);
        coo.push(0, 0, 2.0);
        coo.push(0, 2, 1.0);
        coo.push(1, 1, -3.0);
        let csr = CsrMatrix::from(&coo);
        let dense = DMatrix::from_row_slice(2, 3, &[2.0, 0.0, 1.0, 0.0, -3.0, 0.0]);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert_relative_eq!(applied(csr.matvec(&x).unwrap()), &dense * &x);
        let z = DVector::from_vec(vec![1.0, -1.0]);
        assert_relative_eq!(applied(csr.transpmult(&z).unwrap()), dense.tr_mul(&z));
    }

    #[test]
    fn create_vec_uses_range_and_domain() {
        let a = DMatrix::<f64>::zeros(4, 2);
        assert_eq!(a.create_vec(0).unwrap().len(), 4);
        assert_eq!(a.create_vec(1).unwrap().len(), 2);
    }

    #[test]
    fn dvector_update_and_inner_product() {
        let mut y = DVector::from_vec(vec![1.0, 1.0]);
        let x = DVector::from_vec(vec![2.0, 3.0]);
        y.add_scaled(-1.0, &x).unwrap();
        assert_relative_eq!(y, DVector::from_vec(vec![-1.0, -2.0]));
        assert_relative_eq!(BackendVector::dot(&y, &x).unwrap(), -8.0);
        let short = DVector::from_vec(vec![1.0]);
        assert!(y.add_scaled(1.0, &short).is_err());
    }
}
