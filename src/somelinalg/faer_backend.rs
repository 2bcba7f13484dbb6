////////////////////////////////////////////////////////////////////////////
//  FAER CRATE: dense Mat<f64> acting on Col<f64>
////////////////////////////////////////////////////////////////////////////
#![allow(non_camel_case_types)]
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::somelinalg::backend_traits::{
    BackendVector, LinearOperator, check_operand_len, check_same_len, vec_len_for_dim,
};
use crate::somelinalg::explicit_ops::{ExplicitOp, MatrixOp};
use faer::col::Col;
use faer::mat::Mat;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use std::any::Any;
type faer_col = Col<f64>;
type faer_dense = Mat<f64>;

fn downcast_col<'a>(other: &'a dyn BackendVector, context: &str) -> BlockResult<&'a faer_col> {
    other.as_any().downcast_ref::<faer_col>().ok_or_else(|| {
        BlockError::UnsupportedOperand(format!(
            "{}: expected faer Col, got {}",
            context,
            other.vec_type()
        ))
    })
}

impl BackendVector for faer_col {
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
        *self = faer_col::from_fn(self.nrows(), |_| value);
    }
    fn scale_mut(&mut self, factor: f64) {
        *self = &*self * factor;
    }
    fn add_scaled(&mut self, alpha: f64, other: &dyn BackendVector) -> BlockResult<()> {
        check_same_len(&*self, other, "vector update")?;
        let col = downcast_col(other, "vector update")?;
        let scaled = col * alpha;
        *self = &*self + &scaled;
        Ok(())
    }
    fn dot(&self, other: &dyn BackendVector) -> BlockResult<f64> {
        check_same_len(self, other, "inner product")?;
        let col = downcast_col(other, "inner product")?;
        Ok(self.transpose() * col.as_ref())
    }
    fn norm(&self) -> f64 {
        self.norm_l2()
    }
    fn to_DVector(&self) -> DVector<f64> {
        DVector::from_iterator(self.nrows(), self.iter().map(|x| *x))
    }
    fn vec_type(&self) -> String {
        "faer Col".to_string()
    }
}

impl LinearOperator for faer_dense {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(col) = x.as_any().downcast_ref::<faer_col>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.ncols(), x)?;
        Ok(Action::Applied(Box::new(self * col)))
    }
    fn transpmult(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(col) = x.as_any().downcast_ref::<faer_col>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), self.nrows(), x)?;
        Ok(Action::Applied(Box::new(self.transpose() * col.as_ref())))
    }
    fn create_vec(&self, dim: usize) -> BlockResult<Box<dyn BackendVector>> {
        let len = vec_len_for_dim((self.nrows(), self.ncols()), dim)?;
        Ok(Box::new(faer_col::zeros(len)))
    }
    fn copy(&self) -> Option<Box<dyn LinearOperator>> {
        Some(Box::new(self.clone()))
    }
    fn to_explicit(&self) -> BlockResult<ExplicitOp> {
        let dense = DMatrix::from_fn(self.nrows(), self.ncols(), |i, j| self[(i, j)]);
        Ok(ExplicitOp::Matrix(MatrixOp::new(CsrMatrix::from(&dense))))
    }
    fn describe(&self) -> String {
        format!("<faer Mat {}x{}>", self.nrows(), self.ncols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn faer_matvec_and_transpmult() {
        let a = faer::mat![[1.0, 2.0], [0.0, 3.0], [4.0, 0.0]];
        let mut x = faer_col::zeros(2);
        x[0] = 1.0;
        x[1] = -1.0;
        let y = a.matvec(&x).unwrap().applied().unwrap();
        assert_eq!(y.len(), 3);
        assert_relative_eq!(y.get_val(0), -1.0);
        assert_relative_eq!(y.get_val(1), -3.0);
        assert_relative_eq!(y.get_val(2), 4.0);

        let mut z = faer_col::zeros(3);
        BackendVector::fill(&mut z, 1.0);
        let w = a.transpmult(&z).unwrap().applied().unwrap();
        assert_relative_eq!(w.get_val(0), 5.0);
        assert_relative_eq!(w.get_val(1), 5.0);
    }

    #[test]
    fn faer_mat_ignores_nalgebra_vectors() {
        let a = faer::mat![[1.0, 0.0], [0.0, 1.0]];
        let x = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(a.matvec(&x), Ok(Action::NotApplicable)));
    }

    #[test]
    fn faer_col_update_checks_backend() {
        let mut y = faer_col::zeros(2);
        let other = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(
            y.add_scaled(1.0, &other),
            Err(BlockError::UnsupportedOperand(_))
        ));
        let mut ones = faer_col::zeros(2);
        BackendVector::fill(&mut ones, 1.0);
        y.add_scaled(2.0, &ones).unwrap();
        assert_relative_eq!(y.norm(), 8.0_f64.sqrt());
        assert_relative_eq!(BackendVector::dot(&y, &ones).unwrap(), 4.0);
        BackendVector::scale_mut(&mut y, -0.5);
        assert_relative_eq!(y.to_DVector(), DVector::from_vec(vec![-1.0, -1.0]));
    }
}
