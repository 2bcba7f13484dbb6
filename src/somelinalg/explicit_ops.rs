//! Concrete operators produced by `collapse`.
//!
//! Any leaf operator converts itself into an [`ExplicitOp`] through
//! `LinearOperator::to_explicit`. Two storage kinds are enough for what the block
//! engine builds out of them:
//! - [`MatrixOp`]: nalgebra_sparse `CsrMatrix<f64>` behind an `Rc`, with a transposed flag
//!   so that `transpose()` never copies data;
//! - [`DiagOp`]: a diagonal kept as a `DVector<f64>`, the result of `Diag`, `InvDiag`,
//!   `LumpedInvDiag` and `create_identity`.
//!
//! Mixed diagonal/matrix algebra promotes the diagonal to CSR.
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::somelinalg::backend_traits::{
    BackendVector, LinearOperator, check_operand_len, vec_len_for_dim,
};
use crate::somelinalg::nalgebra_backend::csr_mul_dvector;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct MatrixOp {
    pub mat: Rc<CsrMatrix<f64>>,
    pub transposed: bool,
}

impl MatrixOp {
    pub fn new(mat: CsrMatrix<f64>) -> Self {
        MatrixOp {
            mat: Rc::new(mat),
            transposed: false,
        }
    }

    /// duplicate (i, j) entries are summed
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut coo = CooMatrix::new(nrows, ncols);
        for (i, j, v) in triplets {
            coo.push(i, j, v);
        }
        MatrixOp::new(CsrMatrix::from(&coo))
    }

    pub fn shape(&self) -> (usize, usize) {
        if self.transposed {
            (self.mat.ncols(), self.mat.nrows())
        } else {
            (self.mat.nrows(), self.mat.ncols())
        }
    }

    /// storage with the transposed flag resolved
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        if self.transposed {
            self.mat.transpose()
        } else {
            (*self.mat).clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagOp {
    pub diag: DVector<f64>,
}

impl DiagOp {
    pub fn new(diag: DVector<f64>) -> Self {
        DiagOp { diag }
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let n = self.diag.len();
        let mut coo = CooMatrix::new(n, n);
        for (i, d) in self.diag.iter().enumerate() {
            if *d != 0.0 {
                coo.push(i, i, *d);
            }
        }
        CsrMatrix::from(&coo)
    }
}

#[derive(Debug, Clone)]
pub enum ExplicitOp {
    Matrix(MatrixOp),
    Diag(DiagOp),
}

fn scale_csr(mut mat: CsrMatrix<f64>, factor: f64) -> CsrMatrix<f64> {
    if factor != 1.0 {
        for v in mat.values_mut() {
            *v *= factor;
        }
    }
    mat
}

impl ExplicitOp {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            ExplicitOp::Matrix(m) => m.shape(),
            ExplicitOp::Diag(d) => (d.diag.len(), d.diag.len()),
        }
    }

    pub fn is_transposed(&self) -> bool {
        matches!(self, ExplicitOp::Matrix(MatrixOp { transposed: true, .. }))
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        match self {
            ExplicitOp::Matrix(m) => m.to_csr(),
            ExplicitOp::Diag(d) => d.to_csr(),
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from(&self.to_csr())
    }

    /// self * other, `other` acts first
    pub fn matmat(&self, other: &ExplicitOp) -> BlockResult<ExplicitOp> {
        let (_, ncols) = self.shape();
        let (other_rows, _) = other.shape();
        if ncols != other_rows {
            return Err(BlockError::dimension("matmat", ncols, other_rows));
        }
        match (self, other) {
            (ExplicitOp::Diag(a), ExplicitOp::Diag(b)) => {
                Ok(ExplicitOp::Diag(DiagOp::new(a.diag.component_mul(&b.diag))))
            }
            _ => {
                let a = self.to_csr();
                let b = other.to_csr();
                Ok(ExplicitOp::Matrix(MatrixOp::new(&a * &b)))
            }
        }
    }

    /// lscale * self + rscale * other
    pub fn add(&self, other: &ExplicitOp, lscale: f64, rscale: f64) -> BlockResult<ExplicitOp> {
        let (lhs_shape, rhs_shape) = (self.shape(), other.shape());
        if lhs_shape.0 != rhs_shape.0 {
            return Err(BlockError::dimension("add (rows)", lhs_shape.0, rhs_shape.0));
        }
        if lhs_shape.1 != rhs_shape.1 {
            return Err(BlockError::dimension("add (columns)", lhs_shape.1, rhs_shape.1));
        }
        match (self, other) {
            (ExplicitOp::Diag(a), ExplicitOp::Diag(b)) => Ok(ExplicitOp::Diag(DiagOp::new(
                &a.diag * lscale + &b.diag * rscale,
            ))),
            _ => {
                let a = scale_csr(self.to_csr(), lscale);
                let b = scale_csr(other.to_csr(), rscale);
                Ok(ExplicitOp::Matrix(MatrixOp::new(&a + &b)))
            }
        }
    }

    pub fn scaled(&self, factor: f64) -> ExplicitOp {
        match self {
            ExplicitOp::Diag(d) => ExplicitOp::Diag(DiagOp::new(&d.diag * factor)),
            ExplicitOp::Matrix(m) => {
                let mut out = MatrixOp::new(scale_csr((*m.mat).clone(), factor));
                out.transposed = m.transposed;
                ExplicitOp::Matrix(out)
            }
        }
    }

    /// flips the flag, the CSR data stays shared
    pub fn transpose(&self) -> ExplicitOp {
        match self {
            ExplicitOp::Matrix(m) => ExplicitOp::Matrix(MatrixOp {
                mat: Rc::clone(&m.mat),
                transposed: !m.transposed,
            }),
            ExplicitOp::Diag(d) => ExplicitOp::Diag(d.clone()),
        }
    }

    fn apply_dvector(&self, x: &DVector<f64>, adjoint: bool) -> DVector<f64> {
        match self {
            ExplicitOp::Matrix(m) => csr_mul_dvector(&m.mat, x, m.transposed != adjoint),
            ExplicitOp::Diag(d) => d.diag.component_mul(x),
        }
    }
}

impl fmt::Display for ExplicitOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (nrows, ncols) = self.shape();
        match self {
            ExplicitOp::Matrix(m) if m.transposed => write!(f, "<MatrixOp {}x{} (T)>", nrows, ncols),
            ExplicitOp::Matrix(_) => write!(f, "<MatrixOp {}x{}>", nrows, ncols),
            ExplicitOp::Diag(_) => write!(f, "<DiagOp {}x{}>", nrows, ncols),
        }
    }
}

impl LinearOperator for ExplicitOp {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn shape(&self) -> (usize, usize) {
        ExplicitOp::shape(self)
    }
    fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), ExplicitOp::shape(self).1, x)?;
        Ok(Action::Applied(Box::new(self.apply_dvector(d_vec, false))))
    }
    fn transpmult(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        let Some(d_vec) = x.as_any().downcast_ref::<DVector<f64>>() else {
            return Ok(Action::NotApplicable);
        };
        check_operand_len(&self.describe(), ExplicitOp::shape(self).0, x)?;
        Ok(Action::Applied(Box::new(self.apply_dvector(d_vec, true))))
    }
    fn create_vec(&self, dim: usize) -> BlockResult<Box<dyn BackendVector>> {
        let len = vec_len_for_dim(ExplicitOp::shape(self), dim)?;
        Ok(Box::new(DVector::<f64>::zeros(len)))
    }
    fn copy(&self) -> Option<Box<dyn LinearOperator>> {
        Some(Box::new(self.clone()))
    }
    fn to_explicit(&self) -> BlockResult<ExplicitOp> {
        Ok(self.clone())
    }
    fn describe(&self) -> String {
        self.to_string()
    }
}

////////////////////////////////////////////////////////////////
//  DIAGONAL EXTRACTORS
////////////////////////////////////////////////////////////////
fn square_explicit(op: &dyn LinearOperator, what: &str) -> BlockResult<ExplicitOp> {
    let explicit = op.to_explicit()?;
    let (nrows, ncols) = explicit.shape();
    if nrows != ncols {
        return Err(BlockError::dimension(
            format!("{} of {}", what, op.describe()),
            nrows,
            ncols,
        ));
    }
    Ok(explicit)
}

fn main_diagonal(explicit: &ExplicitOp) -> DVector<f64> {
    match explicit {
        ExplicitOp::Diag(d) => d.diag.clone(),
        ExplicitOp::Matrix(m) => {
            let mut diag: DVector<f64> = DVector::zeros(m.shape().0);
            for (i, j, v) in m.mat.triplet_iter() {
                if i == j {
                    diag[i] += *v;
                }
            }
            diag
        }
    }
}

/// diagonal part of a square operator
pub fn Diag(op: &dyn LinearOperator) -> BlockResult<ExplicitOp> {
    let explicit = square_explicit(op, "Diag")?;
    Ok(ExplicitOp::Diag(DiagOp::new(main_diagonal(&explicit))))
}

/// inverse of the diagonal part; a zero on the diagonal is an error
pub fn InvDiag(op: &dyn LinearOperator) -> BlockResult<ExplicitOp> {
    let explicit = square_explicit(op, "InvDiag")?;
    let diag = main_diagonal(&explicit);
    if let Some(row) = diag.iter().position(|d| *d == 0.0) {
        return Err(BlockError::UnsupportedOperand(format!(
            "InvDiag: zero diagonal entry in row {} of {}",
            row,
            op.describe()
        )));
    }
    Ok(ExplicitOp::Diag(DiagOp::new(diag.map(|d| 1.0 / d))))
}

/// inverse of the absolute row sums
pub fn LumpedInvDiag(op: &dyn LinearOperator) -> BlockResult<ExplicitOp> {
    let explicit = square_explicit(op, "LumpedInvDiag")?;
    let n = explicit.shape().0;
    let mut row_sums: DVector<f64> = DVector::zeros(n);
    for (i, _, v) in explicit.to_csr().triplet_iter() {
        row_sums[i] += v.abs();
    }
    if let Some(row) = row_sums.iter().position(|s| *s == 0.0) {
        return Err(BlockError::UnsupportedOperand(format!(
            "LumpedInvDiag: empty row {} in {}",
            row,
            op.describe()
        )));
    }
    Ok(ExplicitOp::Diag(DiagOp::new(row_sums.map(|s| 1.0 / s))))
}

/// val * I of size n
pub fn create_identity(n: usize, val: f64) -> ExplicitOp {
    ExplicitOp::Diag(DiagOp::new(DVector::from_element(n, val)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dense_a() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, -1.0, 3.0])
    }

    fn dense_b() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 0.0, 2.0, -2.0, 0.0])
    }

    #[test]
    fn matmat_matches_dense_product() {
        let a = dense_a().to_explicit().unwrap();
        let b = dense_b().to_explicit().unwrap();
        let ab = a.matmat(&b).unwrap();
        assert_relative_eq!(ab.to_dense(), dense_a() * dense_b());
        assert!(matches!(
            a.matmat(&a),
            Err(BlockError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn transpose_shares_storage_and_flips_shape() {
        let a = dense_a().to_explicit().unwrap();
        let at = a.transpose();
        assert!(at.is_transposed());
        assert_eq!(at.shape(), (3, 2));
        if let (ExplicitOp::Matrix(m), ExplicitOp::Matrix(mt)) = (&a, &at) {
            assert!(Rc::ptr_eq(&m.mat, &mt.mat));
        } else {
            panic!("expected matrix operators");
        }
        assert_relative_eq!(at.to_dense(), dense_a().transpose());
        assert!(!at.transpose().is_transposed());
    }

    #[test]
    fn add_with_scales_implements_subtraction() {
        let a = dense_a().to_explicit().unwrap();
        let bt = dense_b().to_explicit().unwrap().transpose();
        let diff = a.add(&bt, 1.0, -1.0).unwrap();
        assert_relative_eq!(diff.to_dense(), dense_a() - dense_b().transpose());
        assert!(a.add(&dense_b().to_explicit().unwrap(), 1.0, 1.0).is_err());
    }

    #[test]
    fn transposed_matvec_uses_adjoint_storage() {
        let at = dense_a().to_explicit().unwrap().transpose();
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let y = at.matvec(&x).unwrap().applied().unwrap().to_DVector();
        assert_relative_eq!(y, dense_a().tr_mul(&x));
    }

    #[test]
    fn diagonal_extractors() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, -1.0, 3.0, 4.0]);
        let d = Diag(&m).unwrap();
        assert_relative_eq!(d.to_dense(), DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]));
        let inv = InvDiag(&m).unwrap();
        assert_relative_eq!(inv.to_dense()[(0, 0)], 0.5);
        assert_relative_eq!(inv.to_dense()[(1, 1)], 0.25);
        let lumped = LumpedInvDiag(&m).unwrap();
        assert_relative_eq!(lumped.to_dense()[(0, 0)], 1.0 / 3.0);
        assert_relative_eq!(lumped.to_dense()[(1, 1)], 1.0 / 7.0);

        let singular = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 1.0]);
        assert!(InvDiag(&singular).is_err());
        assert!(Diag(&dense_a()).is_err());

        // row sums come from the CSR entries, an empty row can't be inverted
        let sparse_rows = DMatrix::from_row_slice(3, 3, &[1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, -2.0]);
        assert!(matches!(
            LumpedInvDiag(&sparse_rows),
            Err(BlockError::UnsupportedOperand(_))
        ));
        let csr = CsrMatrix::from(&m);
        assert_relative_eq!(LumpedInvDiag(&csr).unwrap().to_dense(), lumped.to_dense());
    }

    #[test]
    fn identity_mixes_with_matrices() {
        let id = create_identity(2, 3.0);
        let a = dense_a().to_explicit().unwrap();
        let scaled = id.matmat(&a).unwrap();
        assert_relative_eq!(scaled.to_dense(), dense_a() * 3.0);
        let twice = id.add(&create_identity(2, 1.0), 1.0, -1.0).unwrap();
        assert!(matches!(twice, ExplicitOp::Diag(_)));
        assert_relative_eq!(twice.to_dense(), DMatrix::identity(2, 2) * 2.0);
    }
}
