#![allow(non_camel_case_types)]
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::somelinalg::explicit_ops::ExplicitOp;
use nalgebra::DVector;
use std::any::Any;
use std::fmt::{self, Debug};

/*
The block engine never touches matrix storage. Everything it needs from a numerical
crate goes through two object-safe traits:
 - BackendVector  (concrete vector: +=, -=, length, raw entry access)
 - LinearOperator (apply, adjoint apply, create compatible vector, collapse hook)
Implementations live next to each crate:
 "nalgebra_backend" - DMatrix<f64>, nalgebra_sparse CsrMatrix<f64> acting on DVector<f64>
 "sprs_backend"     - sprs CsMat<f64> acting on DVector<f64>
 "faer_backend"     - faer Mat<f64> acting on faer Col<f64>
A vector of the wrong crate is answered with Action::NotApplicable, a vector of the
wrong length with BlockError::DimensionMismatch.
*/

////////////////////////////////////////////////////////////////
//  BACKENDVECTOR - concrete vector stored in a block slot
////////////////////////////////////////////////////////////////
pub trait BackendVector: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn BackendVector>; // deep copy into box
    fn len(&self) -> usize;
    fn get_val(&self, index: usize) -> f64;
    fn set_val(&mut self, index: usize, value: f64);
    fn fill(&mut self, value: f64);
    fn scale_mut(&mut self, factor: f64);
    /// self += alpha * other
    fn add_scaled(&mut self, alpha: f64, other: &dyn BackendVector) -> BlockResult<()>;
    fn dot(&self, other: &dyn BackendVector) -> BlockResult<f64>;
    fn norm(&self) -> f64;
    fn to_DVector(&self) -> DVector<f64>;
    fn vec_type(&self) -> String;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for dyn BackendVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.vec_type(), self.to_DVector().as_slice())
    }
}

/// checks the pairing used by every `add_scaled`/`dot`
pub fn check_same_len(
    lhs: &dyn BackendVector,
    rhs: &dyn BackendVector,
    context: &str,
) -> BlockResult<()> {
    if lhs.len() != rhs.len() {
        return Err(BlockError::dimension(context, lhs.len(), rhs.len()));
    }
    Ok(())
}

////////////////////////////////////////////////////////////////
//  LINEAROPERATOR - concrete operator stored in a block slot
////////////////////////////////////////////////////////////////
pub trait LinearOperator: Any {
    fn as_any(&self) -> &dyn Any;
    /// (range length, domain length)
    fn shape(&self) -> (usize, usize);
    /// y = A x
    fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>>;
    /// y = A^T x
    fn transpmult(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>>;
    /// zero vector sized to the range (dim = 0) or the domain (dim = 1)
    fn create_vec(&self, dim: usize) -> BlockResult<Box<dyn BackendVector>>;
    /// deep copy, `None` when the operator cannot be copied
    fn copy(&self) -> Option<Box<dyn LinearOperator>> {
        None
    }
    /// leaf conversion used by `collapse`
    fn to_explicit(&self) -> BlockResult<ExplicitOp> {
        Err(BlockError::UnsupportedOperand(format!(
            "can't extract matrix data from {}",
            self.describe()
        )))
    }
    fn describe(&self) -> String;
}

impl Debug for dyn LinearOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// shared check for `create_vec` implementations
pub fn vec_len_for_dim(shape: (usize, usize), dim: usize) -> BlockResult<usize> {
    match dim {
        0 => Ok(shape.0),
        1 => Ok(shape.1),
        _ => Err(BlockError::UnsupportedOperand(format!(
            "dim must be 0 or 1, got {}",
            dim
        ))),
    }
}

/// shared check for `matvec`/`transpmult` implementations
pub fn check_operand_len(
    name: &str,
    expected: usize,
    x: &dyn BackendVector,
) -> BlockResult<()> {
    if x.len() != expected {
        return Err(BlockError::dimension(
            format!("{} matvec", name),
            expected,
            x.len(),
        ));
    }
    Ok(())
}
