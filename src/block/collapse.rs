//! Materialize a lazy expression into one explicit operator.
//!
//! Leaves go through `LinearOperator::to_explicit`, scalars stay scalars until they
//! meet an operator. Products fold from the first-applied factor outward
//! (`acc = factor * acc`), sums and differences use `ExplicitOp::add` with the
//! right-hand scale set to +1 or -1, transposes only flip the flag.
use crate::block::block_compose::BlockExpr;
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::block::operand::Operand;
use crate::somelinalg::backend_traits::{BackendVector, LinearOperator};
use crate::somelinalg::explicit_ops::{ExplicitOp, create_identity};
use log::{info, warn};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum Collapsed {
    Scalar(f64),
    Op(ExplicitOp),
}

impl Collapsed {
    pub fn is_transposed(&self) -> bool {
        matches!(self, Collapsed::Op(op) if op.is_transposed())
    }

    /// the operator, with a scalar turned into `s * I` of size `n`
    pub fn into_explicit(self, n: usize) -> ExplicitOp {
        match self {
            Collapsed::Scalar(s) => create_identity(n, s),
            Collapsed::Op(op) => op,
        }
    }

    /// y = C x
    pub fn matvec(&self, x: &dyn BackendVector) -> BlockResult<Action<Box<dyn BackendVector>>> {
        match self {
            Collapsed::Scalar(s) => {
                let mut y = x.clone_box();
                y.scale_mut(*s);
                Ok(Action::Applied(y))
            }
            Collapsed::Op(op) => op.matvec(x),
        }
    }
}

impl fmt::Display for Collapsed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Collapsed::Scalar(s) => write!(f, "{}", s),
            Collapsed::Op(op) => write!(f, "{}", op),
        }
    }
}

/// [`collapse_with`] warning on a transposed result
pub fn collapse(x: &Operand) -> BlockResult<Collapsed> {
    collapse_with(x, true)
}

pub fn collapse_with(x: &Operand, warn_on_transposed: bool) -> BlockResult<Collapsed> {
    let start = Instant::now();
    let result = collapse_operand(x)?;
    info!("collapse of {} took {:?}", x, start.elapsed());
    if warn_on_transposed && result.is_transposed() {
        warn!("collapse result {} is transposed, backends expecting row storage will see A^T", result);
    }
    Ok(result)
}

fn collapse_operand(x: &Operand) -> BlockResult<Collapsed> {
    match x {
        Operand::Scalar(s) => Ok(Collapsed::Scalar(*s)),
        Operand::Operator(op) => Ok(Collapsed::Op(op.to_explicit()?)),
        Operand::BlockMat(m) if m.shape() == (1, 1) => collapse_operand(&m[(0, 0)]),
        Operand::BlockMat(m) => Err(BlockError::UnsupportedOperand(format!(
            "can't collapse a {}x{} block matrix, only 1x1",
            m.nrows(),
            m.ncols()
        ))),
        Operand::Node(e) => match &**e {
            BlockExpr::Compose(chain) => {
                let mut factors = chain.iter();
                let Some(first) = factors.next() else {
                    return Err(BlockError::UnsupportedOperand("empty product".to_string()));
                };
                let mut acc = collapse_operand(first)?;
                for factor in factors {
                    acc = multiply(collapse_operand(factor)?, acc)?;
                }
                Ok(acc)
            }
            BlockExpr::Add(a, b) => add(collapse_operand(a)?, collapse_operand(b)?, 1.0),
            BlockExpr::Sub(a, b) => add(collapse_operand(a)?, collapse_operand(b)?, -1.0),
            BlockExpr::Transpose(a) => Ok(match collapse_operand(a)? {
                Collapsed::Scalar(s) => Collapsed::Scalar(s),
                Collapsed::Op(op) => Collapsed::Op(op.transpose()),
            }),
        },
        Operand::Empty | Operand::Vector(_) | Operand::BlockVec(_) => Err(
            BlockError::UnsupportedOperand(format!("can't collapse {}, it is not an operator", x)),
        ),
    }
}

/// outer * inner
fn multiply(outer: Collapsed, inner: Collapsed) -> BlockResult<Collapsed> {
    Ok(match (outer, inner) {
        (Collapsed::Scalar(a), Collapsed::Scalar(b)) => Collapsed::Scalar(a * b),
        (Collapsed::Scalar(a), Collapsed::Op(b)) => Collapsed::Op(b.scaled(a)),
        (Collapsed::Op(a), Collapsed::Scalar(b)) => Collapsed::Op(a.scaled(b)),
        (Collapsed::Op(a), Collapsed::Op(b)) => Collapsed::Op(a.matmat(&b)?),
    })
}

/// a + rscale * b, a scalar next to an operator is a scaled identity
fn add(a: Collapsed, b: Collapsed, rscale: f64) -> BlockResult<Collapsed> {
    Ok(match (a, b) {
        (Collapsed::Scalar(a), Collapsed::Scalar(b)) => Collapsed::Scalar(a + rscale * b),
        (Collapsed::Op(a), Collapsed::Scalar(b)) => {
            let id = create_identity(a.shape().0, b);
            Collapsed::Op(a.add(&id, 1.0, rscale)?)
        }
        (Collapsed::Scalar(a), Collapsed::Op(b)) => {
            let id = create_identity(b.shape().0, a);
            Collapsed::Op(b.add(&id, rscale, 1.0)?)
        }
        (Collapsed::Op(a), Collapsed::Op(b)) => Collapsed::Op(a.add(&b, 1.0, rscale)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::block_mat::BlockMat;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    fn a() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0])
    }

    fn b() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 3.0, 1.0])
    }

    fn dense(c: Collapsed) -> DMatrix<f64> {
        c.into_explicit(2).to_dense()
    }

    #[test]
    fn products_fold_in_application_order() {
        let e = Operand::op(a()) * Operand::op(b()) * 2.0;
        assert_relative_eq!(dense(collapse(&e).unwrap()), a() * b() * 2.0);
    }

    #[test]
    fn sums_differences_and_scalars() {
        let sum = Operand::op(a()) + Operand::op(b());
        assert_relative_eq!(dense(collapse(&sum).unwrap()), a() + b());
        let diff = Operand::op(a()) - Operand::op(b());
        assert_relative_eq!(dense(collapse(&diff).unwrap()), a() - b());
        let shifted = Operand::Scalar(3.0) - Operand::op(a());
        assert_relative_eq!(
            dense(collapse(&shifted).unwrap()),
            DMatrix::identity(2, 2) * 3.0 - a()
        );
        let plain = Operand::Scalar(2.0) * Operand::Scalar(4.0) - Operand::Scalar(1.0);
        assert_eq!(collapse(&plain).unwrap().to_string(), "7");
    }

    #[test]
    fn transposed_result_is_reported_but_usable() {
        let at = Operand::op(a()).t();
        let c = collapse(&at).unwrap();
        assert!(c.is_transposed());
        assert_relative_eq!(dense(c), a().transpose());
        let back = collapse(&(Operand::op(a()).t() * Operand::op(b()))).unwrap();
        assert!(!back.is_transposed());
        assert_relative_eq!(dense(back), a().transpose() * b());
    }

    #[test]
    fn one_by_one_block_matrix_collapses_to_its_entry() {
        let m = BlockMat::from_rows(vec![vec![Operand::op(b())]]).unwrap();
        assert_relative_eq!(dense(collapse(&Operand::from(m)).unwrap()), b());
        let big = BlockMat::new(2, 2);
        assert!(matches!(
            collapse(&Operand::from(big)),
            Err(BlockError::UnsupportedOperand(_))
        ));
        let v = Operand::vec(DVector::from_vec(vec![1.0]));
        assert!(collapse(&v).is_err());
    }
}
