//! The closed set of things that can sit in a block slot or in an expression tree,
//! and the generic "operand times vector" dispatch every apply path goes through.
use crate::block::block_compose::BlockExpr;
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::block::block_mat::BlockMat;
use crate::block::block_vec::BlockVec;
use crate::somelinalg::backend_traits::{BackendVector, LinearOperator};
use log::warn;
use nalgebra::DVector;
use std::fmt;
use std::rc::Rc;

/// A block slot or tree leaf.
///
/// Operators, vectors, block matrices and tree nodes are held behind `Rc`: putting one
/// into a container or an expression never copies it. Vectors are copied lazily, only
/// when something has to be written into a shared one.
#[derive(Debug, Clone, Default)]
pub enum Operand {
    /// unset slot, contributes nothing
    #[default]
    Empty,
    /// pure number; 1 on a diagonal slot is the identity, 0 is "no block"
    Scalar(f64),
    Operator(Rc<dyn LinearOperator>),
    Vector(Rc<dyn BackendVector>),
    BlockMat(Rc<BlockMat>),
    BlockVec(BlockVec),
    /// lazy product, sum, difference or transpose
    Node(Rc<BlockExpr>),
}

impl Operand {
    pub fn op<T: LinearOperator>(op: T) -> Operand {
        Operand::Operator(Rc::new(op))
    }

    pub fn vec<V: BackendVector>(v: V) -> Operand {
        Operand::Vector(Rc::new(v))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Operand::Empty)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Operand::Scalar(_))
    }

    pub fn scalar(&self) -> Option<f64> {
        match self {
            Operand::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// empty slot or scalar 0
    pub fn is_zero(&self) -> bool {
        matches!(self, Operand::Empty) || self.scalar() == Some(0.0)
    }

    pub fn is_identity(&self) -> bool {
        self.scalar() == Some(1.0)
    }

    /// concrete vector or block vector
    pub fn is_vector_like(&self) -> bool {
        matches!(self, Operand::Vector(_) | Operand::BlockVec(_))
    }

    pub fn as_vector(&self) -> Option<&dyn BackendVector> {
        match self {
            Operand::Vector(v) => Some(&**v),
            _ => None,
        }
    }

    pub fn as_block_vec(&self) -> Option<&BlockVec> {
        match self {
            Operand::BlockVec(v) => Some(v),
            _ => None,
        }
    }

    /// values of a vector, block vectors are concatenated
    pub fn to_DVector(&self) -> BlockResult<DVector<f64>> {
        match self {
            Operand::Vector(v) => Ok(v.to_DVector()),
            Operand::BlockVec(v) => v.to_DVector(),
            other => Err(BlockError::UnsupportedOperand(format!(
                "{} holds no vector data",
                other
            ))),
        }
    }

    /// lazy transpose, `x.t().t()` gives back `x`
    pub fn t(&self) -> Operand {
        match self {
            Operand::Scalar(_) => self.clone(),
            Operand::Node(e) => match &**e {
                BlockExpr::Transpose(inner) => inner.clone(),
                _ => Operand::Node(Rc::new(BlockExpr::Transpose(self.clone()))),
            },
            _ => Operand::Node(Rc::new(BlockExpr::Transpose(self.clone()))),
        }
    }

    /// self * x where x is the running vector
    pub fn apply(&self, x: &Operand) -> BlockResult<Action<Operand>> {
        match self {
            Operand::Scalar(s) => scalar_mult(*s, x),
            Operand::Operator(op) => match x {
                Operand::Vector(v) => Ok(op.matvec(&**v)?.map(|y| Operand::Vector(Rc::from(y)))),
                _ => Ok(Action::NotApplicable),
            },
            Operand::BlockMat(m) => match x {
                Operand::BlockVec(v) => Ok(m.matvec(v)?.map(Operand::BlockVec)),
                _ => Ok(Action::NotApplicable),
            },
            Operand::Node(e) => e.apply(x),
            Operand::Empty | Operand::Vector(_) | Operand::BlockVec(_) => Ok(Action::NotApplicable),
        }
    }

    /// self^T * x; scalars commute so they act the same both ways
    pub fn transpmult(&self, x: &Operand) -> BlockResult<Action<Operand>> {
        match self {
            Operand::Scalar(s) => scalar_mult(*s, x),
            Operand::Operator(op) => match x {
                Operand::Vector(v) => Ok(op
                    .transpmult(&**v)?
                    .map(|y| Operand::Vector(Rc::from(y)))),
                _ => Ok(Action::NotApplicable),
            },
            Operand::BlockMat(m) => match x {
                Operand::BlockVec(v) => Ok(m.transpmult(v)?.map(Operand::BlockVec)),
                _ => Ok(Action::NotApplicable),
            },
            Operand::Node(e) => e.transpmult(x),
            Operand::Empty | Operand::Vector(_) | Operand::BlockVec(_) => Ok(Action::NotApplicable),
        }
    }

    /// Deep copy through each operand's own copy protocol.
    ///
    /// Operators without one stay shared (a warning is logged); tree nodes are
    /// immutable and always shared.
    pub fn copy(&self) -> Operand {
        match self {
            Operand::Operator(op) => match op.copy() {
                Some(copied) => Operand::Operator(Rc::from(copied)),
                None => {
                    warn!(
                        "{} has no copy protocol, the copy shares it with the original",
                        op.describe()
                    );
                    self.clone()
                }
            },
            Operand::Vector(v) => Operand::Vector(Rc::from(v.clone_box())),
            Operand::BlockVec(v) => Operand::BlockVec(v.copy()),
            Operand::BlockMat(m) => Operand::BlockMat(Rc::new(m.copy())),
            Operand::Empty | Operand::Scalar(_) | Operand::Node(_) => self.clone(),
        }
    }
}

/// s * x for a running vector x; `1 * x` hands back x itself
pub(crate) fn scalar_mult(s: f64, x: &Operand) -> BlockResult<Action<Operand>> {
    match x {
        Operand::Scalar(t) => Ok(Action::Applied(Operand::Scalar(s * t))),
        Operand::Vector(_) | Operand::BlockVec(_) if s == 1.0 => Ok(Action::Applied(x.clone())),
        Operand::Vector(v) => {
            let mut out = v.clone_box();
            out.scale_mut(s);
            Ok(Action::Applied(Operand::Vector(Rc::from(out))))
        }
        Operand::BlockVec(v) => Ok(Action::Applied(Operand::BlockVec(v.scaled(s)?))),
        _ => Ok(Action::NotApplicable),
    }
}

/// Runs `f` on a vector nobody else holds, copying it first if the `Rc` is shared.
pub(crate) fn with_unique_vector<R>(
    rc: &mut Rc<dyn BackendVector>,
    f: impl FnOnce(&mut dyn BackendVector) -> R,
) -> R {
    if let Some(v) = Rc::get_mut(rc) {
        return f(v);
    }
    let mut owned = rc.clone_box();
    let out = f(owned.as_mut());
    *rc = Rc::from(owned);
    out
}

/// Checks that [`accumulate`] can succeed, without writing anything.
pub(crate) fn check_accumulate(acc: &Operand, z: &Operand, context: &str) -> BlockResult<()> {
    match (acc, z) {
        (_, Operand::Empty) => Ok(()),
        (Operand::Empty, Operand::Scalar(_) | Operand::Vector(_)) => Ok(()),
        (Operand::Empty, Operand::BlockVec(v)) => {
            for (i, slot) in v.iter().enumerate() {
                check_accumulate(&Operand::Empty, slot, &format!("{}.{}", context, i))?;
            }
            Ok(())
        }
        (Operand::Scalar(_), Operand::Scalar(_)) => Ok(()),
        (Operand::Vector(y), Operand::Vector(v)) => {
            if y.len() != v.len() {
                return Err(BlockError::dimension(context, y.len(), v.len()));
            }
            if y.vec_type() != v.vec_type() {
                return Err(BlockError::UnsupportedOperand(format!(
                    "{}: can't add {} to {}",
                    context,
                    v.vec_type(),
                    y.vec_type()
                )));
            }
            Ok(())
        }
        (Operand::BlockVec(y), Operand::BlockVec(v)) => {
            if y.len() != v.len() {
                return Err(BlockError::dimension(context, y.len(), v.len()));
            }
            for (i, (a, b)) in y.iter().zip(v.iter()).enumerate() {
                check_accumulate(a, b, &format!("{}.{}", context, i))?;
            }
            Ok(())
        }
        (acc, z) => Err(BlockError::UnsupportedOperand(format!(
            "{}: can't add {} to {}",
            context, z, acc
        ))),
    }
}

/// acc += alpha * z, where an empty `acc` takes `alpha * z` as is
pub(crate) fn accumulate(
    acc: &mut Operand,
    z: &Operand,
    alpha: f64,
    context: &str,
) -> BlockResult<()> {
    if z.is_empty() {
        return Ok(());
    }
    if acc.is_empty() {
        *acc = match scalar_mult(alpha, z)? {
            Action::Applied(scaled) => scaled,
            Action::NotApplicable => {
                return Err(BlockError::UnsupportedOperand(format!(
                    "{}: {} is not a vector",
                    context, z
                )));
            }
        };
        return Ok(());
    }
    match (acc, z) {
        (Operand::Scalar(a), Operand::Scalar(b)) => {
            *a += alpha * b;
            Ok(())
        }
        (Operand::Vector(y), Operand::Vector(v)) => {
            if y.len() != v.len() {
                return Err(BlockError::dimension(context, y.len(), v.len()));
            }
            with_unique_vector(y, |target| target.add_scaled(alpha, &**v))
        }
        (Operand::BlockVec(y), Operand::BlockVec(v)) => y.add_scaled(alpha, v),
        (acc, z) => Err(BlockError::UnsupportedOperand(format!(
            "{}: can't add {} to {}",
            context, z, acc
        ))),
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Empty => write!(f, "None"),
            Operand::Scalar(s) => write!(f, "{}", s),
            Operand::Operator(op) => write!(f, "{}", op.describe()),
            Operand::Vector(v) => write!(f, "<{} {}>", v.vec_type(), v.len()),
            Operand::BlockMat(m) => write!(f, "{}", m),
            Operand::BlockVec(v) => write!(f, "{}", v),
            Operand::Node(e) => write!(f, "{}", e),
        }
    }
}

impl From<f64> for Operand {
    fn from(s: f64) -> Self {
        Operand::Scalar(s)
    }
}

impl From<BlockMat> for Operand {
    fn from(m: BlockMat) -> Self {
        Operand::BlockMat(Rc::new(m))
    }
}

impl From<BlockVec> for Operand {
    fn from(v: BlockVec) -> Self {
        Operand::BlockVec(v)
    }
}

impl From<BlockExpr> for Operand {
    fn from(e: BlockExpr) -> Self {
        Operand::Node(Rc::new(e))
    }
}

impl From<Rc<dyn LinearOperator>> for Operand {
    fn from(op: Rc<dyn LinearOperator>) -> Self {
        Operand::Operator(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn classification() {
        assert!(Operand::Empty.is_zero());
        assert!(Operand::Scalar(0.0).is_zero());
        assert!(Operand::Scalar(1.0).is_identity());
        assert!(!Operand::Scalar(2.0).is_identity());
        let v = Operand::vec(DVector::from_vec(vec![1.0]));
        assert!(v.is_vector_like() && !v.is_scalar());
        assert_eq!(Operand::from(3.0).scalar(), Some(3.0));
    }

    #[test]
    fn identity_scalar_aliases_the_vector() {
        let x = Operand::vec(DVector::from_vec(vec![1.0, 2.0]));
        let y = Operand::Scalar(1.0).apply(&x).unwrap().applied().unwrap();
        match (&x, &y) {
            (Operand::Vector(a), Operand::Vector(b)) => assert!(Rc::ptr_eq(a, b)),
            _ => panic!("expected vectors"),
        }
        let z = Operand::Scalar(-2.0).apply(&x).unwrap().applied().unwrap();
        assert_relative_eq!(z.to_DVector().unwrap(), DVector::from_vec(vec![-2.0, -4.0]));
    }

    #[test]
    fn operator_times_operator_is_not_applicable() {
        let a = Operand::op(DMatrix::<f64>::identity(2, 2));
        assert!(!a.apply(&a).unwrap().is_applied());
        assert!(!Operand::Empty.apply(&a).unwrap().is_applied());
    }

    #[test]
    fn accumulate_copies_shared_vectors_before_writing() {
        let x = Operand::vec(DVector::from_vec(vec![1.0, 1.0]));
        let mut acc = Operand::Empty;
        accumulate(&mut acc, &x, 1.0, "test").unwrap();
        accumulate(&mut acc, &x, 2.0, "test").unwrap();
        assert_relative_eq!(acc.to_DVector().unwrap(), DVector::from_vec(vec![3.0, 3.0]));
        // the input is untouched
        assert_relative_eq!(x.to_DVector().unwrap(), DVector::from_vec(vec![1.0, 1.0]));

        let short = Operand::vec(DVector::from_vec(vec![1.0]));
        assert_eq!(
            accumulate(&mut acc, &short, 1.0, "block (0,1)"),
            Err(BlockError::dimension("block (0,1)", 2, 1))
        );
    }

    #[test]
    fn double_transpose_unwraps() {
        let a = Operand::op(DMatrix::<f64>::identity(2, 2));
        let att = a.t().t();
        assert!(matches!(att, Operand::Operator(_)));
        assert_eq!(a.t().to_string(), "{<DMatrix 2x2>}^T");
    }

    #[test]
    fn copy_gives_independent_vectors() {
        let x = Operand::vec(DVector::from_vec(vec![1.0, 2.0]));
        let y = x.copy();
        match (&x, &y) {
            (Operand::Vector(a), Operand::Vector(b)) => assert!(!Rc::ptr_eq(a, b)),
            _ => panic!("expected vectors"),
        }
        assert_relative_eq!(x.to_DVector().unwrap(), y.to_DVector().unwrap());
    }
}
