//! Lazy block (partitioned) linear algebra.
//!
//! Operators and vectors are grouped into grids of sub-blocks ([`BlockMat`], [`BlockVec`]);
//! expressions built from them with `*`, `+`, `-` and `.t()` stay unevaluated
//! ([`BlockExpr`]) until they are applied to a vector. The numerical work is done by
//! the backends in `crate::somelinalg`.
//! ```ignore
//! let m = BlockMat::from_rows(vec![
//!     vec![Operand::op(a), Operand::op(b_t)],
//!     vec![Operand::op(b), Operand::Scalar(0.0)],
//! ])?;
//! let x = m.create_vec(1)?;
//! let y = (Operand::from(prec) * Operand::from(m)).apply(&Operand::from(x))?;
//! ```
#![allow(non_snake_case)]
/// boundary-condition hook for allocated block vectors
pub mod block_bc;
/// the expression tree: products, sums, differences, transposes
pub mod block_compose;
pub mod block_container;
pub mod block_error;
pub mod block_mat;
pub mod block_vec;
/// reduce an expression to one explicit operator
pub mod collapse;
pub mod operand;


pub use block_bc::{BlockBC, FixedEntries};
pub use block_compose::BlockExpr;
pub use block_container::BlockContainer;
pub use block_error::{Action, BlockError, BlockResult};
pub use block_mat::{BlockMat, IdentityPolicy};
pub use block_vec::BlockVec;
pub use collapse::{Collapsed, collapse, collapse_with};
pub use operand::Operand;
