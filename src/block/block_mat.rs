use crate::block::block_compose::BlockExpr;
use crate::block::block_container::BlockContainer;
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::block::block_vec::BlockVec;
use crate::block::operand::{Operand, accumulate};
use log::debug;
use std::fmt;
use std::ops::Index;
use std::rc::Rc;
use strum_macros::{Display, EnumString};
use tabled::{builder::Builder, settings::Style};

/// What an identity slot (scalar 1) hands back for its input block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum IdentityPolicy {
    /// the input block itself (shared `Rc`, no allocation)
    #[default]
    Alias,
    /// an owned copy of the input block
    Copy,
}

/// m x n grid of operators, scalars, nested block matrices or empty slots.
#[derive(Debug, Clone, Default)]
pub struct BlockMat {
    blocks: BlockContainer<Operand>,
    identity_policy: IdentityPolicy,
}

impl BlockMat {
    pub fn new(m: usize, n: usize) -> Self {
        BlockMat {
            blocks: BlockContainer::with_shape(m, n),
            identity_policy: IdentityPolicy::default(),
        }
    }

    pub fn from_rows(rows: Vec<Vec<Operand>>) -> BlockResult<Self> {
        Ok(BlockMat {
            blocks: BlockContainer::from_rows(rows)?,
            identity_policy: IdentityPolicy::default(),
        })
    }

    pub fn with_identity_policy(mut self, policy: IdentityPolicy) -> Self {
        self.identity_policy = policy;
        self
    }

    pub fn identity_policy(&self) -> IdentityPolicy {
        self.identity_policy
    }

    pub fn set_identity_policy(&mut self, policy: IdentityPolicy) {
        self.identity_policy = policy;
    }

    pub fn shape(&self) -> (usize, usize) {
        self.blocks.shape()
    }

    pub fn nrows(&self) -> usize {
        self.blocks.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.blocks.ncols()
    }

    pub fn blocks(&self) -> &BlockContainer<Operand> {
        &self.blocks
    }

    pub fn get(&self, i: usize, j: usize) -> BlockResult<&Operand> {
        self.blocks.get(i, j)
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> BlockResult<&mut Operand> {
        self.blocks.get_mut(i, j)
    }

    pub fn set(&mut self, i: usize, j: usize, value: Operand) -> BlockResult<()> {
        self.blocks.set(i, j, value)
    }

    pub fn fill(&mut self, value: Operand) {
        self.blocks.fill(value)
    }

    pub fn assign_from<I: IntoIterator<Item = Operand>>(&mut self, items: I) -> BlockResult<()> {
        self.blocks.assign_from(items)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operand> {
        self.blocks.iter()
    }

    /// rows with no contributing block; their output slot stays empty after `matvec`
    pub fn empty_rows(&self) -> Vec<usize> {
        (0..self.nrows())
            .filter(|&i| {
                self.blocks
                    .row(i)
                    .map(|row| row.iter().all(Operand::is_zero))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// y = M x
    pub fn matvec(&self, x: &BlockVec) -> BlockResult<Action<BlockVec>> {
        self.block_action(x, false)
    }

    /// y = M^T x, block (i, j) contributes (i, j)^T x[i] to y[j]
    pub fn transpmult(&self, x: &BlockVec) -> BlockResult<Action<BlockVec>> {
        self.block_action(x, true)
    }

    fn block_action(&self, x: &BlockVec, adjoint: bool) -> BlockResult<Action<BlockVec>> {
        let (m, n) = self.shape();
        let (out_len, in_len) = if adjoint { (n, m) } else { (m, n) };
        if x.len() != in_len {
            let context = if adjoint {
                "block transpmult"
            } else {
                "block matvec"
            };
            return Err(BlockError::dimension(context, in_len, x.len()));
        }
        let mut y = BlockVec::new(out_len);
        for k in 0..out_len {
            let mut acc = Operand::Empty;
            for l in 0..in_len {
                let (i, j) = if adjoint { (l, k) } else { (k, l) };
                let slot = &self.blocks[(i, j)];
                if slot.is_zero() {
                    continue;
                }
                let x_l = &x[l];
                // identity is checked before the generic scalar path on purpose
                let z = if slot.is_identity() {
                    match self.identity_policy {
                        IdentityPolicy::Alias => x_l.clone(),
                        IdentityPolicy::Copy => x_l.copy(),
                    }
                } else {
                    let action = match slot {
                        Operand::Operator(_) if x_l.is_empty() || x_l.is_scalar() => {
                            return Err(BlockError::Configuration(format!(
                                "RHS block {} contains scalars instead of vectors, use create_vec() or allocate()",
                                l
                            )));
                        }
                        _ if adjoint => slot.transpmult(x_l)?,
                        _ => slot.apply(x_l)?,
                    };
                    match action {
                        Action::Applied(z) => z,
                        Action::NotApplicable => {
                            debug!("block ({},{}) = {} not applicable to {}", i, j, slot, x_l);
                            return Ok(Action::NotApplicable);
                        }
                    }
                };
                if !z.is_vector_like() {
                    return Err(BlockError::Configuration(format!(
                        "unexpected result {} in block ({},{}), RHS block {} is {}; use create_vec() or allocate()",
                        z, i, j, l, x_l
                    )));
                }
                accumulate(&mut acc, &z, 1.0, &format!("block ({},{})", i, j))?;
            }
            if acc.is_empty() {
                debug!("row {} of {} has no contribution", k, self);
            }
            y.set(k, acc)?;
        }
        Ok(Action::Applied(y))
    }

    /// zero block vector laid out by the rows (`dim = 0`) or columns (`dim = 1`)
    pub fn create_vec(&self, dim: usize) -> BlockResult<BlockVec> {
        let count = if dim == 0 { self.nrows() } else { self.ncols() };
        let mut v = BlockVec::from_vec(vec![Operand::Scalar(0.0); count]);
        v.allocate(self, dim)?;
        Ok(v)
    }

    /// zero vector for slot `k` of a block vector allocated along `dim`,
    /// taken from the first block in column `k` (`dim = 1`) or row `k` (`dim = 0`) able to size it
    pub(crate) fn vec_template(&self, k: usize, dim: usize) -> BlockResult<Option<Operand>> {
        let candidates: Vec<&Operand> = if dim == 1 {
            self.blocks.column(k)?
        } else {
            self.blocks.row(k)?.iter().collect()
        };
        for slot in candidates {
            if let Some(v) = operand_vec(slot, dim)? {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Deep copy, slot by slot. Operators without a copy protocol stay shared.
    pub fn copy(&self) -> BlockMat {
        let mut blocks = self.blocks.clone();
        for slot in blocks.iter_mut() {
            *slot = slot.copy();
        }
        BlockMat {
            blocks,
            identity_policy: self.identity_policy,
        }
    }

    pub fn layout_table(&self) -> String {
        let mut builder = Builder::default();
        let mut header = vec![String::new()];
        header.extend((0..self.ncols()).map(|j| j.to_string()));
        builder.push_record(header);
        for i in 0..self.nrows() {
            let mut record = vec![i.to_string()];
            if let Ok(row) = self.blocks.row(i) {
                record.extend(row.iter().map(|b| b.to_string()));
            }
            builder.push_record(record);
        }
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        table.to_string()
    }
}

/// zero vector in the range (`dim = 0`) or domain (`dim = 1`) of `op`, if it can tell
fn operand_vec(op: &Operand, dim: usize) -> BlockResult<Option<Operand>> {
    match op {
        Operand::Operator(op) => Ok(Some(Operand::Vector(Rc::from(op.create_vec(dim)?)))),
        Operand::BlockMat(m) => Ok(Some(Operand::BlockVec(m.create_vec(dim)?))),
        Operand::Node(e) => match &**e {
            // chain[0] acts first, so it owns the domain; the last factor owns the range
            // scalar factors don't change the size, look past them
            BlockExpr::Compose(chain) => {
                let mut factors: Vec<&Operand> = chain.iter().filter(|f| !f.is_scalar()).collect();
                if dim == 0 {
                    factors.reverse();
                }
                for f in factors {
                    if let Some(v) = operand_vec(f, dim)? {
                        return Ok(Some(v));
                    }
                }
                Ok(None)
            }
            BlockExpr::Add(a, b) | BlockExpr::Sub(a, b) => match operand_vec(a, dim)? {
                Some(v) => Ok(Some(v)),
                None => operand_vec(b, dim),
            },
            BlockExpr::Transpose(a) => operand_vec(a, 1 - dim.min(1)),
        },
        _ => Ok(None),
    }
}

impl Index<(usize, usize)> for BlockMat {
    type Output = Operand;
    fn index(&self, ij: (usize, usize)) -> &Operand {
        &self.blocks[ij]
    }
}

impl fmt::Display for BlockMat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<BlockMat {}x{}>", self.nrows(), self.ncols())
    }
}
