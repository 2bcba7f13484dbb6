use crate::block::block_container::BlockContainer;
use crate::block::block_error::{Action, BlockError, BlockResult};
use crate::block::block_mat::BlockMat;
use crate::block::operand::{
    Operand, accumulate, check_accumulate, scalar_mult, with_unique_vector,
};
use nalgebra::DVector;
use std::fmt;
use std::ops::Index;

/// Ordered sequence of sub-vectors. Slots start empty (or hold scalar placeholders)
/// until [`BlockVec::allocate`] sizes them against a block matrix.
#[derive(Debug, Clone, Default)]
pub struct BlockVec {
    blocks: BlockContainer<Operand>,
}

impl BlockVec {
    pub fn new(n: usize) -> Self {
        BlockVec {
            blocks: BlockContainer::with_shape(1, n),
        }
    }

    pub fn from_vec(items: Vec<Operand>) -> Self {
        BlockVec {
            blocks: BlockContainer::from_vec(items),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &BlockContainer<Operand> {
        &self.blocks
    }

    pub fn get(&self, i: usize) -> BlockResult<&Operand> {
        self.blocks.get(0, i)
    }

    pub fn get_mut(&mut self, i: usize) -> BlockResult<&mut Operand> {
        self.blocks.get_mut(0, i)
    }

    pub fn set(&mut self, i: usize, value: Operand) -> BlockResult<()> {
        self.blocks.set(0, i, value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operand> {
        self.blocks.iter()
    }

    pub fn fill(&mut self, value: Operand) {
        self.blocks.fill(value)
    }

    pub fn assign_from<I: IntoIterator<Item = Operand>>(&mut self, items: I) -> BlockResult<()> {
        self.blocks.assign_from(items)
    }

    /// every slot holds a concrete vector (or an allocated nested block vector)
    pub fn is_allocated(&self) -> bool {
        self.iter().all(|slot| match slot {
            Operand::Vector(_) => true,
            Operand::BlockVec(v) => v.is_allocated(),
            _ => false,
        })
    }

    /// Fills every empty or scalar slot with a zero vector sized by `mat`:
    /// column `i` for `dim = 1` (domain side), row `i` for `dim = 0` (range side).
    /// A scalar placeholder `c` becomes a vector of `c`s. Slots already holding
    /// vectors are left alone.
    pub fn allocate(&mut self, mat: &BlockMat, dim: usize) -> BlockResult<()> {
        let count = match dim {
            0 => mat.nrows(),
            1 => mat.ncols(),
            _ => {
                return Err(BlockError::UnsupportedOperand(format!(
                    "dim must be 0 or 1, got {}",
                    dim
                )));
            }
        };
        if count != self.len() {
            return Err(BlockError::dimension("allocate", count, self.len()));
        }
        for i in 0..self.len() {
            let value = match self.get(i)? {
                Operand::Empty => 0.0,
                Operand::Scalar(c) => *c,
                _ => continue,
            };
            let Some(mut fresh) = mat.vec_template(i, dim)? else {
                let place = if dim == 1 { "column" } else { "row" };
                return Err(BlockError::Configuration(format!(
                    "can't allocate vector - no usable operators in {} {}",
                    place, i
                )));
            };
            if value != 0.0 {
                fill_values(&mut fresh, value);
            }
            self.set(i, fresh)?;
        }
        Ok(())
    }

    /// self += alpha * other, slot by slot; every pairing is checked before anything is written
    pub fn add_scaled(&mut self, alpha: f64, other: &BlockVec) -> BlockResult<()> {
        if self.len() != other.len() {
            return Err(BlockError::dimension(
                "block vector update",
                self.len(),
                other.len(),
            ));
        }
        for (i, (a, b)) in self.iter().zip(other.iter()).enumerate() {
            check_accumulate(a, b, &format!("block {}", i))?;
        }
        for (i, (a, b)) in self.blocks.iter_mut().zip(other.iter()).enumerate() {
            accumulate(a, b, alpha, &format!("block {}", i))?;
        }
        Ok(())
    }

    /// `+=`
    pub fn add_in_place(&mut self, other: &BlockVec) -> BlockResult<()> {
        self.add_scaled(1.0, other)
    }

    /// `-=`
    pub fn sub_in_place(&mut self, other: &BlockVec) -> BlockResult<()> {
        self.add_scaled(-1.0, other)
    }

    pub fn scaled(&self, factor: f64) -> BlockResult<BlockVec> {
        let mut out = Vec::with_capacity(self.len());
        for (i, slot) in self.iter().enumerate() {
            if slot.is_empty() {
                out.push(Operand::Empty);
                continue;
            }
            match scalar_mult(factor, slot)? {
                Action::Applied(v) => out.push(v),
                Action::NotApplicable => {
                    return Err(BlockError::UnsupportedOperand(format!(
                        "block {} holds {}, not a vector",
                        i, slot
                    )));
                }
            }
        }
        Ok(BlockVec::from_vec(out))
    }

    pub fn inner(&self, other: &BlockVec) -> BlockResult<f64> {
        if self.len() != other.len() {
            return Err(BlockError::dimension("inner product", self.len(), other.len()));
        }
        let mut sum = 0.0;
        for (i, (a, b)) in self.iter().zip(other.iter()).enumerate() {
            sum += match (a, b) {
                (Operand::Vector(a), Operand::Vector(b)) => a.dot(&**b)?,
                (Operand::BlockVec(a), Operand::BlockVec(b)) => a.inner(b)?,
                (Operand::Scalar(a), Operand::Scalar(b)) => a * b,
                (Operand::Empty, _) | (_, Operand::Empty) => {
                    return Err(BlockError::Configuration(format!(
                        "block {} is not allocated",
                        i
                    )));
                }
                (a, b) => {
                    return Err(BlockError::UnsupportedOperand(format!(
                        "inner product of {} and {} in block {}",
                        a, b, i
                    )));
                }
            };
        }
        Ok(sum)
    }

    pub fn norm(&self) -> BlockResult<f64> {
        Ok(self.inner(self)?.sqrt())
    }

    /// independent copy of every vector slot
    pub fn copy(&self) -> BlockVec {
        BlockVec::from_vec(self.iter().map(Operand::copy).collect())
    }

    /// all blocks concatenated
    pub fn to_DVector(&self) -> BlockResult<DVector<f64>> {
        let mut values = Vec::new();
        for (i, slot) in self.iter().enumerate() {
            match slot {
                Operand::Vector(v) => values.extend((0..v.len()).map(|k| v.get_val(k))),
                Operand::BlockVec(v) => values.extend(v.to_DVector()?.iter()),
                other => {
                    return Err(BlockError::Configuration(format!(
                        "block {} holds {}, call allocate() first",
                        i, other
                    )));
                }
            }
        }
        Ok(DVector::from_vec(values))
    }
}

fn fill_values(slot: &mut Operand, value: f64) {
    match slot {
        Operand::Vector(v) => with_unique_vector(v, |target| target.fill(value)),
        Operand::BlockVec(v) => {
            for inner in v.blocks.iter_mut() {
                fill_values(inner, value);
            }
        }
        _ => {}
    }
}

impl Index<usize> for BlockVec {
    type Output = Operand;
    fn index(&self, i: usize) -> &Operand {
        &self.blocks[(0, i)]
    }
}

impl fmt::Display for BlockVec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|b| b.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dv(values: &[f64]) -> Operand {
        Operand::vec(DVector::from_row_slice(values))
    }

    #[test]
    fn in_place_add_and_sub() {
        let mut a = BlockVec::from_vec(vec![dv(&[1.0, 2.0]), dv(&[3.0])]);
        let b = BlockVec::from_vec(vec![dv(&[1.0, 1.0]), dv(&[1.0])]);
        a.add_in_place(&b).unwrap();
        assert_relative_eq!(a.to_DVector().unwrap(), DVector::from_vec(vec![2.0, 3.0, 4.0]));
        a.sub_in_place(&b).unwrap();
        a.sub_in_place(&b).unwrap();
        assert_relative_eq!(a.to_DVector().unwrap(), DVector::from_vec(vec![0.0, 1.0, 2.0]));
        assert_relative_eq!(b.to_DVector().unwrap(), DVector::from_vec(vec![1.0, 1.0, 1.0]));
    }

    #[test]
    fn mismatched_slot_leaves_target_untouched() {
        let mut a = BlockVec::from_vec(vec![dv(&[1.0]), dv(&[1.0, 1.0])]);
        let b = BlockVec::from_vec(vec![dv(&[5.0]), dv(&[1.0])]);
        let err = a.add_in_place(&b).unwrap_err();
        assert_eq!(err, BlockError::dimension("block 1", 2, 1));
        assert_relative_eq!(a.to_DVector().unwrap(), DVector::from_vec(vec![1.0, 1.0, 1.0]));
        let c = BlockVec::new(3);
        assert!(matches!(
            a.add_in_place(&c),
            Err(BlockError::DimensionMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn incompatible_pairing_in_a_later_slot_writes_nothing() {
        let mut a = BlockVec::from_vec(vec![dv(&[1.0]), dv(&[1.0])]);
        let b = BlockVec::from_vec(vec![dv(&[5.0]), Operand::Scalar(2.0)]);
        assert!(matches!(
            a.add_in_place(&b),
            Err(BlockError::UnsupportedOperand(_))
        ));
        assert_relative_eq!(a.to_DVector().unwrap(), DVector::from_vec(vec![1.0, 1.0]));

        // nested block vectors are checked all the way down
        let inner = |values: &[f64]| Operand::BlockVec(BlockVec::from_vec(vec![dv(values)]));
        let mut c = BlockVec::from_vec(vec![dv(&[1.0]), inner(&[1.0, 1.0])]);
        let d = BlockVec::from_vec(vec![dv(&[5.0]), inner(&[1.0])]);
        assert_eq!(
            c.add_in_place(&d).unwrap_err(),
            BlockError::dimension("block 1.0", 2, 1)
        );
        assert_relative_eq!(c.to_DVector().unwrap(), DVector::from_vec(vec![1.0, 1.0, 1.0]));
    }

    #[test]
    fn empty_target_slot_takes_the_other_block() {
        let mut a = BlockVec::new(2);
        let b = BlockVec::from_vec(vec![dv(&[1.0, 2.0]), Operand::Empty]);
        a.sub_in_place(&b).unwrap();
        assert_relative_eq!(a[0].to_DVector().unwrap(), DVector::from_vec(vec![-1.0, -2.0]));
        assert!(a[1].is_empty());
        assert!(!a.is_allocated());
    }

    #[test]
    fn norms_and_inner_products() {
        let a = BlockVec::from_vec(vec![dv(&[3.0]), dv(&[4.0, 0.0])]);
        assert_relative_eq!(a.norm().unwrap(), 5.0);
        let b = a.scaled(2.0).unwrap();
        assert_relative_eq!(a.inner(&b).unwrap(), 50.0);
        let unallocated = BlockVec::new(2);
        assert!(matches!(
            a.inner(&unallocated),
            Err(BlockError::Configuration(_))
        ));
    }

    #[test]
    fn copy_is_deep() {
        let a = BlockVec::from_vec(vec![dv(&[1.0])]);
        let mut b = a.copy();
        b.add_in_place(&a).unwrap();
        assert_relative_eq!(a.to_DVector().unwrap()[0], 1.0);
        assert_relative_eq!(b.to_DVector().unwrap()[0], 2.0);
        assert_eq!(b.to_string(), "[<DVector 1>]");
    }
}
