//! Hook for boundary conditions applied to an allocated block vector.
use crate::block::block_error::{BlockError, BlockResult};
use crate::block::block_vec::BlockVec;
use crate::block::operand::{Operand, with_unique_vector};
use log::debug;

pub trait BlockBC {
    fn apply(&self, x: &mut BlockVec) -> BlockResult<()>;
}

/// Overrides listed entries: (block, index within block, value). Zeroing is
/// overriding with 0.
#[derive(Debug, Clone, Default)]
pub struct FixedEntries {
    entries: Vec<(usize, usize, f64)>,
}

impl FixedEntries {
    pub fn new() -> Self {
        FixedEntries::default()
    }

    pub fn fix(mut self, block: usize, index: usize, value: f64) -> Self {
        self.entries.push((block, index, value));
        self
    }

    /// homogeneous (zero) conditions on `indices` of one block
    pub fn homogeneous(block: usize, indices: &[usize]) -> Self {
        FixedEntries {
            entries: indices.iter().map(|&k| (block, k, 0.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BlockBC for FixedEntries {
    fn apply(&self, x: &mut BlockVec) -> BlockResult<()> {
        // validate everything first so a bad entry leaves x untouched
        for &(block, index, _) in &self.entries {
            match x.get(block)? {
                Operand::Vector(v) if index < v.len() => {}
                Operand::Vector(v) => {
                    return Err(BlockError::IndexOutOfBounds {
                        index: (block, index),
                        shape: (x.len(), v.len()),
                    });
                }
                other => {
                    return Err(BlockError::Configuration(format!(
                        "boundary condition on block {} which holds {}, call allocate() first",
                        block, other
                    )));
                }
            }
        }
        for &(block, index, value) in &self.entries {
            if let Operand::Vector(v) = x.get_mut(block)? {
                with_unique_vector(v, |target| target.set_val(index, value));
            }
        }
        debug!("{} fixed entries applied", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    #[test]
    fn fixed_entries_override_values() {
        let shared = Operand::vec(DVector::from_vec(vec![1.0, 2.0, 3.0]));
        let mut x = BlockVec::from_vec(vec![shared.clone(), Operand::vec(DVector::from_vec(vec![4.0]))]);
        let bc = FixedEntries::homogeneous(0, &[0, 2]).fix(1, 0, -1.0);
        assert_eq!(bc.len(), 3);
        bc.apply(&mut x).unwrap();
        assert_relative_eq!(x.to_DVector().unwrap(), DVector::from_vec(vec![0.0, 2.0, 0.0, -1.0]));
        // the operand we started from is not touched
        assert_relative_eq!(shared.to_DVector().unwrap(), DVector::from_vec(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn bad_entries_are_reported_before_writing() {
        let mut x = BlockVec::from_vec(vec![Operand::vec(DVector::from_vec(vec![1.0])), Operand::Empty]);
        let out_of_range = FixedEntries::new().fix(0, 0, 5.0).fix(0, 3, 0.0);
        assert_eq!(
            out_of_range.apply(&mut x),
            Err(BlockError::IndexOutOfBounds {
                index: (0, 3),
                shape: (2, 1)
            })
        );
        assert_relative_eq!(x[0].to_DVector().unwrap()[0], 1.0);
        let unallocated = FixedEntries::new().fix(1, 0, 0.0);
        assert!(matches!(
            unallocated.apply(&mut x),
            Err(BlockError::Configuration(_))
        ));
    }
}
