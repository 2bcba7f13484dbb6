//! Fixed-shape grid of blocks stored row-major. `BlockVec` is the 1 x n case,
//! `BlockMat` the m x n case.
use crate::block::block_error::{BlockError, BlockResult};
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockContainer<T> {
    shape: (usize, usize),
    blocks: Vec<T>,
}

impl<T: Clone + Default> BlockContainer<T> {
    /// every slot starts as `T::default()` (the empty slot)
    pub fn with_shape(rows: usize, cols: usize) -> Self {
        BlockContainer {
            shape: (rows, cols),
            blocks: vec![T::default(); rows * cols],
        }
    }

    /// shape is inferred from the nested collection, ragged rows are rejected
    pub fn from_rows(rows: Vec<Vec<T>>) -> BlockResult<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        let mut blocks = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != ncols {
                return Err(BlockError::ShapeMismatch(format!(
                    "row {} has {} blocks, row 0 has {}",
                    i,
                    row.len(),
                    ncols
                )));
            }
            blocks.extend(row);
        }
        Ok(BlockContainer {
            shape: (nrows, ncols),
            blocks,
        })
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        BlockContainer {
            shape: (1, items.len()),
            blocks: items,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn nrows(&self) -> usize {
        self.shape.0
    }

    pub fn ncols(&self) -> usize {
        self.shape.1
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn offset(&self, i: usize, j: usize) -> BlockResult<usize> {
        if i >= self.shape.0 || j >= self.shape.1 {
            return Err(BlockError::IndexOutOfBounds {
                index: (i, j),
                shape: self.shape,
            });
        }
        Ok(i * self.shape.1 + j)
    }

    pub fn get(&self, i: usize, j: usize) -> BlockResult<&T> {
        let k = self.offset(i, j)?;
        Ok(&self.blocks[k])
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> BlockResult<&mut T> {
        let k = self.offset(i, j)?;
        Ok(&mut self.blocks[k])
    }

    /// stores `value` as is, nothing is copied
    pub fn set(&mut self, i: usize, j: usize, value: T) -> BlockResult<()> {
        let k = self.offset(i, j)?;
        self.blocks[k] = value;
        Ok(())
    }

    /// `container[:] = value`
    pub fn fill(&mut self, value: T) {
        for slot in self.blocks.iter_mut() {
            *slot = value.clone();
        }
    }

    /// `container[:] = items`, element by element in row-major order
    pub fn assign_from<I: IntoIterator<Item = T>>(&mut self, items: I) -> BlockResult<()> {
        let items: Vec<T> = items.into_iter().collect();
        if items.len() != self.blocks.len() {
            return Err(BlockError::ShapeMismatch(format!(
                "can't assign {} blocks to a container of shape ({}, {})",
                items.len(),
                self.shape.0,
                self.shape.1
            )));
        }
        self.blocks = items;
        Ok(())
    }

    pub fn row(&self, i: usize) -> BlockResult<&[T]> {
        if i >= self.shape.0 {
            return Err(BlockError::IndexOutOfBounds {
                index: (i, 0),
                shape: self.shape,
            });
        }
        let start = i * self.shape.1;
        Ok(&self.blocks[start..start + self.shape.1])
    }

    pub fn column(&self, j: usize) -> BlockResult<Vec<&T>> {
        if j >= self.shape.1 {
            return Err(BlockError::IndexOutOfBounds {
                index: (0, j),
                shape: self.shape,
            });
        }
        Ok(self.blocks.iter().skip(j).step_by(self.shape.1).collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.blocks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.blocks.iter_mut()
    }

    /// ((i, j), block) in row-major order
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let ncols = self.shape.1.max(1);
        self.blocks
            .iter()
            .enumerate()
            .map(move |(k, b)| ((k / ncols, k % ncols), b))
    }
}

impl<T> Index<(usize, usize)> for BlockContainer<T> {
    type Output = T;
    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(i < self.shape.0 && j < self.shape.1, "block index out of range");
        &self.blocks[i * self.shape.1 + j]
    }
}

impl<T> IndexMut<(usize, usize)> for BlockContainer<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(i < self.shape.0 && j < self.shape.1, "block index out of range");
        &mut self.blocks[i * self.shape.1 + j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_inferred_from_rows() {
        let c = BlockContainer::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(c.shape(), (2, 3));
        assert_eq!(*c.get(1, 2).unwrap(), 6.0);
        assert_eq!(c.row(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(c.column(1).unwrap(), vec![&2.0, &5.0]);
        let order: Vec<f64> = c.iter().copied().collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let c = BlockContainer::from_rows(vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(c, Err(BlockError::ShapeMismatch(_))));
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut c: BlockContainer<f64> = BlockContainer::with_shape(2, 2);
        assert_eq!(
            c.set(2, 0, 1.0),
            Err(BlockError::IndexOutOfBounds {
                index: (2, 0),
                shape: (2, 2)
            })
        );
        assert!(c.get(0, 5).is_err());
        assert!(c.row(3).is_err());
    }

    #[test]
    fn broadcast_and_slice_assignment() {
        let mut c: BlockContainer<f64> = BlockContainer::with_shape(2, 2);
        c.fill(7.0);
        assert!(c.iter().all(|v| *v == 7.0));
        c.assign_from(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(c[(1, 0)], 3.0);
        assert!(matches!(
            c.assign_from(vec![1.0, 2.0]),
            Err(BlockError::ShapeMismatch(_))
        ));
        // a failed assignment leaves the slots untouched
        assert_eq!(c[(1, 1)], 4.0);
    }

    #[test]
    fn equality_is_slotwise() {
        let a = BlockContainer::from_vec(vec![1, 2, 3]);
        let mut b: BlockContainer<i32> = BlockContainer::with_shape(1, 3);
        b.assign_from(1..=3).unwrap();
        assert_eq!(a, b);
        let idx: Vec<(usize, usize)> = a.indexed_iter().map(|(ij, _)| ij).collect();
        assert_eq!(idx, vec![(0, 0), (0, 1), (0, 2)]);
    }
}
