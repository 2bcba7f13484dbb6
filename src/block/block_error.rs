//! Error types and the soft "not applicable" signal shared by every apply path.
use std::fmt;

/// Outcome of an apply attempt.
///
/// `NotApplicable` is not a failure: it tells the caller that this operand pairing
/// has no action here (for example an operator handed a vector of a foreign backend,
/// or an additive node handed something that is not a vector). Callers must check it
/// and propagate it upward without touching any output.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<T> {
    Applied(T),
    NotApplicable,
}

impl<T> Action<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Action::Applied(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Action<U> {
        match self {
            Action::Applied(value) => Action::Applied(f(value)),
            Action::NotApplicable => Action::NotApplicable,
        }
    }

    /// converts into Option, dropping the distinction between "not applicable" and "no value"
    pub fn applied(self) -> Option<T> {
        match self {
            Action::Applied(value) => Some(value),
            Action::NotApplicable => None,
        }
    }
}

/// Hard errors of the block engine. All of them point at a caller-side layout bug.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockError {
    /// vectors or blocks of unequal length were combined
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    /// slice assignment or construction with the wrong number of elements
    ShapeMismatch(String),
    /// (row, col) outside the fixed container shape
    IndexOutOfBounds {
        index: (usize, usize),
        shape: (usize, usize),
    },
    /// a capability method got a type it cannot extract data from
    UnsupportedOperand(String),
    /// block layout problem detected at first use (empty rows, unallocated vectors)
    Configuration(String),
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockError::DimensionMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "incompatible dimensions in {}: {}, was {}",
                context, found, expected
            ),
            BlockError::ShapeMismatch(msg) => write!(f, "shape mismatch: {}", msg),
            BlockError::IndexOutOfBounds { index, shape } => write!(
                f,
                "block index ({}, {}) out of range for shape ({}, {})",
                index.0, index.1, shape.0, shape.1
            ),
            BlockError::UnsupportedOperand(msg) => write!(f, "unsupported operand: {}", msg),
            BlockError::Configuration(msg) => write!(f, "block configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BlockError {}

pub type BlockResult<T> = Result<T, BlockError>;

impl BlockError {
    pub fn dimension(context: impl Into<String>, expected: usize, found: usize) -> Self {
        BlockError::DimensionMismatch {
            context: context.into(),
            expected,
            found,
        }
    }
}
