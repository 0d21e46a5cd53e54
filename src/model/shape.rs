//! Shape of one matmul test configuration

use std::fmt;

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};

/// Dimensions of `C[I,J] = A[I,K] * B[K,J]`
///
/// All three dimensions are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ShapeTriple {
    i: usize,
    j: usize,
    k: usize,
}

impl ShapeTriple {
    pub fn new(i: usize, j: usize, k: usize) -> HarnessResult<Self> {
        if i == 0 || j == 0 || k == 0 {
            return Err(HarnessError::InvalidShape(format!(
                "i={}, j={}, k={} (all must be >= 1)",
                i, j, k
            )));
        }
        Ok(Self { i, j, k })
    }

    /// Constructor for callers that already guarantee positive dimensions
    pub(crate) fn from_positive(i: usize, j: usize, k: usize) -> Self {
        debug_assert!(i >= 1 && j >= 1 && k >= 1);
        Self { i, j, k }
    }

    pub fn i(&self) -> usize {
        self.i
    }

    pub fn j(&self) -> usize {
        self.j
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Element count of A (I x K)
    pub fn a_len(&self) -> usize {
        self.i * self.k
    }

    /// Element count of B (K x J)
    pub fn b_len(&self) -> usize {
        self.k * self.j
    }

    /// Element count of C (I x J)
    pub fn c_len(&self) -> usize {
        self.i * self.j
    }

    /// True when any dimension is 1
    pub fn is_degenerate(&self) -> bool {
        self.i == 1 || self.j == 1 || self.k == 1
    }

    /// Largest of the three dimensions
    pub fn max_dim(&self) -> usize {
        self.i.max(self.j).max(self.k)
    }
}

impl fmt::Display for ShapeTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(I={}, J={}, K={})", self.i, self.j, self.k)
    }
}
