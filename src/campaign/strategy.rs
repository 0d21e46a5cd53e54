//! Shape sampling strategies
//!
//! Random profiles draw from the campaign generator in a fixed order
//! (I, then J when it is sampled, then K). The exhaustive sweep walks the
//! cube `[1, bound]^3` with I outermost and K innermost.

use std::fmt;
use std::ops::RangeInclusive;

use rand::Rng;
use serde::Serialize;

use crate::model::ShapeTriple;

/// Shape profiles for randomized campaigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomProfile {
    /// I in [4, 50], K in [4, 14], J = 1
    MatrixVector,
    /// I, J, K each in [1, 50]
    MatrixMatrix,
}

impl RandomProfile {
    pub const MATRIX_VECTOR_I: RangeInclusive<usize> = 4..=50;
    pub const MATRIX_VECTOR_K: RangeInclusive<usize> = 4..=14;
    pub const MATRIX_MATRIX_DIM: RangeInclusive<usize> = 1..=50;

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ShapeTriple {
        match self {
            RandomProfile::MatrixVector => {
                let i = rng.gen_range(Self::MATRIX_VECTOR_I);
                let k = rng.gen_range(Self::MATRIX_VECTOR_K);
                ShapeTriple::from_positive(i, 1, k)
            }
            RandomProfile::MatrixMatrix => {
                let i = rng.gen_range(Self::MATRIX_MATRIX_DIM);
                let j = rng.gen_range(Self::MATRIX_MATRIX_DIM);
                let k = rng.gen_range(Self::MATRIX_MATRIX_DIM);
                ShapeTriple::from_positive(i, j, k)
            }
        }
    }
}

/// One campaign: a sampling strategy plus its failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Campaign {
    /// Stops at the first failing configuration
    Random(RandomProfile),
    /// Sweeps every shape up to `bound`; any failure is fatal
    Exhaustive { bound: usize },
}

impl Campaign {
    pub const MATRIX_VECTOR: Campaign = Campaign::Random(RandomProfile::MatrixVector);
    pub const MATRIX_MATRIX: Campaign = Campaign::Random(RandomProfile::MatrixMatrix);

    /// Short identifier used on the command line and in reports
    pub fn name(&self) -> &'static str {
        match self {
            Campaign::Random(RandomProfile::MatrixVector) => "matrix-vector",
            Campaign::Random(RandomProfile::MatrixMatrix) => "matrix-matrix",
            Campaign::Exhaustive { .. } => "exhaustive",
        }
    }

    pub fn title(&self) -> String {
        match self {
            Campaign::Random(RandomProfile::MatrixVector) => {
                "Matrix-Vector multiplication on random shapes".to_string()
            }
            Campaign::Random(RandomProfile::MatrixMatrix) => {
                "Matrix-Matrix multiplication on random shapes".to_string()
            }
            Campaign::Exhaustive { bound } => {
                format!("Matrix-Matrix multiplication on all shapes up to {}", bound)
            }
        }
    }

    pub fn is_exhaustive(&self) -> bool {
        matches!(self, Campaign::Exhaustive { .. })
    }
}

impl fmt::Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ascending sweep over `[1, bound]^3`, K fastest
#[derive(Debug, Clone)]
pub struct ExhaustiveSweep {
    bound: usize,
    next: Option<(usize, usize, usize)>,
}

impl ExhaustiveSweep {
    pub fn new(bound: usize) -> Self {
        let next = if bound == 0 { None } else { Some((1, 1, 1)) };
        ExhaustiveSweep { bound, next }
    }

    /// Number of shapes the sweep visits in total
    pub fn total(&self) -> usize {
        self.bound.pow(3)
    }
}

impl Iterator for ExhaustiveSweep {
    type Item = ShapeTriple;

    fn next(&mut self) -> Option<ShapeTriple> {
        let (i, j, k) = self.next?;
        let bound = self.bound;

        self.next = if k < bound {
            Some((i, j, k + 1))
        } else if j < bound {
            Some((i, j + 1, 1))
        } else if i < bound {
            Some((i + 1, 1, 1))
        } else {
            None
        };

        Some(ShapeTriple::from_positive(i, j, k))
    }
}
