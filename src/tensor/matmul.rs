//! Reference matrix multiplication and tolerance comparison
//!
//! The reference is the plain O(m*n*k) triple loop in f32 with k ascending:
//! no blocking, no tiling, no reassociation. It must always be fed the same
//! [`InputSet`] that the compiled artifact consumed.

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};
use crate::model::InputSet;

/// Default absolute tolerance for f32 outputs
pub const DEFAULT_ATOL: f32 = 1e-5;
/// Default relative tolerance for f32 outputs
pub const DEFAULT_RTOL: f32 = 1e-5;

/// CPU reference matrix multiplication
///
/// A is m x k, B is k x n, both row-major; returns C (m x n, row-major).
pub fn cpu_matmul_f32(a: &[f32], b: &[f32], m: usize, n: usize, k: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];

    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for l in 0..k {
                sum += a[i * k + l] * b[l * n + j];
            }
            c[i * n + j] = sum;
        }
    }

    c
}

/// Reference result for a prepared input set
pub fn reference_matmul(inputs: &InputSet) -> Vec<f32> {
    let shape = inputs.shape();
    cpu_matmul_f32(inputs.a(), inputs.b(), shape.i(), shape.j(), shape.k())
}

/// Element-wise closeness: `|actual - expected| <= atol + rtol * |expected|`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tolerance {
    pub atol: f32,
    pub rtol: f32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            atol: DEFAULT_ATOL,
            rtol: DEFAULT_RTOL,
        }
    }
}

impl Tolerance {
    pub fn new(atol: f32, rtol: f32) -> HarnessResult<Self> {
        if !(atol.is_finite() && atol >= 0.0 && rtol.is_finite() && rtol >= 0.0) {
            return Err(HarnessError::InvalidConfiguration(format!(
                "tolerance must be finite and non-negative (atol={}, rtol={})",
                atol, rtol
            )));
        }
        Ok(Tolerance { atol, rtol })
    }

    /// NaN on either side is never close
    pub fn is_close(&self, actual: f32, expected: f32) -> bool {
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

/// Worst offending element of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mismatch {
    pub index: usize,
    pub actual: f32,
    pub expected: f32,
}

impl Mismatch {
    pub fn abs_diff(&self) -> f32 {
        (self.actual - self.expected).abs()
    }
}

/// Outcome of comparing a compiled output against the reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub checked: usize,
    pub mismatches: usize,
    pub worst: Option<Mismatch>,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compare two buffers element-wise
///
/// Returns the comparison on success and `VerificationMismatch` when lengths
/// differ or any element falls outside tolerance.
pub fn compare_within_tolerance(
    actual: &[f32],
    expected: &[f32],
    tolerance: Tolerance,
) -> HarnessResult<Comparison> {
    if actual.len() != expected.len() {
        return Err(HarnessError::VerificationMismatch(format!(
            "output has {} elements, reference has {}",
            actual.len(),
            expected.len()
        )));
    }

    let mut mismatches = 0;
    let mut worst: Option<Mismatch> = None;
    for (index, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        if tolerance.is_close(a, e) {
            continue;
        }
        mismatches += 1;
        let candidate = Mismatch {
            index,
            actual: a,
            expected: e,
        };
        // NaN differences rank above everything else
        let replace = match worst {
            None => true,
            Some(w) if w.abs_diff().is_nan() => false,
            Some(w) => candidate.abs_diff().is_nan() || candidate.abs_diff() > w.abs_diff(),
        };
        if replace {
            worst = Some(candidate);
        }
    }

    let comparison = Comparison {
        checked: actual.len(),
        mismatches,
        worst,
    };

    if let Some(w) = comparison.worst {
        return Err(HarnessError::VerificationMismatch(format!(
            "{} of {} elements outside tolerance (atol={}, rtol={}); worst at index {}: got {}, expected {}",
            comparison.mismatches,
            comparison.checked,
            tolerance.atol,
            tolerance.rtol,
            w.index,
            w.actual,
            w.expected
        )));
    }

    Ok(comparison)
}
