//! Harness configuration
//!
//! Test-only knobs that sit next to the compiler options: where the artifact
//! lives, how many random cases each campaign draws, the exhaustive bound,
//! and which environment variables name the seed and expected instruction.

use std::path::PathBuf;

use crate::campaign::strategy::Campaign;
use crate::error::{HarnessError, HarnessResult};
use crate::model::matmul2d::MAX_DIMENSION;
use crate::seed::DEFAULT_SEED_ENV;
use crate::tensor::matmul::Tolerance;

pub const DEFAULT_BASE_PATH: &str = "./TestMatMul2D_main_graph";
pub const DEFAULT_INSTRUCTION_ENV: &str = "TestMatMul2DNNPA_INSTRUCTION";
pub const DEFAULT_NUM_CASES: usize = 100;
pub const DEFAULT_EXHAUSTIVE_BOUND: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub base_path: PathBuf,
    pub num_cases: usize,
    pub exhaustive_bound: usize,
    pub seed_env: String,
    pub instruction_env: String,
    pub tolerance: Tolerance,
    /// Constant added to every compiled output; nonzero only for negative controls
    pub output_perturbation: f32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
            num_cases: DEFAULT_NUM_CASES,
            exhaustive_bound: DEFAULT_EXHAUSTIVE_BOUND,
            seed_env: DEFAULT_SEED_ENV.to_string(),
            instruction_env: DEFAULT_INSTRUCTION_ENV.to_string(),
            tolerance: Tolerance::default(),
            output_perturbation: 0.0,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_num_cases(mut self, num_cases: usize) -> Self {
        self.num_cases = num_cases;
        self
    }

    pub fn with_exhaustive_bound(mut self, bound: usize) -> Self {
        self.exhaustive_bound = bound;
        self
    }

    pub fn with_seed_env(mut self, var: impl Into<String>) -> Self {
        self.seed_env = var.into();
        self
    }

    pub fn with_instruction_env(mut self, var: impl Into<String>) -> Self {
        self.instruction_env = var.into();
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_output_perturbation(mut self, offset: f32) -> Self {
        self.output_perturbation = offset;
        self
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(HarnessError::InvalidConfiguration(
                "artifact base path must not be empty".to_string(),
            ));
        }
        if self.base_path.file_name().is_none() {
            return Err(HarnessError::InvalidConfiguration(format!(
                "artifact base path {} does not name a file",
                self.base_path.display()
            )));
        }
        if self.exhaustive_bound > MAX_DIMENSION {
            return Err(HarnessError::InvalidConfiguration(format!(
                "exhaustive bound {} exceeds {}",
                self.exhaustive_bound, MAX_DIMENSION
            )));
        }
        if self.seed_env.trim().is_empty() || self.instruction_env.trim().is_empty() {
            return Err(HarnessError::InvalidConfiguration(
                "environment variable names must not be empty".to_string(),
            ));
        }
        if !self.output_perturbation.is_finite() {
            return Err(HarnessError::InvalidConfiguration(format!(
                "output perturbation {} is not finite",
                self.output_perturbation
            )));
        }
        // Re-run the tolerance checks in case fields were set directly
        Tolerance::new(self.tolerance.atol, self.tolerance.rtol)?;
        Ok(())
    }

    /// The default campaign order: matrix-vector, matrix-matrix, exhaustive
    pub fn campaigns(&self) -> Vec<Campaign> {
        vec![
            Campaign::MATRIX_VECTOR,
            Campaign::MATRIX_MATRIX,
            Campaign::Exhaustive {
                bound: self.exhaustive_bound,
            },
        ]
    }

    /// Resolve a campaign from its command-line name
    pub fn campaign_by_name(&self, name: &str) -> HarnessResult<Campaign> {
        self.campaigns()
            .into_iter()
            .find(|c| c.name() == name.trim())
            .ok_or_else(|| {
                HarnessError::InvalidConfiguration(format!(
                    "unknown campaign {:?}; expected matrix-vector, matrix-matrix or exhaustive",
                    name
                ))
            })
    }
}
