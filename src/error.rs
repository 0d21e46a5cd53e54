//! Unified error handling for kernelcheck
//!
//! Every stage of a configuration run (build, compile/load, instruction check,
//! input preparation, execution, verification) reports failures through
//! [`HarnessError`]. Errors can be categorized via [`HarnessError::category`]
//! and mapped back to the [`Stage`] that produced them.

use std::fmt;

use serde::Serialize;

use crate::model::ShapeTriple;

/// Stages of a single configuration run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    CompileAndLoad,
    InstructionCheck,
    PrepareInputs,
    Run,
    Verify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::CompileAndLoad => "compile_and_load",
            Stage::InstructionCheck => "instruction_check",
            Stage::PrepareInputs => "prepare_inputs",
            Stage::Run => "run",
            Stage::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for kernelcheck
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    // ========== Build Errors ==========
    /// Shape triple violates I, J, K >= 1
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Model could not be constructed for the requested shape
    #[error("Model build failed: {0}")]
    BuildFailed(String),

    // ========== Compile / Load Errors ==========
    /// Native compiler could not be run or rejected the generated source
    #[error("Compilation failed: {0}")]
    CompileFailed(String),

    /// Compiled artifact could not be loaded or does not match the built model
    #[error("Artifact loading failed: {0}")]
    LoadFailed(String),

    // ========== Instruction Check Errors ==========
    /// Expected instruction is absent from the compiled artifact
    #[error("Instruction '{instruction}' not found in {artifact}")]
    InstructionNotFound { instruction: String, artifact: String },

    /// Artifact could not be inspected
    #[error("Instruction check failed: {0}")]
    InstructionCheckFailed(String),

    // ========== Input / Execution Errors ==========
    #[error("Input preparation failed: {0}")]
    InputPreparationFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    // ========== Verification Errors ==========
    /// Compiled output differs from the reference beyond tolerance
    #[error("Verification mismatch: {0}")]
    VerificationMismatch(String),

    // ========== Campaign Errors ==========
    /// A random campaign stopped at its first failing configuration
    #[error("{campaign} campaign failed at {shape} during {stage}: {reason}")]
    CampaignFailed {
        campaign: String,
        shape: ShapeTriple,
        stage: Stage,
        reason: String,
    },

    /// The exhaustive sweep found a counterexample; always fatal
    #[error("exhaustive campaign counterexample at {shape} during {stage}: {reason}")]
    ExhaustiveCounterexample {
        shape: ShapeTriple,
        stage: Stage,
        reason: String,
    },

    // ========== Configuration / I/O Errors ==========
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl HarnessError {
    /// Stage this error belongs to, if it is a stage-level failure
    pub fn stage(&self) -> Option<Stage> {
        match self {
            HarnessError::InvalidShape(_) | HarnessError::BuildFailed(_) => Some(Stage::Build),
            HarnessError::CompileFailed(_) | HarnessError::LoadFailed(_) => {
                Some(Stage::CompileAndLoad)
            }
            HarnessError::InstructionNotFound { .. } | HarnessError::InstructionCheckFailed(_) => {
                Some(Stage::InstructionCheck)
            }
            HarnessError::InputPreparationFailed(_) => Some(Stage::PrepareInputs),
            HarnessError::ExecutionFailed(_) => Some(Stage::Run),
            HarnessError::VerificationMismatch(_) => Some(Stage::Verify),
            HarnessError::CampaignFailed { stage, .. }
            | HarnessError::ExhaustiveCounterexample { stage, .. } => Some(*stage),
            HarnessError::InvalidConfiguration(_)
            | HarnessError::IoError(_)
            | HarnessError::SerializationError(_) => None,
        }
    }

    /// Categorize the error for reporting decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::InvalidShape(_) | HarnessError::BuildFailed(_) => ErrorCategory::Shape,

            HarnessError::CompileFailed(_)
            | HarnessError::InstructionNotFound { .. }
            | HarnessError::InstructionCheckFailed(_) => ErrorCategory::Toolchain,

            HarnessError::LoadFailed(_)
            | HarnessError::InputPreparationFailed(_)
            | HarnessError::ExecutionFailed(_) => ErrorCategory::Artifact,

            HarnessError::VerificationMismatch(_)
            | HarnessError::CampaignFailed { .. }
            | HarnessError::ExhaustiveCounterexample { .. } => ErrorCategory::Numeric,

            HarnessError::InvalidConfiguration(_) => ErrorCategory::Configuration,

            HarnessError::IoError(_) | HarnessError::SerializationError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Fatal errors terminate the whole run, not just the current campaign
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::ExhaustiveCounterexample { .. })
    }
}

/// Error category for reporting decisions
///
/// - Shape: the configuration itself cannot be built
/// - Toolchain: native compiler or disassembler problems
/// - Artifact: the compiled library misbehaves when loaded or run
/// - Numeric: the kernel produced wrong numbers
/// - Configuration: invalid flags or environment
/// - Internal: I/O and serialization problems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Shape,
    Toolchain,
    Artifact,
    Numeric,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Shape => write!(f, "Shape"),
            ErrorCategory::Toolchain => write!(f, "Toolchain"),
            ErrorCategory::Artifact => write!(f, "Artifact"),
            ErrorCategory::Numeric => write!(f, "Numeric"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Result alias used throughout the crate
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Wrap an IO error with context
///
/// # Examples
/// ```ignore
/// std::fs::write(&path, src).map_err(|e| io_context(e, "writing generated source"))?;
/// ```
pub fn io_context(err: std::io::Error, msg: &str) -> HarnessError {
    HarnessError::IoError(std::io::Error::new(err.kind(), format!("{}: {}", msg, err)))
}
