//! kernelcheck - correctness harness for compiled matrix multiplication kernels
//!
//! Drives an ahead-of-time compiled `C[I,J] = A[I,K] * B[K,J]` kernel through
//! build, compile, load, run and verify stages, and checks every output against
//! a naive CPU reference over randomly sampled and exhaustively enumerated shapes.

#![allow(clippy::needless_range_loop)] // Index loops mirror the matmul definition
#![allow(clippy::new_without_default)]

pub mod backend;
pub mod campaign;
pub mod compiler;
pub mod error;
pub mod logging;
pub mod model;
pub mod seed;
pub mod tensor;

pub use backend::{target_filename, ArtifactRemover, CompiledArtifact};
pub use campaign::{Campaign, CampaignDriver, CampaignReport, HarnessConfig, RunSummary, TestResult};
pub use compiler::{CompilerOptions, OptLevel, OptionKind, Toolchain};
pub use error::{ErrorCategory, HarnessError, HarnessResult, Stage};
pub use model::{InputSet, MatMul2DLibBuilder, ModelLibBuilder, ShapeTriple};
pub use seed::RandomSeed;
pub use tensor::matmul::{cpu_matmul_f32, Tolerance};
