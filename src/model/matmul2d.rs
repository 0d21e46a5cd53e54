//! Matmul model library builder backed by the native C toolchain
//!
//! Each configuration is emitted as C source, compiled into a shared library
//! at `<base><DLL_SUFFIX>`, and loaded in-process. Every configuration reuses
//! the same artifact path, so the previous library is unloaded and its file
//! removed before the next compile writes over it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::backend::{target_filename, CompiledArtifact};
use crate::compiler::toolchain::listing_contains_instruction;
use crate::compiler::{CompilerOptions, Toolchain};
use crate::error::{io_context, HarnessError, HarnessResult};
use crate::model::{InputSet, MatMulModel, ModelLibBuilder, ShapeTriple};
use crate::seed::RandomSeed;
use crate::tensor::matmul::Tolerance;

/// Largest dimension accepted by `build`
pub const MAX_DIMENSION: usize = 10_000;

pub struct MatMul2DLibBuilder<'a> {
    base_path: PathBuf,
    options: &'a CompilerOptions,
    toolchain: Toolchain,
    seed: RandomSeed,
    tolerance: Tolerance,
    output_offset: f32,
    model: Option<MatMulModel>,
    artifact: Option<CompiledArtifact>,
    inputs: Option<InputSet>,
    outputs: Option<Vec<f32>>,
}

impl<'a> MatMul2DLibBuilder<'a> {
    pub fn new(
        base_path: impl Into<PathBuf>,
        options: &'a CompilerOptions,
        toolchain: Toolchain,
        seed: RandomSeed,
    ) -> Self {
        MatMul2DLibBuilder {
            base_path: base_path.into(),
            options,
            toolchain,
            seed,
            tolerance: Tolerance::default(),
            output_offset: 0.0,
            model: None,
            artifact: None,
            inputs: None,
            outputs: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Perturb every compiled output by a constant (negative control)
    pub fn with_output_offset(mut self, offset: f32) -> Self {
        self.output_offset = offset;
        self
    }

    pub fn artifact_path(&self) -> PathBuf {
        target_filename(&self.base_path)
    }

    pub fn source_path(&self) -> PathBuf {
        let mut name = OsString::from(self.base_path.as_os_str());
        name.push(".c");
        PathBuf::from(name)
    }

    pub fn model(&self) -> Option<&MatMulModel> {
        self.model.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.artifact.is_some()
    }

    fn built_model(&self, stage_error: fn(String) -> HarnessError) -> HarnessResult<MatMulModel> {
        self.model
            .ok_or_else(|| stage_error("no model has been built".to_string()))
    }

    fn compile(&self, model: &MatMulModel, source: &Path, artifact: &Path) -> HarnessResult<()> {
        if let Some(parent) = artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| io_context(e, "creating artifact directory"))
                .map_err(|e| HarnessError::CompileFailed(e.to_string()))?;
        }

        // A fresh inode keeps the loader from handing back a stale mapping
        remove_if_present(artifact).map_err(|e| HarnessError::CompileFailed(e.to_string()))?;

        std::fs::write(source, model.emit_c())
            .map_err(|e| io_context(e, "writing generated source"))
            .map_err(|e| HarnessError::CompileFailed(e.to_string()))?;

        let compiled = self
            .toolchain
            .compile_shared_library(source, artifact, self.options);

        if !self.options.preserve_source() {
            if let Err(e) = remove_if_present(source) {
                tracing::warn!(
                    path = %source.display(),
                    error = %e,
                    "Failed to remove generated source"
                );
            }
        }

        compiled
    }
}

impl ModelLibBuilder for MatMul2DLibBuilder<'_> {
    fn build(&mut self, shape: ShapeTriple) -> HarnessResult<()> {
        self.artifact = None;
        self.inputs = None;
        self.outputs = None;
        self.model = None;

        if shape.max_dim() > MAX_DIMENSION {
            return Err(HarnessError::BuildFailed(format!(
                "{} exceeds the maximum dimension {}",
                shape, MAX_DIMENSION
            )));
        }
        if !self.output_offset.is_finite() {
            return Err(HarnessError::BuildFailed(format!(
                "output offset {} is not finite",
                self.output_offset
            )));
        }

        self.model = Some(MatMulModel::new(shape).with_output_offset(self.output_offset));
        Ok(())
    }

    fn compile_and_load(&mut self) -> HarnessResult<()> {
        let model = self.built_model(HarnessError::CompileFailed)?;

        // Unmap the previous library before its file is replaced
        self.artifact = None;

        let artifact_path = self.artifact_path();
        let source_path = self.source_path();
        self.compile(&model, &source_path, &artifact_path)?;

        self.artifact = Some(CompiledArtifact::load(&artifact_path, model.shape())?);
        Ok(())
    }

    fn check_instruction(&self, instruction: &str) -> HarnessResult<()> {
        let artifact = self.artifact.as_ref().ok_or_else(|| {
            HarnessError::InstructionCheckFailed("no artifact is loaded".to_string())
        })?;

        let listing = self.toolchain.disassemble(artifact.path())?;
        if listing_contains_instruction(&listing, instruction) {
            tracing::debug!(instruction, "Instruction found in artifact");
            Ok(())
        } else {
            Err(HarnessError::InstructionNotFound {
                instruction: instruction.to_string(),
                artifact: artifact.path().display().to_string(),
            })
        }
    }

    fn prepare_inputs(&mut self) -> HarnessResult<()> {
        let model = self.built_model(HarnessError::InputPreparationFailed)?;
        self.inputs = Some(InputSet::generate(model.shape(), self.seed));
        self.outputs = None;
        Ok(())
    }

    fn run(&mut self) -> HarnessResult<()> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| HarnessError::ExecutionFailed("no artifact is loaded".to_string()))?;
        let inputs = self
            .inputs
            .as_ref()
            .ok_or_else(|| HarnessError::ExecutionFailed("no inputs were prepared".to_string()))?;

        let mut c = vec![0.0f32; inputs.shape().c_len()];
        artifact.run(inputs.a(), inputs.b(), &mut c)?;
        self.outputs = Some(c);
        Ok(())
    }

    fn inputs(&self) -> Option<&InputSet> {
        self.inputs.as_ref()
    }

    fn outputs(&self) -> Option<&[f32]> {
        self.outputs.as_deref()
    }

    fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}

fn remove_if_present(path: &Path) -> HarnessResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_context(e, &format!("removing {}", path.display()))),
    }
}
