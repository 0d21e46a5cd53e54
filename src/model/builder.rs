//! Staged model-library facade
//!
//! [`ModelLibBuilder`] is the narrow interface the campaign driver consumes.
//! Implementations may spawn a compiler, load a shared library, or generate
//! code in-process; the driver only relies on the stage contract:
//!
//! 1. `build` a model for a shape
//! 2. `compile_and_load` it into an executable artifact
//! 3. `check_instruction_from_env` (no-op when the variable is unset)
//! 4. `prepare_inputs` from the process-wide seed
//! 5. `run` the artifact
//! 6. `verify_outputs` against the reference

use rand::Rng;

use crate::error::{HarnessError, HarnessResult};
use crate::model::ShapeTriple;
use crate::seed::RandomSeed;
use crate::tensor::matmul::{compare_within_tolerance, reference_matmul, Comparison, Tolerance};

/// Row-major A (I x K) and B (K x J) for one configuration
#[derive(Debug, Clone, PartialEq)]
pub struct InputSet {
    shape: ShapeTriple,
    a: Vec<f32>,
    b: Vec<f32>,
}

impl InputSet {
    pub fn new(shape: ShapeTriple, a: Vec<f32>, b: Vec<f32>) -> HarnessResult<Self> {
        if a.len() != shape.a_len() || b.len() != shape.b_len() {
            return Err(HarnessError::InputPreparationFailed(format!(
                "A has {} elements and B has {}, {} needs {} and {}",
                a.len(),
                b.len(),
                shape,
                shape.a_len(),
                shape.b_len()
            )));
        }
        Ok(InputSet { shape, a, b })
    }

    /// Uniform values in [-1, 1) drawn from the seed's stream for `shape`
    pub fn generate(shape: ShapeTriple, seed: RandomSeed) -> Self {
        let mut rng = seed.input_rng(shape);
        let a = (0..shape.a_len())
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        let b = (0..shape.b_len())
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        InputSet { shape, a, b }
    }

    pub fn shape(&self) -> ShapeTriple {
        self.shape
    }

    pub fn a(&self) -> &[f32] {
        &self.a
    }

    pub fn b(&self) -> &[f32] {
        &self.b
    }
}

/// Staged build / compile / run interface for one model at a time
pub trait ModelLibBuilder {
    /// Construct the model for `shape`, discarding any previous configuration
    fn build(&mut self, shape: ShapeTriple) -> HarnessResult<()>;

    /// Compile the built model and load the resulting artifact
    fn compile_and_load(&mut self) -> HarnessResult<()>;

    /// Confirm `instruction` appears in the loaded artifact
    fn check_instruction(&self, instruction: &str) -> HarnessResult<()>;

    /// Generate deterministic inputs for the built shape
    fn prepare_inputs(&mut self) -> HarnessResult<()>;

    /// Execute the loaded artifact on the prepared inputs
    fn run(&mut self) -> HarnessResult<()>;

    fn inputs(&self) -> Option<&InputSet>;

    fn outputs(&self) -> Option<&[f32]>;

    fn tolerance(&self) -> Tolerance {
        Tolerance::default()
    }

    /// Check the instruction named by `env_var`; unset or empty means nothing to check
    fn check_instruction_from_env(&self, env_var: &str) -> HarnessResult<()> {
        match std::env::var(env_var) {
            Ok(instruction) if !instruction.trim().is_empty() => {
                tracing::debug!(
                    instruction = instruction.trim(),
                    "Checking instruction from {}",
                    env_var
                );
                self.check_instruction(instruction.trim())
            }
            _ => Ok(()),
        }
    }

    /// Compare the artifact's output with the reference over the same inputs
    fn verify_outputs(&self) -> HarnessResult<Comparison> {
        let inputs = self.inputs().ok_or_else(|| {
            HarnessError::VerificationMismatch("no inputs were prepared".to_string())
        })?;
        let outputs = self.outputs().ok_or_else(|| {
            HarnessError::VerificationMismatch("the artifact produced no output".to_string())
        })?;
        let reference = reference_matmul(inputs);
        compare_within_tolerance(outputs, &reference, self.tolerance())
    }
}
