//! Native toolchain: the C compiler that turns generated models into shared
//! libraries, and the disassembler used for instruction checks.

use std::path::Path;
use std::process::Command;

use crate::compiler::CompilerOptions;
use crate::error::{HarnessError, HarnessResult};

/// Environment variable overriding the C compiler
pub const CC_ENV: &str = "CC";
/// Environment variable overriding the disassembler
pub const OBJDUMP_ENV: &str = "OBJDUMP";

const DEFAULT_CC: &str = "cc";
const DEFAULT_OBJDUMP: &str = "objdump";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    compiler: String,
    disassembler: String,
}

impl Default for Toolchain {
    /// Resolve tools from `CC` / `OBJDUMP`, falling back to `cc` / `objdump`
    fn default() -> Self {
        Toolchain {
            compiler: env_or(CC_ENV, DEFAULT_CC),
            disassembler: env_or(OBJDUMP_ENV, DEFAULT_OBJDUMP),
        }
    }
}

impl Toolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_disassembler(mut self, disassembler: impl Into<String>) -> Self {
        self.disassembler = disassembler.into();
        self
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    pub fn disassembler(&self) -> &str {
        &self.disassembler
    }

    /// True when the compiler can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.compiler)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Compile one C translation unit into a shared library
    pub fn compile_shared_library(
        &self,
        source: &Path,
        output: &Path,
        options: &CompilerOptions,
    ) -> HarnessResult<()> {
        let mut cmd = Command::new(&self.compiler);
        cmd.arg("-shared");
        if !cfg!(windows) {
            cmd.arg("-fPIC");
        }
        cmd.args(options.native_compiler_args())
            .arg(source)
            .arg("-o")
            .arg(output);

        tracing::debug!(command = ?cmd, "Invoking native compiler");

        let out = cmd.output().map_err(|e| {
            HarnessError::CompileFailed(format!("failed to run {}: {}", self.compiler, e))
        })?;

        if !out.status.success() {
            return Err(HarnessError::CompileFailed(format!(
                "{} exited with {}: {}",
                self.compiler,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        Ok(())
    }

    /// Disassemble an artifact and return the listing
    pub fn disassemble(&self, artifact: &Path) -> HarnessResult<String> {
        let out = Command::new(&self.disassembler)
            .arg("-d")
            .arg(artifact)
            .output()
            .map_err(|e| {
                HarnessError::InstructionCheckFailed(format!(
                    "failed to run {}: {}",
                    self.disassembler, e
                ))
            })?;

        if !out.status.success() {
            return Err(HarnessError::InstructionCheckFailed(format!(
                "{} exited with {}: {}",
                self.disassembler,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// True when `mnemonic` appears as a whole token in a disassembly listing
pub fn listing_contains_instruction(listing: &str, mnemonic: &str) -> bool {
    let wanted = mnemonic.trim();
    if wanted.is_empty() {
        return false;
    }
    listing.lines().any(|line| {
        line.split(|c: char| c.is_whitespace() || c == ',')
            .any(|token| token.eq_ignore_ascii_case(wanted))
    })
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
