//! Compiler options
//!
//! [`CompilerOptions`] is an immutable value built once at process start and
//! passed by reference into the model builder. Options are set by
//! [`OptionKind`] with string values, the same way a flag registry receives
//! them, and read back as the flag strings the compiler would see.

use std::fmt;

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};

/// Optimization levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum OptLevel {
    /// Optimization level 0 (default)
    #[default]
    O0,
    O1,
    O2,
    O3,
}

impl OptLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(OptLevel::O0),
            1 => Some(OptLevel::O1),
            2 => Some(OptLevel::O2),
            3 => Some(OptLevel::O3),
            _ => None,
        }
    }

    /// Parse a numeric level in 0..=3
    pub fn parse(value: &str) -> HarnessResult<Self> {
        value
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::from_level)
            .ok_or_else(|| {
                HarnessError::InvalidConfiguration(format!(
                    "optimization level must be 0, 1, 2 or 3, got {:?}",
                    value
                ))
            })
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn as_flag(&self) -> &'static str {
        match self {
            OptLevel::O0 => "-O0",
            OptLevel::O1 => "-O1",
            OptLevel::O2 => "-O2",
            OptLevel::O3 => "-O3",
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

/// Option keys accepted by [`CompilerOptions::with_option`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    TargetTriple,
    TargetArch,
    TargetCpu,
    /// Accelerator to generate code for; "NONE" clears the list
    TargetAccel,
    CompilerOptLevel,
    /// Raw flags forwarded to the optimizer stage
    OptFlag,
    /// Raw flags forwarded to the code generator stage
    LlcFlag,
    /// Flags forwarded to both stages, each wrapped as `-mllvm <flag>`
    LlvmFlag,
}

/// Immutable compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    target_triple: Option<String>,
    target_arch: Option<String>,
    target_cpu: Option<String>,
    accelerators: Vec<String>,
    opt_level: OptLevel,
    xopt: Option<String>,
    xllc: Option<String>,
    mllvm: Option<String>,
    preserve_source: bool,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    /// Keep the generated source next to the artifact after compiling
    pub fn with_preserve_source(mut self, preserve: bool) -> Self {
        self.preserve_source = preserve;
        self
    }

    /// Set one option from its string value
    ///
    /// Empty values clear string options. Only the optimization level is
    /// validated here; target strings are passed through uninterpreted.
    pub fn with_option(mut self, kind: OptionKind, value: &str) -> HarnessResult<Self> {
        tracing::debug!(?kind, value, "Set compiler option");
        let text = non_empty(value);
        match kind {
            OptionKind::TargetTriple => self.target_triple = text,
            OptionKind::TargetArch => self.target_arch = text,
            OptionKind::TargetCpu => self.target_cpu = text,
            OptionKind::TargetAccel => match text {
                Some(accel) if accel.eq_ignore_ascii_case("NONE") => self.accelerators.clear(),
                Some(accel) => self.accelerators.push(accel),
                None => {}
            },
            OptionKind::CompilerOptLevel => self.opt_level = OptLevel::parse(value)?,
            OptionKind::OptFlag => self.xopt = text,
            OptionKind::LlcFlag => self.xllc = text,
            OptionKind::LlvmFlag => self.mllvm = text,
        }
        Ok(self)
    }

    /// Apply a list of options, stopping at the first invalid one
    pub fn with_options<I, S>(self, options: I) -> HarnessResult<Self>
    where
        I: IntoIterator<Item = (OptionKind, S)>,
        S: AsRef<str>,
    {
        options
            .into_iter()
            .try_fold(self, |opts, (kind, value)| opts.with_option(kind, value.as_ref()))
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    pub fn accelerators(&self) -> &[String] {
        &self.accelerators
    }

    pub fn preserve_source(&self) -> bool {
        self.preserve_source
    }

    /// Flag string for one option; empty when the option is unset
    pub fn option(&self, kind: OptionKind) -> String {
        match kind {
            OptionKind::TargetTriple => prefixed("--mtriple=", &self.target_triple),
            OptionKind::TargetArch => prefixed("--march=", &self.target_arch),
            OptionKind::TargetCpu => prefixed("--mcpu=", &self.target_cpu),
            OptionKind::TargetAccel => self
                .accelerators
                .iter()
                .map(|accel| format!("--maccel={}", accel))
                .collect::<Vec<_>>()
                .join(" "),
            OptionKind::CompilerOptLevel => self.opt_level.as_flag().to_string(),
            OptionKind::OptFlag => self.xopt.clone().unwrap_or_default(),
            OptionKind::LlcFlag => self.xllc.clone().unwrap_or_default(),
            OptionKind::LlvmFlag => self.mllvm.clone().unwrap_or_default(),
        }
    }

    /// Arguments handed to the native C compiler
    ///
    /// The accelerator list is informational only and never reaches the
    /// native compiler.
    pub fn native_compiler_args(&self) -> Vec<String> {
        let mut args = vec![self.opt_level.as_flag().to_string()];
        if let Some(triple) = &self.target_triple {
            args.push(format!("--target={}", triple));
        }
        if let Some(arch) = &self.target_arch {
            args.push(format!("-march={}", arch));
        }
        if let Some(cpu) = &self.target_cpu {
            args.push(format!("-mcpu={}", cpu));
        }
        for raw in [&self.xopt, &self.xllc].into_iter().flatten() {
            args.extend(raw.split_whitespace().map(str::to_string));
        }
        if let Some(mllvm) = &self.mllvm {
            for flag in mllvm.split_whitespace() {
                args.push("-mllvm".to_string());
                args.push(flag.to_string());
            }
        }
        args
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn prefixed(prefix: &str, value: &Option<String>) -> String {
    value
        .as_ref()
        .map(|v| format!("{}{}", prefix, v))
        .unwrap_or_default()
}
