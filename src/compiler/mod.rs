//! Compiler option surface and native toolchain invocation

pub mod options;
pub mod toolchain;

pub use options::{CompilerOptions, OptLevel, OptionKind};
pub use toolchain::Toolchain;
