//! Common test utilities for toolchain-backed tests
//!
//! Integration tests compile real shared libraries, so they need a working C
//! compiler. The fixture probes the toolchain once; when it is missing the
//! tests print a notice and return early instead of failing.
//!
//! # Usage
//!
//! ```ignore
//! #[test]
//! #[serial]
//! fn my_toolchain_test() {
//!     let Some(fixture) = common::toolchain_or_skip() else { return };
//!     let dir = common::create_temp_dir().unwrap();
//!     let options = CompilerOptions::new();
//!     let mut builder = fixture.builder(dir.path(), &options, RandomSeed::new(1));
//!     // ...
//! }
//! ```

#![allow(dead_code)]

mod tempfile_helpers;

use std::path::Path;

use kernelcheck::{CompilerOptions, MatMul2DLibBuilder, RandomSeed, Toolchain};
use once_cell::sync::Lazy;
pub use serial_test::serial;
pub use tempfile_helpers::*;

/// Shared toolchain probe, initialized once per test binary
pub static TOOLCHAIN_FIXTURE: Lazy<Option<ToolchainFixture>> = Lazy::new(|| {
    let toolchain = Toolchain::new();
    if !toolchain.is_available() {
        eprintln!(
            "WARNING: C compiler {:?} not runnable - skipping toolchain tests",
            toolchain.compiler()
        );
        eprintln!("Set CC to a working compiler to enable them");
        return None;
    }

    let has_disassembler = std::process::Command::new(toolchain.disassembler())
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);

    eprintln!(
        "Toolchain fixture: cc={} objdump={} ({})",
        toolchain.compiler(),
        toolchain.disassembler(),
        if has_disassembler { "available" } else { "missing" }
    );
    Some(ToolchainFixture {
        toolchain,
        has_disassembler,
    })
});

pub struct ToolchainFixture {
    toolchain: Toolchain,
    has_disassembler: bool,
}

impl ToolchainFixture {
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn has_disassembler(&self) -> bool {
        self.has_disassembler
    }

    /// Builder whose artifact lives at `<dir>/main_graph<suffix>`
    pub fn builder<'a>(
        &self,
        dir: &Path,
        options: &'a CompilerOptions,
        seed: RandomSeed,
    ) -> MatMul2DLibBuilder<'a> {
        MatMul2DLibBuilder::new(
            artifact_base(dir),
            options,
            self.toolchain.clone(),
            seed,
        )
    }
}

/// The fixture, or `None` after printing a skip notice
pub fn toolchain_or_skip() -> Option<&'static ToolchainFixture> {
    let fixture = TOOLCHAIN_FIXTURE.as_ref();
    if fixture.is_none() {
        eprintln!("skipped: no native toolchain");
    }
    fixture
}
