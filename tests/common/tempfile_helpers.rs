//! Temporary directories for artifacts produced by tests

use anyhow::Context;
use std::path::{Path, PathBuf};

/// Create a temp directory with a helpful error message.
pub fn create_temp_dir() -> anyhow::Result<tempfile::TempDir> {
    tempfile::tempdir().context("Failed to create temporary directory for test")
}

/// Artifact base path inside `dir`, without the shared library suffix
pub fn artifact_base(dir: &Path) -> PathBuf {
    dir.join("main_graph")
}

/// Files left in `dir`, sorted by name
pub fn remaining_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

pub use tempfile::TempDir;
