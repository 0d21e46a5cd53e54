//! Compiled artifact wrapper and process-wide artifact remover

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{HarnessError, HarnessResult};
use crate::model::ShapeTriple;

/// Entry point exported by every compiled model
pub const ENTRY_POINT: &str = "run_main_graph";
/// Shape query exported by every compiled model
pub const SHAPE_QUERY: &str = "main_graph_shape";

type MainGraphFn = unsafe extern "C" fn(*const f32, *const f32, *mut f32);
type ShapeQueryFn = unsafe extern "C" fn(*mut i64);

/// Path of the shared library produced for a base name
///
/// Appends the platform suffix (`.so`, `.dylib` or `.dll`).
pub fn target_filename(base: impl AsRef<Path>) -> PathBuf {
    let mut name = OsString::from(base.as_ref().as_os_str());
    name.push(std::env::consts::DLL_SUFFIX);
    PathBuf::from(name)
}

/// A loaded shared library for one shape
///
/// Dropping the artifact unloads the library; the file itself is left for
/// [`ArtifactRemover`].
#[derive(Debug)]
pub struct CompiledArtifact {
    path: PathBuf,
    shape: ShapeTriple,
    library: Library,
}

impl CompiledArtifact {
    /// Load the library at `path` and confirm it was compiled for `expected`
    pub fn load(path: &Path, expected: ShapeTriple) -> HarnessResult<Self> {
        // SAFETY: the library is produced by our own code generator and has
        // no initialisers beyond the C runtime defaults.
        let library = unsafe { Library::new(path) }.map_err(|e| {
            HarnessError::LoadFailed(format!("failed to load '{}': {}", path.display(), e))
        })?;

        let artifact = CompiledArtifact {
            path: path.to_path_buf(),
            shape: expected,
            library,
        };

        // Resolve the entry point up front so a broken artifact fails at load
        artifact.entry_point()?;
        let reported = artifact.reported_shape()?;
        if reported != [expected.i() as i64, expected.j() as i64, expected.k() as i64] {
            return Err(HarnessError::LoadFailed(format!(
                "'{}' was compiled for i={}, j={}, k={}, expected {}",
                path.display(),
                reported[0],
                reported[1],
                reported[2],
                expected
            )));
        }

        tracing::debug!(path = %path.display(), shape = %expected, "Loaded artifact");
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shape(&self) -> ShapeTriple {
        self.shape
    }

    /// Execute the compiled kernel: `c = a * b`
    pub fn run(&self, a: &[f32], b: &[f32], c: &mut [f32]) -> HarnessResult<()> {
        let shape = self.shape;
        if a.len() != shape.a_len() || b.len() != shape.b_len() || c.len() != shape.c_len() {
            return Err(HarnessError::ExecutionFailed(format!(
                "buffer sizes a={}, b={}, c={} do not match {}",
                a.len(),
                b.len(),
                c.len(),
                shape
            )));
        }

        let entry = self
            .entry_point()
            .map_err(|e| HarnessError::ExecutionFailed(e.to_string()))?;

        // SAFETY: buffer lengths were checked against the shape the library
        // reported at load time, and the kernel only touches those extents.
        unsafe { (*entry)(a.as_ptr(), b.as_ptr(), c.as_mut_ptr()) };
        Ok(())
    }

    fn entry_point(&self) -> HarnessResult<Symbol<'_, MainGraphFn>> {
        // SAFETY: the symbol type matches the generated C signature.
        unsafe { self.library.get::<MainGraphFn>(symbol_name(ENTRY_POINT).as_slice()) }.map_err(
            |e| HarnessError::LoadFailed(format!("missing symbol '{}': {}", ENTRY_POINT, e)),
        )
    }

    fn reported_shape(&self) -> HarnessResult<[i64; 3]> {
        // SAFETY: the symbol type matches the generated C signature.
        let query = unsafe { self.library.get::<ShapeQueryFn>(symbol_name(SHAPE_QUERY).as_slice()) }
            .map_err(|e| {
                HarnessError::LoadFailed(format!("missing symbol '{}': {}", SHAPE_QUERY, e))
            })?;
        let mut dims = [0i64; 3];
        // SAFETY: the query writes exactly three int64 values.
        unsafe { (*query)(dims.as_mut_ptr()) };
        Ok(dims)
    }
}

impl Drop for CompiledArtifact {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path.display(), "Unloading artifact");
    }
}

fn symbol_name(name: &str) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// Removes the artifact file when dropped
///
/// Created once at process start for the shared artifact path, so the
/// file is deleted on normal return, early failure return, and panic unwind.
/// A missing file is not an error.
#[derive(Debug)]
pub struct ArtifactRemover {
    path: PathBuf,
    armed: bool,
}

impl ArtifactRemover {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ArtifactRemover {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file on drop
    pub fn keep(&mut self) {
        self.armed = false;
    }
}

impl Drop for ArtifactRemover {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove artifact"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_filename_appends_platform_suffix() {
        let path = target_filename("./TestMatMul2D_main_graph");
        let expected = format!("./TestMatMul2D_main_graph{}", std::env::consts::DLL_SUFFIX);
        assert_eq!(path, PathBuf::from(expected));
    }

    #[test]
    fn test_remover_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.so");
        std::fs::write(&path, b"stale").unwrap();

        {
            let _remover = ArtifactRemover::new(&path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_remover_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never_written.so");
        let remover = ArtifactRemover::new(&path);
        assert_eq!(remover.path(), path.as_path());
        drop(remover);
        assert!(!path.exists());
    }

    #[test]
    fn test_remover_runs_during_unwind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.so");
        std::fs::write(&path, b"stale").unwrap();

        let guarded = path.clone();
        let result = std::panic::catch_unwind(move || {
            let _remover = ArtifactRemover::new(guarded);
            panic!("configuration aborted");
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_disarms_remover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.so");
        std::fs::write(&path, b"keep me").unwrap();

        let mut remover = ArtifactRemover::new(&path);
        remover.keep();
        drop(remover);
        assert!(path.exists());
    }

    #[test]
    fn test_load_rejects_non_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("bogus{}", std::env::consts::DLL_SUFFIX));
        std::fs::write(&path, b"not a shared library").unwrap();

        let shape = ShapeTriple::new(1, 1, 1).unwrap();
        let result = CompiledArtifact::load(&path, shape);
        assert!(matches!(result, Err(HarnessError::LoadFailed(_))));
    }
}
