//! Shared persistence utilities: atomic file writes and checkpoint blobs.
//!
//! Every file the experiment produces (checkpoint, metrics table, evaluation
//! artifacts) goes through [`atomic_write`], so a crash mid-write never leaves
//! a truncated file at the final path.

use crate::error::{ExperimentError, Result};
use crate::model::ModelState;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling, then renames onto the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_sibling(path);
    std::fs::write(&tmp, data).map_err(|e| ExperimentError::io(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(ExperimentError::io(path, e));
    }
    Ok(())
}

/// Recursively create a directory.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| ExperimentError::io(dir, e))
}

/// Persist a model state as a binary checkpoint blob.
///
/// Returns the number of bytes written.
pub fn save_checkpoint(path: &Path, state: &ModelState) -> Result<u64> {
    let bytes = bincode::serialize(state)?;
    atomic_write(path, &bytes)?;
    Ok(bytes.len() as u64)
}

/// Load a model state previously written by [`save_checkpoint`].
pub fn load_checkpoint(path: &Path) -> Result<ModelState> {
    let bytes = std::fs::read(path).map_err(|e| ExperimentError::io(path, e))?;
    Ok(bincode::deserialize(&bytes)?)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("unnamed"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dir").join("blob.bin");

        atomic_write(&path, b"hello world").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_atomic_write_no_tmp_leftover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");

        atomic_write(&path, b"epoch\n0\n").unwrap();
        assert!(!dir.path().join("metrics.csv.tmp").exists());
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.pt");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_atomic_write_onto_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.pt");
        std::fs::create_dir_all(&path).unwrap();

        let err = atomic_write(&path, b"bytes").unwrap_err();
        assert!(matches!(err, ExperimentError::Io { .. }));
        assert!(!dir.path().join("model.pt.tmp").exists());
    }

    #[test]
    fn test_checkpoint_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train").join("model.pt");

        let mut state = ModelState::new();
        state.insert("weight", Tensor::from_vec(vec![2], vec![0.5, -1.0]).unwrap());
        state.insert("bias", Tensor::zeros(vec![1]));

        let written = save_checkpoint(&path, &state).unwrap();
        assert!(written > 0);
        assert_eq!(load_checkpoint(&path).unwrap(), state);
    }

    #[test]
    fn test_load_checkpoint_missing() {
        let err = load_checkpoint(Path::new("/nonexistent/model.pt")).unwrap_err();
        assert!(matches!(err, ExperimentError::Io { .. }));
    }
}
