//! Load-once registry of parsed build description files.
//!
//! Every `Kannafile` is read and parsed at most once per process; concurrent
//! callers for the same path block on the first caller's completion. Failures
//! are memoised exactly like successes, so a broken file is reported without
//! retrying I/O.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::ast::BuildFile;

/// A build description file failed to read or parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to load {path}: {reason}")]
pub struct LoadError {
    pub path: Utf8PathBuf,
    pub reason: String,
}

type Slot = Arc<OnceLock<Result<Arc<BuildFile>, LoadError>>>;

/// Content-addressed cache of parsed build files.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Mutex<HashMap<Utf8PathBuf, Slot>>,
}

impl FileRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the parsed representation of `path`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns the (memoised) [`LoadError`] when the file cannot be read or
    /// parsed.
    pub fn get_or_load(&self, path: &Utf8Path) -> Result<Arc<BuildFile>, LoadError> {
        let slot = {
            let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
            files.entry(path.to_owned()).or_default().clone()
        };
        slot.get_or_init(|| load(path)).clone()
    }

    /// Number of files requested so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn load(path: &Utf8Path) -> Result<Arc<BuildFile>, LoadError> {
    debug!(%path, "loading build file");
    let text = fs::read_to_string(path).map_err(|err| LoadError {
        path: path.to_owned(),
        reason: err.to_string(),
    })?;
    let parsed: BuildFile = serde_yml::from_str(&text).map_err(|err| LoadError {
        path: path.to_owned(),
        reason: err.to_string(),
    })?;
    Ok(Arc::new(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).expect("create");
        file.write_all(content.as_bytes()).expect("write");
        Utf8PathBuf::from_path_buf(path).expect("utf8 path")
    }

    #[test]
    fn loads_each_path_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "Kannafile", "targets:\n  - name: a\n    type: group\n");
        let registry = FileRegistry::new();

        let first = registry.get_or_load(&path).expect("load");
        let second = registry.get_or_load(&path).expect("load");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn memoises_failures_without_retrying() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "Kannafile", "targets: [nonsense");
        let registry = FileRegistry::new();

        let first = registry.get_or_load(&path).unwrap_err();
        // Repairing the file on disk must not change the memoised answer.
        fs::write(&path, "targets: []\n").expect("rewrite");
        let second = registry.get_or_load(&path).unwrap_err();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent")).expect("utf8 path");
        let err = FileRegistry::new().get_or_load(&path).unwrap_err();
        assert_eq!(err.path, path);
    }
}
