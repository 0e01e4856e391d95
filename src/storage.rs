use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::{CommonResult, DicomError};

/// Flat directory of uploaded files, addressed by file name.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Storage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> CommonResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path for `file_name` inside the root. Only the final path component
    /// of the name is used, unchanged; names with surrounding whitespace are
    /// rejected.
    pub fn resolve(&self, file_name: &str) -> CommonResult<PathBuf> {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
        if base.is_empty() || base.trim() != base || base == "." || base == ".." {
            return Err(DicomError::InvalidFileName(file_name.to_string()));
        }
        Ok(self.root.join(base))
    }

    /// Writes `content` verbatim, replacing any file of the same name.
    pub fn store(&self, file_name: &str, content: &[u8]) -> CommonResult<PathBuf> {
        let path = self.resolve(file_name)?;
        fs::write(&path, content)?;
        info!(path = %path.display(), bytes = content.len(), "stored upload");
        Ok(path)
    }

    /// Path of an existing stored file; a missing one is a `NotFound` I/O error.
    pub fn locate(&self, file_name: &str) -> CommonResult<PathBuf> {
        let path = self.resolve(file_name)?;
        if !path.is_file() {
            return Err(DicomError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{file_name} is not stored"),
            )));
        }
        Ok(path)
    }
}
