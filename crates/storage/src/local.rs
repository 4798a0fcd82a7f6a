use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use elvtrace_core::delimited;
use elvtrace_core::TraceRecord;
use tempfile::NamedTempFile;

use crate::backend::TableBackend;
use crate::error::StorageError;

/// The trace table as a delimited-text file on local disk.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target.
#[derive(Debug, Clone)]
pub struct LocalCsv {
    path: PathBuf,
}

impl LocalCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalCsv { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents, or `None` if the file does not exist.
    pub fn read_bytes(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

impl TableBackend for LocalCsv {
    fn read_all(&self) -> Result<Vec<TraceRecord>, StorageError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(Vec::new());
        };
        delimited::decode(&bytes)
            .map_err(|e| StorageError::malformed(self.path.display().to_string(), e))
    }

    fn write_all(&self, records: &[TraceRecord]) -> Result<(), StorageError> {
        let bytes = delimited::encode(records)
            .map_err(|e| StorageError::malformed(self.path.display().to_string(), e))?;

        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StorageError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::io(&self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), rows = records.len(), "wrote local table");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn is_present(&self) -> bool {
        self.path.exists()
    }
}
