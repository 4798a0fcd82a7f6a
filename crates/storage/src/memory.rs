use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use elvtrace_core::TraceRecord;

use crate::backend::TableBackend;
use crate::error::StorageError;

#[derive(Default)]
struct Inner {
    rows: Mutex<Option<Vec<TraceRecord>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// In-process table. Clones share the same rows, so a test can keep a
/// handle after giving one to an adapter.
///
/// Reads and writes can be made to fail to simulate an unreachable remote.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
    label: String,
}

impl MemoryBackend {
    pub fn new(label: impl Into<String>) -> Self {
        MemoryBackend {
            inner: Arc::default(),
            label: label.into(),
        }
    }

    pub fn with_records(label: impl Into<String>, records: Vec<TraceRecord>) -> Self {
        let backend = Self::new(label);
        if let Ok(mut rows) = backend.inner.rows.lock() {
            *rows = Some(records);
        }
        backend
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current rows, without going through the failure switches.
    pub fn snapshot(&self) -> Vec<TraceRecord> {
        self.inner
            .rows
            .lock()
            .map(|rows| rows.clone().unwrap_or_default())
            .unwrap_or_default()
    }

    fn poisoned(&self) -> StorageError {
        StorageError::RemoteUnavailable(format!("{}: lock poisoned", self.label))
    }
}

impl TableBackend for MemoryBackend {
    fn read_all(&self) -> Result<Vec<TraceRecord>, StorageError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::RemoteUnavailable(format!(
                "{}: read refused",
                self.label
            )));
        }
        let rows = self.inner.rows.lock().map_err(|_| self.poisoned())?;
        Ok(rows.clone().unwrap_or_default())
    }

    fn write_all(&self, records: &[TraceRecord]) -> Result<(), StorageError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::RemoteUnavailable(format!(
                "{}: write refused",
                self.label
            )));
        }
        let mut rows = self.inner.rows.lock().map_err(|_| self.poisoned())?;
        *rows = Some(records.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.label)
    }

    fn is_present(&self) -> bool {
        self.inner
            .rows
            .lock()
            .map(|rows| rows.is_some())
            .unwrap_or(false)
    }
}
