use elvtrace_core::TraceRecord;

use crate::error::StorageError;

/// A whole-table store for trace records.
///
/// Backends only ever read or overwrite the complete table; there is no
/// row-level update. Row order is storage order and must survive a
/// `write_all` / `read_all` round trip.
///
/// Implementations must be `Send + Sync` so the adapter can live in server
/// state behind a mutex.
pub trait TableBackend: Send + Sync {
    /// The full table in storage order. A table that does not exist yet is
    /// empty, not an error.
    fn read_all(&self) -> Result<Vec<TraceRecord>, StorageError>;

    /// Replace the full table, header included.
    fn write_all(&self, records: &[TraceRecord]) -> Result<(), StorageError>;

    /// Human-readable location, e.g. a file path or sheet/tab.
    fn describe(&self) -> String;

    /// Whether the table has been written at least once.
    fn is_present(&self) -> bool {
        true
    }
}

impl<T: TableBackend + ?Sized> TableBackend for Box<T> {
    fn read_all(&self) -> Result<Vec<TraceRecord>, StorageError> {
        (**self).read_all()
    }

    fn write_all(&self, records: &[TraceRecord]) -> Result<(), StorageError> {
        (**self).write_all(records)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}
