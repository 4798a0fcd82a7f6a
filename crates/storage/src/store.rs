use elvtrace_core::batch::batch_name_of;
use elvtrace_core::TraceRecord;

use crate::adapter::{Outcome, PersistenceAdapter, StorageInfo};
use crate::error::StorageError;

/// The append-mostly trace table.
///
/// Every operation reads or writes the whole table through the adapter.
/// Advisories from the adapter accumulate until drained, so callers can
/// surface them next to the result.
pub struct RecordStore {
    adapter: PersistenceAdapter,
    advisories: Vec<String>,
}

impl RecordStore {
    pub fn new(adapter: PersistenceAdapter) -> Self {
        let advisories = adapter.startup_advisories().to_vec();
        RecordStore {
            adapter,
            advisories,
        }
    }

    fn keep<T>(&mut self, outcome: Outcome<T>) -> T {
        self.advisories.extend(outcome.advisories);
        outcome.value
    }

    /// Full table in storage order.
    pub fn load_all(&mut self) -> Result<Vec<TraceRecord>, StorageError> {
        let outcome = self.adapter.load()?;
        Ok(self.keep(outcome))
    }

    /// Append one record and return it as stored.
    ///
    /// If the batch already has records, the stored `batch_name` is the name
    /// on its first record, whatever the caller supplied.
    pub fn append_one(&mut self, mut record: TraceRecord) -> Result<TraceRecord, StorageError> {
        let mut records = self.load_all()?;
        if let Some(name) = batch_name_of(&records, &record.batch_code) {
            if name != record.batch_name {
                tracing::debug!(
                    batch = %record.batch_code,
                    supplied = %record.batch_name,
                    stored = %name,
                    "batch name forced to existing name"
                );
                record.batch_name = name.to_string();
            }
        }
        records.push(record.clone());
        let outcome = self.adapter.save(&records)?;
        self.keep(outcome);
        tracing::info!(batch = %record.batch_code, stage = %record.stage, "record appended");
        Ok(record)
    }

    /// Overwrite the whole table.
    pub fn replace_all(&mut self, records: &[TraceRecord]) -> Result<(), StorageError> {
        let outcome = self.adapter.save(records)?;
        self.keep(outcome);
        tracing::info!(rows = records.len(), "table replaced");
        Ok(())
    }

    pub fn sync_to_remote(&mut self) -> Result<usize, StorageError> {
        let outcome = self.adapter.sync_to_remote()?;
        Ok(self.keep(outcome))
    }

    pub fn storage_info(&self) -> StorageInfo {
        self.adapter.storage_info()
    }

    /// The local table, bypassing the remote.
    pub fn read_local(&self) -> Result<Vec<TraceRecord>, StorageError> {
        self.adapter.read_local()
    }

    /// Rebuild the adapter from its configuration. Pending advisories are
    /// kept and the new adapter's startup advisories appended.
    pub fn reinitialize(&mut self) {
        if let Some(fresh) = self.adapter.reconnect() {
            self.adapter = fresh;
            self.advisories
                .extend(self.adapter.startup_advisories().iter().cloned());
        }
    }

    pub fn drain_advisories(&mut self) -> Vec<String> {
        std::mem::take(&mut self.advisories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use elvtrace_core::Stage;
    use rust_decimal::Decimal;

    fn store() -> (RecordStore, MemoryBackend) {
        let local = MemoryBackend::new("local");
        let adapter = PersistenceAdapter::with_backends(Box::new(local.clone()), None);
        (RecordStore::new(adapter), local)
    }

    #[test]
    fn append_adds_exactly_one_verbatim() {
        let (mut store, _) = store();
        let before = store.load_all().unwrap().len();
        let mut rec = TraceRecord::new("ABCD1234", "PP", Stage::Shipped, "Alice", "2024-08-01 10:00:00");
        rec.weight_kg = Some(Decimal::new(4985, 1));
        rec.notes = Some("forklift, bay 3".into());
        store.append_one(rec.clone()).unwrap();
        let after = store.load_all().unwrap();
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&rec));
    }

    #[test]
    fn padded_fields_survive_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = crate::LocalCsv::new(dir.path().join("trace.csv"));
        let mut store = RecordStore::new(PersistenceAdapter::with_backends(Box::new(local), None));
        let mut rec = TraceRecord::new("ABCD1234", "PP", Stage::Shipped, " Alice ", "2024-08-01 10:00:00");
        rec.notes = Some("  indented note".into());
        store.append_one(rec.clone()).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![rec]);
    }

    #[test]
    fn batch_name_forced_to_first() {
        let (mut store, _) = store();
        store
            .append_one(TraceRecord::new("ABCD1234", "Original", Stage::Created, "sys", "2024-08-01 09:00:00"))
            .unwrap();
        let stored = store
            .append_one(TraceRecord::new("ABCD1234", "Renamed", Stage::Shipped, "op", "2024-08-01 10:00:00"))
            .unwrap();
        assert_eq!(stored.batch_name, "Original");
        assert!(store
            .load_all()
            .unwrap()
            .iter()
            .all(|r| r.batch_name == "Original"));
    }

    #[test]
    fn no_dedup_or_reference_checks() {
        let (mut store, _) = store();
        let rec = TraceRecord::new("NOPE0000", "x", Stage::Sold, "op", "2024-08-01 10:00:00");
        store.append_one(rec.clone()).unwrap();
        store.append_one(rec).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn replace_all_overwrites() {
        let (mut store, local) = store();
        store
            .append_one(TraceRecord::new("A", "a", Stage::Created, "sys", "2024-08-01 09:00:00"))
            .unwrap();
        store.replace_all(&[]).unwrap();
        assert!(local.snapshot().is_empty());
    }

    #[test]
    fn failed_local_write_leaves_table_unchanged() {
        let (mut store, local) = store();
        local.set_fail_writes(true);
        let rec = TraceRecord::new("A", "a", Stage::Created, "sys", "2024-08-01 09:00:00");
        assert!(store.append_one(rec).is_err());
        assert!(local.snapshot().is_empty());
    }

    #[test]
    fn advisories_are_drained() {
        let local = MemoryBackend::new("local");
        let remote = MemoryBackend::new("remote");
        remote.set_fail_writes(true);
        let remote_box: Box<dyn crate::TableBackend> = Box::new(remote);
        let mut store = RecordStore::new(PersistenceAdapter::with_backends(
            Box::new(local),
            Some(Ok(remote_box)),
        ));
        store.replace_all(&[]).unwrap();
        assert_eq!(store.drain_advisories().len(), 1);
        assert!(store.drain_advisories().is_empty());
    }
}
