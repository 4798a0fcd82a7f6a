//! Persistence for the trace table.
//!
//! A [`RecordStore`] sits on a [`PersistenceAdapter`], which writes to a
//! local delimited-text file and, when one is configured and reachable, a
//! remote tabular service. Every backend implements [`TableBackend`]; the
//! [`conformance`] suite checks any implementation against the same
//! whole-table contract.

mod adapter;
mod backend;
pub mod conformance;
mod error;
mod local;
mod memory;
mod remote;
mod store;

pub use adapter::{AdapterConfig, BackendKind, Outcome, PersistenceAdapter, StorageInfo};
pub use backend::TableBackend;
pub use error::StorageError;
pub use local::LocalCsv;
pub use memory::MemoryBackend;
pub use remote::{RemoteConfig, RemoteCredentials, RemoteTable};
pub use store::RecordStore;
