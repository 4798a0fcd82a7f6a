use std::path::PathBuf;

/// All errors that can be returned by a [`TableBackend`](crate::TableBackend)
/// or the adapter above it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The local file could not be read or written.
    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored data does not follow the table schema.
    #[error("malformed table in {location}: {message}")]
    Malformed { location: String, message: String },

    /// Network, authentication or protocol failure talking to the remote
    /// table, or no remote configured for an operation that needs one.
    #[error("remote table unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote credentials missing or unreadable.
    #[error("remote configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(location: impl Into<String>, message: impl ToString) -> Self {
        StorageError::Malformed {
            location: location.into(),
            message: message.to_string(),
        }
    }
}
