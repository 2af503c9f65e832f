//! Error taxonomy for the user store.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened, created or given its schema.
    #[error("failed to initialize store at {path}: {source}")]
    StorageInit {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The directory meant to hold the store could not be created.
    #[error("failed to prepare storage directory {}: {source}", path.display())]
    StorageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing table does not have the layout this crate writes.
    #[error("table {table} does not match the expected schema: {detail}")]
    SchemaMismatch { table: String, detail: String },

    /// The file carries a schema newer than this crate understands.
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    #[error("write to store failed: {0}")]
    StorageWrite(#[source] rusqlite::Error),

    #[error("read from store failed: {0}")]
    StorageRead(#[source] rusqlite::Error),

    /// A background worker stopped before sending its result.
    #[error("background task aborted before completing")]
    TaskAborted,

    /// The background worker thread could not be started.
    #[error("failed to spawn store worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("schema export failed: {0}")]
    Export(#[from] serde_json::Error),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn init(path: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::StorageInit {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for every failure that happens while opening the store.
    pub fn is_init(&self) -> bool {
        matches!(
            self,
            Self::StorageInit { .. }
                | Self::StorageDir { .. }
                | Self::SchemaMismatch { .. }
                | Self::UnsupportedSchemaVersion { .. }
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::StorageWrite(_))
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Self::StorageRead(_))
    }
}
