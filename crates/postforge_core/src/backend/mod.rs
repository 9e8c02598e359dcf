//! Storage backend contract and concrete implementations.
//!
//! # Responsibility
//! - Define the uniform `store/retrieve/query/delete/list_keys` capability.
//! - Provide the document, relational and in-process implementations.
//!
//! # Invariants
//! - `store` is idempotent-by-replace (last write wins).
//! - `retrieve` of an unknown key is `Ok(None)`; `delete` of one is `Ok(false)`.
//! - `query` with an empty filter returns every record.
//! - Which filter fields are matchable differs per backend; callers must not
//!   assume one backend's matching rules hold for another.

use crate::db::DbError;
use crate::model::record::{Filter, Metadata, Record, StoredValue};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod document;
pub mod in_process;
pub mod relational;

pub use document::DocumentBackend;
pub use in_process::InProcessBackend;
pub use relational::RelationalBackend;

/// Registered name of the document backend.
pub const DOCUMENT_BACKEND: &str = "document";
/// Registered name of the relational backend.
pub const RELATIONAL_BACKEND: &str = "relational";
/// Registered name of the in-process backend.
pub const IN_PROCESS_BACKEND: &str = "in_process";

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer error shared by backends, router, manager and state.
#[derive(Debug)]
pub enum StorageError {
    /// SQLite open/bootstrap/statement failure.
    Db(DbError),
    /// Filesystem failure in the document backend.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialization(serde_json::Error),
    /// A single record could not be decoded.
    MalformedRecord { key: String, message: String },
    InvalidKey(String),
    /// A routing entry or override names a backend that is not registered.
    UnknownBackend(String),
    DuplicateBackend(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "storage I/O failed at `{}`: {source}", path.display()),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
            Self::MalformedRecord { key, message } => {
                write!(f, "malformed record `{key}`: {message}")
            }
            Self::InvalidKey(key) => write!(f, "invalid record key `{key}`"),
            Self::UnknownBackend(name) => write!(f, "backend not registered: {name}"),
            Self::DuplicateBackend(name) => write!(f, "backend already registered: {name}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Serialization(err) => Some(err),
            Self::MalformedRecord { .. } => None,
            Self::InvalidKey(_) => None,
            Self::UnknownBackend(_) => None,
            Self::DuplicateBackend(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Uniform capability every backend implements.
pub trait StorageBackend: Send {
    /// Stores `value` under `key`, replacing any previous record.
    fn store(
        &mut self,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String>;

    fn retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>>;

    fn query(&self, filter: &Filter) -> StorageResult<Vec<Record>>;

    /// Returns `true` when a record was removed.
    fn delete(&mut self, key: &str) -> StorageResult<bool>;

    /// Keys in ascending order, optionally restricted to a prefix.
    fn list_keys(&self, prefix: Option<&str>) -> StorageResult<Vec<String>>;
}

pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
