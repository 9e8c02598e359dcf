//! File-per-key document backend.
//!
//! # Responsibility
//! - Persist nested structured records as one JSON file per key.
//! - Answer equality queries by scanning every record.
//!
//! # Invariants
//! - Files live directly under `root`, named `<escaped key>.json`. Escaping
//!   is injective, so two keys never share a file.
//! - A file is only read, replaced or removed on behalf of the key recorded
//!   in its `_key` field.
//! - Reserved fields (`_key`, `_metadata`, `_stored_at`, `_value`) never leak
//!   out of `retrieve`/`query`.
//! - Non-map values, and maps using a reserved field name, are wrapped under
//!   `_value` on write. An on-disk map holding `_value` is always a wrapper.
//! - `entity_type` and `run_id` filters read `_metadata` before the value.
//! - A malformed file is skipped by scans, never fatal to the whole query.
//! - No file locks: concurrent writers to one key race, last rename wins.

use super::{validate_key, StorageBackend, StorageError, StorageResult};
use crate::model::record::{
    is_routing_field, matches_value, Filter, Metadata, Record, StoredValue,
};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const KEY_FIELD: &str = "_key";
const METADATA_FIELD: &str = "_metadata";
const STORED_AT_FIELD: &str = "_stored_at";
const WRAPPED_VALUE_FIELD: &str = "_value";
const INTERNAL_FIELDS: &[&str] = &[KEY_FIELD, METADATA_FIELD, STORED_AT_FIELD];
const RESERVED_FIELDS: &[&str] = &[KEY_FIELD, METADATA_FIELD, STORED_AT_FIELD, WRAPPED_VALUE_FIELD];
const RECORD_EXTENSION: &str = "json";

static UNSAFE_KEY_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[%/\\:\x00]").expect("valid key sanitize regex"));

/// Document backend rooted at one directory.
#[derive(Debug, Clone)]
pub struct DocumentBackend {
    root: PathBuf,
}

/// Decoded on-disk document.
struct Document {
    key: Option<String>,
    value: Value,
    metadata: Metadata,
}

impl DocumentBackend {
    /// Creates the backend, creating `root` if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| StorageError::io(&root, err))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path used for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXTENSION}", sanitize_key(key)))
    }

    fn read_document(&self, path: &Path) -> StorageResult<Option<Document>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(path, err)),
        };
        let fallback_key = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        decode_document(&raw)
            .map(Some)
            .map_err(|message| StorageError::MalformedRecord {
                key: fallback_key,
                message,
            })
    }

    fn record_paths(&self) -> StorageResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&self.root, err)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| StorageError::io(&self.root, err))?.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Returns the recorded `_key` of the file at `path` when it is not `key`.
    ///
    /// A missing or malformed file has no foreign owner.
    fn foreign_owner(&self, path: &Path, key: &str) -> StorageResult<Option<String>> {
        match self.read_document(path) {
            Ok(Some(Document {
                key: Some(owner), ..
            })) if owner != key => Ok(Some(owner)),
            Ok(_) | Err(StorageError::MalformedRecord { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Scans every record, skipping malformed ones.
    fn scan(&self) -> StorageResult<Vec<(String, Document)>> {
        let mut documents = Vec::new();
        for path in self.record_paths()? {
            match self.read_document(&path) {
                Ok(Some(document)) => {
                    let key = document.key.clone().unwrap_or_else(|| {
                        path.file_stem()
                            .map(|stem| stem.to_string_lossy().into_owned())
                            .unwrap_or_default()
                    });
                    documents.push((key, document));
                }
                Ok(None) => {}
                Err(StorageError::MalformedRecord { key, message }) => {
                    warn!(
                        "event=document_scan module=backend status=skip backend=document key={} error_code=malformed_record error={}",
                        key, message
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(documents)
    }
}

impl StorageBackend for DocumentBackend {
    fn store(
        &mut self,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(owner) = self.foreign_owner(&path, key)? {
            return Err(StorageError::InvalidKey(format!(
                "{key} (file {} belongs to `{owner}`)",
                path.display()
            )));
        }

        let mut content = match value.to_json() {
            Value::Object(map)
                if !RESERVED_FIELDS.iter().any(|field| map.contains_key(*field)) =>
            {
                map
            }
            other => {
                let mut wrapped = Map::new();
                wrapped.insert(WRAPPED_VALUE_FIELD.to_string(), other);
                wrapped
            }
        };
        content.insert(KEY_FIELD.to_string(), Value::String(key.to_string()));
        content.insert(
            METADATA_FIELD.to_string(),
            Value::Object(metadata.unwrap_or_default()),
        );
        content.insert(
            STORED_AT_FIELD.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        let bytes = serde_json::to_vec_pretty(&Value::Object(content))?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes).map_err(|err| StorageError::io(&temp_path, err))?;
        fs::rename(&temp_path, &path).map_err(|err| StorageError::io(&path, err))?;

        debug!(
            "event=record_store module=backend status=ok backend=document key={}",
            key
        );
        Ok(key.to_string())
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        let Some(document) = self.read_document(&self.path_for(key))? else {
            return Ok(None);
        };
        if document.key.as_deref().is_some_and(|stored| stored != key) {
            return Ok(None);
        }
        Ok(Some(StoredValue::Data(document.value)))
    }

    fn query(&self, filter: &Filter) -> StorageResult<Vec<Record>> {
        let records = self
            .scan()?
            .into_iter()
            .filter(|(_, document)| {
                filter.iter().all(|(field, expected)| {
                    let own = document.value.as_object().and_then(|map| map.get(field));
                    let meta = document.metadata.get(field);
                    let candidate = if is_routing_field(field) {
                        meta.or(own)
                    } else {
                        own.or(meta)
                    };
                    matches_value(candidate, expected)
                })
            })
            .map(|(key, document)| {
                Record::new(key, StoredValue::Data(document.value), document.metadata)
            })
            .collect();
        Ok(records)
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key);
        if self.foreign_owner(&path, key)?.is_some() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::io(&path, err)),
        }
    }

    fn list_keys(&self, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .scan()?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| prefix.map_or(true, |prefix| key.starts_with(prefix)))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Percent-escapes path separators, `:`, NUL and `%` itself.
pub fn sanitize_key(key: &str) -> String {
    UNSAFE_KEY_CHARS_RE
        .replace_all(key, |caps: &Captures| {
            caps[0]
                .bytes()
                .map(|byte| format!("%{byte:02X}"))
                .collect::<String>()
        })
        .into_owned()
}

fn decode_document(raw: &str) -> Result<Document, String> {
    let parsed: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    let Value::Object(mut content) = parsed else {
        return Err("document root is not an object".to_string());
    };

    let key = match content.remove(KEY_FIELD) {
        Some(Value::String(key)) => Some(key),
        Some(_) => return Err(format!("`{KEY_FIELD}` is not a string")),
        None => None,
    };
    let metadata = match content.remove(METADATA_FIELD) {
        Some(Value::Object(metadata)) => metadata,
        Some(Value::Null) | None => Metadata::new(),
        Some(_) => return Err(format!("`{METADATA_FIELD}` is not an object")),
    };
    for field in INTERNAL_FIELDS {
        content.remove(*field);
    }

    let value = match content.remove(WRAPPED_VALUE_FIELD) {
        Some(wrapped) => wrapped,
        None => Value::Object(content),
    };

    Ok(Document {
        key,
        value,
        metadata,
    })
}
