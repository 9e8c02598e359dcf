//! Storage configuration.
//!
//! Loading from files or environment belongs to callers; this type only
//! describes where each durable backend lives and how routing is overridden.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DOCUMENT_DIR_NAME: &str = "documents";
const DATABASE_FILE_NAME: &str = "state.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per document record.
    pub document_root: PathBuf,
    /// SQLite file for the relational backend.
    pub database_path: PathBuf,
    /// `entity_type -> backend name`, merged over the default routing table.
    #[serde(default)]
    pub routing_overrides: BTreeMap<String, String>,
}

impl StorageConfig {
    /// Default layout under one data directory.
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            document_root: data_dir.join(DOCUMENT_DIR_NAME),
            database_path: data_dir.join(DATABASE_FILE_NAME),
            routing_overrides: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, entity_type: impl Into<String>, backend: impl Into<String>) -> Self {
        self.routing_overrides
            .insert(entity_type.into(), backend.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::StorageConfig;
    use std::path::Path;

    #[test]
    fn under_uses_default_layout() {
        let config = StorageConfig::under("/var/lib/postforge");
        assert_eq!(config.document_root, Path::new("/var/lib/postforge/documents"));
        assert_eq!(
            config.database_path,
            Path::new("/var/lib/postforge/state.sqlite3")
        );
        assert!(config.routing_overrides.is_empty());
    }

    #[test]
    fn deserializes_with_optional_overrides() {
        let config: StorageConfig = serde_json::from_str(
            r#"{
                "document_root": "/data/docs",
                "database_path": "/data/state.db",
                "routing_overrides": {"caption": "document"}
            }"#,
        )
        .expect("config should deserialize");
        assert_eq!(
            config.routing_overrides.get("caption").map(String::as_str),
            Some("document")
        );

        let minimal: StorageConfig =
            serde_json::from_str(r#"{"document_root": "/d", "database_path": "/s.db"}"#)
                .expect("minimal config should deserialize");
        assert!(minimal.routing_overrides.is_empty());
    }
}
