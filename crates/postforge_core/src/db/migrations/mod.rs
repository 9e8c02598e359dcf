//! Ordered schema steps for the state database.
//!
//! 1. `storage`: the generic key/value table behind the relational backend.
//! 2. `traces` / `events`: execution history, events cascade with their trace.
//! 3. `model_pricing`: per-1K-token prices used to cost events.
//!
//! Steps are `IF NOT EXISTS` and the highest applied step is recorded in
//! `PRAGMA user_version`. All pending steps run in one transaction.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "storage",
        sql: include_str!("0001_storage.sql"),
    },
    SchemaStep {
        version: 2,
        name: "traces_events",
        sql: include_str!("0002_traces_events.sql"),
    },
    SchemaStep {
        version: 3,
        name: "model_pricing",
        sql: include_str!("0003_model_pricing.sql"),
    },
];

/// Schema version written by the newest step this build knows.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings `conn` up to `latest_version()`.
///
/// A database already past this build's version is rejected untouched.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let on_disk: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if on_disk > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: on_disk,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > on_disk)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    let names: Vec<&str> = pending.iter().map(|step| step.name).collect();
    info!(
        "event=schema_migrate module=db status=ok from_version={} to_version={} steps={}",
        on_disk,
        latest,
        names.join(",")
    );
    Ok(())
}
