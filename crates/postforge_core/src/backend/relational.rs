//! SQLite-backed relational backend.
//!
//! # Responsibility
//! - Store generic records in the `storage` table for append-heavy entity types.
//! - Own the richer `traces`/`events`/`model_pricing` logging schema.
//!
//! # Invariants
//! - Every call opens its own connection and closes it before returning.
//! - `query` supports two special predicates, key prefix and metadata
//!   substring. Any other pair is exact equality on a top-level metadata
//!   member. Value fields are never matchable here.
//! - Event cost is derived from `model_pricing`; an unpriced model yields
//!   `NULL` costs, not an error.
//! - Trace token/cost aggregates are recomputed in the same transaction that
//!   writes an event.

use super::{validate_key, StorageBackend, StorageError, StorageResult};
use crate::db::open_db;
use crate::model::record::{Filter, Metadata, Record, StoredValue};
use crate::model::trace::{Event, EventCost, HistoryQuery, ModelPricing, Trace, TraceDetails};
use log::{debug, info, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Filter field selecting records whose key starts with the given text.
pub const KEY_PREFIX_FILTER: &str = "key_prefix";
/// Filter field selecting records whose metadata text contains the given text.
pub const METADATA_CONTAINS_FILTER: &str = "metadata_contains";

const TRACE_SELECT_SQL: &str = "SELECT
    id,
    created_at,
    name,
    user_id,
    tenant_id,
    tags,
    metadata_json,
    tokens_input_total,
    tokens_output_total,
    tokens_total,
    cost_total
FROM traces";

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    trace_id,
    parent_id,
    created_at,
    type,
    name,
    model,
    role,
    input_text,
    input_json,
    output_text,
    output_json,
    error,
    duration_ms,
    tokens_input,
    tokens_output,
    tokens_total,
    cost_input,
    cost_output,
    cost_total,
    quality_score,
    quality_label,
    quality_metadata_json,
    metadata_json
FROM events";

/// Relational backend bound to one SQLite database file.
///
/// Cheap to clone: it only holds the database path.
#[derive(Debug, Clone)]
pub struct RelationalBackend {
    db_path: PathBuf,
}

impl RelationalBackend {
    /// Binds to `db_path`, creating the file and schema if needed.
    pub fn open(db_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;
        }
        let backend = Self { db_path };
        drop(backend.connect()?);
        info!(
            "event=backend_open module=backend status=ok backend=relational path={}",
            backend.db_path.display()
        );
        Ok(backend)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> StorageResult<Connection> {
        Ok(open_db(&self.db_path)?)
    }

    /// Inserts or replaces the price row for one model.
    pub fn upsert_model_pricing(&self, pricing: &ModelPricing) -> StorageResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO model_pricing (
                model_name,
                price_per_1k_input,
                price_per_1k_output,
                currency,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(model_name) DO UPDATE SET
                price_per_1k_input = excluded.price_per_1k_input,
                price_per_1k_output = excluded.price_per_1k_output,
                currency = excluded.currency,
                updated_at = excluded.updated_at;",
            params![
                pricing.model_name,
                pricing.price_per_1k_input,
                pricing.price_per_1k_output,
                pricing.currency,
                now_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn model_pricing(&self, model_name: &str) -> StorageResult<Option<ModelPricing>> {
        let conn = self.connect()?;
        lookup_pricing(&conn, model_name)
    }

    /// Inserts a trace, or updates its descriptive fields if it already exists.
    ///
    /// Aggregates are owned by `log_event` and are not overwritten here.
    pub fn log_trace(&self, trace: &Trace) -> StorageResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO traces (
                id,
                created_at,
                name,
                user_id,
                tenant_id,
                tags,
                metadata_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                user_id = excluded.user_id,
                tenant_id = excluded.tenant_id,
                tags = excluded.tags,
                metadata_json = excluded.metadata_json;",
            params![
                trace.id,
                trace.created_at,
                trace.name,
                trace.user_id,
                trace.tenant_id,
                serde_json::to_string(&trace.tags)?,
                json_text(trace.metadata.as_ref())?,
            ],
        )?;
        debug!(
            "event=trace_log module=backend status=ok backend=relational trace_id={}",
            trace.id
        );
        Ok(())
    }

    /// Writes one event and returns it with costs filled from model pricing.
    pub fn log_event(&self, event: &Event) -> StorageResult<Event> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let mut event = event.clone();
        let pricing = match event.model.as_deref() {
            Some(model) => lookup_pricing(&tx, model)?,
            None => None,
        };
        match pricing {
            Some(pricing) => {
                let cost = EventCost::compute(
                    &pricing,
                    event.tokens_input.unwrap_or(0),
                    event.tokens_output.unwrap_or(0),
                );
                event.cost_input = Some(cost.input);
                event.cost_output = Some(cost.output);
                event.cost_total = Some(cost.total);
            }
            None => {
                event.cost_input = None;
                event.cost_output = None;
                event.cost_total = None;
            }
        }
        event.tokens_total = event.effective_tokens_total();

        tx.execute(
            "INSERT INTO events (
                id, trace_id, parent_id, created_at, type, name, model, role,
                input_text, input_json, output_text, output_json, error, duration_ms,
                tokens_input, tokens_output, tokens_total,
                cost_input, cost_output, cost_total,
                quality_score, quality_label, quality_metadata_json, metadata_json
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17,
                ?18, ?19, ?20,
                ?21, ?22, ?23, ?24
            )
            ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                type = excluded.type,
                name = excluded.name,
                model = excluded.model,
                role = excluded.role,
                input_text = excluded.input_text,
                input_json = excluded.input_json,
                output_text = excluded.output_text,
                output_json = excluded.output_json,
                error = excluded.error,
                duration_ms = excluded.duration_ms,
                tokens_input = excluded.tokens_input,
                tokens_output = excluded.tokens_output,
                tokens_total = excluded.tokens_total,
                cost_input = excluded.cost_input,
                cost_output = excluded.cost_output,
                cost_total = excluded.cost_total,
                quality_score = excluded.quality_score,
                quality_label = excluded.quality_label,
                quality_metadata_json = excluded.quality_metadata_json,
                metadata_json = excluded.metadata_json;",
            params![
                event.id,
                event.trace_id,
                event.parent_id,
                event.created_at,
                event.kind,
                event.name,
                event.model,
                event.role,
                event.input_text,
                json_text(event.input_json.as_ref())?,
                event.output_text,
                json_text(event.output_json.as_ref())?,
                event.error,
                event.duration_ms,
                event.tokens_input,
                event.tokens_output,
                event.tokens_total,
                event.cost_input,
                event.cost_output,
                event.cost_total,
                event.quality_score,
                event.quality_label,
                json_text(event.quality_metadata.as_ref())?,
                json_text(event.metadata.as_ref())?,
            ],
        )?;

        refresh_trace_totals(&tx, &event.trace_id)?;
        tx.commit()?;

        debug!(
            "event=event_log module=backend status=ok backend=relational trace_id={} event_id={} priced={}",
            event.trace_id,
            event.id,
            event.cost_total.is_some()
        );
        Ok(event)
    }

    pub fn get_trace(&self, trace_id: &str) -> StorageResult<Option<Trace>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{TRACE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([trace_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_trace_row(row)?)),
            None => Ok(None),
        }
    }

    /// Returns a trace with its events ordered oldest first.
    pub fn get_trace_details(&self, trace_id: &str) -> StorageResult<Option<TraceDetails>> {
        let Some(trace) = self.get_trace(trace_id)? else {
            return Ok(None);
        };

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{EVENT_SELECT_SQL} WHERE trace_id = ?1 ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([trace_id])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }

        Ok(Some(TraceDetails { trace, events }))
    }

    /// Lists traces newest first.
    pub fn query_history(&self, query: &HistoryQuery) -> StorageResult<Vec<Trace>> {
        let mut sql = format!("{TRACE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();

        for (column, value) in [
            ("user_id", &query.user_id),
            ("tenant_id", &query.tenant_id),
            ("name", &query.name),
        ] {
            if let Some(value) = value {
                sql.push_str(&format!(" AND {column} = ?"));
                bind_values.push(SqlValue::Text(value.clone()));
            }
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(SqlValue::Integer(i64::from(limit)));
        }

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut traces = Vec::new();
        while let Some(row) = rows.next()? {
            traces.push(parse_trace_row(row)?);
        }
        Ok(traces)
    }

    /// Lists events named `name` (a prompt/step name), newest first.
    pub fn get_prompt_history(&self, name: &str, limit: u32) -> StorageResult<Vec<Event>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{EVENT_SELECT_SQL} WHERE name = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![name, i64::from(limit)])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    /// Removes one event and refreshes its trace's aggregates.
    ///
    /// Child events stay, with `parent_id` cleared by `ON DELETE SET NULL`.
    pub fn delete_event(&self, event_id: &str) -> StorageResult<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let trace_id: Option<String> = tx
            .query_row(
                "SELECT trace_id FROM events WHERE id = ?1;",
                [event_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(trace_id) = trace_id else {
            return Ok(false);
        };

        tx.execute("DELETE FROM events WHERE id = ?1;", [event_id])?;
        refresh_trace_totals(&tx, &trace_id)?;
        tx.commit()?;

        debug!(
            "event=event_delete module=backend status=ok backend=relational trace_id={} event_id={}",
            trace_id, event_id
        );
        Ok(true)
    }

    /// Removes a trace; its events go with it through `ON DELETE CASCADE`.
    pub fn delete_trace(&self, trace_id: &str) -> StorageResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM traces WHERE id = ?1;", [trace_id])?;
        Ok(changed > 0)
    }
}

impl StorageBackend for RelationalBackend {
    fn store(
        &mut self,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let value_text = serde_json::to_string(&value.to_json())?;
        let metadata_text = serde_json::to_string(&metadata.unwrap_or_default())?;
        let now = now_millis();

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO storage (key, value, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at;",
            params![key, value_text, metadata_text, now],
        )?;
        debug!(
            "event=record_store module=backend status=ok backend=relational key={}",
            key
        );
        Ok(key.to_string())
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        let conn = self.connect()?;
        let text: Option<String> = conn
            .query_row("SELECT value FROM storage WHERE key = ?1;", [key], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(text) = text else {
            return Ok(None);
        };
        let value = serde_json::from_str(&text).map_err(|err| StorageError::MalformedRecord {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        Ok(Some(StoredValue::Data(value)))
    }

    fn query(&self, filter: &Filter) -> StorageResult<Vec<Record>> {
        let mut sql = String::from("SELECT key, value, metadata FROM storage WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();

        for (field, expected) in filter {
            match field.as_str() {
                KEY_PREFIX_FILTER => {
                    sql.push_str(" AND instr(key, ?) = 1");
                    bind_values.push(SqlValue::Text(filter_text(expected)));
                }
                METADATA_CONTAINS_FILTER => {
                    sql.push_str(" AND instr(metadata, ?) > 0");
                    bind_values.push(SqlValue::Text(filter_text(expected)));
                }
                _ if field.contains('"') => {
                    // Not addressable as a JSON path member.
                    sql.push_str(" AND 0");
                }
                _ => {
                    // Exact equality on the top-level metadata member.
                    sql.push_str(
                        " AND json_type(metadata, ?) IS NOT NULL \
                         AND json_extract(metadata, ?) IS json_extract(?, '$')",
                    );
                    let path = format!("$.\"{field}\"");
                    bind_values.push(SqlValue::Text(path.clone()));
                    bind_values.push(SqlValue::Text(path));
                    bind_values.push(SqlValue::Text(serde_json::to_string(expected)?));
                }
            }
        }
        sql.push_str(" ORDER BY created_at ASC, key ASC;");

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get("key")?;
            let value_text: String = row.get("value")?;
            let metadata_text: String = row.get("metadata")?;

            let decoded = serde_json::from_str::<Value>(&value_text).and_then(|value| {
                serde_json::from_str::<Metadata>(&metadata_text).map(|metadata| (value, metadata))
            });
            match decoded {
                Ok((value, metadata)) => {
                    records.push(Record::new(key, StoredValue::Data(value), metadata));
                }
                Err(err) => {
                    warn!(
                        "event=relational_scan module=backend status=skip backend=relational key={} error_code=malformed_record error={}",
                        key, err
                    );
                }
            }
        }
        Ok(records)
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM storage WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn list_keys(&self, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let conn = self.connect()?;
        let mut keys = Vec::new();
        match prefix {
            Some(prefix) => {
                let mut stmt = conn
                    .prepare("SELECT key FROM storage WHERE instr(key, ?1) = 1 ORDER BY key ASC;")?;
                let mut rows = stmt.query([prefix])?;
                while let Some(row) = rows.next()? {
                    keys.push(row.get(0)?);
                }
            }
            None => {
                let mut stmt = conn.prepare("SELECT key FROM storage ORDER BY key ASC;")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    keys.push(row.get(0)?);
                }
            }
        }
        Ok(keys)
    }
}

fn refresh_trace_totals(conn: &Connection, trace_id: &str) -> StorageResult<()> {
    conn.execute(
        "UPDATE traces
         SET
            tokens_input_total = (
                SELECT COALESCE(SUM(tokens_input), 0) FROM events WHERE trace_id = ?1
            ),
            tokens_output_total = (
                SELECT COALESCE(SUM(tokens_output), 0) FROM events WHERE trace_id = ?1
            ),
            tokens_total = (
                SELECT COALESCE(SUM(tokens_total), 0) FROM events WHERE trace_id = ?1
            ),
            cost_total = (SELECT SUM(cost_total) FROM events WHERE trace_id = ?1)
         WHERE id = ?1;",
        [trace_id],
    )?;
    Ok(())
}

fn lookup_pricing(conn: &Connection, model_name: &str) -> StorageResult<Option<ModelPricing>> {
    let pricing = conn
        .query_row(
            "SELECT model_name, price_per_1k_input, price_per_1k_output, currency
             FROM model_pricing
             WHERE model_name = ?1;",
            [model_name],
            |row| {
                Ok(ModelPricing {
                    model_name: row.get(0)?,
                    price_per_1k_input: row.get(1)?,
                    price_per_1k_output: row.get(2)?,
                    currency: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(pricing)
}

fn parse_trace_row(row: &Row<'_>) -> StorageResult<Trace> {
    let id: String = row.get("id")?;
    let tags = match row.get::<_, Option<String>>("tags")? {
        Some(text) => serde_json::from_str(&text).map_err(|err| StorageError::MalformedRecord {
            key: id.clone(),
            message: format!("invalid traces.tags: {err}"),
        })?,
        None => Vec::new(),
    };
    let metadata = parse_json_column(row, "metadata_json", &id)?;

    Ok(Trace {
        created_at: row.get("created_at")?,
        name: row.get("name")?,
        user_id: row.get("user_id")?,
        tenant_id: row.get("tenant_id")?,
        tags,
        metadata,
        tokens_input_total: row.get("tokens_input_total")?,
        tokens_output_total: row.get("tokens_output_total")?,
        tokens_total: row.get("tokens_total")?,
        cost_total: row.get("cost_total")?,
        id,
    })
}

fn parse_event_row(row: &Row<'_>) -> StorageResult<Event> {
    let id: String = row.get("id")?;
    Ok(Event {
        trace_id: row.get("trace_id")?,
        parent_id: row.get("parent_id")?,
        created_at: row.get("created_at")?,
        kind: row.get("type")?,
        name: row.get("name")?,
        model: row.get("model")?,
        role: row.get("role")?,
        input_text: row.get("input_text")?,
        input_json: parse_json_column(row, "input_json", &id)?,
        output_text: row.get("output_text")?,
        output_json: parse_json_column(row, "output_json", &id)?,
        error: row.get("error")?,
        duration_ms: row.get("duration_ms")?,
        tokens_input: row.get("tokens_input")?,
        tokens_output: row.get("tokens_output")?,
        tokens_total: row.get("tokens_total")?,
        cost_input: row.get("cost_input")?,
        cost_output: row.get("cost_output")?,
        cost_total: row.get("cost_total")?,
        quality_score: row.get("quality_score")?,
        quality_label: row.get("quality_label")?,
        quality_metadata: parse_json_column(row, "quality_metadata_json", &id)?,
        metadata: parse_json_column(row, "metadata_json", &id)?,
        id,
    })
}

fn parse_json_column(row: &Row<'_>, column: &str, id: &str) -> StorageResult<Option<Value>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| StorageError::MalformedRecord {
                key: id.to_string(),
                message: format!("invalid {column}: {err}"),
            }),
        None => Ok(None),
    }
}

fn json_text(value: Option<&Value>) -> StorageResult<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

fn filter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::{RelationalBackend, KEY_PREFIX_FILTER, METADATA_CONTAINS_FILTER};
    use crate::backend::StorageBackend;
    use crate::model::record::{Filter, Metadata, StoredValue};
    use serde_json::json;

    fn backend() -> (tempfile::TempDir, RelationalBackend) {
        let dir = tempfile::tempdir().expect("temp dir");
        let backend = RelationalBackend::open(dir.path().join("state.sqlite3")).expect("open");
        (dir, backend)
    }

    fn metadata(entity_type: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("entity_type".to_string(), json!(entity_type));
        metadata
    }

    #[test]
    fn store_retrieve_and_replace() {
        let (_dir, mut backend) = backend();
        backend
            .store("prompt:hook", StoredValue::from(json!({"v": 1})), Some(metadata("prompt")))
            .expect("store");
        backend
            .store("prompt:hook", StoredValue::from(json!({"v": 2})), Some(metadata("prompt")))
            .expect("replace");

        assert_eq!(
            backend.retrieve("prompt:hook").expect("retrieve"),
            Some(StoredValue::from(json!({"v": 2})))
        );
        assert_eq!(backend.retrieve("missing").expect("retrieve"), None);
        assert_eq!(backend.list_keys(None).expect("keys").len(), 1);
    }

    #[test]
    fn query_matches_metadata_and_prefix_but_not_value_fields() {
        let (_dir, mut backend) = backend();
        backend
            .store("prompt:a", StoredValue::from(json!({"tone": "warm"})), Some(metadata("prompt")))
            .expect("store a");
        backend
            .store("event:b", StoredValue::from(json!({"tone": "warm"})), Some(metadata("event")))
            .expect("store b");

        let mut by_type = Filter::new();
        by_type.insert("entity_type".to_string(), json!("prompt"));
        let hits = backend.query(&by_type).expect("query by type");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "prompt:a");

        let mut by_prefix = Filter::new();
        by_prefix.insert(KEY_PREFIX_FILTER.to_string(), json!("event:"));
        let hits = backend.query(&by_prefix).expect("query by prefix");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "event:b");

        let mut by_substring = Filter::new();
        by_substring.insert(METADATA_CONTAINS_FILTER.to_string(), json!("even"));
        assert_eq!(backend.query(&by_substring).expect("substring").len(), 1);

        let mut by_value_field = Filter::new();
        by_value_field.insert("tone".to_string(), json!("warm"));
        assert!(backend.query(&by_value_field).expect("value field").is_empty());

        assert_eq!(backend.query(&Filter::new()).expect("all").len(), 2);
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let (_dir, mut backend) = backend();
        backend
            .store("trace:1", StoredValue::from(json!(1)), None)
            .expect("store");
        assert!(backend.delete("trace:1").expect("delete"));
        assert!(!backend.delete("trace:1").expect("second delete"));
    }

    #[test]
    fn metadata_equality_is_exact_and_top_level() {
        let (_dir, mut backend) = backend();
        let mut ten = metadata("prompt");
        ten.insert("priority".to_string(), json!(10));
        ten.insert("nested".to_string(), json!({"tone": "warm"}));
        backend
            .store("prompt:ten", StoredValue::from(json!({})), Some(ten))
            .expect("store ten");
        let mut one = metadata("prompt");
        one.insert("priority".to_string(), json!(1));
        one.insert("flag".to_string(), json!(null));
        backend
            .store("prompt:one", StoredValue::from(json!({})), Some(one))
            .expect("store one");

        let mut priority = Filter::new();
        priority.insert("priority".to_string(), json!(1));
        let hits = backend.query(&priority).expect("priority");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "prompt:one");

        let mut nested_only = Filter::new();
        nested_only.insert("tone".to_string(), json!("warm"));
        assert!(backend.query(&nested_only).expect("nested").is_empty());

        let mut nested = Filter::new();
        nested.insert("nested".to_string(), json!({"tone": "warm"}));
        assert_eq!(backend.query(&nested).expect("object").len(), 1);

        let mut null_flag = Filter::new();
        null_flag.insert("flag".to_string(), json!(null));
        let hits = backend.query(&null_flag).expect("null");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "prompt:one");
    }
}
