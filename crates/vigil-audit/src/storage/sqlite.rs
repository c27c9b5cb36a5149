//! SQLite-backed store.
//!
//! Schema columns come from [`COLUMNS`]. Each known field is written to its
//! typed column when the value has the column's kind; every other field
//! (unknown names, null values, type mismatches) goes to the `extra` JSON
//! column so that the record read back is exactly the record that was
//! signed.
//!
//! `date` holds fixed-width RFC 3339 UTC text, which sorts lexicographically
//! in time order. Wildcard filters use `GLOB`, which is case-sensitive.
//!
//! Scans resume from the stored `(date, seq)` of the cursor row rather than
//! from the cursor's parsed timestamp, so rows with damaged dates still page
//! in index order.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Row, params_from_iter};
use uuid::Uuid;

use crate::columns::{COLUMNS, ColumnKind};
use crate::error::{AuditError, AuditResult};
use crate::filter::{FieldFilter, Predicate, SortOrder};
use crate::record::{AuditEntryId, AuditRecord, FieldValue, format_timestamp};

use super::{AuditStore, RowRange, ScanCursor, ScanRange};

const TABLE: &str = "audit_log";

/// Audit records in a single SQLite table.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
    insert_sql: String,
}

impl SqliteAuditStore {
    /// Open (or create) a database file.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::StorageError`] if the file cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::StorageError(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::warn!(error = %e, "could not enable WAL for audit database");
        }
        conn.busy_timeout(Duration::from_secs(5))?;

        tracing::info!(path = %path.display(), "opened sqlite audit store");
        Self::init(conn)
    }

    /// A private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::StorageError`] if the schema cannot be created.
    pub fn in_memory() -> AuditResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AuditResult<Self> {
        conn.execute_batch(&schema_sql())?;
        Ok(Self {
            conn: Mutex::new(conn),
            insert_sql: insert_sql(),
        })
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AuditError::StorageError("sqlite connection lock poisoned".into()))
    }
}

impl std::fmt::Debug for SqliteAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAuditStore").finish_non_exhaustive()
    }
}

// ---------- SQL text ----------

fn schema_sql() -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (\n\
         seq INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         id TEXT NOT NULL UNIQUE,\n\
         date TEXT NOT NULL,\n"
    );
    for col in COLUMNS {
        let ty = match col.kind {
            ColumnKind::Text => "TEXT",
            ColumnKind::Bool | ColumnKind::Int => "INTEGER",
        };
        let _ = writeln!(sql, "\"{}\" {ty},", col.name);
    }
    sql.push_str("extra TEXT,\nsignature TEXT\n);\n");
    let _ = writeln!(
        sql,
        "CREATE INDEX IF NOT EXISTS {TABLE}_date ON {TABLE} (date, seq);"
    );
    sql
}

fn insert_sql() -> String {
    let names: Vec<String> = COLUMNS.iter().map(|c| format!("\"{}\"", c.name)).collect();
    let placeholders = vec!["?"; names.len().saturating_add(4)].join(", ");
    format!(
        "INSERT INTO {TABLE} (id, date, {}, extra, signature) VALUES ({placeholders})",
        names.join(", ")
    )
}

/// Escape GLOB metacharacters other than `*`.
fn glob_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '?' => out.push_str("[?]"),
            '[' => out.push_str("[[]"),
            _ => out.push(c),
        }
    }
    out
}

fn where_clause(predicate: &Predicate, params: &mut Vec<SqlValue>) -> String {
    let mut sql = String::from(" WHERE 1=1");
    for cond in &predicate.conditions {
        match &cond.filter {
            FieldFilter::Exact(value) => match typed_value(value) {
                Some(v) => {
                    let _ = write!(sql, " AND \"{}\" = ?", cond.column);
                    params.push(v);
                },
                None => {
                    let _ = write!(sql, " AND \"{}\" IS NULL", cond.column);
                },
            },
            FieldFilter::Wildcard(pattern) => {
                let _ = write!(sql, " AND \"{}\" GLOB ?", cond.column);
                params.push(SqlValue::Text(glob_pattern(pattern.as_str())));
            },
        }
    }
    if let Some(window) = predicate.window {
        sql.push_str(" AND date >= ? AND date <= ?");
        params.push(SqlValue::Text(format_timestamp(&window.since)));
        params.push(SqlValue::Text(format_timestamp(&window.until)));
    }
    sql
}

fn typed_value(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Null => None,
        FieldValue::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        FieldValue::Int(n) => Some(SqlValue::Integer(*n)),
        FieldValue::Text(s) => Some(SqlValue::Text(s.clone())),
        FieldValue::Timestamp(t) => Some(SqlValue::Text(format_timestamp(t))),
    }
}

// ---------- Row mapping ----------

/// Column value for a field, or `None` when it must go to `extra`.
fn column_value(kind: ColumnKind, value: &FieldValue) -> Option<SqlValue> {
    match (kind, value) {
        (ColumnKind::Text, FieldValue::Text(s)) => Some(SqlValue::Text(s.clone())),
        (ColumnKind::Bool, FieldValue::Bool(b)) => Some(SqlValue::Integer(i64::from(*b))),
        (ColumnKind::Int, FieldValue::Int(n)) => Some(SqlValue::Integer(*n)),
        _ => None,
    }
}

fn insert_params(record: &AuditRecord) -> AuditResult<Vec<SqlValue>> {
    let mut params = Vec::with_capacity(COLUMNS.len().saturating_add(4));
    params.push(SqlValue::Text(record.id.to_string()));
    params.push(SqlValue::Text(format_timestamp(&record.timestamp)));

    let mut extra: BTreeMap<&str, &FieldValue> = record
        .fields
        .iter()
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    for col in COLUMNS {
        let stored = record
            .fields
            .get(col.name)
            .and_then(|v| column_value(col.kind, v));
        if stored.is_some() {
            extra.remove(col.name);
        }
        params.push(stored.unwrap_or(SqlValue::Null));
    }

    params.push(if extra.is_empty() {
        SqlValue::Null
    } else {
        SqlValue::Text(serde_json::to_string(&extra)?)
    });
    params.push(
        record
            .signature
            .clone()
            .map_or(SqlValue::Null, SqlValue::Text),
    );
    Ok(params)
}

/// Decode a row. Damaged values are read leniently so that the record
/// still reaches the verifier and reports as a signature failure.
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    let id_text: String = row.get("id")?;
    let id = id_text.parse::<AuditEntryId>().unwrap_or_else(|e| {
        tracing::warn!(id = %id_text, error = %e, "unparseable audit record id");
        AuditEntryId(Uuid::nil())
    });

    let date_text: String = row.get("date")?;
    let timestamp = DateTime::parse_from_rfc3339(&date_text)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!(record_id = %id, date = %date_text, error = %e, "unparseable audit date");
            DateTime::<Utc>::UNIX_EPOCH
        });

    let mut fields = BTreeMap::new();
    for col in COLUMNS {
        let value = match (col.kind, row.get::<_, SqlValue>(col.name)?) {
            (_, SqlValue::Null) => continue,
            (ColumnKind::Bool, SqlValue::Integer(n)) => FieldValue::Bool(n != 0),
            (_, SqlValue::Integer(n)) => FieldValue::Int(n),
            (_, SqlValue::Text(s)) => FieldValue::Text(s),
            (_, SqlValue::Real(f)) => FieldValue::Text(f.to_string()),
            (_, SqlValue::Blob(b)) => FieldValue::Text(String::from_utf8_lossy(&b).into_owned()),
        };
        fields.insert(col.name.to_string(), value);
    }

    let extra: Option<String> = row.get("extra")?;
    if let Some(extra) = extra {
        match serde_json::from_str::<BTreeMap<String, FieldValue>>(&extra) {
            Ok(more) => fields.extend(more),
            Err(e) => tracing::warn!(record_id = %id, error = %e, "unparseable extra audit data"),
        }
    }

    Ok(AuditRecord {
        id,
        timestamp,
        fields,
        signature: row.get("signature")?,
    })
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        let params = insert_params(record)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&self.insert_sql)?;
        stmt.execute(params_from_iter(params.iter()))?;
        Ok(())
    }

    fn query(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        range: RowRange,
    ) -> AuditResult<Vec<AuditRecord>> {
        let mut params = Vec::new();
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "SELECT * FROM {TABLE}{} ORDER BY date {direction}, seq {direction} LIMIT ? OFFSET ?",
            where_clause(predicate, &mut params)
        );
        params.push(SqlValue::Integer(i64::from(range.limit)));
        params.push(SqlValue::Integer(to_i64(range.offset)));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn count(&self, predicate: &Predicate) -> AuditResult<u64> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {TABLE}{}",
            where_clause(predicate, &mut params)
        );
        let conn = self.lock()?;
        let n: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    fn high_water(&self) -> AuditResult<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            &format!("SELECT COALESCE(MAX(seq), 0) FROM {TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    fn scan(
        &self,
        predicate: &Predicate,
        range: ScanRange,
    ) -> AuditResult<Vec<(ScanCursor, AuditRecord)>> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {TABLE}{}", where_clause(predicate, &mut params));
        sql.push_str(" AND seq <= ?");
        params.push(SqlValue::Integer(to_i64(range.ceiling)));
        if let Some(after) = range.after {
            let _ = write!(
                sql,
                " AND (date, seq) > (SELECT date, seq FROM {TABLE} WHERE seq = ?)"
            );
            params.push(SqlValue::Integer(to_i64(after.seq)));
        }
        sql.push_str(" ORDER BY date ASC, seq ASC LIMIT ?");
        params.push(SqlValue::Integer(i64::from(range.limit)));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let seq: i64 = row.get("seq")?;
            let record = row_to_record(row)?;
            let cursor = ScanCursor {
                timestamp: record.timestamp,
                seq: u64::try_from(seq).unwrap_or_default(),
            };
            Ok((cursor, record))
        })?;

        let mut batch = Vec::new();
        for row in rows {
            batch.push(row?);
        }
        Ok(batch)
    }

    fn clear(&self) -> AuditResult<()> {
        self.lock()?.execute(&format!("DELETE FROM {TABLE}"), [])?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
