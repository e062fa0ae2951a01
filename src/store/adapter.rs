//! Typed wrapper over the SQLite connection.
//!
//! Owns the connection and its prepared-statement cache. All SQL produced by
//! the translator and the loaders goes through `execute` or a transaction
//! handle; nothing else in the crate touches rusqlite directly.

use std::path::Path;
use std::sync::Mutex;

use log::debug;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use serde_json::Value;

use super::StoreError;
use crate::properties::SqlParam;

/// Result of one statement: rows (for queries), plus the change counters the
/// store reports.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub changes: usize,
    pub last_insert_id: i64,
}

/// Thread-safe store handle for one tenant database.
pub struct StoreAdapter {
    conn: Mutex<Connection>,
}

impl StoreAdapter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(StoreAdapter {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(StoreAdapter {
            conn: Mutex::new(conn),
        })
    }

    /// Schema bootstrap: tables, indexes, foreign keys, the legacy label
    /// upgrade, and the scalar functions the query generator renders.
    fn init(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                label JSON NOT NULL,
                properties JSON DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                properties JSON DEFAULT '{}',
                FOREIGN KEY (source_id) REFERENCES nodes(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES nodes(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_primary_label
                ON nodes(json_extract(label, '$[0]'));
            CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(type);
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

            -- Legacy rows stored a bare text label; upgrade in place.
            UPDATE nodes SET label = json_array(label) WHERE json_valid(label) = 0;
            "#,
        )?;
        register_functions(conn)?;
        Ok(())
    }

    /// Run one statement outside any explicit transaction.
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<ExecOutcome, StoreError> {
        let conn = self.conn.lock().unwrap();
        run_statement(&conn, sql, params)
    }

    /// Run `f` inside a transaction; commit on Ok, roll back on Err.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&TxHandle<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let handle = TxHandle { tx: &tx };
        let value = f(&handle)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// Statement access scoped to one open transaction.
pub struct TxHandle<'a> {
    tx: &'a rusqlite::Transaction<'a>,
}

impl TxHandle<'_> {
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<ExecOutcome, StoreError> {
        run_statement(self.tx, sql, params)
    }
}

fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &[SqlParam],
) -> Result<ExecOutcome, StoreError> {
    debug!("store: {} ({} params)", sql.replace('\n', " "), params.len());
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let mut out_rows = Vec::new();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            cells.push(cell_to_json(row.get_ref(i)?));
        }
        out_rows.push(cells);
    }
    drop(rows);
    drop(stmt);

    Ok(ExecOutcome {
        columns,
        rows: out_rows,
        changes: conn.changes() as usize,
        last_insert_id: conn.last_insert_rowid(),
    })
}

fn cell_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        // The pipeline never writes blobs.
        ValueRef::Blob(_) => Value::Null,
    }
}

/// Scalar functions the Cypher surface needs but SQLite lacks. All of them
/// return JSON text so the generator can tag their columns for decoding.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("cypher_split", 2, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let sep: String = ctx.get(1)?;
        let parts: Vec<Value> = if sep.is_empty() {
            vec![Value::String(text)]
        } else {
            text.split(sep.as_str())
                .map(|p| Value::String(p.to_string()))
                .collect()
        };
        Ok(Value::Array(parts).to_string())
    })?;

    conn.create_scalar_function("cypher_reverse", 1, flags, |ctx| {
        let raw: String = ctx.get(0)?;
        // Arrays reverse element-wise, anything else as a string.
        if let Ok(Value::Array(mut items)) = serde_json::from_str::<Value>(&raw) {
            items.reverse();
            return Ok(Value::Array(items).to_string());
        }
        Ok(Value::String(raw.chars().rev().collect::<String>()).to_string())
    })?;

    conn.create_scalar_function("cypher_range", 2, flags, |ctx| {
        let start: i64 = ctx.get(0)?;
        let end: i64 = ctx.get(1)?;
        Ok(range_json(start, end, 1))
    })?;
    conn.create_scalar_function("cypher_range", 3, flags, |ctx| {
        let start: i64 = ctx.get(0)?;
        let end: i64 = ctx.get(1)?;
        let step: i64 = ctx.get(2)?;
        Ok(range_json(start, end, step))
    })?;

    Ok(())
}

fn range_json(start: i64, end: i64, step: i64) -> String {
    let mut items = Vec::new();
    if step > 0 {
        let mut v = start;
        while v <= end {
            items.push(Value::from(v));
            v += step;
        }
    } else if step < 0 {
        let mut v = start;
        while v >= end {
            items.push(Value::from(v));
            v += step;
        }
    }
    Value::Array(items).to_string()
}
