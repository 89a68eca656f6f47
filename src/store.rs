// Copyright 2026 Corpus Probe Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tabular store abstraction and the SQLite-backed warehouse.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::functions::FunctionFlags;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::model::DocumentRecord;
use crate::model::TableRef;
use crate::query::CONTAINS_SUBSTR;
use crate::query::ScoreQuery;
use crate::query::ScoredRow;
use crate::query::contains_substr;
use crate::sql::ColumnDef;
use crate::sql::SqlType;
use crate::sql::create_table_sql;
use crate::sql::insert_sql;

/// Narrow interface to the external tabular store.
pub trait Warehouse {
    /// Replaces the whole contents of `table` with `records` in one write.
    fn bulk_replace(&mut self, table: &TableRef, records: &[DocumentRecord]) -> Result<usize>;

    fn query(&self, query: &ScoreQuery) -> Result<Vec<ScoredRow>>;

    /// `None` when the table has never been loaded.
    fn table_stats(&self, table: &TableRef) -> Result<Option<TableStats>>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableStats {
    pub table: String,
    pub row_count: i64,
    pub categories: BTreeMap<String, i64>,
    pub loaded_at: Option<String>,
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub struct SqliteWarehouse {
    pub conn: Connection,
    pub path: PathBuf,
    mode: StoreMode,
    _lock: StoreLock,
}

/// Advisory lock held for the lifetime of the store; the lock file itself is
/// never removed.
struct StoreLock {
    _file: File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

const LOAD_LOG_TABLE: &str = "probe_load";

impl SqliteWarehouse {
    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        if matches!(mode, StoreMode::ReadOnly) && !path.exists() {
            anyhow::bail!(
                "store not found at {}; run `probe upload` first",
                path.display()
            );
        }
        let lock = Self::acquire_lock(path, mode)?;
        let conn = Self::open_connection(path, mode)?;
        if matches!(mode, StoreMode::ReadWrite) {
            conn.execute_batch(
                "PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\nCREATE TABLE IF NOT EXISTS probe_load (\n  table_name TEXT PRIMARY KEY,\n  row_count INTEGER,\n  loaded_at TEXT\n);",
            )
            .context("apply pragmas")?;
        }
        Self::register_functions(&conn)?;
        debug!(path = %path.display(), ?mode, "opened store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            mode,
            _lock: lock,
        })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn register_functions(conn: &Connection) -> Result<()> {
        conn.create_scalar_function(
            CONTAINS_SUBSTR,
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let haystack: Option<String> = ctx.get(0)?;
                let needle: Option<String> = ctx.get(1)?;
                Ok(match (haystack, needle) {
                    (Some(haystack), Some(needle)) => contains_substr(&haystack, &needle),
                    _ => false,
                })
            },
        )
        .context("register contains_substr")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("corpus-probe");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("probe-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => FileExt::try_lock_shared(&file),
                StoreMode::ReadWrite => FileExt::try_lock_exclusive(&file),
            };
            match locked {
                Ok(()) => return Ok(StoreLock { _file: file }),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![table.to_string()],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }
}

impl Warehouse for SqliteWarehouse {
    fn bulk_replace(&mut self, table: &TableRef, records: &[DocumentRecord]) -> Result<usize> {
        if !matches!(self.mode, StoreMode::ReadWrite) {
            anyhow::bail!("store {} is open read-only", self.path.display());
        }
        let rows = records
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()
            .context("serialize records")?;
        let columns = infer_columns(&rows)?;
        let create = create_table_sql(table, &columns)?;
        let insert = insert_sql(table, &columns);

        let tx = self.conn.transaction().context("begin load")?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", table.quoted()), [])
            .with_context(|| format!("drop {table}"))?;
        tx.execute(&create, [])
            .with_context(|| format!("create {table}"))?;
        {
            let mut stmt = tx.prepare(&insert).context("prepare insert")?;
            for row in &rows {
                let values = columns.iter().map(|c| json_to_sql(row.get(&c.name)));
                stmt.execute(params_from_iter(values))
                    .with_context(|| format!("insert into {table}"))?;
            }
        }
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {LOAD_LOG_TABLE} (table_name, row_count, loaded_at) VALUES (?1, ?2, ?3)"
            ),
            params![table.to_string(), rows.len() as i64, now_rfc3339()],
        )
        .context("record load")?;
        tx.commit().context("commit load")?;
        Ok(rows.len())
    }

    fn query(&self, query: &ScoreQuery) -> Result<Vec<ScoredRow>> {
        let (sql, params) = query.to_sql();
        debug!(%sql, "running scored query");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare query on {}", query.table))?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok(ScoredRow {
                document_id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                file_type: row.get(3)?,
                score: row.get(4)?,
                relevance_score: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn table_stats(&self, table: &TableRef) -> Result<Option<TableStats>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let row_count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.quoted()), [], |row| {
                row.get(0)
            })
            .with_context(|| format!("count {table}"))?;

        let mut categories = BTreeMap::new();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT category, COUNT(*) FROM {} GROUP BY category",
            table.quoted()
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (category, count) = row?;
            categories.insert(category, count);
        }

        let loaded_at: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT loaded_at FROM {LOAD_LOG_TABLE} WHERE table_name = ?1"),
                params![table.to_string()],
                |row| row.get(0),
            )
            .optional()
            .context("read load log")?;

        Ok(Some(TableStats {
            table: table.to_string(),
            row_count,
            categories,
            loaded_at,
        }))
    }
}

/// Infers a column list from serialized rows.
///
/// Integers widen to REAL when mixed with floats; anything mixed with a
/// string becomes TEXT. Columns that are null in every row are TEXT.
pub fn infer_columns(rows: &[JsonValue]) -> Result<Vec<ColumnDef>> {
    let Some(first) = rows.first() else {
        anyhow::bail!("cannot infer a schema from zero rows");
    };
    let Some(first) = first.as_object() else {
        anyhow::bail!("rows must serialize to objects");
    };
    let mut columns: Vec<(String, Option<SqlType>)> =
        first.keys().map(|k| (k.clone(), None)).collect();
    for row in rows {
        let Some(obj) = row.as_object() else {
            anyhow::bail!("rows must serialize to objects");
        };
        for (name, ty) in columns.iter_mut() {
            let observed = obj.get(name.as_str()).and_then(json_type);
            *ty = match (*ty, observed) {
                (current, None) => current,
                (None, Some(seen)) => Some(seen),
                (Some(a), Some(b)) if a == b => Some(a),
                (Some(SqlType::Integer), Some(SqlType::Real))
                | (Some(SqlType::Real), Some(SqlType::Integer)) => Some(SqlType::Real),
                _ => Some(SqlType::Text),
            };
        }
    }
    Ok(columns
        .into_iter()
        .map(|(name, ty)| ColumnDef {
            name,
            ty: ty.unwrap_or(SqlType::Text),
        })
        .collect())
}

fn json_type(value: &JsonValue) -> Option<SqlType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(SqlType::Integer),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(SqlType::Integer),
        JsonValue::Number(_) => Some(SqlType::Real),
        _ => Some(SqlType::Text),
    }
}

fn json_to_sql(value: Option<&JsonValue>) -> SqlValue {
    match value {
        None | Some(JsonValue::Null) => SqlValue::Null,
        Some(JsonValue::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Some(JsonValue::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::config::ScoringConfig;
    use crate::model::Category;

    fn record(id: i64, title: &str, text: &str, relevance: f64) -> DocumentRecord {
        DocumentRecord {
            document_id: id,
            title: title.to_string(),
            full_text: text.to_string(),
            file_path: format!("/tmp/{title}"),
            file_type: ".sql".to_string(),
            length: text.chars().count() as i64,
            category: Category::SqlScripts,
            relevance_score: relevance,
        }
    }

    fn table() -> TableRef {
        TableRef::new("proj", "ds", "docs")
    }

    #[test]
    fn infer_columns_from_records() -> Result<()> {
        let rows = vec![serde_json::to_value(record(1, "a.sql", "select 1", 0.5))?];
        let columns = infer_columns(&rows)?;
        let lookup = |name: &str| columns.iter().find(|c| c.name == name).map(|c| c.ty);
        assert_eq!(columns.len(), 8);
        assert_eq!(lookup("document_id"), Some(SqlType::Integer));
        assert_eq!(lookup("relevance_score"), Some(SqlType::Real));
        assert_eq!(lookup("category"), Some(SqlType::Text));
        assert_eq!(lookup("length"), Some(SqlType::Integer));
        Ok(())
    }

    #[test]
    fn infer_columns_widens_mixed_types() -> Result<()> {
        let rows = vec![
            json!({"a": 1, "b": 1, "c": null}),
            json!({"a": 1.5, "b": "x", "c": null}),
        ];
        let columns = infer_columns(&rows)?;
        let types: Vec<SqlType> = columns.iter().map(|c| c.ty).collect();
        assert_eq!(types, vec![SqlType::Real, SqlType::Text, SqlType::Text]);
        assert!(infer_columns(&[]).is_err());
        Ok(())
    }

    #[test]
    fn bulk_replace_swaps_table_contents() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("probe.db");
        let mut store = SqliteWarehouse::open(&db_path, StoreMode::ReadWrite)?;

        let loaded = store.bulk_replace(
            &table(),
            &[record(1, "a.sql", "select 1", 0.1), record(2, "b.sql", "select 2", 0.2)],
        )?;
        assert_eq!(loaded, 2);
        let loaded = store.bulk_replace(&table(), &[record(1, "c.sql", "select 3", 0.3)])?;
        assert_eq!(loaded, 1);

        let stats = store.table_stats(&table())?.expect("stats");
        assert_eq!(stats.row_count, 1);
        assert_eq!(stats.categories.get("SQL Scripts"), Some(&1));
        assert!(stats.loaded_at.is_some());
        Ok(())
    }

    #[test]
    fn query_matches_case_insensitively() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("probe.db");
        let mut store = SqliteWarehouse::open(&db_path, StoreMode::ReadWrite)?;
        store.bulk_replace(
            &table(),
            &[
                record(1, "users.sql", "SELECT name FROM users", 1.0),
                record(2, "notes.sql", "nothing relevant", 2.0),
            ],
        )?;

        let query = ScoreQuery::new(table(), "select", 3, &ScoringConfig::default());
        let rows = store.query(&query)?;
        assert_eq!(rows[0].document_id, 1);
        assert!((rows[0].score - 3.1).abs() < 1e-9);
        assert_eq!(rows[0].category, "SQL Scripts");
        assert_eq!(rows.len(), 2);
        Ok(())
    }

    #[test]
    fn query_on_missing_table_errors() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("probe.db");
        let store = SqliteWarehouse::open(&db_path, StoreMode::ReadWrite)?;
        let query = ScoreQuery::new(table(), "x", 3, &ScoringConfig::default());
        assert!(store.query(&query).is_err());
        assert!(store.table_stats(&table())?.is_none());
        Ok(())
    }

    #[test]
    fn lock_file_survives_close_and_is_reacquired() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("probe.db");
        drop(SqliteWarehouse::open(&db_path, StoreMode::ReadWrite)?);
        let lock_path = SqliteWarehouse::lock_path_for(&db_path)?;
        assert!(lock_path.exists());

        let mut store = SqliteWarehouse::open(&db_path, StoreMode::ReadWrite)?;
        store.bulk_replace(&table(), &[record(1, "a.sql", "select 1", 0.1)])?;
        drop(store);
        let reader = SqliteWarehouse::open(&db_path, StoreMode::ReadOnly)?;
        assert_eq!(reader.table_stats(&table())?.map(|s| s.row_count), Some(1));
        Ok(())
    }

    #[test]
    fn read_only_open_requires_existing_store() {
        let dir = tempdir().expect("tempdir");
        let err = SqliteWarehouse::open(&dir.path().join("absent.db"), StoreMode::ReadOnly)
            .err()
            .expect("missing store");
        assert!(err.to_string().contains("store not found"));
    }

    #[test]
    fn read_only_store_rejects_writes() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("probe.db");
        drop(SqliteWarehouse::open(&db_path, StoreMode::ReadWrite)?);
        let mut store = SqliteWarehouse::open(&db_path, StoreMode::ReadOnly)?;
        assert!(store.bulk_replace(&table(), &[record(1, "a.sql", "x", 0.0)]).is_err());
        Ok(())
    }
}
