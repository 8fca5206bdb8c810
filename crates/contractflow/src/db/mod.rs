//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`.
//!
//! Workflow records (jobs, proposals, contracts) carry a `version` column.
//! Their `update` functions are compare-and-swap writes: the row is only
//! written when the stored version still equals the version the caller read,
//! otherwise [`DatabaseError::VersionConflict`] is returned.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub mod contract_repo;
pub mod directory_repo;
pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod proposal_repo;
pub mod template_repo;

pub use error::DatabaseError;

/// Default page size for `query` functions when no limit is given.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.contractflow/data/contractflow.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| {
        h.join(".contractflow")
            .join("data")
            .join("contractflow.db")
    })
}

/// Current time in the RFC 3339 format every timestamp column uses.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Builds a `WHERE` clause from `column = ?` style conditions.
///
/// Shared by the `query` functions of the repositories. Returns the clause
/// (empty when there are no conditions) and the boxed parameter values.
pub(crate) struct WhereBuilder {
    conditions: Vec<String>,
    values: Vec<Box<dyn rusqlite::types::ToSql>>,
}

impl WhereBuilder {
    pub(crate) fn new() -> Self {
        Self {
            conditions: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Adds `<column> <op> ?N` when `value` is present.
    pub(crate) fn push(&mut self, column: &str, op: &str, value: Option<&String>) {
        if let Some(value) = value {
            self.conditions
                .push(format!("{} {} ?{}", column, op, self.values.len() + 1));
            self.values.push(Box::new(value.clone()));
        }
    }

    pub(crate) fn clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Counts the matching rows, then fetches one page of them ordered by
    /// `created_at DESC`.
    pub(crate) fn fetch_page<T, F>(
        mut self,
        conn: &Connection,
        table: &str,
        limit: Option<u64>,
        offset: Option<u64>,
        map_row: F,
    ) -> Result<(Vec<T>, u64), DatabaseError>
    where
        F: FnMut(&rusqlite::Row<'_>) -> Result<T, rusqlite::Error>,
    {
        let where_clause = self.clause();

        let count_sql = format!("SELECT COUNT(*) FROM {} {}", table, where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            self.values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE) as i64;
        let offset = offset.unwrap_or(0) as i64;
        self.values.push(Box::new(limit));
        self.values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM {} {} ORDER BY created_at DESC, id ASC LIMIT ?{} OFFSET ?{}",
            table,
            where_clause,
            self.values.len() - 1,
            self.values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            self.values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    }
}
