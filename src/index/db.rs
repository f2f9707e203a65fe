use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row, ToSql};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::schema::init_schema;
use super::{Dependency, FileRecord, Symbol, SymbolKind};
use crate::error::{Result, StorageError};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// A symbol row joined with its owning file, as returned by queries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SymbolRecord {
    pub id: i64,
    pub file: String,
    pub language: String,
    pub name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    pub col_start: u32,
    pub col_end: u32,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub parent: Option<String>,
}

const SYMBOL_COLUMNS: &str = "s.id, f.path, f.language, s.name, s.kind, s.line_start, s.line_end,
            s.col_start, s.col_end, s.signature, s.doc, s.parent";

/// Database handle over a pool of SQLite connections.
///
/// Connections are never shared across threads. Each indexing worker checks
/// out its own pooled connection, and per-file writes happen in a single
/// transaction so the store stays openable after an unclean termination.
#[derive(Clone)]
pub struct IndexDatabase {
    pool: ConnectionPool,
}

impl IndexDatabase {
    /// Create or open a database
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening index database at: {}", db_path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Open {
                path: db_path.clone(),
                reason: e.to_string(),
            })?;
        }

        let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Open {
                path: db_path.clone(),
                reason: e.to_string(),
            })?;

        // Initialize schema; idempotent on existing stores
        {
            let conn = pool.get().map_err(StorageError::Pool)?;
            init_schema(&conn).map_err(|e| StorageError::Migration(e.to_string()))?;
        }

        Ok(Self { pool })
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get().map_err(StorageError::Pool)?)
    }

    /// Replace a file's row and all of its symbol and dependency rows in one
    /// transaction. Returns the file id.
    pub fn upsert_file(
        &self,
        record: &FileRecord,
        symbols: &[Symbol],
        deps: &[Dependency],
    ) -> Result<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM files WHERE path = ?1",
                [&record.path],
                |row| row.get(0),
            )
            .optional()?;

        let file_id = match existing {
            Some(id) => {
                // symbol_refs cascade from symbols
                tx.execute("DELETE FROM symbols WHERE file_id = ?1", [id])?;
                tx.execute("DELETE FROM dependencies WHERE file_id = ?1", [id])?;
                tx.execute(
                    "UPDATE files
                     SET language = ?2, size_bytes = ?3, mtime = ?4,
                         content_hash = ?5, last_indexed = ?6
                     WHERE id = ?1",
                    params![
                        id,
                        record.language,
                        record.size_bytes as i64,
                        record.mtime,
                        record.content_hash,
                        record.last_indexed,
                    ],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO files (path, language, size_bytes, mtime, content_hash, last_indexed)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.path,
                        record.language,
                        record.size_bytes as i64,
                        record.mtime,
                        record.content_hash,
                        record.last_indexed,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        for symbol in symbols {
            tx.execute(
                "INSERT INTO symbols (
                    file_id, name, kind, line_start, line_end, col_start, col_end,
                    signature, doc, parent, snippet
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    file_id,
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.line_start,
                    symbol.line_end,
                    symbol.col_start,
                    symbol.col_end,
                    symbol.signature,
                    symbol.doc,
                    symbol.parent,
                    symbol.snippet,
                ],
            )?;
        }

        for dep in deps {
            tx.execute(
                "INSERT INTO dependencies (file_id, target, kind) VALUES (?1, ?2, ?3)",
                params![file_id, dep.target, dep.kind.as_str()],
            )?;
        }

        tx.commit()?;

        debug!(
            path = %record.path,
            symbols = symbols.len(),
            dependencies = deps.len(),
            "replaced file rows"
        );

        Ok(file_id)
    }

    /// Update only the indexed-time field, for files whose fingerprint is
    /// unchanged.
    pub fn touch_file(&self, path: &str, last_indexed: i64) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE files SET last_indexed = ?2 WHERE path = ?1",
            params![path, last_indexed],
        )?;
        Ok(())
    }

    /// Stored content fingerprint for a path, if the file was ever indexed.
    pub fn file_fingerprint(&self, path: &str) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        let hash = conn
            .query_row(
                "SELECT content_hash FROM files WHERE path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// Timestamp of the last completed run, None before the first run.
    pub fn last_run_timestamp(&self) -> Result<Option<i64>> {
        let conn = self.get_conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'last_indexed'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|ts| *ts > 0))
    }

    /// Write run metadata in one update: last-indexed timestamp plus file and
    /// symbol totals re-derived from aggregates.
    pub fn record_run(&self, finished_at: i64) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let total_files: i64 = tx.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let total_symbols: i64 =
            tx.query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;

        for (key, value) in [
            ("last_indexed", finished_at),
            ("total_files", total_files),
            ("total_symbols", total_symbols),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                params![key, value.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Aggregate status: (last run timestamp, file count, symbol count).
    /// Counts come from COUNT(*) so they survive crashes and stale metadata.
    pub fn status(&self) -> Result<(Option<i64>, u64, u64)> {
        let last = self.last_run_timestamp()?;
        let conn = self.get_conn()?;
        let files: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let symbols: i64 = conn.query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        Ok((last, files as u64, symbols as u64))
    }

    /// Delete all rows in dependency order and reset metadata to zero.
    pub fn clear(&self) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM symbol_refs", [])?;
        tx.execute("DELETE FROM dependencies", [])?;
        tx.execute("DELETE FROM symbols", [])?;
        tx.execute("DELETE FROM files", [])?;
        for key in ["total_symbols", "total_files", "last_indexed"] {
            tx.execute(
                "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
                 VALUES (?1, '0', CURRENT_TIMESTAMP)",
                [key],
            )?;
        }
        tx.commit()?;
        info!("index cleared");
        Ok(())
    }

    /// Substring search on symbol name with optional kind and language
    /// filters, ordered by name.
    pub fn search_symbols(
        &self,
        query: &str,
        kind: Option<SymbolKind>,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SymbolRecord>> {
        let conn = self.get_conn()?;

        let pattern = format!("%{}%", escape_like(query));
        let limit = limit as i64;
        let kind_str = kind.map(|k| k.as_str());

        let mut sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE s.name LIKE ? ESCAPE '\\'"
        );
        let mut args: Vec<&dyn ToSql> = vec![&pattern];
        if let Some(ref k) = kind_str {
            sql.push_str(" AND s.kind = ?");
            args.push(k);
        }
        if let Some(ref l) = language {
            sql.push_str(" AND f.language = ?");
            args.push(l);
        }
        sql.push_str(" ORDER BY s.name LIMIT ?");
        args.push(&limit);

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(rusqlite::params_from_iter(args), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Declarations matching a name exactly, optionally scoped to one file.
    pub fn declarations(&self, name: &str, file: Option<&str>) -> Result<Vec<SymbolRecord>> {
        let conn = self.get_conn()?;

        let records = if let Some(file) = file {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYMBOL_COLUMNS} FROM symbols s JOIN files f ON f.id = s.file_id
                 WHERE s.name = ?1 AND f.path = ?2 ORDER BY f.path, s.line_start"
            ))?;
            let result = stmt
                .query_map(params![name, file], row_to_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            result
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYMBOL_COLUMNS} FROM symbols s JOIN files f ON f.id = s.file_id
                 WHERE s.name = ?1 ORDER BY f.path, s.line_start"
            ))?;
            let result = stmt
                .query_map([name], row_to_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            result
        };

        Ok(records)
    }

    /// All symbols for one file, ordered by start line.
    pub fn file_symbols(&self, path: &str) -> Result<Vec<SymbolRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE f.path = ?1 ORDER BY s.line_start"
        ))?;
        let records = stmt
            .query_map([path], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Smallest symbol whose line range contains the given line.
    pub fn symbol_at(&self, path: &str, line: u32) -> Result<Option<SymbolRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE f.path = ?1 AND s.line_start <= ?2 AND s.line_end >= ?2
             ORDER BY (s.line_end - s.line_start) ASC, s.line_start DESC
             LIMIT 1"
        ))?;
        let record = stmt.query_row(params![path, line], row_to_record).optional()?;
        Ok(record)
    }

    /// Forward dependency edges for a file: raw import targets.
    pub fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT d.target FROM dependencies d JOIN files f ON f.id = d.file_id
             WHERE f.path = ?1 ORDER BY d.target",
        )?;
        let targets = stmt
            .query_map([path], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    /// Files whose dependency targets contain the given module string.
    /// Substring match, since targets are unresolved module references.
    pub fn dependents_of(&self, module: &str) -> Result<Vec<String>> {
        let conn = self.get_conn()?;
        let pattern = format!("%{}%", escape_like(module));
        let mut stmt = conn.prepare(
            "SELECT DISTINCT f.path FROM dependencies d JOIN files f ON f.id = d.file_id
             WHERE d.target LIKE ?1 ESCAPE '\\' ORDER BY f.path",
        )?;
        let paths = stmt
            .query_map([pattern], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(paths)
    }
}

/// Convert database row to SymbolRecord
fn row_to_record(row: &Row) -> rusqlite::Result<SymbolRecord> {
    let kind_str: String = row.get(4)?;
    let kind = SymbolKind::parse(&kind_str).unwrap_or(SymbolKind::Function);

    Ok(SymbolRecord {
        id: row.get(0)?,
        file: row.get(1)?,
        language: row.get(2)?,
        name: row.get(3)?,
        kind,
        line_start: row.get::<_, i64>(5)? as u32,
        line_end: row.get::<_, i64>(6)? as u32,
        col_start: row.get::<_, i64>(7)? as u32,
        col_end: row.get::<_, i64>(8)? as u32,
        signature: row.get(9)?,
        doc: row.get(10)?,
        parent: row.get(11)?,
    })
}

/// Escape LIKE special characters so user input matches literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
