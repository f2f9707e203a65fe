use rusqlite::{Connection, Result};
use tracing::{debug, info};

/// SQLite schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    info!("Initializing symdex schema v{}", SCHEMA_VERSION);

    // Create schema version table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Check current version
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    debug!("Current schema version: {}", current_version);

    if current_version < SCHEMA_VERSION {
        info!(
            "Upgrading schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        apply_migrations(conn, current_version)?;
    }

    Ok(())
}

/// Apply migrations from current version to latest
fn apply_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    for version in (from_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration v{}", version);
        match version {
            1 => create_v1_schema(conn)?,
            _ => unreachable!("Unknown schema version: {}", version),
        }

        // Record migration
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    }

    Ok(())
}

/// Create v1 schema (initial schema)
fn create_v1_schema(conn: &Connection) -> Result<()> {
    info!("Creating v1 schema tables");

    // Files table - one row per indexed file
    conn.execute(
        "CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            language TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            mtime INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            last_indexed INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_files_language
         ON files(language)",
        [],
    )?;

    // Symbols table - declarations extracted from files, replaced as a unit
    // with their owning file row
    conn.execute(
        "CREATE TABLE IF NOT EXISTS symbols (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            line_start INTEGER NOT NULL,
            line_end INTEGER NOT NULL,
            col_start INTEGER NOT NULL DEFAULT 0,
            col_end INTEGER NOT NULL DEFAULT 0,
            signature TEXT,
            doc TEXT,
            parent TEXT,
            snippet TEXT,
            FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_symbols_name
         ON symbols(name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_symbols_kind
         ON symbols(kind)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_symbols_file
         ON symbols(file_id)",
        [],
    )?;

    // Dependencies table - directed edges from a file to raw module targets
    conn.execute(
        "CREATE TABLE IF NOT EXISTS dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            target TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'import',
            FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_dependencies_file
         ON dependencies(file_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_dependencies_target
         ON dependencies(target)",
        [],
    )?;

    // Symbol references table - usage sites, population optional
    conn.execute(
        "CREATE TABLE IF NOT EXISTS symbol_refs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol_id INTEGER NOT NULL,
            file_id INTEGER NOT NULL,
            line INTEGER NOT NULL,
            col INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (symbol_id) REFERENCES symbols(id) ON DELETE CASCADE,
            FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Index metadata table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Insert initial metadata
    conn.execute(
        "INSERT OR IGNORE INTO index_meta (key, value)
         VALUES ('total_symbols', '0')",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO index_meta (key, value)
         VALUES ('total_files', '0')",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO index_meta (key, value)
         VALUES ('last_indexed', '0')",
        [],
    )?;

    info!("v1 schema created successfully");

    Ok(())
}

/// Drop all tables (for testing/rebuilding)
pub fn drop_schema(conn: &Connection) -> Result<()> {
    info!("Dropping all schema tables");

    conn.execute("DROP TABLE IF EXISTS schema_version", [])?;
    conn.execute("DROP TABLE IF EXISTS index_meta", [])?;
    conn.execute("DROP TABLE IF EXISTS symbol_refs", [])?;
    conn.execute("DROP TABLE IF EXISTS dependencies", [])?;
    conn.execute("DROP TABLE IF EXISTS symbols", [])?;
    conn.execute("DROP TABLE IF EXISTS files", [])?;

    Ok(())
}
