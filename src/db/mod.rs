pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Open (or create) the grimoire database at the given path, with schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // Enable WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Enable foreign keys
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Snapshot of database health used by the `doctor` command.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub project_count: u64,
    pub entity_count: u64,
    pub observation_count: u64,
    pub relation_count: u64,
    pub unresolved_relation_count: u64,
    pub search_row_count: u64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Count rows in every table and run `PRAGMA integrity_check`.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;

    Ok(HealthReport {
        schema_version: migrations::get_schema_version(conn)?,
        project_count: count("SELECT COUNT(*) FROM project")?,
        entity_count: count("SELECT COUNT(*) FROM entity")?,
        observation_count: count("SELECT COUNT(*) FROM observation")?,
        relation_count: count("SELECT COUNT(*) FROM relation")?,
        unresolved_relation_count: count("SELECT COUNT(*) FROM relation WHERE to_id IS NULL")?,
        search_row_count: count("SELECT COUNT(*) FROM search_index")?,
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
    })
}
