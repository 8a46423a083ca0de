//! SQL DDL for all grimoire tables.
//!
//! Defines the `project`, `entity`, `observation`, `relation`, and `schema_meta`
//! tables, then creates the `search_index` FTS5 table through
//! [`crate::search::index::create_search_table`]. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the knowledge tables.
const SCHEMA_SQL: &str = r#"
-- Named scopes; every other row belongs to exactly one project
CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- One row per file in a project
CREATE TABLE IF NOT EXISTS entity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    permalink TEXT,
    file_path TEXT NOT NULL,
    content_type TEXT NOT NULL,
    checksum TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(project_id, permalink),
    UNIQUE(project_id, file_path)
);

CREATE INDEX IF NOT EXISTS idx_entity_project ON entity(project_id);
CREATE INDEX IF NOT EXISTS idx_entity_title ON entity(project_id, title);

-- Categorized annotations owned by one entity
CREATE TABLE IF NOT EXISTS observation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    entity_id INTEGER NOT NULL REFERENCES entity(id) ON DELETE CASCADE,
    category TEXT NOT NULL DEFAULT 'note',
    content TEXT NOT NULL,
    tags TEXT
);

CREATE INDEX IF NOT EXISTS idx_observation_entity ON observation(entity_id);

-- Directed edges; to_id stays NULL until a matching target entity exists
CREATE TABLE IF NOT EXISTS relation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    from_id INTEGER NOT NULL REFERENCES entity(id) ON DELETE CASCADE,
    to_id INTEGER REFERENCES entity(id) ON DELETE SET NULL,
    to_name TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    context TEXT,
    UNIQUE(from_id, to_name, relation_type)
);

CREATE INDEX IF NOT EXISTS idx_relation_from ON relation(from_id);
CREATE INDEX IF NOT EXISTS idx_relation_to ON relation(to_id);
CREATE INDEX IF NOT EXISTS idx_relation_to_name ON relation(project_id, to_name);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    crate::search::index::create_search_table(conn)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in ["project", "entity", "observation", "relation", "schema_meta", "search_index"] {
            assert!(tables.contains(&table.to_string()), "{table} table missing");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }
}
