#![allow(dead_code)]

use grimoire::db;
use grimoire::knowledge::types::{Entity, EntityDraft};
use grimoire::knowledge::{slugify, store, ContentReader};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Create (or fetch) a project by name. Returns its id.
pub fn project(conn: &Connection, name: &str) -> i64 {
    store::get_or_create_project(conn, name, &format!("/tmp/{name}"))
        .unwrap()
        .id
}

/// Insert a markdown note at `<slug>.md`. Returns the entity id.
pub fn note(conn: &Connection, project_id: i64, title: &str) -> i64 {
    let draft = EntityDraft::note(title, &format!("{}.md", slugify(title)));
    store::insert_entity(conn, project_id, &draft).unwrap()
}

/// Insert a markdown note with an explicit permalink.
pub fn note_at(conn: &Connection, project_id: i64, title: &str, permalink: &str) -> i64 {
    let mut draft = EntityDraft::note(title, &format!("{permalink}.md"));
    draft.permalink = Some(permalink.to_string());
    store::insert_entity(conn, project_id, &draft).unwrap()
}

/// Insert a markdown note with a `tags` list in its metadata.
pub fn tagged_note(conn: &Connection, project_id: i64, title: &str, tags: &[&str]) -> i64 {
    let draft = EntityDraft::note(title, &format!("{}.md", slugify(title)))
        .with_metadata(json!({ "tags": tags }));
    store::insert_entity(conn, project_id, &draft).unwrap()
}

/// Load an entity with its observations and outgoing relations.
pub fn load(conn: &Connection, project_id: i64, id: i64) -> Entity {
    store::load_entity(conn, project_id, id).unwrap().unwrap()
}

/// Overwrite an entity's timestamps, for date-window tests.
pub fn set_dates(conn: &Connection, id: i64, created_at: &str, updated_at: &str) {
    conn.execute(
        "UPDATE entity SET created_at = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![created_at, updated_at, id],
    )
    .unwrap();
}

/// Index rows in a project, optionally of one type.
pub fn index_rows(conn: &Connection, project_id: i64, item_type: Option<&str>) -> i64 {
    match item_type {
        Some(t) => conn.query_row(
            "SELECT COUNT(*) FROM search_index WHERE project_id = ?1 AND type = ?2",
            rusqlite::params![project_id, t],
            |row| row.get(0),
        ),
        None => conn.query_row(
            "SELECT COUNT(*) FROM search_index WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        ),
    }
    .unwrap()
}

/// Note bodies keyed by file path. Markdown only, like the on-disk reader.
#[derive(Default)]
pub struct MapContent(HashMap<String, String>);

impl MapContent {
    pub fn with(mut self, file_path: &str, body: &str) -> Self {
        self.0.insert(file_path.to_string(), body.to_string());
        self
    }
}

impl ContentReader for MapContent {
    fn read_content(&self, entity: &Entity) -> anyhow::Result<Option<String>> {
        if !entity.is_markdown() {
            return Ok(None);
        }
        Ok(self.0.get(&entity.file_path).cloned())
    }
}
