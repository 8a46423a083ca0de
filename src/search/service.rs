//! Keeps the search index in step with the knowledge tables.
//!
//! [`SearchService`] derives index rows from eagerly loaded entities and owns
//! the delete-then-insert discipline: every write for an entity first removes
//! everything that entity previously contributed.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

use crate::config::IndexConfig;
use crate::error::SearchError;
use crate::knowledge::types::{Entity, Observation, Relation};
use crate::knowledge::{store, ContentReader};
use crate::search::index::{IndexedItem, SearchIndex, SearchIndexRow, SearchResult};
use crate::search::query::SearchQuery;
use crate::search::stems::{StemBuilder, StemOptions};

const OBSERVATION_TITLE_CHARS: usize = 100;

/// Totals from a full project rebuild.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReindexReport {
    pub entities: usize,
    pub rows: usize,
}

pub struct SearchService<'c> {
    index: SearchIndex<'c>,
    content: &'c dyn ContentReader,
    stems: StemOptions,
    snippet_chars: usize,
}

impl<'c> SearchService<'c> {
    pub fn new(conn: &'c Connection, project_id: i64, content: &'c dyn ContentReader) -> Self {
        let defaults = IndexConfig::default();
        Self {
            index: SearchIndex::new(conn, project_id),
            content,
            stems: defaults.stem_options(),
            snippet_chars: defaults.snippet_chars,
        }
    }

    pub fn with_config(mut self, config: &IndexConfig) -> Self {
        self.stems = config.stem_options();
        self.snippet_chars = config.snippet_chars;
        self
    }

    pub fn index(&self) -> &SearchIndex<'c> {
        &self.index
    }

    pub fn init_search_index(&self) -> Result<(), SearchError> {
        self.index.init_search_index()
    }

    /// Rebuild this project's rows from scratch.
    pub fn reindex_all(&self) -> Result<ReindexReport> {
        self.reindex_all_with(|_, _| {})
    }

    /// [`Self::reindex_all`] with a callback invoked as `(done, total)` after each entity.
    ///
    /// The purge is limited to this project's rows so other projects sharing
    /// the table keep their index. The rebuild runs in one transaction.
    pub fn reindex_all_with(&self, mut progress: impl FnMut(usize, usize)) -> Result<ReindexReport> {
        let project_id = self.index.project_id();
        let conn = self.index.conn();
        let entities = store::list_entities(conn, project_id)?;
        let total = entities.len();
        tracing::info!(project_id, entities = total, "rebuilding search index");

        let tx = conn.unchecked_transaction()?;
        self.index.init_search_index()?;
        let purged = self.index.clear_project()?;
        let mut report = ReindexReport::default();
        for (i, entity) in entities.iter().enumerate() {
            report.rows += self
                .write_entity_rows(entity)
                .with_context(|| format!("failed to index entity {}", entity.id))?;
            report.entities += 1;
            progress(i + 1, total);
        }
        tx.commit()?;

        tracing::info!(
            project_id,
            purged,
            entities = report.entities,
            rows = report.rows,
            "search index rebuilt"
        );
        Ok(report)
    }

    /// Replace every row the entity contributes. Returns the number of rows written.
    ///
    /// Two concurrent calls for the same entity are last-writer-wins.
    pub fn index_entity(&self, entity: &Entity) -> Result<usize> {
        let tx = self.index.conn().unchecked_transaction()?;
        let rows = self.write_entity_rows(entity)?;
        tx.commit()?;
        tracing::debug!(entity_id = entity.id, rows, "entity indexed");
        Ok(rows)
    }

    pub fn delete_by_entity_id(&self, entity_id: i64) -> Result<usize, SearchError> {
        self.index.delete_by_entity_id(entity_id)
    }

    pub fn delete_by_permalink(&self, permalink: &str) -> Result<usize, SearchError> {
        self.index.delete_by_permalink(permalink)
    }

    /// Remove every row for an entity that is leaving the system: its own row,
    /// its observations and its outgoing relations. Items are removed by
    /// permalink when they have one and by owning entity id otherwise.
    pub fn handle_delete(&self, entity: &Entity) -> Result<usize> {
        let tx = self.index.conn().unchecked_transaction()?;
        let permalinks = std::iter::once(entity.permalink.as_deref())
            .chain(entity.observations.iter().map(|o| o.permalink.as_deref()))
            .chain(entity.relations.iter().map(|r| r.permalink.as_deref()));

        let mut removed = 0;
        let mut needs_sweep = false;
        for permalink in permalinks {
            match permalink {
                Some(p) => removed += self.index.delete_by_permalink(p)?,
                None => needs_sweep = true,
            }
        }
        if needs_sweep {
            removed += self.index.delete_by_entity_id(entity.id)?;
        }
        tx.commit()?;

        tracing::debug!(entity_id = entity.id, removed, "entity removed from search index");
        Ok(removed)
    }

    pub fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.index.search(query, limit, offset)
    }

    /// Derive the full row set for an entity. `content` is the body, if any.
    pub fn build_rows(&self, entity: &Entity, content: Option<&str>) -> Vec<SearchIndexRow> {
        let mut rows = Vec::with_capacity(1 + entity.observations.len() + entity.relations.len());
        rows.push(self.entity_row(entity, content));
        rows.extend(entity.observations.iter().map(|o| self.observation_row(entity, o)));
        rows.extend(entity.relations.iter().map(|r| self.relation_row(entity, r)));
        rows
    }

    fn write_entity_rows(&self, entity: &Entity) -> Result<usize> {
        let content = self.content.read_content(entity)?;
        let rows = self.build_rows(entity, content.as_deref());
        self.index.delete_by_entity_id(entity.id)?;
        for row in &rows {
            self.index.index_item(row)?;
        }
        Ok(rows.len())
    }

    fn entity_row(&self, entity: &Entity, content: Option<&str>) -> SearchIndexRow {
        let mut stems = StemBuilder::new(self.stems);
        let mut snippet = String::new();
        if entity.is_markdown() {
            stems.variants(&entity.title);
            if let Some(permalink) = &entity.permalink {
                stems.variants(permalink);
            }
            stems.variants(&entity.file_path);
            for tag in entity.tags() {
                stems.variants(&tag);
            }
            if let Some(body) = content {
                stems.variants(body);
                snippet = truncate_chars(body, self.snippet_chars).to_string();
            }
        }

        SearchIndexRow {
            id: entity.id,
            item: IndexedItem::Entity,
            title: entity.title.clone(),
            content_stems: stems.build(),
            content_snippet: snippet,
            permalink: entity.permalink.clone(),
            file_path: entity.file_path.clone(),
            metadata: Some(entity_metadata(entity)),
            created_at: entity.created_at.clone(),
            updated_at: entity.updated_at.clone(),
        }
    }

    fn observation_row(&self, entity: &Entity, observation: &Observation) -> SearchIndexRow {
        let mut stems = StemBuilder::new(self.stems);
        stems.variants(&observation.content);
        let mut metadata = json!({ "entity_type": entity.entity_type });
        if !observation.tags.is_empty() {
            metadata["tags"] = json!(observation.tags);
        }

        SearchIndexRow {
            id: observation.id,
            item: IndexedItem::Observation {
                entity_id: entity.id,
                category: observation.category.clone(),
            },
            title: format!(
                "{}: {}",
                observation.category,
                truncate_chars(&observation.content, OBSERVATION_TITLE_CHARS)
            ),
            content_stems: stems.build(),
            content_snippet: observation.content.clone(),
            permalink: observation.permalink.clone(),
            file_path: entity.file_path.clone(),
            metadata: Some(metadata),
            created_at: entity.created_at.clone(),
            updated_at: entity.updated_at.clone(),
        }
    }

    fn relation_row(&self, entity: &Entity, relation: &Relation) -> SearchIndexRow {
        let title = match &relation.to_title {
            Some(to_title) if relation.is_resolved() => format!("{} → {}", entity.title, to_title),
            _ => entity.title.clone(),
        };
        let mut stems = StemBuilder::new(self.stems);
        stems.variants(&title);

        SearchIndexRow {
            id: relation.id,
            item: IndexedItem::Relation {
                from_id: entity.id,
                to_id: relation.to_id,
                relation_type: relation.relation_type.clone(),
            },
            title,
            content_stems: stems.build(),
            content_snippet: String::new(),
            permalink: relation.permalink.clone(),
            file_path: entity.file_path.clone(),
            metadata: Some(json!({ "entity_type": entity.entity_type })),
            created_at: entity.created_at.clone(),
            updated_at: entity.updated_at.clone(),
        }
    }
}

/// Entity metadata with the normalized tag list and `entity_type` folded in.
fn entity_metadata(entity: &Entity) -> Value {
    let mut map = match &entity.metadata {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    map.insert("entity_type".into(), json!(entity.entity_type));
    let tags = entity.tags();
    if tags.is_empty() {
        map.remove("tags");
    } else {
        map.insert("tags".into(), json!(tags));
    }
    Value::Object(map)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Index an entity on the blocking pool without holding up the caller.
///
/// The returned handle resolves once the rows are committed; dropping it lets
/// the work finish in the background.
pub fn spawn_index_entity(
    db: Arc<Mutex<Connection>>,
    project_id: i64,
    entity: Entity,
    content: Arc<dyn ContentReader>,
    config: IndexConfig,
) -> tokio::task::JoinHandle<Result<usize>> {
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        let service = SearchService::new(&conn, project_id, content.as_ref()).with_config(&config);
        let result = service.index_entity(&entity);
        if let Err(e) = &result {
            tracing::warn!(entity_id = entity.id, error = %e, "background indexing failed");
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::knowledge::types::EntityDraft;
    use std::collections::HashMap;

    struct Bodies(HashMap<String, String>);

    impl ContentReader for Bodies {
        fn read_content(&self, entity: &Entity) -> Result<Option<String>> {
            if !entity.is_markdown() {
                return Ok(None);
            }
            Ok(self.0.get(&entity.file_path).cloned())
        }
    }

    fn bodies(pairs: &[(&str, &str)]) -> Bodies {
        Bodies(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn rows_for(conn: &Connection, entity_id: i64) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM search_index WHERE entity_id = ?1",
            [entity_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn entity_row_has_stems_and_snippet() {
        let conn = db::open_memory_database().unwrap();
        let project = store::get_or_create_project(&conn, "main", "/tmp/kb").unwrap();
        let draft = EntityDraft::note("Search Design", "specs/search.md")
            .with_metadata(json!({"tags": ["fts", "rust"]}));
        let id = store::insert_entity(&conn, project.id, &draft).unwrap();
        let entity = store::load_entity(&conn, project.id, id).unwrap().unwrap();

        let reader = bodies(&[]);
        let service = SearchService::new(&conn, project.id, &reader);
        let long_body = "x".repeat(400);
        let rows = service.build_rows(&entity, Some(&long_body));
        let row = &rows[0];
        assert_eq!(row.content_snippet.chars().count(), 250);
        let stems: Vec<&str> = row.content_stems.lines().collect();
        assert!(stems.contains(&"search design"));
        assert!(stems.contains(&"specs"));
        assert!(stems.contains(&"fts"));
        assert!(stems.contains(&long_body.as_str()));
        assert_eq!(row.metadata.as_ref().unwrap()["entity_type"], "note");
    }

    #[test]
    fn non_markdown_entity_has_no_stems() {
        let conn = db::open_memory_database().unwrap();
        let project = store::get_or_create_project(&conn, "main", "/tmp/kb").unwrap();
        let mut draft = EntityDraft::note("Diagram", "assets/diagram.png").with_type("file");
        draft.content_type = "image/png".into();
        draft.permalink = None;
        let id = store::insert_entity(&conn, project.id, &draft).unwrap();
        let entity = store::load_entity(&conn, project.id, id).unwrap().unwrap();

        let reader = bodies(&[]);
        let service = SearchService::new(&conn, project.id, &reader);
        let rows = service.build_rows(&entity, None);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].content_stems.is_empty());
        assert!(rows[0].content_snippet.is_empty());
        assert_eq!(rows[0].title, "Diagram");
    }

    #[test]
    fn observation_and_relation_rows() {
        let conn = db::open_memory_database().unwrap();
        let project = store::get_or_create_project(&conn, "main", "/tmp/kb").unwrap();
        let a = store::insert_entity(&conn, project.id, &EntityDraft::note("Alpha", "alpha.md")).unwrap();
        store::insert_entity(&conn, project.id, &EntityDraft::note("Beta", "beta.md")).unwrap();
        store::add_observation(&conn, project.id, a, "tech", &"y".repeat(150), &[]).unwrap();
        store::add_relation(&conn, project.id, a, "Beta", "implements", None).unwrap();
        store::add_relation(&conn, project.id, a, "Gamma", "depends_on", None).unwrap();
        let entity = store::load_entity(&conn, project.id, a).unwrap().unwrap();

        let reader = bodies(&[]);
        let service = SearchService::new(&conn, project.id, &reader);
        let rows = service.build_rows(&entity, None);
        assert_eq!(rows.len(), 4);

        let obs = &rows[1];
        assert_eq!(obs.title, format!("tech: {}", "y".repeat(100)));
        assert_eq!(obs.owner_id(), a);

        let titles: Vec<&str> = rows[2..].iter().map(|r| r.title.as_str()).collect();
        assert!(titles.contains(&"Alpha → Beta"));
        assert!(titles.contains(&"Alpha"));
        assert!(rows[2..].iter().all(|r| r.owner_id() == a));
    }

    #[test]
    fn index_entity_replaces_previous_rows() {
        let conn = db::open_memory_database().unwrap();
        let project = store::get_or_create_project(&conn, "main", "/tmp/kb").unwrap();
        let a = store::insert_entity(&conn, project.id, &EntityDraft::note("Alpha", "alpha.md")).unwrap();
        store::add_observation(&conn, project.id, a, "note", "first", &[]).unwrap();
        let reader = bodies(&[("alpha.md", "body")]);
        let service = SearchService::new(&conn, project.id, &reader);

        let entity = store::load_entity(&conn, project.id, a).unwrap().unwrap();
        service.index_entity(&entity).unwrap();
        service.index_entity(&entity).unwrap();
        assert_eq!(rows_for(&conn, a), 2);

        // observation removed at the source
        conn.execute("DELETE FROM observation WHERE entity_id = ?1", [a]).unwrap();
        let entity = store::load_entity(&conn, project.id, a).unwrap().unwrap();
        service.index_entity(&entity).unwrap();
        assert_eq!(rows_for(&conn, a), 1);
    }

    #[test]
    fn handle_delete_falls_back_to_entity_id() {
        let conn = db::open_memory_database().unwrap();
        let project = store::get_or_create_project(&conn, "main", "/tmp/kb").unwrap();
        let mut draft = EntityDraft::note("Loose", "loose.md");
        draft.permalink = None;
        let id = store::insert_entity(&conn, project.id, &draft).unwrap();
        store::add_observation(&conn, project.id, id, "note", "orphan", &[]).unwrap();
        let entity = store::load_entity(&conn, project.id, id).unwrap().unwrap();
        assert!(entity.observations[0].permalink.is_none());

        let reader = bodies(&[]);
        let service = SearchService::new(&conn, project.id, &reader);
        service.index_entity(&entity).unwrap();
        assert_eq!(rows_for(&conn, id), 2);

        service.handle_delete(&entity).unwrap();
        assert_eq!(rows_for(&conn, id), 0);
    }

    #[test]
    fn truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("", 3), "");
    }
}
