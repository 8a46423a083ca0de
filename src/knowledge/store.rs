//! Entity, observation and relation persistence.
//!
//! This is the narrow repository the indexer and context builder read from:
//! every function takes the project id explicitly and never touches rows of
//! another project. Entities come back with their observations and outgoing
//! relations already loaded.

use anyhow::{bail, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use super::now_timestamp;
use super::types::{
    observation_permalink, relation_permalink, Entity, EntityDraft, Observation, Project,
    Relation,
};

const ENTITY_COLUMNS: &str = "id, project_id, title, entity_type, permalink, file_path, \
     content_type, checksum, metadata, created_at, updated_at";

// ── Projects ──────────────────────────────────────────────────────────────────

/// Fetch a project by name, creating it on first use.
pub fn get_or_create_project(conn: &Connection, name: &str, path: &str) -> Result<Project> {
    if let Some(project) = find_project(conn, name)? {
        return Ok(project);
    }
    conn.execute(
        "INSERT INTO project (name, path, created_at) VALUES (?1, ?2, ?3)",
        params![name, path, now_timestamp()],
    )?;
    tracing::info!(project = %name, path = %path, "project created");
    match find_project(conn, name)? {
        Some(project) => Ok(project),
        None => bail!("project vanished after insert: {name}"),
    }
}

pub fn find_project(conn: &Connection, name: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT id, name, path, created_at FROM project WHERE name = ?1",
            params![name],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    path: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(project)
}

/// Every project, ordered by id.
pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare("SELECT id, name, path, created_at FROM project ORDER BY id")?;
    let projects = stmt
        .query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                path: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

// ── Writes ────────────────────────────────────────────────────────────────────

/// Insert a new entity. Returns its id.
pub fn insert_entity(conn: &Connection, project_id: i64, draft: &EntityDraft) -> Result<i64> {
    let now = now_timestamp();
    let metadata_json = draft.metadata.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO entity (project_id, title, entity_type, permalink, file_path, content_type, \
         checksum, metadata, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            project_id,
            draft.title,
            draft.entity_type,
            draft.permalink,
            draft.file_path,
            draft.content_type,
            draft.checksum,
            metadata_json,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Replace an entity's descriptive fields and bump `updated_at`.
pub fn update_entity(
    conn: &Connection,
    project_id: i64,
    entity_id: i64,
    draft: &EntityDraft,
) -> Result<()> {
    let metadata_json = draft.metadata.as_ref().map(serde_json::to_string).transpose()?;
    let rows = conn.execute(
        "UPDATE entity SET title = ?1, entity_type = ?2, permalink = ?3, file_path = ?4, \
         content_type = ?5, checksum = ?6, metadata = ?7, updated_at = ?8 \
         WHERE id = ?9 AND project_id = ?10",
        params![
            draft.title,
            draft.entity_type,
            draft.permalink,
            draft.file_path,
            draft.content_type,
            draft.checksum,
            metadata_json,
            now_timestamp(),
            entity_id,
            project_id,
        ],
    )?;
    if rows == 0 {
        bail!("entity not found: {entity_id}");
    }
    Ok(())
}

/// Attach an observation to an entity. Returns its id.
pub fn add_observation(
    conn: &Connection,
    project_id: i64,
    entity_id: i64,
    category: &str,
    content: &str,
    tags: &[String],
) -> Result<i64> {
    let tags_json = if tags.is_empty() {
        None
    } else {
        Some(serde_json::to_string(tags)?)
    };
    conn.execute(
        "INSERT INTO observation (project_id, entity_id, category, content, tags) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![project_id, entity_id, category, content, tags_json],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Add an outgoing relation from `from_id`. The target is resolved by title or
/// permalink within the project; if nothing matches the relation is stored
/// unresolved. Idempotent on (from, to_name, type). Returns the relation id.
pub fn add_relation(
    conn: &Connection,
    project_id: i64,
    from_id: i64,
    to_name: &str,
    relation_type: &str,
    context: Option<&str>,
) -> Result<i64> {
    let to_id = find_entity_id_by_name(conn, project_id, to_name)?;
    conn.execute(
        "INSERT OR IGNORE INTO relation (project_id, from_id, to_id, to_name, relation_type, context) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![project_id, from_id, to_id, to_name, relation_type, context],
    )?;
    let id = conn.query_row(
        "SELECT id FROM relation WHERE from_id = ?1 AND to_name = ?2 AND relation_type = ?3",
        params![from_id, to_name, relation_type],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Link unresolved relations whose `to_name` now matches an entity.
///
/// Returns the distinct source entity ids whose relations changed, so the
/// caller can re-index them.
pub fn resolve_relations(conn: &Connection, project_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.from_id, \
                (SELECT e.id FROM entity e \
                 WHERE e.project_id = r.project_id AND (e.title = r.to_name OR e.permalink = r.to_name) \
                 ORDER BY e.id LIMIT 1) AS target \
         FROM relation r \
         WHERE r.project_id = ?1 AND r.to_id IS NULL",
    )?;
    let pending: Vec<(i64, i64, Option<i64>)> = stmt
        .query_map(params![project_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut sources = Vec::new();
    for (relation_id, from_id, target) in pending {
        let Some(target) = target else { continue };
        conn.execute(
            "UPDATE relation SET to_id = ?1 WHERE id = ?2",
            params![target, relation_id],
        )?;
        if !sources.contains(&from_id) {
            sources.push(from_id);
        }
    }
    if !sources.is_empty() {
        tracing::debug!(project_id, entities = sources.len(), "resolved pending relations");
    }
    Ok(sources)
}

/// Delete an entity. Observations and outgoing relations cascade; incoming
/// relations become unresolved. Returns `false` if nothing was deleted.
pub fn delete_entity(conn: &Connection, project_id: i64, entity_id: i64) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM entity WHERE id = ?1 AND project_id = ?2",
        params![entity_id, project_id],
    )?;
    Ok(rows > 0)
}

// ── Reads ─────────────────────────────────────────────────────────────────────

/// Load one entity with its observations and outgoing relations.
pub fn load_entity(conn: &Connection, project_id: i64, entity_id: i64) -> Result<Option<Entity>> {
    let entity = conn
        .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entity WHERE id = ?1 AND project_id = ?2"),
            params![entity_id, project_id],
            entity_from_row,
        )
        .optional()?;
    let Some(mut entity) = entity else {
        return Ok(None);
    };
    entity.observations = observations_for(conn, project_id, &[entity_id])?
        .remove(&entity_id)
        .unwrap_or_default();
    entity.relations = outgoing_relations_for(conn, project_id, &[entity_id])?
        .remove(&entity_id)
        .unwrap_or_default();
    Ok(Some(entity))
}

pub fn find_entity_by_permalink(
    conn: &Connection,
    project_id: i64,
    permalink: &str,
) -> Result<Option<Entity>> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM entity WHERE permalink = ?1 AND project_id = ?2",
            params![permalink, project_id],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => load_entity(conn, project_id, id),
        None => Ok(None),
    }
}

/// Every entity in the project, eagerly loaded, ordered by id.
pub fn list_entities(conn: &Connection, project_id: i64) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entity WHERE project_id = ?1 ORDER BY id"
    ))?;
    let mut entities = stmt
        .query_map(params![project_id], entity_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut observations = observations_for(conn, project_id, &[])?;
    let mut relations = outgoing_relations_for(conn, project_id, &[])?;
    for entity in &mut entities {
        entity.observations = observations.remove(&entity.id).unwrap_or_default();
        entity.relations = relations.remove(&entity.id).unwrap_or_default();
    }
    Ok(entities)
}

pub fn count_entities(conn: &Connection, project_id: i64) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entity WHERE project_id = ?1",
        params![project_id],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Observations grouped by owning entity. An empty `entity_ids` means every
/// entity in the project.
pub fn observations_for(
    conn: &Connection,
    project_id: i64,
    entity_ids: &[i64],
) -> Result<HashMap<i64, Vec<Observation>>> {
    let sql = format!(
        "SELECT o.id, o.entity_id, o.category, o.content, o.tags, e.permalink \
         FROM observation o JOIN entity e ON e.id = o.entity_id \
         WHERE o.project_id = ?1{} ORDER BY o.id",
        id_filter("o.entity_id", entity_ids)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(scoped_params(project_id, entity_ids)), |row| {
            let category: String = row.get(2)?;
            let content: String = row.get(3)?;
            let tags: Option<String> = row.get(4)?;
            let owner_permalink: Option<String> = row.get(5)?;
            Ok(Observation {
                id: row.get(0)?,
                entity_id: row.get(1)?,
                permalink: owner_permalink
                    .map(|p| observation_permalink(&p, &category, &content)),
                tags: tags
                    .and_then(|t| serde_json::from_str(&t).ok())
                    .unwrap_or_default(),
                category,
                content,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<i64, Vec<Observation>> = HashMap::new();
    for obs in rows {
        grouped.entry(obs.entity_id).or_default().push(obs);
    }
    Ok(grouped)
}

/// Outgoing relations grouped by source entity, with target title and
/// permalink joined in.
fn outgoing_relations_for(
    conn: &Connection,
    project_id: i64,
    entity_ids: &[i64],
) -> Result<HashMap<i64, Vec<Relation>>> {
    let sql = format!(
        "SELECT r.id, r.from_id, r.to_id, r.to_name, r.relation_type, r.context, \
                t.title, t.permalink, f.permalink \
         FROM relation r \
         JOIN entity f ON f.id = r.from_id \
         LEFT JOIN entity t ON t.id = r.to_id \
         WHERE r.project_id = ?1{} ORDER BY r.id",
        id_filter("r.from_id", entity_ids)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(scoped_params(project_id, entity_ids)), |row| {
            let to_name: String = row.get(3)?;
            let relation_type: String = row.get(4)?;
            let to_permalink: Option<String> = row.get(7)?;
            let from_permalink: Option<String> = row.get(8)?;
            let target = to_permalink.as_deref().unwrap_or(&to_name);
            Ok(Relation {
                id: row.get(0)?,
                from_id: row.get(1)?,
                to_id: row.get(2)?,
                context: row.get(5)?,
                to_title: row.get(6)?,
                permalink: from_permalink
                    .map(|p| relation_permalink(&p, &relation_type, target)),
                to_name,
                relation_type,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<i64, Vec<Relation>> = HashMap::new();
    for rel in rows {
        grouped.entry(rel.from_id).or_default().push(rel);
    }
    Ok(grouped)
}

fn find_entity_id_by_name(conn: &Connection, project_id: i64, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM entity WHERE project_id = ?1 AND (title = ?2 OR permalink = ?2) \
             ORDER BY id LIMIT 1",
            params![project_id, name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let metadata: Option<String> = row.get(8)?;
    Ok(Entity {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        entity_type: row.get(3)?,
        permalink: row.get(4)?,
        file_path: row.get(5)?,
        content_type: row.get(6)?,
        checksum: row.get(7)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        observations: Vec::new(),
        relations: Vec::new(),
    })
}

/// ` AND <column> IN (?2, ?3, ...)`, or nothing when `ids` is empty.
fn id_filter(column: &str, ids: &[i64]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let placeholders: Vec<String> = (2..ids.len() + 2).map(|i| format!("?{i}")).collect();
    format!(" AND {column} IN ({})", placeholders.join(", "))
}

fn scoped_params(project_id: i64, ids: &[i64]) -> Vec<i64> {
    std::iter::once(project_id).chain(ids.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn setup() -> (Connection, i64) {
        let conn = db::open_memory_database().unwrap();
        let project = get_or_create_project(&conn, "test", "/tmp/test").unwrap();
        (conn, project.id)
    }

    #[test]
    fn get_or_create_project_is_idempotent() {
        let conn = db::open_memory_database().unwrap();
        let a = get_or_create_project(&conn, "notes", "/n").unwrap();
        let b = get_or_create_project(&conn, "notes", "/elsewhere").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.path, "/n");
    }

    #[test]
    fn load_entity_eagerly_loads_children() {
        let (conn, pid) = setup();
        let a = insert_entity(&conn, pid, &EntityDraft::note("Search", "search.md")).unwrap();
        let b = insert_entity(&conn, pid, &EntityDraft::note("Storage", "storage.md")).unwrap();
        add_observation(&conn, pid, a, "tech", "Uses FTS5", &["db".to_string()]).unwrap();
        add_relation(&conn, pid, a, "Storage", "depends_on", None).unwrap();
        add_relation(&conn, pid, b, "Search", "supports", None).unwrap();

        let entity = load_entity(&conn, pid, a).unwrap().unwrap();
        assert_eq!(entity.observations.len(), 1);
        assert_eq!(entity.observations[0].tags, vec!["db"]);
        assert_eq!(
            entity.observations[0].permalink.as_deref(),
            Some("search/observations/tech/Uses FTS5")
        );

        // only outgoing relations
        assert_eq!(entity.relations.len(), 1);
        let rel = &entity.relations[0];
        assert_eq!(rel.to_id, Some(b));
        assert_eq!(rel.to_title.as_deref(), Some("Storage"));
        assert_eq!(rel.permalink.as_deref(), Some("search/depends-on/storage"));
    }

    #[test]
    fn add_relation_is_idempotent() {
        let (conn, pid) = setup();
        let a = insert_entity(&conn, pid, &EntityDraft::note("A", "a.md")).unwrap();
        let first = add_relation(&conn, pid, a, "B", "links", None).unwrap();
        let second = add_relation(&conn, pid, a, "B", "links", None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unresolved_relation_is_linked_later() {
        let (conn, pid) = setup();
        let a = insert_entity(&conn, pid, &EntityDraft::note("A", "a.md")).unwrap();
        add_relation(&conn, pid, a, "Future Note", "mentions", None).unwrap();

        let rel = &load_entity(&conn, pid, a).unwrap().unwrap().relations[0];
        assert!(!rel.is_resolved());
        assert_eq!(rel.permalink.as_deref(), Some("a/mentions/future-note"));

        assert!(resolve_relations(&conn, pid).unwrap().is_empty());

        let target = insert_entity(&conn, pid, &EntityDraft::note("Future Note", "future.md")).unwrap();
        assert_eq!(resolve_relations(&conn, pid).unwrap(), vec![a]);

        let rel = &load_entity(&conn, pid, a).unwrap().unwrap().relations[0];
        assert_eq!(rel.to_id, Some(target));
    }

    #[test]
    fn delete_cascades_outgoing_and_unresolves_incoming() {
        let (conn, pid) = setup();
        let a = insert_entity(&conn, pid, &EntityDraft::note("A", "a.md")).unwrap();
        let b = insert_entity(&conn, pid, &EntityDraft::note("B", "b.md")).unwrap();
        add_observation(&conn, pid, a, "note", "first", &[]).unwrap();
        add_relation(&conn, pid, a, "B", "links", None).unwrap();
        add_relation(&conn, pid, b, "A", "links", None).unwrap();

        assert!(delete_entity(&conn, pid, a).unwrap());
        assert!(!delete_entity(&conn, pid, a).unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM observation", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let b_entity = load_entity(&conn, pid, b).unwrap().unwrap();
        assert_eq!(b_entity.relations.len(), 1);
        assert!(!b_entity.relations[0].is_resolved());
    }

    #[test]
    fn reads_are_project_scoped() {
        let conn = db::open_memory_database().unwrap();
        let p1 = get_or_create_project(&conn, "one", "/1").unwrap().id;
        let p2 = get_or_create_project(&conn, "two", "/2").unwrap().id;
        let a = insert_entity(&conn, p1, &EntityDraft::note("Shared", "shared.md")).unwrap();
        insert_entity(&conn, p2, &EntityDraft::note("Shared", "shared.md")).unwrap();

        assert!(load_entity(&conn, p2, a).unwrap().is_none());
        assert_eq!(list_entities(&conn, p1).unwrap().len(), 1);
        assert_eq!(count_entities(&conn, p2).unwrap(), 1);
        assert!(!delete_entity(&conn, p2, a).unwrap());
    }

    #[test]
    fn update_entity_replaces_fields() {
        let (conn, pid) = setup();
        let id = insert_entity(&conn, pid, &EntityDraft::note("Old", "old.md")).unwrap();
        let draft = EntityDraft::note("New", "old.md").with_metadata(json!({"tags": ["x"]}));
        update_entity(&conn, pid, id, &draft).unwrap();

        let entity = find_entity_by_permalink(&conn, pid, "new").unwrap().unwrap();
        assert_eq!(entity.id, id);
        assert_eq!(entity.tags(), vec!["x"]);
        assert!(update_entity(&conn, pid, 999, &draft).is_err());
    }
}
