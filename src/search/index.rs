//! The FTS5-backed search index.
//!
//! One physical table, `search_index`, holds a row per entity, per observation
//! and per outgoing relation. Only `title` and `content_stems` are tokenized;
//! everything else is stored `UNINDEXED` for filtering and display. A
//! [`SearchIndex`] is bound to one connection and one project id, and every
//! statement it issues is filtered by that project.

use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;

use crate::error::SearchError;
use crate::search::query::{prepare_match_term, SearchItemType, SearchMode, SearchQuery};

const SEARCH_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS search_index USING fts5(
    id UNINDEXED,
    type UNINDEXED,
    title,
    content_stems,
    content_snippet UNINDEXED,
    permalink UNINDEXED,
    file_path UNINDEXED,
    category UNINDEXED,
    from_id UNINDEXED,
    to_id UNINDEXED,
    relation_type UNINDEXED,
    entity_id UNINDEXED,
    metadata UNINDEXED,
    created_at UNINDEXED,
    updated_at UNINDEXED,
    project_id UNINDEXED,
    tokenize = 'unicode61',
    prefix = '1,2,3,4'
);
"#;

const RESULT_COLUMNS: &str = "id, type, title, permalink, file_path, content_snippet, category, \
     from_id, to_id, relation_type, entity_id, metadata, created_at, updated_at";

/// Create the search table if it does not exist.
pub fn create_search_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SEARCH_TABLE_SQL)
}

// ── Row types ─────────────────────────────────────────────────────────────────

/// Fields that exist only for one kind of row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexedItem {
    Entity,
    Observation {
        /// Owner; results already carry it as their top-level `entity_id`.
        #[serde(skip_serializing)]
        entity_id: i64,
        category: String,
    },
    Relation {
        from_id: i64,
        to_id: Option<i64>,
        relation_type: String,
    },
}

impl IndexedItem {
    pub fn item_type(&self) -> SearchItemType {
        match self {
            Self::Entity => SearchItemType::Entity,
            Self::Observation { .. } => SearchItemType::Observation,
            Self::Relation { .. } => SearchItemType::Relation,
        }
    }
}

/// A row to be written to the index.
#[derive(Debug, Clone)]
pub struct SearchIndexRow {
    /// Id of the source entity, observation or relation.
    pub id: i64,
    pub item: IndexedItem,
    pub title: String,
    /// Newline-joined stems; searchable, never displayed.
    pub content_stems: String,
    pub content_snippet: String,
    pub permalink: Option<String>,
    pub file_path: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl SearchIndexRow {
    /// The entity that owns this row; deleting that entity's rows removes it.
    pub fn owner_id(&self) -> i64 {
        match &self.item {
            IndexedItem::Entity => self.id,
            IndexedItem::Observation { entity_id, .. } => *entity_id,
            IndexedItem::Relation { from_id, .. } => *from_id,
        }
    }
}

/// A row read back from the index.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: i64,
    #[serde(flatten)]
    pub item: IndexedItem,
    pub title: String,
    pub permalink: Option<String>,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    /// Owning entity (the row itself for entities, the source for relations).
    pub entity_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
    /// Relevance for free-text matches (higher is better); `None` for direct lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchResult {
    pub fn item_type(&self) -> SearchItemType {
        self.item.item_type()
    }

    /// `(type, id)` identity, unique within a project.
    pub fn key(&self) -> (SearchItemType, i64) {
        (self.item_type(), self.id)
    }
}

// ── SearchIndex ───────────────────────────────────────────────────────────────

pub struct SearchIndex<'c> {
    conn: &'c Connection,
    project_id: i64,
    executed: Cell<u64>,
}

impl<'c> SearchIndex<'c> {
    pub fn new(conn: &'c Connection, project_id: i64) -> Self {
        Self {
            conn,
            project_id,
            executed: Cell::new(0),
        }
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub(crate) fn conn(&self) -> &'c Connection {
        self.conn
    }

    /// Number of read statements issued through this index.
    pub fn executed_queries(&self) -> u64 {
        self.executed.get()
    }

    /// Ensure the index table exists. Safe to call repeatedly.
    pub fn init_search_index(&self) -> Result<(), SearchError> {
        create_search_table(self.conn)?;
        Ok(())
    }

    /// Drop the whole table, every project included. Call [`Self::init_search_index`] after.
    pub fn drop_search_index(&self) -> Result<(), SearchError> {
        self.conn.execute_batch("DROP TABLE IF EXISTS search_index")?;
        tracing::info!("search index dropped");
        Ok(())
    }

    /// Remove every row of this project.
    pub fn clear_project(&self) -> Result<usize, SearchError> {
        let n = self.conn.execute(
            "DELETE FROM search_index WHERE project_id = ?1",
            params![self.project_id],
        )?;
        Ok(n)
    }

    /// Upsert one row by its `(type, id)` identity.
    pub fn index_item(&self, row: &SearchIndexRow) -> Result<(), SearchError> {
        let item_type = row.item.item_type().as_str();
        self.conn.execute(
            "DELETE FROM search_index WHERE project_id = ?1 AND type = ?2 AND id = ?3",
            params![self.project_id, item_type, row.id],
        )?;

        let (category, from_id, to_id, relation_type) = match &row.item {
            IndexedItem::Entity => (None, None, None, None),
            IndexedItem::Observation { category, .. } => (Some(category.as_str()), None, None, None),
            IndexedItem::Relation {
                from_id,
                to_id,
                relation_type,
            } => (None, Some(*from_id), *to_id, Some(relation_type.as_str())),
        };
        let metadata = row.metadata.as_ref().map(serde_json::to_string).transpose()?;

        self.conn.execute(
            "INSERT INTO search_index (id, type, title, content_stems, content_snippet, permalink, \
             file_path, category, from_id, to_id, relation_type, entity_id, metadata, created_at, \
             updated_at, project_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                row.id,
                item_type,
                row.title,
                row.content_stems,
                row.content_snippet,
                row.permalink,
                row.file_path,
                category,
                from_id,
                to_id,
                relation_type,
                row.owner_id(),
                metadata,
                row.created_at,
                row.updated_at,
                self.project_id,
            ],
        )?;
        Ok(())
    }

    /// Remove an entity's own row plus its observation and outgoing-relation rows.
    pub fn delete_by_entity_id(&self, entity_id: i64) -> Result<usize, SearchError> {
        let n = self.conn.execute(
            "DELETE FROM search_index WHERE project_id = ?1 AND entity_id = ?2",
            params![self.project_id, entity_id],
        )?;
        Ok(n)
    }

    pub fn delete_by_permalink(&self, permalink: &str) -> Result<usize, SearchError> {
        let n = self.conn.execute(
            "DELETE FROM search_index WHERE project_id = ?1 AND permalink = ?2",
            params![self.project_id, permalink],
        )?;
        Ok(n)
    }

    /// Run a structured query.
    ///
    /// Exactly one lookup mode applies (see [`SearchQuery::resolved_mode`]); the
    /// type, entity-type and date filters combine with it. A query with no
    /// criteria returns nothing without touching the database.
    pub fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let Some(mode) = query.resolved_mode() else {
            tracing::debug!("search with no criteria, returning empty");
            return Ok(Vec::new());
        };

        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        let mut score = "NULL";
        let mut order = "updated_at DESC, type, id";
        let mut match_term = None;
        match &mode {
            SearchMode::PermalinkGlob(pattern) => {
                let p = bind(&mut params, Value::Text(pattern.clone()));
                conditions.push(format!("permalink GLOB {p}"));
            }
            SearchMode::Permalink(permalink) => {
                let p = bind(&mut params, Value::Text(permalink.clone()));
                conditions.push(format!("permalink = {p}"));
            }
            SearchMode::Title(title) => {
                let p = bind(&mut params, Value::Text(title.clone()));
                conditions.push(format!("title = {p}"));
            }
            SearchMode::Text(text) => {
                let term = prepare_match_term(text);
                let p = bind(&mut params, Value::Text(term.clone()));
                conditions.push(format!("search_index MATCH {p}"));
                score = "-bm25(search_index)";
                order = "score DESC, updated_at DESC";
                match_term = Some(term);
            }
            SearchMode::FilterOnly => {}
        }

        if !query.types.is_empty() {
            let placeholders: Vec<String> = query
                .types
                .iter()
                .map(|t| bind(&mut params, Value::Text(t.as_str().to_string())))
                .collect();
            conditions.push(format!("type IN ({})", placeholders.join(", ")));
        }

        if !query.entity_types.is_empty() {
            let placeholders: Vec<String> = query
                .entity_types
                .iter()
                .map(|t| bind(&mut params, Value::Text(t.clone())))
                .collect();
            conditions.push(format!(
                "json_extract(metadata, '$.entity_type') IN ({})",
                placeholders.join(", ")
            ));
        }

        if let Some(after) = &query.after_date {
            let p = bind(&mut params, Value::Text(after.clone()));
            conditions.push(window_condition(&p));
        }

        let p = bind(&mut params, Value::Integer(self.project_id));
        conditions.push(format!("project_id = {p}"));
        // past i64::MAX a bound is as good as unlimited
        let limit_p = bind(&mut params, Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        let offset_p = bind(&mut params, Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT {RESULT_COLUMNS}, {score} AS score FROM search_index \
             WHERE {} ORDER BY {order} LIMIT {limit_p} OFFSET {offset_p}",
            conditions.join(" AND ")
        );
        tracing::debug!(?mode, limit, offset, "search");

        let results = self.query_rows(&sql, params);
        match (results, match_term) {
            (Err(SearchError::Database(e)), Some(term)) => {
                let err = SearchError::from_match_error(&term, e);
                if err.is_query_syntax() {
                    tracing::warn!(error = %err, "search query rejected");
                }
                Err(err)
            }
            (results, _) => results,
        }
    }

    /// Relation rows with either end in `entity_ids`, optionally restricted to
    /// the time window starting at `since`.
    pub fn relations_touching(
        &self,
        entity_ids: &[i64],
        since: Option<&str>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = vec![Value::Integer(self.project_id)];
        let ids = bind_ids(&mut params, entity_ids);
        let mut sql = format!(
            "SELECT {RESULT_COLUMNS}, NULL AS score FROM search_index \
             WHERE project_id = ?1 AND type = 'relation' AND (from_id IN ({ids}) OR to_id IN ({ids}))"
        );
        if let Some(since) = since {
            let p = bind(&mut params, Value::Text(since.to_string()));
            sql.push_str(&format!(" AND {}", window_condition(&p)));
        }
        sql.push_str(" ORDER BY id");
        self.query_rows(&sql, params)
    }

    /// Entity rows for `ids`, optionally restricted to the time window starting at `since`.
    pub fn entities_by_id(
        &self,
        ids: &[i64],
        since: Option<&str>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = vec![Value::Integer(self.project_id)];
        let placeholders = bind_ids(&mut params, ids);
        let mut sql = format!(
            "SELECT {RESULT_COLUMNS}, NULL AS score FROM search_index \
             WHERE project_id = ?1 AND type = 'entity' AND id IN ({placeholders})"
        );
        if let Some(since) = since {
            let p = bind(&mut params, Value::Text(since.to_string()));
            sql.push_str(&format!(" AND {}", window_condition(&p)));
        }
        sql.push_str(" ORDER BY id");
        self.query_rows(&sql, params)
    }

    /// Row counts per item type for this project.
    pub fn count_by_type(&self) -> Result<BTreeMap<String, u64>, SearchError> {
        let mut stmt = self.conn.prepare(
            "SELECT type, COUNT(*) FROM search_index WHERE project_id = ?1 GROUP BY type",
        )?;
        let rows = stmt
            .query_map(params![self.project_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    fn query_rows(&self, sql: &str, params: Vec<Value>) -> Result<Vec<SearchResult>, SearchError> {
        self.executed.set(self.executed.get() + 1);
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map(params_from_iter(params), raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawRow::into_result).collect()
    }
}

/// In the window if created or updated at or after the bound parameter.
fn window_condition(param: &str) -> String {
    format!("(datetime(created_at) >= datetime({param}) OR datetime(updated_at) >= datetime({param}))")
}

/// Push a parameter and return its positional placeholder.
fn bind(params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("?{}", params.len())
}

fn bind_ids(params: &mut Vec<Value>, ids: &[i64]) -> String {
    let placeholders: Vec<String> = ids
        .iter()
        .map(|id| bind(params, Value::Integer(*id)))
        .collect();
    placeholders.join(", ")
}

struct RawRow {
    id: i64,
    item: IndexedItem,
    title: String,
    permalink: Option<String>,
    file_path: String,
    content_snippet: Option<String>,
    entity_id: i64,
    metadata: Option<String>,
    created_at: String,
    updated_at: String,
    score: Option<f64>,
}

impl RawRow {
    fn into_result(self) -> Result<SearchResult, SearchError> {
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(SearchResult {
            id: self.id,
            item: self.item,
            title: self.title,
            permalink: self.permalink,
            file_path: self.file_path,
            content_snippet: self.content_snippet.filter(|s| !s.is_empty()),
            entity_id: self.entity_id,
            metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            score: self.score,
        })
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let type_str: String = row.get(1)?;
    let item_type: SearchItemType = type_str
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    let item = match item_type {
        SearchItemType::Entity => IndexedItem::Entity,
        SearchItemType::Observation => IndexedItem::Observation {
            entity_id: row.get(10)?,
            category: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        },
        SearchItemType::Relation => IndexedItem::Relation {
            from_id: row.get(7)?,
            to_id: row.get(8)?,
            relation_type: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        },
    };
    Ok(RawRow {
        id: row.get(0)?,
        item,
        title: row.get(2)?,
        permalink: row.get(3)?,
        file_path: row.get(4)?,
        content_snippet: row.get(5)?,
        entity_id: row.get(10)?,
        metadata: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        score: row.get(14)?,
    })
}
