//! Context building: seed lookup, graph traversal and assembly.
//!
//! A [`ContextService`] resolves the seeds for a request through the search
//! index (wildcard pattern, exact permalink, or type/date filter), walks the
//! relation graph outward from them and groups everything per seed.

pub mod graph;
pub mod types;

use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;

use crate::knowledge::{now_timestamp, store};
use crate::search::{SearchIndex, SearchItemType, SearchQuery};
pub use types::{ContextItem, ContextMetadata, ContextRequest, GraphContext, RelatedResult};

const MEMORY_SCHEME: &str = "memory://";

pub struct ContextService<'c> {
    conn: &'c Connection,
    index: SearchIndex<'c>,
}

impl<'c> ContextService<'c> {
    pub fn new(conn: &'c Connection, project_id: i64) -> Self {
        Self {
            conn,
            index: SearchIndex::new(conn, project_id),
        }
    }

    pub fn index(&self) -> &SearchIndex<'c> {
        &self.index
    }

    pub fn build_context(&self, request: &ContextRequest) -> Result<GraphContext> {
        let reference = request.reference.as_deref().and_then(normalize_reference);
        let page = request.page.max(1);
        let page_size = request.page_size.max(1);

        let query = match reference {
            Some(r) if r.contains('*') => SearchQuery::permalink_match(r),
            Some(r) => SearchQuery::permalink(r),
            None => SearchQuery {
                types: request.types.clone(),
                after_date: request.since.clone(),
                ..Default::default()
            },
        };

        // one extra row tells us whether another page exists
        let offset = (page - 1).saturating_mul(page_size);
        let mut primary = self.index.search(&query, page_size.saturating_add(1), offset)?;
        let has_more = primary.len() > page_size;
        primary.truncate(page_size);

        let related = graph::traverse(
            &self.index,
            &primary,
            request.depth,
            request.max_related,
            request.since.as_deref(),
        )?;

        let entity_ids: Vec<i64> = primary
            .iter()
            .filter(|p| p.item_type() == SearchItemType::Entity)
            .map(|p| p.id)
            .collect();
        let mut observations = if request.include_observations && !entity_ids.is_empty() {
            store::observations_for(self.conn, self.index.project_id(), &entity_ids)?
        } else {
            HashMap::new()
        };

        let related_count = related.len();
        let total_relations = related
            .iter()
            .filter(|r| r.item_type() == SearchItemType::Relation)
            .count();
        let mut by_root: HashMap<i64, Vec<RelatedResult>> = HashMap::new();
        for item in related {
            by_root.entry(item.root_id).or_default().push(item);
        }

        let results: Vec<ContextItem> = primary
            .into_iter()
            .map(|primary| {
                let is_entity = primary.item_type() == SearchItemType::Entity;
                let (observations, related) = if is_entity {
                    (
                        observations.remove(&primary.id).unwrap_or_default(),
                        by_root.remove(&primary.id).unwrap_or_default(),
                    )
                } else {
                    (Vec::new(), Vec::new())
                };
                ContextItem {
                    primary,
                    observations,
                    related,
                }
            })
            .collect();

        let metadata = ContextMetadata {
            uri: reference.map(str::to_string),
            types: request.types.clone(),
            depth: request.depth,
            timeframe: request.timeframe.clone(),
            generated_at: now_timestamp(),
            primary_count: results.len(),
            related_count,
            total_observations: results.iter().map(|r| r.observations.len()).sum(),
            total_relations,
        };
        tracing::debug!(
            uri = ?metadata.uri,
            primary = metadata.primary_count,
            related = metadata.related_count,
            "context built"
        );

        Ok(GraphContext {
            results,
            metadata,
            page,
            page_size,
            has_more,
        })
    }
}

/// Strip the `memory://` scheme and surrounding slashes. Blank references become `None`.
pub fn normalize_reference(reference: &str) -> Option<&str> {
    let trimmed = reference.trim();
    let path = trimmed.strip_prefix(MEMORY_SCHEME).unwrap_or(trimmed);
    Some(path.trim_matches('/')).filter(|p| !p.is_empty())
}
