//! Bounded breadth-first traversal over entity and relation rows.
//!
//! Levels alternate: from the entities on one level, every relation touching
//! them (either direction) sits on the next level, and the entity at the far
//! end of each relation on the level after. A caller depth of N therefore
//! walks `2 * N` levels. Every item is visited once; seeds are pre-visited so
//! they never come back as related items. Graphs may be cyclic, so the level
//! budget and the result cap are what bound the walk.

use std::collections::{HashMap, HashSet};

use super::types::RelatedResult;
use crate::error::SearchError;
use crate::search::{IndexedItem, SearchIndex, SearchItemType, SearchResult};

/// Read access the traversal needs. `since` restricts rows to those created
/// or updated at or after it; relation rows carry their source entity's dates.
pub trait GraphSource {
    fn relations_touching(
        &self,
        entity_ids: &[i64],
        since: Option<&str>,
    ) -> Result<Vec<SearchResult>, SearchError>;

    fn entities_by_id(&self, ids: &[i64], since: Option<&str>)
        -> Result<Vec<SearchResult>, SearchError>;
}

impl GraphSource for SearchIndex<'_> {
    fn relations_touching(
        &self,
        entity_ids: &[i64],
        since: Option<&str>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        SearchIndex::relations_touching(self, entity_ids, since)
    }

    fn entities_by_id(
        &self,
        ids: &[i64],
        since: Option<&str>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        SearchIndex::entities_by_id(self, ids, since)
    }
}

/// Walk outward from the entity rows in `seeds`.
///
/// Returns related items ordered by level, then type, then id, capped at
/// `max_related`. Non-entity seeds are excluded from the results but start no
/// walk; with no entity seeds nothing is queried.
pub fn traverse(
    source: &dyn GraphSource,
    seeds: &[SearchResult],
    depth: u32,
    max_related: usize,
    since: Option<&str>,
) -> Result<Vec<RelatedResult>, SearchError> {
    let mut visited: HashSet<(SearchItemType, i64)> = seeds.iter().map(SearchResult::key).collect();
    // entity id -> root seed, in seed order
    let mut frontier: Vec<(i64, i64)> = seeds
        .iter()
        .filter(|s| s.item_type() == SearchItemType::Entity)
        .map(|s| (s.id, s.id))
        .collect();

    let budget = depth.saturating_mul(2);
    let mut related = Vec::new();
    if frontier.is_empty() || budget == 0 || max_related == 0 {
        return Ok(related);
    }

    let mut level = 0;
    while level < budget && !frontier.is_empty() {
        // entities -> relations
        level += 1;
        let roots: HashMap<i64, i64> = frontier.iter().copied().collect();
        let ids: Vec<i64> = frontier.iter().map(|(id, _)| *id).collect();
        let mut relations = source.relations_touching(&ids, since)?;
        relations.sort_by_key(|r| r.id);

        let mut far_ends: Vec<(i64, i64)> = Vec::new();
        for relation in relations {
            let IndexedItem::Relation { from_id, to_id, .. } = relation.item else {
                continue;
            };
            let (root, other) = if let Some(root) = roots.get(&from_id) {
                (*root, to_id)
            } else if let Some(root) = to_id.and_then(|t| roots.get(&t)) {
                (*root, Some(from_id))
            } else {
                continue;
            };
            if !visited.insert(relation.key()) {
                continue;
            }
            if let Some(other) = other {
                far_ends.push((other, root));
            }
            related.push(RelatedResult {
                item: relation,
                depth: level,
                root_id: root,
            });
            if related.len() >= max_related {
                return Ok(related);
            }
        }

        if level >= budget {
            break;
        }

        // relations -> entities at their far end
        level += 1;
        let mut candidate_roots: HashMap<i64, i64> = HashMap::new();
        for (id, root) in far_ends {
            if !visited.contains(&(SearchItemType::Entity, id)) {
                candidate_roots.entry(id).or_insert(root);
            }
        }
        let mut candidate_ids: Vec<i64> = candidate_roots.keys().copied().collect();
        candidate_ids.sort_unstable();
        if candidate_ids.is_empty() {
            break;
        }
        let mut entities = source.entities_by_id(&candidate_ids, since)?;
        entities.sort_by_key(|e| e.id);

        frontier = Vec::new();
        for entity in entities {
            let Some(root) = candidate_roots.get(&entity.id).copied() else {
                continue;
            };
            if !visited.insert(entity.key()) {
                continue;
            }
            frontier.push((entity.id, root));
            related.push(RelatedResult {
                item: entity,
                depth: level,
                root_id: root,
            });
            if related.len() >= max_related {
                return Ok(related);
            }
        }
    }

    tracing::debug!(seeds = seeds.len(), depth, related = related.len(), "traversal finished");
    Ok(related)
}
