//! Request and result shapes for context building.
//!
//! Everything here serializes directly to JSON for the tool layer.

use serde::{Deserialize, Serialize};

use crate::knowledge::types::Observation;
use crate::search::{SearchItemType, SearchResult};

/// What to build context around.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRequest {
    /// Permalink or `*` pattern, optionally prefixed with `memory://`.
    pub reference: Option<String>,
    /// Seed types when no reference is given.
    pub types: Vec<SearchItemType>,
    /// Resolved RFC 3339 cutoff applied to seeds (filter path) and every traversal step.
    pub since: Option<String>,
    /// Human form of `since`, echoed back in the metadata.
    pub timeframe: Option<String>,
    /// Relation hops from each seed.
    pub depth: u32,
    /// 1-based page of seeds.
    pub page: usize,
    pub page_size: usize,
    pub max_related: usize,
    pub include_observations: bool,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            reference: None,
            types: Vec::new(),
            since: None,
            timeframe: None,
            depth: 1,
            page: 1,
            page_size: 10,
            max_related: 10,
            include_observations: true,
        }
    }
}

impl ContextRequest {
    pub fn for_reference(reference: &str) -> Self {
        Self {
            reference: Some(reference.to_string()),
            ..Default::default()
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_since(mut self, since: &str) -> Self {
        self.since = Some(since.to_string());
        self
    }
}

/// An item reached by traversal.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedResult {
    #[serde(flatten)]
    pub item: SearchResult,
    /// Internal (doubled) depth at which the item was first reached:
    /// relations land on odd levels, entities on even ones.
    pub depth: u32,
    /// Seed entity that reached it first.
    pub root_id: i64,
}

impl RelatedResult {
    pub fn item_type(&self) -> SearchItemType {
        self.item.item_type()
    }
}

/// One seed with what hangs off it.
#[derive(Debug, Clone, Serialize)]
pub struct ContextItem {
    pub primary: SearchResult,
    pub observations: Vec<Observation>,
    pub related: Vec<RelatedResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextMetadata {
    pub uri: Option<String>,
    pub types: Vec<SearchItemType>,
    pub depth: u32,
    pub timeframe: Option<String>,
    pub generated_at: String,
    pub primary_count: usize,
    pub related_count: usize,
    pub total_observations: usize,
    pub total_relations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphContext {
    pub results: Vec<ContextItem>,
    pub metadata: ContextMetadata,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}
