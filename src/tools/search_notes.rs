//! MCP `search_notes` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_notes` MCP tool.
///
/// At most one lookup applies: a `permalink` containing `*` wins, then an exact
/// `permalink`, then `title`, then ranked `query` text.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchNotesParams {
    /// Free text ranked against titles and content. Supports AND/OR/NOT, quoted phrases and `*`.
    #[schemars(
        description = "Full-text query. Supports boolean operators (AND, OR, NOT), \"quoted phrases\" and trailing * for prefixes."
    )]
    pub query: Option<String>,

    /// Exact title match.
    #[schemars(description = "Exact title to look up")]
    pub title: Option<String>,

    /// Exact permalink, or a glob pattern when it contains `*`.
    #[schemars(description = "Permalink to look up. A pattern containing * (e.g. 'specs/*') matches as a glob.")]
    pub permalink: Option<String>,

    /// Row kinds: `"entity"`, `"observation"`, `"relation"`.
    #[schemars(description = "Restrict to item types: 'entity', 'observation', 'relation'")]
    pub types: Option<Vec<String>>,

    /// Entity types from note frontmatter (e.g. `"note"`, `"spec"`).
    #[schemars(description = "Restrict to entity types, e.g. 'note' or 'spec'")]
    pub entity_types: Option<Vec<String>>,

    /// Only items created or updated since this timeframe.
    #[schemars(description = "Only items changed since: '7d', '24h', '2w', 'today', 'yesterday', or a date")]
    pub after_date: Option<String>,

    /// 1-based page number. Defaults to 1.
    #[schemars(description = "Page number, starting at 1. Defaults to 1.")]
    pub page: Option<usize>,

    /// Results per page. Defaults to the configured page size.
    #[schemars(description = "Results per page (1-100)")]
    pub page_size: Option<usize>,
}
