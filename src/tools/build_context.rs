//! MCP `build_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `build_context` MCP tool.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct BuildContextParams {
    /// `memory://` URL or permalink; `*` makes it a pattern. Omit to select by type and timeframe.
    #[schemars(
        description = "memory:// URL or permalink of the starting note. Use * for patterns (e.g. 'memory://specs/*'). Omit to start from recent items."
    )]
    pub url: Option<String>,

    /// Seed item types when no `url` is given.
    #[schemars(description = "Seed item types when no url is given: 'entity', 'observation', 'relation'")]
    pub types: Option<Vec<String>>,

    /// Relation hops to follow from each seed.
    #[schemars(description = "How many relation hops to follow (0-5). Defaults to the configured depth.")]
    pub depth: Option<u32>,

    /// Only include items changed within this timeframe.
    #[schemars(description = "Only include items changed since: '7d', '24h', 'today', or a date")]
    pub timeframe: Option<String>,

    #[schemars(description = "Page of seed results, starting at 1")]
    pub page: Option<usize>,

    #[schemars(description = "Seed results per page")]
    pub page_size: Option<usize>,

    /// Cap on related items across all seeds.
    #[schemars(description = "Maximum number of related items to return")]
    pub max_related: Option<usize>,

    #[schemars(description = "Attach observations to seed notes. Defaults to true.")]
    pub include_observations: Option<bool>,
}
