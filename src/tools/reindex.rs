//! MCP `reindex` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `reindex` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReindexParams {
    /// Safety gate; the rebuild only runs when this is `true`.
    #[schemars(description = "Must be true. Rebuilds the search index for the current project.")]
    pub confirm: bool,
}
