//! Full-text search over entities, observations and relations.
//!
//! - [`stems`]: variant generation that widens what the tokenizer can match
//! - [`query`]: structured queries and lookup-mode resolution
//! - [`index`]: the FTS5 table and its project-scoped operations
//! - [`service`]: derives rows from entities and keeps the index consistent

pub mod index;
pub mod query;
pub mod service;
pub mod stems;

pub use index::{IndexedItem, SearchIndex, SearchIndexRow, SearchResult};
pub use query::{SearchItemType, SearchMode, SearchQuery};
pub use service::{spawn_index_entity, ReindexReport, SearchService};
