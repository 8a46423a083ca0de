//! Grimoire: a personal knowledge base served to AI assistants over MCP.
//!
//! Markdown notes become **entities** carrying **observations** (categorized
//! facts) and **relations** (typed, directed links to other notes). Everything
//! lives in one SQLite database, and a derived FTS5 index makes it searchable:
//!
//! | Row | Title | Searchable text |
//! |-----|-------|-----------------|
//! | **Entity** | note title | title, permalink, path and tag variants plus the body |
//! | **Observation** | `category: content` | variants of the content |
//! | **Relation** | `from → to` | variants of the title |
//!
//! # Architecture
//!
//! - **Storage**: SQLite (bundled) with an FTS5 table rebuilt from the
//!   knowledge tables on demand
//! - **Search**: exact permalink, permalink glob, exact title, or bm25-ranked
//!   text, always scoped to one project
//! - **Context**: bounded breadth-first walk over entity/relation edges from
//!   a set of seed notes
//! - **Transport**: MCP over stdio (primary) or streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: connection setup, schema, migrations and health checks
//! - [`knowledge`]: projects, entities, observations and relations
//! - [`search`]: stem generation, the search index and the indexing service
//! - [`context`]: seed resolution, graph traversal and context assembly
//! - [`tools`]: the MCP tool surface

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod knowledge;
pub mod search;
pub mod server;
pub mod tools;
