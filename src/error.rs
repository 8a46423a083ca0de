//! Typed errors for the search index.
//!
//! Everything else in the crate uses `anyhow`; search keeps a concrete type so
//! the tool layer can tell a bad query apart from a broken database.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The full-text grammar rejected the query (unbalanced quotes or
    /// parentheses, dangling operators, unknown column filters).
    #[error("invalid search syntax in {query:?}: {message}")]
    QuerySyntax { query: String, message: String },

    #[error("search index database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("search row metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl SearchError {
    pub fn is_query_syntax(&self) -> bool {
        matches!(self, SearchError::QuerySyntax { .. })
    }

    /// Reclassify a database error raised while running a MATCH query.
    pub(crate) fn from_match_error(query: &str, err: rusqlite::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("fts5:")
            || lower.contains("no such column")
            || lower.contains("unknown special query")
            || lower.contains("malformed match")
        {
            SearchError::QuerySyntax {
                query: query.to_string(),
                message,
            }
        } else {
            SearchError::Database(err)
        }
    }
}

/// User-facing hint attached to query-syntax failures by the tool layer.
pub const QUERY_SYNTAX_HELP: &str = "Search syntax help: wrap phrases in double quotes, \
balance parentheses, write boolean operators in upper case (AND, OR, NOT) with terms on \
both sides, and use a trailing * for prefix matches.";
