pub mod build_context;
pub mod index_stats;
pub mod reindex;
pub mod search_notes;
pub mod timeframe;

use build_context::BuildContextParams;
use chrono::{DateTime, Utc};
use index_stats::IndexStatsParams;
use reindex::ReindexParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use search_notes::SearchNotesParams;
use std::sync::{Arc, Mutex};

use crate::config::GrimoireConfig;
use crate::context::{ContextRequest, ContextService};
use crate::error::{SearchError, QUERY_SYNTAX_HELP};
use crate::knowledge::types::Project;
use crate::knowledge::{format_timestamp, store, ContentReader};
use crate::search::{SearchIndex, SearchItemType, SearchQuery, SearchService};

const MAX_PAGE_SIZE: usize = 100;
const MAX_DEPTH: u32 = 5;

/// The grimoire MCP tool handler. Holds the shared connection, the active
/// project and the content reader, and exposes the search and context tools
/// via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct GrimoireTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    content: Arc<dyn ContentReader>,
    project: Arc<Project>,
    config: Arc<GrimoireConfig>,
}

#[tool_router]
impl GrimoireTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        content: Arc<dyn ContentReader>,
        project: Arc<Project>,
        config: Arc<GrimoireConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            content,
            project,
            config,
        }
    }

    /// Search notes, observations and relations in the current project.
    #[tool(description = "Search the knowledge base. Use 'query' for ranked full-text search, 'permalink' for an exact note (or a pattern with *), or 'title' for an exact title. Filter by item types, entity types and 'after_date'.")]
    async fn search_notes(
        &self,
        Parameters(params): Parameters<SearchNotesParams>,
    ) -> Result<String, String> {
        let page = params.page.unwrap_or(1).max(1);
        let page_size = params
            .page_size
            .unwrap_or(self.config.search.page_size)
            .clamp(1, MAX_PAGE_SIZE);
        let query = search_query_from(&params, Utc::now())?;

        tracing::info!(
            project = %self.project.name,
            query = ?query.text,
            permalink = ?query.permalink.as_ref().or(query.permalink_match.as_ref()),
            page,
            "search_notes called"
        );

        let project_id = self.project.id;
        let results = self
            .with_conn("search", move |conn| {
                let index = SearchIndex::new(conn, project_id);
                index
                    .search(&query, page_size + 1, page_offset(page, page_size))
                    .map_err(search_error_message)
            })
            .await?;

        let has_more = results.len() > page_size;
        let results: Vec<_> = results.into_iter().take(page_size).collect();
        tracing::info!(results = results.len(), has_more, "search_notes finished");

        serde_json::to_string(&serde_json::json!({
            "results": results,
            "page": page,
            "page_size": page_size,
            "has_more": has_more,
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Build graph context around a note or a set of recent items.
    #[tool(description = "Build context from a memory:// URL or permalink: the matching notes with their observations and the items related to them through the knowledge graph. Without a url, starts from items of the given types changed within the timeframe.")]
    async fn build_context(
        &self,
        Parameters(params): Parameters<BuildContextParams>,
    ) -> Result<String, String> {
        let request = context_request_from(&params, &self.config, Utc::now())?;
        tracing::info!(
            project = %self.project.name,
            url = ?request.reference,
            depth = request.depth,
            timeframe = ?request.timeframe,
            "build_context called"
        );

        let project_id = self.project.id;
        let context = self
            .with_conn("context", move |conn| {
                ContextService::new(conn, project_id)
                    .build_context(&request)
                    .map_err(|e| format!("context build failed: {e:#}"))
            })
            .await?;

        tracing::info!(
            primary = context.metadata.primary_count,
            related = context.metadata.related_count,
            "build_context finished"
        );
        serde_json::to_string(&context).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Rebuild the search index for the current project.
    #[tool(description = "Rebuild the search index for the current project from the stored notes. Requires confirm=true. Use when search results look stale or incomplete.")]
    async fn reindex(
        &self,
        Parameters(params): Parameters<ReindexParams>,
    ) -> Result<String, String> {
        if !params.confirm {
            return Err("reindex requires confirm=true".into());
        }
        tracing::info!(project = %self.project.name, "reindex called");

        let project_id = self.project.id;
        let content = Arc::clone(&self.content);
        let index_config = self.config.search.clone();
        let report = self
            .with_conn("reindex", move |conn| {
                SearchService::new(conn, project_id, content.as_ref())
                    .with_config(&index_config)
                    .reindex_all()
                    .map_err(|e| format!("reindex failed: {e:#}"))
            })
            .await?;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Row counts for the current project's search index.
    #[tool(description = "Show search index statistics for the current project: row counts by item type and the number of stored notes.")]
    async fn index_stats(
        &self,
        Parameters(_params): Parameters<IndexStatsParams>,
    ) -> Result<String, String> {
        let project_id = self.project.id;
        let project_name = self.project.name.clone();
        let stats = self
            .with_conn("stats", move |conn| {
                let by_type = SearchIndex::new(conn, project_id)
                    .count_by_type()
                    .map_err(|e| e.to_string())?;
                let entities =
                    store::count_entities(conn, project_id).map_err(|e| e.to_string())?;
                Ok(serde_json::json!({
                    "project": project_name,
                    "entities": entities,
                    "index_rows": by_type,
                }))
            })
            .await?;
        Ok(stats.to_string())
    }
}

impl GrimoireTools {
    /// Run `f` against the locked connection on the blocking pool.
    async fn with_conn<T, F>(&self, label: &'static str, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, String> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|e| format!("db lock poisoned: {e}"))?;
            f(&conn)
        })
        .await
        .map_err(|e| format!("{label} task failed: {e}"))?
    }
}

#[tool_handler]
impl ServerHandler for GrimoireTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Grimoire is a personal knowledge base. Use search_notes to find notes, \
                 build_context to follow a note's relations, and reindex if results look stale."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

/// Parse item-type names, rejecting unknown ones.
pub fn parse_item_types(types: &[String]) -> Result<Vec<SearchItemType>, String> {
    types
        .iter()
        .map(|t| t.trim().to_lowercase().parse::<SearchItemType>())
        .collect()
}

/// Tool-facing message for a search failure. Syntax errors carry usage help.
pub fn search_error_message(err: SearchError) -> String {
    if err.is_query_syntax() {
        format!("{err}\n\n{QUERY_SYNTAX_HELP}")
    } else {
        format!("search failed: {err}")
    }
}

/// Rows to skip for a 1-based page; saturates instead of overflowing.
fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1).saturating_mul(page_size)
}

fn search_query_from(params: &SearchNotesParams, now: DateTime<Utc>) -> Result<SearchQuery, String> {
    let mut query = SearchQuery {
        text: params.query.clone(),
        title: params.title.clone(),
        ..Default::default()
    };
    match params.permalink.as_deref() {
        Some(p) if p.contains('*') => query.permalink_match = Some(p.to_string()),
        Some(p) => query.permalink = Some(p.to_string()),
        None => {}
    }
    if let Some(types) = &params.types {
        query.types = parse_item_types(types)?;
    }
    if let Some(entity_types) = &params.entity_types {
        query.entity_types = entity_types.clone();
    }
    if let Some(after) = &params.after_date {
        query.after_date = Some(format_timestamp(timeframe::parse_timeframe(after, now)?));
    }
    Ok(query)
}

fn context_request_from(
    params: &BuildContextParams,
    config: &GrimoireConfig,
    now: DateTime<Utc>,
) -> Result<ContextRequest, String> {
    let reference = params.url.clone().filter(|u| !u.trim().is_empty());
    // without a url the default window keeps the seed set to recent items
    let timeframe = match (&params.timeframe, &reference) {
        (Some(t), _) => Some(t.clone()),
        (None, None) => Some(config.context.timeframe.clone()),
        (None, Some(_)) => None,
    };
    let since = timeframe
        .as_deref()
        .map(|t| timeframe::parse_timeframe(t, now).map(format_timestamp))
        .transpose()?;
    let types = match &params.types {
        Some(types) => parse_item_types(types)?,
        None if reference.is_none() => vec![SearchItemType::Entity],
        None => Vec::new(),
    };

    Ok(ContextRequest {
        reference,
        types,
        since,
        timeframe,
        depth: params.depth.unwrap_or(config.context.depth).min(MAX_DEPTH),
        page: params.page.unwrap_or(1).max(1),
        page_size: params
            .page_size
            .unwrap_or(config.context.page_size)
            .clamp(1, MAX_PAGE_SIZE),
        max_related: params.max_related.unwrap_or(config.context.max_related),
        include_observations: params.include_observations.unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn huge_pages_saturate() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(usize::MAX, MAX_PAGE_SIZE), usize::MAX);
    }

    #[test]
    fn permalink_with_star_becomes_pattern() {
        let params = SearchNotesParams {
            permalink: Some("specs/*".into()),
            query: Some("ignored".into()),
            ..Default::default()
        };
        let query = search_query_from(&params, now()).unwrap();
        assert_eq!(query.permalink_match.as_deref(), Some("specs/*"));
        assert!(query.permalink.is_none());
    }

    #[test]
    fn after_date_is_resolved() {
        let params = SearchNotesParams {
            query: Some("rust".into()),
            after_date: Some("1d".into()),
            types: Some(vec!["Entity".into()]),
            ..Default::default()
        };
        let query = search_query_from(&params, now()).unwrap();
        assert_eq!(query.after_date.as_deref(), Some("2026-03-14T12:00:00Z"));
        assert_eq!(query.types, vec![SearchItemType::Entity]);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let params = SearchNotesParams {
            types: Some(vec!["memory".into()]),
            ..Default::default()
        };
        assert!(search_query_from(&params, now()).is_err());
    }

    #[test]
    fn context_defaults_without_url() {
        let config = GrimoireConfig::default();
        let request = context_request_from(&BuildContextParams::default(), &config, now()).unwrap();
        assert!(request.reference.is_none());
        assert_eq!(request.types, vec![SearchItemType::Entity]);
        assert_eq!(request.timeframe.as_deref(), Some("7d"));
        assert_eq!(request.since.as_deref(), Some("2026-03-08T12:00:00Z"));
        assert_eq!(request.depth, 1);
    }

    #[test]
    fn context_with_url_has_no_default_window() {
        let config = GrimoireConfig::default();
        let params = BuildContextParams {
            url: Some("memory://specs/search".into()),
            depth: Some(9),
            ..Default::default()
        };
        let request = context_request_from(&params, &config, now()).unwrap();
        assert!(request.since.is_none());
        assert!(request.types.is_empty());
        assert_eq!(request.depth, MAX_DEPTH);
    }

    #[test]
    fn syntax_errors_carry_help() {
        let err = SearchError::QuerySyntax {
            query: "a AND".into(),
            message: "fts5: syntax error".into(),
        };
        let message = search_error_message(err);
        assert!(message.contains(QUERY_SYNTAX_HELP));
    }
}
