//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that open the
//! database, bind the configured project and wire the MCP tool handler into a
//! running server.

use crate::config::GrimoireConfig;
use crate::db;
use crate::knowledge::types::Project;
use crate::knowledge::{store, ContentReader, ProjectFiles};
use crate::search::{SearchIndex, SearchService};
use crate::tools::GrimoireTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

type SharedState = (
    Arc<Mutex<rusqlite::Connection>>,
    Arc<dyn ContentReader>,
    Arc<Project>,
    Arc<GrimoireConfig>,
);

/// Shared setup: open DB, bind the project, make sure its search index exists.
fn setup_shared_state(config: GrimoireConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let project_root = config.resolved_project_path();
    let project = store::get_or_create_project(
        &conn,
        &config.project.name,
        &project_root.to_string_lossy(),
    )?;
    let content: Arc<dyn ContentReader> = Arc::new(ProjectFiles::new(&project_root));

    // an index that is empty while notes exist was dropped or never built
    let indexed: u64 = SearchIndex::new(&conn, project.id)
        .count_by_type()?
        .values()
        .sum();
    if indexed == 0 && store::count_entities(&conn, project.id)? > 0 {
        tracing::warn!(project = %project.name, "search index empty, rebuilding");
        SearchService::new(&conn, project.id, content.as_ref())
            .with_config(&config.search)
            .reindex_all()?;
    }
    tracing::info!(project = %project.name, root = %project_root.display(), "project ready");

    Ok((
        Arc::new(Mutex::new(conn)),
        content,
        Arc::new(project),
        Arc::new(config),
    ))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: GrimoireConfig) -> Result<()> {
    tracing::info!("starting grimoire MCP server on stdio");

    let (db, content, project, config) = setup_shared_state(config)?;

    let tools = GrimoireTools::new(db, content, project, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP.
pub async fn serve_http(config: GrimoireConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting grimoire MCP server on HTTP");

    let (db, content, project, config) = setup_shared_state(config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || {
            Ok(GrimoireTools::new(
                db.clone(),
                content.clone(),
                project.clone(),
                config.clone(),
            ))
        },
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
