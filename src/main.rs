mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use grimoire::config::GrimoireConfig;
use grimoire::server;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grimoire", version, about = "Personal knowledge-base MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio unless configured or asked for HTTP)
    Serve {
        /// Serve streamable HTTP on the configured host and port
        #[arg(long)]
        http: bool,
    },
    /// Rebuild the search index for the configured project
    Reindex {
        /// Drop the whole index and rebuild every project
        #[arg(long)]
        rebuild: bool,
    },
    /// Full-text search
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show a note with its observations and related items
    Context {
        /// Permalink, pattern (`specs/*`) or memory:// URL
        reference: String,
        #[arg(long)]
        depth: Option<u32>,
        /// Only include items changed since (e.g. 7d, yesterday, 2026-01-31)
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Show search index statistics
    Stats,
    /// Check database health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = GrimoireConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Reindex { rebuild } => cli::reindex::reindex(&config, rebuild)?,
        Command::Search { query, limit } => cli::search::search(&config, &query, limit)?,
        Command::Context {
            reference,
            depth,
            timeframe,
        } => cli::context::context(&config, &reference, depth, timeframe.as_deref())?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
