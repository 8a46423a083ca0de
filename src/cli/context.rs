//! CLI `context` command: show a note with its observations and related items.

use anyhow::{anyhow, Result};
use chrono::Utc;

use grimoire::config::GrimoireConfig;
use grimoire::context::{ContextRequest, ContextService};
use grimoire::knowledge::format_timestamp;
use grimoire::tools::timeframe::parse_timeframe;

pub fn context(
    config: &GrimoireConfig,
    reference: &str,
    depth: Option<u32>,
    timeframe: Option<&str>,
) -> Result<()> {
    let (conn, project) = super::open_project(config)?;

    let since = timeframe
        .map(|t| parse_timeframe(t, Utc::now()).map(format_timestamp))
        .transpose()
        .map_err(|e| anyhow!(e))?;
    let request = ContextRequest {
        reference: Some(reference.to_string()),
        since,
        timeframe: timeframe.map(str::to_string),
        depth: depth.unwrap_or(config.context.depth),
        page_size: config.context.page_size,
        max_related: config.context.max_related,
        ..Default::default()
    };

    let context = ContextService::new(&conn, project.id).build_context(&request)?;
    if context.results.is_empty() {
        println!("Nothing matches {reference}.");
        return Ok(());
    }

    for item in &context.results {
        let p = &item.primary;
        println!("{} [{}]", p.title, p.item_type());
        println!("{}", "=".repeat(50));
        if let Some(ref permalink) = p.permalink {
            println!("  Permalink:  {permalink}");
        }
        println!("  File:       {}", p.file_path);
        println!("  Updated:    {}", p.updated_at);

        if !item.observations.is_empty() {
            println!();
            println!("Observations:");
            for obs in &item.observations {
                println!("  - [{}] {}", obs.category, obs.content);
            }
        }

        if !item.related.is_empty() {
            println!();
            println!("Related:");
            for rel in &item.related {
                let indent = "  ".repeat(rel.depth.div_ceil(2) as usize);
                println!("{indent}- [{}] {} (depth {})", rel.item_type(), rel.item.title, rel.depth);
            }
        }
        println!();
    }

    let meta = &context.metadata;
    println!(
        "{} primary, {} related ({} relations), {} observations",
        meta.primary_count, meta.related_count, meta.total_relations, meta.total_observations
    );
    if context.has_more {
        println!("More results available; narrow the reference to see them.");
    }
    Ok(())
}
