use anyhow::Result;

use grimoire::config::GrimoireConfig;
use grimoire::error::QUERY_SYNTAX_HELP;
use grimoire::search::{SearchIndex, SearchQuery};

/// Run a full-text search from the terminal.
pub fn search(config: &GrimoireConfig, query: &str, limit: usize) -> Result<()> {
    let (conn, project) = super::open_project(config)?;
    let index = SearchIndex::new(&conn, project.id);

    let results = match index.search(&SearchQuery::text(query), limit, 0) {
        Ok(results) => results,
        Err(e) if e.is_query_syntax() => {
            println!("{e}\n\n{QUERY_SYNTAX_HELP}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s) in project {}\n", results.len(), project.name);

    for (i, result) in results.iter().enumerate() {
        println!(
            "  {}. [{}] {} (score: {:.4})",
            i + 1,
            result.item_type(),
            result.title,
            result.score.unwrap_or_default(),
        );
        if let Some(ref permalink) = result.permalink {
            println!("     {permalink}");
        }
        if let Some(ref snippet) = result.content_snippet {
            let preview: String = snippet.chars().take(120).collect();
            let ellipsis = if snippet.chars().count() > 120 { "..." } else { "" };
            println!("     {}{ellipsis}", preview.replace('\n', " "));
        }
        println!();
    }

    Ok(())
}
