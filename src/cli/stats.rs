use anyhow::Result;

use grimoire::config::GrimoireConfig;
use grimoire::knowledge::store;
use grimoire::search::SearchIndex;

/// Display search index statistics in the terminal.
pub fn stats(config: &GrimoireConfig) -> Result<()> {
    let (conn, project) = super::open_project(config)?;

    let by_type = SearchIndex::new(&conn, project.id).count_by_type()?;
    let entities = store::count_entities(&conn, project.id)?;

    println!("Index Statistics ({})", project.name);
    println!("{}", "=".repeat(40));
    println!("  Stored entities:     {entities}");
    println!();

    println!("Index rows:");
    for t in &["entity", "observation", "relation"] {
        let count = by_type.get(*t).copied().unwrap_or(0);
        println!("  {:<12} {}", t, count);
    }

    let indexed = by_type.get("entity").copied().unwrap_or(0);
    if indexed != entities {
        println!();
        println!("Index is out of date: run `grimoire reindex`.");
    }

    Ok(())
}
