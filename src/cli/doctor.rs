//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use grimoire::config::GrimoireConfig;
use grimoire::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &GrimoireConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `grimoire serve` or `grimoire reindex` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Grimoire Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Project root:      {}", config.resolved_project_path().display());
    println!();
    println!("Row counts:");
    println!("  Projects:        {}", report.project_count);
    println!("  Entities:        {}", report.entity_count);
    println!("  Observations:    {}", report.observation_count);
    println!("  Relations:       {}", report.relation_count);
    println!("    unresolved:    {}", report.unresolved_relation_count);
    println!("  Search rows:     {}", report.search_row_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    if report.entity_count > 0 && report.search_row_count == 0 {
        println!();
        println!("Search index is empty: run `grimoire reindex --rebuild`.");
    }

    if !report.integrity_ok {
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db ~/.grimoire/grimoire.db");
        println!("  2. The search index is derived data; `grimoire reindex --rebuild`");
        println!("     recreates it from the knowledge tables.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
