pub mod context;
pub mod doctor;
pub mod reindex;
pub mod search;
pub mod stats;

use anyhow::Result;
use rusqlite::Connection;

use grimoire::config::GrimoireConfig;
use grimoire::knowledge::store;
use grimoire::knowledge::types::Project;

/// Open the configured database and bind the configured project.
fn open_project(config: &GrimoireConfig) -> Result<(Connection, Project)> {
    let conn = grimoire::db::open_database(config.resolved_db_path())?;
    let project = store::get_or_create_project(
        &conn,
        &config.project.name,
        &config.resolved_project_path().to_string_lossy(),
    )?;
    Ok((conn, project))
}
