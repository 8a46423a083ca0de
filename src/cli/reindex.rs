//! CLI `reindex` command: rebuild the search index with a progress bar.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use grimoire::config::{expand_tilde, GrimoireConfig};
use grimoire::knowledge::{store, ProjectFiles};
use grimoire::search::{SearchIndex, SearchService};

/// Rebuild the configured project's rows. With `rebuild`, drop the whole
/// table first and re-index every project.
pub fn reindex(config: &GrimoireConfig, rebuild: bool) -> Result<()> {
    let (conn, project) = super::open_project(config)?;

    let projects = if rebuild {
        let index = SearchIndex::new(&conn, project.id);
        index.drop_search_index()?;
        index.init_search_index()?;
        store::list_projects(&conn)?
    } else {
        vec![project]
    };

    for project in projects {
        let content = ProjectFiles::new(expand_tilde(&project.path));
        let service = SearchService::new(&conn, project.id, &content).with_config(&config.search);

        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {prefix} {bar:40.cyan/blue} {pos}/{len} ({eta})")
                .context("invalid progress template")?
                .progress_chars("##-"),
        );
        pb.set_prefix(project.name.clone());

        let report = service.reindex_all_with(|done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })?;
        pb.finish_and_clear();

        println!(
            "Project {}: indexed {} entities ({} rows)",
            project.name, report.entities, report.rows
        );
    }

    Ok(())
}
