pub mod store;
pub mod tags;
pub mod types;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::PathBuf;

use types::Entity;

/// Read the full body of an entity's backing file.
///
/// Returns `Ok(None)` for entities without a parsable body (non-markdown files,
/// or a file that has disappeared since the entity was last synced).
pub trait ContentReader: Send + Sync {
    fn read_content(&self, entity: &Entity) -> Result<Option<String>>;
}

/// Reads entity bodies from files under a project root.
pub struct ProjectFiles {
    root: PathBuf,
}

impl ProjectFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentReader for ProjectFiles {
    fn read_content(&self, entity: &Entity) -> Result<Option<String>> {
        if !entity.is_markdown() {
            return Ok(None);
        }
        let path = self.root.join(&entity.file_path);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "entity file missing, indexing without content");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }
}

/// Stored timestamp form: RFC 3339, UTC, second precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Lowercase, path-preserving slug: runs of anything other than alphanumerics
/// and `/` collapse to a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '/' {
            if pending_dash && !slug.is_empty() && !slug.ends_with('/') && c != '/' {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
