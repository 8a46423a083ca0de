//! Knowledge-base record definitions.
//!
//! Defines [`Project`] (the isolation scope), [`Entity`] (one file), [`Observation`]
//! (a categorized annotation on an entity) and [`Relation`] (a directed, typed edge
//! that may still be waiting for its target to exist).

use serde::{Deserialize, Serialize};

use super::tags::RawTags;

/// Content type of markdown notes; anything else is indexed without a body.
pub const MARKDOWN: &str = "text/markdown";

/// A named scope with a root path on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub created_at: String,
}

/// A knowledge unit backed by one file, with its observations and outgoing
/// relations loaded eagerly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub entity_type: String,
    /// Stable slug, unique within the project. `None` for non-markdown files.
    pub permalink: Option<String>,
    /// Path relative to the project root.
    pub file_path: String,
    pub content_type: String,
    pub checksum: Option<String>,
    /// Arbitrary frontmatter key-values (e.g. `{"tags": ["rust"]}`).
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
    pub observations: Vec<Observation>,
    /// Relations whose source is this entity. Incoming edges are never loaded here.
    pub relations: Vec<Relation>,
}

impl Entity {
    pub fn is_markdown(&self) -> bool {
        self.content_type == MARKDOWN
    }

    /// Tags from `metadata.tags`, normalized to a plain list whatever shape they were stored in.
    pub fn tags(&self) -> Vec<String> {
        RawTags::from_metadata(self.metadata.as_ref()).normalize()
    }
}

/// Fields supplied by the parser when an entity is created or updated.
#[derive(Debug, Clone, Default)]
pub struct EntityDraft {
    pub title: String,
    pub entity_type: String,
    pub permalink: Option<String>,
    pub file_path: String,
    pub content_type: String,
    pub checksum: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl EntityDraft {
    /// A markdown note draft with the permalink derived from the title.
    pub fn note(title: &str, file_path: &str) -> Self {
        Self {
            title: title.to_string(),
            entity_type: "note".to_string(),
            permalink: Some(super::slugify(title)),
            file_path: file_path.to_string(),
            content_type: MARKDOWN.to_string(),
            checksum: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_type(mut self, entity_type: &str) -> Self {
        self.entity_type = entity_type.to_string();
        self
    }
}

/// A categorized annotation attached to exactly one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub entity_id: i64,
    pub category: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Derived from the owner's permalink; `None` when the owner has none.
    pub permalink: Option<String>,
}

/// A directed, typed edge from one entity to another or to a not-yet-existing name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    pub from_id: i64,
    /// `None` while the reference is unresolved.
    pub to_id: Option<i64>,
    /// Name as written in the source note.
    pub to_name: String,
    pub relation_type: String,
    pub context: Option<String>,
    /// Title of the target entity when resolved.
    pub to_title: Option<String>,
    pub permalink: Option<String>,
}

impl Relation {
    pub fn is_resolved(&self) -> bool {
        self.to_id.is_some()
    }
}

/// `<entity>/observations/<category>/<content>`
pub fn observation_permalink(entity_permalink: &str, category: &str, content: &str) -> String {
    format!("{entity_permalink}/observations/{category}/{content}")
}

/// `<from>/<relation-type>/<to>`, using the target permalink when resolved and its
/// slugified name otherwise.
pub fn relation_permalink(from_permalink: &str, relation_type: &str, target: &str) -> String {
    format!(
        "{from_permalink}/{}/{}",
        super::slugify(relation_type),
        super::slugify(target)
    )
}
