//! Structured search requests and how they map onto one index lookup.

use serde::{Deserialize, Serialize};

/// The three kinds of rows the search index holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchItemType {
    Entity,
    Observation,
    Relation,
}

impl SearchItemType {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Observation => "observation",
            Self::Relation => "relation",
        }
    }
}

impl std::fmt::Display for SearchItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(Self::Entity),
            "observation" => Ok(Self::Observation),
            "relation" => Ok(Self::Relation),
            _ => Err(format!("unknown search item type: {s}")),
        }
    }
}

/// A search request from the tool or CLI layer. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text, ranked against titles and content stems.
    pub text: Option<String>,
    /// Exact title.
    pub title: Option<String>,
    /// Exact permalink.
    pub permalink: Option<String>,
    /// Permalink pattern; `*` makes it a glob.
    pub permalink_match: Option<String>,
    /// Row kinds to include.
    #[serde(default)]
    pub types: Vec<SearchItemType>,
    /// Entity types (`metadata.entity_type`) to include.
    #[serde(default)]
    pub entity_types: Vec<String>,
    /// RFC 3339 cutoff; rows created or updated at or after it match.
    pub after_date: Option<String>,
}

/// How the index is asked. Exactly one per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    PermalinkGlob(String),
    Permalink(String),
    Title(String),
    Text(String),
    /// Only type/date filters apply.
    FilterOnly,
}

impl SearchQuery {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn permalink(permalink: &str) -> Self {
        Self {
            permalink: Some(permalink.to_string()),
            ..Default::default()
        }
    }

    pub fn permalink_match(pattern: &str) -> Self {
        Self {
            permalink_match: Some(pattern.to_string()),
            ..Default::default()
        }
    }

    pub fn title(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn with_types(mut self, types: &[SearchItemType]) -> Self {
        self.types = types.to_vec();
        self
    }

    pub fn with_entity_types(mut self, entity_types: &[&str]) -> Self {
        self.entity_types = entity_types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn after(mut self, after_date: &str) -> Self {
        self.after_date = Some(after_date.to_string());
        self
    }

    /// `true` when nothing at all was asked for.
    pub fn no_criteria(&self) -> bool {
        self.mode().is_none()
            && self.types.is_empty()
            && self.entity_types.is_empty()
            && self.after_date.is_none()
    }

    /// Resolve the lookup mode: permalink glob, then exact permalink, then
    /// title, then free text. `None` when the query has none of those, or when
    /// the text is only `*`.
    pub fn resolved_mode(&self) -> Option<SearchMode> {
        if self.no_criteria() {
            return None;
        }
        Some(self.mode().unwrap_or(SearchMode::FilterOnly))
    }

    fn mode(&self) -> Option<SearchMode> {
        let present = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(pattern) = present(&self.permalink_match) {
            if pattern.contains('*') {
                return Some(SearchMode::PermalinkGlob(pattern));
            }
            // without a wildcard a pattern is an exact permalink
            if present(&self.permalink).is_none() {
                return Some(SearchMode::Permalink(pattern));
            }
        }
        if let Some(permalink) = present(&self.permalink) {
            return Some(SearchMode::Permalink(permalink));
        }
        if let Some(title) = present(&self.title) {
            return Some(SearchMode::Title(title));
        }
        match present(&self.text) {
            Some(text) if text != "*" => Some(SearchMode::Text(text)),
            _ => None,
        }
    }
}

const BOOLEAN_OPERATORS: [&str; 3] = [" AND ", " OR ", " NOT "];

/// FTS5 barewords are ASCII alphanumerics, `_` and anything outside ASCII.
fn is_bareword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Turn user text into an FTS5 MATCH expression.
///
/// Boolean expressions and explicit wildcards pass through verbatim, so their
/// grammar errors reach the caller. Anything that is not a single bareword
/// becomes a quoted phrase; a bareword becomes a prefix query.
pub fn prepare_match_term(text: &str) -> String {
    let term = text.trim();
    let padded = format!(" {term} ");
    if term.contains('*') || BOOLEAN_OPERATORS.iter().any(|op| padded.contains(op)) {
        return term.to_string();
    }
    if !term.chars().all(is_bareword_char) {
        return format!("\"{}\"", term.replace('"', "\"\""));
    }
    format!("{term}*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_has_no_criteria() {
        let q = SearchQuery::default();
        assert!(q.no_criteria());
        assert_eq!(q.resolved_mode(), None);

        let blank = SearchQuery::text("   ");
        assert!(blank.no_criteria());
    }

    #[test]
    fn wildcard_pattern_wins_over_everything() {
        let q = SearchQuery {
            text: Some("ignored".into()),
            title: Some("Ignored".into()),
            permalink: Some("specs/exact".into()),
            permalink_match: Some("Specs/*".into()),
            ..Default::default()
        };
        assert_eq!(q.resolved_mode(), Some(SearchMode::PermalinkGlob("Specs/*".into())));
    }

    #[test]
    fn permalink_beats_title_and_text() {
        let q = SearchQuery {
            text: Some("ignored".into()),
            title: Some("Ignored".into()),
            permalink: Some("specs/exact".into()),
            ..Default::default()
        };
        assert_eq!(q.resolved_mode(), Some(SearchMode::Permalink("specs/exact".into())));
    }

    #[test]
    fn pattern_without_wildcard_is_exact() {
        let q = SearchQuery::permalink_match("specs/exact");
        assert_eq!(q.resolved_mode(), Some(SearchMode::Permalink("specs/exact".into())));
    }

    #[test]
    fn title_beats_text() {
        let q = SearchQuery {
            text: Some("ignored".into()),
            title: Some("Search Design".into()),
            ..Default::default()
        };
        assert_eq!(q.resolved_mode(), Some(SearchMode::Title("Search Design".into())));
    }

    #[test]
    fn filters_alone_are_criteria() {
        let q = SearchQuery::default().with_types(&[SearchItemType::Entity]);
        assert_eq!(q.resolved_mode(), Some(SearchMode::FilterOnly));

        let q = SearchQuery::text("*").after("2026-01-01T00:00:00Z");
        assert_eq!(q.resolved_mode(), Some(SearchMode::FilterOnly));

        assert_eq!(SearchQuery::text("*").resolved_mode(), None);
    }

    #[test]
    fn punctuation_in_a_single_word_is_quoted() {
        assert_eq!(prepare_match_term("c++"), "\"c++\"");
        assert_eq!(prepare_match_term("C#"), "\"C#\"");
        assert_eq!(prepare_match_term("hello,"), "\"hello,\"");
        assert_eq!(prepare_match_term("user@host"), "\"user@host\"");
        assert_eq!(prepare_match_term("50%"), "\"50%\"");
        assert_eq!(prepare_match_term("a=b;c<d"), "\"a=b;c<d\"");
    }

    #[test]
    fn prepare_match_term_cases() {
        assert_eq!(prepare_match_term("rust"), "rust*");
        assert_eq!(prepare_match_term(" rust "), "rust*");
        assert_eq!(prepare_match_term("graph traversal"), "\"graph traversal\"");
        assert_eq!(prepare_match_term("specs/search"), "\"specs/search\"");
        assert_eq!(prepare_match_term("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(prepare_match_term("rust AND sqlite"), "rust AND sqlite");
        assert_eq!(prepare_match_term("snake_case"), "snake_case*");
        assert_eq!(prepare_match_term("café"), "café*");
        assert_eq!(prepare_match_term("sea*"), "sea*");
    }

    #[test]
    fn item_type_round_trips_through_str() {
        for t in [SearchItemType::Entity, SearchItemType::Observation, SearchItemType::Relation] {
            assert_eq!(t.as_str().parse::<SearchItemType>().unwrap(), t);
        }
        assert!("note".parse::<SearchItemType>().is_err());
    }
}
