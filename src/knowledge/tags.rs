//! Boundary where entity tags are read out of metadata.
//!
//! Tags arrive as a JSON list, as a legacy list-literal string such as
//! `"['rust', 'sqlite']"`, or not at all. [`RawTags`] captures which one was
//! found and [`RawTags::normalize`] turns every shape into `Vec<String>`.
//! Nothing past this module sees the raw forms.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTags {
    List(Vec<String>),
    Legacy(String),
    Absent,
}

impl RawTags {
    /// Read `metadata.tags`.
    pub fn from_metadata(metadata: Option<&Value>) -> Self {
        match metadata.and_then(|m| m.get("tags")) {
            Some(Value::Array(items)) => RawTags::List(
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Some(Value::String(s)) => RawTags::Legacy(s.clone()),
            _ => RawTags::Absent,
        }
    }

    /// Canonical list form. Never fails: a string that does not parse as a
    /// list literal becomes a single tag.
    pub fn normalize(self) -> Vec<String> {
        match self {
            RawTags::List(tags) => tags.into_iter().filter(|t| !t.trim().is_empty()).collect(),
            RawTags::Legacy(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Vec::new();
                }
                match parse_list_literal(trimmed) {
                    Some(tags) => tags,
                    None => {
                        tracing::warn!(tags = %trimmed, "unparsable tag string, using it as one tag");
                        vec![trimmed.to_string()]
                    }
                }
            }
            RawTags::Absent => Vec::new(),
        }
    }
}

/// Parse `['a', "b"]` into its items. Returns `None` unless every item is a
/// quoted string.
fn parse_list_literal(s: &str) -> Option<Vec<String>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = chars.next().filter(|c| *c == '\'' || *c == '"')?;

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => {
                // trailing comma: `['a',]`
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                if chars.peek().is_none() {
                    break;
                }
            }
            Some(_) => return None,
        }
    }
    Some(items)
}
