//! Content-stem generation.
//!
//! Expands a title, permalink, path, tag or observation into extra strings that
//! give the FTS tokenizer more to match against: the lowercase form, path
//! segments, individual words, and 3-character fragments. The stems are stored
//! in the index only and never shown to users.

use std::collections::{BTreeSet, HashSet};

/// Knobs for the trigram step, the only part of stem generation whose output
/// grows with input length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StemOptions {
    pub trigrams: bool,
    /// Inputs longer than this many characters get no trigrams. `None` = no cap.
    pub trigram_max_chars: Option<usize>,
}

impl Default for StemOptions {
    fn default() -> Self {
        Self {
            trigrams: true,
            trigram_max_chars: None,
        }
    }
}

/// All variants of `text`. Pure and deterministic; empty input yields an empty set.
pub fn generate_variants(text: &str, options: &StemOptions) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    if text.trim().is_empty() {
        return variants;
    }

    let lower = text.to_lowercase();
    variants.insert(text.to_string());
    variants.insert(lower.clone());

    if text.contains('/') {
        variants.extend(
            text.split('/')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        );
    }

    variants.extend(lower.split_whitespace().map(str::to_string));

    if options.trigrams {
        let chars: Vec<char> = lower.chars().collect();
        let within_cap = options
            .trigram_max_chars
            .map_or(true, |max| chars.len() <= max);
        if within_cap {
            variants.extend(chars.windows(3).map(|w| w.iter().collect::<String>()));
        }
    }

    variants
}

/// Accumulates stems from several fields into the newline-joined string stored
/// in the `content_stems` column. Lines keep first-seen order and repeat only once.
#[derive(Debug, Default)]
pub struct StemBuilder {
    options: StemOptions,
    seen: HashSet<String>,
    lines: Vec<String>,
}

impl StemBuilder {
    pub fn new(options: StemOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Add every variant of `text`.
    pub fn variants(&mut self, text: &str) -> &mut Self {
        for variant in generate_variants(text, &self.options) {
            self.push(variant);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn build(&self) -> String {
        self.lines.join("\n")
    }

    fn push(&mut self, line: String) {
        if line.trim().is_empty() || self.seen.contains(&line) {
            return;
        }
        self.seen.insert(line.clone());
        self.lines.push(line);
    }
}
