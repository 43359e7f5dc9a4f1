use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([^\s#]+)").expect("tag pattern is a valid regex")
});

/// Extract `#tag` tokens from free text.
///
/// Tokens keep their order of appearance, duplicates included. The leading
/// `#` is stripped.
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// True when `text` carries every tag in `selected`
pub fn has_all_tags(text: &str, selected: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    let tags = extract_tags(text);
    selected.iter().all(|tag| tags.contains(tag))
}

/// Select `tag` if it isn't selected, deselect it otherwise
pub fn toggle_tag_filter(selected: &[String], tag: &str) -> Vec<String> {
    if selected.iter().any(|t| t == tag) {
        selected.iter().filter(|t| *t != tag).cloned().collect()
    } else {
        let mut next = selected.to_vec();
        next.push(tag.to_string());
        next
    }
}

/// Every tag ever used in a session title, deduplicated, in first-use order.
///
/// Memo tags never land here; they are derived from memo content on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagRegistry {
    tags: Vec<String>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a stored list, dropping duplicates
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for tag in tags {
            registry.add(tag);
        }
        registry
    }

    /// Add a tag; returns false if it was already registered
    pub fn add(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if tag.is_empty() || self.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Register every tag found in `text`; returns how many were new
    pub fn register_from(&mut self, text: &str) -> usize {
        extract_tags(text)
            .into_iter()
            .filter(|tag| self.add(tag.clone()))
            .count()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.tags
    }
}
