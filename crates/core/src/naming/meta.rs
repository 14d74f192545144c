//! Bracketed meta tag parsing (`[WEBRip-1080p][UK][Ukr Sub]`).

use once_cell::sync::Lazy;
use regex_lite::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]*)\]").unwrap());

/// Ordered sequence of meta tags inserted into composed names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTags {
    tags: Vec<String>,
}

impl MetaTags {
    /// Parses a meta string.
    ///
    /// Bracketed groups become tags; text without any brackets becomes a
    /// single tag. Empty input yields no tags.
    pub fn parse(meta: &str) -> Self {
        let trimmed = meta.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        let tags: Vec<String> = TAG_RE
            .captures_iter(trimmed)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if tags.is_empty() && !trimmed.contains('[') {
            return Self {
                tags: vec![trimmed.to_string()],
            };
        }

        Self { tags }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// First tag, by convention the source/quality descriptor.
    pub fn quality(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// Second tag, by convention the audio language.
    pub fn language(&self) -> Option<&str> {
        self.tags.get(1).map(String::as_str)
    }

    /// Third tag, by convention the subtitle descriptor.
    pub fn subs(&self) -> Option<&str> {
        self.tags.get(2).map(String::as_str)
    }

    /// Renders the tags back-to-back, e.g. `[WEBRip-1080p][UK]`.
    pub fn render(&self) -> String {
        self.tags.iter().map(|t| format!("[{}]", t)).collect()
    }
}
