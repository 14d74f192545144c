//! Tracked title model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked release, keyed by codename in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleEntry {
    /// 1-based position of the episode among the numeric tokens of a file name.
    pub episode_index: usize,
    pub season_number: u32,
    /// Base series name all derived names start with.
    pub torrent_name: String,
    pub download_dir: String,
    /// Publication timestamp of the last processed version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub release_group: String,
    #[serde(default)]
    pub meta: String,
    /// Info hash of the last processed version (lowercase hex).
    #[serde(default)]
    pub hash: String,
    /// Signed offset added to the raw episode number.
    #[serde(default)]
    pub adjusted_episode_number: i64,
    /// Tracker identifier of the release thread.
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub is_partial_season: bool,
}

impl TitleEntry {
    /// Checks the fields every naming and rename step relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.episode_index == 0 {
            return Err("episode_index must be at least 1".to_string());
        }
        let name = self.torrent_name.trim();
        if name.is_empty() {
            return Err("torrent_name is empty".to_string());
        }
        if name.contains(['/', '\\']) {
            return Err(format!("torrent_name '{}' contains a path separator", name));
        }
        if self.release_group.contains(['/', '\\']) || self.meta.contains(['/', '\\']) {
            return Err("release_group and meta must not contain path separators".to_string());
        }
        if self.download_dir.trim().is_empty() {
            return Err("download_dir is empty".to_string());
        }
        Ok(())
    }

    /// Whether `hash` refers to the stored version.
    pub fn has_hash(&self, hash: &str) -> bool {
        !self.hash.is_empty() && self.hash.eq_ignore_ascii_case(hash)
    }
}

/// Default series name for a tracker title: its last `/` segment, trimmed.
///
/// Tracker titles are usually `Native name / English name (year)`.
pub fn default_title(tracker_title: &str) -> String {
    tracker_title
        .rsplit('/')
        .next()
        .unwrap_or(tracker_title)
        .trim()
        .to_string()
}

/// Codename derived from a tracker title, without the season suffix.
///
/// `"foo/Bar Baz (2024)"` becomes `"BarBaz"`.
pub fn codename_base(tracker_title: &str) -> String {
    let title = default_title(tracker_title);
    let cut = title.find(['(', '[']).unwrap_or(title.len());
    title[..cut].chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Codename suggested for a new title: base plus `S{season:02}`.
pub fn suggest_codename(tracker_title: &str, season_number: u32) -> String {
    format!("{}S{:02}", codename_base(tracker_title), season_number)
}
