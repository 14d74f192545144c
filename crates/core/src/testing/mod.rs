//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam of the orchestrator, so whole add/update
//! runs can be exercised against a temporary directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use toloka2media_core::testing::{fixtures, MockTorrentClient, MockTracker, ScriptedPrompt};
//!
//! let client = MockTorrentClient::new();
//! let tracker = MockTracker::new();
//! let prompt = ScriptedPrompt::new().allow_overwrite(true);
//!
//! tracker.set_observation(fixtures::observation("t1", "abc", &["Show - 01.mkv"])).await;
//! client.register_files("abc", "Show", &["Show - 01.mkv"]).await;
//! ```

mod mock_torrent_client;
mod mock_tracker;
mod scripted_prompt;

pub use mock_torrent_client::{MockOp, MockTorrentClient};
pub use mock_tracker::MockTracker;
pub use scripted_prompt::ScriptedPrompt;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::registry::TitleEntry;
    use crate::tracker::TorrentObservation;

    /// Fixed publication date used by fixtures.
    pub fn published_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 8, 18, 30, 0)
            .single()
            .unwrap_or_default()
    }

    /// A valid, never-synced entry: index 1, meta `WEB`, group `RG`.
    pub fn title_entry(name: &str, season: u32) -> TitleEntry {
        TitleEntry {
            episode_index: 1,
            season_number: season,
            torrent_name: name.to_string(),
            download_dir: "/media/anime".to_string(),
            publish_date: None,
            release_group: "RG".to_string(),
            meta: "WEB".to_string(),
            hash: String::new(),
            adjusted_episode_number: 0,
            guid: String::new(),
            is_partial_season: false,
        }
    }

    /// The season-two Tsukimichi release used in the naming examples.
    pub fn tsukimichi_entry() -> TitleEntry {
        TitleEntry {
            episode_index: 1,
            season_number: 2,
            torrent_name: "Tsukimichi -Moonlit Fantasy-".to_string(),
            download_dir: "/media/anime".to_string(),
            publish_date: Some(published_at()),
            release_group: "FanVoxUA".to_string(),
            meta: "[WEBRip-1080p][UK][Ukr Sub]".to_string(),
            hash: "c6d4e5f0a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6".to_string(),
            adjusted_episode_number: 0,
            guid: "t675888".to_string(),
            is_partial_season: false,
        }
    }

    /// Tracker observation with the given listing, published at [`published_at`].
    pub fn observation(guid: &str, hash: &str, files: &[&str]) -> TorrentObservation {
        TorrentObservation {
            guid: guid.to_string(),
            hash: hash.to_string(),
            publish_date: published_at(),
            name: "Шоу / Show (2024)".to_string(),
            author: "RG".to_string(),
            torrent_url: format!("https://toloka.example/download.php?id={}", guid),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// An entry and the unchanged observation of its release.
    pub fn tracked_pair() -> (TitleEntry, TorrentObservation) {
        let mut entry = title_entry("Show", 1);
        entry.hash = "0123456789abcdef0123456789abcdef01234567".to_string();
        entry.guid = "t1".to_string();
        entry.publish_date = Some(published_at());

        let obs = observation(&entry.guid, &entry.hash, &["Show - 01.mkv"]);
        (entry, obs)
    }
}
