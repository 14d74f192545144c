//! Change detection between a tracked title and the tracker's current release.

use serde::Serialize;

use crate::registry::TitleEntry;
use crate::tracker::TorrentObservation;

/// Why a release counts as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// A different torrent was published.
    HashChanged,
    /// Same torrent, new publication date.
    Republished,
    /// Operator asked for reprocessing.
    Forced,
}

/// Outcome of comparing an entry with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum UpdateVerdict {
    /// Nothing tracked yet; handle as a new add.
    NoPriorEntry,
    Unchanged,
    ChangedRelease { reason: ChangeReason },
}

impl UpdateVerdict {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::ChangedRelease { .. })
    }
}

/// Classifies an observation against the stored entry.
///
/// Hash and publication date are the only change signal. `force` routes
/// every existing entry to [`UpdateVerdict::ChangedRelease`].
pub fn classify(
    entry: Option<&TitleEntry>,
    observation: &TorrentObservation,
    force: bool,
) -> UpdateVerdict {
    let Some(entry) = entry else {
        return UpdateVerdict::NoPriorEntry;
    };

    let same_hash = entry.has_hash(&observation.hash);
    let same_date = entry.publish_date == Some(observation.publish_date);

    let reason = if !same_hash {
        ChangeReason::HashChanged
    } else if !same_date {
        ChangeReason::Republished
    } else if force {
        ChangeReason::Forced
    } else {
        return UpdateVerdict::Unchanged;
    };

    UpdateVerdict::ChangedRelease { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use chrono::Duration;

    #[test]
    fn test_no_entry() {
        let obs = fixtures::observation("t1", "abc", &["a 01.mkv"]);
        assert_eq!(classify(None, &obs, false), UpdateVerdict::NoPriorEntry);
        assert_eq!(classify(None, &obs, true), UpdateVerdict::NoPriorEntry);
    }

    #[test]
    fn test_unchanged_when_hash_and_date_match() {
        let (entry, obs) = fixtures::tracked_pair();
        assert_eq!(classify(Some(&entry), &obs, false), UpdateVerdict::Unchanged);
        assert!(!classify(Some(&entry), &obs, false).is_changed());
    }

    #[test]
    fn test_hash_comparison_ignores_case() {
        let (entry, mut obs) = fixtures::tracked_pair();
        obs.hash = obs.hash.to_uppercase();
        assert_eq!(classify(Some(&entry), &obs, false), UpdateVerdict::Unchanged);
    }

    #[test]
    fn test_hash_change() {
        let (entry, mut obs) = fixtures::tracked_pair();
        obs.hash = "ffffffffffffffffffffffffffffffffffffffff".to_string();
        assert_eq!(
            classify(Some(&entry), &obs, false),
            UpdateVerdict::ChangedRelease {
                reason: ChangeReason::HashChanged
            }
        );
    }

    #[test]
    fn test_republished_with_same_hash() {
        let (entry, mut obs) = fixtures::tracked_pair();
        obs.publish_date += Duration::hours(1);
        assert_eq!(
            classify(Some(&entry), &obs, false),
            UpdateVerdict::ChangedRelease {
                reason: ChangeReason::Republished
            }
        );
    }

    #[test]
    fn test_missing_stored_date_counts_as_republished() {
        let (mut entry, obs) = fixtures::tracked_pair();
        entry.publish_date = None;
        assert!(classify(Some(&entry), &obs, false).is_changed());
    }

    #[test]
    fn test_force_overrides_unchanged() {
        let (entry, obs) = fixtures::tracked_pair();
        assert_eq!(
            classify(Some(&entry), &obs, true),
            UpdateVerdict::ChangedRelease {
                reason: ChangeReason::Forced
            }
        );
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_string(&UpdateVerdict::ChangedRelease {
            reason: ChangeReason::HashChanged,
        })
        .unwrap();
        assert_eq!(json, r#"{"verdict":"changed_release","reason":"hash_changed"}"#);
    }
}
