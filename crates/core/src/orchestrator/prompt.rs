//! Operator decisions the orchestrator cannot make alone.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

use crate::naming::NumberContext;

/// Questions put to the operator during a run.
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    /// Asked once per batch when files outside the batch would be replaced.
    async fn confirm_overwrite(&self, codename: &str, targets: &[PathBuf]) -> bool;

    /// Picks the 1-based position of the episode number in `file_name`.
    /// `None` aborts the add.
    async fn choose_episode_index(
        &self,
        file_name: &str,
        numbers: &[NumberContext],
    ) -> Option<usize>;

    /// Offset added to `raw_episode`, e.g. `-12` for a second cour numbered 13+.
    async fn choose_adjustment(&self, file_name: &str, raw_episode: u32) -> i64;
}

/// Non-interactive answers for unattended runs.
///
/// Never overwrites, never guesses an episode index and applies no offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoPrompt;

#[async_trait]
impl OperatorPrompt for AutoPrompt {
    async fn confirm_overwrite(&self, codename: &str, targets: &[PathBuf]) -> bool {
        warn!(
            codename,
            files = targets.len(),
            "Declining overwrite in non-interactive mode"
        );
        false
    }

    async fn choose_episode_index(
        &self,
        _file_name: &str,
        _numbers: &[NumberContext],
    ) -> Option<usize> {
        None
    }

    async fn choose_adjustment(&self, _file_name: &str, _raw_episode: u32) -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_prompt_is_conservative() {
        let prompt = AutoPrompt;
        assert!(!prompt.confirm_overwrite("Show", &[PathBuf::from("/x")]).await);
        assert_eq!(prompt.choose_episode_index("Show - 01.mkv", &[]).await, None);
        assert_eq!(prompt.choose_adjustment("Show - 01.mkv", 1).await, 0);
    }
}
