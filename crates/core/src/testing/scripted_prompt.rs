//! Operator prompt with pre-set answers.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::naming::NumberContext;
use crate::orchestrator::OperatorPrompt;

/// Answers every question from configuration and records what was asked.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    allow_overwrite: bool,
    episode_index: Option<usize>,
    adjustment: i64,
    overwrite_requests: Arc<RwLock<Vec<Vec<PathBuf>>>>,
    index_requests: Arc<RwLock<Vec<(String, Vec<NumberContext>)>>>,
    adjustment_requests: Arc<RwLock<Vec<(String, u32)>>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn with_episode_index(mut self, index: usize) -> Self {
        self.episode_index = Some(index);
        self
    }

    pub fn with_adjustment(mut self, adjustment: i64) -> Self {
        self.adjustment = adjustment;
        self
    }

    /// Target lists passed to `confirm_overwrite`, one per call.
    pub async fn overwrite_requests(&self) -> Vec<Vec<PathBuf>> {
        self.overwrite_requests.read().await.clone()
    }

    pub async fn index_requests(&self) -> Vec<(String, Vec<NumberContext>)> {
        self.index_requests.read().await.clone()
    }

    pub async fn adjustment_requests(&self) -> Vec<(String, u32)> {
        self.adjustment_requests.read().await.clone()
    }
}

#[async_trait]
impl OperatorPrompt for ScriptedPrompt {
    async fn confirm_overwrite(&self, _codename: &str, targets: &[PathBuf]) -> bool {
        self.overwrite_requests
            .write()
            .await
            .push(targets.to_vec());
        self.allow_overwrite
    }

    async fn choose_episode_index(
        &self,
        file_name: &str,
        numbers: &[NumberContext],
    ) -> Option<usize> {
        self.index_requests
            .write()
            .await
            .push((file_name.to_string(), numbers.to_vec()));
        self.episode_index
    }

    async fn choose_adjustment(&self, file_name: &str, raw_episode: u32) -> i64 {
        self.adjustment_requests
            .write()
            .await
            .push((file_name.to_string(), raw_episode));
        self.adjustment
    }
}
