//! Mock torrent client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    AddTorrentRequest, AddTorrentResult, TorrentClient, TorrentClientError, TorrentInfo,
    TorrentSource, TorrentState,
};

/// A mutating call made against the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Add { hash: String, paused: bool },
    RenameFile { hash: String, from: String, to: String },
    RenameTorrent { hash: String, name: String },
    Remove { hash: String, delete_files: bool },
    Resume { hash: String },
    Recheck { hash: String },
}

/// Internal state for a mock torrent.
#[derive(Debug, Clone)]
struct MockTorrentState {
    info: TorrentInfo,
    files: Vec<String>,
    /// `list_files` calls left that still report no metadata.
    metadata_polls: u32,
}

/// Mock implementation of the TorrentClient trait.
///
/// Torrents only ever exist as metadata; the mock never touches the
/// filesystem, so callers do the on-disk moves themselves.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.register_files("abc123", "Show [WEB]", &["Show [WEB]/Show - 01.mkv"]).await;
///
/// client.add_torrent(AddTorrentRequest::url("https://t/1").with_info_hash("abc123")).await?;
/// assert_eq!(client.list_files("abc123").await?.len(), 1);
/// assert_eq!(client.mutation_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    /// Current torrents by hash.
    torrents: Arc<RwLock<HashMap<String, MockTorrentState>>>,
    /// Name and files a torrent gets once added, by hash.
    catalog: Arc<RwLock<HashMap<String, (String, Vec<String>)>>>,
    /// Recorded mutating calls.
    ops: Arc<RwLock<Vec<MockOp>>>,
    /// Renames of these source paths always fail.
    rename_failures: Arc<RwLock<HashMap<String, TorrentClientError>>>,
    /// Empty listings served after each add before the files appear.
    metadata_polls: Arc<RwLock<u32>>,
    /// Counter for generating unique hashes.
    hash_counter: Arc<RwLock<u32>>,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self {
            torrents: Arc::new(RwLock::new(HashMap::new())),
            catalog: Arc::new(RwLock::new(HashMap::new())),
            ops: Arc::new(RwLock::new(Vec::new())),
            rename_failures: Arc::new(RwLock::new(HashMap::new())),
            metadata_polls: Arc::new(RwLock::new(0)),
            hash_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Declare the name and file listing a torrent will have once added.
    pub async fn register_files(&self, hash: &str, name: &str, files: &[&str]) {
        self.catalog.write().await.insert(
            hash.to_lowercase(),
            (
                name.to_string(),
                files.iter().map(|f| f.to_string()).collect(),
            ),
        );
    }

    /// Pre-populate a torrent that is already in the client.
    pub async fn add_existing(&self, hash: &str, name: &str, save_path: &Path, files: &[&str]) {
        let hash = hash.to_lowercase();
        let info = Self::info(
            &hash,
            name,
            TorrentState::Seeding,
            Some(save_path.to_string_lossy().into_owned()),
            None,
        );
        self.torrents.write().await.insert(
            hash,
            MockTorrentState {
                info,
                files: files.iter().map(|f| f.to_string()).collect(),
                metadata_polls: 0,
            },
        );
    }

    /// Newly added torrents report an empty listing this many times.
    pub async fn set_metadata_polls(&self, polls: u32) {
        *self.metadata_polls.write().await = polls;
    }

    /// Every rename of `path` fails with `error`, including rollback renames.
    pub async fn fail_rename_of(&self, path: &str, error: TorrentClientError) {
        self.rename_failures
            .write()
            .await
            .insert(path.to_string(), error);
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(hash)
    }

    /// All recorded mutating calls.
    pub async fn operations(&self) -> Vec<MockOp> {
        self.ops.read().await.clone()
    }

    /// Number of mutating calls made so far.
    pub async fn mutation_count(&self) -> usize {
        self.ops.read().await.len()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.ops.write().await.clear();
    }

    fn info(
        hash: &str,
        name: &str,
        state: TorrentState,
        save_path: Option<String>,
        category: Option<String>,
    ) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: name.to_string(),
            state,
            progress: if state == TorrentState::Seeding { 1.0 } else { 0.0 },
            size_bytes: 100 * 1024 * 1024,
            save_path,
            category,
            added_at: Some(Utc::now()),
        }
    }

    async fn record(&self, op: MockOp) {
        self.ops.write().await.push(op);
    }

    /// Generate a unique mock hash.
    async fn generate_hash(&self) -> String {
        let mut counter = self.hash_counter.write().await;
        *counter += 1;
        format!("mockhash{:08x}", *counter)
    }

    /// Extract info hash from magnet URI if present.
    fn extract_hash_from_magnet(uri: &str) -> Option<String> {
        uri.split(['?', '&'])
            .find_map(|part| part.strip_prefix("xt=urn:btih:"))
            .map(|h| h.to_lowercase())
    }

    async fn with_torrent<T>(
        &self,
        hash: &str,
        f: impl FnOnce(&mut MockTorrentState) -> Result<T, TorrentClientError>,
    ) -> Result<T, TorrentClientError> {
        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        f(torrent)
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let hash = match (&request.info_hash, &request.source) {
            (Some(hash), _) => hash.to_lowercase(),
            (None, TorrentSource::Magnet(uri)) => match Self::extract_hash_from_magnet(uri) {
                Some(hash) => hash,
                None => self.generate_hash().await,
            },
            (None, _) => self.generate_hash().await,
        };

        if self.has_torrent(&hash).await {
            return Err(TorrentClientError::AlreadyExists(hash));
        }

        let (name, files) = self
            .catalog
            .read()
            .await
            .get(&hash)
            .cloned()
            .unwrap_or_else(|| (format!("Mock Torrent {}", hash), Vec::new()));
        let state = if request.paused {
            TorrentState::Paused
        } else {
            TorrentState::Downloading
        };

        let metadata_polls = *self.metadata_polls.read().await;
        self.torrents.write().await.insert(
            hash.clone(),
            MockTorrentState {
                info: Self::info(
                    &hash,
                    &name,
                    state,
                    request.download_path.clone(),
                    request.category.clone(),
                ),
                files,
                metadata_polls,
            },
        );
        self.record(MockOp::Add {
            hash: hash.clone(),
            paused: request.paused,
        })
        .await;

        Ok(AddTorrentResult {
            hash,
            name: Some(name),
        })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        self.torrents
            .read()
            .await
            .get(hash)
            .map(|t| t.info.clone())
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<String>, TorrentClientError> {
        self.with_torrent(hash, |torrent| {
            if torrent.metadata_polls > 0 {
                torrent.metadata_polls -= 1;
                return Ok(Vec::new());
            }
            Ok(torrent.files.clone())
        })
        .await
    }

    async fn rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.rename_failures.read().await.get(old_path) {
            return Err(err.clone());
        }

        self.with_torrent(hash, |torrent| {
            if torrent.files.iter().any(|f| f == new_path) {
                return Err(TorrentClientError::Conflict(format!(
                    "'{}' is already in the torrent",
                    new_path
                )));
            }
            let file = torrent
                .files
                .iter_mut()
                .find(|f| f.as_str() == old_path)
                .ok_or_else(|| {
                    TorrentClientError::Conflict(format!("no file '{}' in torrent", old_path))
                })?;
            *file = new_path.to_string();
            Ok(())
        })
        .await?;

        self.record(MockOp::RenameFile {
            hash: hash.to_string(),
            from: old_path.to_string(),
            to: new_path.to_string(),
        })
        .await;
        Ok(())
    }

    async fn rename_torrent(&self, hash: &str, name: &str) -> Result<(), TorrentClientError> {
        self.with_torrent(hash, |torrent| {
            torrent.info.name = name.to_string();
            Ok(())
        })
        .await?;
        self.record(MockOp::RenameTorrent {
            hash: hash.to_string(),
            name: name.to_string(),
        })
        .await;
        Ok(())
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        if self.torrents.write().await.remove(hash).is_none() {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }
        self.record(MockOp::Remove {
            hash: hash.to_string(),
            delete_files,
        })
        .await;
        Ok(())
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.with_torrent(hash, |torrent| {
            if torrent.info.state == TorrentState::Paused {
                torrent.info.state = TorrentState::Downloading;
            }
            Ok(())
        })
        .await?;
        self.record(MockOp::Resume {
            hash: hash.to_string(),
        })
        .await;
        Ok(())
    }

    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.with_torrent(hash, |_| Ok(())).await?;
        self.record(MockOp::Recheck {
            hash: hash.to_string(),
        })
        .await;
        Ok(())
    }
}
