//! qBittorrent Web API backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    transport_error, AddTorrentRequest, AddTorrentResult, TorrentClient, TorrentClientError,
    TorrentInfo, TorrentSource, TorrentState,
};

/// qBittorrent client using cookie sessions.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set after a successful login; cleared when the session expires.
    authenticated: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            authenticated: Arc::new(RwLock::new(false)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url(), path)
    }

    async fn login(&self) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint("auth/login"))
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.authenticated.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Sends a request, logging in again once if the session expired.
    ///
    /// `build` is called per attempt since request builders are single-use.
    async fn send<F>(&self, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn() -> Result<RequestBuilder, TorrentClientError>,
    {
        self.ensure_authenticated().await?;

        let mut response = build()?.send().await.map_err(transport_error)?;
        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            *self.authenticated.write().await = false;
            self.login().await?;
            response = build()?.send().await.map_err(transport_error)?;
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))?;

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::NOT_FOUND => Err(TorrentClientError::TorrentNotFound(body)),
            StatusCode::CONFLICT => Err(TorrentClientError::Conflict(body)),
            StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                Err(TorrentClientError::InvalidTorrent(body))
            }
            s => Err(TorrentClientError::ApiError(format!("HTTP {}", s))),
        }
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        let url = self.endpoint(path);
        self.send(|| Ok(self.client.post(&url).form(params))).await
    }

    fn add_form(&self, request: &AddTorrentRequest) -> Result<multipart::Form, TorrentClientError> {
        let mut form = match &request.source {
            TorrentSource::Url(link) | TorrentSource::Magnet(link) => {
                multipart::Form::new().text("urls", link.clone())
            }
            TorrentSource::File { data, filename } => {
                let part = multipart::Part::bytes(data.clone())
                    .file_name(filename.clone().unwrap_or_else(|| "release.torrent".to_string()))
                    .mime_str("application/x-bittorrent")
                    .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
                multipart::Form::new().part("torrents", part)
            }
        };

        if let Some(path) = request
            .download_path
            .as_ref()
            .or(self.config.download_path.as_ref())
        {
            form = form.text("savepath", path.clone());
        }
        if let Some(category) = &request.category {
            form = form.text("category", category.clone());
        }
        if !request.tags.is_empty() {
            form = form.text("tags", request.tags.join(","));
        }
        if request.paused {
            // `stopped` is the qBittorrent 5 name of the flag.
            form = form.text("paused", "true").text("stopped", "true");
        }

        Ok(form)
    }
}

#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            save_path: (!self.save_path.is_empty()).then_some(self.save_path),
            category: (!self.category.is_empty()).then_some(self.category),
            added_at: timestamp_to_datetime(self.added_on),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QBFile {
    name: String,
}

fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "metaDL" | "forcedMetaDL" => TorrentState::Metadata,
        "downloading" | "forcedDL" | "allocating" => TorrentState::Downloading,
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let hash = request
            .info_hash
            .clone()
            .or_else(|| match &request.source {
                TorrentSource::Magnet(uri) => extract_hash_from_magnet(uri),
                _ => None,
            })
            .ok_or_else(|| {
                TorrentClientError::InvalidTorrent(
                    "info hash unknown; qBittorrent does not report it on add".to_string(),
                )
            })?;

        let url = self.endpoint("torrents/add");
        let body = self
            .send(|| Ok(self.client.post(&url).multipart(self.add_form(&request)?)))
            .await?;

        if body.trim() == "Fails." {
            return Err(TorrentClientError::AlreadyExists(hash));
        }

        debug!(hash = %hash, "Torrent added to qBittorrent");
        Ok(AddTorrentResult { hash, name: None })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        let url = format!(
            "{}?hashes={}",
            self.endpoint("torrents/info"),
            hash.to_lowercase()
        );
        let response = self.send(|| Ok(self.client.get(&url))).await?;

        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        torrents
            .into_iter()
            .next()
            .map(QBTorrentInfo::into_torrent_info)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<String>, TorrentClientError> {
        let url = format!(
            "{}?hash={}",
            self.endpoint("torrents/files"),
            hash.to_lowercase()
        );
        let response = self.send(|| Ok(self.client.get(&url))).await?;

        let files: Vec<QBFile> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        Ok(files.into_iter().map(|f| f.name).collect())
    }

    async fn rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form(
            "torrents/renameFile",
            &[("hash", &hash), ("oldPath", old_path), ("newPath", new_path)],
        )
        .await?;
        Ok(())
    }

    async fn rename_torrent(&self, hash: &str, name: &str) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form("torrents/rename", &[("hash", &hash), ("name", name)])
            .await?;
        Ok(())
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let delete = if delete_files { "true" } else { "false" };
        self.post_form(
            "torrents/delete",
            &[("hashes", &hash), ("deleteFiles", delete)],
        )
        .await?;
        Ok(())
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        match self
            .post_form("torrents/resume", &[("hashes", &hash)])
            .await
        {
            // qBittorrent 5 renamed resume to start.
            Err(TorrentClientError::TorrentNotFound(_)) => {
                self.post_form("torrents/start", &[("hashes", &hash)])
                    .await?;
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form("torrents/recheck", &[("hashes", &hash)])
            .await?;
        Ok(())
    }
}

/// Extracts the info hash from a magnet URI.
fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> QBittorrentClient {
        QBittorrentClient::new(QBittorrentConfig {
            url: "http://localhost:8080/".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            timeout_secs: 5,
            download_path: None,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_qb_state() {
        assert_eq!(parse_qb_state("metaDL"), TorrentState::Metadata);
        assert_eq!(parse_qb_state("downloading"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("forcedUP"), TorrentState::Seeding);
        assert_eq!(parse_qb_state("pausedDL"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedUP"), TorrentState::Paused);
        assert_eq!(parse_qb_state("checkingResumeData"), TorrentState::Checking);
        assert_eq!(parse_qb_state("queuedDL"), TorrentState::Queued);
        assert_eq!(parse_qb_state("stalledUP"), TorrentState::Stalled);
        assert_eq!(parse_qb_state("missingFiles"), TorrentState::Error);
        assert_eq!(parse_qb_state("something_else"), TorrentState::Unknown);
    }

    #[test]
    fn test_extract_hash_from_magnet() {
        assert_eq!(
            extract_hash_from_magnet("magnet:?xt=urn:btih:ABC123&dn=Test"),
            Some("abc123".to_string())
        );
        assert_eq!(
            extract_hash_from_magnet("magnet:?dn=Test&xt=urn:btih:abc"),
            Some("abc".to_string())
        );
        assert_eq!(extract_hash_from_magnet("not a magnet"), None);
        assert_eq!(extract_hash_from_magnet("magnet:?dn=Test"), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            client().endpoint("torrents/files"),
            "http://localhost:8080/api/v2/torrents/files"
        );
    }

    #[test]
    fn test_info_conversion() {
        let raw = r#"[{"hash":"ABC123","name":"Show S01","state":"pausedDL",
            "progress":0.25,"size":1000,"added_on":1703980800,
            "save_path":"/media","category":""}]"#;
        let parsed: Vec<QBTorrentInfo> = serde_json::from_str(raw).unwrap();
        let info = parsed.into_iter().next().unwrap().into_torrent_info();
        assert_eq!(info.hash, "abc123");
        assert_eq!(info.state, TorrentState::Paused);
        assert_eq!(info.save_path.as_deref(), Some("/media"));
        assert_eq!(info.category, None);
        assert!(info.added_at.is_some());
    }

    #[test]
    fn test_file_listing_parse() {
        let raw = r#"[{"index":0,"name":"Show/Show 01.mkv","size":10},
            {"index":1,"name":"Show/Show 02.mkv","size":10}]"#;
        let files: Vec<QBFile> = serde_json::from_str(raw).unwrap();
        let names: Vec<_> = files.into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Show/Show 01.mkv", "Show/Show 02.mkv"]);
    }

    #[tokio::test]
    async fn test_add_without_hash_is_rejected_before_network() {
        let err = client()
            .add_torrent(AddTorrentRequest::url("http://tracker/x.torrent"))
            .await
            .unwrap_err();
        assert!(matches!(err, TorrentClientError::InvalidTorrent(_)));
    }

    #[test]
    fn test_add_form_builds_for_every_source() {
        let c = client();
        let req = AddTorrentRequest::torrent_file(vec![1, 2, 3])
            .with_category("anime")
            .with_tags(["toloka"])
            .with_paused(true);
        assert!(c.add_form(&req).is_ok());
        assert!(c.add_form(&AddTorrentRequest::magnet("magnet:?xt=urn:btih:a")).is_ok());
    }
}
