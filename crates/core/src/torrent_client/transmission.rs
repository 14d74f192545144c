//! Transmission RPC backend.
//!
//! Transmission only renames one path component per call and cannot move a
//! file between folders of different depth. A file rename therefore becomes
//! a rename of the file name followed by renames of each differing folder,
//! deepest first. Once a shared folder is renamed, the remaining files of the
//! batch are found under the new folder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::TransmissionConfig;

use super::{
    transport_error, AddTorrentRequest, AddTorrentResult, TorrentClient, TorrentClientError,
    TorrentInfo, TorrentSource, TorrentState,
};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const INFO_FIELDS: &[&str] = &[
    "hashString",
    "name",
    "status",
    "error",
    "percentDone",
    "totalSize",
    "addedDate",
    "downloadDir",
    "metadataPercentComplete",
];

/// Transmission client speaking JSON-RPC with the CSRF session handshake.
pub struct TransmissionClient {
    client: Client,
    config: TransmissionConfig,
    /// Last `X-Transmission-Session-Id` handed out by the daemon.
    session_id: Arc<RwLock<Option<String>>>,
}

impl TransmissionClient {
    pub fn new(config: TransmissionConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session_id: Arc::new(RwLock::new(None)),
        })
    }

    async fn post(&self, body: &Value) -> Result<Response, TorrentClientError> {
        let mut request = self.client.post(&self.config.url).json(body);
        if let Some(id) = self.session_id.read().await.as_deref() {
            request = request.header(SESSION_HEADER, id);
        }
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }
        request.send().await.map_err(transport_error)
    }

    /// Calls `method`, fetching a fresh session id once when the daemon
    /// answers 409.
    async fn call<T>(&self, method: &str, arguments: Value) -> Result<T, TorrentClientError>
    where
        T: DeserializeOwned + Default,
    {
        let body = json!({ "method": method, "arguments": arguments });

        let mut response = self.post(&body).await?;
        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    TorrentClientError::ApiError("HTTP 409 without a session id".to_string())
                })?;
            debug!("Transmission session id refreshed");
            *self.session_id.write().await = Some(session_id);
            response = self.post(&body).await?;
        }

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(TorrentClientError::AuthenticationFailed(
                    "Invalid credentials".to_string(),
                ))
            }
            s if !s.is_success() => {
                return Err(TorrentClientError::ApiError(format!("HTTP {}", s)))
            }
            _ => {}
        }

        let text = response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))?;
        parse_reply(method, &text)
    }

    async fn torrent(&self, hash: &str, fields: &[&str]) -> Result<TrTorrent, TorrentClientError> {
        let list: TorrentList = self
            .call(
                "torrent-get",
                json!({ "ids": [hash.to_lowercase()], "fields": fields }),
            )
            .await?;
        list.torrents
            .into_iter()
            .next()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    /// Fails with [`TorrentClientError::TorrentNotFound`] for unknown hashes,
    /// which Transmission itself ignores silently.
    async fn require(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.torrent(hash, &["hashString"]).await.map(|_| ())
    }

    async fn rename_path(
        &self,
        hash: &str,
        path: &str,
        name: &str,
    ) -> Result<(), TorrentClientError> {
        let _: Value = self
            .call(
                "torrent-rename-path",
                json!({ "ids": [hash.to_lowercase()], "path": path, "name": name }),
            )
            .await?;
        Ok(())
    }

    async fn act(
        &self,
        method: &str,
        hash: &str,
        extra: Map<String, Value>,
    ) -> Result<(), TorrentClientError> {
        self.require(hash).await?;
        let mut arguments = extra;
        arguments.insert("ids".to_string(), json!([hash.to_lowercase()]));
        let _: Value = self.call(method, Value::Object(arguments)).await?;
        Ok(())
    }

    fn add_arguments(&self, request: &AddTorrentRequest) -> Value {
        let mut args = Map::new();
        match &request.source {
            TorrentSource::Url(link) | TorrentSource::Magnet(link) => {
                args.insert("filename".to_string(), json!(link));
            }
            TorrentSource::File { data, .. } => {
                args.insert(
                    "metainfo".to_string(),
                    json!(general_purpose::STANDARD.encode(data)),
                );
            }
        }

        if let Some(path) = request
            .download_path
            .as_ref()
            .or(self.config.download_path.as_ref())
        {
            args.insert("download-dir".to_string(), json!(path));
        }

        // No categories in Transmission; the category becomes the first label.
        let labels: Vec<&String> = request.category.iter().chain(&request.tags).collect();
        if !labels.is_empty() {
            args.insert("labels".to_string(), json!(labels));
        }
        args.insert("paused".to_string(), json!(request.paused));

        Value::Object(args)
    }
}

#[derive(Debug, Deserialize)]
struct RpcReply<T> {
    result: String,
    arguments: Option<T>,
}

fn parse_reply<T>(method: &str, text: &str) -> Result<T, TorrentClientError>
where
    T: DeserializeOwned + Default,
{
    let reply: RpcReply<T> = serde_json::from_str(text).map_err(|e| {
        TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
    })?;
    if reply.result != "success" {
        return Err(rpc_error(method, &reply.result));
    }
    Ok(reply.arguments.unwrap_or_default())
}

fn rpc_error(method: &str, result: &str) -> TorrentClientError {
    match method {
        "torrent-rename-path" => TorrentClientError::Conflict(result.to_string()),
        "torrent-add" if result.contains("duplicate") => {
            TorrentClientError::AlreadyExists(result.to_string())
        }
        "torrent-add" if result.contains("invalid") || result.contains("unrecognized") => {
            TorrentClientError::InvalidTorrent(result.to_string())
        }
        _ => TorrentClientError::ApiError(format!("{} failed: {}", method, result)),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<TrTorrent>,
}

#[derive(Debug, Default, Deserialize)]
struct AddedTorrent {
    #[serde(rename = "torrent-added")]
    added: Option<TrTorrent>,
    #[serde(rename = "torrent-duplicate")]
    duplicate: Option<TrTorrent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrTorrent {
    #[serde(default)]
    hash_string: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error: i64,
    #[serde(default)]
    percent_done: f64,
    #[serde(default)]
    total_size: i64,
    #[serde(default)]
    added_date: i64,
    #[serde(default)]
    download_dir: String,
    #[serde(default = "metadata_complete")]
    metadata_percent_complete: f64,
    #[serde(default)]
    files: Vec<TrFile>,
}

fn metadata_complete() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct TrFile {
    name: String,
}

impl TrTorrent {
    fn has_metadata(&self) -> bool {
        self.metadata_percent_complete >= 1.0
    }

    fn into_torrent_info(self) -> TorrentInfo {
        let state = parse_tr_status(self.status, self.error, self.has_metadata());
        TorrentInfo {
            hash: self.hash_string.to_lowercase(),
            name: self.name,
            state,
            progress: self.percent_done,
            size_bytes: self.total_size.max(0) as u64,
            save_path: (!self.download_dir.is_empty()).then_some(self.download_dir),
            category: None,
            added_at: timestamp_to_datetime(self.added_date),
        }
    }
}

/// Maps `status` (0 stopped .. 6 seeding) and `error` (3 = local error).
fn parse_tr_status(status: i64, error: i64, has_metadata: bool) -> TorrentState {
    if error == 3 {
        return TorrentState::Error;
    }
    match status {
        0 => TorrentState::Paused,
        _ if !has_metadata => TorrentState::Metadata,
        1 | 2 => TorrentState::Checking,
        3 | 5 => TorrentState::Queued,
        4 => TorrentState::Downloading,
        6 => TorrentState::Seeding,
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

/// Where `old_path` currently is: in place, or under the target folders when
/// an earlier rename already moved the folder it shares with other files.
fn locate(files: &[String], old_path: &str, new_path: &str) -> Option<String> {
    if files.iter().any(|f| f == old_path) {
        return Some(old_path.to_string());
    }
    let (target_dir, _) = new_path.rsplit_once('/')?;
    let name = old_path.rsplit('/').next()?;
    let moved = format!("{}/{}", target_dir, name);
    files.iter().any(|f| *f == moved).then_some(moved)
}

/// `torrent-rename-path` calls as `(path, name)` that take `current` to
/// `target`: the file name first, then differing folders deepest first.
fn rename_steps(
    current: &str,
    target: &str,
) -> Result<Vec<(String, String)>, TorrentClientError> {
    let mut from: Vec<&str> = current.split('/').collect();
    let to: Vec<&str> = target.split('/').collect();
    if from.len() != to.len() {
        return Err(TorrentClientError::Conflict(format!(
            "cannot move '{}' to '{}': Transmission keeps the folder depth",
            current, target
        )));
    }

    let mut steps = Vec::new();
    for i in (0..from.len()).rev() {
        if from[i] != to[i] {
            steps.push((from[..=i].join("/"), to[i].to_string()));
            from[i] = to[i];
        }
    }
    Ok(steps)
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    fn name(&self) -> &str {
        "transmission"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let reply: AddedTorrent = self
            .call("torrent-add", self.add_arguments(&request))
            .await?;

        if let Some(existing) = reply.duplicate {
            return Err(TorrentClientError::AlreadyExists(
                existing.hash_string.to_lowercase(),
            ));
        }

        let added = reply.added.unwrap_or_default();
        let hash = Some(added.hash_string.to_lowercase())
            .filter(|h| !h.is_empty())
            .or(request.info_hash)
            .ok_or_else(|| {
                TorrentClientError::ApiError("torrent-add returned no hash".to_string())
            })?;

        debug!(hash = %hash, "Torrent added to Transmission");
        Ok(AddTorrentResult {
            hash,
            name: (!added.name.is_empty()).then_some(added.name),
        })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        Ok(self.torrent(hash, INFO_FIELDS).await?.into_torrent_info())
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<String>, TorrentClientError> {
        let torrent = self
            .torrent(hash, &["hashString", "files", "metadataPercentComplete"])
            .await?;
        if !torrent.has_metadata() {
            return Ok(Vec::new());
        }
        Ok(torrent.files.into_iter().map(|f| f.name).collect())
    }

    async fn rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), TorrentClientError> {
        let files = self.list_files(hash).await?;
        if files.iter().any(|f| f == new_path) {
            return Err(TorrentClientError::Conflict(format!(
                "'{}' is already in the torrent",
                new_path
            )));
        }
        let current = locate(&files, old_path, new_path).ok_or_else(|| {
            TorrentClientError::Conflict(format!("no file '{}' in torrent", old_path))
        })?;

        for (path, name) in rename_steps(&current, new_path)? {
            debug!(hash, path = %path, name = %name, "Renaming torrent path");
            self.rename_path(hash, &path, &name).await?;
        }
        Ok(())
    }

    async fn rename_torrent(&self, hash: &str, name: &str) -> Result<(), TorrentClientError> {
        // The torrent name is its root path, so renaming it renames the root.
        let current = self.torrent(hash, &["hashString", "name"]).await?;
        if current.name == name {
            return Ok(());
        }
        self.rename_path(hash, &current.name, name).await
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let mut extra = Map::new();
        extra.insert("delete-local-data".to_string(), json!(delete_files));
        self.act("torrent-remove", hash, extra).await
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.act("torrent-start", hash, Map::new()).await
    }

    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.act("torrent-verify", hash, Map::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TransmissionClient {
        TransmissionClient::new(TransmissionConfig {
            url: "http://localhost:9091/transmission/rpc".to_string(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            timeout_secs: 5,
            download_path: Some("/downloads".to_string()),
        })
        .unwrap()
    }

    fn listing(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_parse_tr_status() {
        assert_eq!(parse_tr_status(0, 0, true), TorrentState::Paused);
        assert_eq!(parse_tr_status(0, 0, false), TorrentState::Paused);
        assert_eq!(parse_tr_status(4, 0, false), TorrentState::Metadata);
        assert_eq!(parse_tr_status(2, 0, true), TorrentState::Checking);
        assert_eq!(parse_tr_status(3, 0, true), TorrentState::Queued);
        assert_eq!(parse_tr_status(4, 0, true), TorrentState::Downloading);
        assert_eq!(parse_tr_status(6, 2, true), TorrentState::Seeding);
        assert_eq!(parse_tr_status(6, 3, true), TorrentState::Error);
        assert_eq!(parse_tr_status(9, 0, true), TorrentState::Unknown);
    }

    #[test]
    fn test_rename_within_folder_is_one_step() {
        let steps = rename_steps("Show [WEB]/Show - 01.mkv", "Show [WEB]/Show S01E01.mkv").unwrap();
        assert_eq!(
            steps,
            vec![(
                "Show [WEB]/Show - 01.mkv".to_string(),
                "Show S01E01.mkv".to_string()
            )]
        );
    }

    #[test]
    fn test_rename_into_new_folder_renames_file_then_folder() {
        let steps = rename_steps(
            "Show [WEB]/Show - 01.mkv",
            "Show S01 [WEB][RG]/Show S01E01 [WEB]-RG.mkv",
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![
                (
                    "Show [WEB]/Show - 01.mkv".to_string(),
                    "Show S01E01 [WEB]-RG.mkv".to_string()
                ),
                ("Show [WEB]".to_string(), "Show S01 [WEB][RG]".to_string()),
            ]
        );
        assert!(rename_steps("a/b", "a/b").unwrap().is_empty());
    }

    #[test]
    fn test_rename_across_depths_is_a_conflict() {
        let err = rename_steps("Show - 01.mkv", "Show S01/Show S01E01.mkv").unwrap_err();
        assert!(matches!(err, TorrentClientError::Conflict(_)));
    }

    #[test]
    fn test_locate_follows_renamed_folder() {
        let files = listing(&["New/E01.mkv", "New/Show - 02.mkv"]);
        assert_eq!(
            locate(&files, "Old/Show - 02.mkv", "New/E02.mkv").as_deref(),
            Some("New/Show - 02.mkv")
        );
        assert_eq!(
            locate(&files, "New/E01.mkv", "Old/Show - 01.mkv").as_deref(),
            Some("New/E01.mkv")
        );
        assert_eq!(locate(&files, "Old/Show - 03.mkv", "New/E03.mkv"), None);
    }

    #[test]
    fn test_reply_parsing() {
        let list: TorrentList = parse_reply(
            "torrent-get",
            r#"{"result":"success","arguments":{"torrents":[{"hashString":"ABC",
                "name":"Show [WEB]","status":0,"percentDone":0.5,"totalSize":1000,
                "addedDate":1703980800,"downloadDir":"/media","metadataPercentComplete":1,
                "files":[{"name":"Show [WEB]/Show - 01.mkv","length":10,"bytesCompleted":0}]}]}}"#,
        )
        .unwrap();
        let torrent = list.torrents.into_iter().next().unwrap();
        assert_eq!(torrent.files.len(), 1);
        let info = torrent.into_torrent_info();
        assert_eq!(info.hash, "abc");
        assert_eq!(info.state, TorrentState::Paused);
        assert_eq!(info.save_path.as_deref(), Some("/media"));
        assert!(info.added_at.is_some());

        let empty: TorrentList =
            parse_reply("torrent-get", r#"{"result":"success","arguments":{"torrents":[]}}"#)
                .unwrap();
        assert!(empty.torrents.is_empty());
    }

    #[test]
    fn test_failed_results_map_to_errors() {
        let err = parse_reply::<Value>("torrent-rename-path", r#"{"result":"Invalid argument"}"#)
            .unwrap_err();
        assert!(matches!(err, TorrentClientError::Conflict(_)));

        let err = parse_reply::<Value>(
            "torrent-add",
            r#"{"result":"invalid or corrupt torrent file"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TorrentClientError::InvalidTorrent(_)));

        let err = parse_reply::<Value>("torrent-start", r#"{"result":"no such method"}"#)
            .unwrap_err();
        assert!(matches!(err, TorrentClientError::ApiError(_)));

        assert!(parse_reply::<Value>("torrent-get", "<html>").is_err());
    }

    #[test]
    fn test_duplicate_add_reply() {
        let reply: AddedTorrent = parse_reply(
            "torrent-add",
            r#"{"result":"success","arguments":{"torrent-duplicate":
                {"hashString":"DEF","id":3,"name":"Show"}}}"#,
        )
        .unwrap();
        assert!(reply.added.is_none());
        assert_eq!(reply.duplicate.unwrap().hash_string, "DEF");
    }

    #[test]
    fn test_add_arguments() {
        let c = client();
        let args = c.add_arguments(
            &AddTorrentRequest::torrent_file(vec![1, 2, 3])
                .with_category("anime")
                .with_tags(["toloka"])
                .with_paused(true),
        );
        assert_eq!(args["metainfo"], "AQID");
        assert_eq!(args["download-dir"], "/downloads");
        assert_eq!(args["labels"], json!(["anime", "toloka"]));
        assert_eq!(args["paused"], true);
        assert!(args.get("filename").is_none());

        let args = c.add_arguments(
            &AddTorrentRequest::url("https://t/1.torrent").with_download_path("/media/anime"),
        );
        assert_eq!(args["filename"], "https://t/1.torrent");
        assert_eq!(args["download-dir"], "/media/anime");
        assert!(args.get("labels").is_none());
        assert_eq!(args["paused"], false);
    }
}
