//! End-to-end add/update runs against mock client and tracker.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use toloka2media_core::detector::{ChangeReason, UpdateVerdict};
use toloka2media_core::orchestrator::{
    AddRequest, OrchestratorConfig, RenameOrchestrator, TitleError, TitlePhase,
};
use toloka2media_core::registry::{RegistryError, RegistryLock, TitleEntry, TitleRegistry};
use toloka2media_core::testing::{fixtures, MockOp, MockTorrentClient, MockTracker, ScriptedPrompt};
use toloka2media_core::torrent_client::{TorrentClient, TorrentClientError};
use toloka2media_core::tracker::TrackerError;

const OLD_HASH: &str = "1111111111111111111111111111111111111111";
const NEW_HASH: &str = "2222222222222222222222222222222222222222";
const FOLDER: &str = "Show S01 [WEB][RG]";

struct Harness {
    _temp: TempDir,
    media: PathBuf,
    registry_path: PathBuf,
    client: Arc<MockTorrentClient>,
    tracker: Arc<MockTracker>,
    prompt: Arc<ScriptedPrompt>,
    orchestrator: RenameOrchestrator,
}

impl Harness {
    fn new(prompt: ScriptedPrompt) -> Self {
        let temp = TempDir::new().unwrap();
        let media = temp.path().join("media");
        fs::create_dir_all(&media).unwrap();
        let registry_path = temp.path().join("titles.toml");

        let client = Arc::new(MockTorrentClient::new());
        let tracker = Arc::new(MockTracker::new());
        let prompt = Arc::new(prompt);
        let orchestrator = RenameOrchestrator::new(
            OrchestratorConfig::immediate(&registry_path),
            client.clone(),
            tracker.clone(),
            prompt.clone(),
        );

        Self {
            _temp: temp,
            media,
            registry_path,
            client,
            tracker,
            prompt,
            orchestrator,
        }
    }

    fn media_dir(&self) -> String {
        self.media.to_string_lossy().into_owned()
    }

    /// Creates `path` under the media dir with `content`.
    fn write(&self, path: &str, content: &str) {
        let full = self.media.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.media.join(path)).unwrap()
    }

    fn exists(&self, path: &str) -> bool {
        self.media.join(path).exists()
    }

    fn registry(&self) -> TitleRegistry {
        TitleRegistry::load(&self.registry_path).unwrap()
    }

    fn tracked_entry(&self, guid: &str, hash: &str, partial: bool) -> TitleEntry {
        let mut entry = fixtures::title_entry("Show", 1);
        entry.download_dir = self.media_dir();
        entry.guid = guid.to_string();
        entry.hash = hash.to_string();
        entry.publish_date = Some(fixtures::published_at());
        entry.is_partial_season = partial;
        entry
    }

    fn seed(&self, codename: &str, entry: TitleEntry) {
        let mut registry = self.registry();
        registry.insert(codename, entry).unwrap();
        let lock = RegistryLock::acquire(&self.registry_path).unwrap();
        registry.save(&lock).unwrap();
    }

    fn add_request(&self, guid: &str) -> AddRequest {
        AddRequest::new(format!("https://toloka.example/{}", guid), 1)
            .with_episode_index(1)
            .with_adjustment(0)
            .with_title("Show")
            .with_meta("WEB")
            .with_download_dir(self.media_dir())
    }
}

fn canonical(episode: u32) -> String {
    format!("{}/Show S01E{:02} [WEB]-RG.mkv", FOLDER, episode)
}

fn source(episode: u32) -> String {
    format!("Show [WEB]/Show - {:02}.mkv", episode)
}

fn sources(episodes: std::ops::RangeInclusive<u32>) -> Vec<String> {
    episodes.map(source).collect()
}

fn as_refs(paths: &[String]) -> Vec<&str> {
    paths.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn test_add_renames_and_records_title() {
    let h = Harness::new(ScriptedPrompt::new());
    let files = sources(1..=2);
    for f in &files {
        h.write(f, f);
    }
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;

    let outcome = h.orchestrator.add(h.add_request("t100")).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.codename, "ShowS01");
    assert_eq!(outcome.phase, TitlePhase::Tracked);
    assert_eq!(outcome.verdict, Some(UpdateVerdict::NoPriorEntry));
    let applied = outcome.applied.as_ref().unwrap();
    assert_eq!(applied.client_renames, 2);
    assert_eq!(applied.fs_moves, 2);

    assert_eq!(h.read(&canonical(1)), source(1));
    assert_eq!(h.read(&canonical(2)), source(2));
    assert!(!h.exists("Show [WEB]"));

    let ops = h.client.operations().await;
    assert_eq!(
        ops.first(),
        Some(&MockOp::Add {
            hash: NEW_HASH.to_string(),
            paused: true
        })
    );
    assert!(ops.contains(&MockOp::RenameTorrent {
        hash: NEW_HASH.to_string(),
        name: FOLDER.to_string()
    }));
    assert_eq!(
        ops.last(),
        Some(&MockOp::Resume {
            hash: NEW_HASH.to_string()
        })
    );

    let registry = h.registry();
    let entry = registry.get("ShowS01").unwrap();
    assert_eq!(entry.hash, NEW_HASH);
    assert_eq!(entry.guid, "t100");
    assert_eq!(entry.publish_date, Some(fixtures::published_at()));
    assert!(!toloka2media_core::registry::lock_path(&h.registry_path).exists());
}

#[tokio::test]
async fn test_second_run_on_unchanged_release_mutates_nothing() {
    let h = Harness::new(ScriptedPrompt::new());
    let files = sources(1..=2);
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;
    assert!(!h.orchestrator.add(h.add_request("t100")).await.is_failed());
    h.client.clear_recorded().await;
    let registry_before = fs::read_to_string(&h.registry_path).unwrap();

    let outcome = h.orchestrator.update_one("ShowS01", false).await;
    assert_eq!(outcome.verdict, Some(UpdateVerdict::Unchanged));
    assert_eq!(outcome.phase, TitlePhase::Tracked);
    assert!(!outcome.changed());

    let report = h.orchestrator.update_all(false).await.unwrap();
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.updated_count(), 0);

    assert_eq!(h.client.mutation_count().await, 0);
    assert_eq!(fs::read_to_string(&h.registry_path).unwrap(), registry_before);
}

#[tokio::test]
async fn test_failure_on_third_of_five_reverts_everything() {
    let h = Harness::new(ScriptedPrompt::new());
    let files = sources(1..=5);
    for f in &files {
        h.write(f, f);
    }
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;
    h.client
        .fail_rename_of(&source(3), TorrentClientError::Conflict("busy".into()))
        .await;

    let outcome = h.orchestrator.add(h.add_request("t100")).await;

    assert_eq!(outcome.phase, TitlePhase::Failed);
    assert!(matches!(outcome.error, Some(TitleError::Client { .. })));

    for f in &files {
        assert_eq!(h.read(f), *f, "{f} is back in place");
    }
    assert!(!h.exists(FOLDER));
    assert!(!h.client.has_torrent(NEW_HASH).await);
    assert!(!h.registry().contains("ShowS01"));

    let renames: Vec<MockOp> = h
        .client
        .operations()
        .await
        .into_iter()
        .filter(|op| matches!(op, MockOp::RenameFile { .. }))
        .collect();
    // Two forward renames, two reverts, nothing for episodes 4 and 5.
    assert_eq!(renames.len(), 4);
    assert!(renames.iter().all(|op| match op {
        MockOp::RenameFile { from, to, .. } => {
            !from.contains("04") && !from.contains("05") && !to.contains("E04") && !to.contains("E05")
        }
        _ => false,
    }));
}

#[tokio::test]
async fn test_update_failure_on_third_of_five_keeps_old_release() {
    let h = Harness::new(ScriptedPrompt::new().allow_overwrite(true));
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.write(&canonical(1), "old one");
    h.write(&canonical(2), "old two");
    h.client
        .add_existing(OLD_HASH, FOLDER, &h.media, &[&canonical(1), &canonical(2)])
        .await;
    let registry_before = fs::read_to_string(&h.registry_path).unwrap();

    let files = sources(1..=5);
    for f in &files {
        h.write(f, f);
    }
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;
    h.client
        .fail_rename_of(&source(3), TorrentClientError::Conflict("busy".into()))
        .await;

    let outcome = h.orchestrator.update_one("ShowS01", false).await;

    assert_eq!(outcome.phase, TitlePhase::Failed);
    assert!(matches!(outcome.error, Some(TitleError::Client { .. })));
    assert_eq!(fs::read_to_string(&h.registry_path).unwrap(), registry_before);

    assert_eq!(h.read(&canonical(1)), "old one");
    assert_eq!(h.read(&canonical(2)), "old two");
    assert_eq!(fs::read_dir(h.media.join(FOLDER)).unwrap().count(), 2);
    for f in &files {
        assert_eq!(h.read(f), *f, "{f} is back in place");
    }

    assert!(h.client.has_torrent(OLD_HASH).await);
    assert_eq!(
        h.client.list_files(OLD_HASH).await.unwrap(),
        vec![canonical(1), canonical(2)]
    );
    assert!(!h.client.has_torrent(NEW_HASH).await);
    assert!(!h
        .client
        .operations()
        .await
        .iter()
        .any(|op| matches!(op, MockOp::Remove { hash, .. } if hash == OLD_HASH)));
}

#[tokio::test]
async fn test_failed_registry_save_reverts_add() {
    let h = Harness::new(ScriptedPrompt::new());
    let files = sources(1..=2);
    for f in &files {
        h.write(f, f);
    }
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;
    // The save writes this path first; a directory there makes it fail.
    fs::create_dir(h.registry_path.with_file_name("titles.toml.tmp")).unwrap();

    let outcome = h.orchestrator.add(h.add_request("t100")).await;

    assert_eq!(outcome.phase, TitlePhase::Failed);
    assert!(matches!(outcome.error, Some(TitleError::Registry(_))));
    assert!(outcome.applied.is_none());

    for f in &files {
        assert_eq!(h.read(f), *f, "{f} is back in place");
    }
    assert!(!h.exists(FOLDER));
    assert!(!h.client.has_torrent(NEW_HASH).await);
    assert!(!h
        .client
        .operations()
        .await
        .contains(&MockOp::Resume {
            hash: NEW_HASH.to_string()
        }));
    assert!(!h.registry_path.exists());
}

#[tokio::test]
async fn test_failed_registry_save_keeps_replaced_release() {
    let h = Harness::new(ScriptedPrompt::new().allow_overwrite(true));
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.write(&canonical(1), "old");
    h.write("Show - 01.mkv", "new");
    h.client
        .add_existing(OLD_HASH, FOLDER, &h.media, &[&canonical(1)])
        .await;
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &["Show - 01.mkv"]))
        .await;
    h.client
        .register_files(NEW_HASH, "Show - 01.mkv", &["Show - 01.mkv"])
        .await;
    let registry_before = fs::read_to_string(&h.registry_path).unwrap();
    fs::create_dir(h.registry_path.with_file_name("titles.toml.tmp")).unwrap();

    let outcome = h.orchestrator.update_one("ShowS01", false).await;

    assert!(matches!(outcome.error, Some(TitleError::Registry(_))));
    assert_eq!(fs::read_to_string(&h.registry_path).unwrap(), registry_before);
    assert_eq!(h.read(&canonical(1)), "old");
    assert_eq!(h.read("Show - 01.mkv"), "new");
    assert_eq!(fs::read_dir(h.media.join(FOLDER)).unwrap().count(), 1);
    assert!(h.client.has_torrent(OLD_HASH).await);
    assert!(!h.client.has_torrent(NEW_HASH).await);
}

#[tokio::test]
async fn test_naming_error_fails_before_any_client_call() {
    let h = Harness::new(ScriptedPrompt::new());
    h.tracker
        .set_observation(fixtures::observation(
            "t100",
            NEW_HASH,
            &["Show [WEB]/Show - 01.mkv", "Show [WEB]/readme.txt"],
        ))
        .await;

    let outcome = h.orchestrator.add(h.add_request("t100")).await;

    assert!(matches!(outcome.error, Some(TitleError::Naming { .. })));
    assert_eq!(h.client.mutation_count().await, 0);
}

#[tokio::test]
async fn test_nested_layout_is_rejected() {
    let h = Harness::new(ScriptedPrompt::new());
    h.tracker
        .set_observation(fixtures::observation(
            "t100",
            NEW_HASH,
            &["Show/Season 1/Show - 01.mkv"],
        ))
        .await;

    let outcome = h.orchestrator.add(h.add_request("t100")).await;
    assert!(matches!(outcome.error, Some(TitleError::UnsupportedLayout(_))));
    assert_eq!(h.client.mutation_count().await, 0);
}

#[tokio::test]
async fn test_partial_season_update_keeps_existing_episodes() {
    let h = Harness::new(ScriptedPrompt::new());
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, true));
    h.write(&canonical(1), "episode one");
    h.write(&canonical(2), "episode two");
    h.write(&format!("{}/notes.txt", FOLDER), "keep me");
    h.client
        .add_existing(
            OLD_HASH,
            "Show S01E01-E02 [WEB][RG]",
            &h.media,
            &[&canonical(1), &canonical(2)],
        )
        .await;

    let files = sources(1..=3);
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;

    let outcome = h.orchestrator.update_one("ShowS01", false).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(
        outcome.verdict,
        Some(UpdateVerdict::ChangedRelease {
            reason: ChangeReason::HashChanged
        })
    );
    assert_eq!(outcome.applied.as_ref().unwrap().adopted, 2);
    assert!(h.prompt.overwrite_requests().await.is_empty());

    assert_eq!(h.read(&canonical(1)), "episode one");
    assert_eq!(h.read(&canonical(2)), "episode two");
    assert_eq!(h.read(&format!("{}/notes.txt", FOLDER)), "keep me");

    let info = h.client.get_torrent(NEW_HASH).await.unwrap();
    assert_eq!(info.name, "Show S01E01-E03 [WEB][RG]");
    assert_eq!(
        h.client.list_files(NEW_HASH).await.unwrap(),
        vec![canonical(1), canonical(2), canonical(3)]
    );

    let ops = h.client.operations().await;
    assert!(ops.contains(&MockOp::Remove {
        hash: OLD_HASH.to_string(),
        delete_files: false
    }));
    assert!(ops.contains(&MockOp::Recheck {
        hash: NEW_HASH.to_string()
    }));
    assert_eq!(h.registry().get("ShowS01").unwrap().hash, NEW_HASH);
}

#[tokio::test]
async fn test_declined_overwrite_leaves_state_intact() {
    let h = Harness::new(ScriptedPrompt::new().allow_overwrite(false));
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.write(&canonical(1), "old");
    h.write("Show - 01.mkv", "new");
    h.client
        .add_existing(OLD_HASH, FOLDER, &h.media, &[&canonical(1)])
        .await;
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &["Show - 01.mkv"]))
        .await;
    h.client
        .register_files(NEW_HASH, "Show - 01.mkv", &["Show - 01.mkv"])
        .await;

    let outcome = h.orchestrator.update_one("ShowS01", false).await;

    assert!(matches!(outcome.error, Some(TitleError::RenameConflict(_))));
    let requests = h.prompt.overwrite_requests().await;
    assert_eq!(requests, vec![vec![h.media.join(canonical(1))]]);

    assert_eq!(h.read(&canonical(1)), "old");
    assert_eq!(h.read("Show - 01.mkv"), "new");
    assert!(h.client.has_torrent(OLD_HASH).await);
    assert!(!h.client.has_torrent(NEW_HASH).await);
    assert_eq!(h.registry().get("ShowS01").unwrap().hash, OLD_HASH);
}

#[tokio::test]
async fn test_declined_full_season_replace_before_download() {
    let h = Harness::new(ScriptedPrompt::new().allow_overwrite(false));
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.write(&canonical(1), "old one");
    h.write(&canonical(2), "old two");
    h.client
        .add_existing(OLD_HASH, FOLDER, &h.media, &[&canonical(1), &canonical(2)])
        .await;

    // Listed by the client but not downloaded yet.
    let files = sources(1..=2);
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;

    let outcome = h.orchestrator.update_one("ShowS01", false).await;

    assert!(matches!(outcome.error, Some(TitleError::RenameConflict(_))));
    assert_eq!(
        h.prompt.overwrite_requests().await,
        vec![vec![h.media.join(canonical(1)), h.media.join(canonical(2))]]
    );

    assert_eq!(h.read(&canonical(1)), "old one");
    assert_eq!(h.read(&canonical(2)), "old two");
    assert!(h.client.has_torrent(OLD_HASH).await);
    assert!(!h.client.has_torrent(NEW_HASH).await);
    assert!(!h
        .client
        .operations()
        .await
        .iter()
        .any(|op| matches!(op, MockOp::RenameFile { .. })));
    assert_eq!(h.registry().get("ShowS01").unwrap().hash, OLD_HASH);
}

#[tokio::test]
async fn test_confirmed_overwrite_replaces_file() {
    let h = Harness::new(ScriptedPrompt::new().allow_overwrite(true));
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.write(&canonical(1), "old");
    h.write("Show - 01.mkv", "new");
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &["Show - 01.mkv"]))
        .await;
    h.client
        .register_files(NEW_HASH, "Show - 01.mkv", &["Show - 01.mkv"])
        .await;

    let outcome = h.orchestrator.update_one("ShowS01", false).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.applied.as_ref().unwrap().overwritten, 1);
    assert_eq!(h.read(&canonical(1)), "new");
    assert!(!h.exists("Show - 01.mkv"));
    assert_eq!(fs::read_dir(h.media.join(FOLDER)).unwrap().count(), 1);
    // The replaced torrent was never in the client.
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with("remove replaced torrent"));
}

#[tokio::test]
async fn test_locked_registry_fails_fast() {
    let h = Harness::new(ScriptedPrompt::new());
    let _held = RegistryLock::acquire(&h.registry_path).unwrap();

    let err = h.orchestrator.update_all(false).await.unwrap_err();
    assert!(matches!(
        err,
        TitleError::Registry(RegistryError::Locked { .. })
    ));

    let outcome = h.orchestrator.add(h.add_request("t100")).await;
    assert_eq!(outcome.error.as_ref().map(|e| e.kind()), Some("registry"));
    assert!(h.tracker.calls().await.is_empty());
}

#[tokio::test]
async fn test_manual_add_prompts_for_index_and_offset() {
    let prompt = ScriptedPrompt::new().with_episode_index(1).with_adjustment(-12);
    let h = Harness::new(prompt);
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &["Show - 13 [1080p].mkv"]))
        .await;
    h.client
        .register_files(NEW_HASH, "Show - 13 [1080p].mkv", &["Show - 13 [1080p].mkv"])
        .await;

    let request = AddRequest::new("t100", 1)
        .with_title("Show")
        .with_meta("WEB")
        .with_download_dir(h.media_dir());
    let outcome = h.orchestrator.add(request).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    let index_requests = h.prompt.index_requests().await;
    assert_eq!(index_requests.len(), 1);
    assert_eq!(index_requests[0].0, "Show - 13 [1080p].mkv");
    assert_eq!(index_requests[0].1.len(), 2);
    assert_eq!(
        h.prompt.adjustment_requests().await,
        vec![("Show - 13 [1080p].mkv".to_string(), 13)]
    );

    assert_eq!(
        h.client.list_files(NEW_HASH).await.unwrap(),
        vec![canonical(1)]
    );
    assert_eq!(h.registry().get("ShowS01").unwrap().adjusted_episode_number, -12);
}

#[tokio::test]
async fn test_add_with_index_defaults_offset_without_asking() {
    let h = Harness::new(ScriptedPrompt::new().with_adjustment(-12));
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &["Show - 13 [1080p].mkv"]))
        .await;
    h.client
        .register_files(NEW_HASH, "Show - 13 [1080p].mkv", &["Show - 13 [1080p].mkv"])
        .await;

    let request = AddRequest::new("t100", 1)
        .with_episode_index(1)
        .with_title("Show")
        .with_meta("WEB")
        .with_download_dir(h.media_dir());
    let outcome = h.orchestrator.add(request).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert!(h.prompt.index_requests().await.is_empty());
    assert!(h.prompt.adjustment_requests().await.is_empty());
    assert_eq!(
        h.client.list_files(NEW_HASH).await.unwrap(),
        vec![canonical(13)]
    );
    assert_eq!(h.registry().get("ShowS01").unwrap().adjusted_episode_number, 0);
}

#[tokio::test]
async fn test_add_waits_for_metadata() {
    let h = Harness::new(ScriptedPrompt::new());
    let files = sources(1..=1);
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &as_refs(&files)))
        .await;
    h.client
        .register_files(NEW_HASH, "Show [WEB]", &as_refs(&files))
        .await;
    h.client.set_metadata_polls(3).await;

    let outcome = h.orchestrator.add(h.add_request("t100")).await;
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.phase, TitlePhase::Tracked);
}

#[tokio::test]
async fn test_adding_tracked_codename_is_rejected() {
    let h = Harness::new(ScriptedPrompt::new());
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.tracker
        .set_observation(fixtures::observation("t100", NEW_HASH, &["Show - 01.mkv"]))
        .await;

    let outcome = h.orchestrator.add(h.add_request("t100")).await;
    assert!(matches!(outcome.error, Some(TitleError::AlreadyTracked(ref c)) if c == "ShowS01"));
    assert_eq!(h.client.mutation_count().await, 0);
}

#[tokio::test]
async fn test_update_all_isolates_failing_titles() {
    let h = Harness::new(ScriptedPrompt::new());
    h.seed("AlphaS01", h.tracked_entry("tA", OLD_HASH, false));
    h.seed("BetaS01", h.tracked_entry("tB", OLD_HASH, false));
    h.tracker
        .set_observation(fixtures::observation("tA", OLD_HASH, &["Show - 01.mkv"]))
        .await;
    h.tracker.fail_guid("tB", TrackerError::Timeout).await;

    let report = h.orchestrator.update_all(false).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.exit_code(), 1);
    let failed: Vec<&str> = report.failed().map(|o| o.codename.as_str()).collect();
    assert_eq!(failed, vec!["BetaS01"]);
    assert!(matches!(
        report.outcomes[1].error,
        Some(TitleError::Tracker(TrackerError::Timeout))
    ));
}

#[tokio::test]
async fn test_forced_update_reuses_torrent() {
    let h = Harness::new(ScriptedPrompt::new());
    h.seed("ShowS01", h.tracked_entry("t100", OLD_HASH, false));
    h.write(&canonical(1), "ep1");
    h.client
        .add_existing(OLD_HASH, FOLDER, &h.media, &[&canonical(1)])
        .await;
    h.tracker
        .set_observation(fixtures::observation("t100", OLD_HASH, &[&canonical(1)]))
        .await;

    let outcome = h.orchestrator.update_one("ShowS01", true).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(
        outcome.verdict,
        Some(UpdateVerdict::ChangedRelease {
            reason: ChangeReason::Forced
        })
    );
    assert!(!outcome.changed());
    assert_eq!(
        h.client.operations().await,
        vec![MockOp::Resume {
            hash: OLD_HASH.to_string()
        }]
    );
    assert_eq!(h.read(&canonical(1)), "ep1");
}
