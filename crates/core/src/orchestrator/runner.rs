//! Rename orchestrator implementation.
//!
//! Drives titles through observe, classify, add, rename and record:
//! - Observations: concurrent (one tracker request per title)
//! - Client and filesystem writes: sequential, under the registry lock

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::detector::classify;
use crate::naming::tokenizer::numbers_with_context;
use crate::naming::{file_name_of, EpisodeNumberResolver, MetaTags, NameComposer};
use crate::registry::{
    default_title, suggest_codename, RegistryError, RegistryLock, TitleEntry, TitleRegistry,
};
use crate::rename::{RenameApplier, RenamePlanner, StagedBatch};
use crate::torrent_client::{AddTorrentRequest, TorrentClient, TorrentClientError};
use crate::tracker::{guid_from_url, TorrentObservation, Tracker};

use super::config::OrchestratorConfig;
use super::prompt::OperatorPrompt;
use super::types::{AddRequest, RunReport, TitleError, TitleOutcome, TitlePhase};

/// Characters of surrounding text shown with each number when prompting.
const CONTEXT_WIDTH: usize = 12;

/// A title whose renames are staged but not yet recorded.
struct SyncedTitle {
    entry: TitleEntry,
    staged: StagedBatch,
    added_new: bool,
}

/// Coordinates tracker, client, rename engine and registry.
pub struct RenameOrchestrator {
    config: OrchestratorConfig,
    client: Arc<dyn TorrentClient>,
    tracker: Arc<dyn Tracker>,
    prompt: Arc<dyn OperatorPrompt>,
    planner: RenamePlanner,
    applier: RenameApplier,
}

impl RenameOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        client: Arc<dyn TorrentClient>,
        tracker: Arc<dyn Tracker>,
        prompt: Arc<dyn OperatorPrompt>,
    ) -> Self {
        let planner = RenamePlanner::new(NameComposer::new(
            config.enable_dot_spacing_in_file_name,
        ));
        let applier = RenameApplier::new(client.clone(), config.retry.clone());

        Self {
            config,
            client,
            tracker,
            prompt,
            planner,
            applier,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Starts tracking a new release and renames it into place.
    pub async fn add(&self, request: AddRequest) -> TitleOutcome {
        let label = request
            .codename
            .clone()
            .unwrap_or_else(|| guid_from_url(&request.url));

        let (lock, mut registry) = match self.open_registry() {
            Ok(opened) => opened,
            Err(e) => return TitleOutcome::new(label, TitlePhase::Discovered).fail(e.into()),
        };

        let obs = match self.observe(&request.url).await {
            Ok(obs) => obs,
            Err(e) => return TitleOutcome::new(label, TitlePhase::Discovered).fail(e),
        };

        let (codename, entry) = match self.new_entry(&request, &obs, &registry).await {
            Ok(created) => created,
            Err(e) => return TitleOutcome::new(label, TitlePhase::Discovered).fail(e),
        };

        let mut outcome = TitleOutcome::new(&codename, TitlePhase::Discovered);
        outcome.verdict = Some(classify(None, &obs, false));
        info!(codename = %codename, guid = %obs.guid, hash = %obs.hash, "Adding title");

        match self.sync_title(&codename, &entry, &obs, &mut outcome).await {
            Ok(synced) => {
                self.record_title(&mut registry, &lock, &codename, None, synced, outcome)
                    .await
            }
            Err(e) => {
                error!(codename = %codename, error = %e, "Add failed");
                outcome.fail(e)
            }
        }
    }

    /// Checks one tracked title and applies a changed release.
    pub async fn update_one(&self, codename: &str, force: bool) -> TitleOutcome {
        let (lock, mut registry) = match self.open_registry() {
            Ok(opened) => opened,
            Err(e) => return TitleOutcome::new(codename, TitlePhase::Tracked).fail(e.into()),
        };

        let entry = match registry.get(codename) {
            Ok(entry) => entry.clone(),
            Err(e) => return TitleOutcome::new(codename, TitlePhase::Tracked).fail(e.into()),
        };

        let observation = self.observe(&entry.guid).await;
        self.update_title(&mut registry, &lock, codename, entry, observation, force)
            .await
    }

    /// Checks every tracked title.
    ///
    /// Observations are fetched concurrently; updates run one at a time. A
    /// failing title never stops the others. Fails only when the registry
    /// cannot be locked or read.
    pub async fn update_all(&self, force: bool) -> Result<RunReport, TitleError> {
        let (lock, mut registry) = self.open_registry()?;
        let mut report = RunReport::default();

        let mut pending = Vec::new();
        for codename in registry.codenames() {
            match registry.get(&codename) {
                Ok(entry) => pending.push((codename, entry.clone())),
                Err(e) => {
                    warn!(codename = %codename, error = %e, "Skipping unreadable entry");
                    report.push(TitleOutcome::new(&codename, TitlePhase::Tracked).fail(e.into()));
                }
            }
        }

        info!(titles = pending.len(), "Fetching release observations");
        let observations = join_all(pending.iter().map(|(_, entry)| self.observe(&entry.guid))).await;

        for ((codename, entry), observation) in pending.into_iter().zip(observations) {
            let outcome = self
                .update_title(&mut registry, &lock, &codename, entry, observation, force)
                .await;
            report.push(outcome);
        }

        info!(
            titles = report.outcomes.len(),
            updated = report.updated_count(),
            failed = report.failed_count(),
            "Update run finished"
        );
        Ok(report)
    }

    fn open_registry(&self) -> Result<(RegistryLock, TitleRegistry), RegistryError> {
        let lock = RegistryLock::acquire(&self.config.registry_path)?;
        let registry = TitleRegistry::load(&self.config.registry_path)?;
        Ok((lock, registry))
    }

    async fn observe(&self, guid: &str) -> Result<TorrentObservation, TitleError> {
        let obs = self
            .config
            .retry
            .run("observe", || self.tracker.observe(guid))
            .await?;
        debug!(guid = %obs.guid, hash = %obs.hash, files = obs.files.len(), "Observed release");
        Ok(obs)
    }

    async fn update_title(
        &self,
        registry: &mut TitleRegistry,
        lock: &RegistryLock,
        codename: &str,
        entry: TitleEntry,
        observation: Result<TorrentObservation, TitleError>,
        force: bool,
    ) -> TitleOutcome {
        let mut outcome = TitleOutcome::new(codename, TitlePhase::Tracked);

        let obs = match observation {
            Ok(obs) => obs,
            Err(e) => {
                error!(codename, error = %e, "Observation failed");
                return outcome.fail(e);
            }
        };

        let verdict = classify(Some(&entry), &obs, force);
        outcome.verdict = Some(verdict);
        if !verdict.is_changed() {
            info!(codename, "Release unchanged");
            return outcome;
        }

        info!(codename, verdict = ?verdict, hash = %obs.hash, "Release changed, updating");
        if let Err(e) = outcome.advance(TitlePhase::Updating) {
            return outcome.fail(e);
        }

        match self.sync_title(codename, &entry, &obs, &mut outcome).await {
            Ok(synced) => {
                self.record_title(registry, lock, codename, Some(&entry), synced, outcome)
                    .await
            }
            Err(e) => {
                error!(codename, error = %e, "Update failed, registry entry unchanged");
                outcome.fail(e)
            }
        }
    }

    /// Builds the entry for an add request, prompting for what is missing.
    async fn new_entry(
        &self,
        request: &AddRequest,
        obs: &TorrentObservation,
        registry: &TitleRegistry,
    ) -> Result<(String, TitleEntry), TitleError> {
        let title = non_empty(&request.title).unwrap_or_else(|| default_title(&obs.name));
        let codename = non_empty(&request.codename)
            .unwrap_or_else(|| suggest_codename(&obs.name, request.season_number));

        if registry.contains(&codename) {
            return Err(TitleError::AlreadyTracked(codename));
        }

        let sample = obs.files.first().map(String::as_str).unwrap_or(&obs.name);
        let sample_name = file_name_of(sample);

        let (episode_index, automatic) = match request.episode_index {
            Some(index) => (index, true),
            None => {
                let numbers = numbers_with_context(sample_name, CONTEXT_WIDTH);
                let index = self
                    .prompt
                    .choose_episode_index(sample_name, &numbers)
                    .await
                    .ok_or_else(|| TitleError::Cancelled("no episode index chosen".to_string()))?;
                (index, false)
            }
        };

        // Automatic adds never prompt; a missing offset means none.
        let adjusted_episode_number = match request.adjusted_episode_number {
            Some(adjustment) => adjustment,
            None if automatic => 0,
            None => {
                let raw = EpisodeNumberResolver::new(episode_index, 0)
                    .resolve(sample)
                    .map_err(|source| TitleError::Naming {
                        path: sample.to_string(),
                        source,
                    })?;
                self.prompt.choose_adjustment(sample_name, raw).await
            }
        };

        let entry = TitleEntry {
            episode_index,
            season_number: request.season_number,
            torrent_name: title,
            download_dir: non_empty(&request.download_dir)
                .unwrap_or_else(|| self.config.default_download_dir.clone()),
            publish_date: None,
            release_group: request
                .release_group
                .clone()
                .unwrap_or_else(|| obs.author.trim().to_string()),
            meta: request
                .meta
                .clone()
                .unwrap_or_else(|| self.config.default_meta.clone()),
            hash: String::new(),
            adjusted_episode_number,
            guid: obs.guid.clone(),
            is_partial_season: request.is_partial_season,
        };

        entry
            .validate()
            .map_err(|reason| TitleError::Config(format!("{}: {}", codename, reason)))?;

        let tags = MetaTags::parse(&entry.meta);
        info!(
            codename = %codename,
            episode_index,
            adjustment = entry.adjusted_episode_number,
            quality = tags.quality().unwrap_or("-"),
            language = tags.language().unwrap_or("-"),
            subs = tags.subs().unwrap_or("-"),
            "New title"
        );

        Ok((codename, entry))
    }

    /// Stages the client and disk changes for `obs` and returns the entry to
    /// record.
    ///
    /// On failure everything staged is reverted and a torrent added by this
    /// call is removed again with its files kept.
    async fn sync_title(
        &self,
        codename: &str,
        entry: &TitleEntry,
        obs: &TorrentObservation,
        outcome: &mut TitleOutcome,
    ) -> Result<SyncedTitle, TitleError> {
        if !obs.files.is_empty() {
            let preview = self.planner.resolve(entry, &obs.files)?;
            debug!(
                codename,
                folder = %preview.folder,
                files = preview.files.len(),
                "Naming resolved from tracker listing"
            );
        }

        let hash = obs.hash.to_lowercase();
        let added_new = self.ensure_torrent(entry, obs, &hash).await?;
        if outcome.phase == TitlePhase::Discovered {
            outcome.advance(TitlePhase::Added)?;
        }

        let staged = match self.rename_in_client(codename, entry, &hash, outcome).await {
            Ok(staged) => staged,
            Err(e) => {
                if added_new {
                    self.discard_torrent(&hash).await;
                }
                return Err(e);
            }
        };

        let mut synced = entry.clone();
        synced.hash = hash;
        synced.publish_date = Some(obs.publish_date);
        synced.guid = obs.guid.clone();
        Ok(SyncedTitle {
            entry: synced,
            staged,
            added_new,
        })
    }

    /// Adds the observed torrent paused unless the client already has it.
    /// Returns whether a torrent was added.
    async fn ensure_torrent(
        &self,
        entry: &TitleEntry,
        obs: &TorrentObservation,
        hash: &str,
    ) -> Result<bool, TitleError> {
        match self
            .config
            .retry
            .run("get_torrent", || self.client.get_torrent(hash))
            .await
        {
            Ok(_) => {
                debug!(hash, "Torrent already in client, reusing it");
                return Ok(false);
            }
            Err(TorrentClientError::TorrentNotFound(_)) => {}
            Err(e) => return Err(TitleError::client("get_torrent", e)),
        }

        let request = AddTorrentRequest::from_link(obs.torrent_url.as_str())
            .with_info_hash(hash)
            .with_download_path(entry.download_dir.as_str())
            .with_category(self.config.category.as_str())
            .with_tags(self.config.tags.iter().cloned())
            .with_paused(true);

        match self
            .config
            .retry
            .run("add_torrent", || self.client.add_torrent(request.clone()))
            .await
        {
            Ok(result) => info!(hash = %result.hash, client = self.client.name(), "Torrent added paused"),
            Err(TorrentClientError::AlreadyExists(_)) => return Ok(false),
            Err(e) => return Err(TitleError::client("add_torrent", e)),
        }

        if !self.config.client_wait.is_zero() {
            sleep(self.config.client_wait).await;
        }
        Ok(true)
    }

    async fn rename_in_client(
        &self,
        codename: &str,
        entry: &TitleEntry,
        hash: &str,
        outcome: &mut TitleOutcome,
    ) -> Result<StagedBatch, TitleError> {
        if outcome.phase == TitlePhase::Added {
            outcome.advance(TitlePhase::Downloading)?;
        }
        let files = self.wait_for_files(hash).await?;

        outcome.advance(TitlePhase::Renaming)?;
        let batch = self.planner.plan(entry, hash, &files)?;

        let overwrites = batch.overwrites();
        if !overwrites.is_empty() && !self.prompt.confirm_overwrite(codename, &overwrites).await {
            return Err(TitleError::RenameConflict(format!(
                "{} existing file(s) would be overwritten",
                overwrites.len()
            )));
        }

        Ok(self.applier.stage(&batch).await?)
    }

    /// Polls the file list until metadata arrives or the timeout passes.
    async fn wait_for_files(&self, hash: &str) -> Result<Vec<String>, TitleError> {
        let started = Instant::now();
        loop {
            let files = self
                .config
                .retry
                .run("list_files", || self.client.list_files(hash))
                .await
                .map_err(|e| TitleError::client("list_files", e))?;
            if !files.is_empty() {
                return Ok(files);
            }

            if started.elapsed() >= self.config.metadata_timeout {
                return Err(TitleError::MetadataTimeout {
                    hash: hash.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            debug!(hash, "Waiting for torrent metadata");
            sleep(self.config.metadata_poll_interval).await;
        }
    }

    /// Removes the replaced torrent, then rechecks and resumes the new one.
    /// Failures become warnings.
    async fn finish_client_steps(
        &self,
        prior: Option<&TitleEntry>,
        hash: &str,
        added_new: bool,
        outcome: &mut TitleOutcome,
    ) {
        if let Some(prior) = prior {
            if !prior.hash.is_empty() && !prior.has_hash(hash) {
                let result = self
                    .config
                    .retry
                    .run("remove_torrent", || self.client.remove_torrent(&prior.hash, false))
                    .await;
                note_warning(outcome, "remove replaced torrent", result);
            }

            if added_new {
                let result = self
                    .config
                    .retry
                    .run("recheck_torrent", || self.client.recheck_torrent(hash))
                    .await;
                note_warning(outcome, "recheck", result);
            }
        }

        let result = self
            .config
            .retry
            .run("resume_torrent", || self.client.resume_torrent(hash))
            .await;
        note_warning(outcome, "resume", result);
    }

    async fn discard_torrent(&self, hash: &str) {
        match self
            .config
            .retry
            .run("remove_torrent", || self.client.remove_torrent(hash, false))
            .await
        {
            Ok(()) => info!(hash, "Removed torrent added by the failed run"),
            Err(e) => warn!(hash, error = %e, "Failed to remove torrent added by the failed run"),
        }
    }

    /// Saves the synced entry, then commits the staged batch and runs the
    /// best-effort client steps.
    ///
    /// A failed save reverts the staged batch, so disk, client and registry
    /// stay in their previous state.
    async fn record_title(
        &self,
        registry: &mut TitleRegistry,
        lock: &RegistryLock,
        codename: &str,
        prior: Option<&TitleEntry>,
        synced: SyncedTitle,
        mut outcome: TitleOutcome,
    ) -> TitleOutcome {
        let SyncedTitle {
            entry,
            staged,
            added_new,
        } = synced;
        let hash = entry.hash.clone();

        let previous = registry.clone();
        let stored = match prior {
            None => registry.insert(codename, entry),
            Some(_) => registry.update(codename, entry),
        };

        if let Err(e) = stored.and_then(|()| registry.save(lock)) {
            *registry = previous;
            error!(
                codename,
                error = %e,
                steps = staged.steps(),
                "Failed to record title, reverting renames"
            );
            let unreverted = self.applier.revert(staged).await;
            if added_new {
                self.discard_torrent(&hash).await;
            }

            let error = if unreverted.is_empty() {
                e.into()
            } else {
                TitleError::PartialRollback {
                    cause: format!("registry error: {}", e),
                    unreverted,
                }
            };
            return outcome.fail(error);
        }

        let applied = self.applier.commit(staged).await;
        outcome.warnings.extend(applied.warnings.iter().cloned());
        outcome.applied = Some(applied);

        self.finish_client_steps(prior, &hash, added_new, &mut outcome)
            .await;

        if let Err(e) = outcome.advance(TitlePhase::Tracked) {
            return outcome.fail(e);
        }
        info!(
            codename,
            operations = outcome.applied.as_ref().map(|a| a.operations()).unwrap_or(0),
            warnings = outcome.warnings.len(),
            "Title tracked"
        );
        outcome
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn note_warning(outcome: &mut TitleOutcome, step: &str, result: Result<(), TorrentClientError>) {
    if let Err(e) = result {
        warn!(codename = %outcome.codename, step, error = %e, "Post-rename step failed");
        outcome.warnings.push(format!("{}: {}", step, e));
    }
}
