//! Canonical torrent, folder and file name construction.

use crate::registry::TitleEntry;

use super::episode::file_name_of;
use super::meta::MetaTags;
use super::tokenizer;

/// Builds the names media servers expect from a tracked title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameComposer {
    dot_spacing: bool,
}

impl NameComposer {
    pub fn new(enable_dot_spacing_in_file_name: bool) -> Self {
        Self {
            dot_spacing: enable_dot_spacing_in_file_name,
        }
    }

    /// Season folder name: `{name} S{ss} {meta}[{group}]`.
    ///
    /// Dot spacing never applies here.
    pub fn folder_name(&self, entry: &TitleEntry) -> String {
        let head = format!("{} S{:02}", entry.torrent_name.trim(), entry.season_number);
        join_tail(head, &tags_with_group(entry))
    }

    /// Display name of the torrent inside the client.
    ///
    /// Full seasons use the folder name. Partial seasons carry the episode
    /// range of the batch (`S01E01-E05`, or `S01E03` for one episode).
    pub fn torrent_name(&self, entry: &TitleEntry, episodes: &[u32]) -> String {
        let range = match (episodes.iter().min(), episodes.iter().max()) {
            (Some(min), Some(max)) if entry.is_partial_season => Some((*min, *max)),
            _ => None,
        };

        match range {
            Some((min, max)) => {
                let episodes = if min == max {
                    format!("E{:02}", min)
                } else {
                    format!("E{:02}-E{:02}", min, max)
                };
                let head = format!(
                    "{} S{:02}{}",
                    entry.torrent_name.trim(),
                    entry.season_number,
                    episodes
                );
                join_tail(head, &tags_with_group(entry))
            }
            None => self.folder_name(entry),
        }
    }

    /// Episode file name: `{name} S{ss}E{ee} {meta}-{group}.{ext}`.
    ///
    /// The extension comes from `source`, never from stored configuration.
    pub fn file_name(&self, entry: &TitleEntry, episode: u32, source: &str) -> String {
        let mut stem = format!(
            "{} S{:02}E{:02}",
            entry.torrent_name.trim(),
            entry.season_number,
            episode
        );

        let meta = MetaTags::parse(&entry.meta).render();
        if !meta.is_empty() {
            stem.push(' ');
            stem.push_str(&meta);
        }

        let group = entry.release_group.trim();
        if !group.is_empty() {
            stem.push('-');
            stem.push_str(group);
        }

        if self.dot_spacing {
            stem = dot_space(&stem);
        }

        match extension_of(source) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }

    /// 1-based index of the episode token inside names built by [`Self::file_name`].
    pub fn episode_index_in_file_name(entry: &TitleEntry) -> usize {
        tokenizer::numbers(entry.torrent_name.trim()).len() + 2
    }
}

fn tags_with_group(entry: &TitleEntry) -> String {
    let mut tail = MetaTags::parse(&entry.meta).render();
    let group = entry.release_group.trim();
    if !group.is_empty() {
        tail.push_str(&format!("[{}]", group));
    }
    tail
}

fn join_tail(head: String, tail: &str) -> String {
    if tail.is_empty() {
        head
    } else {
        format!("{} {}", head, tail)
    }
}

/// Extension of the last path component, without the dot.
pub fn extension_of(path: &str) -> Option<&str> {
    let name = file_name_of(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 < name.len() => Some(&name[idx + 1..]),
        Some(_) => None,
    }
}

/// Replaces whitespace runs outside square brackets with a single dot.
fn dot_space(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0usize;
    let mut pending_gap = false;

    for ch in input.chars() {
        if depth == 0 && ch.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if pending_gap {
            out.push('.');
            pending_gap = false;
        }
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push(ch);
    }

    out
}
