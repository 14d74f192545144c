//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use toloka2media_core::AddRequest;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Parser)]
#[command(
    name = "toloka2media",
    version,
    about = "Tracks anime releases and renames them for media servers"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "TOLOKA2MEDIA_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the configuration file"
    )]
    pub config: PathBuf,

    #[arg(
        long,
        global = true,
        help = "Never prompt; decline overwrites and require --index for adds"
    )]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a release, asking for every value interactively
    AddManual(AddManualArgs),
    /// Add a release from its tracker URL
    Add(AddArgs),
    /// Check every tracked title for updates
    UpdateAll(UpdateAllArgs),
    /// Check one tracked title for updates
    Update(UpdateArgs),
    /// Print the numbers found in a file name, in order
    Num(NumArgs),
}

#[derive(Debug, Args)]
pub struct AddManualArgs {
    #[arg(help = "Tracker URL; asked for when omitted")]
    pub url: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(help = "Tracker URL or release id, e.g. https://toloka.to/t675888")]
    pub url: String,

    #[arg(long, short = 's', help = "Season number")]
    pub season: u32,

    #[arg(
        long,
        short = 'i',
        help = "1-based position of the episode number in file names; asked for when omitted"
    )]
    pub index: Option<usize>,

    #[arg(
        long,
        short = 'c',
        visible_alias = "offset",
        allow_hyphen_values = true,
        help = "Added to every episode number, e.g. -12 for a second cour; 0 when --index is given without it"
    )]
    pub correction: Option<i64>,

    #[arg(long, short = 't', help = "Series name used in composed names")]
    pub title: Option<String>,

    #[arg(long, help = "The release does not carry the full season yet")]
    pub partial: bool,

    #[arg(long, help = "Download dir; defaults to the configured one")]
    pub path: Option<String>,

    #[arg(long, help = "Registry key; derived from the tracker title when omitted")]
    pub codename: Option<String>,

    #[arg(long, help = "Release group; defaults to the uploader")]
    pub release_group: Option<String>,

    #[arg(long, help = "Meta tags, e.g. [WEBRip-1080p][UK]")]
    pub meta: Option<String>,
}

impl AddArgs {
    pub fn into_request(self) -> AddRequest {
        let mut request = AddRequest::new(self.url, self.season).partial_season(self.partial);
        if let Some(index) = self.index {
            request = request.with_episode_index(index);
        }
        if let Some(correction) = self.correction {
            request = request.with_adjustment(correction);
        }
        if let Some(title) = self.title {
            request = request.with_title(title);
        }
        if let Some(path) = self.path {
            request = request.with_download_dir(path);
        }
        if let Some(codename) = self.codename {
            request = request.with_codename(codename);
        }
        if let Some(group) = self.release_group {
            request = request.with_release_group(group);
        }
        if let Some(meta) = self.meta {
            request = request.with_meta(meta);
        }
        request
    }
}

#[derive(Debug, Args)]
pub struct UpdateAllArgs {
    #[arg(long, short = 'f', help = "Re-apply naming even when nothing changed")]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub codename: String,

    #[arg(long, short = 'f', help = "Re-apply naming even when nothing changed")]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct NumArgs {
    pub text: String,
}
