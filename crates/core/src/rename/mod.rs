//! Rename engine.
//!
//! [`RenamePlanner`] turns a torrent's file listing into a [`RenameBatch`]
//! and [`RenameApplier`] stages it with journaled rollback, then commits
//! or reverts it.

mod applier;
mod error;
mod planner;
mod types;

pub use applier::{RenameApplier, StagedBatch};
pub use error::RenameError;
pub use planner::{RenamePlanner, ResolvedFile, ResolvedNames};
pub use types::*;
