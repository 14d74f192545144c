//! Rename orchestrator.
//!
//! Runs add and update flows for tracked titles:
//! - **Observe**: concurrent tracker requests, no shared state
//! - **Rename**: sequential client and filesystem writes, journaled
//! - **Record**: registry saved under the advisory lock after each title

mod config;
mod prompt;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use prompt::{AutoPrompt, OperatorPrompt};
pub use runner::RenameOrchestrator;
pub use types::{AddRequest, PhaseError, RunReport, TitleError, TitleOutcome, TitlePhase};
