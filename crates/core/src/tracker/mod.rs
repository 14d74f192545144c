//! Tracker abstraction.
//!
//! A [`Tracker`] reports the currently published version of a release. The
//! update detector compares that snapshot with the registry.

mod http;
mod types;

pub use http::HttpTracker;
pub use types::*;
