//! Persistent registry of tracked titles.
//!
//! Titles live in a TOML file keyed by codename. Writers serialize through
//! [`RegistryLock`]; saves replace the file atomically.

mod error;
mod lock;
mod store;
mod types;

pub use error::RegistryError;
pub use lock::{lock_path, RegistryLock};
pub use store::TitleRegistry;
pub use types::{codename_base, default_title, suggest_codename, TitleEntry};
