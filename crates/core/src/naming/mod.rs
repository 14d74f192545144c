//! Episode number extraction and canonical naming.

mod composer;
mod episode;
mod error;
mod meta;
pub mod tokenizer;

pub use composer::{extension_of, NameComposer};
pub use episode::{file_name_of, EpisodeNumberResolver};
pub use error::NamingError;
pub use meta::MetaTags;
pub use tokenizer::NumberContext;
