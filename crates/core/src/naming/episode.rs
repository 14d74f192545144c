//! Episode number resolution from arbitrary file names.

use super::error::NamingError;
use super::tokenizer;

/// Picks the configured digit run from a file name and applies the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeNumberResolver {
    /// 1-based position of the episode among the numeric tokens.
    pub episode_index: usize,
    /// Signed correction added to the raw number.
    pub adjustment: i64,
}

impl EpisodeNumberResolver {
    pub fn new(episode_index: usize, adjustment: i64) -> Self {
        Self {
            episode_index,
            adjustment,
        }
    }

    /// Resolves the final episode number for `path`.
    ///
    /// Only the last path component is tokenized, so folder names never
    /// shift the index.
    pub fn resolve(&self, path: &str) -> Result<u32, NamingError> {
        if self.episode_index == 0 {
            return Err(NamingError::InvalidIndex);
        }

        let file_name = file_name_of(path);
        let numbers = tokenizer::numbers(file_name);

        let token = numbers
            .get(self.episode_index - 1)
            .ok_or_else(|| NamingError::MissingToken {
                file_name: file_name.to_string(),
                index: self.episode_index,
                found: numbers.len(),
            })?;

        let raw: u64 = token.parse().map_err(|_| NamingError::Overflow {
            file_name: file_name.to_string(),
            token: token.to_string(),
        })?;

        let adjusted = i64::try_from(raw)
            .ok()
            .and_then(|r| r.checked_add(self.adjustment))
            .ok_or_else(|| NamingError::Overflow {
                file_name: file_name.to_string(),
                token: token.to_string(),
            })?;

        if adjusted < 0 {
            return Err(NamingError::NegativeEpisode {
                file_name: file_name.to_string(),
                raw,
                adjustment: self.adjustment,
            });
        }

        u32::try_from(adjusted).map_err(|_| NamingError::Overflow {
            file_name: file_name.to_string(),
            token: token.to_string(),
        })
    }
}

/// Returns the component after the last `/` or `\`.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
