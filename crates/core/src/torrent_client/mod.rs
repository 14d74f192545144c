//! Torrent client abstraction.
//!
//! The engine talks to clients only through [`TorrentClient`]; backends
//! (qBittorrent, Transmission) are chosen from configuration.

mod qbittorrent;
mod transmission;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use transmission::TransmissionClient;
pub use types::*;

fn transport_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}
