//! Core stream types
//!
//! `StreamConfig` is the persisted, user-authored record; `Stream` is the
//! transient resolution result held in the live working set.

use serde::{Deserialize, Serialize};

/// A stored stream configuration. Identity key is `playlist_url`; the
/// registry never holds two configs with the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// The playlist (or direct stream) URL the user supplied.
    /// Accepts the legacy `m3u` field name on import.
    #[serde(rename = "playlistUrl", alias = "m3u")]
    pub playlist_url: String,
    #[serde(default)]
    pub genre: Option<String>,
}

impl StreamConfig {
    pub fn new(
        name: Option<String>,
        playlist_url: impl Into<String>,
        genre: Option<String>,
    ) -> Self {
        Self {
            name,
            playlist_url: playlist_url.into(),
            genre,
        }
    }
}

/// A resolved stream, rebuilt wholesale on every (re)resolution.
///
/// Invariants: `available` implies `resolved_url` is set; unavailable
/// streams always carry a human-readable `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    /// The playlist URL this stream was resolved from (identity key)
    pub source_playlist_url: String,
    /// The endpoint that actually probed playable
    pub resolved_url: Option<String>,
    pub name: String,
    pub genre: Option<String>,
    pub available: bool,
    pub reason: Option<String>,
}
