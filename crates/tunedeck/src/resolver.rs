//! Stream resolution
//!
//! Turns a stored `StreamConfig` into a `Stream` by fetching its playlist,
//! generating candidate URLs for each entry, and probing them in order until
//! one plays. Resolution never fails; an unplayable stream comes back
//! unavailable with a reason.

use crate::candidates::{candidates, proxy_url};
use crate::client::HttpClient;
use crate::config::probe::PROBE_TIMEOUT_MS;
use crate::error::Result;
use crate::playlist::{parse_playlist, PlaylistEntry};
use crate::probe::StreamProber;
use crate::sink::{HttpSinkFactory, SinkFactory};
use crate::types::{Stream, StreamConfig};
use log::{debug, info, warn};
use std::time::Duration;

/// File extensions treated as direct audio; their URLs skip the playlist
/// fetch and go straight to probing.
const DIRECT_AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "aac", "flac", "wav", "ogg", "opus", "m4a"];

/// Fetches playlist bodies and parses them into entries.
///
/// Implementations never fail: any fetch or parse problem yields an empty
/// entry list and the resolver falls back to treating the playlist URL as
/// a direct stream candidate.
pub trait PlaylistSource {
    fn fetch_entries(&self, playlist_url: &str) -> Vec<PlaylistEntry>;
}

impl PlaylistSource for HttpClient {
    fn fetch_entries(&self, playlist_url: &str) -> Vec<PlaylistEntry> {
        // Playlists are fetched through the relay so plain-http playlist
        // hosts work from secure contexts too.
        let response = match self.inner().get(proxy_url(playlist_url)).send() {
            Ok(response) => response,
            Err(e) => {
                debug!("playlist fetch failed for {playlist_url}: {e}");
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            debug!(
                "playlist fetch for {playlist_url} returned HTTP {}",
                response.status()
            );
            return Vec::new();
        }

        // Some "playlist" URLs answer with the audio itself; that is a
        // direct stream, not a parseable body.
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if content_type.contains("audio/") {
            debug!("{playlist_url} served {content_type}, treating as direct stream");
            return Vec::new();
        }

        match response.text() {
            Ok(body) => parse_playlist(&body),
            Err(e) => {
                debug!("playlist body read failed for {playlist_url}: {e}");
                Vec::new()
            }
        }
    }
}

/// Outcome of resolving one config: the rebuilt stream plus any metadata
/// the playlist contributed, which the registry may persist back into the
/// config as a one-time backfill.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub stream: Stream,
    /// Name derived from a playlist title, never from a URL fallback
    pub resolved_name: Option<String>,
    /// Genre parsed out of a vendor-prefixed playlist title
    pub resolved_genre: Option<String>,
}

/// Object-safe resolution seam so the registry can be driven by stubs
pub trait Resolve {
    fn resolve(&self, config: &StreamConfig) -> Resolution;
}

/// Default resolver wiring a playlist source to a prober
pub struct StreamResolver<P: PlaylistSource, F: SinkFactory> {
    playlists: P,
    prober: StreamProber<F>,
    page_is_secure: bool,
    probe_timeout: Duration,
}

impl StreamResolver<HttpClient, HttpSinkFactory> {
    /// Build the production resolver over HTTP
    pub fn over_http(page_is_secure: bool) -> Result<Self> {
        Ok(Self::new(
            HttpClient::for_playlists()?,
            HttpSinkFactory::new()?,
            page_is_secure,
        ))
    }
}

impl<P: PlaylistSource, F: SinkFactory> StreamResolver<P, F> {
    pub fn new(playlists: P, factory: F, page_is_secure: bool) -> Self {
        Self {
            playlists,
            prober: StreamProber::new(factory),
            page_is_secure,
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn entries_for(&self, playlist_url: &str) -> Vec<PlaylistEntry> {
        if is_direct_audio_url(playlist_url) {
            debug!("{playlist_url} looks like direct audio, skipping playlist fetch");
            return vec![PlaylistEntry {
                url: playlist_url.to_string(),
                title: None,
            }];
        }
        let entries = self.playlists.fetch_entries(playlist_url);
        if entries.is_empty() {
            // Unfetchable or empty playlists still get one shot as a
            // direct stream before being declared dead.
            return vec![PlaylistEntry {
                url: playlist_url.to_string(),
                title: None,
            }];
        }
        entries
    }
}

impl<P: PlaylistSource, F: SinkFactory> Resolve for StreamResolver<P, F> {
    fn resolve(&self, config: &StreamConfig) -> Resolution {
        let entries = self.entries_for(&config.playlist_url);

        let mut resolved_url = None;
        let mut playlist_title = None;
        'entries: for entry in &entries {
            for candidate in candidates(&entry.url, self.page_is_secure) {
                if self.prober.probe(&candidate, self.probe_timeout) {
                    resolved_url = Some(candidate);
                    playlist_title = entry.title.clone();
                    break 'entries;
                }
            }
        }

        let mut resolved_name = None;
        let mut resolved_genre = None;
        let mut name = config.name.clone();
        let mut genre = config.genre.clone();

        if name.is_none() {
            if let Some(title) = &playlist_title {
                let (parsed_name, parsed_genre) = split_vendor_title(title, genre.as_deref());
                resolved_name = Some(parsed_name.clone());
                name = Some(parsed_name);
                if let Some(parsed_genre) = parsed_genre {
                    if genre.is_none() {
                        resolved_genre = Some(parsed_genre.clone());
                    }
                    genre = Some(parsed_genre);
                }
            }
        }
        // URL fallback is display-only and never written back
        let name = name.unwrap_or_else(|| config.playlist_url.clone());

        let available = resolved_url.is_some();
        let reason = if available {
            None
        } else {
            Some(format!(
                "No working stream found (playlist: {})",
                config.playlist_url
            ))
        };
        match &resolved_url {
            Some(url) => info!("resolved '{name}' to {url}"),
            None => warn!("no playable candidate for '{name}' ({})", config.playlist_url),
        }

        Resolution {
            stream: Stream {
                source_playlist_url: config.playlist_url.clone(),
                resolved_url,
                name,
                genre,
                available,
                reason,
            },
            resolved_name,
            resolved_genre,
        }
    }
}

/// Whether a URL points straight at an audio file rather than a playlist
fn is_direct_audio_url(url: &str) -> bool {
    let path = url.to_lowercase();
    let path = path.split('?').next().unwrap_or("");
    match path.rsplit_once('.') {
        Some((_, ext)) => DIRECT_AUDIO_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Split a vendor-prefixed playlist title like
/// `(#1 - 15/200) SomaFM: Groove Salad` into a display name and a genre.
///
/// Vendor titles carry at least two colons; the name is everything up to
/// the second colon, the remainder is a genre hint. The hint only replaces
/// a missing or "Unknown" existing genre. Titles without two colons pass
/// through whole.
fn split_vendor_title(title: &str, existing_genre: Option<&str>) -> (String, Option<String>) {
    let mut colon_indices = title.match_indices(':').map(|(i, _)| i);
    let (Some(_), Some(second)) = (colon_indices.next(), colon_indices.next()) else {
        return (title.trim().to_string(), None);
    };

    let name = title[..second].trim().to_string();
    let genre_hint = title[second + 1..].trim();
    let applies = existing_genre.map_or(true, |g| g == "Unknown");
    if !genre_hint.is_empty() && applies {
        (name, Some(genre_hint.to_string()))
    } else {
        (name, None)
    }
}
