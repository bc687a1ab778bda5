//! Playlist parsing (M3U/PLS)
//!
//! Pure text-to-entries parsing. Malformed lines and out-of-range indices
//! are skipped, never fatal; a fetch that fails upstream simply hands the
//! resolver an empty entry list.

use crate::config::playlist::MAX_ENTRIES;
use std::collections::BTreeMap;

/// One playlist entry: a candidate stream URL and its optional title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub url: String,
    pub title: Option<String>,
}

/// Schemes accepted for entry URLs; anything else is junk, not an entry
const URL_SCHEMES: [&str; 4] = ["http://", "https://", "mms://", "rtmp://"];

/// Dispatch on format: PLS bodies start with `[playlist]`, everything else
/// is treated as M3U (plain URL lists are valid M3U).
pub fn parse_playlist(text: &str) -> Vec<PlaylistEntry> {
    if text.trim().to_lowercase().starts_with("[playlist]") {
        parse_pls(text)
    } else {
        parse_m3u(text)
    }
}

/// Parse an extended-M3U body.
///
/// An `#EXTINF:` line captures the text after its first comma as a pending
/// title; the next URL line becomes an entry and consumes that title, so a
/// title followed by two URLs names only the first.
pub fn parse_m3u(text: &str) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let mut pending_title: Option<String> = None;

    for line in text.lines() {
        if entries.len() >= MAX_ENTRIES {
            break;
        }
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some((_, title)) = rest.split_once(',') {
                pending_title = Some(title.trim().to_string());
            }
        } else if !line.is_empty()
            && !line.starts_with('#')
            && URL_SCHEMES.iter().any(|scheme| line.starts_with(scheme))
        {
            entries.push(PlaylistEntry {
                url: line.to_string(),
                title: pending_title.take(),
            });
        }
    }
    entries
}

/// Parse a PLS body.
///
/// Collects `FileN=` and `TitleN=` pairs (case-insensitive keys) and emits
/// entries in ascending numeric N, whatever order the lines appeared in.
pub fn parse_pls(text: &str) -> Vec<PlaylistEntry> {
    let mut files: BTreeMap<u32, String> = BTreeMap::new();
    let mut titles: BTreeMap<u32, String> = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some((index, value)) = indexed_value(line, "file") {
            if files.len() < MAX_ENTRIES {
                files.insert(index, value);
            }
        } else if let Some((index, value)) = indexed_value(line, "title") {
            titles.insert(index, value);
        }
    }

    files
        .into_iter()
        .map(|(index, url)| PlaylistEntry {
            url,
            title: titles.remove(&index),
        })
        .collect()
}

/// Match `KeyN=value` lines: case-insensitive key, numeric index, non-empty
/// value. Returns None for anything malformed.
fn indexed_value(line: &str, key: &str) -> Option<(u32, String)> {
    let (lhs, rhs) = line.split_once('=')?;
    let lhs = lhs.trim();
    if lhs.len() <= key.len() || !lhs[..key.len()].eq_ignore_ascii_case(key) {
        return None;
    }
    let index: u32 = lhs[key.len()..].parse().ok()?;
    let value = rhs.trim();
    if value.is_empty() {
        return None;
    }
    Some((index, value.to_string()))
}
