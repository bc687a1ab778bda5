//! Persistent stream registry
//!
//! Owns the ordered list of stream slots, keeps the stored configs in sync
//! with every mutation, and resolves slots through a `Resolve` seam.
//! Resolution outcomes are broadcast on subscriber channels so hosts can
//! render incrementally.

use crate::error::{Result, StreamError};
use crate::resolver::Resolve;
use crate::storage::Storage;
use crate::types::{Stream, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Storage key for the persisted stream configs
const USER_STREAMS_KEY: &str = "userStreams";

/// Storage key for the one-time builtin seeding flag
const BUILTINS_SEEDED_KEY: &str = "builtinStreamsInitialized";

/// Starter streams seeded exactly once into an empty install
const BUILTIN_STREAMS: [(&str, &str, &str); 2] = [
    (
        "Sleepbot Environmental Broadcast",
        "http://sleepbot.com/ambience/cgi/listen.m3u",
        "Ambient",
    ),
    (
        "Jungletrain.net",
        "https://jungletrain.net/static/256kbps.m3u",
        "Jungle/Drum & Bass",
    ),
];

/// One registry position: the stored config plus its latest resolution,
/// if any. `resolved` is None until the slot has been resolved.
#[derive(Debug, Clone)]
pub struct StreamSlot {
    pub config: StreamConfig,
    pub resolved: Option<Stream>,
}

/// Counts from a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
}

/// A named, exportable set of stream configs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "savedAt", skip_serializing_if = "Option::is_none", default)]
    pub saved_at: Option<String>,
    pub streams: Vec<StreamConfig>,
}

/// Registry notifications delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A slot finished resolving (either outcome)
    StreamResolved { index: usize, stream: Stream },
    /// All resolved state was discarded
    Cleared,
}

/// The stream registry. Mutations persist immediately; resolution is
/// explicit and sequential.
pub struct StreamRegistry<S: Storage> {
    storage: S,
    slots: Vec<StreamSlot>,
    initialized: bool,
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl<S: Storage> StreamRegistry<S> {
    /// Load the registry from storage. Slots start unresolved.
    pub fn open(storage: S) -> Self {
        let configs: Vec<StreamConfig> = storage.get_json(USER_STREAMS_KEY, Vec::new());
        let slots = configs
            .into_iter()
            .map(|config| StreamSlot {
                config,
                resolved: None,
            })
            .collect();
        Self {
            storage,
            slots,
            initialized: false,
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to registry events. Dropped receivers are pruned lazily.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn slots(&self) -> &[StreamSlot] {
        &self.slots
    }

    /// Resolved streams in registry order, skipping unresolved slots
    pub fn streams(&self) -> Vec<&Stream> {
        self.slots
            .iter()
            .filter_map(|slot| slot.resolved.as_ref())
            .collect()
    }

    pub fn configs(&self) -> Vec<StreamConfig> {
        self.slots.iter().map(|slot| slot.config.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn persist(&self) -> Result<()> {
        self.storage.set_json(USER_STREAMS_KEY, &self.configs())
    }

    pub fn contains_url(&self, playlist_url: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.config.playlist_url == playlist_url)
    }

    /// Add a stream. Returns Ok(false) when the URL is already present.
    /// When the registry has been initialized, the new slot is resolved
    /// immediately; otherwise it waits for `initialize_all`.
    pub fn add(
        &mut self,
        name: Option<String>,
        playlist_url: &str,
        genre: Option<String>,
        resolver: &dyn Resolve,
    ) -> Result<bool> {
        let playlist_url = playlist_url.trim();
        if !playlist_url.starts_with("http://") && !playlist_url.starts_with("https://") {
            return Err(StreamError::Validation(format!(
                "Stream URL must start with http:// or https:// (got '{playlist_url}')"
            )));
        }
        if self.contains_url(playlist_url) {
            info!("stream already present: {playlist_url}");
            return Ok(false);
        }

        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let genre = genre.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());
        self.slots.push(StreamSlot {
            config: StreamConfig::new(name, playlist_url, genre),
            resolved: None,
        });
        self.persist()?;

        if self.initialized {
            self.resolve_slot(self.slots.len() - 1, resolver)?;
        }
        Ok(true)
    }

    /// Resolve one slot and broadcast the outcome. Playlist-derived name
    /// and genre are written back into the config once, so later sessions
    /// skip the lookup.
    pub fn resolve_slot(&mut self, index: usize, resolver: &dyn Resolve) -> Result<()> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(StreamError::Validation(format!(
                "No stream at index {index}"
            )));
        };
        let resolution = resolver.resolve(&slot.config);

        let mut dirty = false;
        if slot.config.name.is_none() {
            if let Some(resolved_name) = resolution.resolved_name {
                slot.config.name = Some(resolved_name);
                dirty = true;
            }
        }
        if slot.config.genre.is_none() {
            if let Some(resolved_genre) = resolution.resolved_genre {
                slot.config.genre = Some(resolved_genre);
                dirty = true;
            }
        }
        let stream = resolution.stream;
        slot.resolved = Some(stream.clone());

        if dirty {
            self.persist()?;
        }
        self.emit(RegistryEvent::StreamResolved { index, stream });
        Ok(())
    }

    /// Remove the slot at `index`, returning its config
    pub fn remove(&mut self, index: usize) -> Result<StreamConfig> {
        if index >= self.slots.len() {
            return Err(StreamError::Validation(format!(
                "No stream at index {index}"
            )));
        }
        let slot = self.slots.remove(index);
        self.persist()?;
        Ok(slot.config)
    }

    /// Move the slot at `from` so it lands at `to`, shifting the others
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.slots.len() || to >= self.slots.len() {
            return Err(StreamError::Validation(format!(
                "Reorder out of range: {from} -> {to} with {} streams",
                self.slots.len()
            )));
        }
        if from != to {
            let slot = self.slots.remove(from);
            self.slots.insert(to, slot);
            self.persist()?;
        }
        Ok(())
    }

    /// Update the stored name and genre of a slot. An empty string clears
    /// the field; None leaves it untouched.
    pub fn update(&mut self, index: usize, name: Option<&str>, genre: Option<&str>) -> Result<()> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(StreamError::Validation(format!(
                "No stream at index {index}"
            )));
        };
        if let Some(name) = name {
            let name = name.trim();
            slot.config.name = (!name.is_empty()).then(|| name.to_string());
        }
        if let Some(genre) = genre {
            let genre = genre.trim();
            slot.config.genre = (!genre.is_empty()).then(|| genre.to_string());
        }
        if let Some(stream) = &mut slot.resolved {
            if let Some(name) = &slot.config.name {
                stream.name = name.clone();
            }
            stream.genre = slot.config.genre.clone();
        }
        self.persist()
    }

    /// Resolve every slot in order. Idempotent: a second call is a no-op
    /// until `reset`. Existing resolved state is discarded first.
    pub fn initialize_all(&mut self, resolver: &dyn Resolve) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        for slot in &mut self.slots {
            slot.resolved = None;
        }
        for index in 0..self.slots.len() {
            self.resolve_slot(index, resolver)?;
        }
        Ok(())
    }

    /// Drop all resolved state so the next `initialize_all` re-resolves
    pub fn reset(&mut self) {
        self.initialized = false;
        for slot in &mut self.slots {
            slot.resolved = None;
        }
        self.emit(RegistryEvent::Cleared);
    }

    /// Add a batch of configs, skipping duplicates and failures
    pub fn import(
        &mut self,
        configs: Vec<StreamConfig>,
        resolver: &dyn Resolve,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for config in configs {
            match self.add(config.name, &config.playlist_url, config.genre, resolver) {
                Ok(true) => report.added += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!("skipping import of '{}': {e}", config.playlist_url);
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }

    /// Snapshot the registry as a named collection
    pub fn export(&self, name: &str) -> Collection {
        Collection {
            name: name.to_string(),
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            streams: self.configs(),
        }
    }

    /// Import a collection from its JSON text. A malformed document leaves
    /// the registry untouched.
    pub fn import_collection_json(
        &mut self,
        text: &str,
        resolver: &dyn Resolve,
    ) -> Result<ImportReport> {
        let collection = parse_collection(text)?;
        info!(
            "importing collection '{}' ({} streams)",
            collection.name,
            collection.streams.len()
        );
        self.import(collection.streams, resolver)
    }

    /// Remove every stream
    pub fn clear_all(&mut self) -> Result<()> {
        self.slots.clear();
        self.persist()?;
        self.emit(RegistryEvent::Cleared);
        Ok(())
    }

    /// Seed the builtin streams once per install, guarded by a stored flag
    /// so a user who deletes them is not fought.
    pub fn seed_builtins(&mut self, resolver: &dyn Resolve) -> Result<()> {
        if self.storage.get_bool(BUILTINS_SEEDED_KEY, false) {
            return Ok(());
        }
        for (name, url, genre) in BUILTIN_STREAMS {
            self.add(Some(name.to_string()), url, Some(genre.to_string()), resolver)?;
        }
        self.storage.set_bool(BUILTINS_SEEDED_KEY, true)
    }
}

/// Parse collection JSON, requiring a `streams` array. Other problems in
/// individual entries surface as serde errors too; nothing is partially
/// applied.
pub fn parse_collection(text: &str) -> Result<Collection> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| StreamError::Format(format!("not valid JSON: {e}")))?;
    match value.get("streams") {
        Some(streams) if streams.is_array() => {}
        Some(_) => {
            return Err(StreamError::Format("'streams' must be an array".to_string()));
        }
        None => {
            return Err(StreamError::Format("missing 'streams' array".to_string()));
        }
    }
    serde_json::from_value(value).map_err(|e| StreamError::Format(e.to_string()))
}
