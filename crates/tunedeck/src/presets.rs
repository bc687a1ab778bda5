//! Curated preset collections
//!
//! Presets live on a static host as a manifest listing per-preset JSON
//! files. Fetch problems degrade to an empty or shorter list; installing a
//! preset is just a registry import.

use crate::client::HttpClient;
use crate::error::Result;
use crate::registry::{ImportReport, StreamRegistry};
use crate::resolver::Resolve;
use crate::storage::Storage;
use crate::types::StreamConfig;
use log::warn;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Manifest {
    presets: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct PresetFile {
    name: String,
    streams: Vec<StreamConfig>,
}

/// A curated collection ready to install
#[derive(Debug, Clone)]
pub struct Preset {
    pub filename: String,
    pub name: String,
    pub streams: Vec<StreamConfig>,
}

/// Fetches presets from a manifest-based static host
pub struct PresetLibrary {
    client: HttpClient,
    base_url: String,
}

impl PresetLibrary {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn manifest_url(&self) -> String {
        format!("{}/manifest.json", self.base_url)
    }

    /// Fetch the manifest and every preset it lists. An unreachable
    /// manifest yields an empty list; a bad preset file is skipped.
    pub fn available(&self) -> Vec<Preset> {
        let manifest: Manifest = match self.client.get_json(&self.manifest_url()) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("preset manifest unavailable: {e}");
                return Vec::new();
            }
        };

        let mut presets = Vec::new();
        for entry in manifest.presets {
            let url = format!("{}/{}", self.base_url, entry.filename);
            match self.client.get_json::<PresetFile>(&url) {
                Ok(file) => presets.push(Preset {
                    filename: entry.filename,
                    name: file.name,
                    streams: file.streams,
                }),
                Err(e) => warn!("skipping preset {}: {e}", entry.filename),
            }
        }
        presets
    }

    /// Install a preset into the registry, skipping streams already present
    pub fn install<S: Storage>(
        &self,
        preset: &Preset,
        registry: &mut StreamRegistry<S>,
        resolver: &dyn Resolve,
    ) -> Result<ImportReport> {
        registry.import(preset.streams.clone(), resolver)
    }
}
