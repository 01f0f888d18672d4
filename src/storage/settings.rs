//! Gateway settings
//!
//! Server address, defaults for load and generation requests, and models to
//! load at startup. Stored as JSON in the platform config directory.

use crate::inference::engine::{SamplingParams, ALL_GPU_LAYERS};
use crate::storage::{get_config_dir, StorageError};
use crate::types::requests::LoadModelRequest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Defaults applied to load requests that omit a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadDefaults {
    pub n_ctx: u32,
    pub n_parts: i32,
    pub seed: u32,
    pub f16_kv: bool,
    pub n_gpu_layers: i32,
}

impl Default for LoadDefaults {
    fn default() -> Self {
        Self {
            n_ctx: 1024,
            n_parts: -1,
            seed: 42,
            f16_kv: false,
            n_gpu_layers: ALL_GPU_LAYERS,
        }
    }
}

/// Gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Address the HTTP server binds to
    pub host: String,
    /// TCP port of the HTTP server
    pub port: u16,
    pub load_defaults: LoadDefaults,
    pub generation_defaults: SamplingParams,
    /// Models loaded at startup
    pub preload: Vec<LoadModelRequest>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            load_defaults: LoadDefaults::default(),
            generation_defaults: SamplingParams::default(),
            preload: Vec::new(),
        }
    }
}

impl GatewaySettings {
    /// Validate settings values
    ///
    /// Replaces values no request could legally use with their defaults
    pub fn validate(&mut self) {
        let load = LoadDefaults::default();
        if self.load_defaults.n_ctx == 0 {
            self.load_defaults.n_ctx = load.n_ctx;
        }

        let generation = SamplingParams::default();
        let defaults = &mut self.generation_defaults;
        if defaults.max_tokens == 0 {
            defaults.max_tokens = generation.max_tokens;
        }
        if !defaults.temperature.is_finite() || defaults.temperature < 0.0 {
            defaults.temperature = generation.temperature;
        }
        if !defaults.top_p.is_finite() {
            defaults.top_p = generation.top_p;
        }
        defaults.top_p = defaults.top_p.clamp(0.0, 1.0);

        if self.host.trim().is_empty() {
            self.host = Self::default().host;
        }
    }
}

/// Get the default settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_config_dir()?.join("settings.json"))
}

/// Load settings from the default location
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> GatewaySettings {
    let loaded = get_settings_path().and_then(|path| {
        if path.exists() {
            load_settings_from(&path)
        } else {
            tracing::info!("Settings file not found, using defaults");
            Ok(GatewaySettings::default())
        }
    });

    match loaded {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            GatewaySettings::default()
        }
    }
}

/// Load settings from an explicit path, propagating any error
pub fn load_settings_from(path: &Path) -> Result<GatewaySettings, StorageError> {
    let json = fs::read_to_string(path)?;
    let mut settings: GatewaySettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Save settings to `path`
pub fn save_settings(settings: &GatewaySettings, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {}", path.display());
    Ok(())
}
