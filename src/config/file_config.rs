use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub access_token: Option<String>,

    // Feature configs
    pub catalog: Option<CatalogConfig>,
    pub classifier: Option<ClassifierConfig>,
    pub engine: Option<EngineConfig>,
    pub poller: Option<PollerConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub timeout_sec: Option<u64>,
    pub user_id: Option<String>,
    pub market: Option<String>,
    pub recommendations_limit: Option<usize>,
    pub min_request_interval_ms: Option<u64>,
    // Retry settings
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub default_suggestion_count: Option<usize>,
    pub max_suggestion_count: Option<usize>,
    pub max_passes: Option<u32>,
    pub thinning_probability: Option<f64>,
    pub thinning_seed: Option<u64>,
    pub materialize_playlists: Option<bool>,
    pub autoplay_playlists: Option<bool>,
    // Seed diversification
    pub alternate_pool_size: Option<usize>,
    /// "most_novel_first" or "least_novel_first"
    pub novelty_order: Option<String>,
    /// "decile" or "single"
    pub band_selection: Option<String>,
    pub band_count: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PollerConfig {
    pub max_attempts: Option<u32>,
    pub delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
