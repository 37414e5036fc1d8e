mod file_config;

pub use file_config::{CatalogConfig, ClassifierConfig, EngineConfig, FileConfig, PollerConfig};

use crate::engine::{BandSelection, NoveltyOrder};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::time::Duration;

pub const DEFAULT_CATALOG_URL: &str = "https://api.spotify.com/v1";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub catalog_url: Option<String>,
    pub catalog_timeout_sec: Option<u64>,
    pub classifier_url: Option<String>,
    pub access_token: Option<String>,
    pub suggestion_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub access_token: Option<String>,

    // Feature configs (with defaults)
    pub catalog: CatalogSettings,
    pub classifier: Option<ClassifierSettings>,
    pub engine: EngineSettings,
    pub poller: PollerSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let access_token = file
            .access_token
            .or_else(|| cli.access_token.clone())
            .filter(|t| !t.trim().is_empty());

        // Catalog settings - merge file config with CLI and defaults
        let catalog_file = file.catalog.unwrap_or_default();
        let catalog_defaults = CatalogSettings::default();
        let catalog = CatalogSettings {
            base_url: catalog_file
                .base_url
                .or_else(|| cli.catalog_url.clone())
                .unwrap_or(catalog_defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            timeout_sec: catalog_file
                .timeout_sec
                .or(cli.catalog_timeout_sec)
                .unwrap_or(catalog_defaults.timeout_sec),
            user_id: catalog_file.user_id,
            market: catalog_file.market.unwrap_or(catalog_defaults.market),
            recommendations_limit: catalog_file
                .recommendations_limit
                .unwrap_or(catalog_defaults.recommendations_limit),
            min_request_interval_ms: catalog_file
                .min_request_interval_ms
                .unwrap_or(catalog_defaults.min_request_interval_ms),
            max_retries: catalog_file
                .max_retries
                .unwrap_or(catalog_defaults.max_retries),
            initial_backoff_ms: catalog_file
                .initial_backoff_ms
                .unwrap_or(catalog_defaults.initial_backoff_ms),
            max_backoff_ms: catalog_file
                .max_backoff_ms
                .unwrap_or(catalog_defaults.max_backoff_ms),
            backoff_multiplier: catalog_file
                .backoff_multiplier
                .unwrap_or(catalog_defaults.backoff_multiplier),
        };
        if catalog.recommendations_limit == 0 || catalog.recommendations_limit > 100 {
            bail!(
                "catalog.recommendations_limit must be between 1 and 100, got {}",
                catalog.recommendations_limit
            );
        }
        if catalog.backoff_multiplier < 1.0 {
            bail!("catalog.backoff_multiplier must be >= 1.0");
        }

        // Classifier is only enabled when a URL is configured
        let classifier_file = file.classifier.unwrap_or_default();
        let classifier = classifier_file
            .base_url
            .or_else(|| cli.classifier_url.clone())
            .map(|base_url| ClassifierSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                timeout_sec: classifier_file.timeout_sec.unwrap_or(30),
            });

        let engine_file = file.engine.unwrap_or_default();
        let engine_defaults = EngineSettings::default();
        let diversifier_defaults = DiversifierSettings::default();
        let novelty_order = match engine_file.novelty_order.as_deref() {
            Some(s) => parse_novelty_order(s)?,
            None => diversifier_defaults.novelty_order,
        };
        let band_selection = match engine_file.band_selection.as_deref() {
            Some(s) => parse_band_selection(s)?,
            None => diversifier_defaults.band_selection,
        };
        let engine = EngineSettings {
            default_suggestion_count: engine_file
                .default_suggestion_count
                .or(cli.suggestion_count)
                .unwrap_or(engine_defaults.default_suggestion_count),
            max_suggestion_count: engine_file
                .max_suggestion_count
                .unwrap_or(engine_defaults.max_suggestion_count),
            max_passes: engine_file
                .max_passes
                .unwrap_or(engine_defaults.max_passes),
            thinning_probability: engine_file
                .thinning_probability
                .unwrap_or(engine_defaults.thinning_probability),
            thinning_seed: engine_file.thinning_seed,
            materialize_playlists: engine_file
                .materialize_playlists
                .unwrap_or(engine_defaults.materialize_playlists),
            autoplay_playlists: engine_file
                .autoplay_playlists
                .unwrap_or(engine_defaults.autoplay_playlists),
            diversifier: DiversifierSettings {
                alternate_pool_size: engine_file
                    .alternate_pool_size
                    .unwrap_or(diversifier_defaults.alternate_pool_size),
                novelty_order,
                band_selection,
                band_count: engine_file
                    .band_count
                    .unwrap_or(diversifier_defaults.band_count),
            },
        };
        if engine.max_passes == 0 {
            bail!("engine.max_passes must be at least 1");
        }
        if !(0.0..1.0).contains(&engine.thinning_probability) {
            bail!(
                "engine.thinning_probability must be in [0, 1), got {}",
                engine.thinning_probability
            );
        }
        if engine.default_suggestion_count == 0
            || engine.default_suggestion_count > engine.max_suggestion_count
        {
            bail!(
                "engine.default_suggestion_count must be between 1 and {}",
                engine.max_suggestion_count
            );
        }
        if engine.diversifier.band_count == 0 {
            bail!("engine.band_count must be at least 1");
        }

        let poller_file = file.poller.unwrap_or_default();
        let poller_defaults = PollerSettings::default();
        let poller = PollerSettings {
            max_attempts: poller_file
                .max_attempts
                .unwrap_or(poller_defaults.max_attempts),
            delay: poller_file
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(poller_defaults.delay),
        };
        if poller.max_attempts == 0 {
            bail!("poller.max_attempts must be at least 1");
        }

        Ok(Self {
            port,
            logging_level,
            access_token,
            catalog,
            classifier,
            engine,
            poller,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub timeout_sec: u64,
    /// Owner of created playlists; looked up from the token when absent.
    pub user_id: Option<String>,
    pub market: String,
    pub recommendations_limit: usize,
    pub min_request_interval_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            timeout_sec: 30,
            user_id: None,
            market: "from_token".to_string(),
            recommendations_limit: 100,
            min_request_interval_ms: 50,
            max_retries: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub base_url: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_suggestion_count: usize,
    pub max_suggestion_count: usize,
    /// Upper bound on full round-robin passes over the seeds.
    pub max_passes: u32,
    /// Probability of discarding a candidate before acceptance, 0 disables.
    pub thinning_probability: f64,
    pub thinning_seed: Option<u64>,
    pub materialize_playlists: bool,
    /// Start playing a playlist once its tracks are written.
    pub autoplay_playlists: bool,
    pub diversifier: DiversifierSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_suggestion_count: 30,
            max_suggestion_count: 100,
            max_passes: 6,
            thinning_probability: 0.0,
            thinning_seed: None,
            materialize_playlists: true,
            autoplay_playlists: true,
            diversifier: DiversifierSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiversifierSettings {
    /// How many of the closest baseline candidates are considered as alternate seeds.
    pub alternate_pool_size: usize,
    pub novelty_order: NoveltyOrder,
    pub band_selection: BandSelection,
    pub band_count: usize,
}

impl Default for DiversifierSettings {
    fn default() -> Self {
        Self {
            alternate_pool_size: 30,
            novelty_order: NoveltyOrder::MostNovelFirst,
            band_selection: BandSelection::Decile,
            band_count: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(200),
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

fn parse_novelty_order(s: &str) -> Result<NoveltyOrder> {
    match s.to_lowercase().as_str() {
        "most_novel_first" => Ok(NoveltyOrder::MostNovelFirst),
        "least_novel_first" => Ok(NoveltyOrder::LeastNovelFirst),
        other => bail!("Unknown engine.novelty_order: {}", other),
    }
}

fn parse_band_selection(s: &str) -> Result<BandSelection> {
    match s.to_lowercase().as_str() {
        "decile" => Ok(BandSelection::Decile),
        "single" => Ok(BandSelection::Single),
        other => bail!("Unknown engine.band_selection: {}", other),
    }
}
