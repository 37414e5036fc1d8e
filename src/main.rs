use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use seedwave_server::auth::{SingleSlotTokenCache, TokenProvider, DEFAULT_TOKEN_TTL};
use seedwave_server::catalog::{CatalogClient, HttpCatalogClient};
use seedwave_server::classifier::{Classifier, HttpClassifierClient};
use seedwave_server::config::{AppConfig, CliConfig, FileConfig};
use seedwave_server::engine::RecommendationEngine;
use seedwave_server::radio::RadioController;
use seedwave_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 6001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Base URL of the music catalog Web API.
    #[clap(long)]
    pub catalog_url: Option<String>,

    /// Timeout in seconds for catalog requests.
    #[clap(long)]
    pub catalog_timeout_sec: Option<u64>,

    /// URL of the track classifier service. Classifier-assisted radios are
    /// disabled when not set.
    #[clap(long)]
    pub classifier_url: Option<String>,

    /// Initial catalog access token. Can be replaced at runtime via
    /// `PUT /auth/token`.
    #[clap(long)]
    pub access_token: Option<String>,

    /// Number of suggestions returned when a request does not ask for a
    /// specific count.
    #[clap(long)]
    pub suggestion_count: Option<usize>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            port: args.port,
            logging_level: args.logging_level.clone(),
            catalog_url: args.catalog_url.clone(),
            catalog_timeout_sec: args.catalog_timeout_sec,
            classifier_url: args.classifier_url.clone(),
            access_token: args.access_token.clone(),
            suggestion_count: args.suggestion_count,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let tokens: Arc<dyn TokenProvider> = match &app_config.access_token {
        Some(token) => Arc::new(SingleSlotTokenCache::with_token(
            token.clone(),
            DEFAULT_TOKEN_TTL,
        )),
        None => {
            info!("No access token configured, waiting for PUT /auth/token");
            Arc::new(SingleSlotTokenCache::new())
        }
    };

    info!("Catalog API at {}", app_config.catalog.base_url);
    let catalog: Arc<dyn CatalogClient> = Arc::new(
        HttpCatalogClient::new(app_config.catalog.clone(), tokens.clone())
            .context("Failed to create catalog client")?,
    );

    let classifier: Option<Arc<dyn Classifier>> = match &app_config.classifier {
        Some(settings) => {
            info!("Classifier service configured at {}", settings.base_url);
            Some(Arc::new(
                HttpClassifierClient::new(settings)
                    .context("Failed to create classifier client")?,
            ))
        }
        None => None,
    };

    let engine = Arc::new(RecommendationEngine::new(
        catalog,
        classifier,
        app_config.engine.clone(),
    ));
    let radio = Arc::new(RadioController::new(engine, app_config.poller.clone()));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        default_suggestion_count: app_config.engine.default_suggestion_count,
        max_suggestion_count: app_config.engine.max_suggestion_count,
    };
    let state = ServerState::new(server_config, radio, tokens);

    info!("Ready to serve at port {}!", app_config.port);
    run_server(state).await
}
