//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server wired to its own fake catalog.

use super::constants::*;
use super::fake_catalog::FakeCatalog;
use super::fixtures::{create_test_catalog, CatalogFixture};
use seedwave_server::auth::{SingleSlotTokenCache, TokenProvider, DEFAULT_TOKEN_TTL};
use seedwave_server::catalog::HttpCatalogClient;
use seedwave_server::classifier::HttpClassifierClient;
use seedwave_server::config::{CatalogSettings, ClassifierSettings, EngineSettings, PollerSettings};
use seedwave_server::engine::RecommendationEngine;
use seedwave_server::radio::RadioController;
use seedwave_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Test server instance with its own fake catalog
///
/// When dropped, the server and the fake catalog gracefully shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The fake catalog the server talks to
    pub catalog: FakeCatalog,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a logged-in server backed by the default test catalog
    pub async fn spawn() -> Self {
        Self::spawn_with(create_test_catalog(), true).await
    }

    /// Spawns a server backed by `fixture`
    ///
    /// When `logged_in` is false the token slot starts empty and must be
    /// filled through `PUT /auth/token`.
    ///
    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready
    /// within timeout.
    pub async fn spawn_with(fixture: CatalogFixture, logged_in: bool) -> Self {
        let catalog = FakeCatalog::spawn(fixture).await;

        let tokens: Arc<dyn TokenProvider> = if logged_in {
            Arc::new(SingleSlotTokenCache::with_token(TEST_TOKEN, DEFAULT_TOKEN_TTL))
        } else {
            Arc::new(SingleSlotTokenCache::new())
        };

        let catalog_settings = CatalogSettings {
            base_url: catalog.base_url.clone(),
            timeout_sec: 5,
            min_request_interval_ms: 0,
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        };
        let catalog_client = HttpCatalogClient::new(catalog_settings, tokens.clone())
            .expect("Failed to create catalog client");
        let classifier = HttpClassifierClient::new(&ClassifierSettings {
            base_url: catalog.classifier_url.clone(),
            timeout_sec: 5,
        })
        .expect("Failed to create classifier client");

        let engine = RecommendationEngine::new(
            Arc::new(catalog_client),
            Some(Arc::new(classifier)),
            EngineSettings::default(),
        );
        let radio = RadioController::new(
            Arc::new(engine),
            PollerSettings {
                max_attempts: POLLER_ATTEMPTS,
                delay: Duration::from_millis(5),
            },
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };
        let app = make_app(ServerState::new(config, Arc::new(radio), tokens));

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
