use axum::extract::FromRef;

use crate::auth::TokenProvider;
use crate::radio::RadioController;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ServerConfig;

pub type GuardedRadioController = Arc<RadioController>;
pub type GuardedTokenProvider = Arc<dyn TokenProvider>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub radio: GuardedRadioController,
    pub tokens: GuardedTokenProvider,
    pub version: String,
    /// Cancelled on shutdown; every request runs under a child token.
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        radio: GuardedRadioController,
        tokens: GuardedTokenProvider,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            radio,
            tokens,
            version: env!("CARGO_PKG_VERSION").to_owned(),
            shutdown: CancellationToken::new(),
        }
    }
}

impl FromRef<ServerState> for GuardedRadioController {
    fn from_ref(input: &ServerState) -> Self {
        input.radio.clone()
    }
}

impl FromRef<ServerState> for GuardedTokenProvider {
    fn from_ref(input: &ServerState) -> Self {
        input.tokens.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
