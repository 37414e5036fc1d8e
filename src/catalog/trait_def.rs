//! CatalogClient trait definition.
//!
//! This trait abstracts the external music catalog so the recommendation
//! engine can run against the HTTP client in production and against
//! in-process fakes in tests.

use super::models::{AudioFeatures, CatalogTrack, PlaylistId, TrackId};
use async_trait::async_trait;
use thiserror::Error;

/// Maximum number of ids the catalog accepts in a single audio features call.
pub const MAX_FEATURES_BATCH: usize = 100;

/// Maximum number of URIs appended to a playlist in a single call.
pub const MAX_APPEND_BATCH: usize = 100;

/// Errors that can occur when talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not logged in: no valid access token")]
    AuthExpired,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CatalogError {
    /// Returns true if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::AuthExpired | CatalogError::InvalidResponse(_) => false,
            CatalogError::Connection(_) | CatalogError::Timeout => true,
            CatalogError::RateLimited { .. } => true,
            CatalogError::Api { status, .. } => *status >= 500,
        }
    }

    /// Short label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogError::AuthExpired => "auth_expired",
            CatalogError::Connection(_) => "connection",
            CatalogError::Timeout => "timeout",
            CatalogError::RateLimited { .. } => "rate_limited",
            CatalogError::Api { .. } => "api",
            CatalogError::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CatalogError::Timeout
        } else if e.is_decode() {
            CatalogError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            CatalogError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            CatalogError::Connection(e.to_string())
        }
    }
}

/// Operations the recommendation core needs from the external catalog.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Provider-ranked candidate pool for the given seeds.
    async fn fetch_recommendations(
        &self,
        seeds: &[TrackId],
    ) -> Result<Vec<CatalogTrack>, CatalogError>;

    /// Audio features for at most [`MAX_FEATURES_BATCH`] ids. The result is
    /// positionally aligned with `ids`; unknown tracks map to `None`.
    async fn fetch_audio_features(
        &self,
        ids: &[TrackId],
    ) -> Result<Vec<Option<AudioFeatures>>, CatalogError>;

    /// The item currently playing for the logged-in user, if any.
    async fn fetch_currently_active_item(&self) -> Result<Option<TrackId>, CatalogError>;

    /// Create an empty playlist and return its id.
    async fn create_playlist(&self, name: &str) -> Result<PlaylistId, CatalogError>;

    /// Insert `uris` into the playlist starting at `position`.
    async fn append_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: usize,
    ) -> Result<(), CatalogError>;

    /// Start playing `context_uri` (a playlist or album URI) on the user's
    /// active device.
    async fn start_playback(&self, context_uri: &str) -> Result<(), CatalogError>;
}
