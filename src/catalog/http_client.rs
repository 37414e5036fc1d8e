//! HTTP client for the external music catalog.
//!
//! Every call carries the bearer token from the configured [`TokenProvider`],
//! is spaced by a minimum interval and is retried with exponential backoff
//! when the failure is transient.

use super::models::{AudioFeatures, CatalogTrack, PlaylistId, TrackId};
use super::retry_policy::RetryPolicy;
use super::trait_def::{CatalogClient, CatalogError, MAX_APPEND_BATCH, MAX_FEATURES_BATCH};
use crate::auth::TokenProvider;
use crate::config::CatalogSettings;
use crate::server::metrics::record_catalog_call;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

pub struct HttpCatalogClient {
    client: reqwest::Client,
    settings: CatalogSettings,
    tokens: Arc<dyn TokenProvider>,
    retry_policy: RetryPolicy,
    min_interval: Duration,
    last_request: Mutex<Instant>,
    user_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    tracks: Vec<RecommendedTrack>,
}

#[derive(Deserialize)]
struct RecommendedTrack {
    id: Option<String>,
    uri: Option<String>,
}

#[derive(Deserialize)]
struct AudioFeaturesResponse {
    #[serde(default)]
    audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Deserialize)]
struct PlayerResponse {
    item: Option<PlayerItem>,
}

#[derive(Deserialize)]
struct PlayerItem {
    id: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
}

#[derive(Serialize)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    public: bool,
}

#[derive(Deserialize)]
struct CreatePlaylistResponse {
    id: String,
}

#[derive(Serialize)]
struct AppendTracksBody<'a> {
    uris: &'a [String],
    position: usize,
}

#[derive(Serialize)]
struct StartPlaybackBody<'a> {
    context_uri: &'a str,
}

impl HttpCatalogClient {
    pub fn new(
        settings: CatalogSettings,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()
            .map_err(|e| CatalogError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        let min_interval = Duration::from_millis(settings.min_request_interval_ms);
        let last_request = Instant::now()
            .checked_sub(min_interval)
            .unwrap_or_else(Instant::now);

        let user_id = OnceCell::new_with(settings.user_id.clone());

        Ok(Self {
            client,
            retry_policy: RetryPolicy::new(&settings),
            settings,
            tokens,
            min_interval,
            last_request: Mutex::new(last_request),
            user_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(CatalogError::AuthExpired),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse().ok());
                Err(CatalogError::RateLimited { retry_after_secs })
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(CatalogError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Sends the request produced by `build`, retrying transient failures.
    /// The builder is invoked again for every attempt.
    async fn send<F>(&self, operation: &'static str, build: F) -> Result<reqwest::Response, CatalogError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut retry_count = 0;
        loop {
            let token = self.tokens.access_token().ok_or(CatalogError::AuthExpired)?;
            self.rate_limit().await;

            let result = match build(&self.client).bearer_auth(&token).send().await {
                Ok(response) => Self::check_status(response).await,
                Err(e) => Err(CatalogError::from(e)),
            };

            match result {
                Ok(response) => {
                    record_catalog_call(operation, "ok");
                    return Ok(response);
                }
                Err(err) if self.retry_policy.should_retry(&err, retry_count) => {
                    let delay = self.retry_policy.delay_for(&err, retry_count);
                    warn!(
                        "Catalog {} failed ({}), retrying in {}ms (attempt {}/{})",
                        operation,
                        err,
                        delay.as_millis(),
                        retry_count + 1,
                        self.retry_policy.max_retries
                    );
                    record_catalog_call(operation, "retry");
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(err) => {
                    record_catalog_call(operation, err.as_str());
                    return Err(err);
                }
            }
        }
    }

    async fn current_user_id(&self) -> Result<&str, CatalogError> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                let url = format!("{}/me", self.settings.base_url);
                let response = self.send("me", |c| c.get(&url)).await?;
                let user: UserResponse = response.json().await?;
                debug!("Resolved catalog user id {}", user.id);
                Ok::<_, CatalogError>(user.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_recommendations(
        &self,
        seeds: &[TrackId],
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        if seeds.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/recommendations", self.settings.base_url);
        let seed_tracks = seeds.join(",");
        let limit = self.settings.recommendations_limit.to_string();
        let response = self
            .send("recommendations", |c| {
                c.get(&url).query(&[
                    ("limit", limit.as_str()),
                    ("seed_tracks", seed_tracks.as_str()),
                    ("market", self.settings.market.as_str()),
                ])
            })
            .await?;

        let body: RecommendationsResponse = response.json().await?;
        let tracks = body
            .tracks
            .into_iter()
            .filter_map(|t| {
                let id = t.id.filter(|id| !id.is_empty())?;
                Some(match t.uri {
                    Some(uri) => CatalogTrack { id, uri },
                    None => CatalogTrack::new(id),
                })
            })
            .collect::<Vec<_>>();

        debug!("Catalog returned {} recommendations for {:?}", tracks.len(), seeds);
        Ok(tracks)
    }

    async fn fetch_audio_features(
        &self,
        ids: &[TrackId],
    ) -> Result<Vec<Option<AudioFeatures>>, CatalogError> {
        let mut features = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_FEATURES_BATCH) {
            let url = format!("{}/audio-features", self.settings.base_url);
            let joined = chunk.join(",");
            let response = self
                .send("audio_features", |c| c.get(&url).query(&[("ids", joined.as_str())]))
                .await?;
            let body: AudioFeaturesResponse = response.json().await?;
            if body.audio_features.len() != chunk.len() {
                return Err(CatalogError::InvalidResponse(format!(
                    "Expected {} audio features, got {}",
                    chunk.len(),
                    body.audio_features.len()
                )));
            }
            features.extend(body.audio_features);
        }
        Ok(features)
    }

    async fn fetch_currently_active_item(&self) -> Result<Option<TrackId>, CatalogError> {
        let url = format!("{}/me/player", self.settings.base_url);
        let response = self.send("player", |c| c.get(&url)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body: PlayerResponse = response.json().await?;
        Ok(body.item.and_then(|item| item.id))
    }

    async fn create_playlist(&self, name: &str) -> Result<PlaylistId, CatalogError> {
        let user_id = self.current_user_id().await?;
        let url = format!("{}/users/{}/playlists", self.settings.base_url, user_id);
        let body = CreatePlaylistBody { name, public: true };
        let response = self
            .send("create_playlist", |c| c.post(&url).json(&body))
            .await?;
        let created: CreatePlaylistResponse = response.json().await?;
        debug!("Created playlist {} ({})", created.id, name);
        Ok(created.id)
    }

    async fn append_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: usize,
    ) -> Result<(), CatalogError> {
        let url = format!("{}/playlists/{}/tracks", self.settings.base_url, playlist_id);
        for (i, chunk) in uris.chunks(MAX_APPEND_BATCH).enumerate() {
            let body = AppendTracksBody {
                uris: chunk,
                position: position + i * MAX_APPEND_BATCH,
            };
            self.send("append_tracks", |c| c.post(&url).json(&body))
                .await?;
        }
        Ok(())
    }

    async fn start_playback(&self, context_uri: &str) -> Result<(), CatalogError> {
        let url = format!("{}/me/player/play", self.settings.base_url);
        let body = StartPlaybackBody { context_uri };
        self.send("start_playback", |c| c.put(&url).json(&body))
            .await?;
        debug!("Started playback of {}", context_uri);
        Ok(())
    }
}
