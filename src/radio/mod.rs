//! Radio controller: turns a suggestion run into a playlist.
//!
//! Without explicit seeds the currently playing track is used as the only
//! seed. Results are written to a freshly created playlist which then starts
//! playing; a failure while doing so is logged and does not affect the
//! returned suggestions.

use crate::catalog::{PlaylistId, TrackId};
use crate::config::PollerSettings;
use crate::engine::{
    BoundedPoller, ClassifierAssist, RecommendationEngine, RecommendationError, SuggestionOutcome,
    SuggestionRequest,
};
use crate::server::metrics::record_playlist_materialized;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Suggestions together with the playlist they were written to.
#[derive(Debug, Clone)]
pub struct RadioOutcome {
    pub suggestions: SuggestionOutcome,
    pub playlist_id: Option<PlaylistId>,
    pub playlist_name: String,
}

pub struct RadioController {
    engine: Arc<RecommendationEngine>,
    poller: PollerSettings,
    session_id: u64,
}

impl RadioController {
    pub fn new(engine: Arc<RecommendationEngine>, poller: PollerSettings) -> Self {
        Self::with_session_id(engine, poller, rand::random())
    }

    pub fn with_session_id(
        engine: Arc<RecommendationEngine>,
        poller: PollerSettings,
        session_id: u64,
    ) -> Self {
        Self {
            engine,
            poller,
            session_id,
        }
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    /// The currently playing track.
    pub async fn current_track(&self) -> Result<TrackId, RecommendationError> {
        let poller = BoundedPoller::new(self.engine.catalog(), &self.poller);
        poller
            .poll_current_item()
            .await?
            .ok_or(RecommendationError::NoActiveTrack)
    }

    /// Runs the engine for `request` and materializes the result.
    ///
    /// An empty seed list is replaced by the currently playing track.
    pub async fn poll_suggestions(
        &self,
        mut request: SuggestionRequest,
        radio_name: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<RadioOutcome, RecommendationError> {
        if request.seeds.is_empty() {
            let seed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RecommendationError::Cancelled),
                seed = self.current_track() => seed?,
            };
            info!("No seeds supplied, using active track {}", seed);
            request.seeds = vec![seed];
        }

        let playlist_name = radio_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.default_playlist_name(&request.seeds));

        let suggestions = self.engine.quick_suggestions(&request, cancel).await?;

        let playlist_id = if self.engine.settings().materialize_playlists
            && !suggestions.tracks.is_empty()
            && !cancel.is_cancelled()
        {
            self.materialize(&playlist_name, &suggestions).await
        } else {
            None
        };

        Ok(RadioOutcome {
            suggestions,
            playlist_id,
            playlist_name,
        })
    }

    /// Labels the currently playing track and returns its id.
    pub async fn label_current_track(&self, label: i64) -> Result<TrackId, RecommendationError> {
        let Some(classifier) = self.engine.classifier() else {
            return Err(RecommendationError::UpstreamUnavailable(
                "no classifier configured".to_string(),
            ));
        };
        let track = self.current_track().await?;
        let assist = ClassifierAssist::new(self.engine.catalog(), classifier);
        match assist.record_label(&track, label).await {
            Ok(()) => {
                info!("Labelled {} as {}", track, label);
                Ok(track)
            }
            Err(RecommendationError::IncompleteFeatureData(id)) => Err(
                RecommendationError::UpstreamUnavailable(format!("no feature data for {}", id)),
            ),
            Err(err) => Err(err),
        }
    }

    /// First three characters of every seed plus a per-session suffix.
    fn default_playlist_name(&self, seeds: &[TrackId]) -> String {
        let prefixes = seeds
            .iter()
            .map(|s| s.chars().take(3).collect::<String>())
            .collect::<Vec<_>>();
        format!("{} #{}", prefixes.join(", "), self.session_id % 100_000)
    }

    async fn materialize(&self, name: &str, suggestions: &SuggestionOutcome) -> Option<PlaylistId> {
        let catalog = self.engine.catalog();
        let playlist_id = match catalog.create_playlist(name).await {
            Ok(id) => id,
            Err(err) => {
                warn!("Could not create playlist {}: {}", name, err);
                record_playlist_materialized("create_failed");
                return None;
            }
        };

        let uris = suggestions
            .tracks
            .iter()
            .map(|t| t.uri.clone())
            .collect::<Vec<_>>();
        if let Err(err) = catalog.append_tracks(&playlist_id, &uris, 0).await {
            warn!("Could not add tracks to playlist {}: {}", playlist_id, err);
            record_playlist_materialized("append_failed");
            return Some(playlist_id);
        }

        info!(
            "Wrote {} tracks to playlist {} ({})",
            uris.len(),
            playlist_id,
            name
        );

        if self.engine.settings().autoplay_playlists {
            let context_uri = playlist_context_uri(&playlist_id);
            if let Err(err) = catalog.start_playback(&context_uri).await {
                warn!("Could not start playback of {}: {}", context_uri, err);
                record_playlist_materialized("playback_failed");
                return Some(playlist_id);
            }
        }

        record_playlist_materialized("ok");
        Some(playlist_id)
    }
}

fn playlist_context_uri(playlist_id: &str) -> String {
    format!("spotify:playlist:{}", playlist_id)
}
