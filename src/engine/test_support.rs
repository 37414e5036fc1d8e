//! In-process catalog and classifier fakes shared by the engine and radio
//! unit tests.

use crate::catalog::{
    AudioFeatures, CatalogClient, CatalogError, CatalogTrack, FeatureTuple, PlaylistId, TrackId,
};
use crate::classifier::{Classifier, ClassifierError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn features(id: &str, d: f64, e: f64, v: f64, a: f64) -> AudioFeatures {
    AudioFeatures {
        id: id.to_string(),
        uri: Some(format!("spotify:track:{}", id)),
        danceability: Some(d),
        energy: Some(e),
        valence: Some(v),
        acousticness: Some(a),
        speechiness: Some(0.05),
    }
}

/// Features with the same value in every core dimension.
pub fn flat_features(id: &str, value: f64) -> AudioFeatures {
    features(id, value, value, value, value)
}

#[derive(Default)]
pub struct FakeCatalog {
    pools: HashMap<TrackId, Vec<TrackId>>,
    features: HashMap<TrackId, AudioFeatures>,
    failing_pools: HashSet<TrackId>,
    active_item: Option<TrackId>,
    /// Number of upcoming feature calls that fail with a timeout.
    feature_failures: Mutex<usize>,
    pub fail_playlists: bool,
    pub fail_playback: bool,
    pub expired: bool,
    pub recommendation_calls: Mutex<Vec<Vec<TrackId>>>,
    pub feature_calls: Mutex<usize>,
    pub playlists: Mutex<Vec<String>>,
    pub appended: Mutex<Vec<(PlaylistId, Vec<String>, usize)>>,
    pub played: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, seed: &str, ids: Vec<TrackId>) -> Self {
        self.pools.insert(seed.to_string(), ids);
        self
    }

    pub fn with_features(mut self, record: AudioFeatures) -> Self {
        self.features.insert(record.id.clone(), record);
        self
    }

    pub fn with_failing_pool(mut self, seed: &str) -> Self {
        self.failing_pools.insert(seed.to_string());
        self
    }

    pub fn with_active_item(mut self, id: &str) -> Self {
        self.active_item = Some(id.to_string());
        self
    }

    pub fn with_feature_failures(self, count: usize) -> Self {
        *self.feature_failures.lock().unwrap() = count;
        self
    }

    pub fn recommendation_call_count(&self) -> usize {
        self.recommendation_calls.lock().unwrap().len()
    }

    pub fn feature_call_count(&self) -> usize {
        *self.feature_calls.lock().unwrap()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_recommendations(
        &self,
        seeds: &[TrackId],
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        if self.expired {
            return Err(CatalogError::AuthExpired);
        }
        self.recommendation_calls.lock().unwrap().push(seeds.to_vec());
        let key = seeds.join(",");
        if self.failing_pools.contains(&key) {
            return Err(CatalogError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self
            .pools
            .get(&key)
            .map(|ids| ids.iter().map(CatalogTrack::new).collect())
            .unwrap_or_default())
    }

    async fn fetch_audio_features(
        &self,
        ids: &[TrackId],
    ) -> Result<Vec<Option<AudioFeatures>>, CatalogError> {
        if self.expired {
            return Err(CatalogError::AuthExpired);
        }
        *self.feature_calls.lock().unwrap() += 1;
        {
            let mut failures = self.feature_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(CatalogError::Timeout);
            }
        }
        Ok(ids.iter().map(|id| self.features.get(id).cloned()).collect())
    }

    async fn fetch_currently_active_item(&self) -> Result<Option<TrackId>, CatalogError> {
        if self.expired {
            return Err(CatalogError::AuthExpired);
        }
        Ok(self.active_item.clone())
    }

    async fn create_playlist(&self, name: &str) -> Result<PlaylistId, CatalogError> {
        if self.fail_playlists {
            return Err(CatalogError::Api {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        let mut playlists = self.playlists.lock().unwrap();
        playlists.push(name.to_string());
        Ok(format!("playlist-{}", playlists.len()))
    }

    async fn append_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: usize,
    ) -> Result<(), CatalogError> {
        self.appended
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), uris.to_vec(), position));
        Ok(())
    }

    async fn start_playback(&self, context_uri: &str) -> Result<(), CatalogError> {
        if self.fail_playback {
            return Err(CatalogError::Api {
                status: 404,
                message: "no active device".to_string(),
            });
        }
        self.played.lock().unwrap().push(context_uri.to_string());
        Ok(())
    }
}

/// Keeps tuples whose danceability is at least `label / 10`, most danceable
/// first, and records labelled examples.
#[derive(Default)]
pub struct ThresholdClassifier {
    pub failing: bool,
    pub calls: Mutex<usize>,
    pub labelled: Mutex<Vec<(TrackId, i64)>>,
}

#[async_trait]
impl Classifier for ThresholdClassifier {
    async fn classify(
        &self,
        tuples: &[FeatureTuple],
        label: i64,
    ) -> Result<Vec<TrackId>, ClassifierError> {
        *self.calls.lock().unwrap() += 1;
        if self.failing {
            return Err(ClassifierError::Timeout);
        }
        let threshold = label as f64 / 10.0;
        let mut kept = tuples
            .iter()
            .filter(|t| t.danceability >= threshold)
            .collect::<Vec<_>>();
        kept.sort_by(|a, b| b.danceability.total_cmp(&a.danceability));
        Ok(kept.into_iter().map(|t| t.id.clone()).collect())
    }

    async fn record_label(&self, tuple: &FeatureTuple, label: i64) -> Result<(), ClassifierError> {
        if self.failing {
            return Err(ClassifierError::Timeout);
        }
        self.labelled.lock().unwrap().push((tuple.id.clone(), label));
        Ok(())
    }
}
