//! Similarity scoring of candidate tracks against a target feature vector.

use super::priority_queue::{HeapOrder, PriorityQueue};
use super::types::{Candidate, DedupLedger};
use crate::catalog::{AudioFeatures, CatalogClient, CatalogError, CatalogTrack, FeatureVector, TrackId, MAX_FEATURES_BATCH};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Fetched features keyed by track id. Tracks the catalog knows nothing
/// about are absent.
pub type FeatureMap = HashMap<TrackId, AudioFeatures>;

/// Result of a batched feature fetch, including the ids whose batch failed.
#[derive(Debug, Default)]
pub struct FeatureFetch {
    pub features: FeatureMap,
    pub failed: HashSet<TrackId>,
    pub last_error: Option<CatalogError>,
}

pub struct FeatureDistanceScorer<'a> {
    catalog: &'a dyn CatalogClient,
}

impl<'a> FeatureDistanceScorer<'a> {
    pub fn new(catalog: &'a dyn CatalogClient) -> Self {
        Self { catalog }
    }

    /// Fetches features in batches of [`MAX_FEATURES_BATCH`]. A failed batch
    /// is skipped, except for an expired token which aborts the fetch.
    pub async fn fetch_features(&self, ids: &[TrackId]) -> Result<FeatureMap, CatalogError> {
        Ok(self.fetch_feature_batches(ids).await?.features)
    }

    /// Like [`Self::fetch_features`], but also reports which ids were lost
    /// to a failed batch.
    pub async fn fetch_feature_batches(&self, ids: &[TrackId]) -> Result<FeatureFetch, CatalogError> {
        let mut fetch = FeatureFetch {
            features: FeatureMap::with_capacity(ids.len()),
            ..Default::default()
        };
        for batch in ids.chunks(MAX_FEATURES_BATCH) {
            match self.catalog.fetch_audio_features(batch).await {
                Ok(records) => {
                    for (id, record) in batch.iter().zip(records) {
                        if let Some(record) = record {
                            fetch.features.insert(id.clone(), record);
                        }
                    }
                }
                Err(CatalogError::AuthExpired) => return Err(CatalogError::AuthExpired),
                Err(err) => {
                    warn!("Skipping batch of {} feature lookups: {}", batch.len(), err);
                    fetch.failed.extend(batch.iter().cloned());
                    fetch.last_error = Some(err);
                }
            }
        }
        Ok(fetch)
    }

    /// Mean vector of the reference tracks, or `None` if any of them lacks a
    /// complete vector. `cache` avoids refetching references across pools.
    ///
    /// References whose lookup failed are left out of `cache` and the
    /// failure is returned, so a later call fetches them again.
    pub async fn resolve_target(
        &self,
        references: &[TrackId],
        cache: &mut HashMap<TrackId, Option<FeatureVector>>,
    ) -> Result<Option<FeatureVector>, CatalogError> {
        let missing = references
            .iter()
            .filter(|id| !cache.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            let fetched = self.fetch_feature_batches(&missing).await?;
            for id in missing {
                if fetched.failed.contains(&id) {
                    continue;
                }
                let vector = fetched.features.get(&id).and_then(AudioFeatures::core_vector);
                cache.insert(id, vector);
            }
            if let Some(err) = fetched.last_error {
                return Err(err);
            }
        }

        let mut vectors = Vec::with_capacity(references.len());
        for id in references {
            match cache.get(id).copied().flatten() {
                Some(vector) => vectors.push(vector),
                None => {
                    debug!("Reference track {} has no complete feature vector", id);
                    return Ok(None);
                }
            }
        }
        Ok(FeatureVector::mean(&vectors))
    }

    /// Fetches features for `candidates` and returns the `k` closest to
    /// `target` that are not in `ledger`.
    pub async fn score(
        &self,
        target: &FeatureVector,
        candidates: &[CatalogTrack],
        k: usize,
        ledger: &DedupLedger,
    ) -> Result<Vec<Candidate>, CatalogError> {
        let ids = candidates.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        let features = self.fetch_features(&ids).await?;
        Ok(rank_candidates(target, candidates, &features, k, ledger))
    }
}

/// Ranks `candidates` by ascending squared distance to `target`.
/// Candidates without a complete core vector or already in `ledger` are
/// dropped. Equal distances keep the input order.
pub fn rank_candidates(
    target: &FeatureVector,
    candidates: &[CatalogTrack],
    features: &FeatureMap,
    k: usize,
    ledger: &DedupLedger,
) -> Vec<Candidate> {
    let mut queue = PriorityQueue::new(HeapOrder::MinFirst, |c: &Candidate| c.distance);
    for track in candidates {
        if ledger.contains(&track.id) {
            continue;
        }
        let Some(vector) = features.get(&track.id).and_then(AudioFeatures::core_vector) else {
            continue;
        };
        queue.enqueue(Candidate {
            track: track.clone(),
            distance: vector.squared_distance(target),
        });
    }

    let mut ranked = Vec::with_capacity(k.min(queue.size()));
    while ranked.len() < k {
        match queue.dequeue() {
            Some(candidate) => ranked.push(candidate),
            None => break,
        }
    }
    ranked
}
