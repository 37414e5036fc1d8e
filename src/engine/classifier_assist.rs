//! Classifier-assisted filtering of candidate pools.

use super::errors::RecommendationError;
use super::scorer::{rank_candidates, FeatureDistanceScorer};
use super::types::{Candidate, DedupLedger};
use crate::catalog::{AudioFeatures, CatalogClient, CatalogTrack, FeatureVector, TrackId};
use crate::classifier::Classifier;
use std::collections::HashMap;
use tracing::debug;

pub struct ClassifierAssist<'a> {
    catalog: &'a dyn CatalogClient,
    classifier: &'a dyn Classifier,
}

impl<'a> ClassifierAssist<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, classifier: &'a dyn Classifier) -> Self {
        Self {
            catalog,
            classifier,
        }
    }

    /// Narrows `pool` to the tracks the classifier assigns to `label`, then
    /// ranks the survivors against `target`. Tracks without a full feature
    /// tuple never reach the classifier.
    pub async fn filter_and_rank(
        &self,
        target: &FeatureVector,
        pool: &[CatalogTrack],
        label: i64,
        k: usize,
        ledger: &DedupLedger,
    ) -> Result<Vec<Candidate>, RecommendationError> {
        let scorer = FeatureDistanceScorer::new(self.catalog);
        let ids = pool.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        let features = scorer.fetch_features(&ids).await?;

        let tuples = pool
            .iter()
            .filter_map(|t| features.get(&t.id).and_then(AudioFeatures::tuple))
            .collect::<Vec<_>>();
        if tuples.is_empty() {
            return Ok(vec![]);
        }

        let accepted = self.classifier.classify(&tuples, label).await?;
        let by_id: HashMap<&str, &CatalogTrack> =
            pool.iter().map(|t| (t.id.as_str(), t)).collect();
        let subset = accepted
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).map(|t| (*t).clone()))
            .collect::<Vec<_>>();
        debug!(
            "Classifier accepted {} of {} tuples for label {}",
            subset.len(),
            tuples.len(),
            label
        );

        Ok(rank_candidates(target, &subset, &features, k, ledger))
    }

    /// Sends the feature tuple of `track_id` to the classifier as an example
    /// of `label`.
    pub async fn record_label(&self, track_id: &TrackId, label: i64) -> Result<(), RecommendationError> {
        let scorer = FeatureDistanceScorer::new(self.catalog);
        let features = scorer.fetch_features(std::slice::from_ref(track_id)).await?;
        let tuple = features
            .get(track_id)
            .and_then(AudioFeatures::tuple)
            .ok_or_else(|| RecommendationError::IncompleteFeatureData(track_id.clone()))?;
        self.classifier.record_label(&tuple, label).await?;
        Ok(())
    }
}
