//! Quota-filling recommendation orchestrator.
//!
//! Seeds are visited round-robin. Each visit fetches the seed's candidate
//! pool, ranks it against the target vector and appends unseen tracks until
//! the seed's partition or the global quota is reached. When a full pass
//! over the seeds leaves the quota unmet, pools are fetched again, for at
//! most `max_passes` passes.

use super::classifier_assist::ClassifierAssist;
use super::diversifier::SeedDiversifier;
use super::errors::RecommendationError;
use super::scorer::FeatureDistanceScorer;
use super::types::{RequestState, SuggestionOutcome, SuggestionRequest, TargetSource};
use crate::catalog::{CatalogClient, CatalogError, CatalogTrack, TrackId};
use crate::classifier::Classifier;
use crate::config::EngineSettings;
use crate::server::metrics::record_engine_run;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogClient>,
    classifier: Option<Arc<dyn Classifier>>,
    settings: EngineSettings,
}

/// A seed actually queried for candidates, with the request seed it
/// came from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EffectiveSeed {
    id: TrackId,
    origin: TrackId,
}

/// Tracks whether any pool could be fetched during a run.
#[derive(Default)]
struct PoolFetchLog {
    succeeded: bool,
    last_error: Option<CatalogError>,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        classifier: Option<Arc<dyn Classifier>>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            catalog,
            classifier,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &dyn CatalogClient {
        self.catalog.as_ref()
    }

    pub fn classifier(&self) -> Option<&dyn Classifier> {
        self.classifier.as_deref()
    }

    /// Produces up to `request.count` unique suggestions.
    ///
    /// A run that ends below the quota still returns `Ok`; callers inspect
    /// [`SuggestionOutcome::shortfall`]. Cancelling `cancel` drops any
    /// in-flight catalog call and discards partial results.
    pub async fn quick_suggestions(
        &self,
        request: &SuggestionRequest,
        cancel: &CancellationToken,
    ) -> Result<SuggestionOutcome, RecommendationError> {
        request.validate()?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Suggestion request cancelled");
                Err(RecommendationError::Cancelled)
            }
            outcome = self.run(request) => outcome,
        }
    }

    async fn run(
        &self,
        request: &SuggestionRequest,
    ) -> Result<SuggestionOutcome, RecommendationError> {
        let start = Instant::now();
        let seeds = self.effective_seeds(request).await?;
        let mut state = RequestState::new(request.count, seeds.len(), self.settings.thinning_seed);

        let classifier = match (request.uses_classifier(), self.classifier()) {
            (true, Some(classifier)) => Some(classifier),
            (true, None) => {
                warn!("Classifier-assisted request but no classifier is configured, using plain scoring");
                None
            }
            (false, _) => None,
        };

        debug!(
            "Filling {} suggestions from {} effective seeds, partition {}",
            request.count,
            seeds.len(),
            state.quota.per_seed_partition
        );

        let mut fetch_log = PoolFetchLog::default();
        let mut passes = 0;
        while !state.quota.is_met() && passes < self.settings.max_passes {
            passes += 1;
            let added_before = state.quota.added_count;
            for seed in &seeds {
                if state.quota.is_met() {
                    break;
                }
                self.fill_from_seed(seed, request, classifier, &mut state, &mut fetch_log)
                    .await?;
            }
            debug!(
                "Pass {} added {} tracks ({}/{})",
                passes,
                state.quota.added_count - added_before,
                state.quota.added_count,
                state.quota.target_count
            );
        }

        if !fetch_log.succeeded {
            if let Some(err) = fetch_log.last_error {
                return Err(err.into());
            }
        }

        let mut tracks = state.output;
        tracks.truncate(request.count);
        let outcome = SuggestionOutcome {
            tracks,
            requested: request.count,
            passes,
        };
        record_engine_run(passes);
        info!(
            "Produced {}/{} suggestions in {} passes ({}ms)",
            outcome.tracks.len(),
            outcome.requested,
            passes,
            start.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Seeds to query, in order. With a uniqueness level every seed is
    /// replaced by its diversified alternates. Later duplicates are dropped.
    async fn effective_seeds(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<EffectiveSeed>, RecommendationError> {
        let mut seen = HashSet::new();
        let mut effective = Vec::new();
        for seed in &request.seeds {
            let expanded = match request.unique_level {
                Some(level) => {
                    let diversifier =
                        SeedDiversifier::new(self.catalog(), &self.settings.diversifier);
                    match diversifier.diversify(seed, level).await {
                        Ok(alternates) => alternates,
                        Err(CatalogError::AuthExpired) => {
                            return Err(RecommendationError::AuthExpired)
                        }
                        Err(err) => {
                            warn!("Could not diversify seed {}: {}, using it as is", seed, err);
                            vec![seed.clone()]
                        }
                    }
                }
                None => vec![seed.clone()],
            };
            for id in expanded {
                if seen.insert(id.clone()) {
                    effective.push(EffectiveSeed {
                        id,
                        origin: seed.clone(),
                    });
                }
            }
        }
        Ok(effective)
    }

    async fn fill_from_seed(
        &self,
        seed: &EffectiveSeed,
        request: &SuggestionRequest,
        classifier: Option<&dyn Classifier>,
        state: &mut RequestState,
        fetch_log: &mut PoolFetchLog,
    ) -> Result<(), RecommendationError> {
        let scorer = FeatureDistanceScorer::new(self.catalog());
        let reference = match &request.target {
            TargetSource::Fixed(id) => id,
            TargetSource::PerSeed => &seed.origin,
        };
        let target = match scorer
            .resolve_target(std::slice::from_ref(reference), &mut state.target_cache)
            .await
        {
            Ok(Some(target)) => target,
            Ok(None) => {
                let skipped = RecommendationError::IncompleteFeatureData(reference.clone());
                debug!("Skipping pool of {}: {}", seed.id, skipped);
                return Ok(());
            }
            Err(CatalogError::AuthExpired) => return Err(RecommendationError::AuthExpired),
            Err(err) => {
                warn!("Skipping pool of {}, target {} unavailable: {}", seed.id, reference, err);
                fetch_log.last_error = Some(err);
                return Ok(());
            }
        };

        let pool = match self
            .catalog
            .fetch_recommendations(std::slice::from_ref(&seed.id))
            .await
        {
            Ok(pool) => {
                fetch_log.succeeded = true;
                pool
            }
            Err(CatalogError::AuthExpired) => return Err(RecommendationError::AuthExpired),
            Err(err) => {
                warn!("Skipping pool of {}: {}", seed.id, err);
                fetch_log.last_error = Some(err);
                return Ok(());
            }
        };

        let pool = pool
            .into_iter()
            .filter(|t| !request.blacklist.contains(&t.id) && !state.ledger.contains(&t.id))
            .collect::<Vec<CatalogTrack>>();
        if pool.is_empty() {
            debug!("Pool of {} has no new candidates", seed.id);
            return Ok(());
        }

        let k = state.quota.target_count;
        let ranked = match (classifier, request.label) {
            (Some(classifier), Some(label)) => {
                let assist = ClassifierAssist::new(self.catalog(), classifier);
                match assist
                    .filter_and_rank(&target, &pool, label, k, &state.ledger)
                    .await
                {
                    Ok(ranked) => ranked,
                    Err(RecommendationError::AuthExpired) => {
                        return Err(RecommendationError::AuthExpired)
                    }
                    Err(err) => {
                        warn!("Skipping pool of {}: {}", seed.id, err);
                        return Ok(());
                    }
                }
            }
            _ => scorer.score(&target, &pool, k, &state.ledger).await?,
        };

        let mut partition_added = 0;
        for candidate in ranked {
            if state.quota.is_met() || partition_added >= state.quota.per_seed_partition {
                break;
            }
            if state.ledger.contains(candidate.track_id()) {
                continue;
            }
            if !state.keep_candidate(self.settings.thinning_probability) {
                continue;
            }
            if state.accept(candidate.track) {
                partition_added += 1;
            }
        }
        debug!("Seed {} contributed {} tracks", seed.id, partition_added);
        Ok(())
    }
}
