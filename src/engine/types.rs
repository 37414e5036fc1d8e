use super::errors::RecommendationError;
use crate::catalog::{CatalogTrack, FeatureVector, TrackId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Maximum number of seed tracks accepted per request.
pub const MAX_SEEDS: usize = 5;

/// Which reference track a candidate pool is scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// Every pool is scored against this track.
    Fixed(TrackId),
    /// Each pool is scored against the seed it was derived from.
    PerSeed,
}

/// A validated recommendation request.
#[derive(Debug, Clone)]
pub struct SuggestionRequest {
    pub seeds: Vec<TrackId>,
    pub target: TargetSource,
    pub unique_level: Option<usize>,
    pub blacklist: HashSet<TrackId>,
    pub label: Option<i64>,
    /// Run pools through the classifier before scoring. Only honoured when
    /// `label` is set.
    pub classifier_assisted: bool,
    pub count: usize,
}

impl SuggestionRequest {
    pub fn new(seeds: Vec<TrackId>, count: usize) -> Self {
        Self {
            seeds,
            target: TargetSource::PerSeed,
            unique_level: None,
            blacklist: HashSet::new(),
            label: None,
            classifier_assisted: false,
            count,
        }
    }

    pub fn validate(&self) -> Result<(), RecommendationError> {
        if self.seeds.is_empty() {
            return Err(RecommendationError::MalformedRequest(
                "at least one seed is required".to_string(),
            ));
        }
        if self.seeds.len() > MAX_SEEDS {
            return Err(RecommendationError::MalformedRequest(format!(
                "at most {} seeds are allowed, got {}",
                MAX_SEEDS,
                self.seeds.len()
            )));
        }
        if self.seeds.iter().any(|s| s.trim().is_empty()) {
            return Err(RecommendationError::MalformedRequest(
                "seed ids must not be empty".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(RecommendationError::MalformedRequest(
                "count must be at least 1".to_string(),
            ));
        }
        if self.unique_level == Some(0) {
            return Err(RecommendationError::MalformedRequest(
                "uniqueLevel must be at least 1".to_string(),
            ));
        }
        if let TargetSource::Fixed(id) = &self.target {
            if id.trim().is_empty() {
                return Err(RecommendationError::MalformedRequest(
                    "target id must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// True when pools go through the classifier before scoring.
    pub fn uses_classifier(&self) -> bool {
        self.classifier_assisted && self.label.is_some()
    }
}

/// A scored candidate, lower distance is closer to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub track: CatalogTrack,
    pub distance: f64,
}

impl Candidate {
    pub fn track_id(&self) -> &str {
        &self.track.id
    }
}

/// Ids already emitted by the current request.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<TrackId>,
}

impl DedupLedger {
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns false if `id` was already recorded.
    pub fn record(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    pub target_count: usize,
    pub added_count: usize,
    pub per_seed_partition: usize,
}

impl QuotaState {
    /// `per_seed_partition` is `ceil(target / seeds)` so the partitions
    /// always add up to at least the target.
    pub fn new(target_count: usize, effective_seed_count: usize) -> Self {
        let seeds = effective_seed_count.max(1);
        Self {
            target_count,
            added_count: 0,
            per_seed_partition: target_count.div_ceil(seeds),
        }
    }

    pub fn is_met(&self) -> bool {
        self.added_count >= self.target_count
    }
}

/// Mutable state of a single `quick_suggestions` call.
pub struct RequestState {
    pub ledger: DedupLedger,
    pub quota: QuotaState,
    pub output: Vec<CatalogTrack>,
    /// Resolved target vectors keyed by reference track; `None` marks a
    /// reference without a complete vector.
    pub target_cache: HashMap<TrackId, Option<FeatureVector>>,
    pub rng: StdRng,
}

impl RequestState {
    pub fn new(target_count: usize, effective_seed_count: usize, rng_seed: Option<u64>) -> Self {
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            ledger: DedupLedger::default(),
            quota: QuotaState::new(target_count, effective_seed_count),
            output: Vec::with_capacity(target_count),
            target_cache: HashMap::new(),
            rng,
        }
    }

    /// True if the candidate survives random thinning.
    pub fn keep_candidate(&mut self, thinning_probability: f64) -> bool {
        thinning_probability <= 0.0 || !self.rng.random_bool(thinning_probability)
    }

    /// Appends a track that is not yet in the output. Returns false if the
    /// track was a duplicate or the quota is already met.
    pub fn accept(&mut self, track: CatalogTrack) -> bool {
        if self.quota.is_met() || !self.ledger.record(&track.id) {
            return false;
        }
        self.output.push(track);
        self.quota.added_count += 1;
        true
    }
}

/// Result of a suggestion run.
#[derive(Debug, Clone)]
pub struct SuggestionOutcome {
    pub tracks: Vec<CatalogTrack>,
    pub requested: usize,
    /// Number of round-robin passes over the seeds that were started.
    pub passes: u32,
}

impl SuggestionOutcome {
    pub fn is_complete(&self) -> bool {
        self.tracks.len() >= self.requested
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }

    /// The shortfall as an error, if the quota was not reached.
    pub fn shortfall(&self) -> Option<RecommendationError> {
        if self.is_complete() {
            None
        } else {
            Some(RecommendationError::QuotaUnreachable {
                found: self.tracks.len(),
                requested: self.requested,
            })
        }
    }
}
