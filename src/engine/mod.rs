mod classifier_assist;
mod diversifier;
#[allow(clippy::module_inception)]
mod engine;
mod errors;
mod poller;
mod priority_queue;
mod scorer;
#[cfg(test)]
pub(crate) mod test_support;
mod types;

pub use classifier_assist::ClassifierAssist;
pub use diversifier::{BandSelection, NoveltyOrder, SeedDiversifier};
pub use engine::RecommendationEngine;
pub use errors::RecommendationError;
pub use poller::BoundedPoller;
pub use priority_queue::{HeapOrder, PriorityQueue};
pub use scorer::{rank_candidates, FeatureDistanceScorer, FeatureFetch, FeatureMap};
pub use types::{
    Candidate, DedupLedger, QuotaState, RequestState, SuggestionOutcome, SuggestionRequest,
    TargetSource, MAX_SEEDS,
};
