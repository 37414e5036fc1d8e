//! Seed diversification.
//!
//! A seed is replaced by alternates picked from its own recommendation pool.
//! Alternates are ranked by novelty, the number of tracks their own pool
//! adds on top of the seed's pool, and the requested uniqueness level picks
//! a slice of that ranking. Higher levels move further from the top of the
//! ranking.

use super::priority_queue::{HeapOrder, PriorityQueue};
use super::scorer::FeatureDistanceScorer;
use super::types::DedupLedger;
use crate::catalog::{CatalogClient, CatalogError, TrackId};
use crate::config::DiversifierSettings;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoveltyOrder {
    MostNovelFirst,
    LeastNovelFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSelection {
    /// Split the ranking into equal bands and return the whole band.
    Decile,
    /// Return a single alternate.
    Single,
}

pub struct SeedDiversifier<'a> {
    catalog: &'a dyn CatalogClient,
    settings: &'a DiversifierSettings,
}

struct Alternate {
    id: TrackId,
    novelty: usize,
}

impl<'a> SeedDiversifier<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, settings: &'a DiversifierSettings) -> Self {
        Self { catalog, settings }
    }

    /// Alternate seeds for `seed` at `unique_level` (1-based). Falls back to
    /// `[seed]` when the seed has no usable pool or feature vector.
    pub async fn diversify(
        &self,
        seed: &TrackId,
        unique_level: usize,
    ) -> Result<Vec<TrackId>, CatalogError> {
        let baseline = self
            .catalog
            .fetch_recommendations(std::slice::from_ref(seed))
            .await?;
        if baseline.is_empty() {
            debug!("Seed {} has an empty baseline pool, not diversifying", seed);
            return Ok(vec![seed.clone()]);
        }

        let scorer = FeatureDistanceScorer::new(self.catalog);
        let mut cache = HashMap::new();
        let Some(target) = scorer
            .resolve_target(std::slice::from_ref(seed), &mut cache)
            .await?
        else {
            debug!("Seed {} has no feature vector, not diversifying", seed);
            return Ok(vec![seed.clone()]);
        };

        let mut exclude = DedupLedger::default();
        exclude.record(seed);
        let closest = scorer
            .score(&target, &baseline, self.settings.alternate_pool_size, &exclude)
            .await?;
        if closest.is_empty() {
            return Ok(vec![seed.clone()]);
        }

        let baseline_ids: HashSet<&str> = baseline.iter().map(|t| t.id.as_str()).collect();
        let order = match self.settings.novelty_order {
            NoveltyOrder::MostNovelFirst => HeapOrder::MaxFirst,
            NoveltyOrder::LeastNovelFirst => HeapOrder::MinFirst,
        };
        // Enqueued in similarity order so equal novelty keeps it.
        let mut queue = PriorityQueue::new(order, |a: &Alternate| a.novelty as f64);
        for candidate in &closest {
            let id = candidate.track_id().to_string();
            match self.catalog.fetch_recommendations(std::slice::from_ref(&id)).await {
                Ok(pool) => {
                    let novelty = pool
                        .iter()
                        .filter(|t| !baseline_ids.contains(t.id.as_str()))
                        .map(|t| t.id.as_str())
                        .collect::<HashSet<_>>()
                        .len();
                    queue.enqueue(Alternate { id, novelty });
                }
                Err(CatalogError::AuthExpired) => return Err(CatalogError::AuthExpired),
                Err(err) => warn!("Dropping alternate {} for seed {}: {}", id, seed, err),
            }
        }

        let ranked = queue
            .into_sorted_vec()
            .into_iter()
            .map(|a| a.id)
            .collect::<Vec<_>>();
        if ranked.is_empty() {
            return Ok(vec![seed.clone()]);
        }

        let selected = select_band(
            ranked,
            unique_level,
            self.settings.band_selection,
            self.settings.band_count,
        );
        debug!(
            "Seed {} diversified at level {} into {:?}",
            seed, unique_level, selected
        );
        Ok(selected)
    }
}

/// Picks the slice of `ranked` for `unique_level`, clamping levels past the
/// end to the last non-empty band. `ranked` must not be empty.
fn select_band(
    ranked: Vec<TrackId>,
    unique_level: usize,
    selection: BandSelection,
    band_count: usize,
) -> Vec<TrackId> {
    let level = unique_level.max(1);
    match selection {
        BandSelection::Single => {
            let index = level.min(ranked.len()) - 1;
            ranked.into_iter().skip(index).take(1).collect()
        }
        BandSelection::Decile => {
            let width = ranked.len().div_ceil(band_count.max(1));
            let non_empty_bands = ranked.len().div_ceil(width);
            let band = level.min(non_empty_bands) - 1;
            ranked.into_iter().skip(band * width).take(width).collect()
        }
    }
}
