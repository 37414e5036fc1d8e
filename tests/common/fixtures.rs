//! Test fixture creation
//!
//! Builds the data set served by the fake catalog.

use super::constants::*;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Data served by the fake catalog.
#[derive(Clone, Default)]
pub struct CatalogFixture {
    /// Recommendation pools keyed by the comma-joined seed list.
    pub pools: HashMap<String, Vec<String>>,
    /// Audio feature records keyed by track id.
    pub features: HashMap<String, Value>,
    /// Track reported by the player endpoint.
    pub active_item: Option<String>,
}

impl CatalogFixture {
    pub fn without_active_item(mut self) -> Self {
        self.active_item = None;
        self
    }

    pub fn pool(&self, seed: &str) -> &[String] {
        self.pools.get(seed).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn feature_record(id: &str, value: f64) -> Value {
    json!({
        "id": id,
        "uri": format!("spotify:track:{}", id),
        "danceability": value,
        "energy": value,
        "valence": value,
        "acousticness": value,
        "speechiness": 0.05,
    })
}

/// Two disjoint pools of [`POOL_SIZE`] tracks, an empty pool, a track
/// without features and a bridge from alpha's pool into bravo's.
///
/// Pool tracks sit at increasing distance from their seed, so `alpha-000`
/// is the closest match for `alpha`.
pub fn create_test_catalog() -> CatalogFixture {
    let mut fixture = CatalogFixture {
        active_item: Some(ACTIVE_TRACK_ID.to_string()),
        ..Default::default()
    };

    for (seed, origin) in [(SEED_ALPHA, 0.2), (SEED_BRAVO, 0.7)] {
        fixture
            .features
            .insert(seed.to_string(), feature_record(seed, origin));

        let mut pool = Vec::with_capacity(POOL_SIZE + 1);
        for i in 0..POOL_SIZE {
            let id = format!("{}-{:03}", seed, i);
            let value = origin + (i as f64) * 0.001;
            fixture.features.insert(id.clone(), feature_record(&id, value));
            pool.push(id);
        }
        fixture.pools.insert(seed.to_string(), pool);
    }

    fixture
        .pools
        .entry(SEED_ALPHA.to_string())
        .or_default()
        .insert(0, FEATURELESS_TRACK_ID.to_string());

    let bravo_pool = fixture.pool(SEED_BRAVO).to_vec();
    fixture.pools.insert(BRIDGE_TRACK_ID.to_string(), bravo_pool);

    fixture
        .features
        .insert(SEED_BARREN.to_string(), feature_record(SEED_BARREN, 0.5));
    fixture.pools.insert(SEED_BARREN.to_string(), Vec::new());

    fixture
}
