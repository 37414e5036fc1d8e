use serde::{Deserialize, Serialize};

/// Opaque catalog track identifier.
pub type TrackId = String;

/// Identifier of a playlist created in the catalog.
pub type PlaylistId = String;

/// A track as returned by the catalog recommendation endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub id: TrackId,
    /// Catalog URI used when appending the track to a playlist.
    pub uri: String,
}

impl CatalogTrack {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let uri = format!("spotify:track:{}", id);
        Self { id, uri }
    }
}

/// Raw per-track audio features. Every dimension is optional because the
/// catalog routinely omits some of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: TrackId,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
}

fn unit_interval(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
}

impl AudioFeatures {
    /// The four core dimensions, or `None` if any is missing or invalid.
    pub fn core_vector(&self) -> Option<FeatureVector> {
        Some(FeatureVector {
            danceability: unit_interval(self.danceability)?,
            energy: unit_interval(self.energy)?,
            valence: unit_interval(self.valence)?,
            acousticness: unit_interval(self.acousticness)?,
        })
    }

    /// All five dimensions, as needed by the classifier.
    pub fn tuple(&self) -> Option<FeatureTuple> {
        let core = self.core_vector()?;
        Some(FeatureTuple {
            id: self.id.clone(),
            danceability: core.danceability,
            energy: core.energy,
            valence: core.valence,
            acousticness: core.acousticness,
            speechiness: unit_interval(self.speechiness)?,
        })
    }
}

/// The core feature dimensions used for similarity scoring.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub acousticness: f64,
}

impl FeatureVector {
    /// Sum of squared per-dimension differences.
    pub fn squared_distance(&self, other: &FeatureVector) -> f64 {
        (self.danceability - other.danceability).powi(2)
            + (self.energy - other.energy).powi(2)
            + (self.valence - other.valence).powi(2)
            + (self.acousticness - other.acousticness).powi(2)
    }

    /// Component-wise mean, `None` for an empty slice.
    pub fn mean(vectors: &[FeatureVector]) -> Option<FeatureVector> {
        if vectors.is_empty() {
            return None;
        }
        let n = vectors.len() as f64;
        let sum = vectors.iter().fold([0.0; 4], |mut acc, v| {
            acc[0] += v.danceability;
            acc[1] += v.energy;
            acc[2] += v.valence;
            acc[3] += v.acousticness;
            acc
        });
        Some(FeatureVector {
            danceability: sum[0] / n,
            energy: sum[1] / n,
            valence: sum[2] / n,
            acousticness: sum[3] / n,
        })
    }
}

/// Full feature record sent to the classifier service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureTuple {
    pub id: TrackId,
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub speechiness: f64,
}
