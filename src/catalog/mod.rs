mod http_client;
mod models;
mod retry_policy;
mod trait_def;

pub use http_client::HttpCatalogClient;
pub use models::{AudioFeatures, CatalogTrack, FeatureTuple, FeatureVector, PlaylistId, TrackId};
pub use retry_policy::RetryPolicy;
#[cfg(feature = "mock")]
pub use trait_def::MockCatalogClient;
pub use trait_def::{CatalogClient, CatalogError, MAX_APPEND_BATCH, MAX_FEATURES_BATCH};
