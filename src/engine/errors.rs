//! Typed errors for the recommendation engine.

use crate::catalog::{CatalogError, TrackId};
use crate::classifier::ClassifierError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendationError {
    /// No usable access token, or the catalog rejected it.
    #[error("not logged in")]
    AuthExpired,

    #[error("received bad payload: {0}")]
    MalformedRequest(String),

    /// A collaborator failed in a way that aborts the whole request.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A reference track has no complete feature vector. Used internally to
    /// skip a pool, never returned to callers.
    #[error("incomplete feature data for track {0}")]
    IncompleteFeatureData(TrackId),

    #[error("only found {found} of {requested} suggestions")]
    QuotaUnreachable { found: usize, requested: usize },

    #[error("couldn't get currently playing song")]
    NoActiveTrack,

    #[error("request cancelled")]
    Cancelled,
}

impl RecommendationError {
    /// Message shown to API callers.
    pub fn user_message(&self) -> String {
        match self {
            RecommendationError::AuthExpired => self.to_string(),
            _ => format!("error: {}", self),
        }
    }

    /// Short label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationError::AuthExpired => "auth_expired",
            RecommendationError::MalformedRequest(_) => "malformed_request",
            RecommendationError::UpstreamUnavailable(_) => "upstream_unavailable",
            RecommendationError::IncompleteFeatureData(_) => "incomplete_feature_data",
            RecommendationError::QuotaUnreachable { .. } => "quota_unreachable",
            RecommendationError::NoActiveTrack => "no_active_track",
            RecommendationError::Cancelled => "cancelled",
        }
    }
}

impl From<CatalogError> for RecommendationError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::AuthExpired => RecommendationError::AuthExpired,
            other => RecommendationError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<ClassifierError> for RecommendationError {
    fn from(e: ClassifierError) -> Self {
        RecommendationError::UpstreamUnavailable(e.to_string())
    }
}
