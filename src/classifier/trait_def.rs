use crate::catalog::{FeatureTuple, TrackId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Classifier error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Timeout
        } else if e.is_decode() {
            ClassifierError::InvalidResponse(e.to_string())
        } else {
            ClassifierError::Connection(e.to_string())
        }
    }
}

/// A trained model that filters tracks by a user-supplied label.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Returns the ids of the tuples matching `label`, best match first.
    async fn classify(
        &self,
        tuples: &[FeatureTuple],
        label: i64,
    ) -> Result<Vec<TrackId>, ClassifierError>;

    /// Adds a labelled example to the training data.
    async fn record_label(&self, tuple: &FeatureTuple, label: i64) -> Result<(), ClassifierError>;
}
