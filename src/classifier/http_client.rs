//! HTTP client for the classifier service.

use super::trait_def::{Classifier, ClassifierError};
use crate::catalog::{FeatureTuple, TrackId};
use crate::config::ClassifierSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub struct HttpClassifierClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ClassifyBody<'a> {
    label: i64,
    tracks: &'a [FeatureTuple],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    ranked: Vec<TrackId>,
}

#[derive(Serialize)]
struct LabelBody<'a> {
    track: &'a FeatureTuple,
    label: i64,
}

impl HttpClassifierClient {
    pub fn new(settings: &ClassifierSettings) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()
            .map_err(|e| {
                ClassifierError::Connection(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClassifierError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClassifierError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifierClient {
    async fn classify(
        &self,
        tuples: &[FeatureTuple],
        label: i64,
    ) -> Result<Vec<TrackId>, ClassifierError> {
        if tuples.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/classify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ClassifyBody {
                label,
                tracks: tuples,
            })
            .send()
            .await?;
        let body: ClassifyResponse = Self::check_status(response).await?.json().await?;

        // The classifier may only narrow the pool, never extend it.
        let known: HashSet<&str> = tuples.iter().map(|t| t.id.as_str()).collect();
        let ranked = body
            .ranked
            .into_iter()
            .filter(|id| known.contains(id.as_str()))
            .collect::<Vec<_>>();

        debug!(
            "Classifier kept {} of {} tracks for label {}",
            ranked.len(),
            tuples.len(),
            label
        );
        Ok(ranked)
    }

    async fn record_label(&self, tuple: &FeatureTuple, label: i64) -> Result<(), ClassifierError> {
        let url = format!("{}/label", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LabelBody {
                track: tuple,
                label,
            })
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
