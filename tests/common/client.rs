//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Command Endpoint
    // ========================================================================

    /// POST /api with an arbitrary JSON body
    pub async fn post_api(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("API request failed")
    }

    /// POST /api and decode the `{message, data}` envelope
    ///
    /// # Panics
    ///
    /// Panics if the server does not answer 200 with JSON.
    pub async fn command(&self, body: Value) -> Value {
        let response = self.post_api(body).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Response was not JSON")
    }

    pub async fn get_suggestions(&self, seeds: &[&str], count: usize) -> Value {
        self.command(json!({
            "type": "getSuggestions",
            "seeds": seeds,
            "count": count,
            "defaultRadio": true,
        }))
        .await
    }

    pub async fn get_playing(&self) -> Value {
        self.command(json!({"type": "getPlaying"})).await
    }

    pub async fn label_playing(&self, label: i64) -> Value {
        self.command(json!({"type": "labelPlaying", "label": label}))
            .await
    }

    // ========================================================================
    // Token Endpoints
    // ========================================================================

    pub async fn put_token(&self, token: &str) -> Response {
        self.client
            .put(format!("{}/auth/token", self.base_url))
            .json(&json!({ "accessToken": token }))
            .send()
            .await
            .expect("Put token request failed")
    }

    pub async fn delete_token(&self) -> Response {
        self.client
            .delete(format!("{}/auth/token", self.base_url))
            .send()
            .await
            .expect("Delete token request failed")
    }

    // ========================================================================
    // Home and Metrics
    // ========================================================================

    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    pub async fn get_metrics(&self) -> Response {
        self.client
            .get(format!("{}/metrics", self.base_url))
            .send()
            .await
            .expect("Metrics request failed")
    }
}

/// Extracts the track ids of a successful `getSuggestions` response.
pub fn suggested_tracks(response: &Value) -> Vec<String> {
    response["data"]["tracks"]
        .as_array()
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
