use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Seedwave metrics
const PREFIX: &str = "seedwave";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Suggestion Metrics
    pub static ref SUGGESTION_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_suggestion_requests_total"), "Suggestion requests by outcome"),
        &["outcome"]
    ).expect("Failed to create suggestion_requests_total metric");

    pub static ref SUGGESTED_TRACKS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_suggested_tracks_total"),
        "Total number of suggested tracks returned"
    ).expect("Failed to create suggested_tracks_total metric");

    pub static ref ENGINE_PASSES: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_engine_passes"),
            "Round-robin passes per suggestion run"
        )
        .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0])
    ).expect("Failed to create engine_passes metric");

    pub static ref PLAYLISTS_MATERIALIZED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_playlists_materialized_total"), "Playlist writes by result"),
        &["result"]
    ).expect("Failed to create playlists_materialized_total metric");

    // Catalog Metrics
    pub static ref CATALOG_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_catalog_calls_total"), "Catalog calls by operation and result"),
        &["operation", "result"]
    ).expect("Failed to create catalog_calls_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SUGGESTION_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SUGGESTED_TRACKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ENGINE_PASSES.clone()));
    let _ = REGISTRY.register(Box::new(PLAYLISTS_MATERIALIZED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_CALLS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of a suggestion request
pub fn record_suggestion_request(outcome: &str, track_count: usize) {
    SUGGESTION_REQUESTS_TOTAL
        .with_label_values(&[outcome])
        .inc();
    SUGGESTED_TRACKS_TOTAL.inc_by(track_count as f64);
}

/// Record a finished engine run
pub fn record_engine_run(passes: u32) {
    ENGINE_PASSES.observe(passes as f64);
}

/// Record a playlist write
pub fn record_playlist_materialized(result: &str) {
    PLAYLISTS_MATERIALIZED_TOTAL
        .with_label_values(&[result])
        .inc();
}

/// Record a catalog call
pub fn record_catalog_call(operation: &str, result: &str) {
    CATALOG_CALLS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
