//! Seedwave Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod radio;
pub mod server;

// Re-export commonly used types for convenience
pub use engine::{RecommendationEngine, RecommendationError, SuggestionRequest};
pub use radio::RadioController;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
