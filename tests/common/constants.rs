//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When the fake catalog data changes, update only this file.

// ============================================================================
// Credentials
// ============================================================================

/// Token the fake catalog accepts as bearer credential
pub const TEST_TOKEN: &str = "test-access-token";

/// Owner of playlists created on the fake catalog
pub const TEST_USER_ID: &str = "test-listener";

// ============================================================================
// Fake Catalog Data
// ============================================================================

/// First seed, its pool is `alpha-000` .. `alpha-099`
pub const SEED_ALPHA: &str = "alpha";

/// Second seed, its pool is `bravo-000` .. `bravo-099`
pub const SEED_BRAVO: &str = "bravo";

/// Seed whose pool is always empty
pub const SEED_BARREN: &str = "barren";

/// Number of tracks in each non-empty pool
pub const POOL_SIZE: usize = 100;

/// Track in alpha's pool that has no audio features
pub const FEATURELESS_TRACK_ID: &str = "alpha-ghost";

/// Alpha pool track whose own pool is bravo's, the only alternate of
/// alpha that adds anything new
pub const BRIDGE_TRACK_ID: &str = "alpha-005";

/// Track reported as currently playing
pub const ACTIVE_TRACK_ID: &str = SEED_ALPHA;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for a test server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Timeout for individual test requests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Probes the active-track poller makes before giving up
pub const POLLER_ATTEMPTS: u32 = 3;
