//! Access token source for the catalog.
//!
//! The authorization-code exchange happens elsewhere; this module only holds
//! the resulting bearer token for the lifetime the provider granted.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default lifetime of a stored token, matching the catalog's one hour
/// grants with a safety margin.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of catalog bearer tokens.
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` if missing or expired.
    fn access_token(&self) -> Option<String>;

    /// Replace the stored token.
    fn store(&self, token: String, ttl: Duration);

    /// Forget the stored token.
    fn clear(&self);
}

struct StoredToken {
    value: String,
    stored_at: Instant,
    ttl: Duration,
}

impl StoredToken {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// A cache holding exactly one token.
#[derive(Default)]
pub struct SingleSlotTokenCache {
    slot: Mutex<Option<StoredToken>>,
}

impl SingleSlotTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache pre-filled with `token`.
    pub fn with_token(token: impl Into<String>, ttl: Duration) -> Self {
        let cache = Self::new();
        cache.store(token.into(), ttl);
        cache
    }
}

impl TokenProvider for SingleSlotTokenCache {
    fn access_token(&self) -> Option<String> {
        let slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(token) if !token.is_expired() => Some(token.value.clone()),
            Some(_) => {
                debug!("Access token expired");
                None
            }
            None => None,
        }
    }

    fn store(&self, token: String, ttl: Duration) {
        info!("Storing access token (valid for {}s)", ttl.as_secs());
        *self.slot.lock().unwrap() = Some(StoredToken {
            value: token,
            stored_at: Instant::now(),
            ttl,
        });
    }

    fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }
}
