use crate::catalog::{CatalogClient, CatalogError, TrackId};
use crate::config::PollerSettings;
use std::time::Duration;
use tracing::{debug, warn};

/// Probes the catalog for the currently active item a bounded number of
/// times.
pub struct BoundedPoller<'a> {
    catalog: &'a dyn CatalogClient,
    max_attempts: u32,
    delay: Duration,
}

impl<'a> BoundedPoller<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, settings: &PollerSettings) -> Self {
        Self {
            catalog,
            max_attempts: settings.max_attempts,
            delay: settings.delay,
        }
    }

    /// Returns the first non-empty probe result, or `None` once
    /// `max_attempts` probes came back empty. Transient probe errors count
    /// as empty attempts. An expired token ends polling immediately since
    /// no further attempt can succeed.
    pub async fn poll_current_item(&self) -> Result<Option<TrackId>, CatalogError> {
        for attempt in 1..=self.max_attempts {
            match self.catalog.fetch_currently_active_item().await {
                Ok(Some(id)) => {
                    debug!("Active item {} found on attempt {}", id, attempt);
                    return Ok(Some(id));
                }
                Ok(None) => debug!("No active item on attempt {}", attempt),
                Err(CatalogError::AuthExpired) => return Err(CatalogError::AuthExpired),
                Err(err) => warn!("Active item probe {} failed: {}", attempt, err),
            }
            if attempt < self.max_attempts && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(None)
    }
}
