//! Geolocation for photo captures.
//!
//! Location is best effort: a denied permission or an unavailable fix means
//! the photo is queued without coordinates.

use async_trait::async_trait;

use crate::shared::error::Result;
use crate::shared::record::GeoLocation;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<GeoLocation>;
}

/// Fixed position, e.g. a site entered manually
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation(pub GeoLocation);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Result<GeoLocation> {
        Ok(self.0)
    }
}

/// Location from `provider`, or `None` when it is unavailable
pub async fn locate(provider: Option<&dyn LocationProvider>) -> Option<GeoLocation> {
    let provider = provider?;
    match provider.current_location().await {
        Ok(location) => Some(location),
        Err(e) => {
            tracing::debug!("[Location] No position for capture: {}", e);
            None
        }
    }
}
