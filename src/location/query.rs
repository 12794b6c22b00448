use std::sync::Arc;

use log::debug;

use crate::{
    models::{Location, LocationFix},
    platform::{FusedLocationClient, LocationRegistry, Platform, Priority, ProviderError, ProviderResult},
};

/// Read-only location lookups. Never touches mock state.
#[derive(Clone)]
pub struct LocationQueryService {
    registry: Arc<dyn LocationRegistry>,
    fused: Option<Arc<dyn FusedLocationClient>>,
}

impl LocationQueryService {
    pub fn new(platform: &Platform) -> Self {
        Self {
            registry: platform.registry.clone(),
            fused: platform.fused.clone(),
        }
    }

    /// Freshest cached fix across every enabled provider.
    ///
    /// A permission failure on one provider just means no fix from it.
    pub fn best_last_known(&self) -> ProviderResult<Option<LocationFix>> {
        let mut best: Option<Location> = None;
        for provider in self.registry.enabled_providers()? {
            let location = match self.registry.last_known_location(&provider) {
                Ok(location) => location,
                Err(ProviderError::Security(reason)) => {
                    debug!("No last-known fix from {}: {}", provider, reason);
                    None
                }
                Err(err) => return Err(err),
            };
            if let Some(location) = location {
                if best.as_ref().map_or(true, |current| location.time > current.time) {
                    best = Some(location);
                }
            }
        }
        Ok(best.map(LocationFix::from))
    }

    /// Requests a fresh high-accuracy fix, falling back to [`Self::best_last_known`]
    /// when the OS answers with nothing. Hard failures are returned as-is.
    pub async fn current_location(&self) -> ProviderResult<Option<LocationFix>> {
        let fused = self
            .fused
            .as_ref()
            .ok_or_else(|| ProviderError::Unavailable("Fused client not available".into()))?;

        let reply = fused
            .request_current_location(Priority::HighAccuracy)
            .await
            .map_err(|_| ProviderError::Backend("location request was dropped without a reply".into()))?;

        match reply? {
            Some(location) => Ok(Some(location.into())),
            None => {
                debug!("No fresh fix available, falling back to last known");
                self.best_last_known()
            }
        }
    }
}
