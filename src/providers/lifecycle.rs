use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    log_info, log_warn,
    models::{MockFix, ProviderProfile, ProviderStatus},
    platform::{Clock, LocationRegistry, ProviderResult},
};

use super::setup::{ProviderSetupResult, StepOutcome};

const ENABLE_LOGS: bool = true;

/// Owns the test-provider slots in the OS registry and tracks which are ready.
///
/// A provider only counts as ready once a fix has actually been written through
/// it; registration alone is provisional.
pub struct ProviderLifecycleManager {
    registry: Arc<dyn LocationRegistry>,
    clock: Arc<dyn Clock>,
    ready: HashSet<String>,
}

impl ProviderLifecycleManager {
    pub fn new(registry: Arc<dyn LocationRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            clock,
            ready: HashSet::new(),
        }
    }

    pub fn is_ready(&self, provider: &str) -> bool {
        self.ready.contains(provider)
    }

    pub fn mark_ready(&mut self, provider: &str) {
        self.ready.insert(provider.to_string());
    }

    pub fn mark_unready(&mut self, provider: &str) {
        self.ready.remove(provider);
    }

    /// Forgets all readiness so the next apply provisions from scratch.
    pub fn reset(&mut self) {
        self.ready.clear();
    }

    /// Provisions `provider` unless it is already ready, in which case no OS call is made.
    pub fn ensure(&mut self, provider: &str) -> Option<ProviderSetupResult> {
        if self.is_ready(provider) {
            return None;
        }
        Some(self.provision(provider))
    }

    /// Removes any stale registration, then adds, enables and marks the provider available.
    ///
    /// Never fails: each step is reported in the returned record. Enable and status
    /// are skipped when registration fails.
    pub fn provision(&mut self, provider: &str) -> ProviderSetupResult {
        // A provider that was never registered cannot be removed; that is expected.
        let remove = StepOutcome::from_result(self.registry.remove_test_provider(provider), "removed");

        let add = StepOutcome::from_result(
            self.registry.add_test_provider(provider, &ProviderProfile::MOCK),
            "added",
        );
        let success = add.is_done();

        let (enable, status) = if success {
            let enable = StepOutcome::from_result(
                self.registry.set_test_provider_enabled(provider, true),
                "enabled",
            );
            let status = StepOutcome::from_result(self.mark_available(provider), "available");
            (enable, status)
        } else {
            (StepOutcome::Skipped, StepOutcome::Skipped)
        };

        if success {
            log_info!("Provisioned test provider {}", provider);
        } else {
            log_warn!(
                "Failed to register test provider {}: {}",
                provider,
                add.error().unwrap_or("unknown")
            );
        }

        ProviderSetupResult {
            success,
            remove,
            add,
            enable,
            status,
        }
    }

    pub fn push(&self, provider: &str, fix: &MockFix) -> ProviderResult<()> {
        self.registry.set_test_provider_location(provider, fix)
    }

    pub fn mark_available(&self, provider: &str) -> ProviderResult<()> {
        self.registry
            .set_test_provider_status(provider, ProviderStatus::Available, self.clock.now())
    }

    pub fn remove(&self, provider: &str) -> ProviderResult<()> {
        self.registry.remove_test_provider(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{RegistryCall, RegistryOp, SimulatedLocationRegistry};
    use crate::platform::{ProviderError, SystemClock};

    fn manager() -> (Arc<SimulatedLocationRegistry>, ProviderLifecycleManager) {
        let registry = Arc::new(SimulatedLocationRegistry::new());
        let manager = ProviderLifecycleManager::new(registry.clone(), Arc::new(SystemClock));
        (registry, manager)
    }

    #[test]
    fn provision_on_fresh_registry_tolerates_failed_removal() {
        let (registry, mut manager) = manager();

        let result = manager.provision("gps");

        assert!(result.success);
        assert!(result.remove.error().unwrap().starts_with("IllegalArgument: "));
        assert_eq!(result.add, StepOutcome::Done("added"));
        assert_eq!(result.enable, StepOutcome::Done("enabled"));
        assert_eq!(result.status, StepOutcome::Done("available"));

        let slot = registry.test_slot("gps").unwrap();
        assert!(slot.enabled);
        assert_eq!(slot.status, Some(ProviderStatus::Available));
        assert_eq!(slot.profile, ProviderProfile::MOCK);
    }

    #[test]
    fn provision_replaces_stale_registration() {
        let (registry, mut manager) = manager();
        manager.provision("gps");

        let result = manager.provision("gps");

        assert_eq!(result.remove, StepOutcome::Done("removed"));
        assert!(result.success);
        assert!(registry.test_slot("gps").is_some());
    }

    #[test]
    fn failed_registration_skips_enable_and_status() {
        let (registry, mut manager) = manager();
        registry.fail_next(
            RegistryOp::Add,
            ProviderError::Security("not allowed to perform MOCK_LOCATION".into()),
        );

        let result = manager.provision("gps");

        assert!(!result.success);
        assert_eq!(
            result.add.error(),
            Some("Security: not allowed to perform MOCK_LOCATION")
        );
        assert_eq!(result.enable, StepOutcome::Skipped);
        assert_eq!(result.status, StepOutcome::Skipped);
        assert!(!registry
            .calls()
            .iter()
            .any(|call| matches!(call, RegistryCall::Enable(..) | RegistryCall::Status(..))));
    }

    #[test]
    fn enable_failure_does_not_undo_registration() {
        let (registry, mut manager) = manager();
        registry.fail_next(RegistryOp::Enable, ProviderError::Backend("binder died".into()));

        let result = manager.provision("gps");

        assert!(result.success);
        assert_eq!(result.enable.error(), Some("Backend: binder died"));
        assert_eq!(result.status, StepOutcome::Done("available"));
    }

    #[test]
    fn ensure_is_noop_once_ready() {
        let (registry, mut manager) = manager();
        assert!(manager.ensure("gps").is_some());
        manager.mark_ready("gps");
        registry.clear_calls();

        assert!(manager.ensure("gps").is_none());
        assert!(manager.ensure("gps").is_none());
        assert_eq!(registry.mutation_count(), 0);
    }

    #[test]
    fn registration_alone_does_not_make_ready() {
        let (_registry, mut manager) = manager();
        manager.ensure("gps");
        assert!(!manager.is_ready("gps"));
    }

    #[test]
    fn reset_forgets_readiness() {
        let (_registry, mut manager) = manager();
        manager.mark_ready("gps");
        manager.reset();
        assert!(!manager.is_ready("gps"));
    }
}
