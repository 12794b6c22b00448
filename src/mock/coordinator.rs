use std::sync::Arc;

use crate::{
    capability, log_debug, log_info, log_warn,
    models::{MockFix, MockRequest},
    platform::{AppOps, Clock, FusedLocationClient, Platform, ProviderError, ProviderResult},
    providers::{ProviderLifecycleManager, ProviderSetupResult},
    settings::MockSettings,
};

use super::status::{ApplyStatus, BackendOutcome, ClearStatus, OperationStatus};

const ENABLE_LOGS: bool = true;

/// Provider name stamped on fixes sent to the fused client.
pub const FUSED_PROVIDER: &str = "fused";

/// Tracks whether the fused client's mock mode is on. Toggles are idempotent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FusedMockHandle {
    enabled: bool,
}

impl FusedMockHandle {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable(&mut self, client: &dyn FusedLocationClient) -> ProviderResult<()> {
        if !self.enabled {
            client.set_mock_mode(true)?;
            self.enabled = true;
        }
        Ok(())
    }

    /// Returns whether mock mode was actually switched off.
    fn disable(&mut self, client: &dyn FusedLocationClient) -> ProviderResult<bool> {
        if !self.enabled {
            return Ok(false);
        }
        client.set_mock_mode(false)?;
        self.enabled = false;
        Ok(true)
    }
}

fn failure_reason(err: &ProviderError) -> String {
    let message = err.to_string();
    if message.is_empty() {
        err.describe()
    } else {
        message
    }
}

/// Applies and clears mock fixes across the fused client and the test-provider
/// registry, and keeps the last consolidated status for diagnostics.
///
/// One instance per process. Methods take `&mut self`; callers that share it
/// wrap it in a mutex, which also serializes apply against clear.
pub struct MockLocationCoordinator {
    providers: ProviderLifecycleManager,
    fused: Option<Arc<dyn FusedLocationClient>>,
    fused_mock: FusedMockHandle,
    app_ops: Arc<dyn AppOps>,
    clock: Arc<dyn Clock>,
    test_provider: String,
    last_status: OperationStatus,
}

impl MockLocationCoordinator {
    pub fn new(platform: &Platform, settings: &MockSettings) -> Self {
        let fused = if settings.use_fused {
            platform.fused.clone()
        } else {
            None
        };

        Self {
            providers: ProviderLifecycleManager::new(
                platform.registry.clone(),
                platform.clock.clone(),
            ),
            fused,
            fused_mock: FusedMockHandle::default(),
            app_ops: platform.app_ops.clone(),
            clock: platform.clock.clone(),
            test_provider: settings.test_provider.clone(),
            last_status: OperationStatus::Empty,
        }
    }

    pub fn fused_mock_enabled(&self) -> bool {
        self.fused_mock.is_enabled()
    }

    pub fn is_provider_ready(&self) -> bool {
        self.providers.is_ready(&self.test_provider)
    }

    /// Last apply/clear result, or [`OperationStatus::Empty`] if neither has run.
    pub fn last_status(&self) -> OperationStatus {
        self.last_status.clone()
    }

    /// Pushes `request` to both backends. Backend failures end up in the status,
    /// never as an error.
    pub fn set_mock_location(&mut self, request: MockRequest) -> OperationStatus {
        let fused = self.apply_fused(&request);
        let (gps, setup) = self.apply_test_provider(&request);

        log_info!(
            "Mock location {:.6},{:.6} applied (gps: {:?}, fused: {:?})",
            request.latitude,
            request.longitude,
            gps,
            fused
        );

        let status = OperationStatus::Applied(ApplyStatus {
            gps,
            fused,
            setup,
            mock_app_selected: capability::is_mock_location_app(self.app_ops.as_ref()),
        });
        self.last_status = status.clone();
        status
    }

    /// Removes the test provider and turns fused mock mode off.
    ///
    /// Readiness is reset even when removal fails, so the next apply provisions
    /// from scratch.
    pub fn clear_mock_location(&mut self) -> OperationStatus {
        let gps = match self.providers.remove(&self.test_provider) {
            Ok(()) => BackendOutcome::Done,
            Err(err) => BackendOutcome::Failed(failure_reason(&err)),
        };

        let fused = match self.fused.clone() {
            None => BackendOutcome::NotAttempted,
            Some(client) => match self.fused_mock.disable(client.as_ref()) {
                Ok(true) => BackendOutcome::Done,
                Ok(false) => BackendOutcome::NotAttempted,
                Err(err) => {
                    log_warn!("Failed to disable fused mock mode: {}", err.describe());
                    BackendOutcome::Failed(failure_reason(&err))
                }
            },
        };

        self.providers.reset();

        log_info!("Mock location cleared (gps: {:?}, fused: {:?})", gps, fused);

        let status = OperationStatus::Cleared(ClearStatus {
            gps,
            fused,
            mock_app_selected: capability::is_mock_location_app(self.app_ops.as_ref()),
        });
        self.last_status = status.clone();
        status
    }

    fn build_fix(&self, provider: &str, request: &MockRequest) -> MockFix {
        MockFix::new(
            provider,
            request,
            self.clock.now(),
            self.clock.elapsed_realtime(),
        )
    }

    fn apply_fused(&mut self, request: &MockRequest) -> BackendOutcome {
        let Some(client) = self.fused.clone() else {
            return BackendOutcome::NotAttempted;
        };

        let fix = self.build_fix(FUSED_PROVIDER, request);
        let result = self
            .fused_mock
            .enable(client.as_ref())
            .and_then(|()| client.set_mock_location(&fix));

        match result {
            Ok(()) => BackendOutcome::Done,
            Err(err) => {
                log_warn!("Fused mock location failed: {}", err.describe());
                BackendOutcome::Failed(failure_reason(&err))
            }
        }
    }

    fn apply_test_provider(
        &mut self,
        request: &MockRequest,
    ) -> (BackendOutcome, Option<ProviderSetupResult>) {
        let provider = self.test_provider.clone();
        let mut setup = self.providers.ensure(&provider);
        let fix = self.build_fix(&provider, request);

        let err = match self.providers.push(&provider, &fix) {
            Ok(()) => {
                self.on_applied(&provider);
                return (BackendOutcome::Done, setup);
            }
            Err(err) => err,
        };

        if !err.is_not_a_test_provider() {
            log_warn!("Test provider {} rejected fix: {}", provider, err.describe());
            return (BackendOutcome::Failed(failure_reason(&err)), setup);
        }

        // The OS dropped our registration; provision again and retry exactly once.
        log_warn!("Test provider {} is not registered, re-provisioning", provider);
        self.providers.mark_unready(&provider);
        let retry_setup = self.providers.provision(&provider);
        let provisioned = retry_setup.success;
        setup = Some(retry_setup);

        if !provisioned {
            return (BackendOutcome::Failed(failure_reason(&err)), setup);
        }

        match self.providers.push(&provider, &fix) {
            Ok(()) => {
                self.on_applied(&provider);
                (BackendOutcome::Done, setup)
            }
            Err(retry_err) => {
                log_warn!(
                    "Test provider {} rejected fix after re-provisioning: {}",
                    provider,
                    retry_err.describe()
                );
                (BackendOutcome::Failed(failure_reason(&retry_err)), setup)
            }
        }
    }

    fn on_applied(&mut self, provider: &str) {
        self.providers.mark_ready(provider);
        if let Err(err) = self.providers.mark_available(provider) {
            log_debug!("Ignoring status failure for {}: {}", provider, err.describe());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{
        FusedOp, ManualClock, RegistryCall, RegistryOp, SimulatedAppOps, SimulatedPlatform,
    };
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use crate::platform::OpMode;
    use crate::providers::StepOutcome;

    fn coordinator(sim: &SimulatedPlatform) -> MockLocationCoordinator {
        MockLocationCoordinator::new(&sim.platform(), &MockSettings::default())
    }

    fn applied(status: &OperationStatus) -> &ApplyStatus {
        status.as_applied().expect("apply status")
    }

    #[test]
    fn fresh_apply_provisions_and_marks_ready() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);

        let status = coordinator.set_mock_location(
            MockRequest::new(37.422, -122.084)
                .with_accuracy(5.0)
                .with_speed(1.5),
        );
        let status = applied(&status);

        assert_eq!(status.gps, BackendOutcome::Done);
        assert_eq!(status.fused, BackendOutcome::Done);
        assert!(status.mock_app_selected);
        let setup = status.setup.as_ref().unwrap();
        assert!(setup.success);
        assert_eq!(setup.add, StepOutcome::Done("added"));
        assert!(coordinator.is_provider_ready());
        assert!(coordinator.fused_mock_enabled());

        let slot = sim.registry.test_slot("gps").unwrap();
        let fix = slot.last_fix.unwrap();
        assert_eq!(fix.latitude(), 37.422);
        assert_eq!(fix.accuracy(), 5.0);
    }

    #[test]
    fn each_backend_gets_its_own_stamped_fix() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        clock.advance(Duration::from_secs(90));
        let sim = SimulatedPlatform::new().with_clock(clock.clone());
        let mut coordinator = coordinator(&sim);

        coordinator.set_mock_location(MockRequest::new(48.858, 2.294).with_speed(2.0));

        let gps = sim.registry.test_slot("gps").unwrap().last_fix.unwrap();
        let fused = sim.fused.as_ref().unwrap().pushed();
        assert_eq!(fused.len(), 1);
        let fused = &fused[0];

        assert_eq!(gps.provider(), "gps");
        assert_eq!(fused.provider(), FUSED_PROVIDER);
        for fix in [&gps, fused] {
            assert_eq!(fix.timestamp(), start + chrono::Duration::seconds(90));
            assert_eq!(fix.elapsed_realtime(), Some(Duration::from_secs(90)));
            assert_eq!(fix.latitude(), 48.858);
            assert_eq!(fix.speed(), 2.0);
        }

        clock.advance(Duration::from_secs(10));
        coordinator.set_mock_location(MockRequest::new(48.858, 2.294));
        let gps = sim.registry.test_slot("gps").unwrap().last_fix.unwrap();
        assert_eq!(gps.elapsed_realtime(), Some(Duration::from_secs(100)));
        assert_eq!(gps.timestamp(), start + chrono::Duration::seconds(100));
    }

    #[test]
    fn second_apply_skips_provisioning() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);
        coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        sim.registry.clear_calls();

        let status = coordinator.set_mock_location(MockRequest::new(2.0, 2.0));

        assert!(applied(&status).setup.is_none());
        assert_eq!(
            sim.registry.calls(),
            vec![
                RegistryCall::Push("gps".into()),
                RegistryCall::Status("gps".into(), crate::models::ProviderStatus::Available),
            ]
        );
        assert_eq!(sim.fused.as_ref().unwrap().mode_changes(), vec![true]);
    }

    #[test]
    fn failed_registration_reports_push_error() {
        let sim = SimulatedPlatform::new();
        sim.registry.fail_next(
            RegistryOp::Add,
            ProviderError::Security("not allowed to perform MOCK_LOCATION".into()),
        );
        sim.registry.fail_next(
            RegistryOp::Add,
            ProviderError::Security("not allowed to perform MOCK_LOCATION".into()),
        );
        let mut coordinator = coordinator(&sim);

        let status = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        let status = applied(&status);

        assert_eq!(
            status.gps,
            BackendOutcome::Failed("Provider \"gps\" is not a test provider".into())
        );
        assert_eq!(
            status.setup.as_ref().unwrap().add.error(),
            Some("Security: not allowed to perform MOCK_LOCATION")
        );
        assert!(!coordinator.is_provider_ready());
    }

    #[test]
    fn other_push_errors_are_not_retried() {
        let sim = SimulatedPlatform::new();
        sim.registry
            .fail_next(RegistryOp::Push, ProviderError::IllegalArgument("bad fix".into()));
        let mut coordinator = coordinator(&sim);

        let status = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));

        assert_eq!(
            applied(&status).gps,
            BackendOutcome::Failed("bad fix".into())
        );
        let pushes = sim
            .registry
            .calls()
            .into_iter()
            .filter(|call| matches!(call, RegistryCall::Push(_)))
            .count();
        assert_eq!(pushes, 1);
    }

    #[test]
    fn status_failure_after_push_keeps_applied() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);
        coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        sim.registry
            .fail_next(RegistryOp::Status, ProviderError::Backend("status rejected".into()));

        let status = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));

        assert_eq!(applied(&status).gps, BackendOutcome::Done);
    }

    #[test]
    fn fused_toggle_failure_is_retried_next_apply() {
        let sim = SimulatedPlatform::new();
        let fused = sim.fused.clone().unwrap();
        fused.fail_next(FusedOp::SetMockMode, ProviderError::Security("no grant".into()));
        let mut coordinator = coordinator(&sim);

        let first = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        assert_eq!(applied(&first).fused, BackendOutcome::Failed("no grant".into()));
        assert!(!coordinator.fused_mock_enabled());

        let second = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        assert_eq!(applied(&second).fused, BackendOutcome::Done);
        assert_eq!(fused.mode_changes(), vec![true]);
    }

    #[test]
    fn fused_disabled_by_settings_is_not_attempted() {
        let sim = SimulatedPlatform::new();
        let settings = MockSettings {
            use_fused: false,
            ..MockSettings::default()
        };
        let mut coordinator = MockLocationCoordinator::new(&sim.platform(), &settings);

        let status = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));

        assert_eq!(applied(&status).fused, BackendOutcome::NotAttempted);
        assert!(sim.fused.as_ref().unwrap().mode_changes().is_empty());
    }

    #[test]
    fn mock_app_flag_follows_grant() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);
        sim.app_ops.set_mode(Ok(OpMode::Ignored));

        let status = coordinator.set_mock_location(MockRequest::new(1.0, 1.0));

        assert!(!applied(&status).mock_app_selected);
        assert_eq!(applied(&status).gps, BackendOutcome::Done);
    }

    #[test]
    fn clear_disables_fused_and_resets_readiness() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);
        coordinator.set_mock_location(MockRequest::new(1.0, 1.0));

        let status = coordinator.clear_mock_location();
        let cleared = status.as_cleared().unwrap();

        assert_eq!(cleared.gps, BackendOutcome::Done);
        assert_eq!(cleared.fused, BackendOutcome::Done);
        assert!(!coordinator.is_provider_ready());
        assert!(!coordinator.fused_mock_enabled());
        assert!(sim.registry.test_slot("gps").is_none());
        assert_eq!(coordinator.last_status(), status);
    }

    #[test]
    fn clear_resets_readiness_even_if_removal_fails() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);
        coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        sim.registry
            .fail_next(RegistryOp::Remove, ProviderError::Security("denied".into()));

        let status = coordinator.clear_mock_location();

        assert_eq!(
            status.as_cleared().unwrap().gps,
            BackendOutcome::Failed("denied".into())
        );
        assert!(!coordinator.is_provider_ready());
    }

    #[test]
    fn fused_disable_failure_keeps_handle_enabled() {
        let sim = SimulatedPlatform::new();
        let mut coordinator = coordinator(&sim);
        coordinator.set_mock_location(MockRequest::new(1.0, 1.0));
        sim.fused
            .as_ref()
            .unwrap()
            .fail_next(FusedOp::SetMockMode, ProviderError::Backend("gms down".into()));

        let status = coordinator.clear_mock_location();

        assert_eq!(
            status.as_cleared().unwrap().fused,
            BackendOutcome::Failed("gms down".into())
        );
        assert!(coordinator.fused_mock_enabled());
    }

    #[test]
    fn last_status_starts_empty() {
        let sim = SimulatedPlatform::new();
        let coordinator = coordinator(&sim);
        assert_eq!(coordinator.last_status(), OperationStatus::Empty);
    }

    #[test]
    fn mock_app_selected_is_rechecked_on_clear() {
        let sim = SimulatedPlatform {
            app_ops: Arc::new(SimulatedAppOps::denied()),
            ..SimulatedPlatform::new()
        };
        let mut coordinator = coordinator(&sim);

        let status = coordinator.clear_mock_location();
        assert!(!status.as_cleared().unwrap().mock_app_selected);

        sim.app_ops.set_mode(Ok(OpMode::Allowed));
        let status = coordinator.clear_mock_location();
        assert!(status.as_cleared().unwrap().mock_app_selected);
    }
}
