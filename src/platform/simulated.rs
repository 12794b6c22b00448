//! In-memory stand-ins for the OS location stack.
//!
//! These follow the registry's observable rules (unknown providers are rejected,
//! duplicate registration fails, pushed fixes become the provider's last-known
//! location) and let callers queue failures per operation. Every call is recorded
//! so tests can assert on exactly which OS mutations happened.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::models::{Location, MockFix, ProviderProfile, ProviderStatus};

use super::{
    AppOps, Clock, CurrentLocationReply, FusedLocationClient, LocationRegistry, OpMode, Platform,
    Priority, ProviderError, ProviderResult, SystemClock, SystemSettings,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryOp {
    Remove,
    Add,
    Enable,
    Status,
    Push,
    EnabledProviders,
    LastKnown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    Remove(String),
    Add(String),
    Enable(String, bool),
    Status(String, ProviderStatus),
    Push(String),
    EnabledProviders,
    LastKnown(String),
}

impl RegistryCall {
    /// Whether the call changes registry state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RegistryCall::EnabledProviders | RegistryCall::LastKnown(_))
    }
}

/// Snapshot of one registered test provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSlot {
    pub profile: ProviderProfile,
    pub enabled: bool,
    pub status: Option<ProviderStatus>,
    pub last_fix: Option<MockFix>,
}

#[derive(Debug, Clone, Default)]
struct SystemProvider {
    enabled: bool,
    last_known: Option<Location>,
    denied: bool,
}

#[derive(Default)]
struct RegistryState {
    test_slots: HashMap<String, TestSlot>,
    system_providers: BTreeMap<String, SystemProvider>,
    failures: HashMap<RegistryOp, VecDeque<ProviderError>>,
    calls: Vec<RegistryCall>,
}

impl RegistryState {
    fn take_failure(&mut self, op: RegistryOp) -> ProviderResult<()> {
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn slot_mut(&mut self, provider: &str) -> ProviderResult<&mut TestSlot> {
        self.test_slots.get_mut(provider).ok_or_else(|| {
            ProviderError::NotATestProvider(format!(
                "Provider \"{provider}\" is not a test provider"
            ))
        })
    }
}

#[derive(Default)]
pub struct SimulatedLocationRegistry {
    state: Mutex<RegistryState>,
}

impl SimulatedLocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a real (non-test) provider.
    pub fn with_provider(self, provider: &str, enabled: bool) -> Self {
        lock(&self.state)
            .system_providers
            .entry(provider.to_string())
            .or_default()
            .enabled = enabled;
        self
    }

    pub fn set_last_known(&self, location: Location) {
        let mut state = lock(&self.state);
        let entry = state
            .system_providers
            .entry(location.provider.clone())
            .or_insert_with(|| SystemProvider {
                enabled: true,
                ..SystemProvider::default()
            });
        entry.last_known = Some(location);
    }

    /// Makes last-known reads for `provider` fail with a permission error.
    pub fn deny_last_known(&self, provider: &str) {
        lock(&self.state)
            .system_providers
            .entry(provider.to_string())
            .or_default()
            .denied = true;
    }

    /// Queues a failure for the next call of `op`.
    pub fn fail_next(&self, op: RegistryOp, error: ProviderError) {
        lock(&self.state)
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Drops every test provider, as the OS does when the mock app is deselected.
    pub fn forget_test_providers(&self) {
        lock(&self.state).test_slots.clear();
    }

    pub fn test_slot(&self, provider: &str) -> Option<TestSlot> {
        lock(&self.state).test_slots.get(provider).cloned()
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        lock(&self.state).calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

impl LocationRegistry for SimulatedLocationRegistry {
    fn remove_test_provider(&self, provider: &str) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(RegistryCall::Remove(provider.to_string()));
        state.take_failure(RegistryOp::Remove)?;
        state
            .test_slots
            .remove(provider)
            .map(|_| ())
            .ok_or_else(|| ProviderError::IllegalArgument(format!("Provider \"{provider}\" unknown")))
    }

    fn add_test_provider(&self, provider: &str, profile: &ProviderProfile) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(RegistryCall::Add(provider.to_string()));
        state.take_failure(RegistryOp::Add)?;
        if state.test_slots.contains_key(provider) {
            return Err(ProviderError::IllegalArgument(format!(
                "Provider \"{provider}\" already exists"
            )));
        }
        state.test_slots.insert(
            provider.to_string(),
            TestSlot {
                profile: *profile,
                enabled: false,
                status: None,
                last_fix: None,
            },
        );
        Ok(())
    }

    fn set_test_provider_enabled(&self, provider: &str, enabled: bool) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state
            .calls
            .push(RegistryCall::Enable(provider.to_string(), enabled));
        state.take_failure(RegistryOp::Enable)?;
        state.slot_mut(provider)?.enabled = enabled;
        Ok(())
    }

    fn set_test_provider_status(
        &self,
        provider: &str,
        status: ProviderStatus,
        _updated_at: DateTime<Utc>,
    ) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state
            .calls
            .push(RegistryCall::Status(provider.to_string(), status));
        state.take_failure(RegistryOp::Status)?;
        state.slot_mut(provider)?.status = Some(status);
        Ok(())
    }

    fn set_test_provider_location(&self, provider: &str, fix: &MockFix) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(RegistryCall::Push(provider.to_string()));
        state.take_failure(RegistryOp::Push)?;
        state.slot_mut(provider)?.last_fix = Some(fix.clone());
        Ok(())
    }

    fn enabled_providers(&self) -> ProviderResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.calls.push(RegistryCall::EnabledProviders);
        state.take_failure(RegistryOp::EnabledProviders)?;

        let mut names: Vec<String> = state
            .system_providers
            .iter()
            .filter(|(_, provider)| provider.enabled)
            .map(|(name, _)| name.clone())
            .collect();
        for (name, slot) in &state.test_slots {
            if slot.enabled && !names.contains(name) {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    fn last_known_location(&self, provider: &str) -> ProviderResult<Option<Location>> {
        let mut state = lock(&self.state);
        state.calls.push(RegistryCall::LastKnown(provider.to_string()));
        state.take_failure(RegistryOp::LastKnown)?;

        // An enabled test provider shadows the real one of the same name.
        if let Some(slot) = state.test_slots.get(provider) {
            if slot.enabled {
                return Ok(slot.last_fix.as_ref().map(Location::from));
            }
        }
        match state.system_providers.get(provider) {
            Some(entry) if entry.denied => Err(ProviderError::Security(format!(
                "missing location permission for provider \"{provider}\""
            ))),
            Some(entry) => Ok(entry.last_known.clone()),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FusedOp {
    SetMockMode,
    SetMockLocation,
}

#[derive(Default)]
struct FusedState {
    mock_mode: bool,
    mode_changes: Vec<bool>,
    pushed: Vec<MockFix>,
    failures: HashMap<FusedOp, VecDeque<ProviderError>>,
    replies: VecDeque<Option<CurrentLocationReply>>,
}

impl FusedState {
    fn take_failure(&mut self, op: FusedOp) -> ProviderResult<()> {
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct SimulatedFusedClient {
    state: Mutex<FusedState>,
}

impl SimulatedFusedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, op: FusedOp, error: ProviderError) {
        lock(&self.state)
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Queues the reply for the next fresh-fix request.
    pub fn reply_next(&self, reply: CurrentLocationReply) {
        lock(&self.state).replies.push_back(Some(reply));
    }

    /// The next fresh-fix request is dropped without a reply.
    pub fn abandon_next(&self) {
        lock(&self.state).replies.push_back(None);
    }

    pub fn mock_mode(&self) -> bool {
        lock(&self.state).mock_mode
    }

    /// Every `set_mock_mode` value that reached the client, in order.
    pub fn mode_changes(&self) -> Vec<bool> {
        lock(&self.state).mode_changes.clone()
    }

    /// Fixes accepted while mock mode was on, as built by the caller.
    pub fn pushed(&self) -> Vec<MockFix> {
        lock(&self.state).pushed.clone()
    }
}

impl FusedLocationClient for SimulatedFusedClient {
    fn set_mock_mode(&self, enabled: bool) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state.take_failure(FusedOp::SetMockMode)?;
        state.mode_changes.push(enabled);
        state.mock_mode = enabled;
        Ok(())
    }

    fn set_mock_location(&self, fix: &MockFix) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        state.take_failure(FusedOp::SetMockLocation)?;
        if !state.mock_mode {
            return Err(ProviderError::IllegalArgument(
                "mock mode is not enabled".to_string(),
            ));
        }
        state.pushed.push(fix.clone());
        Ok(())
    }

    fn request_current_location(&self, _priority: Priority) -> oneshot::Receiver<CurrentLocationReply> {
        let (tx, rx) = oneshot::channel();
        let mut state = lock(&self.state);
        let queued = state.replies.pop_front();
        let reply = match queued {
            Some(Some(reply)) => reply,
            Some(None) => return rx,
            None if state.mock_mode => Ok(state.pushed.last().map(Location::from)),
            None => Ok(None),
        };
        let _ = tx.send(reply);
        rx
    }
}

pub struct SimulatedAppOps {
    mode: Mutex<ProviderResult<OpMode>>,
}

impl SimulatedAppOps {
    pub fn granted() -> Self {
        Self::with_mode(Ok(OpMode::Allowed))
    }

    pub fn denied() -> Self {
        Self::with_mode(Ok(OpMode::Errored))
    }

    pub fn with_mode(mode: ProviderResult<OpMode>) -> Self {
        Self {
            mode: Mutex::new(mode),
        }
    }

    pub fn set_mode(&self, mode: ProviderResult<OpMode>) {
        *lock(&self.mode) = mode;
    }
}

impl AppOps for SimulatedAppOps {
    fn check_mock_location_op(&self) -> ProviderResult<OpMode> {
        lock(&self.mode).clone()
    }
}

struct SettingsState {
    developer_mode: ProviderResult<bool>,
    mock_location_app: ProviderResult<Option<String>>,
    open_failure: Option<ProviderError>,
    opened: usize,
}

pub struct SimulatedSystemSettings {
    state: Mutex<SettingsState>,
}

impl Default for SimulatedSystemSettings {
    fn default() -> Self {
        Self {
            state: Mutex::new(SettingsState {
                developer_mode: Ok(true),
                mock_location_app: Ok(None),
                open_failure: None,
                opened: 0,
            }),
        }
    }
}

impl SimulatedSystemSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_developer_mode(&self, enabled: ProviderResult<bool>) {
        lock(&self.state).developer_mode = enabled;
    }

    pub fn set_mock_location_app(&self, app: ProviderResult<Option<String>>) {
        lock(&self.state).mock_location_app = app;
    }

    pub fn fail_open(&self, error: ProviderError) {
        lock(&self.state).open_failure = Some(error);
    }

    pub fn opened(&self) -> usize {
        lock(&self.state).opened
    }
}

impl SystemSettings for SimulatedSystemSettings {
    fn developer_mode_enabled(&self) -> ProviderResult<bool> {
        lock(&self.state).developer_mode.clone()
    }

    fn mock_location_app(&self) -> ProviderResult<Option<String>> {
        lock(&self.state).mock_location_app.clone()
    }

    fn open_developer_settings(&self) -> ProviderResult<()> {
        let mut state = lock(&self.state);
        if let Some(err) = state.open_failure.take() {
            return Err(err);
        }
        state.opened += 1;
        Ok(())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<(DateTime<Utc>, Duration)>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new((start, Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        now.0 += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        now.1 += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        lock(&self.now).0
    }

    fn elapsed_realtime(&self) -> Option<Duration> {
        Some(lock(&self.now).1)
    }
}

/// Concrete handles behind a [`Platform`], kept so callers can steer them.
#[derive(Clone)]
pub struct SimulatedPlatform {
    pub registry: Arc<SimulatedLocationRegistry>,
    pub fused: Option<Arc<SimulatedFusedClient>>,
    pub app_ops: Arc<SimulatedAppOps>,
    pub settings: Arc<SimulatedSystemSettings>,
    pub clock: Arc<dyn Clock>,
}

impl SimulatedPlatform {
    /// GPS and network providers enabled, fused client present, mock grant held.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(
                SimulatedLocationRegistry::new()
                    .with_provider("gps", true)
                    .with_provider("network", true),
            ),
            fused: Some(Arc::new(SimulatedFusedClient::new())),
            app_ops: Arc::new(SimulatedAppOps::granted()),
            settings: Arc::new(SimulatedSystemSettings::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn without_fused(mut self) -> Self {
        self.fused = None;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn platform(&self) -> Platform {
        Platform {
            registry: self.registry.clone(),
            fused: self
                .fused
                .clone()
                .map(|fused| fused as Arc<dyn FusedLocationClient>),
            app_ops: self.app_ops.clone(),
            settings: self.settings.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}
