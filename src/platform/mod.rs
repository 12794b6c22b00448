//! Seam between the mock-location logic and the host OS.
//!
//! Everything that touches the location registry, the fused client, app-ops or
//! system settings goes through the traits below. [`simulated`] provides an
//! in-memory implementation of all of them.

pub mod clock;
pub mod error;
pub mod simulated;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::models::{Location, MockFix, ProviderProfile, ProviderStatus};

pub use clock::{Clock, SystemClock};
pub use error::{ProviderError, ProviderResult};

/// The OS location registry, including its test-provider slots.
pub trait LocationRegistry: Send + Sync {
    fn remove_test_provider(&self, provider: &str) -> ProviderResult<()>;

    fn add_test_provider(&self, provider: &str, profile: &ProviderProfile) -> ProviderResult<()>;

    fn set_test_provider_enabled(&self, provider: &str, enabled: bool) -> ProviderResult<()>;

    fn set_test_provider_status(
        &self,
        provider: &str,
        status: ProviderStatus,
        updated_at: DateTime<Utc>,
    ) -> ProviderResult<()>;

    fn set_test_provider_location(&self, provider: &str, fix: &MockFix) -> ProviderResult<()>;

    /// Names of the providers that are currently enabled.
    fn enabled_providers(&self) -> ProviderResult<Vec<String>>;

    fn last_known_location(&self, provider: &str) -> ProviderResult<Option<Location>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    HighAccuracy,
    BalancedPowerAccuracy,
    LowPower,
}

/// Reply to a fresh-fix request. `Ok(None)` means the OS could not produce one.
pub type CurrentLocationReply = ProviderResult<Option<Location>>;

/// The platform's fused location service.
pub trait FusedLocationClient: Send + Sync {
    fn set_mock_mode(&self, enabled: bool) -> ProviderResult<()>;

    fn set_mock_location(&self, fix: &MockFix) -> ProviderResult<()>;

    /// Starts a fresh-fix request; the receiver yields exactly one reply.
    fn request_current_location(&self, priority: Priority) -> oneshot::Receiver<CurrentLocationReply>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpMode {
    Allowed,
    Ignored,
    Errored,
    Default,
}

/// App-ops registry, asked about this process's own grants.
pub trait AppOps: Send + Sync {
    fn check_mock_location_op(&self) -> ProviderResult<OpMode>;
}

pub trait SystemSettings: Send + Sync {
    fn developer_mode_enabled(&self) -> ProviderResult<bool>;

    /// Package currently selected as the mock-location app, if any.
    fn mock_location_app(&self) -> ProviderResult<Option<String>>;

    fn open_developer_settings(&self) -> ProviderResult<()>;
}

/// The set of OS handles one process works with.
#[derive(Clone)]
pub struct Platform {
    pub registry: Arc<dyn LocationRegistry>,
    pub fused: Option<Arc<dyn FusedLocationClient>>,
    pub app_ops: Arc<dyn AppOps>,
    pub settings: Arc<dyn SystemSettings>,
    pub clock: Arc<dyn Clock>,
}
