//! Consolidated result of one apply or clear.
//!
//! Internally each backend carries a [`BackendOutcome`]; on the wire the status is
//! the flat `gpsApplied` / `gpsError` / ... map hosts already consume.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::providers::{ProviderSetupResult, StepOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendOutcome {
    #[default]
    NotAttempted,
    /// Applied for a set, cleared for a clear.
    Done,
    Failed(String),
}

impl BackendOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, BackendOutcome::Done)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BackendOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyStatus {
    pub gps: BackendOutcome,
    pub fused: BackendOutcome,
    /// Last provisioning run in this call; `None` when the provider was already ready.
    pub setup: Option<ProviderSetupResult>,
    pub mock_app_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearStatus {
    pub gps: BackendOutcome,
    pub fused: BackendOutcome,
    pub mock_app_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationStatus {
    /// No apply or clear has run yet.
    #[default]
    Empty,
    Applied(ApplyStatus),
    Cleared(ClearStatus),
}

fn opt_str(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_string()))
}

fn step_fields(map: &mut Map<String, Value>, name: &str, step: Option<&StepOutcome>) {
    map.insert(
        format!("{name}ProviderError"),
        opt_str(step.and_then(StepOutcome::error)),
    );
    map.insert(
        format!("{name}ProviderResult"),
        opt_str(step.and_then(StepOutcome::result_token)),
    );
}

impl OperationStatus {
    pub fn as_applied(&self) -> Option<&ApplyStatus> {
        match self {
            OperationStatus::Applied(status) => Some(status),
            _ => None,
        }
    }

    pub fn as_cleared(&self) -> Option<&ClearStatus> {
        match self {
            OperationStatus::Cleared(status) => Some(status),
            _ => None,
        }
    }

    /// Flat field map; every key for the operation kind is present, absent values are null.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            OperationStatus::Empty => {}
            OperationStatus::Applied(status) => {
                map.insert("gpsApplied".into(), Value::Bool(status.gps.is_done()));
                map.insert("fusedApplied".into(), Value::Bool(status.fused.is_done()));
                map.insert("gpsError".into(), opt_str(status.gps.error()));
                map.insert("fusedError".into(), opt_str(status.fused.error()));

                let setup = status.setup.as_ref();
                step_fields(&mut map, "add", setup.map(|s| &s.add));
                step_fields(&mut map, "enable", setup.map(|s| &s.enable));
                step_fields(&mut map, "status", setup.map(|s| &s.status));
                step_fields(&mut map, "remove", setup.map(|s| &s.remove));

                map.insert(
                    "mockAppSelected".into(),
                    Value::Bool(status.mock_app_selected),
                );
            }
            OperationStatus::Cleared(status) => {
                map.insert("gpsCleared".into(), Value::Bool(status.gps.is_done()));
                map.insert("fusedCleared".into(), Value::Bool(status.fused.is_done()));
                map.insert("gpsError".into(), opt_str(status.gps.error()));
                map.insert("fusedError".into(), opt_str(status.fused.error()));
                map.insert(
                    "mockAppSelected".into(),
                    Value::Bool(status.mock_app_selected),
                );
            }
        }
        map
    }
}

impl Serialize for OperationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}
