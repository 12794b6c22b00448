//! Command boundary for the host messaging layer.
//!
//! Each command takes its JSON arguments and answers with a JSON value or a
//! `{code, message}` error. Backend failures inside apply/clear are not errors
//! here; they are reported in the returned status.

use std::sync::{MutexGuard, PoisonError};

use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    capability,
    mock::{MockLocationCoordinator, OperationStatus},
    models::{LocationFix, MockRequest},
    settings::MockSettings,
    AppState,
};

pub const ARGUMENT_ERROR: &str = "ARGUMENT_ERROR";
pub const MOCK_LOCATION_ERROR: &str = "MOCK_LOCATION_ERROR";
pub const MOCK_CLEAR_ERROR: &str = "MOCK_CLEAR_ERROR";
pub const LOCATION_ERROR: &str = "LOCATION_ERROR";
pub const SETTINGS_ERROR: &str = "SETTINGS_ERROR";
pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandError {
    pub code: &'static str,
    pub message: String,
}

impl CommandError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub type CommandResult = Result<Value, CommandError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMockLocationArgs {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub speed_mps: Option<f64>,
}

impl SetMockLocationArgs {
    fn into_request(self, defaults: &MockSettings) -> Result<MockRequest, CommandError> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(CommandError::new(ARGUMENT_ERROR, "Missing latitude/longitude"));
        };
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CommandError::new(
                ARGUMENT_ERROR,
                format!("Latitude out of range: {latitude}"),
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CommandError::new(
                ARGUMENT_ERROR,
                format!("Longitude out of range: {longitude}"),
            ));
        }

        let accuracy = self.accuracy.unwrap_or(defaults.default_accuracy_m);
        let speed_mps = self.speed_mps.unwrap_or(defaults.default_speed_mps);
        if !MockRequest::is_valid_magnitude(accuracy) || !MockRequest::is_valid_magnitude(speed_mps)
        {
            return Err(CommandError::new(
                ARGUMENT_ERROR,
                "Accuracy and speed must be finite and not negative",
            ));
        }

        Ok(MockRequest::new(latitude, longitude)
            .with_accuracy(accuracy)
            .with_speed(speed_mps))
    }
}

fn decode_args<T>(args: Value) -> Result<T, CommandError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args).map_err(|e| CommandError::new(ARGUMENT_ERROR, e.to_string()))
}

fn encode<T: Serialize>(value: T) -> CommandResult {
    serde_json::to_value(value).map_err(|e| {
        error!("Failed to encode command result: {}", e);
        CommandError::new(TRANSPORT_ERROR, e.to_string())
    })
}

fn coordinator<'a>(
    state: &'a AppState,
    code: &'static str,
) -> Result<MutexGuard<'a, MockLocationCoordinator>, CommandError> {
    state
        .coordinator
        .lock()
        .map_err(|e| CommandError::new(code, e.to_string()))
}

pub fn set_mock_location(
    state: &AppState,
    args: SetMockLocationArgs,
) -> Result<OperationStatus, CommandError> {
    let request = args.into_request(&state.settings.mock())?;
    let mut coordinator = coordinator(state, MOCK_LOCATION_ERROR)?;
    Ok(coordinator.set_mock_location(request))
}

pub fn clear_mock_location(state: &AppState) -> Result<OperationStatus, CommandError> {
    let mut coordinator = coordinator(state, MOCK_CLEAR_ERROR)?;
    Ok(coordinator.clear_mock_location())
}

pub fn get_last_known_location(state: &AppState) -> Result<Option<LocationFix>, CommandError> {
    state
        .locations
        .best_last_known()
        .map_err(|e| CommandError::new(LOCATION_ERROR, e.to_string()))
}

pub async fn get_current_location(state: &AppState) -> Result<Option<LocationFix>, CommandError> {
    state
        .locations
        .current_location()
        .await
        .map_err(|e| CommandError::new(LOCATION_ERROR, e.to_string()))
}

/// Cached status of the last apply/clear; `{}` before either has run.
pub fn get_mock_debug(state: &AppState) -> OperationStatus {
    state
        .coordinator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .last_status()
}

pub fn is_mock_location_app(state: &AppState) -> bool {
    capability::is_mock_location_app(state.platform.app_ops.as_ref())
}

pub fn is_developer_mode_enabled(state: &AppState) -> bool {
    capability::is_developer_mode_enabled(state.platform.settings.as_ref())
}

pub fn get_mock_location_app(state: &AppState) -> Option<String> {
    capability::mock_location_app(state.platform.settings.as_ref())
}

pub fn open_developer_settings(state: &AppState) -> Result<bool, CommandError> {
    state
        .platform
        .settings
        .open_developer_settings()
        .map(|()| true)
        .map_err(|e| CommandError::new(SETTINGS_ERROR, e.to_string()))
}

pub fn get_mock_settings(state: &AppState) -> MockSettings {
    state.settings.mock()
}

/// Stores new defaults. Accuracy and speed defaults apply to the next call; the
/// provider name and fused choice are read when the state is built.
pub fn set_mock_settings(state: &AppState, settings: MockSettings) -> Result<(), CommandError> {
    state
        .settings
        .update_mock(settings)
        .map_err(|e| CommandError::new(SETTINGS_ERROR, format!("{e:#}")))
}

/// Dispatches one request by method name.
pub async fn handle_command(state: &AppState, method: &str, args: Value) -> CommandResult {
    info!("Handling command {}", method);

    match method {
        "setMockLocation" => encode(set_mock_location(state, decode_args(args)?)?),
        "clearMockLocation" => encode(clear_mock_location(state)?),
        "getLastKnownLocation" => encode(get_last_known_location(state)?),
        "getCurrentLocation" => encode(get_current_location(state).await?),
        "getMockDebug" => encode(get_mock_debug(state)),
        "isMockLocationApp" => encode(is_mock_location_app(state)),
        "isDeveloperModeEnabled" => encode(is_developer_mode_enabled(state)),
        "getMockLocationApp" => encode(get_mock_location_app(state)),
        "openDeveloperSettings" => encode(open_developer_settings(state)?),
        "getMockSettings" => encode(get_mock_settings(state)),
        "setMockSettings" => {
            let settings: MockSettings = decode_args(args)?;
            set_mock_settings(state, settings)?;
            encode(true)
        }
        other => Err(CommandError::new(
            NOT_IMPLEMENTED,
            format!("Unknown method: {other}"),
        )),
    }
}
