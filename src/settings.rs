use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::models::{MockRequest, GPS_PROVIDER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockSettings {
    /// Test provider the coordinator provisions and writes through.
    pub test_provider: String,
    pub default_accuracy_m: f64,
    pub default_speed_mps: f64,
    /// When false the fused client is left alone during apply/clear.
    pub use_fused: bool,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            test_provider: GPS_PROVIDER.into(),
            default_accuracy_m: MockRequest::DEFAULT_ACCURACY_M,
            default_speed_mps: MockRequest::DEFAULT_SPEED_MPS,
            use_fused: true,
        }
    }
}

impl MockSettings {
    /// Rejects values that would make later applies fail or provision a nameless provider.
    pub fn validate(&self) -> Result<()> {
        if self.test_provider.trim().is_empty() {
            bail!("Test provider name must not be empty");
        }
        if !MockRequest::is_valid_magnitude(self.default_accuracy_m) {
            bail!("Invalid default accuracy: {}", self.default_accuracy_m);
        }
        if !MockRequest::is_valid_magnitude(self.default_speed_mps) {
            bail!("Invalid default speed: {}", self.default_speed_mps);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    mock: MockSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<UserSettings>(&contents) {
                Ok(data) => match data.mock.validate() {
                    Ok(()) => data,
                    Err(err) => {
                        warn!("Ignoring invalid settings in {}: {}", path.display(), err);
                        UserSettings::default()
                    }
                },
                Err(err) => {
                    warn!("Ignoring malformed settings in {}: {}", path.display(), err);
                    UserSettings::default()
                }
            }
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn mock(&self) -> MockSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .mock
            .clone()
    }

    pub fn update_mock(&self, settings: MockSettings) -> Result<()> {
        settings.validate()?;
        {
            let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
            guard.mock = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
