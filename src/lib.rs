pub mod capability;
pub mod commands;
pub mod location;
pub mod mock;
pub mod models;
pub mod platform;
pub mod providers;
pub mod settings;
pub mod utils;

use std::{path::Path, sync::Mutex};

use anyhow::{Context, Result};

use location::LocationQueryService;
use mock::MockLocationCoordinator;
use platform::Platform;
use settings::SettingsStore;

/// Process-wide state handed to every command.
pub struct AppState {
    pub(crate) coordinator: Mutex<MockLocationCoordinator>,
    pub(crate) locations: LocationQueryService,
    pub(crate) platform: Platform,
    pub(crate) settings: SettingsStore,
}

impl AppState {
    pub fn new(platform: Platform, settings: SettingsStore) -> Self {
        let coordinator = MockLocationCoordinator::new(&platform, &settings.mock());
        Self {
            coordinator: Mutex::new(coordinator),
            locations: LocationQueryService::new(&platform),
            platform,
            settings,
        }
    }
}

/// Initialize logging (reads RUST_LOG; `GPS_SPOOFER_DEBUG=1` lowers the floor to debug).
pub fn init_logging() {
    let debug_mode = std::env::var("GPS_SPOOFER_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let level = if debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // A host may already have installed a logger.
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// Builds the app state for a host, keeping settings under `data_dir`.
pub fn setup(platform: Platform, data_dir: &Path) -> Result<AppState> {
    init_logging();
    log::info!("GPS spoofer starting up...");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let settings = SettingsStore::new(data_dir.join("settings.json"))?;

    let mock = settings.mock();
    log::info!(
        "Mocking through test provider {} (fused: {})",
        mock.test_provider,
        if mock.use_fused && platform.fused.is_some() {
            "on"
        } else {
            "off"
        }
    );

    Ok(AppState::new(platform, settings))
}
