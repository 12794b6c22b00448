//! Read-only queries about this process's standing with the OS.
//!
//! All of these fail closed: a query error reads as "not granted" / "unknown".

use log::debug;

use crate::platform::{AppOps, OpMode, SystemSettings};

/// Whether this app holds the "allow mock location" grant. Not cached.
pub fn is_mock_location_app(app_ops: &dyn AppOps) -> bool {
    match app_ops.check_mock_location_op() {
        Ok(mode) => mode == OpMode::Allowed,
        Err(err) => {
            debug!("Mock location op check failed: {}", err.describe());
            false
        }
    }
}

pub fn is_developer_mode_enabled(settings: &dyn SystemSettings) -> bool {
    settings.developer_mode_enabled().unwrap_or_else(|err| {
        debug!("Developer mode query failed: {}", err.describe());
        false
    })
}

/// Package selected as the mock-location app in developer settings.
pub fn mock_location_app(settings: &dyn SystemSettings) -> Option<String> {
    settings.mock_location_app().unwrap_or_else(|err| {
        debug!("Mock location app query failed: {}", err.describe());
        None
    })
}
