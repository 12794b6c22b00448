use serde::{Deserialize, Serialize};

/// Name of the GPS-class provider the OS exposes.
pub const GPS_PROVIDER: &str = "gps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerClass {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccuracyClass {
    Fine,
    Coarse,
}

/// Capabilities declared when registering a test provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub requires_network: bool,
    pub requires_satellite: bool,
    pub requires_cell: bool,
    pub has_monetary_cost: bool,
    pub supports_altitude: bool,
    pub supports_speed: bool,
    pub supports_bearing: bool,
    pub power: PowerClass,
    pub accuracy: AccuracyClass,
}

impl ProviderProfile {
    /// Profile every mock slot is registered with.
    pub const MOCK: ProviderProfile = ProviderProfile {
        requires_network: false,
        requires_satellite: false,
        requires_cell: false,
        has_monetary_cost: false,
        supports_altitude: true,
        supports_speed: true,
        supports_bearing: true,
        power: PowerClass::Low,
        accuracy: AccuracyClass::Fine,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderStatus {
    OutOfService,
    TemporarilyUnavailable,
    Available,
}
