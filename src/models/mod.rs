pub mod location;
pub mod provider;

pub use location::{Location, LocationFix, MockFix, MockRequest};
pub use provider::{AccuracyClass, PowerClass, ProviderProfile, ProviderStatus, GPS_PROVIDER};
