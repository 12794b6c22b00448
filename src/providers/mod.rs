pub mod lifecycle;
pub mod setup;

pub use lifecycle::ProviderLifecycleManager;
pub use setup::{ProviderSetupResult, StepOutcome};
