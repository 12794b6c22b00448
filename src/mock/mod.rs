pub mod coordinator;
pub mod status;

pub use coordinator::{FusedMockHandle, MockLocationCoordinator};
pub use status::{ApplyStatus, BackendOutcome, ClearStatus, OperationStatus};
