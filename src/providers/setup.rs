use crate::platform::ProviderError;

/// Outcome of one provisioning sub-step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not attempted because an earlier step failed.
    Skipped,
    Done(&'static str),
    Failed(String),
}

impl StepOutcome {
    pub fn from_result(result: Result<(), ProviderError>, token: &'static str) -> Self {
        match result {
            Ok(()) => StepOutcome::Done(token),
            Err(err) => StepOutcome::Failed(err.describe()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done(_))
    }

    pub fn result_token(&self) -> Option<&'static str> {
        match self {
            StepOutcome::Done(token) => Some(token),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StepOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Per-step report from provisioning one test provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSetupResult {
    /// Registration went through; the slot can receive fixes.
    pub success: bool,
    pub remove: StepOutcome,
    pub add: StepOutcome,
    pub enable: StepOutcome,
    pub status: StepOutcome,
}
