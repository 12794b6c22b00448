/// Errors surfaced by the OS location layer.
///
/// The variants mirror the failure classes the registry distinguishes, so callers
/// can react to [`ProviderError::NotATestProvider`] without inspecting messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    NotATestProvider(String),

    #[error("{0}")]
    Security(String),

    #[error("{0}")]
    IllegalArgument(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Backend(String),
}

impl ProviderError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotATestProvider(_) => "NotATestProvider",
            ProviderError::Security(_) => "Security",
            ProviderError::IllegalArgument(_) => "IllegalArgument",
            ProviderError::Unavailable(_) => "Unavailable",
            ProviderError::Backend(_) => "Backend",
        }
    }

    pub fn is_not_a_test_provider(&self) -> bool {
        matches!(self, ProviderError::NotATestProvider(_))
    }

    /// `"Kind: message"`, used where the failing step has to be told apart in reports.
    pub fn describe(&self) -> String {
        let message = self.to_string();
        if message.is_empty() {
            format!("{}: unknown", self.kind())
        } else {
            format!("{}: {}", self.kind(), message)
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
