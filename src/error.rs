use thiserror::Error;

/// Every failure the onboarding engine can surface.
///
/// The variants map one-to-one onto the `errorKind` values returned at the
/// HTTP boundary. The type is `Clone` so that a single credential
/// acquisition failure can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    /// Bad local input; no remote call was made.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The processor rejected our own key/secret, or the token endpoint is unreachable.
    #[error("Processor authentication failed: {0}")]
    AuthFailure(String),
    /// Network failure, timeout or 5xx from the processor.
    #[error("Transient processor failure: {0}")]
    TransientFailure(String),
    /// The processor refused the request (4xx). `detail` is the provider's own wording.
    #[error("Processor rejected the request ({status} {code}): {detail}")]
    RequestRejected {
        status: u16,
        code: String,
        detail: String,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Already in progress: {0}")]
    AlreadyInProgress(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl OnboardingError {
    pub fn rejected(status: u16, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RequestRejected {
            status,
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// The stable `errorKind` identifier reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::AuthFailure(_) => "AuthFailure",
            Self::TransientFailure(_) => "TransientFailure",
            Self::RequestRejected { .. } => "RequestRejected",
            Self::NotFound(_) => "NotFound",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::AlreadyInProgress(_) => "AlreadyInProgress",
            Self::Storage(_) => "StorageError",
        }
    }

    /// Only transient failures may be retried; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, OnboardingError>;
