// Error taxonomy for the humanization pipeline

use std::time::Duration;
use thiserror::Error;

/// Broad bucket a caller uses to pick user-facing messaging.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorCategory {
    /// The input needs fixing; show a validation hint.
    Input,
    /// A remote service failed; offer a retry or the local path.
    Service,
    /// Unexpected failure.
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HumanizeError {
    #[error("Input text is empty")]
    EmptyInput,
    #[error("Input text is too long: {chars} characters (max {max})")]
    InputTooLong { chars: usize, max: usize },
    #[error("Remote service credentials missing or invalid: {0}")]
    MissingCredential(String),
    #[error("Remote service quota exceeded: {0}")]
    RemoteQuotaExceeded(String),
    #[error("Remote service blocked the content: {0}")]
    RemoteSafetyBlocked(String),
    #[error("Remote service unreachable: {0}")]
    RemoteNetworkError(String),
    #[error("Remote service returned a malformed response: {0}")]
    RemoteMalformedResponse(String),
    #[error("Remote service returned an empty response")]
    RemoteEmptyResponse,
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HumanizeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyInput | Self::InputTooLong { .. } => ErrorCategory::Input,
            Self::MissingCredential(_)
            | Self::RemoteQuotaExceeded(_)
            | Self::RemoteSafetyBlocked(_)
            | Self::RemoteNetworkError(_)
            | Self::RemoteMalformedResponse(_)
            | Self::RemoteEmptyResponse
            | Self::Timeout(_)
            | Self::Cancelled => ErrorCategory::Service,
            Self::Config(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// True for failures where retrying later (or locally) can help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteQuotaExceeded(_)
                | Self::RemoteNetworkError(_)
                | Self::RemoteMalformedResponse(_)
                | Self::RemoteEmptyResponse
                | Self::Timeout(_)
        )
    }
}

pub type HumanizeResult<T> = Result<T, HumanizeError>;

/// Reject input the remote services would refuse anyway.
pub fn validate_input(text: &str, max_chars: usize) -> HumanizeResult<()> {
    if text.trim().is_empty() {
        return Err(HumanizeError::EmptyInput);
    }
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(HumanizeError::InputTooLong { chars, max: max_chars });
    }
    Ok(())
}
