use thiserror::Error;

use anvilhr_client::ApiError;
use anvilhr_core::DomainError;

use crate::vault::VaultError;

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another credential operation is still in flight; the caller must
    /// wait for it to settle before submitting again.
    #[error("another authentication operation is already in flight")]
    OperationInFlight,

    /// Input rejected before any network call was made.
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// The identity provider rejected or failed the operation.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Durable session storage failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// A challenge operation was invoked without a pending challenge.
    #[error("no verification challenge is pending")]
    NoPendingChallenge,

    /// An authenticated-only operation was invoked without a session.
    #[error("not authenticated")]
    NotAuthenticated,
}

impl SessionError {
    /// Message suitable for direct display.
    pub fn display_message(&self) -> String {
        match self {
            Self::Api(api) => api.display_message(),
            other => other.to_string(),
        }
    }
}
