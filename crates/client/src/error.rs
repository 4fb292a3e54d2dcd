use thiserror::Error;

/// Errors surfaced by the identity provider client.
///
/// Variants are split along how the session layer must react: some are
/// retryable by the user (wrong code), one triggers the renew-and-retry
/// protocol (`CsrfInvalid`), and some terminate the session outright.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The submitted MFA or verification code was rejected. The pending
    /// challenge stays open for another attempt.
    #[error("the code you entered is invalid or has expired")]
    InvalidCode,

    /// Resending a challenge code failed.
    #[error("failed to resend the code: {0}")]
    ResendFailed(String),

    /// The provider flagged the CSRF token as stale. Callers renew the
    /// token and retry once before treating the session as dead.
    #[error("csrf token rejected by the provider")]
    CsrfInvalid,

    /// Token validation answered but the session is not valid.
    #[error("session is no longer valid: {0}")]
    SessionInvalid(String),

    /// A CSRF renewal round-trip failed.
    #[error("token renewal failed: {0}")]
    RenewalFailed(String),

    /// The provider returned 401 on an authenticated endpoint.
    #[error("not authorized")]
    Unauthorized,

    /// Any other non-success response, with the provider's message when
    /// one was decodable.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport-level failure (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not match the wire contract.
    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the session must be torn down locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionInvalid(_) | Self::Unauthorized)
    }

    /// Message suitable for direct display, without leaking transport
    /// details.
    pub fn display_message(&self) -> String {
        match self {
            Self::Network(_) => "could not reach the server, check your connection".to_string(),
            Self::Decode(_) => "the server sent an unexpected response".to_string(),
            other => other.to_string(),
        }
    }
}
