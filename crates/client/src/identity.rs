use anvilhr_access::{Grants, Plan, Role, UserProfile};
use anvilhr_core::CsrfToken;

use crate::error::ApiError;

/// Second factor the provider demanded before completing a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// A time-based code delivered out of band.
    Mfa,
    /// A code mailed to an address that has never been confirmed.
    EmailVerification,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mfa => "MFA",
            Self::EmailVerification => "EMAIL_VERIFICATION",
        }
    }
}

/// Everything a completed authentication hands the session layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedPayload {
    pub user: UserProfile,
    pub token: CsrfToken,
    pub grants: Grants,
    pub plan: Option<Plan>,
}

/// Result of a credential submission.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Credentials accepted, session material issued.
    Complete(AuthenticatedPayload),
    /// Credentials accepted but a challenge must be answered first.
    ChallengeRequired(ChallengeKind),
}

/// Result of a successful token validation round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenValidation {
    pub role: Role,
    pub email: String,
    /// Fresh CSRF token piggybacked on the validation response, when the
    /// provider rotated it.
    pub renewed_token: Option<CsrfToken>,
}

/// Operations the identity provider exposes to this client.
///
/// Implementations hold no session state beyond the ambient HTTP cookie;
/// the current CSRF token is always passed in by the caller.
#[async_trait::async_trait]
pub trait IdentityApi: Send + Sync {
    /// Submit primary credentials.
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError>;

    /// Answer a pending challenge with the original credentials and the
    /// received code. A rejected code yields [`ApiError::InvalidCode`] and
    /// leaves the challenge open on the provider side.
    async fn verify_challenge(
        &self,
        kind: ChallengeKind,
        email: &str,
        password: &str,
        code: &str,
    ) -> Result<AuthenticatedPayload, ApiError>;

    /// Ask the provider to send a fresh challenge code. Returns its
    /// acknowledgement message.
    async fn resend_challenge(&self, kind: ChallengeKind, email: &str)
        -> Result<String, ApiError>;

    /// Check whether the session behind `token` is still valid for `role`.
    ///
    /// [`ApiError::CsrfInvalid`] means the token is stale but the session
    /// may survive a renewal; anything else mapping to
    /// [`ApiError::is_fatal`] means it will not.
    async fn validate_token(
        &self,
        role: Role,
        token: &CsrfToken,
    ) -> Result<TokenValidation, ApiError>;

    /// Exchange the current CSRF token for a fresh one.
    async fn renew_token(&self, current: &CsrfToken) -> Result<CsrfToken, ApiError>;

    /// Invalidate the provider-side session. Callers treat failures as
    /// non-fatal and clear local state regardless.
    async fn logout(&self, token: &CsrfToken) -> Result<(), ApiError>;

    /// Request a password-reset email. Returns the provider's
    /// non-committal acknowledgement message.
    async fn forgot_password(&self, email: &str) -> Result<String, ApiError>;

    /// Redeem a reset token for a new password.
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, ApiError>;
}
