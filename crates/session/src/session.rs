//! Session aggregate and its transition table.
//!
//! The session is mutated exclusively through [`Transition`]s applied by the
//! store; `apply` is infallible and total so that overlapping asynchronous
//! completions can always be folded in, in completion order.

use std::fmt;

use anvilhr_access::Grants;
use anvilhr_client::{AuthenticatedPayload, ChallengeKind};
use anvilhr_core::CsrfToken;

use crate::vault::PersistedSession;

// ─────────────────────────────────────────────────────────────────────────────
// Auth state
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication progress of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Credentials accepted, a challenge answer is outstanding.
    PendingVerification,
    Authenticated,
}

/// Credentials retained while a challenge is pending, so the user can
/// answer without re-entering them. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for PendingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transitions
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a credential submission, as dispatched into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginResult {
    Complete(AuthenticatedPayload),
    ChallengeRequired {
        kind: ChallengeKind,
        email: String,
        password: String,
    },
}

/// Outcome of a challenge answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeResult {
    Complete(AuthenticatedPayload),
    /// Wrong or expired code. The challenge stays open and the retained
    /// credentials survive for a retry.
    Failed { message: String },
}

/// The only way session state changes. Each variant is applied atomically.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A login submission went on the wire; blocks concurrent submissions.
    LoginSubmitted,
    LoginResult(LoginResult),
    /// A challenge answer went on the wire.
    ChallengeSubmitted,
    ChallengeResult(ChallengeResult),
    /// Background or validation-triggered token rotation; no state change.
    TokenRenewed(CsrfToken),
    /// Consecutive renewal failures crossed the configured threshold.
    RenewalExhausted,
    /// The provider declared the session fatally invalid.
    ValidationFatal { reason: String },
    Logout,
    /// Repopulate from persisted data at bootstrap, bypassing the network.
    Restore(PersistedSession),
    /// A credential operation failed; surfaces the message and releases
    /// the busy flag without changing authentication state.
    OperationFailed { message: String },
    ErrorCleared,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// The root session aggregate.
///
/// Invariants, maintained by `apply`:
/// - `user` and `token` are populated iff `auth_state == Authenticated`.
/// - `pending` and `challenge` are populated iff
///   `auth_state == PendingVerification`.
/// - transient fields (`pending`, `busy`, `error`) never survive into or
///   out of persistence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub auth_state: AuthState,
    pub user: Option<anvilhr_access::UserProfile>,
    pub grants: Grants,
    pub plan: Option<anvilhr_access::Plan>,
    pub token: Option<CsrfToken>,
    pub pending: Option<PendingCredentials>,
    pub challenge: Option<ChallengeKind>,
    /// A credential operation is in flight; submissions are rejected while
    /// set.
    pub busy: bool,
    /// Display-ready message describing the most recent failure.
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.auth_state == AuthState::Authenticated
    }

    /// Apply a transition. Total: transitions that make no sense in the
    /// current state are ignored with a warning rather than corrupting it.
    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::LoginSubmitted | Transition::ChallengeSubmitted => {
                self.busy = true;
                self.error = None;
            }

            Transition::LoginResult(LoginResult::Complete(payload))
            | Transition::ChallengeResult(ChallengeResult::Complete(payload)) => {
                self.install(payload);
            }

            Transition::LoginResult(LoginResult::ChallengeRequired {
                kind,
                email,
                password,
            }) => {
                self.auth_state = AuthState::PendingVerification;
                self.pending = Some(PendingCredentials { email, password });
                self.challenge = Some(kind);
                self.busy = false;
                self.error = None;
            }

            Transition::ChallengeResult(ChallengeResult::Failed { message }) => {
                // Stays pending; credentials retained for the retry.
                self.busy = false;
                self.error = Some(message);
            }

            Transition::TokenRenewed(token) => {
                if self.auth_state == AuthState::Authenticated {
                    self.token = Some(token);
                } else {
                    tracing::warn!("ignoring token renewal outside an authenticated session");
                }
            }

            Transition::RenewalExhausted => {
                self.clear();
                self.error = Some("Your session has expired. Please sign in again.".to_string());
            }

            Transition::ValidationFatal { reason } => {
                tracing::warn!(reason = %reason, "session declared fatally invalid");
                self.clear();
                self.error = Some("Your session is no longer valid. Please sign in again.".to_string());
            }

            Transition::Logout => {
                self.clear();
            }

            Transition::Restore(persisted) => {
                if self.auth_state != AuthState::Unauthenticated {
                    tracing::warn!("ignoring restore over a live session");
                    return;
                }
                self.auth_state = AuthState::Authenticated;
                self.user = Some(persisted.user);
                self.grants = persisted.grants;
                self.plan = persisted.plan;
                self.token = Some(persisted.token);
                self.pending = None;
                self.challenge = None;
                self.busy = false;
                self.error = None;
            }

            Transition::OperationFailed { message } => {
                self.busy = false;
                self.error = Some(message);
            }

            Transition::ErrorCleared => {
                self.error = None;
            }
        }
    }

    /// Snapshot of the four durable values, for the vault. `None` unless
    /// authenticated.
    pub fn to_persisted(&self) -> Option<PersistedSession> {
        let (Some(user), Some(token)) = (self.user.as_ref(), self.token.as_ref()) else {
            return None;
        };
        if self.auth_state != AuthState::Authenticated {
            return None;
        }
        Some(PersistedSession {
            token: token.clone(),
            user: user.clone(),
            grants: self.grants.clone(),
            plan: self.plan.clone(),
        })
    }

    fn install(&mut self, payload: AuthenticatedPayload) {
        self.auth_state = AuthState::Authenticated;
        self.user = Some(payload.user);
        self.grants = payload.grants;
        self.plan = payload.plan;
        self.token = Some(payload.token);
        self.pending = None;
        self.challenge = None;
        self.busy = false;
        self.error = None;
    }

    fn clear(&mut self) {
        *self = Session::default();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
