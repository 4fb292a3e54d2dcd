//! Session manager: drives the identity client and the vault, feeding
//! every result back into the store as a transition.

use std::sync::Arc;

use anvilhr_client::{ApiError, AuthenticatedPayload, IdentityApi, LoginOutcome};
use anvilhr_core::{validate_email, validate_verification_code, DomainError, PasswordPolicy};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{SecurityEvent, SecurityEvents, TerminationReason};
use crate::session::{AuthState, ChallengeResult, LoginResult, Transition};
use crate::store::SessionStore;
use crate::vault::{PersistedSession, SessionVault};

/// Orchestrates credential flows against one [`SessionStore`].
///
/// Cheap to clone; clones share the store, the vault, the event channel
/// and the renewal gate.
pub struct SessionManager<A, V> {
    pub(crate) store: Arc<SessionStore>,
    pub(crate) api: Arc<A>,
    pub(crate) vault: Arc<V>,
    pub(crate) config: SessionConfig,
    pub(crate) events: Arc<SecurityEvents>,
    /// Single-slot guard shared by the background renewal loop and the
    /// validation-triggered renewal path; the two must never overlap.
    pub(crate) renewal_gate: Arc<tokio::sync::Mutex<()>>,
    policy: PasswordPolicy,
}

impl<A, V> Clone for SessionManager<A, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            api: self.api.clone(),
            vault: self.vault.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
            renewal_gate: self.renewal_gate.clone(),
            policy: self.policy,
        }
    }
}

impl<A, V> SessionManager<A, V>
where
    A: IdentityApi,
    V: SessionVault,
{
    pub fn new(api: A, vault: V, config: SessionConfig) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            api: Arc::new(api),
            vault: Arc::new(vault),
            config,
            events: Arc::new(SecurityEvents::new()),
            renewal_gate: Arc::new(tokio::sync::Mutex::new(())),
            policy: PasswordPolicy::default(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn vault(&self) -> &Arc<V> {
        &self.vault
    }

    pub fn events(&self) -> &Arc<SecurityEvents> {
        &self.events
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credential flows
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit primary credentials. Input is validated before anything goes
    /// on the wire; a second submission while one is in flight is refused.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let email = email.trim().to_string();
        validate_email(&email)?;
        if password.is_empty() {
            return Err(DomainError::validation("password must not be empty").into());
        }

        if !self.store.dispatch_if_idle(Transition::LoginSubmitted) {
            return Err(SessionError::OperationInFlight);
        }

        match self.api.login(&email, password).await {
            Ok(LoginOutcome::Complete(payload)) => {
                self.store
                    .dispatch(Transition::LoginResult(LoginResult::Complete(payload.clone())));
                self.persist(&payload).await;
                Ok(())
            }
            Ok(LoginOutcome::ChallengeRequired(kind)) => {
                self.store
                    .dispatch(Transition::LoginResult(LoginResult::ChallengeRequired {
                        kind,
                        email,
                        password: password.to_string(),
                    }));
                Ok(())
            }
            Err(e) => {
                self.store.dispatch(Transition::OperationFailed {
                    message: e.display_message(),
                });
                Err(e.into())
            }
        }
    }

    /// Answer the pending challenge. A wrong code keeps the challenge open
    /// and the retained credentials intact.
    pub async fn verify_challenge(&self, code: &str) -> Result<(), SessionError> {
        let snapshot = self.store.snapshot();
        let (Some(pending), Some(kind)) = (snapshot.pending, snapshot.challenge) else {
            return Err(SessionError::NoPendingChallenge);
        };
        validate_verification_code(code)?;

        if !self.store.dispatch_if_idle(Transition::ChallengeSubmitted) {
            return Err(SessionError::OperationInFlight);
        }

        match self
            .api
            .verify_challenge(kind, &pending.email, &pending.password, code)
            .await
        {
            Ok(payload) => {
                self.store.dispatch(Transition::ChallengeResult(ChallengeResult::Complete(
                    payload.clone(),
                )));
                self.persist(&payload).await;
                Ok(())
            }
            Err(e) => {
                self.store.dispatch(Transition::ChallengeResult(ChallengeResult::Failed {
                    message: e.display_message(),
                }));
                Err(e.into())
            }
        }
    }

    /// Ask the provider to send a fresh challenge code. Returns its
    /// acknowledgement, for display near the code input.
    pub async fn resend_challenge(&self) -> Result<String, SessionError> {
        let snapshot = self.store.snapshot();
        let (Some(pending), Some(kind)) = (snapshot.pending, snapshot.challenge) else {
            return Err(SessionError::NoPendingChallenge);
        };

        match self.api.resend_challenge(kind, &pending.email).await {
            Ok(message) => Ok(message),
            Err(e) => {
                self.store.dispatch(Transition::OperationFailed {
                    message: e.display_message(),
                });
                Err(e.into())
            }
        }
    }

    /// End the session. The remote call is best-effort; local state and
    /// the vault are cleared regardless of its outcome.
    pub async fn logout(&self) {
        let snapshot = self.store.snapshot();
        if let Some(token) = snapshot.token {
            if let Err(e) = self.api.logout(&token).await {
                tracing::warn!(error = %e, "remote logout failed, clearing locally anyway");
            }
        }

        self.store.dispatch(Transition::Logout);
        if let Err(e) = self.vault.clear().await {
            tracing::error!(error = %e, "failed to clear session vault on logout");
        }
    }

    /// Drop the surfaced error message, if any.
    pub fn clear_error(&self) {
        self.store.dispatch(Transition::ErrorCleared);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation protocol
    // ─────────────────────────────────────────────────────────────────────────

    /// Check the session against the provider.
    ///
    /// A stale anti-forgery token gets exactly one renewal-and-retry cycle
    /// before the failure is treated as fatal; transport failures leave
    /// the session untouched. The renewal shares the single-slot gate with
    /// the background loop, so the two never renew concurrently.
    pub async fn validate_session(&self) -> Result<(), SessionError> {
        let snapshot = self.store.snapshot();
        let (Some(user), Some(token), AuthState::Authenticated) =
            (snapshot.user, snapshot.token, snapshot.auth_state)
        else {
            return Err(SessionError::NotAuthenticated);
        };
        let role = user.role;

        match self.api.validate_token(role, &token).await {
            Ok(validation) => {
                self.adopt_rotated_token(validation.renewed_token).await;
                Ok(())
            }
            Err(ApiError::CsrfInvalid) => {
                let _renewing = self.renewal_gate.lock().await;
                tracing::info!("csrf token rejected, renewing and retrying once");

                let fresh = match self.api.renew_token(&token).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        return self
                            .fatal_clear("token renewal after csrf rejection failed", e)
                            .await;
                    }
                };
                self.adopt_rotated_token(Some(fresh.clone())).await;

                match self.api.validate_token(role, &fresh).await {
                    Ok(validation) => {
                        self.adopt_rotated_token(validation.renewed_token).await;
                        Ok(())
                    }
                    Err(e) => {
                        self.fatal_clear("validation still failing after renewal", e)
                            .await
                    }
                }
            }
            Err(e) if e.is_fatal() => self.fatal_clear("session rejected by provider", e).await,
            // Transport or decode trouble: the session survives, the
            // caller decides whether to retry later.
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Password recovery
    // ─────────────────────────────────────────────────────────────────────────

    /// Request a reset email. Returns the provider's acknowledgement.
    pub async fn forgot_password(&self, email: &str) -> Result<String, SessionError> {
        let email = email.trim();
        validate_email(email)?;
        Ok(self.api.forgot_password(email).await?)
    }

    /// Redeem a reset token. The new password must satisfy the policy
    /// before anything goes on the wire.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<String, SessionError> {
        self.policy.check(new_password)?;
        Ok(self.api.reset_password(token, new_password).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn persist(&self, payload: &AuthenticatedPayload) {
        let persisted = PersistedSession {
            token: payload.token.clone(),
            user: payload.user.clone(),
            grants: payload.grants.clone(),
            plan: payload.plan.clone(),
        };
        if let Err(e) = self.vault.save(&persisted).await {
            tracing::error!(error = %e, "failed to persist session, restore will not survive a restart");
        }
    }

    /// Swap a rotated token into the store and the vault, when one arrived.
    pub(crate) async fn adopt_rotated_token(
        &self,
        token: Option<anvilhr_core::CsrfToken>,
    ) {
        let Some(token) = token else {
            return;
        };
        self.store.dispatch(Transition::TokenRenewed(token.clone()));
        if let Err(e) = self.vault.save_token(&token).await {
            tracing::error!(error = %e, "failed to persist rotated token");
        }
    }

    async fn fatal_clear(&self, reason: &str, cause: ApiError) -> Result<(), SessionError> {
        self.store.dispatch(Transition::ValidationFatal {
            reason: reason.to_string(),
        });
        if let Err(e) = self.vault.clear().await {
            tracing::error!(error = %e, "failed to clear session vault after fatal validation");
        }
        self.events.publish(SecurityEvent::SessionTerminated {
            reason: TerminationReason::ValidationFailed,
        });
        Err(cause.into())
    }
}
