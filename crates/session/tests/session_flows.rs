//! Session flows against a scripted in-process identity provider and the
//! in-memory vault: credential round-trips, the validation protocol,
//! background renewal, tamper teardown, and startup restore. The
//! `end_to_end.rs` suite covers the same flows over real HTTP.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anvilhr_access::{CapabilityModule, Grants, PermissionLevel, Role, UserProfile, UserStatus};
use anvilhr_client::{
    ApiError, AuthenticatedPayload, ChallengeKind, IdentityApi, LoginOutcome, TokenValidation,
};
use anvilhr_core::CsrfToken;
use anvilhr_session::vault::{ENTRY_TOKEN, ENTRY_USER};
use anvilhr_session::{
    AuthState, BootstrapOutcome, MemoryVault, PersistedSession, SecurityEvent, SessionConfig,
    SessionError, SessionManager, SessionVault, Subscription, TerminationReason, TokenLifecycle,
    Transition, VaultRead,
};

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

const GOOD_PASSWORD: &str = "correct-horse-9!";
const GOOD_CODE: &str = "123456";

fn profile() -> UserProfile {
    UserProfile {
        id: "018f2f0a-4b6d-7abc-8def-123456789abc".parse().unwrap(),
        email: "ana@acme.test".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Ruiz".to_string(),
        role: Role::TenantUser,
        company_role: Some("HR Manager".to_string()),
        tenant_id: "018f2f0a-4b6d-7abc-8def-aaaaaaaaaaaa".parse().unwrap(),
        email_verified: true,
        mfa_required: false,
        status: UserStatus::Active,
    }
}

fn payload(token: &str) -> AuthenticatedPayload {
    AuthenticatedPayload {
        user: profile(),
        token: CsrfToken::new(token),
        grants: Grants::from([
            (
                CapabilityModule::EMPLOYEES,
                vec![PermissionLevel::Read, PermissionLevel::Write],
            ),
            (CapabilityModule::REPORTS, vec![PermissionLevel::Read]),
        ]),
        plan: None,
    }
}

fn validation_ok(renewed: Option<&str>) -> TokenValidation {
    TokenValidation {
        role: Role::TenantUser,
        email: "ana@acme.test".to_string(),
        renewed_token: renewed.map(CsrfToken::new),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted identity provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockInner {
    challenge: Mutex<Option<ChallengeKind>>,
    validate_script: Mutex<VecDeque<Result<TokenValidation, ApiError>>>,
    renew_script: Mutex<VecDeque<Result<CsrfToken, ApiError>>>,
    renew_always_fails: AtomicBool,
    logout_fails: AtomicBool,
    renew_calls: AtomicU32,
    logout_calls: AtomicU32,
}

/// Deterministic [`IdentityApi`]: accepts one password and one code,
/// answers validation and renewal from scripts, and counts calls. Clones
/// share state, so a test can keep a probe after moving one into the
/// manager.
#[derive(Clone, Default)]
struct MockIdentityApi {
    inner: Arc<MockInner>,
}

impl MockIdentityApi {
    fn new() -> Self {
        Self::default()
    }

    fn require_challenge(&self, kind: ChallengeKind) {
        *self.inner.challenge.lock().unwrap() = Some(kind);
    }

    fn script_validate(
        &self,
        outcomes: impl IntoIterator<Item = Result<TokenValidation, ApiError>>,
    ) {
        self.inner
            .validate_script
            .lock()
            .unwrap()
            .extend(outcomes);
    }

    fn script_renew(&self, outcomes: impl IntoIterator<Item = Result<CsrfToken, ApiError>>) {
        self.inner.renew_script.lock().unwrap().extend(outcomes);
    }

    fn fail_renewals(&self) {
        self.inner.renew_always_fails.store(true, Ordering::SeqCst);
    }

    fn fail_logout(&self) {
        self.inner.logout_fails.store(true, Ordering::SeqCst);
    }

    fn renew_calls(&self) -> u32 {
        self.inner.renew_calls.load(Ordering::SeqCst)
    }

    fn logout_calls(&self) -> u32 {
        self.inner.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityApi for MockIdentityApi {
    async fn login(&self, _email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        if let Some(kind) = *self.inner.challenge.lock().unwrap() {
            return Ok(LoginOutcome::ChallengeRequired(kind));
        }
        if password == GOOD_PASSWORD {
            Ok(LoginOutcome::Complete(payload("tok-1")))
        } else {
            Err(ApiError::Rejected {
                status: 401,
                message: "Invalid credentials".to_string(),
            })
        }
    }

    async fn verify_challenge(
        &self,
        _kind: ChallengeKind,
        _email: &str,
        password: &str,
        code: &str,
    ) -> Result<AuthenticatedPayload, ApiError> {
        if password == GOOD_PASSWORD && code == GOOD_CODE {
            Ok(payload("tok-1"))
        } else {
            Err(ApiError::InvalidCode)
        }
    }

    async fn resend_challenge(
        &self,
        _kind: ChallengeKind,
        _email: &str,
    ) -> Result<String, ApiError> {
        Ok("A new code has been sent".to_string())
    }

    async fn validate_token(
        &self,
        role: Role,
        _token: &CsrfToken,
    ) -> Result<TokenValidation, ApiError> {
        if let Some(outcome) = self.inner.validate_script.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(TokenValidation {
            role,
            email: "ana@acme.test".to_string(),
            renewed_token: None,
        })
    }

    async fn renew_token(&self, _current: &CsrfToken) -> Result<CsrfToken, ApiError> {
        self.inner.renew_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.renew_always_fails.load(Ordering::SeqCst) {
            return Err(ApiError::RenewalFailed(
                "renewal endpoint unavailable".to_string(),
            ));
        }
        if let Some(outcome) = self.inner.renew_script.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(CsrfToken::new("tok-renewed"))
    }

    async fn logout(&self, _token: &CsrfToken) -> Result<(), ApiError> {
        self.inner.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.logout_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection reset by peer".to_string()));
        }
        Ok(())
    }

    async fn forgot_password(&self, _email: &str) -> Result<String, ApiError> {
        Ok("If the email exists, a reset link has been sent".to_string())
    }

    async fn reset_password(&self, _token: &str, _new_password: &str) -> Result<String, ApiError> {
        Ok("Password has been reset".to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn make_manager(api: MockIdentityApi) -> SessionManager<MockIdentityApi, MemoryVault> {
    SessionManager::new(api, MemoryVault::new(), SessionConfig::default())
}

/// Poll the event channel without blocking the runtime, so single-threaded
/// test executors still drive the background task.
async fn next_event(
    subscription: &Subscription<SecurityEvent>,
    within: Duration,
) -> Option<SecurityEvent> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Ok(event) = subscription.try_recv() {
            return Some(event);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential flows
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_login_reaches_the_store_and_the_vault() {
    let api = MockIdentityApi::new();
    let manager = make_manager(api);

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();

    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Authenticated);
    assert_eq!(
        snapshot.user.as_ref().map(|u| u.email.as_str()),
        Some("ana@acme.test")
    );
    assert!(!snapshot.busy);

    let VaultRead::Intact(persisted) = manager.vault().load().await.unwrap() else {
        panic!("expected an intact vault after login");
    };
    assert_eq!(persisted.token.as_str(), "tok-1");
    assert_eq!(persisted.user, profile());
    assert_eq!(manager.vault().mirror().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn rejected_credentials_surface_as_an_error_state() {
    let api = MockIdentityApi::new();
    let manager = make_manager(api);

    let err = manager
        .login("ana@acme.test", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Api(ApiError::Rejected { .. })));

    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Unauthenticated);
    assert!(!snapshot.busy);
    let Some(message) = snapshot.error else {
        panic!("expected an error message");
    };
    assert!(message.contains("Invalid credentials"));
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
}

#[tokio::test]
async fn login_input_is_validated_before_the_wire() {
    let api = MockIdentityApi::new();
    let manager = make_manager(api);

    let err = manager.login("not-an-email", "pw").await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));

    let err = manager.login("ana@acme.test", "").await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));

    // Nothing was dispatched: the store is untouched.
    assert_eq!(manager.store().snapshot(), Default::default());
}

#[tokio::test]
async fn a_submission_in_flight_blocks_the_next_one() {
    let api = MockIdentityApi::new();
    let manager = make_manager(api);

    // Simulate an in-flight submission without racing real futures.
    manager.store().dispatch(Transition::LoginSubmitted);

    let err = manager
        .login("ana@acme.test", GOOD_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::OperationInFlight));
}

#[tokio::test]
async fn mfa_challenge_round_trip_with_a_wrong_code_first() {
    let api = MockIdentityApi::new();
    api.require_challenge(ChallengeKind::Mfa);
    let manager = make_manager(api.clone());

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::PendingVerification);
    assert_eq!(snapshot.challenge, Some(ChallengeKind::Mfa));

    // Wrong code: challenge stays open, credentials are retained.
    let err = manager.verify_challenge("000000").await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ApiError::InvalidCode)));
    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::PendingVerification);
    assert!(snapshot.pending.is_some());
    assert!(snapshot.error.is_some());

    // Provider can be asked for a fresh code while pending.
    let ack = manager.resend_challenge().await.unwrap();
    assert!(ack.contains("code"));

    // Right code: authenticated, challenge material gone, vault written.
    manager.verify_challenge(GOOD_CODE).await.unwrap();
    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Authenticated);
    assert!(snapshot.pending.is_none());
    assert!(snapshot.challenge.is_none());
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Intact(_)
    ));
}

#[tokio::test]
async fn challenge_operations_require_a_pending_challenge() {
    let api = MockIdentityApi::new();
    let manager = make_manager(api);

    let err = manager.verify_challenge(GOOD_CODE).await.unwrap_err();
    assert!(matches!(err, SessionError::NoPendingChallenge));

    let err = manager.resend_challenge().await.unwrap_err();
    assert!(matches!(err, SessionError::NoPendingChallenge));
}

#[tokio::test]
async fn logout_clears_locally_even_when_the_provider_fails() {
    let api = MockIdentityApi::new();
    api.fail_logout();
    let manager = make_manager(api.clone());

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    manager.logout().await;

    assert_eq!(manager.store().snapshot(), Default::default());
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
    assert_eq!(api.logout_calls(), 1);

    // Logging out again is a quiet no-op: no token, no remote call.
    manager.logout().await;
    assert_eq!(api.logout_calls(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation protocol
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn validation_renews_a_stale_token_and_retries_once() {
    let api = MockIdentityApi::new();
    api.script_validate([Err(ApiError::CsrfInvalid), Ok(validation_ok(None))]);
    api.script_renew([Ok(CsrfToken::new("tok-2"))]);
    let manager = make_manager(api.clone());

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    manager.validate_session().await.unwrap();

    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Authenticated);
    assert_eq!(snapshot.token.as_ref().map(CsrfToken::as_str), Some("tok-2"));
    assert_eq!(api.renew_calls(), 1);

    let VaultRead::Intact(persisted) = manager.vault().load().await.unwrap() else {
        panic!("expected an intact vault");
    };
    assert_eq!(persisted.token.as_str(), "tok-2");
    assert_eq!(manager.vault().mirror().as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn validation_adopts_a_piggybacked_rotation() {
    let api = MockIdentityApi::new();
    api.script_validate([Ok(validation_ok(Some("tok-rotated")))]);
    let manager = make_manager(api.clone());

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    manager.validate_session().await.unwrap();

    let snapshot = manager.store().snapshot();
    assert_eq!(
        snapshot.token.as_ref().map(CsrfToken::as_str),
        Some("tok-rotated")
    );
    assert_eq!(api.renew_calls(), 0);
}

#[tokio::test]
async fn validation_failing_again_after_renewal_is_fatal() {
    let api = MockIdentityApi::new();
    api.script_validate([Err(ApiError::CsrfInvalid), Err(ApiError::CsrfInvalid)]);
    api.script_renew([Ok(CsrfToken::new("tok-2"))]);
    let manager = make_manager(api.clone());
    let events = manager.events().subscribe();

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    let err = manager.validate_session().await.unwrap_err();
    assert!(matches!(err, SessionError::Api(_)));

    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Unauthenticated);
    assert!(snapshot.error.is_some());
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
    assert_eq!(
        events.try_recv(),
        Ok(SecurityEvent::SessionTerminated {
            reason: TerminationReason::ValidationFailed
        })
    );
}

#[tokio::test]
async fn fatal_rejection_clears_the_session() {
    let api = MockIdentityApi::new();
    api.script_validate([Err(ApiError::Unauthorized)]);
    let manager = make_manager(api.clone());
    let events = manager.events().subscribe();

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    manager.validate_session().await.unwrap_err();

    assert_eq!(
        manager.store().snapshot().auth_state,
        AuthState::Unauthenticated
    );
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
    assert_eq!(
        events.try_recv(),
        Ok(SecurityEvent::SessionTerminated {
            reason: TerminationReason::ValidationFailed
        })
    );
}

#[tokio::test]
async fn transport_trouble_leaves_the_session_alone() {
    let api = MockIdentityApi::new();
    api.script_validate([Err(ApiError::Network("timed out".to_string()))]);
    let manager = make_manager(api.clone());

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    let err = manager.validate_session().await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ApiError::Network(_))));

    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Authenticated);
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Intact(_)
    ));
}

#[tokio::test]
async fn validation_requires_an_authenticated_session() {
    let api = MockIdentityApi::new();
    let manager = make_manager(api);

    let err = manager.validate_session().await.unwrap_err();
    assert!(matches!(err, SessionError::NotAuthenticated));
}

// ─────────────────────────────────────────────────────────────────────────────
// Background lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn background_renewal_rotates_the_token() {
    anvilhr_observability::init();
    let api = MockIdentityApi::new();
    api.script_renew([Ok(CsrfToken::new("tok-bg"))]);
    let config = SessionConfig::default()
        .with_renew_interval(Duration::from_millis(25))
        .with_renew_initial_delay(Duration::ZERO)
        .with_storage_watch_interval(Duration::from_secs(60));
    let manager = SessionManager::new(api.clone(), MemoryVault::new(), config);

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    let handle = TokenLifecycle::new(manager.clone()).start();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let token = manager.store().snapshot().token;
        if token.as_ref().map(CsrfToken::as_str) == Some("tok-bg") {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("background renewal never rotated the token");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let VaultRead::Intact(persisted) = manager.vault().load().await.unwrap() else {
        panic!("expected an intact vault");
    };
    assert_eq!(persisted.token.as_str(), "tok-bg");

    handle.shutdown().await;
}

#[tokio::test]
async fn renewal_exhaustion_terminates_the_session_exactly_once() {
    anvilhr_observability::init();
    let api = MockIdentityApi::new();
    api.fail_renewals();
    let config = SessionConfig::default()
        .with_renew_interval(Duration::from_millis(25))
        .with_renew_initial_delay(Duration::ZERO)
        .with_renew_max_retries(2)
        .with_storage_watch_interval(Duration::from_secs(60));
    let manager = SessionManager::new(api.clone(), MemoryVault::new(), config);
    let events = manager.events().subscribe();

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    let handle = TokenLifecycle::new(manager.clone()).start();

    let budget = Duration::from_secs(2);
    assert_eq!(
        next_event(&events, budget).await,
        Some(SecurityEvent::RenewalFailed { attempt: 1, max: 2 })
    );
    assert_eq!(
        next_event(&events, budget).await,
        Some(SecurityEvent::RenewalFailed { attempt: 2, max: 2 })
    );
    assert_eq!(
        next_event(&events, budget).await,
        Some(SecurityEvent::SessionTerminated {
            reason: TerminationReason::RenewalExhausted
        })
    );

    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Unauthenticated);
    let Some(message) = snapshot.error else {
        panic!("expected an expiry message");
    };
    assert!(message.contains("expired"));
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));

    // Signed out now: further ticks must not publish anything.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());

    handle.shutdown().await;
}

#[tokio::test]
async fn vanished_token_entry_is_treated_as_tampering() {
    anvilhr_observability::init();
    let api = MockIdentityApi::new();
    let config = SessionConfig::default()
        .with_storage_watch_interval(Duration::from_millis(20));
    let manager = SessionManager::new(api.clone(), MemoryVault::new(), config);
    let events = manager.events().subscribe();

    manager.login("ana@acme.test", GOOD_PASSWORD).await.unwrap();
    let handle = TokenLifecycle::new(manager.clone()).start();

    // Let the watch observe the entry as present first.
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.vault().remove_entry(ENTRY_TOKEN);

    let budget = Duration::from_secs(2);
    assert_eq!(
        next_event(&events, budget).await,
        Some(SecurityEvent::TamperDetected)
    );
    assert_eq!(
        next_event(&events, budget).await,
        Some(SecurityEvent::SessionTerminated {
            reason: TerminationReason::Tampering
        })
    );

    assert_eq!(
        manager.store().snapshot().auth_state,
        AuthState::Unauthenticated
    );
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
    // Teardown is strictly local: the possibly-stolen token is never sent
    // anywhere, not even to log out.
    assert_eq!(api.logout_calls(), 0);

    handle.shutdown().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Bootstrap
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_restores_an_intact_vault() {
    let vault = MemoryVault::new();
    let persisted = PersistedSession {
        token: CsrfToken::new("tok-persisted"),
        user: profile(),
        grants: Grants::All,
        plan: None,
    };
    vault.save(&persisted).await.unwrap();

    let manager = SessionManager::new(MockIdentityApi::new(), vault, SessionConfig::default());
    let outcome = manager.bootstrap().await;

    assert_eq!(outcome, BootstrapOutcome::Restored { validated: false });
    let snapshot = manager.store().snapshot();
    assert_eq!(snapshot.auth_state, AuthState::Authenticated);
    assert_eq!(
        snapshot.token.as_ref().map(CsrfToken::as_str),
        Some("tok-persisted")
    );
    assert_eq!(snapshot.user, Some(profile()));
}

#[tokio::test]
async fn bootstrap_with_an_empty_vault_requires_login() {
    let manager = make_manager(MockIdentityApi::new());
    assert_eq!(manager.bootstrap().await, BootstrapOutcome::RequiresLogin);
    assert_eq!(
        manager.store().snapshot().auth_state,
        AuthState::Unauthenticated
    );
}

#[tokio::test]
async fn bootstrap_wipes_partial_state() {
    let vault = MemoryVault::new();
    let persisted = PersistedSession {
        token: CsrfToken::new("tok-persisted"),
        user: profile(),
        grants: Grants::All,
        plan: None,
    };
    vault.save(&persisted).await.unwrap();
    vault.remove_entry(ENTRY_USER);

    let manager = SessionManager::new(MockIdentityApi::new(), vault, SessionConfig::default());
    let outcome = manager.bootstrap().await;

    assert_eq!(outcome, BootstrapOutcome::CorruptStateCleared);
    assert_eq!(
        manager.store().snapshot().auth_state,
        AuthState::Unauthenticated
    );
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
}

#[tokio::test]
async fn bootstrap_wipes_garbage_state() {
    let vault = MemoryVault::new();
    let persisted = PersistedSession {
        token: CsrfToken::new("tok-persisted"),
        user: profile(),
        grants: Grants::All,
        plan: None,
    };
    vault.save(&persisted).await.unwrap();
    vault.inject_raw(ENTRY_TOKEN, "{ not json");

    let manager = SessionManager::new(MockIdentityApi::new(), vault, SessionConfig::default());
    assert_eq!(
        manager.bootstrap().await,
        BootstrapOutcome::CorruptStateCleared
    );
}

#[tokio::test]
async fn bootstrap_can_validate_the_restored_session() {
    let api = MockIdentityApi::new();
    api.script_validate([Ok(validation_ok(Some("tok-rotated")))]);

    let vault = MemoryVault::new();
    let persisted = PersistedSession {
        token: CsrfToken::new("tok-persisted"),
        user: profile(),
        grants: Grants::All,
        plan: None,
    };
    vault.save(&persisted).await.unwrap();

    let config = SessionConfig::default().with_validate_on_restore(true);
    let manager = SessionManager::new(api, vault, config);

    assert_eq!(
        manager.bootstrap().await,
        BootstrapOutcome::Restored { validated: true }
    );
    assert_eq!(
        manager.store().snapshot().token.as_ref().map(CsrfToken::as_str),
        Some("tok-rotated")
    );
}

#[tokio::test]
async fn bootstrap_validation_rejection_requires_login() {
    let api = MockIdentityApi::new();
    api.script_validate([Err(ApiError::Unauthorized)]);

    let vault = MemoryVault::new();
    let persisted = PersistedSession {
        token: CsrfToken::new("tok-persisted"),
        user: profile(),
        grants: Grants::All,
        plan: None,
    };
    vault.save(&persisted).await.unwrap();

    let config = SessionConfig::default().with_validate_on_restore(true);
    let manager = SessionManager::new(api, vault, config);

    assert_eq!(manager.bootstrap().await, BootstrapOutcome::RequiresLogin);
    assert!(matches!(
        manager.vault().load().await.unwrap(),
        VaultRead::Empty
    ));
}

#[tokio::test]
async fn bootstrap_keeps_the_session_when_validation_is_unreachable() {
    let api = MockIdentityApi::new();
    api.script_validate([Err(ApiError::Network("offline".to_string()))]);

    let vault = MemoryVault::new();
    let persisted = PersistedSession {
        token: CsrfToken::new("tok-persisted"),
        user: profile(),
        grants: Grants::All,
        plan: None,
    };
    vault.save(&persisted).await.unwrap();

    let config = SessionConfig::default().with_validate_on_restore(true);
    let manager = SessionManager::new(api, vault, config);

    assert_eq!(
        manager.bootstrap().await,
        BootstrapOutcome::Restored { validated: false }
    );
    assert_eq!(
        manager.store().snapshot().auth_state,
        AuthState::Authenticated
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Password recovery
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn password_recovery_validates_before_the_wire() {
    let manager = make_manager(MockIdentityApi::new());

    let err = manager.forgot_password("not-an-email").await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));

    let err = manager
        .reset_password("reset-tok", "short1!")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));

    let message = manager.forgot_password("ana@acme.test").await.unwrap();
    assert!(message.contains("reset link"));

    let message = manager
        .reset_password("reset-tok", "Str0ng-enough-pw!")
        .await
        .unwrap();
    assert!(message.contains("reset"));
}
