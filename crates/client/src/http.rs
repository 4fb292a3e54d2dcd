//! `reqwest`-backed [`IdentityApi`] implementation.

use std::sync::RwLock;

use anvilhr_access::Role;
use anvilhr_core::CsrfToken;

use crate::error::ApiError;
use crate::identity::{
    AuthenticatedPayload, ChallengeKind, IdentityApi, LoginOutcome, TokenValidation,
};
use crate::options::ClientOptions;
use crate::wire::{
    AuthEnvelope, EmailRequest, LoginRequest, MessageEnvelope, MfaLoginRequest, RenewEnvelope,
    ResetPasswordRequest, ValidateEnvelope, ValidateRequest, VerifyEmailRequest,
    CSRF_FAILURE_MESSAGE,
};

/// CSRF token header, required on every authenticated endpoint.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Optional audit header carrying the authenticated user's email.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// HTTP client for the identity provider.
///
/// The underlying `reqwest::Client` keeps the provider's session cookie;
/// CSRF tokens are passed per call. The last authenticated email is
/// remembered only to populate the optional audit header.
pub struct HttpIdentityApi {
    options: ClientOptions,
    http: reqwest::Client,
    remembered_email: RwLock<Option<String>>,
}

impl HttpIdentityApi {
    pub fn new(options: ClientOptions) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            options,
            http,
            remembered_email: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url, path)
    }

    fn remember_email(&self, email: &str) {
        if let Ok(mut slot) = self.remembered_email.write() {
            *slot = Some(email.to_string());
        }
    }

    fn forget_email(&self) {
        if let Ok(mut slot) = self.remembered_email.write() {
            *slot = None;
        }
    }

    /// Request builder for authenticated endpoints: CSRF header plus the
    /// audit email header when configured.
    fn authed_post(&self, path: &str, token: &CsrfToken) -> reqwest::RequestBuilder {
        let mut req = self.http.post(self.url(path)).header(CSRF_HEADER, token.as_str());
        if self.options.send_user_email {
            let email = self.remembered_email.read().ok().and_then(|slot| slot.clone());
            if let Some(email) = email {
                req = req.header(USER_EMAIL_HEADER, email);
            }
        }
        req
    }

    /// Shared tail for `/login/mfa` and `/verify-email`: both answer with
    /// the login success envelope.
    async fn challenge_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<AuthenticatedPayload, ApiError> {
        if resp.status().is_success() {
            let envelope: AuthEnvelope =
                resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
            let payload = envelope.into_payload()?;
            self.remember_email(&payload.user.email);
            return Ok(payload);
        }

        let (status, message) = failure_parts(resp).await;
        match status {
            400 | 401 | 422 => Err(ApiError::InvalidCode),
            _ => Err(ApiError::Rejected { status, message }),
        }
    }
}

/// Status code and best-effort provider message from a failed response.
async fn failure_parts(resp: reqwest::Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);
    (status, message)
}

#[async_trait::async_trait]
impl IdentityApi for HttpIdentityApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let resp = self
            .http
            .post(self.url("/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status();
        // Challenge demands ride on a 401, but tolerate providers that
        // answer 200 with the sentinel set.
        let body = resp.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        if let Ok(envelope) = serde_json::from_str::<AuthEnvelope>(&body) {
            if let Some(kind) = envelope.challenge_kind() {
                return Ok(LoginOutcome::ChallengeRequired(kind));
            }
            if status.is_success() {
                let payload = envelope.into_payload()?;
                self.remember_email(&payload.user.email);
                return Ok(LoginOutcome::Complete(payload));
            }
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: envelope.message.unwrap_or_default(),
            });
        }

        if status.is_success() {
            return Err(ApiError::Decode("login response was not an auth envelope".into()));
        }
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message: body,
        })
    }

    async fn verify_challenge(
        &self,
        kind: ChallengeKind,
        email: &str,
        password: &str,
        code: &str,
    ) -> Result<AuthenticatedPayload, ApiError> {
        let resp = match kind {
            ChallengeKind::Mfa => self
                .http
                .post(self.url("/login/mfa"))
                .json(&MfaLoginRequest {
                    email,
                    password,
                    mfa_code: code,
                })
                .send()
                .await,
            ChallengeKind::EmailVerification => self
                .http
                .post(self.url("/verify-email"))
                .json(&VerifyEmailRequest {
                    email,
                    verification_code: code,
                })
                .send()
                .await,
        }
        .map_err(|e| ApiError::Network(e.to_string()))?;

        self.challenge_response(resp).await
    }

    async fn resend_challenge(
        &self,
        kind: ChallengeKind,
        email: &str,
    ) -> Result<String, ApiError> {
        let path = match kind {
            ChallengeKind::Mfa => "/resend-mfa",
            ChallengeKind::EmailVerification => "/resend-email-verification",
        };
        let resp = self
            .http
            .post(self.url(path))
            .json(&EmailRequest { email })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<MessageEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| "A new code has been sent".to_string());
            return Ok(message);
        }
        let (_, message) = failure_parts(resp).await;
        Err(ApiError::ResendFailed(message))
    }

    async fn validate_token(
        &self,
        role: Role,
        token: &CsrfToken,
    ) -> Result<TokenValidation, ApiError> {
        let resp = self
            .authed_post("/validate/token", token)
            .json(&ValidateRequest { role })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let envelope: ValidateEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(ApiError::Decode(e.to_string())),
            // Non-JSON failure body; classify on the raw text.
            Err(_) => {
                if body.contains(CSRF_FAILURE_MESSAGE) {
                    return Err(ApiError::CsrfInvalid);
                }
                return Err(ApiError::SessionInvalid(body));
            }
        };

        if envelope.is_csrf_failure() {
            return Err(ApiError::CsrfInvalid);
        }
        if !status.is_success() || !envelope.is_authorized() {
            let message = envelope.message.unwrap_or_else(|| "session rejected".to_string());
            return Err(ApiError::SessionInvalid(message));
        }

        let data = envelope
            .data
            .ok_or_else(|| ApiError::Decode("validation passed without identity data".into()))?;
        Ok(TokenValidation {
            role: data.role,
            email: data.email,
            renewed_token: envelope
                .new_csrf_token
                .filter(|t| !t.is_empty())
                .map(CsrfToken::new),
        })
    }

    async fn renew_token(&self, current: &CsrfToken) -> Result<CsrfToken, ApiError> {
        let resp = self
            .authed_post("/renew-csrf", current)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let (_, message) = failure_parts(resp).await;
            return Err(ApiError::RenewalFailed(message));
        }

        let envelope: RenewEnvelope =
            resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(ApiError::RenewalFailed(
                envelope.message.unwrap_or_else(|| "renewal refused".to_string()),
            ));
        }
        envelope
            .new_csrf_token
            .filter(|t| !t.is_empty())
            .map(CsrfToken::new)
            .ok_or_else(|| ApiError::RenewalFailed("renewal answered without a token".to_string()))
    }

    async fn logout(&self, token: &CsrfToken) -> Result<(), ApiError> {
        let resp = self
            .authed_post("/logout", token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        self.forget_email();

        if resp.status().is_success() {
            return Ok(());
        }
        let (status, message) = failure_parts(resp).await;
        Err(ApiError::Rejected { status, message })
    }

    async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
        let resp = self
            .http
            .post(self.url("/forgot-password"))
            .json(&EmailRequest { email })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let (status, message) = failure_parts(resp).await;
            return Err(ApiError::Rejected { status, message });
        }
        let envelope: MessageEnvelope =
            resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(envelope
            .message
            .unwrap_or_else(|| "If the email exists, a reset link has been sent".to_string()))
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, ApiError> {
        let resp = self
            .http
            .post(self.url("/reset-password"))
            .json(&ResetPasswordRequest {
                token,
                new_password,
            })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let (status, message) = failure_parts(resp).await;
            return Err(ApiError::Rejected { status, message });
        }
        let envelope: MessageEnvelope =
            resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(envelope
            .message
            .unwrap_or_else(|| "Password has been reset".to_string()))
    }
}
