//! Wire-format DTOs for the identity provider.
//!
//! Field names mirror the provider's JSON contract (camelCase, numeric
//! booleans, the `"ALL"` permissions sentinel). Everything converts into
//! domain types at this boundary so nothing upstream handles raw wire
//! shapes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use anvilhr_access::{
    CapabilityModule, Grants, PermissionLevel, Plan, PlanStatus, Role, UserProfile, UserStatus,
};
use anvilhr_core::{CsrfToken, TenantId, UserId};

use crate::error::ApiError;
use crate::identity::{AuthenticatedPayload, ChallengeKind};

/// Permissions sentinel granting everything; only ever seen on the wire.
pub const GRANT_ALL_SENTINEL: &str = "ALL";

/// `responseType` sent when a second factor is pending.
pub const RESPONSE_MFA_REQUIRED: &str = "MFA_REQUIRED";

/// `responseType` sent when the email address is unconfirmed.
pub const RESPONSE_EMAIL_VERIFICATION_REQUIRED: &str = "EMAIL_VERIFICATION_REQUIRED";

/// Validation failure message that triggers the renew-and-retry protocol.
/// Matched verbatim; every other failure message is terminal.
pub const CSRF_FAILURE_MESSAGE: &str = "CSRF validation failed";

/// `status` reported by a passing validation.
pub const VALIDATE_AUTHORIZED: &str = "AUTHORIZED";

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaLoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub mfa_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest<'a> {
    pub email: &'a str,
    pub verification_code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmailRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ValidateRequest {
    pub role: Role,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope returned by `/login`, `/login/mfa` and `/verify-email`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<AuthData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub user: WireUser,
    #[serde(default)]
    pub additional_data: Option<AdditionalData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub permissions: Option<PermissionsPayload>,
    #[serde(default)]
    pub plan: Option<WirePlan>,
}

impl AuthEnvelope {
    /// Challenge demanded by a rejected login, if the `responseType`
    /// sentinel names one.
    pub fn challenge_kind(&self) -> Option<ChallengeKind> {
        match self.response_type.as_deref() {
            Some(RESPONSE_MFA_REQUIRED) => Some(ChallengeKind::Mfa),
            Some(RESPONSE_EMAIL_VERIFICATION_REQUIRED) => Some(ChallengeKind::EmailVerification),
            _ => None,
        }
    }

    /// Extract session material from a success envelope. The user record
    /// and a non-empty CSRF token are mandatory; grants degrade to none
    /// with a warning, the plan is optional.
    pub fn into_payload(self) -> Result<AuthenticatedPayload, ApiError> {
        let data = self
            .data
            .ok_or_else(|| ApiError::Decode("success envelope carried no data".into()))?;
        let additional = data
            .additional_data
            .ok_or_else(|| ApiError::Decode("success envelope carried no session material".into()))?;
        let token = additional
            .csrf_token
            .filter(|t| !t.is_empty())
            .map(CsrfToken::new)
            .ok_or_else(|| ApiError::Decode("success envelope carried no csrf token".into()))?;
        let user = data.user.into_profile()?;
        let grants = match additional.permissions {
            Some(payload) => payload.into_grants(),
            None => {
                tracing::warn!("auth response carried no permissions payload");
                Grants::none()
            }
        };
        let plan = additional.plan.map(WirePlan::into_plan);

        Ok(AuthenticatedPayload {
            user,
            token,
            grants,
            plan,
        })
    }
}

/// Identity record as the provider sends it. Booleans arrive as numbers
/// from some deployments, hence [`WireFlag`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    pub id: Option<UserId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub company_role: Option<String>,
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub is_email_verified: WireFlag,
    #[serde(default)]
    pub is_mfa_required: WireFlag,
}

impl WireUser {
    pub fn into_profile(self) -> Result<UserProfile, ApiError> {
        let id = self
            .id
            .ok_or_else(|| ApiError::Decode("user record carried no id".into()))?;
        let tenant_id = self
            .tenant_id
            .ok_or_else(|| ApiError::Decode("user record carried no tenant id".into()))?;

        Ok(UserProfile {
            id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            company_role: self.company_role,
            tenant_id,
            email_verified: self.is_email_verified.as_bool(),
            mfa_required: self.is_mfa_required.as_bool(),
            status: self.status,
        })
    }
}

/// Boolean that may arrive as `true`/`false` or `1`/`0`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum WireFlag {
    Bool(bool),
    Num(i64),
}

impl WireFlag {
    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Num(n) => n != 0,
        }
    }
}

impl Default for WireFlag {
    fn default() -> Self {
        Self::Bool(false)
    }
}

/// Either the `"ALL"` sentinel or a grant record with a nested module map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PermissionsPayload {
    Sentinel(String),
    Record(WireGrantRecord),
}

/// Grant record; provider metadata (grantor, timestamps) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WireGrantRecord {
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
}

impl PermissionsPayload {
    /// Resolve into domain [`Grants`]. Unrecognized sentinels degrade to an
    /// empty scoped grant; unrecognized level names are dropped. Both are
    /// logged, neither fails the login.
    pub fn into_grants(self) -> Grants {
        match self {
            Self::Sentinel(s) if s == GRANT_ALL_SENTINEL => Grants::All,
            Self::Sentinel(other) => {
                tracing::warn!(sentinel = %other, "unrecognized permissions sentinel");
                Grants::none()
            }
            Self::Record(record) => {
                let mut scoped = BTreeMap::new();
                for (module, levels) in record.permissions {
                    let mut set = BTreeSet::new();
                    for raw in levels {
                        match parse_level(&raw) {
                            Some(level) => {
                                set.insert(level);
                            }
                            None => {
                                tracing::warn!(module = %module, level = %raw, "unknown permission level");
                            }
                        }
                    }
                    scoped.insert(CapabilityModule::new(module), set);
                }
                Grants::Scoped(scoped)
            }
        }
    }
}

fn parse_level(raw: &str) -> Option<PermissionLevel> {
    match raw {
        "READ" => Some(PermissionLevel::Read),
        "WRITE" => Some(PermissionLevel::Write),
        "DELETE" => Some(PermissionLevel::Delete),
        "FORBIDDEN" => Some(PermissionLevel::Forbidden),
        _ => None,
    }
}

/// Plan record; the provider ships a full billing object, this keeps the
/// slice the client evaluates and displays.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlan {
    pub plan_name: String,
    #[serde(default)]
    pub category: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub max_users: u32,
    #[serde(default)]
    pub max_employees: u32,
    #[serde(default)]
    pub max_departments: u32,
    #[serde(default)]
    pub grace_period_days: u32,
    #[serde(default)]
    pub hr_features: BTreeMap<String, bool>,
    #[serde(default)]
    pub hr_limits: BTreeMap<String, i64>,
    #[serde(default)]
    pub included_modules: Vec<String>,
}

impl WirePlan {
    pub fn into_plan(self) -> Plan {
        Plan {
            name: self.plan_name,
            category: self.category,
            status: self.status,
            max_users: self.max_users,
            max_employees: self.max_employees,
            max_departments: self.max_departments,
            grace_period_days: self.grace_period_days,
            features: self.hr_features,
            included_modules: self.included_modules.into_iter().collect(),
            // Negative quotas are clamped; nothing here enforces them.
            limits: self
                .hr_limits
                .into_iter()
                .map(|(k, v)| (k, v.max(0) as u64))
                .collect(),
        }
    }
}

/// Envelope returned by `/validate/token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateEnvelope {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<ValidateData>,
    #[serde(default)]
    pub new_csrf_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateData {
    pub role: Role,
    pub email: String,
}

impl ValidateEnvelope {
    pub fn is_authorized(&self) -> bool {
        self.valid && self.status.as_deref() == Some(VALIDATE_AUTHORIZED)
    }

    pub fn is_csrf_failure(&self) -> bool {
        self.message.as_deref() == Some(CSRF_FAILURE_MESSAGE)
    }
}

/// Envelope returned by `/renew-csrf`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub new_csrf_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Bare acknowledgement envelope (resend, forgot/reset password).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEnvelope {
    #[serde(default)]
    pub message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
