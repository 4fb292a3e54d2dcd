//! Route gating: declarative access requirements resolved against the
//! current session, with an identity-keyed cache so token rotation and
//! unrelated snapshots never re-trigger evaluation.

use anvilhr_access::{
    AccessContext, AccessRequirements, CapabilityModule, PermissionLevel, Role,
};
use anvilhr_core::UserId;

use crate::session::Session;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What a gated surface requires. All configured dimensions must pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// Require a permission level on a module.
    pub permission: Option<CapabilityModule>,
    /// Level required on `permission`; ignored when no module is set.
    pub level: PermissionLevel,
    /// Require a plan feature flag.
    pub plan_feature: Option<String>,
    /// Require a module included in the plan tier.
    pub plan_module: Option<String>,
    /// Restrict to specific roles. Empty means any authenticated role.
    pub required_roles: Vec<Role>,
    /// Where to send a visitor who fails authentication or the role
    /// restriction. Defaults to the sign-in page.
    pub redirect: Option<String>,
    /// Replaces the generated denial message when set.
    pub fallback_message: Option<String>,
    /// Render an inline denial for permission and plan failures instead of
    /// rendering nothing.
    pub render_fallback: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            permission: None,
            level: PermissionLevel::Read,
            plan_feature: None,
            plan_module: None,
            required_roles: Vec::new(),
            redirect: None,
            fallback_message: None,
            render_fallback: true,
        }
    }
}

impl GateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission(mut self, module: CapabilityModule, level: PermissionLevel) -> Self {
        self.permission = Some(module);
        self.level = level;
        self
    }

    pub fn with_plan_feature(mut self, flag: impl Into<String>) -> Self {
        self.plan_feature = Some(flag.into());
        self
    }

    pub fn with_plan_module(mut self, name: impl Into<String>) -> Self {
        self.plan_module = Some(name.into());
        self
    }

    pub fn with_required_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_roles = roles.into_iter().collect();
        self
    }

    pub fn with_redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(path.into());
        self
    }

    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = Some(message.into());
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.render_fallback = false;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// What the caller should do about a denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialDirective {
    /// Send the visitor to the sign-in page.
    RedirectToLogin,
    /// Send the visitor to a specific path.
    Redirect(String),
    /// Render an inline denial in place of the gated content.
    RenderFallback,
    /// Render nothing at all.
    RenderNothing,
}

/// Recovery affordances worth offering alongside an inline denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Retry,
    GoBack,
    GoToDashboard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateDenial {
    /// Display-ready explanation of the denial.
    pub message: String,
    pub directive: DenialDirective,
    pub recovery: Vec<RecoveryAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Not resolved against any session yet.
    Validating,
    Authorized,
    Denied(GateDenial),
}

impl GateOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GateOutcome::Authorized)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate
// ─────────────────────────────────────────────────────────────────────────────

/// The identity facts a cached outcome is keyed on.
///
/// Deliberately coarse: token rotation keeps `token_present` true and so
/// keeps the cache warm, while login, logout, and user switches all change
/// at least one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFingerprint {
    pub authenticated: bool,
    pub token_present: bool,
    pub user_id: Option<UserId>,
}

impl IdentityFingerprint {
    pub fn of(session: &Session) -> Self {
        Self {
            authenticated: session.is_authenticated(),
            token_present: session.token.is_some(),
            user_id: session.user.as_ref().map(|u| u.id),
        }
    }
}

/// A gate instance for one surface. Hold one per gated route or widget and
/// feed it session snapshots; it re-evaluates only when the identity behind
/// the snapshot changes.
#[derive(Debug)]
pub struct AccessGate {
    config: GateConfig,
    fingerprint: Option<IdentityFingerprint>,
    outcome: GateOutcome,
}

impl AccessGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            fingerprint: None,
            outcome: GateOutcome::Validating,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The last resolved outcome, [`GateOutcome::Validating`] before the
    /// first [`Self::resolve`].
    pub fn outcome(&self) -> &GateOutcome {
        &self.outcome
    }

    /// Drop the cached outcome so the next resolve re-evaluates.
    pub fn invalidate(&mut self) {
        self.fingerprint = None;
        self.outcome = GateOutcome::Validating;
    }

    /// Resolve the gate against a session snapshot.
    pub fn resolve(&mut self, session: &Session) -> &GateOutcome {
        let fingerprint = IdentityFingerprint::of(session);
        if self.fingerprint.as_ref() == Some(&fingerprint) {
            return &self.outcome;
        }
        self.outcome = self.evaluate(session);
        self.fingerprint = Some(fingerprint);
        &self.outcome
    }

    fn evaluate(&self, session: &Session) -> GateOutcome {
        if !session.is_authenticated() || session.token.is_none() || session.user.is_none() {
            return GateOutcome::Denied(GateDenial {
                message: "You need to sign in to view this page.".to_string(),
                directive: match &self.config.redirect {
                    Some(path) => DenialDirective::Redirect(path.clone()),
                    None => DenialDirective::RedirectToLogin,
                },
                recovery: Vec::new(),
            });
        }
        let Some(user) = session.user.as_ref() else {
            // Unreachable given the check above; kept total.
            return GateOutcome::Denied(GateDenial {
                message: "You need to sign in to view this page.".to_string(),
                directive: DenialDirective::RedirectToLogin,
                recovery: Vec::new(),
            });
        };

        if !self.config.required_roles.is_empty()
            && !self.config.required_roles.contains(&user.role)
        {
            let allowed = self
                .config
                .required_roles
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return GateOutcome::Denied(GateDenial {
                message: format!("This page is restricted to: {allowed}."),
                directive: DenialDirective::Redirect(
                    self.config
                        .redirect
                        .clone()
                        .unwrap_or_else(|| "/dashboard".to_string()),
                ),
                recovery: vec![RecoveryAction::GoBack, RecoveryAction::GoToDashboard],
            });
        }

        let context = AccessContext::new(user.role, &session.grants, session.plan.as_ref());
        let requirements = AccessRequirements {
            permission: self
                .config
                .permission
                .clone()
                .map(|module| (module, self.config.level)),
            any_access: None,
            plan_feature: self.config.plan_feature.clone(),
            plan_module: self.config.plan_module.clone(),
            require_active_plan: false,
        };

        match context.check(&requirements) {
            Ok(()) => GateOutcome::Authorized,
            Err(denial) => GateOutcome::Denied(GateDenial {
                message: self
                    .config
                    .fallback_message
                    .clone()
                    .unwrap_or_else(|| denial.to_string()),
                directive: if self.config.render_fallback {
                    DenialDirective::RenderFallback
                } else {
                    DenialDirective::RenderNothing
                },
                recovery: vec![
                    RecoveryAction::Retry,
                    RecoveryAction::GoBack,
                    RecoveryAction::GoToDashboard,
                ],
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use anvilhr_access::{Grants, Plan, PlanStatus, UserProfile, UserStatus};
    use anvilhr_core::{CsrfToken, TenantId, UserId};

    use crate::session::AuthState;

    use super::*;

    fn profile(role: Role) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            email: "ana@acme.test".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Ruiz".to_string(),
            role,
            company_role: None,
            tenant_id: TenantId::new(),
            email_verified: true,
            mfa_required: false,
            status: UserStatus::Active,
        }
    }

    fn authed(role: Role, grants: Grants, plan: Option<Plan>) -> Session {
        Session {
            auth_state: AuthState::Authenticated,
            user: Some(profile(role)),
            grants,
            plan,
            token: Some(CsrfToken::new("tok-1")),
            ..Session::default()
        }
    }

    fn active_plan() -> Plan {
        Plan {
            name: "Growth".to_string(),
            category: "HR".to_string(),
            status: PlanStatus::Active,
            max_users: 50,
            max_employees: 500,
            max_departments: 20,
            grace_period_days: 14,
            features: BTreeMap::from([("advancedReports".to_string(), true)]),
            included_modules: BTreeSet::from(["EMPLOYEES".to_string(), "REPORTS".to_string()]),
            limits: BTreeMap::new(),
        }
    }

    #[test]
    fn unauthenticated_sessions_are_sent_to_login() {
        let mut gate = AccessGate::new(GateConfig::default());
        let GateOutcome::Denied(denial) = gate.resolve(&Session::default()).clone() else {
            panic!("expected a denial");
        };
        assert_eq!(denial.directive, DenialDirective::RedirectToLogin);
    }

    #[test]
    fn custom_redirect_overrides_the_login_target() {
        let mut gate = AccessGate::new(GateConfig::new().with_redirect("/welcome"));
        let GateOutcome::Denied(denial) = gate.resolve(&Session::default()).clone() else {
            panic!("expected a denial");
        };
        assert_eq!(denial.directive, DenialDirective::Redirect("/welcome".to_string()));
    }

    #[test]
    fn write_gate_names_the_missing_level() {
        let grants = Grants::from([(CapabilityModule::EMPLOYEES, vec![PermissionLevel::Read])]);
        let session = authed(Role::TenantUser, grants, None);

        let mut gate = AccessGate::new(
            GateConfig::new().with_permission(CapabilityModule::EMPLOYEES, PermissionLevel::Write),
        );
        let GateOutcome::Denied(denial) = gate.resolve(&session).clone() else {
            panic!("expected a denial");
        };
        assert!(denial.message.contains("WRITE"));
        assert!(denial.message.contains("EMPLOYEES"));
        assert_eq!(denial.directive, DenialDirective::RenderFallback);
        assert!(denial.recovery.contains(&RecoveryAction::GoToDashboard));
    }

    #[test]
    fn role_restriction_redirects_to_the_dashboard() {
        let session = authed(Role::TenantUser, Grants::All, None);
        let mut gate =
            AccessGate::new(GateConfig::new().with_required_roles([Role::TenantAdmin]));

        let GateOutcome::Denied(denial) = gate.resolve(&session).clone() else {
            panic!("expected a denial");
        };
        assert_eq!(
            denial.directive,
            DenialDirective::Redirect("/dashboard".to_string())
        );
        assert!(denial.message.contains(Role::TenantAdmin.as_str()));
    }

    #[test]
    fn admin_passes_grant_gates_but_not_plan_gates() {
        let session = authed(Role::TenantAdmin, Grants::none(), None);

        let mut permission_gate = AccessGate::new(
            GateConfig::new().with_permission(CapabilityModule::PAYROLL, PermissionLevel::Delete),
        );
        assert!(permission_gate.resolve(&session).is_authorized());

        let mut plan_gate =
            AccessGate::new(GateConfig::new().with_plan_feature("advancedReports"));
        let GateOutcome::Denied(denial) = plan_gate.resolve(&session).clone() else {
            panic!("expected a denial");
        };
        assert_eq!(denial.directive, DenialDirective::RenderFallback);
    }

    #[test]
    fn plan_gates_pass_against_an_active_plan() {
        let session = authed(Role::TenantUser, Grants::All, Some(active_plan()));
        let mut gate = AccessGate::new(
            GateConfig::new()
                .with_plan_feature("advancedReports")
                .with_plan_module("REPORTS"),
        );
        assert!(gate.resolve(&session).is_authorized());
    }

    #[test]
    fn fallback_message_overrides_the_denial_text() {
        let session = authed(Role::TenantUser, Grants::none(), None);
        let mut gate = AccessGate::new(
            GateConfig::new()
                .with_permission(CapabilityModule::REPORTS, PermissionLevel::Read)
                .with_fallback_message("Reports are not available on your account."),
        );
        let GateOutcome::Denied(denial) = gate.resolve(&session).clone() else {
            panic!("expected a denial");
        };
        assert_eq!(denial.message, "Reports are not available on your account.");
    }

    #[test]
    fn disabling_the_fallback_renders_nothing() {
        let session = authed(Role::TenantUser, Grants::none(), None);
        let mut gate = AccessGate::new(
            GateConfig::new()
                .with_permission(CapabilityModule::REPORTS, PermissionLevel::Read)
                .without_fallback(),
        );
        let GateOutcome::Denied(denial) = gate.resolve(&session).clone() else {
            panic!("expected a denial");
        };
        assert_eq!(denial.directive, DenialDirective::RenderNothing);
    }

    #[test]
    fn outcome_is_cached_until_the_identity_changes() {
        let grants = Grants::from([(CapabilityModule::EMPLOYEES, vec![PermissionLevel::Read])]);
        let mut session = authed(Role::TenantUser, grants, None);

        let mut gate = AccessGate::new(
            GateConfig::new().with_permission(CapabilityModule::EMPLOYEES, PermissionLevel::Read),
        );
        assert!(gate.resolve(&session).is_authorized());

        // Token rotation keeps the fingerprint stable: no re-evaluation.
        session.token = Some(CsrfToken::new("tok-2"));
        // Even a grant change goes unseen until the identity changes.
        session.grants = Grants::none();
        assert!(gate.resolve(&session).is_authorized());

        // Logout changes the fingerprint and forces a re-evaluation.
        let signed_out = Session::default();
        assert!(!gate.resolve(&signed_out).is_authorized());

        // Explicit invalidation also drops the cache.
        gate.invalidate();
        assert_eq!(gate.outcome(), &GateOutcome::Validating);
        assert!(!gate.resolve(&session).is_authorized());
    }
}
