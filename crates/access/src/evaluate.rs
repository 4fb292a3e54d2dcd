use std::collections::BTreeSet;

use thiserror::Error;

use crate::{Action, CapabilityModule, Grants, PermissionLevel, Plan, Role};

/// Everything the evaluator needs about the current session.
///
/// Construction is the session layer's job; this crate only answers queries.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
    pub role: Role,
    pub grants: &'a Grants,
    pub plan: Option<&'a Plan>,
}

/// Declarative requirements checked by [`AccessContext::check`].
///
/// Every configured dimension must pass (conjunction). Unset dimensions are
/// not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirements {
    /// Require a specific level on a module.
    pub permission: Option<(CapabilityModule, PermissionLevel)>,
    /// Require any non-forbidden level on a module (navigation entries and
    /// other surfaces where the exact level does not matter).
    pub any_access: Option<CapabilityModule>,
    /// Require a plan feature flag.
    pub plan_feature: Option<String>,
    /// Require a module to be included in the plan tier.
    pub plan_module: Option<String>,
    /// Require the plan to be active even when no other plan dimension is
    /// configured. Implied by `plan_feature`/`plan_module`.
    pub require_active_plan: bool,
}

impl AccessRequirements {
    pub fn permission(module: CapabilityModule, level: PermissionLevel) -> Self {
        Self {
            permission: Some((module, level)),
            ..Self::default()
        }
    }

    pub fn any_access(module: CapabilityModule) -> Self {
        Self {
            any_access: Some(module),
            ..Self::default()
        }
    }

    fn plan_constrained(&self) -> bool {
        self.plan_feature.is_some() || self.plan_module.is_some() || self.require_active_plan
    }
}

/// Why an access check failed. The first failing dimension wins.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessDenial {
    #[error("access to {0} is explicitly forbidden")]
    Forbidden(CapabilityModule),

    #[error("missing {level} permission on {module}")]
    MissingLevel {
        module: CapabilityModule,
        level: PermissionLevel,
    },

    #[error("no access to {0}")]
    NoAccess(CapabilityModule),

    #[error("your plan does not include the '{0}' feature")]
    FeatureUnavailable(String),

    #[error("your plan does not include the '{0}' module")]
    ModuleNotIncluded(String),

    #[error("your subscription plan is not active")]
    PlanInactive,

    #[error("no subscription plan is loaded")]
    PlanMissing,
}

impl<'a> AccessContext<'a> {
    pub fn new(role: Role, grants: &'a Grants, plan: Option<&'a Plan>) -> Self {
        Self { role, grants, plan }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Single-dimension queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `level` is held on `module`.
    ///
    /// Administrators pass unconditionally. Non-admins need the module
    /// granted with that level and without `FORBIDDEN`.
    ///
    /// - No IO
    /// - No panics
    /// - No plan involvement (pure grant check)
    pub fn has_permission(&self, module: &CapabilityModule, level: PermissionLevel) -> bool {
        if self.role.is_admin() {
            return true;
        }
        self.grants.allows(module, level)
    }

    /// Whether at least one real level is held on `module`.
    pub fn has_any_access(&self, module: &CapabilityModule) -> bool {
        if self.role.is_admin() {
            return true;
        }
        self.grants.any_access(module)
    }

    /// Negation companion of [`Self::has_any_access`]: true when the module
    /// is explicitly forbidden or simply not granted. Always false for
    /// administrators.
    pub fn is_forbidden(&self, module: &CapabilityModule) -> bool {
        if self.role.is_admin() {
            return false;
        }
        self.grants.is_forbidden(module)
    }

    /// Plan feature flag lookup; false when no plan is loaded.
    pub fn has_feature(&self, flag: &str) -> bool {
        self.plan.is_some_and(|p| p.has_feature(flag))
    }

    /// Plan module inclusion lookup; false when no plan is loaded.
    pub fn has_module(&self, name: &str) -> bool {
        self.plan.is_some_and(|p| p.has_module(name))
    }

    /// Whether the plan is loaded and active.
    pub fn is_plan_active(&self) -> bool {
        self.plan.is_some_and(Plan::is_active)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Composite rule
    // ─────────────────────────────────────────────────────────────────────────

    /// The composite rule every gate consults.
    ///
    /// Administrators skip grant dimensions but never plan dimensions. All
    /// configured dimensions are conjunctive; evaluation order is fixed
    /// (forbidden, level, any-access, plan feature, plan module, plan
    /// active) and the first failing dimension is the reported denial.
    pub fn check(&self, req: &AccessRequirements) -> Result<(), AccessDenial> {
        if !self.role.is_admin() {
            if let Some((module, level)) = &req.permission {
                if self.grants.is_forbidden(module) {
                    return Err(AccessDenial::Forbidden(module.clone()));
                }
                if !self.grants.allows(module, *level) {
                    return Err(AccessDenial::MissingLevel {
                        module: module.clone(),
                        level: *level,
                    });
                }
            }
            if let Some(module) = &req.any_access {
                if self.grants.is_forbidden(module) {
                    return Err(AccessDenial::Forbidden(module.clone()));
                }
                if !self.grants.any_access(module) {
                    return Err(AccessDenial::NoAccess(module.clone()));
                }
            }
        }

        if req.plan_constrained() {
            let Some(plan) = self.plan else {
                return Err(AccessDenial::PlanMissing);
            };
            if let Some(flag) = &req.plan_feature {
                if !plan.has_feature(flag) {
                    return Err(AccessDenial::FeatureUnavailable(flag.clone()));
                }
            }
            if let Some(name) = &req.plan_module {
                if !plan.has_module(name) {
                    return Err(AccessDenial::ModuleNotIncluded(name.clone()));
                }
            }
            if !plan.is_active() {
                return Err(AccessDenial::PlanInactive);
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Display helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Known modules this session can surface in navigation.
    pub fn accessible_modules(&self) -> Vec<CapabilityModule> {
        CapabilityModule::KNOWN
            .iter()
            .filter(|m| self.has_any_access(m))
            .cloned()
            .collect()
    }

    /// Effective levels on a module, for display. Administrators report the
    /// full set.
    pub fn module_levels(&self, module: &CapabilityModule) -> BTreeSet<PermissionLevel> {
        if self.role.is_admin() {
            return [
                PermissionLevel::Read,
                PermissionLevel::Write,
                PermissionLevel::Delete,
            ]
            .into_iter()
            .collect();
        }
        self.grants.levels(module)
    }

    /// Whether a UI action is allowed on a module.
    pub fn can_perform(&self, module: &CapabilityModule, action: Action) -> bool {
        self.has_permission(module, action.required_level())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
