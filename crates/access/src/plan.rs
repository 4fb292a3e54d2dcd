use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tenant's subscription plan.
///
/// Plan evaluation is only meaningful while `Active`; anything else denies
/// plan-constrained surfaces for every role, administrators included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Active,
    Inactive,
    Suspended,
    Expired,
    /// Statuses introduced by a newer backend than this build.
    #[serde(other)]
    Unknown,
}

/// Tenant-wide subscription entitlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub category: String,
    pub status: PlanStatus,
    pub max_users: u32,
    pub max_employees: u32,
    pub max_departments: u32,
    pub grace_period_days: u32,
    /// Feature flags, e.g. "payroll" -> true.
    pub features: BTreeMap<String, bool>,
    /// Module names included in the plan tier.
    pub included_modules: BTreeSet<String>,
    /// Numeric quotas, e.g. payslips per month. Absent key means zero.
    pub limits: BTreeMap<String, u64>,
}

impl Plan {
    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }

    pub fn has_feature(&self, flag: &str) -> bool {
        self.features.get(flag).copied().unwrap_or(false)
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.included_modules.contains(name)
    }

    pub fn limit(&self, key: &str) -> u64 {
        self.limits.get(key).copied().unwrap_or(0)
    }
}
