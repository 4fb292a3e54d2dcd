use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Capability module identifier.
///
/// Modules are opaque strings at this layer (e.g. "EMPLOYEES"). The set the
/// product ships with is available as constants, but unknown names still
/// round-trip so a newer backend can grant modules this build has no
/// constant for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityModule(Cow<'static, str>);

impl CapabilityModule {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const EMPLOYEES: Self = Self::from_static("EMPLOYEES");
    pub const TENANT_USERS: Self = Self::from_static("TENANT_USERS");
    pub const DEPARTMENTS: Self = Self::from_static("DEPARTMENTS");
    pub const PAYROLL: Self = Self::from_static("PAYROLL");
    pub const REPORTS: Self = Self::from_static("REPORTS");
    pub const DOCUMENTS: Self = Self::from_static("DOCUMENTS");
    pub const ANALYTICS: Self = Self::from_static("ANALYTICS");
    pub const RECRUITMENT: Self = Self::from_static("RECRUITMENT");
    pub const PERFORMANCE: Self = Self::from_static("PERFORMANCE");
    pub const TRAINING: Self = Self::from_static("TRAINING");
    pub const LEAVE_MANAGEMENT: Self = Self::from_static("LEAVE_MANAGEMENT");
    pub const TIME_TRACKING: Self = Self::from_static("TIME_TRACKING");

    /// Modules shipped with the product, in navigation order.
    pub const KNOWN: [Self; 12] = [
        Self::EMPLOYEES,
        Self::TENANT_USERS,
        Self::DEPARTMENTS,
        Self::PAYROLL,
        Self::REPORTS,
        Self::DOCUMENTS,
        Self::ANALYTICS,
        Self::RECRUITMENT,
        Self::PERFORMANCE,
        Self::TRAINING,
        Self::LEAVE_MANAGEMENT,
        Self::TIME_TRACKING,
    ];
}

impl core::fmt::Display for CapabilityModule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for CapabilityModule {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&CapabilityModule::EMPLOYEES).unwrap();
        assert_eq!(json, "\"EMPLOYEES\"");
    }

    #[test]
    fn unknown_modules_round_trip() {
        let module: CapabilityModule = serde_json::from_str("\"BENEFITS\"").unwrap();
        assert_eq!(module.as_str(), "BENEFITS");
        assert!(!CapabilityModule::KNOWN.contains(&module));
    }
}
