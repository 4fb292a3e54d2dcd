use serde::{Deserialize, Serialize};

/// Tenant-scoped role issued by the identity provider.
///
/// The set is closed: the provider only ever issues these three. The role
/// decides the grant-bypass rule in the evaluator (admins skip per-module
/// grants) and the role floor on gated surfaces; plan entitlements apply to
/// every role, admins included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    TenantAdmin,
    TenantUser,
    TenantHelper,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::TenantAdmin)
    }

    /// Total order used for role-floor checks: helper < user < admin.
    ///
    /// Display/navigation ordering only where grants are concerned; the
    /// evaluator never infers grants from rank.
    pub fn rank(&self) -> u8 {
        match self {
            Role::TenantHelper => 0,
            Role::TenantUser => 1,
            Role::TenantAdmin => 2,
        }
    }

    pub fn at_least(&self, floor: Role) -> bool {
        self.rank() >= floor.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TenantAdmin => "TENANT_ADMIN",
            Role::TenantUser => "TENANT_USER",
            Role::TenantHelper => "TENANT_HELPER",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_screaming_snake() {
        let json = serde_json::to_string(&Role::TenantAdmin).unwrap();
        assert_eq!(json, "\"TENANT_ADMIN\"");

        let role: Role = serde_json::from_str("\"TENANT_HELPER\"").unwrap();
        assert_eq!(role, Role::TenantHelper);
    }

    #[test]
    fn rank_orders_helper_below_user_below_admin() {
        assert!(Role::TenantAdmin.at_least(Role::TenantUser));
        assert!(Role::TenantUser.at_least(Role::TenantHelper));
        assert!(!Role::TenantHelper.at_least(Role::TenantUser));
        assert!(Role::TenantUser.at_least(Role::TenantUser));
    }
}
