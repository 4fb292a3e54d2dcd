use serde::{Deserialize, Serialize};

use anvilhr_core::{TenantId, UserId};

use crate::Role;

/// Account status reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    #[serde(other)]
    Unknown,
}

/// Authenticated user identity as issued by the provider.
///
/// Replaced wholesale on every successful login/verification; never edited
/// field-by-field on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub company_role: Option<String>,
    pub tenant_id: TenantId,
    pub email_verified: bool,
    pub mfa_required: bool,
    pub status: UserStatus,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_tolerated() {
        let status: UserStatus = serde_json::from_str("\"LOCKED_OUT\"").unwrap();
        assert_eq!(status, UserStatus::Unknown);
    }

    #[test]
    fn full_name_joins_first_and_last() {
        let profile = UserProfile {
            id: UserId::new(),
            email: "amira@example.com".to_string(),
            first_name: "Amira".to_string(),
            last_name: "Haddad".to_string(),
            role: Role::TenantUser,
            company_role: Some("HR Specialist".to_string()),
            tenant_id: TenantId::new(),
            email_verified: true,
            mfa_required: false,
            status: UserStatus::Active,
        };
        assert_eq!(profile.full_name(), "Amira Haddad");
    }
}
