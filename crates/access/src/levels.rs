use serde::{Deserialize, Serialize};

/// Access level grantable on a capability module.
///
/// `Forbidden` is not the absence of a grant: it is an explicit hard deny
/// that overrides any other level present on the same module.
///
/// Levels are independent grants; holding `Write` does not imply `Read`.
/// The derived ordering exists for stable storage and display only and must
/// never feed a policy decision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    Forbidden,
    Read,
    Write,
    Delete,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Forbidden => "FORBIDDEN",
            PermissionLevel::Read => "READ",
            PermissionLevel::Write => "WRITE",
            PermissionLevel::Delete => "DELETE",
        }
    }
}

impl core::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI-level action mapped onto the permission level it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn required_level(&self) -> PermissionLevel {
        match self {
            Action::View => PermissionLevel::Read,
            Action::Create | Action::Edit => PermissionLevel::Write,
            Action::Delete => PermissionLevel::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        let json = serde_json::to_string(&PermissionLevel::Forbidden).unwrap();
        assert_eq!(json, "\"FORBIDDEN\"");

        let level: PermissionLevel = serde_json::from_str("\"WRITE\"").unwrap();
        assert_eq!(level, PermissionLevel::Write);
    }

    #[test]
    fn actions_map_to_levels() {
        assert_eq!(Action::View.required_level(), PermissionLevel::Read);
        assert_eq!(Action::Create.required_level(), PermissionLevel::Write);
        assert_eq!(Action::Edit.required_level(), PermissionLevel::Write);
        assert_eq!(Action::Delete.required_level(), PermissionLevel::Delete);
    }
}
