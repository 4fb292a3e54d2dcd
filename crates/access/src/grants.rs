use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{CapabilityModule, PermissionLevel};

/// Permission grants attached to a session.
///
/// Either everything is granted (provider-issued administrator shortcut) or
/// access is scoped per module. The distinction is a real variant here; the
/// wire-side `"ALL"` sentinel string is translated at the decode boundary
/// and never travels further into the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grants {
    /// Every module, every level.
    All,
    /// Explicit per-module level sets. A module absent from the map carries
    /// no access at all.
    Scoped(BTreeMap<CapabilityModule, BTreeSet<PermissionLevel>>),
}

/// Nothing granted.
impl Default for Grants {
    fn default() -> Self {
        Grants::none()
    }
}

impl Grants {
    /// Scoped grants with nothing granted.
    pub fn none() -> Self {
        Grants::Scoped(BTreeMap::new())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Grants::All)
    }

    /// Whether `level` is granted on `module`.
    ///
    /// `Forbidden` in a module's set is a hard deny: it wins over any other
    /// level granted alongside it.
    pub fn allows(&self, module: &CapabilityModule, level: PermissionLevel) -> bool {
        match self {
            Grants::All => true,
            Grants::Scoped(map) => map.get(module).is_some_and(|levels| {
                !levels.contains(&PermissionLevel::Forbidden) && levels.contains(&level)
            }),
        }
    }

    /// Whether the module carries at least one real (non-forbidden) level.
    pub fn any_access(&self, module: &CapabilityModule) -> bool {
        match self {
            Grants::All => true,
            Grants::Scoped(map) => map.get(module).is_some_and(|levels| {
                !levels.contains(&PermissionLevel::Forbidden)
                    && levels.iter().any(|l| *l != PermissionLevel::Forbidden)
            }),
        }
    }

    /// Whether the module is explicitly denied or simply not granted.
    pub fn is_forbidden(&self, module: &CapabilityModule) -> bool {
        match self {
            Grants::All => false,
            Grants::Scoped(map) => match map.get(module) {
                Some(levels) => levels.contains(&PermissionLevel::Forbidden),
                None => true,
            },
        }
    }

    /// Levels present on a module as granted (empty for ungranted modules;
    /// the full set under `All`).
    pub fn levels(&self, module: &CapabilityModule) -> BTreeSet<PermissionLevel> {
        match self {
            Grants::All => [
                PermissionLevel::Read,
                PermissionLevel::Write,
                PermissionLevel::Delete,
            ]
            .into_iter()
            .collect(),
            Grants::Scoped(map) => map.get(module).cloned().unwrap_or_default(),
        }
    }
}

/// Convenience constructor for scoped grants in tests and fixtures.
impl<const N: usize> From<[(CapabilityModule, Vec<PermissionLevel>); N]> for Grants {
    fn from(entries: [(CapabilityModule, Vec<PermissionLevel>); N]) -> Self {
        Grants::Scoped(
            entries
                .into_iter()
                .map(|(module, levels)| (module, levels.into_iter().collect()))
                .collect(),
        )
    }
}
