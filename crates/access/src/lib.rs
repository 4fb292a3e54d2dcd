//! `anvilhr-access` — pure access policy for the client session.
//!
//! Role, per-module grants, and plan entitlements each answer independently;
//! this crate computes the combined verdict. It is intentionally decoupled
//! from HTTP, storage, and the session state machine.

pub mod evaluate;
pub mod grants;
pub mod levels;
pub mod module;
pub mod plan;
pub mod profile;
pub mod roles;

pub use evaluate::{AccessContext, AccessDenial, AccessRequirements};
pub use grants::Grants;
pub use levels::{Action, PermissionLevel};
pub use module::CapabilityModule;
pub use plan::{Plan, PlanStatus};
pub use profile::{UserProfile, UserStatus};
pub use roles::Role;
