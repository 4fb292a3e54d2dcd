//! `anvilhr-core` — shared client-domain primitives.
//!
//! This crate contains **pure value objects and validation** (no IO, no transport).

pub mod error;
pub mod id;
pub mod token;
pub mod validation;

pub use error::{DomainError, DomainResult};
pub use id::{TenantId, UserId};
pub use token::CsrfToken;
pub use validation::{PasswordPolicy, PasswordReport, validate_email, validate_verification_code};
