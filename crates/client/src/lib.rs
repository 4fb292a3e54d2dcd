//! `anvilhr-client` — HTTP identity provider client.
//!
//! Speaks the backend's identity wire contract (login, challenges, token
//! validation and renewal, password recovery) and converts wire payloads
//! into the domain types of `anvilhr-core` and `anvilhr-access`. Session
//! state lives upstream in `anvilhr-session`; this crate is stateless apart
//! from the ambient session cookie held by the underlying HTTP client.

pub mod error;
pub mod http;
pub mod identity;
pub mod options;
pub mod wire;

pub use error::ApiError;
pub use http::HttpIdentityApi;
pub use identity::{
    AuthenticatedPayload, ChallengeKind, IdentityApi, LoginOutcome, TokenValidation,
};
pub use options::ClientOptions;
