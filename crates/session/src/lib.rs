//! `anvilhr-session` — client session state, persistence and lifecycle.
//!
//! The session aggregate lives in a [`store::SessionStore`] and is mutated
//! only through dispatched [`session::Transition`]s. A [`manager::SessionManager`]
//! drives the identity client and the persistence vault; a
//! [`lifecycle::TokenLifecycle`] worker renews the anti-forgery token in the
//! background and watches durable storage for tampering; [`gate::AccessGate`]
//! is the boundary protected surfaces consult before rendering.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod manager;
pub mod memory;
pub mod session;
pub mod store;
pub mod vault;

pub use bootstrap::BootstrapOutcome;
pub use config::SessionConfig;
pub use error::SessionError;
pub use events::{SecurityEvent, SecurityEvents, Subscription, TerminationReason};
pub use gate::{
    AccessGate, DenialDirective, GateConfig, GateDenial, GateOutcome, IdentityFingerprint,
    RecoveryAction,
};
pub use lifecycle::{LifecycleHandle, TokenLifecycle};
pub use manager::SessionManager;
pub use memory::MemoryVault;
pub use session::{
    AuthState, ChallengeResult, LoginResult, PendingCredentials, Session, Transition,
};
pub use store::{SessionStore, StoreSubscription};
pub use vault::{PersistedSession, SessionVault, SqliteVault, VaultError, VaultRead};
