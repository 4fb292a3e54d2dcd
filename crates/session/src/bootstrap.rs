//! Startup restore: repopulate the session from the vault before any UI
//! renders, so a reload does not bounce an authenticated user to login.

use anvilhr_client::IdentityApi;

use crate::manager::SessionManager;
use crate::session::Transition;
use crate::vault::{SessionVault, VaultRead};

/// How startup restore concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A persisted session was installed. `validated` is true only when it
    /// was also confirmed against the provider during bootstrap.
    Restored { validated: bool },
    /// Nothing usable was persisted; show the sign-in page.
    RequiresLogin,
    /// Persisted state was partial or unreadable and has been wiped.
    CorruptStateCleared,
}

impl BootstrapOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, BootstrapOutcome::Restored { .. })
    }
}

impl<A, V> SessionManager<A, V>
where
    A: IdentityApi,
    V: SessionVault,
{
    /// Restore persisted session state, once, at startup.
    ///
    /// Infallible by design: every failure mode degrades to a signed-out
    /// state rather than an error the caller has to handle before the app
    /// can draw anything.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        let read = match self.vault.load().await {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(error = %e, "session vault unreadable at startup");
                return BootstrapOutcome::RequiresLogin;
            }
        };

        match read {
            VaultRead::Empty => BootstrapOutcome::RequiresLogin,
            VaultRead::Corrupt => {
                tracing::warn!("persisted session is partial or unreadable, wiping it");
                if let Err(e) = self.vault.clear().await {
                    tracing::error!(error = %e, "failed to wipe corrupt session state");
                }
                BootstrapOutcome::CorruptStateCleared
            }
            VaultRead::Intact(persisted) => {
                self.store.dispatch(Transition::Restore(persisted));

                if !self.config.validate_on_restore {
                    return BootstrapOutcome::Restored { validated: false };
                }
                match self.validate_session().await {
                    Ok(()) => BootstrapOutcome::Restored { validated: true },
                    Err(e) => {
                        // Fatal rejections have already cleared the store;
                        // anything else (offline start) keeps the restored
                        // session and defers validation.
                        if self.store.snapshot().is_authenticated() {
                            tracing::warn!(
                                error = %e,
                                "restored session could not be validated yet"
                            );
                            BootstrapOutcome::Restored { validated: false }
                        } else {
                            BootstrapOutcome::RequiresLogin
                        }
                    }
                }
            }
        }
    }
}
