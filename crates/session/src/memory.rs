//! In-memory [`SessionVault`] for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Context;

use anvilhr_core::CsrfToken;

use crate::vault::{
    PersistedSession, SessionVault, VaultError, VaultRead, ENTRY_GRANTS, ENTRY_PLAN, ENTRY_TOKEN,
    ENTRY_USER,
};

/// Entry-per-key in-memory vault with the same shape and semantics as
/// [`crate::vault::SqliteVault`], including the token mirror. Entries can
/// be removed or replaced out-of-band to simulate tampering and corruption.
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<BTreeMap<String, String>>,
    mirror: Mutex<Option<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a single entry, as an external actor would. `entry` is one
    /// of the `ENTRY_*` names.
    pub fn remove_entry(&self, entry: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entry);
        if entry == ENTRY_TOKEN {
            *self.mirror.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Overwrite a single entry with raw text, bypassing serialization.
    pub fn inject_raw(&self, entry: &str, data: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.to_string(), data.to_string());
    }

    /// Current token mirror contents, if any.
    pub fn mirror(&self) -> Option<String> {
        self.mirror
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl SessionVault for MemoryVault {
    async fn save(&self, session: &PersistedSession) -> Result<(), VaultError> {
        let token =
            serde_json::to_string(&session.token).context("failed to serialize session token")?;
        let user =
            serde_json::to_string(&session.user).context("failed to serialize session user")?;
        let grants = serde_json::to_string(&session.grants)
            .context("failed to serialize session grants")?;
        let plan =
            serde_json::to_string(&session.plan).context("failed to serialize session plan")?;

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(ENTRY_TOKEN.to_string(), token);
        entries.insert(ENTRY_USER.to_string(), user);
        entries.insert(ENTRY_GRANTS.to_string(), grants);
        entries.insert(ENTRY_PLAN.to_string(), plan);
        drop(entries);

        *self.mirror.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(session.token.as_str().to_string());
        Ok(())
    }

    async fn save_token(&self, token: &CsrfToken) -> Result<(), VaultError> {
        let data =
            serde_json::to_string(token).context("failed to serialize renewed token")?;

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(ENTRY_TOKEN) {
            tracing::warn!("token rotation skipped, no session is persisted");
            return Ok(());
        }
        entries.insert(ENTRY_TOKEN.to_string(), data);
        drop(entries);

        *self.mirror.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(token.as_str().to_string());
        Ok(())
    }

    async fn load(&self) -> Result<VaultRead, VaultError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if entries.is_empty() {
            return Ok(VaultRead::Empty);
        }
        let required = [ENTRY_TOKEN, ENTRY_USER, ENTRY_GRANTS, ENTRY_PLAN];
        if required.iter().any(|e| !entries.contains_key(*e)) {
            tracing::warn!("persisted session is missing entries, treating as corrupt");
            return Ok(VaultRead::Corrupt);
        }

        let parse = || -> anyhow::Result<PersistedSession> {
            Ok(PersistedSession {
                token: serde_json::from_str(&entries[ENTRY_TOKEN])
                    .context("persisted token entry is malformed")?,
                user: serde_json::from_str(&entries[ENTRY_USER])
                    .context("persisted user entry is malformed")?,
                grants: serde_json::from_str(&entries[ENTRY_GRANTS])
                    .context("persisted grants entry is malformed")?,
                plan: serde_json::from_str(&entries[ENTRY_PLAN])
                    .context("persisted plan entry is malformed")?,
            })
        };
        match parse() {
            Ok(persisted) => Ok(VaultRead::Intact(persisted)),
            Err(e) => {
                tracing::warn!(error = %e, "persisted session failed to parse, treating as corrupt");
                Ok(VaultRead::Corrupt)
            }
        }
    }

    async fn clear(&self) -> Result<(), VaultError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.mirror.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    async fn token_present(&self) -> Result<bool, VaultError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(ENTRY_TOKEN))
    }
}
