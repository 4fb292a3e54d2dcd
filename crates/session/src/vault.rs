//! Durable session persistence.
//!
//! Four related entries (token, user, grants, plan) are written and cleared
//! together, plus a plain-text mirror of the token alone for server-side
//! middleware inspection. The restore path treats anything less than the
//! full set as corrupt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tokio::sync::Mutex;

use anvilhr_access::{Grants, Plan, UserProfile};
use anvilhr_core::CsrfToken;

pub const ENTRY_TOKEN: &str = "token";
pub const ENTRY_USER: &str = "user";
pub const ENTRY_GRANTS: &str = "grants";
pub const ENTRY_PLAN: &str = "plan";

const REQUIRED_ENTRIES: [&str; 4] = [ENTRY_TOKEN, ENTRY_USER, ENTRY_GRANTS, ENTRY_PLAN];

/// The durable values of an authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: CsrfToken,
    pub user: UserProfile,
    pub grants: Grants,
    pub plan: Option<Plan>,
}

/// Storage failure. Wraps the underlying cause with context attached.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct VaultError(#[from] anyhow::Error);

/// What the vault found on load.
#[derive(Debug, Clone, PartialEq)]
pub enum VaultRead {
    /// Nothing persisted.
    Empty,
    /// All four entries present and well-formed.
    Intact(PersistedSession),
    /// A partial or unparseable set. The caller decides whether to wipe.
    Corrupt,
}

/// Durable storage for session state.
#[async_trait::async_trait]
pub trait SessionVault: Send + Sync {
    /// Write all four entries and the token mirror, atomically for the
    /// entries.
    async fn save(&self, session: &PersistedSession) -> Result<(), VaultError>;

    /// Rotate the stored token in place. A no-op when no session is
    /// persisted, so a renewal racing a logout cannot leave a lone token
    /// behind.
    async fn save_token(&self, token: &CsrfToken) -> Result<(), VaultError>;

    async fn load(&self) -> Result<VaultRead, VaultError>;

    /// Remove every entry and the mirror. Idempotent.
    async fn clear(&self) -> Result<(), VaultError>;

    /// Whether the token entry currently exists; polled by the tamper
    /// watch.
    async fn token_present(&self) -> Result<bool, VaultError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite vault
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed [`SessionVault`] with lazy pool initialization.
#[derive(Debug, Clone)]
pub struct SqliteVault {
    db_path: PathBuf,
    mirror_path: PathBuf,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteVault {
    /// Vault at the platform data directory, `{data_dir}/anvilhr/`.
    pub fn open_default() -> Result<Self, VaultError> {
        let dir = default_vault_dir().context("failed to resolve session vault directory")?;
        Ok(Self::open_at(dir))
    }

    /// Vault under an explicit directory. The directory is created on
    /// first use.
    pub fn open_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            db_path: dir.join("session.db"),
            mirror_path: dir.join("session.token"),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create vault directory at {:?}", parent))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", self.db_path.to_string_lossy());
        let pool = SqlitePool::connect(&db_url)
            .await
            .with_context(|| format!("failed to open session vault at {:?}", self.db_path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                entry    TEXT PRIMARY KEY,
                data     TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create session_state table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        pool_guard
            .clone()
            .context("session vault pool vanished after initialization")
    }

    fn write_mirror(&self, token: &CsrfToken) -> anyhow::Result<()> {
        std::fs::write(&self.mirror_path, token.as_str())
            .with_context(|| format!("failed to write token mirror at {:?}", self.mirror_path))
    }

    fn remove_mirror(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.mirror_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to remove token mirror at {:?}", self.mirror_path)
            }),
        }
    }
}

async fn upsert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &str,
    data: &str,
    saved_at: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO session_state (entry, data, saved_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(entry)
        DO UPDATE SET data = excluded.data, saved_at = excluded.saved_at
        "#,
    )
    .bind(entry)
    .bind(data)
    .bind(saved_at)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to upsert session entry '{entry}'"))?;
    Ok(())
}

#[async_trait::async_trait]
impl SessionVault for SqliteVault {
    async fn save(&self, session: &PersistedSession) -> Result<(), VaultError> {
        let pool = self.get_pool().await?;
        let now = Utc::now().to_rfc3339();

        let token = serde_json::to_string(&session.token)
            .context("failed to serialize session token")?;
        let user =
            serde_json::to_string(&session.user).context("failed to serialize session user")?;
        let grants = serde_json::to_string(&session.grants)
            .context("failed to serialize session grants")?;
        let plan =
            serde_json::to_string(&session.plan).context("failed to serialize session plan")?;

        let mut tx = pool
            .begin()
            .await
            .context("failed to begin session save transaction")?;
        upsert_entry(&mut tx, ENTRY_TOKEN, &token, &now).await?;
        upsert_entry(&mut tx, ENTRY_USER, &user, &now).await?;
        upsert_entry(&mut tx, ENTRY_GRANTS, &grants, &now).await?;
        upsert_entry(&mut tx, ENTRY_PLAN, &plan, &now).await?;
        tx.commit()
            .await
            .context("failed to commit session save transaction")?;

        self.write_mirror(&session.token)?;
        Ok(())
    }

    async fn save_token(&self, token: &CsrfToken) -> Result<(), VaultError> {
        let pool = self.get_pool().await?;
        let data =
            serde_json::to_string(token).context("failed to serialize renewed token")?;

        let result = sqlx::query(
            r#"
            UPDATE session_state
            SET data = ?2, saved_at = ?3
            WHERE entry = ?1
            "#,
        )
        .bind(ENTRY_TOKEN)
        .bind(&data)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to rotate persisted token")?;

        if result.rows_affected() == 0 {
            tracing::warn!("token rotation skipped, no session is persisted");
            return Ok(());
        }
        self.write_mirror(token)?;
        Ok(())
    }

    async fn load(&self) -> Result<VaultRead, VaultError> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(r#"SELECT entry, data FROM session_state"#)
            .fetch_all(&pool)
            .await
            .context("failed to read session entries")?;

        if rows.is_empty() {
            return Ok(VaultRead::Empty);
        }

        let mut entries = std::collections::BTreeMap::new();
        for row in rows {
            let entry: String = row.try_get("entry").context("missing entry column")?;
            let data: String = row.try_get("data").context("missing data column")?;
            entries.insert(entry, data);
        }

        if REQUIRED_ENTRIES.iter().any(|e| !entries.contains_key(*e)) {
            tracing::warn!("persisted session is missing entries, treating as corrupt");
            return Ok(VaultRead::Corrupt);
        }

        match parse_entries(&entries) {
            Ok(persisted) => Ok(VaultRead::Intact(persisted)),
            Err(e) => {
                tracing::warn!(error = %e, "persisted session failed to parse, treating as corrupt");
                Ok(VaultRead::Corrupt)
            }
        }
    }

    async fn clear(&self) -> Result<(), VaultError> {
        let pool = self.get_pool().await?;

        let mut tx = pool
            .begin()
            .await
            .context("failed to begin session clear transaction")?;
        sqlx::query(r#"DELETE FROM session_state"#)
            .execute(&mut *tx)
            .await
            .context("failed to clear session entries")?;
        tx.commit()
            .await
            .context("failed to commit session clear transaction")?;

        self.remove_mirror()?;
        Ok(())
    }

    async fn token_present(&self) -> Result<bool, VaultError> {
        let pool = self.get_pool().await?;
        let row = sqlx::query(r#"SELECT 1 FROM session_state WHERE entry = ?1"#)
            .bind(ENTRY_TOKEN)
            .fetch_optional(&pool)
            .await
            .context("failed to check token presence")?;
        Ok(row.is_some())
    }
}

fn parse_entries(
    entries: &std::collections::BTreeMap<String, String>,
) -> anyhow::Result<PersistedSession> {
    let token: CsrfToken = serde_json::from_str(&entries[ENTRY_TOKEN])
        .context("persisted token entry is malformed")?;
    let user: UserProfile = serde_json::from_str(&entries[ENTRY_USER])
        .context("persisted user entry is malformed")?;
    let grants: Grants = serde_json::from_str(&entries[ENTRY_GRANTS])
        .context("persisted grants entry is malformed")?;
    let plan: Option<Plan> = serde_json::from_str(&entries[ENTRY_PLAN])
        .context("persisted plan entry is malformed")?;

    Ok(PersistedSession {
        token,
        user,
        grants,
        plan,
    })
}

/// `{data_dir}/anvilhr/`, falling back to `~/.local/share/anvilhr/`.
fn default_vault_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut dir = base;
    dir.push("anvilhr");
    Ok(dir)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
