use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BillrConfig;

/// The connected wallet, cached between runs.
///
/// Persisted to `~/.billr/session.json`. There is no schema versioning: the
/// whole document is replaced on connect and deleted on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSession {
    pub wallet_address: String,
    pub wallet_id: String,
    pub connected_at: DateTime<Utc>,
}

impl WalletSession {
    pub fn new(wallet_address: String, wallet_id: String) -> Self {
        Self {
            wallet_address,
            wallet_id,
            connected_at: Utc::now(),
        }
    }
}

/// File-backed holder for the single [`WalletSession`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store at the default `~/.billr/session.json`.
    pub fn open_default() -> Result<Self> {
        Ok(Self {
            path: BillrConfig::session_path()?,
        })
    }

    /// Store at an explicit path (for testing without `~/.billr/`).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the stored session.
    pub fn save(&self, session: &WalletSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to save session: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .context("failed to set session file permissions")?;
        }

        info!(path = %self.path.display(), wallet_id = %session.wallet_id, "wallet session saved");
        Ok(())
    }

    /// Load the stored session. A missing or corrupt file reads as `None`.
    pub fn load(&self) -> Result<Option<WalletSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session: {}", self.path.display()))?;
        Ok(serde_json::from_str(&content).ok())
    }

    /// Delete the session file if present.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session: {}", self.path.display()))?;
            info!(path = %self.path.display(), "wallet session cleared");
        }
        Ok(())
    }
}
