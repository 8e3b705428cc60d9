use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Ledger networks the client knows default endpoints for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Futurenet,
}

impl Network {
    /// Human-readable label for the network.
    pub fn label(&self) -> &'static str {
        match self {
            Network::Testnet => "Stellar Testnet",
            Network::Futurenet => "Stellar Futurenet",
        }
    }

    /// Passphrase the wallet signs against and transaction hashes commit to.
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Testnet => "Test SDF Network ; September 2015",
            Network::Futurenet => "Test SDF Future Network ; October 2022",
        }
    }

    /// Public RPC endpoint used when no custom URL is configured.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://soroban-testnet.stellar.org",
            Network::Futurenet => "https://rpc-futurenet.stellar.org",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Deployed invoicing contract on testnet.
pub const DEFAULT_CONTRACT_ID: &str = "CCAV5ZYL3LI6MB254CHHVB6B5JBLJ6RUBMYZT5RCBVS46MHS3L4CLIWD";

/// USDC token contract on testnet.
pub const DEFAULT_USDC_TOKEN_ID: &str = "CBIELTK6YBZJU5UP2WWQEUCYKLPU6AUNZ2BQ4WWFEIE3USCIHMXQDAMA";

/// Simulation source for reads when the caller has no connected account.
pub const DEFAULT_READ_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

/// Application configuration stored at `~/.billr/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BillrConfig {
    // Network
    pub network: Network,
    pub custom_rpc_url: Option<String>,
    pub http_timeout_secs: u64,

    // Contracts
    pub contract_id: String,
    pub usdc_token_id: String,
    pub read_account: String,

    // Transactions
    pub write_fee: u32,
    pub read_fee: u32,
    pub tx_timeout_secs: u64,

    // Submission retry
    pub submit_max_retries: u32,
    pub submit_base_delay_ms: u64,

    // General
    pub log_level: String,
}

impl Default for BillrConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            custom_rpc_url: None,
            http_timeout_secs: 30,
            contract_id: DEFAULT_CONTRACT_ID.into(),
            usdc_token_id: DEFAULT_USDC_TOKEN_ID.into(),
            read_account: DEFAULT_READ_ACCOUNT.into(),
            write_fee: 1_000_000,
            read_fee: 100_000,
            tx_timeout_secs: 180,
            submit_max_retries: 3,
            submit_base_delay_ms: 1_000,
            log_level: "info".into(),
        }
    }
}

impl BillrConfig {
    /// Returns the base config directory: `~/.billr/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".billr"))
    }

    /// Returns the config file path: `~/.billr/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.billr/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Returns the wallet session path: `~/.billr/session.json`
    pub fn session_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("session.json"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        for dir in [Self::base_dir()?, Self::logs_dir()?] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk, or creates default if missing.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific file path, writing defaults if absent.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Saves config to `~/.billr/config.json`.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to_path(&path)
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// The RPC endpoint in effect: the custom override if set, else the
    /// network default.
    pub fn rpc_url(&self) -> &str {
        self.custom_rpc_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_rpc_url())
    }

    pub fn network_passphrase(&self) -> &'static str {
        self.network.passphrase()
    }

    /// Override the RPC endpoint.
    ///
    /// Returns `Err` if the URL fails validation.
    pub fn set_custom_rpc(&mut self, url: String) -> Result<()> {
        if !validate_url(&url) {
            anyhow::bail!("invalid RPC URL: {url}");
        }
        self.custom_rpc_url = Some(url);
        Ok(())
    }

    /// Drop the custom endpoint and go back to the network default.
    pub fn reset_rpc_to_default(&mut self) {
        self.custom_rpc_url = None;
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}
