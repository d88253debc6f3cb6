//! Wallet configuration.
//!
//! Defaults are overlaid by an optional config file (any format the `config`
//! crate recognises by extension; the legacy `cli-config.json` with its `Host`
//! key is accepted) and then by `ELA_WALLET_*` environment variables, e.g.
//! `ELA_WALLET_RPC_HOST=10.0.0.5:20336`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ela_core::constants::{COINBASE_MATURITY, DEFAULT_RPC_HOST};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::keystore::KEYSTORE_FILENAME;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ELA_WALLET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Node RPC `host:port`, without scheme.
    #[serde(alias = "Host", alias = "host")]
    pub rpc_host: String,
    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
    /// Root directory for wallet files.
    pub data_dir: PathBuf,
    /// Keystore file name, relative to `data_dir` unless absolute.
    pub keystore_file: PathBuf,
    /// Blocks a coinbase output stays locked.
    pub coinbase_maturity: u32,
    /// Log level filter string (e.g. "info", "ela_wallet=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ela-wallet");

        Self {
            rpc_host: DEFAULT_RPC_HOST.to_string(),
            rpc_timeout_secs: 30,
            data_dir,
            keystore_file: PathBuf::from(KEYSTORE_FILENAME),
            coinbase_maturity: COINBASE_MATURITY,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl WalletConfig {
    /// Load defaults, then `path` if it exists, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, WalletError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| WalletError::Config(e.to_string()))?;

        let cfg: WalletConfig = settings
            .try_deserialize()
            .map_err(|e| WalletError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), WalletError> {
        if self.rpc_host.is_empty() {
            return Err(WalletError::Config("rpc_host must not be empty".into()));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(WalletError::Config(format!(
                "log_format must be \"text\" or \"json\", got {:?}",
                self.log_format
            )));
        }
        Ok(())
    }

    /// Full RPC endpoint URL.
    pub fn rpc_url(&self) -> String {
        if self.rpc_host.contains("://") {
            self.rpc_host.clone()
        } else {
            format!("http://{}", self.rpc_host)
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.data_dir.join(&self.keystore_file)
    }
}
