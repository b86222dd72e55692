//! Runtime configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, the environment (`ETHERSCAN_API`), and command-line flags.

use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the oracle API key.
pub const API_KEY_ENV: &str = "ETHERSCAN_API";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory contracts and their imports are read from.
    pub contracts_root: PathBuf,
    /// solc binary used for compilation.
    pub solc: PathBuf,
    /// Oracle API key.
    pub api_key: Option<String>,
    /// Chain the gas oracle is queried for.
    pub chain_id: u64,
    pub simulator: SimulatorKind,
    pub fiat_source: FiatSource,
    pub endpoints: Endpoints,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contracts_root: PathBuf::from("contracts"),
            solc: PathBuf::from("solc"),
            api_key: None,
            chain_id: 1,
            simulator: SimulatorKind::default(),
            fiat_source: FiatSource::default(),
            endpoints: Endpoints::default(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// JSON-RPC node used for simulation and fee data.
    pub rpc_url: Option<String>,
    /// Etherscan-compatible API base.
    pub etherscan_url: String,
    /// CoinGecko API base.
    pub coingecko_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rpc_url: Some("https://cloudflare-eth.com".to_string()),
            etherscan_url: "https://api.etherscan.io/v2/api".to_string(),
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
        }
    }
}

/// Backend used for the simulation tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorKind {
    /// `eth_estimateGas` against `endpoints.rpc_url`.
    #[default]
    Rpc,
    /// In-process revm deployment.
    Local,
    /// Always use the size heuristic.
    #[serde(rename = "none")]
    #[value(name = "none")]
    Disabled,
}

/// Where the asset/fiat rate comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FiatSource {
    #[default]
    Etherscan,
    Coingecko,
}

impl Config {
    /// Load `path` if given, then fill the API key from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty());
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read config {}", path.display()))?;
        toml::from_str(&contents)
            .wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.contracts_root, PathBuf::from("contracts"));
        assert_eq!(config.simulator, SimulatorKind::Rpc);
        assert_eq!(config.fiat_source, FiatSource::Etherscan);
        assert_eq!(config.chain_id, 1);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploycost.toml");
        fs::write(
            &path,
            r#"
contracts_root = "src/contracts"
simulator = "local"
fiat_source = "coingecko"
api_key = "KEY"

[endpoints]
rpc_url = "http://localhost:8545"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.contracts_root, PathBuf::from("src/contracts"));
        assert_eq!(config.simulator, SimulatorKind::Local);
        assert_eq!(config.fiat_source, FiatSource::Coingecko);
        assert_eq!(config.api_key.as_deref(), Some("KEY"));
        assert_eq!(config.endpoints.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.endpoints.etherscan_url, "https://api.etherscan.io/v2/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "contract_root = \"typo\"\n").unwrap();

        assert!(Config::from_file(&path).is_err());
    }
}
