//! Configuration for the `toad` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/toad/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error. The assistant API key is
//! only ever read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use toad_proto::contract::{CLOCK_OBJECT_ID, Contract, DEFAULT_MODULE};
use toad_proto::object::{Address, ObjectId};

use crate::assistant;
use crate::sync::SyncSettings;

/// Default JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A configured URL is not valid.
    #[error("invalid {field} url: {source}")]
    InvalidUrl {
        /// Setting that held the URL.
        field: &'static str,
        /// Parse failure.
        source: url::ParseError,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    chain: ChainFileConfig,
    sync: SyncFileConfig,
    assistant: AssistantFileConfig,
    identity: IdentityFileConfig,
}

/// `[chain]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChainFileConfig {
    rpc_url: Option<String>,
    package_id: Option<String>,
    registry_id: Option<String>,
    clock_id: Option<String>,
    module: Option<String>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    rpc_timeout_secs: Option<u64>,
    settle_timeout_ms: Option<u64>,
    settle_poll_ms: Option<u64>,
    finality_timeout_secs: Option<u64>,
}

/// `[assistant]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AssistantFileConfig {
    model: Option<String>,
    endpoint: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[identity]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct IdentityFileConfig {
    address: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Chain --
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Board contract location.
    pub contract: Contract,

    // -- Sync --
    /// Per-call timeout and settle timing.
    pub sync: SyncSettings,
    /// How long to wait for a transaction to become final.
    pub finality_timeout: Duration,

    // -- Assistant --
    /// Model name.
    pub assistant_model: String,
    /// API base URL.
    pub assistant_endpoint: String,
    /// Timeout of one assistant request.
    pub assistant_timeout: Duration,

    // -- Identity --
    /// Wallet address to act as, if any.
    pub address: Option<Address>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract: Contract::default(),
            sync: SyncSettings::default(),
            finality_timeout: Duration::from_secs(60),
            assistant_model: assistant::DEFAULT_MODEL.to_string(),
            assistant_endpoint: assistant::DEFAULT_ENDPOINT.to_string(),
            assistant_timeout: Duration::from_secs(60),
            address: None,
        }
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path (`~/.config/toad/config.toml`) is
    /// tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if a configured URL is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.rpc_endpoint()?;
        config.assistant_base()?;
        Ok(config)
    }

    /// The JSON-RPC endpoint as a URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `rpc_url` does not parse.
    pub fn rpc_endpoint(&self) -> Result<Url, ConfigError> {
        parse_url("rpc", &self.rpc_url)
    }

    /// The assistant API base as a URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `assistant_endpoint` does not parse.
    pub fn assistant_base(&self) -> Result<Url, ConfigError> {
        parse_url("assistant endpoint", &self.assistant_endpoint)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        let contract = Contract {
            package_id: cli
                .package_id
                .clone()
                .or_else(|| file.chain.package_id.clone())
                .map_or(defaults.contract.package_id, ObjectId::new),
            module: file
                .chain
                .module
                .clone()
                .unwrap_or_else(|| DEFAULT_MODULE.to_string()),
            clock_id: ObjectId::new(file.chain.clock_id.as_deref().unwrap_or(CLOCK_OBJECT_ID)),
            registry_id: cli
                .registry_id
                .clone()
                .or_else(|| file.chain.registry_id.clone())
                .map_or(defaults.contract.registry_id, ObjectId::new),
        };

        Self {
            rpc_url: cli
                .rpc_url
                .clone()
                .or_else(|| file.chain.rpc_url.clone())
                .unwrap_or(defaults.rpc_url),
            contract,
            sync: SyncSettings {
                rpc_timeout: file
                    .sync
                    .rpc_timeout_secs
                    .map_or(defaults.sync.rpc_timeout, Duration::from_secs),
                settle_timeout: file
                    .sync
                    .settle_timeout_ms
                    .map_or(defaults.sync.settle_timeout, Duration::from_millis),
                settle_poll: file
                    .sync
                    .settle_poll_ms
                    .map_or(defaults.sync.settle_poll, Duration::from_millis),
            },
            finality_timeout: file
                .sync
                .finality_timeout_secs
                .map_or(defaults.finality_timeout, Duration::from_secs),
            assistant_model: cli
                .model
                .clone()
                .or_else(|| file.assistant.model.clone())
                .unwrap_or(defaults.assistant_model),
            assistant_endpoint: file
                .assistant
                .endpoint
                .clone()
                .unwrap_or(defaults.assistant_endpoint),
            assistant_timeout: file
                .assistant
                .request_timeout_secs
                .map_or(defaults.assistant_timeout, Duration::from_secs),
            address: cli
                .address
                .clone()
                .or_else(|| file.identity.address.clone())
                .filter(|a| !a.is_empty())
                .map(Address::new),
        }
    }
}

/// Global CLI arguments shared by every subcommand.
#[derive(clap::Args, Debug, Default)]
pub struct CliArgs {
    /// JSON-RPC endpoint of the chain.
    #[arg(long, global = true, env = "TOAD_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Package id of the board contract.
    #[arg(long, global = true, env = "TOAD_PACKAGE_ID")]
    pub package_id: Option<String>,

    /// Shared board registry object id.
    #[arg(long, global = true, env = "TOAD_REGISTRY_ID")]
    pub registry_id: Option<String>,

    /// Wallet address to act as.
    #[arg(long, global = true, env = "TOAD_ADDRESS")]
    pub address: Option<String>,

    /// Assistant model name.
    #[arg(long, global = true, env = "TOAD_MODEL")]
    pub model: Option<String>,

    /// Path to config file (default: `~/.config/toad/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn", env = "TOAD_LOG")]
    pub log_level: String,

    /// Path to log file (default: stderr).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("toad").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
