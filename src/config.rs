//! Configuration types for karmapi-engine

use crate::address::{Address, DEFAULT_PROGRAM_ID};
use crate::error::ErrorContext;
use crate::telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Ledger network a deployment lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[serde(alias = "local")]
    Localnet,
    #[default]
    Devnet,
    Testnet,
    #[serde(alias = "mainnet")]
    MainnetBeta,
}

impl Cluster {
    pub const ALL: [Cluster; 4] = [
        Self::Localnet,
        Self::Devnet,
        Self::Testnet,
        Self::MainnetBeta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Localnet => "localnet",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::MainnetBeta => "mainnet-beta",
        }
    }

    /// Public RPC endpoint used when none is configured
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Localnet => "http://127.0.0.1:8899",
            Self::Devnet => "https://api.devnet.solana.com",
            Self::Testnet => "https://api.testnet.solana.com",
            Self::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }

    /// Guess the cluster an RPC URL points at
    ///
    /// Loopback hosts are localnet; otherwise the URL is searched for
    /// `devnet`, `testnet` or `mainnet`.
    pub fn infer_from_rpc_url(url: &str) -> Option<Cluster> {
        let lower = url.trim().to_ascii_lowercase();
        let host = lower
            .split_once("://")
            .map_or(lower.as_str(), |(_, rest)| rest)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let host = host.rsplit('@').next().unwrap_or(host);
        let host = host.split(':').next().unwrap_or(host);
        if matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0") {
            return Some(Self::Localnet);
        }

        if lower.contains("devnet") {
            Some(Self::Devnet)
        } else if lower.contains("testnet") {
            Some(Self::Testnet)
        } else if lower.contains("mainnet") {
            Some(Self::MainnetBeta)
        } else {
            None
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cluster {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "localnet" | "local" => Ok(Self::Localnet),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Self::MainnetBeta),
            other => anyhow::bail!("Unknown cluster: {other}"),
        }
    }
}

/// Network and program configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Explicit cluster, inferred from `rpc_url` when absent
    #[serde(default)]
    pub cluster: Option<Cluster>,

    /// RPC endpoint, the cluster's public endpoint when absent
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Market program address
    #[serde(default = "default_program_id")]
    pub program_id: Address,

    /// Commitment level for reads and confirmation
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_program_id() -> Address {
    DEFAULT_PROGRAM_ID
}
fn default_commitment() -> String {
    "confirmed".to_string()
}

impl NetworkConfig {
    /// Explicit cluster, else inferred from the RPC URL, else devnet
    pub fn cluster(&self) -> Cluster {
        self.cluster
            .or_else(|| {
                self.rpc_url
                    .as_deref()
                    .and_then(Cluster::infer_from_rpc_url)
            })
            .unwrap_or_default()
    }

    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.cluster().default_endpoint().to_string())
    }
}

/// Execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Flat fee reserved for each submission in native pre-flight checks
    #[serde(default = "default_submission_fee")]
    pub submission_fee_lamports: u64,

    /// Diagnostic detail surfaced in errors
    #[serde(default)]
    pub error_context: ErrorContext,
}

fn default_submission_fee() -> u64 {
    5_000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            submission_fee_lamports: default_submission_fee(),
            error_context: ErrorContext::default(),
        }
    }
}

/// Execution mode: in-memory paper ledger or live RPC
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Backoff for transient read failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// First delay (milliseconds)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Delay ceiling (milliseconds), clamped to 15 s
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Attempts before giving up, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Polls of the expected account after an ambiguous confirmation
    #[serde(default = "default_confirmation_attempts")]
    pub confirmation_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    15_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_confirmation_attempts() -> u32 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            confirmation_attempts: default_confirmation_attempts(),
        }
    }
}

/// Read cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Seconds before a cached read is refetched
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,
}

fn default_stale_time_secs() -> u64 {
    10
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: default_stale_time_secs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus listener port, disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
