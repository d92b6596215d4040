//! CLI interface for karmapi-engine
//!
//! Read-only subcommands:
//! - `markets`: List markets, largest volume first
//! - `market`: Show one market
//! - `position`: Show an owner's positions
//! - `derive`: Compute market, sub-account and owner addresses
//! - `quote`: Estimate the return of a bet
//! - `status`: Probe the configured endpoint
//! - `config`: Show configuration

mod derive;
mod query;

pub use derive::DeriveArgs;
pub use query::{MarketArgs, MarketsArgs, PositionArgs, QuoteArgs};

use crate::config::{Config, ExecutionMode};
use crate::ledger::{LedgerClient, PaperLedger, RpcConfig, RpcLedger, SystemClock};
use crate::market::MarketRepository;
use crate::retry::RetryPolicy;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "karmapi")]
#[command(about = "Pari-mutuel YES/NO prediction market engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List markets
    Markets(MarketsArgs),
    /// Show one market
    Market(MarketArgs),
    /// Show positions of an owner
    Position(PositionArgs),
    /// Compute derived addresses
    Derive(DeriveArgs),
    /// Estimate the return of a bet
    Quote(QuoteArgs),
    /// Probe the ledger endpoint
    Status,
    /// Show configuration
    Config,
}

/// Ledger and reader built from configuration
pub struct Session {
    pub config: Config,
    pub ledger: Arc<dyn LedgerClient>,
    pub repository: MarketRepository,
    pub json: bool,
}

impl Session {
    pub fn new(config: Config, json: bool) -> anyhow::Result<Self> {
        let program_id = config.network.program_id;
        let clock = Arc::new(SystemClock);
        let ledger: Arc<dyn LedgerClient> = match config.execution.mode {
            ExecutionMode::Paper => Arc::new(PaperLedger::new(program_id, clock.clone())),
            ExecutionMode::Live => {
                let mut rpc = RpcConfig::new(config.network.rpc_url());
                rpc.commitment = config.network.commitment.clone();
                rpc.confirmation_attempts = config.retry.confirmation_attempts;
                Arc::new(RpcLedger::with_config(rpc)?)
            }
        };
        let repository = MarketRepository::new(
            ledger.clone(),
            program_id,
            clock,
            Arc::new(config.network.cluster()),
        )
        .with_retry(RetryPolicy::from_config(&config.retry))
        .with_error_context(config.execution.error_context);

        Ok(Self {
            config,
            ledger,
            repository,
            json,
        })
    }

    /// Print `value` as JSON when requested, else run `text`
    pub fn emit<T: serde::Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}
