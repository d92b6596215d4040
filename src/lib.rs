//! karmapi-engine: client-side engine for pari-mutuel YES/NO prediction markets
//!
//! This library provides the core components for:
//! - Bit-exact program-derived address derivation
//! - Integer pool accounting, implied odds and payouts
//! - Failure classification for ledger, signer and program errors
//! - Market and position reads with retry and a scoped query cache
//! - Bet, settlement, redemption and market creation orchestrators
//! - JSON-RPC and in-memory paper ledgers
//! - Full observability stack

pub mod address;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod market;
pub mod orchestrator;
pub mod pool;
pub mod program;
pub mod retry;
pub mod telemetry;

pub use engine::{Engine, HealthReport};
pub use error::EngineError;
