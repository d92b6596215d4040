//! Ledger collaborators
//!
//! The engine never talks to a node or a wallet directly. Everything goes
//! through [`LedgerClient`] and [`SignerHandle`], so the same orchestrators
//! run against a live RPC endpoint ([`RpcLedger`]) or the in-memory
//! [`PaperLedger`].

mod message;
mod paper;
mod rpc;
mod types;

pub use message::{
    compile_message, decompile, fee_payer, transaction_signature, AccountMeta, Instruction,
    Message, MessageError, Transaction, MAX_ACCOUNT_KEYS,
};
pub use paper::{
    rent_exempt_minimum, PaperLedger, PaperSigner, ScriptedFailure, LAMPORTS_PER_SIGNATURE,
};
pub use rpc::{RpcConfig, RpcLedger};
pub use types::{AccountData, Blockhash, LedgerError, Signature, SignatureStatus, SimulationOutcome};

use crate::address::Address;
use crate::config::Cluster;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::watch;

/// Read and write access to the ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account at `address`, `None` if it does not exist
    async fn get_account(&self, address: &Address) -> Result<Option<AccountData>, LedgerError>;

    /// Batched lookup, result order matches `addresses`
    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<AccountData>>, LedgerError>;

    /// Accounts owned by `program_id` whose data starts with `discriminator`
    async fn get_program_accounts(
        &self,
        program_id: &Address,
        discriminator: &[u8],
    ) -> Result<Vec<(Address, AccountData)>, LedgerError>;

    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize)
        -> Result<u64, LedgerError>;

    async fn latest_blockhash(&self) -> Result<Blockhash, LedgerError>;

    /// Dry run without signature verification
    async fn simulate(&self, transaction: &Transaction) -> Result<SimulationOutcome, LedgerError>;

    /// Send a signed transaction and wait for confirmation
    ///
    /// Returns [`LedgerError::Unconfirmed`] when the transaction may have
    /// landed but no verdict arrived in time.
    async fn submit_and_confirm(&self, transaction: &Transaction)
        -> Result<Signature, LedgerError>;

    /// Current status of a submitted transaction, `None` if unknown
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError>;
}

/// Identity that authorizes writes
#[async_trait]
pub trait SignerHandle: Send + Sync {
    fn identity(&self) -> Address;

    /// Sign serialized message bytes
    ///
    /// Fails with [`LedgerError::Rejected`] when the holder declines.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, LedgerError>;
}

/// Source of the currently selected cluster
pub trait NetworkSelector: Send + Sync {
    fn cluster(&self) -> Cluster;
}

impl NetworkSelector for Cluster {
    fn cluster(&self) -> Cluster {
        *self
    }
}

impl NetworkSelector for watch::Receiver<Cluster> {
    fn cluster(&self) -> Cluster {
        *self.borrow()
    }
}

/// Wall clock used for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Seconds since the epoch
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for paper runs and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: AtomicI64,
}

impl ManualClock {
    pub fn new(unix_timestamp: i64) -> Self {
        Self {
            seconds: AtomicI64::new(unix_timestamp),
        }
    }

    pub fn set(&self, unix_timestamp: i64) {
        self.seconds.store(unix_timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.seconds.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.seconds.load(Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn unix_timestamp(&self) -> i64 {
        self.seconds.load(Ordering::SeqCst)
    }
}
