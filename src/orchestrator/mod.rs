//! Write orchestrators
//!
//! Each orchestrator runs one submission at a time:
//! 1. Local pre-flight checks, no network
//! 2. Fresh reads of market and sub-account state
//! 3. Build the instruction batch, provisioning only what is missing
//! 4. Simulate, sign, submit and confirm through [`submit`]
//! 5. Invalidate the cache keys the write made stale

mod bet;
mod create;
mod redeem;
mod settle;
mod submit;

pub use bet::{BetOrchestrator, BetReceipt};
pub use create::{CreateReceipt, MarketCreator, MAX_COLLISION_RETRIES};
pub use redeem::{BatchFailure, BatchReport, RedeemItem, RedeemReceipt, RedemptionEngine};
pub use settle::{SettleReceipt, SettlementController};
pub use submit::{submit, Expectation};

use crate::address::Address;
use crate::cache::{CacheInvalidator, InvalidationScope, NoCache};
use crate::config::Config;
use crate::error::{EngineError, ErrorContext};
use crate::ledger::{Clock, LedgerClient, NetworkSelector, SignerHandle};
use crate::market::{Market, MarketRepository};
use crate::retry::RetryPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Tunables shared by every orchestrator
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub program_id: Address,
    /// Flat fee budgeted per submission, in native base units
    pub submission_fee: u64,
    pub error_context: ErrorContext,
    pub retry: RetryPolicy,
    /// Polls of an ambiguous submission before giving up
    pub confirmation_attempts: u32,
    pub confirmation_interval: Duration,
}

impl EngineSettings {
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            submission_fee: crate::ledger::LAMPORTS_PER_SIGNATURE,
            error_context: ErrorContext::default(),
            retry: RetryPolicy::default(),
            confirmation_attempts: 10,
            confirmation_interval: Duration::from_millis(500),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            program_id: config.network.program_id,
            submission_fee: config.execution.submission_fee_lamports,
            error_context: config.execution.error_context,
            retry: RetryPolicy::from_config(&config.retry),
            confirmation_attempts: config.retry.confirmation_attempts,
            confirmation_interval: Duration::from_millis(config.retry.initial_delay_ms),
        }
    }
}

/// Collaborators handed to every orchestrator
#[derive(Clone)]
pub struct EngineContext {
    pub ledger: Arc<dyn LedgerClient>,
    pub signer: Arc<dyn SignerHandle>,
    pub network: Arc<dyn NetworkSelector>,
    pub clock: Arc<dyn Clock>,
    pub invalidator: Arc<dyn CacheInvalidator>,
    pub settings: EngineSettings,
    /// Flips to `true` to abandon retries and confirmation polling
    pub cancel: Option<watch::Receiver<bool>>,
}

impl EngineContext {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn SignerHandle>,
        network: Arc<dyn NetworkSelector>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            ledger,
            signer,
            network,
            clock,
            invalidator: Arc::new(NoCache),
            settings,
            cancel: None,
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Identity signing every write
    pub fn identity(&self) -> Address {
        self.signer.identity()
    }

    /// Uncached reader for pre-flight checks
    pub fn reader(&self) -> MarketRepository {
        let repo = MarketRepository::new(
            self.ledger.clone(),
            self.settings.program_id,
            self.clock.clone(),
            self.network.clone(),
        )
        .with_retry(self.settings.retry)
        .with_error_context(self.settings.error_context);
        match &self.cancel {
            Some(cancel) => repo.with_cancel(cancel.clone()),
            None => repo,
        }
    }

    /// Load a market that must exist
    async fn load_market(&self, address: &Address) -> Result<Market, EngineError> {
        self.reader()
            .fetch_market(address)
            .await?
            .ok_or(EngineError::AccountNotFound)
    }

    fn invalidate(&self, scope: &InvalidationScope) {
        let keys = scope.keys(self.network.cluster());
        self.invalidator.invalidate(&keys);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// One submission at a time per orchestrator
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    /// Claim the slot, `None` while another submission holds it
    pub fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the in-flight slot on drop
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
