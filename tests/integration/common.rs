//! Shared harness: one paper ledger, a manual clock and per-user engines

use karmapi_engine::address::{Address, DEFAULT_PROGRAM_ID, NATIVE_MINT};
use karmapi_engine::cache::QueryCache;
use karmapi_engine::config::Cluster;
use karmapi_engine::ledger::{Clock, ManualClock, PaperLedger, PaperSigner};
use karmapi_engine::orchestrator::{EngineContext, EngineSettings};
use karmapi_engine::retry::RetryPolicy;
use karmapi_engine::Engine;
use std::sync::Arc;
use std::time::Duration;

pub const NOW: i64 = 1_700_000_000;
pub const SOL: u64 = 1_000_000_000;

pub fn identity(byte: u8) -> Address {
    Address::new([byte; 32])
}

/// Fast retries and a short confirmation budget
pub fn settings() -> EngineSettings {
    let mut settings = EngineSettings::new(DEFAULT_PROGRAM_ID);
    settings.retry = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(4), 3);
    settings.confirmation_attempts = 3;
    settings.confirmation_interval = Duration::from_millis(20);
    settings
}

pub struct User {
    pub address: Address,
    pub signer: Arc<PaperSigner>,
    pub engine: Engine,
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub ledger: PaperLedger,
    /// Creates and settles markets
    pub creator: User,
}

impl Harness {
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::new(NOW));
        let ledger = PaperLedger::new(DEFAULT_PROGRAM_ID, clock.clone());
        ledger.airdrop(&identity(1), 10 * SOL).await;
        let creator = build_user(&ledger, &clock, identity(1));
        Self {
            clock,
            ledger,
            creator,
        }
    }

    /// Funded participant on the same ledger
    pub async fn user(&self, byte: u8, lamports: u64) -> User {
        self.ledger.airdrop(&identity(byte), lamports).await;
        build_user(&self.ledger, &self.clock, identity(byte))
    }

    /// Context for `user` that is not wrapped in an engine
    pub fn context(&self, user: &User) -> EngineContext {
        EngineContext::new(
            Arc::new(self.ledger.clone()),
            user.signer.clone(),
            Arc::new(Cluster::Localnet),
            self.clock.clone(),
            settings(),
        )
    }

    /// Native-asset market expiring `ttl` seconds from now
    pub async fn market(&self, ttl: i64) -> Address {
        self.market_with(&NATIVE_MINT, ttl).await
    }

    pub async fn market_with(&self, asset: &Address, ttl: i64) -> Address {
        self.creator
            .engine
            .create_market(
                "Will it rain in Lisbon?",
                "Resolves YES on measurable rain",
                asset,
                self.clock.unix_timestamp() + ttl,
            )
            .await
            .unwrap()
            .unwrap()
            .market
    }
}

fn build_user(ledger: &PaperLedger, clock: &Arc<ManualClock>, address: Address) -> User {
    let signer = Arc::new(PaperSigner::new(address));
    let ctx = EngineContext::new(
        Arc::new(ledger.clone()),
        signer.clone(),
        Arc::new(Cluster::Localnet),
        clock.clone(),
        settings(),
    );
    User {
        address,
        signer,
        engine: Engine::new(ctx, Arc::new(QueryCache::new(Duration::from_secs(60)))),
    }
}
