//! Engine facade
//!
//! Bundles the cached market reader with the write orchestrators over one
//! [`EngineContext`].

use crate::address::Address;
use crate::cache::QueryCache;
use crate::config::Cluster;
use crate::error::{classify, EngineError, ErrorContext};
use crate::ledger::LedgerClient;
use crate::market::{MarketReader, MarketRepository, MarketView, Position};
use crate::orchestrator::{
    BatchReport, BetOrchestrator, BetReceipt, CreateReceipt, EngineContext, MarketCreator,
    RedeemItem, RedeemReceipt, RedemptionEngine, SettleReceipt, SettlementController,
};
use crate::pool::Side;
use crate::telemetry::{self, LatencyMetric};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Connection health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub cluster: Cluster,
    pub healthy: bool,
    /// Blockhash round trip
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Time one blockhash round trip
pub async fn probe(ledger: &dyn LedgerClient, cluster: Cluster) -> HealthReport {
    let start = Instant::now();
    let result = ledger.latest_blockhash().await;
    let elapsed = start.elapsed();
    telemetry::record_latency(LatencyMetric::HealthProbe, elapsed);

    let latency_ms = elapsed.as_millis() as u64;
    match result {
        Ok(_) => HealthReport {
            cluster,
            healthy: true,
            latency_ms,
            error: None,
        },
        Err(e) => {
            tracing::warn!(%cluster, error = %e, "Health probe failed");
            HealthReport {
                cluster,
                healthy: false,
                latency_ms,
                error: Some(classify(&e, ErrorContext::Production).to_string()),
            }
        }
    }
}

pub struct Engine {
    ctx: Arc<EngineContext>,
    repository: MarketRepository,
    cache: Arc<QueryCache>,
    bets: BetOrchestrator,
    settlement: SettlementController,
    redemption: RedemptionEngine,
    creator: MarketCreator,
}

impl Engine {
    /// Wire every component over `ctx`, invalidating `cache` after writes
    pub fn new(ctx: EngineContext, cache: Arc<QueryCache>) -> Self {
        let ctx = Arc::new(ctx.with_invalidator(cache.clone()));
        let repository = ctx.reader().with_cache(cache.clone());
        Self {
            repository,
            cache,
            bets: BetOrchestrator::new(ctx.clone()),
            settlement: SettlementController::new(ctx.clone()),
            redemption: RedemptionEngine::new(ctx.clone()),
            creator: MarketCreator::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn reader(&self) -> &dyn MarketReader {
        &self.repository
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn fetch_one(&self, market: &Address) -> Result<Option<MarketView>, EngineError> {
        self.repository.fetch_one(market).await
    }

    pub async fn fetch_many(&self, markets: &[Address]) -> Result<Vec<MarketView>, EngineError> {
        self.repository.fetch_many(markets).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<MarketView>, EngineError> {
        self.repository.fetch_all().await
    }

    pub async fn fetch_position(
        &self,
        owner: &Address,
        market: &Address,
    ) -> Result<Option<Position>, EngineError> {
        self.repository.fetch_position(owner, market).await
    }

    pub async fn fetch_positions(&self, owner: &Address) -> Result<Vec<Position>, EngineError> {
        self.repository.fetch_positions(owner).await
    }

    pub async fn place_bet(
        &self,
        market: &Address,
        asset: &Address,
        amount: u64,
        side: Side,
    ) -> Result<Option<BetReceipt>, EngineError> {
        self.bets.place_bet(market, asset, amount, side).await
    }

    pub async fn settle_market(
        &self,
        market: &Address,
        outcome: bool,
    ) -> Result<Option<SettleReceipt>, EngineError> {
        self.settlement.settle_market(market, outcome).await
    }

    pub async fn redeem(
        &self,
        market: &Address,
        amount: u64,
    ) -> Result<Option<RedeemReceipt>, EngineError> {
        self.redemption.redeem(market, amount).await
    }

    pub async fn redeem_all(&self, items: &[RedeemItem]) -> Option<BatchReport> {
        self.redemption.redeem_all(items).await
    }

    pub async fn create_market(
        &self,
        title: &str,
        description: &str,
        asset: &Address,
        expiry_timestamp: i64,
    ) -> Result<Option<CreateReceipt>, EngineError> {
        self.creator
            .create_market(title, description, asset, expiry_timestamp)
            .await
    }

    pub async fn health(&self) -> HealthReport {
        probe(self.ctx.ledger.as_ref(), self.ctx.network.cluster()).await
    }
}
