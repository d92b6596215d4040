//! Ledger-backed market reader

use super::{Market, MarketReader, MarketView, Position};
use crate::address::{derive_owner_asset_account, Address};
use crate::cache::{CacheKey, CachedValue, QueryCache};
use crate::error::{classify, EngineError, ErrorContext};
use crate::ledger::{AccountData, Clock, LedgerClient, LedgerError, NetworkSelector};
use crate::program::{TokenAccount, MARKET_ACCOUNT_DISCRIMINATOR};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Reads markets and positions, retrying transient failures
///
/// Not-found is a normal answer and never retried. With a [`QueryCache`]
/// attached, reads are served from it until stale.
#[derive(Clone)]
pub struct MarketRepository {
    ledger: Arc<dyn LedgerClient>,
    program_id: Address,
    clock: Arc<dyn Clock>,
    network: Arc<dyn NetworkSelector>,
    retry: RetryPolicy,
    error_context: ErrorContext,
    cache: Option<Arc<QueryCache>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl MarketRepository {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        program_id: Address,
        clock: Arc<dyn Clock>,
        network: Arc<dyn NetworkSelector>,
    ) -> Self {
        Self {
            ledger,
            program_id,
            clock,
            network,
            retry: RetryPolicy::default(),
            error_context: ErrorContext::default(),
            cache: None,
            cancel: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_error_context(mut self, context: ErrorContext) -> Self {
        self.error_context = context;
        self
    }

    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Same reader without the cache, for pre-flight checks that need
    /// current state
    pub fn uncached(&self) -> Self {
        Self {
            cache: None,
            ..self.clone()
        }
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// Run a ledger read under the retry policy
    async fn read<T, F, Fut>(&self, what: &'static str, op: F) -> Result<T, EngineError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let start = Instant::now();
        let context = self.error_context;
        let result = retry_with_backoff(
            &self.retry,
            self.cancel.as_ref(),
            EngineError::is_retryable,
            || {
                let call = op();
                async move { call.await.map_err(|e| classify(&e, context)) }
            },
        )
        .await;
        telemetry::record_latency(LatencyMetric::Read, start.elapsed());
        tracing::debug!(
            read = what,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ledger read"
        );
        result.map_err(EngineError::from)
    }

    /// Single-account read where a not-found failure means absent
    async fn read_account(
        &self,
        what: &'static str,
        address: &Address,
    ) -> Result<Option<AccountData>, EngineError> {
        match self.read(what, || self.ledger.get_account(address)).await {
            Err(EngineError::AccountNotFound) => {
                tracing::debug!(read = what, %address, "Account reported missing");
                Ok(None)
            }
            other => other,
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<CachedValue> {
        self.cache.as_ref()?.get(key)
    }

    fn store(&self, key: CacheKey, value: CachedValue) {
        if let Some(cache) = &self.cache {
            cache.insert(key, value);
        }
    }

    /// Decoded market record without read-time fields
    pub async fn fetch_market(&self, address: &Address) -> Result<Option<Market>, EngineError> {
        let key = CacheKey::Market {
            cluster: self.network.cluster(),
            market: *address,
        };
        if let Some(CachedValue::Market(market)) = self.cached(&key) {
            return Ok(market);
        }

        let account = self.read_account("market", address).await?;
        let market = account.and_then(|account| self.decode(address, &account));
        self.store(key, CachedValue::Market(market.clone()));
        Ok(market)
    }

    /// Whether any account lives at `address`
    pub async fn account_exists(&self, address: &Address) -> Result<bool, EngineError> {
        let account = self.read_account("account", address).await?;
        Ok(account.is_some())
    }

    /// Raw accounts at `addresses`, in order
    pub async fn accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<AccountData>>, EngineError> {
        self.read("accounts", || self.ledger.get_multiple_accounts(addresses))
            .await
    }

    /// Balance that keeps an account of `data_len` bytes alive
    pub async fn rent_exemption(&self, data_len: usize) -> Result<u64, EngineError> {
        self.read("rent", || {
            self.ledger.minimum_balance_for_rent_exemption(data_len)
        })
        .await
    }

    /// Native balance of `address` in base units
    pub async fn native_balance(&self, address: &Address) -> Result<u64, EngineError> {
        self.read("balance", || self.ledger.get_balance(address))
            .await
    }

    async fn fetch_all_markets(&self) -> Result<Vec<Market>, EngineError> {
        let key = CacheKey::Markets {
            cluster: self.network.cluster(),
        };
        if let Some(CachedValue::Markets(markets)) = self.cached(&key) {
            return Ok(markets);
        }

        let accounts = self
            .read("program_accounts", || {
                self.ledger
                    .get_program_accounts(&self.program_id, &MARKET_ACCOUNT_DISCRIMINATOR)
            })
            .await?;
        let mut markets: Vec<Market> = accounts
            .iter()
            .filter_map(|(address, account)| self.decode(address, account))
            .collect();
        markets.sort_by(|a, b| {
            b.total_volume()
                .cmp(&a.total_volume())
                .then_with(|| a.address.cmp(&b.address))
        });
        self.store(key, CachedValue::Markets(markets.clone()));
        Ok(markets)
    }

    /// Decode a market, logging and counting failures instead of raising
    fn decode(&self, address: &Address, account: &AccountData) -> Option<Market> {
        if account.owner != self.program_id {
            tracing::warn!(%address, owner = %account.owner, "Account not owned by market program");
            telemetry::increment(CounterMetric::DecodeSkips, "owner");
            return None;
        }
        match Market::decode(*address, &account.data) {
            Ok(market) => Some(market),
            Err(e) => {
                tracing::warn!(%address, error = %e, "Skipping undecodable market");
                telemetry::increment(CounterMetric::DecodeSkips, "decode");
                None
            }
        }
    }

    fn view(&self, market: Market) -> MarketView {
        MarketView::at(market, self.clock.unix_timestamp())
    }
}

/// Token amount held by an account, `None` when absent or not a token account
fn token_amount(account: Option<&AccountData>) -> Option<u64> {
    let account = account?;
    TokenAccount::unpack(&account.data).ok().map(|t| t.amount)
}

#[async_trait]
impl MarketReader for MarketRepository {
    async fn fetch_one(&self, address: &Address) -> Result<Option<MarketView>, EngineError> {
        Ok(self.fetch_market(address).await?.map(|m| self.view(m)))
    }

    async fn fetch_many(&self, addresses: &[Address]) -> Result<Vec<MarketView>, EngineError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let accounts = self
            .read("markets", || self.ledger.get_multiple_accounts(addresses))
            .await?;
        let cluster = self.network.cluster();

        let mut views = Vec::with_capacity(addresses.len());
        for (address, account) in addresses.iter().zip(accounts) {
            let market = account.and_then(|account| self.decode(address, &account));
            self.store(
                CacheKey::Market {
                    cluster,
                    market: *address,
                },
                CachedValue::Market(market.clone()),
            );
            if let Some(market) = market {
                views.push(self.view(market));
            }
        }
        Ok(views)
    }

    async fn fetch_all(&self) -> Result<Vec<MarketView>, EngineError> {
        let markets = self.fetch_all_markets().await?;
        Ok(markets.into_iter().map(|m| self.view(m)).collect())
    }

    async fn fetch_position(
        &self,
        owner: &Address,
        market: &Address,
    ) -> Result<Option<Position>, EngineError> {
        let key = CacheKey::Position {
            cluster: self.network.cluster(),
            owner: *owner,
            market: *market,
        };
        if let Some(CachedValue::Position(position)) = self.cached(&key) {
            return Ok(Some(position));
        }

        let Some(record) = self.fetch_market(market).await? else {
            return Ok(None);
        };
        let holdings = [
            derive_owner_asset_account(owner, &record.yes_mint),
            derive_owner_asset_account(owner, &record.no_mint),
        ];
        let accounts = self
            .read("position", || self.ledger.get_multiple_accounts(&holdings))
            .await?;

        let position = Position::new(
            *owner,
            &record,
            token_amount(accounts.first().and_then(Option::as_ref)),
            token_amount(accounts.get(1).and_then(Option::as_ref)),
        );
        self.store(key, CachedValue::Position(position.clone()));
        Ok(Some(position))
    }

    async fn fetch_positions(&self, owner: &Address) -> Result<Vec<Position>, EngineError> {
        let key = CacheKey::Positions {
            cluster: self.network.cluster(),
            owner: *owner,
        };
        if let Some(CachedValue::Positions(positions)) = self.cached(&key) {
            return Ok(positions);
        }

        let markets = self.fetch_all_markets().await?;
        let holdings: Vec<Address> = markets
            .iter()
            .flat_map(|m| {
                [
                    derive_owner_asset_account(owner, &m.yes_mint),
                    derive_owner_asset_account(owner, &m.no_mint),
                ]
            })
            .collect();
        let accounts = if holdings.is_empty() {
            Vec::new()
        } else {
            self.read("positions", || self.ledger.get_multiple_accounts(&holdings))
                .await?
        };

        let positions: Vec<Position> = markets
            .iter()
            .enumerate()
            .map(|(i, market)| {
                Position::new(
                    *owner,
                    market,
                    token_amount(accounts.get(2 * i).and_then(Option::as_ref)),
                    token_amount(accounts.get(2 * i + 1).and_then(Option::as_ref)),
                )
            })
            .zip(&markets)
            .filter(|(position, market)| {
                !position.is_empty() || (market.status.winning_side().is_some() && position.has_account)
            })
            .map(|(position, _)| position)
            .collect();

        self.store(key, CachedValue::Positions(positions.clone()));
        Ok(positions)
    }

    async fn token_balance(&self, account: &Address) -> Result<Option<u64>, EngineError> {
        let key = CacheKey::Balance {
            cluster: self.network.cluster(),
            account: *account,
        };
        if let Some(CachedValue::Balance(balance)) = self.cached(&key) {
            return Ok(balance);
        }

        let data = self.read_account("token_balance", account).await?;
        let balance = token_amount(data.as_ref());
        self.store(key, CachedValue::Balance(balance));
        Ok(balance)
    }
}
