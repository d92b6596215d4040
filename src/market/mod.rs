//! Market reads
//!
//! Decodes market records and owner positions from ledger state. Everything
//! derived from time or pool sizes is computed at read time and never
//! stored.

mod decode;
mod repository;

pub use repository::MarketRepository;

use crate::address::Address;
use crate::error::EngineError;
use crate::pool::{Pools, Side};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Lifecycle of a market, terminal once settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Settled { outcome: bool },
}

impl MarketStatus {
    /// Side whose holders are paid, once settled
    pub fn winning_side(&self) -> Option<Side> {
        match self {
            Self::Open => None,
            Self::Settled { outcome } => Some(Side::from_outcome(*outcome)),
        }
    }
}

/// A decoded market record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    pub address: Address,
    pub creator: Address,
    pub title: String,
    pub description: String,
    /// Asset wagered and paid out
    pub bet_asset: Address,
    /// Escrow holding every deposit
    pub vault: Address,
    pub yes_mint: Address,
    pub no_mint: Address,
    /// Total ever wagered on YES, never decreases
    pub yes_pool: u64,
    /// Total ever wagered on NO, never decreases
    pub no_pool: u64,
    pub expiry_timestamp: i64,
    pub status: MarketStatus,
    pub bump: u8,
}

impl Market {
    pub fn pools(&self) -> Pools {
        Pools::new(self.yes_pool, self.no_pool)
    }

    pub fn total_volume(&self) -> u128 {
        self.pools().total()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expiry_timestamp
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expiry_timestamp, 0).single()
    }
}

/// Market with read-time derived fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    pub total_volume: u128,
    pub yes_probability: Decimal,
    pub no_probability: Decimal,
    pub is_expired: bool,
    pub is_resolved: bool,
    /// Seconds until expiry, zero once expired
    pub time_remaining: i64,
}

impl MarketView {
    pub fn at(market: Market, now: i64) -> Self {
        let pools = market.pools();
        Self {
            total_volume: pools.total(),
            yes_probability: pools.implied_probability(Side::Yes),
            no_probability: pools.implied_probability(Side::No),
            is_expired: market.is_expired_at(now),
            is_resolved: matches!(market.status, MarketStatus::Settled { .. }),
            time_remaining: market.expiry_timestamp.saturating_sub(now).max(0),
            market,
        }
    }
}

/// An owner's share-token holdings in one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub owner: Address,
    pub market: Address,
    pub yes_balance: u64,
    pub no_balance: u64,
    /// Payout if YES wins and the pools stay as they are
    pub estimated_yes_payout: u64,
    /// Payout if NO wins and the pools stay as they are
    pub estimated_no_payout: u64,
    /// Whether the owner holds a YES or NO sub-account at all
    pub has_account: bool,
}

impl Position {
    pub fn new(
        owner: Address,
        market: &Market,
        yes_balance: Option<u64>,
        no_balance: Option<u64>,
    ) -> Self {
        let pools = market.pools();
        let estimate = |side, balance: u64| pools.payout(side, balance).unwrap_or(0);
        let yes = yes_balance.unwrap_or(0);
        let no = no_balance.unwrap_or(0);
        Self {
            owner,
            market: market.address,
            yes_balance: yes,
            no_balance: no,
            estimated_yes_payout: estimate(Side::Yes, yes),
            estimated_no_payout: estimate(Side::No, no),
            has_account: yes_balance.is_some() || no_balance.is_some(),
        }
    }

    pub fn balance(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.yes_balance,
            Side::No => self.no_balance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.yes_balance == 0 && self.no_balance == 0
    }
}

/// Market list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketFilter {
    #[default]
    All,
    /// Open and not yet expired
    Active,
    Resolved,
}

impl MarketFilter {
    pub fn matches(self, view: &MarketView) -> bool {
        match self {
            Self::All => true,
            Self::Active => !view.is_resolved && !view.is_expired,
            Self::Resolved => view.is_resolved,
        }
    }
}

/// Read access to markets and positions
#[async_trait]
pub trait MarketReader: Send + Sync {
    /// `Ok(None)` when no market lives at `address`
    async fn fetch_one(&self, address: &Address) -> Result<Option<MarketView>, EngineError>;

    /// Markets at `addresses`; absent or undecodable records are skipped
    async fn fetch_many(&self, addresses: &[Address]) -> Result<Vec<MarketView>, EngineError>;

    /// Every market of the program, largest volume first
    async fn fetch_all(&self) -> Result<Vec<MarketView>, EngineError>;

    async fn fetch_position(
        &self,
        owner: &Address,
        market: &Address,
    ) -> Result<Option<Position>, EngineError>;

    /// Positions with a balance, plus resolved markets where the owner
    /// still holds a sub-account
    async fn fetch_positions(&self, owner: &Address) -> Result<Vec<Position>, EngineError>;

    /// Token amount of a sub-account, `None` if it does not exist
    async fn token_balance(&self, account: &Address) -> Result<Option<u64>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(yes_pool: u64, no_pool: u64, status: MarketStatus) -> Market {
        Market {
            address: Address::new([1; 32]),
            creator: Address::new([2; 32]),
            title: "Will it rain?".into(),
            description: String::new(),
            bet_asset: Address::new([3; 32]),
            vault: Address::new([4; 32]),
            yes_mint: Address::new([5; 32]),
            no_mint: Address::new([6; 32]),
            yes_pool,
            no_pool,
            expiry_timestamp: 1_000,
            status,
            bump: 254,
        }
    }

    #[test]
    fn test_view_derives_probabilities() {
        let view = MarketView::at(
            market(5_000_000_000, 3_000_000_000, MarketStatus::Open),
            900,
        );
        assert_eq!(view.total_volume, 8_000_000_000);
        assert_eq!(view.yes_probability, dec!(0.625));
        assert_eq!(view.no_probability, dec!(0.375));
        assert!(!view.is_expired);
        assert!(!view.is_resolved);
        assert_eq!(view.time_remaining, 100);
    }

    #[test]
    fn test_view_at_and_after_expiry() {
        let at = MarketView::at(market(0, 0, MarketStatus::Open), 1_000);
        assert!(at.is_expired);
        assert_eq!(at.time_remaining, 0);
        assert_eq!(at.yes_probability, dec!(0.5));

        let after = MarketView::at(market(0, 0, MarketStatus::Open), 5_000);
        assert_eq!(after.time_remaining, 0);
    }

    #[test]
    fn test_winning_side() {
        assert_eq!(MarketStatus::Open.winning_side(), None);
        assert_eq!(
            MarketStatus::Settled { outcome: false }.winning_side(),
            Some(Side::No)
        );
    }

    #[test]
    fn test_position_estimates() {
        let m = market(100, 50, MarketStatus::Open);
        let position = Position::new(Address::new([9; 32]), &m, Some(100), None);
        assert_eq!(position.estimated_yes_payout, 150);
        assert_eq!(position.estimated_no_payout, 0);
        assert!(position.has_account);
        assert_eq!(position.balance(Side::No), 0);

        let empty = Position::new(Address::new([9; 32]), &m, None, None);
        assert!(empty.is_empty());
        assert!(!empty.has_account);
    }

    #[test]
    fn test_filters() {
        let open = MarketView::at(market(1, 1, MarketStatus::Open), 10);
        let expired = MarketView::at(market(1, 1, MarketStatus::Open), 2_000);
        let settled = MarketView::at(market(1, 1, MarketStatus::Settled { outcome: true }), 2_000);

        assert!(MarketFilter::Active.matches(&open));
        assert!(!MarketFilter::Active.matches(&expired));
        assert!(MarketFilter::Resolved.matches(&settled));
        assert!(!MarketFilter::Resolved.matches(&open));
        assert!(MarketFilter::All.matches(&expired));
    }
}
