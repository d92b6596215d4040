//! Market, position and quote commands

use super::Session;
use crate::address::Address;
use crate::market::{MarketFilter, MarketReader, MarketStatus, MarketView, Position};
use crate::pool::Side;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FilterArg {
    All,
    Active,
    Resolved,
}

impl From<FilterArg> for MarketFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Self::All,
            FilterArg::Active => Self::Active,
            FilterArg::Resolved => Self::Resolved,
        }
    }
}

#[derive(Args, Debug)]
pub struct MarketsArgs {
    /// Which markets to list
    #[arg(short, long, value_enum, default_value = "all")]
    pub filter: FilterArg,
}

impl MarketsArgs {
    pub async fn execute(&self, session: &Session) -> anyhow::Result<()> {
        let filter = MarketFilter::from(self.filter);
        let views: Vec<MarketView> = session
            .repository
            .fetch_all()
            .await?
            .into_iter()
            .filter(|v| filter.matches(v))
            .collect();

        session.emit(&views, |views| {
            if views.is_empty() {
                println!("No markets found");
            }
            for view in views {
                println!(
                    "{}  {:>6} YES  {:>14} vol  {}",
                    view.market.address,
                    percent(view.yes_probability),
                    view.total_volume,
                    view.market.title
                );
            }
        })
    }
}

#[derive(Args, Debug)]
pub struct MarketArgs {
    /// Market address
    pub address: Address,
}

impl MarketArgs {
    pub async fn execute(&self, session: &Session) -> anyhow::Result<()> {
        let Some(view) = session.repository.fetch_one(&self.address).await? else {
            anyhow::bail!("No market at {}", self.address);
        };
        session.emit(&view, print_market)
    }
}

#[derive(Args, Debug)]
pub struct PositionArgs {
    /// Owner identity
    pub owner: Address,

    /// Limit to one market
    #[arg(short, long)]
    pub market: Option<Address>,
}

impl PositionArgs {
    pub async fn execute(&self, session: &Session) -> anyhow::Result<()> {
        let positions = match &self.market {
            Some(market) => session
                .repository
                .fetch_position(&self.owner, market)
                .await?
                .into_iter()
                .collect(),
            None => session.repository.fetch_positions(&self.owner).await?,
        };
        session.emit(&positions, |positions: &Vec<Position>| {
            if positions.is_empty() {
                println!("No positions for {}", self.owner);
            }
            for p in positions {
                println!(
                    "{}  YES {} (pays {})  NO {} (pays {})",
                    p.market,
                    p.yes_balance,
                    p.estimated_yes_payout,
                    p.no_balance,
                    p.estimated_no_payout
                );
            }
        })
    }
}

#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Market address
    pub address: Address,

    /// Side to bet on (yes/no)
    #[arg(short, long)]
    pub side: Side,

    /// Amount in base units
    #[arg(short, long)]
    pub amount: u64,
}

impl QuoteArgs {
    pub async fn execute(&self, session: &Session) -> anyhow::Result<()> {
        let Some(view) = session.repository.fetch_one(&self.address).await? else {
            anyhow::bail!("No market at {}", self.address);
        };
        let quote = view.market.pools().quote(self.side, self.amount)?;
        session.emit(&quote, |quote| {
            println!("Bet {} on {}", self.amount, self.side);
            println!("  Pool share:       {}", percent(quote.share));
            println!("  Estimated return: {}", quote.estimated_return);
            println!("  Estimate only, later bets move the payout");
        })
    }
}

fn print_market(view: &MarketView) {
    let m = &view.market;
    println!("{}", m.title);
    if !m.description.is_empty() {
        println!("  {}", m.description);
    }
    println!("  Address:   {}", m.address);
    println!("  Creator:   {}", m.creator);
    println!("  Asset:     {}", m.bet_asset);
    println!(
        "  Pools:     YES {} / NO {} (total {})",
        m.yes_pool, m.no_pool, view.total_volume
    );
    println!(
        "  Odds:      YES {} / NO {}",
        percent(view.yes_probability),
        percent(view.no_probability)
    );
    match m.status {
        MarketStatus::Open if view.is_expired => println!("  Status:    Expired, awaiting settlement"),
        MarketStatus::Open => println!("  Status:    Open, {}s remaining", view.time_remaining),
        MarketStatus::Settled { outcome } => {
            println!("  Status:    Settled {}", Side::from_outcome(outcome))
        }
    }
}

fn percent(ratio: Decimal) -> String {
    format!("{}%", (ratio * Decimal::ONE_HUNDRED).round_dp(1))
}
