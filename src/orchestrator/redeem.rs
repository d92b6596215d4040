//! Redemption of winning share-tokens
//!
//! Batches run strictly one item after another and never stop early; each
//! item's outcome is reported on its own.

use super::submit::{submit, Expectation};
use super::{EngineContext, InFlight};
use crate::address::{derive_owner_asset_account, Address, NATIVE_MINT};
use crate::cache::InvalidationScope;
use crate::error::{EngineError, ProgramErrorCode};
use crate::ledger::Signature;
use crate::pool::Side;
use crate::program::{self, token, TokenAccount};
use serde::Serialize;
use std::sync::Arc;

/// One market to redeem from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemItem {
    pub market: Address,
    /// Winning share-tokens to burn
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeemReceipt {
    pub signature: Signature,
    pub market: Address,
    pub winning_side: Side,
    pub amount: u64,
    /// Pool-based estimate; the program's transfer is authoritative
    pub estimated_payout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub market: Address,
    pub error: EngineError,
}

/// Per-item outcome of a batch, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<RedeemReceipt>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn succeeded_markets(&self) -> Vec<Address> {
        self.succeeded.iter().map(|r| r.market).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct RedemptionEngine {
    ctx: Arc<EngineContext>,
    in_flight: InFlight,
}

impl RedemptionEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            in_flight: InFlight::default(),
        }
    }

    /// Burn `amount` winning share-tokens of `market`; partial amounts are
    /// allowed
    pub async fn redeem(
        &self,
        market: &Address,
        amount: u64,
    ) -> Result<Option<RedeemReceipt>, EngineError> {
        let Some(_guard) = self.in_flight.try_acquire() else {
            tracing::info!(%market, "Redemption already in flight, ignoring");
            return Ok(None);
        };
        self.redeem_one(market, amount).await.map(Some)
    }

    /// Redeem every item in order, recording each outcome
    ///
    /// `None` when another redemption from this engine is in flight.
    pub async fn redeem_all(&self, items: &[RedeemItem]) -> Option<BatchReport> {
        let Some(_guard) = self.in_flight.try_acquire() else {
            tracing::info!(items = items.len(), "Redemption already in flight, ignoring batch");
            return None;
        };

        let mut report = BatchReport::default();
        for item in items {
            match self.redeem_one(&item.market, item.amount).await {
                Ok(receipt) => report.succeeded.push(receipt),
                Err(error) => {
                    tracing::warn!(market = %item.market, %error, "Batch item failed");
                    report.failed.push(BatchFailure {
                        market: item.market,
                        error,
                    });
                }
            }
        }
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch redemption finished"
        );
        Some(report)
    }

    async fn redeem_one(&self, market: &Address, amount: u64) -> Result<RedeemReceipt, EngineError> {
        if amount == 0 {
            return Err(ProgramErrorCode::InvalidAmount.into());
        }
        let ctx = &self.ctx;
        let redeemer = ctx.identity();
        let record = ctx.load_market(market).await?;
        let winning = record
            .status
            .winning_side()
            .ok_or(EngineError::Program(ProgramErrorCode::NotSettled))?;
        let estimated_payout = record.pools().payout(winning, amount)?;

        let keys = record.keys();
        let winning_account = derive_owner_asset_account(&redeemer, &keys.mint(winning));
        let asset_account = derive_owner_asset_account(&redeemer, &record.bet_asset);
        let existing = ctx
            .reader()
            .accounts(&[winning_account, asset_account])
            .await?;

        let available = existing
            .first()
            .and_then(Option::as_ref)
            .map(|a| TokenAccount::unpack(&a.data))
            .transpose()
            .map_err(|e| EngineError::Unknown(format!("share account {winning_account}: {e}")))?
            .map_or(0, |t| t.amount);
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let mut instructions = Vec::with_capacity(3);
        if !existing.get(1).is_some_and(Option::is_some) {
            instructions.push(token::create_associated_token_account(
                &redeemer,
                &redeemer,
                &record.bet_asset,
            ));
        }
        instructions.push(program::redeem(
            &ctx.settings.program_id,
            &redeemer,
            &keys,
            winning,
            amount,
        ));
        if record.bet_asset == NATIVE_MINT {
            instructions.push(token::close_account(&asset_account, &redeemer, &redeemer)?);
        }

        tracing::info!(%market, %winning, amount, estimated_payout, "Submitting redemption");
        let signature = submit(ctx, &instructions, Expectation::Signature).await?;

        ctx.invalidate(
            &InvalidationScope::new(*market, redeemer).touching([
                winning_account,
                asset_account,
                keys.vault,
            ]),
        );
        Ok(RedeemReceipt {
            signature,
            market: *market,
            winning_side: winning,
            amount,
            estimated_payout,
        })
    }
}
