//! Market settlement
//!
//! `Open -> Settled(outcome)` exactly once. The local checks mirror the
//! program's and fail before any network submission.

use super::submit::{submit, Expectation};
use super::{EngineContext, InFlight};
use crate::address::Address;
use crate::cache::InvalidationScope;
use crate::error::{EngineError, ProgramErrorCode};
use crate::ledger::Signature;
use crate::market::{Market, MarketStatus};
use crate::program;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettleReceipt {
    pub signature: Signature,
    pub market: Address,
    pub outcome: bool,
}

pub struct SettlementController {
    ctx: Arc<EngineContext>,
    in_flight: InFlight,
}

impl SettlementController {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            in_flight: InFlight::default(),
        }
    }

    /// Settle `market` with `outcome` (`true` = YES)
    pub async fn settle_market(
        &self,
        market: &Address,
        outcome: bool,
    ) -> Result<Option<SettleReceipt>, EngineError> {
        let Some(_guard) = self.in_flight.try_acquire() else {
            tracing::info!(%market, "Settlement already in flight, ignoring");
            return Ok(None);
        };
        let ctx = &self.ctx;
        let caller = ctx.identity();

        let record = ctx.load_market(market).await?;
        if let Err(e) = check_transition(&record, &caller, ctx.clock.unix_timestamp()) {
            tracing::info!(%market, %caller, error = %e, "Settlement rejected locally");
            return Err(e);
        }

        let ix = program::settle_market(&ctx.settings.program_id, &caller, market, outcome);
        tracing::info!(%market, outcome, "Submitting settlement");
        let signature = submit(ctx, &[ix], Expectation::Signature).await?;

        ctx.invalidate(&InvalidationScope::new(*market, caller));
        Ok(Some(SettleReceipt {
            signature,
            market: *market,
            outcome,
        }))
    }
}

/// Local check order: open, expired, creator
fn check_transition(record: &Market, caller: &Address, now: i64) -> Result<(), EngineError> {
    if let MarketStatus::Settled { .. } = record.status {
        return Err(ProgramErrorCode::AlreadySettled.into());
    }
    if !record.is_expired_at(now) {
        return Err(ProgramErrorCode::MarketNotExpired.into());
    }
    if record.creator != *caller {
        return Err(ProgramErrorCode::Unauthorized.into());
    }
    Ok(())
}
