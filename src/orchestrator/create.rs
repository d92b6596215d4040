//! Market creation

use super::submit::{submit, Expectation};
use super::{EngineContext, InFlight};
use crate::address::{Address, MarketAddresses};
use crate::cache::CacheKey;
use crate::error::{EngineError, ProgramErrorCode};
use crate::ledger::Signature;
use crate::program::{self, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use serde::Serialize;
use std::sync::Arc;

/// Expiry bumps tried when the derived address is already taken
pub const MAX_COLLISION_RETRIES: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateReceipt {
    pub signature: Signature,
    pub market: Address,
    pub yes_mint: Address,
    pub no_mint: Address,
    pub vault: Address,
    /// Expiry actually used, later than requested after a collision
    pub expiry_timestamp: i64,
}

pub struct MarketCreator {
    ctx: Arc<EngineContext>,
    in_flight: InFlight,
}

impl MarketCreator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            in_flight: InFlight::default(),
        }
    }

    /// Open a market wagering `asset` that expires at `expiry_timestamp`
    pub async fn create_market(
        &self,
        title: &str,
        description: &str,
        asset: &Address,
        expiry_timestamp: i64,
    ) -> Result<Option<CreateReceipt>, EngineError> {
        let ctx = &self.ctx;
        validate(title, description, expiry_timestamp, ctx.clock.unix_timestamp())?;
        let Some(_guard) = self.in_flight.try_acquire() else {
            tracing::info!("Market creation already in flight, ignoring");
            return Ok(None);
        };

        let creator = ctx.identity();
        let program_id = ctx.settings.program_id;
        let reader = ctx.reader();

        let mut expiry = expiry_timestamp;
        let mut addresses = derive(&creator, asset, expiry, &program_id)?;
        let mut retries = 0;
        while reader.account_exists(&addresses.market).await? {
            if retries == MAX_COLLISION_RETRIES {
                return Err(EngineError::Unknown(format!(
                    "Market address still taken after {retries} expiry adjustments"
                )));
            }
            retries += 1;
            expiry += 1;
            tracing::debug!(market = %addresses.market, expiry, "Market address taken, bumping expiry");
            addresses = derive(&creator, asset, expiry, &program_id)?;
        }

        let ix = program::create_market(
            &program_id,
            &creator,
            asset,
            &addresses,
            title,
            description,
            expiry,
        );
        tracing::info!(market = %addresses.market, expiry, "Submitting market creation");
        let signature = submit(ctx, &[ix], Expectation::Account(addresses.market)).await?;

        let cluster = ctx.network.cluster();
        ctx.invalidator.invalidate(&[
            CacheKey::Markets { cluster },
            CacheKey::Market {
                cluster,
                market: addresses.market,
            },
        ]);
        Ok(Some(CreateReceipt {
            signature,
            market: addresses.market,
            yes_mint: addresses.yes_mint,
            no_mint: addresses.no_mint,
            vault: addresses.vault,
            expiry_timestamp: expiry,
        }))
    }
}

fn derive(
    creator: &Address,
    asset: &Address,
    expiry: i64,
    program_id: &Address,
) -> Result<MarketAddresses, EngineError> {
    MarketAddresses::derive(creator, asset, expiry, program_id)
        .map_err(|e| EngineError::Unknown(e.to_string()))
}

fn validate(title: &str, description: &str, expiry: i64, now: i64) -> Result<(), EngineError> {
    if expiry <= now {
        return Err(ProgramErrorCode::ExpiryInPast.into());
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ProgramErrorCode::TitleTooLong.into());
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(ProgramErrorCode::DescriptionTooLong.into());
    }
    Ok(())
}
