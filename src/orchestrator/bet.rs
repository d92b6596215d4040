//! Wager placement

use super::submit::{submit, Expectation};
use super::{EngineContext, InFlight};
use crate::address::{
    derive_owner_asset_account, derive_sub_address, Address, SubAddressTag, NATIVE_MINT,
};
use crate::cache::InvalidationScope;
use crate::error::{EngineError, ProgramErrorCode};
use crate::ledger::{Instruction, Signature};
use crate::market::{Market, MarketStatus};
use crate::pool::{Quote, Side};
use crate::program::{self, token, TokenAccount, TOKEN_ACCOUNT_LEN};
use serde::Serialize;
use std::sync::Arc;

/// Confirmed wager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetReceipt {
    pub signature: Signature,
    pub market: Address,
    pub side: Side,
    pub amount: u64,
    /// Pre-trade estimate; later bets move the real payout
    pub quote: Quote,
    /// Sub-accounts created by this submission
    pub provisioned: Vec<Address>,
}

/// Sub-accounts the bettor needs for one market
struct BettorAccounts {
    asset: Address,
    yes: Address,
    no: Address,
}

/// Places wagers, one in flight at a time
pub struct BetOrchestrator {
    ctx: Arc<EngineContext>,
    in_flight: InFlight,
}

impl BetOrchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            in_flight: InFlight::default(),
        }
    }

    /// Wager `amount` base units of `asset` on `side`
    ///
    /// `Ok(None)` when another wager from this orchestrator is still in
    /// flight.
    pub async fn place_bet(
        &self,
        market: &Address,
        asset: &Address,
        amount: u64,
        side: Side,
    ) -> Result<Option<BetReceipt>, EngineError> {
        if amount == 0 {
            return Err(ProgramErrorCode::InvalidBetAmount.into());
        }
        let Some(_guard) = self.in_flight.try_acquire() else {
            tracing::info!(%market, "Bet already in flight, ignoring");
            return Ok(None);
        };

        let ctx = &self.ctx;
        let bettor = ctx.identity();
        let record = ctx.load_market(market).await?;
        check_market(&record, asset, ctx.clock.unix_timestamp())?;
        let keys = verified_keys(ctx, &record)?;

        let accounts = BettorAccounts {
            asset: derive_owner_asset_account(&bettor, asset),
            yes: derive_owner_asset_account(&bettor, &keys.yes_mint),
            no: derive_owner_asset_account(&bettor, &keys.no_mint),
        };
        let reader = ctx.reader();
        let existing = reader
            .accounts(&[accounts.yes, accounts.no, accounts.asset])
            .await?;
        let exists = |i: usize| existing.get(i).is_some_and(Option::is_some);

        let mut instructions: Vec<Instruction> = Vec::new();
        let mut provisioned = Vec::new();
        for (i, address, mint) in [
            (0, accounts.yes, keys.yes_mint),
            (1, accounts.no, keys.no_mint),
        ] {
            if !exists(i) {
                instructions.push(token::create_associated_token_account(&bettor, &bettor, &mint));
                provisioned.push(address);
            }
        }

        if *asset == NATIVE_MINT {
            if !exists(2) {
                instructions.push(token::create_associated_token_account(&bettor, &bettor, asset));
                provisioned.push(accounts.asset);
            }
            let rent = reader.rent_exemption(TOKEN_ACCOUNT_LEN).await?;
            let overhead = (provisioned.len() as u64)
                .saturating_mul(rent)
                .saturating_add(ctx.settings.submission_fee);
            let required = amount.saturating_add(overhead);
            let available = reader.native_balance(&bettor).await?;
            if available < required {
                tracing::info!(%bettor, required, available, "Native balance too low for bet");
                return Err(EngineError::InsufficientBalance {
                    required,
                    available,
                });
            }
            instructions.push(token::system_transfer(&bettor, &accounts.asset, amount));
            instructions.push(token::sync_native(&accounts.asset)?);
        } else {
            let held = existing
                .get(2)
                .and_then(Option::as_ref)
                .map(|a| TokenAccount::unpack(&a.data).map(|t| t.amount))
                .transpose()
                .map_err(|e| EngineError::Unknown(format!("asset account {}: {e}", accounts.asset)))?;
            match held {
                Some(available) if available < amount => {
                    return Err(EngineError::InsufficientBalance {
                        required: amount,
                        available,
                    });
                }
                Some(_) => {}
                None => {
                    // The program rejects the bet if the fresh account is short.
                    instructions.push(token::create_associated_token_account(&bettor, &bettor, asset));
                    provisioned.push(accounts.asset);
                }
            }
        }

        let quote = record.pools().quote(side, amount)?;
        instructions.push(program::place_bet(
            &ctx.settings.program_id,
            &bettor,
            &keys,
            amount,
            side,
        ));

        tracing::info!(
            %market,
            %side,
            amount,
            provisioning = provisioned.len(),
            "Submitting bet"
        );
        let signature = submit(ctx, &instructions, Expectation::Signature).await?;

        ctx.invalidate(
            &InvalidationScope::new(*market, bettor).touching([
                accounts.asset,
                accounts.yes,
                accounts.no,
                keys.vault,
            ]),
        );

        Ok(Some(BetReceipt {
            signature,
            market: *market,
            side,
            amount,
            quote,
            provisioned,
        }))
    }
}

/// Local mirror of the program's bet checks
fn check_market(record: &Market, asset: &Address, now: i64) -> Result<(), EngineError> {
    if record.status != MarketStatus::Open {
        return Err(ProgramErrorCode::MarketNotOpen.into());
    }
    if record.bet_asset != *asset {
        return Err(ProgramErrorCode::InvalidBetToken.into());
    }
    if record.is_expired_at(now) {
        return Err(ProgramErrorCode::MarketExpired.into());
    }
    Ok(())
}

/// Market keys re-derived locally and checked against the stored record
fn verified_keys(ctx: &EngineContext, record: &Market) -> Result<program::MarketKeys, EngineError> {
    let program_id = &ctx.settings.program_id;
    let derive = |tag| {
        derive_sub_address(tag, &record.address, program_id)
            .map(|(address, _)| address)
            .map_err(|e| EngineError::Unknown(e.to_string()))
    };
    let yes_mint = derive(SubAddressTag::YesMint)?;
    let no_mint = derive(SubAddressTag::NoMint)?;
    let vault = derive(SubAddressTag::Vault)?;

    if yes_mint != record.yes_mint || no_mint != record.no_mint {
        return Err(ProgramErrorCode::InvalidMint.into());
    }
    if vault != record.vault {
        return Err(ProgramErrorCode::InvalidVault.into());
    }
    Ok(record.keys())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pools;

    fn record(status: MarketStatus) -> Market {
        Market {
            address: Address::new([1; 32]),
            creator: Address::new([2; 32]),
            title: String::new(),
            description: String::new(),
            bet_asset: NATIVE_MINT,
            vault: Address::new([3; 32]),
            yes_mint: Address::new([4; 32]),
            no_mint: Address::new([5; 32]),
            yes_pool: 0,
            no_pool: 0,
            expiry_timestamp: 100,
            status,
            bump: 255,
        }
    }

    #[test]
    fn test_check_market_order() {
        let open = record(MarketStatus::Open);
        assert!(check_market(&open, &NATIVE_MINT, 99).is_ok());
        assert_eq!(
            check_market(&open, &NATIVE_MINT, 100),
            Err(EngineError::Program(ProgramErrorCode::MarketExpired))
        );
        assert_eq!(
            check_market(&open, &Address::new([9; 32]), 99),
            Err(EngineError::Program(ProgramErrorCode::InvalidBetToken))
        );
        assert_eq!(
            check_market(&record(MarketStatus::Settled { outcome: true }), &NATIVE_MINT, 99),
            Err(EngineError::Program(ProgramErrorCode::MarketNotOpen))
        );
    }

    #[test]
    fn test_first_bet_quote() {
        let quote = Pools::new(0, 0).quote(Side::Yes, 1_000).unwrap();
        assert_eq!(quote.estimated_return, 1_000);
    }
}
