//! Wager placement against the paper ledger

use crate::common::{identity, Harness, SOL};
use karmapi_engine::address::{
    derive_owner_asset_account, Address, MarketAddresses, DEFAULT_PROGRAM_ID, NATIVE_MINT,
    TOKEN_PROGRAM_ID,
};
use karmapi_engine::error::ProgramErrorCode;
use karmapi_engine::ledger::{
    rent_exempt_minimum, AccountData, ScriptedFailure, LAMPORTS_PER_SIGNATURE,
};
use karmapi_engine::pool::Side;
use karmapi_engine::program::TOKEN_ACCOUNT_LEN;
use karmapi_engine::EngineError;
use std::sync::Arc;
use tokio::sync::watch;

fn sub_accounts(owner: &Address, market: &Address) -> (Address, Address) {
    let keys = MarketAddresses::for_market(*market, 0, &DEFAULT_PROGRAM_ID).unwrap();
    (
        derive_owner_asset_account(owner, &keys.yes_mint),
        derive_owner_asset_account(owner, &keys.no_mint),
    )
}

#[tokio::test]
async fn test_first_native_bet_provisions_and_mints() {
    let h = Harness::new().await;
    let market = h.market(3_600).await;
    let alice = h.user(2, 10 * SOL).await;

    let receipt = alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap()
        .expect("no bet in flight");

    let (yes, no) = sub_accounts(&alice.address, &market);
    let asset = derive_owner_asset_account(&alice.address, &NATIVE_MINT);
    assert_eq!(receipt.provisioned, vec![yes, no, asset]);
    assert_eq!(receipt.quote.estimated_return, SOL);
    assert_eq!(alice.signer.request_count(), 1);

    let record = h.ledger.market(&market).await.unwrap();
    assert_eq!(record.yes_pool, SOL);
    assert_eq!(record.no_pool, 0);
    assert_eq!(h.ledger.token_amount(&yes).await, Some(SOL));
    assert_eq!(h.ledger.token_amount(&no).await, Some(0));
    assert_eq!(h.ledger.token_amount(&asset).await, Some(0));
    assert_eq!(h.ledger.mint_supply(&record.yes_mint).await, Some(record.yes_pool));
    assert_eq!(h.ledger.token_amount(&record.vault).await, Some(SOL));

    let rent = rent_exempt_minimum(TOKEN_ACCOUNT_LEN);
    assert_eq!(
        h.ledger.lamports(&alice.address).await,
        10 * SOL - SOL - 3 * rent - LAMPORTS_PER_SIGNATURE
    );
}

#[tokio::test]
async fn test_second_bet_reuses_accounts() {
    let h = Harness::new().await;
    let market = h.market(3_600).await;
    let alice = h.user(2, 10 * SOL).await;
    let bob = h.user(3, 10 * SOL).await;

    alice
        .engine
        .place_bet(&market, &NATIVE_MINT, 3 * SOL, Side::Yes)
        .await
        .unwrap();
    bob.engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::No)
        .await
        .unwrap();
    let again = alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::No)
        .await
        .unwrap()
        .unwrap();
    assert!(again.provisioned.is_empty());
    assert_eq!(again.quote.estimated_return, 5 * SOL / 2);

    let record = h.ledger.market(&market).await.unwrap();
    assert_eq!(record.yes_pool, 3 * SOL);
    assert_eq!(record.no_pool, 2 * SOL);
    assert_eq!(h.ledger.mint_supply(&record.no_mint).await, Some(2 * SOL));

    let position = alice
        .engine
        .fetch_position(&alice.address, &market)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.yes_balance, 3 * SOL);
    assert_eq!(position.no_balance, SOL);
    assert_eq!(position.estimated_yes_payout, 5 * SOL);
}

#[tokio::test]
async fn test_native_shortfall_is_caught_locally() {
    let h = Harness::new().await;
    let market = h.market(3_600).await;
    let alice = h.user(2, SOL).await;
    let simulations = h.ledger.simulation_count().await;

    let err = alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap_err();
    let rent = rent_exempt_minimum(TOKEN_ACCOUNT_LEN);
    assert_eq!(
        err,
        EngineError::InsufficientBalance {
            required: SOL + 3 * rent + LAMPORTS_PER_SIGNATURE,
            available: SOL,
        }
    );
    assert_eq!(h.ledger.simulation_count().await, simulations);
    assert_eq!(alice.signer.request_count(), 0);
}

#[tokio::test]
async fn test_local_rejections() {
    let h = Harness::new().await;
    let market = h.market(60).await;
    let alice = h.user(2, 10 * SOL).await;

    assert_eq!(
        alice
            .engine
            .place_bet(&market, &NATIVE_MINT, 0, Side::Yes)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::InvalidBetAmount)
    );
    assert_eq!(
        alice
            .engine
            .place_bet(&market, &identity(42), SOL, Side::Yes)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::InvalidBetToken)
    );
    assert_eq!(
        alice
            .engine
            .place_bet(&identity(43), &NATIVE_MINT, SOL, Side::Yes)
            .await
            .unwrap_err(),
        EngineError::AccountNotFound
    );

    h.clock.advance(60);
    assert_eq!(
        alice
            .engine
            .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::MarketExpired)
    );
    assert_eq!(h.ledger.submission_count().await, 1);
}

#[tokio::test]
async fn test_token_asset_bet() {
    let h = Harness::new().await;
    let usdc = identity(50);
    h.ledger.create_mint(usdc, 6).await;
    let market = h.market_with(&usdc, 3_600).await;
    let alice = h.user(2, SOL).await;
    let wallet = h.ledger.mint_to_owner(&alice.address, &usdc, 1_000).await;

    assert_eq!(
        alice
            .engine
            .place_bet(&market, &usdc, 5_000, Side::No)
            .await
            .unwrap_err(),
        EngineError::InsufficientBalance {
            required: 5_000,
            available: 1_000,
        }
    );

    let receipt = alice
        .engine
        .place_bet(&market, &usdc, 400, Side::No)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.provisioned.len(), 2);
    assert_eq!(h.ledger.token_amount(&wallet).await, Some(600));
    assert_eq!(h.ledger.market(&market).await.unwrap().no_pool, 400);
}

#[tokio::test]
async fn test_frozen_asset_account_keeps_its_balance() {
    let h = Harness::new().await;
    let usdc = identity(50);
    h.ledger.create_mint(usdc, 6).await;
    let market = h.market_with(&usdc, 3_600).await;
    let alice = h.user(2, SOL).await;
    let wallet = h.ledger.mint_to_owner(&alice.address, &usdc, 1_000).await;
    let mut frozen = h.ledger.account(&wallet).await.unwrap();
    // Account state byte: 2 is frozen
    frozen.data[108] = 2;
    h.ledger.put_account(wallet, frozen).await;

    assert_eq!(
        alice
            .engine
            .place_bet(&market, &usdc, 5_000, Side::Yes)
            .await
            .unwrap_err(),
        EngineError::InsufficientBalance {
            required: 5_000,
            available: 1_000,
        }
    );
}

#[tokio::test]
async fn test_undecodable_asset_account_is_an_error() {
    let h = Harness::new().await;
    let usdc = identity(50);
    h.ledger.create_mint(usdc, 6).await;
    let market = h.market_with(&usdc, 3_600).await;
    let alice = h.user(2, SOL).await;
    let wallet = derive_owner_asset_account(&alice.address, &usdc);
    h.ledger
        .put_account(
            wallet,
            AccountData {
                lamports: rent_exempt_minimum(TOKEN_ACCOUNT_LEN),
                owner: TOKEN_PROGRAM_ID,
                data: vec![0; 12],
                executable: false,
            },
        )
        .await;
    let simulations = h.ledger.simulation_count().await;

    let err = alice
        .engine
        .place_bet(&market, &usdc, 100, Side::Yes)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unknown(_)), "{err:?}");
    assert_eq!(h.ledger.simulation_count().await, simulations);
    assert_eq!(alice.signer.request_count(), 0);
}

#[tokio::test]
async fn test_empty_token_account_fails_in_simulation() {
    let h = Harness::new().await;
    let usdc = identity(50);
    h.ledger.create_mint(usdc, 6).await;
    let market = h.market_with(&usdc, 3_600).await;
    let alice = h.user(2, SOL).await;
    let submissions = h.ledger.submission_count().await;

    let err = alice
        .engine
        .place_bet(&market, &usdc, 100, Side::Yes)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UnmappedProgramError(1));
    assert_eq!(h.ledger.submission_count().await, submissions);
    assert_eq!(alice.signer.request_count(), 0);
    assert_eq!(h.ledger.market(&market).await.unwrap().yes_pool, 0);
}

#[tokio::test]
async fn test_concurrent_bet_is_ignored() {
    let h = Harness::new().await;
    let market = h.market(3_600).await;
    let alice = h.user(2, 10 * SOL).await;
    h.ledger
        .script_submission(ScriptedFailure::DroppedUnconfirmed)
        .await;

    let (first, second) = tokio::join!(
        alice.engine.place_bet(&market, &NATIVE_MINT, SOL, Side::Yes),
        alice.engine.place_bet(&market, &NATIVE_MINT, SOL, Side::No),
    );
    assert_eq!(first.unwrap_err(), EngineError::Unconfirmed);
    assert_eq!(second.unwrap(), None);
    assert_eq!(h.ledger.market(&market).await.unwrap().yes_pool, 0);

    // The guard is released once the first call settles.
    let receipt = alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap();
    assert!(receipt.is_some());
}

#[tokio::test]
async fn test_cancelled_before_any_read() {
    let h = Harness::new().await;
    let market = h.market(3_600).await;
    let alice = h.user(2, 10 * SOL).await;
    let (_tx, rx) = watch::channel(true);
    let bets = karmapi_engine::orchestrator::BetOrchestrator::new(Arc::new(
        h.context(&alice).with_cancel(rx),
    ));

    let err = bets
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
    assert_eq!(alice.signer.request_count(), 0);
}
