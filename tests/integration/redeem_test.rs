//! Redemption of winning shares

use crate::common::{Harness, SOL};
use karmapi_engine::address::{derive_owner_asset_account, NATIVE_MINT};
use karmapi_engine::error::ProgramErrorCode;
use karmapi_engine::orchestrator::{BatchFailure, RedeemItem};
use karmapi_engine::pool::Side;
use karmapi_engine::EngineError;

#[tokio::test]
async fn test_partial_redemptions_drain_the_vault() {
    let h = Harness::new().await;
    let market = h.market(100).await;
    let alice = h.user(2, 10 * SOL).await;
    let bob = h.user(3, 10 * SOL).await;
    alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap();
    bob.engine
        .place_bet(&market, &NATIVE_MINT, SOL / 2, Side::No)
        .await
        .unwrap();
    h.clock.advance(100);
    h.creator.engine.settle_market(&market, true).await.unwrap();

    let record = h.ledger.market(&market).await.unwrap();
    let shares = derive_owner_asset_account(&alice.address, &record.yes_mint);
    let before = h.ledger.lamports(&alice.address).await;

    let first = alice
        .engine
        .redeem(&market, 400_000_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.winning_side, Side::Yes);
    assert_eq!(first.estimated_payout, 600_000_000);
    // Pools are frozen at settlement: supply plus redeemed shares equals the pool.
    assert_eq!(
        h.ledger.mint_supply(&record.yes_mint).await.unwrap() + 400_000_000,
        record.yes_pool
    );
    assert_eq!(h.ledger.token_amount(&record.vault).await, Some(900_000_000));

    let second = alice
        .engine
        .redeem(&market, 600_000_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.estimated_payout, 900_000_000);
    assert_eq!(h.ledger.token_amount(&shares).await, Some(0));
    assert_eq!(h.ledger.mint_supply(&record.yes_mint).await, Some(0));
    assert_eq!(h.ledger.token_amount(&record.vault).await, Some(0));
    assert!(h.ledger.lamports(&alice.address).await >= before + 3 * SOL / 2 - 10_000);

    let after = h.ledger.market(&market).await.unwrap();
    assert_eq!((after.yes_pool, after.no_pool), (record.yes_pool, record.no_pool));
}

#[tokio::test]
async fn test_redeem_rejections() {
    let h = Harness::new().await;
    let market = h.market(100).await;
    let alice = h.user(2, 10 * SOL).await;
    alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap();

    assert_eq!(
        alice.engine.redeem(&market, SOL).await.unwrap_err(),
        EngineError::Program(ProgramErrorCode::NotSettled)
    );
    h.clock.advance(100);
    h.creator.engine.settle_market(&market, true).await.unwrap();

    assert_eq!(
        alice.engine.redeem(&market, 0).await.unwrap_err(),
        EngineError::Program(ProgramErrorCode::InvalidAmount)
    );
    assert_eq!(
        alice.engine.redeem(&market, 2 * SOL).await.unwrap_err(),
        EngineError::InsufficientBalance {
            required: 2 * SOL,
            available: SOL,
        }
    );
}

#[tokio::test]
async fn test_batch_reports_each_item() {
    let h = Harness::new().await;
    let m1 = h.market(100).await;
    let m2 = h.market(101).await;
    let m3 = h.market(102).await;
    let alice = h.user(2, 10 * SOL).await;
    for (market, side) in [(m1, Side::Yes), (m2, Side::No), (m3, Side::Yes)] {
        alice
            .engine
            .place_bet(&market, &NATIVE_MINT, SOL, side)
            .await
            .unwrap()
            .unwrap();
    }
    h.clock.advance(200);
    for market in [m1, m2, m3] {
        h.creator.engine.settle_market(&market, true).await.unwrap();
    }

    let items: Vec<RedeemItem> = [m1, m2, m3]
        .into_iter()
        .map(|market| RedeemItem {
            market,
            amount: SOL,
        })
        .collect();
    let report = alice.engine.redeem_all(&items).await.unwrap();

    assert_eq!(report.succeeded_markets(), vec![m1, m3]);
    assert_eq!(
        report.failed,
        vec![BatchFailure {
            market: m2,
            error: EngineError::Program(ProgramErrorCode::NoWinningBets),
        }]
    );
    assert_eq!(
        report.failed[0].error.to_string(),
        "No winning bets to redeem against"
    );
    assert!(!report.is_complete());
    assert!(report.succeeded.iter().all(|r| r.estimated_payout == SOL));
}
