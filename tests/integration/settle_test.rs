//! Settlement lifecycle

use crate::common::{Harness, SOL};
use karmapi_engine::address::{Address, DEFAULT_PROGRAM_ID, NATIVE_MINT};
use karmapi_engine::error::ProgramErrorCode;
use karmapi_engine::market::MarketStatus;
use karmapi_engine::orchestrator::{submit, Expectation};
use karmapi_engine::pool::Side;
use karmapi_engine::program;
use karmapi_engine::EngineError;

#[tokio::test]
async fn test_settle_before_expiry_never_reaches_the_ledger() {
    let h = Harness::new().await;
    let market = h.market(600).await;
    let simulations = h.ledger.simulation_count().await;
    let submissions = h.ledger.submission_count().await;
    let requests = h.creator.signer.request_count();

    let err = h.creator.engine.settle_market(&market, true).await.unwrap_err();
    assert_eq!(err, EngineError::Program(ProgramErrorCode::MarketNotExpired));
    assert_eq!(err.to_string(), ProgramErrorCode::MarketNotExpired.to_string());
    assert_eq!(h.ledger.simulation_count().await, simulations);
    assert_eq!(h.ledger.submission_count().await, submissions);
    assert_eq!(h.creator.signer.request_count(), requests);
}

#[tokio::test]
async fn test_only_creator_settles_once() {
    let h = Harness::new().await;
    let market = h.market(600).await;
    let alice = h.user(2, 10 * SOL).await;
    alice
        .engine
        .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap();
    h.clock.advance(600);

    assert_eq!(
        alice.engine.settle_market(&market, true).await.unwrap_err(),
        EngineError::Program(ProgramErrorCode::Unauthorized)
    );

    let receipt = h
        .creator
        .engine
        .settle_market(&market, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!receipt.outcome);
    let view = h.creator.engine.fetch_one(&market).await.unwrap().unwrap();
    assert_eq!(view.market.status, MarketStatus::Settled { outcome: false });
    assert!(view.is_resolved);

    for outcome in [true, false] {
        assert_eq!(
            h.creator
                .engine
                .settle_market(&market, outcome)
                .await
                .unwrap_err(),
            EngineError::Program(ProgramErrorCode::AlreadySettled)
        );
    }
    assert_eq!(
        alice.engine.settle_market(&market, true).await.unwrap_err(),
        EngineError::Program(ProgramErrorCode::AlreadySettled)
    );
}

#[tokio::test]
async fn test_settled_market_refuses_bets() {
    let h = Harness::new().await;
    let market = h.market(10).await;
    let alice = h.user(2, 10 * SOL).await;
    h.clock.advance(10);
    h.creator.engine.settle_market(&market, true).await.unwrap();

    assert_eq!(
        alice
            .engine
            .place_bet(&market, &NATIVE_MINT, SOL, Side::Yes)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::MarketNotOpen)
    );
}

#[tokio::test]
async fn test_program_enforces_settlement_rules_without_local_checks() {
    let h = Harness::new().await;
    let market = h.market(600).await;
    let alice = h.user(2, 10 * SOL).await;
    let creator_ctx = h.context(&h.creator);
    let alice_ctx = h.context(&alice);
    let settle = |caller: &Address| {
        [program::settle_market(
            &DEFAULT_PROGRAM_ID,
            caller,
            &market,
            true,
        )]
    };

    let err = submit(&creator_ctx, &settle(&h.creator.address), Expectation::Signature)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Program(ProgramErrorCode::MarketNotExpired));

    h.clock.advance(600);
    let err = submit(&alice_ctx, &settle(&alice.address), Expectation::Signature)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Program(ProgramErrorCode::Unauthorized));

    submit(&creator_ctx, &settle(&h.creator.address), Expectation::Signature)
        .await
        .unwrap();
    let err = submit(&creator_ctx, &settle(&h.creator.address), Expectation::Signature)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Program(ProgramErrorCode::AlreadySettled));
}
