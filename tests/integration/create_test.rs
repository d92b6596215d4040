//! Market creation

use crate::common::{Harness, NOW};
use karmapi_engine::address::{MarketAddresses, DEFAULT_PROGRAM_ID, NATIVE_MINT, SYSTEM_PROGRAM_ID};
use karmapi_engine::error::ProgramErrorCode;
use karmapi_engine::ledger::{AccountData, ScriptedFailure};
use karmapi_engine::market::MarketStatus;
use karmapi_engine::EngineError;

#[tokio::test]
async fn test_created_market_is_open_and_empty() {
    let h = Harness::new().await;
    let receipt = h
        .creator
        .engine
        .create_market("Title", "Description", &NATIVE_MINT, NOW + 3_600)
        .await
        .unwrap()
        .unwrap();

    let expected = MarketAddresses::derive(
        &h.creator.address,
        &NATIVE_MINT,
        NOW + 3_600,
        &DEFAULT_PROGRAM_ID,
    )
    .unwrap();
    assert_eq!(receipt.market, expected.market);
    assert_eq!(receipt.vault, expected.vault);
    assert_eq!(receipt.expiry_timestamp, NOW + 3_600);

    let view = h.creator.engine.fetch_one(&receipt.market).await.unwrap().unwrap();
    assert_eq!(view.market.status, MarketStatus::Open);
    assert_eq!(view.market.creator, h.creator.address);
    assert_eq!(view.total_volume, 0);
    assert_eq!(view.time_remaining, 3_600);
    assert!(!view.is_expired);
    assert_eq!(h.ledger.mint_supply(&receipt.yes_mint).await, Some(0));
}

#[tokio::test]
async fn test_collision_bumps_expiry() {
    let h = Harness::new().await;
    let taken = MarketAddresses::derive(
        &h.creator.address,
        &NATIVE_MINT,
        NOW + 3_600,
        &DEFAULT_PROGRAM_ID,
    )
    .unwrap();
    h.ledger
        .put_account(
            taken.market,
            AccountData {
                lamports: 1,
                owner: SYSTEM_PROGRAM_ID,
                data: vec![],
                executable: false,
            },
        )
        .await;

    let receipt = h
        .creator
        .engine
        .create_market("Title", "", &NATIVE_MINT, NOW + 3_600)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.expiry_timestamp, NOW + 3_601);
    assert_ne!(receipt.market, taken.market);
    assert!(h.ledger.market(&receipt.market).await.is_some());
}

#[tokio::test]
async fn test_lost_verdict_resolved_by_account_check() {
    let h = Harness::new().await;
    h.ledger
        .script_submission(ScriptedFailure::LandedUnconfirmed)
        .await;

    let receipt = h
        .creator
        .engine
        .create_market("Title", "", &NATIVE_MINT, NOW + 60)
        .await
        .unwrap()
        .unwrap();
    assert!(h.ledger.market(&receipt.market).await.is_some());
}

#[tokio::test]
async fn test_invalid_parameters_rejected_locally() {
    let h = Harness::new().await;
    let engine = &h.creator.engine;

    assert_eq!(
        engine
            .create_market("Title", "", &NATIVE_MINT, NOW)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::ExpiryInPast)
    );
    assert_eq!(
        engine
            .create_market(&"x".repeat(129), "", &NATIVE_MINT, NOW + 60)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::TitleTooLong)
    );
    assert_eq!(
        engine
            .create_market("Title", &"x".repeat(513), &NATIVE_MINT, NOW + 60)
            .await
            .unwrap_err(),
        EngineError::Program(ProgramErrorCode::DescriptionTooLong)
    );
    assert_eq!(h.ledger.simulation_count().await, 0);
}
