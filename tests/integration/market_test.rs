//! Reads, positions and cache invalidation

use crate::common::{Harness, SOL};
use karmapi_engine::address::NATIVE_MINT;
use karmapi_engine::cache::CacheKey;
use karmapi_engine::config::{Cluster, Config, ExecutionMode};
use karmapi_engine::market::{MarketFilter, MarketReader};
use karmapi_engine::pool::Side;

#[tokio::test]
async fn test_fetch_all_orders_by_volume() {
    let h = Harness::new().await;
    let quiet = h.market(3_600).await;
    let busy = h.market(3_601).await;
    let alice = h.user(2, 10 * SOL).await;
    alice
        .engine
        .place_bet(&busy, &NATIVE_MINT, SOL, Side::No)
        .await
        .unwrap();

    let views = alice.engine.fetch_all().await.unwrap();
    let order: Vec<_> = views.iter().map(|v| v.market.address).collect();
    assert_eq!(order, vec![busy, quiet]);
    assert_eq!(views[0].total_volume, SOL as u128);
    assert!(views[0].no_probability > views[0].yes_probability);
    assert!(views.iter().all(|v| MarketFilter::Active.matches(v)));
}

#[tokio::test]
async fn test_positions_follow_bets_and_settlement() {
    let h = Harness::new().await;
    let m1 = h.market(100).await;
    let m2 = h.market(101).await;
    let alice = h.user(2, 10 * SOL).await;
    alice
        .engine
        .place_bet(&m1, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap();

    let positions = alice.engine.fetch_positions(&alice.address).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].market, m1);
    assert!(alice
        .engine
        .fetch_position(&alice.address, &m2)
        .await
        .unwrap()
        .is_some_and(|p| p.is_empty()));

    h.clock.advance(200);
    h.creator.engine.settle_market(&m1, true).await.unwrap();
    let payout = alice
        .engine
        .fetch_position(&alice.address, &m1)
        .await
        .unwrap()
        .unwrap()
        .estimated_yes_payout;
    assert_eq!(payout, SOL);
}

#[tokio::test]
async fn test_writes_invalidate_only_their_scope() {
    let h = Harness::new().await;
    let target = h.market(3_600).await;
    let other = h.market(3_601).await;
    let alice = h.user(2, 10 * SOL).await;
    let cluster = Cluster::Localnet;

    let before = alice.engine.fetch_one(&target).await.unwrap().unwrap();
    alice.engine.fetch_one(&other).await.unwrap();
    assert!(alice.engine.cache().contains(&CacheKey::Market {
        cluster,
        market: target
    }));

    alice
        .engine
        .place_bet(&target, &NATIVE_MINT, SOL, Side::Yes)
        .await
        .unwrap();
    assert!(!alice.engine.cache().contains(&CacheKey::Market {
        cluster,
        market: target
    }));
    assert!(alice.engine.cache().contains(&CacheKey::Market {
        cluster,
        market: other
    }));

    let after = alice.engine.fetch_one(&target).await.unwrap().unwrap();
    assert_eq!(before.market.yes_pool, 0);
    assert_eq!(after.market.yes_pool, SOL);

    // Another engine's writes do not reach this cache.
    let bob = h.user(3, 10 * SOL).await;
    bob.engine
        .place_bet(&other, &NATIVE_MINT, SOL, Side::No)
        .await
        .unwrap();
    let stale = alice.engine.reader().fetch_one(&other).await.unwrap().unwrap();
    assert_eq!(stale.market.no_pool, 0);
}

#[tokio::test]
async fn test_health_probe() {
    let h = Harness::new().await;
    let report = h.creator.engine.health().await;
    assert!(report.healthy);
    assert_eq!(report.cluster, Cluster::Localnet);
}

#[test]
fn test_example_config_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, include_str!("../../config.toml.example")).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.execution.submission_fee_lamports, 5_000);
}
