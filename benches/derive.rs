//! Benchmarks for address derivation and pool math

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use karmapi_engine::address::{
    derive_market_address, derive_owner_asset_account, Address, MarketAddresses,
    DEFAULT_PROGRAM_ID, NATIVE_MINT,
};
use karmapi_engine::pool::{Pools, Side};

fn benchmark_market_address(c: &mut Criterion) {
    let creator = Address::new([7; 32]);

    c.bench_function("derive_market_address", |b| {
        b.iter(|| {
            derive_market_address(
                black_box(&creator),
                black_box(&NATIVE_MINT),
                black_box(1_700_000_000),
                &DEFAULT_PROGRAM_ID,
            )
        })
    });
}

fn benchmark_market_addresses(c: &mut Criterion) {
    let creator = Address::new([7; 32]);

    c.bench_function("market_addresses_full", |b| {
        b.iter(|| {
            MarketAddresses::derive(
                black_box(&creator),
                black_box(&NATIVE_MINT),
                black_box(1_700_000_000),
                &DEFAULT_PROGRAM_ID,
            )
        })
    });
}

fn benchmark_owner_account(c: &mut Criterion) {
    let owner = Address::new([9; 32]);

    c.bench_function("derive_owner_asset_account", |b| {
        b.iter(|| derive_owner_asset_account(black_box(&owner), black_box(&NATIVE_MINT)))
    });
}

fn benchmark_quote(c: &mut Criterion) {
    let pools = Pools::new(3_000_000_000, 1_250_000_000);

    c.bench_function("pool_quote", |b| {
        b.iter(|| pools.quote(black_box(Side::Yes), black_box(500_000_000)))
    });
}

criterion_group!(
    benches,
    benchmark_market_address,
    benchmark_market_addresses,
    benchmark_owner_account,
    benchmark_quote
);
criterion_main!(benches);
