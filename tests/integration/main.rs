//! Integration tests against the paper ledger

mod bet_test;
mod common;
mod create_test;
mod market_test;
mod redeem_test;
mod settle_test;
