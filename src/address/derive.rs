//! Program-derived address rule
//!
//! `sha256(seeds ‖ program_id ‖ "ProgramDerivedAddress")`, rejected when the
//! digest decompresses to an ed25519 point. Hashing and the curve check are
//! the ledger SDK's own; this layer fixes the market's seed schemes.

use super::{Address, AddressError};
use solana_sdk::pubkey::{Pubkey, PubkeyError};
use spl_associated_token_account::get_associated_token_address;

pub use solana_sdk::pubkey::{MAX_SEEDS, MAX_SEED_LEN};

const MARKET_SEED: &[u8] = b"market";

/// Domain tags for addresses hanging off a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubAddressTag {
    /// YES share-token mint
    YesMint,
    /// NO share-token mint
    NoMint,
    /// Escrow holding every wager
    Vault,
}

impl SubAddressTag {
    /// Seed bytes for this tag
    pub fn seed(self) -> &'static [u8] {
        match self {
            Self::YesMint => b"yes_mint",
            Self::NoMint => b"no_mint",
            Self::Vault => b"vault",
        }
    }
}

fn check_seeds(seeds: &[&[u8]], limit: usize) -> Result<(), AddressError> {
    if seeds.len() > limit {
        return Err(AddressError::MaxSeeds);
    }
    if seeds.iter().any(|s| s.len() > MAX_SEED_LEN) {
        return Err(AddressError::MaxSeedLength);
    }
    Ok(())
}

/// Hash seeds into an address, failing if the result could carry a private key
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<Address, AddressError> {
    check_seeds(seeds, MAX_SEEDS)?;
    Pubkey::create_program_address(seeds, &Pubkey::from(*program_id))
        .map(Address::from)
        .map_err(|e| match e {
            PubkeyError::MaxSeedLengthExceeded => AddressError::MaxSeedLength,
            _ => AddressError::OnCurve,
        })
}

/// Find the first off-curve address, walking the bump down from 255
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), AddressError> {
    // One slot stays free for the bump.
    check_seeds(seeds, MAX_SEEDS - 1)?;
    Pubkey::try_find_program_address(seeds, &Pubkey::from(*program_id))
        .map(|(address, bump)| (Address::from(address), bump))
        .ok_or(AddressError::NoViableBump)
}

/// Market address for a (creator, bet asset, expiry) triple
pub fn derive_market_address(
    creator: &Address,
    bet_asset: &Address,
    expiry_timestamp: i64,
    program_id: &Address,
) -> Result<(Address, u8), AddressError> {
    let expiry = expiry_timestamp.to_le_bytes();
    find_program_address(
        &[MARKET_SEED, creator.as_ref(), bet_asset.as_ref(), &expiry],
        program_id,
    )
}

/// Share-token mint or vault address for a market
pub fn derive_sub_address(
    tag: SubAddressTag,
    market: &Address,
    program_id: &Address,
) -> Result<(Address, u8), AddressError> {
    find_program_address(&[tag.seed(), market.as_ref()], program_id)
}

/// The owner's standard sub-account for an asset
pub fn derive_owner_asset_account(owner: &Address, asset: &Address) -> Address {
    get_associated_token_address(&Pubkey::from(*owner), &Pubkey::from(*asset)).into()
}

/// Every address a market owns, with bumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAddresses {
    pub market: Address,
    pub market_bump: u8,
    pub yes_mint: Address,
    pub yes_mint_bump: u8,
    pub no_mint: Address,
    pub no_mint_bump: u8,
    pub vault: Address,
    pub vault_bump: u8,
}

impl MarketAddresses {
    /// Derive the market address and everything keyed off it
    pub fn derive(
        creator: &Address,
        bet_asset: &Address,
        expiry_timestamp: i64,
        program_id: &Address,
    ) -> Result<Self, AddressError> {
        let (market, market_bump) =
            derive_market_address(creator, bet_asset, expiry_timestamp, program_id)?;
        Self::for_market(market, market_bump, program_id)
    }

    /// Derive the sub-addresses of an already known market
    pub fn for_market(
        market: Address,
        market_bump: u8,
        program_id: &Address,
    ) -> Result<Self, AddressError> {
        let (yes_mint, yes_mint_bump) =
            derive_sub_address(SubAddressTag::YesMint, &market, program_id)?;
        let (no_mint, no_mint_bump) =
            derive_sub_address(SubAddressTag::NoMint, &market, program_id)?;
        let (vault, vault_bump) = derive_sub_address(SubAddressTag::Vault, &market, program_id)?;

        Ok(Self {
            market,
            market_bump,
            yes_mint,
            yes_mint_bump,
            no_mint,
            no_mint_bump,
            vault,
            vault_bump,
        })
    }
}
