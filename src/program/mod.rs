//! Market program encoding
//!
//! Account discriminators, instruction data and account lists for the
//! market program, plus the token program pieces the orchestrators need.

mod state;
pub mod token;

pub use state::{MarketAccount, StatusTag, MARKET_ACCOUNT_SPACE, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
pub use token::{Mint, TokenAccount, MINT_LEN, TOKEN_ACCOUNT_LEN};

use crate::address::{
    derive_owner_asset_account, Address, MarketAddresses, RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};
use crate::ledger::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use crate::pool::Side;
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Account data too short: need {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("Discriminator mismatch")]
    Discriminator,
    #[error("Account is not initialized")]
    Uninitialized,
    #[error("Invalid encoding: {0}")]
    Invalid(String),
}

/// First eight bytes of `sha256("<namespace>:<name>")`
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::new()
        .chain_update(namespace.as_bytes())
        .chain_update(b":")
        .chain_update(name.as_bytes())
        .finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub const MARKET_ACCOUNT_DISCRIMINATOR: [u8; 8] = [219, 190, 213, 55, 0, 227, 198, 154];

const CREATE_MARKET: [u8; 8] = [103, 226, 97, 235, 200, 188, 251, 254];
const PLACE_BET: [u8; 8] = [222, 62, 67, 220, 63, 166, 126, 33];
const SETTLE_MARKET: [u8; 8] = [193, 153, 95, 216, 166, 6, 144, 217];
const REDEEM: [u8; 8] = [184, 12, 86, 149, 70, 196, 97, 225];

#[derive(BorshSerialize, BorshDeserialize)]
struct CreateMarketArgs {
    title: String,
    description: String,
    expiry_timestamp: i64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct PlaceBetArgs {
    amount: u64,
    side: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct SettleMarketArgs {
    outcome: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RedeemArgs {
    amount: u64,
}

/// Decoded market program instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketInstruction {
    CreateMarket {
        title: String,
        description: String,
        expiry_timestamp: i64,
    },
    PlaceBet {
        amount: u64,
        side: Side,
    },
    SettleMarket {
        outcome: bool,
    },
    Redeem {
        amount: u64,
    },
}

impl MarketInstruction {
    /// Discriminator followed by borsh arguments
    pub fn data(&self) -> Vec<u8> {
        let (tag, args) = match self {
            Self::CreateMarket {
                title,
                description,
                expiry_timestamp,
            } => (
                CREATE_MARKET,
                borsh::to_vec(&CreateMarketArgs {
                    title: title.clone(),
                    description: description.clone(),
                    expiry_timestamp: *expiry_timestamp,
                }),
            ),
            Self::PlaceBet { amount, side } => (
                PLACE_BET,
                borsh::to_vec(&PlaceBetArgs {
                    amount: *amount,
                    side: side.as_outcome(),
                }),
            ),
            Self::SettleMarket { outcome } => (
                SETTLE_MARKET,
                borsh::to_vec(&SettleMarketArgs { outcome: *outcome }),
            ),
            Self::Redeem { amount } => (REDEEM, borsh::to_vec(&RedeemArgs { amount: *amount })),
        };
        let mut data = tag.to_vec();
        // Writing into a Vec cannot fail.
        data.extend(args.unwrap_or_default());
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 8 {
            return Err(DecodeError::TooShort {
                expected: 8,
                actual: data.len(),
            });
        }
        let (tag, args) = data.split_at(8);
        let invalid = |e: std::io::Error| DecodeError::Invalid(e.to_string());
        let ix = match <[u8; 8]>::try_from(tag).map_err(|_| DecodeError::Discriminator)? {
            CREATE_MARKET => {
                let a = CreateMarketArgs::try_from_slice(args).map_err(invalid)?;
                Self::CreateMarket {
                    title: a.title,
                    description: a.description,
                    expiry_timestamp: a.expiry_timestamp,
                }
            }
            PLACE_BET => {
                let a = PlaceBetArgs::try_from_slice(args).map_err(invalid)?;
                Self::PlaceBet {
                    amount: a.amount,
                    side: Side::from_outcome(a.side),
                }
            }
            SETTLE_MARKET => {
                let a = SettleMarketArgs::try_from_slice(args).map_err(invalid)?;
                Self::SettleMarket { outcome: a.outcome }
            }
            REDEEM => {
                let a = RedeemArgs::try_from_slice(args).map_err(invalid)?;
                Self::Redeem { amount: a.amount }
            }
            _ => return Err(DecodeError::Discriminator),
        };
        Ok(ix)
    }
}

/// Addresses a live market instruction needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketKeys {
    pub market: Address,
    pub bet_asset: Address,
    pub yes_mint: Address,
    pub no_mint: Address,
    pub vault: Address,
}

impl MarketKeys {
    pub fn mint(&self, side: Side) -> Address {
        match side {
            Side::Yes => self.yes_mint,
            Side::No => self.no_mint,
        }
    }
}

pub fn create_market(
    program_id: &Address,
    creator: &Address,
    bet_asset: &Address,
    addresses: &MarketAddresses,
    title: &str,
    description: &str,
    expiry_timestamp: i64,
) -> Instruction {
    Instruction {
        program_id: (*program_id).into(),
        accounts: vec![
            AccountMeta::new(Pubkey::from(*creator), true),
            AccountMeta::new(addresses.market.into(), false),
            AccountMeta::new_readonly(Pubkey::from(*bet_asset), false),
            AccountMeta::new(addresses.yes_mint.into(), false),
            AccountMeta::new(addresses.no_mint.into(), false),
            AccountMeta::new(addresses.vault.into(), false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID.into(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID.into(), false),
            AccountMeta::new_readonly(RENT_SYSVAR_ID.into(), false),
        ],
        data: MarketInstruction::CreateMarket {
            title: title.to_string(),
            description: description.to_string(),
            expiry_timestamp,
        }
        .data(),
    }
}

pub fn place_bet(
    program_id: &Address,
    bettor: &Address,
    keys: &MarketKeys,
    amount: u64,
    side: Side,
) -> Instruction {
    Instruction {
        program_id: (*program_id).into(),
        accounts: vec![
            AccountMeta::new(Pubkey::from(*bettor), true),
            AccountMeta::new(keys.market.into(), false),
            AccountMeta::new_readonly(keys.bet_asset.into(), false),
            AccountMeta::new(keys.yes_mint.into(), false),
            AccountMeta::new(keys.no_mint.into(), false),
            AccountMeta::new(keys.vault.into(), false),
            AccountMeta::new(derive_owner_asset_account(bettor, &keys.bet_asset).into(), false),
            AccountMeta::new(derive_owner_asset_account(bettor, &keys.yes_mint).into(), false),
            AccountMeta::new(derive_owner_asset_account(bettor, &keys.no_mint).into(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID.into(), false),
        ],
        data: MarketInstruction::PlaceBet { amount, side }.data(),
    }
}

pub fn settle_market(
    program_id: &Address,
    creator: &Address,
    market: &Address,
    outcome: bool,
) -> Instruction {
    Instruction {
        program_id: (*program_id).into(),
        accounts: vec![
            AccountMeta::new_readonly(Pubkey::from(*creator), true),
            AccountMeta::new(Pubkey::from(*market), false),
        ],
        data: MarketInstruction::SettleMarket { outcome }.data(),
    }
}

/// Burn `amount` of the winning share-token for a cut of the vault
pub fn redeem(
    program_id: &Address,
    redeemer: &Address,
    keys: &MarketKeys,
    winning: Side,
    amount: u64,
) -> Instruction {
    let winning_mint = keys.mint(winning);
    Instruction {
        program_id: (*program_id).into(),
        accounts: vec![
            AccountMeta::new_readonly(Pubkey::from(*redeemer), true),
            AccountMeta::new(keys.market.into(), false),
            AccountMeta::new(keys.vault.into(), false),
            AccountMeta::new(winning_mint.into(), false),
            AccountMeta::new(derive_owner_asset_account(redeemer, &winning_mint).into(), false),
            AccountMeta::new(derive_owner_asset_account(redeemer, &keys.bet_asset).into(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID.into(), false),
        ],
        data: MarketInstruction::Redeem { amount }.data(),
    }
}
