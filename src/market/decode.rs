//! Market record decoding

use super::{Market, MarketStatus};
use crate::address::Address;
use crate::program::{DecodeError, MarketAccount, MarketKeys, StatusTag};

impl Market {
    /// Decode raw account data living at `address`
    pub fn decode(address: Address, data: &[u8]) -> Result<Self, DecodeError> {
        Self::from_account(address, MarketAccount::decode(data)?)
    }

    /// Lift a stored record, rejecting a status that disagrees with its outcome
    pub fn from_account(address: Address, account: MarketAccount) -> Result<Self, DecodeError> {
        let status = match (account.status, account.outcome) {
            (StatusTag::Open, None) => MarketStatus::Open,
            (StatusTag::Settled, Some(outcome)) => MarketStatus::Settled { outcome },
            (StatusTag::Open, Some(_)) => {
                return Err(DecodeError::Invalid("open market carries an outcome".into()))
            }
            (StatusTag::Settled, None) => {
                return Err(DecodeError::Invalid("settled market has no outcome".into()))
            }
        };

        Ok(Self {
            address,
            creator: account.creator,
            title: account.title,
            description: account.description,
            bet_asset: account.bet_token_mint,
            vault: account.vault,
            yes_mint: account.yes_mint,
            no_mint: account.no_mint,
            yes_pool: account.yes_pool,
            no_pool: account.no_pool,
            expiry_timestamp: account.expiry_timestamp,
            status,
            bump: account.bump,
        })
    }

    /// Addresses the program instructions reference
    pub fn keys(&self) -> MarketKeys {
        MarketKeys {
            market: self.address,
            bet_asset: self.bet_asset,
            yes_mint: self.yes_mint,
            no_mint: self.no_mint,
            vault: self.vault,
        }
    }
}
