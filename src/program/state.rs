//! Market account layout

use super::{DecodeError, MARKET_ACCOUNT_DISCRIMINATOR};
use crate::address::Address;
use borsh::{BorshDeserialize, BorshSerialize};

pub const MAX_TITLE_LEN: usize = 128;
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Allocated size of a market account, discriminator included
pub const MARKET_ACCOUNT_SPACE: usize = 8
    + 32
    + (4 + MAX_TITLE_LEN)
    + (4 + MAX_DESCRIPTION_LEN)
    + 32 * 4
    + 8 * 3
    + 1
    + 2
    + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum StatusTag {
    Open,
    Settled,
}

/// Market record exactly as the program stores it
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MarketAccount {
    pub creator: Address,
    pub title: String,
    pub description: String,
    pub bet_token_mint: Address,
    pub vault: Address,
    pub yes_mint: Address,
    pub no_mint: Address,
    pub yes_pool: u64,
    pub no_pool: u64,
    pub expiry_timestamp: i64,
    pub status: StatusTag,
    pub outcome: Option<bool>,
    pub bump: u8,
}

impl MarketAccount {
    /// Decode account data, ignoring allocation padding after the record
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 8 {
            return Err(DecodeError::TooShort {
                expected: 8,
                actual: data.len(),
            });
        }
        if data[..8] != MARKET_ACCOUNT_DISCRIMINATOR {
            return Err(DecodeError::Discriminator);
        }
        let mut body = &data[8..];
        BorshDeserialize::deserialize(&mut body).map_err(|e| DecodeError::Invalid(e.to_string()))
    }

    /// Discriminator, record and zero padding up to the allocated size
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        let mut data = MARKET_ACCOUNT_DISCRIMINATOR.to_vec();
        self.serialize(&mut data)
            .map_err(|e| DecodeError::Invalid(e.to_string()))?;
        if data.len() < MARKET_ACCOUNT_SPACE {
            data.resize(MARKET_ACCOUNT_SPACE, 0);
        }
        Ok(data)
    }
}
