//! Ledger addresses and deterministic address derivation
//!
//! Client and program must agree bit-for-bit on where state lives, so every
//! address used by the engine is derived here with the ledger's own
//! program-derived-address rule.

mod derive;

pub use derive::{
    create_program_address, derive_market_address, derive_owner_asset_account,
    derive_sub_address, find_program_address, MarketAddresses, SubAddressTag, MAX_SEEDS,
    MAX_SEED_LEN,
};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// System program
pub const SYSTEM_PROGRAM_ID: Address = Address([0; 32]);

/// SPL token program (`TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`)
pub const TOKEN_PROGRAM_ID: Address = Address([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// Associated token account program (`ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`)
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// Wrapped native asset mint (`So11111111111111111111111111111111111111112`)
pub const NATIVE_MINT: Address = Address([
    6, 155, 136, 87, 254, 171, 129, 132, 251, 104, 127, 99, 70, 24, 192, 53, 218, 196, 57, 220,
    26, 235, 59, 85, 152, 160, 240, 0, 0, 0, 0, 1,
]);

/// Rent sysvar (`SysvarRent111111111111111111111111111111111`)
pub const RENT_SYSVAR_ID: Address = Address([
    6, 167, 213, 23, 25, 44, 92, 81, 33, 140, 201, 76, 61, 74, 241, 127, 88, 218, 238, 8, 155,
    161, 253, 68, 227, 219, 217, 138, 0, 0, 0, 0,
]);

/// Deployed market program (`AQR7DVzsy1dKM3TdRqLMbzAb5waubBJYdXd9BGuCtVpR`)
pub const DEFAULT_PROGRAM_ID: Address = Address([
    139, 184, 204, 139, 121, 165, 41, 97, 45, 224, 202, 213, 13, 227, 4, 81, 253, 183, 148, 60,
    226, 222, 151, 93, 55, 171, 241, 135, 228, 55, 163, 150,
]);

/// Address derivation and parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not valid base58
    #[error("Invalid base58 address: {0}")]
    InvalidBase58(String),
    /// Decoded to the wrong number of bytes
    #[error("Address must be 32 bytes, got {0}")]
    InvalidLength(usize),
    /// A single seed is longer than the ledger allows
    #[error("Seed exceeds {MAX_SEED_LEN} bytes")]
    MaxSeedLength,
    /// Too many seeds
    #[error("More than {MAX_SEEDS} seeds")]
    MaxSeeds,
    /// Digest is a valid curve point and could have a private key
    #[error("Derived address lies on the signing curve")]
    OnCurve,
    /// Every bump from 255 down to 0 landed on the curve
    #[error("No off-curve bump found")]
    NoViableBump,
}

/// A 32-byte ledger address
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Borrow raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Build from a byte slice of exactly 32 bytes
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58(s.to_string()))?;
        Self::try_from_slice(&bytes)
    }
}

impl From<Pubkey> for Address {
    fn from(key: Pubkey) -> Self {
        Self(key.to_bytes())
    }
}

impl From<Address> for Pubkey {
    fn from(address: Address) -> Self {
        Pubkey::new_from_array(address.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
