//! Token program layouts and instruction builders
//!
//! Layouts and instruction encodings come from the token program's own
//! crates; these wrappers speak [`Address`] so callers never juggle key types.

use super::DecodeError;
use crate::address::Address;
use crate::ledger::Instruction;
use solana_sdk::program_option::COption;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_token::instruction as token_instruction;
use spl_token::state::{Account, AccountState, Mint as MintState};

/// Packed size of a token account
pub const TOKEN_ACCOUNT_LEN: usize = Account::LEN;
/// Packed size of a mint
pub const MINT_LEN: usize = MintState::LEN;

const SYSTEM_TRANSFER_TAG: u32 = 2;

fn invalid(err: impl std::fmt::Display) -> DecodeError {
    DecodeError::Invalid(err.to_string())
}

/// Per-asset sub-account held by an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
    /// Rent reserve when this wraps the native asset
    pub is_native: Option<u64>,
    /// Frozen by the mint's freeze authority; balance readable, not movable
    pub frozen: bool,
}

impl TokenAccount {
    pub fn unpack(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < TOKEN_ACCOUNT_LEN {
            return Err(DecodeError::TooShort {
                expected: TOKEN_ACCOUNT_LEN,
                actual: data.len(),
            });
        }
        let account = Account::unpack_unchecked(&data[..TOKEN_ACCOUNT_LEN]).map_err(invalid)?;
        if account.state == AccountState::Uninitialized {
            return Err(DecodeError::Uninitialized);
        }
        Ok(Self {
            mint: account.mint.into(),
            owner: account.owner.into(),
            amount: account.amount,
            is_native: account.is_native.into(),
            frozen: account.state == AccountState::Frozen,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let account = Account {
            mint: self.mint.into(),
            owner: self.owner.into(),
            amount: self.amount,
            delegate: COption::None,
            state: if self.frozen {
                AccountState::Frozen
            } else {
                AccountState::Initialized
            },
            is_native: self.is_native.into(),
            delegated_amount: 0,
            close_authority: COption::None,
        };
        let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
        account.pack_into_slice(&mut data);
        data
    }
}

/// Share-token or asset mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mint {
    pub mint_authority: Option<Address>,
    pub supply: u64,
    pub decimals: u8,
}

impl Mint {
    pub fn unpack(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < MINT_LEN {
            return Err(DecodeError::TooShort {
                expected: MINT_LEN,
                actual: data.len(),
            });
        }
        let mint = MintState::unpack_unchecked(&data[..MINT_LEN]).map_err(invalid)?;
        if !mint.is_initialized {
            return Err(DecodeError::Uninitialized);
        }
        Ok(Self {
            mint_authority: Option::<Pubkey>::from(mint.mint_authority).map(Address::from),
            supply: mint.supply,
            decimals: mint.decimals,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mint = MintState {
            mint_authority: self.mint_authority.map(Pubkey::from).into(),
            supply: self.supply,
            decimals: self.decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        let mut data = vec![0u8; MINT_LEN];
        mint.pack_into_slice(&mut data);
        data
    }
}

/// Native-asset transfer
pub fn system_transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
    system_instruction::transfer(&(*from).into(), &(*to).into(), lamports)
}

/// Provision `owner`'s sub-account for `mint`, paid by `payer`
pub fn create_associated_token_account(
    payer: &Address,
    owner: &Address,
    mint: &Address,
) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account(
        &(*payer).into(),
        &(*owner).into(),
        &(*mint).into(),
        &spl_token::ID,
    )
}

/// Fold lamports sent to a wrapped-native account into its token amount
pub fn sync_native(account: &Address) -> Result<Instruction, DecodeError> {
    token_instruction::sync_native(&spl_token::ID, &(*account).into()).map_err(invalid)
}

/// Close `account`, sending its lamports to `destination`
pub fn close_account(
    account: &Address,
    destination: &Address,
    owner: &Address,
) -> Result<Instruction, DecodeError> {
    token_instruction::close_account(
        &spl_token::ID,
        &(*account).into(),
        &(*destination).into(),
        &(*owner).into(),
        &[],
    )
    .map_err(invalid)
}

/// Token program instructions the engine emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInstruction {
    CloseAccount,
    SyncNative,
}

impl TokenInstruction {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        match token_instruction::TokenInstruction::unpack(data).map_err(invalid)? {
            token_instruction::TokenInstruction::CloseAccount => Ok(Self::CloseAccount),
            token_instruction::TokenInstruction::SyncNative => Ok(Self::SyncNative),
            other => Err(DecodeError::Invalid(format!("token instruction {other:?}"))),
        }
    }
}

/// Lamports carried by a system transfer, `None` for anything else
pub fn decode_system_transfer(data: &[u8]) -> Option<u64> {
    if data.len() != 12 {
        return None;
    }
    let (tag, lamports) = data.split_at(4);
    if u32::from_le_bytes(tag.try_into().ok()?) != SYSTEM_TRANSFER_TAG {
        return None;
    }
    Some(u64::from_le_bytes(lamports.try_into().ok()?))
}
