//! Market program error codes

use serde::{Deserialize, Serialize};

/// First custom code the program framework assigns
pub const CUSTOM_ERROR_OFFSET: u32 = 6000;

/// Broad family of a program rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Bad input (timestamp, length, amount, wrong account)
    Validation,
    /// Caller is not allowed to perform the action
    Authorization,
    /// Market lifecycle forbids the action
    State,
    /// Checked arithmetic failed inside the program
    Arithmetic,
    /// Payout could not be made
    Payout,
}

/// Every custom error the market program can return, in code order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramErrorCode {
    ExpiryInPast,
    TitleTooLong,
    DescriptionTooLong,
    MarketNotOpen,
    MarketExpired,
    InvalidBetToken,
    InvalidMint,
    InvalidVault,
    InvalidBetAmount,
    ArithmeticOverflow,
    Unauthorized,
    AlreadySettled,
    MarketNotExpired,
    NotSettled,
    WrongMint,
    InvalidAmount,
    NoWinningBets,
    VaultEmpty,
    PayoutTooSmall,
}

impl ProgramErrorCode {
    /// All codes, indexed by `code() - 6000`
    pub const ALL: [ProgramErrorCode; 19] = [
        Self::ExpiryInPast,
        Self::TitleTooLong,
        Self::DescriptionTooLong,
        Self::MarketNotOpen,
        Self::MarketExpired,
        Self::InvalidBetToken,
        Self::InvalidMint,
        Self::InvalidVault,
        Self::InvalidBetAmount,
        Self::ArithmeticOverflow,
        Self::Unauthorized,
        Self::AlreadySettled,
        Self::MarketNotExpired,
        Self::NotSettled,
        Self::WrongMint,
        Self::InvalidAmount,
        Self::NoWinningBets,
        Self::VaultEmpty,
        Self::PayoutTooSmall,
    ];

    /// Numeric code as reported by the ledger
    pub fn code(self) -> u32 {
        CUSTOM_ERROR_OFFSET + self as u32
    }

    /// Look up a numeric code
    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(CUSTOM_ERROR_OFFSET)? as usize;
        Self::ALL.get(index).copied()
    }

    /// Look up the variant name printed in program logs (`Error Code: Name`)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Variant name as the program logs it
    pub fn name(self) -> &'static str {
        match self {
            Self::ExpiryInPast => "ExpiryInPast",
            Self::TitleTooLong => "TitleTooLong",
            Self::DescriptionTooLong => "DescriptionTooLong",
            Self::MarketNotOpen => "MarketNotOpen",
            Self::MarketExpired => "MarketExpired",
            Self::InvalidBetToken => "InvalidBetToken",
            Self::InvalidMint => "InvalidMint",
            Self::InvalidVault => "InvalidVault",
            Self::InvalidBetAmount => "InvalidBetAmount",
            Self::ArithmeticOverflow => "ArithmeticOverflow",
            Self::Unauthorized => "Unauthorized",
            Self::AlreadySettled => "AlreadySettled",
            Self::MarketNotExpired => "MarketNotExpired",
            Self::NotSettled => "NotSettled",
            Self::WrongMint => "WrongMint",
            Self::InvalidAmount => "InvalidAmount",
            Self::NoWinningBets => "NoWinningBets",
            Self::VaultEmpty => "VaultEmpty",
            Self::PayoutTooSmall => "PayoutTooSmall",
        }
    }

    /// User-facing message
    pub fn message(self) -> &'static str {
        match self {
            Self::ExpiryInPast => "Expiry timestamp must be in the future",
            Self::TitleTooLong => "Title exceeds maximum length of 128 characters",
            Self::DescriptionTooLong => "Description exceeds maximum length of 512 characters",
            Self::MarketNotOpen => "Market is not open",
            Self::MarketExpired => "Market has expired",
            Self::InvalidBetToken => "Invalid bet token",
            Self::InvalidMint => "Invalid mint",
            Self::InvalidVault => "Invalid vault",
            Self::InvalidBetAmount => "Bet amount must be positive",
            Self::ArithmeticOverflow => "Arithmetic overflow",
            Self::Unauthorized => "Only the market creator can settle this market",
            Self::AlreadySettled => "Market has already been settled",
            Self::MarketNotExpired => "Market has not expired yet",
            Self::NotSettled => "Market not settled yet",
            Self::WrongMint => "Wrong mint for redemption",
            Self::InvalidAmount => "Amount must be positive",
            Self::NoWinningBets => "No winning bets to redeem against",
            Self::VaultEmpty => "Vault is empty",
            Self::PayoutTooSmall => "Payout amount is too small",
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            Self::ExpiryInPast
            | Self::TitleTooLong
            | Self::DescriptionTooLong
            | Self::InvalidBetToken
            | Self::InvalidMint
            | Self::InvalidVault
            | Self::InvalidBetAmount
            | Self::WrongMint
            | Self::InvalidAmount => ErrorCategory::Validation,
            Self::Unauthorized => ErrorCategory::Authorization,
            Self::MarketNotOpen
            | Self::MarketExpired
            | Self::AlreadySettled
            | Self::MarketNotExpired
            | Self::NotSettled => ErrorCategory::State,
            Self::ArithmeticOverflow => ErrorCategory::Arithmetic,
            Self::NoWinningBets | Self::VaultEmpty | Self::PayoutTooSmall => ErrorCategory::Payout,
        }
    }
}

impl std::fmt::Display for ProgramErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
