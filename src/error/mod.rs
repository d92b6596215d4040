//! Failure taxonomy shared by every reader and writer
//!
//! Raw ledger and signer failures are folded into one [`EngineError`] so
//! callers can tell retryable network trouble from terminal rejections.

mod classify;
mod program;

pub use classify::{classify, classify_message, MAX_MESSAGE_LEN};
pub use program::{ErrorCategory, ProgramErrorCode, CUSTOM_ERROR_OFFSET};

use crate::pool::PoolError;
use crate::program::DecodeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How much diagnostic detail surfaces to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorContext {
    /// Full messages and simulation logs
    Development,
    /// Taxonomy-level messages, unknown text truncated
    #[default]
    Production,
}

/// Classified engine failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Signer declined locally
    #[error("Transaction was rejected by the wallet")]
    UserRejected,
    /// The submission envelope expired (not the market)
    #[error("Transaction expired. Please try again.")]
    StaleSubmission,
    #[error("RPC rate limit reached. Please wait a moment and try again.")]
    RateLimited,
    #[error("Request timed out. The RPC endpoint may be overloaded.")]
    Timeout,
    #[error("Network error. Please check your connection and try again.")]
    NetworkUnavailable,
    /// Known market program rejection
    #[error("{0}")]
    Program(ProgramErrorCode),
    /// Program rejection outside the known table
    #[error("Program error (code {0})")]
    UnmappedProgramError(u32),
    /// Account absent on the ledger
    #[error("Account not found on chain")]
    AccountNotFound,
    /// Detected locally before anything was sent
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: u64, available: u64 },
    /// Submitted but the verdict never arrived within the polling budget
    #[error("Transaction was submitted but its outcome could not be confirmed")]
    Unconfirmed,
    #[error("Operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Unknown(String),
}

impl EngineError {
    /// Worth retrying the same call later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::NetworkUnavailable
        )
    }

    /// Caller must change input or identity before trying again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Program(_)
                | Self::UnmappedProgramError(_)
                | Self::InsufficientBalance { .. }
                | Self::UserRejected
        )
    }

    /// Program code, when the failure carries one
    pub fn program_code(&self) -> Option<u32> {
        match self {
            Self::Program(code) => Some(code.code()),
            Self::UnmappedProgramError(code) => Some(*code),
            _ => None,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::StaleSubmission => "stale_submission",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::NetworkUnavailable => "network_unavailable",
            Self::Program(_) | Self::UnmappedProgramError(_) => "program_error",
            Self::AccountNotFound => "account_not_found",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::Unconfirmed => "unconfirmed",
            Self::Cancelled => "cancelled",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<ProgramErrorCode> for EngineError {
    fn from(code: ProgramErrorCode) -> Self {
        Self::Program(code)
    }
}

impl From<PoolError> for EngineError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NoWinningBets => Self::Program(ProgramErrorCode::NoWinningBets),
            PoolError::InvalidAmount => Self::Program(ProgramErrorCode::InvalidAmount),
            PoolError::Overflow => Self::Program(ProgramErrorCode::ArithmeticOverflow),
        }
    }
}

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> Self {
        Self::Unknown(err.to_string())
    }
}
