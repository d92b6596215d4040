//! Pool accounting errors

use thiserror::Error;

/// Pool math failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Winning side has an empty pool, payout would divide by zero
    #[error("No winning bets to redeem against")]
    NoWinningBets,
    /// Zero amount
    #[error("Amount must be positive")]
    InvalidAmount,
    /// Result does not fit the base-unit integer
    #[error("Arithmetic overflow")]
    Overflow,
}
