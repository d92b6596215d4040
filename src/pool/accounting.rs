//! Pool arithmetic

use super::{PoolError, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn decimal(value: u128) -> Decimal {
    // Two u64 pools sum to at most 65 bits, well inside the 96-bit mantissa.
    Decimal::from_i128_with_scale(value as i128, 0)
}

/// Total wagered per side, in base units
///
/// Counters only ever grow: redemption burns share-tokens and drains the
/// vault but leaves the historical volume untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pools {
    pub yes: u64,
    pub no: u64,
}

/// Pre-trade estimate for a proposed bet
///
/// Computed against the pools as they are now. Any bet confirmed before this
/// one shifts the ratio, so `estimated_return` is illustrative only and never
/// a promised payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Fraction of the side's pool the bet would own
    pub share: Decimal,
    /// Base units returned if the side wins and nothing else changes
    pub estimated_return: u64,
}

impl Pools {
    pub fn new(yes: u64, no: u64) -> Self {
        Self { yes, no }
    }

    /// Pool for one side
    pub fn get(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    /// Both pools combined
    pub fn total(&self) -> u128 {
        self.yes as u128 + self.no as u128
    }

    /// `pool[side] / total`, exactly one half for an empty market
    pub fn implied_probability(&self, side: Side) -> Decimal {
        let total = self.total();
        if total == 0 {
            return Decimal::new(5, 1);
        }
        decimal(self.get(side) as u128) / decimal(total)
    }

    /// Pools after a bet of `amount` on `side`
    ///
    /// The bettor receives exactly `amount` share-tokens, so share supply
    /// tracks the counter 1:1.
    pub fn apply_bet(&self, side: Side, amount: u64) -> Result<Pools, PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let mut next = *self;
        let slot = match side {
            Side::Yes => &mut next.yes,
            Side::No => &mut next.no,
        };
        *slot = slot.checked_add(amount).ok_or(PoolError::Overflow)?;
        Ok(next)
    }

    /// Base units paid for burning `shares` of the winning side's token
    ///
    /// `floor(shares * total / pool[winning])`, rejected before dividing when
    /// the winning pool is empty.
    pub fn payout(&self, winning: Side, shares: u64) -> Result<u64, PoolError> {
        let winning_pool = self.get(winning) as u128;
        if winning_pool == 0 {
            return Err(PoolError::NoWinningBets);
        }
        let gross = (shares as u128)
            .checked_mul(self.total())
            .ok_or(PoolError::Overflow)?;
        u64::try_from(gross / winning_pool).map_err(|_| PoolError::Overflow)
    }

    /// Estimate for betting `amount` on `side` at the current pools
    pub fn quote(&self, side: Side, amount: u64) -> Result<Quote, PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let side_after = self.get(side) as u128 + amount as u128;
        let total_after = self.total() + amount as u128;

        let share = decimal(amount as u128) / decimal(side_after);
        let gross = (amount as u128)
            .checked_mul(total_after)
            .ok_or(PoolError::Overflow)?;
        let estimated_return = u64::try_from(gross / side_after).map_err(|_| PoolError::Overflow)?;

        Ok(Quote {
            share,
            estimated_return,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_implied_probability_scenario() {
        let pools = Pools::new(5_000_000_000, 3_000_000_000);
        assert_eq!(pools.implied_probability(Side::Yes), dec!(0.625));
        assert_eq!(pools.implied_probability(Side::No), dec!(0.375));
    }

    #[test]
    fn test_implied_probability_empty_market_is_even() {
        let pools = Pools::default();
        assert_eq!(pools.implied_probability(Side::Yes), dec!(0.5));
        assert_eq!(pools.implied_probability(Side::No), dec!(0.5));
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let tolerance = dec!(0.000000000000000000000001);
        for (yes, no) in [(1, 2), (7, 3), (1, 1_000_000_007), (u64::MAX, 1), (333, 0)] {
            let pools = Pools::new(yes, no);
            let sum = pools.implied_probability(Side::Yes) + pools.implied_probability(Side::No);
            assert!((sum - Decimal::ONE).abs() <= tolerance, "{yes}/{no} summed to {sum}");
        }
    }

    #[test]
    fn test_payout_scenario() {
        let pools = Pools::new(100, 50);
        assert_eq!(pools.payout(Side::Yes, 100).unwrap(), 150);
    }

    #[test]
    fn test_payout_truncates() {
        let pools = Pools::new(3, 1);
        // 1 * 4 / 3 = 1.33..
        assert_eq!(pools.payout(Side::Yes, 1).unwrap(), 1);
        assert_eq!(pools.payout(Side::No, 1).unwrap(), 4);
    }

    #[test]
    fn test_payout_rejects_empty_winning_pool() {
        let pools = Pools::new(0, 500);
        assert_eq!(pools.payout(Side::Yes, 10), Err(PoolError::NoWinningBets));
    }

    #[test]
    fn test_payout_overflow_is_reported() {
        let pools = Pools::new(1, u64::MAX);
        assert_eq!(pools.payout(Side::Yes, u64::MAX), Err(PoolError::Overflow));
    }

    #[test]
    fn test_payout_non_decreasing_in_shares() {
        let pools = Pools::new(7_919, 104_729);
        let mut previous = 0;
        for q in 0..=7_919u64 {
            let paid = pools.payout(Side::Yes, q).unwrap();
            assert!(paid >= previous);
            previous = paid;
        }
    }

    #[test]
    fn test_apply_bet_increments_one_side() {
        let pools = Pools::new(10, 20);
        assert_eq!(pools.apply_bet(Side::Yes, 5).unwrap(), Pools::new(15, 20));
        assert_eq!(pools.apply_bet(Side::No, 5).unwrap(), Pools::new(10, 25));
    }

    #[test]
    fn test_apply_bet_rejects_zero_and_overflow() {
        let pools = Pools::new(u64::MAX, 0);
        assert_eq!(pools.apply_bet(Side::Yes, 0), Err(PoolError::InvalidAmount));
        assert_eq!(pools.apply_bet(Side::Yes, 1), Err(PoolError::Overflow));
    }

    #[test]
    fn test_quote_first_bet_owns_whole_side() {
        let quote = Pools::default().quote(Side::Yes, 1_000).unwrap();
        assert_eq!(quote.share, Decimal::ONE);
        assert_eq!(quote.estimated_return, 1_000);
    }

    #[test]
    fn test_quote_against_existing_pools() {
        let pools = Pools::new(300, 600);
        let quote = pools.quote(Side::Yes, 100).unwrap();
        assert_eq!(quote.share, dec!(0.25));
        // 100 * 1000 / 400
        assert_eq!(quote.estimated_return, 250);
    }
}
