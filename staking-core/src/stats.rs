//! Derived market statistics and per-user positions
//!
//! Nothing in this module is persisted. Statistics are recomputed from the
//! live stake set on every read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StakeError, StakeResult};
use crate::market::{CategorySummary, Market};
use crate::stake::{Choice, Stake, StakeStatus};

/// Decimal places kept for payouts and percentages
const PAYOUT_SCALE: u32 = 8;
const PERCENT_SCALE: u32 = 2;

/// Aggregate statistics for one market
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub yes_count: u64,
    pub no_count: u64,
    /// Always `yes_count + no_count`
    pub total_stakers: u64,
    pub total_amount: Decimal,
    pub yes_amount: Decimal,
    pub no_amount: Decimal,
    /// Share of stakers on the yes side, 0-100
    pub yes_percentage: Decimal,
}

impl MarketStats {
    pub fn from_stakes<'a>(stakes: impl IntoIterator<Item = &'a Stake>) -> StakeResult<Self> {
        let mut stats = Self::default();
        for stake in stakes {
            stats.record(stake)?;
        }
        Ok(stats)
    }

    /// Fold one stake into the running totals
    pub fn record(&mut self, stake: &Stake) -> StakeResult<()> {
        self.add(stake.choice, stake.amount)
    }

    /// Add `amount` on `choice`, leaving the totals untouched if the pool
    /// would leave the representable range
    pub fn add(&mut self, choice: Choice, amount: Decimal) -> StakeResult<()> {
        let (yes_amount, no_amount) = match choice {
            Choice::Yes => (checked_sum(self.yes_amount, amount)?, self.no_amount),
            Choice::No => (self.yes_amount, checked_sum(self.no_amount, amount)?),
        };
        let total_amount = checked_sum(yes_amount, no_amount)?;

        match choice {
            Choice::Yes => self.yes_count += 1,
            Choice::No => self.no_count += 1,
        }
        self.yes_amount = yes_amount;
        self.no_amount = no_amount;
        self.total_amount = total_amount;
        self.total_stakers = self.yes_count + self.no_count;
        self.yes_percentage = if self.total_stakers == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(self.yes_count) * Decimal::ONE_HUNDRED
                / Decimal::from(self.total_stakers))
            .round_dp(PERCENT_SCALE)
        };
        Ok(())
    }

    pub fn amount_for(&self, choice: Choice) -> Decimal {
        match choice {
            Choice::Yes => self.yes_amount,
            Choice::No => self.no_amount,
        }
    }

    /// Pari-mutuel payout if `choice` wins: the whole pool is shared among
    /// that side in proportion to stake size.
    ///
    /// Large pools fall back to `amount / side * total`, which cannot exceed
    /// the pool total.
    pub fn potential_payout(&self, amount: Decimal, choice: Choice) -> StakeResult<Decimal> {
        let side = self.amount_for(choice);
        if side.is_zero() {
            return Ok(amount);
        }
        amount
            .checked_mul(self.total_amount)
            .and_then(|pool| pool.checked_div(side))
            .or_else(|| {
                amount
                    .checked_div(side)
                    .and_then(|share| share.checked_mul(self.total_amount))
            })
            .map(|payout| payout.round_dp(PAYOUT_SCALE))
            .ok_or_else(|| StakeError::invalid_state("Payout is out of range"))
    }

    /// Payout of a stake given its current status
    pub fn payout_for(&self, stake: &Stake) -> StakeResult<Decimal> {
        match stake.status {
            StakeStatus::Lost => Ok(Decimal::ZERO),
            StakeStatus::Pending | StakeStatus::Won => {
                self.potential_payout(stake.amount, stake.choice)
            }
        }
    }
}

fn checked_sum(a: Decimal, b: Decimal) -> StakeResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| StakeError::invalid_state("Stake pool total is out of range"))
}

/// A market together with its live statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketWithStats {
    #[serde(flatten)]
    pub market: Market,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategorySummary>,
    pub stats: MarketStats,
}

/// One stake as seen from its owner's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub stake: Stake,
    pub market_title: String,
    pub market_active: bool,
    /// Potential payout while pending, realized payout once won, zero once lost
    pub payout: Decimal,
}

/// Totals across a user's positions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub total_staked: Decimal,
    pub total_won: Decimal,
    pub pending: u64,
    pub won: u64,
    pub lost: u64,
}

impl PositionSummary {
    pub fn from_positions<'a>(
        positions: impl IntoIterator<Item = &'a Position>,
    ) -> StakeResult<Self> {
        let mut summary = Self::default();
        for position in positions {
            summary.total_staked = checked_sum(summary.total_staked, position.stake.amount)?;
            match position.stake.status {
                StakeStatus::Pending => summary.pending += 1,
                StakeStatus::Won => {
                    summary.won += 1;
                    summary.total_won = checked_sum(summary.total_won, position.payout)?;
                }
                StakeStatus::Lost => summary.lost += 1,
            }
        }
        Ok(summary)
    }
}
