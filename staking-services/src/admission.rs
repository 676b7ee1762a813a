//! Stake Admission Gate
//!
//! Decides whether a proposed stake may be recorded and, if so, records it.
//! The checks and the insert run inside one storage transaction, and the
//! `UNIQUE(user_id, market_id)` constraint backs the uniqueness check, so two
//! concurrent requests for the same pair can never both succeed.

use chrono::{DateTime, Utc};
use staking_core::{NewStake, Stake, StakeError, StakeRequest, StakeResult};
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregation::StakeAggregator;
use crate::storage::{Queries, StakeStorage};

/// Tunable admission rules
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    /// Reject amounts outside the market's `[min_stake, max_stake]`
    pub enforce_stake_bounds: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            enforce_stake_bounds: true,
        }
    }
}

/// Admission gate in front of the stakes table
pub struct StakeAdmission {
    storage: Arc<StakeStorage>,
    policy: AdmissionPolicy,
}

impl StakeAdmission {
    pub fn new(storage: Arc<StakeStorage>, policy: AdmissionPolicy) -> Self {
        Self { storage, policy }
    }

    /// Validate and record a stake at the current time
    pub fn place_stake(&self, request: StakeRequest) -> StakeResult<Stake> {
        self.place_stake_at(request, Utc::now())
    }

    /// Validate and record a stake as of `now`
    ///
    /// On any error no row is created.
    pub fn place_stake_at(&self, request: StakeRequest, now: DateTime<Utc>) -> StakeResult<Stake> {
        let stake = request.validate()?;

        let result = self.storage.transaction(|q| {
            self.check(q, &stake, now)?;
            Ok::<_, StakeError>(q.insert_stake(&stake, now)?)
        });

        match &result {
            Ok(created) => info!(
                "Stake {} admitted: user {} {} {} on market {}",
                created.id, created.user_id, created.choice, created.amount, created.market_id
            ),
            Err(e) => warn!(
                "Stake rejected for user {} on market {}: {}",
                stake.user_id, stake.market_id, e
            ),
        }

        result
    }

    /// Preconditions, cheapest and most selective first
    fn check(&self, q: &Queries<'_>, stake: &NewStake, now: DateTime<Utc>) -> StakeResult<()> {
        if q.find_stake(&stake.user_id, &stake.market_id)?.is_some() {
            return Err(StakeError::conflict("User has already staked on this market"));
        }

        let market = q
            .get_market(&stake.market_id)?
            .ok_or_else(|| StakeError::not_found("Market not found"))?;

        if !market.is_active {
            return Err(StakeError::invalid_state("Market is not active"));
        }
        if !market.is_within_window(now) {
            return Err(StakeError::invalid_state(if now < market.start_date {
                "Market has not started yet"
            } else {
                "Market has already ended"
            }));
        }

        if self.policy.enforce_stake_bounds && !market.accepts_amount(stake.amount) {
            return Err(StakeError::validation(format!(
                "Amount must be between {} and {}",
                market.min_stake.normalize(),
                market.max_stake.normalize()
            )));
        }

        // Pool totals must stay representable for every later read
        let mut pool = StakeAggregator::aggregate_in(q, &stake.market_id)?;
        if pool.add(stake.choice, stake.amount).is_err() {
            return Err(StakeError::validation("Amount would overflow the market pool"));
        }

        if q.get_user(&stake.user_id)?.is_none() {
            return Err(StakeError::not_found("User not found"));
        }

        Ok(())
    }
}
