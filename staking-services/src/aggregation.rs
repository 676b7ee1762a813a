//! Aggregation Engine
//!
//! Read-only statistics over a market's stakes. Results are never stored;
//! every call recomputes from the live stake set, so a read taken while a
//! settlement is in flight simply reflects whatever was committed.

use staking_core::{Market, MarketStats, MarketWithStats, StakeError, StakeResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::storage::{Queries, StakeStorage};

/// Computes per-market statistics from stakes
pub struct StakeAggregator {
    storage: Arc<StakeStorage>,
}

impl StakeAggregator {
    pub fn new(storage: Arc<StakeStorage>) -> Self {
        Self { storage }
    }

    /// Statistics for a single market
    ///
    /// A market with no stakes (or an unknown id) yields all-zero stats.
    pub fn aggregate(&self, market_id: &str) -> StakeResult<MarketStats> {
        self.storage.read(|q| Self::aggregate_in(q, market_id))
    }

    /// Statistics for a single market, read through an open view
    ///
    /// Lets a caller holding a transaction see its own uncommitted writes.
    pub fn aggregate_in(q: &Queries<'_>, market_id: &str) -> StakeResult<MarketStats> {
        let stakes = q.stakes_for_market(market_id)?;
        MarketStats::from_stakes(&stakes)
    }

    /// Statistics for every market that has at least one stake
    ///
    /// Fetches all stakes once and groups them by market, instead of one
    /// query per market.
    pub fn aggregate_all(&self) -> StakeResult<HashMap<String, MarketStats>> {
        let stakes = self
            .storage
            .read(|q| q.all_stakes())
            .map_err(StakeError::from)?;

        let mut by_market: HashMap<String, MarketStats> = HashMap::new();
        for stake in &stakes {
            by_market
                .entry(stake.market_id.clone())
                .or_default()
                .record(stake)?;
        }

        debug!(
            "Aggregated {} stakes across {} markets",
            stakes.len(),
            by_market.len()
        );
        Ok(by_market)
    }

    /// Attach statistics to each market, using one batch aggregation
    pub fn with_stats(&self, markets: Vec<Market>) -> StakeResult<Vec<MarketWithStats>> {
        let mut stats = self.aggregate_all()?;
        Ok(markets
            .into_iter()
            .map(|market| {
                let stats = stats.remove(&market.id).unwrap_or_default();
                MarketWithStats {
                    market,
                    category: None,
                    stats,
                }
            })
            .collect())
    }
}
