//! Settlement Engine
//!
//! Resolves a market once, given the operator-declared winning side:
//! pending stakes on that side become `won`, every other pending stake
//! becomes `lost`, and the market is closed. All three steps share one
//! transaction; if any of them fails nothing is applied and the market stays
//! open for a retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use staking_core::{Choice, MarketState, MarketStats, StakeError, StakeResult, StakeStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::aggregation::StakeAggregator;
use crate::storage::StakeStorage;

/// Outcome of a successful settlement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub market_id: String,
    pub winning_choice: Choice,
    pub won: usize,
    pub lost: usize,
    pub settled_at: DateTime<Utc>,
    pub stats: MarketStats,
}

pub struct SettlementEngine {
    storage: Arc<StakeStorage>,
}

impl SettlementEngine {
    pub fn new(storage: Arc<StakeStorage>) -> Self {
        Self { storage }
    }

    pub fn settle(&self, market_id: &str, winning_choice: Choice) -> StakeResult<SettlementReport> {
        self.settle_at(market_id, winning_choice, Utc::now())
    }

    /// Settle `market_id` as of `now`
    ///
    /// Fails with `InvalidState` if the market is already closed, leaving
    /// every stake untouched. The report's stats are read inside the same
    /// transaction, so an `Err` always means nothing was committed.
    pub fn settle_at(
        &self,
        market_id: &str,
        winning_choice: Choice,
        now: DateTime<Utc>,
    ) -> StakeResult<SettlementReport> {
        let result = self.storage.transaction(|q| {
            let market = q
                .get_market(market_id)?
                .ok_or_else(|| StakeError::not_found("Market not found"))?;
            if market.state() == MarketState::Settled {
                return Err(StakeError::invalid_state("Market already closed"));
            }

            let won = q.resolve_pending(market_id, winning_choice, true, StakeStatus::Won)?;
            let lost = q.resolve_pending(market_id, winning_choice, false, StakeStatus::Lost)?;

            // The status filters above make the stake updates safe to repeat;
            // closing the market needs its own guard.
            if q.close_market(market_id, now)? != 1 {
                return Err(StakeError::invalid_state("Market already closed"));
            }

            let stats = StakeAggregator::aggregate_in(q, market_id)?;
            Ok(SettlementReport {
                market_id: market_id.to_string(),
                winning_choice,
                won,
                lost,
                settled_at: now,
                stats,
            })
        });

        match &result {
            Ok(report) => info!(
                "Market {} settled: winning choice {}, {} won, {} lost",
                market_id, winning_choice, report.won, report.lost
            ),
            Err(e @ StakeError::Storage(_)) => {
                error!("Settlement of market {} failed: {}", market_id, e)
            }
            Err(e) => warn!("Settlement of market {} rejected: {}", market_id, e),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_market, seed_stake, seed_user, MarketSeed};
    use rust_decimal_macros::dec;
    use staking_core::{Market, Stake};

    struct Fixture {
        storage: Arc<StakeStorage>,
        engine: SettlementEngine,
        market: Market,
        stakes: Vec<Stake>,
    }

    /// Market with (U1, yes, 10), (U2, no, 20), (U3, yes, 5)
    fn fixture() -> Fixture {
        let storage = Arc::new(StakeStorage::new_in_memory().unwrap());
        let market = seed_market(&storage, MarketSeed::open());
        let u1 = seed_user(&storage, "0x1");
        let u2 = seed_user(&storage, "0x2");
        let u3 = seed_user(&storage, "0x3");
        let stakes = vec![
            seed_stake(&storage, &u1, &market, Choice::Yes, dec!(10)),
            seed_stake(&storage, &u2, &market, Choice::No, dec!(20)),
            seed_stake(&storage, &u3, &market, Choice::Yes, dec!(5)),
        ];
        let engine = SettlementEngine::new(storage.clone());
        Fixture {
            storage,
            engine,
            market,
            stakes,
        }
    }

    fn status_of(storage: &StakeStorage, stake: &Stake) -> StakeStatus {
        storage
            .read(|q| q.find_stake(&stake.user_id, &stake.market_id))
            .unwrap()
            .unwrap()
            .status
    }

    #[test]
    fn test_settle_marks_winners_and_losers() {
        let f = fixture();

        let report = f.engine.settle(&f.market.id, Choice::Yes).unwrap();
        assert_eq!(report.won, 2);
        assert_eq!(report.lost, 1);
        assert_eq!(report.stats.total_amount, dec!(35));

        assert_eq!(status_of(&f.storage, &f.stakes[0]), StakeStatus::Won);
        assert_eq!(status_of(&f.storage, &f.stakes[1]), StakeStatus::Lost);
        assert_eq!(status_of(&f.storage, &f.stakes[2]), StakeStatus::Won);

        let market = f.storage.read(|q| q.get_market(&f.market.id)).unwrap().unwrap();
        assert!(!market.is_active);
    }

    #[test]
    fn test_second_settlement_is_rejected() {
        let f = fixture();
        f.engine.settle(&f.market.id, Choice::Yes).unwrap();

        let again = f.engine.settle(&f.market.id, Choice::No);
        assert_eq!(again, Err(StakeError::invalid_state("Market already closed")));

        assert_eq!(status_of(&f.storage, &f.stakes[0]), StakeStatus::Won);
        assert_eq!(status_of(&f.storage, &f.stakes[1]), StakeStatus::Lost);
        assert_eq!(status_of(&f.storage, &f.stakes[2]), StakeStatus::Won);
    }

    #[test]
    fn test_no_pending_stakes_remain() {
        let f = fixture();
        f.engine.settle(&f.market.id, Choice::No).unwrap();

        let stakes = f.storage.read(|q| q.stakes_for_market(&f.market.id)).unwrap();
        for stake in stakes {
            let expected = if stake.choice == Choice::No {
                StakeStatus::Won
            } else {
                StakeStatus::Lost
            };
            assert_eq!(stake.status, expected);
        }
    }

    #[test]
    fn test_unknown_market() {
        let f = fixture();
        let result = f.engine.settle("missing", Choice::Yes);
        assert_eq!(result, Err(StakeError::not_found("Market not found")));
    }

    #[test]
    fn test_failure_while_closing_leaves_market_open() {
        let f = fixture();
        f.storage
            .execute_batch(
                r#"
                CREATE TRIGGER fail_close BEFORE UPDATE OF is_active ON markets
                BEGIN
                    SELECT RAISE(ABORT, 'disk on fire');
                END;
                "#,
            )
            .unwrap();

        let result = f.engine.settle(&f.market.id, Choice::Yes);
        assert!(matches!(result, Err(StakeError::Storage(_))));

        for stake in &f.stakes {
            assert_eq!(status_of(&f.storage, stake), StakeStatus::Pending);
        }
        let market = f.storage.read(|q| q.get_market(&f.market.id)).unwrap().unwrap();
        assert!(market.is_active);

        // Once the fault clears, the retry goes through
        f.storage.execute_batch("DROP TRIGGER fail_close;").unwrap();
        let report = f.engine.settle(&f.market.id, Choice::Yes).unwrap();
        assert_eq!((report.won, report.lost), (2, 1));
    }

    #[test]
    fn test_unreadable_stake_rolls_back_settlement() {
        let f = fixture();
        let u4 = seed_user(&f.storage, "0x4");
        f.storage
            .execute_batch(&format!(
                "INSERT INTO stakes (id, user_id, market_id, amount, choice, status, created_at) \
                 VALUES ('garbled', '{}', '{}', 'not-a-number', 'no', 'pending', 0);",
                u4.id, f.market.id
            ))
            .unwrap();

        // Every write succeeds, then the report read fails
        let result = f.engine.settle(&f.market.id, Choice::Yes);
        assert!(matches!(result, Err(StakeError::Storage(_))));

        for stake in &f.stakes {
            assert_eq!(status_of(&f.storage, stake), StakeStatus::Pending);
        }
        let market = f.storage.read(|q| q.get_market(&f.market.id)).unwrap().unwrap();
        assert!(market.is_active);
    }

    #[test]
    fn test_settles_market_without_stakes() {
        let storage = Arc::new(StakeStorage::new_in_memory().unwrap());
        let market = seed_market(&storage, MarketSeed::open());
        let engine = SettlementEngine::new(storage.clone());

        let report = engine.settle(&market.id, Choice::No).unwrap();
        assert_eq!((report.won, report.lost), (0, 0));
        assert_eq!(report.stats, MarketStats::default());
    }
}
