//! Fixtures shared by the service tests

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use staking_core::{Choice, Market, NewStake, NewUser, Stake, User, ValidMarket};

use crate::storage::StakeStorage;

/// Shape of a seeded market relative to now
pub struct MarketSeed {
    pub starts_in: Duration,
    pub ends_in: Duration,
    pub min_stake: Decimal,
    pub max_stake: Decimal,
}

impl MarketSeed {
    /// Window `[now - 1h, now + 1h]`, stake bounds `[1, 1000]`
    pub fn open() -> Self {
        Self {
            starts_in: Duration::hours(-1),
            ends_in: Duration::hours(1),
            min_stake: dec!(1),
            max_stake: dec!(1000),
        }
    }
}

pub fn seed_market(storage: &StakeStorage, seed: MarketSeed) -> Market {
    let now = Utc::now();
    let market = ValidMarket {
        title: "Will ETH flip BTC this year?".to_string(),
        description: None,
        category_id: None,
        min_stake: seed.min_stake,
        max_stake: seed.max_stake,
        start_date: now + seed.starts_in,
        end_date: now + seed.ends_in,
        trending: false,
    };
    storage
        .transaction(|q| q.insert_market(&market, now))
        .unwrap()
}

pub fn seed_user(storage: &StakeStorage, wallet: &str) -> User {
    storage
        .transaction(|q| q.insert_user(&NewUser::from_wallet(wallet), Utc::now()))
        .unwrap()
}

/// Insert a stake directly, bypassing admission
pub fn seed_stake(storage: &StakeStorage, user: &User, market: &Market, choice: Choice, amount: Decimal) -> Stake {
    let stake = NewStake {
        user_id: user.id.clone(),
        market_id: market.id.clone(),
        amount,
        choice,
    };
    storage
        .transaction(|q| q.insert_stake(&stake, Utc::now()))
        .unwrap()
}
