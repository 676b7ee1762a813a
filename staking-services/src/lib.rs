//! Business logic services for the staking ledger
//!
//! This crate owns the persistence layer and the three components that
//! maintain the ledger's invariants:
//!
//! - [`StakeAdmission`] decides whether a stake may be recorded
//! - [`StakeAggregator`] derives per-market statistics on read
//! - [`SettlementEngine`] resolves a market exactly once
//!
//! [`MarketService`] and [`UserService`] cover the surrounding CRUD.

pub mod admission;
pub mod aggregation;
pub mod market_service;
pub mod settlement;
pub mod storage;
pub mod user_service;

#[cfg(test)]
mod testing;

pub use admission::{AdmissionPolicy, StakeAdmission};
pub use aggregation::StakeAggregator;
pub use market_service::MarketService;
pub use settlement::{SettlementEngine, SettlementReport};
pub use storage::{Queries, StakeStorage, StorageError};
pub use user_service::{
    Portfolio, StakeMarket, StakeOwner, StakeView, UserService, WalletStake,
};
