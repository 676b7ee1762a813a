//! Core types for the prediction-market staking ledger
//!
//! This crate defines the shared data structures used across the ledger:
//! markets and categories, users, stakes, derived market statistics and
//! the error taxonomy every operation reports through.

pub mod error;
pub mod market;
pub mod stake;
pub mod stats;
pub mod user;

pub use error::{StakeError, StakeResult};
pub use market::{
    Category, CategorySummary, Market, MarketFilter, MarketState, NewCategory, NewMarket,
    ValidMarket,
};
pub use stake::{
    Choice, NewStake, SettlementRequest, Stake, StakeFilter, StakeRequest, StakeStatus,
};
pub use stats::{MarketStats, MarketWithStats, Position, PositionSummary};
pub use user::{normalize_wallet, NewUser, User};
