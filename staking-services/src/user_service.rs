//! User Service
//!
//! Wallet-keyed user registration and the per-user stake views: stake
//! listings, a wallet's stake on one market, and portfolio positions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use staking_core::{
    normalize_wallet, Market, MarketStats, NewUser, Position, PositionSummary, Stake,
    StakeError, StakeFilter, StakeResult, User,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::aggregation::StakeAggregator;
use crate::storage::StakeStorage;

/// Whether a wallet holds a stake on a market
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStake {
    pub has_staked: bool,
    pub registered: bool,
    pub stake: Option<Stake>,
}

/// Owner fields listed next to a stake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeOwner {
    pub email: Option<String>,
    pub username: Option<String>,
    pub wallet_address: Option<String>,
}

/// Market fields listed next to a stake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeMarket {
    pub title: String,
    pub category_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// A stake joined with its owner and market
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeView {
    #[serde(flatten)]
    pub stake: Stake,
    pub user: Option<StakeOwner>,
    pub market: Option<StakeMarket>,
}

/// A user's positions plus their totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub positions: Vec<Position>,
    pub summary: PositionSummary,
}

pub struct UserService {
    storage: Arc<StakeStorage>,
    aggregator: Arc<StakeAggregator>,
}

impl UserService {
    pub fn new(storage: Arc<StakeStorage>, aggregator: Arc<StakeAggregator>) -> Self {
        Self {
            storage,
            aggregator,
        }
    }

    pub fn find_by_wallet(&self, wallet_address: &str) -> StakeResult<User> {
        let wallet = normalize_wallet(wallet_address);
        if wallet.is_empty() {
            return Err(StakeError::validation("Wallet address is required"));
        }
        self.storage
            .read(|q| q.find_user_by_wallet(&wallet))?
            .ok_or_else(|| StakeError::not_found("User not found"))
    }

    /// Register a user; duplicate email or wallet is a conflict
    pub fn create_user(&self, request: NewUser) -> StakeResult<User> {
        let user = request.validate()?;

        let created = self.storage.transaction(|q| {
            if let Some(email) = &user.email {
                if q.find_user_by_email(email)?.is_some() {
                    return Err(StakeError::conflict("Email already exists"));
                }
            }
            if let Some(wallet) = &user.wallet_address {
                if q.find_user_by_wallet(wallet)?.is_some() {
                    return Err(StakeError::conflict("Wallet address already registered"));
                }
            }
            Ok(q.insert_user(&user, Utc::now())?)
        })?;

        info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Look up the user behind a wallet, registering it on first sight
    ///
    /// Returns the user and whether it was created by this call.
    pub fn get_or_create_by_wallet(&self, wallet_address: &str) -> StakeResult<(User, bool)> {
        let request = NewUser::from_wallet(wallet_address).validate()?;
        let wallet = request
            .wallet_address
            .clone()
            .ok_or_else(|| StakeError::validation("Wallet address is required"))?;

        let (user, created) = self.storage.transaction(|q| {
            if let Some(existing) = q.find_user_by_wallet(&wallet)? {
                return Ok::<_, StakeError>((existing, false));
            }
            Ok((q.insert_user(&request, Utc::now())?, true))
        })?;

        if created {
            info!("Registered user {} for wallet {}", user.id, wallet);
        }
        Ok((user, created))
    }

    /// Stakes matching `filter`, each joined with its owner and market
    ///
    /// Owners and markets come from one batch read each.
    pub fn list_stakes(&self, filter: &StakeFilter) -> StakeResult<Vec<StakeView>> {
        let (stakes, users, markets) = self.storage.read(|q| {
            let stakes = q.list_stakes(filter)?;
            let users: HashMap<String, User> =
                q.list_users()?.into_iter().map(|u| (u.id.clone(), u)).collect();
            let markets: HashMap<String, Market> =
                q.list_markets()?.into_iter().map(|m| (m.id.clone(), m)).collect();
            Ok::<_, StakeError>((stakes, users, markets))
        })?;

        Ok(stakes
            .into_iter()
            .map(|stake| StakeView {
                user: users.get(&stake.user_id).map(|u| StakeOwner {
                    email: u.email.clone(),
                    username: u.username.clone(),
                    wallet_address: u.wallet_address.clone(),
                }),
                market: markets.get(&stake.market_id).map(|m| StakeMarket {
                    title: m.title.clone(),
                    category_id: m.category_id.clone(),
                    start_date: m.start_date,
                    end_date: m.end_date,
                }),
                stake,
            })
            .collect())
    }

    /// A wallet's stake on one market; unregistered wallets have none
    pub fn stake_for_wallet(&self, market_id: &str, wallet_address: &str) -> StakeResult<WalletStake> {
        let wallet = normalize_wallet(wallet_address);
        if wallet.is_empty() {
            return Err(StakeError::validation("Wallet address is required"));
        }

        self.storage.read(|q| {
            let Some(user) = q.find_user_by_wallet(&wallet)? else {
                return Ok(WalletStake {
                    has_staked: false,
                    registered: false,
                    stake: None,
                });
            };
            let stake = q.find_stake(&user.id, market_id)?;
            Ok(WalletStake {
                has_staked: stake.is_some(),
                registered: true,
                stake,
            })
        })
    }

    /// Every stake a user holds, with market titles and payouts
    pub fn portfolio(&self, user_id: &str) -> StakeResult<Portfolio> {
        let (stakes, markets) = self.storage.read(|q| {
            if q.get_user(user_id)?.is_none() {
                return Err(StakeError::not_found("User not found"));
            }
            let stakes = q.list_stakes(&StakeFilter {
                user_id: Some(user_id.to_string()),
                market_id: None,
            })?;
            let markets: HashMap<String, _> = q
                .list_markets()?
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect();
            Ok((stakes, markets))
        })?;

        let stats = self.aggregator.aggregate_all()?;
        let empty = MarketStats::default();

        let positions = stakes
            .into_iter()
            .map(|stake| {
                let market = markets.get(&stake.market_id);
                let payout = stats.get(&stake.market_id).unwrap_or(&empty).payout_for(&stake)?;
                Ok(Position {
                    market_title: market.map(|m| m.title.clone()).unwrap_or_default(),
                    market_active: market.is_some_and(|m| m.is_active),
                    payout,
                    stake,
                })
            })
            .collect::<StakeResult<Vec<Position>>>()?;
        let summary = PositionSummary::from_positions(&positions)?;

        Ok(Portfolio { positions, summary })
    }
}
