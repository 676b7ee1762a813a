//! Market Service
//!
//! Operator-side market and category management, plus the market views the
//! listing and detail pages read (each market with its live statistics).

use chrono::Utc;
use staking_core::{
    Category, CategorySummary, Market, MarketFilter, MarketWithStats, NewCategory, NewMarket,
    StakeError, StakeResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::aggregation::StakeAggregator;
use crate::storage::StakeStorage;

pub struct MarketService {
    storage: Arc<StakeStorage>,
    aggregator: Arc<StakeAggregator>,
}

impl MarketService {
    pub fn new(storage: Arc<StakeStorage>, aggregator: Arc<StakeAggregator>) -> Self {
        Self {
            storage,
            aggregator,
        }
    }

    /// Create a market; new markets start active
    pub fn create_market(&self, request: NewMarket) -> StakeResult<Market> {
        let market = request.validate()?;
        let now = Utc::now();

        let created = self.storage.transaction(|q| {
            if let Some(category_id) = &market.category_id {
                if !q.category_exists(category_id)? {
                    return Err(StakeError::not_found(format!(
                        "Category not found: {}",
                        category_id
                    )));
                }
            }
            Ok(q.insert_market(&market, now)?)
        })?;

        info!("Created market {}: {}", created.id, created.title);
        Ok(created)
    }

    /// One market with its category and statistics
    pub fn get_market(&self, market_id: &str) -> StakeResult<MarketWithStats> {
        let (market, categories) = self.storage.read(|q| {
            let market = q
                .get_market(market_id)?
                .ok_or_else(|| StakeError::not_found("Market not found"))?;
            Ok::<_, StakeError>((market, category_index(q.list_categories()?)))
        })?;
        let stats = self.aggregator.aggregate(market_id)?;
        Ok(MarketWithStats {
            category: summary_for(&market, &categories),
            market,
            stats,
        })
    }

    /// Every market matching `filter`, newest first, with categories and statistics
    pub fn list_markets(&self, filter: MarketFilter) -> StakeResult<Vec<MarketWithStats>> {
        let (markets, categories) = self.storage.read(|q| {
            let markets: Vec<Market> = q
                .list_markets()?
                .into_iter()
                .filter(|m| filter.matches(m))
                .collect();
            Ok::<_, StakeError>((markets, category_index(q.list_categories()?)))
        })?;

        let mut listed = self.aggregator.with_stats(markets)?;
        for entry in &mut listed {
            entry.category = summary_for(&entry.market, &categories);
        }
        Ok(listed)
    }

    pub fn create_category(&self, request: NewCategory) -> StakeResult<Category> {
        let (name, description) = request.validate()?;
        let category = self
            .storage
            .transaction(|q| q.insert_category(&name, description.as_deref(), Utc::now()))?;
        info!("Created category {}: {}", category.id, category.name);
        Ok(category)
    }

    pub fn list_categories(&self) -> StakeResult<Vec<Category>> {
        Ok(self.storage.read(|q| q.list_categories())?)
    }
}

fn category_index(categories: Vec<Category>) -> HashMap<String, Category> {
    categories.into_iter().map(|c| (c.id.clone(), c)).collect()
}

fn summary_for(market: &Market, categories: &HashMap<String, Category>) -> Option<CategorySummary> {
    market
        .category_id
        .as_ref()
        .and_then(|id| categories.get(id))
        .map(CategorySummary::from)
}
