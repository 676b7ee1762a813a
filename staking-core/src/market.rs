//! Market and category data structures

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StakeError, StakeResult};

/// Lifecycle state of a market, derived from its `is_active` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketState {
    /// Accepting stakes (inside its window), stakes pending
    Open,
    /// Settled by an operator; every stake is won or lost
    Settled,
}

/// A binary (Yes/No) prediction market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Opaque unique identifier
    pub id: String,

    /// Human-readable title/question
    pub title: String,

    /// Detailed description of the market
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    /// Smallest stake accepted
    pub min_stake: Decimal,

    /// Largest stake accepted
    pub max_stake: Decimal,

    /// When staking opens
    pub start_date: DateTime<Utc>,

    /// When staking closes
    pub end_date: DateTime<Utc>,

    /// Cleared exactly once, by settlement
    pub is_active: bool,

    /// Featured on the landing page
    #[serde(default)]
    pub trending: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Market {
    pub fn state(&self) -> MarketState {
        if self.is_active {
            MarketState::Open
        } else {
            MarketState::Settled
        }
    }

    /// Whether `now` lies inside the inclusive staking window
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }

    /// Whether `amount` respects the configured stake bounds
    pub fn accepts_amount(&self, amount: Decimal) -> bool {
        self.min_stake <= amount && amount <= self.max_stake
    }
}

/// Operator request to create a market
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMarket {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    pub min_stake: Option<Decimal>,
    pub max_stake: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trending: bool,
}

/// A `NewMarket` whose fields have all been checked
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMarket {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trending: bool,
}

impl NewMarket {
    pub fn validate(self) -> StakeResult<ValidMarket> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StakeError::validation("Title is required"))?;
        let min_stake = self
            .min_stake
            .ok_or_else(|| StakeError::validation("min_stake is required"))?;
        let max_stake = self
            .max_stake
            .ok_or_else(|| StakeError::validation("max_stake is required"))?;
        let start_date = self
            .start_date
            .ok_or_else(|| StakeError::validation("start_date is required"))?;
        let end_date = self
            .end_date
            .ok_or_else(|| StakeError::validation("end_date is required"))?;

        if min_stake <= Decimal::ZERO {
            return Err(StakeError::validation("min_stake must be positive"));
        }
        if min_stake > max_stake {
            return Err(StakeError::validation(
                "min_stake must not exceed max_stake",
            ));
        }
        if start_date > end_date {
            return Err(StakeError::validation(
                "start_date must not be after end_date",
            ));
        }

        Ok(ValidMarket {
            title,
            description: self.description,
            category_id: self.category_id.filter(|c| !c.is_empty()),
            min_stake,
            max_stake,
            start_date,
            end_date,
            trending: self.trending,
        })
    }
}

/// Listing filter for markets
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MarketFilter {
    pub active: Option<bool>,
    pub trending: Option<bool>,
}

impl MarketFilter {
    pub fn matches(&self, market: &Market) -> bool {
        self.active.is_none_or(|a| a == market.is_active)
            && self.trending.is_none_or(|t| t == market.trending)
    }
}

/// A market category (e.g. "Crypto", "Sports")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Category reference embedded in market views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
        }
    }
}

/// Operator request to create a category
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCategory {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    /// Returns the trimmed name and description
    pub fn validate(self) -> StakeResult<(String, Option<String>)> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StakeError::validation("Name is required"))?;
        Ok((name, self.description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn new_market() -> NewMarket {
        let now = Utc::now();
        NewMarket {
            title: Some("Will BTC close above 100k?".to_string()),
            description: None,
            category_id: None,
            min_stake: Some(dec!(1)),
            max_stake: Some(dec!(1000)),
            start_date: Some(now - Duration::hours(1)),
            end_date: Some(now + Duration::hours(1)),
            trending: false,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_market() {
        let valid = new_market().validate().unwrap();
        assert_eq!(valid.title, "Will BTC close above 100k?");
        assert_eq!(valid.min_stake, dec!(1));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut market = new_market();
        std::mem::swap(&mut market.start_date, &mut market.end_date);
        assert!(matches!(market.validate(), Err(StakeError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut market = new_market();
        market.min_stake = Some(dec!(50));
        market.max_stake = Some(dec!(10));
        assert!(matches!(market.validate(), Err(StakeError::Validation(_))));

        let mut market = new_market();
        market.min_stake = Some(dec!(0));
        assert!(matches!(market.validate(), Err(StakeError::Validation(_))));
    }

    #[test]
    fn test_validate_requires_title() {
        let mut market = new_market();
        market.title = Some("   ".to_string());
        assert_eq!(
            market.validate(),
            Err(StakeError::validation("Title is required"))
        );
    }

    #[test]
    fn test_window_is_inclusive() {
        let valid = new_market().validate().unwrap();
        let now = Utc::now();
        let market = Market {
            id: "m1".to_string(),
            title: valid.title,
            description: None,
            category_id: None,
            min_stake: valid.min_stake,
            max_stake: valid.max_stake,
            start_date: valid.start_date,
            end_date: valid.end_date,
            is_active: true,
            trending: false,
            created_at: now,
            updated_at: now,
        };
        assert!(market.is_within_window(market.start_date));
        assert!(market.is_within_window(market.end_date));
        assert!(!market.is_within_window(market.end_date + Duration::milliseconds(1)));
        assert_eq!(market.state(), MarketState::Open);
    }

    #[test]
    fn test_new_category_rejects_unknown_fields() {
        let parsed: Result<NewCategory, _> =
            serde_json::from_str(r#"{"name":"Crypto","colour":"red"}"#);
        assert!(parsed.is_err());
    }
}
