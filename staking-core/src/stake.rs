//! Stake records and the request types that create or resolve them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{StakeError, StakeResult};

/// Side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Yes,
    No,
}

impl Choice {
    /// Canonical lowercase form, as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Yes => "yes",
            Choice::No => "no",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Choice {
    type Err = StakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(Choice::Yes),
            "no" => Ok(Choice::No),
            _ => Err(StakeError::validation(format!(
                "Choice must be \"yes\" or \"no\", got \"{}\"",
                s
            ))),
        }
    }
}

/// Outcome status of a stake
///
/// Starts at `Pending` and moves exactly once to `Won` or `Lost`, only
/// through settlement of the owning market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    #[default]
    Pending,
    Won,
    Lost,
}

impl StakeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StakeStatus::Pending => "pending",
            StakeStatus::Won => "won",
            StakeStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for StakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StakeStatus {
    type Err = StakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StakeStatus::Pending),
            "won" => Ok(StakeStatus::Won),
            "lost" => Ok(StakeStatus::Lost),
            _ => Err(StakeError::validation(format!("Unknown stake status: {}", s))),
        }
    }
}

/// One user's single position on one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stake {
    pub id: String,
    pub user_id: String,
    pub market_id: String,
    pub amount: Decimal,
    pub choice: Choice,
    pub status: StakeStatus,
    pub created_at: DateTime<Utc>,
}

/// Incoming stake placement, as sent by the client
///
/// Every field is optional at the wire level so that a missing field is
/// reported as a validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StakeRequest {
    pub user_id: Option<String>,
    pub market_id: Option<String>,
    pub amount: Option<Decimal>,
    pub choice: Option<String>,
}

/// A stake placement that passed field validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStake {
    pub user_id: String,
    pub market_id: String,
    pub amount: Decimal,
    pub choice: Choice,
}

impl StakeRequest {
    pub fn validate(self) -> StakeResult<NewStake> {
        let user_id = non_empty(self.user_id);
        let market_id = non_empty(self.market_id);
        let choice = non_empty(self.choice);

        let (Some(user_id), Some(market_id), Some(amount), Some(choice)) =
            (user_id, market_id, self.amount, choice)
        else {
            return Err(StakeError::validation("Missing required fields"));
        };

        if amount <= Decimal::ZERO {
            return Err(StakeError::validation("Amount must be positive"));
        }

        Ok(NewStake {
            user_id,
            market_id,
            amount: amount.normalize(),
            choice: choice.parse()?,
        })
    }
}

/// Operator request to settle a market
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettlementRequest {
    pub winning_choice: Option<String>,
}

impl SettlementRequest {
    pub fn validate(self) -> StakeResult<Choice> {
        non_empty(self.winning_choice)
            .ok_or_else(|| StakeError::validation("Winning choice is required"))?
            .parse()
    }
}

/// Listing filter for stakes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StakeFilter {
    pub user_id: Option<String>,
    pub market_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_choice_parsing_is_case_insensitive() {
        assert_eq!("YES".parse::<Choice>().unwrap(), Choice::Yes);
        assert_eq!(" No ".parse::<Choice>().unwrap(), Choice::No);
        assert!("maybe".parse::<Choice>().is_err());
    }

    #[test]
    fn test_stake_request_requires_every_field() {
        let request = StakeRequest {
            user_id: Some("u1".to_string()),
            market_id: Some("m1".to_string()),
            amount: None,
            choice: Some("yes".to_string()),
        };
        assert_eq!(
            request.validate(),
            Err(StakeError::validation("Missing required fields"))
        );
    }

    #[test]
    fn test_stake_request_rejects_non_positive_amount() {
        let request = StakeRequest {
            user_id: Some("u1".to_string()),
            market_id: Some("m1".to_string()),
            amount: Some(dec!(0)),
            choice: Some("yes".to_string()),
        };
        assert!(matches!(request.validate(), Err(StakeError::Validation(_))));
    }

    #[test]
    fn test_stake_request_normalizes_choice() {
        let request: StakeRequest = serde_json::from_str(
            r#"{"user_id":"u1","market_id":"m1","amount":"10.50","choice":"Yes"}"#,
        )
        .unwrap();
        let stake = request.validate().unwrap();
        assert_eq!(stake.choice, Choice::Yes);
        assert_eq!(stake.amount, dec!(10.5));
    }

    #[test]
    fn test_stake_request_rejects_unknown_fields() {
        let parsed: Result<StakeRequest, _> = serde_json::from_str(
            r#"{"user_id":"u1","market_id":"m1","amount":1,"choice":"yes","odds":2}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_settlement_request() {
        let request: SettlementRequest =
            serde_json::from_str(r#"{"winningChoice":"NO"}"#).unwrap();
        assert_eq!(request.validate().unwrap(), Choice::No);
        assert!(SettlementRequest::default().validate().is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [StakeStatus::Pending, StakeStatus::Won, StakeStatus::Lost] {
            assert_eq!(status.as_str().parse::<StakeStatus>().unwrap(), status);
        }
    }
}
