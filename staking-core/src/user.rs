//! User identities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StakeError, StakeResult};

/// A staking participant, keyed 1:1 by wallet address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to register a user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewUser {
    /// A user registered only by wallet, as on a first staking attempt
    pub fn from_wallet(wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: Some(wallet_address.into()),
            ..Self::default()
        }
    }

    /// Trims every field and requires an email or a wallet address
    pub fn validate(self) -> StakeResult<NewUser> {
        let user = NewUser {
            email: trimmed(self.email).map(|e| e.to_lowercase()),
            wallet_address: trimmed(self.wallet_address).map(|w| normalize_wallet(&w)),
            full_name: trimmed(self.full_name),
            username: trimmed(self.username),
            phone: trimmed(self.phone),
        };

        if user.email.is_none() && user.wallet_address.is_none() {
            return Err(StakeError::validation(
                "Email or wallet address is required",
            ));
        }
        if let Some(email) = &user.email {
            if !email.contains('@') {
                return Err(StakeError::validation(format!("Invalid email: {}", email)));
            }
        }

        Ok(user)
    }
}

/// Hex wallet addresses compare case-insensitively
pub fn normalize_wallet(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("0x") || address.starts_with("0X") {
        address.to_lowercase()
    } else {
        address.to_string()
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
