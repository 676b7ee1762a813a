//! Operator authentication
//!
//! Operator routes (market creation, categories, settlement) require an
//! `Authorization: Bearer <token>` header matching the configured token.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use staking_core::{StakeError, StakeResult};

use crate::error::ApiError;
use crate::AppState;

pub struct OperatorAuth {
    token: Option<String>,
}

impl OperatorAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Check the request headers for a valid operator token
    pub fn authorize(&self, headers: &HeaderMap) -> StakeResult<()> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| StakeError::unauthorized("No token provided"))?
            .to_str()
            .map_err(|_| StakeError::unauthorized("Invalid authentication"))?;

        let presented = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| StakeError::unauthorized("Invalid authentication"))?;

        match &self.token {
            Some(expected) if constant_time_eq(expected.as_bytes(), presented.trim().as_bytes()) => {
                Ok(())
            }
            _ => Err(StakeError::forbidden("Invalid token")),
        }
    }
}

/// Extractor that only succeeds for an authenticated operator
///
/// Listed before any body extractor so that unauthenticated requests are
/// rejected before their payload is looked at.
pub struct Operator;

impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.operator.authorize(&parts.headers)?;
        Ok(Operator)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
