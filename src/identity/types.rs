//! Identity types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::resilience::timeouts::DeadlineExceeded;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    /// Parse a stored tier name. Only `pro` (any case) is Pro; anything else,
    /// including unknown names, degrades to Free.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("pro") {
            Tier::Pro
        } else {
            Tier::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub tier: Tier,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, tier: Tier) -> Self {
        Self {
            user_id: user_id.into(),
            tier,
        }
    }
}

/// A row in the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub api_key: String,
    pub user_id: String,
    pub tier: Tier,
}

/// Errors from the source-of-truth store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("database timeout after {0} ms")]
    Timeout(u64),
}

impl From<DeadlineExceeded> for SourceError {
    fn from(elapsed: DeadlineExceeded) -> Self {
        SourceError::Timeout(elapsed.millis())
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => SourceError::Timeout(0),
            other => SourceError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing_is_lenient() {
        assert_eq!(Tier::parse_lenient("pro"), Tier::Pro);
        assert_eq!(Tier::parse_lenient(" PRO "), Tier::Pro);
        assert_eq!(Tier::parse_lenient("free"), Tier::Free);
        assert_eq!(Tier::parse_lenient("enterprise"), Tier::Free);
        assert_eq!(Tier::parse_lenient(""), Tier::Free);
    }

    #[test]
    fn test_tier_round_trips_through_display() {
        for tier in [Tier::Free, Tier::Pro] {
            assert_eq!(Tier::parse_lenient(&tier.to_string()), tier);
        }
        assert_eq!(Tier::default(), Tier::Free);
    }
}
