//! Ticker symbol parsing

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};

const MAX_TICKER_LEN: usize = 10;

/// A validated, upper-cased ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse user input: trim, validate, upper-case.
    ///
    /// Accepts ASCII letters, digits, `.`, `-`, and `^` (index symbols such
    /// as `^GSPC`), at most 10 characters, with at least one letter.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        let valid_chars = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'));
        let has_letter = trimmed.chars().any(|c| c.is_ascii_alphabetic());

        if trimmed.is_empty() || trimmed.len() > MAX_TICKER_LEN || !valid_chars || !has_letter {
            return Err(MarketError::InvalidSymbol(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Ticker {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}
