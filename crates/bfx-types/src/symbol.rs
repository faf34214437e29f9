//! Trading and funding symbols (`tBTCUSD`, `fUSD`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange symbol
///
/// Trading pairs carry a `t` prefix, funding currencies an `f` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// BTC/USD trading pair
    pub const BTC_USD: &'static str = "tBTCUSD";
    /// ETH/USD trading pair
    pub const ETH_USD: &'static str = "tETHUSD";
    /// USD funding currency
    pub const FUND_USD: &'static str = "fUSD";

    /// Create a new symbol without validation
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for funding symbols (`f` prefix)
    pub fn is_funding(&self) -> bool {
        is_funding_symbol(&self.0)
    }

    /// Returns true for trading symbols (`t` prefix)
    pub fn is_trading(&self) -> bool {
        self.0.starts_with('t')
    }

    /// Symbol without its type prefix (`BTCUSD`, `USD`)
    pub fn unprefixed(&self) -> &str {
        self.0.get(1..).unwrap_or_default()
    }
}

/// Returns true if a raw symbol string names a funding currency
pub fn is_funding_symbol(symbol: &str) -> bool {
    symbol.starts_with('f')
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some('t') | Some('f') => {}
            _ => return Err(SymbolParseError::MissingPrefix(s.to_string())),
        }
        if chars.as_str().is_empty() {
            return Err(SymbolParseError::Empty(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Symbol parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolParseError {
    #[error("symbol must start with 't' (trading) or 'f' (funding): {0}")]
    MissingPrefix(String),
    #[error("symbol has no pair or currency after its prefix: {0}")]
    Empty(String),
}
