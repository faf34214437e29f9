//! WebSocket endpoint definitions

use std::fmt;

/// Bitfinex WebSocket API v2 endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Public market data (default)
    #[default]
    Public,
    /// Account channel and trading; serves public channels too
    Authenticated,
}

impl Endpoint {
    /// Get the WebSocket URL for this endpoint
    pub fn url(&self) -> &'static str {
        match self {
            Self::Public => "wss://api-pub.bitfinex.com/ws/2",
            Self::Authenticated => "wss://api.bitfinex.com/ws/2",
        }
    }

    /// Check if this endpoint accepts `auth` requests
    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(Endpoint::Public.url(), "wss://api-pub.bitfinex.com/ws/2");
        assert_eq!(Endpoint::Authenticated.url(), "wss://api.bitfinex.com/ws/2");
        assert_eq!(Endpoint::default(), Endpoint::Public);
    }

    #[test]
    fn test_requires_auth() {
        assert!(!Endpoint::Public.requires_auth());
        assert!(Endpoint::Authenticated.requires_auth());
    }
}
