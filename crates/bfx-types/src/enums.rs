//! Channel, Precision, Frequency, Side and OrderType enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Public WebSocket channels
///
/// The authenticated account channel is not listed here: it always lives on
/// channel ID 0 and is never subscribed to explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Ticker channel - best bid/ask, last price, daily stats
    Ticker,
    /// Trades channel - executed public trades
    Trades,
    /// Book channel - aggregated or raw order book
    Book,
    /// Candles channel - OHLCV data keyed by `trade:<tf>:<symbol>`
    Candles,
    /// Status channel - derivatives and liquidation feeds
    Status,
}

impl Channel {
    /// Returns the channel name as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Trades => "trades",
            Self::Book => "book",
            Self::Candles => "candles",
            Self::Status => "status",
        }
    }

    /// Parse a channel name as echoed by the `subscribed` event
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ticker" => Some(Self::Ticker),
            "trades" => Some(Self::Trades),
            "book" => Some(Self::Book),
            "candles" => Some(Self::Candles),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    /// Returns true if the channel is addressed by `key` rather than `symbol`
    pub fn is_keyed(&self) -> bool {
        matches!(self, Self::Candles | Self::Status)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order book aggregation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Precision {
    /// Five significant figures
    #[default]
    P0,
    /// Four significant figures
    P1,
    /// Three significant figures
    P2,
    /// Two significant figures
    P3,
    /// One significant figure
    P4,
    /// Raw book (individual orders, no aggregation)
    R0,
}

impl Precision {
    /// Returns the precision as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
            Self::R0 => "R0",
        }
    }

    /// Parse a precision string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            "P4" => Some(Self::P4),
            "R0" => Some(Self::R0),
            _ => None,
        }
    }

    /// Returns true for the raw (order-level) book
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::R0)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Book update frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Frequency {
    /// Realtime
    #[default]
    F0,
    /// Every two seconds
    F1,
}

impl Frequency {
    /// Returns the frequency as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F0 => "F0",
            Self::F1 => "F1",
        }
    }
}

/// Number of price points per book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BookLength {
    /// Top of book only
    L1 = 1,
    /// 25 price points
    #[default]
    L25 = 25,
    /// 100 price points
    L100 = 100,
    /// 250 price points
    L250 = 250,
}

impl BookLength {
    /// Returns the length as a u32
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Returns the length as the string the exchange expects
    pub fn as_wire(&self) -> String {
        self.as_u32().to_string()
    }
}

/// Order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Buy side, best (highest) price first
    Bid,
    /// Sell side, best (lowest) price first
    Ask,
}

impl BookSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

/// Order types accepted by the `on` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "STOP LIMIT")]
    StopLimit,
    #[serde(rename = "TRAILING STOP")]
    TrailingStop,
    #[serde(rename = "FOK")]
    FillOrKill,
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    #[serde(rename = "EXCHANGE LIMIT")]
    ExchangeLimit,
    #[serde(rename = "EXCHANGE MARKET")]
    ExchangeMarket,
    #[serde(rename = "EXCHANGE STOP")]
    ExchangeStop,
    #[serde(rename = "EXCHANGE STOP LIMIT")]
    ExchangeStopLimit,
    #[serde(rename = "EXCHANGE TRAILING STOP")]
    ExchangeTrailingStop,
    #[serde(rename = "EXCHANGE FOK")]
    ExchangeFillOrKill,
    #[serde(rename = "EXCHANGE IOC")]
    ExchangeImmediateOrCancel,
}

impl OrderType {
    /// Returns true for orders placed against the exchange (non-margin) wallet
    pub fn is_exchange(&self) -> bool {
        matches!(
            self,
            Self::ExchangeLimit
                | Self::ExchangeMarket
                | Self::ExchangeStop
                | Self::ExchangeStopLimit
                | Self::ExchangeTrailingStop
                | Self::ExchangeFillOrKill
                | Self::ExchangeImmediateOrCancel
        )
    }
}

/// Flags for the `conf` event
///
/// Combine with bitwise OR and send once per connection.
pub mod conf_flags {
    /// Enable all decimal as strings
    pub const DEC_S: i64 = 8;
    /// Enable all times as date strings
    pub const TIME_S: i64 = 32;
    /// Timestamp in milliseconds appended to every frame
    pub const TIMESTAMP: i64 = 32768;
    /// Sequence number appended to every frame
    pub const SEQ_ALL: i64 = 65536;
    /// Periodic `cs` checksum frames for every book subscription
    pub const CHECKSUM: i64 = 131072;
    /// Book updates delivered as arrays of updates
    pub const BULK_UPDATES: i64 = 536870912;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trip_names() {
        for channel in [
            Channel::Ticker,
            Channel::Trades,
            Channel::Book,
            Channel::Candles,
            Channel::Status,
        ] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("level3"), None);
    }

    #[test]
    fn test_keyed_channels() {
        assert!(Channel::Candles.is_keyed());
        assert!(Channel::Status.is_keyed());
        assert!(!Channel::Book.is_keyed());
    }

    #[test]
    fn test_precision() {
        assert_eq!(Precision::parse("R0"), Some(Precision::R0));
        assert!(Precision::R0.is_raw());
        assert!(!Precision::P2.is_raw());
        assert_eq!(Precision::default().as_str(), "P0");
    }

    #[test]
    fn test_order_type_serialization() {
        let json = serde_json::to_string(&OrderType::ExchangeLimit).unwrap();
        assert_eq!(json, r#""EXCHANGE LIMIT""#);
        assert!(OrderType::ExchangeLimit.is_exchange());
        assert!(!OrderType::Limit.is_exchange());
    }

    #[test]
    fn test_book_length_wire() {
        assert_eq!(BookLength::L100.as_wire(), "100");
        assert_eq!(BookLength::default(), BookLength::L25);
    }
}
