//! Events delivered to the caller
//!
//! Every inbound frame that changes what the caller can observe becomes one
//! variant of [`Event`]. The set is closed: adding a message kind means adding
//! a variant, and every consumer `match` is checked by the compiler.

use crate::subscription::ConnectionId;
use bfx_types::{
    BalanceInfo, BookLevel, Candle, Channel, ChannelId, DerivativeStatus, FundingBookEntry,
    FundingCredit, FundingInfo, FundingLoan, FundingOffer, FundingTrade, FundingTradeExecution,
    Liquidation, MarginInfo, Notification, Order, Position, RawBookEntry, RawFundingBookEntry,
    SubscriptionId, Ticker, Trade, TradeExecution, Wallet,
};
use std::fmt;
use std::time::Duration;

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `close()` was called
    ClientClosed,
    /// Server closed the socket
    ServerClosed,
    /// Read or write failed
    NetworkError(String),
    /// No inbound frame within the heartbeat timeout
    HeartbeatTimeout,
    /// Server sent info code 20051
    ReconnectRequested,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => f.write_str("closed by client"),
            Self::ServerClosed => f.write_str("closed by server"),
            Self::NetworkError(e) => write!(f, "network error: {e}"),
            Self::HeartbeatTimeout => f.write_str("heartbeat timeout"),
            Self::ReconnectRequested => f.write_str("server requested reconnect"),
        }
    }
}

/// Connection lifecycle events
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Socket established
    Connected { url: String },
    /// `info` event (greeting, maintenance notices, reconnect requests)
    Info {
        version: Option<u32>,
        code: Option<i64>,
        message: Option<String>,
    },
    /// `auth` succeeded
    Authenticated { user_id: Option<i64> },
    /// `auth` was rejected
    AuthenticationFailed { code: Option<i64>, message: String },
    /// `conf` acknowledged
    ConfAccepted { flags: i64 },
    /// `pong` reply to an application ping
    Pong { cid: Option<i64>, ts: Option<i64> },
    /// Connection lost
    Disconnected {
        reason: DisconnectReason,
        /// False when this is terminal for the connection
        will_reconnect: bool,
    },
    /// Waiting before a reconnect attempt
    Reconnecting {
        /// 1-indexed
        attempt: u32,
        delay: Duration,
    },
    /// Reconnect attempts exhausted; the connection is gone
    ReconnectFailed { attempts: u32, error: String },
    /// Subscribe requests re-issued after a reconnect
    SubscriptionsRestored { count: usize },
}

/// Subscription lifecycle events
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    Subscribed {
        subscription: SubscriptionId,
        channel_id: ChannelId,
        channel: Channel,
        target: String,
    },
    Unsubscribed {
        subscription: SubscriptionId,
        channel_id: ChannelId,
    },
    /// `error` event for a subscribe request; the entry was removed
    Rejected {
        subscription: SubscriptionId,
        code: i64,
        message: String,
    },
    /// Replayed after a reconnect under a new ID
    Resubscribed {
        previous: SubscriptionId,
        subscription: SubscriptionId,
    },
}

/// Whether a public trade message is the execution or its later correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    /// `te` / `fte`
    Executed,
    /// `tu` / `ftu`
    Updated,
}

impl TradeKind {
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        match mnemonic {
            "te" | "fte" => Some(Self::Executed),
            "tu" | "ftu" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// Decoded public channel data
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Ticker(Ticker),
    TradeSnapshot(Vec<Trade>),
    Trade { kind: TradeKind, trade: Trade },
    FundingTradeSnapshot(Vec<FundingTrade>),
    FundingTrade { kind: TradeKind, trade: FundingTrade },
    BookSnapshot(Vec<BookLevel>),
    BookUpdate(BookLevel),
    FundingBookSnapshot(Vec<FundingBookEntry>),
    FundingBookUpdate(FundingBookEntry),
    RawBookSnapshot(Vec<RawBookEntry>),
    RawBookUpdate(RawBookEntry),
    RawFundingBookSnapshot(Vec<RawFundingBookEntry>),
    RawFundingBookUpdate(RawFundingBookEntry),
    CandleSnapshot(Vec<Candle>),
    Candle(Candle),
    DerivativeStatus(DerivativeStatus),
    Liquidations(Vec<Liquidation>),
    /// Local replica matched the exchange checksum
    ChecksumVerified { checksum: i32 },
    /// Local replica diverged; resubscribe to resync
    ChecksumMismatch { expected: i32, computed: i32 },
}

/// Market data tagged with the subscription it belongs to
#[derive(Debug, Clone)]
pub struct MarketUpdate {
    pub connection: ConnectionId,
    pub subscription: SubscriptionId,
    pub channel_id: ChannelId,
    pub channel: Channel,
    /// Symbol or key of the subscription
    pub target: String,
    pub event: MarketEvent,
}

/// Decoded authenticated channel data, keyed by message mnemonic
#[derive(Debug, Clone)]
pub enum AccountEvent {
    /// `os`
    OrderSnapshot(Vec<Order>),
    /// `on`
    OrderNew(Order),
    /// `ou`
    OrderUpdate(Order),
    /// `oc`
    OrderCancel(Order),
    /// `ps`
    PositionSnapshot(Vec<Position>),
    /// `pn`
    PositionNew(Position),
    /// `pu`
    PositionUpdate(Position),
    /// `pc`
    PositionClose(Position),
    /// `ws`
    WalletSnapshot(Vec<Wallet>),
    /// `wu`
    WalletUpdate(Wallet),
    /// `te`
    TradeExecuted(TradeExecution),
    /// `tu`
    TradeExecutionUpdate(TradeExecution),
    /// `fte`
    FundingTradeExecuted(FundingTradeExecution),
    /// `ftu`
    FundingTradeUpdate(FundingTradeExecution),
    /// `n`
    Notification(Notification),
    /// `fos`
    FundingOfferSnapshot(Vec<FundingOffer>),
    /// `fon`
    FundingOfferNew(FundingOffer),
    /// `fou`
    FundingOfferUpdate(FundingOffer),
    /// `foc`
    FundingOfferCancel(FundingOffer),
    /// `fcs`
    FundingCreditSnapshot(Vec<FundingCredit>),
    /// `fcn`
    FundingCreditNew(FundingCredit),
    /// `fcu`
    FundingCreditUpdate(FundingCredit),
    /// `fcc`
    FundingCreditClose(FundingCredit),
    /// `fls`
    FundingLoanSnapshot(Vec<FundingLoan>),
    /// `fln`
    FundingLoanNew(FundingLoan),
    /// `flu`
    FundingLoanUpdate(FundingLoan),
    /// `flc`
    FundingLoanClose(FundingLoan),
    /// `fiu`
    FundingInfo(FundingInfo),
    /// `miu`
    MarginInfo(MarginInfo),
    /// `bu`
    BalanceInfo(BalanceInfo),
}

/// Unified event type
#[derive(Debug, Clone)]
pub enum Event {
    Connection {
        connection: ConnectionId,
        event: ConnectionEvent,
    },
    Subscription {
        connection: ConnectionId,
        event: SubscriptionEvent,
    },
    Market(MarketUpdate),
    Account {
        connection: ConnectionId,
        event: Box<AccountEvent>,
    },
    /// `hb` on a channel (0 for the account channel)
    Heartbeat {
        connection: ConnectionId,
        channel_id: ChannelId,
    },
    /// `error` event not tied to a pending subscription
    Error {
        connection: ConnectionId,
        code: i64,
        message: String,
    },
}

impl Event {
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::Connection { connection, .. }
            | Self::Subscription { connection, .. }
            | Self::Account { connection, .. }
            | Self::Heartbeat { connection, .. }
            | Self::Error { connection, .. } => *connection,
            Self::Market(update) => update.connection,
        }
    }

    pub(crate) fn connection_event(connection: ConnectionId, event: ConnectionEvent) -> Self {
        Self::Connection { connection, event }
    }

    pub(crate) fn subscription_event(connection: ConnectionId, event: SubscriptionEvent) -> Self {
        Self::Subscription { connection, event }
    }

    pub(crate) fn account_event(connection: ConnectionId, event: AccountEvent) -> Self {
        Self::Account {
            connection,
            event: Box::new(event),
        }
    }
}

impl From<MarketUpdate> for Event {
    fn from(update: MarketUpdate) -> Self {
        Event::Market(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_kind_mnemonics() {
        assert_eq!(TradeKind::from_mnemonic("te"), Some(TradeKind::Executed));
        assert_eq!(TradeKind::from_mnemonic("ftu"), Some(TradeKind::Updated));
        assert_eq!(TradeKind::from_mnemonic("hb"), None);
    }

    #[test]
    fn test_event_connection() {
        let event = Event::Heartbeat {
            connection: ConnectionId(3),
            channel_id: 17,
        };
        assert_eq!(event.connection(), ConnectionId(3));
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::HeartbeatTimeout.to_string(), "heartbeat timeout");
        assert!(DisconnectReason::NetworkError("reset".into())
            .to_string()
            .contains("reset"));
    }
}
