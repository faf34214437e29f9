//! Re-exports for convenience
//!
//! Import everything you need with:
//! ```
//! use bfx_sdk::prelude::*;
//! ```

// Client
pub use crate::builder::{BfxClientBuilder, BuilderError};
pub use crate::client::BfxClient;

// Types from bfx-types
pub use bfx_types::{
    BfxError, BfxResult, BookLength, BookLevel, BookSide, Channel, DecodeError, Frequency,
    Precision, Symbol, SubscriptionId,
    // Market records
    Candle, DerivativeStatus, FundingTicker, FundingTrade, Liquidation, Ticker, Trade,
    TradingTicker,
    // Account records
    Notification, Order, Position, TradeExecution, Wallet,
    // Trading types
    NewOrder, OrderCancel, OrderCancelMulti, OrderType, OrderUpdate,
};

// WebSocket types
pub use bfx_ws::{
    AccountEvent, ClientConfig, ConnectionEvent, ConnectionId, DisconnectReason, Endpoint, Event,
    MarketEvent, MarketUpdate, ReconnectConfig, Subscription, SubscriptionEvent,
    SubscriptionRequest, SubscriptionState, TradeKind,
};

// Authentication
pub use bfx_auth::{Credentials, EpochNonceGenerator, NonceGenerator, SequenceNonceGenerator};

// Orderbook types
pub use bfx_book::{ApplyResult, ChecksumMismatch, OrderBook, OrderBookSnapshot, OrderBookState};

// Decimal for prices/quantities
pub use rust_decimal::Decimal;
