//! Native WebSocket client for the Bitfinex WebSocket API v2
//!
//! This crate provides the connection machinery behind the SDK: sockets,
//! subscription bookkeeping, frame decoding and recovery.
//!
//! # Features
//!
//! - Subscriptions sharded across sockets by the per-connection channel cap
//! - Automatic reconnection with exponential backoff and subscription replay
//! - Order book replicas with CRC-32 checksum verification
//! - One typed event stream for market, account and connection events
//!
//! # Example
//!
//! ```no_run
//! use bfx_ws::{ClientConfig, Multiplexer, SubscriptionRequest, WsDialer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new();
//!     let dialer = Arc::new(WsDialer::new(config.verify_tls));
//!     let mux = Multiplexer::new(config, dialer);
//!     let mut events = mux.take_events().unwrap();
//!
//!     mux.subscribe(SubscriptionRequest::ticker("tBTCUSD")).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod events;
pub mod factory;
pub mod multiplexer;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod trading;
pub mod transport;

// Re-export main types
pub use config::{ClientConfig, ConfigError, MAX_SUBSCRIPTIONS_PER_CONNECTION};
pub use dispatch::{BookStore, Dispatcher};
pub use endpoint::Endpoint;
pub use events::{
    AccountEvent, ConnectionEvent, DisconnectReason, Event, MarketEvent, MarketUpdate,
    SubscriptionEvent, TradeKind,
};
pub use factory::{build_account_event, factory_for, EventFactory};
pub use multiplexer::Multiplexer;
pub use reconnect::{Backoff, ReconnectConfig};
pub use session::SessionState;
pub use subscription::{
    ConnectionId, Reissue, Subscription, SubscriptionRegistry, SubscriptionRequest,
    SubscriptionState,
};
pub use trading::OrderRequest;
pub use transport::{
    Dialer, FrameSink, FrameSource, Inbound, LinkState, Outbound, Transport, TransportConfig,
    TransportError, WsDialer,
};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockDialer, MockServer, MockServers};

/// Receiver half of the shared event stream
pub type EventReceiver = tokio::sync::mpsc::Receiver<Event>;
