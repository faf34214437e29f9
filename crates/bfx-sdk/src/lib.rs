//! High-level SDK for the Bitfinex WebSocket API v2
//!
//! This crate provides an ergonomic API over the streaming client. It
//! handles connection sharding, automatic reconnection with subscription
//! replay, and checksum-verified order book replicas.
//!
//! # Quick Start
//!
//! ```no_run
//! use bfx_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = BfxClient::builder()
//!         .with_ticker(["tBTCUSD", "tETHUSD"])
//!         .with_book("tBTCUSD", Precision::P0)
//!         .connect()
//!         .await?;
//!
//!     let mut events = client.events().unwrap();
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             Event::Market(MarketUpdate { target, event: MarketEvent::Ticker(ticker), .. }) => {
//!                 println!("{}: {:?}", target, ticker);
//!             }
//!             Event::Market(MarketUpdate { event: MarketEvent::ChecksumMismatch { .. }, target, .. }) => {
//!                 eprintln!("{} book out of sync", target);
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Simple API**: Builder pattern for configuration
//! - **Connection Sharding**: Subscriptions spread under the per-socket cap
//! - **Automatic Reconnection**: Exponential backoff with jitter and replay
//! - **Order Books**: Local replicas with CRC-32 verification
//! - **Trading**: Order submission over the authenticated channel

pub mod builder;
pub mod client;
pub mod prelude;

// Re-export main types
pub use builder::{BfxClientBuilder, BuilderError};
pub use client::BfxClient;

// Re-export commonly used types from dependencies
pub use bfx_auth::Credentials;
pub use bfx_book::{OrderBook, OrderBookSnapshot, OrderBookState};
pub use bfx_types::{BfxError, BfxResult, Precision, Symbol};
pub use bfx_ws::{ClientConfig, Endpoint, Event, ReconnectConfig};
