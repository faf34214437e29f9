//! Order book replica for the Bitfinex WebSocket API v2
//!
//! This crate provides the local book data structures and checksum
//! verification. It does no I/O: the streaming client feeds it decoded
//! snapshot and update levels and hands out copies to readers.
//!
//! # Example
//!
//! ```
//! use bfx_book::{OrderBook, OrderBookState};
//! use bfx_types::{BookLevel, Precision};
//! use rust_decimal::Decimal;
//!
//! let mut book = OrderBook::new("tBTCUSD", Precision::P0);
//! assert_eq!(book.state(), OrderBookState::Uninitialized);
//!
//! book.apply_snapshot(&[
//!     BookLevel::new(Decimal::from(100), 1, Decimal::from(5)),
//!     BookLevel::new(Decimal::from(101), 1, Decimal::from(-4)),
//! ]);
//! assert_eq!(book.spread(), Some(Decimal::ONE));
//! ```

pub mod checksum;
pub mod orderbook;
pub mod storage;

// Re-export main types
pub use checksum::{checksum_payload, compute_checksum, CHECKSUM_DEPTH};
pub use orderbook::{ApplyResult, ChecksumMismatch, OrderBook, OrderBookSnapshot, OrderBookState};
pub use storage::TreeBook;
