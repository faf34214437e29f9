//! Order book state machine
//!
//! Applies snapshots and updates for one aggregated book subscription and
//! verifies the exchange's periodic checksum.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized → Synced ↔ Desynchronized
//!                   ↑            │
//!                   └─ snapshot ─┘
//! ```
//!
//! A checksum mismatch marks the book `Desynchronized`. The book is never
//! repaired locally; only a fresh snapshot (after resubscribing) returns it
//! to `Synced`.

use crate::{checksum::compute_checksum, checksum::CHECKSUM_DEPTH, storage::TreeBook};
use bfx_types::{BookLevel, BookSide, Precision};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Book synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderBookState {
    /// No snapshot received yet
    #[default]
    Uninitialized,
    /// Snapshot applied, updates flowing
    Synced,
    /// Checksum failed; contents can no longer be trusted
    Desynchronized,
}

/// Checksum mismatch error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Checksum mismatch for {symbol}: expected {expected}, computed {computed}")]
pub struct ChecksumMismatch {
    /// Symbol that had the mismatch
    pub symbol: String,
    /// Checksum sent by the exchange
    pub expected: i32,
    /// Checksum computed locally
    pub computed: i32,
}

/// Result of applying book data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// Snapshot replaced the book
    Snapshot,
    /// Level was inserted or replaced
    Upserted,
    /// Level was removed
    Removed,
    /// Update arrived before any snapshot, or removed a level we never had
    Ignored,
}

/// Local replica of one aggregated order book
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    precision: Precision,
    storage: TreeBook,
    state: OrderBookState,
    /// Last checksum that matched
    last_checksum: Option<i32>,
}

impl OrderBook {
    /// Create a new, empty book
    pub fn new(symbol: impl Into<String>, precision: Precision) -> Self {
        Self {
            symbol: symbol.into(),
            precision,
            storage: TreeBook::new(),
            state: OrderBookState::Uninitialized,
            last_checksum: None,
        }
    }

    /// Get the symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the aggregation precision
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Get the current state
    pub fn state(&self) -> OrderBookState {
        self.state
    }

    /// Check if the book is synchronized
    pub fn is_synced(&self) -> bool {
        self.state == OrderBookState::Synced
    }

    /// Last checksum that verified successfully
    pub fn last_checksum(&self) -> Option<i32> {
        self.last_checksum
    }

    /// Replace the whole book with a snapshot
    ///
    /// Levels are partitioned by the sign of their amount. Entries with a
    /// non-positive count carry no liquidity and are skipped.
    pub fn apply_snapshot(&mut self, levels: &[BookLevel]) -> ApplyResult {
        self.storage.clear();
        for level in levels.iter().filter(|l| !l.is_removal()) {
            self.storage.upsert(level.side(), level.clone());
        }
        self.state = OrderBookState::Synced;
        self.last_checksum = None;
        ApplyResult::Snapshot
    }

    /// Apply a single update
    ///
    /// * `count > 0`: insert or replace the level at `price` on the side
    ///   given by the amount sign
    /// * `count <= 0`: remove the level at `price`; a positive amount names
    ///   the bid side, a negative one the ask side, zero both
    pub fn apply_update(&mut self, level: &BookLevel) -> ApplyResult {
        if self.state == OrderBookState::Uninitialized {
            return ApplyResult::Ignored;
        }

        if !level.is_removal() {
            self.storage.upsert(level.side(), level.clone());
            return ApplyResult::Upserted;
        }

        let removed = if level.amount.is_zero() {
            let bid = self.storage.remove(BookSide::Bid, &level.price);
            let ask = self.storage.remove(BookSide::Ask, &level.price);
            bid.or(ask)
        } else {
            self.storage.remove(level.side(), &level.price)
        };

        if removed.is_some() {
            ApplyResult::Removed
        } else {
            ApplyResult::Ignored
        }
    }

    /// Compute the checksum of the current contents
    pub fn checksum(&self) -> i32 {
        compute_checksum(
            &self.storage.top_bids(CHECKSUM_DEPTH),
            &self.storage.top_asks(CHECKSUM_DEPTH),
        )
    }

    /// Compare against the checksum sent by the exchange
    ///
    /// On mismatch the book is marked `Desynchronized` and stays that way
    /// until the next snapshot.
    pub fn verify(&mut self, expected: i32) -> Result<(), ChecksumMismatch> {
        let computed = self.checksum();
        if computed != expected {
            self.state = OrderBookState::Desynchronized;
            return Err(ChecksumMismatch {
                symbol: self.symbol.clone(),
                expected,
                computed,
            });
        }
        self.last_checksum = Some(expected);
        Ok(())
    }

    /// Get the best bid
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.storage.best_bid()
    }

    /// Get the best ask
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.storage.best_ask()
    }

    /// Get the spread (ask - bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Get the mid price ((ask + bid) / 2)
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some((ask.price + bid.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Get top N bids
    pub fn top_bids(&self, n: usize) -> Vec<BookLevel> {
        self.storage.top_bids(n)
    }

    /// Get top N asks
    pub fn top_asks(&self, n: usize) -> Vec<BookLevel> {
        self.storage.top_asks(n)
    }

    /// Number of bid levels
    pub fn bid_count(&self) -> usize {
        self.storage.bid_count()
    }

    /// Number of ask levels
    pub fn ask_count(&self) -> usize {
        self.storage.ask_count()
    }

    /// Clear and reset the book
    pub fn reset(&mut self) {
        self.storage.clear();
        self.last_checksum = None;
        self.state = OrderBookState::Uninitialized;
    }

    /// Capture the current contents as an owned copy
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            precision: self.precision,
            bids: self.storage.bids_vec(),
            asks: self.storage.asks_vec(),
            checksum: self.last_checksum,
            state: self.state,
        }
    }
}

/// Immutable copy of a book handed to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub precision: Precision,
    /// Bid levels, best first
    pub bids: Vec<BookLevel>,
    /// Ask levels, best first
    pub asks: Vec<BookLevel>,
    /// Last checksum that verified successfully
    pub checksum: Option<i32>,
    pub state: OrderBookState,
}

impl OrderBookSnapshot {
    /// Get the best bid price
    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get the best ask price
    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get the spread
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get the mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some((ask + bid) / Decimal::TWO),
            _ => None,
        }
    }

    /// Returns true if the copy was taken from a synchronized book
    pub fn is_synced(&self) -> bool {
        self.state == OrderBookState::Synced
    }
}
