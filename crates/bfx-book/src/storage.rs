//! BTreeMap-based level storage
//!
//! Uses `Reverse<Decimal>` for bids to maintain descending order.

use bfx_types::{BookLevel, BookSide};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Two-sided level storage with O(log N) upsert and removal
///
/// - Bids: keyed by `Reverse<Decimal>`, highest price first
/// - Asks: keyed by `Decimal`, lowest price first
///
/// Each side holds at most one level per price.
#[derive(Debug, Clone, Default)]
pub struct TreeBook {
    bids: BTreeMap<Reverse<Decimal>, BookLevel>,
    asks: BTreeMap<Decimal, BookLevel>,
}

impl TreeBook {
    /// Create a new empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the level at `level.price` on `side`
    pub fn upsert(&mut self, side: BookSide, level: BookLevel) {
        match side {
            BookSide::Bid => {
                self.bids.insert(Reverse(level.price), level);
            }
            BookSide::Ask => {
                self.asks.insert(level.price, level);
            }
        }
    }

    /// Remove the level at `price` on `side`, returning it if present
    pub fn remove(&mut self, side: BookSide, price: &Decimal) -> Option<BookLevel> {
        match side {
            BookSide::Bid => self.bids.remove(&Reverse(*price)),
            BookSide::Ask => self.asks.remove(price),
        }
    }

    /// Get the best bid (highest price)
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.values().next()
    }

    /// Get the best ask (lowest price)
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.values().next()
    }

    /// Level at `price` on `side`
    pub fn get(&self, side: BookSide, price: &Decimal) -> Option<&BookLevel> {
        match side {
            BookSide::Bid => self.bids.get(&Reverse(*price)),
            BookSide::Ask => self.asks.get(price),
        }
    }

    /// Iterator over bids (highest to lowest price)
    pub fn bids(&self) -> impl Iterator<Item = &BookLevel> {
        self.bids.values()
    }

    /// Iterator over asks (lowest to highest price)
    pub fn asks(&self) -> impl Iterator<Item = &BookLevel> {
        self.asks.values()
    }

    /// Get bids as a vector
    pub fn bids_vec(&self) -> Vec<BookLevel> {
        self.bids.values().cloned().collect()
    }

    /// Get asks as a vector
    pub fn asks_vec(&self) -> Vec<BookLevel> {
        self.asks.values().cloned().collect()
    }

    /// Get top N bids
    pub fn top_bids(&self, n: usize) -> Vec<BookLevel> {
        self.bids.values().take(n).cloned().collect()
    }

    /// Get top N asks
    pub fn top_asks(&self, n: usize) -> Vec<BookLevel> {
        self.asks.values().take(n).cloned().collect()
    }

    /// Number of bid levels
    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask levels
    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    /// Check if the book is empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Clear all levels
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, amount: Decimal) -> BookLevel {
        BookLevel::new(price, 1, amount)
    }

    #[test]
    fn test_bid_order() {
        let mut book = TreeBook::new();
        book.upsert(BookSide::Bid, level(dec!(100), dec!(1)));
        book.upsert(BookSide::Bid, level(dec!(101), dec!(2)));
        book.upsert(BookSide::Bid, level(dec!(99), dec!(3)));

        let bids: Vec<_> = book.bids().map(|l| l.price).collect();
        assert_eq!(bids, vec![dec!(101), dec!(100), dec!(99)]);
    }

    #[test]
    fn test_ask_order() {
        let mut book = TreeBook::new();
        book.upsert(BookSide::Ask, level(dec!(100), dec!(-1)));
        book.upsert(BookSide::Ask, level(dec!(101), dec!(-2)));
        book.upsert(BookSide::Ask, level(dec!(99), dec!(-3)));

        let asks: Vec<_> = book.asks().map(|l| l.price).collect();
        assert_eq!(asks, vec![dec!(99), dec!(100), dec!(101)]);
    }

    #[test]
    fn test_upsert_replaces_same_price() {
        let mut book = TreeBook::new();
        book.upsert(BookSide::Bid, level(dec!(100), dec!(1)));
        book.upsert(BookSide::Bid, BookLevel::new(dec!(100), 3, dec!(7)));

        assert_eq!(book.bid_count(), 1);
        let best = book.best_bid().unwrap();
        assert_eq!(best.count, 3);
        assert_eq!(best.amount, dec!(7));
    }

    #[test]
    fn test_remove() {
        let mut book = TreeBook::new();
        book.upsert(BookSide::Ask, level(dec!(101), dec!(-4)));
        assert!(book.remove(BookSide::Bid, &dec!(101)).is_none());
        assert!(book.remove(BookSide::Ask, &dec!(101)).is_some());
        assert!(book.is_empty());
    }

    #[test]
    fn test_top_n() {
        let mut book = TreeBook::new();
        for i in 0..10 {
            book.upsert(BookSide::Bid, level(Decimal::from(100 - i), dec!(1)));
        }
        let top = book.top_bids(3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].price, dec!(100));
        assert_eq!(top[2].price, dec!(98));
    }
}
