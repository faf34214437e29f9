//! Aggregated book levels

use crate::enums::BookSide;
use crate::error::DecodeError;
use crate::wire::{FromRow, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single aggregated price level `[PRICE, COUNT, AMOUNT]`
///
/// `amount` is signed: positive on the bid side, negative on the ask side.
/// A `count` of zero means the level was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Price of this level
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Number of orders at this price
    pub count: i64,
    /// Total signed amount at this price
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Aggregated book entry as delivered on a trading `book` channel
pub type BookEntry = BookLevel;

pub mod book_layout {
    pub const PRICE: usize = 0;
    pub const COUNT: usize = 1;
    pub const AMOUNT: usize = 2;
    pub const MIN_LEN: usize = 3;
}

impl BookLevel {
    /// Create a new price level
    pub fn new(price: Decimal, count: i64, amount: Decimal) -> Self {
        Self {
            price,
            count,
            amount,
        }
    }

    /// Side implied by the sign of the amount
    pub fn side(&self) -> BookSide {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            BookSide::Ask
        } else {
            BookSide::Bid
        }
    }

    /// Returns true if this update removes the level
    pub fn is_removal(&self) -> bool {
        self.count <= 0
    }

    /// Unsigned size at this level
    pub fn size(&self) -> Decimal {
        self.amount.abs()
    }
}

impl FromRow for BookLevel {
    const KIND: &'static str = "book";
    const MIN_LEN: usize = book_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            price: row.decimal(book_layout::PRICE)?,
            count: row.int(book_layout::COUNT)?,
            amount: row.decimal(book_layout::AMOUNT)?,
        })
    }
}
