//! CRC-32 checksum for order book integrity
//!
//! # Algorithm
//!
//! 1. Take the top 25 levels of each side (bids high→low, asks low→high)
//! 2. Interleave them per index: bid price, bid amount, ask price, ask amount
//! 3. Skip the missing side once one side runs out
//! 4. Join every value with `:` (ask amounts keep their negative sign)
//! 5. Apply CRC-32 (IEEE) and read the result as a signed 32-bit integer
//!
//! The exchange formats values from the JSON it sent us, so prices and amounts
//! are rendered with `Decimal::to_string`, which preserves the scale they were
//! parsed with.

use bfx_types::BookLevel;
use crc32fast::Hasher;

/// Number of levels per side covered by the checksum
pub const CHECKSUM_DEPTH: usize = 25;

/// Build the string that gets hashed
pub fn checksum_payload(bids: &[BookLevel], asks: &[BookLevel]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(CHECKSUM_DEPTH * 4);
    for i in 0..CHECKSUM_DEPTH {
        if let Some(bid) = bids.get(i) {
            parts.push(bid.price.to_string());
            parts.push(bid.amount.to_string());
        }
        if let Some(ask) = asks.get(i) {
            parts.push(ask.price.to_string());
            parts.push(ask.amount.to_string());
        }
    }
    parts.join(":")
}

/// Compute the signed CRC-32 checksum of the top of the book
///
/// # Arguments
///
/// * `bids` - Bid levels sorted high to low (best bid first)
/// * `asks` - Ask levels sorted low to high (best ask first)
pub fn compute_checksum(bids: &[BookLevel], asks: &[BookLevel]) -> i32 {
    let mut hasher = Hasher::new();
    hasher.update(checksum_payload(bids, asks).as_bytes());
    hasher.finalize() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, amount: Decimal) -> BookLevel {
        BookLevel::new(price, 1, amount)
    }

    #[test]
    fn test_payload_interleaves_sides() {
        let bids = vec![level(dec!(100), dec!(5)), level(dec!(99), dec!(3))];
        let asks = vec![level(dec!(101), dec!(-4))];
        assert_eq!(checksum_payload(&bids, &asks), "100:5:101:-4:99:3");
    }

    #[test]
    fn test_golden_small_book() {
        let bids = vec![level(dec!(100), dec!(5)), level(dec!(99), dec!(3))];
        let asks = vec![level(dec!(101), dec!(-4))];
        // crc32("100:5:101:-4:99:3") = 2634911078 unsigned
        assert_eq!(compute_checksum(&bids, &asks), -1660056218);
    }

    #[test]
    fn test_golden_after_update() {
        let bids = vec![level(dec!(99), dec!(3))];
        let asks = vec![level(dec!(101), dec!(-4))];
        assert_eq!(compute_checksum(&bids, &asks), 519746591);
    }

    #[test]
    fn test_golden_fractional_values() {
        let bids = vec![
            level(dec!(7254.7), dec!(0.3)),
            level(dec!(7254.6), dec!(1.2)),
            level(dec!(7254.5), dec!(0.05)),
        ];
        let asks = vec![level(dec!(7255), dec!(-0.8)), level(dec!(7255.1), dec!(-2.5))];
        assert_eq!(
            checksum_payload(&bids, &asks),
            "7254.7:0.3:7255:-0.8:7254.6:1.2:7255.1:-2.5:7254.5:0.05"
        );
        assert_eq!(compute_checksum(&bids, &asks), -290029706);
    }

    #[test]
    fn test_only_top_25_levels_count() {
        let bids: Vec<_> = (0..30)
            .map(|i| level(Decimal::from(1000 - i), dec!(1.5)))
            .collect();
        let asks: Vec<_> = (0..30)
            .map(|i| level(Decimal::from(1001 + i), dec!(-2)))
            .collect();
        assert_eq!(compute_checksum(&bids, &asks), 2101762298);
        assert_eq!(
            compute_checksum(&bids, &asks),
            compute_checksum(&bids[..25], &asks[..25])
        );
    }

    #[test]
    fn test_empty_book() {
        assert_eq!(checksum_payload(&[], &[]), "");
        assert_eq!(compute_checksum(&[], &[]), 0);
    }
}
