//! Public market data records
//!
//! Each record mirrors one positional array layout. Index constants live in a
//! `*_layout` module next to the record so the mapping can be audited against
//! the exchange documentation at a glance.

use crate::enums::BookSide;
use crate::error::DecodeError;
use crate::wire::{FromRow, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Ticker
// ============================================================================

pub mod ticker_layout {
    pub const BID: usize = 0;
    pub const BID_SIZE: usize = 1;
    pub const ASK: usize = 2;
    pub const ASK_SIZE: usize = 3;
    pub const DAILY_CHANGE: usize = 4;
    pub const DAILY_CHANGE_RELATIVE: usize = 5;
    pub const LAST_PRICE: usize = 6;
    pub const VOLUME: usize = 7;
    pub const HIGH: usize = 8;
    pub const LOW: usize = 9;
    pub const MIN_LEN: usize = 10;
}

/// Trading pair ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingTicker {
    pub bid: Decimal,
    pub bid_size: Decimal,
    pub ask: Decimal,
    pub ask_size: Decimal,
    pub daily_change: Decimal,
    pub daily_change_relative: Decimal,
    pub last_price: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl TradingTicker {
    /// Spread between best ask and best bid
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

impl FromRow for TradingTicker {
    const KIND: &'static str = "trading ticker";
    const MIN_LEN: usize = ticker_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use ticker_layout::*;
        Ok(Self {
            bid: row.decimal(BID)?,
            bid_size: row.decimal(BID_SIZE)?,
            ask: row.decimal(ASK)?,
            ask_size: row.decimal(ASK_SIZE)?,
            daily_change: row.decimal(DAILY_CHANGE)?,
            daily_change_relative: row.decimal(DAILY_CHANGE_RELATIVE)?,
            last_price: row.decimal(LAST_PRICE)?,
            volume: row.decimal(VOLUME)?,
            high: row.decimal(HIGH)?,
            low: row.decimal(LOW)?,
        })
    }
}

pub mod funding_ticker_layout {
    pub const FRR: usize = 0;
    pub const BID: usize = 1;
    pub const BID_PERIOD: usize = 2;
    pub const BID_SIZE: usize = 3;
    pub const ASK: usize = 4;
    pub const ASK_PERIOD: usize = 5;
    pub const ASK_SIZE: usize = 6;
    pub const DAILY_CHANGE: usize = 7;
    pub const DAILY_CHANGE_RELATIVE: usize = 8;
    pub const LAST_PRICE: usize = 9;
    pub const VOLUME: usize = 10;
    pub const HIGH: usize = 11;
    pub const LOW: usize = 12;
    pub const RESERVED: &[usize] = &[13, 14];
    pub const FRR_AMOUNT_AVAILABLE: usize = 15;
    pub const MIN_LEN: usize = 13;
    /// Length of the extended form carrying `FRR_AMOUNT_AVAILABLE`
    pub const EXTENDED_LEN: usize = 16;
}

/// Funding currency ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTicker {
    pub frr: Decimal,
    pub bid: Decimal,
    pub bid_period: i64,
    pub bid_size: Decimal,
    pub ask: Decimal,
    pub ask_period: i64,
    pub ask_size: Decimal,
    pub daily_change: Decimal,
    pub daily_change_relative: Decimal,
    pub last_price: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Only present in the 16-element form
    pub frr_amount_available: Option<Decimal>,
}

impl FromRow for FundingTicker {
    const KIND: &'static str = "funding ticker";
    const MIN_LEN: usize = funding_ticker_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use funding_ticker_layout::*;
        let frr_amount_available = if row.len() >= EXTENDED_LEN {
            row.opt_decimal(FRR_AMOUNT_AVAILABLE)?
        } else {
            None
        };
        Ok(Self {
            frr: row.decimal(FRR)?,
            bid: row.decimal(BID)?,
            bid_period: row.int(BID_PERIOD)?,
            bid_size: row.decimal(BID_SIZE)?,
            ask: row.decimal(ASK)?,
            ask_period: row.int(ASK_PERIOD)?,
            ask_size: row.decimal(ASK_SIZE)?,
            daily_change: row.decimal(DAILY_CHANGE)?,
            daily_change_relative: row.decimal(DAILY_CHANGE_RELATIVE)?,
            last_price: row.decimal(LAST_PRICE)?,
            volume: row.decimal(VOLUME)?,
            high: row.decimal(HIGH)?,
            low: row.decimal(LOW)?,
            frr_amount_available,
        })
    }
}

/// Ticker for either kind of symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Ticker {
    Trading(TradingTicker),
    Funding(FundingTicker),
}

impl Ticker {
    /// Decode a ticker payload, choosing the layout by array length
    ///
    /// Trading tickers carry exactly 10 elements, funding tickers 13 or 16.
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        let len = value
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| DecodeError::shape("ticker: expected an array"))?;
        if len >= funding_ticker_layout::MIN_LEN {
            FundingTicker::decode(value).map(Self::Funding)
        } else {
            TradingTicker::decode(value).map(Self::Trading)
        }
    }

    /// Last traded price (or rate, for funding)
    pub fn last_price(&self) -> Decimal {
        match self {
            Self::Trading(t) => t.last_price,
            Self::Funding(t) => t.last_price,
        }
    }

    pub fn as_trading(&self) -> Option<&TradingTicker> {
        match self {
            Self::Trading(t) => Some(t),
            Self::Funding(_) => None,
        }
    }

    pub fn as_funding(&self) -> Option<&FundingTicker> {
        match self {
            Self::Funding(t) => Some(t),
            Self::Trading(_) => None,
        }
    }
}

// ============================================================================
// Trades
// ============================================================================

pub mod trade_layout {
    pub const ID: usize = 0;
    pub const MTS: usize = 1;
    pub const AMOUNT: usize = 2;
    pub const PRICE: usize = 3;
    pub const MIN_LEN: usize = 4;
}

/// Public trade on a trading pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    /// Millisecond timestamp
    pub mts: i64,
    /// Signed amount: positive for buys, negative for sells
    pub amount: Decimal,
    pub price: Decimal,
}

impl Trade {
    /// Taker side implied by the amount sign
    pub fn side(&self) -> BookSide {
        if self.amount.is_sign_negative() {
            BookSide::Ask
        } else {
            BookSide::Bid
        }
    }
}

impl FromRow for Trade {
    const KIND: &'static str = "trade";
    const MIN_LEN: usize = trade_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use trade_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            mts: row.int(MTS)?,
            amount: row.decimal(AMOUNT)?,
            price: row.decimal(PRICE)?,
        })
    }
}

pub mod funding_trade_layout {
    pub const ID: usize = 0;
    pub const MTS: usize = 1;
    pub const AMOUNT: usize = 2;
    pub const RATE: usize = 3;
    pub const PERIOD: usize = 4;
    pub const MIN_LEN: usize = 5;
}

/// Public trade on a funding currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTrade {
    pub id: i64,
    pub mts: i64,
    pub amount: Decimal,
    pub rate: Decimal,
    /// Loan period in days
    pub period: i64,
}

impl FromRow for FundingTrade {
    const KIND: &'static str = "funding trade";
    const MIN_LEN: usize = funding_trade_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use funding_trade_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            mts: row.int(MTS)?,
            amount: row.decimal(AMOUNT)?,
            rate: row.decimal(RATE)?,
            period: row.int(PERIOD)?,
        })
    }
}

// ============================================================================
// Books (other than aggregated trading books, see `level`)
// ============================================================================

pub mod funding_book_layout {
    pub const RATE: usize = 0;
    pub const PERIOD: usize = 1;
    pub const COUNT: usize = 2;
    pub const AMOUNT: usize = 3;
    pub const MIN_LEN: usize = 4;
}

/// Aggregated funding book entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingBookEntry {
    pub rate: Decimal,
    pub period: i64,
    pub count: i64,
    pub amount: Decimal,
}

impl FromRow for FundingBookEntry {
    const KIND: &'static str = "funding book";
    const MIN_LEN: usize = funding_book_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use funding_book_layout::*;
        Ok(Self {
            rate: row.decimal(RATE)?,
            period: row.int(PERIOD)?,
            count: row.int(COUNT)?,
            amount: row.decimal(AMOUNT)?,
        })
    }
}

pub mod raw_book_layout {
    pub const ORDER_ID: usize = 0;
    pub const PRICE: usize = 1;
    pub const AMOUNT: usize = 2;
    pub const MIN_LEN: usize = 3;
}

/// Raw (order-level) trading book entry
///
/// A price of zero means the order was removed from the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBookEntry {
    pub order_id: i64,
    pub price: Decimal,
    pub amount: Decimal,
}

impl RawBookEntry {
    pub fn is_removal(&self) -> bool {
        self.price.is_zero()
    }
}

impl FromRow for RawBookEntry {
    const KIND: &'static str = "raw book";
    const MIN_LEN: usize = raw_book_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use raw_book_layout::*;
        Ok(Self {
            order_id: row.int(ORDER_ID)?,
            price: row.decimal(PRICE)?,
            amount: row.decimal(AMOUNT)?,
        })
    }
}

pub mod raw_funding_book_layout {
    pub const OFFER_ID: usize = 0;
    pub const PERIOD: usize = 1;
    pub const RATE: usize = 2;
    pub const AMOUNT: usize = 3;
    pub const MIN_LEN: usize = 4;
}

/// Raw (offer-level) funding book entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFundingBookEntry {
    pub offer_id: i64,
    pub period: i64,
    pub rate: Decimal,
    pub amount: Decimal,
}

impl RawFundingBookEntry {
    pub fn is_removal(&self) -> bool {
        self.rate.is_zero()
    }
}

impl FromRow for RawFundingBookEntry {
    const KIND: &'static str = "raw funding book";
    const MIN_LEN: usize = raw_funding_book_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use raw_funding_book_layout::*;
        Ok(Self {
            offer_id: row.int(OFFER_ID)?,
            period: row.int(PERIOD)?,
            rate: row.decimal(RATE)?,
            amount: row.decimal(AMOUNT)?,
        })
    }
}

// ============================================================================
// Candles
// ============================================================================

pub mod candle_layout {
    pub const MTS: usize = 0;
    pub const OPEN: usize = 1;
    pub const CLOSE: usize = 2;
    pub const HIGH: usize = 3;
    pub const LOW: usize = 4;
    pub const VOLUME: usize = 5;
    pub const MIN_LEN: usize = 6;
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub mts: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

impl FromRow for Candle {
    const KIND: &'static str = "candle";
    const MIN_LEN: usize = candle_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use candle_layout::*;
        Ok(Self {
            mts: row.int(MTS)?,
            open: row.decimal(OPEN)?,
            close: row.decimal(CLOSE)?,
            high: row.decimal(HIGH)?,
            low: row.decimal(LOW)?,
            volume: row.decimal(VOLUME)?,
        })
    }
}

// ============================================================================
// Status
// ============================================================================

pub mod derivative_status_layout {
    pub const MTS: usize = 0;
    pub const DERIV_PRICE: usize = 2;
    pub const SPOT_PRICE: usize = 3;
    pub const INSURANCE_FUND_BALANCE: usize = 5;
    pub const NEXT_FUNDING_EVT_MTS: usize = 7;
    pub const NEXT_FUNDING_ACCRUED: usize = 8;
    pub const NEXT_FUNDING_STEP: usize = 9;
    pub const CURRENT_FUNDING: usize = 11;
    pub const MARK_PRICE: usize = 14;
    pub const OPEN_INTEREST: usize = 17;
    pub const CLAMP_MIN: usize = 21;
    pub const CLAMP_MAX: usize = 22;
    pub const RESERVED: &[usize] = &[1, 4, 6, 10, 12, 13, 15, 16, 18, 19, 20];
    pub const MIN_LEN: usize = 4;
}

/// Derivative status, delivered on `status` channels keyed `deriv:<symbol>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeStatus {
    pub mts: i64,
    pub deriv_price: Decimal,
    pub spot_price: Decimal,
    pub insurance_fund_balance: Decimal,
    pub next_funding_evt_mts: i64,
    pub next_funding_accrued: Decimal,
    pub next_funding_step: i64,
    pub current_funding: Decimal,
    pub mark_price: Decimal,
    pub open_interest: Decimal,
    pub clamp_min: Option<Decimal>,
    pub clamp_max: Option<Decimal>,
}

impl FromRow for DerivativeStatus {
    const KIND: &'static str = "derivative status";
    const MIN_LEN: usize = derivative_status_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use derivative_status_layout::*;
        Ok(Self {
            mts: row.int(MTS)?,
            deriv_price: row.decimal(DERIV_PRICE)?,
            spot_price: row.decimal(SPOT_PRICE)?,
            insurance_fund_balance: row.decimal(INSURANCE_FUND_BALANCE)?,
            next_funding_evt_mts: row.int(NEXT_FUNDING_EVT_MTS)?,
            next_funding_accrued: row.decimal(NEXT_FUNDING_ACCRUED)?,
            next_funding_step: row.int(NEXT_FUNDING_STEP)?,
            current_funding: row.decimal(CURRENT_FUNDING)?,
            mark_price: row.decimal(MARK_PRICE)?,
            open_interest: row.decimal(OPEN_INTEREST)?,
            clamp_min: row.opt_decimal(CLAMP_MIN)?,
            clamp_max: row.opt_decimal(CLAMP_MAX)?,
        })
    }
}

pub mod liquidation_layout {
    pub const POS_ID: usize = 1;
    pub const MTS: usize = 2;
    pub const SYMBOL: usize = 4;
    pub const AMOUNT: usize = 5;
    pub const BASE_PRICE: usize = 6;
    pub const IS_MATCH: usize = 8;
    pub const IS_MARKET_SOLD: usize = 9;
    pub const LIQUIDATION_PRICE: usize = 11;
    pub const RESERVED: &[usize] = &[3, 7, 10];
    pub const MIN_LEN: usize = 10;
}

/// Liquidation notice, delivered on the `liq:global` status channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidation {
    pub position_id: i64,
    pub mts: i64,
    pub symbol: String,
    pub amount: Decimal,
    pub base_price: Decimal,
    pub is_match: bool,
    pub is_market_sold: bool,
    pub liquidation_price: Option<Decimal>,
}

impl FromRow for Liquidation {
    const KIND: &'static str = "liquidation";
    const MIN_LEN: usize = liquidation_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use liquidation_layout::*;
        Ok(Self {
            position_id: row.int(POS_ID)?,
            mts: row.int(MTS)?,
            symbol: row.string(SYMBOL)?,
            amount: row.decimal(AMOUNT)?,
            base_price: row.decimal(BASE_PRICE)?,
            is_match: row.flag(IS_MATCH)?,
            is_market_sold: row.flag(IS_MARKET_SOLD)?,
            liquidation_price: row.opt_decimal(LIQUIDATION_PRICE)?,
        })
    }
}
