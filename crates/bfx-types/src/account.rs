//! Authenticated account records (channel 0)
//!
//! Every record here arrives as `[0, MNEMONIC, PAYLOAD]` on the authenticated
//! channel. Snapshots (`os`, `ps`, `ws`, ...) carry an array of records,
//! single-record messages (`on`, `pu`, `wu`, ...) a flat record.

use crate::error::DecodeError;
use crate::wire::{FromRow, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Orders
// ============================================================================

pub mod order_layout {
    pub const ID: usize = 0;
    pub const GID: usize = 1;
    pub const CID: usize = 2;
    pub const SYMBOL: usize = 3;
    pub const MTS_CREATE: usize = 4;
    pub const MTS_UPDATE: usize = 5;
    pub const AMOUNT: usize = 6;
    pub const AMOUNT_ORIG: usize = 7;
    pub const ORDER_TYPE: usize = 8;
    pub const TYPE_PREV: usize = 9;
    pub const MTS_TIF: usize = 10;
    pub const FLAGS: usize = 12;
    pub const STATUS: usize = 13;
    pub const PRICE: usize = 16;
    pub const PRICE_AVG: usize = 17;
    pub const PRICE_TRAILING: usize = 18;
    pub const PRICE_AUX_LIMIT: usize = 19;
    pub const NOTIFY: usize = 23;
    pub const HIDDEN: usize = 24;
    pub const PLACED_ID: usize = 25;
    pub const ROUTING: usize = 28;
    pub const META: usize = 31;
    pub const RESERVED: &[usize] = &[11, 14, 15, 20, 21, 22, 26, 27, 29, 30];
    pub const MIN_LEN: usize = 26;
}

/// Order state as reported by `os`/`on`/`ou`/`oc`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub gid: Option<i64>,
    pub cid: i64,
    pub symbol: String,
    pub mts_create: i64,
    pub mts_update: i64,
    /// Remaining amount, positive for buys
    pub amount: Decimal,
    pub amount_orig: Decimal,
    pub order_type: String,
    pub type_prev: Option<String>,
    pub mts_tif: Option<i64>,
    pub flags: i64,
    /// e.g. `ACTIVE`, `EXECUTED @ 107.6(-0.2)`, `CANCELED`
    pub status: String,
    pub price: Decimal,
    pub price_avg: Decimal,
    pub price_trailing: Decimal,
    pub price_aux_limit: Decimal,
    pub notify: bool,
    pub hidden: bool,
    pub placed_id: Option<i64>,
    pub routing: String,
    pub meta: Option<Value>,
}

impl Order {
    /// Returns true if the order is still working on the book
    pub fn is_active(&self) -> bool {
        self.status.starts_with("ACTIVE") || self.status.starts_with("PARTIALLY FILLED")
    }

    /// Returns true once the order is fully executed or canceled
    pub fn is_closed(&self) -> bool {
        self.status.starts_with("EXECUTED")
            || self.status.starts_with("CANCELED")
            || self.status.starts_with("RSN_")
    }

    /// Filled amount so far
    pub fn filled(&self) -> Decimal {
        self.amount_orig - self.amount
    }
}

impl FromRow for Order {
    const KIND: &'static str = "order";
    const MIN_LEN: usize = order_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use order_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            gid: row.opt_int(GID)?,
            cid: row.int(CID)?,
            symbol: row.string(SYMBOL)?,
            mts_create: row.int(MTS_CREATE)?,
            mts_update: row.int(MTS_UPDATE)?,
            amount: row.decimal(AMOUNT)?,
            amount_orig: row.decimal(AMOUNT_ORIG)?,
            order_type: row.string(ORDER_TYPE)?,
            type_prev: row.opt_string(TYPE_PREV)?,
            mts_tif: row.opt_int(MTS_TIF)?,
            flags: row.int(FLAGS)?,
            status: row.string(STATUS)?,
            price: row.decimal(PRICE)?,
            price_avg: row.decimal(PRICE_AVG)?,
            price_trailing: row.decimal(PRICE_TRAILING)?,
            price_aux_limit: row.decimal(PRICE_AUX_LIMIT)?,
            notify: row.flag(NOTIFY)?,
            hidden: row.flag(HIDDEN)?,
            placed_id: row.opt_int(PLACED_ID)?,
            routing: row.string(ROUTING)?,
            meta: row.value(META).cloned(),
        })
    }
}

// ============================================================================
// Positions
// ============================================================================

pub mod position_layout {
    pub const SYMBOL: usize = 0;
    pub const STATUS: usize = 1;
    pub const AMOUNT: usize = 2;
    pub const BASE_PRICE: usize = 3;
    pub const MARGIN_FUNDING: usize = 4;
    pub const MARGIN_FUNDING_TYPE: usize = 5;
    pub const PL: usize = 6;
    pub const PL_PERC: usize = 7;
    pub const PRICE_LIQ: usize = 8;
    pub const LEVERAGE: usize = 9;
    pub const POSITION_ID: usize = 11;
    pub const MTS_CREATE: usize = 12;
    pub const MTS_UPDATE: usize = 13;
    pub const TYPE: usize = 15;
    pub const COLLATERAL: usize = 17;
    pub const COLLATERAL_MIN: usize = 18;
    pub const META: usize = 19;
    pub const RESERVED: &[usize] = &[10, 14, 16];
    pub const MIN_LEN: usize = 10;
}

/// Margin position (`ps`/`pn`/`pu`/`pc`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub status: String,
    pub amount: Decimal,
    pub base_price: Decimal,
    pub margin_funding: Decimal,
    /// 0 for daily, 1 for term
    pub margin_funding_type: i64,
    pub pl: Option<Decimal>,
    pub pl_perc: Option<Decimal>,
    pub price_liq: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub position_id: Option<i64>,
    pub mts_create: Option<i64>,
    pub mts_update: Option<i64>,
    pub position_type: Option<i64>,
    pub collateral: Option<Decimal>,
    pub collateral_min: Option<Decimal>,
    pub meta: Option<Value>,
}

impl FromRow for Position {
    const KIND: &'static str = "position";
    const MIN_LEN: usize = position_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use position_layout::*;
        Ok(Self {
            symbol: row.string(SYMBOL)?,
            status: row.string(STATUS)?,
            amount: row.decimal(AMOUNT)?,
            base_price: row.decimal(BASE_PRICE)?,
            margin_funding: row.decimal(MARGIN_FUNDING)?,
            margin_funding_type: row.int(MARGIN_FUNDING_TYPE)?,
            pl: row.opt_decimal(PL)?,
            pl_perc: row.opt_decimal(PL_PERC)?,
            price_liq: row.opt_decimal(PRICE_LIQ)?,
            leverage: row.opt_decimal(LEVERAGE)?,
            position_id: row.opt_int(POSITION_ID)?,
            mts_create: row.opt_int(MTS_CREATE)?,
            mts_update: row.opt_int(MTS_UPDATE)?,
            position_type: row.opt_int(TYPE)?,
            collateral: row.opt_decimal(COLLATERAL)?,
            collateral_min: row.opt_decimal(COLLATERAL_MIN)?,
            meta: row.value(META).cloned(),
        })
    }
}

// ============================================================================
// Wallets
// ============================================================================

pub mod wallet_layout {
    pub const WALLET_TYPE: usize = 0;
    pub const CURRENCY: usize = 1;
    pub const BALANCE: usize = 2;
    pub const UNSETTLED_INTEREST: usize = 3;
    pub const AVAILABLE_BALANCE: usize = 4;
    pub const LAST_CHANGE: usize = 5;
    pub const TRADE_DETAILS: usize = 6;
    pub const MIN_LEN: usize = 4;
}

/// Wallet balance (`ws`/`wu`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// `exchange`, `margin` or `funding`
    pub wallet_type: String,
    pub currency: String,
    pub balance: Decimal,
    pub unsettled_interest: Decimal,
    /// `null` until the exchange has computed it
    pub available_balance: Option<Decimal>,
    pub last_change: Option<String>,
    pub trade_details: Option<Value>,
}

impl FromRow for Wallet {
    const KIND: &'static str = "wallet";
    const MIN_LEN: usize = wallet_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use wallet_layout::*;
        Ok(Self {
            wallet_type: row.string(WALLET_TYPE)?,
            currency: row.string(CURRENCY)?,
            balance: row.decimal(BALANCE)?,
            unsettled_interest: row.decimal(UNSETTLED_INTEREST)?,
            available_balance: row.opt_decimal(AVAILABLE_BALANCE)?,
            last_change: row.opt_string(LAST_CHANGE)?,
            trade_details: row.value(TRADE_DETAILS).cloned(),
        })
    }
}

// ============================================================================
// Trade executions
// ============================================================================

pub mod trade_execution_layout {
    pub const ID: usize = 0;
    pub const SYMBOL: usize = 1;
    pub const MTS_CREATE: usize = 2;
    pub const ORDER_ID: usize = 3;
    pub const EXEC_AMOUNT: usize = 4;
    pub const EXEC_PRICE: usize = 5;
    pub const ORDER_TYPE: usize = 6;
    pub const ORDER_PRICE: usize = 7;
    pub const MAKER: usize = 8;
    pub const FEE: usize = 9;
    pub const FEE_CURRENCY: usize = 10;
    pub const CID: usize = 11;
    pub const MIN_LEN: usize = 9;
}

/// Own trade execution (`te` before fees are known, `tu` with fees)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecution {
    pub id: i64,
    pub symbol: String,
    pub mts_create: i64,
    pub order_id: i64,
    pub exec_amount: Decimal,
    pub exec_price: Decimal,
    pub order_type: String,
    pub order_price: Decimal,
    /// 1 if maker, -1 if taker
    pub maker: i64,
    pub fee: Option<Decimal>,
    pub fee_currency: Option<String>,
    pub cid: Option<i64>,
}

impl TradeExecution {
    pub fn is_maker(&self) -> bool {
        self.maker > 0
    }
}

impl FromRow for TradeExecution {
    const KIND: &'static str = "trade execution";
    const MIN_LEN: usize = trade_execution_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use trade_execution_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            symbol: row.string(SYMBOL)?,
            mts_create: row.int(MTS_CREATE)?,
            order_id: row.int(ORDER_ID)?,
            exec_amount: row.decimal(EXEC_AMOUNT)?,
            exec_price: row.decimal(EXEC_PRICE)?,
            order_type: row.string(ORDER_TYPE)?,
            order_price: row.decimal(ORDER_PRICE)?,
            maker: row.int(MAKER)?,
            fee: row.opt_decimal(FEE)?,
            fee_currency: row.opt_string(FEE_CURRENCY)?,
            cid: row.opt_int(CID)?,
        })
    }
}

pub mod funding_trade_execution_layout {
    pub const ID: usize = 0;
    pub const SYMBOL: usize = 1;
    pub const MTS_CREATE: usize = 2;
    pub const OFFER_ID: usize = 3;
    pub const AMOUNT: usize = 4;
    pub const RATE: usize = 5;
    pub const PERIOD: usize = 6;
    pub const MAKER: usize = 7;
    pub const MIN_LEN: usize = 8;
}

/// Own funding trade execution (`fte`/`ftu`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTradeExecution {
    pub id: i64,
    pub symbol: String,
    pub mts_create: i64,
    pub offer_id: i64,
    pub amount: Decimal,
    pub rate: Decimal,
    pub period: i64,
    pub maker: bool,
}

impl FromRow for FundingTradeExecution {
    const KIND: &'static str = "funding trade execution";
    const MIN_LEN: usize = funding_trade_execution_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use funding_trade_execution_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            symbol: row.string(SYMBOL)?,
            mts_create: row.int(MTS_CREATE)?,
            offer_id: row.int(OFFER_ID)?,
            amount: row.decimal(AMOUNT)?,
            rate: row.decimal(RATE)?,
            period: row.int(PERIOD)?,
            maker: row.flag(MAKER)?,
        })
    }
}

// ============================================================================
// Funding offers, credits and loans
// ============================================================================

pub mod funding_offer_layout {
    pub const ID: usize = 0;
    pub const SYMBOL: usize = 1;
    pub const MTS_CREATED: usize = 2;
    pub const MTS_UPDATED: usize = 3;
    pub const AMOUNT: usize = 4;
    pub const AMOUNT_ORIG: usize = 5;
    pub const OFFER_TYPE: usize = 6;
    pub const FLAGS: usize = 9;
    pub const STATUS: usize = 10;
    pub const RATE: usize = 14;
    pub const PERIOD: usize = 15;
    pub const NOTIFY: usize = 16;
    pub const HIDDEN: usize = 17;
    pub const RENEW: usize = 19;
    pub const RATE_REAL: usize = 20;
    pub const RESERVED: &[usize] = &[7, 8, 11, 12, 13, 18];
    pub const MIN_LEN: usize = 16;
}

/// Funding offer (`fos`/`fon`/`fou`/`foc`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingOffer {
    pub id: i64,
    pub symbol: String,
    pub mts_created: i64,
    pub mts_updated: i64,
    pub amount: Decimal,
    pub amount_orig: Decimal,
    pub offer_type: String,
    pub flags: Option<i64>,
    pub status: String,
    pub rate: Decimal,
    pub period: i64,
    pub notify: bool,
    pub hidden: bool,
    pub renew: bool,
    pub rate_real: Option<Decimal>,
}

impl FromRow for FundingOffer {
    const KIND: &'static str = "funding offer";
    const MIN_LEN: usize = funding_offer_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use funding_offer_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            symbol: row.string(SYMBOL)?,
            mts_created: row.int(MTS_CREATED)?,
            mts_updated: row.int(MTS_UPDATED)?,
            amount: row.decimal(AMOUNT)?,
            amount_orig: row.decimal(AMOUNT_ORIG)?,
            offer_type: row.string(OFFER_TYPE)?,
            flags: row.opt_int(FLAGS)?,
            status: row.string(STATUS)?,
            rate: row.decimal(RATE)?,
            period: row.int(PERIOD)?,
            notify: row.flag(NOTIFY)?,
            hidden: row.flag(HIDDEN)?,
            renew: row.flag(RENEW)?,
            rate_real: row.opt_decimal(RATE_REAL)?,
        })
    }
}

pub mod funding_loan_layout {
    pub const ID: usize = 0;
    pub const SYMBOL: usize = 1;
    pub const SIDE: usize = 2;
    pub const MTS_CREATE: usize = 3;
    pub const MTS_UPDATE: usize = 4;
    pub const AMOUNT: usize = 5;
    pub const FLAGS: usize = 6;
    pub const STATUS: usize = 7;
    pub const RATE: usize = 11;
    pub const PERIOD: usize = 12;
    pub const MTS_OPENING: usize = 13;
    pub const MTS_LAST_PAYOUT: usize = 14;
    pub const NOTIFY: usize = 15;
    pub const HIDDEN: usize = 16;
    pub const RENEW: usize = 18;
    pub const RATE_REAL: usize = 19;
    pub const NO_CLOSE: usize = 20;
    /// Only present on funding credits
    pub const POSITION_PAIR: usize = 21;
    pub const RESERVED: &[usize] = &[8, 9, 10, 17];
    pub const MIN_LEN: usize = 13;
}

/// Funding loan (`fls`/`fln`/`flu`/`flc`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingLoan {
    pub id: i64,
    pub symbol: String,
    /// 1 if lender, 0 if both, -1 if borrower
    pub side: i64,
    pub mts_create: i64,
    pub mts_update: i64,
    pub amount: Decimal,
    pub flags: Option<i64>,
    pub status: String,
    pub rate: Decimal,
    pub period: i64,
    pub mts_opening: Option<i64>,
    pub mts_last_payout: Option<i64>,
    pub notify: bool,
    pub hidden: bool,
    pub renew: bool,
    pub rate_real: Option<Decimal>,
    pub no_close: bool,
}

impl FromRow for FundingLoan {
    const KIND: &'static str = "funding loan";
    const MIN_LEN: usize = funding_loan_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use funding_loan_layout::*;
        Ok(Self {
            id: row.int(ID)?,
            symbol: row.string(SYMBOL)?,
            side: row.int(SIDE)?,
            mts_create: row.int(MTS_CREATE)?,
            mts_update: row.int(MTS_UPDATE)?,
            amount: row.decimal(AMOUNT)?,
            flags: row.opt_int(FLAGS)?,
            status: row.string(STATUS)?,
            rate: row.decimal(RATE)?,
            period: row.int(PERIOD)?,
            mts_opening: row.opt_int(MTS_OPENING)?,
            mts_last_payout: row.opt_int(MTS_LAST_PAYOUT)?,
            notify: row.flag(NOTIFY)?,
            hidden: row.flag(HIDDEN)?,
            renew: row.flag(RENEW)?,
            rate_real: row.opt_decimal(RATE_REAL)?,
            no_close: row.flag(NO_CLOSE)?,
        })
    }
}

/// Funding credit (`fcs`/`fcn`/`fcu`/`fcc`): a loan used by a margin position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingCredit {
    #[serde(flatten)]
    pub loan: FundingLoan,
    pub position_pair: Option<String>,
}

impl FromRow for FundingCredit {
    const KIND: &'static str = "funding credit";
    const MIN_LEN: usize = funding_loan_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            loan: FundingLoan::from_row(row)?,
            position_pair: row.opt_string(funding_loan_layout::POSITION_PAIR)?,
        })
    }
}

// ============================================================================
// Info updates
// ============================================================================

/// Funding info (`fiu`): `["sym", SYMBOL, [YIELD_LOAN, YIELD_LEND, DURATION_LOAN, DURATION_LEND]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingInfo {
    pub symbol: String,
    pub yield_loan: Decimal,
    pub yield_lend: Decimal,
    pub duration_loan: Decimal,
    pub duration_lend: Decimal,
}

impl FromRow for FundingInfo {
    const KIND: &'static str = "funding info";
    const MIN_LEN: usize = 3;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        let info = row.nested(2, Self::KIND, 4)?;
        Ok(Self {
            symbol: row.string(1)?,
            yield_loan: info.decimal(0)?,
            yield_lend: info.decimal(1)?,
            duration_loan: info.decimal(2)?,
            duration_lend: info.decimal(3)?,
        })
    }
}

/// Margin info (`miu`), either account-wide or per symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum MarginInfo {
    /// `["base", [USER_PL, USER_SWAPS, MARGIN_BALANCE, MARGIN_NET, MARGIN_MIN]]`
    Base {
        user_pl: Decimal,
        user_swaps: Decimal,
        margin_balance: Decimal,
        margin_net: Decimal,
        margin_min: Decimal,
    },
    /// `["sym", SYMBOL, [TRADABLE_BALANCE, GROSS_BALANCE, BUY, SELL]]`
    Symbol {
        symbol: String,
        tradable_balance: Decimal,
        gross_balance: Decimal,
        buy: Decimal,
        sell: Decimal,
    },
}

impl FromRow for MarginInfo {
    const KIND: &'static str = "margin info";
    const MIN_LEN: usize = 2;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        match row.string(0)?.as_str() {
            "base" => {
                let info = row.nested(1, Self::KIND, 4)?;
                Ok(Self::Base {
                    user_pl: info.decimal(0)?,
                    user_swaps: info.decimal(1)?,
                    margin_balance: info.decimal(2)?,
                    margin_net: info.decimal(3)?,
                    margin_min: info.decimal(4)?,
                })
            }
            "sym" => {
                let info = row.nested(2, Self::KIND, 4)?;
                Ok(Self::Symbol {
                    symbol: row.string(1)?,
                    tradable_balance: info.decimal(0)?,
                    gross_balance: info.decimal(1)?,
                    buy: info.decimal(2)?,
                    sell: info.decimal(3)?,
                })
            }
            other => Err(DecodeError::shape(format!("margin info scope {other:?}"))),
        }
    }
}

/// Balance info (`bu`): `[AUM, AUM_NET]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceInfo {
    /// Total assets under management
    pub aum: Decimal,
    /// Net assets under management
    pub aum_net: Decimal,
}

impl FromRow for BalanceInfo {
    const KIND: &'static str = "balance info";
    const MIN_LEN: usize = 2;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            aum: row.decimal(0)?,
            aum_net: row.decimal(1)?,
        })
    }
}

// ============================================================================
// Notifications
// ============================================================================

pub mod notification_layout {
    pub const MTS: usize = 0;
    pub const NOTIFICATION_TYPE: usize = 1;
    pub const MESSAGE_ID: usize = 2;
    pub const NOTIFY_INFO: usize = 4;
    pub const CODE: usize = 5;
    pub const STATUS: usize = 6;
    pub const TEXT: usize = 7;
    pub const RESERVED: &[usize] = &[3];
    pub const MIN_LEN: usize = 8;
}

/// Payload attached to a notification, typed by the notification type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum NotifyInfo {
    /// `on-req`, `ou-req`, `oc-req`
    Order(Box<Order>),
    /// `fon-req`, `foc-req`
    FundingOffer(Box<FundingOffer>),
    /// Anything else, or a payload too short for its expected type
    Raw(Value),
}

impl NotifyInfo {
    fn decode(notification_type: &str, value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::Raw(Value::Null);
        };
        let typed = match notification_type {
            "on-req" | "ou-req" | "oc-req" => Order::decode(value).map(|o| Self::Order(Box::new(o))),
            "fon-req" | "foc-req" => {
                FundingOffer::decode(value).map(|o| Self::FundingOffer(Box::new(o)))
            }
            _ => return Self::Raw(value.clone()),
        };
        // Rejected requests echo a partial record; keep it untyped.
        typed.unwrap_or_else(|_| Self::Raw(value.clone()))
    }

    pub fn as_order(&self) -> Option<&Order> {
        match self {
            Self::Order(order) => Some(order),
            _ => None,
        }
    }
}

/// Notification (`n`), used for request acknowledgements and alerts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub mts: i64,
    /// e.g. `on-req`, `oc-req`, `uca`
    pub notification_type: String,
    pub message_id: Option<i64>,
    pub notify_info: NotifyInfo,
    pub code: Option<i64>,
    /// `SUCCESS`, `ERROR`, `FAILURE`, ...
    pub status: String,
    pub text: String,
}

impl Notification {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

impl FromRow for Notification {
    const KIND: &'static str = "notification";
    const MIN_LEN: usize = notification_layout::MIN_LEN;

    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError> {
        use notification_layout::*;
        let notification_type = row.string(NOTIFICATION_TYPE)?;
        let notify_info = NotifyInfo::decode(&notification_type, row.value(NOTIFY_INFO));
        Ok(Self {
            mts: row.int(MTS)?,
            notification_type,
            message_id: row.opt_int(MESSAGE_ID)?,
            notify_info,
            code: row.opt_int(CODE)?,
            status: row.string(STATUS)?,
            text: row.string(TEXT)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn order_json() -> Value {
        json!([
            1185815098, null, 1574421290467i64, "tETHUSD", 1574421290469i64, 1574421290469i64,
            -0.2, -0.2, "EXCHANGE LIMIT", null, null, null, 0, "ACTIVE", null, null, 230, 0, 0,
            0, null, null, null, 0, 0, null, null, null, "API>BFX", null, null, {"aff_code": "x"}
        ])
    }

    #[test]
    fn test_order() {
        let order = Order::decode(&order_json()).unwrap();
        assert_eq!(order.id, 1185815098);
        assert_eq!(order.gid, None);
        assert_eq!(order.symbol, "tETHUSD");
        assert_eq!(order.amount, dec!(-0.2));
        assert_eq!(order.order_type, "EXCHANGE LIMIT");
        assert_eq!(order.price, dec!(230));
        assert_eq!(order.routing, "API>BFX");
        assert!(order.is_active());
        assert!(!order.is_closed());
        assert_eq!(order.filled(), Decimal::ZERO);
        assert!(order.meta.is_some());
    }

    #[test]
    fn test_order_short_rejected() {
        assert!(matches!(
            Order::decode(&json!([1, null, 2, "tBTCUSD"])),
            Err(DecodeError::TooShort { expected: 26, .. })
        ));
    }

    #[test]
    fn test_position_minimal() {
        let position = Position::decode(&json!([
            "tETHUSD", "ACTIVE", -0.2, 153.57, 0, 0, null, null, null, null
        ]))
        .unwrap();
        assert_eq!(position.amount, dec!(-0.2));
        assert_eq!(position.pl, None);
        assert_eq!(position.position_id, None);
    }

    #[test]
    fn test_wallet_nullable_available() {
        let wallet = Wallet::decode(&json!(["exchange", "USD", 1000.5, 0, null])).unwrap();
        assert_eq!(wallet.balance, dec!(1000.5));
        assert_eq!(wallet.available_balance, None);

        let wallet = Wallet::decode(&json!(["margin", "BTC", 1, 0, 0.5, "Trading fees", {}])).unwrap();
        assert_eq!(wallet.available_balance, Some(dec!(0.5)));
        assert_eq!(wallet.last_change.as_deref(), Some("Trading fees"));
    }

    #[test]
    fn test_trade_execution_with_and_without_fee() {
        let te = TradeExecution::decode(&json!([
            405, "tETHUSD", 1574963975602i64, 34, -0.2, 153.57, "EXCHANGE LIMIT", 153.57, -1
        ]))
        .unwrap();
        assert_eq!(te.fee, None);
        assert!(!te.is_maker());

        let tu = TradeExecution::decode(&json!([
            405, "tETHUSD", 1574963975602i64, 34, -0.2, 153.57, "EXCHANGE LIMIT", 153.57, -1,
            -0.061, "USD", 1574963975000i64
        ]))
        .unwrap();
        assert_eq!(tu.fee, Some(dec!(-0.061)));
        assert_eq!(tu.fee_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_funding_offer_and_credit() {
        let offer = FundingOffer::decode(&json!([
            41237920, "fETH", 1573912039000i64, 1573912039000i64, 0.5, 0.5, "LIMIT", null, null,
            0, "ACTIVE", null, null, null, 0.0024, 2, 0, 0, null, 0, null
        ]))
        .unwrap();
        assert_eq!(offer.rate, dec!(0.0024));
        assert_eq!(offer.period, 2);
        assert!(!offer.renew);

        let credit = FundingCredit::decode(&json!([
            26223578, "fUST", 1, 1575052261000i64, 1575296187000i64, 350, 0, "ACTIVE", null,
            null, null, 0, 30, 1575052261000i64, 1575293487000i64, 0, 0, null, 0, null, 0,
            "tBTCUST"
        ]))
        .unwrap();
        assert_eq!(credit.loan.period, 30);
        assert_eq!(credit.position_pair.as_deref(), Some("tBTCUST"));

        let loan = FundingLoan::decode(&json!([
            2995442, "fUSD", -1, 1575291961000i64, 1575295850000i64, 820, 0, "ACTIVE", null,
            null, null, 0.002, 7
        ]))
        .unwrap();
        assert_eq!(loan.side, -1);
        assert_eq!(loan.mts_opening, None);
    }

    #[test]
    fn test_info_updates() {
        let fiu = FundingInfo::decode(&json!(["sym", "fUSD", [0.0008595, 0.0008728, 6.6, 3.8]]))
            .unwrap();
        assert_eq!(fiu.symbol, "fUSD");
        assert_eq!(fiu.duration_lend, dec!(3.8));

        let base = MarginInfo::decode(&json!(["base", [-13.014640000000007, 0, 49331.70267297, 49318.68803297, 27]]))
            .unwrap();
        assert!(matches!(base, MarginInfo::Base { margin_min, .. } if margin_min == dec!(27)));

        let sym = MarginInfo::decode(&json!(["sym", "tETHUSD", [149361.09689202666, 149639.26293509, 830.0182168075556, 895.0658432466332]]))
            .unwrap();
        assert!(matches!(sym, MarginInfo::Symbol { ref symbol, .. } if symbol == "tETHUSD"));

        assert!(MarginInfo::decode(&json!(["other", []])).is_err());

        let bu = BalanceInfo::decode(&json!([4131.85, 4131.85])).unwrap();
        assert_eq!(bu.aum, dec!(4131.85));
    }

    #[test]
    fn test_notification_typed_order() {
        let payload = json!([
            1575289447641i64, "on-req", null, null, order_json(), null, "SUCCESS",
            "Submitting exchange limit sell order for -0.2 ETH."
        ]);
        let n = Notification::decode(&payload).unwrap();
        assert!(n.is_success());
        assert_eq!(n.notify_info.as_order().map(|o| o.id), Some(1185815098));
    }

    #[test]
    fn test_notification_rejected_request_stays_raw() {
        let payload = json!([
            1575289447641i64, "on-req", null, null,
            [null, null, 1575289447641i64, "tETHUSD"],
            null, "ERROR", "Invalid order: minimum size"
        ]);
        let n = Notification::decode(&payload).unwrap();
        assert!(!n.is_success());
        assert!(matches!(n.notify_info, NotifyInfo::Raw(_)));
    }

    #[test]
    fn test_notification_other_type_raw() {
        let payload = json!([1575289447641i64, "uca", null, null, {"x": 1}, null, "INFO", "hello"]);
        let n = Notification::decode(&payload).unwrap();
        assert!(matches!(n.notify_info, NotifyInfo::Raw(Value::Object(_))));
    }
}
