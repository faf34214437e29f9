//! Order request payloads (`on`, `ou`, `oc`, `oc_multi`)
//!
//! These are sent as the fourth element of `[0, MNEMONIC, null, PAYLOAD]` on
//! an authenticated connection. Amounts and prices are always serialized as
//! decimal strings.

use crate::enums::OrderType;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

/// Order flags (combine with bitwise OR)
pub mod order_flags {
    pub const HIDDEN: i64 = 64;
    pub const CLOSE: i64 = 512;
    pub const REDUCE_ONLY: i64 = 1024;
    pub const POST_ONLY: i64 = 4096;
    pub const OCO: i64 = 16384;
    pub const NO_VAR_RATES: i64 = 524288;
}

/// New order (`on`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    pub cid: i64,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub symbol: String,
    /// Positive to buy, negative to sell
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lev: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price_trailing: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price_aux_limit: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price_oco_stop: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<i64>,
    /// Auto-cancel time, `YYYY-MM-DD HH:MM:SS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl NewOrder {
    /// Create a limit order
    pub fn limit(
        cid: i64,
        order_type: OrderType,
        symbol: impl Into<String>,
        amount: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            price: Some(price),
            ..Self::market(cid, order_type, symbol, amount)
        }
    }

    /// Create an order without a price
    pub fn market(cid: i64, order_type: OrderType, symbol: impl Into<String>, amount: Decimal) -> Self {
        Self {
            gid: None,
            cid,
            order_type,
            symbol: symbol.into(),
            amount,
            price: None,
            lev: None,
            price_trailing: None,
            price_aux_limit: None,
            price_oco_stop: None,
            flags: None,
            tif: None,
            meta: None,
        }
    }

    pub fn with_gid(mut self, gid: i64) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn with_flags(mut self, flags: i64) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_leverage(mut self, lev: u32) -> Self {
        self.lev = Some(lev);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Order update (`ou`)
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OrderUpdate {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub amount: Option<Decimal>,
    /// Change of amount, applied to the current remaining amount
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub delta: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price_aux_limit: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price_trailing: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tif: Option<String>,
}

impl OrderUpdate {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_delta(mut self, delta: Decimal) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// Order cancel (`oc`), by exchange ID or by client ID and date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OrderCancel {
    ById {
        id: i64,
    },
    ByClientId {
        cid: i64,
        /// Creation date of the order, `YYYY-MM-DD`
        cid_date: String,
    },
}

impl OrderCancel {
    pub fn by_id(id: i64) -> Self {
        Self::ById { id }
    }

    pub fn by_cid(cid: i64, cid_date: impl Into<String>) -> Self {
        Self::ByClientId {
            cid,
            cid_date: cid_date.into(),
        }
    }
}

/// Multiple order cancel (`oc_multi`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct OrderCancelMulti {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Vec<i64>>,
    /// `[cid, cid_date]` pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<Vec<(i64, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<Vec<i64>>,
    /// 1 cancels every open order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<u8>,
}

impl OrderCancelMulti {
    pub fn ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            id: Some(ids.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn groups(gids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            gid: Some(gids.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self {
            all: Some(1),
            ..Default::default()
        }
    }

    /// Returns true if no selector was set
    pub fn is_empty(&self) -> bool {
        self.id.as_ref().map_or(true, Vec::is_empty)
            && self.cid.as_ref().map_or(true, Vec::is_empty)
            && self.gid.as_ref().map_or(true, Vec::is_empty)
            && self.all.is_none()
    }
}
