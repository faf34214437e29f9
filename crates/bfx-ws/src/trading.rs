//! Order requests on the authenticated channel
//!
//! Requests are written as `[0, mnemonic, null, payload]`. Replies arrive
//! asynchronously as `n` notifications and order updates on channel 0.

use bfx_types::{BfxError, BfxResult, NewOrder, OrderCancel, OrderCancelMulti, OrderUpdate};
use serde_json::{json, Value};

/// A trading request
#[derive(Debug, Clone, PartialEq)]
pub enum OrderRequest {
    New(NewOrder),
    Update(OrderUpdate),
    Cancel(OrderCancel),
    CancelMulti(OrderCancelMulti),
}

impl OrderRequest {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::New(_) => "on",
            Self::Update(_) => "ou",
            Self::Cancel(_) => "oc",
            Self::CancelMulti(_) => "oc_multi",
        }
    }

    /// Reject requests the exchange would refuse anyway
    pub fn validate(&self) -> BfxResult<()> {
        match self {
            Self::New(order) if order.amount.is_zero() => {
                Err(BfxError::InvalidRequest("order amount must be non-zero".into()))
            }
            Self::New(order) if order.symbol.is_empty() => {
                Err(BfxError::InvalidRequest("order symbol is empty".into()))
            }
            Self::CancelMulti(cancel) if cancel.is_empty() => Err(BfxError::InvalidRequest(
                "oc_multi needs ids, gids or all".into(),
            )),
            _ => Ok(()),
        }
    }

    /// The JSON text sent on the wire
    pub fn to_frame(&self) -> BfxResult<String> {
        self.validate()?;
        let payload = match self {
            Self::New(order) => serde_json::to_value(order)?,
            Self::Update(update) => serde_json::to_value(update)?,
            Self::Cancel(cancel) => serde_json::to_value(cancel)?,
            Self::CancelMulti(cancel) => serde_json::to_value(cancel)?,
        };
        Ok(json!([0, self.mnemonic(), Value::Null, payload]).to_string())
    }
}

impl From<NewOrder> for OrderRequest {
    fn from(order: NewOrder) -> Self {
        Self::New(order)
    }
}

impl From<OrderUpdate> for OrderRequest {
    fn from(update: OrderUpdate) -> Self {
        Self::Update(update)
    }
}

impl From<OrderCancel> for OrderRequest {
    fn from(cancel: OrderCancel) -> Self {
        Self::Cancel(cancel)
    }
}

impl From<OrderCancelMulti> for OrderRequest {
    fn from(cancel: OrderCancelMulti) -> Self {
        Self::CancelMulti(cancel)
    }
}
