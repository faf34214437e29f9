//! High-level Bitfinex client

use crate::builder::{validate_request, BfxClientBuilder};
use bfx_book::OrderBookSnapshot;
use bfx_types::{
    BfxResult, BookLength, Frequency, NewOrder, OrderCancel, OrderCancelMulti,
    OrderUpdate, Precision, SubscriptionId,
};
use bfx_ws::{
    ConnectionId, Dialer, EventReceiver, Multiplexer, Subscription, SubscriptionRequest, WsDialer,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};

/// High-level client for the Bitfinex WebSocket API
///
/// Wraps a pool of connections. Subscriptions are spread across sockets
/// automatically, and dropped sockets are reconnected and resubscribed.
///
/// # Example
///
/// ```no_run
/// use bfx_sdk::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = BfxClient::builder()
///         .with_book("tBTCUSD", Precision::P0)
///         .connect()
///         .await?;
///
///     let mut events = client.events().unwrap();
///     while let Some(event) = events.recv().await {
///         if let Event::Market(update) = event {
///             println!("{}: {:?}", update.target, update.event);
///         }
///         if let Some(spread) = client.spread("tBTCUSD") {
///             println!("spread: {}", spread);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct BfxClient {
    mux: Arc<Multiplexer>,
    event_rx: Option<EventReceiver>,
}

impl BfxClient {
    /// Create a new client builder
    pub fn builder() -> BfxClientBuilder {
        BfxClientBuilder::new()
    }

    /// Subscribe to a channel; the ack arrives on the event stream
    pub async fn subscribe(&self, request: SubscriptionRequest) -> BfxResult<SubscriptionId> {
        validate_request(&request)?;
        self.mux.subscribe(request).await
    }

    pub async fn subscribe_ticker(&self, symbol: impl Into<String>) -> BfxResult<SubscriptionId> {
        self.subscribe(SubscriptionRequest::ticker(symbol)).await
    }

    pub async fn subscribe_trades(&self, symbol: impl Into<String>) -> BfxResult<SubscriptionId> {
        self.subscribe(SubscriptionRequest::trades(symbol)).await
    }

    pub async fn subscribe_book(
        &self,
        symbol: impl Into<String>,
        precision: Precision,
        frequency: Frequency,
        length: BookLength,
    ) -> BfxResult<SubscriptionId> {
        self.subscribe(SubscriptionRequest::book(symbol, precision, frequency, length))
            .await
    }

    pub async fn subscribe_raw_book(
        &self,
        symbol: impl Into<String>,
        length: BookLength,
    ) -> BfxResult<SubscriptionId> {
        self.subscribe(SubscriptionRequest::raw_book(symbol, length)).await
    }

    pub async fn subscribe_candles(&self, key: impl Into<String>) -> BfxResult<SubscriptionId> {
        self.subscribe(SubscriptionRequest::candles(key)).await
    }

    pub async fn subscribe_status(&self, key: impl Into<String>) -> BfxResult<SubscriptionId> {
        self.subscribe(SubscriptionRequest::status(key)).await
    }

    pub async fn unsubscribe(&self, id: &SubscriptionId) -> BfxResult<()> {
        self.mux.unsubscribe(id).await
    }

    /// Authenticate with the configured credentials
    pub async fn authenticate(&self) -> BfxResult<()> {
        self.mux.authenticate().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.mux.is_authenticated()
    }

    pub async fn submit_order(&self, order: NewOrder) -> BfxResult<()> {
        self.mux.submit_order(order).await
    }

    pub async fn update_order(&self, update: OrderUpdate) -> BfxResult<()> {
        self.mux.update_order(update).await
    }

    pub async fn cancel_order(&self, cancel: OrderCancel) -> BfxResult<()> {
        self.mux.cancel_order(cancel).await
    }

    pub async fn cancel_orders(&self, cancel: OrderCancelMulti) -> BfxResult<()> {
        self.mux.cancel_orders(cancel).await
    }

    pub async fn ping(&self, cid: i64) -> BfxResult<()> {
        self.mux.ping(cid).await
    }

    /// Copy of the book replica at a precision
    pub fn order_book(&self, symbol: &str, precision: Precision) -> Option<OrderBookSnapshot> {
        self.mux.order_book(symbol, precision)
    }

    /// Get the best bid of the P0 book
    pub fn best_bid(&self, symbol: &str) -> Option<Decimal> {
        self.order_book(symbol, Precision::P0)
            .and_then(|book| book.best_bid_price())
    }

    /// Get the best ask of the P0 book
    pub fn best_ask(&self, symbol: &str) -> Option<Decimal> {
        self.order_book(symbol, Precision::P0)
            .and_then(|book| book.best_ask_price())
    }

    pub fn spread(&self, symbol: &str) -> Option<Decimal> {
        self.order_book(symbol, Precision::P0)
            .and_then(|book| book.spread())
    }

    pub fn mid_price(&self, symbol: &str) -> Option<Decimal> {
        self.order_book(symbol, Precision::P0)
            .and_then(|book| book.mid_price())
    }

    /// Check if the P0 book for a symbol is synced
    pub fn is_synced(&self, symbol: &str) -> bool {
        self.order_book(symbol, Precision::P0)
            .map(|book| book.is_synced())
            .unwrap_or(false)
    }

    pub fn subscription(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.mux.subscription(id)
    }

    /// Acknowledged subscriptions, ordered by connection
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.mux.subscriptions()
    }

    pub async fn connection_count(&self) -> usize {
        self.mux.connection_count().await
    }

    /// Subscription count per live connection
    pub async fn slot_counts(&self) -> Vec<(ConnectionId, usize)> {
        self.mux.slot_counts().await
    }

    /// Take the event receiver (can only be called once)
    ///
    /// Returns `None` if `events()` has already been called.
    pub fn events(&mut self) -> Option<EventReceiver> {
        self.event_rx.take()
    }

    pub fn is_closed(&self) -> bool {
        self.mux.is_closed()
    }

    /// Close every connection and wait for background tasks
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.mux.close().await;
    }
}

impl std::fmt::Debug for BfxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BfxClient").field("mux", &self.mux).finish()
    }
}

impl BfxClientBuilder {
    /// Connect, authenticate if configured, and place the queued subscriptions
    #[instrument(skip(self), fields(url = %self.config.url, subscriptions = self.subscriptions.len()))]
    pub async fn connect(self) -> BfxResult<BfxClient> {
        self.validate()?;
        let authenticate = self.will_authenticate();

        let dialer: Arc<dyn Dialer> = match self.dialer {
            Some(dialer) => dialer,
            None => Arc::new(WsDialer::new(self.config.verify_tls)),
        };
        let mux = Arc::new(Multiplexer::new(self.config, dialer));
        let event_rx = mux.take_events();

        if authenticate {
            if let Err(e) = mux.authenticate().await {
                mux.close().await;
                return Err(e);
            }
        }
        for request in self.subscriptions {
            if let Err(e) = mux.subscribe(request).await {
                mux.close().await;
                return Err(e);
            }
        }

        let connections = mux.connection_count().await;
        info!(connections, "Bitfinex client connected");
        Ok(BfxClient { mux, event_rx })
    }
}
