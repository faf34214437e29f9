//! Connection pool that shards subscriptions across sockets
//!
//! The exchange caps channel subscriptions per socket. The multiplexer keeps
//! an ordered list of [`Session`] slots and places each new subscription on
//! the newest slot with room, opening another slot once every slot is full.
//! All slots publish into one event stream.

use crate::config::ClientConfig;
use crate::dispatch::{BookStore, Dispatcher};
use crate::events::Event;
use crate::session::{Session, SessionContext, SessionState};
use crate::subscription::{ConnectionId, Subscription, SubscriptionRegistry, SubscriptionRequest};
use crate::trading::OrderRequest;
use crate::transport::Dialer;
use bfx_book::OrderBookSnapshot;
use bfx_types::{
    BfxError, BfxResult, NewOrder, OrderCancel, OrderCancelMulti, OrderUpdate, Precision,
    SubscriptionId,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Capacity-aware pool of connection slots
pub struct Multiplexer {
    ctx: Arc<SessionContext>,
    slots: tokio::sync::Mutex<Vec<Arc<Session>>>,
    /// The slot `authenticate` succeeded on
    authenticated: Mutex<Option<Arc<Session>>>,
    events: Mutex<Option<mpsc::Receiver<Event>>>,
    next_connection: AtomicU64,
    closed: AtomicBool,
}

impl Multiplexer {
    /// Create a pool; no socket is opened until the first request
    pub fn new(config: ClientConfig, dialer: Arc<dyn Dialer>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&config.nonce)));
        let books: BookStore = Arc::new(DashMap::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), books, config.manage_order_books);

        Self {
            ctx: Arc::new(SessionContext {
                config: Arc::new(config),
                dialer,
                registry,
                dispatcher,
                events: events_tx,
            }),
            slots: tokio::sync::Mutex::new(Vec::new()),
            authenticated: Mutex::new(None),
            events: Mutex::new(Some(events_rx)),
            next_connection: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.ctx.config
    }

    /// Take the event stream; returns `None` after the first call
    pub fn take_events(&self) -> Option<mpsc::Receiver<Event>> {
        self.events.lock().take()
    }

    /// Place a subscription on a slot with room and send it
    ///
    /// Returns as soon as the request is on the wire; the acknowledgement
    /// arrives as [`SubscriptionEvent::Subscribed`](crate::SubscriptionEvent).
    #[instrument(skip(self), fields(request = %request))]
    pub async fn subscribe(&self, request: SubscriptionRequest) -> BfxResult<SubscriptionId> {
        self.ensure_open()?;
        let (session, sub) = {
            let mut slots = self.slots.lock().await;
            self.check_duplicate_book(&request)?;
            slots.retain(|slot| slot.is_usable());
            let capacity = self.ctx.config.capacity_per_connection;
            let session = match slots
                .iter()
                .rev()
                .find(|slot| self.ctx.registry.count_for(slot.id()) < capacity)
            {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot = self.open_slot().await?;
                    slots.push(Arc::clone(&slot));
                    info!(connection = %slot.id(), slots = slots.len(), "Opened connection slot");
                    slot
                }
            };
            let sub = self.ctx.registry.add(request, session.id());
            (session, sub)
        };

        if let Err(e) = session.send_subscribe(&sub).await {
            warn!(subscription = %sub.id, error = %e, "Subscribe failed");
            self.ctx.registry.remove_by_subscription_id(&sub.id);
            return Err(e);
        }
        Ok(sub.id)
    }

    /// Send an unsubscribe for an acknowledged subscription
    ///
    /// The entry is released when the exchange confirms.
    #[instrument(skip(self), fields(subscription = %id))]
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> BfxResult<()> {
        self.ensure_open()?;
        let sub = self
            .ctx
            .registry
            .lookup_by_subscription_id(id)
            .ok_or_else(|| BfxError::SubscriptionNotFound(id.to_string()))?;
        if sub.channel_id.is_none() {
            return Err(BfxError::SubscriptionPending(id.to_string()));
        }
        let session = self.session(sub.connection).await.ok_or(BfxError::Closed)?;
        session.send_unsubscribe(id).await
    }

    /// Authenticate the first slot, opening one if needed
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> BfxResult<()> {
        self.ensure_open()?;
        if self.ctx.config.credentials.is_none() {
            return Err(BfxError::MissingCredentials);
        }
        let session = {
            let mut slots = self.slots.lock().await;
            slots.retain(|slot| slot.is_usable());
            match slots.first() {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot = self.open_slot().await?;
                    slots.push(Arc::clone(&slot));
                    slot
                }
            }
        };
        session.authenticate().await?;
        info!(connection = %session.id(), "Authenticated");
        *self.authenticated.lock() = Some(session);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
            .lock()
            .as_ref()
            .map_or(false, |session| session.is_authenticated())
    }

    pub async fn submit_order(&self, order: NewOrder) -> BfxResult<()> {
        self.send_order(order.into()).await
    }

    pub async fn update_order(&self, update: OrderUpdate) -> BfxResult<()> {
        self.send_order(update.into()).await
    }

    pub async fn cancel_order(&self, cancel: OrderCancel) -> BfxResult<()> {
        self.send_order(cancel.into()).await
    }

    pub async fn cancel_orders(&self, cancel: OrderCancelMulti) -> BfxResult<()> {
        self.send_order(cancel.into()).await
    }

    /// Send an application-level ping on the first slot
    pub async fn ping(&self, cid: i64) -> BfxResult<()> {
        self.ensure_open()?;
        let session = {
            let slots = self.slots.lock().await;
            slots.iter().find(|slot| slot.is_usable()).cloned()
        };
        session.ok_or(BfxError::Closed)?.ping(cid).await
    }

    /// Snapshot of the local replica for `symbol` at `precision`
    pub fn order_book(&self, symbol: &str, precision: Precision) -> Option<OrderBookSnapshot> {
        self.ctx.dispatcher.order_book(symbol, precision)
    }

    pub fn subscription(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.ctx.registry.lookup_by_subscription_id(id)
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut subs = self.ctx.registry.active();
        subs.sort_by_key(|sub| sub.connection);
        subs
    }

    /// Number of live connection slots
    pub async fn connection_count(&self) -> usize {
        self.slots
            .lock()
            .await
            .iter()
            .filter(|slot| slot.state() != SessionState::Closed)
            .count()
    }

    /// Subscription count of each live slot, in slot order
    pub async fn slot_counts(&self) -> Vec<(ConnectionId, usize)> {
        self.slots
            .lock()
            .await
            .iter()
            .filter(|slot| slot.state() != SessionState::Closed)
            .map(|slot| (slot.id(), self.ctx.registry.count_for(slot.id())))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close every slot and wait for their tasks
    #[instrument(skip(self))]
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let slots: Vec<_> = self.slots.lock().await.drain(..).collect();
        for slot in &slots {
            slot.close().await;
        }
        self.authenticated.lock().take();
        info!(slots = slots.len(), "Multiplexer closed");
    }

    async fn send_order(&self, request: OrderRequest) -> BfxResult<()> {
        self.ensure_open()?;
        request.validate()?;
        let session = self
            .authenticated
            .lock()
            .clone()
            .filter(|session| session.is_authenticated())
            .ok_or(BfxError::NotAuthenticated)?;
        session.send_order(&request).await
    }

    /// One replica per symbol and precision, so [`order_book`](Self::order_book)
    /// is unambiguous
    fn check_duplicate_book(&self, request: &SubscriptionRequest) -> BfxResult<()> {
        if !self.ctx.config.manage_order_books || !request.is_replicable_book() {
            return Ok(());
        }
        let (Some(symbol), Some(precision)) = (request.symbol.as_deref(), request.precision) else {
            return Ok(());
        };
        match self.ctx.registry.find_book(symbol, precision) {
            Some(existing) => Err(BfxError::InvalidRequest(format!(
                "book {symbol} {precision} already subscribed as {}",
                existing.id
            ))),
            None => Ok(()),
        }
    }

    async fn open_slot(&self) -> BfxResult<Arc<Session>> {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::SeqCst));
        debug!(connection = %id, "Opening connection slot");
        Session::open(id, Arc::clone(&self.ctx)).await
    }

    async fn session(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.slots
            .lock()
            .await
            .iter()
            .find(|slot| slot.id() == id)
            .cloned()
    }

    fn ensure_open(&self) -> BfxResult<()> {
        if self.is_closed() {
            Err(BfxError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("url", &self.ctx.config.url)
            .field("subscriptions", &self.ctx.registry.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
