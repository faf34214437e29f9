//! Subscription registry
//!
//! Channel IDs are assigned by the exchange, are local to one socket and are
//! reused after a reconnect, so the registry keys every subscription by a
//! client-generated [`SubscriptionId`] and keeps a second index from
//! `(connection, chanId)` to that ID. Both indices live behind one lock and
//! are always updated together.

use bfx_auth::NonceGenerator;
use bfx_types::{
    is_funding_symbol, BfxError, BfxResult, BookLength, Channel, ChannelId, Frequency, Precision,
    SubscribeRequest, SubscriptionId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifies one physical connection slot of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What to subscribe to; survives reconnects unchanged
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionRequest {
    pub channel: Channel,
    /// Symbol for ticker, trades and book channels
    pub symbol: Option<String>,
    /// Key for candles and status channels
    pub key: Option<String>,
    pub precision: Option<Precision>,
    pub frequency: Option<Frequency>,
    pub length: Option<BookLength>,
}

impl SubscriptionRequest {
    fn for_symbol(channel: Channel, symbol: impl Into<String>) -> Self {
        Self {
            channel,
            symbol: Some(symbol.into()),
            key: None,
            precision: None,
            frequency: None,
            length: None,
        }
    }

    fn for_key(channel: Channel, key: impl Into<String>) -> Self {
        Self {
            channel,
            symbol: None,
            key: Some(key.into()),
            precision: None,
            frequency: None,
            length: None,
        }
    }

    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self::for_symbol(Channel::Ticker, symbol)
    }

    pub fn trades(symbol: impl Into<String>) -> Self {
        Self::for_symbol(Channel::Trades, symbol)
    }

    /// Aggregated book (P0..P4) or raw book (R0)
    pub fn book(
        symbol: impl Into<String>,
        precision: Precision,
        frequency: Frequency,
        length: BookLength,
    ) -> Self {
        Self {
            precision: Some(precision),
            frequency: Some(frequency),
            length: Some(length),
            ..Self::for_symbol(Channel::Book, symbol)
        }
    }

    /// Raw book, one entry per order or offer
    pub fn raw_book(symbol: impl Into<String>, length: BookLength) -> Self {
        Self::book(symbol, Precision::R0, Frequency::F0, length)
    }

    /// Candles keyed like `trade:1m:tBTCUSD`
    pub fn candles(key: impl Into<String>) -> Self {
        Self::for_key(Channel::Candles, key)
    }

    /// Derivative status (`deriv:tBTCF0:USTF0`) or liquidations (`liq:global`)
    pub fn status(key: impl Into<String>) -> Self {
        Self::for_key(Channel::Status, key)
    }

    /// The symbol or key this request targets
    pub fn target(&self) -> &str {
        self.symbol
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or_default()
    }

    pub fn is_funding(&self) -> bool {
        self.symbol.as_deref().is_some_and(is_funding_symbol)
    }

    pub fn is_raw_book(&self) -> bool {
        self.channel == Channel::Book && self.precision.is_some_and(|p| p.is_raw())
    }

    /// Whether the client can keep a local replica for this request
    pub fn is_replicable_book(&self) -> bool {
        self.channel == Channel::Book && !self.is_raw_book() && !self.is_funding()
    }

    /// Build the wire request for this descriptor
    pub fn to_wire(&self, sub_id: SubscriptionId) -> SubscribeRequest {
        let request = match (&self.symbol, &self.key) {
            (Some(symbol), _) => SubscribeRequest::symbol(self.channel, symbol.clone(), sub_id),
            (None, Some(key)) => SubscribeRequest::keyed(self.channel, key.clone(), sub_id),
            (None, None) => SubscribeRequest::keyed(self.channel, String::new(), sub_id),
        };
        match (self.precision, self.frequency, self.length) {
            (Some(prec), freq, len) => request.with_book(
                prec,
                freq.unwrap_or(Frequency::F0),
                len.unwrap_or(BookLength::L25),
            ),
            _ => request,
        }
    }
}

impl fmt::Display for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.target())?;
        if let Some(prec) = self.precision {
            write!(f, ":{prec}")?;
        }
        Ok(())
    }
}

/// Outcome of [`SubscriptionRegistry::reissue_connection`]
#[derive(Debug, Default)]
pub struct Reissue {
    /// `(before, after)` pairs, oldest first
    pub replayed: Vec<(Subscription, Subscription)>,
    /// Entries whose unsubscribe was in flight; they are gone
    pub released: Vec<Subscription>,
}

/// Lifecycle of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Subscribe sent, waiting for `subscribed`
    Pending,
    /// Acknowledged; channel data flows on `channel_id`
    Active,
}

/// A registry entry
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub channel_id: Option<ChannelId>,
    pub request: SubscriptionRequest,
    pub state: SubscriptionState,
    pub connection: ConnectionId,
    /// Unsubscribe sent, waiting for `unsubscribed`
    pub unsubscribing: bool,
    seq: u64,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_id: HashMap<SubscriptionId, Subscription>,
    by_channel: HashMap<(ConnectionId, ChannelId), SubscriptionId>,
    next_seq: u64,
}

impl RegistryInner {
    fn unindex(&mut self, sub: &Subscription) {
        if let Some(chan_id) = sub.channel_id {
            let key = (sub.connection, chan_id);
            if self.by_channel.get(&key) == Some(&sub.id) {
                self.by_channel.remove(&key);
            }
        }
    }
}

/// Correlates wire channel IDs with stable subscription identity
pub struct SubscriptionRegistry {
    inner: RwLock<RegistryInner>,
    nonces: Arc<dyn NonceGenerator>,
}

impl SubscriptionRegistry {
    pub fn new(nonces: Arc<dyn NonceGenerator>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            nonces,
        }
    }

    /// Create a pending entry with a fresh ID
    pub fn add(&self, request: SubscriptionRequest, connection: ConnectionId) -> Subscription {
        let id = SubscriptionId::new(self.nonces.next());
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let sub = Subscription {
            id: id.clone(),
            channel_id: None,
            request,
            state: SubscriptionState::Pending,
            connection,
            unsubscribing: false,
            seq,
        };
        inner.by_id.insert(id, sub.clone());
        sub
    }

    /// Mark an entry active on `chan_id` and index it
    pub fn activate(&self, id: &SubscriptionId, chan_id: ChannelId) -> BfxResult<Subscription> {
        let mut inner = self.inner.write();
        let previous = inner
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| BfxError::SubscriptionNotFound(id.to_string()))?;
        inner.unindex(&previous);

        let connection = previous.connection;
        inner.by_channel.insert((connection, chan_id), id.clone());
        let sub = inner
            .by_id
            .get_mut(id)
            .ok_or_else(|| BfxError::SubscriptionNotFound(id.to_string()))?;
        sub.channel_id = Some(chan_id);
        sub.state = SubscriptionState::Active;
        Ok(sub.clone())
    }

    pub fn lookup_by_channel_id(
        &self,
        connection: ConnectionId,
        chan_id: ChannelId,
    ) -> Option<Subscription> {
        let inner = self.inner.read();
        inner
            .by_channel
            .get(&(connection, chan_id))
            .and_then(|id| inner.by_id.get(id))
            .cloned()
    }

    pub fn lookup_by_subscription_id(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Find a pending entry by request, for acks that omit `subId`
    pub fn find_pending(
        &self,
        connection: ConnectionId,
        channel: Channel,
        target: &str,
    ) -> Option<Subscription> {
        self.inner
            .read()
            .by_id
            .values()
            .filter(|s| {
                s.connection == connection
                    && s.state == SubscriptionState::Pending
                    && s.request.channel == channel
                    && s.request.target() == target
            })
            .min_by_key(|s| s.seq)
            .cloned()
    }

    pub fn remove_by_channel_id(
        &self,
        connection: ConnectionId,
        chan_id: ChannelId,
    ) -> Option<Subscription> {
        let mut inner = self.inner.write();
        let id = inner.by_channel.remove(&(connection, chan_id))?;
        inner.by_id.remove(&id)
    }

    pub fn remove_by_subscription_id(&self, id: &SubscriptionId) -> Option<Subscription> {
        let mut inner = self.inner.write();
        let sub = inner.by_id.remove(id)?;
        inner.unindex(&sub);
        Some(sub)
    }

    /// Flag an entry as awaiting its `unsubscribed` ack
    pub fn mark_unsubscribing(&self, id: &SubscriptionId) -> BfxResult<Subscription> {
        let mut inner = self.inner.write();
        let sub = inner
            .by_id
            .get_mut(id)
            .ok_or_else(|| BfxError::SubscriptionNotFound(id.to_string()))?;
        sub.unsubscribing = true;
        Ok(sub.clone())
    }

    /// Undo [`mark_unsubscribing`](Self::mark_unsubscribing) after a failed send
    pub fn clear_unsubscribing(&self, id: &SubscriptionId) {
        if let Some(sub) = self.inner.write().by_id.get_mut(id) {
            sub.unsubscribing = false;
        }
    }

    /// Any entry already feeding a replica of `symbol` at `precision`
    pub fn find_book(&self, symbol: &str, precision: Precision) -> Option<Subscription> {
        self.inner
            .read()
            .by_id
            .values()
            .find(|s| {
                s.request.is_replicable_book()
                    && s.request.symbol.as_deref() == Some(symbol)
                    && s.request.precision == Some(precision)
            })
            .cloned()
    }

    /// Entries owned by `connection`, counting pending ones
    pub fn count_for(&self, connection: ConnectionId) -> usize {
        self.inner
            .read()
            .by_id
            .values()
            .filter(|s| s.connection == connection)
            .count()
    }

    /// Drain every entry of `connection`, oldest first
    ///
    /// Entries that were being unsubscribed are dropped rather than returned.
    pub fn reset_connection(&self, connection: ConnectionId) -> Vec<Subscription> {
        let mut inner = self.inner.write();
        let ids: Vec<_> = inner
            .by_id
            .values()
            .filter(|s| s.connection == connection)
            .map(|s| s.id.clone())
            .collect();
        inner.by_channel.retain(|(conn, _), _| *conn != connection);

        let mut drained: Vec<_> = ids
            .iter()
            .filter_map(|id| inner.by_id.remove(id))
            .filter(|s| !s.unsubscribing)
            .collect();
        drained.sort_by_key(|s| s.seq);
        drained
    }

    /// Re-key every entry of `connection` for replay on a fresh socket
    ///
    /// Channel indices are dropped, each surviving entry goes back to
    /// Pending under a fresh ID with its place in line kept, and entries that
    /// were being unsubscribed are released. All of it happens under one
    /// write lock, so the connection's count never dips while it runs.
    pub fn reissue_connection(&self, connection: ConnectionId) -> Reissue {
        let mut inner = self.inner.write();
        inner.by_channel.retain(|(conn, _), _| *conn != connection);

        let ids: Vec<_> = inner
            .by_id
            .values()
            .filter(|s| s.connection == connection)
            .map(|s| s.id.clone())
            .collect();
        let mut previous: Vec<_> = ids.iter().filter_map(|id| inner.by_id.remove(id)).collect();
        previous.sort_by_key(|s| s.seq);

        let mut reissue = Reissue::default();
        for old in previous {
            if old.unsubscribing {
                reissue.released.push(old);
                continue;
            }
            let fresh = Subscription {
                id: SubscriptionId::new(self.nonces.next()),
                channel_id: None,
                state: SubscriptionState::Pending,
                unsubscribing: false,
                ..old.clone()
            };
            inner.by_id.insert(fresh.id.clone(), fresh.clone());
            reissue.replayed.push((old, fresh));
        }
        reissue
    }

    /// Entries owned by `connection`, oldest first
    pub fn for_connection(&self, connection: ConnectionId) -> Vec<Subscription> {
        let mut subs: Vec<_> = self
            .inner
            .read()
            .by_id
            .values()
            .filter(|s| s.connection == connection)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.seq);
        subs
    }

    /// All acknowledged entries
    pub fn active(&self) -> Vec<Subscription> {
        let mut subs: Vec<_> = self
            .inner
            .read()
            .by_id
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.seq);
        subs
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SubscriptionRegistry")
            .field("entries", &inner.by_id.len())
            .field("active", &inner.by_channel.len())
            .finish()
    }
}
