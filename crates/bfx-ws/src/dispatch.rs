//! Frame classification and dispatch
//!
//! Every inbound text frame is one of:
//!
//! * an event object (`{"event": ...}`), which updates the registry and
//!   becomes a connection/subscription event
//! * a channel-data array (`[chanId, ...]`), routed by the registry entry of
//!   `chanId` to the matching factory, or to the account decoder for channel 0
//! * anything else, which is logged and dropped
//!
//! A bad frame never stops dispatch; it only costs that frame.

use crate::events::{ConnectionEvent, Event, MarketEvent, MarketUpdate, SubscriptionEvent};
use crate::factory::{build_account_event, factory_for};
use crate::subscription::{ConnectionId, Subscription, SubscriptionRegistry};
use bfx_book::{OrderBook, OrderBookSnapshot};
use bfx_types::wire::is_snapshot;
use bfx_types::{
    AuthEvent, Channel, ChannelId, EventMessage, Precision, SubscribedEvent, SubscriptionId,
    ACCOUNT_CHANNEL,
};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const HEARTBEAT: &str = "hb";
const CHECKSUM: &str = "cs";

/// Local book replicas keyed by the subscription that feeds them
pub type BookStore = Arc<DashMap<SubscriptionId, OrderBook>>;

/// Turns raw frames into events
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    books: BookStore,
    manage_books: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>, books: BookStore, manage_books: bool) -> Self {
        Self {
            registry,
            books,
            manage_books,
        }
    }

    /// Classify and decode one frame received on `connection`
    pub fn dispatch(&self, connection: ConnectionId, text: &str) -> Vec<Event> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(%connection, error = %e, "Dropping frame that is not JSON");
                return Vec::new();
            }
        };

        match value {
            Value::Object(_) => self.handle_event(connection, value),
            Value::Array(items) => self.handle_channel(connection, &items),
            other => {
                warn!(%connection, frame = %other, "Dropping unexpected frame");
                Vec::new()
            }
        }
    }

    /// Copy of the replica for `symbol` at `precision`
    pub fn order_book(&self, symbol: &str, precision: Precision) -> Option<OrderBookSnapshot> {
        self.books
            .iter()
            .find(|entry| entry.symbol() == symbol && entry.precision() == precision)
            .map(|entry| entry.snapshot())
    }

    /// Drop the replica fed by `subscription`
    pub fn discard_book(&self, subscription: &SubscriptionId) {
        self.books.remove(subscription);
    }

    fn handle_event(&self, connection: ConnectionId, value: Value) -> Vec<Event> {
        let name = value
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let message = match EventMessage::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                debug!(%connection, event = %name, error = %e, "Ignoring unrecognized event");
                return Vec::new();
            }
        };

        let event = match message {
            EventMessage::Info(info) => {
                if info.requests_reconnect() {
                    info!(%connection, "Server asked clients to reconnect");
                } else if info.is_maintenance() {
                    info!(%connection, code = ?info.code, msg = ?info.msg, "Maintenance notice");
                }
                Event::connection_event(
                    connection,
                    ConnectionEvent::Info {
                        version: info.version,
                        code: info.code,
                        message: info.msg,
                    },
                )
            }
            EventMessage::Auth(auth) => Event::connection_event(connection, auth_event(auth)),
            EventMessage::Subscribed(subscribed) => {
                return self.on_subscribed(connection, subscribed).into_iter().collect();
            }
            EventMessage::Unsubscribed(unsubscribed) => {
                let Some(sub) = self
                    .registry
                    .remove_by_channel_id(connection, unsubscribed.chan_id)
                else {
                    debug!(%connection, chan_id = unsubscribed.chan_id, "Unsubscribed from unknown channel");
                    return Vec::new();
                };
                self.discard_book(&sub.id);
                debug!(%connection, subscription = %sub.id, "Unsubscribed");
                Event::subscription_event(
                    connection,
                    SubscriptionEvent::Unsubscribed {
                        subscription: sub.id,
                        channel_id: unsubscribed.chan_id,
                    },
                )
            }
            EventMessage::Error(error) => {
                let removed = error
                    .sub_id
                    .as_deref()
                    .map(SubscriptionId::new)
                    .and_then(|id| self.registry.remove_by_subscription_id(&id));
                match removed {
                    Some(sub) => {
                        warn!(
                            %connection,
                            subscription = %sub.id,
                            request = %sub.request,
                            code = error.code,
                            msg = %error.msg,
                            "Subscription rejected"
                        );
                        Event::subscription_event(
                            connection,
                            SubscriptionEvent::Rejected {
                                subscription: sub.id,
                                code: error.code,
                                message: error.msg,
                            },
                        )
                    }
                    None => {
                        warn!(%connection, code = error.code, msg = %error.msg, "Exchange error");
                        Event::Error {
                            connection,
                            code: error.code,
                            message: error.msg,
                        }
                    }
                }
            }
            EventMessage::Conf(conf) => {
                let flags = conf.flags.unwrap_or_default();
                if conf.status.as_deref().is_some_and(|s| s != "OK") {
                    warn!(%connection, flags, status = ?conf.status, "Conf rejected");
                }
                Event::connection_event(connection, ConnectionEvent::ConfAccepted { flags })
            }
            EventMessage::Pong(pong) => Event::connection_event(
                connection,
                ConnectionEvent::Pong {
                    cid: pong.cid,
                    ts: pong.ts,
                },
            ),
        };
        vec![event]
    }

    fn on_subscribed(&self, connection: ConnectionId, ack: SubscribedEvent) -> Option<Event> {
        let pending = match &ack.sub_id {
            Some(id) => self
                .registry
                .lookup_by_subscription_id(&SubscriptionId::new(id.as_str())),
            None => {
                let channel = Channel::parse(&ack.channel)?;
                let target = ack.symbol.as_deref().or(ack.key.as_deref()).unwrap_or_default();
                self.registry.find_pending(connection, channel, target)
            }
        };
        let Some(pending) = pending.filter(|s| s.connection == connection) else {
            debug!(%connection, chan_id = ack.chan_id, sub_id = ?ack.sub_id, "Ack for unknown subscription");
            return None;
        };

        let sub = match self.registry.activate(&pending.id, ack.chan_id) {
            Ok(sub) => sub,
            Err(e) => {
                debug!(%connection, error = %e, "Subscription removed before its ack");
                return None;
            }
        };
        debug!(%connection, subscription = %sub.id, chan_id = ack.chan_id, request = %sub.request, "Subscribed");
        Some(Event::subscription_event(
            connection,
            SubscriptionEvent::Subscribed {
                subscription: sub.id.clone(),
                channel_id: ack.chan_id,
                channel: sub.request.channel,
                target: sub.request.target().to_string(),
            },
        ))
    }

    fn handle_channel(&self, connection: ConnectionId, items: &[Value]) -> Vec<Event> {
        let (Some(chan_id), Some(second)) = (items.first().and_then(Value::as_u64), items.get(1))
        else {
            warn!(%connection, "Dropping malformed channel frame");
            return Vec::new();
        };

        if second.as_str() == Some(HEARTBEAT) {
            return vec![Event::Heartbeat {
                connection,
                channel_id: chan_id,
            }];
        }

        if chan_id == ACCOUNT_CHANNEL {
            return self.handle_account(connection, second, items.get(2));
        }

        let Some(sub) = self.registry.lookup_by_channel_id(connection, chan_id) else {
            debug!(%connection, chan_id, "Dropping data for unknown channel");
            return Vec::new();
        };

        let (msg_type, payload) = match second.as_str() {
            Some(CHECKSUM) => {
                return self.handle_checksum(connection, chan_id, &sub, items.get(2));
            }
            Some(mnemonic) => match items.get(2) {
                Some(payload) => (Some(mnemonic), payload),
                None => {
                    warn!(%connection, chan_id, mnemonic, "Dropping frame without payload");
                    return Vec::new();
                }
            },
            None => (None, second),
        };

        let factory = factory_for(sub.request.channel);
        let decoded = if msg_type.is_none() && is_snapshot(payload) {
            factory.build_snapshot(&sub.request, payload)
        } else {
            factory.build(&sub.request, msg_type, payload)
        };
        let event = match decoded {
            Ok(event) => event,
            Err(e) => {
                warn!(%connection, chan_id, request = %sub.request, error = %e, "Dropping undecodable frame");
                return Vec::new();
            }
        };

        if self.manage_books && sub.request.is_replicable_book() {
            self.apply_to_book(&sub, &event);
        }
        vec![market_update(connection, chan_id, &sub, event)]
    }

    fn handle_account(
        &self,
        connection: ConnectionId,
        mnemonic: &Value,
        payload: Option<&Value>,
    ) -> Vec<Event> {
        let Some(mnemonic) = mnemonic.as_str() else {
            warn!(%connection, "Dropping account frame without a message type");
            return Vec::new();
        };
        let payload = payload.unwrap_or(&Value::Null);
        match build_account_event(mnemonic, payload) {
            Ok(event) => vec![Event::account_event(connection, event)],
            Err(e) => {
                warn!(%connection, mnemonic, error = %e, "Dropping undecodable account frame");
                Vec::new()
            }
        }
    }

    fn handle_checksum(
        &self,
        connection: ConnectionId,
        chan_id: ChannelId,
        sub: &Subscription,
        value: Option<&Value>,
    ) -> Vec<Event> {
        let Some(expected) = value.and_then(Value::as_i64) else {
            warn!(%connection, chan_id, "Dropping checksum frame without a value");
            return Vec::new();
        };
        // Checksums are signed 32-bit on the wire
        let expected = expected as i32;

        let Some(mut book) = self.books.get_mut(&sub.id) else {
            trace!(%connection, chan_id, "Checksum for a book without a replica");
            return Vec::new();
        };
        if !book.is_synced() {
            return Vec::new();
        }
        let event = match book.verify(expected) {
            Ok(()) => MarketEvent::ChecksumVerified { checksum: expected },
            Err(mismatch) => {
                warn!(
                    %connection,
                    symbol = %mismatch.symbol,
                    expected = mismatch.expected,
                    computed = mismatch.computed,
                    "Order book checksum mismatch; resubscribe to resync"
                );
                MarketEvent::ChecksumMismatch {
                    expected: mismatch.expected,
                    computed: mismatch.computed,
                }
            }
        };
        drop(book);
        vec![market_update(connection, chan_id, sub, event)]
    }

    fn apply_to_book(&self, sub: &Subscription, event: &MarketEvent) {
        match event {
            MarketEvent::BookSnapshot(levels) => {
                let precision = sub.request.precision.unwrap_or_default();
                self.books
                    .entry(sub.id.clone())
                    .or_insert_with(|| OrderBook::new(sub.request.target(), precision))
                    .apply_snapshot(levels);
            }
            MarketEvent::BookUpdate(level) => {
                if let Some(mut book) = self.books.get_mut(&sub.id) {
                    book.apply_update(level);
                }
            }
            _ => {}
        }
    }
}

fn auth_event(auth: AuthEvent) -> ConnectionEvent {
    if auth.is_ok() {
        info!(user_id = ?auth.user_id, "Authenticated");
        ConnectionEvent::Authenticated {
            user_id: auth.user_id,
        }
    } else {
        let message = auth.msg.unwrap_or_else(|| auth.status.clone());
        warn!(code = ?auth.code, msg = %message, "Authentication failed");
        ConnectionEvent::AuthenticationFailed {
            code: auth.code,
            message,
        }
    }
}

fn market_update(
    connection: ConnectionId,
    channel_id: ChannelId,
    sub: &Subscription,
    event: MarketEvent,
) -> Event {
    Event::Market(MarketUpdate {
        connection,
        subscription: sub.id.clone(),
        channel_id,
        channel: sub.request.channel,
        target: sub.request.target().to_string(),
        event,
    })
}
