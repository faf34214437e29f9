//! Per-connection session supervisor
//!
//! A session owns one connection slot for its whole life. It pumps inbound
//! frames through the dispatcher in wire order and watches for silence. When
//! the transport ends it either gives up (auto-reconnect off, or the caller
//! closed it) or backs off, dials again, re-sends `conf` and `auth`, and
//! replays every subscription of the slot under fresh subscription IDs.

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::events::{ConnectionEvent, DisconnectReason, Event, SubscriptionEvent};
use crate::subscription::{ConnectionId, Subscription, SubscriptionRegistry};
use crate::trading::OrderRequest;
use crate::transport::{Dialer, Inbound, Transport, TransportError};
use bfx_types::{
    info_codes, BfxError, BfxResult, ConfRequest, PingRequest, Request, SubscriptionId,
    UnsubscribeRequest,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, trace, warn};

/// State shared by every session of a client
pub(crate) struct SessionContext {
    pub config: Arc<ClientConfig>,
    pub dialer: Arc<dyn Dialer>,
    pub registry: Arc<SubscriptionRegistry>,
    pub dispatcher: Dispatcher,
    pub events: mpsc::Sender<Event>,
}

/// Where a session is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Reconnecting,
    /// Terminal; the slot is dead
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthState {
    Unauthenticated,
    Pending,
    Authenticated,
    Failed(String),
}

/// One connection slot
pub(crate) struct Session {
    id: ConnectionId,
    ctx: Arc<SessionContext>,
    transport: RwLock<Option<Arc<Transport>>>,
    state: Mutex<SessionState>,
    auth: watch::Sender<AuthState>,
    /// Set once `authenticate` was called; replayed after reconnects
    wants_auth: Mutex<bool>,
    closing: watch::Sender<bool>,
    /// Serializes subscribe sends against reconnect replay
    link: tokio::sync::Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Connect and start the session task
    pub async fn open(id: ConnectionId, ctx: Arc<SessionContext>) -> BfxResult<Arc<Self>> {
        let url = ctx.config.url.clone();
        let transport = Transport::connect(ctx.dialer.as_ref(), &url, &ctx.config.transport_config())
            .await
            .map_err(|e| connect_error(&url, e))?;
        let transport = Arc::new(transport);
        let inbound = transport.take_inbound().ok_or(BfxError::Closed)?;
        info!(connection = %id, url = %url, "Connected");

        let session = Arc::new(Self {
            id,
            ctx,
            transport: RwLock::new(Some(Arc::clone(&transport))),
            state: Mutex::new(SessionState::Open),
            auth: watch::channel(AuthState::Unauthenticated).0,
            wants_auth: Mutex::new(false),
            closing: watch::channel(false).0,
            link: tokio::sync::Mutex::new(()),
            task: Mutex::new(None),
        });

        if let Err(e) = session.send_conf(&transport).await {
            transport.shutdown().await;
            return Err(e);
        }

        let task = tokio::spawn(Arc::clone(&session).run(transport, inbound));
        *session.task.lock() = Some(task);
        Ok(session)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// Whether new subscriptions may be placed on this slot
    pub fn is_usable(&self) -> bool {
        !self.is_closing() && self.state() != SessionState::Closed
    }

    pub fn is_authenticated(&self) -> bool {
        *self.auth.borrow() == AuthState::Authenticated
    }

    /// Send the subscribe frame for a registry entry of this slot
    ///
    /// If the link is down but will be restored, the entry stays in the
    /// registry and goes out with the replay instead.
    pub async fn send_subscribe(&self, sub: &Subscription) -> BfxResult<()> {
        let _link = self.link.lock().await;
        if self.ctx.registry.lookup_by_subscription_id(&sub.id).is_none() {
            // Already replayed under a new ID
            return Ok(());
        }
        let frame = Request::Subscribe(sub.request.to_wire(sub.id.clone())).to_json()?;
        match self.send_frame(frame).await {
            Ok(()) => {
                debug!(connection = %self.id, subscription = %sub.id, request = %sub.request, "Subscribe sent");
                Ok(())
            }
            Err(e) if self.will_recover() => {
                debug!(connection = %self.id, subscription = %sub.id, error = %e, "Link down; subscribe deferred to replay");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Send the unsubscribe frame for an acknowledged entry of this slot
    ///
    /// The entry is flagged only while the frame is known to be on its way;
    /// a failed send leaves it subscribed and replayable.
    pub async fn send_unsubscribe(&self, id: &SubscriptionId) -> BfxResult<()> {
        let _link = self.link.lock().await;
        let registry = &self.ctx.registry;
        let sub = registry
            .lookup_by_subscription_id(id)
            .ok_or_else(|| BfxError::SubscriptionNotFound(id.to_string()))?;
        let chan_id = sub
            .channel_id
            .ok_or_else(|| BfxError::SubscriptionPending(id.to_string()))?;

        let frame = Request::Unsubscribe(UnsubscribeRequest { chan_id }).to_json()?;
        registry.mark_unsubscribing(id)?;
        if let Err(e) = self.send_frame(frame).await {
            registry.clear_unsubscribing(id);
            return Err(e);
        }
        debug!(connection = %self.id, subscription = %id, chan_id, "Unsubscribe sent");
        Ok(())
    }

    /// Authenticate this slot and wait for the reply
    pub async fn authenticate(&self) -> BfxResult<()> {
        {
            let _link = self.link.lock().await;
            if self.is_authenticated() {
                return Ok(());
            }
            let transport = self.current_transport()?;
            *self.wants_auth.lock() = true;
            self.send_auth(&transport).await?;
        }
        self.wait_authenticated().await
    }

    pub async fn send_order(&self, request: &OrderRequest) -> BfxResult<()> {
        if !self.is_authenticated() {
            return Err(BfxError::NotAuthenticated);
        }
        let frame = request.to_frame()?;
        self.send_frame(frame).await?;
        debug!(connection = %self.id, kind = request.mnemonic(), "Order request sent");
        Ok(())
    }

    pub async fn ping(&self, cid: i64) -> BfxResult<()> {
        let frame = Request::Ping(PingRequest { cid }).to_json()?;
        self.send_frame(frame).await
    }

    /// Close for good and wait for the session task
    pub async fn close(&self) {
        self.closing.send_replace(true);
        let transport = self.transport.read().clone();
        if let Some(transport) = transport {
            transport.close();
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    // ------------------------------------------------------------------
    // Session task
    // ------------------------------------------------------------------

    async fn run(self: Arc<Self>, mut transport: Arc<Transport>, mut inbound: mpsc::Receiver<Inbound>) {
        self.emit(ConnectionEvent::Connected {
            url: transport.url().to_string(),
        })
        .await;
        loop {
            let reason = self.pump(&transport, &mut inbound).await;
            self.auth.send_replace(AuthState::Unauthenticated);

            let retry = self.ctx.config.auto_reconnect && !self.is_closing();
            if retry {
                warn!(connection = %self.id, reason = %reason, "Disconnected; reconnecting");
            } else {
                info!(connection = %self.id, reason = %reason, "Disconnected");
            }
            self.emit(ConnectionEvent::Disconnected {
                reason,
                will_reconnect: retry,
            })
            .await;
            if !retry {
                break;
            }

            *self.state.lock() = SessionState::Reconnecting;
            match self.reconnect().await {
                Some((next, next_inbound)) => {
                    transport = next;
                    inbound = next_inbound;
                }
                None => {
                    if self.is_closing() {
                        self.emit(ConnectionEvent::Disconnected {
                            reason: DisconnectReason::ClientClosed,
                            will_reconnect: false,
                        })
                        .await;
                    }
                    break;
                }
            }
        }
        self.finish();
    }

    /// Dispatch frames until the transport ends
    ///
    /// The watchdog deadline moves only when a frame arrives.
    async fn pump(&self, transport: &Transport, inbound: &mut mpsc::Receiver<Inbound>) -> DisconnectReason {
        let heartbeat = self.ctx.config.heartbeat_timeout;
        let mut closing = self.closing.subscribe();
        let mut close_seen = *closing.borrow_and_update();
        if close_seen {
            transport.close();
        }
        let idle = sleep(heartbeat);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                changed = closing.changed(), if !close_seen => {
                    close_seen = changed.is_err() || *closing.borrow_and_update();
                    if close_seen {
                        transport.close();
                    }
                }
                () = &mut idle => {
                    warn!(connection = %self.id, timeout = ?heartbeat, "No frames within heartbeat timeout");
                    transport.close_with(DisconnectReason::HeartbeatTimeout);
                    idle.as_mut().reset(Instant::now() + heartbeat);
                }
                frame = inbound.recv() => {
                    idle.as_mut().reset(Instant::now() + heartbeat);
                    match frame {
                        Some(Inbound::Text(text)) => {
                            for event in self.ctx.dispatcher.dispatch(self.id, &text) {
                                self.observe(transport, &event);
                                self.emit_event(event).await;
                            }
                        }
                        Some(Inbound::Pong) => trace!(connection = %self.id, "Pong"),
                        None => return transport.closed().await,
                    }
                }
            }
        }
    }

    /// React to events that change session state
    fn observe(&self, transport: &Transport, event: &Event) {
        let Event::Connection { event, .. } = event else {
            return;
        };
        match event {
            ConnectionEvent::Info {
                code: Some(info_codes::RECONNECT),
                ..
            } => transport.close_with(DisconnectReason::ReconnectRequested),
            ConnectionEvent::Authenticated { .. } => {
                self.auth.send_replace(AuthState::Authenticated);
            }
            ConnectionEvent::AuthenticationFailed { message, .. } => {
                *self.wants_auth.lock() = false;
                self.auth.send_replace(AuthState::Failed(message.clone()));
            }
            _ => {}
        }
    }

    /// Back off and dial until connected, closed, or out of attempts
    async fn reconnect(&self) -> Option<(Arc<Transport>, mpsc::Receiver<Inbound>)> {
        let url = &self.ctx.config.url;
        let mut closing = self.closing.subscribe();
        let mut backoff = self.ctx.config.reconnect.backoff();
        // Fresh ID -> the ID callers last saw, across failed restores
        let mut origins = HashMap::new();

        loop {
            if *closing.borrow_and_update() {
                return None;
            }
            let Some(delay) = backoff.next_delay() else {
                let attempts = backoff.attempts();
                error!(connection = %self.id, attempts, error = backoff.last_error(), "Reconnect attempts exhausted");
                self.emit(ConnectionEvent::ReconnectFailed {
                    attempts,
                    error: backoff.last_error().to_string(),
                })
                .await;
                return None;
            };

            let attempt = backoff.attempts();
            info!(connection = %self.id, attempt, delay = ?delay, "Reconnecting");
            self.emit(ConnectionEvent::Reconnecting { attempt, delay }).await;

            tokio::select! {
                _ = sleep(delay) => {}
                _ = closing.changed() => return None,
            }

            let transport = match Transport::connect(
                self.ctx.dialer.as_ref(),
                url,
                &self.ctx.config.transport_config(),
            )
            .await
            {
                Ok(transport) => Arc::new(transport),
                Err(e) => {
                    warn!(connection = %self.id, attempt, error = %e, "Reconnect attempt failed");
                    backoff.record_failure(e);
                    continue;
                }
            };

            if self.is_closing() {
                transport.shutdown().await;
                return None;
            }
            match self.restore(&transport, &mut origins).await {
                Ok(inbound) => {
                    info!(connection = %self.id, attempt, "Reconnected");
                    return Some((transport, inbound));
                }
                Err(e) => {
                    warn!(connection = %self.id, attempt, error = %e, "Restore after reconnect failed");
                    backoff.record_failure(e);
                    transport.shutdown().await;
                }
            }
        }
    }

    /// Bring a fresh transport to the state the old one had
    ///
    /// Events are emitted only after the link lock is released, so a full
    /// event buffer never blocks callers waiting to send.
    async fn restore(
        &self,
        transport: &Arc<Transport>,
        origins: &mut HashMap<SubscriptionId, SubscriptionId>,
    ) -> BfxResult<mpsc::Receiver<Inbound>> {
        let inbound = transport.take_inbound().ok_or(BfxError::Closed)?;

        let (replayed, released) = {
            let _link = self.link.lock().await;
            self.send_conf(transport).await?;
            let wants_auth = *self.wants_auth.lock();
            if wants_auth {
                self.send_auth(transport).await?;
            }

            *self.transport.write() = Some(Arc::clone(transport));
            *self.state.lock() = SessionState::Open;

            // Channel IDs die with the old socket. Entries are re-keyed
            // before anything is sent, so a failed send leaves them queued
            // for the next attempt.
            let reissue = self.ctx.registry.reissue_connection(self.id);
            let mut replayed = Vec::with_capacity(reissue.replayed.len());
            for (old, fresh) in reissue.replayed {
                self.ctx.dispatcher.discard_book(&old.id);
                let origin = origins.remove(&old.id).unwrap_or(old.id);
                origins.insert(fresh.id.clone(), origin.clone());
                replayed.push((origin, fresh));
            }
            let mut released = Vec::with_capacity(reissue.released.len());
            for old in reissue.released {
                self.ctx.dispatcher.discard_book(&old.id);
                let origin = origins.remove(&old.id).unwrap_or_else(|| old.id.clone());
                released.push((origin, old));
            }

            for (_, fresh) in &replayed {
                let frame = Request::Subscribe(fresh.request.to_wire(fresh.id.clone())).to_json()?;
                transport.send(frame).await?;
            }
            (replayed, released)
        };

        self.emit(ConnectionEvent::Connected {
            url: transport.url().to_string(),
        })
        .await;
        for (origin, old) in released {
            if let Some(channel_id) = old.channel_id {
                self.emit(SubscriptionEvent::Unsubscribed {
                    subscription: origin,
                    channel_id,
                })
                .await;
            }
        }
        for (origin, fresh) in &replayed {
            self.emit(SubscriptionEvent::Resubscribed {
                previous: origin.clone(),
                subscription: fresh.id.clone(),
            })
            .await;
        }

        info!(connection = %self.id, count = replayed.len(), "Subscriptions replayed");
        self.emit(ConnectionEvent::SubscriptionsRestored {
            count: replayed.len(),
        })
        .await;
        Ok(inbound)
    }

    /// Release the slot's registry entries and books
    fn finish(&self) {
        *self.state.lock() = SessionState::Closed;
        for sub in self.ctx.registry.for_connection(self.id) {
            self.ctx.dispatcher.discard_book(&sub.id);
        }
        self.ctx.registry.reset_connection(self.id);
        self.transport.write().take();
        debug!(connection = %self.id, "Session finished");
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn will_recover(&self) -> bool {
        self.ctx.config.auto_reconnect && self.is_usable()
    }

    fn current_transport(&self) -> BfxResult<Arc<Transport>> {
        self.transport.read().clone().ok_or(BfxError::Closed)
    }

    async fn send_frame(&self, frame: String) -> BfxResult<()> {
        let transport = self.current_transport()?;
        transport.send(frame).await.map_err(BfxError::from)
    }

    async fn send_conf(&self, transport: &Transport) -> BfxResult<()> {
        let flags = self.ctx.config.conf_flags;
        if flags == 0 {
            return Ok(());
        }
        transport
            .send(Request::Conf(ConfRequest { flags }).to_json()?)
            .await?;
        debug!(connection = %self.id, flags, "Conf sent");
        Ok(())
    }

    async fn send_auth(&self, transport: &Transport) -> BfxResult<()> {
        let request = self
            .ctx
            .config
            .auth_request()
            .ok_or(BfxError::MissingCredentials)?
            .map_err(|e| BfxError::AuthenticationFailed {
                reason: e.to_string(),
            })?;
        self.auth.send_replace(AuthState::Pending);
        transport.send(Request::Auth(request).to_json()?).await?;
        info!(connection = %self.id, "Auth sent");
        Ok(())
    }

    async fn wait_authenticated(&self) -> BfxResult<()> {
        let deadline = self.ctx.config.request_timeout;
        let mut auth = self.auth.subscribe();
        let wait = async {
            loop {
                let state = auth.borrow_and_update().clone();
                match state {
                    AuthState::Authenticated => return Ok(()),
                    AuthState::Failed(reason) => {
                        return Err(BfxError::AuthenticationFailed { reason })
                    }
                    AuthState::Pending | AuthState::Unauthenticated => {}
                }
                if auth.changed().await.is_err() {
                    return Err(BfxError::Closed);
                }
            }
        };
        timeout(deadline, wait)
            .await
            .map_err(|_| BfxError::AuthenticationFailed {
                reason: format!("no auth reply within {deadline:?}"),
            })?
    }

    async fn emit(&self, event: impl Into<SessionEvent>) {
        let event = match event.into() {
            SessionEvent::Connection(event) => Event::connection_event(self.id, event),
            SessionEvent::Subscription(event) => Event::subscription_event(self.id, event),
        };
        self.emit_event(event).await;
    }

    /// Publish an event, unless the session is closed while waiting for room
    async fn emit_event(&self, event: Event) {
        let closing = self.closing.subscribe();
        tokio::select! {
            biased;
            sent = self.ctx.events.send(event) => {
                if sent.is_err() {
                    trace!(connection = %self.id, "Event receiver dropped");
                }
            }
            () = until_closing(closing) => {
                debug!(connection = %self.id, "Event buffer full while closing; event dropped");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Events a session reports about itself
enum SessionEvent {
    Connection(ConnectionEvent),
    Subscription(SubscriptionEvent),
}

impl From<ConnectionEvent> for SessionEvent {
    fn from(event: ConnectionEvent) -> Self {
        Self::Connection(event)
    }
}

impl From<SubscriptionEvent> for SessionEvent {
    fn from(event: SubscriptionEvent) -> Self {
        Self::Subscription(event)
    }
}

async fn until_closing(mut closing: watch::Receiver<bool>) {
    let _ = closing.wait_for(|closing| *closing).await;
}

fn connect_error(url: &str, err: TransportError) -> BfxError {
    match err {
        TransportError::Timeout(timeout) => BfxError::ConnectionTimeout {
            url: url.to_string(),
            timeout,
        },
        other => BfxError::ConnectionFailed {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}
