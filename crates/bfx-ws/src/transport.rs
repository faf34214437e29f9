//! WebSocket transport
//!
//! A [`Transport`] owns one socket and three tasks: a reader that forwards
//! inbound text frames, a writer that drains a bounded outbound queue and
//! sends keep-alive pings, and a supervisor that tears both down when either
//! ends and publishes the [`DisconnectReason`] exactly once.
//!
//! Any read or write error is terminal. The transport never reconnects on its
//! own; that is the session's job one layer up.
//!
//! Sockets are produced by a [`Dialer`], so tests can swap the network for a
//! [`MockDialer`] and play the exchange side themselves.

use crate::events::DisconnectReason;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, Connector, MaybeTlsStream,
    WebSocketStream,
};
use tracing::{debug, instrument, trace, warn};

/// Transport layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    #[error("transport closed")]
    Closed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("tls error: {0}")]
    Tls(String),
}

impl From<TransportError> for bfx_types::BfxError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => Self::Closed,
            TransportError::Timeout(timeout) => Self::ConnectionTimeout {
                url: String::new(),
                timeout,
            },
            TransportError::ConnectionFailed(reason) | TransportError::Tls(reason) => {
                Self::ConnectionFailed {
                    url: String::new(),
                    reason,
                }
            }
            other => Self::WebSocket(other.to_string()),
        }
    }
}

/// Frame received from the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// Reply to a keep-alive ping; carries no data but proves liveness
    Pong,
}

/// Frame written to the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
}

/// Write half of a dialed socket
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Outbound) -> Result<(), TransportError>;

    /// Send a close frame; errors are not interesting at this point
    async fn close(&mut self);
}

/// Read half of a dialed socket
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the peer closed the socket
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}

/// Opens sockets
#[async_trait]
pub trait Dialer: Send + Sync + fmt::Debug {
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError>;
}

// ============================================================================
// tokio-tungstenite dialer
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Real dialer over tokio-tungstenite and native-tls
#[derive(Debug, Clone)]
pub struct WsDialer {
    verify_tls: bool,
}

impl WsDialer {
    pub fn new(verify_tls: bool) -> Self {
        Self { verify_tls }
    }

    fn connector(&self) -> Result<Option<Connector>, TransportError> {
        if self.verify_tls {
            return Ok(None);
        }
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        Ok(Some(Connector::NativeTls(tls)))
    }
}

impl Default for WsDialer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Dialer for WsDialer {
    #[instrument(skip(self), fields(verify_tls = self.verify_tls))]
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError> {
        if !self.verify_tls {
            warn!("TLS certificate verification is disabled");
        }
        let (stream, _response) = connect_async_tls_with_config(url, None, false, self.connector()?)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (sink, source) = stream.split();
        Ok((Box::new(WsSink { inner: sink }), Box::new(WsSource { inner: source })))
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Outbound) -> Result<(), TransportError> {
        let message = match frame {
            Outbound::Text(text) => Message::Text(text),
            Outbound::Ping => Message::Ping(Vec::new()),
        };
        self.inner
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Inbound::Text(text))),
                Some(Ok(Message::Binary(data))) => {
                    let text = String::from_utf8(data)
                        .map_err(|e| TransportError::Protocol(e.to_string()))?;
                    return Ok(Some(Inbound::Text(text)));
                }
                Some(Ok(Message::Pong(_))) => return Ok(Some(Inbound::Pong)),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Received close frame");
                    return Ok(None);
                }
                // tungstenite answers pings itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Tuning for one transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Capacity of the outbound queue
    pub write_buffer: usize,
    /// Capacity of the inbound frame channel
    pub read_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(10),
            write_buffer: 256,
            read_buffer: 1024,
        }
    }
}

/// Lifecycle of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    /// Shutdown signalled; tasks are winding down
    Closing,
    /// All tasks finished
    Closed,
}

struct Shared {
    state: Mutex<LinkState>,
    /// Reason supplied by whoever initiated the close
    requested: Mutex<Option<DisconnectReason>>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    /// Move to Closing; returns false if already closing or closed
    fn begin_closing(&self) -> bool {
        let mut state = self.state.lock();
        if *state != LinkState::Connected {
            return false;
        }
        *state = LinkState::Closing;
        drop(state);
        let _ = self.shutdown.send(true);
        true
    }
}

/// One live socket
pub struct Transport {
    url: String,
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Outbound>,
    inbound: Mutex<Option<mpsc::Receiver<Inbound>>>,
    done: watch::Receiver<Option<DisconnectReason>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Dial `url` and start the reader, writer and supervisor tasks
    #[instrument(skip(dialer, config), fields(url = %url))]
    pub async fn connect(
        dialer: &dyn Dialer,
        url: &str,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        debug!("Connecting");
        let (sink, source) = timeout(config.connect_timeout, dialer.dial(url))
            .await
            .map_err(|_| TransportError::Timeout(config.connect_timeout))??;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(LinkState::Connected),
            requested: Mutex::new(None),
            shutdown: shutdown_tx,
        });
        let (outbound_tx, outbound_rx) = mpsc::channel(config.write_buffer.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(config.read_buffer.max(1));
        let (done_tx, done_rx) = watch::channel(None);

        let reader = tokio::spawn(read_loop(source, inbound_tx, shutdown_rx.clone()));
        let writer = tokio::spawn(write_loop(
            sink,
            outbound_rx,
            shutdown_rx,
            config.keepalive_interval,
        ));
        let supervisor = tokio::spawn(supervise(reader, writer, Arc::clone(&shared), done_tx));

        debug!("Connected");
        Ok(Self {
            url: url.to_string(),
            shared,
            outbound: outbound_tx,
            inbound: Mutex::new(Some(inbound_rx)),
            done: done_rx,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Take the inbound frame stream; it ends when the connection ends
    ///
    /// Returns `None` after the first call.
    pub fn take_inbound(&self) -> Option<mpsc::Receiver<Inbound>> {
        self.inbound.lock().take()
    }

    /// Queue a text frame, waiting for room in the write queue
    #[instrument(skip(self, frame), fields(len = frame.len()))]
    pub async fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        trace!(frame = %frame, "Queueing frame");
        self.outbound
            .send(Outbound::Text(frame))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Like [`send`](Self::send), giving up after `deadline`
    ///
    /// A timed-out frame was never queued, so nothing reaches the wire.
    pub async fn send_timeout(&self, frame: String, deadline: Duration) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send_timeout(Outbound::Text(frame), deadline)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => TransportError::Timeout(deadline),
                mpsc::error::SendTimeoutError::Closed(_) => TransportError::Closed,
            })
    }

    /// Start a client-initiated shutdown
    pub fn close(&self) {
        self.close_with(DisconnectReason::ClientClosed);
    }

    /// Start a shutdown reported as `reason`; later calls are ignored
    pub fn close_with(&self, reason: DisconnectReason) {
        let mut requested = self.shared.requested.lock();
        if *self.shared.state.lock() != LinkState::Connected || requested.is_some() {
            return;
        }
        *requested = Some(reason);
        drop(requested);
        self.shared.begin_closing();
    }

    /// Wait until every task has finished and return why the link ended
    pub async fn closed(&self) -> DisconnectReason {
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let mut done = self.done.clone();
        loop {
            if let Some(reason) = done.borrow().clone() {
                return reason;
            }
            if done.changed().await.is_err() {
                return DisconnectReason::ClientClosed;
            }
        }
    }

    /// Close and wait for the tasks to finish
    pub async fn shutdown(&self) -> DisconnectReason {
        self.close();
        self.closed().await
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shared.begin_closing();
    }
}

async fn read_loop(
    mut source: Box<dyn FrameSource>,
    inbound: mpsc::Sender<Inbound>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<DisconnectReason> {
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => return None,
            frame = source.recv() => frame,
        };
        match frame {
            Ok(Some(frame)) => {
                tokio::select! {
                    _ = shutdown.changed() => return None,
                    sent = inbound.send(frame) => {
                        if sent.is_err() {
                            return None;
                        }
                    }
                }
            }
            Ok(None) => return Some(DisconnectReason::ServerClosed),
            Err(e) => {
                warn!(error = %e, "Read failed");
                return Some(DisconnectReason::NetworkError(e.to_string()));
            }
        }
    }
}

async fn write_loop(
    mut sink: Box<dyn FrameSink>,
    mut outbound: mpsc::Receiver<Outbound>,
    mut shutdown: watch::Receiver<bool>,
    keepalive: Duration,
) -> Option<DisconnectReason> {
    // First tick one interval from now, not immediately
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break None,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break None,
            },
            _ = ticker.tick() => Outbound::Ping,
        };
        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "Write failed");
            break Some(DisconnectReason::NetworkError(e.to_string()));
        }
    };

    outbound.close();
    sink.close().await;
    reason
}

async fn supervise(
    mut reader: JoinHandle<Option<DisconnectReason>>,
    mut writer: JoinHandle<Option<DisconnectReason>>,
    shared: Arc<Shared>,
    done: watch::Sender<Option<DisconnectReason>>,
) {
    let (observed, remaining) = tokio::select! {
        result = &mut reader => (result.ok().flatten(), writer),
        result = &mut writer => (result.ok().flatten(), reader),
    };

    shared.begin_closing();
    let _ = remaining.await;

    let reason = shared
        .requested
        .lock()
        .take()
        .or(observed)
        .unwrap_or(DisconnectReason::ClientClosed);
    *shared.state.lock() = LinkState::Closed;
    debug!(reason = %reason, "Transport closed");
    let _ = done.send(Some(reason));
}

// ============================================================================
// Test utilities
// ============================================================================

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockDialer, MockServer, MockServers};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    enum ClientFrame {
        Text(String),
        Ping,
        Close,
    }

    /// In-memory dialer; each dial hands the exchange side to the test
    #[derive(Debug, Clone)]
    pub struct MockDialer {
        servers: mpsc::UnboundedSender<MockServer>,
        failures: Arc<AtomicUsize>,
        dials: Arc<AtomicUsize>,
    }

    impl MockDialer {
        /// Create a dialer and the stream of server ends it produces
        pub fn new() -> (Self, MockServers) {
            let (tx, rx) = mpsc::unbounded_channel();
            let dialer = Self {
                servers: tx,
                failures: Arc::new(AtomicUsize::new(0)),
                dials: Arc::new(AtomicUsize::new(0)),
            };
            (dialer, MockServers { rx })
        }

        /// Make the next `count` dials fail
        pub fn fail_next(&self, count: usize) {
            self.failures.store(count, Ordering::SeqCst);
        }

        /// Number of dial attempts so far, failed ones included
        pub fn dial_count(&self) -> usize {
            self.dials.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Dialer for MockDialer {
        async fn dial(
            &self,
            url: &str,
        ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(TransportError::ConnectionFailed("mock dial refused".into()));
            }

            let (to_client, from_server) = mpsc::unbounded_channel();
            let (to_server, from_client) = mpsc::unbounded_channel();
            let server = MockServer {
                url: url.to_string(),
                to_client,
                from_client,
                pings: 0,
                client_closed: false,
            };
            self.servers
                .send(server)
                .map_err(|_| TransportError::ConnectionFailed("mock server gone".into()))?;

            Ok((
                Box::new(MockSink { tx: to_server }),
                Box::new(MockSource { rx: from_server }),
            ))
        }
    }

    /// Server ends of every successful dial, in order
    #[derive(Debug)]
    pub struct MockServers {
        rx: mpsc::UnboundedReceiver<MockServer>,
    }

    impl MockServers {
        /// Wait for the next connection
        pub async fn next(&mut self) -> Option<MockServer> {
            self.rx.recv().await
        }

        /// Wait for the next connection, giving up after `deadline`
        pub async fn next_within(&mut self, deadline: Duration) -> Option<MockServer> {
            timeout(deadline, self.rx.recv()).await.ok().flatten()
        }
    }

    /// The exchange side of one mock socket
    ///
    /// Dropping it looks like the server closing the connection.
    #[derive(Debug)]
    pub struct MockServer {
        url: String,
        to_client: mpsc::UnboundedSender<Result<Option<Inbound>, TransportError>>,
        from_client: mpsc::UnboundedReceiver<ClientFrame>,
        pings: usize,
        client_closed: bool,
    }

    impl MockServer {
        pub fn url(&self) -> &str {
            &self.url
        }

        /// Push a text frame to the client
        pub fn send(&self, frame: impl Into<String>) {
            let _ = self.to_client.send(Ok(Some(Inbound::Text(frame.into()))));
        }

        pub fn send_json(&self, value: Value) {
            self.send(value.to_string());
        }

        pub fn pong(&self) {
            let _ = self.to_client.send(Ok(Some(Inbound::Pong)));
        }

        /// Fail the client's next read
        pub fn fail(&self, error: impl Into<String>) {
            let _ = self
                .to_client
                .send(Err(TransportError::ReceiveFailed(error.into())));
        }

        /// Close the socket from the server side
        pub fn close(&self) {
            let _ = self.to_client.send(Ok(None));
        }

        /// Next text frame from the client; `None` once the client is gone
        pub async fn recv(&mut self) -> Option<String> {
            loop {
                match self.from_client.recv().await? {
                    ClientFrame::Text(text) => return Some(text),
                    ClientFrame::Ping => self.pings += 1,
                    ClientFrame::Close => {
                        self.client_closed = true;
                        return None;
                    }
                }
            }
        }

        pub async fn recv_json(&mut self) -> Option<Value> {
            let text = self.recv().await?;
            serde_json::from_str(&text).ok()
        }

        /// Skip frames until an event object named `event` arrives
        pub async fn expect_event(&mut self, event: &str) -> Option<Value> {
            loop {
                let value = self.recv_json().await?;
                if value.get("event").and_then(Value::as_str) == Some(event) {
                    return Some(value);
                }
            }
        }

        /// Wait for the client's close frame or hang-up
        pub async fn wait_closed(&mut self) {
            while self.recv().await.is_some() {}
        }

        pub fn pings(&self) -> usize {
            self.pings
        }

        pub fn client_closed(&self) -> bool {
            self.client_closed
        }
    }

    struct MockSink {
        tx: mpsc::UnboundedSender<ClientFrame>,
    }

    #[async_trait]
    impl FrameSink for MockSink {
        async fn send(&mut self, frame: Outbound) -> Result<(), TransportError> {
            let frame = match frame {
                Outbound::Text(text) => ClientFrame::Text(text),
                Outbound::Ping => ClientFrame::Ping,
            };
            self.tx
                .send(frame)
                .map_err(|_| TransportError::SendFailed("mock server dropped".into()))
        }

        async fn close(&mut self) {
            let _ = self.tx.send(ClientFrame::Close);
        }
    }

    struct MockSource {
        rx: mpsc::UnboundedReceiver<Result<Option<Inbound>, TransportError>>,
    }

    #[async_trait]
    impl FrameSource for MockSource {
        async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
            match self.rx.recv().await {
                Some(frame) => frame,
                None => Ok(None),
            }
        }
    }
}
