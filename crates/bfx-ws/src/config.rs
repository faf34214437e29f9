//! Client configuration

use crate::endpoint::Endpoint;
use crate::reconnect::ReconnectConfig;
use crate::transport::TransportConfig;
use bfx_auth::{AuthResult, Credentials, EpochNonceGenerator, NonceGenerator};
use bfx_types::{conf_flags, AuthRequest, BfxError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The exchange allows this many channel subscriptions per socket
pub const MAX_SUBSCRIPTIONS_PER_CONNECTION: usize = 25;

/// Dead-man switch value that cancels all orders when the socket drops
const DMS_CANCEL_ALL: u8 = 4;

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid url {0:?}: expected ws:// or wss://")]
    InvalidUrl(String),

    #[error("capacity per connection must be between 1 and 25, got {0}")]
    InvalidCapacity(usize),

    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    #[error("{0} must be non-zero")]
    ZeroBuffer(&'static str),

    #[error("dead-man switch requires credentials")]
    DeadManSwitchWithoutCredentials,
}

impl From<ConfigError> for BfxError {
    fn from(err: ConfigError) -> Self {
        BfxError::Configuration(err.to_string())
    }
}

/// Configuration shared by every connection of a client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Reconnect and replay subscriptions when a connection drops
    pub auto_reconnect: bool,
    pub reconnect: ReconnectConfig,
    /// Force a reconnect after this long without any inbound frame
    ///
    /// Every frame counts, keep-alive pongs included. A socket that answers
    /// pings but delivers no channel data or `hb` is therefore kept open;
    /// only a silent socket trips the watchdog.
    pub heartbeat_timeout: Duration,
    /// Interval between WebSocket pings
    pub keepalive_interval: Duration,
    pub connect_timeout: Duration,
    /// How long to wait for an `auth` reply
    pub request_timeout: Duration,
    /// Subscriptions per socket before another socket is opened
    pub capacity_per_connection: usize,
    pub verify_tls: bool,
    pub credentials: Option<Credentials>,
    /// Account channel filter sent with `auth`
    pub auth_filter: Option<Vec<String>>,
    /// Ask the exchange to cancel all orders when the authenticated socket drops
    pub dead_man_switch: bool,
    /// Source of auth nonces and subscription IDs
    pub nonce: Arc<dyn NonceGenerator>,
    /// `conf` flags sent after every connect (0 sends nothing)
    pub conf_flags: i64,
    /// Keep local replicas of aggregated trading books
    pub manage_order_books: bool,
    /// Capacity of the shared event channel
    pub event_buffer: usize,
    /// Capacity of each socket's write queue
    pub write_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: Endpoint::Public.url().to_string(),
            auto_reconnect: true,
            reconnect: ReconnectConfig::default(),
            heartbeat_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            capacity_per_connection: MAX_SUBSCRIPTIONS_PER_CONNECTION,
            verify_tls: true,
            credentials: None,
            auth_filter: None,
            dead_man_switch: false,
            nonce: Arc::new(EpochNonceGenerator::new()),
            conf_flags: conf_flags::CHECKSUM,
            manage_order_books: true,
            event_buffer: 4096,
            write_buffer: 256,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_endpoint(self, endpoint: Endpoint) -> Self {
        self.with_url(endpoint.url())
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Surface disconnects as terminal instead of reconnecting
    pub fn without_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_capacity_per_connection(mut self, capacity: usize) -> Self {
        self.capacity_per_connection = capacity;
        self
    }

    /// Accept invalid certificates (test endpoints only)
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Set credentials, moving to the authenticated endpoint if the URL is
    /// still the public default
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        if self.url == Endpoint::Public.url() {
            self.url = Endpoint::Authenticated.url().to_string();
        }
        self.credentials = Some(credentials);
        self
    }

    pub fn with_auth_filter(mut self, filter: Vec<String>) -> Self {
        self.auth_filter = Some(filter);
        self
    }

    pub fn with_dead_man_switch(mut self, enabled: bool) -> Self {
        self.dead_man_switch = enabled;
        self
    }

    pub fn with_nonce_generator(mut self, nonce: Arc<dyn NonceGenerator>) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_conf_flags(mut self, flags: i64) -> Self {
        self.conf_flags = flags;
        self
    }

    pub fn with_order_books(mut self, enabled: bool) -> Self {
        self.manage_order_books = enabled;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn with_write_buffer(mut self, capacity: usize) -> Self {
        self.write_buffer = capacity;
        self
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("wss://") || self.url.starts_with("ws://")) {
            return Err(ConfigError::InvalidUrl(self.url.clone()));
        }
        if self.capacity_per_connection == 0
            || self.capacity_per_connection > MAX_SUBSCRIPTIONS_PER_CONNECTION
        {
            return Err(ConfigError::InvalidCapacity(self.capacity_per_connection));
        }
        for (name, value) in [
            ("heartbeat_timeout", self.heartbeat_timeout),
            ("keepalive_interval", self.keepalive_interval),
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::ZeroBuffer("event_buffer"));
        }
        if self.write_buffer == 0 {
            return Err(ConfigError::ZeroBuffer("write_buffer"));
        }
        if self.dead_man_switch && self.credentials.is_none() {
            return Err(ConfigError::DeadManSwitchWithoutCredentials);
        }
        Ok(())
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: self.connect_timeout,
            keepalive_interval: self.keepalive_interval,
            write_buffer: self.write_buffer,
            ..TransportConfig::default()
        }
    }

    /// Signed `auth` request with a fresh nonce, if credentials are set
    pub(crate) fn auth_request(&self) -> Option<AuthResult<AuthRequest>> {
        let credentials = self.credentials.as_ref()?;
        let dms = self.dead_man_switch.then_some(DMS_CANCEL_ALL);
        Some(credentials.auth_request(self.nonce.as_ref(), self.auth_filter.clone(), dms))
    }
}
