//! Client Builder Pattern
//!
//! Provides a fluent builder API for configuring the client, with the
//! initial subscriptions sent right after connecting.
//!
//! # Example
//!
//! ```
//! use bfx_sdk::builder::BfxClientBuilder;
//! use bfx_types::Precision;
//!
//! let builder = BfxClientBuilder::new()
//!     .with_ticker(["tBTCUSD", "tETHUSD"])
//!     .with_book("tBTCUSD", Precision::P0)
//!     .with_capacity_per_connection(20);
//! assert_eq!(builder.subscriptions.len(), 3);
//! ```

use bfx_auth::{Credentials, NonceGenerator};
use bfx_types::{BfxError, BookLength, Channel, Frequency, Precision, Symbol};
use bfx_ws::{ClientConfig, ConfigError, Dialer, Endpoint, ReconnectConfig, SubscriptionRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Builder validation error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuilderError {
    /// Symbol without a `t`/`f` prefix
    #[error("invalid symbol: {symbol} (expected tBTCUSD or fUSD style)")]
    InvalidSymbol { symbol: String },

    /// Candle or status key that is not `kind:...`
    #[error("invalid {channel} key: {key}")]
    InvalidKey { channel: Channel, key: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<BuilderError> for BfxError {
    fn from(err: BuilderError) -> Self {
        BfxError::Configuration(err.to_string())
    }
}

/// Builder for configuring a client
///
/// Holds the [`ClientConfig`] plus the subscriptions to place once connected.
#[derive(Debug, Clone)]
pub struct BfxClientBuilder {
    /// Connection configuration
    pub config: ClientConfig,

    /// Subscriptions sent by `connect`, in order
    pub subscriptions: Vec<SubscriptionRequest>,

    /// Authenticate during `connect` when credentials are set
    pub authenticate: bool,

    /// Dialer override; defaults to the TLS WebSocket dialer
    pub(crate) dialer: Option<Arc<dyn Dialer>>,
}

impl Default for BfxClientBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig::default(),
            subscriptions: Vec::new(),
            authenticate: true,
            dialer: None,
        }
    }
}

impl BfxClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config = self.config.with_endpoint(endpoint);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.with_url(url);
        self
    }

    /// Set API credentials; `connect` authenticates with them
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.config = self.config.with_credentials(credentials);
        self
    }

    /// Connect without sending `auth` even though credentials are set
    pub fn without_auto_auth(mut self) -> Self {
        self.authenticate = false;
        self
    }

    pub fn with_auth_filter(mut self, filter: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config = self
            .config
            .with_auth_filter(filter.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_dead_man_switch(mut self, enabled: bool) -> Self {
        self.config = self.config.with_dead_man_switch(enabled);
        self
    }

    /// Enable or disable automatic reconnection
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.config = self.config.without_reconnect();
        self
    }

    pub fn with_reconnect_config(mut self, reconnect: ReconnectConfig) -> Self {
        self.config = self.config.with_reconnect(reconnect);
        self
    }

    /// Set the connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_connect_timeout(timeout);
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_heartbeat_timeout(timeout);
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_keepalive_interval(interval);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_request_timeout(timeout);
        self
    }

    pub fn with_capacity_per_connection(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity_per_connection(capacity);
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.config = self.config.with_verify_tls(verify);
        self
    }

    pub fn with_conf_flags(mut self, flags: i64) -> Self {
        self.config = self.config.with_conf_flags(flags);
        self
    }

    /// Keep local book replicas (on by default)
    pub fn with_order_books(mut self, enabled: bool) -> Self {
        self.config = self.config.with_order_books(enabled);
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.config = self.config.with_event_buffer(capacity);
        self
    }

    pub fn with_nonce_generator(mut self, nonce: Arc<dyn NonceGenerator>) -> Self {
        self.config = self.config.with_nonce_generator(nonce);
        self
    }

    /// Use a custom dialer (tests, proxies)
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Subscribe to the ticker of each symbol
    pub fn with_ticker(mut self, symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.subscriptions
            .extend(symbols.into_iter().map(SubscriptionRequest::ticker));
        self
    }

    /// Subscribe to public trades of each symbol
    pub fn with_trades(mut self, symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.subscriptions
            .extend(symbols.into_iter().map(SubscriptionRequest::trades));
        self
    }

    /// Subscribe to a realtime book with 25 levels per side
    pub fn with_book(self, symbol: impl Into<String>, precision: Precision) -> Self {
        self.with_book_config(symbol, precision, Frequency::F0, BookLength::L25)
    }

    pub fn with_book_config(
        mut self,
        symbol: impl Into<String>,
        precision: Precision,
        frequency: Frequency,
        length: BookLength,
    ) -> Self {
        self.subscriptions.push(SubscriptionRequest::book(
            symbol, precision, frequency, length,
        ));
        self
    }

    pub fn with_raw_book(mut self, symbol: impl Into<String>, length: BookLength) -> Self {
        self.subscriptions
            .push(SubscriptionRequest::raw_book(symbol, length));
        self
    }

    /// Subscribe to candles, e.g. `trade:1m:tBTCUSD`
    pub fn with_candles(mut self, key: impl Into<String>) -> Self {
        self.subscriptions.push(SubscriptionRequest::candles(key));
        self
    }

    /// Subscribe to a status feed, e.g. `deriv:tBTCF0:USTF0` or `liq:global`
    pub fn with_status(mut self, key: impl Into<String>) -> Self {
        self.subscriptions.push(SubscriptionRequest::status(key));
        self
    }

    pub fn with_subscription(mut self, request: SubscriptionRequest) -> Self {
        self.subscriptions.push(request);
        self
    }

    /// Validate the configuration and every queued subscription
    pub fn validate(&self) -> Result<(), BuilderError> {
        self.config.validate()?;
        for request in &self.subscriptions {
            validate_request(request)?;
        }
        Ok(())
    }

    /// Build and validate the configuration
    ///
    /// Returns the validated builder if successful.
    pub fn build(self) -> Result<Self, BuilderError> {
        self.validate()?;
        Ok(self)
    }

    /// Whether `connect` will send `auth`
    pub fn will_authenticate(&self) -> bool {
        self.authenticate && self.config.credentials.is_some()
    }
}

/// Check a request before it goes on the wire
pub fn validate_request(request: &SubscriptionRequest) -> Result<(), BuilderError> {
    if let Some(symbol) = &request.symbol {
        symbol
            .parse::<Symbol>()
            .map_err(|_| BuilderError::InvalidSymbol {
                symbol: symbol.clone(),
            })?;
    }
    if let Some(key) = &request.key {
        let valid = match key.split_once(':') {
            Some((kind, rest)) => !kind.is_empty() && !rest.is_empty(),
            None => false,
        };
        if !valid {
            return Err(BuilderError::InvalidKey {
                channel: request.channel,
                key: key.clone(),
            });
        }
    }
    if request.channel == Channel::Book && request.symbol.is_none() {
        return Err(BuilderError::InvalidSymbol {
            symbol: String::new(),
        });
    }
    Ok(())
}
