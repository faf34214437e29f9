//! Event objects and outgoing requests
//!
//! Control traffic is JSON objects discriminated by their `event` field.
//! Channel data (arrays) is handled by the positional records in
//! [`crate::market`] and [`crate::account`].

use crate::enums::{BookLength, Channel, Frequency, Precision};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Server-assigned, connection-local channel identifier
pub type ChannelId = u64;

/// The authenticated account channel
pub const ACCOUNT_CHANNEL: ChannelId = 0;

/// Client-assigned subscription identifier, echoed back as `subId`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Codes carried by `info` events
pub mod info_codes {
    /// Server is restarting; clients should reconnect
    pub const RECONNECT: i64 = 20051;
    /// Maintenance mode entered; channels stop updating
    pub const MAINTENANCE_START: i64 = 20060;
    /// Maintenance mode left; clients should resubscribe
    pub const MAINTENANCE_END: i64 = 20061;
}

/// Codes carried by `error` events
pub mod error_codes {
    pub const UNKNOWN_EVENT: i64 = 10000;
    pub const UNKNOWN_PAIR: i64 = 10001;
    pub const SUBSCRIPTION_FAILED: i64 = 10300;
    pub const ALREADY_SUBSCRIBED: i64 = 10301;
    pub const UNKNOWN_CHANNEL: i64 = 10302;
    pub const CHANNEL_LIMIT: i64 = 10305;
    pub const UNSUBSCRIPTION_FAILED: i64 = 10400;
    pub const NOT_SUBSCRIBED: i64 = 10401;
}

// ============================================================================
// Inbound events
// ============================================================================

/// Control message received from the exchange
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum EventMessage {
    Info(InfoEvent),
    Auth(AuthEvent),
    Subscribed(SubscribedEvent),
    Unsubscribed(UnsubscribedEvent),
    Error(ErrorEvent),
    Conf(ConfEvent),
    Pong(PongEvent),
}

impl EventMessage {
    /// Parse an event object
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Event name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::Auth(_) => "auth",
            Self::Subscribed(_) => "subscribed",
            Self::Unsubscribed(_) => "unsubscribed",
            Self::Error(_) => "error",
            Self::Conf(_) => "conf",
            Self::Pong(_) => "pong",
        }
    }
}

/// `info`: sent on connect (with `version`) and for server notices (with `code`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InfoEvent {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default, rename = "serverId")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub platform: Option<PlatformStatus>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl InfoEvent {
    /// Returns true if the server asks clients to reconnect
    pub fn requests_reconnect(&self) -> bool {
        self.code == Some(info_codes::RECONNECT)
    }

    /// Returns true if the platform reports maintenance mode
    pub fn is_maintenance(&self) -> bool {
        self.code == Some(info_codes::MAINTENANCE_START)
            || self.platform.as_ref().map_or(false, |p| p.status == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlatformStatus {
    /// 1 for operative, 0 for maintenance
    pub status: i64,
}

/// `auth` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthEvent {
    pub status: String,
    #[serde(default, rename = "chanId", deserialize_with = "lossy_opt_u64")]
    pub chan_id: Option<ChannelId>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub caps: Option<Value>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl AuthEvent {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// `subscribed` acknowledgement
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribedEvent {
    pub channel: String,
    #[serde(rename = "chanId", deserialize_with = "lossy_u64")]
    pub chan_id: ChannelId,
    #[serde(default, rename = "subId", deserialize_with = "lossy_opt_string")]
    pub sub_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub prec: Option<String>,
    #[serde(default)]
    pub freq: Option<String>,
    #[serde(default, deserialize_with = "lossy_opt_string")]
    pub len: Option<String>,
}

/// `unsubscribed` acknowledgement
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnsubscribedEvent {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "chanId", deserialize_with = "lossy_u64")]
    pub chan_id: ChannelId,
}

/// `error` event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default, rename = "subId", deserialize_with = "lossy_opt_string")]
    pub sub_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, rename = "chanId", deserialize_with = "lossy_opt_u64")]
    pub chan_id: Option<ChannelId>,
}

/// `conf` acknowledgement
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfEvent {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub flags: Option<i64>,
}

/// `pong` reply to a `ping` request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PongEvent {
    #[serde(default)]
    pub ts: Option<i64>,
    #[serde(default)]
    pub cid: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

fn lossy_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("invalid channel id {n}"))),
        StringOrNumber::String(s) => s.parse().map_err(D::Error::custom),
    }
}

fn lossy_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "lossy_u64")] u64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

fn lossy_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

// ============================================================================
// Outgoing requests
// ============================================================================

/// Control request sent to the exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Request {
    Subscribe(SubscribeRequest),
    Unsubscribe(UnsubscribeRequest),
    Auth(AuthRequest),
    Conf(ConfRequest),
    Ping(PingRequest),
}

impl Request {
    /// Serialize to the JSON text sent on the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `subscribe` request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeRequest {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prec: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<String>,
    #[serde(rename = "subId")]
    pub sub_id: SubscriptionId,
}

impl SubscribeRequest {
    /// Symbol-addressed subscription (`ticker`, `trades`, `book`)
    pub fn symbol(channel: Channel, symbol: impl Into<String>, sub_id: SubscriptionId) -> Self {
        Self {
            channel,
            symbol: Some(symbol.into()),
            key: None,
            prec: None,
            freq: None,
            len: None,
            sub_id,
        }
    }

    /// Key-addressed subscription (`candles`, `status`)
    pub fn keyed(channel: Channel, key: impl Into<String>, sub_id: SubscriptionId) -> Self {
        Self {
            channel,
            symbol: None,
            key: Some(key.into()),
            prec: None,
            freq: None,
            len: None,
            sub_id,
        }
    }

    /// Add book parameters
    pub fn with_book(mut self, prec: Precision, freq: Frequency, len: BookLength) -> Self {
        self.prec = Some(prec.as_str());
        self.freq = Some(freq.as_str());
        self.len = Some(len.as_wire());
        self
    }
}

/// `unsubscribe` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsubscribeRequest {
    #[serde(rename = "chanId")]
    pub chan_id: ChannelId,
}

/// `auth` request
#[derive(Clone, PartialEq, Serialize)]
pub struct AuthRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "authSig")]
    pub auth_sig: String,
    #[serde(rename = "authNonce")]
    pub auth_nonce: String,
    #[serde(rename = "authPayload")]
    pub auth_payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<String>>,
    /// Dead-man switch: 4 cancels all orders when the socket closes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dms: Option<u8>,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("api_key", &self.api_key)
            .field("auth_sig", &"[REDACTED]")
            .field("auth_nonce", &self.auth_nonce)
            .field("filter", &self.filter)
            .field("dms", &self.dms)
            .finish()
    }
}

/// `conf` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfRequest {
    pub flags: i64,
}

/// `ping` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PingRequest {
    pub cid: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_info_version() {
        let event = EventMessage::from_value(json!({
            "event": "info", "version": 2, "serverId": "abc", "platform": {"status": 1}
        }))
        .unwrap();
        match event {
            EventMessage::Info(info) => {
                assert_eq!(info.version, Some(2));
                assert!(!info.requests_reconnect());
                assert!(!info.is_maintenance());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_info_reconnect() {
        let event = EventMessage::from_value(json!({
            "event": "info", "code": 20051, "msg": "Stopping. Please try to reconnect"
        }))
        .unwrap();
        assert!(matches!(event, EventMessage::Info(ref i) if i.requests_reconnect()));
    }

    #[test]
    fn test_parse_subscribed() {
        let event = EventMessage::from_value(json!({
            "event": "subscribed", "channel": "book", "chanId": 10961, "symbol": "tBTCUSD",
            "prec": "P0", "freq": "F0", "len": "25", "subId": "7", "pair": "BTCUSD"
        }))
        .unwrap();
        match event {
            EventMessage::Subscribed(s) => {
                assert_eq!(s.chan_id, 10961);
                assert_eq!(s.sub_id.as_deref(), Some("7"));
                assert_eq!(s.len.as_deref(), Some("25"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lossy_ids() {
        let event = EventMessage::from_value(json!({
            "event": "subscribed", "channel": "ticker", "chanId": "42", "subId": 9, "len": 25
        }))
        .unwrap();
        match event {
            EventMessage::Subscribed(s) => {
                assert_eq!(s.chan_id, 42);
                assert_eq!(s.sub_id.as_deref(), Some("9"));
                assert_eq!(s.len.as_deref(), Some("25"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_with_sub_id() {
        let event = EventMessage::from_value(json!({
            "event": "error", "msg": "symbol: invalid", "code": 10300, "subId": "3"
        }))
        .unwrap();
        match event {
            EventMessage::Error(e) => {
                assert_eq!(e.code, error_codes::SUBSCRIPTION_FAILED);
                assert_eq!(e.sub_id.as_deref(), Some("3"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_auth() {
        let ok = EventMessage::from_value(json!({
            "event": "auth", "status": "OK", "chanId": 0, "userId": 1, "auth_id": "x", "caps": {}
        }))
        .unwrap();
        assert!(matches!(ok, EventMessage::Auth(ref a) if a.is_ok() && a.chan_id == Some(0)));

        let failed = EventMessage::from_value(json!({
            "event": "auth", "status": "FAILED", "chanId": 0, "code": 10100, "msg": "apikey: invalid"
        }))
        .unwrap();
        assert!(matches!(failed, EventMessage::Auth(ref a) if !a.is_ok()));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(EventMessage::from_value(json!({"event": "mystery"})).is_err());
    }

    #[test]
    fn test_subscribe_request_json() {
        let request = Request::Subscribe(
            SubscribeRequest::symbol(Channel::Book, "tBTCUSD", SubscriptionId::new("1"))
                .with_book(Precision::P0, Frequency::F0, BookLength::L25),
        );
        let value: Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "subscribe", "channel": "book", "symbol": "tBTCUSD",
                "prec": "P0", "freq": "F0", "len": "25", "subId": "1"
            })
        );
    }

    #[test]
    fn test_keyed_request_json() {
        let request = Request::Subscribe(SubscribeRequest::keyed(
            Channel::Candles,
            "trade:1m:tBTCUSD",
            SubscriptionId::new("2"),
        ));
        let value: Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "subscribe", "channel": "candles", "key": "trade:1m:tBTCUSD", "subId": "2"})
        );
    }

    #[test]
    fn test_unsubscribe_and_conf_json() {
        let unsub = Request::Unsubscribe(UnsubscribeRequest { chan_id: 17 });
        assert_eq!(unsub.to_json().unwrap(), r#"{"event":"unsubscribe","chanId":17}"#);

        let conf = Request::Conf(ConfRequest { flags: 131072 });
        assert_eq!(conf.to_json().unwrap(), r#"{"event":"conf","flags":131072}"#);
    }

    #[test]
    fn test_auth_request_debug_redacts_signature() {
        let request = AuthRequest {
            api_key: "key".into(),
            auth_sig: "deadbeef".into(),
            auth_nonce: "1".into(),
            auth_payload: "AUTH1".into(),
            filter: None,
            dms: Some(4),
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("REDACTED"));
    }
}
