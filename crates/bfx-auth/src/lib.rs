//! Authentication for the Bitfinex WebSocket API v2
//!
//! Authenticated connections send one `auth` event signed with the account's
//! API secret:
//!
//! ```text
//! authPayload = "AUTH" + nonce
//! authSig     = hex(HMAC-SHA384(secret, authPayload))
//! ```
//!
//! Nonces must be strictly increasing per API key, so they are drawn from an
//! injectable [`NonceGenerator`]. The same generator also supplies the
//! client-assigned subscription IDs.
//!
//! # Example
//!
//! ```
//! use bfx_auth::{Credentials, EpochNonceGenerator};
//!
//! let creds = Credentials::new("my-api-key", "my-api-secret").unwrap();
//! let request = creds.auth_request(&EpochNonceGenerator::new(), None, Some(4)).unwrap();
//! assert!(request.auth_payload.starts_with("AUTH"));
//! ```

mod credentials;
mod error;
mod nonce;

pub use credentials::Credentials;
pub use error::{AuthError, AuthResult};
pub use nonce::{EpochNonceGenerator, NonceGenerator, SequenceNonceGenerator};
