//! API credentials and `auth` request signing
//!
//! # Security
//!
//! The API secret is stored using the `secrecy` crate which:
//! - Zeroizes memory on drop
//! - Prevents accidental logging via Debug impl
//! - Provides explicit access via `expose_secret()`

use bfx_types::AuthRequest;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretBox};
use sha2::Sha384;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::nonce::NonceGenerator;

type HmacSha384 = Hmac<Sha384>;

/// Prefix of every authentication payload
const AUTH_PREFIX: &str = "AUTH";

/// API key and secret for an authenticated connection
pub struct Credentials {
    /// API key (public)
    api_key: String,
    /// API secret (zeroized on drop)
    api_secret: SecretBox<Vec<u8>>,
}

impl Credentials {
    /// Create credentials from an API key and secret
    pub fn new(api_key: impl Into<String>, api_secret: impl AsRef<str>) -> AuthResult<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.as_ref();

        if api_key.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("api key is empty".to_string()));
        }
        if api_secret.is_empty() {
            return Err(AuthError::InvalidCredentials("api secret is empty".to_string()));
        }

        Ok(Self {
            api_key,
            api_secret: SecretBox::new(Box::new(api_secret.as_bytes().to_vec())),
        })
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex-encoded HMAC-SHA384 of `payload` keyed by the API secret
    pub fn sign(&self, payload: &str) -> AuthResult<String> {
        let mut mac = HmacSha384::new_from_slice(self.api_secret.expose_secret())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a signed `auth` request
    ///
    /// # Arguments
    /// * `nonces` - Source of the request nonce
    /// * `filter` - Optional account channel filter (e.g. `["trading", "wallet"]`)
    /// * `dms` - Dead-man switch flag; `4` cancels all orders on disconnect
    pub fn auth_request(
        &self,
        nonces: &dyn NonceGenerator,
        filter: Option<Vec<String>>,
        dms: Option<u8>,
    ) -> AuthResult<AuthRequest> {
        let nonce = nonces.next();
        let payload = format!("{AUTH_PREFIX}{nonce}");
        let signature = self.sign(&payload)?;
        debug!(nonce = %nonce, dms = ?dms, "Signed auth request");

        Ok(AuthRequest {
            api_key: self.api_key.clone(),
            auth_sig: signature,
            auth_nonce: nonce,
            auth_payload: payload,
            filter,
            dms,
        })
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            api_key: self.api_key.clone(),
            api_secret: SecretBox::new(Box::new(self.api_secret.expose_secret().clone())),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible = self
            .api_key
            .char_indices()
            .nth(8)
            .map_or(self.api_key.as_str(), |(i, _)| &self.api_key[..i]);
        f.debug_struct("Credentials")
            .field("api_key", &format!("{visible}..."))
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}
