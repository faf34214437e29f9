//! Error types for authentication operations

/// Errors that can occur while building an authentication request
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Invalid API credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// HMAC could not be initialized with the secret
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
