use thiserror::Error;

/// Error type for token signing and verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Failed to decode token: {0}")]
    DecodingFailed(String),

    #[error("Token is expired")]
    TokenExpired,

    /// Signed under a different secret, or altered after signing.
    #[error("Token signature does not match")]
    SignatureMismatch,

    #[error("Token is invalid: {0}")]
    InvalidToken(String),
}
