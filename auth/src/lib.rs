//! Authentication utilities library
//!
//! Provides the credential and token primitives used by the authentication service:
//! - Password hashing (Argon2id key derivation, constant-time verification)
//! - Signed token generation, verification and inspection
//! - Session, verification and password-reset token issuance
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::with_cost(b"salt-secret", 1024, 1).unwrap();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).unwrap());
//! assert!(!hasher.verify("other_password", &hash).unwrap());
//! ```
//!
//! ## Tokens
//! ```
//! use auth::{JwtHandler, TokenPayload};
//!
//! let handler = JwtHandler::new(b"secret_key_at_least_32_bytes_long!");
//! let payload = TokenPayload::new("user123", "local").with_token_id();
//! let token = handler.encode(&payload).unwrap();
//! let decoded: TokenPayload = handler.decode(&token).unwrap();
//! assert_eq!(decoded, payload);
//! ```
//!
//! ## Sessions
//! ```
//! use auth::{Authenticator, PasswordHasher, TokenLifetimes};
//!
//! let hasher = PasswordHasher::with_cost(b"salt-secret", 1024, 1).unwrap();
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!", hasher, TokenLifetimes::default());
//!
//! let session = auth.issue_session("user123", "local").unwrap();
//! let payload = auth.validate_token(&session.access_token).unwrap();
//! assert!(payload.jwti.is_some());
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;

// Re-export commonly used items
pub use authenticator::AuthenticationError;
pub use authenticator::Authenticator;
pub use authenticator::SessionTokens;
pub use authenticator::TokenLifetimes;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::TokenPayload;
pub use jwt::VerifyOptions;
pub use password::PasswordError;
pub use password::PasswordHasher;
