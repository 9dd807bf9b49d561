use chrono::Duration;

use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::jwt::TokenPayload;
use crate::jwt::VerifyOptions;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Token lifetimes used when issuing tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access_token: Duration,
    pub refresh_token: Duration,
    pub verification_token: Duration,
    pub reset_token: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_token: TokenPayload::default_lifetime(),
            refresh_token: Duration::days(7),
            verification_token: TokenPayload::default_lifetime(),
            reset_token: Duration::minutes(15),
        }
    }
}

/// Access and refresh tokens issued together when a session is established.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Payload embedded in `access_token`
    pub access_payload: TokenPayload,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
}

/// Authentication coordinator combining password hashing and token signing.
///
/// Session and verification tokens are signed with the global secret. Password-reset
/// tokens are signed with a secret derived from the stored password hash, so changing
/// the password invalidates every reset token issued before the change.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    jwt_handler: JwtHandler,
    token_secret: Vec<u8>,
    lifetimes: TokenLifetimes,
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `token_secret` - Global secret for token signing
    /// * `password_hasher` - Configured password hasher
    /// * `lifetimes` - Token lifetimes
    pub fn new(
        token_secret: &[u8],
        password_hasher: PasswordHasher,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            password_hasher,
            jwt_handler: JwtHandler::new(token_secret),
            token_secret: token_secret.to_vec(),
            lifetimes,
        }
    }

    /// Configured token lifetimes.
    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Check a password against a stored hash.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `PasswordError` - Key derivation failed
    pub fn authenticate(&self, password: &str, stored_hash: &str) -> Result<(), AuthenticationError> {
        if self.password_hasher.verify(password, stored_hash)? {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidCredentials)
        }
    }

    /// Issue an access token carrying a fresh `jwti`.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_access_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<(String, TokenPayload), JwtError> {
        let payload = TokenPayload::new(user_id, provider)
            .with_token_id()
            .expiring_in(self.lifetimes.access_token);
        let token = self.jwt_handler.encode(&payload)?;
        Ok((token, payload))
    }

    /// Issue a fresh access token and refresh token pair.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_session(&self, user_id: &str, provider: &str) -> Result<SessionTokens, JwtError> {
        let (access_token, access_payload) = self.issue_access_token(user_id, provider)?;

        let refresh_payload =
            TokenPayload::new(user_id, provider).expiring_in(self.lifetimes.refresh_token);
        let refresh_token = self.jwt_handler.encode(&refresh_payload)?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            access_payload,
        })
    }

    /// Issue an email verification token (no `jwti`).
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_verification_token(&self, user_id: &str, provider: &str) -> Result<String, JwtError> {
        let payload =
            TokenPayload::new(user_id, provider).expiring_in(self.lifetimes.verification_token);
        self.jwt_handler.encode(&payload)
    }

    /// Issue a password-reset token signed with the per-record secret.
    ///
    /// # Arguments
    /// * `password_hash` - Currently stored password hash (never the plaintext)
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_reset_token(
        &self,
        user_id: &str,
        provider: &str,
        password_hash: &str,
    ) -> Result<String, JwtError> {
        let payload = TokenPayload::new(user_id, provider).expiring_in(self.lifetimes.reset_token);
        self.reset_handler(password_hash).encode(&payload)
    }

    /// Verify a token signed with the global secret.
    ///
    /// # Errors
    /// * `JwtError` - Signature invalid or token expired
    pub fn validate_token(&self, token: &str) -> Result<TokenPayload, JwtError> {
        self.jwt_handler.decode(token)
    }

    /// Verify a token signed with the global secret using explicit options.
    ///
    /// # Errors
    /// * `JwtError` - Signature invalid, or token expired and expiry not ignored
    pub fn validate_token_with(
        &self,
        token: &str,
        options: VerifyOptions,
    ) -> Result<TokenPayload, JwtError> {
        self.jwt_handler.decode_with(token, options)
    }

    /// Read a token's payload without checking signature or expiry.
    ///
    /// # Errors
    /// * `DecodingFailed` - Token is malformed
    pub fn decode_token(&self, token: &str) -> Result<TokenPayload, JwtError> {
        self.jwt_handler.decode_unverified(token)
    }

    /// Verify a password-reset token against the current password hash.
    ///
    /// # Errors
    /// * `JwtError` - Signed under another hash, tampered with, or expired
    pub fn validate_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<TokenPayload, JwtError> {
        self.reset_handler(password_hash).decode(token)
    }

    fn reset_handler(&self, password_hash: &str) -> JwtHandler {
        let mut secret = Vec::with_capacity(self.token_secret.len() + password_hash.len() + 1);
        secret.extend_from_slice(&self.token_secret);
        secret.push(b':');
        secret.extend_from_slice(password_hash.as_bytes());
        JwtHandler::new(&secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes!";

    fn authenticator() -> Authenticator {
        let hasher = PasswordHasher::with_cost(b"salt-secret", 1024, 1).unwrap();
        Authenticator::new(SECRET, hasher, TokenLifetimes::default())
    }

    #[test]
    fn test_authenticate_success() {
        let authenticator = authenticator();
        let hash = authenticator.hash_password("my_password").unwrap();

        assert!(authenticator.authenticate("my_password", &hash).is_ok());
    }

    #[test]
    fn test_authenticate_invalid_password() {
        let authenticator = authenticator();
        let hash = authenticator.hash_password("my_password").unwrap();

        let result = authenticator.authenticate("wrong_password", &hash);
        assert!(matches!(
            result,
            Err(AuthenticationError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_token_with_ignored_expiry() {
        let authenticator = Authenticator::new(
            SECRET,
            PasswordHasher::with_cost(b"salt-secret", 1024, 1).unwrap(),
            TokenLifetimes {
                access_token: Duration::seconds(-60),
                ..TokenLifetimes::default()
            },
        );
        let (token, payload) = authenticator.issue_access_token("user123", "local").unwrap();

        assert_eq!(
            authenticator.validate_token(&token),
            Err(JwtError::TokenExpired)
        );

        let options = VerifyOptions {
            ignore_expiration: true,
        };
        let decoded = authenticator.validate_token_with(&token, options).unwrap();
        assert_eq!(decoded.jwti, payload.jwti);
    }

    #[test]
    fn test_issue_session() {
        let authenticator = authenticator();
        let session = authenticator.issue_session("user123", "local").unwrap();

        let access = authenticator.validate_token(&session.access_token).unwrap();
        assert_eq!(access, session.access_payload);
        assert!(access.jwti.is_some());

        let refresh = authenticator.validate_token(&session.refresh_token).unwrap();
        assert_eq!(refresh.user_id, "user123");
        assert!(refresh.jwti.is_none());
        assert_eq!(refresh.exp - refresh.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn test_each_access_token_has_new_jwti() {
        let authenticator = authenticator();
        let (_, first) = authenticator.issue_access_token("user123", "local").unwrap();
        let (_, second) = authenticator.issue_access_token("user123", "local").unwrap();

        assert_ne!(first.jwti, second.jwti);
    }

    #[test]
    fn test_decode_round_trip() {
        let authenticator = authenticator();
        let (token, payload) = authenticator.issue_access_token("user123", "github").unwrap();

        let decoded = authenticator.decode_token(&token).unwrap();
        assert_eq!(decoded.user_id, payload.user_id);
        assert_eq!(decoded.provider, payload.provider);
        assert_eq!(decoded.jwti, payload.jwti);
    }

    #[test]
    fn test_reset_token_bound_to_password_hash() {
        let authenticator = authenticator();
        let old_hash = authenticator.hash_password("OldPassw0rd").unwrap();
        let new_hash = authenticator.hash_password("NewPassw0rd").unwrap();

        let token = authenticator
            .issue_reset_token("user123", "local", &old_hash)
            .unwrap();

        let payload = authenticator.validate_reset_token(&token, &old_hash).unwrap();
        assert_eq!(payload.exp - payload.iat, 15 * 60);

        assert_eq!(
            authenticator.validate_reset_token(&token, &new_hash),
            Err(JwtError::SignatureMismatch)
        );
    }

    #[test]
    fn test_reset_token_not_valid_as_session_token() {
        let authenticator = authenticator();
        let hash = authenticator.hash_password("Passw0rd").unwrap();
        let token = authenticator
            .issue_reset_token("user123", "local", &hash)
            .unwrap();

        assert!(authenticator.validate_token(&token).is_err());
    }

    #[test]
    fn test_validate_invalid_token() {
        let authenticator = authenticator();
        let result = authenticator.validate_token("invalid.token.here");
        assert!(result.is_err());
    }
}
