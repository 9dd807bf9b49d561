use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;

use super::errors::JwtError;

/// Options for token verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Accept tokens whose `exp` is in the past (signature is still checked).
    pub ignore_expiration: bool,
}

/// JWT token handler for encoding and decoding tokens.
///
/// Generic over the claims type. Uses HS256 (HMAC with SHA-256).
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtHandler {
    /// Create a new JWT handler with a secret key.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    /// Encode claims into a signed token.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify signature and expiry, then decode the claims.
    ///
    /// # Errors
    /// * `TokenExpired` - `exp` is in the past
    /// * `SignatureMismatch` - Signed under another secret
    /// * `InvalidToken` - Malformed token
    pub fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, JwtError> {
        self.decode_with(token, VerifyOptions::default())
    }

    /// Verify the signature and decode the claims, optionally ignoring expiry.
    ///
    /// # Errors
    /// * `TokenExpired` - `exp` is in the past and expiry is not ignored
    /// * `SignatureMismatch` - Signed under another secret
    /// * `InvalidToken` - Malformed token
    pub fn decode_with<T: for<'de> Deserialize<'de>>(
        &self,
        token: &str,
        options: VerifyOptions,
    ) -> Result<T, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        if options.ignore_expiration {
            validation.validate_exp = false;
            validation.required_spec_claims.clear();
        }

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                ErrorKind::InvalidSignature => JwtError::SignatureMismatch,
                _ => JwtError::InvalidToken(e.to_string()),
            })
    }

    /// Decode token without validation (for inspection only).
    ///
    /// Neither the signature nor the expiry is checked. Only use it to read claims
    /// (such as `jwti`) when the caller already holds other proof of validity.
    ///
    /// # Errors
    /// * `DecodingFailed` - Token format is invalid
    pub fn decode_unverified<T: for<'de> Deserialize<'de>>(
        &self,
        token: &str,
    ) -> Result<T, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<T>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::DecodingFailed(e.to_string()))?;

        Ok(token_data.claims)
    }
}
