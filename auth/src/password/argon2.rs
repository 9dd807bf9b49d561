use argon2::Algorithm;
use argon2::Argon2;
use argon2::Params;
use argon2::Version;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::PasswordError;

/// Password hashing implementation.
///
/// Derives a fixed-length key with Argon2id (memory-hard) from the password and a
/// salt derived from a process-wide secret. The derived key is stored hex-encoded.
///
/// The salt is shared by every password hashed with the same secret, so equal
/// passwords produce equal hashes.
pub struct PasswordHasher {
    salt: [u8; 32],
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Length in bytes of the derived key (the hex string is twice as long).
    pub const KEY_LENGTH: usize = 64;

    /// Create a hasher with the default Argon2id cost parameters.
    ///
    /// # Arguments
    /// * `secret` - Process-wide secret the salt is derived from
    pub fn new(secret: &[u8]) -> Self {
        Self {
            salt: Self::derive_salt(secret),
            argon2: Argon2::default(),
        }
    }

    /// Create a hasher with explicit cost parameters.
    ///
    /// # Arguments
    /// * `secret` - Process-wide secret the salt is derived from
    /// * `memory_kib` - Memory cost in KiB
    /// * `iterations` - Number of passes
    ///
    /// # Errors
    /// * `InvalidParameters` - Argon2 rejected the cost parameters
    pub fn with_cost(secret: &[u8], memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, Some(Self::KEY_LENGTH))
            .map_err(|e| PasswordError::InvalidParameters(e.to_string()))?;

        Ok(Self {
            salt: Self::derive_salt(secret),
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password.
    ///
    /// # Returns
    /// Hex-encoded derived key
    ///
    /// # Errors
    /// * `HashingFailed` - Key derivation failed
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        self.derive(password).map(hex::encode)
    }

    /// Verify a password against a stored hash.
    ///
    /// Malformed or wrong-length hashes yield `Ok(false)`. Comparison is constant-time.
    ///
    /// # Errors
    /// * `HashingFailed` - Key derivation failed
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let expected = match hex::decode(hash) {
            Ok(bytes) if bytes.len() == Self::KEY_LENGTH => bytes,
            _ => return Ok(false),
        };

        let derived = self.derive(password)?;

        Ok(bool::from(derived.as_slice().ct_eq(expected.as_slice())))
    }

    fn derive(&self, password: &str) -> Result<[u8; Self::KEY_LENGTH], PasswordError> {
        let mut key = [0u8; Self::KEY_LENGTH];
        self.argon2
            .hash_password_into(password.as_bytes(), &self.salt, &mut key)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(key)
    }

    fn derive_salt(secret: &[u8]) -> [u8; 32] {
        Sha256::digest(secret).into()
    }
}
