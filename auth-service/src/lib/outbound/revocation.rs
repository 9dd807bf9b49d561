use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

use crate::authentication::errors::RevocationError;
use crate::authentication::ports::TokenRevocationStore;

const KEY_PREFIX: &str = "auth:blacklist:";
const MAX_KEY_BYTES: usize = 1024;

/// Reject keys the store must never see.
///
/// # Errors
/// * `InvalidKey` - Key is empty, contains control characters or exceeds 1 KiB
fn validate_key(key: &str) -> Result<(), RevocationError> {
    if key.is_empty() {
        return Err(RevocationError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(RevocationError::InvalidKey(format!(
            "key exceeds {} bytes",
            MAX_KEY_BYTES
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(RevocationError::InvalidKey(
            "key contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Seconds left until `expires_at`, never negative.
fn remaining_seconds(expires_at: i64, now: i64) -> u64 {
    expires_at.saturating_sub(now).max(0) as u64
}

/// Redis blacklist of revoked token ids.
///
/// Entries expire together with the token they revoke, which bounds the
/// size of the store to the tokens still alive.
#[derive(Clone)]
pub struct RedisRevocationStore {
    connection: ConnectionManager,
}

impl RedisRevocationStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL
    ///
    /// # Errors
    /// * `Backend` - URL is invalid or the server is unreachable
    pub async fn connect(url: &str) -> Result<Self, RevocationError> {
        let client =
            redis::Client::open(url).map_err(|e| RevocationError::Backend(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| RevocationError::Backend(e.to_string()))?;

        tracing::info!("Connected to Redis revocation store");

        Ok(Self::new(connection))
    }
}

#[async_trait]
impl TokenRevocationStore for RedisRevocationStore {
    async fn is_blacklisted(&self, jwti: &str) -> Result<bool, RevocationError> {
        validate_key(jwti)?;

        let mut connection = self.connection.clone();
        redis::cmd("EXISTS")
            .arg(format!("{}{}", KEY_PREFIX, jwti))
            .query_async::<_, bool>(&mut connection)
            .await
            .map_err(|e| RevocationError::Backend(e.to_string()))
    }

    async fn add_to_blacklist(&self, jwti: &str, expires_at: i64) -> Result<(), RevocationError> {
        validate_key(jwti)?;

        let ttl = remaining_seconds(expires_at, Utc::now().timestamp());
        // An already expired token cannot be replayed; Redis rejects EX 0 anyway.
        if ttl == 0 {
            tracing::debug!("Token already expired, nothing to revoke");
            return Ok(());
        }

        let mut connection = self.connection.clone();
        redis::cmd("SET")
            .arg(format!("{}{}", KEY_PREFIX, jwti))
            .arg(1)
            .arg("EX")
            .arg(ttl)
            .query_async::<_, ()>(&mut connection)
            .await
            .map_err(|e| RevocationError::Backend(e.to_string()))?;

        tracing::info!(ttl_seconds = ttl, "Token id revoked");

        Ok(())
    }
}
