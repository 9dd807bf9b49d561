use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Payload carried by every signed token.
///
/// `jwti` is only present on access tokens; it is the handle used to blacklist
/// a single token before it expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    /// Subject (user identifier)
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Identity provider the token was issued for
    pub provider: String,

    /// Token identifier (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwti: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl TokenPayload {
    /// Default lifetime applied when the caller does not choose one.
    pub fn default_lifetime() -> Duration {
        Duration::days(1)
    }

    /// Create a payload issued now and expiring after the default lifetime.
    pub fn new(user_id: impl ToString, provider: impl ToString) -> Self {
        let now = Utc::now().timestamp();

        Self {
            user_id: user_id.to_string(),
            provider: provider.to_string(),
            jwti: None,
            iat: now,
            exp: now + Self::default_lifetime().num_seconds(),
        }
    }

    /// Attach a fresh random token identifier.
    pub fn with_token_id(mut self) -> Self {
        self.jwti = Some(Uuid::new_v4().to_string());
        self
    }

    /// Set the lifetime relative to the issue time.
    pub fn expiring_in(mut self, lifetime: Duration) -> Self {
        self.exp = self.iat + lifetime.num_seconds();
        self
    }
}
