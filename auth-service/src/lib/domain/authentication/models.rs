use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::authentication::errors::EmailError;
use crate::authentication::errors::IdentifierError;
use crate::authentication::errors::PasswordPolicyError;
use crate::authentication::errors::ProviderError;
use crate::authentication::errors::UsernameError;
use crate::authentication::events::DomainEvent;

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    ///
    /// # Returns
    /// UserId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Arguments
    /// * `s` - UUID string to parse
    ///
    /// # Returns
    /// Parsed UserId
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| IdentifierError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Authentication record unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticationId(pub Uuid);

impl AuthenticationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an authentication record ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(s)
            .map(AuthenticationId)
            .map_err(|e| IdentifierError::InvalidFormat(e.to_string()))
    }
}

impl Default for AuthenticationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuthenticationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity source of an authentication relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
    Keycloak,
    Github,
}

impl Provider {
    /// Get the wire name of the provider.
    ///
    /// # Returns
    /// Lowercase provider name
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
            Provider::Keycloak => "keycloak",
            Provider::Github => "github",
        }
    }

    pub fn is_federated(&self) -> bool {
        !matches!(self, Provider::Local)
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Provider::Local),
            "google" => Ok(Provider::Google),
            "keycloak" => Ok(Provider::Keycloak),
            "github" => Ok(Provider::Github),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username value type
///
/// Ensures username is 1-32 characters and contains only alphanumeric, underscore, and hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    const MIN_LENGTH: usize = 1;
    const MAX_LENGTH: usize = 32;

    /// Create a new valid username.
    ///
    /// Validates length and character constraints.
    ///
    /// # Arguments
    /// * `username` - Raw username string
    ///
    /// # Returns
    /// Validated Username value object
    ///
    /// # Errors
    /// * `TooShort` - Username is empty
    /// * `TooLong` - Username longer than 32 characters
    /// * `InvalidCharacters` - Contains non-alphanumeric characters (except _ and -)
    pub fn new(username: String) -> Result<Self, UsernameError> {
        let username = Self::with_valid_length(username)?;
        let username = Self::with_valid_chars(username)?;
        Ok(Self(username))
    }

    fn with_valid_length(username: String) -> Result<String, UsernameError> {
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(username)
        }
    }

    fn with_valid_chars(username: String) -> Result<String, UsernameError> {
        if username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            Ok(username)
        } else {
            Err(UsernameError::InvalidCharacters)
        }
    }

    /// Get username as string slice.
    ///
    /// # Returns
    /// Username string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Username::new(value)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser. Addresses are
/// trimmed and lowercased so lookups are case insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Arguments
    /// * `email` - Raw email string
    ///
    /// # Returns
    /// Validated and normalized EmailAddress value object
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        let normalized = email.trim().to_lowercase();
        email_address::EmailAddress::from_str(&normalized)
            .map(|_| EmailAddress(normalized))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Get email as string slice.
    ///
    /// # Returns
    /// Email string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EmailAddress::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Plain text password submitted by a caller.
///
/// Never printed: the Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 8;
    const MAX_LENGTH: usize = 128;

    /// Accept a plain text password that satisfies the length policy.
    ///
    /// # Errors
    /// * `TooShort` - Fewer than 8 characters
    /// * `TooLong` - More than 128 characters
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        let length = password.chars().count();
        if length < Self::MIN_LENGTH {
            Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(PasswordPolicyError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(Self(password))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// User aggregate entity.
///
/// The authentication records of a user are not stored on it; they are
/// loaded alongside it as a [`UserAccount`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub username: Option<Username>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user known only by its email address.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `now` - Creation timestamp
    ///
    /// # Returns
    /// User with a fresh identifier and empty profile
    pub fn with_email(email: EmailAddress, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email,
            username: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A user together with its authentication records (query-time join).
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub user: User,
    pub authentications: Vec<AuthenticationRecord>,
}

impl UserAccount {
    /// Find the record bound to a provider.
    ///
    /// # Arguments
    /// * `provider` - Provider to look for
    ///
    /// # Returns
    /// Record reference, if the user has one for this provider
    pub fn authentication(&self, provider: Provider) -> Option<&AuthenticationRecord> {
        self.authentications
            .iter()
            .find(|record| record.provider == provider)
    }
}

/// Profile fields captured at sign-up and held until the email is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<Username>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Credential and verification sub-state of a local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMetadata {
    pub is_email_verified: bool,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary_info: Option<TemporaryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl LocalMetadata {
    /// Metadata of a freshly signed up, not yet verified, local record.
    pub fn pending(password_hash: String, temporary_info: TemporaryInfo) -> Self {
        Self {
            is_email_verified: false,
            password: password_hash,
            verification_sent_at: None,
            verification_confirmed_at: None,
            temporary_info: Some(temporary_info),
            callback_url: None,
        }
    }

    /// Mark the email as verified.
    ///
    /// # Arguments
    /// * `at` - Confirmation timestamp
    ///
    /// # Returns
    /// Profile fields held since sign-up, now released to the user
    pub fn confirm(&mut self, at: DateTime<Utc>) -> Option<TemporaryInfo> {
        self.is_email_verified = true;
        self.verification_confirmed_at = Some(at);
        self.temporary_info.take()
    }
}

/// Provider-shaped metadata of an authentication record.
///
/// Serialized as `{"<provider>": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMetadata {
    Local(LocalMetadata),
    Google(serde_json::Value),
    Keycloak(serde_json::Value),
    Github(serde_json::Value),
}

impl AuthenticationMetadata {
    /// Wrap opaque provider data for a federated provider.
    ///
    /// # Errors
    /// * `MetadataMismatch` - `provider` is local
    pub fn federated(provider: Provider, data: serde_json::Value) -> Result<Self, ProviderError> {
        match provider {
            Provider::Google => Ok(AuthenticationMetadata::Google(data)),
            Provider::Keycloak => Ok(AuthenticationMetadata::Keycloak(data)),
            Provider::Github => Ok(AuthenticationMetadata::Github(data)),
            Provider::Local => Err(ProviderError::MetadataMismatch {
                expected: "federated".to_string(),
                actual: Provider::Local.to_string(),
            }),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            AuthenticationMetadata::Local(_) => Provider::Local,
            AuthenticationMetadata::Google(_) => Provider::Google,
            AuthenticationMetadata::Keycloak(_) => Provider::Keycloak,
            AuthenticationMetadata::Github(_) => Provider::Github,
        }
    }
}

/// One provider-specific credential binding for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationRecord {
    pub id: AuthenticationId,
    pub user_id: UserId,
    pub provider: Provider,
    pub refresh_token: Option<String>,
    pub metadata: AuthenticationMetadata,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl AuthenticationRecord {
    /// Create a new record; the provider is taken from the metadata.
    ///
    /// # Arguments
    /// * `user_id` - Owning user
    /// * `metadata` - Provider-shaped metadata
    /// * `now` - Creation timestamp
    ///
    /// # Returns
    /// Record with a fresh identifier and no active session
    pub fn new(user_id: UserId, metadata: AuthenticationMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id: AuthenticationId::new(),
            user_id,
            provider: metadata.provider(),
            refresh_token: None,
            metadata,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Rebuild a record from stored columns.
    ///
    /// # Errors
    /// * `MetadataMismatch` - Stored metadata belongs to another provider
    pub fn restore(
        id: AuthenticationId,
        user_id: UserId,
        provider: Provider,
        refresh_token: Option<String>,
        metadata: AuthenticationMetadata,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Result<Self, ProviderError> {
        if metadata.provider() != provider {
            return Err(ProviderError::MetadataMismatch {
                expected: provider.to_string(),
                actual: metadata.provider().to_string(),
            });
        }

        Ok(Self {
            id,
            user_id,
            provider,
            refresh_token,
            metadata,
            created_at,
            last_accessed_at,
        })
    }

    pub fn local(&self) -> Option<&LocalMetadata> {
        match &self.metadata {
            AuthenticationMetadata::Local(local) => Some(local),
            _ => None,
        }
    }

    pub fn local_mut(&mut self) -> Option<&mut LocalMetadata> {
        match &mut self.metadata {
            AuthenticationMetadata::Local(local) => Some(local),
            _ => None,
        }
    }

    pub fn is_verified_local(&self) -> bool {
        self.local().is_some_and(|local| local.is_email_verified)
    }

    /// Attach a new session to the record.
    pub fn start_session(&mut self, refresh_token: String, at: DateTime<Utc>) {
        self.refresh_token = Some(refresh_token);
        self.last_accessed_at = at;
    }
}

/// Command to sign up with local credentials
#[derive(Debug)]
pub struct LocalSignUpCommand {
    pub username: Username,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: EmailAddress,
    pub avatar_url: Option<String>,
    pub password: Password,
}

/// Command to replace a forgotten password
#[derive(Debug)]
pub struct PasswordResetCommand {
    pub token: String,
    pub new_password: Password,
}

/// Normalized profile produced by a federated provider handshake.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider: Provider,
    pub email: EmailAddress,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: serde_json::Value,
}

/// Fresh access token returned by verification and refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
}

/// Access and refresh token pair returned by sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub access_token: String,
    pub refresh_token: String,
}

/// Profile fields copied onto the user when its email is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<Username>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<TemporaryInfo> for ProfileUpdate {
    fn from(info: TemporaryInfo) -> Self {
        Self {
            username: info.username,
            first_name: info.first_name,
            last_name: info.last_name,
            avatar_url: info.avatar_url,
        }
    }
}

/// Owner of a record about to be created.
#[derive(Debug, Clone)]
pub enum AccountOwner {
    /// User row to insert in the same transaction.
    New(User),
    Existing(UserId),
}

impl AccountOwner {
    pub fn user_id(&self) -> UserId {
        match self {
            AccountOwner::New(user) => user.id,
            AccountOwner::Existing(id) => *id,
        }
    }
}

/// Atomic write of a local sign-up.
#[derive(Debug, Clone)]
pub struct LocalSignUp {
    pub owner: AccountOwner,
    pub username: Username,
    pub record: AuthenticationRecord,
    pub event: DomainEvent,
}

/// Atomic write of a confirmed email verification.
#[derive(Debug, Clone)]
pub struct VerificationConfirmation {
    pub record: AuthenticationRecord,
    pub profile: ProfileUpdate,
    pub event: DomainEvent,
}

/// Atomic write of a new session on a record; other providers lose theirs.
#[derive(Debug, Clone)]
pub struct SessionRenewal {
    pub record: AuthenticationRecord,
}

/// Atomic write of a new local password; every session of the user is dropped.
///
/// Applies only while the stored hash still equals `previous_hash`.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub record_id: AuthenticationId,
    pub user_id: UserId,
    /// Hash the reset token was verified against
    pub previous_hash: String,
    pub new_hash: String,
    pub event: DomainEvent,
}

/// Atomic upsert of a federated record with its new session.
#[derive(Debug, Clone)]
pub struct FederatedLink {
    pub owner: AccountOwner,
    pub record: AuthenticationRecord,
    pub event: Option<DomainEvent>,
}

/// Metadata update and fact recorded when an email goes out.
#[derive(Debug, Clone)]
pub struct EmailDispatch {
    pub record_id: AuthenticationId,
    pub callback_url: String,
    pub verification_sent_at: Option<DateTime<Utc>>,
    pub event: DomainEvent,
}

/// Kind of email a local record may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    Verification,
    PasswordReset,
}

impl DispatchKind {
    /// Base name of the templates rendering this email.
    pub fn template(&self) -> &'static str {
        match self {
            DispatchKind::Verification => "verification",
            DispatchKind::PasswordReset => "password_reset",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            DispatchKind::Verification => "Confirm your email address",
            DispatchKind::PasswordReset => "Reset your password",
        }
    }
}

/// Everything needed to send one email, derived from the current record state.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDispatch {
    pub kind: DispatchKind,
    pub record_id: AuthenticationId,
    pub user_id: UserId,
    pub recipient: EmailAddress,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub callback_url: String,
    pub expires_in_minutes: i64,
}
