use thiserror::Error;

/// Error for identifier parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error(
        "Username contains invalid characters (only alphanumeric, underscore, and hyphen allowed)"
    )]
    InvalidCharacters,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for plain text password policy violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Password too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Error for unknown authentication providers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Unknown authentication provider: {0}")]
    Unknown(String),

    #[error("Provider {expected} cannot carry {actual} metadata")]
    MetadataMismatch { expected: String, actual: String },
}

/// Error raised when an event name and its metadata disagree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventShapeError {
    #[error("Unknown event name: {0}")]
    UnknownName(String),

    #[error("Event {name} does not accept {actual} metadata")]
    MetadataMismatch { name: String, actual: String },

    #[error("Malformed metadata for event {name}: {reason}")]
    Malformed { name: String, reason: String },
}

/// Error for event publishing operations
#[derive(Debug, Clone, Error)]
pub enum EventPublisherError {
    #[error("Failed to serialize event: {0}")]
    SerializationFailed(String),

    #[error("Failed to publish event to broker: {0}")]
    PublishFailed(String),

    #[error("Connection to event broker failed: {0}")]
    ConnectionFailed(String),

    #[error("Event publishing timeout: {0}")]
    Timeout(String),
}

/// Error for token revocation store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RevocationError {
    #[error("Invalid revocation key: {0}")]
    InvalidKey(String),

    #[error("Revocation store unavailable: {0}")]
    Backend(String),
}

/// Coarse classification used by the transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    Unauthorized,
    NotFound,
    Internal,
}

/// Top-level error for all authentication operations
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordPolicyError),

    #[error("Invalid provider: {0}")]
    InvalidProvider(#[from] ProviderError),

    #[error("Username is already taken: {0}")]
    UsernameTaken(String),

    #[error("{}", already_signed_up_message(.verified))]
    AlreadySignedUp { verified: bool },

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Refresh token has been superseded")]
    RefreshTokenMismatch,

    #[error("Authentication record not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Revocation store error: {0}")]
    Revocation(#[from] RevocationError),

    #[error("Event error: {0}")]
    EventShape(#[from] EventShapeError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    TokenSigning(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

fn already_signed_up_message(verified: &bool) -> &'static str {
    if *verified {
        "Account already exists, please sign in"
    } else {
        "Account already exists, email verification is pending"
    }
}

impl AuthenticationError {
    /// Classify the error for the transport layers.
    ///
    /// # Returns
    /// ErrorKind the error maps to
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthenticationError::InvalidIdentifier(_)
            | AuthenticationError::InvalidUsername(_)
            | AuthenticationError::InvalidEmail(_)
            | AuthenticationError::InvalidPassword(_)
            | AuthenticationError::InvalidProvider(_)
            | AuthenticationError::Revocation(RevocationError::InvalidKey(_)) => {
                ErrorKind::InvalidInput
            }

            AuthenticationError::UsernameTaken(_)
            | AuthenticationError::AlreadySignedUp { .. }
            | AuthenticationError::AlreadyVerified
            | AuthenticationError::Conflict(_) => ErrorKind::Conflict,

            AuthenticationError::InvalidCredentials
            | AuthenticationError::EmailNotVerified
            | AuthenticationError::InvalidToken
            | AuthenticationError::InvalidOrExpiredToken
            | AuthenticationError::TokenRevoked
            | AuthenticationError::RefreshTokenMismatch => ErrorKind::Unauthorized,

            AuthenticationError::NotFound(_) | AuthenticationError::UserNotFound(_) => {
                ErrorKind::NotFound
            }

            AuthenticationError::Revocation(RevocationError::Backend(_))
            | AuthenticationError::EventShape(_)
            | AuthenticationError::Hashing(_)
            | AuthenticationError::TokenSigning(_)
            | AuthenticationError::Delivery(_)
            | AuthenticationError::DatabaseError(_)
            | AuthenticationError::Unknown(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for AuthenticationError {
    fn from(err: anyhow::Error) -> Self {
        AuthenticationError::Unknown(err.to_string())
    }
}

impl From<auth::PasswordError> for AuthenticationError {
    fn from(err: auth::PasswordError) -> Self {
        AuthenticationError::Hashing(err.to_string())
    }
}
