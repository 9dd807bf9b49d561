use async_trait::async_trait;
use auth::TokenPayload;
use chrono::DateTime;
use chrono::Utc;
use futures::future::BoxFuture;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::errors::EventPublisherError;
use crate::authentication::errors::RevocationError;
use crate::authentication::events::DomainEvent;
use crate::authentication::events::EventId;
use crate::authentication::models::AccessToken;
use crate::authentication::models::AuthenticatedSession;
use crate::authentication::models::AuthenticationId;
use crate::authentication::models::AuthenticationRecord;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::EmailDispatch;
use crate::authentication::models::FederatedLink;
use crate::authentication::models::FederatedProfile;
use crate::authentication::models::LocalSignUp;
use crate::authentication::models::LocalSignUpCommand;
use crate::authentication::models::PasswordChange;
use crate::authentication::models::PasswordResetCommand;
use crate::authentication::models::PreparedDispatch;
use crate::authentication::models::Provider;
use crate::authentication::models::SessionRenewal;
use crate::authentication::models::User;
use crate::authentication::models::UserAccount;
use crate::authentication::models::UserId;
use crate::authentication::models::VerificationConfirmation;

/// Side effect awaited inside a store transaction before it commits.
pub type Delivery = BoxFuture<'static, Result<(), AuthenticationError>>;

/// Port for the authentication orchestrator.
#[async_trait]
pub trait AuthenticationServicePort: Send + Sync + 'static {
    /// Sign up with local credentials.
    ///
    /// # Arguments
    /// * `command` - Validated sign-up command
    ///
    /// # Returns
    /// Created, not yet verified, local record
    ///
    /// # Errors
    /// * `AlreadySignedUp` - User already has a local record
    /// * `UsernameTaken` - Username belongs to another user or pending sign-up
    /// * `DatabaseError` - Database operation failed
    async fn local_sign_up(
        &self,
        command: LocalSignUpCommand,
    ) -> Result<AuthenticationRecord, AuthenticationError>;

    /// Confirm an email address from a verification link.
    ///
    /// # Arguments
    /// * `token` - Verification token from the link
    ///
    /// # Returns
    /// Fresh access token
    ///
    /// # Errors
    /// * `InvalidToken` - Token is invalid, expired or not a local token
    /// * `NotFound` - No local record for the token subject
    /// * `AlreadyVerified` - Email was already verified
    async fn local_verification_email(
        &self,
        token: &str,
    ) -> Result<AccessToken, AuthenticationError>;

    /// Open a session for a user whose password was already checked.
    ///
    /// # Arguments
    /// * `account` - User with its preloaded records
    ///
    /// # Returns
    /// Access and refresh tokens
    ///
    /// # Errors
    /// * `InvalidCredentials` - User has no local record
    /// * `EmailNotVerified` - Local record is still pending verification
    async fn local_sign_in(
        &self,
        account: UserAccount,
    ) -> Result<AuthenticatedSession, AuthenticationError>;

    /// Request a password reset email.
    ///
    /// Succeeds whether or not the address belongs to a verified account.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn local_password_forgot(&self, email: EmailAddress) -> Result<(), AuthenticationError>;

    /// Replace the password using a reset token.
    ///
    /// # Errors
    /// * `InvalidOrExpiredToken` - Token is invalid, expired or issued before the last password change
    async fn local_password_reset(
        &self,
        command: PasswordResetCommand,
    ) -> Result<(), AuthenticationError>;

    /// Revoke an access token and drop the provider's refresh token.
    ///
    /// # Arguments
    /// * `payload` - Verified payload of the access token
    ///
    /// # Errors
    /// * `InvalidToken` - Payload does not name a user or provider
    /// * `Revocation` - Revocation store rejected the write
    async fn sign_out(&self, payload: &TokenPayload) -> Result<(), AuthenticationError>;

    /// Mint a new access token from a refresh token.
    ///
    /// # Errors
    /// * `InvalidToken` - Token is invalid or expired
    /// * `TokenRevoked` - Token id is blacklisted
    /// * `RefreshTokenMismatch` - Token was superseded by a newer session
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<AccessToken, AuthenticationError>;

    /// Retrieve the profile of a user.
    ///
    /// # Errors
    /// * `UserNotFound` - User does not exist
    async fn retrieve_profile(&self, user_id: &UserId) -> Result<User, AuthenticationError>;

    /// Sign in with a profile produced by a federated provider.
    ///
    /// # Errors
    /// * `InvalidProvider` - Profile claims the local provider
    async fn federated_sign_in(
        &self,
        profile: FederatedProfile,
    ) -> Result<AuthenticatedSession, AuthenticationError>;

    /// Verify a bearer access token for a guarded route.
    ///
    /// # Returns
    /// Verified token payload
    ///
    /// # Errors
    /// * `InvalidToken` - Token is invalid, expired or carries no token id
    /// * `TokenRevoked` - Token id is blacklisted
    async fn authenticate_access_token(
        &self,
        token: &str,
    ) -> Result<TokenPayload, AuthenticationError>;

    /// Derive the email a fact calls for from the current record state.
    ///
    /// # Returns
    /// Prepared email, or None when the record no longer needs one
    ///
    /// # Errors
    /// * `NotFound` - Record referenced by the fact does not exist
    async fn prepare_dispatch(
        &self,
        event: &DomainEvent,
    ) -> Result<Option<PreparedDispatch>, AuthenticationError>;

    /// Record a dispatch and deliver it atomically.
    ///
    /// # Arguments
    /// * `dispatch` - Prepared email
    /// * `deliver` - Transport call; the store transaction commits only if it succeeds
    ///
    /// # Errors
    /// * `Delivery` - Transport failed, nothing was recorded
    async fn commit_dispatch(
        &self,
        dispatch: PreparedDispatch,
        deliver: Delivery,
    ) -> Result<(), AuthenticationError>;
}

/// Persistence operations for users and their authentication records.
///
/// Every write is atomic and records its domain event in the same transaction.
#[async_trait]
pub trait AuthenticationRepository: Send + Sync + 'static {
    /// Retrieve a user with its records by email address.
    ///
    /// # Returns
    /// Optional account (None if not found or soft deleted)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_account_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserAccount>, AuthenticationError>;

    /// Retrieve a user with its records by identifier.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_account_by_id(
        &self,
        id: &UserId,
    ) -> Result<Option<UserAccount>, AuthenticationError>;

    /// Retrieve the record a user holds for a provider.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_authentication(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<AuthenticationRecord>, AuthenticationError>;

    /// Retrieve a record by identifier.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_authentication_by_id(
        &self,
        id: &AuthenticationId,
    ) -> Result<Option<AuthenticationRecord>, AuthenticationError>;

    /// Create a local record, and its user when new.
    ///
    /// # Errors
    /// * `UsernameTaken` - Username belongs to another user or pending sign-up
    /// * `AlreadySignedUp` - A concurrent sign-up won the race
    /// * `DatabaseError` - Database operation failed
    async fn create_local(
        &self,
        sign_up: LocalSignUp,
    ) -> Result<AuthenticationRecord, AuthenticationError>;

    /// Store a verified local record, its session and the released profile.
    ///
    /// # Errors
    /// * `AlreadyVerified` - A concurrent verification won the race
    /// * `UsernameTaken` - Released username was claimed in the meantime
    /// * `DatabaseError` - Database operation failed
    async fn confirm_verification(
        &self,
        confirmation: VerificationConfirmation,
    ) -> Result<(), AuthenticationError>;

    /// Store a new session on a record and clear other providers' sessions.
    ///
    /// # Errors
    /// * `NotFound` - Record does not exist
    /// * `DatabaseError` - Database operation failed
    async fn renew_session(&self, renewal: SessionRenewal) -> Result<(), AuthenticationError>;

    /// Store a new local password and clear every session of the user.
    ///
    /// # Errors
    /// * `InvalidOrExpiredToken` - Stored hash no longer equals `previous_hash`
    /// * `DatabaseError` - Database operation failed
    async fn change_password(&self, change: PasswordChange) -> Result<(), AuthenticationError>;

    /// Clear the refresh token of one provider record.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn clear_refresh_token(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<(), AuthenticationError>;

    /// Bump the last access time of a record.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn touch_authentication(
        &self,
        id: &AuthenticationId,
        at: DateTime<Utc>,
    ) -> Result<(), AuthenticationError>;

    /// Upsert a federated record with its session and clear other providers' sessions.
    ///
    /// # Returns
    /// Stored record
    ///
    /// # Errors
    /// * `Conflict` - A concurrent sign-in created the same user
    /// * `DatabaseError` - Database operation failed
    async fn link_federated(
        &self,
        link: FederatedLink,
    ) -> Result<AuthenticationRecord, AuthenticationError>;

    /// Record an email dispatch, awaiting `deliver` before committing.
    ///
    /// # Errors
    /// * `NotFound` - Record does not exist
    /// * Any error returned by `deliver`; nothing is recorded
    async fn commit_dispatch(
        &self,
        dispatch: EmailDispatch,
        deliver: Delivery,
    ) -> Result<(), AuthenticationError>;
}

/// Append-only storage of domain events with their publication state.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Persist an event in its own transaction.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn create_event(&self, event: &DomainEvent) -> Result<(), AuthenticationError>;

    /// Mark an event as delivered to the message channel.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn mark_published(&self, id: &EventId) -> Result<(), AuthenticationError>;

    /// List events still unpublished that were created before `created_before`.
    ///
    /// # Returns
    /// Oldest events first, at most `limit`
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_unpublished(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DomainEvent>, AuthenticationError>;
}

/// Event publishing for domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    /// Publish a domain event.
    ///
    /// # Arguments
    /// * `event` - Recorded domain event
    ///
    /// # Returns
    /// Unit on success
    ///
    /// # Errors
    /// * `SerializationFailed` - Event serialization failed
    /// * `PublishFailed` - Failed to publish to broker
    /// * `ConnectionFailed` - Broker connection failed
    /// * `Timeout` - Publishing timed out
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventPublisherError>;
}

/// TTL-indexed store of revoked access token ids.
#[async_trait]
pub trait TokenRevocationStore: Send + Sync + 'static {
    /// Check whether a token id was revoked.
    ///
    /// # Errors
    /// * `InvalidKey` - Token id is empty, contains control characters or is too long
    /// * `Backend` - Store unavailable
    async fn is_blacklisted(&self, jwti: &str) -> Result<bool, RevocationError>;

    /// Revoke a token id until the token would have expired anyway.
    ///
    /// # Arguments
    /// * `jwti` - Token id
    /// * `expires_at` - Token expiry as Unix seconds
    ///
    /// # Errors
    /// * `InvalidKey` - Token id is empty, contains control characters or is too long
    /// * `Backend` - Store unavailable
    async fn add_to_blacklist(&self, jwti: &str, expires_at: i64) -> Result<(), RevocationError>;
}
