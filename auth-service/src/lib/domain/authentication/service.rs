use std::sync::Arc;

use async_trait::async_trait;
use auth::Authenticator;
use auth::JwtError;
use auth::TokenPayload;
use chrono::Utc;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::events::DomainEvent;
use crate::authentication::events::EmailSentMetadata;
use crate::authentication::events::EventMetadata;
use crate::authentication::events::EventName;
use crate::authentication::events::FederatedLinkedMetadata;
use crate::authentication::events::LocalCreatedMetadata;
use crate::authentication::events::PasswordResetMetadata;
use crate::authentication::models::AccessToken;
use crate::authentication::models::AccountOwner;
use crate::authentication::models::AuthenticatedSession;
use crate::authentication::models::AuthenticationMetadata;
use crate::authentication::models::AuthenticationRecord;
use crate::authentication::models::DispatchKind;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::EmailDispatch;
use crate::authentication::models::FederatedLink;
use crate::authentication::models::FederatedProfile;
use crate::authentication::models::LocalMetadata;
use crate::authentication::models::LocalSignUp;
use crate::authentication::models::LocalSignUpCommand;
use crate::authentication::models::PasswordChange;
use crate::authentication::models::PasswordResetCommand;
use crate::authentication::models::PreparedDispatch;
use crate::authentication::models::ProfileUpdate;
use crate::authentication::models::Provider;
use crate::authentication::models::SessionRenewal;
use crate::authentication::models::TemporaryInfo;
use crate::authentication::models::User;
use crate::authentication::models::UserAccount;
use crate::authentication::models::UserId;
use crate::authentication::models::VerificationConfirmation;
use crate::authentication::ports::AuthenticationRepository;
use crate::authentication::ports::AuthenticationServicePort;
use crate::authentication::ports::Delivery;
use crate::authentication::ports::EventPublisher;
use crate::authentication::ports::EventStore;
use crate::authentication::ports::TokenRevocationStore;

/// Where emailed links point to.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub base_url: String,
}

impl LinkSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn verification_url(&self, token: &str) -> String {
        format!("{}/api/auth/local/verify?token={}", self.base_url, token)
    }

    fn password_reset_url(&self, token: &str) -> String {
        format!("{}/password/reset?token={}", self.base_url, token)
    }
}

/// Domain service implementation for authentication operations.
///
/// Concrete implementation of AuthenticationServicePort with dependency injection.
pub struct AuthenticationService<AR, ES, EP, RS>
where
    AR: AuthenticationRepository,
    ES: EventStore,
    EP: EventPublisher,
    RS: TokenRevocationStore,
{
    repository: Arc<AR>,
    event_store: Arc<ES>,
    event_publisher: Arc<EP>,
    revocation_store: Arc<RS>,
    authenticator: Arc<Authenticator>,
    links: LinkSettings,
}

impl<AR, ES, EP, RS> AuthenticationService<AR, ES, EP, RS>
where
    AR: AuthenticationRepository,
    ES: EventStore,
    EP: EventPublisher,
    RS: TokenRevocationStore,
{
    /// Create a new authentication service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User and authentication record persistence
    /// * `event_store` - Domain event storage
    /// * `event_publisher` - Domain event publishing implementation
    /// * `revocation_store` - Revoked token id storage
    /// * `authenticator` - Password hashing and token signing
    /// * `links` - Base of the links sent by email
    ///
    /// # Returns
    /// Configured authentication service instance
    pub fn new(
        repository: Arc<AR>,
        event_store: Arc<ES>,
        event_publisher: Arc<EP>,
        revocation_store: Arc<RS>,
        authenticator: Arc<Authenticator>,
        links: LinkSettings,
    ) -> Self {
        Self {
            repository,
            event_store,
            event_publisher,
            revocation_store,
            authenticator,
            links,
        }
    }

    /// Publish an event recorded by a committed transaction.
    ///
    /// Failures leave the event unpublished for the outbox relay.
    async fn publish_recorded(&self, event: &DomainEvent) {
        if let Err(e) = self.event_publisher.publish(event).await {
            tracing::error!(
                event_id = %event.id,
                event_name = %event.name,
                error = %e,
                "Failed to publish domain event, leaving it to the outbox relay"
            );
            return;
        }

        if let Err(e) = self.event_store.mark_published(&event.id).await {
            tracing::warn!(
                event_id = %event.id,
                error = %e,
                "Failed to mark domain event as published"
            );
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthenticationError> {
        Ok(self.authenticator.hash_password(password)?)
    }

    fn issue_session(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<auth::SessionTokens, AuthenticationError> {
        self.authenticator
            .issue_session(&user_id.to_string(), provider.as_str())
            .map_err(signing_error)
    }

    /// Verify a token signed with the global secret and read its subject.
    fn verified_subject(
        &self,
        token: &str,
    ) -> Result<(TokenPayload, UserId, Provider), AuthenticationError> {
        let payload = self
            .authenticator
            .validate_token(token)
            .map_err(|_| AuthenticationError::InvalidToken)?;
        let (user_id, provider) = subject_of(&payload).ok_or(AuthenticationError::InvalidToken)?;
        Ok((payload, user_id, provider))
    }

    async fn ensure_not_revoked(&self, payload: &TokenPayload) -> Result<(), AuthenticationError> {
        if let Some(jwti) = payload.jwti.as_deref() {
            if self.revocation_store.is_blacklisted(jwti).await? {
                return Err(AuthenticationError::TokenRevoked);
            }
        }
        Ok(())
    }

    async fn prepare_verification(
        &self,
        event: &DomainEvent,
    ) -> Result<Option<PreparedDispatch>, AuthenticationError> {
        let record = self
            .repository
            .find_authentication_by_id(&event.model_id)
            .await?
            .ok_or(AuthenticationError::NotFound(event.model_id.to_string()))?;
        let local = record
            .local()
            .ok_or(AuthenticationError::NotFound(event.model_id.to_string()))?;

        if local.is_email_verified {
            tracing::info!(
                authentication_id = %record.id,
                "Email already verified, verification email skipped"
            );
            return Ok(None);
        }

        let account = self
            .repository
            .find_account_by_id(&record.user_id)
            .await?
            .ok_or(AuthenticationError::UserNotFound(record.user_id.to_string()))?;

        let token = self
            .authenticator
            .issue_verification_token(&record.user_id.to_string(), Provider::Local.as_str())
            .map_err(signing_error)?;
        let temporary_info = local.temporary_info.clone().unwrap_or_default();

        Ok(Some(PreparedDispatch {
            kind: DispatchKind::Verification,
            record_id: record.id,
            user_id: record.user_id,
            recipient: account.user.email,
            username: temporary_info.username.map(String::from),
            first_name: temporary_info.first_name,
            callback_url: self.links.verification_url(&token),
            expires_in_minutes: self.authenticator.lifetimes().verification_token.num_minutes(),
        }))
    }

    async fn prepare_password_reset(
        &self,
        event: &DomainEvent,
    ) -> Result<Option<PreparedDispatch>, AuthenticationError> {
        let record = self
            .repository
            .find_authentication_by_id(&event.model_id)
            .await?
            .ok_or(AuthenticationError::NotFound(event.model_id.to_string()))?;
        let local = match record.local() {
            Some(local) if local.is_email_verified => local,
            _ => {
                tracing::info!(
                    authentication_id = %record.id,
                    "Record is not a verified local record, reset email skipped"
                );
                return Ok(None);
            }
        };

        let account = self
            .repository
            .find_account_by_id(&record.user_id)
            .await?
            .ok_or(AuthenticationError::UserNotFound(record.user_id.to_string()))?;

        let token = self
            .authenticator
            .issue_reset_token(
                &record.user_id.to_string(),
                Provider::Local.as_str(),
                &local.password,
            )
            .map_err(signing_error)?;

        Ok(Some(PreparedDispatch {
            kind: DispatchKind::PasswordReset,
            record_id: record.id,
            user_id: record.user_id,
            recipient: account.user.email,
            username: account.user.username.map(String::from),
            first_name: account.user.first_name,
            callback_url: self.links.password_reset_url(&token),
            expires_in_minutes: self.authenticator.lifetimes().reset_token.num_minutes(),
        }))
    }
}

fn signing_error(e: JwtError) -> AuthenticationError {
    AuthenticationError::TokenSigning(e.to_string())
}

fn subject_of(payload: &TokenPayload) -> Option<(UserId, Provider)> {
    let user_id = UserId::from_string(&payload.user_id).ok()?;
    let provider = payload.provider.parse::<Provider>().ok()?;
    Some((user_id, provider))
}

#[async_trait]
impl<AR, ES, EP, RS> AuthenticationServicePort for AuthenticationService<AR, ES, EP, RS>
where
    AR: AuthenticationRepository,
    ES: EventStore,
    EP: EventPublisher,
    RS: TokenRevocationStore,
{
    async fn local_sign_up(
        &self,
        command: LocalSignUpCommand,
    ) -> Result<AuthenticationRecord, AuthenticationError> {
        let account = self.repository.find_account_by_email(&command.email).await?;

        if let Some(existing) = account.as_ref().and_then(|a| a.authentication(Provider::Local)) {
            return Err(AuthenticationError::AlreadySignedUp {
                verified: existing.is_verified_local(),
            });
        }

        let password_hash = self.hash_password(command.password.expose())?;
        let now = Utc::now();

        let owner = match account {
            Some(account) => AccountOwner::Existing(account.user.id),
            None => AccountOwner::New(User::with_email(command.email.clone(), now)),
        };

        let temporary_info = TemporaryInfo {
            username: Some(command.username.clone()),
            first_name: command.first_name,
            last_name: command.last_name,
            avatar_url: command.avatar_url,
        };
        let record = AuthenticationRecord::new(
            owner.user_id(),
            AuthenticationMetadata::Local(LocalMetadata::pending(password_hash, temporary_info)),
            now,
        );
        let event = DomainEvent::build(
            EventName::AuthLocalCreated,
            record.user_id,
            record.id,
            EventMetadata::LocalCreated(LocalCreatedMetadata {
                email: command.email,
            }),
        )?;

        let created = self
            .repository
            .create_local(LocalSignUp {
                owner,
                username: command.username,
                record,
                event: event.clone(),
            })
            .await?;

        tracing::info!(
            user_id = %created.user_id,
            authentication_id = %created.id,
            "Local sign-up recorded, pending email verification"
        );

        self.publish_recorded(&event).await;

        Ok(created)
    }

    async fn local_verification_email(
        &self,
        token: &str,
    ) -> Result<AccessToken, AuthenticationError> {
        let (_, user_id, provider) = self.verified_subject(token)?;
        if provider != Provider::Local {
            return Err(AuthenticationError::InvalidToken);
        }

        let mut record = self
            .repository
            .find_authentication(&user_id, Provider::Local)
            .await?
            .ok_or(AuthenticationError::NotFound(user_id.to_string()))?;

        let now = Utc::now();
        let local = record
            .local_mut()
            .ok_or(AuthenticationError::NotFound(user_id.to_string()))?;
        if local.is_email_verified {
            return Err(AuthenticationError::AlreadyVerified);
        }
        let profile = local.confirm(now).map(ProfileUpdate::from).unwrap_or_default();

        let session = self.issue_session(&user_id, Provider::Local)?;
        record.start_session(session.refresh_token, now);

        let event = DomainEvent::new(user_id, record.id, EventMetadata::Verified);
        self.repository
            .confirm_verification(VerificationConfirmation {
                record,
                profile,
                event: event.clone(),
            })
            .await?;

        tracing::info!(user_id = %user_id, "Email verified");

        self.publish_recorded(&event).await;

        Ok(AccessToken {
            access_token: session.access_token,
        })
    }

    async fn local_sign_in(
        &self,
        account: UserAccount,
    ) -> Result<AuthenticatedSession, AuthenticationError> {
        let user_id = account.user.id;
        let record = match account.authentication(Provider::Local) {
            Some(record) => Some(record.clone()),
            None => {
                self.repository
                    .find_authentication(&user_id, Provider::Local)
                    .await?
            }
        };

        let mut record = record.ok_or(AuthenticationError::InvalidCredentials)?;
        if !record.is_verified_local() {
            tracing::warn!(user_id = %user_id, "Sign-in rejected, email not verified");
            return Err(AuthenticationError::EmailNotVerified);
        }

        let session = self.issue_session(&user_id, Provider::Local)?;
        record.start_session(session.refresh_token.clone(), Utc::now());

        self.repository
            .renew_session(SessionRenewal { record })
            .await?;

        tracing::info!(user_id = %user_id, provider = "local", "Signed in");

        Ok(AuthenticatedSession {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        })
    }

    async fn local_password_forgot(&self, email: EmailAddress) -> Result<(), AuthenticationError> {
        let account = self.repository.find_account_by_email(&email).await?;

        let target = account.as_ref().and_then(|account| {
            account
                .authentication(Provider::Local)
                .filter(|record| record.is_verified_local())
                .map(|record| (account, record))
        });

        let Some((account, record)) = target else {
            tracing::warn!("Password reset requested for an unknown or unverified account");
            return Ok(());
        };

        let event = DomainEvent::new(
            account.user.id,
            record.id,
            EventMetadata::PasswordReset(PasswordResetMetadata {
                username: account.user.username.as_ref().map(|u| u.to_string()),
                email,
            }),
        );
        self.event_store.create_event(&event).await?;

        tracing::info!(user_id = %account.user.id, "Password reset requested");

        self.publish_recorded(&event).await;

        Ok(())
    }

    async fn local_password_reset(
        &self,
        command: PasswordResetCommand,
    ) -> Result<(), AuthenticationError> {
        // The subject is read before the signature can be checked: the key
        // depends on the record the token points to.
        let claims = self
            .authenticator
            .decode_token(&command.token)
            .map_err(|_| AuthenticationError::InvalidOrExpiredToken)?;
        let (user_id, provider) =
            subject_of(&claims).ok_or(AuthenticationError::InvalidOrExpiredToken)?;
        if provider != Provider::Local {
            return Err(AuthenticationError::InvalidOrExpiredToken);
        }

        let record = self
            .repository
            .find_authentication(&user_id, Provider::Local)
            .await?
            .filter(|record| record.is_verified_local())
            .ok_or(AuthenticationError::InvalidOrExpiredToken)?;
        let current_hash = record
            .local()
            .map(|local| local.password.clone())
            .ok_or(AuthenticationError::InvalidOrExpiredToken)?;

        self.authenticator
            .validate_reset_token(&command.token, &current_hash)
            .map_err(|_| AuthenticationError::InvalidOrExpiredToken)?;

        let new_hash = self.hash_password(command.new_password.expose())?;

        let event = DomainEvent::new(user_id, record.id, EventMetadata::PasswordReseted);
        self.repository
            .change_password(PasswordChange {
                record_id: record.id,
                user_id,
                previous_hash: current_hash,
                new_hash,
                event: event.clone(),
            })
            .await?;

        tracing::info!(user_id = %user_id, "Password reset, all sessions cleared");

        self.publish_recorded(&event).await;

        Ok(())
    }

    async fn sign_out(&self, payload: &TokenPayload) -> Result<(), AuthenticationError> {
        let (user_id, provider) = subject_of(payload).ok_or(AuthenticationError::InvalidToken)?;

        if let Some(jwti) = payload.jwti.as_deref() {
            self.revocation_store
                .add_to_blacklist(jwti, payload.exp)
                .await?;
        }

        self.repository
            .clear_refresh_token(&user_id, provider)
            .await?;

        tracing::info!(user_id = %user_id, provider = %provider, "Signed out");

        Ok(())
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<AccessToken, AuthenticationError> {
        let (payload, user_id, provider) = self.verified_subject(refresh_token)?;
        self.ensure_not_revoked(&payload).await?;

        let record = self
            .repository
            .find_authentication(&user_id, provider)
            .await?
            .ok_or(AuthenticationError::InvalidToken)?;

        if record.refresh_token.as_deref() != Some(refresh_token) {
            tracing::warn!(
                user_id = %user_id,
                provider = %provider,
                "Superseded refresh token presented"
            );
            return Err(AuthenticationError::RefreshTokenMismatch);
        }

        let (access_token, _) = self
            .authenticator
            .issue_access_token(&user_id.to_string(), provider.as_str())
            .map_err(signing_error)?;

        self.repository
            .touch_authentication(&record.id, Utc::now())
            .await?;

        Ok(AccessToken { access_token })
    }

    async fn retrieve_profile(&self, user_id: &UserId) -> Result<User, AuthenticationError> {
        self.repository
            .find_account_by_id(user_id)
            .await?
            .map(|account| account.user)
            .ok_or(AuthenticationError::UserNotFound(user_id.to_string()))
    }

    async fn federated_sign_in(
        &self,
        profile: FederatedProfile,
    ) -> Result<AuthenticatedSession, AuthenticationError> {
        let metadata = AuthenticationMetadata::federated(profile.provider, profile.metadata)?;
        let account = self.repository.find_account_by_email(&profile.email).await?;
        let now = Utc::now();

        let (owner, existing) = match account {
            Some(account) => {
                let existing = account.authentication(profile.provider).cloned();
                (AccountOwner::Existing(account.user.id), existing)
            }
            None => {
                let mut user = User::with_email(profile.email, now);
                user.first_name = profile.first_name;
                user.last_name = profile.last_name;
                user.avatar_url = profile.avatar_url;
                (AccountOwner::New(user), None)
            }
        };
        let user_id = owner.user_id();

        let (mut record, event) = match existing {
            Some(mut record) => {
                record.metadata = metadata;
                (record, None)
            }
            None => {
                let record = AuthenticationRecord::new(user_id, metadata, now);
                let event = DomainEvent::new(
                    user_id,
                    record.id,
                    EventMetadata::FederatedLinked(FederatedLinkedMetadata {
                        provider: profile.provider,
                    }),
                );
                (record, Some(event))
            }
        };

        let session = self.issue_session(&user_id, profile.provider)?;
        record.start_session(session.refresh_token.clone(), now);

        self.repository
            .link_federated(FederatedLink {
                owner,
                record,
                event: event.clone(),
            })
            .await?;

        tracing::info!(user_id = %user_id, provider = %profile.provider, "Signed in");

        if let Some(event) = &event {
            self.publish_recorded(event).await;
        }

        Ok(AuthenticatedSession {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        })
    }

    async fn authenticate_access_token(
        &self,
        token: &str,
    ) -> Result<TokenPayload, AuthenticationError> {
        let (payload, _, _) = self.verified_subject(token)?;
        if payload.jwti.is_none() {
            return Err(AuthenticationError::InvalidToken);
        }
        self.ensure_not_revoked(&payload).await?;
        Ok(payload)
    }

    async fn prepare_dispatch(
        &self,
        event: &DomainEvent,
    ) -> Result<Option<PreparedDispatch>, AuthenticationError> {
        match event.name {
            EventName::AuthLocalCreated => self.prepare_verification(event).await,
            EventName::AuthLocalPasswordReset => self.prepare_password_reset(event).await,
            _ => Ok(None),
        }
    }

    async fn commit_dispatch(
        &self,
        dispatch: PreparedDispatch,
        deliver: Delivery,
    ) -> Result<(), AuthenticationError> {
        let sent = EmailSentMetadata {
            email: dispatch.recipient.clone(),
            callback_url: dispatch.callback_url.clone(),
        };
        let (metadata, verification_sent_at) = match dispatch.kind {
            DispatchKind::Verification => (EventMetadata::VerificationSent(sent), Some(Utc::now())),
            DispatchKind::PasswordReset => (EventMetadata::PasswordResetSent(sent), None),
        };
        let event = DomainEvent::new(dispatch.user_id, dispatch.record_id, metadata);

        self.repository
            .commit_dispatch(
                EmailDispatch {
                    record_id: dispatch.record_id,
                    callback_url: dispatch.callback_url,
                    verification_sent_at,
                    event: event.clone(),
                },
                deliver,
            )
            .await?;

        tracing::info!(
            authentication_id = %dispatch.record_id,
            event_name = %event.name,
            "Email dispatched"
        );

        self.publish_recorded(&event).await;

        Ok(())
    }
}
