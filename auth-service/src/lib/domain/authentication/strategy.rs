use std::sync::Arc;

use async_trait::async_trait;
use auth::Authenticator;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::Provider;
use crate::authentication::models::UserAccount;
use crate::authentication::ports::AuthenticationRepository;

/// Checks credentials of one kind and resolves the principal they belong to.
#[async_trait]
pub trait CredentialStrategy: Send + Sync + 'static {
    type Credentials: Send;

    /// Authenticate credentials.
    ///
    /// # Returns
    /// Authenticated user with its records
    ///
    /// # Errors
    /// * `InvalidCredentials` - Credentials do not identify a user
    async fn authenticate(
        &self,
        credentials: Self::Credentials,
    ) -> Result<UserAccount, AuthenticationError>;
}

/// Email and password submitted to the local sign-in.
#[derive(Debug)]
pub struct LocalCredentials {
    pub email: EmailAddress,
    pub password: String,
}

/// Email and password strategy backed by the local record's hash.
pub struct LocalStrategy<AR>
where
    AR: AuthenticationRepository,
{
    repository: Arc<AR>,
    authenticator: Arc<Authenticator>,
}

impl<AR> LocalStrategy<AR>
where
    AR: AuthenticationRepository,
{
    pub fn new(repository: Arc<AR>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            repository,
            authenticator,
        }
    }
}

#[async_trait]
impl<AR> CredentialStrategy for LocalStrategy<AR>
where
    AR: AuthenticationRepository,
{
    type Credentials = LocalCredentials;

    async fn authenticate(
        &self,
        credentials: LocalCredentials,
    ) -> Result<UserAccount, AuthenticationError> {
        let account = self
            .repository
            .find_account_by_email(&credentials.email)
            .await?;

        // Unknown email, missing local record and wrong password look the same to the caller.
        let Some(account) = account else {
            tracing::warn!("Sign-in attempt for unknown email");
            return Err(AuthenticationError::InvalidCredentials);
        };
        let Some(local) = account
            .authentication(Provider::Local)
            .and_then(|record| record.local())
        else {
            tracing::warn!(user_id = %account.user.id, "Sign-in attempt without local record");
            return Err(AuthenticationError::InvalidCredentials);
        };

        match self
            .authenticator
            .authenticate(&credentials.password, &local.password)
        {
            Ok(()) => Ok(account),
            Err(auth::AuthenticationError::InvalidCredentials) => {
                tracing::warn!(user_id = %account.user.id, "Sign-in attempt with wrong password");
                Err(AuthenticationError::InvalidCredentials)
            }
            Err(e) => Err(AuthenticationError::Hashing(e.to_string())),
        }
    }
}
