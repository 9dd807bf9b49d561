use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;

use super::database_error;
use super::events::insert_event;
use super::violated_unique_constraint;
use super::PostgresEventRecorder;
use crate::authentication::errors::AuthenticationError;
use crate::authentication::models::AccountOwner;
use crate::authentication::models::AuthenticationId;
use crate::authentication::models::AuthenticationMetadata;
use crate::authentication::models::AuthenticationRecord;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::EmailDispatch;
use crate::authentication::models::FederatedLink;
use crate::authentication::models::LocalSignUp;
use crate::authentication::models::PasswordChange;
use crate::authentication::models::Provider;
use crate::authentication::models::SessionRenewal;
use crate::authentication::models::User;
use crate::authentication::models::UserAccount;
use crate::authentication::models::UserId;
use crate::authentication::models::Username;
use crate::authentication::models::VerificationConfirmation;
use crate::authentication::ports::AuthenticationRepository;
use crate::authentication::ports::Delivery;

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, avatar_url, \
                            created_at, updated_at, deleted_at";

const AUTHENTICATION_COLUMNS: &str =
    "id, user_id, provider, refresh_token, metadata, created_at, last_accessed_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = AuthenticationError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            email: EmailAddress::new(row.email)?,
            username: row.username.map(Username::new).transpose()?,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuthenticationRow {
    id: Uuid,
    user_id: Uuid,
    provider: String,
    refresh_token: Option<String>,
    metadata: Json<AuthenticationMetadata>,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

impl TryFrom<AuthenticationRow> for AuthenticationRecord {
    type Error = AuthenticationError;

    fn try_from(row: AuthenticationRow) -> Result<Self, Self::Error> {
        Ok(AuthenticationRecord::restore(
            AuthenticationId(row.id),
            UserId(row.user_id),
            row.provider.parse::<Provider>()?,
            row.refresh_token,
            row.metadata.0,
            row.created_at,
            row.last_accessed_at,
        )?)
    }
}

/// Map a failed sign-up or profile write onto the conflict it stands for.
fn sign_up_error(e: sqlx::Error, username: &Username) -> AuthenticationError {
    match violated_unique_constraint(&e) {
        Some("users_email_key") | Some("authentications_user_provider_key") => {
            AuthenticationError::AlreadySignedUp { verified: false }
        }
        Some("users_username_key") => AuthenticationError::UsernameTaken(username.to_string()),
        _ => database_error(e),
    }
}

/// PostgreSQL store for users and their authentication records.
///
/// Every multi-row write runs in one transaction together with the event
/// it records, so a fact exists exactly when the state change it describes
/// was committed.
pub struct PostgresAuthenticationRepository {
    pool: PgPool,
    events: PostgresEventRecorder,
}

impl PostgresAuthenticationRepository {
    /// Create a new repository.
    ///
    /// # Arguments
    /// * `pool` - PostgreSQL connection pool
    ///
    /// # Returns
    /// Repository sharing the pool with its event recorder
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: PostgresEventRecorder::new(pool.clone()),
            pool,
        }
    }

    async fn load_account(
        &self,
        row: Option<UserRow>,
    ) -> Result<Option<UserAccount>, AuthenticationError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let user = User::try_from(row)?;

        let rows = sqlx::query_as::<_, AuthenticationRow>(&format!(
            "SELECT {AUTHENTICATION_COLUMNS} FROM authentications \
             WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user.id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        let authentications = rows
            .into_iter()
            .map(AuthenticationRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(UserAccount {
            user,
            authentications,
        }))
    }
}

async fn insert_user(connection: &mut PgConnection, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, avatar_url, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(user.id.0)
    .bind(user.email.as_str())
    .bind(user.username.as_ref().map(Username::as_str))
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.avatar_url)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(connection)
    .await?;

    Ok(())
}

async fn insert_authentication(
    connection: &mut PgConnection,
    record: &AuthenticationRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO authentications (id, user_id, provider, refresh_token, metadata, created_at, last_accessed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.id.0)
    .bind(record.user_id.0)
    .bind(record.provider.as_str())
    .bind(&record.refresh_token)
    .bind(Json(&record.metadata))
    .bind(record.created_at)
    .bind(record.last_accessed_at)
    .execute(connection)
    .await?;

    Ok(())
}

/// Drop the sessions a user holds with every provider but `provider`.
async fn clear_sibling_sessions(
    connection: &mut PgConnection,
    user_id: &UserId,
    provider: Provider,
    at: DateTime<Utc>,
) -> Result<(), AuthenticationError> {
    sqlx::query(
        r#"
        UPDATE authentications
        SET refresh_token = NULL, last_accessed_at = $3
        WHERE user_id = $1 AND provider <> $2
        "#,
    )
    .bind(user_id.0)
    .bind(provider.as_str())
    .bind(at)
    .execute(connection)
    .await
    .map_err(database_error)?;

    Ok(())
}

#[async_trait]
impl AuthenticationRepository for PostgresAuthenticationRepository {
    async fn find_account_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserAccount>, AuthenticationError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        self.load_account(row).await
    }

    async fn find_account_by_id(
        &self,
        id: &UserId,
    ) -> Result<Option<UserAccount>, AuthenticationError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        self.load_account(row).await
    }

    async fn find_authentication(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<AuthenticationRecord>, AuthenticationError> {
        sqlx::query_as::<_, AuthenticationRow>(&format!(
            "SELECT {AUTHENTICATION_COLUMNS} FROM authentications \
             WHERE user_id = $1 AND provider = $2"
        ))
        .bind(user_id.0)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .map(AuthenticationRecord::try_from)
        .transpose()
    }

    async fn find_authentication_by_id(
        &self,
        id: &AuthenticationId,
    ) -> Result<Option<AuthenticationRecord>, AuthenticationError> {
        sqlx::query_as::<_, AuthenticationRow>(&format!(
            "SELECT {AUTHENTICATION_COLUMNS} FROM authentications WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .map(AuthenticationRecord::try_from)
        .transpose()
    }

    async fn create_local(
        &self,
        sign_up: LocalSignUp,
    ) -> Result<AuthenticationRecord, AuthenticationError> {
        let user_id = sign_up.owner.user_id();
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Competing claims on one username queue up here until the winner commits.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext(lower($1)))")
            .bind(sign_up.username.as_str())
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE lower(username) = lower($1) AND id <> $2
                UNION ALL
                SELECT 1 FROM authentications
                WHERE provider = 'local'
                  AND lower(metadata #>> '{local,temporaryInfo,username}') = lower($1)
                  AND user_id <> $2
            )
            "#,
        )
        .bind(sign_up.username.as_str())
        .bind(user_id.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(database_error)?;

        if taken {
            tracing::warn!(user_id = %user_id, "Sign-up rejected, username already taken");
            return Err(AuthenticationError::UsernameTaken(sign_up.username.to_string()));
        }

        if let AccountOwner::New(user) = &sign_up.owner {
            insert_user(&mut tx, user)
                .await
                .map_err(|e| sign_up_error(e, &sign_up.username))?;
        }

        insert_authentication(&mut tx, &sign_up.record)
            .await
            .map_err(|e| sign_up_error(e, &sign_up.username))?;

        insert_event(&mut tx, &sign_up.event).await?;

        tx.commit().await.map_err(database_error)?;

        Ok(sign_up.record)
    }

    async fn confirm_verification(
        &self,
        confirmation: VerificationConfirmation,
    ) -> Result<(), AuthenticationError> {
        let record = &confirmation.record;
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE authentications
            SET refresh_token = $2, metadata = $3, last_accessed_at = $4
            WHERE id = $1
              AND provider = 'local'
              AND (metadata #>> '{local,isEmailVerified}')::boolean IS NOT TRUE
            "#,
        )
        .bind(record.id.0)
        .bind(&record.refresh_token)
        .bind(Json(&record.metadata))
        .bind(record.last_accessed_at)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        // A concurrent confirmation won the race.
        if updated.rows_affected() == 0 {
            return Err(AuthenticationError::AlreadyVerified);
        }

        clear_sibling_sessions(&mut tx, &record.user_id, Provider::Local, record.last_accessed_at)
            .await?;

        let profile = &confirmation.profile;
        sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                avatar_url = COALESCE($5, avatar_url),
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(record.user_id.0)
        .bind(profile.username.as_ref().map(Username::as_str))
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .bind(record.last_accessed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match (violated_unique_constraint(&e), &profile.username) {
            (Some("users_username_key"), Some(username)) => {
                AuthenticationError::UsernameTaken(username.to_string())
            }
            _ => database_error(e),
        })?;

        insert_event(&mut tx, &confirmation.event).await?;

        tx.commit().await.map_err(database_error)
    }

    async fn renew_session(&self, renewal: SessionRenewal) -> Result<(), AuthenticationError> {
        let record = &renewal.record;
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE authentications
            SET refresh_token = $2, last_accessed_at = $3
            WHERE id = $1
            "#,
        )
        .bind(record.id.0)
        .bind(&record.refresh_token)
        .bind(record.last_accessed_at)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        if updated.rows_affected() == 0 {
            return Err(AuthenticationError::NotFound(record.id.to_string()));
        }

        clear_sibling_sessions(&mut tx, &record.user_id, record.provider, record.last_accessed_at)
            .await?;

        tx.commit().await.map_err(database_error)
    }

    async fn change_password(&self, change: PasswordChange) -> Result<(), AuthenticationError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Compare-and-set on the hash the token was checked against: a
        // concurrent reset with the same token finds no row to update.
        let updated = sqlx::query(
            r#"
            UPDATE authentications
            SET metadata = jsonb_set(metadata, '{local,password}', to_jsonb($3::text))
            WHERE id = $1 AND metadata #>> '{local,password}' = $2
            "#,
        )
        .bind(change.record_id.0)
        .bind(&change.previous_hash)
        .bind(&change.new_hash)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        if updated.rows_affected() == 0 {
            return Err(AuthenticationError::InvalidOrExpiredToken);
        }

        sqlx::query("UPDATE authentications SET refresh_token = NULL WHERE user_id = $1")
            .bind(change.user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        insert_event(&mut tx, &change.event).await?;

        tx.commit().await.map_err(database_error)
    }

    async fn clear_refresh_token(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<(), AuthenticationError> {
        sqlx::query(
            "UPDATE authentications SET refresh_token = NULL WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id.0)
        .bind(provider.as_str())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    async fn touch_authentication(
        &self,
        id: &AuthenticationId,
        at: DateTime<Utc>,
    ) -> Result<(), AuthenticationError> {
        sqlx::query("UPDATE authentications SET last_accessed_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(())
    }

    async fn link_federated(
        &self,
        link: FederatedLink,
    ) -> Result<AuthenticationRecord, AuthenticationError> {
        let record = &link.record;
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        if let AccountOwner::New(user) = &link.owner {
            insert_user(&mut tx, user).await.map_err(|e| {
                match violated_unique_constraint(&e) {
                    Some("users_email_key") => AuthenticationError::Conflict(
                        "An account with this email was created concurrently".to_string(),
                    ),
                    _ => database_error(e),
                }
            })?;
        }

        let row = sqlx::query_as::<_, AuthenticationRow>(&format!(
            r#"
            INSERT INTO authentications (id, user_id, provider, refresh_token, metadata, created_at, last_accessed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ON CONSTRAINT authentications_user_provider_key DO UPDATE
            SET refresh_token = EXCLUDED.refresh_token,
                metadata = EXCLUDED.metadata,
                last_accessed_at = EXCLUDED.last_accessed_at
            RETURNING {AUTHENTICATION_COLUMNS}
            "#
        ))
        .bind(record.id.0)
        .bind(record.user_id.0)
        .bind(record.provider.as_str())
        .bind(&record.refresh_token)
        .bind(Json(&record.metadata))
        .bind(record.created_at)
        .bind(record.last_accessed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(database_error)?;
        let linked = AuthenticationRecord::try_from(row)?;

        clear_sibling_sessions(&mut tx, &linked.user_id, linked.provider, linked.last_accessed_at)
            .await?;

        // A concurrent link may have created the record first; the fact is then theirs.
        let event = link.event.as_ref().filter(|_| linked.id == record.id);
        self.events.record(event, Some(&mut *tx)).await?;

        tx.commit().await.map_err(database_error)?;

        Ok(linked)
    }

    async fn commit_dispatch(
        &self,
        dispatch: EmailDispatch,
        deliver: Delivery,
    ) -> Result<(), AuthenticationError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        let row = sqlx::query_as::<_, AuthenticationRow>(&format!(
            "SELECT {AUTHENTICATION_COLUMNS} FROM authentications WHERE id = $1 FOR UPDATE"
        ))
        .bind(dispatch.record_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(database_error)?
        .ok_or(AuthenticationError::NotFound(dispatch.record_id.to_string()))?;

        let mut record = AuthenticationRecord::try_from(row)?;
        let local = record
            .local_mut()
            .ok_or(AuthenticationError::NotFound(dispatch.record_id.to_string()))?;
        local.callback_url = Some(dispatch.callback_url);
        if let Some(sent_at) = dispatch.verification_sent_at {
            local.verification_sent_at = Some(sent_at);
        }

        sqlx::query("UPDATE authentications SET metadata = $2 WHERE id = $1")
            .bind(record.id.0)
            .bind(Json(&record.metadata))
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        insert_event(&mut tx, &dispatch.event).await?;

        // Dropping the transaction on a failed send rolls the staged writes back.
        deliver.await?;

        tx.commit().await.map_err(database_error)
    }
}
