use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;

use super::database_error;
use crate::authentication::errors::AuthenticationError;
use crate::authentication::events::DomainEvent;
use crate::authentication::events::EventId;
use crate::authentication::models::AuthenticationId;
use crate::authentication::models::UserId;
use crate::authentication::ports::EventStore;

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    user_id: Uuid,
    model_id: Uuid,
    metadata: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for DomainEvent {
    type Error = AuthenticationError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(DomainEvent::restore(
            EventId(row.id),
            &row.name,
            UserId(row.user_id),
            AuthenticationId(row.model_id),
            row.metadata.0,
            row.created_at,
        )?)
    }
}

/// Append-only domain event table doubling as the publication outbox.
#[derive(Clone)]
pub struct PostgresEventRecorder {
    pool: PgPool,
}

impl PostgresEventRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist an event.
    ///
    /// # Arguments
    /// * `event` - Event to insert; None is a no-op
    /// * `connection` - Open transaction to join; without one the insert runs in its own
    ///
    /// # Errors
    /// * `EventShape` - Metadata could not be serialized
    /// * `DatabaseError` - Database operation failed
    pub async fn record(
        &self,
        event: Option<&DomainEvent>,
        connection: Option<&mut PgConnection>,
    ) -> Result<(), AuthenticationError> {
        let Some(event) = event else {
            return Ok(());
        };

        match connection {
            Some(connection) => insert_event(connection, event).await,
            None => {
                let mut tx = self.pool.begin().await.map_err(database_error)?;
                insert_event(&mut tx, event).await?;
                tx.commit().await.map_err(database_error)
            }
        }
    }
}

pub(super) async fn insert_event(
    connection: &mut PgConnection,
    event: &DomainEvent,
) -> Result<(), AuthenticationError> {
    let metadata = event.metadata.to_json()?;

    sqlx::query(
        r#"
        INSERT INTO domain_events (id, name, user_id, model_id, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event.id.0)
    .bind(event.name.as_str())
    .bind(event.user_id.0)
    .bind(event.model_id.0)
    .bind(Json(metadata))
    .bind(event.created_at)
    .execute(connection)
    .await
    .map_err(database_error)?;

    tracing::debug!(event_id = %event.id, event_name = %event.name, "Domain event recorded");

    Ok(())
}

#[async_trait]
impl EventStore for PostgresEventRecorder {
    async fn create_event(&self, event: &DomainEvent) -> Result<(), AuthenticationError> {
        self.record(Some(event), None).await
    }

    async fn mark_published(&self, id: &EventId) -> Result<(), AuthenticationError> {
        sqlx::query(
            r#"
            UPDATE domain_events
            SET published_at = now()
            WHERE id = $1 AND published_at IS NULL
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    async fn find_unpublished(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DomainEvent>, AuthenticationError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, name, user_id, model_id, metadata, created_at
            FROM domain_events
            WHERE published_at IS NULL AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(DomainEvent::try_from).collect()
    }
}
