use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::ports::EventPublisher;
use crate::authentication::ports::EventStore;

/// Polling settings of the outbox relay.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub poll_interval: Duration,
    /// Age an unpublished event must reach before the relay takes it over.
    pub grace: Duration,
    pub batch_size: i64,
}

/// Republishes recorded events whose post-commit publish never happened.
///
/// Covers a crash or broker outage between a commit and its publish. A fact
/// may reach the broker twice; consumers re-read the record and stay idempotent.
pub struct OutboxRelay<ES, EP>
where
    ES: EventStore,
    EP: EventPublisher,
{
    event_store: Arc<ES>,
    publisher: Arc<EP>,
    settings: RelaySettings,
}

impl<ES, EP> OutboxRelay<ES, EP>
where
    ES: EventStore,
    EP: EventPublisher,
{
    pub fn new(event_store: Arc<ES>, publisher: Arc<EP>, settings: RelaySettings) -> Self {
        Self {
            event_store,
            publisher,
            settings,
        }
    }

    /// Publish one batch of overdue events.
    ///
    /// Stops at the first publish failure so events keep their order.
    ///
    /// # Returns
    /// Number of events published
    ///
    /// # Errors
    /// * `DatabaseError` - Events could not be read
    pub async fn relay_once(&self) -> Result<usize, AuthenticationError> {
        let grace = chrono::Duration::from_std(self.settings.grace)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let overdue = self
            .event_store
            .find_unpublished(Utc::now() - grace, self.settings.batch_size)
            .await?;

        let mut published = 0;
        for event in &overdue {
            if let Err(e) = self.publisher.publish(event).await {
                tracing::warn!(
                    event_id = %event.id,
                    event_name = %event.name,
                    error = %e,
                    "Outbox relay could not publish event, retrying on next tick"
                );
                break;
            }

            self.event_store.mark_published(&event.id).await?;
            published += 1;
        }

        if published > 0 {
            tracing::info!(published, "Outbox relay republished events");
        }

        Ok(published)
    }

    /// Run the relay until the task is dropped.
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            poll_interval_seconds = self.settings.poll_interval.as_secs(),
            grace_seconds = self.settings.grace.as_secs(),
            "Outbox relay started"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.relay_once().await {
                tracing::error!(error = %e, "Outbox relay tick failed");
            }
        }
    }
}
