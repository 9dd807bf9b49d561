use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rdkafka::consumer::CommitMode;
use rdkafka::consumer::Consumer;
use rdkafka::consumer::StreamConsumer;
use rdkafka::message::BorrowedMessage;
use rdkafka::ClientConfig;
use rdkafka::Message;
use rdkafka::Offset;
use thiserror::Error;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::events::DomainEvent;
use crate::config::Config;
use crate::notification::errors::NotificationError;
use crate::notification::ports::DomainEventHandler;
use crate::outbound::events::DomainEventMessage;

const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
enum MessageProcessingError {
    #[error("Message has no payload")]
    NoPayload,

    #[error("Failed to decode message payload as UTF-8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("Failed to deserialize event: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Message is not a valid domain event: {0}")]
    InvalidEvent(#[from] AuthenticationError),

    #[error("Failed to handle event: {0}")]
    HandlingError(#[from] NotificationError),
}

impl MessageProcessingError {
    /// Whether redelivering the message could ever succeed.
    fn is_retryable(&self) -> bool {
        matches!(self, MessageProcessingError::HandlingError(_))
    }
}

fn decode(payload: Option<&[u8]>) -> Result<DomainEvent, MessageProcessingError> {
    let payload = payload.ok_or(MessageProcessingError::NoPayload)?;
    let json_str = std::str::from_utf8(payload)?;
    let message = serde_json::from_str::<DomainEventMessage>(json_str)?;
    Ok(DomainEvent::try_from(message)?)
}

/// Kafka consumer performing the email side effects of authentication facts.
///
/// Offsets are committed by hand: a message is acknowledged only once its
/// side effect committed. A failed message is sought back to so the same
/// partition redelivers it after a backoff.
pub struct EmailEventConsumer<H: DomainEventHandler> {
    consumer: StreamConsumer,
    handler: Arc<H>,
}

impl<H: DomainEventHandler> EmailEventConsumer<H> {
    /// Create a new email events consumer
    ///
    /// # Arguments
    /// * `config` - Application configuration
    /// * `handler` - Side effect performed for every fact
    pub fn new(config: &Config, handler: Arc<H>) -> Result<Self, anyhow::Error> {
        tracing::info!(
            brokers = %config.kafka.brokers,
            group_id = %config.kafka.group_id,
            topic = %config.kafka.topic,
            "Initializing email events consumer"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka.brokers)
            .set("group.id", &config.kafka.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[&config.kafka.topic])?;

        Ok(Self { consumer, handler })
    }

    /// Start consuming events from Kafka
    ///
    /// This is a long-running task that should be spawned in a separate tokio task
    pub async fn start_consuming(self) -> anyhow::Result<()> {
        tracing::info!("Starting email events consumer loop");

        let mut message_stream = self.consumer.stream();

        while let Some(result) = message_stream.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(error = %e, "Kafka consumer error");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            match self.process_message(&message).await {
                Ok(()) => self.ack(&message),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Event handling failed, message will be redelivered"
                    );
                    self.nack(&message).await;
                }
                Err(e) => {
                    // Redelivery cannot fix a malformed message; it would block the partition.
                    tracing::error!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Dropping undecodable message"
                    );
                    self.ack(&message);
                }
            }
        }

        tracing::warn!("Email events consumer loop ended");

        Ok(())
    }

    async fn process_message(
        &self,
        message: &BorrowedMessage<'_>,
    ) -> Result<(), MessageProcessingError> {
        let event = decode(message.payload())?;

        tracing::debug!(
            event_id = %event.id,
            event_name = %event.name,
            "Received domain event"
        );

        let outcome = self.handler.handle(&event).await?;

        tracing::debug!(event_id = %event.id, outcome = ?outcome, "Domain event handled");

        Ok(())
    }

    fn ack(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            tracing::error!(error = %e, "Failed to commit message offset");
        }
    }

    async fn nack(&self, message: &BorrowedMessage<'_>) {
        let seek = self.consumer.seek(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset()),
            SEEK_TIMEOUT,
        );
        if let Err(e) = seek {
            tracing::error!(
                error = %e,
                "Failed to rewind partition, message will be redelivered after a rebalance"
            );
        }

        tokio::time::sleep(RETRY_BACKOFF).await;
    }
}
