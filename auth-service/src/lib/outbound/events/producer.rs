use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;
use thiserror::Error;

use crate::authentication::errors::EventPublisherError;
use crate::authentication::events::DomainEvent;
use crate::authentication::ports::EventPublisher;
use crate::config::Config;
use crate::outbound::events::messages::DomainEventMessage;

#[derive(Debug, Error)]
pub enum KafkaProducerError {
    #[error("Failed to send message to Kafka: {0}")]
    SendError(String),

    #[error("Failed to serialize message: {0}")]
    SerializationError(String),
}

impl From<KafkaProducerError> for EventPublisherError {
    fn from(err: KafkaProducerError) -> Self {
        match err {
            KafkaProducerError::SerializationError(msg) => {
                EventPublisherError::SerializationFailed(msg)
            }
            KafkaProducerError::SendError(msg) => EventPublisherError::PublishFailed(msg),
        }
    }
}

/// Publishes authentication facts to the domain events topic.
pub struct KafkaEventProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaEventProducer {
    /// Create a new Kafka event producer with "at least once" delivery semantics
    ///
    /// # Arguments
    /// * `config` - Application configuration
    ///
    /// # Notes:
    /// - `acks=all`: Wait for all in-sync replicas to acknowledge
    /// - `enable.idempotence=true`: Prevents duplicate messages during producer retries
    /// - Consumers still see duplicates when the outbox relay republishes a fact
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        tracing::info!(
            brokers = %config.kafka.brokers,
            topic = %config.kafka.topic,
            "Initializing Kafka producer for authentication events"
        );

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka.brokers)
            .set("message.timeout.ms", "30000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "10")
            .set("max.in.flight.requests.per.connection", "5")
            .set("retry.backoff.ms", "100")
            .create()?;

        Ok(Self {
            producer,
            topic: config.kafka.topic.to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    async fn send(&self, key: &str, payload: &str) -> Result<(), KafkaProducerError> {
        // Keyed by user so facts about one user stay ordered within a partition.
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map(|_| ())
            .map_err(|(err, _)| KafkaProducerError::SendError(err.to_string()))
    }
}

#[async_trait]
impl EventPublisher for KafkaEventProducer {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventPublisherError> {
        let message = DomainEventMessage::try_from(event)
            .map_err(|e| KafkaProducerError::SerializationError(e.to_string()))?;
        let payload = serde_json::to_string(&message)
            .map_err(|e| KafkaProducerError::SerializationError(e.to_string()))?;

        self.send(&message.user_id, &payload).await.map_err(|e| {
            tracing::error!(
                event_id = %event.id,
                event_name = %event.name,
                error = %e,
                "Failed to publish domain event to Kafka"
            );
            EventPublisherError::from(e)
        })?;

        tracing::debug!(
            event_id = %event.id,
            event_name = %event.name,
            topic = %self.topic,
            "Domain event published"
        );

        Ok(())
    }
}
