mod messages;
mod producer;
mod relay;

pub use messages::DomainEventMessage;
pub use producer::KafkaEventProducer;
pub use relay::OutboxRelay;
pub use relay::RelaySettings;
