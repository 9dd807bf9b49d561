use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::events::DomainEvent;
use crate::authentication::events::EventId;
use crate::authentication::models::AuthenticationId;
use crate::authentication::models::UserId;

/// Serializable envelope of a domain event on the broker.
///
/// The payload travels untagged; `name` selects its shape on the way back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEventMessage {
    pub event_id: String,
    pub name: String,
    pub user_id: String,
    pub model_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&DomainEvent> for DomainEventMessage {
    type Error = AuthenticationError;

    fn try_from(event: &DomainEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            event_id: event.id.to_string(),
            name: event.name.to_string(),
            user_id: event.user_id.to_string(),
            model_id: event.model_id.to_string(),
            metadata: event.metadata.to_json()?,
            created_at: event.created_at,
        })
    }
}

impl TryFrom<DomainEventMessage> for DomainEvent {
    type Error = AuthenticationError;

    fn try_from(message: DomainEventMessage) -> Result<Self, Self::Error> {
        let id = uuid::Uuid::parse_str(&message.event_id)
            .map(EventId)
            .map_err(|e| AuthenticationError::Unknown(format!("Invalid event id: {}", e)))?;

        Ok(DomainEvent::restore(
            id,
            &message.name,
            UserId::from_string(&message.user_id)?,
            AuthenticationId::from_string(&message.model_id)?,
            message.metadata,
            message.created_at,
        )?)
    }
}
