use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::authentication::errors::EventShapeError;
use crate::authentication::models::AuthenticationId;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::Provider;
use crate::authentication::models::UserId;

/// Domain event unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Closed set of facts the authentication domain records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    AuthLocalCreated,
    AuthLocalVerificationSent,
    AuthLocalVerified,
    AuthLocalPasswordReset,
    AuthLocalPasswordResetSent,
    AuthLocalPasswordReseted,
    AuthFederatedLinked,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::AuthLocalCreated => "AUTH_LOCAL_CREATED",
            EventName::AuthLocalVerificationSent => "AUTH_LOCAL_VERIFICATION_SENT",
            EventName::AuthLocalVerified => "AUTH_LOCAL_VERIFIED",
            EventName::AuthLocalPasswordReset => "AUTH_LOCAL_PASSWORD_RESET",
            EventName::AuthLocalPasswordResetSent => "AUTH_LOCAL_PASSWORD_RESET_SENT",
            EventName::AuthLocalPasswordReseted => "AUTH_LOCAL_PASSWORD_RESETED",
            EventName::AuthFederatedLinked => "AUTH_FEDERATED_LINKED",
        }
    }
}

impl FromStr for EventName {
    type Err = EventShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTH_LOCAL_CREATED" => Ok(EventName::AuthLocalCreated),
            "AUTH_LOCAL_VERIFICATION_SENT" => Ok(EventName::AuthLocalVerificationSent),
            "AUTH_LOCAL_VERIFIED" => Ok(EventName::AuthLocalVerified),
            "AUTH_LOCAL_PASSWORD_RESET" => Ok(EventName::AuthLocalPasswordReset),
            "AUTH_LOCAL_PASSWORD_RESET_SENT" => Ok(EventName::AuthLocalPasswordResetSent),
            "AUTH_LOCAL_PASSWORD_RESETED" => Ok(EventName::AuthLocalPasswordReseted),
            "AUTH_FEDERATED_LINKED" => Ok(EventName::AuthFederatedLinked),
            other => Err(EventShapeError::UnknownName(other.to_string())),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCreatedMetadata {
    pub email: EmailAddress,
}

/// Payload of the "email sent" facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSentMetadata {
    pub email: EmailAddress,
    pub callback_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub email: EmailAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedLinkedMetadata {
    pub provider: Provider,
}

/// Payload of a domain event, one variant per event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMetadata {
    LocalCreated(LocalCreatedMetadata),
    VerificationSent(EmailSentMetadata),
    Verified,
    PasswordReset(PasswordResetMetadata),
    PasswordResetSent(EmailSentMetadata),
    PasswordReseted,
    FederatedLinked(FederatedLinkedMetadata),
}

impl EventMetadata {
    /// Name of the only event this payload belongs to.
    pub fn name(&self) -> EventName {
        match self {
            EventMetadata::LocalCreated(_) => EventName::AuthLocalCreated,
            EventMetadata::VerificationSent(_) => EventName::AuthLocalVerificationSent,
            EventMetadata::Verified => EventName::AuthLocalVerified,
            EventMetadata::PasswordReset(_) => EventName::AuthLocalPasswordReset,
            EventMetadata::PasswordResetSent(_) => EventName::AuthLocalPasswordResetSent,
            EventMetadata::PasswordReseted => EventName::AuthLocalPasswordReseted,
            EventMetadata::FederatedLinked(_) => EventName::AuthFederatedLinked,
        }
    }

    /// Serialize the payload alone, without the name tag.
    ///
    /// # Errors
    /// * `Malformed` - Payload could not be serialized
    pub fn to_json(&self) -> Result<serde_json::Value, EventShapeError> {
        let value = match self {
            EventMetadata::LocalCreated(metadata) => serde_json::to_value(metadata),
            EventMetadata::VerificationSent(metadata)
            | EventMetadata::PasswordResetSent(metadata) => serde_json::to_value(metadata),
            EventMetadata::PasswordReset(metadata) => serde_json::to_value(metadata),
            EventMetadata::FederatedLinked(metadata) => serde_json::to_value(metadata),
            EventMetadata::Verified | EventMetadata::PasswordReseted => {
                Ok(serde_json::Value::Object(serde_json::Map::new()))
            }
        };

        value.map_err(|e| EventShapeError::Malformed {
            name: self.name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a payload for a given event name.
    ///
    /// # Arguments
    /// * `name` - Event name selecting the payload shape
    /// * `value` - Untagged JSON payload
    ///
    /// # Errors
    /// * `Malformed` - Payload does not fit the shape of `name`
    pub fn from_json(name: EventName, value: serde_json::Value) -> Result<Self, EventShapeError> {
        let malformed = |e: serde_json::Error| EventShapeError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        };

        match name {
            EventName::AuthLocalCreated => serde_json::from_value(value)
                .map(EventMetadata::LocalCreated)
                .map_err(malformed),
            EventName::AuthLocalVerificationSent => serde_json::from_value(value)
                .map(EventMetadata::VerificationSent)
                .map_err(malformed),
            EventName::AuthLocalVerified => Ok(EventMetadata::Verified),
            EventName::AuthLocalPasswordReset => serde_json::from_value(value)
                .map(EventMetadata::PasswordReset)
                .map_err(malformed),
            EventName::AuthLocalPasswordResetSent => serde_json::from_value(value)
                .map(EventMetadata::PasswordResetSent)
                .map_err(malformed),
            EventName::AuthLocalPasswordReseted => Ok(EventMetadata::PasswordReseted),
            EventName::AuthFederatedLinked => serde_json::from_value(value)
                .map(EventMetadata::FederatedLinked)
                .map_err(malformed),
        }
    }
}

/// Immutable fact about an authentication record.
///
/// Written once in the same transaction as the state change it describes,
/// then published to asynchronous consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub id: EventId,
    pub name: EventName,
    pub user_id: UserId,
    pub model_id: AuthenticationId,
    pub metadata: EventMetadata,
    pub created_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Build an event from its name and payload.
    ///
    /// # Arguments
    /// * `name` - Event name
    /// * `user_id` - User the fact concerns
    /// * `model_id` - Authentication record the fact concerns
    /// * `metadata` - Payload; must be the variant registered for `name`
    ///
    /// # Returns
    /// DomainEvent with a fresh identifier
    ///
    /// # Errors
    /// * `MetadataMismatch` - Payload belongs to another event name
    pub fn build(
        name: EventName,
        user_id: UserId,
        model_id: AuthenticationId,
        metadata: EventMetadata,
    ) -> Result<Self, EventShapeError> {
        if metadata.name() != name {
            return Err(EventShapeError::MetadataMismatch {
                name: name.to_string(),
                actual: metadata.name().to_string(),
            });
        }

        Ok(Self {
            id: EventId::new(),
            name,
            user_id,
            model_id,
            metadata,
            created_at: Utc::now(),
        })
    }

    /// Build an event named after its payload.
    pub fn new(user_id: UserId, model_id: AuthenticationId, metadata: EventMetadata) -> Self {
        Self {
            id: EventId::new(),
            name: metadata.name(),
            user_id,
            model_id,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Rebuild an event from its stored or transmitted columns.
    ///
    /// # Errors
    /// * `UnknownName` - Name is not registered
    /// * `Malformed` - Payload does not fit the shape of the name
    pub fn restore(
        id: EventId,
        name: &str,
        user_id: UserId,
        model_id: AuthenticationId,
        metadata: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<Self, EventShapeError> {
        let name = EventName::from_str(name)?;
        let metadata = EventMetadata::from_json(name, metadata)?;

        Ok(Self {
            id,
            name,
            user_id,
            model_id,
            metadata,
            created_at,
        })
    }
}
