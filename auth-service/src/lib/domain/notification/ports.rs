use async_trait::async_trait;

use crate::authentication::events::DomainEvent;
use crate::notification::errors::NotificationError;
use crate::notification::models::DispatchOutcome;
use crate::notification::models::OutgoingEmail;

/// Outbound mail delivery.
#[async_trait]
pub trait EmailTransport: Send + Sync + 'static {
    /// Send one email.
    ///
    /// # Errors
    /// * `InvalidMessage` - Addresses or content rejected before sending
    /// * `TransportFailed` - Mail server rejected or could not be reached
    async fn send_mail(&self, email: OutgoingEmail) -> Result<(), NotificationError>;
}

/// Renders named templates with JSON data.
pub trait TemplateRenderer: Send + Sync + 'static {
    /// Render a template.
    ///
    /// # Arguments
    /// * `template` - Template path relative to the templates directory
    /// * `data` - Values available to the template
    ///
    /// # Errors
    /// * `TemplateMissing` - No such template
    /// * `RenderingFailed` - Template could not be rendered
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, NotificationError>;
}

/// Consumer-side handler of domain events.
#[async_trait]
pub trait DomainEventHandler: Send + Sync + 'static {
    /// Perform the side effect a fact calls for.
    ///
    /// # Errors
    /// Any error means the message must be redelivered
    async fn handle(&self, event: &DomainEvent) -> Result<DispatchOutcome, NotificationError>;
}
