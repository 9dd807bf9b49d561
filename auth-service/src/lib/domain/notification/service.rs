use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::authentication::errors::AuthenticationError;
use crate::authentication::events::DomainEvent;
use crate::authentication::models::PreparedDispatch;
use crate::authentication::ports::AuthenticationServicePort;
use crate::notification::errors::NotificationError;
use crate::notification::models::DispatchOutcome;
use crate::notification::models::OutgoingEmail;
use crate::notification::ports::DomainEventHandler;
use crate::notification::ports::EmailTransport;
use crate::notification::ports::TemplateRenderer;

/// Sends the verification and password reset emails domain facts call for.
///
/// The record is re-read for every fact, so a redelivered or stale message
/// only sends what the current state still warrants.
pub struct EmailNotificationService<AS, ET, TR>
where
    AS: AuthenticationServicePort,
    ET: EmailTransport,
    TR: TemplateRenderer,
{
    authentication_service: Arc<AS>,
    transport: Arc<ET>,
    renderer: Arc<TR>,
    from: String,
}

impl<AS, ET, TR> EmailNotificationService<AS, ET, TR>
where
    AS: AuthenticationServicePort,
    ET: EmailTransport,
    TR: TemplateRenderer,
{
    /// Create a new notification service.
    ///
    /// # Arguments
    /// * `authentication_service` - Orchestrator owning the record state
    /// * `transport` - Mail delivery
    /// * `renderer` - Template rendering
    /// * `from` - Sender address
    pub fn new(
        authentication_service: Arc<AS>,
        transport: Arc<ET>,
        renderer: Arc<TR>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            authentication_service,
            transport,
            renderer,
            from: from.into(),
        }
    }

    fn compose(&self, dispatch: &PreparedDispatch) -> Result<OutgoingEmail, NotificationError> {
        let data = json!({
            "email": dispatch.recipient.as_str(),
            "username": dispatch.username,
            "firstName": dispatch.first_name,
            "callbackUrl": dispatch.callback_url,
            "expiresInMinutes": dispatch.expires_in_minutes,
        });
        let template = dispatch.kind.template();

        Ok(OutgoingEmail {
            from: self.from.clone(),
            to: dispatch.recipient.clone(),
            subject: dispatch.kind.subject().to_string(),
            html: self.renderer.render(&format!("{}.html.hbs", template), &data)?,
            text: self.renderer.render(&format!("{}.txt.hbs", template), &data)?,
        })
    }
}

#[async_trait]
impl<AS, ET, TR> DomainEventHandler for EmailNotificationService<AS, ET, TR>
where
    AS: AuthenticationServicePort,
    ET: EmailTransport,
    TR: TemplateRenderer,
{
    async fn handle(&self, event: &DomainEvent) -> Result<DispatchOutcome, NotificationError> {
        let Some(dispatch) = self.authentication_service.prepare_dispatch(event).await? else {
            tracing::debug!(
                event_id = %event.id,
                event_name = %event.name,
                "No email required"
            );
            return Ok(DispatchOutcome::Skipped);
        };

        let email = self.compose(&dispatch)?;

        let transport = Arc::clone(&self.transport);
        let deliver = Box::pin(async move {
            transport
                .send_mail(email)
                .await
                .map_err(|e| AuthenticationError::Delivery(e.to_string()))
        });

        self.authentication_service
            .commit_dispatch(dispatch, deliver)
            .await?;

        Ok(DispatchOutcome::Sent)
    }
}
