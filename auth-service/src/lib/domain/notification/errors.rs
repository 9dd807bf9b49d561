use thiserror::Error;

use crate::authentication::errors::AuthenticationError;

/// Error for the email side effects of domain events
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Template not found: {0}")]
    TemplateMissing(String),

    #[error("Template rendering failed: {0}")]
    RenderingFailed(String),

    #[error("Invalid email message: {0}")]
    InvalidMessage(String),

    #[error("Email transport failed: {0}")]
    TransportFailed(String),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
}
