use crate::authentication::models::EmailAddress;

/// Fully rendered email handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: EmailAddress,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// What the handler did with a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// The fact calls for no email, or no longer does.
    Skipped,
}
