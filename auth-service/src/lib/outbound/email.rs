mod smtp;
mod templates;

pub use smtp::SmtpEmailTransport;
pub use templates::HandlebarsTemplateRenderer;
