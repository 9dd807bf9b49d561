mod email;

pub use email::EmailEventConsumer;
