mod authentication;
mod events;

pub use authentication::PostgresAuthenticationRepository;
pub use events::PostgresEventRecorder;

use crate::authentication::errors::AuthenticationError;

fn database_error(e: sqlx::Error) -> AuthenticationError {
    AuthenticationError::DatabaseError(e.to_string())
}

/// Name of the unique constraint an error violated, if any.
fn violated_unique_constraint(e: &sqlx::Error) -> Option<&str> {
    e.as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .and_then(|db_err| db_err.constraint())
}
