pub mod email;
pub mod events;
pub mod repositories;
pub mod revocation;
