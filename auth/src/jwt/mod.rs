pub mod claims;
pub mod errors;
pub mod handler;

pub use claims::TokenPayload;
pub use errors::JwtError;
pub use handler::JwtHandler;
pub use handler::VerifyOptions;
