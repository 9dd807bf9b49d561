pub mod consumers;
pub mod http;
