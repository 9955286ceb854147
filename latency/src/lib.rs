pub mod error;
pub mod json;
pub mod multi_server;

pub use error::ParseError;
