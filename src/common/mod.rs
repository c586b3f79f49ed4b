pub mod config;
pub mod errors;

pub use config::ClientConfig;
pub use errors::{ConfigError, SessionError, StorageError};
