use reqwest::StatusCode;
use thiserror::Error;

/// Shown when a login is rejected without a server message
pub const LOGIN_FAILED: &str = "Login failed";
/// Shown when a refresh is rejected without a server message
pub const REFRESH_FAILED: &str = "Token refresh failed";
pub const REQUEST_FAILED: &str = "Request failed";
pub const NETWORK_FAILED: &str = "Network error, please check your connection";
pub const UNAUTHORIZED: &str = "Unauthorized, please sign in again";

/// Structured error types for session and request failures
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport level failure (unreachable host, timeout, broken body)
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// Server rejected the credentials or the refresh token
    #[error("{0}")]
    AuthFailure(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    /// 401 on an authenticated call. The session has already been torn down.
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other failed response, message as the server sent it
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Missing permission: {0}")]
    PermissionDenied(String),

    /// A newer login/refresh/logout was issued while this call was in flight
    #[error("Superseded by a newer session operation")]
    Superseded,

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl SessionError {
    /// Message suitable for the user-facing notification surface
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Network(_) => NETWORK_FAILED.to_string(),
            SessionError::Unauthorized => UNAUTHORIZED.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SessionError::Unauthorized)
    }
}

/// Failures of a persistence backend. Never escape `SessionStore`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid base_url {0:?}: must start with http:// or https://")]
    BaseUrl(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}
