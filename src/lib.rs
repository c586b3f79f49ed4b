//! Client-side session management for the OA platform services.
//!
//! A [`SessionManager`] owns the access/refresh tokens, the user profile and
//! the permission set, mirroring them into a [`Storage`] backend. An
//! [`ApiClient`] sends every request with the bearer token and ends the
//! session on a 401. [`OaClient`] wires the two together with the auth,
//! platform and document service wrappers.

pub mod api;
pub mod common;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod transport;

pub use api::OaClient;
pub use common::{ClientConfig, ConfigError, SessionError, StorageError};
pub use pipeline::{ApiClient, ChannelNotifier, Notifier, TracingNotifier, UiEvent};
pub use session::{Credentials, Session, SessionManager, SessionPhase};
pub use storage::{FileStorage, MemoryStorage, SessionStore, Storage, StorageKey};
