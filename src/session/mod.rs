//! Session state container: tokens, user profile and permissions, mirrored
//! to a `SessionStore` on every change.

mod manager;
pub mod permissions;
mod state;
pub mod token;

pub use manager::{
    user_permissions_path, Credentials, SessionManager, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH,
};
pub use state::{redact, Session, SessionPhase};
