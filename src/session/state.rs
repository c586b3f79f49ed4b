use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Where the session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut,
    LoggedIn,
    Refreshing,
}

/// In-memory copy of the persisted session
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Map<String, Value>,
    pub permissions: BTreeSet<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_authenticated() {
            SessionPhase::LoggedIn
        } else {
            SessionPhase::LoggedOut
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.get("username").and_then(Value::as_str)
    }

    /// Shallow merge, incoming fields win
    pub fn merge_user(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.user.insert(key, value);
        }
    }

    /// Back to the logged-out default
    pub fn clear(&mut self) {
        *self = Session::default();
    }
}

/// Short, log-safe form of a secret
pub fn redact(token: &str) -> String {
    if token.is_empty() {
        return "<none>".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}
