//! Key/value persistence behind the session.
//!
//! Backends only know about strings. `SessionStore` layers the fixed key set
//! and JSON decoding on top and swallows backend failures.

mod file;
mod memory;
mod session_store;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use session_store::SessionStore;

use crate::common::StorageError;

/// The fixed set of persisted session keys
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Token,
    RefreshToken,
    User,
    Perms,
}

impl StorageKey {
    pub const ALL: [StorageKey; 4] = [
        StorageKey::Token,
        StorageKey::RefreshToken,
        StorageKey::User,
        StorageKey::Perms,
    ];

    /// Name the value is stored under
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::RefreshToken => "refreshToken",
            StorageKey::User => "user",
            StorageKey::Perms => "perms",
        }
    }
}

/// A persistence backend.
///
/// `set` and `remove` report failures; callers decide whether they matter.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::StorageKey;

    #[test]
    fn key_names_match_wire_names() {
        let names: Vec<&str> = StorageKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["token", "refreshToken", "user", "perms"]);
    }
}
