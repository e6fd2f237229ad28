use std::fmt::{Debug, Display};

use async_trait::async_trait;

use super::Secret;

/// Longest identifier a store will accept
pub const MAX_ID_LEN: usize = 128;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretStoreError<T> {
    #[error("unhandled secret store error: {0}")]
    Provider(#[from] T),
    #[error("secret not found: {0}")]
    NotFound(String),
    /// Identifiers name files, so anything that could escape the store
    ///  directory is refused
    #[error("invalid secret id: {0:?}")]
    InvalidId(String),
}

/// Check that `id` is safe to use as a storage key
///
/// Accepts 1 to [`MAX_ID_LEN`] characters of ASCII letters, digits, `-`,
/// `_` and `.`, not starting with a `.`. Content hashes in hex always pass.
pub fn validate_id<T>(id: &str) -> Result<(), SecretStoreError<T>> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(SecretStoreError::InvalidId(id.to_string()))
    }
}

/// Persistent storage for secrets, keyed by identifier
///
/// Implementations are cheap to clone and shared between the command line
/// and transfer sessions.
#[async_trait]
pub trait SecretStore: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send;

    async fn exists(&self, id: &str) -> Result<bool, SecretStoreError<Self::Error>>;

    /// Load a secret
    ///
    /// Should fail with `SecretStoreError::NotFound` if nothing is stored
    ///  under `id`.
    async fn load(&self, id: &str) -> Result<Secret, SecretStoreError<Self::Error>>;

    /// Store a secret, replacing anything already stored under `id`
    async fn save(&self, id: &str, secret: &Secret) -> Result<(), SecretStoreError<Self::Error>>;

    /// All stored secrets, ordered by id
    async fn list(&self) -> Result<Vec<(String, Secret)>, SecretStoreError<Self::Error>>;

    /// Remove a secret
    ///
    /// Should fail with `SecretStoreError::NotFound` if nothing is stored
    ///  under `id`.
    async fn delete(&self, id: &str) -> Result<(), SecretStoreError<Self::Error>>;
}

#[cfg(test)]
mod test {
    use super::*;

    type Error = SecretStoreError<std::io::Error>;

    #[test]
    fn test_valid_ids() {
        let hash = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        for id in [hash, "a", "my-secret_1.txt"] {
            assert!(validate_id::<std::io::Error>(id).is_ok(), "{}", id);
        }
    }

    #[test]
    fn test_invalid_ids() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        for id in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "with space", long.as_str()] {
            assert!(matches!(
                validate_id::<std::io::Error>(id),
                Err(Error::InvalidId(_))
            ));
        }
    }
}
