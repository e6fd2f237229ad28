use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::store::{validate_id, SecretStore, SecretStoreError};
use super::Secret;

/// In-memory secret store, mostly for tests and one-shot sessions
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    inner: Arc<RwLock<BTreeMap<String, Secret>>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemorySecretStoreError {
    #[error("memory store error: {0}")]
    Internal(String),
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> SecretStoreError<MemorySecretStoreError> {
    SecretStoreError::Provider(MemorySecretStoreError::Internal(format!(
        "failed to acquire lock: {}",
        e
    )))
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    type Error = MemorySecretStoreError;

    async fn exists(&self, id: &str) -> Result<bool, SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.contains_key(id))
    }

    async fn load(&self, id: &str) -> Result<Secret, SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        let inner = self.inner.read().map_err(poisoned)?;
        inner
            .get(id)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(id.to_string()))
    }

    async fn save(&self, id: &str, secret: &Secret) -> Result<(), SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.insert(id.to_string(), secret.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(String, Secret)>, SecretStoreError<Self::Error>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .iter()
            .map(|(id, secret)| (id.clone(), secret.clone()))
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SecretStoreError::NotFound(id.to_string()))
    }
}
