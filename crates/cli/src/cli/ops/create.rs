use std::path::PathBuf;

use clap::Args;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use common::secret::{FsSecretStoreError, Secret, SecretError, SecretStore, SecretStoreError};
use secm_cli::state::StateError;

/// Encrypt a file for this profile's identity and store it
#[derive(Args, Debug, Clone)]
pub struct Create {
    /// File holding the secret value
    pub file: PathBuf,

    #[arg(long, short)]
    pub name: String,

    #[arg(long, short, default_value = "")]
    pub description: String,

    /// Kind of secret, e.g. api-key or certificate
    #[arg(long = "type", default_value = "")]
    pub kind: String,

    /// Comma separated tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Format of the value: text, json or binary
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("Secret {0} already exists")]
    AlreadyExists(String),
    #[error("Failed to encrypt secret: {0}")]
    Seal(#[from] SecretError),
    #[error("Secret store error: {0}")]
    Store(#[from] SecretStoreError<FsSecretStoreError>),
}

/// Secrets are addressed by the hex SHA-256 of their plaintext
pub fn content_id(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Create {
    type Error = CreateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identity = state.load_identity()?;
        let store = state.secret_store().await?;

        let content = Zeroizing::new(
            tokio::fs::read(&self.file)
                .await
                .map_err(|e| CreateError::Read(self.file.clone(), e))?,
        );
        if content.is_empty() {
            return Err(CreateError::Empty(self.file.clone()));
        }

        let id = content_id(&content);
        if store.exists(&id).await? {
            return Err(CreateError::AlreadyExists(id));
        }

        let mut secret = Secret::seal(self.name.clone(), &identity.public_key(), &content)?;
        secret.description = self.description.clone();
        secret.kind = self.kind.clone();
        secret.tags = self
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        secret.format = self.format.clone();

        store.save(&id, &secret).await?;
        tracing::info!(id = %id, name = %secret.name, "secret created");
        Ok(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_content_id_is_sha256_hex() {
        assert_eq!(
            content_id(b"hunter2"),
            "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7"
        );
        assert_eq!(content_id(b"a").len(), 64);
    }
}
