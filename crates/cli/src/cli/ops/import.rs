use std::path::PathBuf;

use clap::Args;

use common::protocol::{PayloadError, TransferPayload};
use common::secret::{
    validate_id, FsSecretStoreError, SecretError, SecretStore, SecretStoreError,
};
use secm_cli::state::StateError;

/// Store a payload produced by `secm grant`
#[derive(Args, Debug, Clone)]
pub struct Import {
    /// Payload file
    pub file: PathBuf,

    /// Replace an existing secret with the same id
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("Secret was not granted to this identity: {0}")]
    Open(#[from] SecretError),
    #[error("Secret {0} already exists, use --force to replace it")]
    AlreadyExists(String),
    #[error("Secret store error: {0}")]
    Store(#[from] SecretStoreError<FsSecretStoreError>),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Import {
    type Error = ImportError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identity = state.load_identity()?;
        let store = state.secret_store().await?;

        let bytes = tokio::fs::read(&self.file)
            .await
            .map_err(|e| ImportError::Read(self.file.clone(), e))?;
        let payload = TransferPayload::from_bytes(&bytes)?;

        validate_id::<FsSecretStoreError>(&payload.id)?;
        payload.secret.open(&identity)?;
        if !self.force && store.exists(&payload.id).await? {
            return Err(ImportError::AlreadyExists(payload.id));
        }

        store.save(&payload.id, &payload.secret).await?;
        tracing::info!(id = %payload.id, "secret imported");
        Ok(format!(
            "Imported secret {} ({})",
            payload.id, payload.secret.name
        ))
    }
}
