use std::path::PathBuf;

use clap::Args;

use common::crypto::{KeyError, PublicKey};
use common::protocol::{PayloadError, TransferPayload};
use common::secret::{grant, FsSecretStoreError, GrantError, SecretStore, SecretStoreError};
use secm_cli::state::StateError;

/// Re-encrypt a stored secret for someone else, offline
///
/// Emits the same payload a transfer would send, for `secm import` on the
/// other side.
#[derive(Args, Debug, Clone)]
pub struct Grant {
    pub id: String,

    /// Recipient public key file, PEM or DER
    #[arg(long)]
    pub to: PathBuf,

    /// Write the payload to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantOpError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Failed to write {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("Invalid recipient key: {0}")]
    Key(#[from] KeyError),
    #[error("Secret store error: {0}")]
    Store(#[from] SecretStoreError<FsSecretStoreError>),
    #[error(transparent)]
    Grant(#[from] GrantError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Grant {
    type Error = GrantOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identity = state.load_identity()?;
        let store = state.secret_store().await?;

        let key_bytes = tokio::fs::read(&self.to)
            .await
            .map_err(|e| GrantOpError::Read(self.to.clone(), e))?;
        let recipient = PublicKey::parse(&key_bytes)?;
        let fingerprint = recipient.fingerprint()?;

        let secret = store.load(&self.id).await?;
        let granted = grant(&identity, &recipient, &secret)?;
        let payload = TransferPayload::new(self.id.clone(), granted).to_bytes()?;
        tracing::info!(id = %self.id, recipient = %fingerprint, "secret granted");

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &payload)
                    .await
                    .map_err(|e| GrantOpError::Write(path.clone(), e))?;
                Ok(format!(
                    "Granted secret {} to {}\nPayload written to {}",
                    self.id,
                    fingerprint,
                    path.display()
                ))
            }
            None => Ok(String::from_utf8_lossy(&payload).into_owned()),
        }
    }
}
