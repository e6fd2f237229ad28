use std::io::Write;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use common::secret::{FsSecretStoreError, SecretStore, SecretStoreError};
use secm_cli::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Delete {
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Secret store error: {0}")]
    Store(#[from] SecretStoreError<FsSecretStoreError>),
    #[error("Failed to read confirmation: {0}")]
    Prompt(#[from] std::io::Error),
}

async fn confirm(question: &str) -> Result<bool, std::io::Error> {
    print!("{} Type 'yes' to confirm: ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(answer.trim() == "yes")
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Delete {
    type Error = DeleteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let store = ctx.state()?.secret_store().await?;
        // fail on a missing id before asking anything
        let secret = store.load(&self.id).await?;

        if !self.yes
            && !confirm(&format!("Delete secret {} ({})?", self.id, secret.name)).await?
        {
            return Ok("Aborted".to_string());
        }

        store.delete(&self.id).await?;
        tracing::info!(id = %self.id, "secret deleted");
        Ok(format!("Deleted secret {}", self.id))
    }
}
