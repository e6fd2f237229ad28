use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use common::secret::{FsSecretStoreError, Secret, SecretError, SecretStore, SecretStoreError};
use secm_cli::state::{write_private, StateError};

/// Decrypt a stored secret
#[derive(Args, Debug, Clone)]
pub struct Get {
    pub id: String,

    /// Write the value to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Show metadata before the value
    #[arg(long, short)]
    pub meta: bool,

    /// Print only the value, byte for byte
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GetError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Secret store error: {0}")]
    Store(#[from] SecretStoreError<FsSecretStoreError>),
    #[error("Failed to decrypt secret: {0}")]
    Open(#[from] SecretError),
    #[error("Failed to write secret: {0}")]
    Write(#[from] std::io::Error),
}

pub fn describe(id: &str, secret: &Secret) -> String {
    let mut lines = vec![
        format!("id:          {}", id),
        format!("name:        {}", secret.name),
    ];
    if !secret.description.is_empty() {
        lines.push(format!("description: {}", secret.description));
    }
    if !secret.kind.is_empty() {
        lines.push(format!("type:        {}", secret.kind));
    }
    if !secret.format.is_empty() {
        lines.push(format!("format:      {}", secret.format));
    }
    if !secret.tags.is_empty() {
        lines.push(format!("tags:        {}", secret.tags.join(", ")));
    }
    lines.push(format!("created:     {}", secret.created_at.to_rfc3339()));
    lines.join("\n")
}

impl Get {
    /// Write the value to `out`
    ///
    /// The plaintext goes out unchanged. A newline is only appended to text
    /// values outside quiet mode, so binary secrets survive redirection.
    fn print_value(
        &self,
        secret: &Secret,
        plaintext: &[u8],
        out: &mut impl Write,
    ) -> Result<(), std::io::Error> {
        if self.meta {
            writeln!(out, "{}\n\nSecret value:", describe(&self.id, secret))?;
        }
        out.write_all(plaintext)?;
        if !self.quiet && std::str::from_utf8(plaintext).is_ok() && !plaintext.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Get {
    type Error = GetError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let store = state.secret_store().await?;
        let secret = store.load(&self.id).await?;

        let identity = state.load_identity()?;
        let plaintext = secret.open(&identity)?;

        match &self.output {
            Some(path) => {
                write_private(path, &plaintext)?;
                tracing::debug!(id = %self.id, path = ?path, "secret written to file");
                let mut lines = Vec::new();
                if self.meta {
                    lines.push(describe(&self.id, &secret));
                }
                if !self.quiet {
                    lines.push(format!("Secret {} written to {}", self.id, path.display()));
                }
                Ok(lines.join("\n\n"))
            }
            None => {
                // raw bytes, not a String: the value need not be UTF-8
                self.print_value(&secret, &plaintext, &mut std::io::stdout())?;
                Ok(String::new())
            }
        }
    }
}
