use clap::Args;

use common::crypto::KeyError;
use secm_cli::state::StateError;

/// Print this profile's public key, for peers to grant secrets to
#[derive(Args, Debug, Clone)]
pub struct Id {
    /// Print only the key fingerprint
    #[arg(long)]
    pub fingerprint: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Failed to encode public key: {0}")]
    Key(#[from] KeyError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Id {
    type Error = IdError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let public_key = ctx.state()?.load_identity()?.public_key();
        if self.fingerprint {
            return Ok(public_key.fingerprint()?);
        }
        Ok(public_key.to_pem()?.trim_end().to_string())
    }
}
