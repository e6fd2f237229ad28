use clap::Args;

use common::crypto::{KeyError, KeyType};
use secm_cli::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Identity key type: rsa, rsa:<bits>, x25519, p256, p384 or p521
    #[arg(long, short = 't', default_value = "rsa")]
    pub key_type: KeyType,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Failed to initialize profile: {0}")]
    State(#[from] StateError),
    #[error("Failed to read new identity: {0}")]
    Key(#[from] KeyError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::init(ctx.config_path.clone(), &ctx.profile, self.key_type, None)?;
        let identity = state.load_identity()?;
        let fingerprint = identity.public_key().fingerprint()?;
        tracing::info!(profile = %state.profile, key_type = %self.key_type, "profile initialized");

        Ok(format!(
            "Initialized profile {:?} at {}\n  key type:    {}\n  fingerprint: {}",
            state.profile,
            state.profile_dir.display(),
            identity.key_type(),
            fingerprint
        ))
    }
}
