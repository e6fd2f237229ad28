use clap::Args;

use common::crypto::{Identity, KeyError, KeyType};

/// Print a fresh private key without touching any profile
#[derive(Args, Debug, Clone)]
pub struct Generate {
    /// Key type: rsa, rsa:<bits>, x25519, p256, p384 or p521
    #[arg(long, short = 't', default_value = "rsa")]
    pub key_type: KeyType,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Failed to generate key: {0}")]
    Key(#[from] KeyError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Generate {
    type Error = GenerateError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let identity = Identity::generate(self.key_type)?;
        let pem = identity.to_pem()?;
        Ok(pem.trim_end().to_string())
    }
}
