use crate::crypto::{envelope, EnvelopeError, Identity, PublicKey};

use super::{Secret, SecretError};

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    /// The holder could not open the stored envelope
    #[error("holder cannot open secret: {0}")]
    Open(SecretError),
    /// Re-sealing for the new recipient failed
    #[error("failed to seal secret for recipient: {0}")]
    Seal(EnvelopeError),
}

/// Re-encrypt `secret` for `new_recipient`
///
/// Opens the stored envelope with `holder`, seals the plaintext under a
/// fresh key for `new_recipient`, and returns a new [`Secret`] with the same
/// metadata. The input is not modified, so the holder's own copy stays
/// readable by the holder. The plaintext only exists inside this call and
/// is wiped when it returns.
pub fn grant(
    holder: &Identity,
    new_recipient: &PublicKey,
    secret: &Secret,
) -> Result<Secret, GrantError> {
    let plaintext = secret.open(holder).map_err(GrantError::Open)?;
    let envelope = envelope::encrypt(new_recipient, &plaintext).map_err(GrantError::Seal)?;
    tracing::debug!(
        name = %secret.name,
        recipient = %new_recipient.key_type(),
        "granted secret to new recipient"
    );
    Ok(secret.with_envelope(&envelope))
}
