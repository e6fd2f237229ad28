use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::crypto::{Identity, PublicKey};
use crate::protocol::{
    read_frame, write_frame, FrameError, Handshake, PayloadError, TransferPayload,
    MAX_HANDSHAKE_FRAME, MAX_PAYLOAD_FRAME,
};
use crate::secret::{grant, validate_id, SecretStore};

use super::error::{Phase, TransferError};
use super::state::{Role, SessionState};

/// Outcome of a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub role: Role,
    pub secret_id: String,
    pub secret_name: String,
    /// Fingerprint of the other side's identity key, known to the initiator only
    pub peer_fingerprint: Option<String>,
}

/// One transfer of one secret, in either role
///
/// A session runs once. The whole run is bounded by `timeout`; when it
/// expires, or when the token from [`TransferSession::cancel_token`] is
/// cancelled, any pending read or write is abandoned and the session ends
/// in [`SessionState::Cancelled`].
#[derive(Debug)]
pub struct TransferSession {
    identity: Arc<Identity>,
    timeout: Duration,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl TransferSession {
    pub fn new(identity: Arc<Identity>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            identity,
            timeout,
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state changes as they happen
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Token that interrupts the session when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve `secret_id` to the first peer that opens a stream
    ///
    /// The handshake must be addressed to `local_transport_key`; the secret
    /// is granted to the identity key it carries and written back as a
    /// single payload frame, after which the stream is shut down.
    pub async fn run_initiator<S, R, W>(
        &self,
        store: &S,
        secret_id: &str,
        local_transport_key: &[u8],
        mut incoming: mpsc::Receiver<(R, W)>,
    ) -> Result<TransferReport, TransferError>
    where
        S: SecretStore,
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let steps = async {
            let secret = store
                .load(secret_id)
                .await
                .map_err(|e| TransferError::Store(e.to_string()))?;

            self.advance(SessionState::AwaitingPeer)?;
            tracing::info!(id = secret_id, "waiting for peer");

            let (mut reader, mut writer) = self
                .guarded(incoming.recv())
                .await?
                .ok_or_else(|| TransferError::Transport("listener closed".to_string()))?;

            let frame = self
                .guarded(read_frame(&mut reader, MAX_HANDSHAKE_FRAME))
                .await?
                .map_err(TransferError::frame(Phase::Handshake))?;
            let handshake = Handshake::decode(&frame)?;
            self.advance(SessionState::HandshakeReceived)?;

            if handshake.peer_public_key != local_transport_key {
                tracing::warn!("handshake addressed to another node");
                return Err(TransferError::Rejected(
                    "handshake is addressed to a different node".to_string(),
                ));
            }
            let peer_key = PublicKey::parse(&handshake.identity_public_key)?;
            let fingerprint = peer_key.fingerprint()?;
            tracing::debug!(peer = %fingerprint, key_type = %peer_key.key_type(), "peer identified");

            let granted = grant(&self.identity, &peer_key, &secret)?;
            let payload = TransferPayload::new(secret_id, granted).to_bytes()?;

            self.guarded(write_frame(&mut writer, &payload))
                .await?
                .map_err(TransferError::frame(Phase::Payload))?;
            self.guarded(writer.shutdown())
                .await?
                .map_err(|e| TransferError::frame(Phase::Payload)(FrameError::Io(e)))?;
            self.advance(SessionState::PayloadExchanged)?;

            Ok::<_, TransferError>(TransferReport {
                role: Role::Initiator,
                secret_id: secret_id.to_string(),
                secret_name: secret.name.clone(),
                peer_fingerprint: Some(fingerprint),
            })
        };

        self.drive(steps).await
    }

    /// Fetch a secret from an initiator and persist it in `store`
    ///
    /// `connect` yields the stream halves plus the initiator's transport
    /// key. Nothing is written to `store` unless the payload decodes, names
    /// a valid id and opens under this session's identity. An existing
    /// secret with the same id is only replaced when `overwrite` is set.
    pub async fn run_receiver<S, F, R, W>(
        &self,
        store: &S,
        connect: F,
        overwrite: bool,
    ) -> Result<TransferReport, TransferError>
    where
        S: SecretStore,
        F: Future<Output = Result<(R, W, Vec<u8>), TransferError>> + Send,
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let steps = async {
            let (mut reader, mut writer, remote_transport_key) = self.guarded(connect).await??;

            let identity_key = self.identity.public_key().to_bytes()?;
            let handshake = Handshake::new(identity_key, remote_transport_key).encode()?;
            self.guarded(write_frame(&mut writer, &handshake))
                .await?
                .map_err(TransferError::frame(Phase::Handshake))?;
            self.advance(SessionState::HandshakeSent)?;
            tracing::debug!("handshake sent");

            let bytes = match self.guarded(read_frame(&mut reader, MAX_PAYLOAD_FRAME)).await? {
                Ok(bytes) => bytes,
                Err(FrameError::Closed) => return Err(TransferError::from(PayloadError::Empty)),
                Err(e) => return Err(TransferError::frame(Phase::Payload)(e)),
            };
            let payload = TransferPayload::from_bytes(&bytes)?;

            validate_id::<S::Error>(&payload.id)
                .map_err(|e| TransferError::Rejected(e.to_string()))?;
            payload
                .secret
                .open(&self.identity)
                .map_err(TransferError::Open)?;

            let exists = store
                .exists(&payload.id)
                .await
                .map_err(|e| TransferError::Store(e.to_string()))?;
            if exists && !overwrite {
                return Err(TransferError::Rejected(format!(
                    "secret {} already exists",
                    payload.id
                )));
            }
            self.advance(SessionState::PayloadExchanged)?;

            store
                .save(&payload.id, &payload.secret)
                .await
                .map_err(|e| TransferError::Store(e.to_string()))?;

            Ok::<_, TransferError>(TransferReport {
                role: Role::Receiver,
                secret_id: payload.id,
                secret_name: payload.secret.name,
                peer_fingerprint: None,
            })
        };

        self.drive(steps).await
    }

    /// Run `steps` under the session deadline and record how they ended
    async fn drive<F>(&self, steps: F) -> Result<TransferReport, TransferError>
    where
        F: Future<Output = Result<TransferReport, TransferError>>,
    {
        let result = tokio::select! {
            result = steps => result,
            _ = tokio::time::sleep(self.timeout) => {
                tracing::debug!(timeout = ?self.timeout, "session deadline reached");
                self.cancel.cancel();
                Err(TransferError::Cancelled)
            }
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
        };

        match &result {
            Ok(report) => {
                self.advance(SessionState::Completed)?;
                tracing::info!(
                    role = %report.role,
                    id = %report.secret_id,
                    "transfer completed"
                );
            }
            Err(TransferError::Cancelled) => {
                self.stop(SessionState::Cancelled);
                tracing::info!("transfer cancelled");
            }
            Err(e) => {
                self.stop(SessionState::Failed(e.to_string()));
                tracing::warn!(error = %e, "transfer failed");
            }
        }
        result
    }

    /// Await `fut` unless the session is cancelled first
    async fn guarded<F: Future>(&self, fut: F) -> Result<F::Output, TransferError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            output = fut => Ok(output),
        }
    }

    fn advance(&self, next: SessionState) -> Result<(), TransferError> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            if state.can_advance_to(&next) {
                tracing::debug!(from = %state, to = %next, "session state changed");
                *state = next;
                true
            } else {
                result = Err(TransferError::InvalidTransition {
                    from: state.to_string(),
                    to: next.to_string(),
                });
                false
            }
        });
        result
    }

    /// Move to a terminal state unless one was already reached
    fn stop(&self, terminal: SessionState) {
        if self.advance(terminal).is_err() {
            tracing::debug!(state = %self.state(), "session already finished");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{Curve, KeyType};

    fn session(timeout: Duration) -> TransferSession {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        TransferSession::new(Arc::new(identity), timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel() {
        let session = session(Duration::from_secs(60));
        let store = crate::secret::MemorySecretStore::new();
        let token = session.cancel_token();
        let mut states = session.subscribe();

        type Connected = (tokio::io::DuplexStream, tokio::io::DuplexStream, Vec<u8>);
        let connect = std::future::pending::<Result<Connected, TransferError>>();
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        };
        let (result, _) = tokio::join!(session.run_receiver(&store, connect, false), canceller);

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_session_runs_once() {
        let session = session(Duration::from_secs(5));
        session.advance(SessionState::HandshakeSent).unwrap();
        assert!(matches!(
            session.advance(SessionState::AwaitingPeer),
            Err(TransferError::InvalidTransition { .. })
        ));
    }
}
