use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use common::secret::FsSecretStore;
use common::transfer::{
    parse_node_addr, TransferError, TransferNode, TransferReport, TransferSession,
};
use secm_cli::process::cancel_on_signal;
use secm_cli::state::StateError;

/// How long a sender waits for the receiver to hang up after the payload
const PEER_CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Send a secret to a peer, or receive one
///
/// The sending side prints an address; the receiving side passes it to
/// `--peer`.
#[derive(Args, Debug, Clone)]
pub struct Transfer {
    /// Secret to send; omit to receive
    #[arg(required_unless_present = "peer", conflicts_with = "peer")]
    pub id: Option<String>,

    /// Address printed by the sending side
    #[arg(long)]
    pub peer: Option<String>,

    /// Port to bind, instead of the configured one
    #[arg(long)]
    pub port: Option<u16>,

    /// Give up after this long, e.g. 90s, 5m or 1h
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Replace an existing secret with the same id
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferOpError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Transfer node error: {0}")]
    Node(#[source] anyhow::Error),
    #[error("Transfer failed: {0}")]
    Session(#[from] TransferError),
}

/// Parse `<n>[ms|s|m|h]`; a bare number is seconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let n: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration {:?}", s))?;
    let secs = |scale: u64| {
        n.checked_mul(scale)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration {:?} is too long", s))
    };
    let duration = match unit.trim() {
        "ms" => Duration::from_millis(n),
        "" | "s" => Duration::from_secs(n),
        "m" => secs(60)?,
        "h" => secs(60 * 60)?,
        other => return Err(format!("unknown duration unit {:?}", other)),
    };
    if duration.is_zero() {
        return Err("duration must be positive".to_string());
    }
    Ok(duration)
}

impl Transfer {
    async fn send(
        &self,
        id: &str,
        node: &TransferNode,
        session: &TransferSession,
        store: &FsSecretStore,
    ) -> Result<TransferReport, TransferOpError> {
        let (listener, incoming) = node.listen();
        println!(
            "Waiting for peer. On the receiving side run:\n\n  secm transfer --peer {}\n",
            node.address()
        );

        let result = session
            .run_initiator(store, id, &node.transport_key(), incoming)
            .await;
        if result.is_ok()
            && tokio::time::timeout(PEER_CLOSE_GRACE, listener.peer_closed())
                .await
                .is_err()
        {
            tracing::warn!("peer did not close the connection");
        }
        if let Err(e) = listener.shutdown().await {
            tracing::warn!("failed to shut down listener: {}", e);
        }
        Ok(result?)
    }

    async fn receive(
        &self,
        peer: &str,
        node: &TransferNode,
        session: &TransferSession,
        store: &FsSecretStore,
        overwrite: bool,
    ) -> Result<TransferReport, TransferOpError> {
        let addr = parse_node_addr(peer).map_err(TransferOpError::Node)?;
        let connect = async {
            node.connect(addr)
                .await
                .map_err(|e| TransferError::Transport(e.to_string()))
        };
        Ok(session.run_receiver(store, connect, overwrite).await?)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Transfer {
    type Error = TransferOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identity = Arc::new(state.load_identity()?);
        let store = state.secret_store().await?;
        let config = &state.config.transfer;

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(config.timeout_secs));
        let node = TransferNode::bind(self.port.unwrap_or(config.port))
            .await
            .map_err(TransferOpError::Node)?;
        let session = TransferSession::new(identity, timeout);
        let signals = cancel_on_signal(session.cancel_token());

        let result = match (&self.id, &self.peer) {
            (Some(id), _) => self.send(id, &node, &session, &store).await,
            (None, Some(peer)) => {
                let overwrite = self.force || config.overwrite;
                self.receive(peer, &node, &session, &store, overwrite).await
            }
            (None, None) => Err(TransferOpError::Session(TransferError::Rejected(
                "nothing to send and no peer to receive from".to_string(),
            ))),
        };

        signals.abort();
        node.close().await;

        let report = result?;
        Ok(match report.peer_fingerprint {
            Some(fingerprint) => format!(
                "Sent secret {} ({}) to {}",
                report.secret_id, report.secret_name, fingerprint
            ),
            None => format!(
                "Received secret {} ({})",
                report.secret_id, report.secret_name
            ),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_bad_duration() {
        for input in ["", "m", "5d", "-1s", "0s", "1.5m", "400000000000000000h"] {
            assert!(parse_duration(input).is_err(), "{}", input);
        }
    }
}
