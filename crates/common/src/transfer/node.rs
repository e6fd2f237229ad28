use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use iroh::discovery::pkarr::dht::DhtDiscovery;
use iroh::endpoint::{Connection, RecvStream, SendStream};
use iroh::protocol::{AcceptError, ProtocolHandler, Router};
use iroh::{Endpoint, NodeAddr, NodeId, SecretKey};
use tokio::sync::{mpsc, Notify};

/// ALPN identifier for the transfer protocol
pub const ALPN: &[u8] = b"/secm/transfer/1";

/// A stream accepted by a listening node, as (reader, writer)
pub type IncomingStream = (RecvStream, SendStream);

/// An iroh endpoint speaking the transfer protocol
///
/// Each node gets a fresh transport key; it is only needed for as long as
/// one transfer takes.
#[derive(Debug, Clone)]
pub struct TransferNode {
    endpoint: Endpoint,
}

/// Accepting side of a node, returned by [`TransferNode::listen`]
#[derive(Debug)]
pub struct Listener {
    router: Router,
    closed: Arc<Notify>,
}

impl Listener {
    /// Wait until the peer of an accepted connection has hung up
    pub async fn peer_closed(&self) {
        self.closed.notified().await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.router.shutdown().await?;
        Ok(())
    }
}

impl TransferNode {
    /// Bind a node on `port`, or an ephemeral port when `port` is 0
    pub async fn bind(port: u16) -> Result<Self> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| anyhow!("failed to generate node key: {}", e))?;
        let secret_key = SecretKey::from_bytes(&bytes);

        let discovery = DhtDiscovery::builder()
            .secret_key(secret_key.clone())
            .build()
            .map_err(|e| anyhow!("failed to build mainline discovery: {}", e))?;

        let endpoint = Endpoint::builder()
            .secret_key(secret_key)
            .discovery(discovery)
            .bind_addr_v4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
            .bind()
            .await
            .map_err(|e| anyhow!("failed to bind endpoint: {}", e))?;

        tracing::debug!(node_id = %endpoint.node_id(), sockets = ?endpoint.bound_sockets(), "transfer node bound");
        Ok(Self { endpoint })
    }

    pub fn node_id(&self) -> NodeId {
        self.endpoint.node_id()
    }

    /// Public key peers put in the handshake to address this node
    pub fn transport_key(&self) -> Vec<u8> {
        self.endpoint.node_id().as_bytes().to_vec()
    }

    /// Address a receiver passes to `--peer`, `node_id@ip:port,...`
    pub fn address(&self) -> String {
        let sockets = self
            .endpoint
            .bound_sockets()
            .into_iter()
            .map(|addr| addr.to_string())
            .collect::<Vec<_>>();
        if sockets.is_empty() {
            self.node_id().to_string()
        } else {
            format!("{}@{}", self.node_id(), sockets.join(","))
        }
    }

    /// Accept transfer streams until the listener is shut down
    ///
    /// Accepted streams arrive on the returned channel.
    pub fn listen(&self) -> (Listener, mpsc::Receiver<IncomingStream>) {
        let (tx, streams) = mpsc::channel(1);
        let closed = Arc::new(Notify::new());
        let protocol = TransferProtocol {
            streams: tx,
            closed: closed.clone(),
            admission: Admission::default(),
        };
        let router = Router::builder(self.endpoint.clone())
            .accept(ALPN, protocol)
            .spawn();
        (Listener { router, closed }, streams)
    }

    /// Open a transfer stream to `addr`
    ///
    /// Returns the stream halves and the remote transport key.
    pub async fn connect(&self, addr: NodeAddr) -> Result<(RecvStream, SendStream, Vec<u8>)> {
        let remote = addr.node_id;
        let conn = self.endpoint.connect(addr, ALPN).await.map_err(|e| {
            tracing::error!("failed to connect to peer {}: {}", remote, e);
            anyhow!("failed to connect to peer: {}", e)
        })?;
        let (send, recv) = conn.open_bi().await.map_err(|e| {
            tracing::error!("failed to open bidirectional stream: {}", e);
            anyhow!("failed to open bidirectional stream: {}", e)
        })?;
        tracing::debug!(peer = %remote, "transfer stream opened");
        Ok((recv, send, remote.as_bytes().to_vec()))
    }

    pub async fn close(self) {
        self.endpoint.close().await
    }
}

/// Parse `node_id[@ip:port,...]`
pub fn parse_node_addr(s: &str) -> Result<NodeAddr> {
    let (id, addrs) = match s.split_once('@') {
        Some((id, addrs)) => (id, Some(addrs)),
        None => (s, None),
    };
    let node_id = NodeId::from_str(id.trim()).map_err(|e| anyhow!("invalid node id {}: {}", id, e))?;
    let mut sockets = Vec::new();
    for addr in addrs.into_iter().flat_map(|a| a.split(',')) {
        let addr = addr.trim();
        if addr.is_empty() {
            continue;
        }
        let socket = SocketAddr::from_str(addr)
            .map_err(|e| anyhow!("invalid socket address {}: {}", addr, e))?;
        sockets.push(socket);
    }
    Ok(NodeAddr::from_parts(node_id, None, sockets))
}

/// Lets exactly one connection through to the session
#[derive(Debug, Clone, Default)]
struct Admission(Arc<AtomicBool>);

impl Admission {
    /// True for the first caller across all clones, false afterwards
    fn admit(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Forwards the first stream of the first transfer connection to the session
///
/// Later connections are refused, so only the peer being served can signal
/// [`Listener::peer_closed`].
#[derive(Debug, Clone)]
struct TransferProtocol {
    streams: mpsc::Sender<IncomingStream>,
    closed: Arc<Notify>,
    admission: Admission,
}

impl TransferProtocol {
    fn handle_connection(self, conn: Connection) -> BoxFuture<'static, Result<(), AcceptError>> {
        Box::pin(async move {
            tracing::debug!("new transfer connection from {:?}", conn.remote_node_id());
            let (send, recv) = conn.accept_bi().await.map_err(|e| {
                tracing::error!("failed to accept bidirectional stream: {}", e);
                AcceptError::from(e)
            })?;

            if !self.admission.admit() {
                tracing::warn!("already serving a peer, refusing transfer connection");
                conn.close(1u32.into(), b"busy");
                return Ok(());
            }

            if self.streams.send((recv, send)).await.is_err() {
                tracing::warn!("no session waiting, dropping transfer connection");
                conn.close(0u32.into(), b"busy");
                return Ok(());
            }

            // keep the connection up until the receiver has read everything
            conn.closed().await;
            self.closed.notify_one();
            Ok(())
        })
    }
}

impl ProtocolHandler for TransferProtocol {
    #[allow(refining_impl_trait)]
    fn accept(&self, conn: Connection) -> BoxFuture<'static, Result<(), AcceptError>> {
        self.clone().handle_connection(conn)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn node_id() -> NodeId {
        SecretKey::from_bytes(&[7u8; 32]).public()
    }

    #[test]
    fn test_parse_bare_node_id() {
        let id = node_id();
        let addr = parse_node_addr(&id.to_string()).unwrap();
        assert_eq!(addr.node_id, id);
        assert!(addr.direct_addresses.is_empty());
    }

    #[test]
    fn test_parse_with_sockets() {
        let addr = parse_node_addr(&format!("{}@127.0.0.1:4433,[::1]:4433", node_id())).unwrap();
        assert_eq!(addr.node_id, node_id());
        assert_eq!(addr.direct_addresses.len(), 2);
    }

    #[test]
    fn test_only_first_connection_is_admitted() {
        let admission = Admission::default();
        let other_handler = admission.clone();
        assert!(admission.admit());
        assert!(!other_handler.admit());
        assert!(!admission.admit());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_node_addr("not-a-node").is_err());
        assert!(parse_node_addr(&format!("{}@nowhere", node_id())).is_err());
    }
}
