//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections and assigns each a `SessionId`.
//! - Asks the hub task to admit it; refused connections are dropped
//!   without a single byte written.
//! - Spawns:
//!   - a per-connection task to handle I/O,
//!   - a single central hub task that owns the `Hub`.
//!
//! The per-connection logic and the hub loop live in `client` and
//! `hub_task` respectively.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use adhoc_core::{Hub, MemoryDirectory, ProductDirectory, SessionId};
use adhoc_protocol::ChatMessage;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::client;
use crate::config::Config;
use crate::directory::TomlProductDirectory;
use crate::hub_task::{self, HubLoopSettings};
use crate::status::XmlStatusWriter;
use crate::types::{HubRequest, HubRx, HubTx, OutboundRx, OutboundTx, OUTBOUND_QUEUE};

/// How long connection tasks get to flush after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Process-wide counter for assigning unique `SessionId`s.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
}

/// A bound, not yet running server.
pub struct Server {
    listener: TcpListener,
    config: Config,
    hub: Hub,
}

impl Server {
    /// Bind the listener and load the product directory.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        let directory = open_directory(&config);
        let hub = Hub::new(config.hub_config(), directory);
        Self::with_hub(config, hub).await
    }

    /// Bind the listener around a prepared `Hub`.
    pub async fn with_hub(config: Config, hub: Hub) -> anyhow::Result<Self> {
        let addr = config.socket_addr_string();
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Server {
            listener,
            config,
            hub,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` becomes `true` (or its sender is dropped),
    /// then log every session out and wait briefly for connections to
    /// drain.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let Server {
            listener,
            config,
            hub,
        } = self;

        // Channel from listener/connections → hub task.
        let (hub_tx, hub_rx): (HubTx, HubRx) = mpsc::unbounded_channel();

        let settings = HubLoopSettings {
            sweep_interval: config.sweep_interval,
            shutdown_notice: ChatMessage::new(&config.shutdown_message),
            status: config.status_path.clone().map(XmlStatusWriter::new),
        };
        let hub_handle = tokio::spawn(hub_task::run_hub_loop(
            hub,
            hub_rx,
            shutdown.clone(),
            settings,
        ));

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            continue;
                        }
                    };
                    if !admit(stream, peer, &hub_tx, &mut connections).await {
                        break;
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    match finished {
                        Ok(Err(e)) => debug!("connection ended with error: {:#}", e),
                        Err(e) => warn!("connection task failed: {}", e),
                        Ok(Ok(())) => {}
                    }
                }
            }
        }

        drop(listener);
        drop(hub_tx);
        if let Err(e) = hub_handle.await {
            warn!("hub task failed: {}", e);
        }

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("{} connections did not close in time", connections.len());
            connections.abort_all();
        }

        info!("server stopped");
        Ok(())
    }
}

/// Run the server with the given configuration.
pub async fn run(config: Config, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    Server::bind(config).await?.run(shutdown).await
}

/// Product directory from the configured file, or an in-memory one.
fn open_directory(config: &Config) -> Box<dyn ProductDirectory + Send> {
    let Some(path) = &config.product_db else {
        return Box::new(MemoryDirectory::new());
    };
    match TomlProductDirectory::open(path) {
        Ok(dir) => Box::new(dir),
        Err(e) => {
            warn!("product directory unavailable, using memory only: {:#}", e);
            Box::new(MemoryDirectory::new())
        }
    }
}

/// Offer a fresh connection to the hub and spawn its task if admitted.
///
/// Returns `false` once the hub task is gone.
async fn admit(
    stream: TcpStream,
    peer: SocketAddr,
    hub_tx: &HubTx,
    connections: &mut JoinSet<anyhow::Result<()>>,
) -> bool {
    let Some(ip) = peer_ipv4(peer.ip()) else {
        warn!("rejecting non-IPv4 connection from {}", peer);
        return true;
    };

    let session = next_session_id();
    let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::channel(OUTBOUND_QUEUE);
    let (reply_tx, reply_rx) = oneshot::channel();

    let request = HubRequest::Accept {
        session,
        ip,
        outbound: out_tx,
        reply: reply_tx,
    };
    if hub_tx.send(request).is_err() {
        return false;
    }

    match reply_rx.await {
        Ok(Ok(())) => {
            let hub_tx = hub_tx.clone();
            connections.spawn(client::run_connection(session, stream, hub_tx, out_rx));
            true
        }
        // Refused: dropping `stream` closes it untouched.
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}

fn peer_ipv4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}
