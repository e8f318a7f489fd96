//! Per-connection I/O task.
//!
//! One task per admitted connection. It forwards every read to the hub
//! task and writes whatever frames the hub queues for it. The hub ends a
//! session by dropping its outbound sender; the task then writes out the
//! frames still queued, shuts the socket down and returns.
//!
//! Every write is bounded by `WRITE_TIMEOUT`. A peer that stops reading
//! is treated as lost, so a closed session never keeps its socket.

use std::time::Duration;

use adhoc_core::SessionId;
use adhoc_protocol::wire_types::RX_BUFFER_CAPACITY;
use anyhow::anyhow;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::types::{HubRequest, HubTx, OutboundRx};

/// How long one frame (or the final shutdown) may take to reach the peer.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the I/O loop for a single connection.
pub async fn run_connection(
    session: SessionId,
    stream: TcpStream,
    hub_tx: HubTx,
    out_rx: OutboundRx,
) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;
    serve(session, stream, hub_tx, out_rx, WRITE_TIMEOUT).await
}

async fn serve<S>(
    session: SessionId,
    stream: S,
    hub_tx: HubTx,
    mut out_rx: OutboundRx,
    write_timeout: Duration,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut chunk = [0u8; RX_BUFFER_CAPACITY];

    loop {
        tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!("session {} closed by peer", session);
                    let _ = hub_tx.send(HubRequest::Lost { session });
                    return Ok(());
                }
                Ok(n) => {
                    let bytes = Bytes::copy_from_slice(&chunk[..n]);
                    if hub_tx.send(HubRequest::Received { session, bytes }).is_err() {
                        // Hub task is gone.
                        return Ok(());
                    }
                }
                Err(e) => {
                    let _ = hub_tx.send(HubRequest::Lost { session });
                    return Err(e.into());
                }
            },

            frame = out_rx.recv() => match frame {
                Some(frame) => {
                    let written = match timeout(write_timeout, writer.write_all(&frame)).await {
                        Ok(result) => result.map_err(anyhow::Error::from),
                        Err(_) => Err(anyhow!("peer stopped reading")),
                    };
                    if let Err(e) = written {
                        let _ = hub_tx.send(HubRequest::Lost { session });
                        return Err(e);
                    }
                }
                None => {
                    // Session closed by the hub.
                    let _ = timeout(write_timeout, writer.shutdown()).await;
                    return Ok(());
                }
            },
        }
    }
}
