//! Shared types for the hub TCP server.
//!
//! This module defines:
//! - channel aliases between connection tasks and the hub task
//! - `HubRequest`: events flowing from the listener and connections
//!   into the hub task

use std::net::Ipv4Addr;

use adhoc_core::{Refusal, SessionId};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Frames queued per connection before further sends to it are dropped.
pub const OUTBOUND_QUEUE: usize = 256;

/// Encoded frames from the hub task to one connection.
pub type OutboundTx = mpsc::Sender<Bytes>;
pub type OutboundRx = mpsc::Receiver<Bytes>;

/// Event for the hub task.
#[derive(Debug)]
pub enum HubRequest {
    /// New TCP connection waiting to be admitted.
    Accept {
        session: SessionId,
        ip: Ipv4Addr,
        outbound: OutboundTx,
        reply: oneshot::Sender<Result<(), Refusal>>,
    },

    /// Bytes read from a connection (one read, up to 1024 bytes).
    Received { session: SessionId, bytes: Bytes },

    /// EOF or socket error on a connection.
    Lost { session: SessionId },
}

/// Channel from listener/connections → hub task.
pub type HubTx = mpsc::UnboundedSender<HubRequest>;
pub type HubRx = mpsc::UnboundedReceiver<HubRequest>;
