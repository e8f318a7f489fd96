//! Central hub loop.
//!
//! This task owns the `Hub` (and with it the whole topology) and is the
//! only place it is touched, so no locks are needed. It processes:
//! - `HubRequest`s from the listener and connection tasks,
//! - a periodic sweep tick for idle sessions,
//! - the shutdown signal.
//!
//! Outputs are applied strictly in order: `Send` queues an encoded frame
//! on the session's channel, `Close` drops the channel, which tells the
//! connection task to flush and hang up.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use adhoc_core::{Hub, Output, SessionId, TopologySnapshot};
use adhoc_protocol::{encode_server, ChatMessage};
use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::status::XmlStatusWriter;
use crate::types::{HubRequest, HubRx, OutboundTx};

/// Loop parameters taken from the server configuration.
#[derive(Debug)]
pub struct HubLoopSettings {
    pub sweep_interval: Duration,
    pub shutdown_notice: ChatMessage,
    pub status: Option<XmlStatusWriter>,
}

/// Run the central hub loop until shutdown is signalled (or every
/// request sender is gone), then log everybody out.
pub async fn run_hub_loop(
    mut hub: Hub,
    mut hub_rx: HubRx,
    mut shutdown: watch::Receiver<bool>,
    settings: HubLoopSettings,
) {
    let mut connections: HashMap<SessionId, OutboundTx> = HashMap::new();
    let mut sweep = tokio::time::interval(settings.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let (status, status_task) = match settings.status {
        Some(writer) => {
            let (tx, task) = writer.spawn();
            (Some(tx), Some(task))
        }
        None => (None, None),
    };
    let mut published = None;
    publish_status(&hub, status.as_ref(), &mut published);

    loop {
        tokio::select! {
            req = hub_rx.recv() => {
                let Some(req) = req else { break };
                let outputs = handle_request(&mut hub, &mut connections, req);
                route_outputs(outputs, &mut connections);
            }

            _ = sweep.tick() => {
                let outputs = hub.sweep_timeouts(Instant::now());
                route_outputs(outputs, &mut connections);
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }

        publish_status(&hub, status.as_ref(), &mut published);
    }

    info!(
        "hub shutting down, logging out {} sessions",
        hub.topology().session_count()
    );
    let outputs = hub.shutdown(settings.shutdown_notice);
    route_outputs(outputs, &mut connections);
    publish_status(&hub, status.as_ref(), &mut published);

    // Every session got a Close above; this only drops stragglers.
    connections.clear();

    drop(status);
    if let Some(task) = status_task {
        if let Err(e) = task.await {
            warn!("status task failed: {}", e);
        }
    }
}

fn handle_request(
    hub: &mut Hub,
    connections: &mut HashMap<SessionId, OutboundTx>,
    req: HubRequest,
) -> Vec<Output> {
    match req {
        HubRequest::Accept {
            session,
            ip,
            outbound,
            reply,
        } => {
            let result = hub.accept(session, ip, Instant::now());
            if result.is_ok() {
                connections.insert(session, outbound);
            }
            if reply.send(result).is_err() {
                // Listener gave up on this connection; undo the admission.
                connections.remove(&session);
                return hub.connection_lost(session);
            }
            Vec::new()
        }
        HubRequest::Received { session, bytes } => hub.receive(session, &bytes, Instant::now()),
        HubRequest::Lost { session } => hub.connection_lost(session),
    }
}

/// Apply hub outputs in order.
///
/// Sends are best-effort: a frame for a session whose connection already
/// went away, or whose outbound queue is full, is dropped.
fn route_outputs(outputs: Vec<Output>, connections: &mut HashMap<SessionId, OutboundTx>) {
    for output in outputs {
        match output {
            Output::Send { to, packet } => {
                let Some(tx) = connections.get(&to) else {
                    continue;
                };
                let mut frame = Vec::with_capacity(256);
                encode_server(&packet, &mut frame);
                debug!("session {} -> {:?} ({} bytes)", to, packet.opcode(), frame.len());
                if let Err(TrySendError::Full(_)) = tx.try_send(Bytes::from(frame)) {
                    debug!("session {} is not reading, frame dropped", to);
                }
            }
            Output::Close { session, reason } => {
                debug!("closing session {}: {}", session, reason);
                connections.remove(&session);
            }
        }
    }
}

/// Hand the status writer a fresh snapshot if the topology changed since
/// the last one.
fn publish_status(
    hub: &Hub,
    status: Option<&watch::Sender<TopologySnapshot>>,
    published: &mut Option<u64>,
) {
    let Some(status) = status else {
        return;
    };
    let revision = hub.revision();
    if *published == Some(revision) {
        return;
    }
    // The writer task only goes away at shutdown.
    let _ = status.send(hub.snapshot());
    *published = Some(revision);
}

#[cfg(test)]
mod tests {
    use super::*;
    use adhoc_core::{HubConfig, LogoutReason};
    use adhoc_protocol::{Nickname, ServerPacket};
    use std::net::Ipv4Addr;
    use tokio::sync::mpsc;

    #[test]
    fn full_outbound_queue_drops_frames() {
        let mut hub = Hub::in_memory(HubConfig::default());
        let session = SessionId(1);
        hub.accept(session, Ipv4Addr::new(10, 0, 0, 1), Instant::now())
            .unwrap();

        let (tx, mut rx) = mpsc::channel(2);
        let mut connections = HashMap::new();
        connections.insert(session, tx);

        let notice = ChatMessage::new("hello");
        let outputs: Vec<Output> = (0..5)
            .map(|_| {
                Output::send(
                    session,
                    ServerPacket::Chat {
                        sender: Nickname::EMPTY,
                        message: notice,
                    },
                )
            })
            .collect();
        route_outputs(outputs, &mut connections);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert!(connections.contains_key(&session));

        route_outputs(
            vec![Output::close(session, LogoutReason::Shutdown)],
            &mut connections,
        );
        assert!(connections.is_empty());
    }
}
