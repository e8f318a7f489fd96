//! Session state machine.
//!
//! `Hub` is the only entry point the networking layer needs: it is fed
//! connection events (accept, bytes, loss, timer ticks, shutdown) and
//! answers each one with an ordered `Vec<Output>`.
//!
//! Frames are consumed only once complete. The opcode is checked against
//! the session state as soon as its first byte arrives, so a bad opcode
//! logs the session out without waiting for a payload that may never
//! come.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use adhoc_protocol::{ChatMessage, ClientPacket, LoginRequest, Opcode};
use tracing::{debug, info, warn};

use crate::directory::{MemoryDirectory, ProductDirectory};
use crate::error::{Refusal, Violation};
use crate::messages::{LogoutReason, Output};
use crate::session::{SessionId, SessionState};
use crate::snapshot::TopologySnapshot;
use crate::topology::Topology;

/// Limits the core needs from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    pub max_sessions: usize,
    /// A session with no received bytes for this long is logged out.
    pub idle_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            max_sessions: 1024,
            idle_timeout: Duration::from_secs(15),
        }
    }
}

pub struct Hub {
    config: HubConfig,
    topology: Topology,
    directory: Box<dyn ProductDirectory + Send>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl Hub {
    pub fn new(config: HubConfig, directory: Box<dyn ProductDirectory + Send>) -> Self {
        Hub {
            config,
            topology: Topology::new(config.max_sessions),
            directory,
        }
    }

    /// Hub backed by an empty in-memory product directory.
    pub fn in_memory(config: HubConfig) -> Self {
        Hub::new(config, Box::new(MemoryDirectory::new()))
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Changes whenever sessions, games or groups change.
    pub fn revision(&self) -> u64 {
        self.topology.revision()
    }

    pub fn session_state(&self, id: SessionId, now: Instant) -> Option<SessionState> {
        self.topology
            .session(id)
            .map(|s| s.state(now, self.config.idle_timeout))
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        self.topology.snapshot(self.directory.as_ref())
    }

    // -------------------------------------------------------------------------
    // Connection events
    // -------------------------------------------------------------------------

    /// Admit a new connection. On refusal nothing is created and the
    /// caller must drop the socket without writing to it.
    pub fn accept(&mut self, id: SessionId, ip: Ipv4Addr, now: Instant) -> Result<(), Refusal> {
        match self.topology.create_session(id, ip, now) {
            Ok(()) => {
                info!("new connection {} from {}", id, ip);
                Ok(())
            }
            Err(refusal) => {
                warn!("refused connection from {}: {}", ip, refusal);
                Err(refusal)
            }
        }
    }

    /// Bytes arrived on a session's connection.
    ///
    /// Any received data counts as activity, unless the session has
    /// already been idle past the timeout: then it is logged out and the
    /// bytes are discarded. Bytes are appended no faster than complete
    /// frames drain out, so a burst larger than the buffer is fine as long
    /// as it is made of whole frames.
    pub fn receive(&mut self, id: SessionId, bytes: &[u8], now: Instant) -> Vec<Output> {
        let mut out = Vec::new();
        let Some(session) = self.topology.session_mut(id) else {
            return out;
        };
        if session.state(now, self.config.idle_timeout) == SessionState::TimedOut {
            info!("{} timed out", session);
            return self.topology.destroy_session(id, LogoutReason::TimedOut);
        }
        if !bytes.is_empty() {
            session.touch(now);
        }

        let mut rest = bytes;
        while !rest.is_empty() {
            let Some(session) = self.topology.session_mut(id) else {
                return out;
            };
            let take = session.buffer.free_space().min(rest.len());
            if take == 0 {
                return self.logout(id, Violation::BufferOverflow, out);
            }
            if let Err(e) = session.buffer.append(&rest[..take]) {
                return self.logout(id, Violation::Malformed(e), out);
            }
            rest = &rest[take..];

            if !self.drain_frames(id, now, &mut out) {
                return out;
            }
        }
        out
    }

    /// EOF or socket error.
    pub fn connection_lost(&mut self, id: SessionId) -> Vec<Output> {
        self.topology.destroy_session(id, LogoutReason::ConnectionLost)
    }

    /// Log out every session idle for at least the timeout, whatever its
    /// state and buffer contents.
    pub fn sweep_timeouts(&mut self, now: Instant) -> Vec<Output> {
        let timeout = self.config.idle_timeout;
        let expired: Vec<SessionId> = self
            .topology
            .sessions()
            .filter(|s| s.state(now, timeout) == SessionState::TimedOut)
            .map(|s| s.id)
            .collect();

        let mut out = Vec::new();
        for id in expired {
            if let Some(s) = self.topology.session(id) {
                info!("{} timed out", s);
            }
            out.extend(self.topology.destroy_session(id, LogoutReason::TimedOut));
        }
        out
    }

    /// Send `notice` to every grouped session, then log everyone out.
    pub fn shutdown(&mut self, notice: ChatMessage) -> Vec<Output> {
        let mut out = self.topology.broadcast_notice(notice);
        for id in self.topology.session_ids() {
            out.extend(self.topology.destroy_session(id, LogoutReason::Shutdown));
        }
        out
    }

    // -------------------------------------------------------------------------
    // Frame handling
    // -------------------------------------------------------------------------

    /// Process every complete frame in the session's buffer. Returns
    /// `false` once the session has been logged out.
    fn drain_frames(&mut self, id: SessionId, now: Instant, out: &mut Vec<Output>) -> bool {
        loop {
            let Some(session) = self.topology.session_mut(id) else {
                return false;
            };
            let state = session.state(now, self.config.idle_timeout);
            let Some(raw) = session.buffer.peek_opcode() else {
                return true;
            };

            if !opcode_allowed(state, raw) {
                let v = Violation::UnexpectedOpcode { state, opcode: raw };
                let batch = self.logout(id, v, Vec::new());
                out.extend(batch);
                return false;
            }

            let packet = match session.buffer.next_client_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => return true,
                Err(e) => {
                    let batch = self.logout(id, Violation::Malformed(e), Vec::new());
                    out.extend(batch);
                    return false;
                }
            };
            debug!("session {} <- {:?}", id, packet.opcode());

            match self.handle_packet(id, packet) {
                Ok(batch) => out.extend(batch),
                Err(v) => {
                    let batch = self.logout(id, v, Vec::new());
                    out.extend(batch);
                    return false;
                }
            }
        }
    }

    fn handle_packet(&mut self, id: SessionId, packet: ClientPacket) -> Result<Vec<Output>, Violation> {
        match packet {
            ClientPacket::Ping => Ok(Vec::new()),
            ClientPacket::Login(request) => self.handle_login(id, &request),
            ClientPacket::Connect { group } => self.topology.join_group(id, group),
            ClientPacket::Disconnect => self.topology.leave_group(id),
            ClientPacket::Scan => self.topology.scan(id),
            ClientPacket::Chat { message } => self.topology.chat(id, message),
        }
    }

    fn handle_login(&mut self, id: SessionId, request: &LoginRequest) -> Result<Vec<Output>, Violation> {
        if !request.mac.is_station() || !request.nickname.is_present() || !request.product.is_valid() {
            return Err(Violation::InvalidLogin);
        }
        self.topology
            .login(id, request, self.directory.as_mut())
            .ok_or(Violation::InvalidLogin)?;
        Ok(Vec::new())
    }

    /// Log `id` out for `violation`, appending the cascade to `out`.
    fn logout(&mut self, id: SessionId, violation: Violation, mut out: Vec<Output>) -> Vec<Output> {
        match self.topology.session(id) {
            Some(s) if s.is_logged_in() => warn!("{} violated protocol: {}", s, violation),
            Some(s) => warn!("session {} from {} violated protocol: {}", id, s.ip, violation),
            None => {}
        }
        out.extend(
            self.topology
                .destroy_session(id, LogoutReason::Violation(violation)),
        );
        out
    }
}

/// Client opcodes accepted in each state. Anything else (including
/// unknown bytes) is a violation.
fn opcode_allowed(state: SessionState, raw: u8) -> bool {
    match (state, Opcode::from_u8(raw)) {
        (SessionState::Waiting, Some(Opcode::Login)) => true,
        (
            SessionState::LoggedIn,
            Some(Opcode::Ping | Opcode::Connect | Opcode::Disconnect | Opcode::Scan | Opcode::Chat),
        ) => true,
        _ => false,
    }
}
