//! Effects produced by the hub.
//!
//! The hub never writes to a socket. Each call returns a `Vec<Output>`
//! which the caller must apply **in order**: a `Close` for a session
//! always comes after every `Send` queued for it in the same batch.

use std::fmt;

use adhoc_protocol::ServerPacket;

use crate::error::Violation;
use crate::session::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Encode `packet` and queue it on the session's connection.
    Send { to: SessionId, packet: ServerPacket },

    /// The session is gone from the topology; close its connection.
    Close {
        session: SessionId,
        reason: LogoutReason,
    },
}

impl Output {
    pub fn send(to: SessionId, packet: ServerPacket) -> Self {
        Output::Send { to, packet }
    }

    pub fn close(session: SessionId, reason: LogoutReason) -> Self {
        Output::Close { session, reason }
    }

    /// Session this output is addressed to.
    pub fn session(&self) -> SessionId {
        match self {
            Output::Send { to, .. } => *to,
            Output::Close { session, .. } => *session,
        }
    }
}

/// Why a session was logged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    Violation(Violation),
    /// EOF or socket error.
    ConnectionLost,
    TimedOut,
    Shutdown,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutReason::Violation(v) => write!(f, "protocol violation: {}", v),
            LogoutReason::ConnectionLost => f.write_str("connection lost"),
            LogoutReason::TimedOut => f.write_str("timed out"),
            LogoutReason::Shutdown => f.write_str("server shutdown"),
        }
    }
}

impl From<Violation> for LogoutReason {
    fn from(v: Violation) -> Self {
        LogoutReason::Violation(v)
    }
}
