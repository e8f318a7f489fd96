//! Error types for the hub core.
//!
//! Neither type ever reaches the wire. A [`Violation`] logs the session
//! out; a [`Refusal`] drops the connection before a session exists.

use adhoc_protocol::ProtocolError;
use thiserror::Error;

use crate::session::SessionState;

/// Protocol misuse by a connected client. Always fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("opcode {opcode} not allowed while {state}")]
    UnexpectedOpcode { state: SessionState, opcode: u8 },

    #[error("invalid login (bad MAC, nickname or product code)")]
    InvalidLogin,

    #[error("invalid group name")]
    InvalidGroupName,

    #[error("already in a group")]
    AlreadyGrouped,

    #[error("not in a group")]
    NotGrouped,

    #[error("receive buffer overflow")]
    BufferOverflow,

    #[error("malformed frame: {0}")]
    Malformed(ProtocolError),
}

/// Reasons a new connection is turned away at accept time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("server full")]
    ServerFull,

    #[error("another session is already connected from this address")]
    DuplicateIp,
}
