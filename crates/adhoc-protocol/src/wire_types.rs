//! Low-level wire types and constants.
//!
//! This module defines:
//! - The opcode byte shared by client and server frames.
//! - Field lengths of the fixed-size identifiers.
//! - The total size of every frame, opcode included.
//!
//! The actual encode/decode logic lives in `binary_codec`.

/// Product code length (e.g. `ULUS10041`).
pub const PRODUCT_CODE_LEN: usize = 9;

/// Hardware (MAC) address length.
pub const MAC_LEN: usize = 6;

/// Ad-hoc group name length (e.g. `1234ABCD`).
pub const GROUP_NAME_LEN: usize = 8;

/// Player nickname length.
pub const NICKNAME_LEN: usize = 128;

/// Chat message field length, terminating NUL included.
pub const CHAT_MESSAGE_LEN: usize = 64;

/// IPv4 address length, network byte order.
pub const IPV4_LEN: usize = 4;

/// Capacity of a connection's receive buffer.
pub const RX_BUFFER_CAPACITY: usize = 1024;

// Client → server frame sizes.
pub const PING_FRAME_LEN: usize = 1;
pub const LOGIN_FRAME_LEN: usize = 1 + MAC_LEN + NICKNAME_LEN + PRODUCT_CODE_LEN;
pub const CONNECT_FRAME_LEN: usize = 1 + GROUP_NAME_LEN;
pub const DISCONNECT_FRAME_LEN: usize = 1;
pub const SCAN_FRAME_LEN: usize = 1;
pub const CHAT_FRAME_LEN: usize = 1 + CHAT_MESSAGE_LEN;

// Server → client frame sizes.
pub const PEER_JOINED_FRAME_LEN: usize = 1 + NICKNAME_LEN + MAC_LEN + IPV4_LEN;
pub const PEER_LEFT_FRAME_LEN: usize = 1 + IPV4_LEN;
pub const SCAN_ENTRY_FRAME_LEN: usize = 1 + GROUP_NAME_LEN + MAC_LEN;
pub const SCAN_COMPLETE_FRAME_LEN: usize = 1;
pub const CONNECT_BSSID_FRAME_LEN: usize = 1 + MAC_LEN;
pub const CHAT_DELIVERY_FRAME_LEN: usize = 1 + CHAT_MESSAGE_LEN + NICKNAME_LEN;

/// Opcodes (first byte of each frame).
///
/// Several opcodes are used in both directions with different payloads:
/// `Connect` is a join request from the client and a "peer joined"
/// notice from the server, `Scan` is a request and a result row, and so
/// on. Use [`Opcode::client_frame_len`] / [`Opcode::server_frame_len`]
/// for the direction you are decoding.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Ping = 0,
    Login = 1,
    Connect = 2,
    Disconnect = 3,
    Scan = 4,
    ScanComplete = 5,
    ConnectBssid = 6,
    Chat = 7,
}

impl Opcode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Opcode::Ping),
            1 => Some(Opcode::Login),
            2 => Some(Opcode::Connect),
            3 => Some(Opcode::Disconnect),
            4 => Some(Opcode::Scan),
            5 => Some(Opcode::ScanComplete),
            6 => Some(Opcode::ConnectBssid),
            7 => Some(Opcode::Chat),
            _ => None,
        }
    }

    /// Size of a client → server frame starting with this opcode, or
    /// `None` if clients never send it.
    pub fn client_frame_len(self) -> Option<usize> {
        match self {
            Opcode::Ping => Some(PING_FRAME_LEN),
            Opcode::Login => Some(LOGIN_FRAME_LEN),
            Opcode::Connect => Some(CONNECT_FRAME_LEN),
            Opcode::Disconnect => Some(DISCONNECT_FRAME_LEN),
            Opcode::Scan => Some(SCAN_FRAME_LEN),
            Opcode::Chat => Some(CHAT_FRAME_LEN),
            Opcode::ScanComplete | Opcode::ConnectBssid => None,
        }
    }

    /// Size of a server → client frame starting with this opcode, or
    /// `None` if the server never sends it.
    pub fn server_frame_len(self) -> Option<usize> {
        match self {
            Opcode::Connect => Some(PEER_JOINED_FRAME_LEN),
            Opcode::Disconnect => Some(PEER_LEFT_FRAME_LEN),
            Opcode::Scan => Some(SCAN_ENTRY_FRAME_LEN),
            Opcode::ScanComplete => Some(SCAN_COMPLETE_FRAME_LEN),
            Opcode::ConnectBssid => Some(CONNECT_BSSID_FRAME_LEN),
            Opcode::Chat => Some(CHAT_DELIVERY_FRAME_LEN),
            Opcode::Ping | Opcode::Login => None,
        }
    }
}
