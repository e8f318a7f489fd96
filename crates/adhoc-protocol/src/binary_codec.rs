//! Binary encoding/decoding of hub packets.
//!
//! Every frame is an opcode byte followed by a fixed-size body. There is
//! no length prefix and no padding between fields; multi-byte fields are
//! raw byte arrays (IPv4 addresses in network order).
//!
//! ```text
//! Client → server
//! ---------------
//! Ping       (0): [no body]
//! Login      (1): [1..7]    mac
//!                 [7..135]  nickname
//!                 [135..144] product code
//! Connect    (2): [1..9]    group name
//! Disconnect (3): [no body]
//! Scan       (4): [no body]
//! Chat       (7): [1..65]   message
//!
//! Server → client
//! ---------------
//! PeerJoined   (2): [1..129]   nickname
//!                   [129..135] mac
//!                   [135..139] ipv4
//! PeerLeft     (3): [1..5]     ipv4
//! ScanEntry    (4): [1..9]     group name
//!                   [9..15]    host mac
//! ScanComplete (5): [no body]
//! ConnectBssid (6): [1..7]     host mac
//! Chat         (7): [1..65]    message
//!                   [65..193]  sender nickname
//! ```
//!
//! Each function handles **exactly one frame per buffer**. Splitting a
//! byte stream into frames is the job of
//! [`ConnectionBuffer`](crate::rx_buffer::ConnectionBuffer).

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::fields::{ChatMessage, GroupName, MacAddress, Nickname, ProductCode};
use crate::packets::{ClientPacket, LoginRequest, ServerPacket};
use crate::wire_types::{
    Opcode, CHAT_MESSAGE_LEN, GROUP_NAME_LEN, IPV4_LEN, MAC_LEN, NICKNAME_LEN, PRODUCT_CODE_LEN,
};

/// Errors that can arise when decoding a frame or framing a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("opcode {0:?} is not valid in this direction")]
    UnexpectedOpcode(Opcode),

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("receive buffer overflow: {len} bytes pending, capacity {capacity}")]
    BufferOverflow { len: usize, capacity: usize },
}

// ============================================================================
// Field cursor
// ============================================================================

/// Sequential reader over a frame body. Lengths are checked once up
/// front, so `take` never runs past the end.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        // Skip the opcode.
        Fields { buf, pos: 1 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.take::<IPV4_LEN>())
    }
}

/// Check that `buf` holds exactly one frame of `expected` bytes.
fn check_len(buf: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if buf.len() < expected {
        return Err(ProtocolError::Truncated {
            needed: expected,
            have: buf.len(),
        });
    }
    if buf.len() > expected {
        return Err(ProtocolError::TrailingBytes(buf.len() - expected));
    }
    Ok(())
}

fn read_opcode(buf: &[u8]) -> Result<Opcode, ProtocolError> {
    let raw = *buf.first().ok_or(ProtocolError::Truncated { needed: 1, have: 0 })?;
    Opcode::from_u8(raw).ok_or(ProtocolError::UnknownOpcode(raw))
}

// ============================================================================
// CLIENT: client → server
// ============================================================================

/// Decode a single client frame.
pub fn decode_client(buf: &[u8]) -> Result<ClientPacket, ProtocolError> {
    let opcode = read_opcode(buf)?;
    let len = opcode
        .client_frame_len()
        .ok_or(ProtocolError::UnexpectedOpcode(opcode))?;
    check_len(buf, len)?;

    let mut f = Fields::new(buf);
    let packet = match opcode {
        Opcode::Ping => ClientPacket::Ping,
        Opcode::Login => {
            let mac = MacAddress(f.take::<MAC_LEN>());
            let nickname = Nickname(f.take::<NICKNAME_LEN>());
            let product = ProductCode(f.take::<PRODUCT_CODE_LEN>());
            ClientPacket::Login(LoginRequest {
                mac,
                nickname,
                product,
            })
        }
        Opcode::Connect => ClientPacket::Connect {
            group: GroupName::from_wire(f.take::<GROUP_NAME_LEN>()),
        },
        Opcode::Disconnect => ClientPacket::Disconnect,
        Opcode::Scan => ClientPacket::Scan,
        Opcode::Chat => ClientPacket::Chat {
            message: ChatMessage::from_wire(&f.take::<CHAT_MESSAGE_LEN>()),
        },
        Opcode::ScanComplete | Opcode::ConnectBssid => {
            return Err(ProtocolError::UnexpectedOpcode(opcode))
        }
    };
    Ok(packet)
}

/// Encode a client packet, appending the frame to `out`.
///
/// Used by test clients and the example; the hub itself only decodes
/// this direction.
pub fn encode_client(packet: &ClientPacket, out: &mut Vec<u8>) {
    out.push(packet.opcode() as u8);
    match packet {
        ClientPacket::Ping | ClientPacket::Disconnect | ClientPacket::Scan => {}
        ClientPacket::Login(login) => {
            out.extend_from_slice(login.mac.as_bytes());
            out.extend_from_slice(login.nickname.as_bytes());
            out.extend_from_slice(login.product.as_bytes());
        }
        ClientPacket::Connect { group } => out.extend_from_slice(group.as_bytes()),
        ClientPacket::Chat { message } => out.extend_from_slice(message.as_bytes()),
    }
}

// ============================================================================
// SERVER: server → client
// ============================================================================

/// Encode a server packet, appending the frame to `out`.
pub fn encode_server(packet: &ServerPacket, out: &mut Vec<u8>) {
    out.push(packet.opcode() as u8);
    match packet {
        ServerPacket::PeerJoined { nickname, mac, ip } => {
            out.extend_from_slice(nickname.as_bytes());
            out.extend_from_slice(mac.as_bytes());
            out.extend_from_slice(&ip.octets());
        }
        ServerPacket::PeerLeft { ip } => out.extend_from_slice(&ip.octets()),
        ServerPacket::ScanEntry { group, host } => {
            out.extend_from_slice(group.as_bytes());
            out.extend_from_slice(host.as_bytes());
        }
        ServerPacket::ScanComplete => {}
        ServerPacket::ConnectBssid { host } => out.extend_from_slice(host.as_bytes()),
        ServerPacket::Chat { sender, message } => {
            out.extend_from_slice(message.as_bytes());
            out.extend_from_slice(sender.as_bytes());
        }
    }
}

/// Decode a single server frame (client side of the conversation).
pub fn decode_server(buf: &[u8]) -> Result<ServerPacket, ProtocolError> {
    let opcode = read_opcode(buf)?;
    let len = opcode
        .server_frame_len()
        .ok_or(ProtocolError::UnexpectedOpcode(opcode))?;
    check_len(buf, len)?;

    let mut f = Fields::new(buf);
    let packet = match opcode {
        Opcode::Connect => ServerPacket::PeerJoined {
            nickname: Nickname(f.take::<NICKNAME_LEN>()),
            mac: MacAddress(f.take::<MAC_LEN>()),
            ip: f.ipv4(),
        },
        Opcode::Disconnect => ServerPacket::PeerLeft { ip: f.ipv4() },
        Opcode::Scan => ServerPacket::ScanEntry {
            group: GroupName::from_wire(f.take::<GROUP_NAME_LEN>()),
            host: MacAddress(f.take::<MAC_LEN>()),
        },
        Opcode::ScanComplete => ServerPacket::ScanComplete,
        Opcode::ConnectBssid => ServerPacket::ConnectBssid {
            host: MacAddress(f.take::<MAC_LEN>()),
        },
        Opcode::Chat => ServerPacket::Chat {
            message: ChatMessage::from_wire(&f.take::<CHAT_MESSAGE_LEN>()),
            sender: Nickname(f.take::<NICKNAME_LEN>()),
        },
        Opcode::Ping | Opcode::Login => return Err(ProtocolError::UnexpectedOpcode(opcode)),
    };
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire_types::{LOGIN_FRAME_LEN, PEER_JOINED_FRAME_LEN};

    #[test]
    fn login_layout_is_mac_nickname_product() {
        let mut buf = vec![Opcode::Login as u8];
        buf.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let mut nick = [0u8; NICKNAME_LEN];
        nick[..4].copy_from_slice(b"Nate");
        buf.extend_from_slice(&nick);
        buf.extend_from_slice(b"ULUS10041");
        assert_eq!(buf.len(), LOGIN_FRAME_LEN);

        match decode_client(&buf).unwrap() {
            ClientPacket::Login(login) => {
                assert_eq!(login.mac, MacAddress([1, 2, 3, 4, 5, 6]));
                assert_eq!(login.nickname.to_string(), "Nate");
                assert_eq!(login.product, ProductCode::parse("ULUS10041").unwrap());
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn peer_joined_layout_is_nickname_mac_ip() {
        let packet = ServerPacket::PeerJoined {
            nickname: Nickname::new("Alice"),
            mac: MacAddress([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]),
            ip: Ipv4Addr::new(10, 0, 0, 7),
        };
        let mut out = Vec::new();
        encode_server(&packet, &mut out);

        assert_eq!(out.len(), PEER_JOINED_FRAME_LEN);
        assert_eq!(out[0], 2);
        assert_eq!(&out[1..6], b"Alice");
        assert_eq!(&out[129..135], &[0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]);
        assert_eq!(&out[135..139], &[10, 0, 0, 7]);
        assert_eq!(decode_server(&out).unwrap(), packet);
    }

    #[test]
    fn chat_delivery_puts_message_before_sender() {
        let packet = ServerPacket::Chat {
            sender: Nickname::new("Bob"),
            message: ChatMessage::new("gg"),
        };
        let mut out = Vec::new();
        encode_server(&packet, &mut out);
        assert_eq!(out.len(), 193);
        assert_eq!(&out[1..3], b"gg");
        assert_eq!(&out[65..68], b"Bob");
    }

    #[test]
    fn connect_request_normalises_group_name() {
        let buf = [2u8, b'G', b'1', 0, b'j', b'u', b'n', b'k', b'!'];
        assert_eq!(
            decode_client(&buf).unwrap(),
            ClientPacket::Connect {
                group: GroupName::new("G1")
            }
        );
    }

    #[test]
    fn chat_request_drops_last_byte() {
        let mut buf = vec![7u8];
        buf.extend_from_slice(&[b'z'; CHAT_MESSAGE_LEN]);
        match decode_client(&buf).unwrap() {
            ClientPacket::Chat { message } => assert_eq!(message.text().len(), 63),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn decode_errors() {
        assert_eq!(
            decode_client(&[]),
            Err(ProtocolError::Truncated { needed: 1, have: 0 })
        );
        assert_eq!(decode_client(&[9]), Err(ProtocolError::UnknownOpcode(9)));
        assert_eq!(
            decode_client(&[Opcode::ConnectBssid as u8]),
            Err(ProtocolError::UnexpectedOpcode(Opcode::ConnectBssid))
        );
        assert_eq!(
            decode_client(&[Opcode::Connect as u8, b'A']),
            Err(ProtocolError::Truncated { needed: 9, have: 2 })
        );
        assert_eq!(decode_client(&[0, 0]), Err(ProtocolError::TrailingBytes(1)));
        assert_eq!(
            decode_server(&[Opcode::Login as u8]),
            Err(ProtocolError::UnexpectedOpcode(Opcode::Login))
        );
    }

    #[test]
    fn empty_bodies_encode_to_one_byte() {
        let mut out = Vec::new();
        encode_client(&ClientPacket::Scan, &mut out);
        encode_client(&ClientPacket::Ping, &mut out);
        encode_server(&ServerPacket::ScanComplete, &mut out);
        assert_eq!(out, vec![4, 0, 5]);
    }
}
