//! Logical packets exchanged between consoles and the hub.

use std::net::Ipv4Addr;

use crate::fields::{ChatMessage, GroupName, MacAddress, Nickname, ProductCode};
use crate::wire_types::Opcode;

/// Identity a console presents when it logs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub mac: MacAddress,
    pub nickname: Nickname,
    pub product: ProductCode,
}

/// Client → server packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    /// Keep-alive; carries no payload.
    Ping,
    Login(LoginRequest),
    /// Join (or found) the named group.
    Connect { group: GroupName },
    /// Leave the current group.
    Disconnect,
    /// List the groups of the current game.
    Scan,
    /// Send a chat line to the other members of the group.
    Chat { message: ChatMessage },
}

impl ClientPacket {
    pub fn opcode(&self) -> Opcode {
        match self {
            ClientPacket::Ping => Opcode::Ping,
            ClientPacket::Login(_) => Opcode::Login,
            ClientPacket::Connect { .. } => Opcode::Connect,
            ClientPacket::Disconnect => Opcode::Disconnect,
            ClientPacket::Scan => Opcode::Scan,
            ClientPacket::Chat { .. } => Opcode::Chat,
        }
    }
}

/// Server → client packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    /// A peer is now in the recipient's group.
    PeerJoined {
        nickname: Nickname,
        mac: MacAddress,
        ip: Ipv4Addr,
    },
    /// The peer with this address left the recipient's group.
    PeerLeft { ip: Ipv4Addr },
    /// One row of a scan result; `host` is the group founder's address.
    ScanEntry { group: GroupName, host: MacAddress },
    ScanComplete,
    /// Sent to a member right after it joins, naming the group host.
    ConnectBssid { host: MacAddress },
    /// Chat line relayed from `sender`. An empty sender marks a server
    /// notice.
    Chat {
        sender: Nickname,
        message: ChatMessage,
    },
}

impl ServerPacket {
    pub fn opcode(&self) -> Opcode {
        match self {
            ServerPacket::PeerJoined { .. } => Opcode::Connect,
            ServerPacket::PeerLeft { .. } => Opcode::Disconnect,
            ServerPacket::ScanEntry { .. } => Opcode::Scan,
            ServerPacket::ScanComplete => Opcode::ScanComplete,
            ServerPacket::ConnectBssid { .. } => Opcode::ConnectBssid,
            ServerPacket::Chat { .. } => Opcode::Chat,
        }
    }
}
