//! adhoc-protocol
//!
//! Wire-level encoding/decoding for the ad-hoc matchmaking hub.
//!
//! The console-side client speaks a stream protocol with **no length
//! prefix**: the first byte of every frame is an opcode, and the opcode
//! alone decides how many bytes follow.
//!
//! - [`wire_types`]   : opcodes, field lengths, frame sizes
//! - [`fields`]       : fixed-size identifiers (MAC, product code, ...)
//! - [`packets`]      : logical client/server packets
//! - [`binary_codec`] : packet <-> bytes
//! - [`rx_buffer`]    : per-connection receive accumulator

pub mod wire_types;
pub mod fields;
pub mod packets;
pub mod binary_codec;
pub mod rx_buffer;

pub use binary_codec::{decode_client, decode_server, encode_client, encode_server, ProtocolError};
pub use fields::{ChatMessage, GroupName, MacAddress, Nickname, ProductCode};
pub use packets::{ClientPacket, LoginRequest, ServerPacket};
pub use rx_buffer::ConnectionBuffer;
pub use wire_types::Opcode;
