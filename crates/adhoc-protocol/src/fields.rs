//! Fixed-size identifier fields.
//!
//! Every identifier on the wire is a byte array of a known length. The
//! newtypes here keep the raw bytes (so encoding is a plain copy) and
//! add the validation rules the hub applies at login/join time.
//!
//! Text-like fields are NUL-padded. Their `Display` impls show the bytes
//! up to the first NUL, lossily decoded as UTF-8.

use std::fmt;

use crate::wire_types::{CHAT_MESSAGE_LEN, GROUP_NAME_LEN, MAC_LEN, NICKNAME_LEN, PRODUCT_CODE_LEN};

/// Bytes of `field` up to (not including) the first NUL.
fn until_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Copy `text` into a zeroed array, truncated to `max` bytes.
fn padded<const N: usize>(text: &[u8], max: usize) -> [u8; N] {
    let mut out = [0u8; N];
    let n = text.len().min(max).min(N);
    out[..n].copy_from_slice(&text[..n]);
    out
}

// -----------------------------------------------------------------------------
// MacAddress
// -----------------------------------------------------------------------------

/// Hardware (MAC-equivalent) address of a console.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; MAC_LEN]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0x00; MAC_LEN]);
    pub const BROADCAST: MacAddress = MacAddress([0xFF; MAC_LEN]);

    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }

    /// A station address is anything but the all-zero and all-ones
    /// addresses; only those may log in.
    pub fn is_station(&self) -> bool {
        *self != Self::ZERO && *self != Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

// -----------------------------------------------------------------------------
// ProductCode
// -----------------------------------------------------------------------------

/// Game product code, e.g. `ULUS10041`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProductCode(pub [u8; PRODUCT_CODE_LEN]);

impl ProductCode {
    /// Parse a textual product code. Returns `None` unless it is exactly
    /// nine characters of `A-Z` / `0-9`.
    pub fn parse(text: &str) -> Option<Self> {
        let bytes: [u8; PRODUCT_CODE_LEN] = text.as_bytes().try_into().ok()?;
        let code = ProductCode(bytes);
        code.is_valid().then_some(code)
    }

    pub fn as_bytes(&self) -> &[u8; PRODUCT_CODE_LEN] {
        &self.0
    }

    /// Every byte must be an uppercase letter or a digit.
    pub fn is_valid(&self) -> bool {
        self.0
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(until_nul(&self.0)))
    }
}

// -----------------------------------------------------------------------------
// GroupName
// -----------------------------------------------------------------------------

/// Ad-hoc network group name.
///
/// Names compare like C strings: everything after the first NUL is
/// ignored. [`GroupName::from_wire`] zeroes those bytes so that plain
/// array equality gives the same answer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct GroupName(pub [u8; GROUP_NAME_LEN]);

impl GroupName {
    /// Build from raw wire bytes, clearing anything after the first NUL.
    pub fn from_wire(raw: [u8; GROUP_NAME_LEN]) -> Self {
        GroupName(padded(until_nul(&raw), GROUP_NAME_LEN))
    }

    /// Build from text (truncated to 8 bytes). Does not validate.
    pub fn new(text: &str) -> Self {
        GroupName(padded(text.as_bytes(), GROUP_NAME_LEN))
    }

    pub fn as_bytes(&self) -> &[u8; GROUP_NAME_LEN] {
        &self.0
    }

    /// Bytes before the first NUL must be ASCII letters or digits.
    pub fn is_valid(&self) -> bool {
        until_nul(&self.0).iter().all(|b| b.is_ascii_alphanumeric())
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(until_nul(&self.0)))
    }
}

// -----------------------------------------------------------------------------
// Nickname
// -----------------------------------------------------------------------------

/// Player nickname (128 bytes, NUL-padded).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Nickname(pub [u8; NICKNAME_LEN]);

impl Nickname {
    /// All-zero nickname, used as the sender of server notices.
    pub const EMPTY: Nickname = Nickname([0; NICKNAME_LEN]);

    /// Build from text, truncated so a terminating NUL always fits.
    pub fn new(text: &str) -> Self {
        Nickname(padded(text.as_bytes(), NICKNAME_LEN - 1))
    }

    pub fn as_bytes(&self) -> &[u8; NICKNAME_LEN] {
        &self.0
    }

    /// A nickname counts as set when its first byte is non-zero.
    pub fn is_present(&self) -> bool {
        self.0[0] != 0
    }
}

impl Default for Nickname {
    fn default() -> Self {
        Nickname::EMPTY
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(until_nul(&self.0)))
    }
}

// -----------------------------------------------------------------------------
// ChatMessage
// -----------------------------------------------------------------------------

/// Chat text (64-byte field).
///
/// At most 63 bytes of text are kept so the field always carries a
/// terminating NUL, whatever the client put in the last byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChatMessage(pub [u8; CHAT_MESSAGE_LEN]);

impl ChatMessage {
    /// Maximum number of text bytes.
    pub const MAX_TEXT: usize = CHAT_MESSAGE_LEN - 1;

    pub fn new(text: &str) -> Self {
        ChatMessage(padded(text.as_bytes(), Self::MAX_TEXT))
    }

    /// Build from raw wire bytes, keeping text up to the first NUL and
    /// at most [`ChatMessage::MAX_TEXT`] bytes.
    pub fn from_wire(raw: &[u8; CHAT_MESSAGE_LEN]) -> Self {
        ChatMessage(padded(until_nul(&raw[..Self::MAX_TEXT]), Self::MAX_TEXT))
    }

    pub fn as_bytes(&self) -> &[u8; CHAT_MESSAGE_LEN] {
        &self.0
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(until_nul(&self.0)).into_owned()
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}
