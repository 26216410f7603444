//! Packet codec: typed, length-prefixed message + sender frames.
//!
//! Frame format (5-byte header + payload, network byte order):
//! ```text
//! [type:u8] [message_len:u16 BE] [name_len:u16 BE] [message bytes] [name bytes]
//! ```

use std::fmt;

use tracing::trace;

use super::errors::{NetError, NetResult};
use super::transport::TransportHandle;

/// Header size in bytes
pub const HEADER_SIZE: usize = 5;

/// Largest message or name section a header can describe
pub const MAX_SECTION_LEN: usize = u16::MAX as usize;

/// Packet type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// A member joined; sender carries their name
    Connect = 2,
    /// Chat text; message carries the text, sender the author
    ChatMessage = 3,
    /// A member left; sender carries their name
    Disconnect = 4,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            2 => Some(Self::Connect),
            3 => Some(Self::ChatMessage),
            4 => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Connect => "connect",
            PacketType::ChatMessage => "chat_message",
            PacketType::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw header as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: u8,
    pub message_len: u16,
    pub name_len: u16,
}

impl PacketHeader {
    /// Build a header describing the given sections
    pub fn describe(packet_type: PacketType, message: &[u8], sender: &[u8]) -> NetResult<Self> {
        Ok(Self {
            packet_type: packet_type as u8,
            message_len: section_len("message", message)?,
            name_len: section_len("sender", sender)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.packet_type;
        buf[1..3].copy_from_slice(&self.message_len.to_be_bytes());
        buf[3..5].copy_from_slice(&self.name_len.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            packet_type: buf[0],
            message_len: u16::from_be_bytes([buf[1], buf[2]]),
            name_len: u16::from_be_bytes([buf[3], buf[4]]),
        }
    }
}

fn section_len(field: &'static str, bytes: &[u8]) -> NetResult<u16> {
    u16::try_from(bytes.len()).map_err(|_| NetError::PayloadTooLarge { field, len: bytes.len() })
}

/// A decoded packet with owned payload sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub message: Vec<u8>,
    pub sender: Vec<u8>,
}

impl Packet {
    pub fn new(packet_type: PacketType, message: impl Into<Vec<u8>>, sender: impl Into<Vec<u8>>) -> Self {
        Self {
            packet_type,
            message: message.into(),
            sender: sender.into(),
        }
    }

    /// Sender name as text; invalid UTF-8 is replaced rather than rejected
    pub fn sender_lossy(&self) -> String {
        String::from_utf8_lossy(&self.sender).into_owned()
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            sender: String::from_utf8_lossy(&self.sender).into_owned(),
            text: String::from_utf8_lossy(&self.message).into_owned(),
        }
    }

    pub async fn send(&self, handle: &mut TransportHandle) -> NetResult<()> {
        encode(handle, self.packet_type, &self.message, &self.sender).await
    }
}

/// Application-level chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    pub fn to_packet(&self) -> Packet {
        Packet::new(PacketType::ChatMessage, self.text.as_bytes(), self.sender.as_bytes())
    }
}

/// Serialize and send one packet: header, then message, then sender
pub async fn encode(
    handle: &mut TransportHandle,
    packet_type: PacketType,
    message: &[u8],
    sender: &[u8],
) -> NetResult<()> {
    let header = PacketHeader::describe(packet_type, message, sender)?;

    handle.write_exact(&header.to_bytes()).await?;
    handle.write_exact(message).await?;
    handle.write_exact(sender).await?;

    trace!(%packet_type, message_len = message.len(), name_len = sender.len(), "packet sent");
    Ok(())
}

/// Receive one complete packet
///
/// Nothing is returned until the header and both payload sections have been read in full.
/// An unknown type byte is reported only after its payload was consumed, so the stream stays
/// aligned on the next header.
pub async fn decode(handle: &mut TransportHandle) -> NetResult<Packet> {
    let raw = handle.read_exact(HEADER_SIZE).await?;
    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes.copy_from_slice(&raw);
    let header = PacketHeader::from_bytes(&header_bytes);

    let message = handle.read_exact(header.message_len as usize).await?;
    let sender = handle.read_exact(header.name_len as usize).await?;

    let packet_type =
        PacketType::from_u8(header.packet_type).ok_or(NetError::UnknownPacketType(header.packet_type))?;

    trace!(%packet_type, message_len = message.len(), name_len = sender.len(), "packet received");
    Ok(Packet {
        packet_type,
        message,
        sender,
    })
}
