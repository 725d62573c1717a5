//! Wire packet format
//!
//! Fixed-layout datagrams, network byte order for multi-byte fields:
//!
//! ```text
//! | type (1) | sender_id (1) | sequence (2) | length (2) | payload (<= 8192) |
//! ```
//!
//! Datagrams are truncated to the fields their kind uses: HELLO is one
//! byte, WELCOME/JOIN/BYE are two, only DATA carries the full header and
//! a payload. A DATA datagram whose declared length disagrees with the
//! bytes actually received is not rejected: on UDP a short read is
//! evidence of transit loss worth concealing, so the mismatch is surfaced
//! to the session layer instead.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::MAX_PAYLOAD;
use crate::error::ProtocolError;

/// Size of the full DATA header in bytes
pub const HEADER_LEN: usize = 6;

/// Packet type discriminants as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Hello = 1,
    Welcome = 2,
    Data = 3,
    Join = 4,
    Bye = 5,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(PacketType::Hello),
            2 => Ok(PacketType::Welcome),
            3 => Ok(PacketType::Data),
            4 => Ok(PacketType::Join),
            5 => Ok(PacketType::Bye),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// A DATA packet: one encoded audio frame with its sequence framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Sender id assigned by the server at session establishment
    pub sender_id: u8,
    /// Wrapping per-sender datagram counter
    pub sequence: u16,
    /// Payload byte count the sender claimed in the header
    pub declared_len: u16,
    /// Payload bytes that actually arrived
    pub payload: Bytes,
}

impl DataPacket {
    /// Build an outbound DATA packet; the declared length always matches
    /// the payload on the send side.
    pub fn new(sender_id: u8, sequence: u16, payload: Bytes) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            sender_id,
            sequence,
            declared_len: payload.len() as u16,
            payload,
        }
    }

    /// True when the datagram lost payload bytes in transit
    pub fn is_truncated(&self) -> bool {
        self.payload.len() != self.declared_len as usize
    }
}

/// A decoded wire packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Hello,
    Welcome { sender_id: u8 },
    Data(DataPacket),
    Join { sender_id: u8 },
    Bye { sender_id: u8 },
}

impl Packet {
    /// Wire type of this packet
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Hello => PacketType::Hello,
            Packet::Welcome { .. } => PacketType::Welcome,
            Packet::Data(_) => PacketType::Data,
            Packet::Join { .. } => PacketType::Join,
            Packet::Bye { .. } => PacketType::Bye,
        }
    }

    /// Serialize to the truncated wire form
    pub fn encode(&self) -> Bytes {
        match self {
            Packet::Hello => {
                let mut buf = BytesMut::with_capacity(1);
                buf.put_u8(PacketType::Hello as u8);
                buf.freeze()
            }
            Packet::Welcome { sender_id }
            | Packet::Join { sender_id }
            | Packet::Bye { sender_id } => {
                let mut buf = BytesMut::with_capacity(2);
                buf.put_u8(self.packet_type() as u8);
                buf.put_u8(*sender_id);
                buf.freeze()
            }
            Packet::Data(data) => {
                let mut buf = BytesMut::with_capacity(HEADER_LEN + data.payload.len());
                buf.put_u8(PacketType::Data as u8);
                buf.put_u8(data.sender_id);
                buf.put_u16(data.sequence);
                buf.put_u16(data.declared_len);
                buf.put_slice(&data.payload);
                buf.freeze()
            }
        }
    }

    /// Parse one received datagram.
    ///
    /// Rejects datagrams shorter than their kind's minimum, unknown type
    /// bytes, and declared payload lengths over [`MAX_PAYLOAD`]. A DATA
    /// length/payload mismatch is not an error here.
    pub fn decode(buf: &[u8]) -> Result<Packet, ProtocolError> {
        if buf.is_empty() {
            return Err(ProtocolError::TooShort { got: 0, need: 1 });
        }

        match PacketType::try_from(buf[0])? {
            PacketType::Hello => Ok(Packet::Hello),
            kind @ (PacketType::Welcome | PacketType::Join | PacketType::Bye) => {
                if buf.len() < 2 {
                    return Err(ProtocolError::TooShort {
                        got: buf.len(),
                        need: 2,
                    });
                }
                let sender_id = buf[1];
                Ok(match kind {
                    PacketType::Welcome => Packet::Welcome { sender_id },
                    PacketType::Join => Packet::Join { sender_id },
                    _ => Packet::Bye { sender_id },
                })
            }
            PacketType::Data => {
                if buf.len() < HEADER_LEN {
                    return Err(ProtocolError::TooShort {
                        got: buf.len(),
                        need: HEADER_LEN,
                    });
                }
                let declared_len = u16::from_be_bytes([buf[4], buf[5]]);
                if declared_len as usize > MAX_PAYLOAD {
                    return Err(ProtocolError::PayloadTooLarge(declared_len as usize));
                }
                Ok(Packet::Data(DataPacket {
                    sender_id: buf[1],
                    sequence: u16::from_be_bytes([buf[2], buf[3]]),
                    declared_len,
                    payload: Bytes::copy_from_slice(&buf[HEADER_LEN..]),
                }))
            }
        }
    }
}
