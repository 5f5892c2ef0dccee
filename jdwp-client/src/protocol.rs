// JDWP packet framing
//
// Reference: https://docs.oracle.com/javase/8/docs/platform/jpda/jdwp/jdwp-protocol.html
//
// All multi-byte values are big-endian (network byte order).

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

pub type JdwpResult<T> = Result<T, JdwpError>;

#[derive(Debug, Error)]
pub enum JdwpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid handshake")]
    InvalidHandshake,

    #[error("JDWP error code {0}: {1}")]
    JdwpErrorCode(u16, &'static str),

    #[error("Connection closed")]
    ConnectionClosed,
}

pub const JDWP_HANDSHAKE: &[u8] = b"JDWP-Handshake";

// Header layout:
// length (4) - includes header
// id (4)
// flags (1) - 0x00 = command, 0x80 = reply
// command set (1) + command (1)  | error code (2)
pub const HEADER_SIZE: usize = 11;
pub const REPLY_FLAG: u8 = 0x80;

/// Outgoing command. Payload helpers keep the wire encoding in one place.
#[derive(Debug, Clone)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReplyPacket {
    pub id: u32,
    pub error_code: u16,
    pub data: Vec<u8>,
}

impl CommandPacket {
    pub fn new(id: u32, command_set: u8, command: u8) -> Self {
        Self {
            id,
            command_set,
            command,
            data: Vec::new(),
        }
    }

    /// Object and reference type IDs are sent as 8 bytes
    pub fn put_id(&mut self, id: u64) -> &mut Self {
        self.data.put_u64(id);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.data.put_i32(value);
        self
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.data.put_u8(value);
        self
    }

    /// JDWP string: 4-byte length + UTF-8 bytes
    pub fn put_string(&mut self, value: &str) -> &mut Self {
        self.data.put_u32(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(0x00);
        buf.put_u8(self.command_set);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);

        buf.to_vec()
    }
}

impl ReplyPacket {
    pub fn decode(mut buf: &[u8]) -> JdwpResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(JdwpError::Protocol("Reply packet too short".to_string()));
        }

        let _length = buf.get_u32();
        let id = buf.get_u32();
        let flags = buf.get_u8();

        if flags != REPLY_FLAG {
            return Err(JdwpError::Protocol(format!("Invalid reply flag: {:#x}", flags)));
        }

        let error_code = buf.get_u16();

        Ok(Self {
            id,
            error_code,
            data: buf.to_vec(),
        })
    }

    pub fn check_error(&self) -> JdwpResult<()> {
        if self.error_code == 0 {
            Ok(())
        } else {
            Err(JdwpError::JdwpErrorCode(self.error_code, error_name(self.error_code)))
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Symbolic name for the error codes a heap query can run into
pub fn error_name(code: u16) -> &'static str {
    match code {
        0 => "NONE",
        10 => "INVALID_THREAD",
        13 => "THREAD_NOT_SUSPENDED",
        20 => "INVALID_OBJECT",
        21 => "INVALID_CLASS",
        22 => "CLASS_NOT_PREPARED",
        30 => "INVALID_FRAMEID",
        31 => "NO_MORE_FRAMES",
        32 => "OPAQUE_FRAME",
        41 => "NOT_FOUND",
        99 => "NOT_IMPLEMENTED",
        100 => "NULL_POINTER",
        102 => "INVALID_EVENT_TYPE",
        103 => "ILLEGAL_ARGUMENT",
        110 => "OUT_OF_MEMORY",
        112 => "VM_DEAD",
        113 => "INTERNAL",
        503 => "INVALID_INDEX",
        512 => "INVALID_COUNT",
        _ => "UNKNOWN_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_packet_encode() {
        let packet = CommandPacket::new(1, 1, 21);
        let encoded = packet.encode();

        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(&encoded[0..4], &[0, 0, 0, 11]);
        assert_eq!(&encoded[4..8], &[0, 0, 0, 1]);
        assert_eq!(encoded[8], 0x00);
        assert_eq!(encoded[9], 1);
        assert_eq!(encoded[10], 21);
    }

    #[test]
    fn test_payload_helpers_are_big_endian() {
        let mut packet = CommandPacket::new(0x12345678, 1, 2);
        packet.put_string("LFoo;").put_id(0x0102).put_i32(-1);
        let encoded = packet.encode();

        assert_eq!(&encoded[4..8], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&encoded[11..15], &[0, 0, 0, 5]);
        assert_eq!(&encoded[15..20], b"LFoo;");
        assert_eq!(&encoded[20..28], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&encoded[28..32], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&encoded[0..4], &[0, 0, 0, 32]);
    }

    #[test]
    fn test_reply_packet_decode_and_error() {
        let reply_data = vec![
            0, 0, 0, 13, // length
            0, 0, 0, 7, // id
            0x80, // reply flag
            0, 21, // INVALID_CLASS
            0xab, 0xcd,
        ];

        let packet = ReplyPacket::decode(&reply_data).unwrap();
        assert_eq!(packet.id, 7);
        assert_eq!(packet.data(), &[0xab, 0xcd]);
        match packet.check_error() {
            Err(JdwpError::JdwpErrorCode(21, name)) => assert_eq!(name, "INVALID_CLASS"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_reply_packet_rejects_command_flag() {
        let data = vec![0, 0, 0, 11, 0, 0, 0, 1, 0x00, 0, 0];
        assert!(ReplyPacket::decode(&data).is_err());
    }
}
