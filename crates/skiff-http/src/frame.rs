//! RFC 6455 frame codec.
//!
//! Server-side rules: outgoing frames are never masked and never fragmented
//! (FIN is always set); incoming frames may be masked (clients must mask)
//! and the mask is removed during decoding. Control frames are limited to
//! 125 payload bytes in both directions.

use std::fmt;
use std::io::{self, Read, Write};

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text payload.
    Text = 0x1,
    /// Binary payload.
    Binary = 0x2,
    /// Connection close.
    Close = 0x8,
    /// Ping.
    Ping = 0x9,
    /// Pong.
    Pong = 0xA,
}

impl Opcode {
    /// Parse the low nibble of the first frame byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    /// Close, Ping and Pong are control opcodes.
    #[must_use]
    pub fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

/// A decoded frame: the mask (if any) has already been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Unmasked payload bytes.
    pub payload: Vec<u8>,
}

/// Codec failure.
#[derive(Debug)]
pub enum FrameError {
    /// Socket failure, including EOF in the middle of a frame.
    Io(io::Error),
    /// The bytes violate RFC 6455 framing rules.
    Protocol(&'static str),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "websocket I/O error: {e}"),
            Self::Protocol(msg) => write!(f, "websocket protocol error: {msg}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Protocol(_) => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Read one frame, unmasking the payload when the mask bit is set.
pub fn read_frame(stream: &mut impl Read) -> Result<Frame, FrameError> {
    let mut head = [0u8; 2];
    stream.read_exact(&mut head)?;

    let fin = head[0] & 0x80 != 0;
    if head[0] & 0x70 != 0 {
        return Err(FrameError::Protocol(
            "reserved bits set without a negotiated extension",
        ));
    }
    let opcode = Opcode::from_u8(head[0] & 0x0F).ok_or(FrameError::Protocol("unknown opcode"))?;
    if opcode.is_control() && !fin {
        return Err(FrameError::Protocol("fragmented control frame"));
    }

    let masked = head[1] & 0x80 != 0;
    let mut length = u64::from(head[1] & 0x7F);
    if length == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext)?;
        length = u64::from(u16::from_be_bytes(ext));
    } else if length == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext)?;
        length = u64::from_be_bytes(ext);
        if length >> 63 != 0 {
            return Err(FrameError::Protocol("64-bit length with high bit set"));
        }
    }
    if opcode.is_control() && length > 125 {
        return Err(FrameError::Protocol("control frame payload exceeds 125 bytes"));
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        stream.read_exact(&mut key)?;
        Some(key)
    } else {
        None
    };

    let length = usize::try_from(length)
        .map_err(|_| FrameError::Protocol("payload length exceeds addressable memory"))?;
    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload)?;

    if let Some(key) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i & 3];
        }
    }

    Ok(Frame {
        fin,
        opcode,
        payload,
    })
}

/// Write one unmasked frame with FIN set.
///
/// Control payloads over 125 bytes are rejected before anything is written.
pub fn write_frame(
    stream: &mut impl Write,
    opcode: Opcode,
    payload: &[u8],
) -> Result<(), FrameError> {
    if opcode.is_control() && payload.len() > 125 {
        return Err(FrameError::Protocol("control frame payload exceeds 125 bytes"));
    }

    let mut out = Vec::with_capacity(payload.len() + 10);
    out.push(0x80 | opcode as u8);

    let length = payload.len() as u64;
    if length < 126 {
        out.push(length as u8);
    } else if length <= u64::from(u16::MAX) {
        out.push(126);
        out.extend_from_slice(&(length as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&length.to_be_bytes());
    }
    out.extend_from_slice(payload);

    stream.write_all(&out)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encode a masked client frame the way a browser would.
    fn masked_frame(opcode: u8, payload: &[u8], key: [u8; 4]) -> Vec<u8> {
        let mut out = vec![0x80 | opcode];
        if payload.len() < 126 {
            out.push(0x80 | payload.len() as u8);
        } else if payload.len() <= usize::from(u16::MAX) {
            out.push(0x80 | 126);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        } else {
            out.push(0x80 | 127);
            out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        }
        out.extend_from_slice(&key);
        for (i, &b) in payload.iter().enumerate() {
            out.push(b ^ key[i & 3]);
        }
        out
    }

    #[test]
    fn encode_small_text_frame() {
        let mut out = Vec::new();
        write_frame(&mut out, Opcode::Text, b"Hello").unwrap();
        assert_eq!(out, [0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn encode_uses_16_bit_length_from_126() {
        let payload = vec![7u8; 126];
        let mut out = Vec::new();
        write_frame(&mut out, Opcode::Binary, &payload).unwrap();
        assert_eq!(out[0], 0x82);
        assert_eq!(out[1], 126);
        assert_eq!(u16::from_be_bytes([out[2], out[3]]), 126);
        assert_eq!(out.len(), 4 + 126);
    }

    #[test]
    fn encode_uses_64_bit_length_above_u16() {
        let payload = vec![0u8; 70_000];
        let mut out = Vec::new();
        write_frame(&mut out, Opcode::Binary, &payload).unwrap();
        assert_eq!(out[1], 127);
        let mut ext = [0u8; 8];
        ext.copy_from_slice(&out[2..10]);
        assert_eq!(u64::from_be_bytes(ext), 70_000);
    }

    #[test]
    fn control_payload_over_125_is_rejected_at_sender() {
        let mut out = Vec::new();
        let err = write_frame(&mut out, Opcode::Ping, &[0u8; 126]).unwrap_err();
        assert!(matches!(err, FrameError::Protocol(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn decode_unmasked_round_trip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, Opcode::Text, b"round trip").unwrap();
        let frame = read_frame(&mut Cursor::new(wire)).unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, b"round trip");
    }

    #[test]
    fn decode_unmasks_client_payload() {
        let wire = masked_frame(0x1, b"Hello", [0x37, 0xFA, 0x21, 0x3D]);
        let frame = read_frame(&mut Cursor::new(wire)).unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, b"Hello");
    }

    #[test]
    fn decode_extended_masked_lengths() {
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        let wire = masked_frame(0x2, &payload, [1, 2, 3, 4]);
        let frame = read_frame(&mut Cursor::new(wire)).unwrap();
        assert_eq!(frame.payload, payload);

        let big: Vec<u8> = (0..70_000u32).map(|i| (i % 13) as u8).collect();
        let wire = masked_frame(0x2, &big, [9, 8, 7, 6]);
        let frame = read_frame(&mut Cursor::new(wire)).unwrap();
        assert_eq!(frame.payload.len(), 70_000);
        assert_eq!(frame.payload, big);
    }

    #[test]
    fn decode_rejects_reserved_bits() {
        let wire = vec![0xC1, 0x00];
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn decode_rejects_unknown_opcode() {
        let wire = vec![0x83, 0x00];
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn decode_rejects_fragmented_control() {
        // PING without FIN
        let wire = vec![0x09, 0x00];
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn decode_rejects_oversized_control() {
        let mut wire = vec![0x89, 126];
        wire.extend_from_slice(&200u16.to_be_bytes());
        wire.extend_from_slice(&[0u8; 200]);
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn decode_errors_on_truncated_payload() {
        let mut wire = Vec::new();
        write_frame(&mut wire, Opcode::Binary, &[1, 2, 3, 4]).unwrap();
        wire.truncate(wire.len() - 2);
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Io(_))
        ));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    proptest! {
        // Codec round-trip law: decoding the encoder's output reproduces the
        // payload for both data opcodes, across all three length encodings.
        #[test]
        fn encode_decode_round_trip(
            text in prop::bool::ANY,
            payload in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let opcode = if text { Opcode::Text } else { Opcode::Binary };
            let mut wire = Vec::new();
            write_frame(&mut wire, opcode, &payload).unwrap();
            let frame = read_frame(&mut Cursor::new(wire)).unwrap();
            prop_assert!(frame.fin);
            prop_assert_eq!(frame.opcode, opcode);
            prop_assert_eq!(frame.payload, payload);
        }

        // Masked input must round-trip too: mask then decode.
        #[test]
        fn masked_decode_round_trip(
            payload in prop::collection::vec(any::<u8>(), 0..2048),
            key in prop::array::uniform4(any::<u8>()),
        ) {
            let mut wire = vec![0x82];
            if payload.len() < 126 {
                wire.push(0x80 | payload.len() as u8);
            } else {
                wire.push(0x80 | 126);
                wire.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            }
            wire.extend_from_slice(&key);
            for (i, &b) in payload.iter().enumerate() {
                wire.push(b ^ key[i & 3]);
            }
            let frame = read_frame(&mut Cursor::new(wire)).unwrap();
            prop_assert_eq!(frame.payload, payload);
        }
    }
}
