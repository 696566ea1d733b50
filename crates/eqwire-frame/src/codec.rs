use bytes::{BufMut, Bytes, BytesMut};
use eqwire_transport::LINK_MTU;

use crate::error::{FrameError, Result};

/// Frame header: magic (3) + command (1) + flag (1) + request id (2) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Magic bytes: "EQW" (0x45 0x51 0x57).
pub const MAGIC: [u8; 3] = [0x45, 0x51, 0x57];

/// Largest frame that fits in one link datagram.
pub const MAX_FRAME_SIZE: usize = LINK_MTU;

/// Largest payload that fits in one frame: 243 bytes.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command id selecting the operation.
    pub command: u8,
    /// Command-specific sub-operation selector.
    pub flag: u8,
    /// Correlation token; 0 means no correlation requested.
    pub request_id: u16,
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: u8, flag: u8, request_id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            flag,
            request_id,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode this frame into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(self.command, self.flag, self.request_id, &self.payload, dst)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────┬──────┬────────────┬──────────────────┐
/// │ Magic (3B) │ Command │ Flag │ Request id │ Payload          │
/// │ "EQW"      │ (1B)    │ (1B) │ (2B BE)    │ (0..=243 bytes)  │
/// └────────────┴─────────┴──────┴────────────┴──────────────────┘
/// ```
pub fn encode_frame(
    command: u8,
    flag: u8,
    request_id: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u8(command);
    dst.put_u8(flag);
    dst.put_u16(request_id);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one datagram into a frame.
///
/// The payload is everything after the header; datagram boundaries delimit
/// frames, so there is no length field to validate.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::TooShort {
            len: src.len(),
            header: HEADER_SIZE,
        });
    }

    if src[..3] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    Ok(Frame {
        command: src[3],
        flag: src[4],
        request_id: u16::from_be_bytes([src[5], src[6]]),
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"lamp on";

        encode_frame(0x01, 0x02, 0xBEEF, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.command, 0x01);
        assert_eq!(frame.flag, 0x02);
        assert_eq!(frame.request_id, 0xBEEF);
        assert_eq!(frame.payload.as_ref(), payload);
    }

    #[test]
    fn test_wire_layout() {
        let mut buf = BytesMut::new();
        encode_frame(0x11, 0x00, 0x0102, &[0xAA], &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x45u8, 0x51, 0x57, 0x11, 0x00, 0x01, 0x02, 0xAA]
        );
    }

    #[test]
    fn test_max_payload_roundtrip() {
        let payload = vec![0x5A; MAX_PAYLOAD_SIZE];
        let mut buf = BytesMut::new();
        encode_frame(0xC8, 0xFF, u16::MAX, &payload, &mut buf).unwrap();
        assert_eq!(buf.len(), MAX_FRAME_SIZE);

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.payload.len(), MAX_PAYLOAD_SIZE);
        assert_eq!(frame.request_id, u16::MAX);
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        let result = encode_frame(1, 0, 0, &[0u8; MAX_PAYLOAD_SIZE + 1], &mut buf);
        assert_eq!(
            result,
            Err(FrameError::PayloadTooLarge {
                size: 244,
                max: 243
            })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_too_short() {
        let result = decode_frame(&[0x45, 0x51, 0x57, 0x01, 0x00, 0x00]);
        assert_eq!(result, Err(FrameError::TooShort { len: 6, header: 7 }));
        assert!(decode_frame(&[]).is_err());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let result = decode_frame(&[0x45, 0x51, 0x58, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(result, Err(FrameError::InvalidMagic));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(0, 0, 0, b"", &mut buf).unwrap();

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.command, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_encode_and_wire_size() {
        let frame = Frame::new(0x06, 0x01, 7, Bytes::from_static(b"87%"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 3);

        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(decode_frame(&buf).unwrap(), frame);
    }
}
