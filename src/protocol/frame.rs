//! Fixed-size frame codec.
//!
//! Every message in either direction is exactly [`FRAME_SIZE`] bytes: a
//! 64-byte little-endian header followed by a zero-padded payload region.
//! The frame size is the whole framing mechanism; there is no length
//! prefix, checksum or compression.
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//!      0     8  correlation_id   i64
//!      8    16  guest_uuid       raw bytes
//!     24     8  guest_id         i64
//!     32     4  is_req           i32 (0/1)
//!     36     4  is_resp          i32 (0/1)
//!     40     4  need_response    i32 (0/1)
//!     44     4  req_length       i32
//!     48     4  resp_length      i32
//!     52     4  command_id       i32
//!     56     4  sub_command      i32
//!     60     4  reserved
//!     64  4032  payload (zero-filled)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identifiers::{CorrelationId, GuestId};

// ============================================================================
// Constants
// ============================================================================

/// Size of every frame on the wire.
pub const FRAME_SIZE: usize = 4096;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 64;

/// Bytes available for payload after the header.
pub const PAYLOAD_CAPACITY: usize = FRAME_SIZE - HEADER_SIZE;

// ============================================================================
// FrameHeader
// ============================================================================

/// Decoded frame header.
///
/// Flag fields keep their raw `i32` value so a header can be echoed back
/// verbatim; use the predicate methods to interpret them. Nothing enforces
/// that exactly one of `is_req`/`is_resp` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// Echoed unchanged in a response.
    pub correlation_id: CorrelationId,
    /// Guest the frame concerns.
    pub guest_uuid: Uuid,
    /// Numeric guest identifier.
    pub guest_id: GuestId,
    /// 1 if this is a request.
    pub is_req: i32,
    /// 1 if this is a response.
    pub is_resp: i32,
    /// 1 if the requester wants a response frame.
    pub need_response: i32,
    /// Request payload length in bytes.
    pub req_length: i32,
    /// Response payload length in bytes.
    pub resp_length: i32,
    /// Selects the dispatch handler.
    pub command_id: i32,
    /// Handler-specific sub-selector.
    pub sub_command: i32,
    /// Unused, carried verbatim.
    pub reserved: i32,
}

impl FrameHeader {
    /// Returns `true` if the request flag is set.
    #[inline]
    #[must_use]
    pub const fn is_request(&self) -> bool {
        self.is_req == 1
    }

    /// Returns `true` if the response flag is set.
    #[inline]
    #[must_use]
    pub const fn is_response(&self) -> bool {
        self.is_resp == 1
    }

    /// Returns `true` if this is a request asking for a response frame.
    #[inline]
    #[must_use]
    pub const fn wants_response(&self) -> bool {
        self.is_req == 1 && self.need_response == 1
    }

    /// Payload length this header declares.
    ///
    /// `req_length` for requests, `resp_length` for responses, zero when
    /// neither flag is set. The request flag wins when both are set.
    #[inline]
    #[must_use]
    pub const fn payload_length(&self) -> i32 {
        if self.is_request() {
            self.req_length
        } else if self.is_response() {
            self.resp_length
        } else {
            0
        }
    }

    fn read(reader: &mut FrameReader<'_>) -> Self {
        Self {
            correlation_id: CorrelationId::new(reader.take_i64()),
            guest_uuid: Uuid::from_bytes(reader.take_array()),
            guest_id: GuestId::new(reader.take_i64()),
            is_req: reader.take_i32(),
            is_resp: reader.take_i32(),
            need_response: reader.take_i32(),
            req_length: reader.take_i32(),
            resp_length: reader.take_i32(),
            command_id: reader.take_i32(),
            sub_command: reader.take_i32(),
            reserved: reader.take_i32(),
        }
    }

    fn write(&self, writer: &mut FrameWriter<'_>) {
        writer.put_i64(self.correlation_id.as_i64());
        writer.put_bytes(self.guest_uuid.as_bytes());
        writer.put_i64(self.guest_id.as_i64());
        writer.put_i32(self.is_req);
        writer.put_i32(self.is_resp);
        writer.put_i32(self.need_response);
        writer.put_i32(self.req_length);
        writer.put_i32(self.resp_length);
        writer.put_i32(self.command_id);
        writer.put_i32(self.sub_command);
        writer.put_i32(self.reserved);
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A header plus the payload it declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Fixed header fields.
    pub header: FrameHeader,
    /// Payload bytes, without the zero padding.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Decodes one wire frame. See [`decode`].
    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }

    /// Encodes this frame. See [`encode`].
    #[inline]
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.header, &self.payload)
    }

    /// Builds a host-originated request that asks for no response.
    #[must_use]
    pub fn request(guest_uuid: Uuid, command_id: i32, sub_command: i32) -> Self {
        Self {
            header: FrameHeader {
                correlation_id: CorrelationId::generate(),
                guest_uuid,
                guest_id: GuestId::SYNTHETIC,
                is_req: 1,
                is_resp: 0,
                need_response: 0,
                req_length: 0,
                resp_length: 0,
                command_id,
                sub_command,
                reserved: 0,
            },
            payload: Vec::new(),
        }
    }

    /// Builds the response to this frame carrying `payload`.
    ///
    /// The header is reused with the flags flipped. `resp_length` is the
    /// payload length plus one terminator byte, which the guest agent
    /// expects; the terminator is the first byte of zero padding.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] if payload and terminator do not fit.
    pub fn response(&self, payload: Vec<u8>) -> Result<Self> {
        let capacity = PAYLOAD_CAPACITY - 1;
        if payload.len() > capacity {
            return Err(Error::payload_too_large(payload.len(), capacity));
        }

        let header = FrameHeader {
            is_req: 0,
            is_resp: 1,
            req_length: 0,
            resp_length: (payload.len() + 1) as i32,
            ..self.header
        };

        Ok(Self { header, payload })
    }

    /// Payload as text, with trailing terminator bytes stripped.
    #[must_use]
    pub fn payload_text(&self) -> Cow<'_, str> {
        let end = self
            .payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        String::from_utf8_lossy(&self.payload[..end])
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Decodes exactly one [`FRAME_SIZE`]-byte record.
///
/// The payload is sliced using [`FrameHeader::payload_length`].
///
/// # Errors
///
/// [`Error::Framing`] if `bytes` is not exactly one frame long, or the
/// declared payload length is negative or exceeds [`PAYLOAD_CAPACITY`].
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() != FRAME_SIZE {
        return Err(Error::framing(format!(
            "expected {FRAME_SIZE} bytes, got {}",
            bytes.len()
        )));
    }

    let mut reader = FrameReader::new(bytes);
    let header = FrameHeader::read(&mut reader);

    let declared = header.payload_length();
    let len = usize::try_from(declared)
        .ok()
        .filter(|&len| len <= PAYLOAD_CAPACITY)
        .ok_or_else(|| {
            Error::framing(format!(
                "payload length {declared} outside 0..={PAYLOAD_CAPACITY}"
            ))
        })?;

    let payload = bytes[HEADER_SIZE..HEADER_SIZE + len].to_vec();

    Ok(Frame { header, payload })
}

/// Encodes a header and payload into one [`FRAME_SIZE`]-byte record.
///
/// The header is written verbatim; the caller sets `req_length` or
/// `resp_length` to match `payload`. The remainder is zero-filled.
///
/// # Errors
///
/// [`Error::PayloadTooLarge`] if `payload` exceeds [`PAYLOAD_CAPACITY`].
pub fn encode(header: &FrameHeader, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > PAYLOAD_CAPACITY {
        return Err(Error::payload_too_large(payload.len(), PAYLOAD_CAPACITY));
    }

    let mut buf = Vec::with_capacity(FRAME_SIZE);
    let mut writer = FrameWriter::new(&mut buf);
    header.write(&mut writer);
    writer.put_bytes(payload);
    writer.pad_to(FRAME_SIZE);

    Ok(buf)
}

// ============================================================================
// FrameWriter / FrameReader
// ============================================================================

/// Appends little-endian fields to a buffer.
struct FrameWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> FrameWriter<'a> {
    fn new(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn pad_to(&mut self, len: usize) {
        self.buf.resize(len, 0);
    }
}

/// Reads little-endian header fields.
///
/// Callers check the buffer holds a full header before reading.
struct FrameReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> FrameReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn take_array<const N: usize>(&mut self) -> [u8; N] {
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + N]);
        self.cursor += N;
        arr
    }

    fn take_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take_array())
    }

    fn take_i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take_array())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn sample_request(payload: &[u8]) -> Frame {
        Frame {
            header: FrameHeader {
                correlation_id: CorrelationId::new(0x0102_0304_0506_0708),
                guest_uuid: Uuid::parse_str("ba13a19a-c0c1-4fef-9346-915ed3b98341")
                    .expect("valid uuid"),
                guest_id: GuestId::new(77),
                is_req: 1,
                is_resp: 0,
                need_response: 1,
                req_length: payload.len() as i32,
                resp_length: 0,
                command_id: 4,
                sub_command: 1,
                reserved: 0,
            },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(FRAME_SIZE, 4096);
        assert_eq!(HEADER_SIZE, 64);
        assert_eq!(PAYLOAD_CAPACITY, 4032);
    }

    #[test]
    fn test_encode_is_always_full_frame() {
        let bytes = sample_request(b"").encode().expect("encode");
        assert_eq!(bytes.len(), FRAME_SIZE);

        let bytes = sample_request(b"hello").encode().expect("encode");
        assert_eq!(bytes.len(), FRAME_SIZE);
        assert!(bytes[HEADER_SIZE + 5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_header_field_offsets() {
        let bytes = sample_request(b"abc").encode().expect("encode");

        assert_eq!(&bytes[0..8], &0x0102_0304_0506_0708_i64.to_le_bytes());
        assert_eq!(bytes[8], 0xba);
        assert_eq!(&bytes[24..32], &77_i64.to_le_bytes());
        assert_eq!(&bytes[32..36], &1_i32.to_le_bytes());
        assert_eq!(&bytes[36..40], &0_i32.to_le_bytes());
        assert_eq!(&bytes[40..44], &1_i32.to_le_bytes());
        assert_eq!(&bytes[44..48], &3_i32.to_le_bytes());
        assert_eq!(&bytes[52..56], &4_i32.to_le_bytes());
        assert_eq!(&bytes[56..60], &1_i32.to_le_bytes());
        assert_eq!(&bytes[64..67], b"abc");
    }

    #[test]
    fn test_decode_rejects_wrong_size() {
        let err = decode(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));

        let err = decode(&[0u8; FRAME_SIZE + 1]).unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let mut frame = sample_request(b"");
        frame.header.req_length = -1;
        let bytes = frame.encode().expect("encode");
        assert!(decode(&bytes).unwrap_err().is_framing_error());

        frame.header.req_length = (PAYLOAD_CAPACITY + 1) as i32;
        let bytes = frame.encode().expect("encode");
        assert!(decode(&bytes).unwrap_err().is_framing_error());
    }

    #[test]
    fn test_decode_tolerates_flag_combinations() {
        let mut frame = sample_request(b"xy");

        // Neither flag: no payload, no failure.
        frame.header.is_req = 0;
        frame.header.is_resp = 0;
        let decoded = decode(&frame.encode().expect("encode")).expect("decode");
        assert!(decoded.payload.is_empty());

        // Both flags: request length wins.
        frame.header.is_req = 1;
        frame.header.is_resp = 1;
        frame.header.resp_length = 100;
        let decoded = decode(&frame.encode().expect("encode")).expect("decode");
        assert_eq!(decoded.payload, b"xy");
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![b'a'; PAYLOAD_CAPACITY + 1];
        let err = encode(&FrameHeader::default(), &payload).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len, capacity }
            if len == PAYLOAD_CAPACITY + 1 && capacity == PAYLOAD_CAPACITY));

        let payload = vec![b'a'; PAYLOAD_CAPACITY];
        assert!(encode(&FrameHeader::default(), &payload).is_ok());
    }

    #[test]
    fn test_response_flips_flags_and_adds_terminator() {
        let request = sample_request(b"ignored");
        let response = request.response(b"42".to_vec()).expect("response");

        assert_eq!(response.header.is_req, 0);
        assert_eq!(response.header.is_resp, 1);
        assert_eq!(response.header.req_length, 0);
        assert_eq!(response.header.resp_length, 3);
        assert_eq!(response.header.correlation_id, request.header.correlation_id);
        assert_eq!(response.header.guest_uuid, request.header.guest_uuid);
        assert_eq!(response.header.command_id, 4);
        assert_eq!(response.header.need_response, 1);

        let decoded = decode(&response.encode().expect("encode")).expect("decode");
        assert_eq!(decoded.payload, b"42\0");
        assert_eq!(decoded.payload_text(), "42");
    }

    #[test]
    fn test_response_capacity_reserves_terminator() {
        let request = sample_request(b"");
        assert!(request.response(vec![b'x'; PAYLOAD_CAPACITY - 1]).is_ok());
        assert!(request.response(vec![b'x'; PAYLOAD_CAPACITY]).is_err());
    }

    #[test]
    fn test_request_builder() {
        let uuid = Uuid::new_v4();
        let frame = Frame::request(uuid, 11, 1);
        assert!(frame.header.is_request());
        assert!(!frame.header.is_response());
        assert!(!frame.header.wants_response());
        assert_eq!(frame.header.guest_id, GuestId::SYNTHETIC);
        assert_eq!(frame.header.guest_uuid, uuid);
        assert_eq!(frame.header.req_length, 0);
        assert_eq!(frame.header.resp_length, 0);
        assert_ne!(frame.header.correlation_id.as_i64(), 0);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            correlation in any::<i64>(),
            uuid in any::<[u8; 16]>(),
            guest in any::<i64>(),
            need_response in 0i32..=1,
            command_id in any::<i32>(),
            sub_command in any::<i32>(),
            reserved in any::<i32>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=PAYLOAD_CAPACITY),
        ) {
            let header = FrameHeader {
                correlation_id: CorrelationId::new(correlation),
                guest_uuid: Uuid::from_bytes(uuid),
                guest_id: GuestId::new(guest),
                is_req: 1,
                is_resp: 0,
                need_response,
                req_length: payload.len() as i32,
                resp_length: 0,
                command_id,
                sub_command,
                reserved,
            };

            let bytes = encode(&header, &payload).expect("encode");
            prop_assert_eq!(bytes.len(), FRAME_SIZE);

            let decoded = decode(&bytes).expect("decode");
            prop_assert_eq!(decoded.header, header);
            prop_assert_eq!(decoded.payload, payload);
        }
    }
}
