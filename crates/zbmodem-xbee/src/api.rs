//! XBee API frame encoder and byte-at-a-time decoder.
//!
//! The XBee API mode 1 protocol (unescaped) carries commands and events
//! between host and radio as length-prefixed, checksummed binary frames.
//! This module handles the pure byte-level encoding and decoding of those
//! frames.
//!
//! # Frame format
//!
//! ```text
//! 0x7E <len_hi> <len_lo> <type> [<id>] <data>... <checksum>
//! ```
//!
//! - Start delimiter: one `0x7E` byte
//! - `len`: big-endian count of the bytes between the length field and the
//!   checksum (type, optional id, data)
//! - `type`: API frame type byte
//! - `id`: correlation id, present only for the types in
//!   [`has_frame_id`]; response frames echo the id of the request
//! - `data`: variable-length payload
//! - `checksum`: `0xFF - ((type + id + sum of data) & 0xFF)`
//!
//! Decoding is a single state machine fed one byte at a time, so it can be
//! driven straight off a byte stream with constant work per byte and no
//! per-byte allocation. Garbage before a start delimiter is skipped, and a
//! frame that fails its checksum or exceeds [`MAX_FRAME_LENGTH`] is
//! silently dropped -- on a noisy serial line these are routine, and the
//! request/response deadline upstream handles the loss.

use bytes::{BufMut, BytesMut};
use tracing::trace;

/// Start delimiter byte at the head of every API frame.
pub const START_DELIMITER: u8 = 0x7E;

/// Maximum payload bytes a decoded frame may carry.
///
/// Frames whose advertised length exceeds this are dropped during decode;
/// the bound must match the peer's configuration.
pub const MAX_FRAME_LENGTH: usize = 150;

/// The "no id" / wildcard frame id.
///
/// Stored as the id of decoded frames whose type carries no id byte, and
/// accepted by buffer lookups as a match-any wildcard.
pub const NO_FRAME_ID: u8 = 0xFF;

/// API frame type constants.
pub mod frame_type {
    /// 64-bit addressed transmit request (host to radio).
    pub const TX_REQUEST: u8 = 0x00;
    /// Local AT command (host to radio).
    pub const AT_COMMAND: u8 = 0x08;
    /// Remote AT command request (host to radio).
    pub const REMOTE_AT_COMMAND: u8 = 0x17;
    /// Local AT command response (radio to host).
    pub const AT_RESPONSE: u8 = 0x88;
    /// Transmit status (radio to host, one per TX request).
    pub const TX_STATUS: u8 = 0x89;
    /// Unsolicited modem status event (radio to host).
    pub const MODEM_STATUS: u8 = 0x8A;
    /// Received data packet (radio to host).
    pub const RECEIVE_PACKET: u8 = 0x90;
    /// Remote AT command response (radio to host).
    pub const REMOTE_AT_RESPONSE: u8 = 0x97;
}

/// Modem-status codes carried in the first data byte of a
/// [`frame_type::MODEM_STATUS`] frame.
pub mod modem_status {
    /// The radio joined a network.
    pub const JOINED_NETWORK: u8 = 0x02;
    /// The radio left (or was dropped from) its network.
    pub const DISASSOCIATED: u8 = 0x03;
    /// The radio started as network coordinator.
    pub const COORDINATOR_STARTED: u8 = 0x06;
}

/// Returns `true` if frames of this type carry a correlation-id byte
/// between the type byte and the payload.
pub fn has_frame_id(frame_type: u8) -> bool {
    matches!(frame_type, 0x00 | 0x08 | 0x17 | 0x88 | 0x89 | 0x97)
}

/// A decoded API frame.
///
/// This is the protocol-level representation of a single API message,
/// whether it is a command from the host or a response/event from the
/// radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFrame {
    /// API frame type byte.
    pub frame_type: u8,
    /// Correlation id; [`NO_FRAME_ID`] for types without an id byte.
    pub id: u8,
    /// Payload data bytes (may be empty).
    pub data: Vec<u8>,
}

impl ApiFrame {
    /// Build a frame of an id-bearing type.
    pub fn new(frame_type: u8, id: u8, data: Vec<u8>) -> Self {
        ApiFrame {
            frame_type,
            id,
            data,
        }
    }

    /// Compute this frame's wire checksum.
    ///
    /// The id byte participates only for id-bearing frame types.
    pub fn checksum(&self) -> u8 {
        let mut sum = self.frame_type as u32;
        if has_frame_id(self.frame_type) {
            sum += self.id as u32;
        }
        for &b in &self.data {
            sum += b as u32;
        }
        0xFF - (sum & 0xFF) as u8
    }
}

/// Encode an [`ApiFrame`] into raw bytes ready for transmission.
///
/// Produces the full wire format including start delimiter, length field,
/// and checksum. The id byte is emitted only for id-bearing frame types.
///
/// # Example
///
/// ```
/// use zbmodem_xbee::api::{encode_frame, ApiFrame};
///
/// // Local AT command "AI" (association indication), id = 'A' + 'I'
/// let frame = ApiFrame::new(0x08, 0x8A, vec![b'A', b'I']);
/// assert_eq!(
///     encode_frame(&frame),
///     vec![0x7E, 0x00, 0x04, 0x08, 0x8A, 0x41, 0x49, 0xE3]
/// );
/// ```
pub fn encode_frame(frame: &ApiFrame) -> Vec<u8> {
    let with_id = has_frame_id(frame.frame_type);
    let len = frame.data.len() + 1 + with_id as usize;
    let mut buf = BytesMut::with_capacity(3 + len + 1);
    buf.put_u8(START_DELIMITER);
    buf.put_u16(len as u16);
    buf.put_u8(frame.frame_type);
    if with_id {
        buf.put_u8(frame.id);
    }
    buf.put_slice(&frame.data);
    buf.put_u8(frame.checksum());
    buf.to_vec()
}

/// Decoder states, advanced one received byte at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for a start delimiter; every other byte is discarded.
    Idle,
    /// Expecting the high byte of the length field.
    LenHi,
    /// Expecting the low byte of the length field.
    LenLo,
    /// Expecting the frame type byte.
    Type,
    /// Expecting the correlation-id byte (id-bearing types only).
    Id,
    /// Accumulating payload bytes, then the checksum.
    Body,
}

/// Incremental API frame decoder.
///
/// Feed bytes in arrival order via [`push`](FrameDecoder::push); a
/// completed, checksum-valid frame is returned from the call that consumed
/// its checksum byte. Invalid input (bad checksum, oversize length, lost
/// synchronization) silently resets the decoder to its idle state -- the
/// next start delimiter resynchronizes it.
///
/// The decoder owns a single in-progress frame. The payload buffer is
/// reserved up front, so pushing a byte never allocates.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    frame_type: u8,
    id: u8,
    /// Declared payload length: wire length minus type and id. Kept as the
    /// original 16-bit wire arithmetic so a short wire length (< 2) wraps
    /// into an oversize value and is dropped in `Body`.
    length: u16,
    rcvd: usize,
    data: Vec<u8>,
}

impl FrameDecoder {
    /// Create a decoder in the idle (searching) state.
    pub fn new() -> Self {
        FrameDecoder {
            state: DecodeState::Idle,
            frame_type: 0,
            id: NO_FRAME_ID,
            length: 0,
            rcvd: 0,
            data: Vec::with_capacity(MAX_FRAME_LENGTH),
        }
    }

    /// Returns `true` if the decoder is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Idle
    }

    /// Advance the decoder by one received byte.
    ///
    /// Returns `Some(frame)` when `byte` completed a checksum-valid frame,
    /// `None` otherwise.
    pub fn push(&mut self, byte: u8) -> Option<ApiFrame> {
        match self.state {
            DecodeState::Idle => {
                if byte == START_DELIMITER {
                    self.state = DecodeState::LenHi;
                }
                None
            }
            DecodeState::LenHi => {
                self.length = (byte as u16) << 8;
                self.state = DecodeState::LenLo;
                None
            }
            DecodeState::LenLo => {
                // Subtract the type and id bytes; for types without an id
                // byte, `Type` adds one back.
                self.length = (self.length | byte as u16).wrapping_sub(2);
                self.rcvd = 0;
                self.data.clear();
                self.state = DecodeState::Type;
                None
            }
            DecodeState::Type => {
                self.frame_type = byte;
                if has_frame_id(byte) {
                    self.state = DecodeState::Id;
                } else {
                    // No id byte on the wire: the slot counted off the
                    // length above is really the first data byte.
                    self.id = NO_FRAME_ID;
                    self.length = self.length.wrapping_add(1);
                    self.state = DecodeState::Body;
                }
                None
            }
            DecodeState::Id => {
                self.id = byte;
                self.state = DecodeState::Body;
                None
            }
            DecodeState::Body => {
                let len = self.length as usize;
                if len > MAX_FRAME_LENGTH {
                    trace!(len, "dropping oversize frame");
                    self.state = DecodeState::Idle;
                    None
                } else if self.rcvd < len {
                    self.data.push(byte);
                    self.rcvd += 1;
                    None
                } else {
                    // This byte is the checksum.
                    let mut sum = self.frame_type as u32;
                    if has_frame_id(self.frame_type) {
                        sum += self.id as u32;
                    }
                    for &b in &self.data {
                        sum += b as u32;
                    }
                    self.state = DecodeState::Idle;
                    if (sum + byte as u32) & 0xFF == 0xFF {
                        let data = std::mem::replace(
                            &mut self.data,
                            Vec::with_capacity(MAX_FRAME_LENGTH),
                        );
                        Some(ApiFrame {
                            frame_type: self.frame_type,
                            id: self.id,
                            data,
                        })
                    } else {
                        trace!(
                            frame_type = self.frame_type,
                            "dropping frame with bad checksum"
                        );
                        None
                    }
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed a byte slice through the decoder, collecting completed frames.
    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<ApiFrame> {
        bytes.iter().filter_map(|&b| decoder.push(b)).collect()
    }

    // ---------------------------------------------------------------
    // Checksum
    // ---------------------------------------------------------------

    #[test]
    fn checksum_at_command() {
        // AT "AI": 0x08 + 0x8A + 'A' + 'I' = 0x11C -> 0x1C; 0xFF - 0x1C = 0xE3
        let frame = ApiFrame::new(frame_type::AT_COMMAND, 0x8A, vec![b'A', b'I']);
        assert_eq!(frame.checksum(), 0xE3);
    }

    #[test]
    fn checksum_excludes_id_for_no_id_types() {
        let frame = ApiFrame {
            frame_type: frame_type::MODEM_STATUS,
            id: NO_FRAME_ID,
            data: vec![0x02],
        };
        // 0x8A + 0x02 = 0x8C; 0xFF - 0x8C = 0x73 (no id contribution)
        assert_eq!(frame.checksum(), 0x73);
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_at_command() {
        let frame = ApiFrame::new(frame_type::AT_COMMAND, 0x8A, vec![b'A', b'I']);
        assert_eq!(
            encode_frame(&frame),
            vec![0x7E, 0x00, 0x04, 0x08, 0x8A, 0x41, 0x49, 0xE3]
        );
    }

    #[test]
    fn encode_no_id_type_omits_id_byte() {
        let frame = ApiFrame {
            frame_type: frame_type::MODEM_STATUS,
            id: NO_FRAME_ID,
            data: vec![0x02],
        };
        assert_eq!(encode_frame(&frame), vec![0x7E, 0x00, 0x02, 0x8A, 0x02, 0x73]);
    }

    #[test]
    fn encode_empty_payload() {
        let frame = ApiFrame::new(frame_type::TX_STATUS, 0x42, vec![]);
        // len = 2 (type + id); checksum = 0xFF - (0x89 + 0x42)
        assert_eq!(
            encode_frame(&frame),
            vec![0x7E, 0x00, 0x02, 0x89, 0x42, 0xFF - 0xCB]
        );
    }

    // ---------------------------------------------------------------
    // Decoder state machine
    // ---------------------------------------------------------------

    #[test]
    fn decode_at_response() {
        let mut decoder = FrameDecoder::new();
        let frame = ApiFrame::new(
            frame_type::AT_RESPONSE,
            0x8A,
            vec![b'A', b'I', 0x00, 0x00],
        );
        let frames = decode_all(&mut decoder, &encode_frame(&frame));
        assert_eq!(frames, vec![frame]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn decode_no_id_frame_gets_wildcard_id() {
        let mut decoder = FrameDecoder::new();
        let frame = ApiFrame {
            frame_type: frame_type::MODEM_STATUS,
            id: NO_FRAME_ID,
            data: vec![0x02],
        };
        let frames = decode_all(&mut decoder, &encode_frame(&frame));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, NO_FRAME_ID);
        assert_eq!(frames[0].data, vec![0x02]);
    }

    #[test]
    fn idle_ignores_everything_but_delimiter() {
        let mut decoder = FrameDecoder::new();
        for b in [0x00, 0x42, 0xFF, 0x7D, 0x88] {
            assert!(decoder.push(b).is_none());
            assert!(decoder.is_idle());
        }
        decoder.push(START_DELIMITER);
        assert!(!decoder.is_idle());
    }

    #[test]
    fn resync_after_garbage() {
        let mut decoder = FrameDecoder::new();
        let frame = ApiFrame::new(frame_type::AT_RESPONSE, 0x91, vec![b'D', b'B', 0x00, 0x28]);
        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend_from_slice(&encode_frame(&frame));
        let frames = decode_all(&mut decoder, &bytes);
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn bad_checksum_drops_frame_and_resyncs() {
        let mut decoder = FrameDecoder::new();
        let frame = ApiFrame::new(frame_type::AT_RESPONSE, 0x8A, vec![b'A', b'I', 0x00, 0x00]);
        let mut bytes = encode_frame(&frame);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(decode_all(&mut decoder, &bytes).is_empty());
        assert!(decoder.is_idle());

        // A following valid frame still decodes.
        let frames = decode_all(&mut decoder, &encode_frame(&frame));
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn corrupting_any_byte_never_yields_a_frame() {
        let frame = ApiFrame::new(frame_type::TX_STATUS, 0x33, vec![0x00]);
        let encoded = encode_frame(&frame);
        // Skip the start delimiter: corrupting it only delays sync.
        for i in 1..encoded.len() {
            let mut bytes = encoded.clone();
            bytes[i] ^= 0x01;
            let mut decoder = FrameDecoder::new();
            let frames = decode_all(&mut decoder, &bytes);
            assert!(
                frames.is_empty(),
                "byte {i} corrupted but a frame was produced"
            );
        }
    }

    #[test]
    fn oversize_length_dropped() {
        let mut decoder = FrameDecoder::new();
        // Advertise 500 payload bytes: dropped on the first body byte.
        let bytes = [0x7E, 0x01, 0xF6, 0x88, 0x01, 0xAA];
        assert!(decode_all(&mut decoder, &bytes).is_empty());
        assert!(decoder.is_idle());
    }

    #[test]
    fn short_wire_length_wraps_and_drops() {
        let mut decoder = FrameDecoder::new();
        // Wire length 1 for an id-bearing type: 1 - 2 wraps to 0xFFFF,
        // which trips the oversize drop.
        let bytes = [0x7E, 0x00, 0x01, 0x88, 0x01, 0x00];
        assert!(decode_all(&mut decoder, &bytes).is_empty());
        assert!(decoder.is_idle());
    }

    #[test]
    fn max_length_frame_round_trips() {
        let mut decoder = FrameDecoder::new();
        let frame = ApiFrame::new(
            frame_type::AT_RESPONSE,
            0x10,
            (0..MAX_FRAME_LENGTH as u8).collect(),
        );
        let frames = decode_all(&mut decoder, &encode_frame(&frame));
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn back_to_back_frames() {
        let mut decoder = FrameDecoder::new();
        let a = ApiFrame::new(frame_type::TX_STATUS, 0x01, vec![0x00]);
        let b = ApiFrame::new(frame_type::AT_RESPONSE, 0x02, vec![b'D', b'L', 0x00]);
        let mut bytes = encode_frame(&a);
        bytes.extend_from_slice(&encode_frame(&b));
        let frames = decode_all(&mut decoder, &bytes);
        assert_eq!(frames, vec![a, b]);
    }

    #[test]
    fn delimiter_inside_body_is_plain_data() {
        // API mode 1 does not escape 0x7E inside a frame.
        let mut decoder = FrameDecoder::new();
        let frame = ApiFrame::new(frame_type::AT_RESPONSE, 0x05, vec![0x7E, 0x7E]);
        let frames = decode_all(&mut decoder, &encode_frame(&frame));
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn round_trip_all_inbound_types() {
        for (frame_type, id) in [
            (frame_type::AT_RESPONSE, 0x11),
            (frame_type::TX_STATUS, 0x22),
            (frame_type::REMOTE_AT_RESPONSE, 0x33),
            (frame_type::MODEM_STATUS, NO_FRAME_ID),
            (frame_type::RECEIVE_PACKET, NO_FRAME_ID),
        ] {
            let frame = ApiFrame {
                frame_type,
                id,
                data: vec![0x01, 0x02, 0x03],
            };
            let mut decoder = FrameDecoder::new();
            let frames = decode_all(&mut decoder, &encode_frame(&frame));
            assert_eq!(frames, vec![frame]);
        }
    }

    #[test]
    fn has_frame_id_table() {
        for t in [0x00u8, 0x08, 0x17, 0x88, 0x89, 0x97] {
            assert!(has_frame_id(t), "0x{t:02X} should carry an id");
        }
        for t in [0x8Au8, 0x90, 0x01, 0xFF] {
            assert!(!has_frame_id(t), "0x{t:02X} should not carry an id");
        }
    }
}
