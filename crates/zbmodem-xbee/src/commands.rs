//! API frame builders and response parsers.
//!
//! This module provides functions to construct the outbound frames the
//! driver sends (local AT commands, addressed transmit requests) and to
//! parse the corresponding response frames from the radio.
//!
//! All functions are pure -- they produce or consume [`ApiFrame`]s without
//! performing any I/O. The driver is responsible for sending the frames
//! over the link and feeding matched response frames back into the
//! parsers.
//!
//! # Frame-id policy
//!
//! Frames built here get a deterministic correlation id derived from their
//! content: AT commands use `(cmd[0] + cmd[1]) & 0xFF`, TX requests use
//! the payload byte sum. A deterministic id makes it safe to flush stale
//! buffered responses for the same request before sending, without an id
//! allocator.

use zbmodem_core::{Error, Result};

use crate::api::{frame_type, ApiFrame, MAX_FRAME_LENGTH};

// ---------------------------------------------------------------
// AT command mnemonics
// ---------------------------------------------------------------

/// Association indication: reads the radio's join status.
pub const AT_ASSOCIATION_INDICATION: [u8; 2] = *b"AI";

/// Force disassociation from the current network.
pub const AT_DISASSOCIATE: [u8; 2] = *b"DA";

/// Received signal strength of the last packet, in -dBm.
pub const AT_RSSI: [u8; 2] = *b"DB";

/// Destination node lookup by node-identifier string.
pub const AT_DESTINATION_NODE: [u8; 2] = *b"DN";

/// Destination address high 32 bits.
pub const AT_DESTINATION_HIGH: [u8; 2] = *b"DH";

/// Destination address low 32 bits.
pub const AT_DESTINATION_LOW: [u8; 2] = *b"DL";

/// Bytes of TX-request framing ahead of the payload: 8-byte destination
/// address plus one options byte.
pub const TX_REQUEST_OVERHEAD: usize = 9;

/// Largest payload a single addressed TX request can carry.
pub const MAX_TX_PAYLOAD: usize = MAX_FRAME_LENGTH - TX_REQUEST_OVERHEAD;

/// The 16-bit broadcast address, zero-extended on the wire to the 64-bit
/// form `00 00 00 00 00 00 FF FF`.
pub const BROADCAST_ADDRESS: u64 = 0xFFFF;

// ---------------------------------------------------------------
// Frame builders
// ---------------------------------------------------------------

/// Build a local AT command frame with no parameter.
///
/// The id is `(cmd[0] + cmd[1]) & 0xFF`, so the radio's response echoes
/// an id fully determined by the mnemonic.
pub fn at_command(cmd: [u8; 2]) -> ApiFrame {
    at_command_with_param(cmd, &[])
}

/// Build a local AT command frame carrying a parameter value.
pub fn at_command_with_param(cmd: [u8; 2], param: &[u8]) -> ApiFrame {
    let mut data = Vec::with_capacity(2 + param.len());
    data.extend_from_slice(&cmd);
    data.extend_from_slice(param);
    ApiFrame {
        frame_type: frame_type::AT_COMMAND,
        id: cmd[0].wrapping_add(cmd[1]),
        data,
    }
}

/// Build a 64-bit addressed TX request frame.
///
/// Layout: 8-byte big-endian destination address, one options byte
/// (0x00 -- no options), then the payload. The id is the payload byte sum,
/// which the radio echoes in the matching TX-status frame.
///
/// Returns [`Error::PayloadTooLarge`] if `payload` exceeds
/// [`MAX_TX_PAYLOAD`]; no frame is built.
pub fn tx_request(address: u64, payload: &[u8]) -> Result<ApiFrame> {
    if payload.len() > MAX_TX_PAYLOAD {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_TX_PAYLOAD,
        });
    }
    let mut data = Vec::with_capacity(TX_REQUEST_OVERHEAD + payload.len());
    data.extend_from_slice(&address.to_be_bytes());
    data.push(0x00);
    data.extend_from_slice(payload);

    let id = payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));
    Ok(ApiFrame {
        frame_type: frame_type::TX_REQUEST,
        id,
        data,
    })
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Parse an AT command response, checking the echoed mnemonic and the
/// status byte.
///
/// Response data layout: `[cmd0, cmd1, status, value...]`. Returns the
/// value bytes on a zero (OK) status.
pub fn parse_at_response<'a>(frame: &'a ApiFrame, cmd: [u8; 2]) -> Result<&'a [u8]> {
    if frame.data.len() < 3 || frame.data[0] != cmd[0] || frame.data[1] != cmd[1] {
        return Err(Error::Protocol(format!(
            "response does not echo AT {}{}",
            cmd[0] as char, cmd[1] as char
        )));
    }
    if frame.data[2] != 0x00 {
        return Err(Error::Protocol(format!(
            "AT {}{} returned status 0x{:02X}",
            cmd[0] as char, cmd[1] as char, frame.data[2]
        )));
    }
    Ok(&frame.data[3..])
}

/// Parse one half of the 64-bit destination address from a `DH` or `DL`
/// response.
///
/// The radio answers with a 4-byte big-endian value; anything else is a
/// protocol error.
pub fn parse_address_word(frame: &ApiFrame, cmd: [u8; 2]) -> Result<u32> {
    if frame.data.len() != 7 {
        return Err(Error::Protocol(format!(
            "unexpected AT {}{} response length {}",
            cmd[0] as char,
            cmd[1] as char,
            frame.data.len()
        )));
    }
    let value = parse_at_response(frame, cmd)?;
    Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
}

/// Parse the last-hop RSSI from a `DB` response.
///
/// The value layout this modem firmware produces is a 6-byte response
/// with the echoed mnemonic at offsets 2..4 and the reading in the final
/// byte.
pub fn parse_rssi(frame: &ApiFrame) -> Result<u8> {
    if frame.data.len() == 6
        && frame.data[2] == AT_RSSI[0]
        && frame.data[3] == AT_RSSI[1]
        && frame.data[4] == 0x00
    {
        Ok(frame.data[5])
    } else {
        Err(Error::Protocol("malformed DB response".into()))
    }
}

/// Extract the delivery status byte from a TX-status frame.
pub fn parse_tx_status(frame: &ApiFrame) -> Result<u8> {
    frame
        .data
        .first()
        .copied()
        .ok_or_else(|| Error::Protocol("empty TX-status frame".into()))
}

/// A received data packet: the sender's 64-bit address and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket {
    /// 64-bit source address of the sending node.
    pub source: u64,
    /// Application payload bytes.
    pub payload: Vec<u8>,
}

/// Offset of the payload inside a receive-packet frame: 8-byte source
/// address, 16-bit network address, one options byte.
const RX_PAYLOAD_OFFSET: usize = 11;

/// Parse a receive-packet (0x90) frame into source address and payload.
///
/// Frames too short to carry the addressing header are rejected.
pub fn parse_rx_packet(frame: &ApiFrame) -> Result<RxPacket> {
    if frame.data.len() < RX_PAYLOAD_OFFSET {
        return Err(Error::Protocol(format!(
            "receive frame of {} bytes is too short",
            frame.data.len()
        )));
    }
    let mut addr = [0u8; 8];
    addr.copy_from_slice(&frame.data[..8]);
    Ok(RxPacket {
        source: u64::from_be_bytes(addr),
        payload: frame.data[RX_PAYLOAD_OFFSET..].to_vec(),
    })
}
