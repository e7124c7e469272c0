//! XBee API-mode protocol backend for zbmodem.
//!
//! This crate implements the Digi XBee framed API protocol (API mode 1,
//! unescaped) used by XBee ZigBee/802.15.4 radio modems. It provides:
//!
//! - **Frame codec** ([`api`]) -- encode API frames and decode them one
//!   byte at a time with checksum validation and resynchronization.
//! - **Command builders** ([`commands`]) -- construct correctly-formatted
//!   AT command and transmit-request frames with deterministic
//!   correlation ids, and parse the corresponding responses.
//! - **Frame buffer** ([`buffer`]) -- the bounded, drop-oldest store of
//!   decoded frames between the receive engine and consumers.
//! - **Receive engine** ([`engine`]) -- the reader and coordinator tasks
//!   bridging the byte stream into the frame buffer, with modem-status
//!   interception.
//! - **Association tracking** ([`association`]) -- advisory network-join
//!   state and the consecutive transmit-failure counter.
//! - **XbeeModem** ([`modem`]) -- the request/response driver tying the
//!   protocol engine to a [`ByteLink`](zbmodem_core::ByteLink).
//! - **XbeeBuilder** ([`builder`]) -- fluent builder for constructing
//!   `XbeeModem` instances with configurable timeout and failure
//!   threshold.
//!
//! # Example
//!
//! ```
//! use zbmodem_xbee::api::{encode_frame, FrameDecoder};
//! use zbmodem_xbee::commands::at_command;
//!
//! // Build an "association indication" AT command
//! let frame = at_command(*b"AI");
//! assert_eq!(
//!     encode_frame(&frame),
//!     vec![0x7E, 0x00, 0x04, 0x08, 0x8A, 0x41, 0x49, 0xE3]
//! );
//!
//! // Feed the encoding back through the decoder
//! let mut decoder = FrameDecoder::new();
//! let decoded = encode_frame(&frame)
//!     .iter()
//!     .find_map(|&b| decoder.push(b))
//!     .unwrap();
//! assert_eq!(decoded, frame);
//! ```

pub mod api;
pub mod association;
pub mod buffer;
pub mod builder;
pub mod commands;
mod config;
mod engine;
pub mod modem;

pub use builder::XbeeBuilder;
pub use commands::RxPacket;
pub use modem::XbeeModem;
