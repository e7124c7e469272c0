//! # zbmodem -- Async XBee Radio Modem Driver
//!
//! `zbmodem` is an asynchronous Rust library for driving XBee
//! ZigBee/802.15.4 radio modems over their framed API protocol (API
//! mode 1, unescaped) on a byte-serial link. It turns the raw byte
//! stream into a request/response interface: send AT commands and
//! addressed transmits, receive correlated responses, delivery reports,
//! inbound data packets, and association events.
//!
//! ## Quick Start
//!
//! Add `zbmodem` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! zbmodem = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a modem and send a broadcast:
//!
//! ```no_run
//! use zbmodem::xbee::XbeeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let modem = XbeeBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .baud_rate(9_600)
//!         .build()
//!         .await?;
//!
//!     if modem.associated().await {
//!         modem.tx_broadcast(b"hello mesh").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                   | Purpose                                      |
//! |-------------------------|----------------------------------------------|
//! | `zbmodem-core`          | Byte-link traits, events, errors             |
//! | `zbmodem-transport`     | Serial link implementation                   |
//! | `zbmodem-xbee`          | XBee API-1 frame engine and driver           |
//! | `zbmodem-test-harness`  | In-memory mock link for tests                |
//! | **`zbmodem`**           | This facade crate -- re-exports everything   |
//!
//! ## Receive path
//!
//! A background reader task decodes the byte stream one byte at a time;
//! completed frames are handed through a single staging slot to a
//! coordinator task, which publishes them into a bounded frame buffer
//! (oldest dropped on overflow). Modem-status frames never reach the
//! buffer -- they update association state inline and surface as
//! [`ModemEvent`]s:
//!
//! ```no_run
//! use zbmodem::ModemEvent;
//! # async fn example(modem: &zbmodem::xbee::XbeeModem) {
//! let mut events = modem.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ModemEvent::FrameBuffered { frame_type, .. } => {
//!             println!("frame 0x{frame_type:02X} waiting");
//!         }
//!         ModemEvent::Associated { .. } => println!("joined network"),
//!         ModemEvent::Disassociated { .. } => println!("left network"),
//!     }
//! }
//! # }
//! ```

pub use zbmodem_core::*;

/// XBee API-mode protocol backend.
///
/// Provides [`XbeeModem`](xbee::XbeeModem) and
/// [`XbeeBuilder`](xbee::XbeeBuilder) for driving XBee radio modems over
/// the framed API protocol.
pub mod xbee {
    pub use zbmodem_xbee::*;
}

/// Byte-link transports (serial).
pub mod transport {
    pub use zbmodem_transport::*;
}
