//! Transport implementations for zbmodem.
//!
//! This crate provides concrete implementations of the
//! [`ByteLink`](zbmodem_core::ByteLink) trait from `zbmodem-core`:
//!
//! - [`SerialLink`]: USB virtual COM ports and physical UART connections
//!   to the radio modem
//!
//! # Example
//!
//! ```no_run
//! use zbmodem_transport::SerialLink;
//!
//! # async fn example() -> zbmodem_core::Result<()> {
//! // Open the modem's serial port
//! let link = SerialLink::open("/dev/ttyUSB0", 9_600).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialLink, StopBits};
