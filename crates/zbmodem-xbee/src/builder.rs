//! XbeeBuilder -- fluent builder for constructing [`XbeeModem`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, timeout, and the transmit-failure threshold
//! before the link is opened and the receive engine spawned.
//!
//! # Example
//!
//! ```no_run
//! use zbmodem_xbee::builder::XbeeBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> zbmodem_core::Result<()> {
//! let modem = XbeeBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(115_200)
//!     .response_timeout(Duration::from_millis(500))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use zbmodem_core::{ByteLink, Error, Result};

use crate::config::{DEFAULT_FAILED_TRANSMITS, DEFAULT_TIMEOUT};
use crate::modem::XbeeModem;

/// Default serial baud rate (the radio's factory setting).
const DEFAULT_BAUD_RATE: u32 = 9_600;

/// Fluent builder for [`XbeeModem`].
///
/// All configuration has sensible defaults, so the simplest usage is:
///
/// ```ignore
/// let modem = XbeeBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
pub struct XbeeBuilder {
    serial_port: Option<String>,
    baud_rate: u32,
    response_timeout: Duration,
    max_failed_transmits: u32,
}

impl XbeeBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        XbeeBuilder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout: DEFAULT_TIMEOUT,
            max_failed_transmits: DEFAULT_FAILED_TRANSMITS,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the single-step response timeout (default: 1 s, clamped to
    /// `[1 ms, 5 s)` at build time).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set how many consecutive delivery failures force a disassociation
    /// (default: 5, clamped to `1..=19` at build time).
    pub fn max_failed_transmits(mut self, max: u32) -> Self {
        self.max_failed_transmits = max;
        self
    }

    /// Build an [`XbeeModem`] with a caller-provided link.
    ///
    /// This is the primary entry point for testing (pass a `MockLink`
    /// from `zbmodem-test-harness`) and for advanced use cases where the
    /// caller manages the link lifecycle directly. The driver's receive
    /// engine is spawned onto the current runtime.
    pub async fn build_with_link(self, link: Box<dyn ByteLink>) -> XbeeModem {
        XbeeModem::new(link, self.response_timeout, self.max_failed_transmits)
    }

    /// Build an [`XbeeModem`] over a serial link.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<XbeeModem> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let link = zbmodem_transport::SerialLink::open(port, self.baud_rate).await?;
        Ok(self.build_with_link(Box::new(link)).await)
    }
}

impl Default for XbeeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
