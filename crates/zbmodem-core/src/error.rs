//! Error types for zbmodem.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Link-layer, protocol-layer, and
//! delivery-layer errors are all captured here.

/// The error type for all zbmodem operations.
///
/// Variants cover the full range of failure modes encountered when driving
/// a radio modem over a byte-serial link: physical link failures, framing
/// and response decode errors, response timeouts, and transmit delivery
/// failures reported by the modem itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A link-level error (serial port open/configuration failure).
    #[error("link error: {0}")]
    Link(String),

    /// A protocol-level error (malformed or unexpected API frame content).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a response frame from the modem.
    ///
    /// This typically indicates the modem is powered off, the baud rate is
    /// wrong, or the requested remote node is unreachable. Lock-acquisition
    /// deadlines expiring inside the driver surface the same way.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a driver call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A transmit payload does not fit in a single API frame.
    #[error("payload of {len} bytes exceeds frame capacity of {max}")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Maximum payload the frame format can carry.
        max: usize,
    },

    /// The modem reported a non-zero transmit status for a TX request.
    ///
    /// The delivery failure has been counted against the consecutive
    /// failure threshold but the threshold has not been reached.
    #[error("transmit delivery failed with status 0x{status:02X}")]
    DeliveryFailed {
        /// The raw delivery status byte from the TX-status frame.
        status: u8,
    },

    /// Too many consecutive transmit failures; the driver has forced a
    /// disassociation from the network.
    #[error("disassociated after repeated transmit failures")]
    Disassociated,

    /// No connection to the modem has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the modem was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_link() {
        let e = Error::Link("port busy".into());
        assert_eq!(e.to_string(), "link error: port busy");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("bad checksum".into());
        assert_eq!(e.to_string(), "protocol error: bad checksum");
    }

    #[test]
    fn error_display_timeout() {
        let e = Error::Timeout;
        assert_eq!(e.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_payload_too_large() {
        let e = Error::PayloadTooLarge { len: 200, max: 141 };
        assert_eq!(
            e.to_string(),
            "payload of 200 bytes exceeds frame capacity of 141"
        );
    }

    #[test]
    fn error_display_delivery_failed() {
        let e = Error::DeliveryFailed { status: 0x04 };
        assert_eq!(e.to_string(), "transmit delivery failed with status 0x04");
    }

    #[test]
    fn error_display_disassociated() {
        let e = Error::Disassociated;
        assert_eq!(
            e.to_string(),
            "disassociated after repeated transmit failures"
        );
    }

    #[test]
    fn error_display_not_connected() {
        let e = Error::NotConnected;
        assert_eq!(e.to_string(), "not connected");
    }

    #[test]
    fn error_display_connection_lost() {
        let e = Error::ConnectionLost;
        assert_eq!(e.to_string(), "connection lost");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        // io::Error is Send + Sync, so our Error should be too.
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<u32> = Ok(42);
        match ok {
            Ok(val) => assert_eq!(val, 42),
            Err(_) => panic!("expected Ok"),
        }

        let err: Result<u32> = Err(Error::Timeout);
        assert!(err.is_err());
    }
}
