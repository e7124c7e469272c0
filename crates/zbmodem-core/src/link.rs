//! Byte-link traits for modem communication.
//!
//! The [`ByteLink`] trait abstracts over the physical duplex link to a
//! radio modem. Implementations exist for serial ports (`zbmodem-transport`)
//! and in-memory mock links for testing (`zbmodem-test-harness`).
//!
//! The driver never holds the link whole: at start-up it splits the link
//! into a [`ByteSource`] (owned exclusively by the background reader task)
//! and a [`ByteSink`] (shared by senders behind the TX mutex). This is what
//! makes the frame engine full-duplex -- an in-flight receive never blocks
//! a transmit, and vice versa.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// The receive half of a modem link.
///
/// Exactly one consumer owns the source at a time. The driver's reader
/// task is that consumer; it drains bytes in arrival order and feeds them
/// to the frame decoder one at a time.
#[async_trait]
pub trait ByteSource: Send {
    /// Receive bytes from the modem into the provided buffer.
    ///
    /// Returns the number of bytes actually read (never 0). Will wait up
    /// to `timeout` for data to arrive; returns
    /// [`Error::Timeout`](crate::error::Error::Timeout) if no data is
    /// received within the deadline, and
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost) if
    /// the link has gone away.
    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// The transmit half of a modem link.
///
/// Concurrent senders serialize externally (the driver's TX mutex); an
/// implementation may assume calls do not overlap.
#[async_trait]
pub trait ByteSink: Send {
    /// Send raw bytes to the modem.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying link (serial TX buffer flushed, channel write
    /// accepted). The caller bounds the whole call with its own deadline.
    async fn send(&mut self, data: &[u8]) -> Result<()>;
}

/// A duplex byte link to a radio modem.
///
/// The only operation is splitting into independent receive and transmit
/// halves; everything else the driver needs is expressed on the halves.
pub trait ByteLink: Send {
    /// Consume the link, returning its receive and transmit halves.
    fn split(self: Box<Self>) -> (Box<dyn ByteSource>, Box<dyn ByteSink>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_objects_are_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<dyn ByteSource>();
        assert_send::<dyn ByteSink>();
        assert_send::<dyn ByteLink>();
    }
}
