//! Asynchronous modem event types.
//!
//! Events are emitted by the driver through a `tokio::sync::broadcast`
//! channel when the modem's state changes or a new frame lands in the
//! incoming buffer. Applications subscribe to these events to react to
//! association changes and inbound traffic without polling.

/// An event emitted by the driver when modem state changes.
///
/// Subscribe via the driver's `subscribe()` method. Events are delivered
/// on a best-effort basis through a bounded broadcast channel; slow
/// consumers may miss events under heavy inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemEvent {
    /// A decoded frame was published to the incoming frame buffer.
    FrameBuffered {
        /// API frame type of the buffered frame.
        frame_type: u8,
        /// Correlation id of the buffered frame (`0xFF` if the type
        /// carries none).
        id: u8,
    },

    /// The modem reported it has joined a network (or started as
    /// coordinator) via an unsolicited modem-status frame.
    Associated {
        /// The raw modem-status code (`0x02` joined, `0x06` coordinator
        /// started).
        status: u8,
    },

    /// The modem reported it is no longer associated, or the driver
    /// forced a disassociation after repeated transmit failures.
    Disassociated {
        /// The raw modem-status code, or `0xFF` when the driver itself
        /// initiated the disassociation.
        status: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_cloneable_and_comparable() {
        let e = ModemEvent::FrameBuffered {
            frame_type: 0x88,
            id: 0x8A,
        };
        assert_eq!(e.clone(), e);
        assert_ne!(
            e,
            ModemEvent::Associated { status: 0x02 },
        );
    }
}
