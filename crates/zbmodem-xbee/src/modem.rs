//! XbeeModem -- the request/response driver over an XBee API-mode radio.
//!
//! This module ties the protocol engine ([`api`](crate::api),
//! [`commands`](crate::commands)) and the receive engine
//! ([`engine`](crate::engine)) to a [`ByteLink`] to produce a working
//! driver. It owns the TX half of the link behind a mutex, correlates
//! responses out of the shared frame buffer by `(type, id)` under a
//! deadline, and keeps the association tracker honest from the transmit
//! path.
//!
//! All high-level operations follow the same template: build the frame,
//! flush stale buffered responses with the same `(type, id)`, send, give
//! the radio a short grace period to start answering, then poll the
//! buffer until the response shows up or the deadline expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use zbmodem_core::{ByteLink, ByteSink, Error, ModemEvent, Result};

use crate::api::{encode_frame, frame_type, ApiFrame, NO_FRAME_ID};
use crate::association::AssociationTracker;
use crate::buffer::SharedFrameBuffer;
use crate::commands::{
    self, at_command, at_command_with_param, tx_request, RxPacket, AT_ASSOCIATION_INDICATION,
    AT_DESTINATION_HIGH, AT_DESTINATION_LOW, AT_DESTINATION_NODE, AT_DISASSOCIATE, AT_RSSI,
    BROADCAST_ADDRESS,
};
use crate::config::DriverConfig;
use crate::engine::{self, EngineHandles};

/// Grace period after sending a request, letting the radio start
/// answering before the first buffer poll.
const RESPONSE_GRACE: Duration = Duration::from_millis(5);

/// Interval between buffer polls while awaiting a response.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Grace and poll interval for TX-status correlation, slightly longer to
/// cover the radio's over-the-air round trip.
const TX_RESPONSE_GRACE: Duration = Duration::from_millis(7);
const TX_POLL_INTERVAL: Duration = Duration::from_millis(7);

/// Response deadline as a multiple of the configured timeout.
const RESPONSE_DEADLINE_FACTOR: u32 = 2;

/// Node-lookup (`DN`) deadline as a multiple of the configured timeout;
/// the lookup floods the network and can take far longer than a local
/// command.
const LOOKUP_DEADLINE_FACTOR: u32 = 10;

/// A connected XBee radio modem driven over its framed API protocol.
///
/// Constructed via [`XbeeBuilder`](crate::builder::XbeeBuilder). The
/// driver spawns its receive engine at build time and keeps it running
/// for the driver's lifetime; dropping the driver (or calling
/// [`close`](XbeeModem::close)) stops it.
pub struct XbeeModem {
    buffer: SharedFrameBuffer,
    sink: Arc<Mutex<Box<dyn ByteSink>>>,
    association: Arc<AssociationTracker>,
    config: Arc<DriverConfig>,
    event_tx: broadcast::Sender<ModemEvent>,
    engine: EngineHandles,
}

impl XbeeModem {
    /// Create a driver from its link and settings.
    ///
    /// This is called by [`XbeeBuilder`](crate::builder::XbeeBuilder);
    /// callers should use the builder API instead.
    pub(crate) fn new(link: Box<dyn ByteLink>, timeout: Duration, max_failed_transmits: u32) -> Self {
        let (source, sink) = link.split();
        let buffer = SharedFrameBuffer::new();
        let association = Arc::new(AssociationTracker::new());
        let config = Arc::new(DriverConfig::new(timeout, max_failed_transmits));
        let (event_tx, _) = broadcast::channel(256);

        let engine = engine::spawn_engine(
            source,
            buffer.clone(),
            association.clone(),
            config.clone(),
            event_tx.clone(),
        );

        XbeeModem {
            buffer,
            sink: Arc::new(Mutex::new(sink)),
            association,
            config,
            event_tx,
            engine,
        }
    }

    // -----------------------------------------------------------------
    // Configuration and events
    // -----------------------------------------------------------------

    /// Subscribe to driver events (buffered frames, association changes).
    pub fn subscribe(&self) -> broadcast::Receiver<ModemEvent> {
        self.event_tx.subscribe()
    }

    /// Set the single-step response timeout, clamped to `[1 ms, 5 s)`.
    pub fn set_timeout(&self, timeout: Duration) {
        self.config.set_timeout(timeout);
    }

    /// The current single-step response timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Set how many consecutive delivery failures force a disassociation,
    /// clamped to `1..=19`.
    pub fn set_max_failed_transmits(&self, max: u32) {
        self.config.set_max_failed_transmits(max);
    }

    /// Current consecutive delivery-failure count (diagnostics).
    pub fn failed_transmits(&self) -> u32 {
        self.association.failed_transmits()
    }

    /// Stop the receive engine. The driver is unusable afterwards; this
    /// also happens on drop.
    pub fn close(&self) {
        self.engine.abort();
    }

    // -----------------------------------------------------------------
    // Association
    // -----------------------------------------------------------------

    /// Advisory read of the association flag, with no modem round trip.
    pub fn is_associated(&self) -> bool {
        self.association.is_associated()
    }

    /// Whether the radio is associated with a network.
    ///
    /// A cached `true` is trusted (an unsolicited modem-status frame will
    /// clear it if the network drops); a cached `false` triggers a fresh
    /// `AI` exchange with the radio.
    pub async fn associated(&self) -> bool {
        if !self.association.is_associated() {
            self.verify_association().await;
        }
        self.association.is_associated()
    }

    /// Issue an `AI` (association indication) exchange and update the
    /// tracker from the result. Failures leave the flag not-associated.
    async fn verify_association(&self) {
        self.association.mark_disassociated();
        let request = at_command(AT_ASSOCIATION_INDICATION);
        let deadline = self.config.timeout() * RESPONSE_DEADLINE_FACTOR;
        match self.request(request, frame_type::AT_RESPONSE, deadline).await {
            Ok(response) => {
                match commands::parse_at_response(&response, AT_ASSOCIATION_INDICATION) {
                    Ok(value) if value.first() == Some(&0x00) => {
                        self.association.mark_associated();
                    }
                    Ok(value) => {
                        debug!(state = ?value.first(), "AI reports not associated");
                    }
                    Err(e) => debug!(error = %e, "bad AI response"),
                }
            }
            Err(e) => debug!(error = %e, "AI exchange failed"),
        }
    }

    /// Force the radio off its network with a `DA` exchange.
    ///
    /// The flag is cleared only on a confirmed zero-status response, and
    /// the disassociation event fires with the driver-initiated marker.
    async fn disassociate(&self) {
        let request = at_command(AT_DISASSOCIATE);
        let deadline = self.config.timeout() * RESPONSE_DEADLINE_FACTOR;
        match self.request(request, frame_type::AT_RESPONSE, deadline).await {
            Ok(response) => {
                if commands::parse_at_response(&response, AT_DISASSOCIATE).is_ok() {
                    self.association.mark_disassociated();
                    let _ = self
                        .event_tx
                        .send(ModemEvent::Disassociated { status: 0xFF });
                }
            }
            Err(e) => debug!(error = %e, "DA exchange failed"),
        }
    }

    // -----------------------------------------------------------------
    // Frame-level API
    // -----------------------------------------------------------------

    /// Serialize and transmit one frame.
    ///
    /// The TX lock acquisition and the write itself are each bounded by
    /// the configured timeout; the lock is always released, and a write
    /// cut short by the deadline leaves at most a partial frame on the
    /// wire, which the radio drops on checksum.
    pub async fn send_frame(&self, frame: &ApiFrame) -> Result<()> {
        let deadline = self.config.timeout();
        let mut sink = tokio::time::timeout(deadline, self.sink.lock())
            .await
            .map_err(|_| Error::Timeout)?;
        let bytes = encode_frame(frame);
        match tokio::time::timeout(deadline, sink.send(&bytes)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Remove and return the first buffered frame matching
    /// `(frame_type, id)`; an `id` of [`NO_FRAME_ID`] matches any id.
    pub async fn find_frame(&self, frame_type: u8, id: u8) -> Option<ApiFrame> {
        self.buffer
            .find_and_remove(frame_type, id, self.config.timeout())
            .await
    }

    /// Drop every buffered frame matching `(frame_type, id)`; returns the
    /// number removed.
    pub async fn flush_old_frames(&self, frame_type: u8, id: u8) -> usize {
        self.buffer.flush(frame_type, id, self.config.timeout()).await
    }

    /// Returns `true` if at least one decoded frame is waiting.
    pub async fn readable(&self) -> bool {
        self.buffer.is_readable(self.config.timeout()).await
    }

    /// Remove and return the oldest buffered frame.
    pub async fn oldest_frame(&self) -> Option<ApiFrame> {
        self.buffer.pop_oldest(self.config.timeout()).await
    }

    /// Send `request` and await the matching `(response_type, request.id)`
    /// frame within `deadline`.
    ///
    /// Stale buffered responses with the same correlation key are flushed
    /// first -- the deterministic frame-id policy makes that safe.
    async fn request(
        &self,
        request: ApiFrame,
        response_type: u8,
        deadline: Duration,
    ) -> Result<ApiFrame> {
        let (grace, poll) = if response_type == frame_type::TX_STATUS {
            (TX_RESPONSE_GRACE, TX_POLL_INTERVAL)
        } else {
            (RESPONSE_GRACE, POLL_INTERVAL)
        };
        let id = request.id;
        let lock_deadline = self.config.timeout();

        self.buffer.flush(response_type, id, lock_deadline).await;
        self.send_frame(&request).await?;
        tokio::time::sleep(grace).await;

        let started = Instant::now();
        loop {
            if let Some(response) = self
                .buffer
                .find_and_remove(response_type, id, lock_deadline)
                .await
            {
                return Ok(response);
            }
            if started.elapsed() >= deadline {
                return Err(Error::Timeout);
            }
            tokio::time::sleep(poll).await;
        }
    }

    // -----------------------------------------------------------------
    // High-level operations
    // -----------------------------------------------------------------

    /// Look up a node's 64-bit address by its node-identifier string.
    ///
    /// Issues `DN <ni>` to point the radio's destination registers at the
    /// named node, then reads the registers back with `DH` and `DL`. The
    /// lookup leg gets the long (10x) deadline; the register reads are
    /// local and get the normal 2x deadline.
    pub async fn get_address(&self, node_identifier: &str) -> Result<u64> {
        let timeout = self.config.timeout();

        let lookup = at_command_with_param(AT_DESTINATION_NODE, node_identifier.as_bytes());
        let response = self
            .request(
                lookup,
                frame_type::AT_RESPONSE,
                timeout * LOOKUP_DEADLINE_FACTOR,
            )
            .await?;
        if response.data.len() != 3 {
            return Err(Error::Protocol(format!(
                "unexpected DN response length {}",
                response.data.len()
            )));
        }
        commands::parse_at_response(&response, AT_DESTINATION_NODE)?;

        let response = self
            .request(
                at_command(AT_DESTINATION_HIGH),
                frame_type::AT_RESPONSE,
                timeout * RESPONSE_DEADLINE_FACTOR,
            )
            .await?;
        let high = commands::parse_address_word(&response, AT_DESTINATION_HIGH)?;

        let response = self
            .request(
                at_command(AT_DESTINATION_LOW),
                frame_type::AT_RESPONSE,
                timeout * RESPONSE_DEADLINE_FACTOR,
            )
            .await?;
        let low = commands::parse_address_word(&response, AT_DESTINATION_LOW)?;

        Ok(((high as u64) << 32) | low as u64)
    }

    /// Read the received signal strength of the last packet, in -dBm.
    pub async fn last_rssi(&self) -> Result<u8> {
        let response = self
            .request(
                at_command(AT_RSSI),
                frame_type::AT_RESPONSE,
                self.config.timeout() * RESPONSE_DEADLINE_FACTOR,
            )
            .await?;
        commands::parse_rssi(&response)
    }

    /// Transmit `payload` to the node at the given 64-bit address and
    /// await the radio's delivery report.
    ///
    /// Delivery success clears the consecutive-failure counter. A
    /// non-zero delivery status counts against the threshold and surfaces
    /// as [`Error::DeliveryFailed`]; when the threshold is reached the
    /// driver forces a `DA` disassociation, zeroes the counter, and
    /// returns [`Error::Disassociated`].
    pub async fn tx_addressed(&self, address: u64, payload: &[u8]) -> Result<()> {
        let request = tx_request(address, payload)?;
        let response = self
            .request(
                request,
                frame_type::TX_STATUS,
                self.config.timeout() * RESPONSE_DEADLINE_FACTOR,
            )
            .await?;
        let status = commands::parse_tx_status(&response)?;
        if status == 0x00 {
            self.association.record_delivery_success();
            return Ok(());
        }

        let failures = self.association.record_delivery_failure();
        warn!(status, failures, "transmit delivery failed");
        if failures >= self.config.max_failed_transmits() {
            self.disassociate().await;
            self.association.reset_failures();
            return Err(Error::Disassociated);
        }
        Err(Error::DeliveryFailed { status })
    }

    /// Transmit `payload` to every node in range.
    pub async fn tx_broadcast(&self, payload: &[u8]) -> Result<()> {
        self.tx_addressed(BROADCAST_ADDRESS, payload).await
    }

    /// Take the oldest received data packet, if any.
    ///
    /// Frames too short to carry the receive header are dropped with a
    /// warning and read as "nothing waiting".
    pub async fn rx_packet(&self) -> Option<RxPacket> {
        let frame = self
            .buffer
            .find_and_remove(frame_type::RECEIVE_PACKET, NO_FRAME_ID, self.config.timeout())
            .await?;
        match commands::parse_rx_packet(&frame) {
            Ok(packet) => Some(packet),
            Err(e) => {
                warn!(error = %e, "discarding malformed receive frame");
                None
            }
        }
    }
}

impl Drop for XbeeModem {
    fn drop(&mut self) {
        self.engine.abort();
    }
}

impl std::fmt::Debug for XbeeModem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XbeeModem")
            .field("timeout", &self.config.timeout())
            .field("associated", &self.association.is_associated())
            .finish_non_exhaustive()
    }
}
