//! Association and transmit-liveness tracking.
//!
//! The tracker holds two pieces of advisory state: whether the modem is
//! currently associated with a network, and how many consecutive transmit
//! requests have failed. Both are written from multiple contexts -- the
//! reader task (unsolicited modem-status frames), the transmit path
//! (TX-status results), and the AT helpers (`AI`/`DA` exchanges) -- so
//! they are plain atomics read without locking.
//!
//! A stale "not associated" reading is self-healing: the next incoming
//! modem-status frame or explicit `AI` exchange corrects it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::api::modem_status;

/// Shared association state and consecutive-failure counter.
#[derive(Debug, Default)]
pub struct AssociationTracker {
    associated: AtomicBool,
    failed_transmits: AtomicU32,
}

impl AssociationTracker {
    /// Create a tracker in the not-associated state.
    pub fn new() -> Self {
        AssociationTracker {
            associated: AtomicBool::new(false),
            failed_transmits: AtomicU32::new(0),
        }
    }

    /// Advisory read of the association flag.
    pub fn is_associated(&self) -> bool {
        self.associated.load(Ordering::Relaxed)
    }

    /// Current consecutive transmit-failure count.
    pub fn failed_transmits(&self) -> u32 {
        self.failed_transmits.load(Ordering::Relaxed)
    }

    /// Apply an unsolicited modem-status code.
    ///
    /// Joined-network and coordinator-started both mean the radio can
    /// transmit, and also clear the failure counter; every other status
    /// marks the radio not associated. Returns the resulting association
    /// flag.
    pub fn on_modem_status(&self, status: u8) -> bool {
        match status {
            modem_status::JOINED_NETWORK | modem_status::COORDINATOR_STARTED => {
                self.associated.store(true, Ordering::Relaxed);
                self.failed_transmits.store(0, Ordering::Relaxed);
                true
            }
            _ => {
                self.associated.store(false, Ordering::Relaxed);
                false
            }
        }
    }

    /// Record a delivery-success TX status: the failure streak is over.
    pub fn record_delivery_success(&self) {
        self.failed_transmits.store(0, Ordering::Relaxed);
    }

    /// Record a delivery failure; returns the new consecutive count.
    pub fn record_delivery_failure(&self) -> u32 {
        self.failed_transmits.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Zero the consecutive-failure counter (after a forced
    /// disassociation).
    pub fn reset_failures(&self) {
        self.failed_transmits.store(0, Ordering::Relaxed);
    }

    /// Mark the modem associated (confirmed `AI` exchange).
    pub fn mark_associated(&self) {
        self.associated.store(true, Ordering::Relaxed);
    }

    /// Mark the modem not associated (confirmed `DA` exchange, or an
    /// `AI` probe that came back non-zero).
    pub fn mark_disassociated(&self) {
        self.associated.store(false, Ordering::Relaxed);
    }
}
