//! Mock byte link for deterministic testing of the driver.
//!
//! [`MockLink`] implements the [`ByteLink`] trait over in-memory queues.
//! Two mechanisms feed the driver's receive path:
//!
//! - **Expectations**: pre-loaded request/response pairs. When the driver
//!   sends bytes matching the next expected request, the paired response
//!   bytes become readable. This drives request/response exchanges (AT
//!   commands, transmit status) without real hardware.
//! - **Injection**: the [`MockLinkHandle`] can push arbitrary bytes into
//!   the receive side at any time, standing in for unsolicited traffic
//!   (modem status events, received data packets, line noise).
//!
//! # Example
//!
//! ```
//! use zbmodem_test_harness::mock_link;
//!
//! let (link, handle) = mock_link();
//! // Pre-load: when the driver sends this request, return this response.
//! handle.expect(&[0x7E, 0x00, 0x04, 0x08, 0x8A, 0x41, 0x49, 0xE3],
//!               &[0x7E, 0x00, 0x06, 0x88, 0x8A, 0x41, 0x49, 0x00, 0x00, 0x63]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use zbmodem_core::{ByteLink, ByteSink, ByteSource, Error, Result};

/// A pre-loaded request/response pair for the mock link.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes made readable when the matching request is received.
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be read by the driver.
    inbound: VecDeque<u8>,
    /// Log of all byte slices sent through the link.
    sent_log: Vec<Vec<u8>>,
    /// Whether the link is "connected".
    connected: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    /// Woken whenever inbound bytes land or the link state changes.
    arrival: Notify,
}

/// A mock [`ByteLink`] for testing the driver without hardware.
///
/// Create with [`mock_link`], which also returns the test-side
/// [`MockLinkHandle`].
#[derive(Debug)]
pub struct MockLink {
    shared: Arc<Shared>,
}

/// Test-side control handle for a [`MockLink`].
///
/// The handle stays valid after the link has been split and handed to the
/// driver.
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    shared: Arc<Shared>,
}

/// Create a connected mock link and its control handle.
pub fn mock_link() -> (MockLink, MockLinkHandle) {
    let shared = Arc::new(Shared {
        state: Mutex::new(MockState {
            connected: true,
            ..MockState::default()
        }),
        arrival: Notify::new(),
    });
    (
        MockLink {
            shared: shared.clone(),
        },
        MockLinkHandle { shared },
    )
}

impl MockLinkHandle {
    /// Add an expected request/response pair.
    ///
    /// When the driver sends bytes equal to `request`, `response` becomes
    /// readable on the receive side. Expectations are consumed in order;
    /// a send that does not match the next expectation fails.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        let mut state = self.shared.state.lock().unwrap();
        state.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Make `bytes` readable on the receive side immediately, as if the
    /// radio had sent them unsolicited.
    pub fn inject(&self, bytes: &[u8]) {
        let mut state = self.shared.state.lock().unwrap();
        state.inbound.extend(bytes.iter().copied());
        drop(state);
        self.shared.arrival.notify_one();
    }

    /// Return a copy of all data sent through this link, one element per
    /// `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().unwrap().sent_log.clone()
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.shared.state.lock().unwrap().expectations.len()
    }

    /// Set the connected state. When `false`, reads report
    /// [`Error::ConnectionLost`] and sends report [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.shared.state.lock().unwrap().connected = connected;
        self.shared.arrival.notify_one();
    }
}

impl ByteLink for MockLink {
    fn split(self: Box<Self>) -> (Box<dyn ByteSource>, Box<dyn ByteSink>) {
        (
            Box::new(MockSource {
                shared: self.shared.clone(),
            }),
            Box::new(MockSink {
                shared: self.shared,
            }),
        )
    }
}

/// Receive half of a [`MockLink`].
struct MockSource {
    shared: Arc<Shared>,
}

#[async_trait]
impl ByteSource for MockSource {
    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeup before checking state, so bytes landing
            // in between are not missed.
            let notified = self.shared.arrival.notified();
            {
                let mut state = self.shared.state.lock().unwrap();
                if !state.connected {
                    return Err(Error::ConnectionLost);
                }
                if !state.inbound.is_empty() {
                    let n = buf.len().min(state.inbound.len());
                    for slot in buf[..n].iter_mut() {
                        *slot = state.inbound.pop_front().unwrap();
                    }
                    return Ok(n);
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Err(Error::Timeout);
            }
        }
    }
}

/// Transmit half of a [`MockLink`].
struct MockSink {
    shared: Arc<Shared>,
}

#[async_trait]
impl ByteSink for MockSink {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        // Record what was sent.
        state.sent_log.push(data.to_vec());

        // Match against the next expectation.
        let Some(expectation) = state.expectations.pop_front() else {
            return Err(Error::Protocol("no more expectations in mock link".into()));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                expectation.request, data
            )));
        }
        state.inbound.extend(expectation.response.iter().copied());
        drop(state);
        self.shared.arrival.notify_one();
        Ok(())
    }
}
