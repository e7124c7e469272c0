//! The receive engine: reader and coordinator tasks.
//!
//! Two background tasks turn the raw byte stream into buffered frames:
//!
//! 1. The **reader task** exclusively owns the [`ByteSource`]. It drains
//!    bytes in arrival order and feeds the frame decoder one byte at a
//!    time. Modem-status frames are handled inline -- they update the
//!    association tracker and emit an event, and never reach the buffer.
//!    Every other completed frame is sent into a capacity-1 staging
//!    channel.
//! 2. The **coordinator task** drains the staging channel, publishes each
//!    frame to the shared frame buffer under its lock (dropping the oldest
//!    buffered frame when full), and emits the frame-buffered alert event.
//!
//! The capacity-1 channel is the single staging slot: while the
//! coordinator has not taken the previous frame, the reader's `send`
//! suspends, so no further bytes are consumed from the link until the
//! hand-off completes. Back-pressure from a slow consumer therefore shows
//! up as a deterministic stall of the byte stream, never as corruption of
//! a frame in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use zbmodem_core::{ByteSource, Error, ModemEvent};

use crate::api::{frame_type, ApiFrame, FrameDecoder};
use crate::association::AssociationTracker;
use crate::buffer::SharedFrameBuffer;
use crate::config::DriverConfig;

/// Chunk size for draining the byte source.
const READ_CHUNK: usize = 64;

/// How long one source read waits before the reader loops back around.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Multiple of the configured timeout the coordinator spends acquiring
/// the buffer lock per attempt.
const HANDOFF_DEADLINE_FACTOR: u32 = 5;

/// Handles to the two engine tasks.
///
/// Aborting the handles tears the engine down; the staging channel closes
/// with whichever side goes first, and the peer exits its loop.
#[derive(Debug)]
pub(crate) struct EngineHandles {
    reader: JoinHandle<()>,
    coordinator: JoinHandle<()>,
}

impl EngineHandles {
    /// Stop both tasks.
    pub(crate) fn abort(&self) {
        self.reader.abort();
        self.coordinator.abort();
    }
}

/// Spawn the reader and coordinator tasks for a driver instance.
pub(crate) fn spawn_engine(
    source: Box<dyn ByteSource>,
    buffer: SharedFrameBuffer,
    association: Arc<AssociationTracker>,
    config: Arc<DriverConfig>,
    event_tx: broadcast::Sender<ModemEvent>,
) -> EngineHandles {
    let (staging_tx, staging_rx) = mpsc::channel::<ApiFrame>(1);

    let reader = tokio::spawn(reader_loop(
        source,
        staging_tx,
        association,
        event_tx.clone(),
    ));
    let coordinator = tokio::spawn(coordinator_loop(staging_rx, buffer, config, event_tx));

    EngineHandles {
        reader,
        coordinator,
    }
}

/// The main loop of the reader task.
async fn reader_loop(
    mut source: Box<dyn ByteSource>,
    staging_tx: mpsc::Sender<ApiFrame>,
    association: Arc<AssociationTracker>,
    event_tx: broadcast::Sender<ModemEvent>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        match source.recv(&mut buf, READ_TIMEOUT).await {
            Ok(n) => {
                for &byte in &buf[..n] {
                    let Some(frame) = decoder.push(byte) else {
                        continue;
                    };
                    if frame.frame_type == frame_type::MODEM_STATUS {
                        intercept_modem_status(&frame, &association, &event_tx);
                    } else if staging_tx.send(frame).await.is_err() {
                        debug!("staging channel closed, exiting reader loop");
                        return;
                    }
                }
            }
            Err(Error::Timeout) => {
                // Nothing arrived this interval; keep listening.
            }
            Err(Error::NotConnected) | Err(Error::ConnectionLost) => {
                warn!("modem link went away, exiting reader loop");
                return;
            }
            Err(e) => {
                debug!(error = %e, "source read error");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Apply a modem-status frame inline: update association state and emit
/// the matching event. Status frames never enter the frame buffer.
fn intercept_modem_status(
    frame: &ApiFrame,
    association: &AssociationTracker,
    event_tx: &broadcast::Sender<ModemEvent>,
) {
    // An empty status frame reads as status 0x00 (hardware reset), which
    // lands on the not-associated side like any unknown status.
    let status = frame.data.first().copied().unwrap_or(0x00);
    if association.on_modem_status(status) {
        debug!(status, "modem status: associated");
        let _ = event_tx.send(ModemEvent::Associated { status });
    } else {
        debug!(status, "modem status: not associated");
        let _ = event_tx.send(ModemEvent::Disassociated { status });
    }
}

/// The main loop of the coordinator task.
async fn coordinator_loop(
    mut staging_rx: mpsc::Receiver<ApiFrame>,
    buffer: SharedFrameBuffer,
    config: Arc<DriverConfig>,
    event_tx: broadcast::Sender<ModemEvent>,
) {
    while let Some(frame) = staging_rx.recv().await {
        let frame_type = frame.frame_type;
        let id = frame.id;

        // The staging slot stays occupied (and the reader suspended) until
        // this publish succeeds, so a contended buffer lock stalls the
        // byte stream rather than losing the frame.
        loop {
            let deadline = config.timeout() * HANDOFF_DEADLINE_FACTOR;
            if buffer.push(frame.clone(), deadline).await {
                break;
            }
            warn!(frame_type, id, "buffer lock busy past hand-off deadline, retrying");
        }

        let _ = event_tx.send(ModemEvent::FrameBuffered { frame_type, id });
    }
    debug!("staging channel closed, exiting coordinator loop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{encode_frame, modem_status, NO_FRAME_ID};
    use zbmodem_core::ByteLink;
    use zbmodem_test_harness::mock_link;

    struct Engine {
        buffer: SharedFrameBuffer,
        association: Arc<AssociationTracker>,
        event_rx: broadcast::Receiver<ModemEvent>,
        handles: EngineHandles,
        handle: zbmodem_test_harness::MockLinkHandle,
    }

    fn start_engine() -> Engine {
        let (link, handle) = mock_link();
        let (source, _sink) = Box::new(link).split();
        let buffer = SharedFrameBuffer::new();
        let association = Arc::new(AssociationTracker::new());
        let config = Arc::new(DriverConfig::default());
        let (event_tx, event_rx) = broadcast::channel(64);
        let handles = spawn_engine(
            source,
            buffer.clone(),
            association.clone(),
            config,
            event_tx,
        );
        Engine {
            buffer,
            association,
            event_rx,
            handles,
            handle,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn injected_frame_reaches_buffer() {
        let mut engine = start_engine();
        let frame = ApiFrame::new(frame_type::AT_RESPONSE, 0x8A, vec![b'A', b'I', 0x00, 0x00]);
        engine.handle.inject(&encode_frame(&frame));
        settle().await;

        assert_eq!(engine.buffer.len().await, 1);
        let buffered = engine
            .buffer
            .find_and_remove(frame_type::AT_RESPONSE, 0x8A, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(buffered, frame);

        match engine.event_rx.try_recv().unwrap() {
            ModemEvent::FrameBuffered { frame_type: t, id } => {
                assert_eq!(t, frame_type::AT_RESPONSE);
                assert_eq!(id, 0x8A);
            }
            other => panic!("expected FrameBuffered, got {other:?}"),
        }
        engine.handles.abort();
    }

    #[tokio::test]
    async fn modem_status_intercepted_inline() {
        let mut engine = start_engine();
        let status = ApiFrame {
            frame_type: frame_type::MODEM_STATUS,
            id: NO_FRAME_ID,
            data: vec![modem_status::JOINED_NETWORK],
        };
        engine.handle.inject(&encode_frame(&status));
        settle().await;

        // Never buffered, but the association flag flipped and an event fired.
        assert_eq!(engine.buffer.len().await, 0);
        assert!(engine.association.is_associated());
        assert_eq!(
            engine.event_rx.try_recv().unwrap(),
            ModemEvent::Associated {
                status: modem_status::JOINED_NETWORK
            }
        );
        engine.handles.abort();
    }

    #[tokio::test]
    async fn disassociation_status_clears_flag() {
        let engine = start_engine();
        engine.association.mark_associated();
        let status = ApiFrame {
            frame_type: frame_type::MODEM_STATUS,
            id: NO_FRAME_ID,
            data: vec![modem_status::DISASSOCIATED],
        };
        engine.handle.inject(&encode_frame(&status));
        settle().await;

        assert!(!engine.association.is_associated());
        engine.handles.abort();
    }

    #[tokio::test]
    async fn garbage_then_frame_lands_exactly_once() {
        let engine = start_engine();
        let frame = ApiFrame::new(frame_type::TX_STATUS, 0x42, vec![0x00]);
        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend_from_slice(&encode_frame(&frame));
        engine.handle.inject(&bytes);
        settle().await;

        assert_eq!(engine.buffer.len().await, 1);
        engine.handles.abort();
    }

    #[tokio::test]
    async fn overflow_keeps_newest_frames_in_order() {
        let engine = start_engine();
        let total = crate::buffer::MAX_INCOMING_FRAMES as u8 + 2;
        for i in 0..total {
            let frame = ApiFrame::new(frame_type::AT_RESPONSE, i, vec![i]);
            engine.handle.inject(&encode_frame(&frame));
        }
        settle().await;

        assert_eq!(engine.buffer.len().await, crate::buffer::MAX_INCOMING_FRAMES);
        // The two oldest frames were dropped.
        for i in 0..2 {
            assert!(
                engine
                    .buffer
                    .find_and_remove(frame_type::AT_RESPONSE, i, Duration::from_millis(100))
                    .await
                    .is_none(),
                "frame {i} should have been dropped"
            );
        }
        // The rest are recoverable in insertion order.
        for i in 2..total {
            let frame = engine.buffer.pop_oldest(Duration::from_millis(100)).await;
            assert_eq!(frame.unwrap().id, i);
        }
        engine.handles.abort();
    }

    #[tokio::test]
    async fn frame_split_across_reads_still_decodes() {
        let engine = start_engine();
        let frame = ApiFrame::new(frame_type::AT_RESPONSE, 0x86, vec![b'D', b'B', 0x00, 0x30]);
        let bytes = encode_frame(&frame);
        let (head, tail) = bytes.split_at(3);
        engine.handle.inject(head);
        settle().await;
        engine.handle.inject(tail);
        settle().await;

        assert_eq!(engine.buffer.len().await, 1);
        engine.handles.abort();
    }
}
