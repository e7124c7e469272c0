//! Bounded buffer of decoded incoming frames.
//!
//! Completed frames wait here between the receive engine and the
//! application callers that correlate them. The buffer is a FIFO of at
//! most [`MAX_INCOMING_FRAMES`] frames; when full, the oldest frame is
//! dropped to make room. Consumers remove frames by `(type, id)` match or
//! in arrival order.
//!
//! [`SharedFrameBuffer`] is the concurrent form: every operation acquires
//! the buffer lock with a caller-supplied deadline, and a deadline expiry
//! reads as "no match" / "not readable" rather than an error -- callers
//! treat contention as a transient and retry on their own schedule.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::api::{ApiFrame, NO_FRAME_ID};

/// Maximum number of decoded frames held for consumers.
///
/// When a new frame arrives with the buffer full, the oldest buffered
/// frame is discarded.
pub const MAX_INCOMING_FRAMES: usize = 10;

/// Returns `true` if `frame` matches the `(frame_type, id)` query.
///
/// An `id` of [`NO_FRAME_ID`] is a wildcard and matches any stored id.
fn matches(frame: &ApiFrame, frame_type: u8, id: u8) -> bool {
    frame.frame_type == frame_type && (id == NO_FRAME_ID || frame.id == id)
}

/// Bounded FIFO of decoded frames, oldest first.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    frames: VecDeque<ApiFrame>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        FrameBuffer {
            frames: VecDeque::with_capacity(MAX_INCOMING_FRAMES),
        }
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frames are buffered.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Append a frame, discarding the oldest one first if the buffer is
    /// full. Returns the dropped frame, if any.
    pub fn push(&mut self, frame: ApiFrame) -> Option<ApiFrame> {
        let dropped = if self.frames.len() == MAX_INCOMING_FRAMES {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        dropped
    }

    /// Remove and return the first frame matching `(frame_type, id)`.
    ///
    /// The relative order of the remaining frames is preserved.
    pub fn find_and_remove(&mut self, frame_type: u8, id: u8) -> Option<ApiFrame> {
        let pos = self.frames.iter().position(|f| matches(f, frame_type, id))?;
        self.frames.remove(pos)
    }

    /// Remove and return the oldest frame.
    pub fn pop_oldest(&mut self) -> Option<ApiFrame> {
        self.frames.pop_front()
    }

    /// Remove every frame matching `(frame_type, id)`; returns the number
    /// removed.
    pub fn flush(&mut self, frame_type: u8, id: u8) -> usize {
        let before = self.frames.len();
        self.frames.retain(|f| !matches(f, frame_type, id));
        before - self.frames.len()
    }
}

/// Concurrent handle to a [`FrameBuffer`].
///
/// Cloning is cheap; all clones address the same buffer. Every operation
/// bounds its lock acquisition with the given deadline and degrades to
/// "nothing found" on expiry.
#[derive(Debug, Clone, Default)]
pub struct SharedFrameBuffer {
    inner: Arc<Mutex<FrameBuffer>>,
}

impl SharedFrameBuffer {
    /// Create a handle to a new, empty buffer.
    pub fn new() -> Self {
        SharedFrameBuffer {
            inner: Arc::new(Mutex::new(FrameBuffer::new())),
        }
    }

    /// Append a frame under the lock. Returns `false` if the lock could
    /// not be acquired within `deadline` (the frame is given back via the
    /// `Err`-like `false`; the caller retries).
    pub async fn push(&self, frame: ApiFrame, deadline: Duration) -> bool {
        match tokio::time::timeout(deadline, self.inner.lock()).await {
            Ok(mut buffer) => {
                if let Some(dropped) = buffer.push(frame) {
                    debug!(
                        frame_type = dropped.frame_type,
                        id = dropped.id,
                        "frame buffer full, dropped oldest frame"
                    );
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Remove and return the first frame matching `(frame_type, id)`,
    /// treating a lock deadline expiry as a miss.
    pub async fn find_and_remove(
        &self,
        frame_type: u8,
        id: u8,
        deadline: Duration,
    ) -> Option<ApiFrame> {
        match tokio::time::timeout(deadline, self.inner.lock()).await {
            Ok(mut buffer) => buffer.find_and_remove(frame_type, id),
            Err(_) => None,
        }
    }

    /// Remove and return the oldest frame, treating a lock deadline
    /// expiry as "buffer empty".
    pub async fn pop_oldest(&self, deadline: Duration) -> Option<ApiFrame> {
        match tokio::time::timeout(deadline, self.inner.lock()).await {
            Ok(mut buffer) => buffer.pop_oldest(),
            Err(_) => None,
        }
    }

    /// Returns `true` if at least one frame is buffered; `false` on lock
    /// deadline expiry.
    pub async fn is_readable(&self, deadline: Duration) -> bool {
        match tokio::time::timeout(deadline, self.inner.lock()).await {
            Ok(buffer) => !buffer.is_empty(),
            Err(_) => false,
        }
    }

    /// Remove every frame matching `(frame_type, id)` under one lock
    /// acquisition; returns the number removed (0 on deadline expiry).
    pub async fn flush(&self, frame_type: u8, id: u8, deadline: Duration) -> usize {
        match tokio::time::timeout(deadline, self.inner.lock()).await {
            Ok(mut buffer) => buffer.flush(frame_type, id),
            Err(_) => 0,
        }
    }

    /// Number of buffered frames (for tests and diagnostics).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::frame_type;

    fn frame(frame_type: u8, id: u8, tag: u8) -> ApiFrame {
        ApiFrame {
            frame_type,
            id,
            data: vec![tag],
        }
    }

    // ---------------------------------------------------------------
    // FrameBuffer
    // ---------------------------------------------------------------

    #[test]
    fn push_and_pop_preserve_order() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0x88, 0x01, 1));
        buffer.push(frame(0x89, 0x02, 2));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.pop_oldest().unwrap().data, vec![1]);
        assert_eq!(buffer.pop_oldest().unwrap().data, vec![2]);
        assert!(buffer.pop_oldest().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buffer = FrameBuffer::new();
        for i in 0..MAX_INCOMING_FRAMES as u8 {
            assert!(buffer.push(frame(0x90, NO_FRAME_ID, i)).is_none());
        }
        let dropped = buffer.push(frame(0x90, NO_FRAME_ID, 0xAA)).unwrap();
        assert_eq!(dropped.data, vec![0]);
        assert_eq!(buffer.len(), MAX_INCOMING_FRAMES);
        // Remaining frames are 1..N then the new arrival, still in order.
        assert_eq!(buffer.pop_oldest().unwrap().data, vec![1]);
    }

    #[test]
    fn find_and_remove_matches_type_and_id() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0x88, 0x01, 1));
        buffer.push(frame(0x88, 0x02, 2));
        buffer.push(frame(0x89, 0x01, 3));

        let hit = buffer.find_and_remove(0x88, 0x02).unwrap();
        assert_eq!(hit.data, vec![2]);
        assert_eq!(buffer.len(), 2);
        assert!(buffer.find_and_remove(0x88, 0x02).is_none());
    }

    #[test]
    fn find_and_remove_preserves_remaining_order() {
        let mut buffer = FrameBuffer::new();
        for i in 0..5 {
            buffer.push(frame(0x88, i, i));
        }
        buffer.find_and_remove(0x88, 2).unwrap();
        let order: Vec<u8> = std::iter::from_fn(|| buffer.pop_oldest())
            .map(|f| f.id)
            .collect();
        assert_eq!(order, vec![0, 1, 3, 4]);
    }

    #[test]
    fn wildcard_id_matches_any() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0x90, NO_FRAME_ID, 1));
        buffer.push(frame(0x88, 0x42, 2));

        // Wildcard on an id-bearing type matches the first of that type.
        let hit = buffer.find_and_remove(0x88, NO_FRAME_ID).unwrap();
        assert_eq!(hit.id, 0x42);
        // Wildcard also matches frames stored with the no-id marker.
        let hit = buffer.find_and_remove(0x90, NO_FRAME_ID).unwrap();
        assert_eq!(hit.data, vec![1]);
    }

    #[test]
    fn exact_id_does_not_match_other_ids() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0x88, 0x42, 1));
        assert!(buffer.find_and_remove(0x88, 0x43).is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn flush_removes_all_matches_and_is_idempotent() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0x88, 0x01, 1));
        buffer.push(frame(0x89, 0x01, 2));
        buffer.push(frame(0x88, 0x01, 3));

        assert_eq!(buffer.flush(0x88, 0x01), 2);
        assert_eq!(buffer.flush(0x88, 0x01), 0);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.pop_oldest().unwrap().data, vec![2]);
    }

    // ---------------------------------------------------------------
    // SharedFrameBuffer
    // ---------------------------------------------------------------

    const DEADLINE: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn shared_push_and_find() {
        let buffer = SharedFrameBuffer::new();
        assert!(!buffer.is_readable(DEADLINE).await);

        assert!(buffer.push(frame(0x88, 0x8A, 1), DEADLINE).await);
        assert!(buffer.is_readable(DEADLINE).await);

        let hit = buffer.find_and_remove(0x88, 0x8A, DEADLINE).await.unwrap();
        assert_eq!(hit.data, vec![1]);
        assert!(!buffer.is_readable(DEADLINE).await);
    }

    #[tokio::test]
    async fn shared_flush_then_find_misses() {
        let buffer = SharedFrameBuffer::new();
        buffer.push(frame(0x89, 0x10, 1), DEADLINE).await;
        buffer.push(frame(0x89, 0x10, 2), DEADLINE).await;

        assert_eq!(buffer.flush(0x89, 0x10, DEADLINE).await, 2);
        assert!(buffer.find_and_remove(0x89, 0x10, DEADLINE).await.is_none());
    }

    #[tokio::test]
    async fn shared_clones_see_the_same_frames() {
        let buffer = SharedFrameBuffer::new();
        let other = buffer.clone();
        buffer.push(frame(frame_type::RECEIVE_PACKET, NO_FRAME_ID, 7), DEADLINE).await;
        assert_eq!(other.len().await, 1);
        assert!(other.pop_oldest(DEADLINE).await.is_some());
        assert_eq!(buffer.len().await, 0);
    }
}
