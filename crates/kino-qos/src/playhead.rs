//! Playhead and dropped-frame tracking
//!
//! Both are last-value caches shared between event dispatch, which writes
//! them, and the sink's sampling callbacks, which only read. Clones share
//! the same underlying value.

use crate::event::PlayerEvent;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Convert a position in seconds to whole milliseconds
pub fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).floor() as i64
}

/// Most recently observed playback position
#[derive(Debug, Clone, Default)]
pub struct PlayheadTracker {
    current_ms: Arc<AtomicI64>,
}

impl PlayheadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the event's position if it carries one. Seeks may move it
    /// backwards; no range check is applied.
    pub fn observe(&self, event: &PlayerEvent) {
        if let Some(seconds) = event.current_time {
            self.current_ms.store(seconds_to_ms(seconds), Ordering::Relaxed);
        }
    }

    /// Last position in milliseconds, 0 before any observation
    pub fn read(&self) -> i64 {
        self.current_ms.load(Ordering::Relaxed)
    }
}

/// Cumulative dropped-frame count as last reported by the player
#[derive(Debug, Clone, Default)]
pub struct DroppedFrameCounter {
    count: Arc<AtomicU64>,
}

impl DroppedFrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite with the reported count. An absent or zero count keeps
    /// the previous value.
    pub fn update(&self, reported: Option<u64>) {
        if let Some(count) = reported.filter(|count| *count != 0) {
            self.count.store(count, Ordering::Relaxed);
        }
    }

    pub fn read(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
