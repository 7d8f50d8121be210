//! Player lifecycle events
//!
//! The player emits a loosely ordered stream of these. Every event may carry
//! the playback position in seconds alongside its kind-specific payload.

use serde::{Deserialize, Deserializer, Serialize};

/// Error code reported when the player gives none
pub const DEFAULT_ERROR_CODE: i64 = 500;

/// A single event delivered by the player's event source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Playback position in seconds, if the event reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
}

impl PlayerEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            current_time: None,
        }
    }

    pub fn with_current_time(mut self, seconds: f64) -> Self {
        self.current_time = Some(seconds);
        self
    }
}

impl From<EventKind> for PlayerEvent {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

/// Closed set of event kinds the adapter understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    LoadStart,
    Loading,
    Loaded,
    Start,
    Play,
    Resume,
    Playing,
    Pause,
    Seeking,
    Seeked,
    TimeUpdate,
    Error(PlaybackError),
    Ended,
    Buffering,
    Buffered,
    BitrateChanged {
        #[serde(default, deserialize_with = "lenient_count")]
        bitrate: Option<u64>,
    },
    AdblockStart,
    AdblockComplete,
    AdStart,
    Stop,
    DroppedFrames {
        #[serde(default, deserialize_with = "lenient_count")]
        dropped_frames: Option<u64>,
    },
    /// Anything else the player emits; ignored
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Event name for log fields
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::LoadStart => "load_start",
            EventKind::Loading => "loading",
            EventKind::Loaded => "loaded",
            EventKind::Start => "start",
            EventKind::Play => "play",
            EventKind::Resume => "resume",
            EventKind::Playing => "playing",
            EventKind::Pause => "pause",
            EventKind::Seeking => "seeking",
            EventKind::Seeked => "seeked",
            EventKind::TimeUpdate => "time_update",
            EventKind::Error(_) => "error",
            EventKind::Ended => "ended",
            EventKind::Buffering => "buffering",
            EventKind::Buffered => "buffered",
            EventKind::BitrateChanged { .. } => "bitrate_changed",
            EventKind::AdblockStart => "adblock_start",
            EventKind::AdblockComplete => "adblock_complete",
            EventKind::AdStart => "ad_start",
            EventKind::Stop => "stop",
            EventKind::DroppedFrames { .. } => "dropped_frames",
            EventKind::Unknown => "unknown",
        }
    }
}

/// Players built on JS numbers may send counts as `2800000.0`
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.max(0.0).round() as u64))
}

/// Playback error reported by the player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: Option<ErrorMetadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    #[serde(default)]
    pub code: Option<i64>,
}

impl PlaybackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            metadata: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.metadata = Some(ErrorMetadata { code: Some(code) });
        self
    }

    /// Reported code; absent or zero falls back to [`DEFAULT_ERROR_CODE`]
    pub fn code(&self) -> i64 {
        self.metadata
            .and_then(|m| m.code)
            .filter(|code| *code != 0)
            .unwrap_or(DEFAULT_ERROR_CODE)
    }
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.message, self.metadata.and_then(|m| m.code)) {
            (Some(message), _) => write!(f, "{}", message),
            (None, Some(code)) => write!(f, "player error {}", code),
            (None, None) => write!(f, "unknown error"),
        }
    }
}
