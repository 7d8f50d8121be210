//! Analytics sink interface
//!
//! The sink owns buffering, retries and the network. The adapter only
//! guarantees call ordering and never looks at what the sink does with a
//! call.

use crate::{
    metadata::StateData,
    types::{Metadata, SessionId},
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle signal names understood by the analytics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    PlayerReady,
    Play,
    Playing,
    Pause,
    Seeking,
    Seeked,
    TimeUpdate,
    Error,
    Ended,
    RebufferStart,
    RebufferEnd,
    RenditionChange,
    AdBreakStart,
    AdBreakEnd,
    AdPlay,
    Destroy,
}

impl Signal {
    /// Wire name, byte-for-byte what the backend expects
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::PlayerReady => "playerready",
            Signal::Play => "play",
            Signal::Playing => "playing",
            Signal::Pause => "pause",
            Signal::Seeking => "seeking",
            Signal::Seeked => "seeked",
            Signal::TimeUpdate => "timeupdate",
            Signal::Error => "error",
            Signal::Ended => "ended",
            Signal::RebufferStart => "rebufferstart",
            Signal::RebufferEnd => "rebufferend",
            Signal::RenditionChange => "renditionchange",
            Signal::AdBreakStart => "adbreakstart",
            Signal::AdBreakEnd => "adbreakend",
            Signal::AdPlay => "adplay",
            Signal::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Extra data attached to a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalPayload {
    TimeUpdate {
        player_playhead_time: i64,
    },
    Error {
        player_error_code: i64,
        player_error_message: String,
    },
    RenditionChange {
        #[serde(skip_serializing_if = "Option::is_none")]
        video_source_bitrate: Option<u64>,
    },
}

/// Returns the playhead position in milliseconds
pub type PlayheadCallback = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Returns current player state, `None` if no player is bound
pub type StateCallback = Arc<dyn Fn() -> Option<StateData> + Send + Sync>;

/// Everything the sink receives when a session is opened
#[derive(Clone)]
pub struct SinkOptions {
    pub data: Metadata,
    pub debug: bool,
    pub disable_cookies: bool,
    pub respect_do_not_track: bool,
    /// Sampled by the sink at arbitrary times; must stay side-effect free
    pub get_playhead_time: PlayheadCallback,
    pub get_state_data: StateCallback,
}

impl std::fmt::Debug for SinkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkOptions")
            .field("data", &self.data)
            .field("debug", &self.debug)
            .field("disable_cookies", &self.disable_cookies)
            .field("respect_do_not_track", &self.respect_do_not_track)
            .finish_non_exhaustive()
    }
}

/// External analytics collector
pub trait AnalyticsSink: Send + Sync {
    /// Collector library name, reported in the session metadata
    fn name(&self) -> &str {
        env!("CARGO_PKG_NAME")
    }

    /// Collector library version, reported in the session metadata
    fn version(&self) -> &str {
        crate::VERSION
    }

    fn generate_session_id(&self) -> SessionId {
        SessionId::new()
    }

    /// Open the analytics session
    fn init(&self, session_id: SessionId, options: SinkOptions);

    /// Fire-and-forget lifecycle signal
    fn emit(&self, session_id: SessionId, signal: Signal, payload: Option<SignalPayload>);
}

/// A call received by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Init {
        session_id: SessionId,
        data: Metadata,
    },
    Emit {
        session_id: SessionId,
        signal: Signal,
        payload: Option<SignalPayload>,
    },
}

impl SinkCall {
    /// `"init"` or the signal's wire name
    pub fn name(&self) -> &'static str {
        match self {
            SinkCall::Init { .. } => "init",
            SinkCall::Emit { signal, .. } => signal.as_str(),
        }
    }
}

#[derive(Default)]
struct Recorded {
    calls: Vec<SinkCall>,
    options: Option<SinkOptions>,
}

/// In-memory sink that keeps every call, for tests and replays
#[derive(Default)]
pub struct RecordingSink {
    session_id: Option<SessionId>,
    state: Mutex<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out `session_id` instead of a random one
    pub fn with_session_id(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Default::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// Call names in order, `"init"` included
    pub fn call_names(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(SinkCall::name).collect()
    }

    /// Options passed to `init`, if a session was opened
    pub fn options(&self) -> Option<SinkOptions> {
        self.lock().options.clone()
    }

    /// Payload of the last emitted `signal`
    pub fn last_payload(&self, signal: Signal) -> Option<SignalPayload> {
        self.lock().calls.iter().rev().find_map(|call| match call {
            SinkCall::Emit {
                signal: s, payload, ..
            } if *s == signal => payload.clone(),
            _ => None,
        })
    }

    /// Sample the playhead the way the collector would
    pub fn sample_playhead(&self) -> Option<i64> {
        let callback = self.options()?.get_playhead_time;
        Some(callback())
    }

    /// Sample state data the way the collector would
    pub fn sample_state(&self) -> Option<StateData> {
        let callback = self.options()?.get_state_data;
        callback()
    }
}

impl AnalyticsSink for RecordingSink {
    fn generate_session_id(&self) -> SessionId {
        self.session_id.unwrap_or_default()
    }

    fn init(&self, session_id: SessionId, options: SinkOptions) {
        let mut state = self.lock();
        state.calls.push(SinkCall::Init {
            session_id,
            data: options.data.clone(),
        });
        state.options = Some(options);
    }

    fn emit(&self, session_id: SessionId, signal: Signal, payload: Option<SignalPayload>) {
        self.lock().calls.push(SinkCall::Emit {
            session_id,
            signal,
            payload,
        });
    }
}
