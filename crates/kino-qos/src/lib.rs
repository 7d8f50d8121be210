//! Kino QoS - Player Event to Analytics Session Adapter
//!
//! This crate turns the player's lifecycle event stream into the session
//! protocol of a video quality-of-service analytics backend:
//! - Session open exactly once, on the first `loading` event
//! - Static metadata snapshot with fallbacks for missing player data
//! - Pull-based state sampling and playhead reporting
//! - Idempotent termination on `ended`, `stop` or disconnect
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Kino QoS                          │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌──────────────┐  events   ┌──────────────┐             │
//! │  │ MediaPlayer  │──────────▶│   Session    │             │
//! │  └──────┬───────┘           │   Machine    │             │
//! │         │ queries           └──┬────────┬──┘             │
//! │         │                      │        │ signals        │
//! │  ┌──────┴───────┐  ┌───────────┴──┐  ┌──┴───────────┐    │
//! │  │   Metadata   │  │   Playhead   │  │  Analytics   │    │
//! │  │   Snapshot   │  │   Tracker    │  │    Sink      │    │
//! │  └──────────────┘  └──────────────┘  └──────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod event;
pub mod player;
pub mod metadata;
pub mod playhead;
pub mod sink;
pub mod adapter;

pub use error::{Error, Result};
pub use types::*;
pub use event::{EventKind, PlaybackError, PlayerEvent};
pub use player::{Clock, MediaPlayer, PlayerQuery, SystemClock};
pub use metadata::{build_snapshot, build_state_data, StateData};
pub use playhead::PlayheadTracker;
pub use sink::{AnalyticsSink, RecordingSink, Signal, SignalPayload, SinkOptions};
pub use adapter::{QosAdapter, SessionMachine, SessionState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
