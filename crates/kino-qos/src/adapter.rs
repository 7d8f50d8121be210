//! Session lifecycle - maps player events onto the analytics session
//!
//! [`SessionMachine`] is the synchronous core: one event in, zero or more
//! sink calls out, each transition applied in full before the next event.
//! [`QosAdapter`] binds a machine to a live player's event subscription and
//! handles teardown.

use crate::{
    event::{EventKind, PlayerEvent},
    metadata::{build_snapshot, build_state_data, SnapshotContext},
    player::{Clock, EventHandler, MediaPlayer, SubscriptionId, SystemClock},
    playhead::{DroppedFrameCounter, PlayheadTracker},
    sink::{AnalyticsSink, PlayheadCallback, Signal, SignalPayload, SinkOptions, StateCallback},
    types::{AdapterConfig, SessionId},
    Error, Result,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, instrument, warn};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No player bound yet
    Unconnected,
    /// Player bound, sink session not opened
    Connected,
    /// Sink session open
    Active,
    /// Terminal; every later event is discarded
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unconnected => write!(f, "unconnected"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// Event-to-session state machine for a single viewing session
pub struct SessionMachine {
    session_id: SessionId,
    config: AdapterConfig,
    sink: Arc<dyn AnalyticsSink>,
    clock: Arc<dyn Clock>,
    player: Option<Arc<dyn MediaPlayer>>,
    playhead: PlayheadTracker,
    dropped_frames: DroppedFrameCounter,
    init_time_ms: Option<i64>,
    /// Monotonic: never reset once set
    ended: bool,
    sink_open: bool,
    released: bool,
}

impl SessionMachine {
    pub fn new(config: AdapterConfig, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self::with_clock(config, sink, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AdapterConfig, sink: Arc<dyn AnalyticsSink>, clock: Arc<dyn Clock>) -> Self {
        let session_id = sink.generate_session_id();
        debug!(session_id = %session_id, "Session created");

        Self {
            session_id,
            config,
            sink,
            clock,
            player: None,
            playhead: PlayheadTracker::new(),
            dropped_frames: DroppedFrameCounter::new(),
            init_time_ms: None,
            ended: false,
            sink_open: false,
            released: false,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.ended {
            SessionState::Ended
        } else if self.sink_open {
            SessionState::Active
        } else if self.player.is_some() {
            SessionState::Connected
        } else {
            SessionState::Unconnected
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Last known playhead in milliseconds
    pub fn playhead_ms(&self) -> i64 {
        self.playhead.read()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.read()
    }

    /// Time of the first load-start, if one was seen
    pub fn init_time_ms(&self) -> Option<i64> {
        self.init_time_ms
    }

    /// Attach the player that setup and state sampling query
    pub fn bind(&mut self, player: Arc<dyn MediaPlayer>) {
        self.player = Some(player);
    }

    /// End the session without emitting anything
    pub fn disconnect(&mut self) {
        self.end("disconnect");
    }

    /// Apply one player event
    pub fn handle(&mut self, event: &PlayerEvent) {
        if self.ended {
            debug!(session_id = %self.session_id, event = event.kind.name(), "Session ended, event dropped");
            return;
        }

        self.playhead.observe(event);

        match &event.kind {
            EventKind::LoadStart => {
                if self.init_time_ms.is_none() {
                    self.init_time_ms = Some(self.clock.now_ms());
                }
            }
            EventKind::Loading => self.on_loading(),
            EventKind::Loaded => self.emit(Signal::PlayerReady, None),
            EventKind::Start | EventKind::Play | EventKind::Resume => self.emit(Signal::Play, None),
            EventKind::Playing => self.emit(Signal::Playing, None),
            EventKind::Pause => self.emit(Signal::Pause, None),
            EventKind::Seeking => self.emit(Signal::Seeking, None),
            EventKind::Seeked => self.emit(Signal::Seeked, None),
            EventKind::TimeUpdate => {
                let payload = SignalPayload::TimeUpdate {
                    player_playhead_time: self.playhead.read(),
                };
                self.emit(Signal::TimeUpdate, Some(payload));
            }
            EventKind::Error(err) => {
                let payload = SignalPayload::Error {
                    player_error_code: err.code(),
                    player_error_message: err.to_string(),
                };
                self.emit(Signal::Error, Some(payload));
            }
            EventKind::Ended => {
                self.emit(Signal::Ended, None);
                self.end("ended");
            }
            EventKind::Buffering => self.emit(Signal::RebufferStart, None),
            EventKind::Buffered => self.emit(Signal::RebufferEnd, None),
            EventKind::BitrateChanged { bitrate } => {
                let payload = SignalPayload::RenditionChange {
                    video_source_bitrate: *bitrate,
                };
                self.emit(Signal::RenditionChange, Some(payload));
            }
            EventKind::AdblockStart => self.emit(Signal::AdBreakStart, None),
            EventKind::AdblockComplete => self.emit(Signal::AdBreakEnd, None),
            EventKind::AdStart => self.emit(Signal::AdPlay, None),
            EventKind::Stop => self.end("stop"),
            EventKind::DroppedFrames { dropped_frames } => self.dropped_frames.update(*dropped_frames),
            EventKind::Unknown => {}
        }
    }

    /// Release the sink session and end the session for good.
    /// Only the first call has an effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.end("teardown");

        if self.sink_open {
            self.sink.emit(self.session_id, Signal::Destroy, None);
            info!(session_id = %self.session_id, "Sink session released");
        }
    }

    fn on_loading(&mut self) {
        if self.sink_open {
            debug!(session_id = %self.session_id, "Sink session already open, loading ignored");
            return;
        }

        if let Err(e) = self.setup() {
            warn!(
                session_id = %self.session_id,
                error = %e,
                code = e.error_code(),
                "Setup aborted, no sink session opened"
            );
        }
    }

    /// Build the snapshot and open the sink session
    fn setup(&mut self) -> Result<()> {
        let player = self.player.clone().ok_or(Error::PlayerNotConnected)?;

        let ctx = SnapshotContext {
            locale: &self.config.locale,
            init_time_ms: self.init_time_ms.unwrap_or(0),
            plugin_name: self.sink.name(),
            plugin_version: self.sink.version(),
        };
        let data = build_snapshot(&player.query(), &self.config.metadata, &ctx);

        let playhead = self.playhead.clone();
        let get_playhead_time: PlayheadCallback = Arc::new(move || playhead.read());

        let weak_player = Arc::downgrade(&player);
        let dropped_frames = self.dropped_frames.clone();
        let get_state_data: StateCallback = Arc::new(move || {
            let player = weak_player.upgrade()?;
            Some(build_state_data(&player.query(), dropped_frames.read()))
        });

        let options = SinkOptions {
            data,
            debug: self.config.debug,
            disable_cookies: self.config.privacy.disable_cookies,
            respect_do_not_track: self.config.privacy.respect_do_not_track,
            get_playhead_time,
            get_state_data,
        };

        self.sink.init(self.session_id, options);
        self.sink_open = true;
        info!(session_id = %self.session_id, "Sink session opened");

        Ok(())
    }

    /// Forward a signal; dropped until the sink session is open
    fn emit(&self, signal: Signal, payload: Option<SignalPayload>) {
        if !self.sink_open {
            debug!(session_id = %self.session_id, %signal, "Sink session not open, signal suppressed");
            return;
        }

        debug!(session_id = %self.session_id, %signal, "Emitting signal");
        self.sink.emit(self.session_id, signal, payload);
    }

    fn end(&mut self, reason: &'static str) {
        if !self.ended {
            self.ended = true;
            info!(session_id = %self.session_id, reason, "Session ended");
        }
    }
}

/// Binds a [`SessionMachine`] to a player's event stream
pub struct QosAdapter {
    session_id: SessionId,
    machine: Arc<Mutex<SessionMachine>>,
    player: Option<Arc<dyn MediaPlayer>>,
    subscription: Option<SubscriptionId>,
    destroyed: bool,
}

impl QosAdapter {
    pub fn new(config: AdapterConfig, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self::from_machine(SessionMachine::new(config, sink))
    }

    pub fn with_clock(config: AdapterConfig, sink: Arc<dyn AnalyticsSink>, clock: Arc<dyn Clock>) -> Self {
        Self::from_machine(SessionMachine::with_clock(config, sink, clock))
    }

    fn from_machine(machine: SessionMachine) -> Self {
        Self {
            session_id: machine.session_id(),
            machine: Arc::new(Mutex::new(machine)),
            player: None,
            subscription: None,
            destroyed: false,
        }
    }

    fn machine(&self) -> MutexGuard<'_, SessionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.machine().state()
    }

    pub fn is_ended(&self) -> bool {
        self.machine().is_ended()
    }

    pub fn playhead_ms(&self) -> i64 {
        self.machine().playhead_ms()
    }

    /// Bind to `player` and start receiving its events
    #[instrument(skip(self, player), fields(session_id = %self.session_id))]
    pub fn connect(&mut self, player: Arc<dyn MediaPlayer>) {
        if self.destroyed {
            warn!("Adapter destroyed, ignoring player");
            return;
        }
        if self.subscription.is_some() {
            warn!("Adapter already connected, ignoring second player");
            return;
        }

        self.machine().bind(player.clone());

        let machine: Weak<Mutex<SessionMachine>> = Arc::downgrade(&self.machine);
        let handler: EventHandler = Arc::new(move |event: &PlayerEvent| {
            if let Some(machine) = machine.upgrade() {
                machine
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .handle(event);
            }
        });

        self.subscription = Some(player.subscribe(handler));
        self.player = Some(player);
        info!("Connected to player");
    }

    /// Dispatch an event directly, bypassing the player subscription
    pub fn handle_event(&self, event: &PlayerEvent) {
        self.machine().handle(event);
    }

    /// Mark the session ended; later events are discarded
    pub fn disconnect(&self) {
        self.machine().disconnect();
    }

    /// Unsubscribe from the player and release the sink session.
    /// Safe to call more than once.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub fn destroy(&mut self) {
        self.destroyed = true;

        if let (Some(player), Some(subscription)) = (self.player.take(), self.subscription.take()) {
            player.unsubscribe_all(subscription);
            debug!("Unsubscribed from player events");
        }

        self.machine().release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::PlaybackError,
        sink::{RecordingSink, SinkCall},
        types::Metadata,
    };

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0
        }
    }

    #[derive(Default)]
    struct StaticPlayer;

    impl MediaPlayer for StaticPlayer {
        fn subscribe(&self, _handler: EventHandler) -> SubscriptionId {
            SubscriptionId(1)
        }
        fn unsubscribe_all(&self, _subscription: SubscriptionId) {}
        fn player_info(&self) -> Option<crate::player::PlayerInfo> {
            None
        }
        fn asset_info(&self) -> Option<crate::player::AssetInfo> {
            None
        }
        fn stream_info(&self) -> Option<crate::player::StreamInfo> {
            None
        }
        fn session_info(&self) -> Option<crate::player::SessionInfo> {
            None
        }
        fn video_dimensions(&self) -> Option<crate::types::Dimensions> {
            None
        }
        fn is_live(&self) -> bool {
            false
        }
        fn is_playing(&self) -> bool {
            true
        }
    }

    fn machine() -> (SessionMachine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let mut machine = SessionMachine::with_clock(
            AdapterConfig::new("env-test"),
            sink.clone(),
            Arc::new(FixedClock(1_000)),
        );
        machine.bind(Arc::new(StaticPlayer));
        (machine, sink)
    }

    fn ev(kind: EventKind) -> PlayerEvent {
        PlayerEvent::new(kind)
    }

    #[test]
    fn test_state_progression() {
        let sink = Arc::new(RecordingSink::new());
        let mut machine = SessionMachine::new(AdapterConfig::new("env-test"), sink);
        assert_eq!(machine.state(), SessionState::Unconnected);

        machine.bind(Arc::new(StaticPlayer));
        assert_eq!(machine.state(), SessionState::Connected);

        machine.handle(&ev(EventKind::Loading));
        assert_eq!(machine.state(), SessionState::Active);

        machine.handle(&ev(EventKind::Ended));
        assert_eq!(machine.state(), SessionState::Ended);
    }

    #[test]
    fn test_init_time_captured_once() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::LoadStart));
        assert_eq!(machine.init_time_ms(), Some(1_000));

        machine.handle(&ev(EventKind::Loading));
        let data = match &sink.calls()[0] {
            SinkCall::Init { data, .. } => data.clone(),
            other => panic!("expected init, got {:?}", other),
        };
        assert_eq!(data.get_f64("player_init_time"), Some(1_000.0));
        assert_eq!(data.get_str("env_key"), Some("env-test"));
    }

    #[test]
    fn test_setup_runs_once() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Loaded));

        assert_eq!(sink.call_names(), vec!["init", "playerready"]);
    }

    #[test]
    fn test_setup_without_player_retries() {
        let sink = Arc::new(RecordingSink::new());
        let mut machine = SessionMachine::new(AdapterConfig::new("env-test"), sink.clone());

        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Play));
        assert!(sink.calls().is_empty());

        machine.bind(Arc::new(StaticPlayer));
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Play));
        assert_eq!(sink.call_names(), vec!["init", "play"]);
    }

    #[test]
    fn test_pre_setup_signals_suppressed() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Play));
        machine.handle(&ev(EventKind::TimeUpdate).with_current_time(2.0));
        assert!(sink.calls().is_empty());

        // Local state still tracks
        assert_eq!(machine.playhead_ms(), 2_000);
    }

    #[test]
    fn test_event_mapping() {
        let (mut machine, sink) = machine();
        let events = vec![
            ev(EventKind::Loading),
            ev(EventKind::Start),
            ev(EventKind::Resume),
            ev(EventKind::Seeking),
            ev(EventKind::Seeked),
            ev(EventKind::Buffering),
            ev(EventKind::Buffered),
            ev(EventKind::BitrateChanged { bitrate: Some(2_500_000) }),
            ev(EventKind::AdblockStart),
            ev(EventKind::AdStart),
            ev(EventKind::AdblockComplete),
            ev(EventKind::Unknown),
        ];
        for event in &events {
            machine.handle(event);
        }

        assert_eq!(
            sink.call_names(),
            vec![
                "init",
                "play",
                "play",
                "seeking",
                "seeked",
                "rebufferstart",
                "rebufferend",
                "renditionchange",
                "adbreakstart",
                "adplay",
                "adbreakend",
            ]
        );
        assert_eq!(
            sink.last_payload(Signal::RenditionChange),
            Some(SignalPayload::RenditionChange {
                video_source_bitrate: Some(2_500_000)
            })
        );
    }

    #[test]
    fn test_timeupdate_reports_playhead() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::TimeUpdate).with_current_time(61.5));

        assert_eq!(
            sink.last_payload(Signal::TimeUpdate),
            Some(SignalPayload::TimeUpdate {
                player_playhead_time: 61_500
            })
        );
        assert_eq!(sink.sample_playhead(), Some(61_500));
    }

    #[test]
    fn test_error_message() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Error(PlaybackError::new("segment fetch failed"))));

        assert_eq!(
            sink.last_payload(Signal::Error),
            Some(SignalPayload::Error {
                player_error_code: 500,
                player_error_message: "segment fetch failed".to_string(),
            })
        );
    }

    #[test]
    fn test_disconnect_is_terminal() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.disconnect();
        machine.handle(&ev(EventKind::Play));
        machine.handle(&ev(EventKind::Loading));

        assert_eq!(sink.call_names(), vec!["init"]);
        assert!(machine.is_ended());
    }

    #[test]
    fn test_ended_events_do_not_touch_playhead() {
        let (mut machine, _sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::TimeUpdate).with_current_time(5.0));
        machine.handle(&ev(EventKind::Stop));
        machine.handle(&ev(EventKind::TimeUpdate).with_current_time(9.0));

        assert_eq!(machine.playhead_ms(), 5_000);
    }

    #[test]
    fn test_release_once() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Ended));

        machine.release();
        machine.release();
        assert_eq!(sink.call_names(), vec!["init", "ended", "destroy"]);
    }

    #[test]
    fn test_release_without_session_is_silent() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Stop));
        machine.release();
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn test_release_closes_session() {
        let (mut machine, sink) = machine();
        machine.handle(&ev(EventKind::Loading));
        machine.release();
        assert_eq!(machine.state(), SessionState::Ended);

        machine.handle(&ev(EventKind::Loading));
        machine.handle(&ev(EventKind::Play));
        machine.handle(&ev(EventKind::TimeUpdate).with_current_time(3.0));
        assert_eq!(sink.call_names(), vec!["init", "destroy"]);
        assert_eq!(machine.playhead_ms(), 0);
    }

    #[test]
    fn test_dropped_frames_ignore_zero() {
        let (mut machine, _sink) = machine();
        machine.handle(&ev(EventKind::DroppedFrames { dropped_frames: Some(12) }));
        machine.handle(&ev(EventKind::DroppedFrames { dropped_frames: Some(0) }));
        machine.handle(&ev(EventKind::DroppedFrames { dropped_frames: None }));
        assert_eq!(machine.dropped_frames(), 12);
        assert_eq!(machine.config().locale, "en");
    }

    #[test]
    fn test_privacy_and_debug_forwarded() {
        let sink = Arc::new(RecordingSink::new());
        let config = AdapterConfig::new("env-test")
            .with_debug(true)
            .with_privacy(crate::types::PrivacySettings {
                disable_cookies: true,
                respect_do_not_track: true,
            })
            .with_metadata("video_series", "Kino Originals");
        let mut machine = SessionMachine::new(config, sink.clone());
        machine.bind(Arc::new(StaticPlayer));
        machine.handle(&ev(EventKind::Loading));

        let options = sink.options().expect("session opened");
        assert!(options.debug);
        assert!(options.disable_cookies);
        assert!(options.respect_do_not_track);
        assert_eq!(options.data.get_str("video_series"), Some("Kino Originals"));
        assert_ne!(options.data, Metadata::new());
    }
}
