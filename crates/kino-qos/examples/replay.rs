//! Event log replay example
//!
//! Feeds a recorded player event log through the adapter and prints every
//! call the analytics sink received.
//!
//! Run with: cargo run -p kino-qos --example replay [events.json]
//!
//! The log is a JSON array of events, e.g.
//! `[{"event": "loading"}, {"event": "time_update", "current_time": 1.5}]`

use anyhow::Context;
use kino_qos::player::{AssetInfo, EventHandler, PlayerInfo, SessionInfo, StreamInfo, SubscriptionId};
use kino_qos::sink::SinkCall;
use kino_qos::{
    AdapterConfig, Dimensions, MediaPlayer, PlayerEvent, PlayerQuery, QosAdapter, RecordingSink,
};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

const SAMPLE_LOG: &str = r#"[
    { "event": "load_start" },
    { "event": "loading" },
    { "event": "loaded" },
    { "event": "play" },
    { "event": "playing", "current_time": 0.0 },
    { "event": "time_update", "current_time": 4.2 },
    { "event": "bitrate_changed", "bitrate": 2800000 },
    { "event": "dropped_frames", "dropped_frames": 3 },
    { "event": "pause", "current_time": 9.8 },
    { "event": "error", "message": "segment 12 timed out" },
    { "event": "ended" },
    { "event": "time_update", "current_time": 10.0 }
]"#;

/// Player stand-in that replays a fixed log to its subscriber
struct ReplayPlayer {
    query: PlayerQuery,
    handler: Mutex<Option<EventHandler>>,
}

impl ReplayPlayer {
    fn replay(&self, events: &[PlayerEvent]) {
        let handler = self.handler.lock().ok().and_then(|h| h.clone());
        if let Some(handler) = handler {
            for event in events {
                handler(event);
            }
        }
    }
}

impl MediaPlayer for ReplayPlayer {
    fn subscribe(&self, handler: EventHandler) -> SubscriptionId {
        if let Ok(mut slot) = self.handler.lock() {
            *slot = Some(handler);
        }
        SubscriptionId(1)
    }

    fn unsubscribe_all(&self, _subscription: SubscriptionId) {
        if let Ok(mut slot) = self.handler.lock() {
            *slot = None;
        }
    }

    fn player_info(&self) -> Option<PlayerInfo> {
        self.query.player.clone()
    }

    fn asset_info(&self) -> Option<AssetInfo> {
        self.query.asset.clone()
    }

    fn stream_info(&self) -> Option<StreamInfo> {
        self.query.stream.clone()
    }

    fn session_info(&self) -> Option<SessionInfo> {
        self.query.session.clone()
    }

    fn video_dimensions(&self) -> Option<Dimensions> {
        self.query.video
    }

    fn is_live(&self) -> bool {
        self.query.is_live
    }

    fn is_playing(&self) -> bool {
        self.query.is_playing
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kino_qos=debug")))
        .init();

    let log = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?,
        None => SAMPLE_LOG.to_string(),
    };
    let events: Vec<PlayerEvent> = serde_json::from_str(&log).context("parsing event log")?;

    println!("Kino QoS - Event Log Replay");
    println!("===========================\n");
    println!("Replaying {} events\n", events.len());

    let mut asset = AssetInfo {
        asset_id: Some("demo-asset".to_string()),
        duration: Some(10.0),
        ..Default::default()
    };
    asset.titles.insert("en".to_string(), "Kino Demo Reel".to_string());

    let player = Arc::new(ReplayPlayer {
        query: PlayerQuery {
            asset: Some(asset),
            stream: Some(StreamInfo {
                media_locator: Some("https://cdn.example.com/demo/master.m3u8".to_string()),
                has_drm: false,
            }),
            video: Some(Dimensions::new(1280, 720)),
            ..Default::default()
        },
        handler: Mutex::new(None),
    });

    let sink = Arc::new(RecordingSink::new());
    let config = AdapterConfig::new("demo-env-key").with_metadata("video_series", "Demos");
    let mut adapter = QosAdapter::new(config, sink.clone());

    adapter.connect(player.clone());
    player.replay(&events);

    if let Some(state) = sink.sample_state() {
        println!("State sample: {}\n", serde_json::to_string(&state)?);
    }

    adapter.destroy();

    for call in sink.calls() {
        match call {
            SinkCall::Init { data, .. } => {
                println!("init  {}", serde_json::to_string(&data)?);
            }
            SinkCall::Emit { signal, payload, .. } => match payload {
                Some(payload) => println!("emit  {:<16} {}", signal, serde_json::to_string(&payload)?),
                None => println!("emit  {}", signal),
            },
        }
    }

    Ok(())
}
