//! Player collaborator interface
//!
//! The adapter never drives the player; it only subscribes to its events and
//! reads point-in-time info. Every query may come back empty, e.g. before an
//! asset is loaded or a stream is negotiated.

use crate::{event::PlayerEvent, types::Dimensions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Callback invoked by the player for each event
pub type EventHandler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// Handle returned by [`MediaPlayer::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Player engine and wrapper versions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    pub engine_name: Option<String>,
    pub engine_version: Option<String>,
    pub player_version: Option<String>,
}

/// Currently loaded asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetInfo {
    pub asset_id: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Localized titles keyed by locale
    pub titles: BTreeMap<String, String>,
}

impl AssetInfo {
    /// Title for `locale`, else the first available one
    pub fn title(&self, locale: &str) -> Option<&str> {
        self.titles
            .get(locale)
            .or_else(|| self.titles.values().next())
            .map(String::as_str)
    }
}

/// Negotiated stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamInfo {
    pub media_locator: Option<String>,
    pub has_drm: bool,
}

/// Playback session as seen by the player's backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    pub play_session_id: Option<String>,
    pub cdn_provider: Option<String>,
    pub autoplay: Option<bool>,
}

/// Viewer platform as reported by the host environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformInfo {
    pub os_family: Option<String>,
    pub os_version: Option<String>,
    pub os_architecture: Option<u32>,
    pub device_name: Option<String>,
    pub device_category: Option<String>,
    pub device_manufacturer: Option<String>,
}

/// Point-in-time answers to every player query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerQuery {
    pub player: Option<PlayerInfo>,
    pub asset: Option<AssetInfo>,
    pub stream: Option<StreamInfo>,
    pub session: Option<SessionInfo>,
    pub platform: Option<PlatformInfo>,
    pub video: Option<Dimensions>,
    pub is_live: bool,
    pub is_playing: bool,
}

/// Media player the adapter binds to
pub trait MediaPlayer: Send + Sync {
    /// Register a handler for every player event
    fn subscribe(&self, handler: EventHandler) -> SubscriptionId;

    /// Remove a handler registered with [`MediaPlayer::subscribe`]
    fn unsubscribe_all(&self, subscription: SubscriptionId);

    fn player_info(&self) -> Option<PlayerInfo>;

    fn asset_info(&self) -> Option<AssetInfo>;

    fn stream_info(&self) -> Option<StreamInfo>;

    fn session_info(&self) -> Option<SessionInfo>;

    fn platform_info(&self) -> Option<PlatformInfo> {
        None
    }

    fn video_dimensions(&self) -> Option<Dimensions>;

    fn is_live(&self) -> bool;

    fn is_playing(&self) -> bool;

    /// Collect all queries into one value
    fn query(&self) -> PlayerQuery {
        PlayerQuery {
            player: self.player_info(),
            asset: self.asset_info(),
            stream: self.stream_info(),
            session: self.session_info(),
            platform: self.platform_info(),
            video: self.video_dimensions(),
            is_live: self.is_live(),
            is_playing: self.is_playing(),
        }
    }
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// [`Clock`] backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
