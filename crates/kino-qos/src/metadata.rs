//! Metadata snapshots
//!
//! Two views of the session are handed to the sink:
//! - a static snapshot built once at setup from player queries plus caller
//!   overrides ([`build_snapshot`])
//! - dynamic state data the sink samples on its own cadence
//!   ([`build_state_data`])
//!
//! Both are total: absent player data degrades to a fallback value, never
//! to a missing required key.

use crate::{
    player::{PlayerQuery, StreamInfo},
    types::Metadata,
};
use serde::{Deserialize, Serialize};

/// Player brand reported in `player_name`
pub const PLAYER_NAME: &str = "Kino player";

pub const STREAM_TYPE_LIVE: &str = "live";
pub const STREAM_TYPE_ON_DEMAND: &str = "on-demand";

/// Inputs to the snapshot that do not come from the player
#[derive(Debug, Clone, Copy)]
pub struct SnapshotContext<'a> {
    pub locale: &'a str,
    /// Wall-clock time of the first load-start, 0 if none was seen
    pub init_time_ms: i64,
    pub plugin_name: &'a str,
    pub plugin_version: &'a str,
}

/// Protection state of the negotiated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrmIndicator {
    Drm,
    NoDrm,
}

impl DrmIndicator {
    /// `None` when no stream has been negotiated yet
    pub fn from_stream(stream: Option<&StreamInfo>) -> Option<Self> {
        stream.map(|s| if s.has_drm { DrmIndicator::Drm } else { DrmIndicator::NoDrm })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DrmIndicator::Drm => "drm",
            DrmIndicator::NoDrm => "no-drm",
        }
    }
}

/// Build the static session snapshot. Keys in `overrides` always win.
pub fn build_snapshot(query: &PlayerQuery, overrides: &Metadata, ctx: &SnapshotContext<'_>) -> Metadata {
    let player = query.player.clone().unwrap_or_default();
    let session = query.session.clone().unwrap_or_default();
    let platform = query.platform.clone().unwrap_or_default();
    let asset = query.asset.as_ref();
    let stream = query.stream.as_ref();

    let or_empty = |value: Option<String>| value.unwrap_or_default();

    let mut data = Metadata::new()
        .with("player_software_name", or_empty(player.engine_name))
        .with("player_software_version", or_empty(player.engine_version))
        .with("player_name", PLAYER_NAME)
        .with("player_version", or_empty(player.player_version))
        .with("player_mux_plugin_name", ctx.plugin_name)
        .with("player_mux_plugin_version", ctx.plugin_version)
        .with("player_init_time", ctx.init_time_ms)
        .with("view_session_id", or_empty(session.play_session_id))
        .with("viewer_os_family", or_empty(platform.os_family))
        .with("viewer_os_version", or_empty(platform.os_version))
        .with("viewer_os_architecture", platform.os_architecture.unwrap_or(0))
        .with("viewer_device_name", or_empty(platform.device_name))
        .with("viewer_device_category", or_empty(platform.device_category))
        .with("viewer_device_manufacturer", or_empty(platform.device_manufacturer))
        .with("video_id", asset.and_then(|a| a.asset_id.clone()).unwrap_or_default())
        .with(
            "video_stream_type",
            if query.is_live { STREAM_TYPE_LIVE } else { STREAM_TYPE_ON_DEMAND },
        )
        .with("video_cdn", or_empty(session.cdn_provider))
        .with("video_duration", asset.and_then(|a| a.duration).unwrap_or(0.0))
        .with(
            "video_title",
            asset.and_then(|a| a.title(ctx.locale)).unwrap_or_default(),
        )
        .with(
            "video_source_url",
            stream.and_then(|s| s.media_locator.clone()).unwrap_or_default(),
        );

    if let Some(drm) = DrmIndicator::from_stream(stream) {
        data.insert("sub_property_id", drm.as_str());
    }

    data.merge(overrides);
    data
}

/// Dynamic player state sampled by the sink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    pub player_is_paused: bool,
    pub player_autoplay_on: Option<bool>,
    pub video_source_height: u32,
    pub video_source_width: u32,
    pub video_source_duration: f64,
    pub view_dropped_frame_count: u64,
}

pub fn build_state_data(query: &PlayerQuery, dropped_frames: u64) -> StateData {
    let video = query.video.unwrap_or_default();

    StateData {
        player_is_paused: !query.is_playing,
        player_autoplay_on: query.session.as_ref().and_then(|s| s.autoplay),
        video_source_height: video.height,
        video_source_width: video.width,
        video_source_duration: query.asset.as_ref().and_then(|a| a.duration).unwrap_or(0.0),
        view_dropped_frame_count: dropped_frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{AssetInfo, PlayerInfo, SessionInfo};
    use crate::types::Dimensions;

    fn ctx() -> SnapshotContext<'static> {
        SnapshotContext {
            locale: "en",
            init_time_ms: 1_700_000_000_000,
            plugin_name: "kino-qos",
            plugin_version: "0.1.0",
        }
    }

    #[test]
    fn test_empty_query_uses_fallbacks() {
        let data = build_snapshot(&PlayerQuery::default(), &Metadata::new(), &ctx());

        assert_eq!(data.get_str("video_id"), Some(""));
        assert_eq!(data.get_str("video_title"), Some(""));
        assert_eq!(data.get_str("video_cdn"), Some(""));
        assert_eq!(data.get_f64("video_duration"), Some(0.0));
        assert_eq!(data.get_f64("viewer_os_architecture"), Some(0.0));
        assert_eq!(data.get_str("video_stream_type"), Some("on-demand"));
        assert_eq!(data.get_str("player_name"), Some(PLAYER_NAME));
        assert_eq!(data.get_f64("player_init_time"), Some(1_700_000_000_000.0));
        assert!(!data.contains_key("sub_property_id"));
    }

    #[test]
    fn test_drm_indicator() {
        let mut query = PlayerQuery::default();
        assert_eq!(DrmIndicator::from_stream(query.stream.as_ref()), None);

        query.stream = Some(StreamInfo::default());
        let data = build_snapshot(&query, &Metadata::new(), &ctx());
        assert_eq!(data.get_str("sub_property_id"), Some("no-drm"));

        query.stream = Some(StreamInfo {
            media_locator: Some("https://cdn.example.com/master.m3u8".to_string()),
            has_drm: true,
        });
        let data = build_snapshot(&query, &Metadata::new(), &ctx());
        assert_eq!(data.get_str("sub_property_id"), Some("drm"));
        assert_eq!(
            data.get_str("video_source_url"),
            Some("https://cdn.example.com/master.m3u8")
        );
    }

    #[test]
    fn test_collaborator_values_and_overrides() {
        let mut asset = AssetInfo {
            asset_id: Some("asset-42".to_string()),
            duration: Some(3600.0),
            ..Default::default()
        };
        asset.titles.insert("en".to_string(), "The Long Take".to_string());

        let query = PlayerQuery {
            player: Some(PlayerInfo {
                engine_name: Some("hls.js".to_string()),
                engine_version: Some("1.5.0".to_string()),
                player_version: Some("2.3.1".to_string()),
            }),
            asset: Some(asset),
            session: Some(SessionInfo {
                play_session_id: Some("ps-1".to_string()),
                cdn_provider: Some("akamai".to_string()),
                autoplay: Some(true),
            }),
            is_live: true,
            ..Default::default()
        };
        let overrides = Metadata::new()
            .with("env_key", "abc123")
            .with("video_title", "Director's Cut");

        let data = build_snapshot(&query, &overrides, &ctx());
        assert_eq!(data.get_str("player_software_name"), Some("hls.js"));
        assert_eq!(data.get_str("player_version"), Some("2.3.1"));
        assert_eq!(data.get_str("view_session_id"), Some("ps-1"));
        assert_eq!(data.get_str("video_cdn"), Some("akamai"));
        assert_eq!(data.get_str("video_id"), Some("asset-42"));
        assert_eq!(data.get_f64("video_duration"), Some(3600.0));
        assert_eq!(data.get_str("video_stream_type"), Some("live"));
        assert_eq!(data.get_str("video_title"), Some("Director's Cut"));
        assert_eq!(data.get_str("env_key"), Some("abc123"));
    }

    #[test]
    fn test_state_data() {
        let query = PlayerQuery {
            video: Some(Dimensions::new(1920, 1080)),
            session: Some(SessionInfo {
                autoplay: Some(false),
                ..Default::default()
            }),
            is_playing: true,
            ..Default::default()
        };

        let state = build_state_data(&query, 7);
        assert!(!state.player_is_paused);
        assert_eq!(state.player_autoplay_on, Some(false));
        assert_eq!(state.video_source_width, 1920);
        assert_eq!(state.video_source_height, 1080);
        assert_eq!(state.video_source_duration, 0.0);
        assert_eq!(state.view_dropped_frame_count, 7);

        let empty = build_state_data(&PlayerQuery::default(), 0);
        assert!(empty.player_is_paused);
        assert_eq!(empty.player_autoplay_on, None);
        assert_eq!(empty.video_source_width, 0);
    }
}
