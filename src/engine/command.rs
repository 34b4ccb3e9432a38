//! Engine commands and data sources

use crate::player::{EnhancementSetting, ScaleMode, SubtitleSetting};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the engine reads media from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// File path or network URL with optional request headers
    Uri {
        uri: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    /// Region of an already opened file descriptor
    Fd { fd: i32, offset: i64, length: i64 },
    /// Caller-fed stream identified by an opaque id
    Stream { id: u32 },
}

impl DataSource {
    /// URI source without headers
    pub fn uri<S: Into<String>>(uri: S) -> Self {
        DataSource::Uri {
            uri: uri.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Lowercase file extension of a URI source, query and fragment ignored
    pub fn extension(&self) -> Option<String> {
        let DataSource::Uri { uri, .. } = self else {
            return None;
        };
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let name = path.rsplit('/').next().unwrap_or(path);
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Whether the source is fetched over the network
    pub fn is_network(&self) -> bool {
        match self {
            DataSource::Uri { uri, .. } => {
                let lower = uri.to_ascii_lowercase();
                ["http://", "https://", "rtsp://", "mms://"]
                    .iter()
                    .any(|scheme| lower.starts_with(scheme))
            }
            _ => false,
        }
    }
}

/// A command understood by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetDataSource(DataSource),
    /// Blocks in the engine until preparation is done
    Prepare,
    PrepareAsync,
    StartAsync {
        position_ms: i64,
    },
    /// Start playback at a position in one step
    TagStartAsync {
        position_ms: i64,
    },
    PauseAsync,
    StopAsync,
    SeekAsync {
        target_ms: i64,
        current_ms: i64,
    },
    Reset,
    /// Replies with the position in ms, or -1 if unknown
    GetPosition,
    /// Replies with the duration in ms
    GetDuration,
    GetMediaInfo,
    SetSubtitle(SubtitleSetting),
    GetSubtitleCount,
    GetSubtitleList,
    GetCurrentSubtitle,
    SwitchSubtitle(i32),
    GetTrackCount,
    GetTrackList,
    GetCurrentTrack,
    SwitchTrack(i32),
    SetInputDimension(i32),
    SetOutputDimension(i32),
    SetAnaglyphType(i32),
    SetEnhancement(EnhancementSetting),
    SetScaleMode(ScaleMode),
}

impl Command {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetDataSource(_) => "set data source",
            Command::Prepare => "prepare",
            Command::PrepareAsync => "prepare async",
            Command::StartAsync { .. } => "start",
            Command::TagStartAsync { .. } => "tag start",
            Command::PauseAsync => "pause",
            Command::StopAsync => "stop",
            Command::SeekAsync { .. } => "seek",
            Command::Reset => "reset",
            Command::GetPosition => "get position",
            Command::GetDuration => "get duration",
            Command::GetMediaInfo => "get media info",
            Command::SetSubtitle(setting) => setting.name(),
            Command::GetSubtitleCount => "get subtitle count",
            Command::GetSubtitleList => "get subtitle list",
            Command::GetCurrentSubtitle => "get current subtitle",
            Command::SwitchSubtitle(_) => "switch subtitle",
            Command::GetTrackCount => "get track count",
            Command::GetTrackList => "get track list",
            Command::GetCurrentTrack => "get current track",
            Command::SwitchTrack(_) => "switch track",
            Command::SetInputDimension(_) => "set input dimension",
            Command::SetOutputDimension(_) => "set output dimension",
            Command::SetAnaglyphType(_) => "set anaglyph type",
            Command::SetEnhancement(_) => "set enhancement",
            Command::SetScaleMode(_) => "set scale mode",
        }
    }

    /// Commands that start playback
    pub fn is_start(&self) -> bool {
        matches!(
            self,
            Command::StartAsync { .. } | Command::TagStartAsync { .. }
        )
    }
}
