//! Engine command channel for cedarplayer
//!
//! The native engine lives behind a request/response channel. A session
//! issues [`Command`]s through a [`CommandChannel`] and gets [`Reply`]s back;
//! completion of the asynchronous ones comes back later as an
//! [`EngineEvent`] through the [`CallbackBridge`] registered when the handle
//! was created.
//!
//! Times cross this boundary in milliseconds.

mod command;
mod event;
mod simulated;

pub use command::{Command, DataSource};
pub use event::{EngineEvent, EventTag};
pub use simulated::{EngineScript, SimulatedEngineFactory};

use crate::player::CallbackBridge;
use crate::renderer::Source3dMode;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

/// Media information flag: the stream supports seeking
pub const MEDIA_FLAG_CAN_SEEK: u32 = 1;

/// Request/response channel to one engine handle
///
/// Calls block until the engine acknowledges the command, not until the
/// operation completes. Commands from a single caller are not reordered and
/// are never retried by the channel.
pub trait CommandChannel: Send + Sync {
    /// Issue a command
    ///
    /// # Returns
    ///
    /// The engine's reply. A negative `status` is an engine-side failure;
    /// `Err` means the channel itself failed.
    fn invoke(&self, command: &Command) -> Result<Reply>;
}

/// Creates engine handles
pub trait EngineFactory: Send + Sync {
    /// Create an engine handle and register `bridge` as its event sink
    ///
    /// Dropping the returned channel destroys the handle.
    fn create(&self, bridge: CallbackBridge) -> Result<Box<dyn CommandChannel>>;
}

/// Reply to a [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: i32,
    pub value: ReplyValue,
}

/// Typed payload of a [`Reply`]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReplyValue {
    #[default]
    None,
    Int(i64),
    MediaInfo(MediaInfo),
    Subtitles(Vec<SubtitleInfo>),
    Tracks(Vec<TrackInfo>),
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: 0,
            value: ReplyValue::None,
        }
    }

    pub fn with(value: ReplyValue) -> Self {
        Self { status: 0, value }
    }

    pub fn int(value: i64) -> Self {
        Self::with(ReplyValue::Int(value))
    }

    pub fn failed(status: i32) -> Self {
        Self {
            status,
            value: ReplyValue::None,
        }
    }
}

impl ReplyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ReplyValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Stream metadata read back when preparation finishes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub video_streams: u8,
    pub audio_streams: u8,
    pub subtitle_streams: u8,
    pub duration_ms: u32,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub source_3d_mode: Source3dMode,
}

impl MediaInfo {
    pub fn can_seek(&self) -> bool {
        self.flags & MEDIA_FLAG_CAN_SEEK != 0
    }

    pub fn has_video(&self) -> bool {
        self.video_streams > 0
    }
}

/// Subtitle payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleKind {
    Text,
    Bitmap,
}

/// One subtitle stream as listed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleInfo {
    pub name: String,
    pub charset: String,
    pub kind: SubtitleKind,
}

/// One audio track as listed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    pub charset: String,
}
