//! Player session module for cedarplayer
//!
//! This module owns the playback lifecycle: the session state machine that
//! issues engine commands, the callback bridge the engine delivers events
//! through, and the listener the session reports to.

mod dispatcher;
mod listener;
mod session;
mod state;

pub use dispatcher::CallbackBridge;
pub use listener::{ListenerToken, PlayerListener};
pub use session::{PlayerSession, SessionBuilder};
pub use state::{
    Checkpoint, Enhancement, EnhancementSetting, PendingSeek, ScaleMode, Screen, StartVariant,
    State, StereoSettings, SubtitleParameters, SubtitleSetting, SuspensionState,
};

/// Error code reported with [`Notification::Error`] when prepare is aborted
pub const MEDIA_ERROR_UNKNOWN: i32 = 1;

/// Kind of an informational notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    BufferingStart,
    BufferingEnd,
    /// The engine detected a stereoscopic source; extra carries its code
    Source3dMode,
    Other(i32),
}

impl InfoKind {
    /// Numeric info code used on the wire
    pub fn code(self) -> i32 {
        match self {
            InfoKind::BufferingStart => 701,
            InfoKind::BufferingEnd => 702,
            InfoKind::Source3dMode => 900,
            InfoKind::Other(code) => code,
        }
    }
}

/// Notification delivered to a [`PlayerListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Prepared,
    PlaybackComplete,
    SeekComplete,
    /// Buffered percentage weighted by the remaining duration
    BufferingUpdate(i32),
    VideoSizeChanged { width: u32, height: u32 },
    Error { code: i32, extra: i32 },
    Info { kind: InfoKind, extra: i32 },
    TimedText(String),
}

impl Notification {
    /// Short name used in logs and by the demo binary
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Prepared => "prepared",
            Notification::PlaybackComplete => "playback-complete",
            Notification::SeekComplete => "seek-complete",
            Notification::BufferingUpdate(_) => "buffering-update",
            Notification::VideoSizeChanged { .. } => "video-size-changed",
            Notification::Error { .. } => "error",
            Notification::Info { .. } => "info",
            Notification::TimedText(_) => "timed-text",
        }
    }
}
