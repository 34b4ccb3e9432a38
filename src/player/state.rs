//! Session state for cedarplayer
//!
//! Lifecycle state, checkpoint markers and the cached property sets a
//! session keeps whether or not an engine handle exists.

use crate::engine::DataSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a player session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// No data source; the state after construction and `reset`
    Idle,
    /// Data source accepted by the engine
    Initialized,
    /// Prepare issued and not yet finished
    Preparing,
    Prepared,
    Started,
    Paused,
    /// End of stream reached; `start` plays again from the beginning
    PlaybackComplete,
    Stopped,
    /// Absorbing until `reset`
    Error,
}

impl State {
    /// States in which seeking and position queries make sense
    pub fn is_playable(self) -> bool {
        matches!(
            self,
            State::Prepared | State::Started | State::Paused | State::PlaybackComplete
        )
    }

    /// States from which a prepare can be issued
    pub fn can_prepare(self) -> bool {
        matches!(self, State::Initialized | State::Stopped)
    }

    /// States that already passed a successful prepare
    pub fn is_prepared(self) -> bool {
        self.is_playable()
    }
}

/// Suspend/resume marker layered on top of the lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Checkpoint {
    #[default]
    None,
    /// Engine handle torn down, snapshot held
    Suspended,
    /// Engine handle recreated from the snapshot
    Resumed,
}

/// Output screen of a dual-display device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    #[default]
    Master,
    Slave,
}

impl Screen {
    /// Screen from its protocol value (0 master, 1 slave)
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Screen::Master),
            1 => Some(Screen::Slave),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Screen::Master => 0,
            Screen::Slave => 1,
        }
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" | "0" => Ok(Screen::Master),
            "slave" | "1" => Ok(Screen::Slave),
            other => Err(format!("unknown screen '{}'", other)),
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Master => write!(f, "master"),
            Screen::Slave => write!(f, "slave"),
        }
    }
}

/// One subtitle property, as sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleSetting {
    Gate(bool),
    Color(u32),
    FrameColor(u32),
    FontSize(i32),
    Position(i32),
    Delay(i32),
    Charset(String),
}

impl SubtitleSetting {
    pub fn name(&self) -> &'static str {
        match self {
            SubtitleSetting::Gate(_) => "subtitle gate",
            SubtitleSetting::Color(_) => "subtitle color",
            SubtitleSetting::FrameColor(_) => "subtitle frame color",
            SubtitleSetting::FontSize(_) => "subtitle font size",
            SubtitleSetting::Position(_) => "subtitle position",
            SubtitleSetting::Delay(_) => "subtitle delay",
            SubtitleSetting::Charset(_) => "subtitle charset",
        }
    }
}

/// Subtitle rendering parameters
///
/// Always valid, with or without an engine handle. Values that differ from
/// [`SubtitleParameters::default`] are replayed onto every new engine handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleParameters {
    pub gate: bool,
    pub color: u32,
    pub frame_color: u32,
    pub font_size: i32,
    pub position: i32,
    pub delay_ms: i32,
    pub charset: String,
}

impl Default for SubtitleParameters {
    fn default() -> Self {
        Self {
            gate: true,
            color: 0xFFFF_FFFF,
            frame_color: 0xFF00_0000,
            font_size: 24,
            position: 0,
            delay_ms: 0,
            charset: "GBK".to_string(),
        }
    }
}

impl SubtitleParameters {
    /// Store a single setting
    pub fn apply(&mut self, setting: &SubtitleSetting) {
        match setting {
            SubtitleSetting::Gate(v) => self.gate = *v,
            SubtitleSetting::Color(v) => self.color = *v,
            SubtitleSetting::FrameColor(v) => self.frame_color = *v,
            SubtitleSetting::FontSize(v) => self.font_size = *v,
            SubtitleSetting::Position(v) => self.position = *v,
            SubtitleSetting::Delay(v) => self.delay_ms = *v,
            SubtitleSetting::Charset(v) => self.charset = v.clone(),
        }
    }

    /// Every setting, gate last
    pub fn settings(&self) -> Vec<SubtitleSetting> {
        vec![
            SubtitleSetting::Charset(self.charset.clone()),
            SubtitleSetting::FrameColor(self.frame_color),
            SubtitleSetting::Delay(self.delay_ms),
            SubtitleSetting::Color(self.color),
            SubtitleSetting::FontSize(self.font_size),
            SubtitleSetting::Position(self.position),
            SubtitleSetting::Gate(self.gate),
        ]
    }

    /// Non-default settings replayed before the first start on a new engine
    /// handle: delay, color, font size, position, then gate.
    ///
    /// The gate goes last so a visible subtitle never shows stale styling.
    pub fn restore_plan(&self) -> Vec<SubtitleSetting> {
        let defaults = Self::default();
        let mut plan = Vec::new();
        if self.delay_ms != defaults.delay_ms {
            plan.push(SubtitleSetting::Delay(self.delay_ms));
        }
        if self.color != defaults.color {
            plan.push(SubtitleSetting::Color(self.color));
        }
        if self.font_size != defaults.font_size {
            plan.push(SubtitleSetting::FontSize(self.font_size));
        }
        if self.position != defaults.position {
            plan.push(SubtitleSetting::Position(self.position));
        }
        if self.gate != defaults.gate {
            plan.push(SubtitleSetting::Gate(self.gate));
        }
        plan
    }

    /// Non-default settings replayed as soon as an engine handle is created
    pub fn creation_plan(&self) -> Vec<SubtitleSetting> {
        let defaults = Self::default();
        let mut plan = Vec::new();
        if self.charset != defaults.charset {
            plan.push(SubtitleSetting::Charset(self.charset.clone()));
        }
        if self.frame_color != defaults.frame_color {
            plan.push(SubtitleSetting::FrameColor(self.frame_color));
        }
        plan
    }
}

/// One image enhancement property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnhancementSetting {
    VppGate(bool),
    LumaSharp(i32),
    ChromaSharp(i32),
    WhiteExtend(i32),
    BlackExtend(i32),
}

/// Image enhancement settings of the video post-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enhancement {
    pub vpp_gate: bool,
    pub luma_sharp: i32,
    pub chroma_sharp: i32,
    pub white_extend: i32,
    pub black_extend: i32,
}

impl Enhancement {
    pub fn apply(&mut self, setting: EnhancementSetting) {
        match setting {
            EnhancementSetting::VppGate(v) => self.vpp_gate = v,
            EnhancementSetting::LumaSharp(v) => self.luma_sharp = v,
            EnhancementSetting::ChromaSharp(v) => self.chroma_sharp = v,
            EnhancementSetting::WhiteExtend(v) => self.white_extend = v,
            EnhancementSetting::BlackExtend(v) => self.black_extend = v,
        }
    }

    pub fn settings(&self) -> Vec<EnhancementSetting> {
        vec![
            EnhancementSetting::VppGate(self.vpp_gate),
            EnhancementSetting::LumaSharp(self.luma_sharp),
            EnhancementSetting::ChromaSharp(self.chroma_sharp),
            EnhancementSetting::WhiteExtend(self.white_extend),
            EnhancementSetting::BlackExtend(self.black_extend),
        ]
    }

    /// Settings that differ from the post-processor's power-on values
    pub fn replay_plan(&self) -> Vec<EnhancementSetting> {
        let defaults = Self::default();
        self.settings()
            .into_iter()
            .zip(defaults.settings())
            .filter(|(current, default)| current != default)
            .map(|(current, _)| current)
            .collect()
    }
}

/// Hardware scaler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScaleMode {
    pub enabled: bool,
    pub width: i32,
    pub height: i32,
}

/// Stereoscopic presentation requested by the caller
///
/// Codes follow the input/output dimension tables of the overlay: input 0
/// is 2D, output 0 is the original picture, anaglyph -1 is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoSettings {
    pub input_dimension: i32,
    pub output_dimension: i32,
    pub anaglyph: i32,
}

impl Default for StereoSettings {
    fn default() -> Self {
        Self {
            input_dimension: 0,
            output_dimension: 0,
            anaglyph: -1,
        }
    }
}

/// Snapshot taken by `suspend` and consumed by `resume`
#[derive(Debug, Clone, Default)]
pub struct SuspensionState {
    pub source: Option<DataSource>,
    pub was_playing: bool,
    pub looping: bool,
    pub at_eos: bool,
    pub position_us: i64,
}

/// The one outstanding seek of a session
///
/// `issued_us` is the target the engine is currently working on; `None`
/// means the seek is held locally until the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSeek {
    pub target_us: i64,
    pub issued_us: Option<i64>,
    pub notification_sent: bool,
}

impl PendingSeek {
    /// A seek sent to a playing engine; completion comes back as an event
    pub fn issued(target_us: i64) -> Self {
        Self {
            target_us,
            issued_us: Some(target_us),
            notification_sent: false,
        }
    }

    /// A seek held until playback starts; completion was reported locally
    pub fn deferred(target_us: i64) -> Self {
        Self {
            target_us,
            issued_us: None,
            notification_sent: true,
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.issued_us.is_none()
    }

    /// Whether the latest target moved past what the engine was told
    pub fn needs_follow_up(&self) -> bool {
        matches!(self.issued_us, Some(issued) if issued != self.target_us)
    }
}

/// How `start` asks the engine to begin playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartVariant {
    /// Tag-start at a seek target held while not playing
    TagAtSeek(i64),
    /// Tag-start at the position captured by `suspend`
    TagAtSnapshot(i64),
    /// Plain start at the cached position
    Plain(i64),
}

impl StartVariant {
    pub fn position_us(self) -> i64 {
        match self {
            StartVariant::TagAtSeek(us)
            | StartVariant::TagAtSnapshot(us)
            | StartVariant::Plain(us) => us,
        }
    }
}
