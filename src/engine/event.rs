//! Events emitted by the engine

use crate::audio::AudioFormat;
use crate::renderer::{FrameInfo, Source3dMode};

/// Numeric event tags as they appear on the engine's callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventTag {
    Prepared = 1,
    PlaybackComplete = 2,
    SeekComplete = 4,
    FatalError = 8,
    BufferingStart = 16,
    BufferingEnd = 32,
    BufferingUpdate = 64,
    Source3dMode = 65,
    VideoRenderInit = 0x10000,
    VideoRenderData = 0x10001,
    VideoRenderGetFrameId = 0x10002,
    AudioRenderInit = 0x10003,
    AudioRenderExit = 0x10004,
    AudioRenderData = 0x10005,
    AudioRenderGetSpace = 0x10006,
    AudioRenderGetDelay = 0x10007,
}

impl EventTag {
    pub fn from_u32(tag: u32) -> Option<Self> {
        let tag = match tag {
            1 => EventTag::Prepared,
            2 => EventTag::PlaybackComplete,
            4 => EventTag::SeekComplete,
            8 => EventTag::FatalError,
            16 => EventTag::BufferingStart,
            32 => EventTag::BufferingEnd,
            64 => EventTag::BufferingUpdate,
            65 => EventTag::Source3dMode,
            0x10000 => EventTag::VideoRenderInit,
            0x10001 => EventTag::VideoRenderData,
            0x10002 => EventTag::VideoRenderGetFrameId,
            0x10003 => EventTag::AudioRenderInit,
            0x10004 => EventTag::AudioRenderExit,
            0x10005 => EventTag::AudioRenderData,
            0x10006 => EventTag::AudioRenderGetSpace,
            0x10007 => EventTag::AudioRenderGetDelay,
            _ => return None,
        };
        Some(tag)
    }
}

/// An event delivered through the callback bridge
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Asynchronous prepare finished; a negative status aborts it
    Prepared { status: i32 },
    PlaybackComplete,
    SeekComplete,
    FatalError { code: i32 },
    BufferingStart,
    BufferingEnd,
    /// Raw download progress in percent
    BufferingUpdate { percent: i32 },
    Source3dModeDetected(Source3dMode),
    VideoRenderInit(FrameInfo),
    VideoRenderData(FrameInfo),
    VideoRenderGetFrameId,
    AudioRenderInit(AudioFormat),
    AudioRenderExit,
    AudioRenderData(Vec<u8>),
    AudioRenderGetSpace,
    AudioRenderGetDelay,
    /// A tag this crate does not know about
    Unknown(u32),
}

impl EngineEvent {
    pub fn tag(&self) -> u32 {
        let tag = match self {
            EngineEvent::Prepared { .. } => EventTag::Prepared,
            EngineEvent::PlaybackComplete => EventTag::PlaybackComplete,
            EngineEvent::SeekComplete => EventTag::SeekComplete,
            EngineEvent::FatalError { .. } => EventTag::FatalError,
            EngineEvent::BufferingStart => EventTag::BufferingStart,
            EngineEvent::BufferingEnd => EventTag::BufferingEnd,
            EngineEvent::BufferingUpdate { .. } => EventTag::BufferingUpdate,
            EngineEvent::Source3dModeDetected(_) => EventTag::Source3dMode,
            EngineEvent::VideoRenderInit(_) => EventTag::VideoRenderInit,
            EngineEvent::VideoRenderData(_) => EventTag::VideoRenderData,
            EngineEvent::VideoRenderGetFrameId => EventTag::VideoRenderGetFrameId,
            EngineEvent::AudioRenderInit(_) => EventTag::AudioRenderInit,
            EngineEvent::AudioRenderExit => EventTag::AudioRenderExit,
            EngineEvent::AudioRenderData(_) => EventTag::AudioRenderData,
            EngineEvent::AudioRenderGetSpace => EventTag::AudioRenderGetSpace,
            EngineEvent::AudioRenderGetDelay => EventTag::AudioRenderGetDelay,
            EngineEvent::Unknown(tag) => return *tag,
        };
        tag as u32
    }
}
