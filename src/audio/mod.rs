//! Audio output module for cedarplayer
//!
//! The engine decodes audio itself and pushes PCM through the callback
//! bridge. This module defines the sink those bytes end up in and the
//! sink-backed player the session creates on the first audio init event.

mod player;

pub use player::AudioPlayer;

use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Audio sink trait defining the interface for PCM output
///
/// Implementations are internally synchronized.
pub trait AudioSink: Send + Sync {
    /// Open the sink for a PCM format
    ///
    /// # Arguments
    ///
    /// * `format` - Format of the bytes that will be written
    fn open(&self, format: &AudioFormat) -> Result<()>;

    /// Start or restart consuming written data
    fn start(&self) -> Result<()>;

    /// Pause immediately, keeping queued data
    fn pause(&self);

    /// Stop after queued data has played out
    fn stop(&self);

    /// Drop queued data
    fn flush(&self);

    /// Release the output
    fn close(&self);

    /// Queue PCM data
    ///
    /// # Returns
    ///
    /// Number of bytes accepted
    fn write(&self, data: &[u8]) -> usize;

    /// Bytes that can be written without blocking
    fn buffer_space(&self) -> usize;

    /// Output latency in milliseconds
    fn latency_ms(&self) -> u32;
}

/// Opens sinks for new sessions
pub trait AudioSinkProvider: Send + Sync {
    /// Open a sink bound to an audio session id
    fn open_sink(&self, audio_session_id: i32) -> Result<Arc<dyn AudioSink>>;
}

/// PCM format reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u16,

    /// Bits per sample
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    /// Bytes per frame across all channels
    pub fn frame_size(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.frame_size() as u64 * self.sample_rate as u64
    }
}
