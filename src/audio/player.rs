//! Sink-backed audio player

use super::{AudioFormat, AudioSink};
use crate::utils::error::Result;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Plays engine-decoded PCM through an [`AudioSink`]
///
/// Keeps its own clock from the number of bytes accepted by the sink; a
/// seek rebases it.
pub struct AudioPlayer {
    sink: Arc<dyn AudioSink>,
    format: AudioFormat,
    clock: Mutex<PlayerClock>,
}

#[derive(Debug, Default)]
struct PlayerClock {
    started: bool,
    paused: bool,
    bytes_written: u64,
    base_us: i64,
}

impl AudioPlayer {
    pub fn new(sink: Arc<dyn AudioSink>, format: AudioFormat) -> Self {
        Self {
            sink,
            format,
            clock: Mutex::new(PlayerClock::default()),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Open and start the sink
    ///
    /// On failure the sink is closed again and the player stays unstarted.
    pub fn start(&self) -> Result<()> {
        let mut clock = self.clock.lock();
        if clock.started {
            return Ok(());
        }

        self.sink.open(&self.format)?;
        if let Err(e) = self.sink.start() {
            warn!("Audio sink failed to start: {}", e);
            self.sink.close();
            return Err(e);
        }

        clock.started = true;
        clock.paused = false;
        debug!(
            "Audio player started ({} Hz, {} ch)",
            self.format.sample_rate, self.format.channels
        );
        Ok(())
    }

    /// Pause output
    ///
    /// # Arguments
    ///
    /// * `play_pending` - Let already queued samples play out first
    pub fn pause(&self, play_pending: bool) {
        let mut clock = self.clock.lock();
        if !clock.started || clock.paused {
            return;
        }
        if play_pending {
            self.sink.stop();
        } else {
            self.sink.pause();
        }
        clock.paused = true;
    }

    /// Resume after a pause, starting the sink if it never ran
    pub fn resume(&self) -> Result<()> {
        let needs_start = {
            let mut clock = self.clock.lock();
            if clock.started {
                if clock.paused {
                    self.sink.start()?;
                    clock.paused = false;
                }
                false
            } else {
                true
            }
        };

        if needs_start {
            self.start()?;
        }
        Ok(())
    }

    /// Queue PCM data
    ///
    /// # Returns
    ///
    /// Bytes accepted; nothing is accepted while paused or unstarted
    pub fn render(&self, data: &[u8]) -> usize {
        let mut clock = self.clock.lock();
        if !clock.started || clock.paused {
            return 0;
        }
        let written = self.sink.write(data);
        clock.bytes_written += written as u64;
        written
    }

    pub fn space(&self) -> usize {
        self.sink.buffer_space()
    }

    pub fn latency_us(&self) -> i64 {
        self.sink.latency_ms() as i64 * 1000
    }

    /// Rebase the clock after the engine moved to `time_us`
    pub fn seek_to(&self, time_us: i64) {
        let mut clock = self.clock.lock();
        clock.bytes_written = 0;
        clock.base_us = time_us;
        if clock.started {
            self.sink.flush();
        }
    }

    /// Media time of the last byte accepted by the sink
    pub fn position_us(&self) -> i64 {
        let clock = self.clock.lock();
        let rate = self.format.bytes_per_second();
        if rate == 0 {
            return clock.base_us;
        }
        clock.base_us + (clock.bytes_written as i64 * 1_000_000) / rate as i64
    }

    pub fn is_started(&self) -> bool {
        self.clock.lock().started
    }

    pub fn is_paused(&self) -> bool {
        self.clock.lock().paused
    }

    /// Stop and close the sink
    pub fn stop(&self) {
        let mut clock = self.clock.lock();
        if clock.started {
            self.sink.stop();
            self.sink.close();
            clock.started = false;
            clock.paused = false;
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
