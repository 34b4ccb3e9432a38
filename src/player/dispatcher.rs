//! Event dispatch from the engine
//!
//! Events arrive on the engine's own threads. Each handler takes the session
//! lock only for its state change and calls the renderer, audio player and
//! listener after releasing it. Events from a handle other than the live one
//! are dropped.

use super::session::{Effect, SessionCore, SessionInner};
use super::{InfoKind, Notification, State};
use crate::audio::{AudioFormat, AudioPlayer};
use crate::engine::{Command, EngineEvent, EventTag};
use crate::renderer::{classify, DisplayMode, FrameInfo, OverlayFrame, RendererParams};
use crate::utils::us_to_ms;
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Weak};

/// Event sink registered with an engine handle
///
/// Carries the generation of the handle it was created for. Cloning is
/// cheap; a bridge outliving its session simply drops events.
#[derive(Clone)]
pub struct CallbackBridge {
    session: Weak<SessionCore>,
    generation: u64,
}

impl CallbackBridge {
    pub(crate) fn new(session: Weak<SessionCore>, generation: u64) -> Self {
        Self {
            session,
            generation,
        }
    }

    /// Generation of the engine handle this bridge belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event
    ///
    /// # Returns
    ///
    /// A tag-specific result: bytes written for audio data, buffer space,
    /// latency or frame id for the queries, and 0 or -1 otherwise.
    pub fn on_event(&self, event: EngineEvent) -> i32 {
        match self.session.upgrade() {
            Some(core) => core.dispatch(self.generation, event),
            None => {
                debug!("Session gone, dropping event {:#x}", event.tag());
                0
            }
        }
    }
}

impl std::fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("generation", &self.generation)
            .finish()
    }
}

impl SessionCore {
    pub(crate) fn dispatch(&self, generation: u64, event: EngineEvent) -> i32 {
        trace!("Event {:#x} (generation {})", event.tag(), generation);
        let tag = event.tag();

        match event {
            EngineEvent::Prepared { status } => self.with_current(generation, tag, 0, |core, inner| {
                if inner.state != State::Preparing {
                    debug!("Ignoring prepared event in state {:?}", inner.state);
                    return 0;
                }
                let _ = core.finish_prepare(inner, status);
                0
            }),
            EngineEvent::PlaybackComplete => {
                self.with_current(generation, tag, 0, |_, inner| on_playback_complete(inner))
            }
            EngineEvent::SeekComplete => {
                self.with_current(generation, tag, 0, |_, inner| on_seek_complete(inner))
            }
            EngineEvent::FatalError { code } => {
                self.with_current(generation, tag, 0, |core, inner| {
                    error!("Engine reported fatal error {}", code);
                    inner.async_prepare = false;
                    inner.prepare_status = code;
                    inner.set_state(State::Error);
                    inner.notify(Notification::Error { code, extra: 0 });
                    core.prepare_done.notify_all();
                    0
                })
            }
            EngineEvent::BufferingStart => self.with_current(generation, tag, 0, |_, inner| {
                if inner.state == State::Started {
                    inner.cache_underrun = true;
                    inner.notify(Notification::Info {
                        kind: InfoKind::BufferingStart,
                        extra: 0,
                    });
                }
                0
            }),
            EngineEvent::BufferingEnd => self.with_current(generation, tag, 0, |_, inner| {
                inner.cache_underrun = false;
                inner.notify(Notification::BufferingUpdate(0));
                inner.notify(Notification::Info {
                    kind: InfoKind::BufferingEnd,
                    extra: 0,
                });
                0
            }),
            EngineEvent::BufferingUpdate { percent } => {
                self.with_current(generation, tag, 0, |_, inner| {
                    on_buffering_update(inner, percent);
                    0
                })
            }
            EngineEvent::Source3dModeDetected(mode) => {
                self.with_current(generation, tag, 0, |_, inner| {
                    inner.notify(Notification::Info {
                        kind: InfoKind::Source3dMode,
                        extra: mode.code(),
                    });
                    0
                })
            }
            EngineEvent::VideoRenderInit(frame) => self.on_video_render_init(generation, frame),
            EngineEvent::VideoRenderData(frame) => self.on_video_render_data(generation, frame),
            EngineEvent::VideoRenderGetFrameId => {
                let renderer =
                    self.with_current(generation, tag, None, |_, inner| inner.renderer.clone());
                renderer.map_or(-1, |r| r.frame_id())
            }
            EngineEvent::AudioRenderInit(format) => self.on_audio_render_init(generation, format),
            EngineEvent::AudioRenderExit => {
                let audio = self.with_current(generation, tag, None, |_, inner| inner.audio.take());
                if let Some(audio) = audio {
                    audio.stop();
                    debug!("Audio player released");
                }
                0
            }
            EngineEvent::AudioRenderData(data) => {
                let audio = self.with_current(generation, tag, None, |_, inner| inner.audio.clone());
                audio.map_or(0, |a| a.render(&data) as i32)
            }
            EngineEvent::AudioRenderGetSpace => {
                let audio = self.with_current(generation, tag, None, |_, inner| inner.audio.clone());
                audio.map_or(0, |a| a.space() as i32)
            }
            EngineEvent::AudioRenderGetDelay => {
                let audio = self.with_current(generation, tag, None, |_, inner| inner.audio.clone());
                audio.map_or(0, |a| a.latency_us() as i32)
            }
            EngineEvent::Unknown(tag) => {
                debug!("Ignoring unknown event {:#x}", tag);
                0
            }
        }
    }

    /// Run a handler if `generation` names the live handle
    fn with_current<T>(
        &self,
        generation: u64,
        tag: u32,
        stale: T,
        handler: impl FnOnce(&SessionCore, &mut SessionInner) -> T,
    ) -> T {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            debug!(
                "Discarding event {:#x} from stale engine handle (generation {})",
                tag, generation
            );
            return stale;
        }
        let result = handler(self, &mut *inner);
        self.flush(inner);
        result
    }

    fn on_video_render_init(&self, generation: u64, frame: FrameInfo) -> i32 {
        let tag = EventTag::VideoRenderInit as u32;
        let params = self.with_current(generation, tag, None, |_, inner| {
            let (width, height) = frame.visible_size();
            if (width, height) != (inner.video_width, inner.video_height) {
                inner.video_width = width;
                inner.video_height = height;
                inner.notify(Notification::VideoSizeChanged { width, height });
            }
            Some(RendererParams {
                width,
                height,
                format: frame.format,
                screen: inner.screen,
            })
        });
        let Some(params) = params else {
            return 0;
        };

        let Some(factory) = self.renderer_factory.clone() else {
            debug!("No renderer factory, video output disabled");
            return 0;
        };
        let renderer = match factory.create(&params) {
            Ok(renderer) => renderer,
            Err(e) => {
                error!("Failed to create video renderer: {}", e);
                return -1;
            }
        };

        if frame.display_mode != DisplayMode::Original {
            if let Err(e) = renderer.configure_stereo(&classify(&frame, false)) {
                warn!("Failed to configure stereo output: {}", e);
            }
        }

        let installed = self.with_current(generation, tag, false, |_, inner| {
            if let Some(old) = inner.renderer.replace(Arc::clone(&renderer)) {
                inner.effect(Effect::ReleaseRenderer(old));
            }
            true
        });
        if installed {
            info!(
                "Video renderer ready ({}x{}, {:?})",
                params.width, params.height, params.format
            );
        }
        0
    }

    fn on_video_render_data(&self, generation: u64, frame: FrameInfo) -> i32 {
        let renderer = self.with_current(generation, EventTag::VideoRenderData as u32, None, |_, inner| {
            inner.renderer.clone()
        });
        let Some(renderer) = renderer else {
            return 0;
        };

        if frame.display_mode_changed {
            debug!("Display mode changed to {:?}", frame.display_mode);
            if let Err(e) = renderer.configure_stereo(&classify(&frame, true)) {
                warn!("Failed to reconfigure stereo output: {}", e);
            }
        }
        match renderer.render(&OverlayFrame::from_frame(&frame)) {
            Ok(()) => 0,
            Err(e) => {
                warn!("Failed to render frame {}: {}", frame.frame_id, e);
                -1
            }
        }
    }

    fn on_audio_render_init(&self, generation: u64, format: AudioFormat) -> i32 {
        let tag = EventTag::AudioRenderInit as u32;
        let existing = self.with_current(generation, tag, Err(()), |_, inner| {
            Ok(inner.audio.clone())
        });
        match existing {
            Err(()) => return 0,
            Ok(Some(audio)) => {
                return match audio.resume() {
                    Ok(()) => 0,
                    Err(e) => {
                        warn!("Failed to resume audio player: {}", e);
                        -1
                    }
                };
            }
            Ok(None) => {}
        }

        let Some(sink) = self.audio_sink() else {
            debug!("No audio sink, audio output disabled");
            return 0;
        };
        let audio = Arc::new(AudioPlayer::new(sink, format));
        if let Err(e) = audio.start() {
            error!("Failed to start audio player: {}", e);
            return -1;
        }

        let installed = self.with_current(generation, tag, false, |_, inner| {
            if inner.audio.is_some() {
                return false;
            }
            inner.audio = Some(Arc::clone(&audio));
            true
        });
        if !installed {
            audio.stop();
            return 0;
        }
        info!(
            "Audio player ready ({} Hz, {} ch)",
            format.sample_rate, format.channels
        );
        0
    }
}

fn on_playback_complete(inner: &mut SessionInner) -> i32 {
    if !matches!(inner.state, State::Started | State::Paused) {
        debug!("Ignoring playback complete in state {:?}", inner.state);
        return 0;
    }

    if inner.looping && inner.state == State::Started {
        match inner.call(Command::TagStartAsync { position_ms: 0 }) {
            Ok(_) => {
                debug!("Looping back to start");
                inner.position_us = 0;
                inner.at_eos = false;
                if let Some(audio) = inner.audio.clone() {
                    inner.effect(Effect::SeekAudio(audio));
                }
                return 0;
            }
            Err(e) => warn!("Failed to loop playback: {}", e),
        }
    }

    info!("Playback complete");
    inner.at_eos = true;
    inner.pending_seek = None;
    inner.stop_l();
    inner.set_state(State::PlaybackComplete);
    0
}

fn on_seek_complete(inner: &mut SessionInner) -> i32 {
    let Some(mut seek) = inner.pending_seek else {
        debug!("Seek complete without a pending seek");
        return 0;
    };
    if seek.is_deferred() {
        return 0;
    }

    if seek.needs_follow_up() {
        let issued = seek.issued_us.unwrap_or(seek.target_us);
        let command = Command::SeekAsync {
            target_ms: us_to_ms(seek.target_us),
            current_ms: us_to_ms(issued),
        };
        match inner.call(command) {
            Ok(_) => {
                debug!("Issuing queued seek to {} us", seek.target_us);
                seek.issued_us = Some(seek.target_us);
                inner.pending_seek = Some(seek);
                return 0;
            }
            Err(e) => warn!("Queued seek failed: {}", e),
        }
    }

    inner.pending_seek = None;
    if !seek.notification_sent {
        inner.notify(Notification::SeekComplete);
    }
    if let Some(audio) = inner.audio.clone() {
        inner.effect(Effect::SeekAudio(audio));
    }
    0
}

/// Weight download progress by the part of the stream still ahead
fn on_buffering_update(inner: &mut SessionInner, percent: i32) {
    let percent = percent.clamp(0, 100) as i64;
    let duration = match inner.known_duration_us() {
        Some(duration) => duration,
        None => inner.duration_l().unwrap_or(0),
    };
    if duration <= 0 {
        trace!("Dropping buffering update without a duration");
        return;
    }

    let position = inner.position_l().unwrap_or(inner.position_us).clamp(0, duration);
    let buffered = position + (duration - position) * percent / 100;
    let weighted = (buffered * 100 / duration) as i32;
    inner.notify(Notification::BufferingUpdate(weighted));
}
