//! Player session state machine
//!
//! A [`PlayerSession`] proxies every playback command to one engine handle
//! and tracks the asynchronous lifecycle around it. All lifecycle state sits
//! behind a single mutex; the audio session id and sink sit behind a second,
//! narrower lock.
//!
//! Listener notifications and calls into the renderer or audio player are
//! collected while the lock is held and run after it is released.

use super::listener::{ListenerSlot, ListenerToken, PlayerListener};
use super::state::{
    Checkpoint, Enhancement, EnhancementSetting, PendingSeek, ScaleMode, Screen, StartVariant,
    State, StereoSettings, SubtitleParameters, SubtitleSetting, SuspensionState,
};
use super::{CallbackBridge, Notification, MEDIA_ERROR_UNKNOWN};
use crate::audio::{AudioPlayer, AudioSink};
use crate::engine::{
    Command, CommandChannel, DataSource, EngineFactory, MediaInfo, ReplyValue, SubtitleInfo,
    TrackInfo,
};
use crate::renderer::{RendererFactory, StereoConfig, VideoRenderer};
use crate::utils::error::{PlayerError, Result};
use crate::utils::{ms_to_us, us_to_ms};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::sync::{Arc, Weak};

/// Engine handle owned by a session, tagged with its generation
pub(crate) struct EngineHandle {
    pub(crate) channel: Box<dyn CommandChannel>,
    pub(crate) generation: u64,
}

/// Side effect run after the session lock is released
pub(crate) enum Effect {
    PauseAudio(Arc<AudioPlayer>, bool),
    ResumeAudio(Arc<AudioPlayer>),
    SeekAudio(Arc<AudioPlayer>),
    StopAudio(Arc<AudioPlayer>),
    ReleaseRenderer(Arc<dyn VideoRenderer>),
    SetScreen(Arc<dyn VideoRenderer>, Screen),
    ConfigureStereo(Arc<dyn VideoRenderer>, StereoConfig),
    ReleaseEngine(Box<dyn CommandChannel>),
}

impl Effect {
    fn run(self) {
        match self {
            Effect::PauseAudio(audio, play_pending) => audio.pause(play_pending),
            Effect::ResumeAudio(audio) => {
                if let Err(e) = audio.resume() {
                    warn!("Failed to resume audio: {}", e);
                }
            }
            Effect::SeekAudio(audio) => audio.seek_to(0),
            Effect::StopAudio(audio) => audio.stop(),
            Effect::ReleaseRenderer(renderer) => drop(renderer),
            Effect::SetScreen(renderer, screen) => {
                if let Err(e) = renderer.set_screen(screen) {
                    warn!("Failed to move renderer to {} screen: {}", screen, e);
                }
            }
            Effect::ConfigureStereo(renderer, config) => {
                if let Err(e) = renderer.configure_stereo(&config) {
                    warn!("Failed to configure stereo output: {}", e);
                }
            }
            Effect::ReleaseEngine(channel) => drop(channel),
        }
    }
}

/// Work collected under the lock
#[derive(Default)]
pub(crate) struct Outbox {
    notes: Vec<Notification>,
    effects: Vec<Effect>,
}

/// State guarded by the session mutex
pub(crate) struct SessionInner {
    pub(crate) state: State,
    pub(crate) checkpoint: Checkpoint,
    pub(crate) looping: bool,
    pub(crate) at_eos: bool,
    pub(crate) cache_underrun: bool,
    restore_pending: bool,
    pub(crate) async_prepare: bool,
    pub(crate) prepare_status: i32,

    pub(crate) engine: Option<EngineHandle>,
    generation: u64,
    source: Option<DataSource>,

    pub(crate) media_info: Option<MediaInfo>,
    duration_us: Option<i64>,
    pub(crate) position_us: i64,
    last_seek_us: i64,
    pub(crate) pending_seek: Option<PendingSeek>,

    subtitles: SubtitleParameters,
    pub(crate) screen: Screen,
    enhancement: Enhancement,
    scale: ScaleMode,
    stereo: StereoSettings,
    suspension: SuspensionState,

    pub(crate) renderer: Option<Arc<dyn VideoRenderer>>,
    pub(crate) audio: Option<Arc<AudioPlayer>>,
    pub(crate) video_width: u32,
    pub(crate) video_height: u32,
    sub_index: i32,
    track_index: i32,

    outbox: Outbox,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: State::Idle,
            checkpoint: Checkpoint::None,
            looping: false,
            at_eos: false,
            cache_underrun: false,
            restore_pending: false,
            async_prepare: false,
            prepare_status: 0,
            engine: None,
            generation: 0,
            source: None,
            media_info: None,
            duration_us: None,
            position_us: 0,
            last_seek_us: 0,
            pending_seek: None,
            subtitles: SubtitleParameters::default(),
            screen: Screen::default(),
            enhancement: Enhancement::default(),
            scale: ScaleMode::default(),
            stereo: StereoSettings::default(),
            suspension: SuspensionState::default(),
            renderer: None,
            audio: None,
            video_width: 0,
            video_height: 0,
            sub_index: -1,
            track_index: -1,
            outbox: Outbox::default(),
        }
    }

    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("Session state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        self.outbox.notes.push(notification);
    }

    pub(crate) fn effect(&mut self, effect: Effect) {
        self.outbox.effects.push(effect);
    }

    /// Whether events tagged with `generation` belong to the live handle
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        matches!(&self.engine, Some(engine) if engine.generation == generation)
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.checkpoint == Checkpoint::Suspended
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.state == State::Started || self.cache_underrun
    }

    fn check_active(&self, operation: &'static str) -> Result<()> {
        if self.is_suspended() {
            debug!("Rejecting {} while suspended", operation);
            return Err(PlayerError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> PlayerError {
        debug!("Rejecting {} in state {:?}", operation, self.state);
        PlayerError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Issue a command on the live handle
    pub(crate) fn call(&self, command: Command) -> Result<ReplyValue> {
        let Some(engine) = &self.engine else {
            return Err(self.invalid(command.name()));
        };

        let reply = engine.channel.invoke(&command).map_err(|e| {
            error!("Command channel failed on {}: {}", command.name(), e);
            match e {
                PlayerError::Transport(_) => e,
                other => PlayerError::transport(other.to_string()),
            }
        })?;

        if reply.status < 0 {
            warn!(
                "Engine rejected {} with status {}",
                command.name(),
                reply.status
            );
            return Err(PlayerError::Engine {
                command: command.name(),
                code: reply.status,
            });
        }
        Ok(reply.value)
    }

    /// Forward a cached setting when a live, healthy handle exists
    fn forward(&self, command: Command) -> Result<()> {
        if self.engine.is_none() || self.state == State::Error || self.is_suspended() {
            return Ok(());
        }
        self.call(command).map(|_| ())
    }

    /// Replay settings that must reach a handle as soon as it exists
    fn replay_on_create(&self) {
        let mut plan: Vec<Command> = self
            .subtitles
            .creation_plan()
            .into_iter()
            .map(Command::SetSubtitle)
            .collect();
        plan.extend(
            self.enhancement
                .replay_plan()
                .into_iter()
                .map(Command::SetEnhancement),
        );
        if self.scale != ScaleMode::default() {
            plan.push(Command::SetScaleMode(self.scale));
        }

        let stereo_defaults = StereoSettings::default();
        if self.stereo.input_dimension != stereo_defaults.input_dimension {
            plan.push(Command::SetInputDimension(self.stereo.input_dimension));
        }
        if self.stereo.output_dimension != stereo_defaults.output_dimension {
            plan.push(Command::SetOutputDimension(self.stereo.output_dimension));
        }
        if self.stereo.anaglyph != stereo_defaults.anaglyph {
            plan.push(Command::SetAnaglyphType(self.stereo.anaglyph));
        }

        for command in plan {
            if let Err(e) = self.call(command) {
                warn!("Failed to replay setting on new engine handle: {}", e);
            }
        }
    }

    fn start_variant(&self) -> StartVariant {
        if let Some(seek) = &self.pending_seek {
            if seek.is_deferred() {
                return StartVariant::TagAtSeek(seek.target_us);
            }
        }
        if self.checkpoint == Checkpoint::Resumed && self.suspension.source.is_some() {
            return StartVariant::TagAtSnapshot(self.suspension.position_us);
        }
        StartVariant::Plain(if self.at_eos { 0 } else { self.position_us })
    }

    /// Pause the audio player; `play_pending` lets queued samples drain
    pub(crate) fn pause_l(&mut self, play_pending: bool) {
        if let Some(audio) = self.audio.clone() {
            self.effect(Effect::PauseAudio(audio, play_pending));
        }
        self.cache_underrun = false;
    }

    /// Stop sequence shared by `stop` and natural completion
    pub(crate) fn stop_l(&mut self) {
        self.notify(Notification::Info {
            kind: super::InfoKind::BufferingEnd,
            extra: 0,
        });
        self.notify(Notification::PlaybackComplete);
        self.pause_l(true);
        if let Some(renderer) = self.renderer.take() {
            self.effect(Effect::ReleaseRenderer(renderer));
        }
    }

    pub(crate) fn release_outputs(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            self.effect(Effect::ReleaseRenderer(renderer));
        }
        if let Some(audio) = self.audio.take() {
            self.effect(Effect::StopAudio(audio));
        }
    }

    /// Duration known without asking the engine
    pub(crate) fn known_duration_us(&self) -> Option<i64> {
        self.duration_us.or_else(|| {
            self.media_info
                .as_ref()
                .map(|info| ms_to_us(info.duration_ms as i64))
                .filter(|d| *d > 0)
        })
    }

    /// Memoized duration; only a positive answer is remembered
    pub(crate) fn duration_l(&mut self) -> Result<i64> {
        if let Some(duration) = self.duration_us {
            return Ok(duration);
        }
        let reply = self.call(Command::GetDuration)?;
        let duration = ms_to_us(reply.as_int().unwrap_or(0));
        if duration > 0 {
            self.duration_us = Some(duration);
        }
        Ok(duration)
    }

    fn live_position_l(&mut self) -> Result<i64> {
        let reply = self.call(Command::GetPosition)?;
        let position = match reply.as_int() {
            Some(ms) if ms >= 0 => ms_to_us(ms),
            _ => self.last_seek_us,
        };
        Ok(position)
    }

    pub(crate) fn position_l(&mut self) -> Result<i64> {
        if self.state == State::Idle {
            return Ok(0);
        }
        if self.is_suspended()
            || (self.checkpoint == Checkpoint::Resumed && self.suspension.source.is_some())
        {
            return Ok(self.suspension.position_us);
        }
        if self.at_eos {
            return Ok(self.duration_l().unwrap_or(self.position_us));
        }
        if let Some(seek) = &self.pending_seek {
            if seek.is_deferred() {
                return Ok(seek.target_us);
            }
        }
        match self.state {
            State::Started => {
                let position = self.live_position_l()?;
                self.position_us = position;
                Ok(position)
            }
            State::Error => Err(self.invalid("get position")),
            _ => Ok(self.position_us),
        }
    }

    /// Return to `Idle`, keeping display settings and the generation counter
    fn clear(&mut self) {
        self.set_state(State::Idle);
        self.checkpoint = Checkpoint::None;
        self.looping = false;
        self.at_eos = false;
        self.cache_underrun = false;
        self.restore_pending = false;
        self.async_prepare = false;
        self.prepare_status = 0;
        self.source = None;
        self.media_info = None;
        self.duration_us = None;
        self.position_us = 0;
        self.last_seek_us = 0;
        self.pending_seek = None;
        self.subtitles = SubtitleParameters::default();
        self.stereo = StereoSettings::default();
        self.suspension = SuspensionState::default();
        self.video_width = 0;
        self.video_height = 0;
        self.sub_index = -1;
        self.track_index = -1;
    }
}

/// Fields read far more often than lifecycle state
#[derive(Default)]
struct MiscState {
    audio_session_id: i32,
    audio_sink: Option<Arc<dyn AudioSink>>,
}

/// Shared core of a session; callback bridges hold it weakly
pub(crate) struct SessionCore {
    this: Weak<SessionCore>,
    pub(crate) inner: Mutex<SessionInner>,
    pub(crate) prepare_done: Condvar,
    pub(crate) listener: ListenerSlot,
    misc: RwLock<MiscState>,
    engine_factory: Arc<dyn EngineFactory>,
    pub(crate) renderer_factory: Option<Arc<dyn RendererFactory>>,
}

impl SessionCore {
    /// Run an operation under the lock, then flush its outbox
    fn run<T>(
        &self,
        op: impl FnOnce(&SessionCore, &mut MutexGuard<'_, SessionInner>) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.lock();
        let result = op(self, &mut inner);
        self.flush(inner);
        result
    }

    /// Release the lock and run everything collected under it
    pub(crate) fn flush(&self, mut inner: MutexGuard<'_, SessionInner>) {
        let outbox = std::mem::take(&mut inner.outbox);
        drop(inner);

        for effect in outbox.effects {
            effect.run();
        }
        for notification in outbox.notes {
            self.listener.deliver(notification);
        }
    }

    pub(crate) fn audio_sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.misc.read().audio_sink.clone()
    }

    fn create_engine(&self, inner: &mut SessionInner) -> Result<()> {
        inner.generation += 1;
        let generation = inner.generation;
        let bridge = CallbackBridge::new(self.this.clone(), generation);

        let channel = self.engine_factory.create(bridge).map_err(|e| match e {
            PlayerError::Resource(_) => e,
            other => PlayerError::Resource(format!("engine handle: {}", other)),
        })?;

        inner.engine = Some(EngineHandle {
            channel,
            generation,
        });
        inner.restore_pending = true;
        inner.sub_index = -1;
        inner.track_index = -1;
        info!("Created engine handle (generation {})", generation);

        inner.replay_on_create();
        Ok(())
    }

    /// Prepare if needed, joining an in-flight asynchronous prepare
    fn ensure_prepared(&self, inner: &mut MutexGuard<'_, SessionInner>) -> Result<()> {
        let mut waited = false;
        loop {
            if waited && inner.is_suspended() {
                return Err(inner.invalid("prepare"));
            }
            match inner.state {
                state if state.is_prepared() => return Ok(()),
                State::Preparing => {
                    debug!("Waiting for in-flight prepare");
                    self.prepare_done.wait(inner);
                    waited = true;
                }
                state if state.can_prepare() => return self.prepare_sync(inner),
                State::Error if waited => {
                    return Err(PlayerError::PrepareFailed {
                        code: inner.prepare_status,
                    })
                }
                _ => return Err(inner.invalid("prepare")),
            }
        }
    }

    /// Recreate the handle for a session stopped while suspended
    fn reattach_engine(&self, inner: &mut SessionInner) -> Result<()> {
        if inner.engine.is_some() {
            return Ok(());
        }
        let Some(source) = inner.source.clone() else {
            return Ok(());
        };
        self.create_engine(inner)?;
        if let Err(e) = inner.call(Command::SetDataSource(source)) {
            if let Some(engine) = inner.engine.take() {
                inner.effect(Effect::ReleaseEngine(engine.channel));
            }
            return Err(e);
        }
        Ok(())
    }

    fn prepare_sync(&self, inner: &mut SessionInner) -> Result<()> {
        self.reattach_engine(inner)?;
        let previous = inner.state;
        inner.set_state(State::Preparing);
        inner.async_prepare = false;

        match inner.call(Command::Prepare) {
            Ok(_) => self.finish_prepare(inner, 0),
            Err(PlayerError::Engine { code, .. }) => {
                self.abort_prepare(inner, code);
                Err(PlayerError::PrepareFailed { code })
            }
            Err(e) => {
                inner.set_state(previous);
                self.prepare_done.notify_all();
                Err(e)
            }
        }
    }

    /// Complete a prepare; a negative status aborts it
    pub(crate) fn finish_prepare(&self, inner: &mut SessionInner, status: i32) -> Result<()> {
        if status < 0 {
            self.abort_prepare(inner, status);
            return Err(PlayerError::PrepareFailed { code: status });
        }

        let info = match inner.call(Command::GetMediaInfo) {
            Ok(ReplyValue::MediaInfo(info)) => info,
            Ok(_) => MediaInfo::default(),
            Err(e) => {
                warn!("Failed to read media info: {}", e);
                MediaInfo::default()
            }
        };

        inner.video_width = info.width;
        inner.video_height = info.height;
        inner.notify(Notification::VideoSizeChanged {
            width: info.width,
            height: info.height,
        });
        debug!(
            "Media info: {} video, {} audio, {} subtitle streams, seekable {}",
            info.video_streams,
            info.audio_streams,
            info.subtitle_streams,
            info.can_seek()
        );
        inner.media_info = Some(info);

        inner.cache_underrun = false;
        inner.set_state(State::Prepared);
        if inner.async_prepare {
            inner.async_prepare = false;
            inner.notify(Notification::Prepared);
        }
        info!("Prepared");
        self.prepare_done.notify_all();
        Ok(())
    }

    fn abort_prepare(&self, inner: &mut SessionInner, status: i32) {
        error!("Prepare failed with status {}", status);
        if inner.async_prepare {
            inner.notify(Notification::Error {
                code: MEDIA_ERROR_UNKNOWN,
                extra: status,
            });
        }
        inner.async_prepare = false;
        inner.prepare_status = status;
        inner.set_state(State::Error);
        self.prepare_done.notify_all();
    }

    fn do_start(&self, inner: &mut SessionInner) -> Result<()> {
        inner.cache_underrun = false;

        if inner.restore_pending {
            for setting in inner.subtitles.restore_plan() {
                if let Err(e) = inner.call(Command::SetSubtitle(setting)) {
                    warn!("Failed to restore subtitle setting: {}", e);
                }
            }
            inner.restore_pending = false;
        }

        let variant = inner.start_variant();
        let position_ms = us_to_ms(variant.position_us());
        let command = match variant {
            StartVariant::TagAtSeek(_) | StartVariant::TagAtSnapshot(_) => {
                Command::TagStartAsync { position_ms }
            }
            StartVariant::Plain(_) => Command::StartAsync { position_ms },
        };
        inner.call(command)?;

        if let Some(audio) = inner.audio.clone() {
            inner.effect(Effect::ResumeAudio(audio));
        }
        if matches!(variant, StartVariant::TagAtSeek(_)) {
            inner.pending_seek = None;
        }
        inner.position_us = variant.position_us();
        inner.at_eos = false;
        inner.suspension = SuspensionState::default();
        inner.set_state(State::Started);
        info!("Playback started ({:?})", variant);
        Ok(())
    }
}

/// A media player session bound to one engine handle at a time
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct PlayerSession {
    core: Arc<SessionCore>,
}

/// Builder for [`PlayerSession`]
pub struct SessionBuilder {
    engine_factory: Arc<dyn EngineFactory>,
    renderer_factory: Option<Arc<dyn RendererFactory>>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    listener: Option<Arc<dyn PlayerListener>>,
    audio_session_id: i32,
}

impl SessionBuilder {
    /// Create a builder around the factory that creates engine handles
    pub fn new(engine_factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            engine_factory,
            renderer_factory: None,
            audio_sink: None,
            listener: None,
            audio_session_id: 0,
        }
    }

    /// Create renderers when the engine reports the picture format
    pub fn with_renderer_factory(mut self, factory: Arc<dyn RendererFactory>) -> Self {
        self.renderer_factory = Some(factory);
        self
    }

    /// Sink the audio player writes to
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn PlayerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_audio_session_id(mut self, id: i32) -> Self {
        self.audio_session_id = id;
        self
    }

    pub fn build(self) -> PlayerSession {
        let core = Arc::new_cyclic(|this| SessionCore {
            this: this.clone(),
            inner: Mutex::new(SessionInner::new()),
            prepare_done: Condvar::new(),
            listener: ListenerSlot::default(),
            misc: RwLock::new(MiscState {
                audio_session_id: self.audio_session_id,
                audio_sink: self.audio_sink,
            }),
            engine_factory: self.engine_factory,
            renderer_factory: self.renderer_factory,
        });
        if let Some(listener) = self.listener {
            core.listener.set(listener);
        }
        PlayerSession { core }
    }
}

impl PlayerSession {
    /// Session with no renderer, audio sink or listener
    pub fn new(engine_factory: Arc<dyn EngineFactory>) -> Self {
        SessionBuilder::new(engine_factory).build()
    }

    pub fn builder(engine_factory: Arc<dyn EngineFactory>) -> SessionBuilder {
        SessionBuilder::new(engine_factory)
    }

    // Listener

    /// Install the listener, replacing any previous one
    pub fn set_listener(&self, listener: Arc<dyn PlayerListener>) -> ListenerToken {
        self.core.listener.set(listener)
    }

    /// Remove the listener if `token` still identifies it
    pub fn unregister_listener(&self, token: ListenerToken) -> bool {
        self.core.listener.unregister(token)
    }

    pub fn clear_listener(&self) {
        self.core.listener.clear();
    }

    // Lifecycle

    /// Hand a data source to the engine, creating the handle if needed
    ///
    /// Only legal from `Idle`. Settings cached before the handle existed are
    /// replayed onto it before the data source is issued.
    pub fn set_data_source(&self, source: DataSource) -> Result<()> {
        self.core.run(|core, inner| {
            inner.check_active("set data source")?;
            if inner.state != State::Idle {
                return Err(inner.invalid("set data source"));
            }
            if inner.engine.is_none() {
                core.create_engine(inner)?;
            }

            inner.call(Command::SetDataSource(source.clone()))?;
            info!("Data source set: {:?}", source);
            inner.source = Some(source);
            inner.set_state(State::Initialized);
            Ok(())
        })
    }

    /// Prepare synchronously
    ///
    /// Blocks until the engine has finished preparing. Joins an asynchronous
    /// prepare that is already in flight.
    pub fn prepare(&self) -> Result<()> {
        self.core.run(|core, inner| {
            inner.check_active("prepare")?;
            if !inner.state.can_prepare() && inner.state != State::Preparing {
                return Err(inner.invalid("prepare"));
            }
            core.ensure_prepared(inner)
        })
    }

    /// Start preparing; completion arrives as [`Notification::Prepared`]
    pub fn prepare_async(&self) -> Result<()> {
        self.core.run(|core, inner| {
            inner.check_active("prepare async")?;
            if inner.state == State::Preparing {
                debug!("Prepare already pending");
                return Err(PlayerError::OperationPending("prepare"));
            }
            if !inner.state.can_prepare() {
                return Err(inner.invalid("prepare async"));
            }

            core.reattach_engine(inner)?;
            let previous = inner.state;
            inner.set_state(State::Preparing);
            inner.async_prepare = true;

            match inner.call(Command::PrepareAsync) {
                Ok(_) => Ok(()),
                Err(PlayerError::Engine { code, .. }) => {
                    inner.async_prepare = false;
                    core.abort_prepare(inner, code);
                    Err(PlayerError::PrepareFailed { code })
                }
                Err(e) => {
                    inner.async_prepare = false;
                    inner.set_state(previous);
                    Err(e)
                }
            }
        })
    }

    /// Start or resume playback, preparing first if necessary
    pub fn start(&self) -> Result<()> {
        self.core.run(|core, inner| {
            inner.check_active("start")?;
            match inner.state {
                State::Error | State::Idle => return Err(inner.invalid("start")),
                State::Started => return Ok(()),
                _ => {}
            }
            core.ensure_prepared(inner)?;
            core.do_start(inner)
        })
    }

    /// Pause playback; a no-op unless playing
    pub fn pause(&self) -> Result<()> {
        self.core.run(|_, inner| {
            match inner.state {
                State::Error => return Err(inner.invalid("pause")),
                State::Started => {}
                _ => return Ok(()),
            }

            if let Ok(position) = inner.position_l() {
                inner.position_us = position;
            }
            inner.call(Command::PauseAsync)?;
            inner.pause_l(false);
            inner.set_state(State::Paused);
            info!("Paused at {} us", inner.position_us);
            Ok(())
        })
    }

    /// Stop playback
    ///
    /// The listener sees buffering-end followed by playback-complete. Stopping
    /// a suspended session ends the suspension without touching the engine.
    pub fn stop(&self) -> Result<()> {
        self.core.run(|_, inner| {
            let suspended = inner.is_suspended();
            match inner.state {
                State::Stopped if !suspended => return Ok(()),
                State::Stopped => {}
                State::Prepared | State::Started | State::Paused | State::PlaybackComplete => {}
                _ => return Err(inner.invalid("stop")),
            }

            if suspended {
                inner.checkpoint = Checkpoint::None;
                inner.suspension = SuspensionState::default();
            } else {
                inner.call(Command::StopAsync)?;
            }
            inner.stop_l();
            inner.set_state(State::Stopped);
            inner.pending_seek = None;
            inner.position_us = 0;
            inner.at_eos = false;
            info!("Stopped");
            Ok(())
        })
    }

    /// Seek to a position in microseconds
    ///
    /// While playing, the first seek is issued and later targets replace it
    /// until the engine reports completion. Otherwise the seek is held until
    /// the next start and completion is reported right away.
    pub fn seek_to(&self, time_us: i64) -> Result<()> {
        self.core.run(|_, inner| {
            inner.check_active("seek")?;
            if !inner.state.is_playable() {
                return Err(inner.invalid("seek"));
            }

            let current_us = inner.position_l().unwrap_or(inner.position_us);
            let mut target_us = time_us.max(0);
            if let Some(duration) = inner.known_duration_us() {
                target_us = target_us.min(duration);
            }
            inner.last_seek_us = target_us;

            if inner.cache_underrun && inner.state == State::Started {
                inner.cache_underrun = false;
                inner.call(Command::StartAsync {
                    position_ms: us_to_ms(current_us),
                })?;
            }
            inner.at_eos = false;

            if let Some(pending) = inner.pending_seek.as_mut() {
                debug!(
                    "Seek to {} us pending, retargeting to {} us",
                    pending.target_us, target_us
                );
                pending.target_us = target_us;
                return Ok(());
            }

            if inner.state == State::Started {
                inner.call(Command::SeekAsync {
                    target_ms: us_to_ms(target_us),
                    current_ms: us_to_ms(current_us),
                })?;
                inner.pending_seek = Some(PendingSeek::issued(target_us));
            } else {
                debug!("Seeking while not playing, completing locally");
                inner.pending_seek = Some(PendingSeek::deferred(target_us));
                inner.notify(Notification::SeekComplete);
            }
            Ok(())
        })
    }

    /// Return to `Idle`, releasing the engine handle
    ///
    /// Teardown is best effort; this always succeeds.
    pub fn reset(&self) -> Result<()> {
        self.core.run(|core, inner| {
            if let Some(engine) = inner.engine.take() {
                match engine.channel.invoke(&Command::Reset) {
                    Ok(reply) if reply.status < 0 => {
                        warn!("Engine reset returned status {}", reply.status)
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Engine reset failed: {}", e),
                }
                inner.effect(Effect::ReleaseEngine(engine.channel));
            }
            inner.release_outputs();
            inner.clear();
            core.prepare_done.notify_all();
            info!("Session reset");
            Ok(())
        })
    }

    /// Tear down the engine handle, keeping enough to resume later
    ///
    /// Idempotent. A session in `Error` stays there until `reset`.
    pub fn suspend(&self) -> Result<()> {
        self.core.run(|core, inner| {
            if inner.is_suspended() {
                return Ok(());
            }
            if inner.state == State::Error {
                debug!("Not suspending a failed session");
                return Ok(());
            }
            if inner.engine.is_none() {
                debug!("Nothing to suspend");
                return Ok(());
            }

            let position_us = inner.position_l().unwrap_or(inner.position_us);
            inner.suspension = SuspensionState {
                source: inner.source.clone(),
                was_playing: inner.is_playing(),
                looping: inner.looping,
                at_eos: inner.at_eos,
                position_us,
            };

            if let Err(e) = inner.call(Command::StopAsync) {
                warn!("Stop before suspend failed: {}", e);
            }
            if let Some(engine) = inner.engine.take() {
                inner.effect(Effect::ReleaseEngine(engine.channel));
            }
            inner.pause_l(true);
            inner.release_outputs();

            match inner.state {
                State::Started => inner.set_state(State::Paused),
                State::Preparing => {
                    inner.async_prepare = false;
                    inner.set_state(State::Initialized);
                    core.prepare_done.notify_all();
                }
                _ => {}
            }
            if matches!(inner.pending_seek, Some(seek) if !seek.is_deferred()) {
                inner.pending_seek = None;
            }
            inner.position_us = position_us;
            inner.checkpoint = Checkpoint::Suspended;
            info!("Suspended at {} us", position_us);
            Ok(())
        })
    }

    /// Recreate the engine handle from the suspension snapshot
    ///
    /// Starts playback again if it was active when suspended. A no-op when
    /// not suspended.
    pub fn resume(&self) -> Result<()> {
        self.core.run(|core, inner| {
            if !inner.is_suspended() {
                return Ok(());
            }
            let snapshot = inner.suspension.clone();
            let Some(source) = snapshot.source.clone() else {
                inner.checkpoint = Checkpoint::None;
                inner.set_state(State::Idle);
                return Ok(());
            };

            core.create_engine(inner)?;
            if let Err(e) = inner.call(Command::SetDataSource(source.clone())) {
                if let Some(engine) = inner.engine.take() {
                    inner.effect(Effect::ReleaseEngine(engine.channel));
                }
                return Err(e);
            }
            inner.source = Some(source);
            inner.set_state(State::Initialized);
            inner.checkpoint = Checkpoint::Resumed;
            inner.looping = snapshot.looping;
            inner.at_eos = snapshot.at_eos;
            inner.position_us = snapshot.position_us;
            info!("Resumed (was playing: {})", snapshot.was_playing);

            if snapshot.was_playing {
                core.ensure_prepared(inner)?;
                core.do_start(inner)?;
            }
            Ok(())
        })
    }

    // Queries

    pub fn state(&self) -> State {
        self.core.inner.lock().state
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.core.inner.lock().checkpoint
    }

    pub fn is_suspended(&self) -> bool {
        self.core.inner.lock().is_suspended()
    }

    /// Playing, or stalled on a cache underrun while logically playing
    pub fn is_playing(&self) -> bool {
        self.core.inner.lock().is_playing()
    }

    /// Stalled on a cache underrun
    pub fn is_buffering(&self) -> bool {
        self.core.inner.lock().cache_underrun
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.core.inner.lock().media_info.clone()
    }

    /// Last reported video size
    pub fn video_size(&self) -> (u32, u32) {
        let inner = self.core.inner.lock();
        (inner.video_width, inner.video_height)
    }

    /// Generation of the live engine handle
    pub fn engine_generation(&self) -> Option<u64> {
        self.core
            .inner
            .lock()
            .engine
            .as_ref()
            .map(|engine| engine.generation)
    }

    /// Duration in microseconds, queried once and memoized
    pub fn duration(&self) -> Result<i64> {
        self.core.run(|_, inner| {
            if let Some(duration) = inner.known_duration_us().filter(|_| inner.is_suspended()) {
                return Ok(duration);
            }
            if let Some(duration) = inner.duration_us {
                return Ok(duration);
            }
            match inner.state {
                State::Idle | State::Error => Err(inner.invalid("get duration")),
                _ => {
                    inner.check_active("get duration")?;
                    inner.duration_l()
                }
            }
        })
    }

    /// Current position in microseconds
    pub fn position(&self) -> Result<i64> {
        self.core.run(|_, inner| inner.position_l())
    }

    pub fn set_looping(&self, looping: bool) {
        self.core.inner.lock().looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.core.inner.lock().looping
    }

    // Subtitles

    /// Cache a subtitle setting and forward it to a live handle
    pub fn set_subtitle(&self, setting: SubtitleSetting) -> Result<()> {
        self.core.run(|_, inner| {
            inner.subtitles.apply(&setting);
            inner.forward(Command::SetSubtitle(setting))
        })
    }

    pub fn subtitle_parameters(&self) -> SubtitleParameters {
        self.core.inner.lock().subtitles.clone()
    }

    pub fn subtitle_count(&self) -> Result<i32> {
        self.query_int("get subtitle count", Command::GetSubtitleCount)
    }

    pub fn subtitle_list(&self) -> Result<Vec<SubtitleInfo>> {
        self.core.run(|_, inner| {
            inner.check_active("get subtitle list")?;
            match inner.call(Command::GetSubtitleList)? {
                ReplyValue::Subtitles(list) => Ok(list),
                _ => Ok(Vec::new()),
            }
        })
    }

    pub fn current_subtitle(&self) -> Result<i32> {
        self.core.run(|_, inner| {
            inner.check_active("get current subtitle")?;
            let index = inner
                .call(Command::GetCurrentSubtitle)?
                .as_int()
                .unwrap_or(-1) as i32;
            inner.sub_index = index;
            Ok(index)
        })
    }

    /// Select a subtitle stream; selecting the current one is a no-op
    pub fn switch_subtitle(&self, index: i32) -> Result<()> {
        self.core.run(|_, inner| {
            inner.check_active("switch subtitle")?;
            if index == inner.sub_index {
                return Ok(());
            }
            inner.call(Command::SwitchSubtitle(index))?;
            inner.sub_index = index;
            Ok(())
        })
    }

    // Audio tracks

    pub fn track_count(&self) -> Result<i32> {
        self.query_int("get track count", Command::GetTrackCount)
    }

    pub fn track_list(&self) -> Result<Vec<TrackInfo>> {
        self.core.run(|_, inner| {
            inner.check_active("get track list")?;
            match inner.call(Command::GetTrackList)? {
                ReplyValue::Tracks(list) => Ok(list),
                _ => Ok(Vec::new()),
            }
        })
    }

    pub fn current_track(&self) -> Result<i32> {
        self.core.run(|_, inner| {
            inner.check_active("get current track")?;
            let index = inner
                .call(Command::GetCurrentTrack)?
                .as_int()
                .unwrap_or(-1) as i32;
            inner.track_index = index;
            Ok(index)
        })
    }

    /// Select an audio track; selecting the current one is a no-op
    pub fn switch_track(&self, index: i32) -> Result<()> {
        self.core.run(|_, inner| {
            inner.check_active("switch track")?;
            if index == inner.track_index {
                return Ok(());
            }
            inner.call(Command::SwitchTrack(index))?;
            inner.track_index = index;
            Ok(())
        })
    }

    fn query_int(&self, operation: &'static str, command: Command) -> Result<i32> {
        self.core.run(|_, inner| {
            inner.check_active(operation)?;
            Ok(inner.call(command)?.as_int().unwrap_or(0) as i32)
        })
    }

    // Display and stereo

    /// Cache the output screen and move a live renderer to it
    pub fn set_screen(&self, screen: Screen) -> Result<()> {
        self.core.run(|_, inner| {
            inner.screen = screen;
            if !inner.is_suspended() {
                if let Some(renderer) = inner.renderer.clone() {
                    inner.effect(Effect::SetScreen(renderer, screen));
                }
            }
            Ok(())
        })
    }

    pub fn screen(&self) -> Screen {
        self.core.inner.lock().screen
    }

    pub fn set_enhancement(&self, setting: EnhancementSetting) -> Result<()> {
        self.core.run(|_, inner| {
            inner.enhancement.apply(setting);
            inner.forward(Command::SetEnhancement(setting))
        })
    }

    pub fn enhancement(&self) -> Enhancement {
        self.core.inner.lock().enhancement
    }

    pub fn set_scale_mode(&self, mode: ScaleMode) -> Result<()> {
        self.core.run(|_, inner| {
            inner.scale = mode;
            inner.forward(Command::SetScaleMode(mode))
        })
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.core.inner.lock().scale
    }

    pub fn set_input_dimension(&self, code: i32) -> Result<()> {
        self.core.run(|_, inner| {
            inner.stereo.input_dimension = code;
            inner.forward(Command::SetInputDimension(code))
        })
    }

    pub fn set_output_dimension(&self, code: i32) -> Result<()> {
        self.core.run(|_, inner| {
            inner.stereo.output_dimension = code;
            inner.forward(Command::SetOutputDimension(code))
        })
    }

    pub fn set_anaglyph_type(&self, code: i32) -> Result<()> {
        self.core.run(|_, inner| {
            inner.stereo.anaglyph = code;
            inner.forward(Command::SetAnaglyphType(code))
        })
    }

    pub fn stereo(&self) -> StereoSettings {
        self.core.inner.lock().stereo
    }

    // Audio

    pub fn set_audio_session_id(&self, id: i32) {
        self.core.misc.write().audio_session_id = id;
    }

    pub fn audio_session_id(&self) -> i32 {
        self.core.misc.read().audio_session_id
    }

    /// Sink used for audio players created from now on
    pub fn set_audio_sink(&self, sink: Option<Arc<dyn AudioSink>>) {
        self.core.misc.write().audio_sink = sink;
    }
}
