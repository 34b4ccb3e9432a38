//! Per-connection client proxy
//!
//! A [`Client`] caches the properties a caller sets before any player
//! exists, creates the right kind of session when a data source arrives,
//! and replays the cache onto it. Positions and durations cross this
//! boundary in milliseconds.

use super::protocol::{Request, Response};
use super::{PlayerFactories, PlayerKind};
use crate::engine::{DataSource, SubtitleInfo, TrackInfo};
use crate::player::{
    Enhancement, EnhancementSetting, ListenerToken, Notification, PlayerListener, PlayerSession,
    ScaleMode, Screen, SessionBuilder, State, StereoSettings, SubtitleParameters,
    SubtitleSetting,
};
use crate::utils::error::{PlayerError, Result};
use crate::utils::{ms_to_us, us_to_ms_rounded, Config};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Forwards session notifications to the remote caller
struct NotificationRelay {
    conn_id: i32,
    remote: Arc<dyn PlayerListener>,
}

impl PlayerListener for NotificationRelay {
    fn notify(&self, notification: Notification) {
        trace!("[client {}] {}", self.conn_id, notification.name());
        self.remote.notify(notification);
    }
}

/// Properties a caller may set before a player exists
#[derive(Debug, Clone, PartialEq)]
pub struct CachedProperties {
    pub subtitles: SubtitleParameters,
    pub screen: Screen,
    pub enhancement: Enhancement,
    pub scale: ScaleMode,
    pub stereo: StereoSettings,
    pub looping: bool,
}

impl CachedProperties {
    /// Defaults taken from the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            subtitles: config.subtitle_defaults(),
            screen: config.display.screen,
            enhancement: config.enhancement_defaults(),
            scale: ScaleMode::default(),
            stereo: StereoSettings::default(),
            looping: false,
        }
    }
}

struct AttachedPlayer {
    kind: PlayerKind,
    session: PlayerSession,
    token: ListenerToken,
}

struct ClientInner {
    player: Option<AttachedPlayer>,
    props: CachedProperties,
    has_surface: bool,
}

/// One remote caller's view of a player
pub struct Client {
    conn_id: i32,
    audio_session_id: i32,
    factories: Arc<PlayerFactories>,
    remote: Arc<dyn PlayerListener>,
    inner: Mutex<ClientInner>,
}

impl Client {
    pub(crate) fn new(
        conn_id: i32,
        audio_session_id: i32,
        factories: Arc<PlayerFactories>,
        remote: Arc<dyn PlayerListener>,
        props: CachedProperties,
    ) -> Self {
        Self {
            conn_id,
            audio_session_id,
            factories,
            remote,
            inner: Mutex::new(ClientInner {
                player: None,
                props,
                has_surface: false,
            }),
        }
    }

    pub fn conn_id(&self) -> i32 {
        self.conn_id
    }

    pub fn audio_session_id(&self) -> i32 {
        self.audio_session_id
    }

    /// Kind of the attached player, if any
    pub fn player_kind(&self) -> Option<PlayerKind> {
        self.inner.lock().player.as_ref().map(|p| p.kind)
    }

    /// Session of the attached player, if any
    pub fn session(&self) -> Option<PlayerSession> {
        self.inner.lock().player.as_ref().map(|p| p.session.clone())
    }

    pub fn properties(&self) -> CachedProperties {
        self.inner.lock().props.clone()
    }

    fn player(&self) -> Result<PlayerSession> {
        self.session().ok_or(PlayerError::NoPlayer)
    }

    fn build_session(&self, kind: PlayerKind) -> Result<PlayerSession> {
        let engine = self.factories.engines.get(&kind).cloned().ok_or_else(|| {
            PlayerError::InvalidArgument(format!("no engine registered for {} player", kind))
        })?;

        let mut builder =
            SessionBuilder::new(engine).with_audio_session_id(self.audio_session_id);
        if let Some(renderer) = &self.factories.renderer {
            builder = builder.with_renderer_factory(Arc::clone(renderer));
        }
        if let Some(provider) = &self.factories.audio {
            builder = builder.with_audio_sink(provider.open_sink(self.audio_session_id)?);
        }
        Ok(builder.build())
    }

    /// Select a player for `source`, replay cached properties onto it and
    /// hand it the source
    ///
    /// A player of the same kind is reused after a reset; otherwise a new one
    /// replaces it.
    pub fn set_data_source(&self, source: DataSource) -> Result<()> {
        let kind = self.factories.selector.select(&source);

        let (session, props, stale) = {
            let mut inner = self.inner.lock();
            let reusable = inner.player.as_ref().is_some_and(|p| p.kind == kind);
            let mut stale = None;

            if !reusable {
                let session = self.build_session(kind)?;
                let token = session.set_listener(Arc::new(NotificationRelay {
                    conn_id: self.conn_id,
                    remote: Arc::clone(&self.remote),
                }));
                info!("[client {}] created {} player", self.conn_id, kind);
                stale = inner.player.replace(AttachedPlayer {
                    kind,
                    session,
                    token,
                });
            }

            let session = inner
                .player
                .as_ref()
                .map(|p| p.session.clone())
                .ok_or(PlayerError::NoPlayer)?;
            (session, inner.props.clone(), stale)
        };

        if let Some(old) = stale {
            old.session.unregister_listener(old.token);
            old.session.reset()?;
        }
        if session.state() != State::Idle {
            session.reset()?;
        }

        session.set_screen(props.screen)?;
        for setting in props.subtitles.settings() {
            session.set_subtitle(setting)?;
        }
        for setting in props.enhancement.settings() {
            session.set_enhancement(setting)?;
        }
        session.set_scale_mode(props.scale)?;
        let stereo_defaults = StereoSettings::default();
        if props.stereo.input_dimension != stereo_defaults.input_dimension {
            session.set_input_dimension(props.stereo.input_dimension)?;
        }
        if props.stereo.output_dimension != stereo_defaults.output_dimension {
            session.set_output_dimension(props.stereo.output_dimension)?;
        }
        if props.stereo.anaglyph != stereo_defaults.anaglyph {
            session.set_anaglyph_type(props.stereo.anaglyph)?;
        }
        session.set_looping(props.looping);

        session.set_data_source(source)
    }

    pub fn set_video_surface(&self, attached: bool) {
        self.inner.lock().has_surface = attached;
    }

    /// Surface attached and the player not suspended
    pub fn is_playing_video(&self) -> bool {
        let inner = self.inner.lock();
        inner.has_surface
            && inner
                .player
                .as_ref()
                .is_some_and(|p| !p.session.is_suspended())
    }

    pub fn prepare(&self) -> Result<()> {
        self.player()?.prepare()
    }

    pub fn prepare_async(&self) -> Result<()> {
        self.player()?.prepare_async()
    }

    pub fn start(&self) -> Result<()> {
        let session = self.player()?;
        session.set_looping(self.inner.lock().props.looping);
        session.start()
    }

    pub fn pause(&self) -> Result<()> {
        self.player()?.pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.player()?.stop()
    }

    pub fn reset(&self) -> Result<()> {
        self.player()?.reset()
    }

    pub fn seek_to(&self, msec: i64) -> Result<()> {
        self.player()?.seek_to(ms_to_us(msec))
    }

    /// Position in milliseconds, rounded to the nearest
    pub fn current_position(&self) -> Result<i64> {
        Ok(us_to_ms_rounded(self.player()?.position()?))
    }

    /// Duration in milliseconds; 0 when the engine cannot tell
    pub fn duration(&self) -> Result<i64> {
        let session = self.player()?;
        match session.duration() {
            Ok(us) => Ok(us_to_ms_rounded(us)),
            Err(e) => {
                debug!("[client {}] duration unavailable: {}", self.conn_id, e);
                Ok(0)
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session().is_some_and(|s| s.is_playing())
    }

    pub fn set_looping(&self, looping: bool) {
        self.inner.lock().props.looping = looping;
        if let Some(session) = self.session() {
            session.set_looping(looping);
        }
    }

    pub fn is_looping(&self) -> bool {
        self.inner.lock().props.looping
    }

    pub fn suspend(&self) -> Result<()> {
        self.player()?.suspend()
    }

    pub fn resume(&self) -> Result<()> {
        self.player()?.resume()
    }

    pub fn set_screen(&self, screen: Screen) -> Result<()> {
        self.inner.lock().props.screen = screen;
        match self.session() {
            Some(session) => session.set_screen(screen),
            None => Ok(()),
        }
    }

    pub fn screen(&self) -> Screen {
        self.inner.lock().props.screen
    }

    /// Cache a subtitle setting and forward it to the player, if any
    pub fn set_subtitle(&self, setting: SubtitleSetting) -> Result<()> {
        self.inner.lock().props.subtitles.apply(&setting);
        match self.session() {
            Some(session) => session.set_subtitle(setting),
            None => Ok(()),
        }
    }

    pub fn subtitles(&self) -> SubtitleParameters {
        self.inner.lock().props.subtitles.clone()
    }

    pub fn set_enhancement(&self, setting: EnhancementSetting) -> Result<()> {
        self.inner.lock().props.enhancement.apply(setting);
        match self.session() {
            Some(session) => session.set_enhancement(setting),
            None => Ok(()),
        }
    }

    pub fn set_scale_mode(&self, mode: ScaleMode) -> Result<()> {
        self.inner.lock().props.scale = mode;
        match self.session() {
            Some(session) => session.set_scale_mode(mode),
            None => Ok(()),
        }
    }

    pub fn subtitle_count(&self) -> Result<i32> {
        self.player()?.subtitle_count()
    }

    pub fn subtitle_list(&self) -> Result<Vec<SubtitleInfo>> {
        self.player()?.subtitle_list()
    }

    pub fn current_subtitle(&self) -> Result<i32> {
        self.player()?.current_subtitle()
    }

    pub fn switch_subtitle(&self, index: i32) -> Result<()> {
        self.player()?.switch_subtitle(index)
    }

    pub fn track_count(&self) -> Result<i32> {
        self.player()?.track_count()
    }

    pub fn track_list(&self) -> Result<Vec<TrackInfo>> {
        self.player()?.track_list()
    }

    pub fn current_track(&self) -> Result<i32> {
        self.player()?.current_track()
    }

    pub fn switch_track(&self, index: i32) -> Result<()> {
        self.player()?.switch_track(index)
    }

    /// Cache the 3D source layout and forward it to the player, if any
    pub fn set_input_dimension(&self, code: i32) -> Result<()> {
        self.inner.lock().props.stereo.input_dimension = code;
        match self.session() {
            Some(session) => session.set_input_dimension(code),
            None => Ok(()),
        }
    }

    pub fn set_output_dimension(&self, code: i32) -> Result<()> {
        self.inner.lock().props.stereo.output_dimension = code;
        match self.session() {
            Some(session) => session.set_output_dimension(code),
            None => Ok(()),
        }
    }

    pub fn set_anaglyph_type(&self, code: i32) -> Result<()> {
        self.inner.lock().props.stereo.anaglyph = code;
        match self.session() {
            Some(session) => session.set_anaglyph_type(code),
            None => Ok(()),
        }
    }

    pub fn stereo(&self) -> StereoSettings {
        self.inner.lock().props.stereo
    }

    /// Drop the player, detaching the remote listener first
    pub fn disconnect(&self) {
        let player = self.inner.lock().player.take();
        if let Some(player) = player {
            player.session.unregister_listener(player.token);
            if let Err(e) = player.session.reset() {
                warn!("[client {}] reset on disconnect failed: {}", self.conn_id, e);
            }
        }
        info!("[client {}] disconnected", self.conn_id);
    }

    /// Dispatch a protocol request
    pub fn handle(&self, request: Request) -> Response {
        debug!("[client {}] {:?}", self.conn_id, request);
        match request {
            Request::SetDataSource { source } => Response::from_result(self.set_data_source(source)),
            Request::SetVideoSurface { attached } => {
                self.set_video_surface(attached);
                Response::ok()
            }
            Request::Prepare => Response::from_result(self.prepare()),
            Request::PrepareAsync => Response::from_result(self.prepare_async()),
            Request::Start => Response::from_result(self.start()),
            Request::Pause => Response::from_result(self.pause()),
            Request::Stop => Response::from_result(self.stop()),
            Request::Reset => Response::from_result(self.reset()),
            Request::SeekTo { msec } => Response::from_result(self.seek_to(msec)),
            Request::GetCurrentPosition => Response::from_value(self.current_position()),
            Request::GetDuration => Response::from_value(self.duration()),
            Request::IsPlaying => Response::value(self.is_playing()),
            Request::SetLooping { looping } => {
                self.set_looping(looping);
                Response::ok()
            }
            Request::IsLooping => Response::value(self.is_looping()),
            Request::Suspend => Response::from_result(self.suspend()),
            Request::Resume => Response::from_result(self.resume()),
            Request::SetScreen { screen } => match Screen::from_i32(screen) {
                Some(screen) => Response::from_result(self.set_screen(screen)),
                None => Response::error(&PlayerError::InvalidArgument(format!(
                    "screen {}",
                    screen
                ))),
            },
            Request::GetScreen => Response::value(self.screen().as_i32()),

            Request::SetSubGate { enabled } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::Gate(enabled)))
            }
            Request::GetSubGate => Response::value(self.subtitles().gate),
            Request::SetSubColor { color } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::Color(color)))
            }
            Request::GetSubColor => Response::value(self.subtitles().color),
            Request::SetSubFrameColor { color } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::FrameColor(color)))
            }
            Request::GetSubFrameColor => Response::value(self.subtitles().frame_color),
            Request::SetSubFontSize { size } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::FontSize(size)))
            }
            Request::GetSubFontSize => Response::value(self.subtitles().font_size),
            Request::SetSubPosition { percent } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::Position(percent)))
            }
            Request::GetSubPosition => Response::value(self.subtitles().position),
            Request::SetSubDelay { msec } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::Delay(msec)))
            }
            Request::GetSubDelay => Response::value(self.subtitles().delay_ms),
            Request::SetSubCharset { charset } => {
                Response::from_result(self.set_subtitle(SubtitleSetting::Charset(charset)))
            }
            Request::GetSubCharset => Response::value(self.subtitles().charset),
            Request::GetSubCount => Response::from_value(self.subtitle_count()),
            Request::GetSubList => Response::from_value(self.subtitle_list()),
            Request::GetCurSub => Response::from_value(self.current_subtitle()),
            Request::SwitchSub { index } => Response::from_result(self.switch_subtitle(index)),

            Request::GetTrackCount => Response::from_value(self.track_count()),
            Request::GetTrackList => Response::from_value(self.track_list()),
            Request::GetCurTrack => Response::from_value(self.current_track()),
            Request::SwitchTrack { index } => Response::from_result(self.switch_track(index)),

            Request::SetInputDimensionType { code } => {
                Response::from_result(self.set_input_dimension(code))
            }
            Request::SetOutputDimensionType { code } => {
                Response::from_result(self.set_output_dimension(code))
            }
            Request::SetAnaglyphType { code } => Response::from_result(self.set_anaglyph_type(code)),

            Request::SetVppGate { enabled } => {
                Response::from_result(self.set_enhancement(EnhancementSetting::VppGate(enabled)))
            }
            Request::SetLumaSharp { value } => {
                Response::from_result(self.set_enhancement(EnhancementSetting::LumaSharp(value)))
            }
            Request::SetChromaSharp { value } => {
                Response::from_result(self.set_enhancement(EnhancementSetting::ChromaSharp(value)))
            }
            Request::SetWhiteExtend { value } => {
                Response::from_result(self.set_enhancement(EnhancementSetting::WhiteExtend(value)))
            }
            Request::SetBlackExtend { value } => {
                Response::from_result(self.set_enhancement(EnhancementSetting::BlackExtend(value)))
            }
            Request::SetScaleMode {
                enabled,
                width,
                height,
            } => Response::from_result(self.set_scale_mode(ScaleMode {
                enabled,
                width,
                height,
            })),

            Request::Disconnect => {
                self.disconnect();
                Response::ok()
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("conn_id", &self.conn_id)
            .field("audio_session_id", &self.audio_session_id)
            .finish()
    }
}
