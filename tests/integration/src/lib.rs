//! Integration test utilities for cedarplayer
//!
//! This module provides common utilities for integration testing including:
//! - A listener recording every notification
//! - Renderer, audio sink and display fakes recording what they are asked
//! - A harness wiring a session to the simulated engine

use cedarplayer::audio::{AudioFormat, AudioSink, AudioSinkProvider};
use cedarplayer::display::{DisplayDevice, DisplayModeParams, DualMode, OutputType};
use cedarplayer::engine::{EngineScript, SimulatedEngineFactory};
use cedarplayer::player::{Notification, PlayerListener, PlayerSession, Screen};
use cedarplayer::renderer::{
    OverlayFrame, RendererFactory, RendererParams, StereoConfig, VideoRenderer,
};
use cedarplayer::utils::{PlayerError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default wait for asynchronous notifications
pub const WAIT: Duration = Duration::from_secs(5);

/// Listener keeping every notification in arrival order
#[derive(Default)]
pub struct RecordingListener {
    seen: Mutex<Vec<Notification>>,
    arrived: Condvar,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn count(&self, wanted: &Notification) -> usize {
        self.seen.lock().iter().filter(|n| *n == wanted).count()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }

    /// Block until `wanted` has been seen, or the timeout passes
    pub fn wait_for(&self, wanted: &Notification, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut seen = self.seen.lock();
        while !seen.contains(wanted) {
            if self.arrived.wait_until(&mut seen, deadline).timed_out() {
                return seen.contains(wanted);
            }
        }
        true
    }
}

impl PlayerListener for RecordingListener {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
        self.arrived.notify_all();
    }
}

/// Renderer recording frames, stereo layouts and screen moves
#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: Mutex<Vec<OverlayFrame>>,
    pub stereo: Mutex<Vec<StereoConfig>>,
    pub screens: Mutex<Vec<Screen>>,
}

impl VideoRenderer for RecordingRenderer {
    fn render(&self, frame: &OverlayFrame) -> Result<()> {
        self.frames.lock().push(*frame);
        Ok(())
    }

    fn configure_stereo(&self, config: &StereoConfig) -> Result<()> {
        self.stereo.lock().push(*config);
        Ok(())
    }

    fn set_screen(&self, screen: Screen) -> Result<()> {
        self.screens.lock().push(screen);
        Ok(())
    }

    fn frame_id(&self) -> i32 {
        self.frames.lock().last().map_or(-1, |f| f.frame_id as i32)
    }
}

/// Factory handing out [`RecordingRenderer`]s and keeping them
#[derive(Default)]
pub struct RecordingRendererFactory {
    pub created: Mutex<Vec<(RendererParams, Arc<RecordingRenderer>)>>,
    pub fail: AtomicBool,
}

impl RecordingRendererFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> Option<Arc<RecordingRenderer>> {
        self.created.lock().last().map(|(_, r)| Arc::clone(r))
    }

    pub fn count(&self) -> usize {
        self.created.lock().len()
    }
}

impl RendererFactory for RecordingRendererFactory {
    fn create(&self, params: &RendererParams) -> Result<Arc<dyn VideoRenderer>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlayerError::Resource("overlay unavailable".into()));
        }
        let renderer = Arc::new(RecordingRenderer::default());
        self.created
            .lock()
            .push((params.clone(), Arc::clone(&renderer)));
        Ok(renderer)
    }
}

/// Sink accepting everything and recording calls
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<&'static str>>,
    pub written: Mutex<usize>,
    pub format: Mutex<Option<AudioFormat>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl AudioSink for RecordingSink {
    fn open(&self, format: &AudioFormat) -> Result<()> {
        *self.format.lock() = Some(*format);
        self.calls.lock().push("open");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.calls.lock().push("start");
        Ok(())
    }

    fn pause(&self) {
        self.calls.lock().push("pause");
    }

    fn stop(&self) {
        self.calls.lock().push("stop");
    }

    fn flush(&self) {
        self.calls.lock().push("flush");
    }

    fn close(&self) {
        self.calls.lock().push("close");
    }

    fn write(&self, data: &[u8]) -> usize {
        *self.written.lock() += data.len();
        data.len()
    }

    fn buffer_space(&self) -> usize {
        4096
    }

    fn latency_ms(&self) -> u32 {
        40
    }
}

/// Provider opening one shared [`RecordingSink`]
pub struct RecordingSinkProvider {
    pub sink: Arc<RecordingSink>,
    pub sessions: Mutex<Vec<i32>>,
}

impl RecordingSinkProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: RecordingSink::new(),
            sessions: Mutex::new(Vec::new()),
        })
    }
}

impl AudioSinkProvider for RecordingSinkProvider {
    fn open_sink(&self, audio_session_id: i32) -> Result<Arc<dyn AudioSink>> {
        self.sessions.lock().push(audio_session_id);
        Ok(self.sink.clone())
    }
}

/// A session on the simulated engine with every collaborator recorded
pub struct Harness {
    pub session: PlayerSession,
    pub engine: SimulatedEngineFactory,
    pub listener: Arc<RecordingListener>,
    pub renderers: Arc<RecordingRendererFactory>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    /// Engine events only arrive when the test fires them
    pub fn manual() -> Self {
        Self::with_script(EngineScript::default())
    }

    /// Engine completes prepare and seek on its own worker thread
    pub fn auto() -> Self {
        Self::with_script(EngineScript {
            auto_events: true,
            ..EngineScript::default()
        })
    }

    pub fn with_script(script: EngineScript) -> Self {
        let engine = SimulatedEngineFactory::new(script);
        let listener = RecordingListener::new();
        let renderers = RecordingRendererFactory::new();
        let sink = RecordingSink::new();
        let session = PlayerSession::builder(Arc::new(engine.clone()))
            .with_renderer_factory(renderers.clone())
            .with_audio_sink(sink.clone())
            .with_listener(listener.clone())
            .build();
        Self {
            session,
            engine,
            listener,
            renderers,
            sink,
        }
    }

    /// Data source set and synchronously prepared
    pub fn prepared(self, uri: &str) -> Result<Self> {
        self.session
            .set_data_source(cedarplayer::engine::DataSource::uri(uri))?;
        self.session.prepare()?;
        Ok(self)
    }

    /// Prepared and started
    pub fn playing(self, uri: &str) -> Result<Self> {
        let harness = self.prepared(uri)?;
        harness.session.start()?;
        Ok(harness)
    }
}

/// Display device recording blits and pans
pub struct RecordingDisplay {
    pub copies: Mutex<Vec<(i32, i32, i32, i32)>>,
    pub pans: Mutex<Vec<(i32, i32)>>,
    pub modes: Mutex<Vec<(i32, DisplayModeParams)>>,
    pub locked: AtomicBool,
    pub lock_count: AtomicI32,
    pub mode: AtomicI32,
    pub master: AtomicI32,
    pub master_buffer: AtomicI32,
    pub secondary: Mutex<OutputType>,
    pub plugged: AtomicBool,
    pub fail_copy: AtomicBool,
}

impl RecordingDisplay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            copies: Mutex::new(Vec::new()),
            pans: Mutex::new(Vec::new()),
            modes: Mutex::new(Vec::new()),
            locked: AtomicBool::new(false),
            lock_count: AtomicI32::new(0),
            mode: AtomicI32::new(DualMode::DualSame as i32),
            master: AtomicI32::new(0),
            master_buffer: AtomicI32::new(0),
            secondary: Mutex::new(OutputType::Hdmi),
            plugged: AtomicBool::new(true),
            fail_copy: AtomicBool::new(false),
        })
    }
}

impl DisplayDevice for RecordingDisplay {
    fn request_mode_lock(&self) -> Result<()> {
        if self.locked.swap(true, Ordering::SeqCst) {
            return Err(PlayerError::Display("mode lock already held".into()));
        }
        self.lock_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_mode_lock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    fn copy_framebuffer(&self, sd: i32, sb: i32, dd: i32, db: i32) -> Result<()> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(PlayerError::Display("blit failed".into()));
        }
        self.copies.lock().push((sd, sb, dd, db));
        Ok(())
    }

    fn pan_display(&self, display: i32, buffer: i32) -> Result<()> {
        self.pans.lock().push((display, buffer));
        Ok(())
    }

    fn display_mode(&self) -> Result<i32> {
        Ok(self.mode.load(Ordering::SeqCst))
    }

    fn master_display(&self) -> Result<i32> {
        Ok(self.master.load(Ordering::SeqCst))
    }

    fn output_type(&self, display: i32) -> Result<OutputType> {
        if display == self.master.load(Ordering::SeqCst) {
            Ok(OutputType::Lcd)
        } else {
            Ok(*self.secondary.lock())
        }
    }

    fn hdmi_status(&self) -> Result<i32> {
        Ok(i32::from(self.plugged.load(Ordering::SeqCst)))
    }

    fn tv_dac_status(&self) -> Result<i32> {
        Ok(i32::from(self.plugged.load(Ordering::SeqCst)))
    }

    fn buffer_id(&self, _display: i32) -> Result<i32> {
        Ok(self.master_buffer.load(Ordering::SeqCst))
    }

    fn open_display(&self, _display: i32) -> Result<i32> {
        Ok(0)
    }

    fn close_display(&self, _display: i32) -> Result<i32> {
        Ok(0)
    }

    fn change_mode(&self, _display: i32, _value0: i32, _value1: i32) -> Result<i32> {
        Ok(0)
    }

    fn set_display_mode(&self, mode: i32, params: &DisplayModeParams) -> Result<i32> {
        self.modes.lock().push((mode, *params));
        self.mode.store(mode, Ordering::SeqCst);
        Ok(0)
    }

    fn set_master_display(&self, display: i32) -> Result<i32> {
        self.master.store(display, Ordering::SeqCst);
        Ok(0)
    }

    fn display_parameter(&self, _display: i32, _param: i32) -> Result<i32> {
        Ok(0)
    }

    fn display_count(&self) -> Result<i32> {
        Ok(2)
    }

    fn max_width_display(&self) -> Result<i32> {
        Ok(0)
    }

    fn max_hdmi_mode(&self) -> Result<i32> {
        Ok(0xa)
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
