//! In-process simulated engine
//!
//! Records every command, answers queries from an [`EngineScript`] and can
//! be told to fail. With `auto_events` set, a worker thread per handle emits
//! the completion events a real engine would send after asynchronous
//! commands. Events are never delivered from inside `invoke`.

use super::{
    Command, CommandChannel, EngineEvent, EngineFactory, MediaInfo, Reply, ReplyValue,
    SubtitleInfo, SubtitleKind, TrackInfo, MEDIA_FLAG_CAN_SEEK,
};
use crate::player::CallbackBridge;
use crate::utils::error::{IntoPlayerError, PlayerError, Result};
use crossbeam_channel::{unbounded, Sender};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What the simulated engine answers with
#[derive(Debug, Clone)]
pub struct EngineScript {
    pub duration_ms: i64,
    /// Answer to position queries; -1 means unknown
    pub position_ms: i64,
    pub media_info: MediaInfo,
    /// Status of the blocking prepare and of the prepared event
    pub prepare_status: i32,
    pub subtitles: Vec<SubtitleInfo>,
    pub tracks: Vec<TrackInfo>,
    /// Emit completion events from a worker thread
    pub auto_events: bool,
}

impl Default for EngineScript {
    fn default() -> Self {
        Self {
            duration_ms: 120_000,
            position_ms: 0,
            media_info: MediaInfo {
                video_streams: 1,
                audio_streams: 2,
                subtitle_streams: 2,
                duration_ms: 120_000,
                flags: MEDIA_FLAG_CAN_SEEK,
                width: 1280,
                height: 720,
                source_3d_mode: Default::default(),
            },
            prepare_status: 0,
            subtitles: vec![
                SubtitleInfo {
                    name: "English".to_string(),
                    charset: "UTF-8".to_string(),
                    kind: SubtitleKind::Text,
                },
                SubtitleInfo {
                    name: "Chinese".to_string(),
                    charset: "GBK".to_string(),
                    kind: SubtitleKind::Bitmap,
                },
            ],
            tracks: vec![
                TrackInfo {
                    name: "Main".to_string(),
                    charset: "UTF-8".to_string(),
                },
                TrackInfo {
                    name: "Commentary".to_string(),
                    charset: "UTF-8".to_string(),
                },
            ],
            auto_events: false,
        }
    }
}

struct SimState {
    script: EngineScript,
    commands: Vec<Command>,
    failures: HashMap<&'static str, i32>,
    transport_down: bool,
    fail_create: bool,
    bridges: Vec<CallbackBridge>,
    created: usize,
    current_subtitle: i32,
    current_track: i32,
}

struct SimShared {
    state: Mutex<SimState>,
    live: AtomicUsize,
}

/// Factory for simulated engine handles
///
/// Clones share the command log and the script, so a test can keep one
/// clone while the session owns another.
#[derive(Clone)]
pub struct SimulatedEngineFactory {
    shared: Arc<SimShared>,
}

impl SimulatedEngineFactory {
    pub fn new(script: EngineScript) -> Self {
        Self {
            shared: Arc::new(SimShared {
                state: Mutex::new(SimState {
                    script,
                    commands: Vec::new(),
                    failures: HashMap::new(),
                    transport_down: false,
                    fail_create: false,
                    bridges: Vec::new(),
                    created: 0,
                    current_subtitle: 0,
                    current_track: 0,
                }),
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Factory whose handles emit completion events on their own
    pub fn auto() -> Self {
        Self::new(EngineScript {
            auto_events: true,
            ..EngineScript::default()
        })
    }

    /// Every command issued so far, across handles
    pub fn commands(&self) -> Vec<Command> {
        self.shared.state.lock().commands.clone()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.shared
            .state
            .lock()
            .commands
            .iter()
            .map(Command::name)
            .collect()
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.shared
            .state
            .lock()
            .commands
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    pub fn clear_commands(&self) {
        self.shared.state.lock().commands.clear();
    }

    /// Deliver an event through the bridge of the newest handle
    ///
    /// Returns -1 if no handle was ever created.
    pub fn fire(&self, event: EngineEvent) -> i32 {
        match self.latest_bridge() {
            Some(bridge) => bridge.on_event(event),
            None => -1,
        }
    }

    pub fn latest_bridge(&self) -> Option<CallbackBridge> {
        self.shared.state.lock().bridges.last().cloned()
    }

    /// Bridges of every handle created, oldest first
    pub fn bridges(&self) -> Vec<CallbackBridge> {
        self.shared.state.lock().bridges.clone()
    }

    pub fn set_duration_ms(&self, duration_ms: i64) {
        self.shared.state.lock().script.duration_ms = duration_ms;
    }

    pub fn set_position_ms(&self, position_ms: i64) {
        self.shared.state.lock().script.position_ms = position_ms;
    }

    pub fn set_prepare_status(&self, status: i32) {
        self.shared.state.lock().script.prepare_status = status;
    }

    pub fn set_media_info(&self, info: MediaInfo) {
        self.shared.state.lock().script.media_info = info;
    }

    /// Answer every command named `name` with `status`
    pub fn fail_command(&self, name: &'static str, status: i32) {
        self.shared.state.lock().failures.insert(name, status);
    }

    pub fn clear_failures(&self) {
        self.shared.state.lock().failures.clear();
    }

    /// Make every invoke fail at the channel level
    pub fn set_transport_down(&self, down: bool) {
        self.shared.state.lock().transport_down = down;
    }

    /// Make handle creation fail
    pub fn set_fail_create(&self, fail: bool) {
        self.shared.state.lock().fail_create = fail;
    }

    /// Handles created so far
    pub fn created(&self) -> usize {
        self.shared.state.lock().created
    }

    /// Handles created and not yet dropped
    pub fn live_handles(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(&self, bridge: CallbackBridge) -> Result<Box<dyn CommandChannel>> {
        let auto_events = {
            let mut state = self.shared.state.lock();
            if state.fail_create {
                return Err(PlayerError::Resource(
                    "simulated engine refused to create a handle".to_string(),
                ));
            }
            state.created += 1;
            state.current_subtitle = 0;
            state.current_track = 0;
            state.bridges.push(bridge.clone());
            state.script.auto_events
        };

        let worker = if auto_events {
            Some(EventWorker::spawn(bridge)?)
        } else {
            None
        };
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated engine handle created");

        Ok(Box::new(SimulatedEngine {
            shared: Arc::clone(&self.shared),
            worker,
        }))
    }
}

struct SimulatedEngine {
    shared: Arc<SimShared>,
    worker: Option<EventWorker>,
}

impl CommandChannel for SimulatedEngine {
    fn invoke(&self, command: &Command) -> Result<Reply> {
        let (reply, follow_up) = {
            let mut state = self.shared.state.lock();
            if state.transport_down {
                return Err(PlayerError::transport("simulated engine unreachable"));
            }
            state.commands.push(command.clone());
            trace!("Simulated engine received {}", command.name());

            match state.failures.get(command.name()) {
                Some(status) => (Reply::failed(*status), None),
                None => answer(&mut state, command),
            }
        };

        if let (Some(worker), Some(event)) = (&self.worker, follow_up) {
            worker.send(event);
        }
        Ok(reply)
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.worker.take();
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
        debug!("Simulated engine handle destroyed");
    }
}

/// Reply to a command and the completion event it triggers, if any
fn answer(state: &mut SimState, command: &Command) -> (Reply, Option<EngineEvent>) {
    let script = &state.script;
    match command {
        Command::Prepare => (Reply::failed(script.prepare_status.min(0)), None),
        Command::PrepareAsync => (
            Reply::ok(),
            Some(EngineEvent::Prepared {
                status: script.prepare_status,
            }),
        ),
        Command::SeekAsync { .. } => (Reply::ok(), Some(EngineEvent::SeekComplete)),
        Command::GetDuration => (Reply::int(script.duration_ms), None),
        Command::GetPosition => (Reply::int(script.position_ms), None),
        Command::GetMediaInfo => (
            Reply::with(ReplyValue::MediaInfo(script.media_info.clone())),
            None,
        ),
        Command::GetSubtitleCount => (Reply::int(script.subtitles.len() as i64), None),
        Command::GetSubtitleList => (
            Reply::with(ReplyValue::Subtitles(script.subtitles.clone())),
            None,
        ),
        Command::GetCurrentSubtitle => (Reply::int(state.current_subtitle as i64), None),
        Command::SwitchSubtitle(index) => {
            if *index < 0 || *index as usize >= script.subtitles.len() {
                return (Reply::failed(-1), None);
            }
            state.current_subtitle = *index;
            (Reply::ok(), None)
        }
        Command::GetTrackCount => (Reply::int(script.tracks.len() as i64), None),
        Command::GetTrackList => (Reply::with(ReplyValue::Tracks(script.tracks.clone())), None),
        Command::GetCurrentTrack => (Reply::int(state.current_track as i64), None),
        Command::SwitchTrack(index) => {
            if *index < 0 || *index as usize >= script.tracks.len() {
                return (Reply::failed(-1), None);
            }
            state.current_track = *index;
            (Reply::ok(), None)
        }
        _ => (Reply::ok(), None),
    }
}

/// Delivers events to one bridge from its own thread
struct EventWorker {
    sender: Option<Sender<EngineEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl EventWorker {
    fn spawn(bridge: CallbackBridge) -> Result<Self> {
        let (sender, receiver) = unbounded::<EngineEvent>();
        let handle = thread::Builder::new()
            .name(format!("sim-engine-{}", bridge.generation()))
            .spawn(move || {
                for event in receiver.iter() {
                    bridge.on_event(event);
                }
            })
            .resource_err("Spawning simulated engine thread")?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    fn send(&self, event: EngineEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

impl Drop for EventWorker {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            // The last session reference may be released by this very thread
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
