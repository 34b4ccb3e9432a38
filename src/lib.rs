//! cedarplayer - media player session orchestration
//!
//! The crate drives a native playback engine through a command channel and
//! turns its asynchronous events back into session state:
//! - `player`: the session state machine and the engine callback bridge
//! - `service`: per-connection clients, the registry and the request protocol
//! - `engine`: the command channel contract and a simulated engine
//! - `audio` and `renderer`: output collaborators created on engine demand
//! - `display`: mirroring of the master display onto a secondary output
//! - `utils`: errors, configuration and unit conversion

pub mod audio;
pub mod display;
pub mod engine;
pub mod player;
pub mod renderer;
pub mod service;
pub mod utils;

pub use player::{Notification, PlayerListener, PlayerSession, State};
pub use service::{Client, MediaPlayerService, Request, Response};
pub use utils::{Config, PlayerError, Result};
