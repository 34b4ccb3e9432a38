//! Service layer for cedarplayer
//!
//! This module provides the surface remote callers talk to:
//! - Player kind selection for a data source
//! - Per-connection clients that cache properties until a player exists
//! - The registry handing out connections
//! - The request/response protocol

mod client;
mod protocol;
mod registry;
mod selection;

pub use client::{CachedProperties, Client};
pub use protocol::{Request, Response};
pub use registry::{MediaPlayerService, MediaPlayerServiceBuilder};
pub use selection::{PlayerKind, PlayerSelector};

use crate::audio::AudioSinkProvider;
use crate::engine::EngineFactory;
use crate::renderer::RendererFactory;
use std::collections::HashMap;
use std::sync::Arc;

/// What a client needs to build players
pub(crate) struct PlayerFactories {
    pub(crate) engines: HashMap<PlayerKind, Arc<dyn EngineFactory>>,
    pub(crate) renderer: Option<Arc<dyn RendererFactory>>,
    pub(crate) audio: Option<Arc<dyn AudioSinkProvider>>,
    pub(crate) selector: PlayerSelector,
}
