//! Session registry
//!
//! The service hands out connection ids, creates clients and applies
//! service-wide settings to every live one.

use super::client::{CachedProperties, Client};
use super::{PlayerFactories, PlayerKind, PlayerSelector};
use crate::audio::AudioSinkProvider;
use crate::engine::EngineFactory;
use crate::player::{PlayerListener, Screen};
use crate::renderer::RendererFactory;
use crate::utils::error::{PlayerError, Result};
use crate::utils::Config;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

struct Registry {
    next_conn_id: i32,
    clients: Vec<Weak<Client>>,
    screen: Screen,
}

impl Registry {
    fn live(&mut self) -> Vec<Arc<Client>> {
        self.clients.retain(|c| c.strong_count() > 0);
        self.clients.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Media player service
pub struct MediaPlayerService {
    config: Config,
    factories: Arc<PlayerFactories>,
    registry: Mutex<Registry>,
}

impl MediaPlayerService {
    pub fn builder() -> MediaPlayerServiceBuilder {
        MediaPlayerServiceBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a client for a new connection
    ///
    /// # Arguments
    ///
    /// * `listener` - Receives the notifications of the client's players
    /// * `audio_session_id` - Audio session the client's players output to
    pub fn create(&self, listener: Arc<dyn PlayerListener>, audio_session_id: i32) -> Arc<Client> {
        let mut registry = self.registry.lock();
        let conn_id = registry.next_conn_id;
        registry.next_conn_id += 1;

        let mut props = CachedProperties::from_config(&self.config);
        props.screen = registry.screen;

        let client = Arc::new(Client::new(
            conn_id,
            audio_session_id,
            Arc::clone(&self.factories),
            listener,
            props,
        ));
        registry.clients.push(Arc::downgrade(&client));
        info!("Created client {} (audio session {})", conn_id, audio_session_id);
        client
    }

    /// Disconnect a client and forget it
    pub fn remove_client(&self, client: &Arc<Client>) {
        client.disconnect();
        let mut registry = self.registry.lock();
        registry
            .clients
            .retain(|c| c.upgrade().is_some_and(|c| !Arc::ptr_eq(&c, client)));
        debug!("Removed client {}", client.conn_id());
    }

    /// Number of clients still alive
    pub fn client_count(&self) -> usize {
        self.registry.lock().live().len()
    }

    /// Move every client to `screen` (0 master, 1 slave)
    pub fn set_screen(&self, screen: i32) -> Result<()> {
        let screen = Screen::from_i32(screen)
            .ok_or_else(|| PlayerError::InvalidArgument(format!("screen {}", screen)))?;

        let clients = {
            let mut registry = self.registry.lock();
            registry.screen = screen;
            registry.live()
        };
        for client in clients {
            client.set_screen(screen)?;
        }
        info!("Service screen set to {:?}", screen);
        Ok(())
    }

    pub fn screen(&self) -> Screen {
        self.registry.lock().screen
    }

    /// Whether any client is showing video
    pub fn is_playing_video(&self) -> bool {
        let clients = self.registry.lock().live();
        clients.iter().any(|c| c.is_playing_video())
    }
}

/// Builder for [`MediaPlayerService`]
pub struct MediaPlayerServiceBuilder {
    config: Config,
    engines: HashMap<PlayerKind, Arc<dyn EngineFactory>>,
    default_engine: Option<Arc<dyn EngineFactory>>,
    renderer: Option<Arc<dyn RendererFactory>>,
    audio: Option<Arc<dyn AudioSinkProvider>>,
    selector: Option<PlayerSelector>,
}

impl MediaPlayerServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            engines: HashMap::new(),
            default_engine: None,
            renderer: None,
            audio: None,
            selector: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Engine used for one player kind
    pub fn with_engine(mut self, kind: PlayerKind, factory: Arc<dyn EngineFactory>) -> Self {
        self.engines.insert(kind, factory);
        self
    }

    /// Engine used for every kind without its own
    pub fn with_default_engine(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.default_engine = Some(factory);
        self
    }

    pub fn with_renderer_factory(mut self, factory: Arc<dyn RendererFactory>) -> Self {
        self.renderer = Some(factory);
        self
    }

    pub fn with_audio_sink_provider(mut self, provider: Arc<dyn AudioSinkProvider>) -> Self {
        self.audio = Some(provider);
        self
    }

    /// Replace the selection table built from the configuration
    pub fn with_selector(mut self, selector: PlayerSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn build(self) -> Result<MediaPlayerService> {
        self.config.validate()?;

        let mut engines = self.engines;
        if let Some(default) = self.default_engine {
            for kind in PlayerKind::ALL {
                engines.entry(kind).or_insert_with(|| Arc::clone(&default));
            }
        }
        if engines.is_empty() {
            return Err(PlayerError::Config("No engine factory registered".to_string()));
        }

        let selector = self
            .selector
            .unwrap_or_else(|| PlayerSelector::with_overrides(&self.config.selection.overrides));
        let screen = self.config.display.screen;

        Ok(MediaPlayerService {
            factories: Arc::new(PlayerFactories {
                engines,
                renderer: self.renderer,
                audio: self.audio,
                selector,
            }),
            registry: Mutex::new(Registry {
                next_conn_id: 1,
                clients: Vec::new(),
                screen,
            }),
            config: self.config,
        })
    }
}

impl Default for MediaPlayerServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
