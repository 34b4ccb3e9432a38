use anyhow::{anyhow, Context, Result};
use cedarplayer::engine::{DataSource, EngineEvent, SimulatedEngineFactory};
use cedarplayer::service::{MediaPlayerService, Request};
use cedarplayer::utils::{format_position, load_config, Config};
use cedarplayer::{Notification, PlayerListener};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver};
use env_logger::Env;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// cedarplayer - drive a player session against the simulated engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Run a JSON list of protocol requests
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Configuration file to use instead of the system and user files
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare, play and complete a source, printing every notification
    Play {
        /// Source URI
        uri: String,

        /// Seek here (milliseconds) once playing
        #[arg(long, value_name = "MSEC")]
        seek: Option<i64>,

        /// Suspend and resume while playing
        #[arg(long)]
        suspend: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_config().context("Failed to load config")?,
    };

    let log_level = if args.debug {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting cedarplayer v{}", env!("CARGO_PKG_VERSION"));

    let engine = SimulatedEngineFactory::auto();
    let service = MediaPlayerService::builder()
        .with_config(config)
        .with_default_engine(Arc::new(engine.clone()))
        .build()?;

    if let Some(script) = &args.script {
        return run_script(&service, script);
    }

    match args.command {
        Some(Command::Play { uri, seek, suspend }) => {
            play(&service, &engine, &uri, seek, suspend)
        }
        None => Err(anyhow!("Nothing to do: pass `play <URI>` or `--script <FILE>`")),
    }
}

/// Listener printing notifications and forwarding them to `rx`
fn printing_listener() -> (Arc<dyn PlayerListener>, Receiver<Notification>) {
    let (tx, rx) = unbounded();
    let listener: Arc<dyn PlayerListener> = Arc::new(move |notification: Notification| {
        println!("<- {:?}", notification);
        let _ = tx.send(notification);
    });
    (listener, rx)
}

fn wait_for(rx: &Receiver<Notification>, wanted: &Notification) -> Result<()> {
    loop {
        let notification = rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| anyhow!("Timed out waiting for {}", wanted.name()))?;
        if let Notification::Error { code, extra } = notification {
            return Err(anyhow!("Player error {} ({})", code, extra));
        }
        if &notification == wanted {
            return Ok(());
        }
    }
}

fn play(
    service: &MediaPlayerService,
    engine: &SimulatedEngineFactory,
    uri: &str,
    seek: Option<i64>,
    suspend: bool,
) -> Result<()> {
    let (listener, rx) = printing_listener();
    let client = service.create(listener, 0);

    client.set_data_source(DataSource::uri(uri))?;
    info!("Selected {:?} player for {}", client.player_kind(), uri);

    client.prepare_async()?;
    wait_for(&rx, &Notification::Prepared)?;

    let duration = client.duration()?;
    println!("duration {}", format_position(duration * 1000));

    client.start()?;
    if let Some(msec) = seek {
        client.seek_to(msec)?;
        wait_for(&rx, &Notification::SeekComplete)?;
        println!("position {}", format_position(client.current_position()? * 1000));
    }

    if suspend {
        client.suspend()?;
        println!("suspended at {}", format_position(client.current_position()? * 1000));
        client.resume()?;
        println!("resumed, playing: {}", client.is_playing());
    }

    engine.fire(EngineEvent::PlaybackComplete);
    wait_for(&rx, &Notification::PlaybackComplete)?;
    println!(
        "complete at {}, playing: {}",
        format_position(client.current_position()? * 1000),
        client.is_playing()
    );

    service.remove_client(&client);
    Ok(())
}

fn run_script(service: &MediaPlayerService, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let requests: Vec<Request> =
        serde_json::from_str(&contents).context("Failed to parse request script")?;

    let (listener, _rx) = printing_listener();
    let client = service.create(listener, 0);

    for request in requests {
        println!("-> {}", serde_json::to_string(&request)?);
        let response = client.handle(request);
        if !response.is_ok() {
            error!("Request failed with status {}", response.status);
        }
        println!("   {}", serde_json::to_string(&response)?);
    }

    service.remove_client(&client);
    Ok(())
}
