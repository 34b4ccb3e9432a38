//! Configuration loading tests
//!
//! Environment overrides are process-wide, so every test touching them runs
//! serially.

use anyhow::Result;
use cedarplayer::engine::SimulatedEngineFactory;
use cedarplayer::player::Screen;
use cedarplayer::service::{MediaPlayerService, PlayerKind};
use cedarplayer::Config;
use cedarplayer_integration_tests::RecordingListener;
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

const ENV_VARS: [&str; 5] = [
    "CEDARPLAYER_LOG_LEVEL",
    "CEDARPLAYER_SCREEN",
    "CEDARPLAYER_SUB_FONT_SIZE",
    "CEDARPLAYER_SUB_CHARSET",
    "CEDARPLAYER_SWAP_SLOTS",
];

/// Clears the overrides on creation and again on drop
struct EnvGuard;

impl EnvGuard {
    fn new() -> Self {
        Self::clear();
        EnvGuard
    }

    fn clear() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        Self::clear();
    }
}

fn write_config(dir: &TempDir, contents: &str) -> Result<std::path::PathBuf> {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents)?;
    Ok(path)
}

#[test]
#[serial]
fn test_file_values_reach_new_clients() -> Result<()> {
    let _env = EnvGuard::new();
    let dir = tempfile::tempdir()?;
    let path = write_config(
        &dir,
        r#"
        [subtitle]
        font_size = 30
        charset = "UTF-8"

        [display]
        screen = "slave"
        vpp_gate = true

        [selection.overrides]
        ogg = "hardware"
        "#,
    )?;

    let config = Config::from_file(&path)?;
    assert_eq!(config.general.log_level, "info");

    let service = MediaPlayerService::builder()
        .with_config(config)
        .with_default_engine(Arc::new(SimulatedEngineFactory::auto()))
        .build()?;
    let client = service.create(RecordingListener::new(), 0);

    let props = client.properties();
    assert_eq!(props.subtitles.font_size, 30);
    assert_eq!(props.subtitles.charset, "UTF-8");
    assert_eq!(props.screen, Screen::Slave);
    assert!(props.enhancement.vpp_gate);

    client.set_data_source(cedarplayer::engine::DataSource::uri("/music/a.ogg"))?;
    assert_eq!(client.player_kind(), Some(PlayerKind::Hardware));
    Ok(())
}

#[test]
#[serial]
fn test_env_overrides_file() -> Result<()> {
    let _env = EnvGuard::new();
    let dir = tempfile::tempdir()?;
    let path = write_config(
        &dir,
        r#"
        [general]
        log_level = "warn"

        [subtitle]
        font_size = 30
        "#,
    )?;

    std::env::set_var("CEDARPLAYER_LOG_LEVEL", "debug");
    std::env::set_var("CEDARPLAYER_SUB_FONT_SIZE", "40");
    std::env::set_var("CEDARPLAYER_SCREEN", "1");
    std::env::set_var("CEDARPLAYER_SWAP_SLOTS", "5");

    let config = Config::from_file(&path)?;
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.subtitle.font_size, 40);
    assert_eq!(config.display.screen, Screen::Slave);
    assert_eq!(config.display.swap_slots, 5);
    Ok(())
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() -> Result<()> {
    let _env = EnvGuard::new();
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, "")?;

    std::env::set_var("CEDARPLAYER_SCREEN", "sideways");
    assert!(Config::from_file(&path).is_err());
    EnvGuard::clear();

    std::env::set_var("CEDARPLAYER_SWAP_SLOTS", "2");
    assert!(Config::from_file(&path).is_err());
    EnvGuard::clear();

    let broken = write_config(&dir, "[subtitle\nfont_size = ")?;
    assert!(Config::from_file(&broken).is_err());

    let negative = write_config(&dir, "[subtitle]\nfont_size = -1\n")?;
    assert!(Config::from_file(&negative).is_err());
    Ok(())
}

#[test]
#[serial]
fn test_save_then_load() -> Result<()> {
    let _env = EnvGuard::new();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("a").join("b").join("config.toml");

    let mut config = Config::default();
    config.subtitle.delay = -300;
    config.display.luma_sharp = 3;
    config
        .selection
        .overrides
        .insert("mkv".to_string(), PlayerKind::Streaming);
    config.save_to(&path)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.subtitle.delay, -300);
    assert_eq!(loaded.display.luma_sharp, 3);
    assert_eq!(
        loaded.selection.overrides.get("mkv"),
        Some(&PlayerKind::Streaming)
    );
    Ok(())
}

#[test]
fn test_service_rejects_invalid_config() {
    let mut config = Config::default();
    config.general.log_level = "chatty".to_string();

    let result = MediaPlayerService::builder()
        .with_config(config)
        .with_default_engine(Arc::new(SimulatedEngineFactory::auto()))
        .build();
    assert!(result.is_err());
}
