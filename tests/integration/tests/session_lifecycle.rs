//! Integration tests for the player session
//!
//! These tests drive a session against the simulated engine and check:
//! - Lifecycle transitions and the commands they issue
//! - Seek coalescing and locally completed seeks
//! - Suspend/resume restoring playback and subtitle settings
//! - Stale events from torn-down engine handles

use anyhow::Result;
use cedarplayer::audio::AudioFormat;
use cedarplayer::engine::{Command, DataSource, EngineEvent};
use cedarplayer::player::{
    InfoKind, Notification, State, SubtitleSetting, MEDIA_ERROR_UNKNOWN,
};
use cedarplayer::renderer::{DisplayMode, FrameInfo, OutputMode, Source3dMode, StereoLayout};
use cedarplayer::utils::PlayerError;
use cedarplayer_integration_tests::{Harness, RecordingListener, WAIT};

const DURATION_US: i64 = 120_000_000;

fn is_seek(command: &Command) -> bool {
    matches!(command, Command::SeekAsync { .. })
}

fn is_subtitle(command: &Command) -> bool {
    matches!(command, Command::SetSubtitle(_))
}

#[test]
fn test_pause_is_noop_unless_started() -> Result<()> {
    let h = Harness::manual();
    let pauses = |h: &Harness| h.engine.count(|c| matches!(c, Command::PauseAsync));

    h.session.pause()?;
    h.session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    h.session.pause()?;
    h.session.prepare()?;
    h.session.pause()?;
    assert_eq!(pauses(&h), 0);
    assert_eq!(h.session.state(), State::Prepared);

    h.session.start()?;
    h.session.pause()?;
    assert_eq!(h.session.state(), State::Paused);
    for _ in 0..3 {
        h.session.pause()?;
    }
    assert_eq!(pauses(&h), 1);
    assert_eq!(h.session.state(), State::Paused);
    Ok(())
}

#[test]
fn test_seeks_while_playing_coalesce() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.engine.clear_commands();
    h.listener.clear();

    h.session.seek_to(10_000_000)?;
    h.session.seek_to(20_000_000)?;
    h.session.seek_to(30_000_000)?;
    assert_eq!(h.engine.count(is_seek), 1);

    h.engine.fire(EngineEvent::SeekComplete);
    let seeks: Vec<Command> = h.engine.commands().into_iter().filter(is_seek).collect();
    assert_eq!(
        seeks.last(),
        Some(&Command::SeekAsync {
            target_ms: 30_000,
            current_ms: 10_000
        })
    );
    assert_eq!(seeks.len(), 2);
    assert_eq!(h.listener.count(&Notification::SeekComplete), 0);

    h.engine.fire(EngineEvent::SeekComplete);
    h.engine.fire(EngineEvent::SeekComplete);
    assert_eq!(h.listener.count(&Notification::SeekComplete), 1);
    assert_eq!(h.engine.count(is_seek), 2);
    Ok(())
}

#[test]
fn test_seeks_before_start_issue_one_tag_start() -> Result<()> {
    let h = Harness::manual().prepared("/video/a.mp4")?;
    h.engine.clear_commands();

    h.session.seek_to(5_000_000)?;
    h.session.seek_to(8_000_000)?;
    assert_eq!(h.listener.count(&Notification::SeekComplete), 1);
    assert_eq!(h.session.position()?, 8_000_000);

    h.session.start()?;
    let starts: Vec<Command> = h
        .engine
        .commands()
        .into_iter()
        .filter(Command::is_start)
        .collect();
    assert_eq!(starts, vec![Command::TagStartAsync { position_ms: 8_000 }]);
    assert_eq!(h.engine.count(is_seek), 0);
    assert_eq!(h.listener.count(&Notification::SeekComplete), 1);
    Ok(())
}

#[test]
fn test_seek_while_paused_completes_locally() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.session.pause()?;
    h.engine.clear_commands();
    h.listener.clear();

    h.session.seek_to(5_000_000)?;
    assert_eq!(h.listener.notifications(), vec![Notification::SeekComplete]);
    assert_eq!(h.engine.count(is_seek), 0);
    assert_eq!(h.session.position()?, 5_000_000);
    Ok(())
}

#[test]
fn test_seek_target_is_clamped() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.engine.clear_commands();

    h.session.seek_to(500_000_000)?;
    assert!(h.engine.commands().iter().any(|c| matches!(
        c,
        Command::SeekAsync {
            target_ms: 120_000,
            ..
        }
    )));
    Ok(())
}

#[test]
fn test_duration_is_memoized() -> Result<()> {
    let h = Harness::manual().prepared("/video/a.mp4")?;

    let first = h.session.duration()?;
    h.engine.set_duration_ms(5_000);
    let second = h.session.duration()?;

    assert_eq!(first, DURATION_US);
    assert_eq!(second, first);
    assert_eq!(h.engine.count(|c| matches!(c, Command::GetDuration)), 1);
    Ok(())
}

#[test]
fn test_suspend_resume_restores_playback_and_subtitles() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.session.set_subtitle(SubtitleSetting::FontSize(30))?;
    h.session.set_subtitle(SubtitleSetting::Delay(500))?;
    h.session.set_subtitle(SubtitleSetting::Color(0xFF00_FF00))?;
    let subtitles = h.session.subtitle_parameters();
    h.engine.set_position_ms(42_000);
    assert!(h.session.is_playing());

    h.session.suspend()?;
    assert!(h.session.is_suspended());
    assert_eq!(h.engine.live_handles(), 0);
    assert_eq!(h.session.position()?, 42_000_000);

    h.engine.clear_commands();
    h.session.resume()?;
    assert!(h.session.is_playing());
    assert_eq!(h.session.subtitle_parameters(), subtitles);
    assert_eq!(h.engine.created(), 2);
    assert_eq!(h.engine.live_handles(), 1);

    let commands = h.engine.commands();
    assert!(commands.contains(&Command::SetSubtitle(SubtitleSetting::FontSize(30))));
    assert!(commands.contains(&Command::SetSubtitle(SubtitleSetting::Delay(500))));
    assert!(commands.contains(&Command::TagStartAsync {
        position_ms: 42_000
    }));
    Ok(())
}

#[test]
fn test_resume_of_paused_session_stays_paused() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.session.pause()?;

    h.session.suspend()?;
    h.session.resume()?;
    assert!(!h.session.is_playing());
    assert_eq!(h.session.state(), State::Initialized);
    assert_eq!(h.engine.count(Command::is_start), 1);
    Ok(())
}

#[test]
fn test_suspended_session_rejects_commands() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.session.suspend()?;
    h.session.suspend()?;
    assert_eq!(h.engine.created(), 1);

    assert!(matches!(
        h.session.start(),
        Err(PlayerError::InvalidState { .. })
    ));
    assert!(matches!(
        h.session.seek_to(1_000),
        Err(PlayerError::InvalidState { .. })
    ));
    h.session.set_subtitle(SubtitleSetting::FontSize(18))?;
    assert_eq!(h.session.subtitle_parameters().font_size, 18);
    Ok(())
}

#[test]
fn test_stop_ends_suspension() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.session.suspend()?;
    let stops = |h: &Harness| h.engine.count(|c| matches!(c, Command::StopAsync));
    assert_eq!(stops(&h), 1);
    h.listener.clear();

    h.session.stop()?;
    assert_eq!(h.session.state(), State::Stopped);
    assert!(!h.session.is_suspended());
    assert_eq!(stops(&h), 1);
    assert_eq!(
        h.listener.notifications(),
        vec![
            Notification::Info {
                kind: InfoKind::BufferingEnd,
                extra: 0
            },
            Notification::PlaybackComplete,
        ]
    );

    h.session.resume()?;
    assert_eq!(h.session.state(), State::Stopped);
    assert_eq!(h.engine.created(), 1);

    h.session.start()?;
    assert_eq!(h.session.state(), State::Started);
    assert_eq!(h.engine.created(), 2);
    Ok(())
}

#[test]
fn test_start_with_default_subtitles_sends_none() -> Result<()> {
    let h = Harness::manual().prepared("/video/a.mp4")?;
    h.engine.clear_commands();

    h.session.start()?;
    assert_eq!(h.engine.count(is_subtitle), 0);
    assert_eq!(
        h.engine.commands(),
        vec![Command::StartAsync { position_ms: 0 }]
    );
    Ok(())
}

#[test]
fn test_playback_complete_reports_duration() -> Result<()> {
    let h = Harness::manual();
    h.session.set_data_source(DataSource::uri("a.mp4"))?;
    h.session.prepare()?;
    h.session.start()?;
    h.listener.clear();

    h.engine.fire(EngineEvent::PlaybackComplete);
    assert!(!h.session.is_playing());
    assert_eq!(h.session.state(), State::PlaybackComplete);
    assert_eq!(h.session.position()?, h.session.duration()?);
    assert_eq!(h.session.position()?, DURATION_US);
    assert_eq!(
        h.listener.notifications(),
        vec![
            Notification::Info {
                kind: InfoKind::BufferingEnd,
                extra: 0
            },
            Notification::PlaybackComplete,
        ]
    );

    h.session.start()?;
    assert!(h.session.is_playing());
    Ok(())
}

#[test]
fn test_looping_restarts_instead_of_completing() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.session.set_looping(true);
    h.engine.clear_commands();
    h.listener.clear();

    h.engine.fire(EngineEvent::PlaybackComplete);
    assert_eq!(h.session.state(), State::Started);
    assert_eq!(
        h.engine.commands(),
        vec![Command::TagStartAsync { position_ms: 0 }]
    );
    assert_eq!(h.listener.count(&Notification::PlaybackComplete), 0);
    Ok(())
}

#[test]
fn test_stop_notifies_completion() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.listener.clear();

    h.session.stop()?;
    assert_eq!(h.session.state(), State::Stopped);
    assert_eq!(h.listener.count(&Notification::PlaybackComplete), 1);

    h.session.prepare()?;
    assert_eq!(h.session.state(), State::Prepared);
    Ok(())
}

#[test]
fn test_async_prepare() -> Result<()> {
    let h = Harness::manual();
    h.session.set_data_source(DataSource::uri("/video/a.mp4"))?;

    h.session.prepare_async()?;
    assert!(matches!(
        h.session.prepare_async(),
        Err(PlayerError::OperationPending(_))
    ));
    assert_eq!(h.engine.count(|c| matches!(c, Command::PrepareAsync)), 1);
    assert_eq!(h.session.state(), State::Preparing);

    h.engine.fire(EngineEvent::Prepared { status: 0 });
    assert_eq!(h.session.state(), State::Prepared);
    assert_eq!(
        h.listener.notifications(),
        vec![
            Notification::VideoSizeChanged {
                width: 1280,
                height: 720
            },
            Notification::Prepared,
        ]
    );
    Ok(())
}

#[test]
fn test_sync_prepare_sends_no_prepared_notification() -> Result<()> {
    let h = Harness::manual().prepared("/video/a.mp4")?;
    assert_eq!(h.listener.count(&Notification::Prepared), 0);
    assert_eq!(h.session.video_size(), (1280, 720));
    Ok(())
}

#[test]
fn test_start_joins_async_prepare() -> Result<()> {
    let h = Harness::auto();
    h.session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    h.session.prepare_async()?;

    h.session.start()?;
    assert_eq!(h.session.state(), State::Started);
    assert!(h.listener.wait_for(&Notification::Prepared, WAIT));
    Ok(())
}

#[test]
fn test_async_prepare_failure() -> Result<()> {
    let h = Harness::manual();
    h.session.set_data_source(DataSource::uri("/video/broken.mp4"))?;
    h.session.prepare_async()?;

    h.engine.fire(EngineEvent::Prepared { status: -1004 });
    assert_eq!(h.session.state(), State::Error);
    assert_eq!(
        h.listener.notifications(),
        vec![Notification::Error {
            code: MEDIA_ERROR_UNKNOWN,
            extra: -1004
        }]
    );
    assert!(matches!(
        h.session.start(),
        Err(PlayerError::InvalidState { .. })
    ));

    h.session.reset()?;
    assert_eq!(h.session.state(), State::Idle);
    Ok(())
}

#[test]
fn test_sync_prepare_failure_is_returned() -> Result<()> {
    let h = Harness::manual();
    h.engine.fail_command("prepare", -1004);
    h.session.set_data_source(DataSource::uri("/video/broken.mp4"))?;

    assert!(matches!(
        h.session.prepare(),
        Err(PlayerError::PrepareFailed { code: -1004 })
    ));
    assert_eq!(h.session.state(), State::Error);
    assert!(h.listener.notifications().is_empty());
    Ok(())
}

#[test]
fn test_fatal_error_absorbs_commands() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.listener.clear();

    h.engine.fire(EngineEvent::FatalError { code: -38 });
    assert_eq!(h.session.state(), State::Error);
    assert_eq!(
        h.listener.notifications(),
        vec![Notification::Error {
            code: -38,
            extra: 0
        }]
    );

    assert!(h.session.pause().is_err());
    assert!(h.session.seek_to(0).is_err());
    assert!(h.session.start().is_err());
    h.session.set_subtitle(SubtitleSetting::Gate(false))?;

    h.session.reset()?;
    assert_eq!(h.session.state(), State::Idle);
    h.session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    Ok(())
}

#[test]
fn test_suspend_keeps_error_state() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.engine.fire(EngineEvent::FatalError { code: -1004 });
    assert_eq!(h.session.state(), State::Error);

    h.session.suspend()?;
    assert!(!h.session.is_suspended());
    h.session.resume()?;
    assert_eq!(h.session.state(), State::Error);
    assert_eq!(h.engine.created(), 1);
    assert!(h.session.start().is_err());
    assert_eq!(h.session.state(), State::Error);
    Ok(())
}

#[test]
fn test_start_reports_fatal_error_during_prepare() -> Result<()> {
    let h = Harness::manual();
    h.session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    h.session.prepare_async()?;

    let session = h.session.clone();
    let starter = std::thread::spawn(move || session.start());
    std::thread::sleep(std::time::Duration::from_millis(50));
    h.engine.fire(EngineEvent::FatalError { code: -1010 });

    let result = starter.join().expect("start thread finished");
    assert!(matches!(
        result,
        Err(PlayerError::PrepareFailed { code: -1010 })
    ));
    assert_eq!(h.session.state(), State::Error);
    Ok(())
}

#[test]
fn test_transport_failure_leaves_state() -> Result<()> {
    let h = Harness::manual().prepared("/video/a.mp4")?;
    h.engine.set_transport_down(true);

    assert!(matches!(h.session.start(), Err(PlayerError::Transport(_))));
    assert_eq!(h.session.state(), State::Prepared);

    h.engine.set_transport_down(false);
    h.session.start()?;
    assert_eq!(h.session.state(), State::Started);
    Ok(())
}

#[test]
fn test_stale_events_are_discarded() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    let stale = h.engine.latest_bridge().expect("bridge registered");

    h.session.reset()?;
    h.session.set_data_source(DataSource::uri("/video/b.mp4"))?;
    h.session.prepare()?;
    h.listener.clear();

    assert_eq!(stale.on_event(EngineEvent::PlaybackComplete), 0);
    assert_eq!(stale.on_event(EngineEvent::FatalError { code: -1 }), 0);
    assert_eq!(h.session.state(), State::Prepared);
    assert!(h.listener.notifications().is_empty());

    let current = h.engine.latest_bridge().expect("bridge registered");
    assert!(current.generation() > stale.generation());
    assert_eq!(Some(current.generation()), h.session.engine_generation());
    Ok(())
}

#[test]
fn test_buffering_events() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.engine.set_position_ms(60_000);
    h.listener.clear();

    h.engine.fire(EngineEvent::BufferingStart);
    assert!(h.session.is_playing());
    h.engine.fire(EngineEvent::BufferingUpdate { percent: 50 });
    h.engine.fire(EngineEvent::BufferingEnd);

    assert_eq!(
        h.listener.notifications(),
        vec![
            Notification::Info {
                kind: InfoKind::BufferingStart,
                extra: 0
            },
            Notification::BufferingUpdate(75),
            Notification::BufferingUpdate(0),
            Notification::Info {
                kind: InfoKind::BufferingEnd,
                extra: 0
            },
        ]
    );
    Ok(())
}

#[test]
fn test_seek_during_underrun_restarts_playback_first() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.engine.set_position_ms(40_000);
    h.engine.fire(EngineEvent::BufferingStart);
    assert!(h.session.is_buffering());
    h.engine.clear_commands();

    h.session.seek_to(90_000_000)?;
    assert!(!h.session.is_buffering());
    let issued: Vec<Command> = h
        .engine
        .commands()
        .into_iter()
        .filter(|c| c.is_start() || is_seek(c))
        .collect();
    assert_eq!(
        issued,
        vec![
            Command::StartAsync {
                position_ms: 40_000
            },
            Command::SeekAsync {
                target_ms: 90_000,
                current_ms: 40_000
            },
        ]
    );
    Ok(())
}

#[test]
fn test_video_render_path() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.listener.clear();

    let frame = FrameInfo {
        width: 1920,
        height: 1088,
        display_width: 1920,
        display_height: 1080,
        frame_id: 7,
        ..FrameInfo::default()
    };
    assert_eq!(h.engine.fire(EngineEvent::VideoRenderInit(frame.clone())), 0);
    assert_eq!(h.renderers.count(), 1);
    assert_eq!(
        h.listener.notifications(),
        vec![Notification::VideoSizeChanged {
            width: 1920,
            height: 1080
        }]
    );

    assert_eq!(h.engine.fire(EngineEvent::VideoRenderData(frame)), 0);
    assert_eq!(h.engine.fire(EngineEvent::VideoRenderGetFrameId), 7);

    let renderer = h.renderers.last().expect("renderer created");
    assert_eq!(renderer.frames.lock().len(), 1);
    assert!(renderer.stereo.lock().is_empty());
    Ok(())
}

#[test]
fn test_stereo_frames_configure_renderer() -> Result<()> {
    let h = Harness::manual().playing("/video/3d.mkv")?;

    let frame = FrameInfo {
        width: 1920,
        height: 1080,
        source_3d_mode: Source3dMode::LeftRightHalf,
        display_mode: DisplayMode::Anaglyph,
        ..FrameInfo::default()
    };
    h.engine.fire(EngineEvent::VideoRenderInit(frame.clone()));
    let renderer = h.renderers.last().expect("renderer created");
    let config = renderer.stereo.lock()[0];
    assert_eq!(config.layout, StereoLayout::SideBySideHalf);
    assert_eq!(config.output, OutputMode::Anaglyph);
    assert_eq!(config.width, 960);

    let switched = FrameInfo {
        display_mode: DisplayMode::Original,
        display_mode_changed: true,
        ..frame
    };
    h.engine.fire(EngineEvent::VideoRenderData(switched));
    let configs = renderer.stereo.lock().clone();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[1].output, OutputMode::Original);
    assert!(configs[1].mode_changed);
    Ok(())
}

#[test]
fn test_renderer_failure_is_reported() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    h.renderers
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let result = h
        .engine
        .fire(EngineEvent::VideoRenderInit(FrameInfo::default()));
    assert_eq!(result, -1);
    assert_eq!(h.engine.fire(EngineEvent::VideoRenderGetFrameId), -1);
    Ok(())
}

#[test]
fn test_audio_render_path() -> Result<()> {
    let h = Harness::manual().playing("/music/a.mp4")?;

    let format = AudioFormat {
        sample_rate: 48_000,
        channels: 2,
        bits_per_sample: 16,
    };
    assert_eq!(h.engine.fire(EngineEvent::AudioRenderInit(format)), 0);
    assert_eq!(*h.sink.format.lock(), Some(format));
    assert_eq!(h.sink.calls(), vec!["open", "start"]);

    assert_eq!(h.engine.fire(EngineEvent::AudioRenderData(vec![0; 1024])), 1024);
    assert_eq!(h.engine.fire(EngineEvent::AudioRenderGetSpace), 4096);
    assert_eq!(h.engine.fire(EngineEvent::AudioRenderGetDelay), 40_000);
    assert_eq!(*h.sink.written.lock(), 1024);

    h.engine.fire(EngineEvent::AudioRenderExit);
    assert!(h.sink.calls().ends_with(&["stop", "close"]));
    assert_eq!(h.engine.fire(EngineEvent::AudioRenderData(vec![0; 16])), 0);
    Ok(())
}

#[test]
fn test_listener_replacement() -> Result<()> {
    let h = Harness::manual().playing("/video/a.mp4")?;
    let replacement = RecordingListener::new();

    let token = h.session.set_listener(replacement.clone());
    h.engine.fire(EngineEvent::PlaybackComplete);
    assert_eq!(replacement.count(&Notification::PlaybackComplete), 1);
    assert_eq!(h.listener.count(&Notification::PlaybackComplete), 0);

    let newer = h.session.set_listener(RecordingListener::new());
    assert!(!h.session.unregister_listener(token));
    assert!(h.session.unregister_listener(newer));
    Ok(())
}
