//! Listener ordering tests using a mocked listener

use anyhow::Result;
use cedarplayer::engine::{DataSource, EngineEvent, EngineScript, SimulatedEngineFactory};
use cedarplayer::player::{InfoKind, Notification, PlayerListener, PlayerSession};
use mockall::{mock, predicate::eq, Sequence};
use std::sync::Arc;

mock! {
    pub Listener {}

    impl PlayerListener for Listener {
        fn notify(&self, notification: Notification);
    }
}

fn session(engine: &SimulatedEngineFactory, listener: MockListener) -> PlayerSession {
    PlayerSession::builder(Arc::new(engine.clone()))
        .with_listener(Arc::new(listener))
        .build()
}

fn is_video_size(notification: &Notification) -> bool {
    matches!(notification, Notification::VideoSizeChanged { .. })
}

#[test]
fn test_prepared_follows_video_size() -> Result<()> {
    let engine = SimulatedEngineFactory::new(EngineScript::default());
    let mut listener = MockListener::new();
    let mut seq = Sequence::new();
    listener
        .expect_notify()
        .with(eq(Notification::VideoSizeChanged {
            width: 1280,
            height: 720,
        }))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    listener
        .expect_notify()
        .with(eq(Notification::Prepared))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let session = session(&engine, listener);
    session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    session.prepare_async()?;
    engine.fire(EngineEvent::Prepared { status: 0 });
    Ok(())
}

#[test]
fn test_stop_reports_buffering_end_then_complete() -> Result<()> {
    let engine = SimulatedEngineFactory::new(EngineScript::default());
    let mut listener = MockListener::new();
    let mut seq = Sequence::new();
    listener
        .expect_notify()
        .withf(is_video_size)
        .times(1)
        .return_const(());
    listener
        .expect_notify()
        .with(eq(Notification::Info {
            kind: InfoKind::BufferingEnd,
            extra: 0,
        }))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    listener
        .expect_notify()
        .with(eq(Notification::PlaybackComplete))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let session = session(&engine, listener);
    session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    session.prepare()?;
    session.start()?;
    session.stop()?;
    Ok(())
}

#[test]
fn test_coalesced_seeks_notify_once() -> Result<()> {
    let engine = SimulatedEngineFactory::new(EngineScript::default());
    let mut listener = MockListener::new();
    listener
        .expect_notify()
        .withf(is_video_size)
        .times(1)
        .return_const(());
    listener
        .expect_notify()
        .with(eq(Notification::SeekComplete))
        .times(1)
        .return_const(());

    let session = session(&engine, listener);
    session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    session.prepare()?;
    session.start()?;
    for target in [1_000_000, 2_000_000, 3_000_000] {
        session.seek_to(target)?;
    }
    for _ in 0..3 {
        engine.fire(EngineEvent::SeekComplete);
    }
    Ok(())
}

#[test]
fn test_unregistered_listener_hears_nothing() -> Result<()> {
    let engine = SimulatedEngineFactory::new(EngineScript::default());
    let mut listener = MockListener::new();
    listener.expect_notify().never();

    let session = PlayerSession::new(Arc::new(engine.clone()));
    let token = session.set_listener(Arc::new(listener));
    assert!(session.unregister_listener(token));

    session.set_data_source(DataSource::uri("/video/a.mp4"))?;
    session.prepare_async()?;
    engine.fire(EngineEvent::Prepared { status: 0 });
    Ok(())
}
