//! The session task on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nodoff_core::memory::{BookCatalog, ManualClock, MemoryShakeSource, MemoryTransport};
use nodoff_core::{spawn_session, Config, Event, SessionOptions, SessionParts, TimerSelection, TimerState};
use tokio::sync::broadcast;
use tokio::time::Instant;

const CATALOG: &str = r#"
    [[books]]
    id = "tales"
    title = "Tales"

    [[books.chapters]]
    id = 1
    title = "First"
    start = 0.0
    end = 60.0

    [[books.chapters]]
    id = 2
    title = "Second"
    start = 60.0
    end = 120.0
"#;

fn parts(transport: &MemoryTransport, shake: &MemoryShakeSource) -> SessionParts {
    SessionParts {
        transport: Box::new(transport.clone()),
        shake: Box::new(shake.clone()),
        clock: Arc::new(ManualClock::at_utc(Utc::now())),
        preferences: Arc::new(Config::default()),
    }
}

async fn next_event(events: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(3600), events.recv())
        .await
        .expect("no event within an hour")
        .expect("event channel closed")
}

async fn state(handle: &nodoff_core::SessionHandle) -> TimerState {
    match handle.snapshot().await.unwrap() {
        Event::StateSnapshot { state, .. } => state,
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_rearm_restarts_the_countdown() {
    let catalog = BookCatalog::from_toml_str(CATALOG).unwrap();
    let transport = MemoryTransport::playing(0.0);
    let shake = MemoryShakeSource::new();
    let (handle, _task) = spawn_session("tales", &catalog, parts(&transport, &shake), SessionOptions::default());
    let mut events = handle.subscribe();

    handle.arm(TimerSelection::Preset { secs: 10 }).unwrap();
    assert!(matches!(next_event(&mut events).await, Event::TimerArmed { .. }));
    tokio::time::sleep(Duration::from_millis(6500)).await;
    assert_eq!(state(&handle).await, TimerState::Preset { remaining_secs: 4 });

    let rearmed = Instant::now();
    handle.arm(TimerSelection::Preset { secs: 5 }).unwrap();
    assert!(matches!(next_event(&mut events).await, Event::TimerArmed { .. }));
    assert!(matches!(next_event(&mut events).await, Event::TimerExpired { .. }));
    // The old loop would have fired after four more seconds.
    assert!(rearmed.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_shake_after_expiry_resumes_playback() {
    let catalog = BookCatalog::new();
    let transport = MemoryTransport::playing(0.0);
    let shake = MemoryShakeSource::new();
    let (handle, _task) = spawn_session("none", &catalog, parts(&transport, &shake), SessionOptions::default());
    let mut events = handle.subscribe();

    handle.arm(TimerSelection::Custom { secs: 2 }).unwrap();
    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, Event::TimerExpired { .. }));
    assert!(matches!(next_event(&mut events).await, Event::PromptOpened { .. }));
    assert!(!transport.state().playing);
    assert!(shake.is_monitoring());

    handle.shake().unwrap();
    assert!(matches!(next_event(&mut events).await, Event::TimerExtended { .. }));
    assert!(transport.state().playing);
    assert_eq!(state(&handle).await, TimerState::Custom { remaining_secs: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_chapter_timer_from_position_updates() {
    let catalog = BookCatalog::from_toml_str(CATALOG).unwrap();
    let transport = MemoryTransport::playing(50.0);
    let shake = MemoryShakeSource::new();
    let options = SessionOptions {
        position: 50.0,
        ..SessionOptions::default()
    };
    let (handle, _task) = spawn_session("tales", &catalog, parts(&transport, &shake), options);
    let mut events = handle.subscribe();

    handle.arm(TimerSelection::Chapters { count: 1 }).unwrap();
    next_event(&mut events).await;

    for _ in 0..12 {
        let position = transport.advance(1.0);
        handle.position_changed(position).unwrap();
    }
    assert!(matches!(next_event(&mut events).await, Event::TimerExpired { .. }));
    assert!(!transport.state().playing);
}

#[tokio::test(start_paused = true)]
async fn test_disarm_stops_ticks() {
    let catalog = BookCatalog::new();
    let transport = MemoryTransport::playing(0.0);
    let shake = MemoryShakeSource::new();
    let (handle, _task) = spawn_session("none", &catalog, parts(&transport, &shake), SessionOptions::default());
    let mut events = handle.subscribe();

    handle.arm(TimerSelection::Preset { secs: 3 }).unwrap();
    handle.disarm().unwrap();
    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, Event::TimerDisarmed { .. }));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(matches!(events.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    assert!(transport.state().playing);
    assert!(!shake.is_monitoring());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_after_prompt_lapses_stops_shake_listener() {
    let transport = MemoryTransport::playing(0.0);
    let shake = MemoryShakeSource::new();
    let clock = ManualClock::at_utc(Utc::now());
    let parts = SessionParts {
        transport: Box::new(transport.clone()),
        shake: Box::new(shake.clone()),
        clock: Arc::new(clock.clone()),
        preferences: Arc::new(Config::default()),
    };
    let (handle, _task) = spawn_session("none", &BookCatalog::new(), parts, SessionOptions::default());
    let mut events = handle.subscribe();

    handle.arm(TimerSelection::Preset { secs: 1 }).unwrap();
    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, Event::TimerExpired { .. }));
    assert!(matches!(next_event(&mut events).await, Event::PromptOpened { .. }));
    assert!(shake.is_monitoring());

    clock.advance(chrono::Duration::seconds(5 * 60 + 1));
    match handle.snapshot().await.unwrap() {
        Event::StateSnapshot { prompt, state, .. } => {
            assert!(prompt.is_none());
            assert_eq!(state, TimerState::Off);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(next_event(&mut events).await, Event::PromptLapsed { .. }));
    assert!(!shake.is_monitoring());
}
