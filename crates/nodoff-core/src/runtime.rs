//! Tokio driver for a playback session.
//!
//! One spawned task owns the [`PlaybackSession`] and applies commands from
//! an unbounded queue one at a time, so the engine never sees concurrent
//! calls. The 1 Hz loops requested by the engine are interval tasks that
//! push `Tick` commands into the same queue. Events drained after every
//! command are published on a broadcast channel.
//!
//! ```ignore
//! let (handle, task) = spawn_session("dune", &catalog, parts, SessionOptions::default());
//! let mut events = handle.subscribe();
//! handle.arm(TimerSelection::Preset { secs: 900 })?;
//! while let Ok(event) = events.recv().await { /* ... */ }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::collaborators::{ChapterSource, Clock, PreferencesStore, ShakeSource, TickScheduler, TickToken, Transport};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::session::PlaybackSession;
use crate::timer::{EngineDeps, TimerSelection};

/// Everything the session task can be asked to do.
#[derive(Debug)]
pub enum Command {
    Tick(TickToken),
    PlayerOpened,
    PositionChanged(f64),
    Seek(f64),
    SetSpeed(f64),
    Arm(TimerSelection),
    Disarm,
    Extend,
    Reset,
    Shake,
    Snapshot(oneshot::Sender<Event>),
    Shutdown,
}

/// Collaborators for a runtime session. The tick scheduler is supplied by the runtime.
pub struct SessionParts {
    pub transport: Box<dyn Transport>,
    pub shake: Box<dyn ShakeSource>,
    pub clock: Arc<dyn Clock>,
    pub preferences: Arc<dyn PreferencesStore>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Playhead at open, seconds.
    pub position: f64,
    pub speed: f64,
    /// Real time between engine ticks. One tick is one second of timer.
    pub tick_period: Duration,
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            position: 0.0,
            speed: 1.0,
            tick_period: Duration::from_secs(1),
            event_capacity: 64,
        }
    }
}

/// [`TickScheduler`] backed by `tokio::time::interval` tasks.
///
/// Holds only a weak sender so a forgotten loop cannot keep the session
/// task alive after every handle is dropped.
pub struct TokioTicker {
    commands: mpsc::WeakUnboundedSender<Command>,
    period: Duration,
    loops: HashMap<TickToken, JoinHandle<()>>,
}

impl TokioTicker {
    pub fn new(commands: &mpsc::UnboundedSender<Command>, period: Duration) -> Self {
        Self {
            commands: commands.downgrade(),
            period,
            loops: HashMap::new(),
        }
    }
}

impl TickScheduler for TokioTicker {
    fn schedule(&mut self, token: TickToken) {
        if let Some(previous) = self.loops.remove(&token) {
            previous.abort();
        }
        let commands = self.commands.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            // First beat one period from now, not immediately.
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(sender) = commands.upgrade() else {
                    break;
                };
                if sender.send(Command::Tick(token)).is_err() {
                    break;
                }
            }
        });
        debug!(?token, "tick loop scheduled");
        self.loops.insert(token, handle);
    }

    fn cancel(&mut self, token: TickToken) {
        if let Some(handle) = self.loops.remove(&token) {
            handle.abort();
            debug!(?token, "tick loop cancelled");
        }
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        for (_, handle) in self.loops.drain() {
            handle.abort();
        }
    }
}

/// Cloneable front end to a running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<Event>,
}

impl SessionHandle {
    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::SessionClosed)
    }

    pub fn player_opened(&self) -> Result<()> {
        self.send(Command::PlayerOpened)
    }

    pub fn position_changed(&self, position: f64) -> Result<()> {
        self.send(Command::PositionChanged(position))
    }

    pub fn seek(&self, to_secs: f64) -> Result<()> {
        self.send(Command::Seek(to_secs))
    }

    pub fn set_speed(&self, speed: f64) -> Result<()> {
        self.send(Command::SetSpeed(speed))
    }

    pub fn arm(&self, selection: TimerSelection) -> Result<()> {
        self.send(Command::Arm(selection))
    }

    pub fn disarm(&self) -> Result<()> {
        self.send(Command::Disarm)
    }

    pub fn extend(&self) -> Result<()> {
        self.send(Command::Extend)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    pub fn shake(&self) -> Result<()> {
        self.send(Command::Shake)
    }

    /// Current state, taken after every command queued before this one.
    pub async fn snapshot(&self) -> Result<Event> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| CoreError::SessionClosed)
    }

    /// Stop the session task. Pending tick loops are aborted.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}

/// Open `book_id` and run its session on the current tokio runtime.
///
/// Must be called from within a runtime. The task ends on
/// [`SessionHandle::shutdown`] or when every handle has been dropped.
pub fn spawn_session(
    book_id: &str,
    source: &dyn ChapterSource,
    parts: SessionParts,
    options: SessionOptions,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands, queue) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(options.event_capacity.max(1));

    let deps = EngineDeps {
        transport: parts.transport,
        shake: parts.shake,
        ticker: Box::new(TokioTicker::new(&commands, options.tick_period)),
        clock: parts.clock,
        preferences: parts.preferences,
    };
    let session = PlaybackSession::open(book_id, source, deps, options.position, options.speed);

    let task = tokio::spawn(run(session, queue, events.clone()));
    (SessionHandle { commands, events }, task)
}

async fn run(
    mut session: PlaybackSession,
    mut queue: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<Event>,
) {
    info!(book_id = session.book_id(), "session task started");
    while let Some(command) = queue.recv().await {
        if !apply(&mut session, command) {
            break;
        }
        for event in session.engine_mut().drain_events() {
            // No subscribers is fine.
            let _ = events.send(event);
        }
    }
    info!(book_id = session.book_id(), "session task stopped");
}

/// Apply one command. Returns false on shutdown.
fn apply(session: &mut PlaybackSession, command: Command) -> bool {
    match command {
        Command::Tick(token) => {
            session.engine_mut().tick(token);
        }
        Command::PlayerOpened => {
            session.on_player_open();
        }
        Command::PositionChanged(position) => {
            session.on_position_changed(position);
        }
        Command::Seek(to_secs) => {
            session.seek(to_secs);
        }
        Command::SetSpeed(speed) => session.set_speed(speed),
        Command::Arm(selection) => {
            session.arm(selection);
        }
        Command::Disarm => {
            session.engine_mut().disarm();
        }
        Command::Extend => {
            session.engine_mut().extend();
        }
        Command::Reset => {
            session.engine_mut().reset();
        }
        Command::Shake => {
            session.engine_mut().on_shake_detected();
        }
        Command::Snapshot(reply) => {
            session.engine_mut().sweep_prompt();
            let _ = reply.send(session.engine().snapshot());
        }
        Command::Shutdown => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::memory::{BookCatalog, ManualClock, MemoryShakeSource, MemoryTransport};
    use crate::storage::Config;
    use crate::timer::TimerState;

    fn parts(transport: &MemoryTransport) -> SessionParts {
        SessionParts {
            transport: Box::new(transport.clone()),
            shake: Box::new(MemoryShakeSource::new()),
            clock: Arc::new(ManualClock::at_utc(Utc::now())),
            preferences: Arc::new(Config::default()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_drive_the_countdown_to_expiry() {
        let transport = MemoryTransport::playing(0.0);
        let (handle, _task) =
            spawn_session("none", &BookCatalog::new(), parts(&transport), SessionOptions::default());
        let mut events = handle.subscribe();
        let started = Instant::now();

        handle.arm(TimerSelection::Preset { secs: 3 }).unwrap();
        assert!(matches!(events.recv().await.unwrap(), Event::TimerArmed { .. }));
        assert!(matches!(events.recv().await.unwrap(), Event::TimerExpired { .. }));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(matches!(events.recv().await.unwrap(), Event::PromptOpened { .. }));
        assert!(!transport.state().playing);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reflects_queued_commands() {
        let transport = MemoryTransport::playing(0.0);
        let (handle, _task) =
            spawn_session("none", &BookCatalog::new(), parts(&transport), SessionOptions::default());
        handle.arm(TimerSelection::Custom { secs: 600 }).unwrap();
        match handle.snapshot().await.unwrap() {
            Event::StateSnapshot { state, .. } => {
                assert_eq!(state, TimerState::Custom { remaining_secs: 600 })
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_task() {
        let transport = MemoryTransport::playing(0.0);
        let (handle, task) =
            spawn_session("none", &BookCatalog::new(), parts(&transport), SessionOptions::default());
        handle.arm(TimerSelection::Preset { secs: 60 }).unwrap();
        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(matches!(handle.arm(TimerSelection::Off), Err(CoreError::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_ends_the_task() {
        let transport = MemoryTransport::playing(0.0);
        let (handle, task) =
            spawn_session("none", &BookCatalog::new(), parts(&transport), SessionOptions::default());
        handle.arm(TimerSelection::Preset { secs: 60 }).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(handle);
        task.await.unwrap();
    }
}
