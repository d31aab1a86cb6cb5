//! Drive a real session task against an in-memory player.
//!
//! Every beat of `--tick-ms` stands for one second of playback: the clock
//! and playhead advance and the position is reported to the session. Events
//! are printed to stdout as JSON lines, followed by a final snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::Args;
use nodoff_core::memory::{BookCatalog, ManualClock, MemoryShakeSource, MemoryTransport};
use nodoff_core::{spawn_session, Config, Event, SessionOptions, SessionParts, TimerSelection};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Args)]
pub struct SimulateArgs {
    /// Book catalog (TOML)
    #[arg(long)]
    book: PathBuf,
    /// Book id inside the catalog
    #[arg(long)]
    id: String,
    /// Timer to arm: "15m", "custom:20m", "chapter", "chapters:2", "off"
    #[arg(long, default_value = "off")]
    timer: TimerSelection,
    /// Start position in seconds
    #[arg(long, default_value = "0")]
    position: f64,
    /// Playback speed
    #[arg(long, default_value = "1.0")]
    speed: f64,
    /// Real milliseconds per simulated second
    #[arg(long, default_value = "1000")]
    tick_ms: u64,
    /// Shake the device at these simulated seconds
    #[arg(long = "shake-at")]
    shake_at: Vec<u64>,
    /// Open the player first, giving the auto timer a chance to arm
    #[arg(long)]
    auto: bool,
    /// Stop after this many simulated seconds
    #[arg(long, default_value = "7200")]
    max_secs: u64,
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = BookCatalog::load(&args.book)?;
    if catalog.book(&args.id).is_none() {
        return Err(format!("book not found: {}", args.id).into());
    }
    let config = Config::load_or_default();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(simulate(args, catalog, config))
}

async fn simulate(
    args: SimulateArgs,
    catalog: BookCatalog,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let period = Duration::from_millis(args.tick_ms.max(1));
    let transport = MemoryTransport::playing(args.position);
    transport.set_speed(args.speed);
    let clock = ManualClock::new(Utc::now(), Local::now().naive_local());

    let parts = SessionParts {
        transport: Box::new(transport.clone()),
        shake: Box::new(MemoryShakeSource::new()),
        clock: Arc::new(clock.clone()),
        preferences: Arc::new(config),
    };
    let options = SessionOptions {
        position: args.position,
        speed: args.speed,
        tick_period: period,
        event_capacity: 256,
    };
    let (handle, task) = spawn_session(&args.id, &catalog, parts, options);
    let mut events = handle.subscribe();

    if args.auto {
        handle.player_opened()?;
    }
    if !args.timer.is_off() {
        handle.arm(args.timer)?;
    }

    let mut beat = tokio::time::interval_at(Instant::now() + period, period);
    let mut elapsed = 0u64;
    let mut finished = false;
    info!(book = %args.id, timer = %args.timer, "simulation started");

    while !finished {
        tokio::select! {
            _ = beat.tick() => {
                elapsed += 1;
                clock.advance(chrono::Duration::seconds(1));
                handle.position_changed(transport.advance(1.0))?;
                if args.shake_at.contains(&elapsed) {
                    info!(elapsed, "shake");
                    handle.shake()?;
                }
                if elapsed >= args.max_secs {
                    finished = true;
                }
            }
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    // Nothing can happen after expiry unless a shake is still to come.
                    if matches!(event, Event::TimerExpired { .. })
                        && !args.shake_at.iter().any(|at| *at > elapsed)
                    {
                        finished = true;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => finished = true,
            }
        }
    }

    // Flush events already published, e.g. the prompt following an expiry.
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    let snapshot = handle.snapshot().await?;
    println!("{}", serde_json::to_string(&snapshot)?);

    handle.shutdown()?;
    task.await?;
    info!(elapsed, "simulation finished");
    Ok(())
}
