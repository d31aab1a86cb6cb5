//! Capabilities the engine consumes from the surrounding player.
//!
//! The engine never talks to audio hardware, motion sensors or storage
//! directly; the playback session hands it implementations of these traits.
//! In-memory versions live in [`crate::memory`].

use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::progress::ChapterTable;
use crate::timer::{AutoTimerMode, DailyWindow};

/// Media transport of the current playback session.
pub trait Transport: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, to_secs: f64);
    /// Current volume in `[0, 1]`.
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn current_position(&self) -> f64;
    fn is_playing(&self) -> bool;
}

/// Chapter lookup for a book.
pub trait ChapterSource: Send + Sync {
    /// Chapters of `book_id`; an empty table when the book has none or is unknown.
    fn current_chapters(&self, book_id: &str) -> ChapterTable;

    /// Length of the book at 1x, if known.
    fn duration(&self, _book_id: &str) -> Option<f64> {
        None // default: unknown until loaded
    }
}

/// Motion shake detector. Shake occurrences themselves are delivered to
/// the engine by whoever owns the event queue; this only bounds when the
/// sensor is listened to.
pub trait ShakeSource: Send {
    fn start_monitoring(&mut self);
    fn stop_monitoring(&mut self);
}

/// Read-only view of the user's preferences.
pub trait PreferencesStore: Send + Sync {
    fn fade_out_window_secs(&self) -> u64;
    fn base_volume_level(&self) -> f64;
    fn shake_recovery_enabled(&self) -> bool;
    fn apply_speed_to_elapsed(&self) -> bool;
    fn apply_speed_to_total_remaining(&self) -> bool;
    fn auto_timer_mode(&self) -> AutoTimerMode;
    fn auto_timer_window(&self) -> DailyWindow;
}

/// Wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    /// Local wall-clock time, used for the auto-arm window.
    fn local_now(&self) -> NaiveDateTime;
}

/// Identifies one scheduled 1 Hz loop. Ticks carrying a token other than
/// the engine's current one are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TickToken(pub u64);

/// Periodic-callback scheduler at 1 Hz granularity.
///
/// `schedule` starts delivering `tick(token)` once per second to the engine's
/// event queue; `cancel` stops it. The engine always cancels the previous
/// token before scheduling a new one.
pub trait TickScheduler: Send {
    fn schedule(&mut self, token: TickToken);
    fn cancel(&mut self, token: TickToken);
}

/// The machine's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
