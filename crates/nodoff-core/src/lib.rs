//! # Nodoff Core Library
//!
//! This library provides the core logic for nodoff, the audiobook sleep timer.
//! It follows a CLI-first philosophy: every operation is available through
//! the standalone `nodoff-cli` binary, and any player UI is a thin layer over
//! the same core library.
//!
//! ## Architecture
//!
//! - **Sleep Timer Engine**: A single-owner state machine driven by 1 Hz ticks,
//!   chapter boundaries, shake gestures and user actions
//! - **Progress**: Chapter-aware elapsed/remaining figures scaled by playback speed
//! - **Session**: Chapter-crossing detection on top of raw playhead updates
//! - **Runtime**: A tokio task that serializes every input to the engine
//! - **Storage**: TOML-based preferences
//!
//! ## Key Components
//!
//! - [`SleepTimerEngine`]: Core timer state machine
//! - [`ProgressCalculator`]: Position to progress snapshot
//! - [`PlaybackSession`]: Owns one engine for one open book
//! - [`Config`]: Application configuration management

pub mod collaborators;
pub mod error;
pub mod events;
pub mod format;
pub mod memory;
pub mod progress;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod timer;

pub use collaborators::{ChapterSource, Clock, PreferencesStore, ShakeSource, SystemClock, TickScheduler, TickToken, Transport};
pub use error::{ConfigError, CoreError, ValidationError};
pub use events::{ArmReason, Event};
pub use progress::{Chapter, ChapterTable, ProgressCalculator, ProgressSnapshot, ProgressUnit};
pub use runtime::{spawn_session, SessionHandle, SessionOptions, SessionParts};
pub use session::PlaybackSession;
pub use storage::Config;
pub use timer::{AutoTimerMode, DailyWindow, SleepTimerEngine, TimeOfDay, TimerExpiredPrompt, TimerSelection, TimerState};
