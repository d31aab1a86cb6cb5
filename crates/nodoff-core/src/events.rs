use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::ProgressSnapshot;
use crate::timer::{TimerExpiredPrompt, TimerSelection, TimerState};

/// Why the engine armed itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmReason {
    User,
    AutoWindow,
}

/// Every state change of the sleep timer produces an Event.
/// The presentation layer polls for them or subscribes through the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerArmed {
        selection: TimerSelection,
        reason: ArmReason,
        at: DateTime<Utc>,
    },
    /// A forward chapter boundary was counted against a chapter timer.
    ChapterCounted {
        chapter_index: usize,
        remaining: u32,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero; playback was paused.
    TimerExpired {
        selection: TimerSelection,
        at: DateTime<Utc>,
    },
    /// Recovery prompt raised after expiry.
    PromptOpened {
        prompt: TimerExpiredPrompt,
        at: DateTime<Utc>,
    },
    /// Recovery prompt passed its validity window unanswered.
    PromptLapsed {
        created_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Prompt answered with "extend" (button or shake).
    TimerExtended {
        selection: TimerSelection,
        at: DateTime<Utc>,
    },
    /// Prompt answered with "reset".
    PromptDismissed {
        at: DateTime<Utc>,
    },
    /// Shake while armed restored the full duration.
    TimerShakeReset {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerDisarmed {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        requested: TimerSelection,
        progress: ProgressSnapshot,
        prompt: Option<TimerExpiredPrompt>,
        volume: f64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TimerArmed { at, .. }
            | Event::ChapterCounted { at, .. }
            | Event::TimerExpired { at, .. }
            | Event::PromptOpened { at, .. }
            | Event::PromptLapsed { at, .. }
            | Event::TimerExtended { at, .. }
            | Event::PromptDismissed { at }
            | Event::TimerShakeReset { at, .. }
            | Event::TimerDisarmed { at }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }
}
