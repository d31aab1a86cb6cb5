mod auto_arm;
mod engine;
pub mod fade;
mod prompt;
mod selection;

pub use auto_arm::{AutoArmScheduler, AutoTimerMode, DailyWindow, TimeOfDay, MINUTES_PER_DAY};
pub use engine::{EngineDeps, PlaybackContext, SleepTimerEngine};
pub use prompt::{TimerExpiredPrompt, PROMPT_VALIDITY_SECS};
pub use selection::{parse_duration_secs, TimerSelection, TimerState};
