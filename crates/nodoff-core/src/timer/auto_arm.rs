//! Auto-arm window: start the sleep timer by itself when playback begins
//! inside a configured daily time window.
//!
//! Windows are half-open `[start, end)` in local minutes of the day. A window
//! whose start is later than its end spans midnight (e.g. 23:00 - 07:00).

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::selection::TimerSelection;
use crate::error::ValidationError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// What the auto timer arms with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutoTimerMode {
    #[default]
    Off,
    Duration { secs: u64 },
    ChapterCount { count: u32 },
}

impl AutoTimerMode {
    /// The selection to arm with, `None` when auto-arm is off.
    pub fn selection(&self) -> Option<TimerSelection> {
        let selection = match *self {
            AutoTimerMode::Off => return None,
            AutoTimerMode::Duration { secs } => TimerSelection::Custom { secs },
            AutoTimerMode::ChapterCount { count } => TimerSelection::Chapters { count },
        };
        (!selection.is_off()).then_some(selection)
    }
}

/// Local time of day with minute resolution, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> Self {
        Self((minutes % MINUTES_PER_DAY) as u16)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTimeOfDay(format!("{hour}:{minute}")));
        }
        Ok(Self((hour * 60 + minute) as u16))
    }

    pub fn of(at: &NaiveDateTime) -> Self {
        Self((at.hour() * 60 + at.minute()) as u16)
    }

    pub fn minutes(&self) -> u32 {
        self.0 as u32
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.parse::<u32>().map_err(|_| invalid())?;
        let minute = m.parse::<u32>().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Daily half-open window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl DailyWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Whether a minute of the day falls inside the window. Minutes past
    /// 1440 are taken modulo a day. A window with `start == end` is empty.
    pub fn contains(&self, minute_of_day: u32) -> bool {
        let now = minute_of_day % MINUTES_PER_DAY;
        let start = self.start.minutes();
        let end = self.end.minutes();

        // Overnight window (e.g., 23:00 - 07:00)
        if start > end {
            return now >= start || now < end;
        }

        // Daytime window (e.g., 12:00 - 17:00)
        now >= start && now < end
    }

    /// The local date on which the window occurrence containing `at` opened,
    /// or `None` when `at` is outside the window.
    pub fn occurrence(&self, at: &NaiveDateTime) -> Option<NaiveDate> {
        let minute = TimeOfDay::of(at).minutes();
        if !self.contains(minute) {
            return None;
        }
        let date = at.date();
        if self.wraps_midnight() && minute < self.end.minutes() {
            // After midnight: the window opened the previous evening.
            return Some(date - Duration::days(1));
        }
        Some(date)
    }
}

impl Default for DailyWindow {
    fn default() -> Self {
        Self {
            start: TimeOfDay(22 * 60),
            end: TimeOfDay(6 * 60),
        }
    }
}

/// Decides whether the engine should arm itself on player open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoArmScheduler {
    pub mode: AutoTimerMode,
    pub window: DailyWindow,
}

impl AutoArmScheduler {
    pub fn new(mode: AutoTimerMode, window: DailyWindow) -> Self {
        Self { mode, window }
    }

    pub fn is_within_window(&self, at: &NaiveDateTime) -> bool {
        self.window.contains(TimeOfDay::of(at).minutes())
    }

    /// The selection to arm with at `at`, if the mode is on and `at` is inside the window.
    pub fn decide(&self, at: &NaiveDateTime) -> Option<TimerSelection> {
        let selection = self.mode.selection()?;
        self.is_within_window(at).then_some(selection)
    }
}
