use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::format::{chapters_label, duration_label};

/// What the user (or the auto-arm window) asked the sleep timer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerSelection {
    Off,
    /// Quick-pick duration.
    Preset { secs: u64 },
    /// Duration chosen with the custom picker.
    Custom { secs: u64 },
    /// Stop after this many chapter boundaries.
    Chapters { count: u32 },
}

/// The engine's live countdown. Same shape as [`TimerSelection`] but the
/// payload is what is *left*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerState {
    Off,
    Preset { remaining_secs: u64 },
    Custom { remaining_secs: u64 },
    Chapters { remaining: u32 },
}

impl TimerSelection {
    /// A zero duration or zero chapter count selects nothing.
    pub fn normalized(self) -> Self {
        match self {
            TimerSelection::Preset { secs: 0 }
            | TimerSelection::Custom { secs: 0 }
            | TimerSelection::Chapters { count: 0 } => TimerSelection::Off,
            other => other,
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self.normalized(), TimerSelection::Off)
    }

    /// Countdown state at the moment of arming.
    pub fn initial_state(&self) -> TimerState {
        match self.normalized() {
            TimerSelection::Off => TimerState::Off,
            TimerSelection::Preset { secs } => TimerState::Preset { remaining_secs: secs },
            TimerSelection::Custom { secs } => TimerState::Custom { remaining_secs: secs },
            TimerSelection::Chapters { count } => TimerState::Chapters { remaining: count },
        }
    }

    pub fn duration_secs(&self) -> Option<u64> {
        match self {
            TimerSelection::Preset { secs } | TimerSelection::Custom { secs } => Some(*secs),
            _ => None,
        }
    }

    /// Label offered by the recovery prompt after this selection ran out.
    pub fn extension_label(&self) -> String {
        match self {
            TimerSelection::Off => String::new(),
            TimerSelection::Preset { secs } | TimerSelection::Custom { secs } => {
                format!("Extend by {}", duration_label(*secs))
            }
            TimerSelection::Chapters { count: 1 } => "Extend to end of chapter".into(),
            TimerSelection::Chapters { count } => format!("Extend by {}", chapters_label(*count)),
        }
    }
}

impl fmt::Display for TimerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerSelection::Off => f.write_str("Off"),
            TimerSelection::Preset { secs } | TimerSelection::Custom { secs } => {
                f.write_str(&duration_label(*secs))
            }
            TimerSelection::Chapters { count: 1 } => f.write_str("End of chapter"),
            TimerSelection::Chapters { count } => f.write_str(&chapters_label(*count)),
        }
    }
}

/// Accepts `off`, `15m`, `1h30m`, `90s`, a bare number of minutes,
/// `custom:<duration>`, `chapter` and `chapters:<n>`.
impl FromStr for TimerSelection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "off" {
            return Ok(TimerSelection::Off);
        }
        if s == "chapter" || s == "end-of-chapter" {
            return Ok(TimerSelection::Chapters { count: 1 });
        }
        if let Some(count) = s.strip_prefix("chapters:") {
            let count = count
                .parse::<u32>()
                .map_err(|_| ValidationError::InvalidSelection(s.clone()))?;
            return Ok(TimerSelection::Chapters { count });
        }
        if let Some(rest) = s.strip_prefix("custom:") {
            let secs = parse_duration_secs(rest)
                .ok_or_else(|| ValidationError::InvalidSelection(s.clone()))?;
            return Ok(TimerSelection::Custom { secs });
        }
        parse_duration_secs(&s)
            .map(|secs| TimerSelection::Preset { secs })
            .ok_or(ValidationError::InvalidSelection(s))
    }
}

/// Parse `1h30m`, `15m`, `90s`, `2h`. A bare number is minutes.
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(minutes) = s.parse::<u64>() {
        return minutes.checked_mul(60);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let n: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(n.checked_mul(unit)?)?;
    }
    // Trailing digits without a unit.
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}

impl TimerState {
    pub fn is_active(&self) -> bool {
        !matches!(self, TimerState::Off)
    }

    /// Remaining seconds for duration-driven timers.
    pub fn remaining_secs(&self) -> Option<u64> {
        match self {
            TimerState::Preset { remaining_secs } | TimerState::Custom { remaining_secs } => {
                Some(*remaining_secs)
            }
            _ => None,
        }
    }

    /// Remaining chapters for chapter-driven timers.
    pub fn remaining_chapters(&self) -> Option<u32> {
        match self {
            TimerState::Chapters { remaining } => Some(*remaining),
            _ => None,
        }
    }

    pub(crate) fn with_remaining_secs(self, secs: u64) -> Self {
        match self {
            TimerState::Preset { .. } => TimerState::Preset { remaining_secs: secs },
            TimerState::Custom { .. } => TimerState::Custom { remaining_secs: secs },
            other => other,
        }
    }
}
