//! Recovery prompt raised when the sleep timer runs out.
//!
//! The prompt is only actionable for [`PROMPT_VALIDITY_SECS`] after creation.
//! Validity is checked on read; nothing is scheduled to tear it down.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::selection::TimerSelection;

/// How long a prompt stays actionable.
pub const PROMPT_VALIDITY_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerExpiredPrompt {
    pub created_at: DateTime<Utc>,
    /// e.g. "Extend by 15 minutes".
    pub suggested_extension: String,
    /// The originally requested selection, restored on extend.
    pub extension: TimerSelection,
}

impl TimerExpiredPrompt {
    pub fn new(extension: TimerSelection, created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            suggested_extension: extension.extension_label(),
            extension,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(PROMPT_VALIDITY_SECS)
    }

    /// True once `created_at + 5 minutes < now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() < now
    }
}
