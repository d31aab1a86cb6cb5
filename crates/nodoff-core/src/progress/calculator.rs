//! Playhead position to elapsed/remaining/fraction figures.
//!
//! Figures are relative to the chapter containing the playhead when one can
//! be resolved, otherwise to the whole book. The book-level remaining time is
//! always reported alongside, independent of chapters.

use serde::{Deserialize, Serialize};

use super::chapters::ChapterTable;

/// What the within-unit figures of a snapshot are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressUnit {
    Book,
    Chapter { index: usize },
}

/// Progress figures for one playhead position. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub unit: ProgressUnit,
    /// 0.0 ..= 1.0 within the unit.
    pub fraction: f64,
    pub elapsed_within_unit: f64,
    pub remaining_within_unit: f64,
    /// Length of the whole book at 1x.
    pub total_duration: f64,
    /// Book-level remaining time.
    pub total_remaining: f64,
}

impl ProgressSnapshot {
    /// The "not yet loaded" snapshot.
    pub fn zeroed() -> Self {
        Self {
            unit: ProgressUnit::Book,
            fraction: 0.0,
            elapsed_within_unit: 0.0,
            remaining_within_unit: 0.0,
            total_duration: 0.0,
            total_remaining: 0.0,
        }
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::zeroed()
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Pure progress computation parameterised by the "time adjusts with speed" preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCalculator {
    pub apply_speed_to_elapsed: bool,
    pub apply_speed_to_total_remaining: bool,
}

impl ProgressCalculator {
    pub fn new(apply_speed_to_elapsed: bool, apply_speed_to_total_remaining: bool) -> Self {
        Self {
            apply_speed_to_elapsed,
            apply_speed_to_total_remaining,
        }
    }

    /// Compute a snapshot. `total_duration == None` (or a non-positive value)
    /// means the book is not loaded yet and yields [`ProgressSnapshot::zeroed`].
    pub fn compute(
        &self,
        position: f64,
        chapters: &ChapterTable,
        total_duration: Option<f64>,
        speed: f64,
    ) -> ProgressSnapshot {
        let total = match total_duration {
            Some(total) if total.is_finite() && total > 0.0 => total,
            _ => return ProgressSnapshot::zeroed(),
        };
        let position = if position.is_finite() {
            position.clamp(0.0, total)
        } else {
            0.0
        };
        let speed = sanitize_speed(speed);

        let (unit, start, end) = chapters
            .index_at(position)
            .and_then(|index| {
                chapters
                    .get(index)
                    .map(|c| (ProgressUnit::Chapter { index }, c.start, c.end))
            })
            .unwrap_or((ProgressUnit::Book, 0.0, total));

        let elapsed = position - start;
        let remaining = (end - position).max(0.0);
        let span = end - start;
        let fraction = if span > 0.0 {
            (elapsed / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (elapsed_within_unit, remaining_within_unit) = if self.apply_speed_to_elapsed {
            // Rounding elapsed first and deriving remaining from the scaled
            // total keeps elapsed + remaining equal to the unit length at speed.
            let elapsed_at_speed = (elapsed / speed).round();
            let remaining_at_speed = ((elapsed + remaining) / speed - elapsed_at_speed).max(0.0);
            (elapsed_at_speed, remaining_at_speed)
        } else {
            (elapsed, remaining)
        };

        let mut total_remaining = (total - position).max(0.0);
        if self.apply_speed_to_total_remaining {
            total_remaining /= speed;
        }

        ProgressSnapshot {
            unit,
            fraction,
            elapsed_within_unit,
            remaining_within_unit,
            total_duration: total,
            total_remaining,
        }
    }
}

/// Speeds that are zero, negative or not finite are treated as 1x.
pub fn sanitize_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        1.0
    }
}
