use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A chapter marker inside a book. Times are seconds from the start of the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub title: String,
    pub start: f64,
    /// Exclusive.
    pub end: f64,
}

impl Chapter {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }
}

/// Immutable, ordered, non-overlapping list of chapters for one book.
///
/// Gaps between chapters are allowed; a position inside a gap resolves to
/// no chapter and progress falls back to the whole book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChapterTable {
    chapters: Vec<Chapter>,
}

impl ChapterTable {
    /// Build a table, sorting by start and rejecting empty or overlapping chapters.
    pub fn new(mut chapters: Vec<Chapter>) -> Result<Self, ValidationError> {
        for chapter in &chapters {
            if !(chapter.end > chapter.start) || !chapter.start.is_finite() || !chapter.end.is_finite() {
                return Err(ValidationError::InvalidChapter {
                    id: chapter.id,
                    start: chapter.start,
                    end: chapter.end,
                });
            }
        }

        chapters.sort_by(|a, b| a.start.total_cmp(&b.start));

        for pair in chapters.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(ValidationError::OverlappingChapters {
                    previous: pair[0].id,
                    next: pair[1].id,
                });
            }
        }

        Ok(Self { chapters })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter()
    }

    /// Index of the chapter whose `[start, end)` contains `position`.
    pub fn index_at(&self, position: f64) -> Option<usize> {
        if !position.is_finite() {
            return None;
        }
        // First chapter starting after `position`; the candidate is the one before it.
        let after = self.chapters.partition_point(|c| c.start <= position);
        let idx = after.checked_sub(1)?;
        self.chapters[idx].contains(position).then_some(idx)
    }

    /// Seconds of audio (at 1x) between `position` and the end of the
    /// `count`-th chapter counting the current one as the first.
    ///
    /// Returns `None` when the position is outside every chapter or `count`
    /// is zero. If fewer chapters remain, the end of the last chapter is used.
    pub fn time_until_end_of(&self, position: f64, count: u32) -> Option<f64> {
        if count == 0 {
            return None;
        }
        let current = self.index_at(position)?;
        let last = (current + count as usize - 1).min(self.chapters.len() - 1);
        Some(self.chapters[last].end - position)
    }
}

impl<'de> Deserialize<'de> for ChapterTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            chapters: Vec<Chapter>,
        }
        let raw = Raw::deserialize(deserializer)?;
        ChapterTable::new(raw.chapters).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) fn chapter(id: i64, start: f64, end: f64) -> Chapter {
    Chapter {
        id,
        title: format!("Chapter {id}"),
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chapters() -> ChapterTable {
        ChapterTable::new(vec![chapter(1, 0.0, 1800.0), chapter(2, 1800.0, 3600.0)]).unwrap()
    }

    #[test]
    fn resolves_chapter_by_half_open_range() {
        let table = two_chapters();
        assert_eq!(table.index_at(0.0), Some(0));
        assert_eq!(table.index_at(1799.9), Some(0));
        assert_eq!(table.index_at(1800.0), Some(1));
        assert_eq!(table.index_at(3600.0), None);
        assert_eq!(table.index_at(-1.0), None);
        assert_eq!(table.index_at(f64::NAN), None);
    }

    #[test]
    fn gap_between_chapters_resolves_to_none() {
        let table = ChapterTable::new(vec![chapter(1, 0.0, 100.0), chapter(2, 120.0, 200.0)]).unwrap();
        assert_eq!(table.index_at(110.0), None);
        assert_eq!(table.index_at(120.0), Some(1));
    }

    #[test]
    fn sorts_unordered_input() {
        let table = ChapterTable::new(vec![chapter(2, 1800.0, 3600.0), chapter(1, 0.0, 1800.0)]).unwrap();
        assert_eq!(table.get(0).unwrap().id, 1);
    }

    #[test]
    fn rejects_inverted_chapter() {
        let err = ChapterTable::new(vec![chapter(7, 50.0, 50.0)]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidChapter { id: 7, .. }));
    }

    #[test]
    fn rejects_overlap() {
        let err = ChapterTable::new(vec![chapter(1, 0.0, 100.0), chapter(2, 90.0, 200.0)]).unwrap_err();
        assert_eq!(err, ValidationError::OverlappingChapters { previous: 1, next: 2 });
    }

    #[test]
    fn time_until_end_of_counts_current_chapter_first() {
        let table = ChapterTable::new(vec![
            chapter(1, 0.0, 100.0),
            chapter(2, 100.0, 250.0),
            chapter(3, 250.0, 400.0),
        ])
        .unwrap();
        assert_eq!(table.time_until_end_of(40.0, 1), Some(60.0));
        assert_eq!(table.time_until_end_of(40.0, 2), Some(210.0));
        // Clamped to the last chapter.
        assert_eq!(table.time_until_end_of(40.0, 9), Some(360.0));
        assert_eq!(table.time_until_end_of(40.0, 0), None);
        assert_eq!(table.time_until_end_of(500.0, 1), None);
    }

    #[test]
    fn deserialize_validates() {
        let ok: ChapterTable = toml::from_str(
            r#"
            [[chapters]]
            id = 1
            title = "One"
            start = 0.0
            end = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(ok.len(), 1);

        let bad = toml::from_str::<ChapterTable>(
            r#"
            [[chapters]]
            id = 1
            title = "One"
            start = 10.0
            end = 0.0
            "#,
        );
        assert!(bad.is_err());
    }
}
