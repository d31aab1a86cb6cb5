//! Playback session: the owner of one sleep timer engine.
//!
//! The session loads the book's chapter table, feeds the engine its
//! playback context and turns raw playhead updates into chapter-boundary
//! crossings. Only one session (and thus one engine) should be live per
//! player.

use tracing::debug;

use crate::collaborators::ChapterSource;
use crate::events::Event;
use crate::progress::{ChapterTable, ProgressSnapshot};
use crate::timer::{EngineDeps, PlaybackContext, SleepTimerEngine, TimerSelection};

pub struct PlaybackSession {
    book_id: String,
    engine: SleepTimerEngine,
    /// Chapter the playhead was last seen in.
    current_chapter: Option<usize>,
    /// End of the book has already been reported.
    ended: bool,
}

impl PlaybackSession {
    /// Open `book_id` at `position`, loading chapters from `source`.
    pub fn open(
        book_id: impl Into<String>,
        source: &dyn ChapterSource,
        deps: EngineDeps,
        position: f64,
        speed: f64,
    ) -> Self {
        let book_id = book_id.into();
        let chapters = source.current_chapters(&book_id);
        let total_duration = source.duration(&book_id);

        let mut engine = SleepTimerEngine::new(deps);
        let current_chapter = chapters.index_at(position);
        engine.set_context(PlaybackContext {
            chapters,
            total_duration,
            speed,
        });
        engine.seek(position);
        debug!(%book_id, chapters = engine.context().chapters.len(), ?total_duration, "session opened");

        Self {
            book_id,
            engine,
            current_chapter,
            ended: false,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn engine(&self) -> &SleepTimerEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SleepTimerEngine {
        &mut self.engine
    }

    pub fn chapters(&self) -> &ChapterTable {
        &self.engine.context().chapters
    }

    pub fn current_chapter(&self) -> Option<usize> {
        self.current_chapter
    }

    /// The player was opened: give the auto timer its one chance to arm.
    pub fn on_player_open(&mut self) -> Option<Event> {
        self.engine.maybe_auto_arm()
    }

    pub fn arm(&mut self, selection: TimerSelection) -> Option<Event> {
        self.engine.arm(selection)
    }

    /// A playhead update from normal playback.
    ///
    /// Every change of chapter is reported to the engine, which counts only
    /// forward ones. Running past the last chapter reports the end of the
    /// book once.
    pub fn on_position_changed(&mut self, position: f64) -> Option<Event> {
        self.engine.refresh_progress();
        let chapters = &self.engine.context().chapters;
        let total = chapters.len();
        if total == 0 {
            return None;
        }

        match (self.current_chapter, chapters.index_at(position)) {
            (Some(previous), Some(next)) if next == previous => None,
            (_, Some(next)) => {
                self.current_chapter = Some(next);
                self.ended = false;
                self.engine.on_chapter_boundary_crossed(next, total)
            }
            (_, None) => {
                let past_end = chapters
                    .get(total - 1)
                    .is_some_and(|last| position >= last.end);
                if past_end && !self.ended {
                    self.ended = true;
                    self.current_chapter = None;
                    return self.engine.on_chapter_boundary_crossed(total, total);
                }
                // In a gap between chapters: wait for the next one.
                None
            }
        }
    }

    /// A user seek. Never counts as a chapter crossing.
    pub fn seek(&mut self, to_secs: f64) -> ProgressSnapshot {
        let progress = self.engine.seek(to_secs);
        self.current_chapter = self.engine.context().chapters.index_at(to_secs);
        self.ended = false;
        progress
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.engine.set_speed(speed);
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.engine.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::memory::{Book, BookCatalog, ManualClock, ManualTicker, MemoryShakeSource, MemoryTransport};
    use crate::progress::{chapter, ProgressUnit};
    use crate::storage::Config;
    use crate::timer::TimerState;

    fn catalog() -> BookCatalog {
        let mut catalog = BookCatalog::new();
        catalog
            .insert(Book {
                id: "b1".into(),
                title: "Book".into(),
                duration: Some(300.0),
                chapters: vec![chapter(1, 0.0, 100.0), chapter(2, 100.0, 200.0), chapter(3, 200.0, 300.0)],
            })
            .unwrap();
        catalog
    }

    fn open(position: f64) -> (PlaybackSession, MemoryTransport) {
        let transport = MemoryTransport::playing(position);
        let deps = EngineDeps {
            transport: Box::new(transport.clone()),
            shake: Box::new(MemoryShakeSource::new()),
            ticker: Box::new(ManualTicker::new()),
            clock: Arc::new(ManualClock::at_utc(Utc::now())),
            preferences: Arc::new(Config::default()),
        };
        (PlaybackSession::open("b1", &catalog(), deps, position, 1.0), transport)
    }

    #[test]
    fn open_loads_chapters_and_progress() {
        let (session, _) = open(150.0);
        assert_eq!(session.chapters().len(), 3);
        assert_eq!(session.current_chapter(), Some(1));
        assert_eq!(session.progress().unit, ProgressUnit::Chapter { index: 1 });
        assert_eq!(session.progress().elapsed_within_unit, 50.0);
    }

    #[test]
    fn crossing_into_next_chapter_counts() {
        let (mut session, mut transport) = open(90.0);
        session.arm(TimerSelection::Chapters { count: 2 });
        assert!(session.on_position_changed(95.0).is_none());

        crate::collaborators::Transport::seek(&mut transport, 101.0);
        let event = session.on_position_changed(101.0);
        assert!(matches!(event, Some(Event::ChapterCounted { remaining: 1, .. })));

        let event = session.on_position_changed(201.0);
        assert!(matches!(event, Some(Event::TimerExpired { .. })));
        assert_eq!(session.engine().state(), TimerState::Off);
    }

    #[test]
    fn skipping_back_across_a_boundary_does_not_recount() {
        let (mut session, _) = open(95.0);
        session.arm(TimerSelection::Chapters { count: 2 });
        assert!(matches!(
            session.on_position_changed(101.0),
            Some(Event::ChapterCounted { remaining: 1, .. })
        ));
        assert!(session.on_position_changed(98.0).is_none());
        assert!(session.on_position_changed(101.0).is_none());
        assert_eq!(session.engine().state(), TimerState::Chapters { remaining: 1 });

        assert!(matches!(
            session.on_position_changed(200.5),
            Some(Event::TimerExpired { .. })
        ));
    }

    #[test]
    fn seek_rebaselines_without_counting() {
        let (mut session, _) = open(50.0);
        session.arm(TimerSelection::Chapters { count: 1 });
        session.seek(250.0);
        assert_eq!(session.engine().state(), TimerState::Chapters { remaining: 1 });
        assert_eq!(session.engine().last_chapter_index(), Some(2));

        // Seeking back then playing forward counts from the new chapter.
        session.seek(10.0);
        assert!(matches!(
            session.on_position_changed(100.5),
            Some(Event::TimerExpired { .. })
        ));
    }

    #[test]
    fn running_off_the_end_expires_once() {
        let (mut session, _) = open(250.0);
        session.arm(TimerSelection::Chapters { count: 3 });
        assert!(matches!(
            session.on_position_changed(300.0),
            Some(Event::TimerExpired { .. })
        ));
        assert!(session.on_position_changed(300.5).is_none());
    }

    #[test]
    fn unknown_book_has_zeroed_progress() {
        let transport = MemoryTransport::playing(10.0);
        let deps = EngineDeps {
            transport: Box::new(transport),
            shake: Box::new(MemoryShakeSource::new()),
            ticker: Box::new(ManualTicker::new()),
            clock: Arc::new(ManualClock::at_utc(Utc::now())),
            preferences: Arc::new(Config::default()),
        };
        let mut session = PlaybackSession::open("nope", &catalog(), deps, 10.0, 1.0);
        assert!(session.progress().is_zeroed());
        assert!(session.on_position_changed(20.0).is_none());
    }
}
